// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rivercdc_common::catalog::{Field, TableId};
use rivercdc_common::types::ScalarImpl;
use tracing::debug;

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::mysql::external::ExternalTableReader;
use crate::source::mysql::split::SplitKey;

/// `[start, end)` with `None` endpoints unbounded.
pub type ChunkRange = (Option<SplitKey>, Option<SplitKey>);

/// When `(max - min + 1) <= count * factor` the integer key space is treated
/// as dense and chunk boundaries are computed arithmetically instead of one
/// skip query per chunk. Correctness never depends on this branch; the
/// cursor-based path is the reference.
const DENSE_DISTRIBUTION_FACTOR: u64 = 2;

/// Plans the chunk ranges of one table. The boundary-producing step goes
/// through [`super::super::external::KeyCursor`], so key sequences can be
/// injected without SQL.
#[derive(Debug)]
pub struct ChunkPlanner<'a> {
    table_id: &'a TableId,
    key_field: &'a Field,
    chunk_size: u64,
}

impl<'a> ChunkPlanner<'a> {
    pub fn new(
        table_id: &'a TableId,
        key_field: &'a Field,
        chunk_size: u64,
    ) -> ConnectorResult<Self> {
        if !key_field.data_type.is_orderable_key() {
            return Err(ConnectorError::config(format!(
                "column `{}` of {} has type {:?} which cannot serve as a split key",
                key_field.name, table_id, key_field.data_type
            )));
        }
        Ok(Self {
            table_id,
            key_field,
            chunk_size,
        })
    }

    pub async fn plan(&self, table: &dyn ExternalTableReader) -> ConnectorResult<Vec<ChunkRange>> {
        if self.key_field.data_type.is_integer() {
            let stats = table.split_key_stats(self.table_id, self.key_field).await?;
            if stats.row_count == 0 {
                return Ok(vec![(None, None)]);
            }
            if let (Some(min), Some(max)) = (&stats.min, &stats.max) {
                let min = min.as_integer().ok_or_else(|| {
                    ConnectorError::protocol(format!("non-integer MIN for `{}`", self.key_field.name))
                })?;
                let max = max.as_integer().ok_or_else(|| {
                    ConnectorError::protocol(format!("non-integer MAX for `{}`", self.key_field.name))
                })?;
                let span = max.abs_diff(min).saturating_add(1);
                if span <= stats.row_count.saturating_mul(DENSE_DISTRIBUTION_FACTOR) {
                    debug!(
                        table = %self.table_id,
                        min, max, row_count = stats.row_count,
                        "dense integer key, splitting chunks arithmetically",
                    );
                    return Ok(Self::ranges_from_boundaries(self.evenly_spaced_boundaries(
                        min, max,
                    )));
                }
            }
        }

        let cursor = table.key_cursor(self.table_id, self.key_field);
        let mut boundaries = Vec::new();
        let mut last: Option<SplitKey> = None;
        while let Some(boundary) = cursor.next_boundary(last.as_ref(), self.chunk_size).await? {
            last = Some(boundary.clone());
            boundaries.push(boundary);
        }
        debug!(
            table = %self.table_id,
            chunks = boundaries.len() + 1,
            "planned chunks with skip queries",
        );
        Ok(Self::ranges_from_boundaries(boundaries))
    }

    fn evenly_spaced_boundaries(&self, min: i64, max: i64) -> Vec<SplitKey> {
        let mut boundaries = Vec::new();
        let mut next = min.saturating_add_unsigned(self.chunk_size);
        while next <= max {
            boundaries.push(SplitKey::single(ScalarImpl::Int64(next)));
            if next == i64::MAX {
                break;
            }
            next = next.saturating_add_unsigned(self.chunk_size);
        }
        boundaries
    }

    /// The first chunk starts unbounded, the last ends unbounded, interior
    /// boundaries are shared: inclusive as a start, exclusive as an end.
    fn ranges_from_boundaries(boundaries: Vec<SplitKey>) -> Vec<ChunkRange> {
        if boundaries.is_empty() {
            return vec![(None, None)];
        }
        let mut ranges = Vec::with_capacity(boundaries.len() + 1);
        let mut start = None;
        for boundary in boundaries {
            ranges.push((start, Some(boundary.clone())));
            start = Some(boundary);
        }
        ranges.push((start, None));
        ranges
    }
}

#[cfg(test)]
mod tests {
    use rivercdc_common::catalog::Schema;
    use rivercdc_common::types::DataType;

    use super::*;
    use crate::source::mysql::external::mock::{
        assert_exactly_one_range, assert_ranges_cover, test_row, test_schema, test_table_id,
        MockUpstream,
    };

    fn int_key() -> Field {
        Field::new("id", DataType::Int64)
    }

    async fn plan(upstream: &MockUpstream, chunk_size: u64) -> Vec<ChunkRange> {
        ChunkPlanner::new(&test_table_id(), &int_key(), chunk_size)
            .unwrap()
            .plan(upstream)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_dense_fast_path() {
        let upstream = MockUpstream::new();
        upstream.put_table(
            test_table_id(),
            test_schema(),
            (1..=10).map(|id| test_row(id, "v")).collect(),
        );
        let ranges = plan(&upstream, 4).await;
        assert_eq!(
            ranges,
            vec![
                (None, Some(SplitKey::single(5i64))),
                (Some(SplitKey::single(5i64)), Some(SplitKey::single(9i64))),
                (Some(SplitKey::single(9i64)), None),
            ]
        );
        assert_ranges_cover(&ranges);
        for id in 1..=10i64 {
            assert_exactly_one_range(&ranges, &SplitKey::single(id));
        }
    }

    #[tokio::test]
    async fn test_sparse_falls_back_to_skip_queries() {
        let upstream = MockUpstream::new();
        upstream.put_table(
            test_table_id(),
            test_schema(),
            [1i64, 100, 200, 300, 400]
                .into_iter()
                .map(|id| test_row(id, "v"))
                .collect(),
        );
        let ranges = plan(&upstream, 2).await;
        assert_eq!(
            ranges,
            vec![
                (None, Some(SplitKey::single(100i64))),
                (Some(SplitKey::single(100i64)), Some(SplitKey::single(300i64))),
                (Some(SplitKey::single(300i64)), None),
            ]
        );
        assert_ranges_cover(&ranges);
        for id in [1i64, 100, 200, 300, 400] {
            assert_exactly_one_range(&ranges, &SplitKey::single(id));
        }
    }

    #[tokio::test]
    async fn test_varchar_key_uses_generic_path() {
        let table_id = test_table_id();
        let schema = Schema::new(
            vec![
                Field::new("name", DataType::Varchar),
                Field::new("v", DataType::Varchar),
            ],
            vec![0],
        );
        let upstream = MockUpstream::new();
        upstream.put_table(
            table_id.clone(),
            schema,
            ["alpha", "beta", "gamma"]
                .into_iter()
                .map(|name| {
                    rivercdc_common::row::OwnedRow::new(vec![
                        Some(ScalarImpl::from(name)),
                        Some(ScalarImpl::from("v")),
                    ])
                })
                .collect(),
        );
        let key = Field::new("name", DataType::Varchar);
        let ranges = ChunkPlanner::new(&table_id, &key, 2)
            .unwrap()
            .plan(&upstream)
            .await
            .unwrap();
        assert_eq!(
            ranges,
            vec![
                (None, Some(SplitKey::single(ScalarImpl::from("beta")))),
                (Some(SplitKey::single(ScalarImpl::from("beta"))), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_small_and_empty_tables_get_one_chunk() {
        let upstream = MockUpstream::new();
        upstream.put_table(test_table_id(), test_schema(), vec![test_row(7, "v")]);
        assert_eq!(plan(&upstream, 8096).await, vec![(None, None)]);

        let empty = MockUpstream::new();
        empty.put_table(test_table_id(), test_schema(), vec![]);
        assert_eq!(plan(&empty, 8096).await, vec![(None, None)]);
    }

    #[test]
    fn test_unorderable_key_rejected() {
        let key = Field::new("payload", DataType::Bytea);
        let err = ChunkPlanner::new(&test_table_id(), &key, 8096).unwrap_err();
        assert!(matches!(err, ConnectorError::Config(_)));
    }
}
