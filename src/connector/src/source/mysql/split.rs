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

use std::collections::HashMap;

use rivercdc_common::catalog::{Field, Schema, TableId};
use rivercdc_common::types::{Datum, ScalarImpl};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::base::{SplitId, SplitMetaData};
use crate::source::mysql::offset::{BinlogOffset, StopOffset};

/// An ordered tuple of primary-key values used as a chunk boundary.
///
/// Comparison is componentwise in the natural order of each field's type;
/// the planner only admits orderable key types, so the order is total.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SplitKey(pub Vec<ScalarImpl>);

impl SplitKey {
    pub fn single(value: impl Into<ScalarImpl>) -> Self {
        Self(vec![value.into()])
    }

    /// Builds a key from projected row datums. Key columns are non-nullable
    /// by definition; a null component means the event and the schema have
    /// diverged.
    pub fn from_datums(datums: Vec<Datum>) -> ConnectorResult<Self> {
        datums
            .into_iter()
            .map(|d| {
                d.ok_or_else(|| ConnectorError::consistency("null value in split-key column"))
            })
            .collect::<ConnectorResult<Vec<_>>>()
            .map(Self)
    }
}

/// Whether `key` falls in `[start, end)`, a `None` bound being unbounded.
pub(crate) fn range_contains(
    start: Option<&SplitKey>,
    end: Option<&SplitKey>,
    key: &SplitKey,
) -> bool {
    start.map_or(true, |s| key >= s) && end.map_or(true, |e| key < e)
}

/// A key-range slice of a table scheduled for independent snapshot reading.
///
/// The range is `[split_start, split_end)`; the first chunk of a table has
/// `split_start = None`, the last has `split_end = None`. `high_watermark`
/// is set once the snapshot read of the chunk has finished.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSplit {
    pub split_id: SplitId,
    pub table_id: TableId,
    pub split_key_fields: Vec<Field>,
    pub split_start: Option<SplitKey>,
    pub split_end: Option<SplitKey>,
    pub high_watermark: Option<BinlogOffset>,
    #[serde_as(as = "Vec<(_, _)>")]
    pub table_schemas: HashMap<TableId, Schema>,
}

impl SnapshotSplit {
    pub fn covers(&self, key: &SplitKey) -> bool {
        range_contains(self.split_start.as_ref(), self.split_end.as_ref(), key)
    }

    pub fn schema(&self) -> ConnectorResult<&Schema> {
        self.table_schemas.get(&self.table_id).ok_or_else(|| {
            ConnectorError::protocol(format!(
                "split {} carries no schema for {}",
                self.split_id, self.table_id
            ))
        })
    }
}

impl SplitMetaData for SnapshotSplit {
    fn id(&self) -> SplitId {
        self.split_id.clone()
    }

    fn encode_to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.clone()).unwrap()
    }

    fn restore_from_json(value: serde_json::Value) -> ConnectorResult<Self> {
        serde_json::from_value(value).map_err(|e| anyhow::anyhow!(e).into())
    }
}

/// Per-chunk completion record carried by the binlog split, used by the tail
/// reader to suppress events already materialized by the chunk's normalized
/// output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedChunkInfo {
    pub table_id: TableId,
    pub split_id: SplitId,
    pub split_start: Option<SplitKey>,
    pub split_end: Option<SplitKey>,
    pub high_watermark: BinlogOffset,
}

impl FinishedChunkInfo {
    pub fn from_split(split: &SnapshotSplit, high_watermark: BinlogOffset) -> Self {
        Self {
            table_id: split.table_id.clone(),
            split_id: split.split_id.clone(),
            split_start: split.split_start.clone(),
            split_end: split.split_end.clone(),
            high_watermark,
        }
    }

    pub fn covers(&self, key: &SplitKey) -> bool {
        range_contains(self.split_start.as_ref(), self.split_end.as_ref(), key)
    }
}

/// The singleton split representing the binlog tail after all chunks finish.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinlogSplit {
    pub split_id: SplitId,
    pub split_key_fields: Vec<Field>,
    pub start_offset: BinlogOffset,
    pub stop_offset: StopOffset,
    pub finished_chunks: Vec<FinishedChunkInfo>,
    #[serde_as(as = "Vec<(_, _)>")]
    pub table_schemas: HashMap<TableId, Schema>,
    /// Set when the job started in `timestamp` mode: data events whose source
    /// timestamp precedes this are dropped by the tail reader.
    pub start_timestamp_ms: Option<i64>,
}

impl SplitMetaData for BinlogSplit {
    fn id(&self) -> SplitId {
        self.split_id.clone()
    }

    fn encode_to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.clone()).unwrap()
    }

    fn restore_from_json(value: serde_json::Value) -> ConnectorResult<Self> {
        serde_json::from_value(value).map_err(|e| anyhow::anyhow!(e).into())
    }
}

pub const SPLIT_TYPE_FIELD: &str = "split_type";
pub const SPLIT_INFO_FIELD: &str = "split_info";

const SNAPSHOT_SPLIT_TYPE: &str = "snapshot";
const BINLOG_SPLIT_TYPE: &str = "binlog";

/// The split variants of the connector. A new variant without handling fails
/// compilation at every `match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MySqlSplit {
    Snapshot(SnapshotSplit),
    Binlog(BinlogSplit),
}

impl MySqlSplit {
    pub fn get_type(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => SNAPSHOT_SPLIT_TYPE,
            Self::Binlog(_) => BINLOG_SPLIT_TYPE,
        }
    }

    pub fn into_snapshot(self) -> ConnectorResult<SnapshotSplit> {
        match self {
            Self::Snapshot(inner) => Ok(inner),
            Self::Binlog(inner) => Err(ConnectorError::protocol(format!(
                "expected snapshot split, got binlog split {}",
                inner.split_id
            ))),
        }
    }

    pub fn into_binlog(self) -> ConnectorResult<BinlogSplit> {
        match self {
            Self::Binlog(inner) => Ok(inner),
            Self::Snapshot(inner) => Err(ConnectorError::protocol(format!(
                "expected binlog split, got snapshot split {}",
                inner.split_id
            ))),
        }
    }
}

impl SplitMetaData for MySqlSplit {
    fn id(&self) -> SplitId {
        match self {
            Self::Snapshot(inner) => inner.id(),
            Self::Binlog(inner) => inner.id(),
        }
    }

    fn encode_to_json(&self) -> serde_json::Value {
        let inner = match self {
            Self::Snapshot(inner) => inner.encode_to_json(),
            Self::Binlog(inner) => inner.encode_to_json(),
        };
        serde_json::json!({ SPLIT_TYPE_FIELD: self.get_type(), SPLIT_INFO_FIELD: inner })
    }

    fn restore_from_json(value: serde_json::Value) -> ConnectorResult<Self> {
        let mut value = value;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| ConnectorError::protocol("split json is not an object"))?;
        let split_type = obj
            .remove(SPLIT_TYPE_FIELD)
            .and_then(|v| v.as_str().map(|s| s.to_owned()))
            .ok_or_else(|| ConnectorError::protocol("split json misses split_type"))?;
        let inner = obj
            .remove(SPLIT_INFO_FIELD)
            .ok_or_else(|| ConnectorError::protocol("split json misses split_info"))?;
        match split_type.as_str() {
            SNAPSHOT_SPLIT_TYPE => SnapshotSplit::restore_from_json(inner).map(Self::Snapshot),
            BINLOG_SPLIT_TYPE => BinlogSplit::restore_from_json(inner).map(Self::Binlog),
            other => Err(ConnectorError::protocol(format!(
                "split type '{other}' is not supported"
            ))),
        }
    }
}
