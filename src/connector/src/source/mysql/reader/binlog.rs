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

//! The tail phase: one binlog session from the computed start offset, with
//! per-chunk duplicate suppression. The tail resumes from the earliest high
//! watermark over all chunks, so an event may predate the watermark of the
//! chunk covering its key; such an event was already represented in that
//! chunk's normalized output and is dropped.

use std::collections::HashMap;

use futures_async_stream::try_stream;
use itertools::Itertools;
use rivercdc_common::catalog::{Schema, TableId};
use tracing::{debug, info};

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::mysql::event::{ChangeEvent, SourceEvent};
use crate::source::mysql::external::BinlogConnectRef;
use crate::source::mysql::offset::BinlogOffset;
use crate::source::mysql::split::{BinlogSplit, FinishedChunkInfo};

pub struct BinlogSplitReader {
    binlog: BinlogConnectRef,
    server_id: u32,
}

impl BinlogSplitReader {
    pub fn new(binlog: BinlogConnectRef, server_id: u32) -> Self {
        Self { binlog, server_id }
    }

    /// Tails the log from the split's start offset until the stop offset is
    /// passed, or forever under [`StopOffset::Never`].
    ///
    /// [`StopOffset::Never`]: crate::source::mysql::offset::StopOffset::Never
    #[try_stream(boxed, ok = SourceEvent, error = ConnectorError)]
    pub async fn into_stream(self, split: BinlogSplit) {
        let mut table_schemas = split.table_schemas.clone();
        let filter = EventFilter::new(&split);
        info!(
            split_id = %split.split_id,
            start_offset = %split.start_offset,
            finished_chunks = split.finished_chunks.len(),
            "binlog tail starting",
        );

        let stream = self.binlog.connect(self.server_id, &split.start_offset).await?;
        #[for_await]
        for item in stream {
            let event = item?;
            if split.stop_offset.is_passed_by(event.offset()) {
                info!(split_id = %split.split_id, offset = %event.offset(), "stop offset passed");
                return Ok(());
            }
            match event {
                SourceEvent::SchemaChange(change) => {
                    // schema changes pass through unconditionally and govern
                    // the decoding of subsequent events
                    if let Some(schema) = &change.schema {
                        table_schemas.insert(change.table_id.clone(), schema.clone());
                    }
                    yield SourceEvent::SchemaChange(change);
                }
                SourceEvent::Heartbeat { offset } => {
                    yield SourceEvent::Heartbeat { offset };
                }
                SourceEvent::Data(change) => {
                    if filter.should_emit(&change, &table_schemas)? {
                        yield SourceEvent::Data(change);
                    } else {
                        debug!(
                            offset = %change.offset,
                            table = %change.table_id,
                            "suppressing event already covered by a finished chunk",
                        );
                    }
                }
                SourceEvent::Watermark { .. } => {
                    Err(ConnectorError::protocol(
                        "watermark event in a binlog session",
                    ))?;
                }
            }
        }
    }
}

/// Duplicate suppression against the finished chunks of the snapshot phase.
struct EventFilter {
    /// Above this offset nothing can be a duplicate; checked first so the
    /// steady state skips the per-chunk lookup.
    max_high_watermark: Option<BinlogOffset>,
    chunks_by_table: HashMap<TableId, Vec<FinishedChunkInfo>>,
    start_timestamp_ms: Option<i64>,
}

impl EventFilter {
    fn new(split: &BinlogSplit) -> Self {
        Self {
            max_high_watermark: split
                .finished_chunks
                .iter()
                .map(|chunk| chunk.high_watermark.clone())
                .max(),
            chunks_by_table: split
                .finished_chunks
                .iter()
                .cloned()
                .into_group_map_by(|chunk| chunk.table_id.clone()),
            start_timestamp_ms: split.start_timestamp_ms,
        }
    }

    fn should_emit(
        &self,
        event: &ChangeEvent,
        table_schemas: &HashMap<TableId, Schema>,
    ) -> ConnectorResult<bool> {
        if let Some(start_ts) = self.start_timestamp_ms {
            if event.source_ts_ms < start_ts {
                return Ok(false);
            }
        }
        let Some(max_high_watermark) = &self.max_high_watermark else {
            // tail-only startup: nothing was snapshotted
            return Ok(true);
        };
        if event.offset > *max_high_watermark {
            return Ok(true);
        }
        let Some(chunks) = self.chunks_by_table.get(&event.table_id) else {
            return Ok(true);
        };
        let schema = table_schemas.get(&event.table_id).ok_or_else(|| {
            ConnectorError::protocol(format!("no schema for chunked table {}", event.table_id))
        })?;
        let Some(&key_index) = schema.pk_indices.first() else {
            return Err(ConnectorError::protocol(format!(
                "chunked table {} lost its primary key",
                event.table_id
            )));
        };
        let key = event.split_key(&[key_index])?;
        match chunks.iter().find(|chunk| chunk.covers(&key)) {
            Some(chunk) => Ok(event.offset > chunk.high_watermark),
            None => Ok(true),
        }
    }
}
