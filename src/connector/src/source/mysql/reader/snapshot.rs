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

//! Per-chunk snapshot reading: capture the low watermark, select the chunk's
//! rows while a binlog tail buffers the concurrent slice, capture the high
//! watermark, drain the slice up to it, and normalize.

use std::sync::Arc;

use futures_async_stream::try_stream;
use rivercdc_common::row::OwnedRow;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::base::SplitId;
use crate::source::mysql::config::MySqlSourceConfig;
use crate::source::mysql::event::{ChangeEvent, SourceEvent};
use crate::source::mysql::external::{BinlogConnectRef, ExternalTableReaderRef};
use crate::source::mysql::offset::BinlogOffset;
use crate::source::mysql::reader::normalize::normalize_chunk;
use crate::source::mysql::reader::split_key_indices;
use crate::source::mysql::split::{SnapshotSplit, SplitKey};

/// Capacity of the per-chunk log-ingest queue. The tail task blocks on a
/// full queue, pushing backpressure into the binlog session instead of
/// buffering without bound.
const BINLOG_INGEST_QUEUE_SIZE: usize = 1024;

/// The normalized result of one chunk.
#[derive(Debug)]
pub struct SnapshotChunkOutput {
    pub split_id: SplitId,
    /// `[LowWatermark, records…, HighWatermark]`.
    pub events: Vec<SourceEvent>,
    /// Reported to the enumerator: the chunk delivered the state of its
    /// range as of this offset.
    pub high_watermark: BinlogOffset,
}

pub struct SnapshotSplitReader {
    table: ExternalTableReaderRef,
    binlog: BinlogConnectRef,
    config: Arc<MySqlSourceConfig>,
    server_id: u32,
}

impl SnapshotSplitReader {
    pub fn new(
        table: ExternalTableReaderRef,
        binlog: BinlogConnectRef,
        config: Arc<MySqlSourceConfig>,
        server_id: u32,
    ) -> Self {
        Self {
            table,
            binlog,
            config,
            server_id,
        }
    }

    /// Runs the low-watermark → select → high-watermark protocol for one
    /// chunk. Any failure is fatal to the chunk; the caller returns the
    /// split to the assigner.
    pub async fn read(&self, split: SnapshotSplit) -> ConnectorResult<SnapshotChunkOutput> {
        let schema = split.schema()?.clone();
        let key_indices = split_key_indices(&split.split_key_fields, &schema)?;

        let low = self.table.current_binlog_offset().await?;
        debug!(split_id = %split.split_id, low = %low, "chunk snapshot starting");

        // The tail session starts before the select so every change
        // committed during the select is in flight toward the queue.
        let stream = self.binlog.connect(self.server_id, &low).await?;
        let (tx, mut rx) = mpsc::channel(BINLOG_INGEST_QUEUE_SIZE);
        let ingest = tokio::spawn(async move {
            let mut stream = stream;
            while let Some(item) = stream.next().await {
                if tx.send(item).await.is_err() {
                    // consumer finished the chunk
                    break;
                }
            }
        });

        let result = self
            .snapshot_and_drain(&split, &key_indices, low, &mut rx)
            .await;
        ingest.abort();
        result
    }

    async fn snapshot_and_drain(
        &self,
        split: &SnapshotSplit,
        key_indices: &[usize],
        low: BinlogOffset,
        rx: &mut mpsc::Receiver<ConnectorResult<SourceEvent>>,
    ) -> ConnectorResult<SnapshotChunkOutput> {
        let snapshot_rows = self.select_chunk_rows(split, key_indices).await?;

        let high = self.table.current_binlog_offset().await?;
        if high < low {
            return Err(ConnectorError::protocol(format!(
                "high watermark {high} precedes low watermark {low}"
            )));
        }
        debug!(
            split_id = %split.split_id,
            rows = snapshot_rows.len(),
            high = %high,
            "chunk select done, draining the concurrent log slice",
        );

        let log_slice = if high > low {
            Self::drain_until_crossed(rx, &high).await?
        } else {
            // no log activity during the select
            vec![]
        };

        let events = normalize_chunk(split, &low, &high, snapshot_rows, log_slice)?;
        debug!(split_id = %split.split_id, events = events.len(), "chunk normalized");
        Ok(SnapshotChunkOutput {
            split_id: split.split_id.clone(),
            events,
            high_watermark: high,
        })
    }

    /// The chunk select, paged by `fetch.size` through keyset pagination in
    /// split-key order.
    async fn select_chunk_rows(
        &self,
        split: &SnapshotSplit,
        key_indices: &[usize],
    ) -> ConnectorResult<Vec<OwnedRow>> {
        let fetch_size = self.config.fetch_size;
        let mut rows = Vec::new();
        let mut after: Option<SplitKey> = None;
        loop {
            let page = self
                .table
                .snapshot_fetch(split, after.as_ref(), fetch_size)
                .await?;
            let Some(last) = page.last() else { break };
            after = Some(SplitKey::from_datums(last.project(key_indices))?);
            let page_len = page.len();
            rows.extend(page);
            if page_len < fetch_size as usize {
                break;
            }
        }
        Ok(rows)
    }

    /// Drains the ingest queue until the tail crosses `high`. Every event
    /// at-or-before `high` already existed in the log when `high` was read
    /// and arrives in order, so the crossing is deterministic; non-row
    /// events surface as position-only heartbeats, which keeps it
    /// observable.
    async fn drain_until_crossed(
        rx: &mut mpsc::Receiver<ConnectorResult<SourceEvent>>,
        high: &BinlogOffset,
    ) -> ConnectorResult<Vec<ChangeEvent>> {
        let mut slice = Vec::new();
        loop {
            let Some(item) = rx.recv().await else {
                return Err(ConnectorError::protocol(format!(
                    "binlog tail ended before crossing the high watermark {high}"
                )));
            };
            let event = item?;
            let position = event.offset().clone();
            if position > *high {
                break;
            }
            if let SourceEvent::Data(change) = event {
                slice.push(change);
            }
            if position >= *high {
                break;
            }
        }
        Ok(slice)
    }

    /// Stream facade over [`read`](Self::read) for callers that forward
    /// events one by one.
    #[try_stream(boxed, ok = SourceEvent, error = ConnectorError)]
    pub async fn into_stream(self, split: SnapshotSplit) {
        let output = self.read(split).await?;
        for event in output.events {
            yield event;
        }
    }
}
