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

//! Ownership bookkeeping of snapshot chunks and the snapshot→tail hand-off.
//!
//! A chunk is in exactly one of three places: `remaining` (not yet out),
//! `assigned` (exclusively owned by a worker), or `finished` (high watermark
//! reported). The binlog split is emitted only after every chunk is finished
//! *and* the finished set has been made durable by a completed checkpoint,
//! so a post-crash restore can never lose a chunk's watermark.

pub mod chunk;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::base::{ReaderId, SplitId};
use crate::source::mysql::config::{MySqlSourceConfig, StartupMode};
use crate::source::mysql::external::ExternalTableReader;
use crate::source::mysql::offset::{BinlogOffset, StopOffset};
use crate::source::mysql::split::{BinlogSplit, FinishedChunkInfo, MySqlSplit, SnapshotSplit};
use crate::source::mysql::state::{SourceCheckpointState, CHECKPOINT_STATE_VERSION};
use crate::source::mysql::BINLOG_SPLIT_ID;
use rivercdc_common::catalog::{Field, Schema, TableId};

/// Where the binlog tail begins when no snapshot phase precedes it.
#[derive(Debug, Clone)]
struct TailStart {
    offset: BinlogOffset,
    timestamp_ms: Option<i64>,
}

pub struct SnapshotSplitAssigner {
    config: Arc<MySqlSourceConfig>,
    table_id: TableId,

    remaining: VecDeque<SnapshotSplit>,
    assigned: HashMap<SplitId, (ReaderId, SnapshotSplit)>,
    finished: BTreeMap<SplitId, FinishedChunkInfo>,

    /// Finished chunks committed by at least one completed checkpoint.
    durable_finished: HashSet<SplitId>,
    /// Finished set captured per in-flight checkpoint, promoted to durable
    /// on completion.
    pending_checkpoints: BTreeMap<u64, Vec<SplitId>>,

    is_binlog_split_emitted: bool,
    table_schemas: HashMap<TableId, Schema>,
    split_key_fields: Vec<Field>,
    tail_start: Option<TailStart>,
    is_opened: bool,
}

impl SnapshotSplitAssigner {
    pub fn new(config: Arc<MySqlSourceConfig>) -> Self {
        let table_id = TableId::new(&config.database_name, &config.table_name);
        Self {
            config,
            table_id,
            remaining: VecDeque::new(),
            assigned: HashMap::new(),
            finished: BTreeMap::new(),
            durable_finished: HashSet::new(),
            pending_checkpoints: BTreeMap::new(),
            is_binlog_split_emitted: false,
            table_schemas: HashMap::new(),
            split_key_fields: Vec::new(),
            tail_start: None,
            is_opened: false,
        }
    }

    /// Rebuilds the assigner from checkpoint state. Chunks that were out with
    /// a worker go back to `remaining`: workers re-request splits after a
    /// restore, they do not resume chunks.
    pub fn restore(
        config: Arc<MySqlSourceConfig>,
        state: SourceCheckpointState,
    ) -> ConnectorResult<Self> {
        let mut assigner = Self::new(config);
        let has_progress = !state.remaining.is_empty()
            || !state.assigned.is_empty()
            || !state.finished.is_empty()
            || state.is_binlog_split_emitted;
        assigner.remaining = state
            .assigned
            .into_iter()
            .map(|(_, split)| split)
            .chain(state.remaining)
            .collect();
        assigner.finished = state
            .finished
            .into_iter()
            .map(|info| (info.split_id.clone(), info))
            .collect();
        assigner.durable_finished = state.durable_finished.into_iter().collect();
        assigner.is_binlog_split_emitted = state.is_binlog_split_emitted;
        assigner.table_schemas = state.table_schemas;
        assigner.split_key_fields = assigner
            .remaining
            .front()
            .map(|split| split.split_key_fields.clone())
            .unwrap_or_default();
        assigner.is_opened = has_progress;
        Ok(assigner)
    }

    /// Idempotent: plans chunks (or resolves the tail start) on first call,
    /// does nothing afterwards.
    pub async fn open(&mut self, table: &dyn ExternalTableReader) -> ConnectorResult<()> {
        if self.is_opened {
            return Ok(());
        }

        match self.config.startup_mode {
            StartupMode::Initial => self.plan_chunks(table).await?,
            StartupMode::LatestOffset => {
                self.tail_start = Some(TailStart {
                    offset: table.current_binlog_offset().await?,
                    timestamp_ms: None,
                });
            }
            StartupMode::EarliestOffset => {
                self.tail_start = Some(TailStart {
                    offset: table.earliest_binlog_offset().await?,
                    timestamp_ms: None,
                });
            }
            StartupMode::SpecificOffset => {
                let offset = self.config.startup_specific_offset().ok_or_else(|| {
                    ConnectorError::config("specific-offset startup misses the offset")
                })?;
                self.tail_start = Some(TailStart {
                    offset,
                    timestamp_ms: None,
                });
            }
            StartupMode::Timestamp => {
                // The log cannot be addressed by time, so the tail starts at
                // the earliest retained offset and the reader drops events
                // older than the requested instant.
                self.tail_start = Some(TailStart {
                    offset: table.earliest_binlog_offset().await?,
                    timestamp_ms: self.config.startup_timestamp_millis,
                });
            }
        }
        self.is_opened = true;
        Ok(())
    }

    async fn plan_chunks(&mut self, table: &dyn ExternalTableReader) -> ConnectorResult<()> {
        let schema = table.discover_schema(&self.table_id).await?;
        // the split key is the leading primary-key column
        let Some(key_field) = schema.pk_fields().next().cloned() else {
            return Err(ConnectorError::config(format!(
                "parallel snapshot of {} requires a primary key",
                self.table_id
            )));
        };

        let planner = chunk::ChunkPlanner::new(
            &self.table_id,
            &key_field,
            self.config.chunk_size as u64,
        )?;
        let ranges = planner.plan(table).await?;

        self.table_schemas = HashMap::from([(self.table_id.clone(), schema)]);
        self.split_key_fields = vec![key_field];
        self.remaining = ranges
            .into_iter()
            .enumerate()
            .map(|(idx, (start, end))| SnapshotSplit {
                split_id: format!("{}:{}", self.table_id, idx).into(),
                table_id: self.table_id.clone(),
                split_key_fields: self.split_key_fields.clone(),
                split_start: start,
                split_end: end,
                high_watermark: None,
                table_schemas: self.table_schemas.clone(),
            })
            .collect();
        info!(
            table = %self.table_id,
            chunks = self.remaining.len(),
            chunk_size = self.config.chunk_size,
            "planned snapshot chunks",
        );
        Ok(())
    }

    pub fn has_remaining_snapshots(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Whether the binlog split can be handed out: every chunk finished and
    /// durable (or a tail-only startup), and not emitted yet.
    pub fn binlog_ready(&self) -> bool {
        if self.is_binlog_split_emitted || !self.is_opened {
            return false;
        }
        if !self.remaining.is_empty() || !self.assigned.is_empty() {
            return false;
        }
        match self.config.startup_mode {
            StartupMode::Initial => {
                !self.finished.is_empty()
                    && self
                        .finished
                        .keys()
                        .all(|id| self.durable_finished.contains(id))
            }
            _ => self.tail_start.is_some(),
        }
    }

    /// The next split for `reader`: a snapshot chunk while any remain, the
    /// binlog split once the hand-off conditions hold, `None` otherwise (the
    /// caller retries later).
    pub fn next(&mut self, reader: ReaderId) -> Option<MySqlSplit> {
        if let Some(split) = self.remaining.pop_front() {
            debug!(split_id = %split.split_id, reader, "assigning snapshot split");
            self.assigned
                .insert(split.split_id.clone(), (reader, split.clone()));
            return Some(MySqlSplit::Snapshot(split));
        }
        if self.binlog_ready() {
            let split = self.build_binlog_split();
            self.is_binlog_split_emitted = true;
            info!(reader, start_offset = %split.start_offset, "emitting binlog split");
            return Some(MySqlSplit::Binlog(split));
        }
        None
    }

    /// The tail resumes from the earliest point any chunk still needs,
    /// `min(high_watermark)` over all finished chunks.
    fn build_binlog_split(&self) -> BinlogSplit {
        let (start_offset, timestamp_ms) = match self.config.startup_mode {
            StartupMode::Initial => (
                self.finished
                    .values()
                    .map(|info| &info.high_watermark)
                    .min()
                    .cloned()
                    .expect("binlog_ready guarantees a finished chunk"),
                None,
            ),
            _ => {
                let tail = self.tail_start.as_ref().expect("binlog_ready checked");
                (tail.offset.clone(), tail.timestamp_ms)
            }
        };
        BinlogSplit {
            split_id: BINLOG_SPLIT_ID.into(),
            split_key_fields: self.split_key_fields.clone(),
            start_offset,
            stop_offset: StopOffset::Never,
            finished_chunks: self.finished.values().cloned().collect_vec(),
            table_schemas: self.table_schemas.clone(),
            start_timestamp_ms: timestamp_ms,
        }
    }

    /// Moves reported chunks from `assigned` to `finished` and returns the
    /// split ids to ack. Re-reports of already-finished chunks are acked
    /// again without effect.
    pub fn on_finished_splits(
        &mut self,
        high_watermarks: HashMap<SplitId, BinlogOffset>,
    ) -> Vec<SplitId> {
        let mut acks = Vec::with_capacity(high_watermarks.len());
        for (split_id, high_watermark) in high_watermarks {
            if let Some((_, split)) = self.assigned.remove(&split_id) {
                debug!(split_id = %split_id, high_watermark = %high_watermark, "chunk finished");
                self.finished.insert(
                    split_id.clone(),
                    FinishedChunkInfo::from_split(&split, high_watermark),
                );
            } else if !self.finished.contains_key(&split_id) {
                warn!(split_id = %split_id, "finish report for a chunk that is not assigned");
                continue;
            }
            acks.push(split_id);
        }
        acks
    }

    /// Reader loss: the chunks go back unchanged, to be handed out again.
    pub fn add_splits(&mut self, splits: Vec<SnapshotSplit>) {
        for split in splits {
            debug!(split_id = %split.split_id, "returning split to the assigner");
            self.assigned.remove(&split.split_id);
            self.remaining.push_front(split);
        }
    }

    /// Collects everything assigned to a vanished reader back into
    /// `remaining`.
    pub fn on_reader_dropped(&mut self, reader: ReaderId) {
        let lost = self
            .assigned
            .values()
            .filter(|(owner, _)| *owner == reader)
            .map(|(_, split)| split.clone())
            .collect_vec();
        if !lost.is_empty() {
            info!(reader, splits = lost.len(), "reader lost, reclaiming its splits");
            self.add_splits(lost);
        }
    }

    /// True while chunk completion is still outstanding; the enumerator
    /// re-solicits finish reports in this state.
    pub fn waiting_for_finished_splits(&self) -> bool {
        !self.remaining.is_empty() || !self.assigned.is_empty()
    }

    pub fn snapshot_state(&mut self, checkpoint_id: u64) -> SourceCheckpointState {
        self.pending_checkpoints
            .insert(checkpoint_id, self.finished.keys().cloned().collect());
        SourceCheckpointState {
            version: CHECKPOINT_STATE_VERSION,
            remaining: self.remaining.iter().cloned().collect(),
            assigned: self
                .assigned
                .values()
                .map(|(reader, split)| (*reader, split.clone()))
                .collect(),
            finished: self.finished.values().cloned().collect(),
            durable_finished: self.durable_finished.iter().cloned().collect(),
            is_binlog_split_emitted: self.is_binlog_split_emitted,
            table_schemas: self.table_schemas.clone(),
        }
    }

    /// Marks every finished chunk captured by `checkpoint_id` (and any
    /// earlier in-flight checkpoint) durable.
    pub fn notify_checkpoint_complete(&mut self, checkpoint_id: u64) {
        let completed = self
            .pending_checkpoints
            .keys()
            .take_while(|id| **id <= checkpoint_id)
            .copied()
            .collect_vec();
        for id in completed {
            let finished = self.pending_checkpoints.remove(&id).unwrap();
            self.durable_finished.extend(finished);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;
    use crate::source::mysql::external::mock::{
        offset, test_row, test_schema, test_table_id, MockUpstream,
    };

    fn test_config(options: &[(&str, &str)]) -> Arc<MySqlSourceConfig> {
        let mut map: HashMap<String, String> = [
            ("hostname", "localhost"),
            ("username", "repl"),
            ("database-name", "mydb"),
            ("table-name", "t"),
            ("scan.snapshot.parallel-read", "true"),
            ("server-id", "5400-5404"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        for (k, v) in options {
            map.insert((*k).to_owned(), (*v).to_owned());
        }
        Arc::new(MySqlSourceConfig::from_options(map).unwrap())
    }

    fn seeded_upstream(ids: impl IntoIterator<Item = i64>) -> MockUpstream {
        let upstream = MockUpstream::new();
        upstream.put_table(
            test_table_id(),
            test_schema(),
            ids.into_iter().map(|id| test_row(id, "v")).collect(),
        );
        upstream.push_tip(offset(100));
        upstream
    }

    async fn opened_assigner(chunk_size: &str, ids: Vec<i64>) -> SnapshotSplitAssigner {
        let mut assigner =
            SnapshotSplitAssigner::new(test_config(&[("scan.snapshot.chunk.size", chunk_size)]));
        assigner.open(&seeded_upstream(ids)).await.unwrap();
        assigner
    }

    fn finish(assigner: &mut SnapshotSplitAssigner, split_id: &SplitId, pos: u64) -> Vec<SplitId> {
        assigner.on_finished_splits(HashMap::from([(split_id.clone(), offset(pos))]))
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let mut assigner = opened_assigner("2", (1..=4).collect()).await;
        assert_eq!(assigner.remaining.len(), 2);
        assigner.open(&seeded_upstream(1..=4)).await.unwrap();
        assert_eq!(assigner.remaining.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_primary_key_rejected() {
        let upstream = MockUpstream::new();
        upstream.put_table(
            test_table_id(),
            rivercdc_common::catalog::Schema::new(test_schema().fields, vec![]),
            vec![test_row(1, "a")],
        );
        let mut assigner = SnapshotSplitAssigner::new(test_config(&[]));
        assert_matches!(
            assigner.open(&upstream).await,
            Err(ConnectorError::Config(_))
        );
    }

    #[tokio::test]
    async fn test_snapshot_then_checkpointed_binlog_handoff() {
        let mut assigner = opened_assigner("2", (1..=4).collect()).await;

        let first = assigner.next(1).unwrap().into_snapshot().unwrap();
        let second = assigner.next(2).unwrap().into_snapshot().unwrap();
        assert!(assigner.next(1).is_none());
        assert!(assigner.waiting_for_finished_splits());

        let acks = finish(&mut assigner, &first.split_id, 210);
        assert_eq!(acks, vec![first.split_id.clone()]);
        let acks = finish(&mut assigner, &second.split_id, 190);
        assert_eq!(acks, vec![second.split_id.clone()]);
        assert!(!assigner.waiting_for_finished_splits());

        // all finished, but no completed checkpoint covers them yet
        assert!(!assigner.binlog_ready());
        assert!(assigner.next(1).is_none());

        let state = assigner.snapshot_state(7);
        assert_eq!(state.finished.len(), 2);
        assigner.notify_checkpoint_complete(7);
        assert!(assigner.binlog_ready());

        let binlog = assigner.next(1).unwrap().into_binlog().unwrap();
        // safe resume: min over the reported high watermarks
        assert_eq!(binlog.start_offset, offset(190));
        assert_eq!(binlog.finished_chunks.len(), 2);
        assert_eq!(binlog.stop_offset, StopOffset::Never);

        // emitted exactly once
        assert!(assigner.next(1).is_none());
    }

    #[tokio::test]
    async fn test_finish_report_is_idempotent() {
        let mut assigner = opened_assigner("8096", (1..=3).collect()).await;
        let split = assigner.next(1).unwrap().into_snapshot().unwrap();

        let acks = finish(&mut assigner, &split.split_id, 150);
        assert_eq!(acks.len(), 1);
        // the duplicate report (lost ack) is acked again, nothing moves
        let acks = finish(&mut assigner, &split.split_id, 150);
        assert_eq!(acks, vec![split.split_id.clone()]);
        assert_eq!(assigner.finished.len(), 1);

        // a report for a chunk nobody owns is not acked
        let acks = finish(&mut assigner, &SplitId::from("mydb.t:99"), 150);
        assert!(acks.is_empty());
    }

    #[tokio::test]
    async fn test_reader_loss_returns_splits() {
        let mut assigner = opened_assigner("2", (1..=4).collect()).await;
        let split = assigner.next(1).unwrap().into_snapshot().unwrap();
        assert_eq!(assigner.remaining.len(), 1);

        assigner.on_reader_dropped(1);
        assert_eq!(assigner.remaining.len(), 2);
        assert!(assigner.assigned.is_empty());

        // the chunk can be assigned again, unchanged
        let reassigned = assigner.next(2).unwrap().into_snapshot().unwrap();
        assert_eq!(reassigned.split_id, split.split_id);
        assert_eq!(reassigned.split_start, split.split_start);
        assert_eq!(reassigned.split_end, split.split_end);
    }

    #[tokio::test]
    async fn test_restore_returns_assigned_to_remaining() {
        let mut assigner = opened_assigner("2", (1..=4).collect()).await;
        let first = assigner.next(1).unwrap().into_snapshot().unwrap();
        finish(&mut assigner, &first.split_id, 180);
        let _second = assigner.next(2).unwrap();

        let state = assigner.snapshot_state(3);
        assigner.notify_checkpoint_complete(3);

        let mut restored =
            SnapshotSplitAssigner::restore(test_config(&[("scan.snapshot.chunk.size", "2")]), state)
                .unwrap();
        // the chunk that was out with reader 2 is assignable again
        assert!(restored.has_remaining_snapshots());
        let replayed = restored.next(5).unwrap().into_snapshot().unwrap();
        finish(&mut restored, &replayed.split_id, 240);

        restored.snapshot_state(4);
        restored.notify_checkpoint_complete(4);
        let binlog = restored.next(5).unwrap().into_binlog().unwrap();
        assert_eq!(binlog.start_offset, offset(180));
    }

    #[tokio::test]
    async fn test_latest_offset_startup_skips_snapshot() {
        let mut assigner = SnapshotSplitAssigner::new(test_config(&[(
            "scan.startup.mode",
            "latest-offset",
        )]));
        let upstream = seeded_upstream(1..=4);
        assigner.open(&upstream).await.unwrap();

        assert!(!assigner.has_remaining_snapshots());
        let binlog = assigner.next(1).unwrap().into_binlog().unwrap();
        assert_eq!(binlog.start_offset, offset(100));
        assert!(binlog.finished_chunks.is_empty());
    }
}
