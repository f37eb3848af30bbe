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

//! A deterministic in-memory upstream for tests: scripted binlog, scripted
//! tip offsets, and a snapshot view that may deliberately lag behind the
//! "current" rows to reproduce writes concurrent with a chunk select.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use rivercdc_common::catalog::{Field, Schema, TableId};
use rivercdc_common::row::OwnedRow;
use rivercdc_common::types::ScalarImpl;

use super::{
    BinlogConnect, BoxSourceEventStream, ExternalTableReader, KeyCursor, SplitKeyStats,
};
use crate::error::{ConnectorError, ConnectorResult};
use crate::source::mysql::event::{ChangeEvent, ChangeOp, SourceEvent};
use crate::source::mysql::offset::BinlogOffset;
use crate::source::mysql::split::{range_contains, SnapshotSplit, SplitKey};

#[derive(Default)]
struct Inner {
    schemas: HashMap<TableId, Schema>,
    rows: HashMap<TableId, BTreeMap<SplitKey, OwnedRow>>,
    /// What the chunk select observes; falls back to `rows` when absent.
    snapshot_view: HashMap<TableId, BTreeMap<SplitKey, OwnedRow>>,
    log: Vec<SourceEvent>,
    /// Scripted responses to `current_binlog_offset`, drained front-first;
    /// the last one sticks.
    tips: VecDeque<BinlogOffset>,
}

/// Shared handle acting as both the table reader and the binlog connector.
#[derive(Clone, Default)]
pub(crate) struct MockUpstream {
    inner: Arc<Mutex<Inner>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_table(&self, table_id: TableId, schema: Schema, rows: Vec<OwnedRow>) {
        let mut inner = self.inner.lock();
        let key_indices = schema.pk_indices.clone();
        let keyed = rows
            .into_iter()
            .map(|row| (SplitKey(row.project(&key_indices).into_iter().flatten().collect()), row))
            .collect();
        inner.schemas.insert(table_id.clone(), schema);
        inner.rows.insert(table_id, keyed);
    }

    /// Pins the rows a snapshot select observes, independently of `rows`.
    pub fn set_snapshot_view(&self, table_id: TableId, rows: Vec<OwnedRow>) {
        let mut inner = self.inner.lock();
        let key_indices = inner.schemas[&table_id].pk_indices.clone();
        let keyed = rows
            .into_iter()
            .map(|row| (SplitKey(row.project(&key_indices).into_iter().flatten().collect()), row))
            .collect();
        inner.snapshot_view.insert(table_id, keyed);
    }

    pub fn push_tip(&self, offset: BinlogOffset) {
        self.inner.lock().tips.push_back(offset);
    }

    pub fn append_log(&self, event: SourceEvent) {
        self.inner.lock().log.push(event);
    }

    pub fn binlog(&self) -> Arc<dyn BinlogConnect> {
        Arc::new(MockBinlog {
            inner: self.inner.clone(),
        })
    }
}

#[async_trait]
impl ExternalTableReader for MockUpstream {
    async fn discover_schema(&self, table_id: &TableId) -> ConnectorResult<Schema> {
        self.inner
            .lock()
            .schemas
            .get(table_id)
            .cloned()
            .ok_or_else(|| ConnectorError::config(format!("unknown table {table_id}")))
    }

    async fn current_binlog_offset(&self) -> ConnectorResult<BinlogOffset> {
        let mut inner = self.inner.lock();
        if inner.tips.len() > 1 {
            Ok(inner.tips.pop_front().unwrap())
        } else {
            inner
                .tips
                .front()
                .cloned()
                .ok_or_else(|| ConnectorError::protocol("mock has no scripted tip"))
        }
    }

    async fn earliest_binlog_offset(&self) -> ConnectorResult<BinlogOffset> {
        Ok(BinlogOffset::new("binlog.000001", 4))
    }

    async fn split_key_stats(
        &self,
        table_id: &TableId,
        _key_field: &Field,
    ) -> ConnectorResult<SplitKeyStats> {
        let inner = self.inner.lock();
        let rows = inner.rows.get(table_id);
        let first_component = |key: &SplitKey| key.0.first().cloned();
        Ok(SplitKeyStats {
            min: rows.and_then(|r| r.keys().next().and_then(first_component)),
            max: rows.and_then(|r| r.keys().next_back().and_then(first_component)),
            row_count: rows.map_or(0, |r| r.len() as u64),
        })
    }

    fn key_cursor(&self, table_id: &TableId, _key_field: &Field) -> Box<dyn KeyCursor> {
        Box::new(MockKeyCursor {
            inner: self.inner.clone(),
            table_id: table_id.clone(),
        })
    }

    async fn snapshot_fetch(
        &self,
        split: &SnapshotSplit,
        after: Option<&SplitKey>,
        limit: u32,
    ) -> ConnectorResult<Vec<OwnedRow>> {
        let inner = self.inner.lock();
        let view = inner
            .snapshot_view
            .get(&split.table_id)
            .or_else(|| inner.rows.get(&split.table_id))
            .ok_or_else(|| ConnectorError::config(format!("unknown table {}", split.table_id)))?;
        Ok(view
            .iter()
            .filter(|(key, _)| split.covers(key))
            .filter(|(key, _)| after.map_or(true, |a| *key > a))
            .take(limit as usize)
            .map(|(_, row)| row.clone())
            .collect())
    }
}

struct MockKeyCursor {
    inner: Arc<Mutex<Inner>>,
    table_id: TableId,
}

#[async_trait]
impl KeyCursor for MockKeyCursor {
    async fn next_boundary(
        &self,
        last: Option<&SplitKey>,
        step: u64,
    ) -> ConnectorResult<Option<SplitKey>> {
        let inner = self.inner.lock();
        let Some(rows) = inner.rows.get(&self.table_id) else {
            return Ok(None);
        };
        Ok(rows
            .keys()
            .filter(|key| last.map_or(true, |l| *key > l))
            .nth(step as usize - 1)
            .cloned())
    }
}

struct MockBinlog {
    inner: Arc<Mutex<Inner>>,
}

#[async_trait]
impl BinlogConnect for MockBinlog {
    async fn connect(
        &self,
        _server_id: u32,
        start: &BinlogOffset,
    ) -> ConnectorResult<BoxSourceEventStream> {
        let events: Vec<_> = self
            .inner
            .lock()
            .log
            .iter()
            .filter(|ev| ev.offset() > start)
            .cloned()
            .map(Ok)
            .collect();
        Ok(futures::stream::iter(events).boxed())
    }
}

// Shorthands shared by the protocol tests.

pub(crate) fn test_table_id() -> TableId {
    TableId::new("mydb", "t")
}

pub(crate) fn test_schema() -> Schema {
    Schema::new(
        vec![
            Field::new("id", rivercdc_common::types::DataType::Int64),
            Field::new("v", rivercdc_common::types::DataType::Varchar),
        ],
        vec![0],
    )
}

pub(crate) fn test_row(id: i64, v: &str) -> OwnedRow {
    OwnedRow::new(vec![
        Some(ScalarImpl::Int64(id)),
        Some(ScalarImpl::from(v)),
    ])
}

pub(crate) fn offset(pos: u64) -> BinlogOffset {
    BinlogOffset::new("binlog.000001", pos)
}

pub(crate) fn insert_event(id: i64, v: &str, pos: u64) -> SourceEvent {
    SourceEvent::Data(ChangeEvent {
        table_id: test_table_id(),
        op: ChangeOp::Create,
        before: None,
        after: Some(test_row(id, v)),
        offset: offset(pos),
        source_ts_ms: pos as i64,
    })
}

pub(crate) fn update_event(id: i64, old: &str, new: &str, pos: u64) -> SourceEvent {
    SourceEvent::Data(ChangeEvent {
        table_id: test_table_id(),
        op: ChangeOp::Update,
        before: Some(test_row(id, old)),
        after: Some(test_row(id, new)),
        offset: offset(pos),
        source_ts_ms: pos as i64,
    })
}

pub(crate) fn delete_event(id: i64, v: &str, pos: u64) -> SourceEvent {
    SourceEvent::Data(ChangeEvent {
        table_id: test_table_id(),
        op: ChangeOp::Delete,
        before: Some(test_row(id, v)),
        after: None,
        offset: offset(pos),
        source_ts_ms: pos as i64,
    })
}

pub(crate) fn heartbeat(pos: u64) -> SourceEvent {
    SourceEvent::Heartbeat { offset: offset(pos) }
}

/// Checks the chunk-coverage invariant: ranges tile the key space with the
/// first start and last end unbounded and adjacent boundaries shared.
pub(crate) fn assert_ranges_cover(ranges: &[(Option<SplitKey>, Option<SplitKey>)]) {
    assert!(!ranges.is_empty());
    assert!(ranges.first().unwrap().0.is_none());
    assert!(ranges.last().unwrap().1.is_none());
    for window in ranges.windows(2) {
        let (_, end) = &window[0];
        let (start, _) = &window[1];
        assert_eq!(end.as_ref(), start.as_ref(), "ranges must tile the key space");
        assert!(end.is_some());
    }
}

/// Every key must fall in exactly one range.
pub(crate) fn assert_exactly_one_range(
    ranges: &[(Option<SplitKey>, Option<SplitKey>)],
    key: &SplitKey,
) {
    let covering = ranges
        .iter()
        .filter(|(start, end)| range_contains(start.as_ref(), end.as_ref(), key))
        .count();
    assert_eq!(covering, 1, "key {key:?} covered by {covering} ranges");
}
