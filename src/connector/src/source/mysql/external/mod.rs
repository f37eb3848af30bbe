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

//! The abstract services the split protocol consumes: snapshot reads and
//! statistics over the monitored table, and the binlog tail session. The
//! protocol core never talks SQL directly, so tests substitute the
//! deterministic in-memory upstream in [`mock`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use rivercdc_common::catalog::{Field, Schema, TableId};
use rivercdc_common::row::OwnedRow;
use rivercdc_common::types::ScalarImpl;

use crate::error::ConnectorResult;
use crate::source::mysql::event::SourceEvent;
use crate::source::mysql::offset::BinlogOffset;
use crate::source::mysql::split::{SnapshotSplit, SplitKey};

#[cfg(test)]
pub(crate) mod mock;
pub mod mysql;

pub type BoxSourceEventStream = BoxStream<'static, ConnectorResult<SourceEvent>>;

/// Split-key statistics backing the analytical chunk-split fast path.
#[derive(Debug, Clone)]
pub struct SplitKeyStats {
    pub min: Option<ScalarImpl>,
    pub max: Option<ScalarImpl>,
    pub row_count: u64,
}

/// Produces chunk boundaries by stepping through the key space, one bounded
/// key-skip query at a time. Tests inject deterministic key sequences by
/// implementing this without SQL.
#[async_trait]
pub trait KeyCursor: Send + Sync {
    /// The key `step` rows past `last` (exclusive) in key order, or `None`
    /// when fewer than `step` rows remain.
    async fn next_boundary(
        &self,
        last: Option<&SplitKey>,
        step: u64,
    ) -> ConnectorResult<Option<SplitKey>>;
}

/// Read-side surface of the monitored database.
#[async_trait]
pub trait ExternalTableReader: Send + Sync {
    async fn discover_schema(&self, table_id: &TableId) -> ConnectorResult<Schema>;

    /// The current tip of the binary log.
    async fn current_binlog_offset(&self) -> ConnectorResult<BinlogOffset>;

    /// The start of the earliest retained binary log file.
    async fn earliest_binlog_offset(&self) -> ConnectorResult<BinlogOffset>;

    async fn split_key_stats(
        &self,
        table_id: &TableId,
        key_field: &Field,
    ) -> ConnectorResult<SplitKeyStats>;

    fn key_cursor(&self, table_id: &TableId, key_field: &Field) -> Box<dyn KeyCursor>;

    /// One page of the chunk's snapshot select: rows of the split's range in
    /// key order, strictly after `after`, at most `limit` of them.
    async fn snapshot_fetch(
        &self,
        split: &SnapshotSplit,
        after: Option<&SplitKey>,
        limit: u32,
    ) -> ConnectorResult<Vec<OwnedRow>>;
}

pub type ExternalTableReaderRef = Arc<dyn ExternalTableReader>;

/// Opens binlog tail sessions. Each call registers a fresh log client under
/// `server_id` and replays everything after `start`.
#[async_trait]
pub trait BinlogConnect: Send + Sync {
    async fn connect(
        &self,
        server_id: u32,
        start: &BinlogOffset,
    ) -> ConnectorResult<BoxSourceEventStream>;
}

pub type BinlogConnectRef = Arc<dyn BinlogConnect>;
