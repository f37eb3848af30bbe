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

use rivercdc_common::catalog::{Schema, TableId};
use rivercdc_common::row::OwnedRow;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::base::SplitId;
use crate::source::mysql::offset::BinlogOffset;
use crate::source::mysql::split::SplitKey;

/// Row-operation kinds. Matching is exhaustive everywhere so a new variant
/// fails compilation without handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    /// An insert observed in the binlog.
    Create,
    /// An update observed in the binlog; carries both images.
    Update,
    /// A delete observed in the binlog; carries the before image.
    Delete,
    /// A row materialized by a snapshot read (or synthesized by the
    /// normalizer); carries the after image only.
    Read,
}

/// A single per-row change, the unit of the downstream stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table_id: TableId,
    pub op: ChangeOp,
    pub before: Option<OwnedRow>,
    pub after: Option<OwnedRow>,
    pub offset: BinlogOffset,
    /// Commit timestamp reported by the upstream, in milliseconds.
    pub source_ts_ms: i64,
}

impl ChangeEvent {
    /// The row image that identifies the event: the before image for deletes,
    /// the after image otherwise.
    pub fn identifying_row(&self) -> ConnectorResult<&OwnedRow> {
        let row = match self.op {
            ChangeOp::Delete => self.before.as_ref(),
            ChangeOp::Create | ChangeOp::Update | ChangeOp::Read => self.after.as_ref(),
        };
        row.ok_or_else(|| {
            ConnectorError::protocol(format!(
                "{:?} event at {} misses its row image",
                self.op, self.offset
            ))
        })
    }

    /// Extracts the split key of the event under `schema`, projecting the
    /// columns at `key_indices`.
    pub fn split_key(&self, key_indices: &[usize]) -> ConnectorResult<SplitKey> {
        SplitKey::from_datums(self.identifying_row()?.project(key_indices))
    }
}

/// A DDL statement observed in the binlog. The schema is attached when the
/// upstream surface can resolve it; the tail reader folds it into its
/// in-memory schema map either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChangeEvent {
    pub table_id: TableId,
    pub ddl: String,
    pub schema: Option<Schema>,
    pub offset: BinlogOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatermarkKind {
    Low,
    High,
}

/// Everything a split reader emits downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceEvent {
    Data(ChangeEvent),
    SchemaChange(SchemaChangeEvent),
    /// A position-only event: the log advanced without a row change. Keeps
    /// the resume offset moving during quiet periods and makes watermark
    /// crossings observable.
    Heartbeat { offset: BinlogOffset },
    /// Frames the normalized output of a snapshot chunk.
    Watermark {
        split_id: SplitId,
        kind: WatermarkKind,
        offset: BinlogOffset,
    },
}

impl SourceEvent {
    pub fn offset(&self) -> &BinlogOffset {
        match self {
            Self::Data(ev) => &ev.offset,
            Self::SchemaChange(ev) => &ev.offset,
            Self::Heartbeat { offset } => offset,
            Self::Watermark { offset, .. } => offset,
        }
    }
}
