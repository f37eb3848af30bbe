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

//! The consistency core: folds the log slice captured between a chunk's low
//! and high watermark into the chunk's snapshot rows, yielding the state of
//! the key range as of the high watermark.

use indexmap::IndexMap;
use rivercdc_common::row::OwnedRow;

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::mysql::event::{
    ChangeEvent, ChangeOp, SourceEvent, WatermarkKind,
};
use crate::source::mysql::offset::BinlogOffset;
use crate::source::mysql::reader::split_key_indices;
use crate::source::mysql::split::{SnapshotSplit, SplitKey};

/// Merges `snapshot_rows` (the chunk select, in key order) with `log_slice`
/// (the concurrent changes between the low and high watermark, in arrival
/// order) into the framed output `[Low, replayed…, remaining snapshot…,
/// High]`.
///
/// A replayed record supersedes the snapshot image of its key. A DELETE for
/// a key that neither the snapshot nor the replay has seen means the slice
/// and the select disagree; that is unrecoverable for the chunk and fails
/// fast. READ records cannot appear in a log stream at all.
pub(crate) fn normalize_chunk(
    split: &SnapshotSplit,
    low: &BinlogOffset,
    high: &BinlogOffset,
    snapshot_rows: Vec<OwnedRow>,
    log_slice: Vec<ChangeEvent>,
) -> ConnectorResult<Vec<SourceEvent>> {
    let schema = split.schema()?;
    let pk_indices = &schema.pk_indices;
    let range_indices = split_key_indices(&split.split_key_fields, schema)?;

    let mut by_key: IndexMap<SplitKey, ChangeEvent> = snapshot_rows
        .into_iter()
        .map(|row| {
            let key = SplitKey::from_datums(row.project(pk_indices))?;
            let read = ChangeEvent {
                table_id: split.table_id.clone(),
                op: ChangeOp::Read,
                before: None,
                after: Some(row),
                offset: high.clone(),
                source_ts_ms: 0,
            };
            Ok((key, read))
        })
        .collect::<ConnectorResult<_>>()?;

    let mut replayed: IndexMap<SplitKey, ChangeEvent> = IndexMap::new();

    for event in log_slice {
        if event.table_id != split.table_id {
            continue;
        }
        // events for keys outside the chunk belong to other chunks or to the
        // binlog tail
        if !split.covers(&event.split_key(&range_indices)?) {
            continue;
        }
        let key = event.split_key(pk_indices)?;
        match event.op {
            ChangeOp::Create => {
                by_key.shift_remove(&key);
                replayed.insert(key, event);
            }
            ChangeOp::Update => {
                by_key.shift_remove(&key);
                let synthetic_read = ChangeEvent {
                    table_id: event.table_id,
                    op: ChangeOp::Read,
                    before: None,
                    after: event.after,
                    // the row is reported as observed at the high watermark
                    offset: high.clone(),
                    source_ts_ms: event.source_ts_ms,
                };
                replayed.insert(key, synthetic_read);
            }
            ChangeOp::Delete => {
                let known = by_key.shift_remove(&key).is_some()
                    | replayed.shift_remove(&key).is_some();
                if !known {
                    return Err(ConnectorError::consistency(format!(
                        "delete at {} for key {:?} unknown to chunk {}",
                        event.offset, key, split.split_id
                    )));
                }
            }
            ChangeOp::Read => {
                return Err(ConnectorError::protocol(format!(
                    "READ record at {} in the log stream",
                    event.offset
                )));
            }
        }
    }

    let mut output = Vec::with_capacity(replayed.len() + by_key.len() + 2);
    output.push(SourceEvent::Watermark {
        split_id: split.split_id.clone(),
        kind: WatermarkKind::Low,
        offset: low.clone(),
    });
    output.extend(replayed.into_values().map(SourceEvent::Data));
    output.extend(by_key.into_values().map(SourceEvent::Data));
    output.push(SourceEvent::Watermark {
        split_id: split.split_id.clone(),
        kind: WatermarkKind::High,
        offset: high.clone(),
    });
    Ok(output)
}
