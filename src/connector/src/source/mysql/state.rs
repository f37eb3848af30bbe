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

use rivercdc_common::catalog::{Schema, TableId};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::base::{ReaderId, SplitId};
use crate::source::mysql::split::{FinishedChunkInfo, SnapshotSplit};

pub const CHECKPOINT_STATE_VERSION: u32 = 1;

/// The assigner's persisted checkpoint state. The version tag leads the
/// encoding so future layouts can be told apart on restore.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCheckpointState {
    pub version: u32,
    pub remaining: Vec<SnapshotSplit>,
    pub assigned: Vec<(ReaderId, SnapshotSplit)>,
    pub finished: Vec<FinishedChunkInfo>,
    /// Finished chunks already covered by a completed checkpoint.
    pub durable_finished: Vec<SplitId>,
    pub is_binlog_split_emitted: bool,
    #[serde_as(as = "Vec<(_, _)>")]
    pub table_schemas: HashMap<TableId, Schema>,
}

impl SourceCheckpointState {
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap()
    }

    pub fn restore_from_bytes(bytes: &[u8]) -> ConnectorResult<Self> {
        #[derive(Deserialize)]
        struct VersionProbe {
            version: u32,
        }
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| ConnectorError::protocol(format!("undecodable checkpoint state: {e}")))?;
        match probe.version {
            CHECKPOINT_STATE_VERSION => serde_json::from_slice(bytes).map_err(|e| {
                ConnectorError::protocol(format!("undecodable checkpoint state: {e}"))
            }),
            other => Err(ConnectorError::protocol(format!(
                "unsupported checkpoint state version {other}"
            ))),
        }
    }
}
