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

//! Planner↔worker events. The host runtime only transports them, so every
//! variant is serializable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::source::base::SplitId;
use crate::source::mysql::offset::BinlogOffset;
use crate::source::mysql::split::{MySqlSplit, SnapshotSplit};

/// Worker → planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReaderEvent {
    /// The worker is idle and wants a split.
    SplitRequest,
    /// Chunks the worker finished, with their high watermarks. Re-sent until
    /// acked; the assigner dedupes on split id.
    FinishReport {
        high_watermarks: HashMap<SplitId, BinlogOffset>,
    },
    /// The worker gives splits back untouched (graceful shutdown, rebalance).
    SplitAddback { splits: Vec<SnapshotSplit> },
}

/// Planner → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnumeratorEvent {
    SplitAssignment { split: MySqlSplit },
    /// Terminal per chunk: the worker drops the report from its retry list.
    FinishAck { split_ids: Vec<SplitId> },
    /// Broadcast when finish reports may have been lost; workers re-report
    /// anything unacked.
    FinishSolicit,
}
