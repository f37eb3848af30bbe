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

use std::sync::Arc;

use crate::error::ConnectorResult;

/// Unique identifier of a split within a job.
pub type SplitId = Arc<str>;

/// Identifier of a registered source worker. Ordering is meaningful: the
/// enumerator breaks ties toward the least id.
pub type ReaderId = u32;

/// The metadata of a split, as persisted into checkpoint state.
pub trait SplitMetaData: Sized {
    fn id(&self) -> SplitId;

    fn encode_to_json(&self) -> serde_json::Value;

    fn restore_from_json(value: serde_json::Value) -> ConnectorResult<Self>;
}
