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

pub mod binlog;
pub mod normalize;
pub mod snapshot;

use rivercdc_common::catalog::{Field, Schema};

use crate::error::{ConnectorError, ConnectorResult};

/// Resolves the split-key columns against a table schema.
pub(crate) fn split_key_indices(
    key_fields: &[Field],
    schema: &Schema,
) -> ConnectorResult<Vec<usize>> {
    key_fields
        .iter()
        .map(|field| {
            schema.field_index(&field.name).ok_or_else(|| {
                ConnectorError::protocol(format!(
                    "split-key column `{}` missing from the table schema",
                    field.name
                ))
            })
        })
        .collect()
}
