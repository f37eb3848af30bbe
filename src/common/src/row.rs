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

use serde::{Deserialize, Serialize};

use crate::types::Datum;

/// An owned row of nullable scalars, in the column order of the table schema
/// it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OwnedRow(Vec<Datum>);

impl OwnedRow {
    pub fn new(values: Vec<Datum>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn datum_at(&self, index: usize) -> &Datum {
        &self.0[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Datum> + '_ {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Datum> {
        self.0
    }

    /// Projects the datums at `indices`, cloning them in the given order.
    /// Used to extract primary-key tuples from full rows.
    pub fn project(&self, indices: &[usize]) -> Vec<Datum> {
        indices.iter().map(|idx| self.0[*idx].clone()).collect()
    }
}

impl From<Vec<Datum>> for OwnedRow {
    fn from(values: Vec<Datum>) -> Self {
        Self(values)
    }
}

impl FromIterator<Datum> for OwnedRow {
    fn from_iter<T: IntoIterator<Item = Datum>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
