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

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Data types of the upstream columns the connector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int16,
    Int32,
    Int64,
    Float64,
    Decimal,
    Varchar,
    Bytea,
    Timestamp,
}

impl DataType {
    /// Whether the analytical chunk-split fast path applies: the type is an
    /// integer whose values can be stepped arithmetically.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Whether a column of this type may serve as a split-key column. Types
    /// without a well-defined natural order are rejected at planning time.
    pub fn is_orderable_key(&self) -> bool {
        matches!(
            self,
            Self::Int16 | Self::Int32 | Self::Int64 | Self::Decimal | Self::Varchar | Self::Timestamp
        )
    }
}

/// An owned scalar value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarImpl {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Decimal(Decimal),
    Utf8(String),
    Bytea(Vec<u8>),
    Timestamp(NaiveDateTime),
}

/// A nullable scalar.
pub type Datum = Option<ScalarImpl>;

impl ScalarImpl {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Boolean,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Decimal(_) => DataType::Decimal,
            Self::Utf8(_) => DataType::Varchar,
            Self::Bytea(_) => DataType::Bytea,
            Self::Timestamp(_) => DataType::Timestamp,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Int16(v) => Some(*v as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int16(_) => 1,
            Self::Int32(_) => 2,
            Self::Int64(_) => 3,
            Self::Float64(_) => 4,
            Self::Decimal(_) => 5,
            Self::Utf8(_) => 6,
            Self::Bytea(_) => 7,
            Self::Timestamp(_) => 8,
        }
    }
}

impl fmt::Display for ScalarImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::Bytea(v) => write!(f, "\\x{}", v.iter().map(|b| format!("{b:02x}")).collect::<String>()),
            Self::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

impl PartialEq for ScalarImpl {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScalarImpl {}

/// Total order. Integer variants compare by numeric value across widths so
/// that a boundary read back as `Int32` still orders against an `Int64` key;
/// otherwise values of different types order by variant. The split planner
/// only ever compares values of one key column, so the cross-variant arm is
/// a tie-break, not a semantic order.
impl Ord for ScalarImpl {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Float64(a), Self::Float64(b)) => a.total_cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => a.cmp(b),
            (Self::Utf8(a), Self::Utf8(b)) => a.cmp(b),
            (Self::Bytea(a), Self::Bytea(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            _ => match (self.as_integer(), other.as_integer()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => self.variant_rank().cmp(&other.variant_rank()),
            },
        }
    }
}

impl PartialOrd for ScalarImpl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for ScalarImpl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Bool(v) => v.hash(state),
            // integers hash by widened value to stay consistent with `Ord`
            Self::Int16(v) => (*v as i64).hash(state),
            Self::Int32(v) => (*v as i64).hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.to_bits().hash(state),
            Self::Decimal(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
            Self::Bytea(v) => v.hash(state),
            Self::Timestamp(v) => v.hash(state),
        }
    }
}

impl From<i64> for ScalarImpl {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<&str> for ScalarImpl {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_owned())
    }
}
