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

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

/// A totally ordered position in the upstream binary log.
///
/// Binlog files are sequentially numbered with a zero-padded numeric suffix
/// (`binlog.000001`, `binlog.000002`, …), so the lexicographic order on the
/// filename followed by the numeric order on the in-file position is the log
/// order.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct BinlogOffset {
    pub filename: String,
    pub position: u64,
}

impl BinlogOffset {
    pub fn new(filename: impl Into<String>, position: u64) -> Self {
        Self {
            filename: filename.into(),
            position,
        }
    }

    /// The position before the first event of the first log file.
    pub fn initial() -> Self {
        Self::default()
    }
}

impl fmt::Display for BinlogOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.position)
    }
}

impl FromStr for BinlogOffset {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (filename, position) = s
            .rsplit_once(':')
            .ok_or_else(|| ConnectorError::config(format!("malformed binlog offset: {s}")))?;
        let position = position
            .parse()
            .map_err(|_| ConnectorError::config(format!("malformed binlog position: {s}")))?;
        Ok(Self {
            filename: filename.to_owned(),
            position,
        })
    }
}

/// Where a binlog tail stops.
///
/// The upstream encodes "never stop" as a sentinel position that collides
/// with the natural order of offsets, so the stop condition is a variant of
/// its own and comparison short-circuits on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StopOffset {
    #[default]
    Never,
    At(BinlogOffset),
}

impl StopOffset {
    /// Whether an event ending at `offset` lies beyond the stop position.
    /// Events ending exactly at the stop position are still within bounds.
    pub fn is_passed_by(&self, offset: &BinlogOffset) -> bool {
        match self {
            Self::Never => false,
            Self::At(stop) => offset > stop,
        }
    }
}
