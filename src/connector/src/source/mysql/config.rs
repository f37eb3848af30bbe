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
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};

use crate::error::{ConnectorError, ConnectorResult};
use crate::source::base::ReaderId;
use crate::source::mysql::offset::BinlogOffset;

fn default_port() -> u16 {
    3306
}

fn default_server_time_zone() -> String {
    "UTC".to_owned()
}

fn default_chunk_size() -> u32 {
    8096
}

fn default_fetch_size() -> u32 {
    1024
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Where the stream begins relative to the upstream log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartupMode {
    /// Full snapshot, then tail from the snapshot's watermarks.
    #[default]
    Initial,
    /// Tail from the beginning of the retained log, no snapshot.
    EarliestOffset,
    /// Tail from the current tip, no snapshot.
    LatestOffset,
    /// Tail from a user-supplied `(file, pos)`, no snapshot.
    SpecificOffset,
    /// Tail from the earliest retained offset, dropping events whose source
    /// timestamp precedes the requested instant.
    Timestamp,
}

/// The log-client id, either a single id or an inclusive range `A-B` from
/// which worker `i` picks `A + i`. Parallel reading requires the range form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerIdRange {
    pub start: u32,
    pub end: u32,
}

impl ServerIdRange {
    pub fn is_range(&self) -> bool {
        self.end > self.start
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn server_id_for(&self, reader: ReaderId) -> ConnectorResult<u32> {
        self.start
            .checked_add(reader)
            .filter(|id| *id <= self.end)
            .ok_or_else(|| {
                ConnectorError::config(format!(
                    "server-id range {self} does not cover reader {reader}"
                ))
            })
    }
}

impl fmt::Display for ServerIdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_range() {
            write!(f, "{}-{}", self.start, self.end)
        } else {
            write!(f, "{}", self.start)
        }
    }
}

impl FromStr for ServerIdRange {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| ConnectorError::config(format!("malformed server-id: {s}")))
        };
        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (parse(start)?, parse(end)?),
            None => {
                let id = parse(s)?;
                (id, id)
            }
        };
        if end < start {
            return Err(ConnectorError::config(format!(
                "server-id range is inverted: {s}"
            )));
        }
        Ok(Self { start, end })
    }
}

/// Connector options, deserialized from the flat string-keyed `WITH` map the
/// host runtime hands over.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlSourceConfig {
    pub hostname: String,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(rename = "database-name")]
    pub database_name: String,

    #[serde(rename = "table-name")]
    pub table_name: String,

    /// Session timezone used for temporal decoding.
    #[serde(rename = "server-time-zone", default = "default_server_time_zone")]
    pub server_time_zone: String,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "server-id", default)]
    pub server_id: Option<ServerIdRange>,

    /// Enables the split-based parallel snapshot protocol.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "scan.snapshot.parallel-read", default)]
    pub parallel_read: bool,

    /// Target rows per snapshot chunk.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "scan.snapshot.chunk.size", default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Rows fetched per snapshot poll.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "scan.snapshot.fetch.size", default = "default_fetch_size")]
    pub fetch_size: u32,

    #[serde(
        rename = "connect.timeout",
        default = "default_connect_timeout",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub connect_timeout: Duration,

    #[serde(rename = "scan.startup.mode", default)]
    pub startup_mode: StartupMode,

    #[serde(rename = "scan.startup.specific-offset.file", default)]
    pub startup_specific_offset_file: Option<String>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "scan.startup.specific-offset.pos", default)]
    pub startup_specific_offset_pos: Option<u64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "scan.startup.timestamp-millis", default)]
    pub startup_timestamp_millis: Option<i64>,
}

impl MySqlSourceConfig {
    pub fn from_options(options: HashMap<String, String>) -> ConnectorResult<Self> {
        let config: Self = serde_json::from_value(serde_json::to_value(options).unwrap())
            .map_err(|e| ConnectorError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConnectorResult<()> {
        match self.startup_mode {
            StartupMode::SpecificOffset => {
                if self.startup_specific_offset_file.is_none()
                    || self.startup_specific_offset_pos.is_none()
                {
                    return Err(ConnectorError::config(
                        "scan.startup.mode = specific-offset requires \
                         scan.startup.specific-offset.file and scan.startup.specific-offset.pos",
                    ));
                }
            }
            StartupMode::Timestamp => {
                if self.startup_timestamp_millis.is_none() {
                    return Err(ConnectorError::config(
                        "scan.startup.mode = timestamp requires scan.startup.timestamp-millis",
                    ));
                }
            }
            StartupMode::Initial | StartupMode::EarliestOffset | StartupMode::LatestOffset => {}
        }
        if self.chunk_size == 0 {
            return Err(ConnectorError::config("scan.snapshot.chunk.size must be positive"));
        }
        if self.fetch_size == 0 {
            return Err(ConnectorError::config("scan.snapshot.fetch.size must be positive"));
        }
        Ok(())
    }

    /// The constraints of the parallel protocol: a startup mode the split
    /// assigner supports and a server-id range wide enough for every worker.
    /// (The primary-key requirement is checked against the discovered schema
    /// at planning time.)
    pub fn validate_parallel(&self, parallelism: u32) -> ConnectorResult<()> {
        if !self.parallel_read {
            return Ok(());
        }
        if !matches!(
            self.startup_mode,
            StartupMode::Initial | StartupMode::LatestOffset
        ) {
            return Err(ConnectorError::config(
                "scan.snapshot.parallel-read requires scan.startup.mode to be \
                 'initial' or 'latest-offset'",
            ));
        }
        match &self.server_id {
            Some(range) if range.is_range() && range.len() >= parallelism => Ok(()),
            Some(range) => Err(ConnectorError::config(format!(
                "scan.snapshot.parallel-read requires a server-id range covering \
                 all {parallelism} readers, got {range}"
            ))),
            None => Err(ConnectorError::config(
                "scan.snapshot.parallel-read requires a server-id range",
            )),
        }
    }

    pub fn startup_specific_offset(&self) -> Option<BinlogOffset> {
        Some(BinlogOffset::new(
            self.startup_specific_offset_file.clone()?,
            self.startup_specific_offset_pos?,
        ))
    }

    pub fn server_id_for(&self, reader: ReaderId) -> ConnectorResult<u32> {
        self.server_id
            .as_ref()
            .ok_or_else(|| ConnectorError::config("server-id is not configured"))?
            .server_id_for(reader)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn base_options() -> HashMap<String, String> {
        [
            ("hostname", "mysql.internal"),
            ("username", "repl"),
            ("password", "secret"),
            ("database-name", "mydb"),
            ("table-name", "orders"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config = MySqlSourceConfig::from_options(base_options()).unwrap();
        assert_eq!(config.port, 3306);
        assert_eq!(config.chunk_size, 8096);
        assert_eq!(config.fetch_size, 1024);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.startup_mode, StartupMode::Initial);
        assert!(!config.parallel_read);
    }

    #[test]
    fn test_full_options() {
        let mut options = base_options();
        options.insert("port".into(), "3307".into());
        options.insert("server-id".into(), "5400-5404".into());
        options.insert("scan.snapshot.parallel-read".into(), "true".into());
        options.insert("scan.snapshot.chunk.size".into(), "2".into());
        options.insert("connect.timeout".into(), "10s".into());
        let config = MySqlSourceConfig::from_options(options).unwrap();
        assert_eq!(config.port, 3307);
        assert_eq!(config.chunk_size, 2);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.parallel_read);
        config.validate_parallel(4).unwrap();
        assert_eq!(config.server_id_for(3).unwrap(), 5403);
        assert_matches!(config.server_id_for(5), Err(ConnectorError::Config(_)));
    }

    #[test]
    fn test_parallel_constraints() {
        let mut options = base_options();
        options.insert("scan.snapshot.parallel-read".into(), "true".into());
        let config = MySqlSourceConfig::from_options(options.clone()).unwrap();
        // no server-id range
        assert_matches!(config.validate_parallel(2), Err(ConnectorError::Config(_)));

        options.insert("server-id".into(), "5400".into());
        let config = MySqlSourceConfig::from_options(options.clone()).unwrap();
        // single id is not a range
        assert_matches!(config.validate_parallel(2), Err(ConnectorError::Config(_)));

        options.insert("server-id".into(), "5400-5401".into());
        options.insert("scan.startup.mode".into(), "earliest-offset".into());
        let config = MySqlSourceConfig::from_options(options.clone()).unwrap();
        // unsupported startup mode for parallel read
        assert_matches!(config.validate_parallel(2), Err(ConnectorError::Config(_)));

        options.insert("scan.startup.mode".into(), "latest-offset".into());
        let config = MySqlSourceConfig::from_options(options).unwrap();
        config.validate_parallel(2).unwrap();
    }

    #[test]
    fn test_incomplete_startup_options() {
        let mut options = base_options();
        options.insert("scan.startup.mode".into(), "specific-offset".into());
        assert_matches!(
            MySqlSourceConfig::from_options(options.clone()),
            Err(ConnectorError::Config(_))
        );

        options.insert(
            "scan.startup.specific-offset.file".into(),
            "binlog.000007".into(),
        );
        options.insert("scan.startup.specific-offset.pos".into(), "1096".into());
        let config = MySqlSourceConfig::from_options(options).unwrap();
        assert_eq!(
            config.startup_specific_offset().unwrap(),
            BinlogOffset::new("binlog.000007", 1096)
        );

        let mut options = base_options();
        options.insert("scan.startup.mode".into(), "timestamp".into());
        assert_matches!(
            MySqlSourceConfig::from_options(options),
            Err(ConnectorError::Config(_))
        );
    }

    #[test]
    fn test_server_id_parse() {
        let single: ServerIdRange = "5400".parse().unwrap();
        assert!(!single.is_range());
        assert_eq!(single.to_string(), "5400");

        let range: ServerIdRange = "5400-5408".parse().unwrap();
        assert!(range.is_range());
        assert_eq!(range.len(), 9);
        assert_eq!(range.to_string(), "5400-5408");

        assert!("5408-5400".parse::<ServerIdRange>().is_err());
        assert!("abc".parse::<ServerIdRange>().is_err());
    }
}
