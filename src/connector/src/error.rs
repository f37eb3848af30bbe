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

use thiserror::Error;

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Failure taxonomy of the connector.
///
/// `Config` is fatal at startup and never retried. `Connection` is retried
/// with bounded backoff inside a worker and surfaces as a chunk failure once
/// the budget is exhausted. `Consistency` and `Protocol` fail the chunk fast;
/// the split goes back to the assigner and may be retried elsewhere.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(#[source] anyhow::Error),

    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("mysql error: {0}")]
    External(#[from] mysql_async::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ConnectorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
