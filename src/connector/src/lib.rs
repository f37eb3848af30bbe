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

//! Parallel change-data-capture connector for MySQL-compatible databases.
//!
//! The monitored table is cut into key-range chunks which are snapshotted
//! concurrently, each chunk reconciled with its concurrent binlog slice
//! through a low/high watermark protocol, and the two phases stitched
//! together so that the downstream observes a stream equivalent to "full
//! snapshot at T₀, then tail from T₀" with exactly-once row semantics.

#![feature(coroutines)]
#![feature(proc_macro_hygiene)]
#![feature(stmt_expr_attributes)]

pub mod error;
pub mod source;
