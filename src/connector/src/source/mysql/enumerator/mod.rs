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

//! Planner-side arbitration between workers and the split assigner.
//!
//! The enumerator is a single-threaded state machine: every mutation happens
//! through [`MySqlSourceEnumerator::on_event`], [`tick`], or the checkpoint
//! hooks, and each returns the outbound events to deliver. The async
//! [`run`] loop wires those to the host transport and drives the 30-second
//! housekeeping timer.
//!
//! [`tick`]: MySqlSourceEnumerator::tick
//! [`run`]: run

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::ConnectorResult;
use crate::source::base::ReaderId;
use crate::source::mysql::assigner::SnapshotSplitAssigner;
use crate::source::mysql::events::{EnumeratorEvent, ReaderEvent};
use crate::source::mysql::external::ExternalTableReader;
use crate::source::mysql::state::SourceCheckpointState;

/// How often the planner re-solicits finish reports while chunks are
/// outstanding, to recover from planner-event loss across worker restarts.
pub const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30);

pub type Outbound = (ReaderId, EnumeratorEvent);

pub struct MySqlSourceEnumerator {
    assigner: SnapshotSplitAssigner,
    /// Registered workers, least id first for deterministic routing.
    registered: BTreeSet<ReaderId>,
    /// Workers with an outstanding split request, drained in id order.
    awaiting: BTreeSet<ReaderId>,
}

impl MySqlSourceEnumerator {
    pub fn new(assigner: SnapshotSplitAssigner) -> Self {
        Self {
            assigner,
            registered: BTreeSet::new(),
            awaiting: BTreeSet::new(),
        }
    }

    pub async fn open(&mut self, table: &dyn ExternalTableReader) -> ConnectorResult<()> {
        self.assigner.open(table).await
    }

    pub fn add_reader(&mut self, reader: ReaderId) -> Vec<Outbound> {
        info!(reader, "reader registered");
        self.registered.insert(reader);
        self.drain()
    }

    /// Worker failure: its pending request is dropped and its assigned
    /// chunks go back to the assigner.
    pub fn remove_reader(&mut self, reader: ReaderId) -> Vec<Outbound> {
        info!(reader, "reader removed");
        self.registered.remove(&reader);
        self.awaiting.remove(&reader);
        self.assigner.on_reader_dropped(reader);
        self.drain()
    }

    pub fn on_event(&mut self, reader: ReaderId, event: ReaderEvent) -> Vec<Outbound> {
        match event {
            ReaderEvent::SplitRequest => {
                debug!(reader, "split request");
                self.awaiting.insert(reader);
                self.drain()
            }
            ReaderEvent::FinishReport { high_watermarks } => {
                let split_ids = self.assigner.on_finished_splits(high_watermarks);
                let mut out = vec![(reader, EnumeratorEvent::FinishAck { split_ids })];
                out.extend(self.drain());
                out
            }
            ReaderEvent::SplitAddback { splits } => {
                self.assigner.add_splits(splits);
                self.drain()
            }
        }
    }

    /// Periodic housekeeping: while chunk completion is outstanding, ask all
    /// workers to re-send unacked finish reports.
    pub fn tick(&mut self) -> Vec<Outbound> {
        if !self.assigner.waiting_for_finished_splits() {
            return vec![];
        }
        self.registered
            .iter()
            .map(|reader| (*reader, EnumeratorEvent::FinishSolicit))
            .collect()
    }

    pub fn snapshot_state(&mut self, checkpoint_id: u64) -> SourceCheckpointState {
        self.assigner.snapshot_state(checkpoint_id)
    }

    /// A completed checkpoint can unlock the binlog hand-off, so pending
    /// requests are drained afterwards.
    pub fn notify_checkpoint_complete(&mut self, checkpoint_id: u64) -> Vec<Outbound> {
        self.assigner.notify_checkpoint_complete(checkpoint_id);
        self.drain()
    }

    fn drain(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        // workers that vanished between request and drain
        self.awaiting.retain(|r| self.registered.contains(r));
        loop {
            let Some(&reader) = self.awaiting.first() else {
                break;
            };
            if self.assigner.has_remaining_snapshots() {
                let split = self
                    .assigner
                    .next(reader)
                    .expect("remaining snapshot must be assignable");
                self.awaiting.remove(&reader);
                out.push((reader, EnumeratorEvent::SplitAssignment { split }));
            } else if self.assigner.binlog_ready() {
                // exactly one tailing worker: route to the least registered
                // reader for determinism
                let Some(&target) = self.registered.first() else {
                    break;
                };
                if !self.awaiting.remove(&target) {
                    break;
                }
                let split = self
                    .assigner
                    .next(target)
                    .expect("binlog split must be assignable");
                out.push((target, EnumeratorEvent::SplitAssignment { split }));
            } else {
                break;
            }
        }
        out
    }
}

/// Messages the host runtime feeds into the planner loop.
#[derive(Debug)]
pub enum EnumeratorMessage {
    Reader { reader: ReaderId, event: ReaderEvent },
    AddReader(ReaderId),
    RemoveReader(ReaderId),
    CheckpointComplete(u64),
}

/// The planner event loop: drains the inbox and fires housekeeping every
/// [`HOUSEKEEPING_INTERVAL`]. The enumerator stays behind a mutex so the
/// host can take checkpoint snapshots between events.
pub async fn run(
    enumerator: Arc<Mutex<MySqlSourceEnumerator>>,
    mut inbox: UnboundedReceiver<EnumeratorMessage>,
    outbox: UnboundedSender<Outbound>,
) {
    let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    housekeeping.tick().await;

    loop {
        let outbound = tokio::select! {
            message = inbox.recv() => {
                let Some(message) = message else { break };
                let mut enumerator = enumerator.lock();
                match message {
                    EnumeratorMessage::Reader { reader, event } => enumerator.on_event(reader, event),
                    EnumeratorMessage::AddReader(reader) => enumerator.add_reader(reader),
                    EnumeratorMessage::RemoveReader(reader) => enumerator.remove_reader(reader),
                    EnumeratorMessage::CheckpointComplete(id) => {
                        enumerator.notify_checkpoint_complete(id)
                    }
                }
            }
            _ = housekeeping.tick() => enumerator.lock().tick(),
        };
        for event in outbound {
            if outbox.send(event).is_err() {
                warn!("planner outbox closed, stopping the enumerator loop");
                return;
            }
        }
    }
}
