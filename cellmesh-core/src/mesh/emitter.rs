/*
 * Copyright (c) 2025. The Cellmesh Authors
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::fmt;

use tracing::{instrument, trace};

use crate::errors::{Error, Result};
use crate::mesh::CellHandle;
use crate::message::{Event, Payload};

/// A cell's outbound interface, handed to its behavior at `init`.
///
/// Emitters hold no strong reference to any behavior, so a behavior may
/// keep its emitter (or a clone) for as long as it likes without affecting
/// mesh teardown.
#[derive(Clone)]
pub struct Emitter {
    cell: CellHandle,
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("id", &self.cell.id())
            .finish_non_exhaustive()
    }
}

impl Emitter {
    pub(crate) fn new(cell: CellHandle) -> Self {
        Emitter { cell }
    }

    /// The owning cell's ID.
    pub fn id(&self) -> &str {
        self.cell.id()
    }

    /// Delivers `event` to every current subscriber, in no guaranteed
    /// order. The first enqueue failure aborts the fan-out.
    #[instrument(skip(self, event), fields(id = %self.id(), topic = %event.topic()))]
    pub async fn emit(&self, event: Event) -> Result<()> {
        let targets: Vec<CellHandle> = self
            .cell
            .subscribers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        trace!(subscribers = targets.len(), "fanning out");
        for target in targets {
            self.deliver(&target, event.clone()).await?;
        }
        Ok(())
    }

    /// Convenience wrapper building the event in place.
    pub async fn emit_new(&self, topic: impl Into<String>, payload: Payload) -> Result<()> {
        self.emit(Event::new(topic, payload)).await
    }

    /// Delivers `event` to the one named subscriber only.
    pub async fn emit_to(&self, id: &str, event: Event) -> Result<()> {
        let Some(target) = self.cell.subscribers.get(id).map(|entry| entry.value().clone()) else {
            return Err(Error::UnknownCell(id.to_owned()));
        };
        self.deliver(&target, event).await
    }

    /// Queues `event` back onto the owning cell's own mailbox.
    ///
    /// Self-addressed events take a dedicated unbounded lane, so the
    /// enqueue never waits for mailbox capacity. That makes this safe to
    /// call from inside `process` even when the bounded mailbox is full:
    /// a cell waiting for room in its own mailbox could never get any.
    pub fn loopback(&self, event: Event) -> Result<()> {
        self.cell.process_local(event)
    }

    /// Bounded-mailbox delivery for everyone else, the self lane for the
    /// emitting cell itself; a cell subscribed to itself must not deadlock
    /// against its own backpressure.
    async fn deliver(&self, target: &CellHandle, event: Event) -> Result<()> {
        if target.id() == self.cell.id() {
            self.cell.process_local(event)
        } else {
            target.process(event).await
        }
    }

    /// Current subscriber IDs, unordered.
    pub fn subscriber_ids(&self) -> Vec<String> {
        self.cell
            .subscribers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}
