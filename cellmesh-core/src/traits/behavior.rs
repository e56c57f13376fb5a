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

use anyhow::anyhow;
use async_trait::async_trait;

use crate::mesh::Emitter;
use crate::message::Event;

/// The user-implemented logic a cell hosts.
///
/// All methods take `&mut self` and are invoked from the cell's single
/// mailbox task, so implementations never need interior locking of their
/// own state.
#[async_trait]
pub trait Behavior: Send + 'static {
    /// The cell's registry identifier; must be stable and unique per mesh.
    fn id(&self) -> &str;

    /// Called once before the first event, with the emitter the behavior
    /// uses for any output it produces later. Returning an error aborts
    /// the spawn.
    async fn init(&mut self, emitter: Emitter) -> anyhow::Result<()>;

    /// Called once during cell teardown, after the last event.
    async fn terminate(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handles one delivered event.
    async fn process(&mut self, event: Event) -> anyhow::Result<()>;

    /// Decides the fate of a panic raised while processing: `Ok` keeps the
    /// cell serving, `Err` terminates it. The default escalates.
    fn recover(&mut self, reason: &str) -> anyhow::Result<()> {
        Err(anyhow!("behavior {:?} panicked: {reason}", self.id()))
    }
}
