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

//! A behavior hosted on its own serialized mailbox.
//!
//! The registry holds the only strong reference to the behavior; handles
//! held by emitters and subscriber maps carry a [`Weak`] so that a
//! torn-down cell cannot be kept alive through stale edges. A stale handle
//! drains deliveries silently instead of erroring.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, instrument, trace, warn};

use crate::common::MeshConfig;
use crate::errors::{Error, Result};
use crate::mesh::Emitter;
use crate::message::Event;
use crate::runtime::Actor;
use crate::traits::Behavior;

type SharedBehavior = Arc<Mutex<Box<dyn Behavior>>>;

/// A registry entry: the behavior, its mailbox, and its edge bookkeeping.
pub(crate) struct Cell {
    behavior: SharedBehavior,
    handle: CellHandle,
    stop_timeout: Duration,
    /// IDs of cells this cell receives events from; the reverse index of
    /// their subscriber maps, kept so teardown can detach upstream edges.
    pub(crate) subscribed_to: HashSet<String>,
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.handle.id())
            .field("subscribed_to", &self.subscribed_to)
            .finish_non_exhaustive()
    }
}

impl Cell {
    /// Starts the mailbox for `behavior`. The behavior's `init` has not run
    /// yet; the registry calls [`Cell::init`] once the handle is in place.
    pub(crate) fn spawn(behavior: Box<dyn Behavior>, config: &MeshConfig) -> Result<Cell> {
        let id: Arc<str> = Arc::from(behavior.id());
        let behavior: SharedBehavior = Arc::new(Mutex::new(behavior));
        let recover_target = Arc::downgrade(&behavior);
        let actor = Actor::builder()
            .capacity(config.queue_capacity)
            .stop_timeout(config.stop_timeout())
            .recoverer(move |reason| {
                let behavior = recover_target.clone();
                async move {
                    match behavior.upgrade() {
                        Some(behavior) => behavior.lock().await.recover(&reason),
                        None => Err(anyhow!("behavior already torn down")),
                    }
                }
            })
            .build()?;
        Ok(Cell {
            handle: CellHandle {
                id,
                behavior: Arc::downgrade(&behavior),
                actor: Arc::new(actor),
                subscribers: Arc::new(DashMap::new()),
            },
            behavior,
            stop_timeout: config.stop_timeout(),
            subscribed_to: HashSet::new(),
        })
    }

    pub(crate) fn handle(&self) -> &CellHandle {
        &self.handle
    }

    /// Runs the behavior's `init` on the caller's task, before any event
    /// can be queued. On failure the mailbox is stopped and the cell must
    /// be discarded.
    #[instrument(skip_all, fields(id = %self.handle.id()))]
    pub(crate) async fn init(&self, emitter: Emitter) -> Result<()> {
        if let Err(cause) = self.behavior.lock().await.init(emitter).await {
            let _ = self.handle.actor.stop(None).await;
            return Err(Error::Init {
                id: self.handle.id().to_owned(),
                cause: Arc::new(cause),
            });
        }
        debug!(id = %self.handle.id(), "cell initialized");
        Ok(())
    }

    /// Runs the behavior's `terminate` and replaces it with an inert stub,
    /// so actions still sitting in the mailbox find nothing left to do.
    ///
    /// The behavior lock is held by the mailbox worker while an action
    /// runs, so acquisition is bounded by the cell's stop timeout: a stuck
    /// action must not be able to hold up teardown of the rest of the mesh.
    pub(crate) async fn terminate(&self) -> Result<()> {
        let mut behavior = match timeout(self.stop_timeout, self.behavior.lock()).await {
            Ok(behavior) => behavior,
            Err(_) => {
                warn!(
                    id = %self.handle.id(),
                    wait = ?self.stop_timeout,
                    "behavior still busy at termination"
                );
                return Err(Error::StopTimeout(self.stop_timeout));
            }
        };
        let result = behavior.terminate().await;
        let id = behavior.id().to_owned();
        *behavior = Box::new(Retired { id });
        result.map_err(Error::action)
    }

    /// Stops the mailbox; an already-stopped mailbox is not an error here.
    pub(crate) async fn stop(&self) -> Result<()> {
        match self.handle.actor.stop(None).await {
            Ok(()) | Err(Error::NotWorking) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// What cells hold about each other: enough to deliver events, never enough
/// to keep the target alive.
#[derive(Clone)]
pub(crate) struct CellHandle {
    id: Arc<str>,
    behavior: Weak<Mutex<Box<dyn Behavior>>>,
    actor: Arc<Actor>,
    pub(crate) subscribers: Arc<DashMap<String, CellHandle>>,
}

impl fmt::Debug for CellHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl CellHandle {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Queues the event on the cell's mailbox and waits for the enqueue
    /// only. Delivery to a torn-down cell is a silent drain.
    pub(crate) async fn process(&self, event: Event) -> Result<()> {
        let behavior = self.behavior.clone();
        self.actor
            .do_async(move || async move {
                match behavior.upgrade() {
                    Some(behavior) => behavior.lock().await.process(event).await,
                    None => {
                        trace!("dropping event for torn-down cell");
                        Ok(())
                    }
                }
            })
            .await
    }

    /// Queues the event on the cell's own mailbox from inside the cell's
    /// own task. Never blocks on queue capacity; see [`Actor::do_local`].
    pub(crate) fn process_local(&self, event: Event) -> Result<()> {
        let behavior = self.behavior.clone();
        self.actor.do_local(move || async move {
            match behavior.upgrade() {
                Some(behavior) => behavior.lock().await.process(event).await,
                None => {
                    trace!("dropping event for torn-down cell");
                    Ok(())
                }
            }
        })
    }
}

/// Stand-in installed after `terminate`, absorbing whatever the mailbox
/// still holds.
struct Retired {
    id: String,
}

#[async_trait]
impl Behavior for Retired {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, _emitter: Emitter) -> anyhow::Result<()> {
        Ok(())
    }

    async fn process(&mut self, _event: Event) -> anyhow::Result<()> {
        Ok(())
    }

    fn recover(&mut self, _reason: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
