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

//! The cell registry and topology manager.
//!
//! Topology mutations (spawn, subscribe, teardown) take the registry's
//! write lock so multi-cell validation is atomic: either every named cell
//! exists and every edge is created, or nothing changes. Event delivery
//! only takes the read lock long enough to clone a handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::common::MeshConfig;
use crate::errors::{Error, Result};
use crate::mesh::cell::Cell;
use crate::mesh::Emitter;
use crate::message::Event;
use crate::traits::Behavior;

struct MeshInner {
    config: MeshConfig,
    cells: RwLock<HashMap<String, Cell>>,
}

/// A pub/sub registry of running cells. Cheap to clone; all clones share
/// the same registry.
#[derive(Clone)]
pub struct Mesh {
    inner: Arc<MeshInner>,
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh").finish_non_exhaustive()
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

impl Mesh {
    /// A mesh using [`MeshConfig::load`] for its settings.
    pub fn new() -> Self {
        Self::with_config(MeshConfig::load())
    }

    pub fn with_config(config: MeshConfig) -> Self {
        Mesh {
            inner: Arc::new(MeshInner {
                config,
                cells: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Spawns one cell per behavior and runs each behavior's `init`.
    ///
    /// A behavior whose ID is already registered is skipped, so retrying a
    /// partially failed spawn is safe. The first `init` failure aborts with
    /// [`Error::Init`]; cells spawned earlier in the batch stay running.
    #[instrument(skip_all, fields(count = behaviors.len()))]
    pub async fn spawn_cells(&self, behaviors: Vec<Box<dyn Behavior>>) -> Result<()> {
        let mut cells = self.inner.cells.write().await;
        for behavior in behaviors {
            let id = behavior.id().to_owned();
            if cells.contains_key(&id) {
                debug!(%id, "cell already registered, skipping");
                continue;
            }
            let cell = Cell::spawn(behavior, &self.inner.config)?;
            let emitter = Emitter::new(cell.handle().clone());
            cell.init(emitter).await?;
            debug!(%id, "cell spawned");
            cells.insert(id, cell);
        }
        Ok(())
    }

    /// Makes every cell in `subscriber_ids` a subscriber of `id`.
    ///
    /// All named cells are validated before any edge is created; an
    /// unknown ID fails the whole call with no partial topology change.
    /// Subscribing a cell to itself, or twice, is allowed and idempotent.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, id: &str, subscriber_ids: &[&str]) -> Result<()> {
        let mut cells = self.inner.cells.write().await;
        let publisher = Self::handle_of(&cells, id)?;
        let mut edges = Vec::with_capacity(subscriber_ids.len());
        for subscriber_id in subscriber_ids {
            edges.push((
                (*subscriber_id).to_owned(),
                Self::handle_of(&cells, subscriber_id)?,
            ));
        }
        for (subscriber_id, handle) in edges {
            publisher.subscribers.insert(subscriber_id.clone(), handle);
            if let Some(subscriber) = cells.get_mut(&subscriber_id) {
                subscriber.subscribed_to.insert(id.to_owned());
            }
        }
        Ok(())
    }

    /// Removes the named subscriber edges of `id`; the reverse of
    /// [`subscribe`](Mesh::subscribe), with the same all-or-nothing
    /// validation. Removing an edge that does not exist is a no-op.
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, id: &str, subscriber_ids: &[&str]) -> Result<()> {
        let mut cells = self.inner.cells.write().await;
        let publisher = Self::handle_of(&cells, id)?;
        for subscriber_id in subscriber_ids {
            Self::handle_of(&cells, subscriber_id)?;
        }
        for subscriber_id in subscriber_ids {
            publisher.subscribers.remove(*subscriber_id);
            if let Some(subscriber) = cells.get_mut(*subscriber_id) {
                subscriber.subscribed_to.remove(id);
            }
        }
        Ok(())
    }

    /// Queues `event` on the named cell's mailbox.
    pub async fn emit(&self, id: &str, event: Event) -> Result<()> {
        let handle = {
            let cells = self.inner.cells.read().await;
            Self::handle_of(&cells, id)?
        };
        handle.process(event).await
    }

    /// Queues `event` on every registered cell's mailbox. Failures do not
    /// stop the fan-out; all are collected into the returned error.
    #[instrument(skip(self, event), fields(topic = %event.topic()))]
    pub async fn broadcast(&self, event: Event) -> Result<()> {
        let handles: Vec<_> = {
            let cells = self.inner.cells.read().await;
            cells.values().map(|cell| cell.handle().clone()).collect()
        };
        let mut failures = Vec::new();
        for handle in handles {
            if let Err(err) = handle.process(event.clone()).await {
                failures.push(err);
            }
        }
        collapse(failures)
    }

    /// Tears the named cells down: detaches their edges in both directions,
    /// runs their `terminate`, and stops their mailboxes.
    ///
    /// Unlike [`subscribe`](Mesh::subscribe) this keeps going past
    /// failures, so one bad ID never leaves the rest of the batch running;
    /// everything that went wrong is collected into the returned error.
    #[instrument(skip(self))]
    pub async fn stop_cells(&self, ids: &[&str]) -> Result<()> {
        let mut failures = Vec::new();
        let removed = {
            let mut cells = self.inner.cells.write().await;
            let mut removed = Vec::with_capacity(ids.len());
            for id in ids {
                match cells.remove(*id) {
                    Some(cell) => removed.push(cell),
                    None => failures.push(Error::UnknownCell((*id).to_owned())),
                }
            }
            for cell in &removed {
                detach(&mut cells, cell);
            }
            removed
        };
        for cell in removed {
            if let Err(err) = cell.terminate().await {
                failures.push(err);
            }
            if let Err(err) = cell.stop().await {
                failures.push(err);
            }
        }
        collapse(failures)
    }

    /// Tears the whole mesh down. Cells are terminated and stopped
    /// concurrently; the mesh is empty afterwards regardless of failures.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let drained: Vec<Cell> = {
            let mut cells = self.inner.cells.write().await;
            cells.drain().map(|(_, cell)| cell).collect()
        };
        for cell in &drained {
            cell.handle().subscribers.clear();
        }
        let failures = join_all(drained.iter().map(|cell| async move {
            let mut failures = Vec::new();
            if let Err(err) = cell.terminate().await {
                failures.push(err);
            }
            if let Err(err) = cell.stop().await {
                failures.push(err);
            }
            failures
        }))
        .await;
        collapse(failures.into_iter().flatten().collect())
    }

    pub async fn has_cell(&self, id: &str) -> bool {
        self.inner.cells.read().await.contains_key(id)
    }

    /// All registered cell IDs, sorted.
    pub async fn cell_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.cells.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The sorted subscriber IDs of the named cell.
    pub async fn subscribers_of(&self, id: &str) -> Result<Vec<String>> {
        let cells = self.inner.cells.read().await;
        let handle = Self::handle_of(&cells, id)?;
        let mut ids: Vec<String> = handle
            .subscribers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn handle_of(
        cells: &HashMap<String, Cell>,
        id: &str,
    ) -> Result<crate::mesh::CellHandle> {
        cells
            .get(id)
            .map(|cell| cell.handle().clone())
            .ok_or_else(|| Error::UnknownCell(id.to_owned()))
    }
}

/// Removes every edge touching `cell` from the cells still registered.
fn detach(cells: &mut HashMap<String, Cell>, cell: &Cell) {
    let id = cell.handle().id().to_owned();
    for publisher_id in &cell.subscribed_to {
        if let Some(publisher) = cells.get(publisher_id) {
            publisher.handle().subscribers.remove(&id);
        }
    }
    let downstream: Vec<String> = cell
        .handle()
        .subscribers
        .iter()
        .map(|entry| entry.key().clone())
        .collect();
    for subscriber_id in downstream {
        if let Some(subscriber) = cells.get_mut(&subscriber_id) {
            subscriber.subscribed_to.remove(&id);
        }
    }
    cell.handle().subscribers.clear();
}

fn collapse(mut failures: Vec<Error>) -> Result<()> {
    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0)),
        _ => Err(Error::Multiple(failures)),
    }
}
