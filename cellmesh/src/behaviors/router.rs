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
use cellmesh_core::prelude::{async_trait, Behavior, Emitter, Error, Event, Mesh};

/// Maps an event to the IDs it should be delivered to.
pub type Route = Box<dyn FnMut(&Event) -> Vec<String> + Send>;

fn collapse(mut failures: Vec<Error>) -> anyhow::Result<()> {
    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0).into()),
        _ => Err(Error::Multiple(failures).into()),
    }
}

/// Delivers each event to a routed subset of its own subscribers.
///
/// Routing to an ID that is not currently subscribed is an error; every
/// routed target is attempted before failures are reported.
pub struct Router {
    id: String,
    route: Route,
    emitter: Option<Emitter>,
}

impl Router {
    pub fn new<R>(id: impl Into<String>, route: R) -> Self
    where
        R: FnMut(&Event) -> Vec<String> + Send + 'static,
    {
        Router {
            id: id.into(),
            route: Box::new(route),
            emitter: None,
        }
    }
}

#[async_trait]
impl Behavior for Router {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, emitter: Emitter) -> anyhow::Result<()> {
        self.emitter = Some(emitter);
        Ok(())
    }

    async fn process(&mut self, event: Event) -> anyhow::Result<()> {
        let emitter = self
            .emitter
            .as_ref()
            .ok_or_else(|| anyhow!("router used before init"))?;
        let mut failures = Vec::new();
        for target in (self.route)(&event) {
            if let Err(err) = emitter.emit_to(&target, event.clone()).await {
                failures.push(err);
            }
        }
        collapse(failures)
    }
}

/// Like [`Router`], but routes across the whole mesh instead of the cell's
/// own subscribers, so targets need no subscription edge.
pub struct MeshRouter {
    id: String,
    mesh: Mesh,
    route: Route,
}

impl MeshRouter {
    pub fn new<R>(id: impl Into<String>, mesh: Mesh, route: R) -> Self
    where
        R: FnMut(&Event) -> Vec<String> + Send + 'static,
    {
        MeshRouter {
            id: id.into(),
            mesh,
            route: Box::new(route),
        }
    }
}

#[async_trait]
impl Behavior for MeshRouter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, _emitter: Emitter) -> anyhow::Result<()> {
        Ok(())
    }

    async fn process(&mut self, event: Event) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        for target in (self.route)(&event) {
            if let Err(err) = self.mesh.emit(&target, event.clone()).await {
                failures.push(err);
            }
        }
        collapse(failures)
    }
}
