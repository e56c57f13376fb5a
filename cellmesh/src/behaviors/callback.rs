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

use std::future::Future;

use anyhow::anyhow;
use cellmesh_core::prelude::{async_trait, Behavior, Emitter, Event};
use futures::future::BoxFuture;
use futures::FutureExt;

type EventCallback = Box<dyn FnMut(Event, Emitter) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Runs registered callbacks, in registration order, for every event.
///
/// The lightest way to put plain closures on the mesh; a callback gets the
/// event and the cell's emitter and may produce follow-up events with it.
pub struct Callback {
    id: String,
    callbacks: Vec<EventCallback>,
    emitter: Option<Emitter>,
}

impl Callback {
    pub fn new(id: impl Into<String>) -> Self {
        Callback {
            id: id.into(),
            callbacks: Vec::new(),
            emitter: None,
        }
    }

    /// Appends a callback; builder-style.
    pub fn on<C, F>(mut self, callback: C) -> Self
    where
        C: FnMut(Event, Emitter) -> F + Send + 'static,
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut callback = callback;
        self.callbacks
            .push(Box::new(move |event, emitter| callback(event, emitter).boxed()));
        self
    }
}

#[async_trait]
impl Behavior for Callback {
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
            .ok_or_else(|| anyhow!("callback used before init"))?
            .clone();
        for callback in &mut self.callbacks {
            callback(event.clone(), emitter.clone()).await?;
        }
        Ok(())
    }
}
