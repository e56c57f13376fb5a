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
use cellmesh_core::prelude::{async_trait, Behavior, Emitter, Event, Payload};
use tracing::trace;

use crate::behaviors::{Sink, TOPIC_COLLECTED, TOPIC_PROCESS, TOPIC_RESET};

/// Folds a [`Sink`] into an optional result payload.
pub type SinkProcessor = Box<dyn FnMut(&Sink) -> anyhow::Result<Option<Payload>> + Send>;

/// Buffers incoming events and folds them on demand.
///
/// Regular events are buffered and passed through to subscribers
/// unchanged. A [`TOPIC_PROCESS`] event triggers the fold: the result, if
/// any, is sent to the requester's reply channel when it carries one,
/// otherwise emitted to subscribers under [`TOPIC_COLLECTED`]. A
/// [`TOPIC_RESET`] event drops the buffer.
pub struct Collector {
    id: String,
    sink: Sink,
    processor: SinkProcessor,
    emitter: Option<Emitter>,
}

impl Collector {
    pub fn new<P>(id: impl Into<String>, max: Option<usize>, processor: P) -> Self
    where
        P: FnMut(&Sink) -> anyhow::Result<Option<Payload>> + Send + 'static,
    {
        Collector {
            id: id.into(),
            sink: max.map_or_else(Sink::unbounded, Sink::bounded),
            processor: Box::new(processor),
            emitter: None,
        }
    }

    fn emitter(&self) -> anyhow::Result<&Emitter> {
        self.emitter
            .as_ref()
            .ok_or_else(|| anyhow!("collector used before init"))
    }
}

#[async_trait]
impl Behavior for Collector {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, emitter: Emitter) -> anyhow::Result<()> {
        self.emitter = Some(emitter);
        Ok(())
    }

    async fn process(&mut self, event: Event) -> anyhow::Result<()> {
        match event.topic() {
            TOPIC_PROCESS => {
                if let Some(result) = (self.processor)(&self.sink)? {
                    if event.payload().has_reply() {
                        event.payload().reply(result)?;
                    } else {
                        self.emitter()?.emit_new(TOPIC_COLLECTED, result).await?;
                    }
                }
                Ok(())
            }
            TOPIC_RESET => {
                trace!(id = %self.id, "collector reset");
                self.sink.clear();
                Ok(())
            }
            _ => {
                self.sink.push(event.clone());
                self.emitter()?.emit(event).await?;
                Ok(())
            }
        }
    }
}
