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

use crate::behaviors::{Sink, TOPIC_COMBO, TOPIC_RESET};

/// The criterion's verdict over the current window.
#[derive(Debug)]
pub enum CriterionMatch {
    /// The window completes a combination; emit this payload and start
    /// over with an empty window.
    Done(Payload),
    /// The window may still grow into a combination; keep everything.
    Keep,
    /// The oldest event can no longer be part of a combination.
    DropFirst,
    /// The newest event cannot extend the window; drop it, keep the rest.
    DropLast,
    /// Nothing in the window can be part of a combination.
    Clear,
}

/// Judges the buffered window after each appended event.
pub type Criterion = Box<dyn FnMut(&Sink) -> anyhow::Result<CriterionMatch> + Send>;

/// Detects combinations of events in a stream.
///
/// Every incoming event is appended to the window and the criterion is
/// evaluated exactly once. A [`CriterionMatch::Done`] emits its payload to
/// subscribers under [`TOPIC_COMBO`] and clears the window. A
/// [`TOPIC_RESET`] event clears the window without evaluation.
pub struct Combo {
    id: String,
    sink: Sink,
    criterion: Criterion,
    emitter: Option<Emitter>,
}

impl Combo {
    pub fn new<C>(id: impl Into<String>, max: Option<usize>, criterion: C) -> Self
    where
        C: FnMut(&Sink) -> anyhow::Result<CriterionMatch> + Send + 'static,
    {
        Combo {
            id: id.into(),
            sink: max.map_or_else(Sink::unbounded, Sink::bounded),
            criterion: Box::new(criterion),
            emitter: None,
        }
    }
}

#[async_trait]
impl Behavior for Combo {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, emitter: Emitter) -> anyhow::Result<()> {
        self.emitter = Some(emitter);
        Ok(())
    }

    async fn process(&mut self, event: Event) -> anyhow::Result<()> {
        if event.topic() == TOPIC_RESET {
            self.sink.clear();
            return Ok(());
        }
        self.sink.push(event);
        match (self.criterion)(&self.sink)? {
            CriterionMatch::Done(payload) => {
                trace!(id = %self.id, window = self.sink.len(), "combination complete");
                self.sink.clear();
                self.emitter
                    .as_ref()
                    .ok_or_else(|| anyhow!("combo used before init"))?
                    .emit_new(TOPIC_COMBO, payload)
                    .await?;
            }
            CriterionMatch::Keep => {}
            CriterionMatch::DropFirst => {
                self.sink.pull_first();
            }
            CriterionMatch::DropLast => {
                self.sink.pull_last();
            }
            CriterionMatch::Clear => self.sink.clear(),
        }
        Ok(())
    }
}
