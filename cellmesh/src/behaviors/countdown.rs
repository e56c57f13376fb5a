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
use cellmesh_core::prelude::{async_trait, Behavior, Emitter, Event};

use crate::behaviors::{Sink, TOPIC_RESET};

/// Turns a full batch into the event to emit and the next batch size.
pub type Zeroer = Box<dyn FnMut(&Sink) -> anyhow::Result<(Event, usize)> + Send>;

/// Counts incoming events down to zero, then fires.
///
/// Once `t` events are buffered the zeroer folds the batch into one event,
/// which is emitted to subscribers; the buffer is cleared and the zeroer's
/// returned size becomes the new `t`. A [`TOPIC_RESET`] event clears the
/// buffer and reseeds `t` from the payload's `"t"` value, keeping the
/// previous size if absent.
pub struct Countdown {
    id: String,
    t: usize,
    sink: Sink,
    zeroer: Zeroer,
    emitter: Option<Emitter>,
}

impl Countdown {
    pub fn new<Z>(id: impl Into<String>, t: usize, zeroer: Z) -> Self
    where
        Z: FnMut(&Sink) -> anyhow::Result<(Event, usize)> + Send + 'static,
    {
        Countdown {
            id: id.into(),
            t,
            sink: Sink::unbounded(),
            zeroer: Box::new(zeroer),
            emitter: None,
        }
    }
}

#[async_trait]
impl Behavior for Countdown {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, emitter: Emitter) -> anyhow::Result<()> {
        self.emitter = Some(emitter);
        Ok(())
    }

    async fn process(&mut self, event: Event) -> anyhow::Result<()> {
        if event.topic() == TOPIC_RESET {
            self.t = event.payload().int_at("t", self.t as i64).max(0) as usize;
            self.sink.clear();
            return Ok(());
        }
        self.sink.push(event);
        if self.t > 0 && self.sink.len() >= self.t {
            let (out, next_t) = (self.zeroer)(&self.sink)?;
            self.sink.clear();
            self.t = next_t;
            self.emitter
                .as_ref()
                .ok_or_else(|| anyhow!("countdown used before init"))?
                .emit(out)
                .await?;
        }
        Ok(())
    }
}
