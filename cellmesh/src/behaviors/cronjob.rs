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
use std::time::{Duration, SystemTime};

use cellmesh_core::prelude::{
    async_trait, Behavior, CancellationToken, Emitter, Error, Event, Loop, Payload,
};
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::behaviors::TOPIC_TICK;

type Job = Box<dyn FnMut(Emitter) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Runs a job at a fixed interval, on the cell's mailbox.
///
/// Structured like [`Ticker`](crate::behaviors::Ticker): an internal loop
/// delivers tick events through the mailbox, and the job runs as the tick
/// is processed, serialized with any other events the cell receives. After
/// the job the tick is forwarded to subscribers.
pub struct Cronjob {
    id: String,
    interval: Duration,
    job: Job,
    runner: Option<Loop>,
    emitter: Option<Emitter>,
}

impl Cronjob {
    pub fn new<J, F>(id: impl Into<String>, interval: Duration, job: J) -> Self
    where
        J: FnMut(Emitter) -> F + Send + 'static,
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut job = job;
        Cronjob {
            id: id.into(),
            interval,
            job: Box::new(move |emitter| job(emitter).boxed()),
            runner: None,
            emitter: None,
        }
    }
}

#[async_trait]
impl Behavior for Cronjob {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, emitter: Emitter) -> anyhow::Result<()> {
        self.emitter = Some(emitter.clone());
        let interval = self.interval;
        let runner = Loop::builder(move |done: CancellationToken| {
            let emitter = emitter.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = done.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(interval) => {}
                    }
                    let payload = Payload::new()
                        .set("id", emitter.id())
                        .set("time", SystemTime::now());
                    match emitter.loopback(Event::new(TOPIC_TICK, payload)) {
                        Ok(()) => {}
                        // The cell is already tearing down; stop ticking.
                        Err(Error::NotWorking) => return Ok(()),
                        Err(err) => return Err(err),
                    }
                }
            }
        })
        .build()?;
        runner.go()?;
        self.runner = Some(runner);
        Ok(())
    }

    async fn terminate(&mut self) -> anyhow::Result<()> {
        if let Some(runner) = self.runner.take() {
            match runner.stop(None).await {
                Ok(()) | Err(Error::NotWorking) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    async fn process(&mut self, event: Event) -> anyhow::Result<()> {
        if event.topic() == TOPIC_TICK {
            let emitter = self
                .emitter
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("cronjob used before init"))?
                .clone();
            (self.job)(emitter.clone()).await?;
            emitter.emit(event).await?;
        }
        Ok(())
    }
}
