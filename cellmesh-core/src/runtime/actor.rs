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

//! The serialized-mailbox executor.
//!
//! An [`Actor`] owns a bounded queue of actions and a [`Loop`] whose worker
//! drains that queue on a single task: actions never run concurrently, and
//! actions submitted from one caller run in submission order. An action
//! returning an error becomes the actor's terminal error; every later
//! submission fails fast with it.
//!
//! Alongside the bounded queue sits an unbounded self lane for work the
//! running action submits to its own actor; self-submissions must never
//! wait for capacity only the submitter could free up.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::errors::{Error, Result};
use crate::runtime::looper::{Loop, Recoverer};
use crate::runtime::status::{Notifier, Status};

/// Default bound of the action queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// A queued unit of work.
pub type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Builder for an [`Actor`].
pub struct ActorBuilder {
    capacity: usize,
    recoverer: Option<Recoverer>,
    notifiers: Vec<Notifier>,
    sources: Vec<CancellationToken>,
    stop_timeout: Duration,
}

impl Default for ActorBuilder {
    fn default() -> Self {
        ActorBuilder {
            capacity: DEFAULT_QUEUE_CAPACITY,
            recoverer: None,
            notifiers: Vec::new(),
            sources: Vec::new(),
            stop_timeout: crate::runtime::looper::DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl ActorBuilder {
    /// Bounds the action queue; zero is rejected at build time.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Installs a panic recoverer on the underlying loop: `Ok` swallows the
    /// panic and keeps the actor serving, `Err` terminates it with that
    /// error.
    pub fn recoverer<R, F>(mut self, recoverer: R) -> Self
    where
        R: FnMut(String) -> F + Send + 'static,
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut recoverer = recoverer;
        self.recoverer = Some(Box::new(move |reason| recoverer(reason).boxed()));
        self
    }

    /// Registers an extra lifecycle notifier.
    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Wires an extra cancellation source.
    pub fn cancel_on(mut self, source: CancellationToken) -> Self {
        self.sources.push(source);
        self
    }

    pub fn stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Validates the options and starts the actor's loop.
    ///
    /// Must be called from within a tokio runtime; the returned actor is
    /// already serving.
    pub fn build(self) -> Result<Actor> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig(
                "queue capacity must be at least 1".into(),
            ));
        }
        let (queue, external) = mpsc::channel::<Action>(self.capacity);
        let (local_queue, local) = mpsc::unbounded_channel::<Action>();
        let inboxes = Arc::new(tokio::sync::Mutex::new(Inboxes { local, external }));
        let worker = move |done: CancellationToken| {
            let inboxes = inboxes.clone();
            async move {
                let mut guard = inboxes.lock().await;
                let inboxes = &mut *guard;
                loop {
                    tokio::select! {
                        biased;
                        _ = done.cancelled() => return Ok(()),
                        next = inboxes.local.recv() => match next {
                            Some(action) => action().await?,
                            None => return Ok(()),
                        },
                        next = inboxes.external.recv() => match next {
                            Some(action) => action().await?,
                            None => return Ok(()),
                        },
                    }
                }
            }
        };
        let mut builder = Loop::builder(worker).stop_timeout(self.stop_timeout);
        if let Some(recoverer) = self.recoverer {
            builder = builder.recoverer_boxed(recoverer);
        }
        for notifier in self.notifiers {
            builder = builder.notifier(notifier);
        }
        for source in self.sources {
            builder = builder.cancel_on(source);
        }
        let runner = builder.build()?;
        runner.go()?;
        Ok(Actor {
            queue,
            local_queue,
            runner,
        })
    }
}

/// The two mailbox lanes: the unbounded self lane is drained first.
struct Inboxes {
    local: mpsc::UnboundedReceiver<Action>,
    external: mpsc::Receiver<Action>,
}

/// Single-task FIFO executor of submitted actions.
pub struct Actor {
    queue: mpsc::Sender<Action>,
    local_queue: mpsc::UnboundedSender<Action>,
    runner: Loop,
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Actor {
    pub fn builder() -> ActorBuilder {
        ActorBuilder::default()
    }

    pub fn status(&self) -> Status {
        self.runner.status()
    }

    /// The terminal error, once the actor has one.
    pub fn err(&self) -> Option<Error> {
        self.runner.err()
    }

    /// Completes once the actor has stopped.
    pub async fn stopped(&self) {
        self.runner.stopped().await;
    }

    /// Stops the actor, see [`Loop::stop`].
    pub async fn stop(&self, reason: Option<anyhow::Error>) -> Result<()> {
        self.runner.stop(reason).await
    }

    /// Enqueues an action and returns as soon as it is queued.
    ///
    /// Fails fast, without enqueueing, when the actor already has a
    /// terminal error. Backpressure from a full queue blocks the caller,
    /// never the actor.
    #[instrument(skip_all)]
    pub async fn do_async<F, Fut>(&self, action: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.enqueue(Box::new(move || {
            async move { action().await.map_err(Error::action) }.boxed()
        }))
        .await
    }

    /// Enqueues an action and blocks the caller until it has run.
    ///
    /// Must not be called from inside the actor's own task: the actor
    /// would wait on itself.
    pub async fn do_sync<F, Fut>(&self, action: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.submit_sync(None, action).await
    }

    /// Like [`do_sync`](Actor::do_sync), but gives up waiting after `wait`.
    ///
    /// On expiry the caller gets [`Error::Timeout`], but the queued action
    /// is *not* cancelled — it still runs later, so callers must not assume
    /// the side effect was prevented.
    pub async fn do_sync_timeout<F, Fut>(&self, wait: Duration, action: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.submit_sync(Some(wait), action).await
    }

    async fn submit_sync<F, Fut>(&self, wait: Option<Duration>, action: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(Box::new(move || {
            async move {
                let result = action().await.map_err(Error::action);
                let _ = done_tx.send(result.clone());
                result
            }
            .boxed()
        }))
        .await?;
        let completed = match wait {
            None => done_rx.await,
            Some(wait) => match timeout(wait, done_rx).await {
                Ok(completed) => completed,
                Err(_) => {
                    trace!(?wait, "caller stopped waiting for queued action");
                    return Err(Error::Timeout(wait));
                }
            },
        };
        match completed {
            Ok(result) => result,
            // The wrapper was dropped unrun (loop restart or teardown).
            Err(_) => Err(self.err().unwrap_or(Error::Interrupted)),
        }
    }

    /// Enqueues an action on the unbounded self lane, without ever waiting
    /// for queue capacity.
    ///
    /// This is the one safe way to submit work from inside the actor's own
    /// task: a self-submission cannot be backpressured, because the only
    /// task that could drain the queue is the one doing the submitting.
    pub(crate) fn do_local<F, Fut>(&self, action: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        if self.status() > Status::Working {
            return Err(Error::NotWorking);
        }
        self.local_queue
            .send(Box::new(move || {
                async move { action().await.map_err(Error::action) }.boxed()
            }))
            .map_err(|_| self.err().unwrap_or(Error::MailboxClosed))
    }

    async fn enqueue(&self, action: Action) -> Result<()> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        if self.status() > Status::Working {
            return Err(Error::NotWorking);
        }
        self.queue
            .send(action)
            .await
            .map_err(|_| self.err().unwrap_or(Error::MailboxClosed))
    }
}
