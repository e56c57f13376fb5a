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

//! The supervised background task.
//!
//! A [`Loop`] runs a worker on its own tokio task until the worker returns
//! or any wired cancellation source fires. Panics inside the worker are
//! intercepted and handed to an optional recoverer which decides between
//! running the worker again and terminating the loop with an error. An
//! optional finalizer runs once after the worker has exited and may rewrite
//! the terminal error.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{instrument, trace, warn};

use crate::errors::{Error, Result};
use crate::runtime::closer::Closer;
use crate::runtime::status::{Bundle, Notifier, Status};

/// How long [`Loop::stop`] waits for the loop to reach `Stopped` before
/// recording a timeout error.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// The body of a loop. Re-invoked only after a recovered panic; it must
/// observe the passed cancellation token to honor stop requests.
pub type Worker = Box<dyn FnMut(CancellationToken) -> BoxFuture<'static, Result<()>> + Send>;

/// Decides the fate of a panicked worker: `Ok` runs the worker again,
/// `Err` terminates the loop with that error.
pub type Recoverer = Box<dyn FnMut(String) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Runs once after the worker has exited and may rewrite the terminal
/// result.
pub type Finalizer = Box<dyn FnOnce(Result<()>) -> Result<()> + Send>;

/// Builder wiring a worker with its supervision options.
///
/// Invalid options are rejected by [`build`](LoopBuilder::build) before any
/// task is started.
pub struct LoopBuilder {
    worker: Worker,
    recoverer: Option<Recoverer>,
    finalizer: Option<Finalizer>,
    notifiers: Vec<Notifier>,
    sources: Vec<CancellationToken>,
    stop_timeout: Duration,
}

impl LoopBuilder {
    pub fn new<W, F>(worker: W) -> Self
    where
        W: FnMut(CancellationToken) -> F + Send + 'static,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let mut worker = worker;
        LoopBuilder {
            worker: Box::new(move |token| worker(token).boxed()),
            recoverer: None,
            finalizer: None,
            notifiers: Vec::new(),
            sources: Vec::new(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Installs a panic recoverer.
    pub fn recoverer<R, F>(self, recoverer: R) -> Self
    where
        R: FnMut(String) -> F + Send + 'static,
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut recoverer = recoverer;
        self.recoverer_boxed(Box::new(move |reason| recoverer(reason).boxed()))
    }

    pub(crate) fn recoverer_boxed(mut self, recoverer: Recoverer) -> Self {
        self.recoverer = Some(recoverer);
        self
    }

    /// Installs a finalizer run once after the worker exits.
    pub fn finalizer(mut self, finalizer: impl FnOnce(Result<()>) -> Result<()> + Send + 'static) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// Registers an extra notifier on the loop's status bundle.
    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Wires an extra cancellation source; firing it requests termination.
    pub fn cancel_on(mut self, source: CancellationToken) -> Self {
        self.sources.push(source);
        self
    }

    /// Overrides [`DEFAULT_STOP_TIMEOUT`].
    pub fn stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Validates the options and assembles the loop in `Ready` status.
    ///
    /// Must be called from within a tokio runtime; no worker task is
    /// started until [`Loop::go`].
    pub fn build(self) -> Result<Loop> {
        if self.stop_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "stop timeout must be non-zero".into(),
            ));
        }
        let closer = Closer::new();
        for source in self.sources {
            closer.add_source(source);
        }
        let bundle = Arc::new(Bundle::new());
        for notifier in self.notifiers {
            bundle.register(notifier);
        }
        bundle.notify(Status::Ready);
        Ok(Loop {
            closer,
            bundle,
            tracker: TaskTracker::new(),
            stop_timeout: self.stop_timeout,
            terminal: Arc::new(Mutex::new(None)),
            body: Mutex::new(Some(Body {
                worker: self.worker,
                recoverer: self.recoverer,
                finalizer: self.finalizer,
            })),
        })
    }
}

struct Body {
    worker: Worker,
    recoverer: Option<Recoverer>,
    finalizer: Option<Finalizer>,
}

/// A supervised background task built on [`Closer`] and [`Bundle`].
pub struct Loop {
    closer: Closer,
    bundle: Arc<Bundle>,
    tracker: TaskTracker,
    stop_timeout: Duration,
    terminal: Arc<Mutex<Option<Error>>>,
    body: Mutex<Option<Body>>,
}

impl fmt::Debug for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Loop {
    pub fn builder<W, F>(worker: W) -> LoopBuilder
    where
        W: FnMut(CancellationToken) -> F + Send + 'static,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        LoopBuilder::new(worker)
    }

    pub fn status(&self) -> Status {
        self.bundle.status()
    }

    /// The terminal error, once one has been recorded.
    pub fn err(&self) -> Option<Error> {
        self.terminal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The loop's done token; workers receive a clone of this on every
    /// invocation.
    pub fn done_token(&self) -> CancellationToken {
        self.closer.token()
    }

    /// Completes once the loop has reached `Stopped`.
    pub async fn stopped(&self) {
        self.bundle.stopped().await;
    }

    /// Starts the loop asynchronously.
    ///
    /// Only valid while `Ready`; exactly one of several racing callers wins.
    #[instrument(skip(self))]
    pub fn go(&self) -> Result<()> {
        if !self.bundle.notify(Status::Working) {
            return Err(Error::NotReady(self.bundle.status()));
        }
        let Some(body) = self
            .body
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            // The status gate admits exactly one caller, so the body is
            // always present here; refuse rather than panic regardless.
            return Err(Error::NotReady(self.bundle.status()));
        };
        let closer = self.closer.clone();
        let bundle = self.bundle.clone();
        let terminal = self.terminal.clone();
        self.tracker.spawn(run(body, closer, bundle, terminal));
        self.tracker.close();
        trace!("loop started");
        Ok(())
    }

    /// Runs the loop synchronously: starts it and waits for termination.
    pub async fn work(&self) -> Result<()> {
        self.go()?;
        self.join().await
    }

    /// Waits for termination and yields the terminal result.
    pub async fn join(&self) -> Result<()> {
        self.bundle.stopped().await;
        self.tracker.wait().await;
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Requests termination and waits for the loop to stop.
    ///
    /// Valid only while `Working`. Waits up to the configured stop timeout
    /// for `Stopped` (recording a [`Error::StopTimeout`] on overrun), then
    /// resolves the terminal result: the loop's (or finalizer's) own error
    /// if one was recorded, otherwise the caller-supplied `reason`. When
    /// the loop is not working this returns the stored error, or
    /// [`Error::NotWorking`]; repeated calls are safe.
    #[instrument(skip(self, reason))]
    pub async fn stop(&self, reason: Option<anyhow::Error>) -> Result<()> {
        if self.bundle.status() != Status::Working {
            return match self.err() {
                Some(err) => Err(err),
                None => Err(Error::NotWorking),
            };
        }
        self.closer.close();
        match timeout(self.stop_timeout, self.bundle.stopped()).await {
            // `Stopped` is broadcast at the tail of the worker task, so
            // waiting out the tracker here is immediate; it pins down that
            // the task itself is gone, not just the status.
            Ok(()) => self.tracker.wait().await,
            Err(_) => {
                warn!(timeout = ?self.stop_timeout, "loop did not stop in time");
                let mut terminal = self.terminal.lock().unwrap_or_else(PoisonError::into_inner);
                if terminal.is_none() {
                    *terminal = Some(Error::StopTimeout(self.stop_timeout));
                }
            }
        }
        let mut terminal = self.terminal.lock().unwrap_or_else(PoisonError::into_inner);
        if terminal.is_none() {
            *terminal = reason.map(Error::action);
        }
        match terminal.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

async fn run(mut body: Body, closer: Closer, bundle: Arc<Bundle>, terminal: Arc<Mutex<Option<Error>>>) {
    let mut result = Ok(());
    loop {
        let work = (body.worker)(closer.token());
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(())) => break,
            Ok(Err(err)) => {
                result = Err(err);
                break;
            }
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                warn!(%reason, "worker panicked");
                match body.recoverer.as_mut() {
                    Some(recoverer) => match recoverer(reason).await {
                        Ok(()) => continue,
                        Err(err) => {
                            result = Err(Error::action(err));
                            break;
                        }
                    },
                    None => {
                        result = Err(Error::Panicked(reason));
                        break;
                    }
                }
            }
        }
    }
    bundle.notify(Status::Stopping);
    if let Some(finalizer) = body.finalizer.take() {
        result = finalizer(result);
    }
    if let Err(err) = result {
        let mut terminal = terminal.lock().unwrap_or_else(PoisonError::into_inner);
        terminal.get_or_insert(err);
    }
    bundle.notify(Status::Stopped);
    closer.close();
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        (*reason).to_owned()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}
