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

//! Lifecycle status broadcasting.
//!
//! A [`Notifier`] hands out one permanently-closing channel per lifecycle
//! status; a [`Bundle`] owns the canonical status and fans every qualifying
//! transition out to all registered notifiers. Transitions are strictly
//! forward and idempotent: notifying a status at or below the current one
//! is silently dropped.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Lifecycle status of a loop, actor, or cell.
///
/// Statuses only ever move forward. `Starting` is the construction phase
/// and has no broadcast channel of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Under construction; not yet observable.
    Starting,
    /// Fully built, waiting to be started.
    Ready,
    /// The worker is running.
    Working,
    /// Termination has begun; the finalizer may still run.
    Stopping,
    /// Terminated; the terminal error (if any) is settled.
    Stopped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Starting => write!(f, "starting"),
            Status::Ready => write!(f, "ready"),
            Status::Working => write!(f, "working"),
            Status::Stopping => write!(f, "stopping"),
            Status::Stopped => write!(f, "stopped"),
        }
    }
}

/// A per-waiter set of one-shot lifecycle channels.
///
/// Each channel closes permanently the first time its status is reached and
/// is safe for any number of concurrent waiters. A notifier only fires for
/// transitions that actually happen: if the owning [`Bundle`] jumps from
/// `Ready` straight to `Stopping`, the `working` channel never closes.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    ready: CancellationToken,
    working: CancellationToken,
    stopping: CancellationToken,
    stopped: CancellationToken,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completes once `Ready` has been reached.
    pub async fn ready(&self) {
        self.ready.cancelled().await;
    }

    /// Completes once `Working` has been reached.
    pub async fn working(&self) {
        self.working.cancelled().await;
    }

    /// Completes once `Stopping` has been reached.
    pub async fn stopping(&self) {
        self.stopping.cancelled().await;
    }

    /// Completes once `Stopped` has been reached.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Fires the channel belonging to `status`, and only that one.
    ///
    /// Monotonicity is enforced by the owning [`Bundle`], not here; an
    /// out-of-order transition dropped by the bundle leaves the skipped
    /// channels permanently unfired.
    pub(crate) fn notify(&self, status: Status) {
        match status {
            Status::Starting => {}
            Status::Ready => self.ready.cancel(),
            Status::Working => self.working.cancel(),
            Status::Stopping => self.stopping.cancel(),
            Status::Stopped => self.stopped.cancel(),
        }
    }
}

/// Canonical status holder fanning transitions out to registered notifiers.
#[derive(Debug)]
pub struct Bundle {
    inner: Mutex<Inner>,
    stopped: CancellationToken,
}

#[derive(Debug)]
struct Inner {
    status: Status,
    notifiers: Vec<Notifier>,
}

impl Bundle {
    pub fn new() -> Self {
        Bundle {
            inner: Mutex::new(Inner {
                status: Status::Starting,
                notifiers: Vec::new(),
            }),
            stopped: CancellationToken::new(),
        }
    }

    /// Registers an additional notifier. Transitions that already happened
    /// are not replayed.
    pub fn register(&self, notifier: Notifier) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .notifiers
            .push(notifier);
    }

    pub fn status(&self) -> Status {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    /// Advances the canonical status and broadcasts the transition.
    ///
    /// Returns `false` (and does nothing) when `status` is at or below the
    /// current one, which makes repeated and out-of-order notifications
    /// harmless.
    pub fn notify(&self, status: Status) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if status <= inner.status {
            trace!(current = %inner.status, dropped = %status, "status transition dropped");
            return false;
        }
        trace!(from = %inner.status, to = %status, "status transition");
        inner.status = status;
        for notifier in &inner.notifiers {
            notifier.notify(status);
        }
        drop(inner);
        if status == Status::Stopped {
            self.stopped.cancel();
        }
        true
    }

    /// Completes once the bundle has reached `Stopped`.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}
