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

use std::sync::Arc;
use std::time::Duration;

use crate::runtime::Status;

/// Convenience alias used throughout the kernel.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the Cellmesh kernel.
///
/// User-supplied failures (worker bodies, actions, behavior methods) arrive
/// as [`anyhow::Error`] and are wrapped behind an `Arc` so a terminal error
/// can be handed out as-is to every later caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A builder option was rejected before any task was started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The loop was asked to start while not in the `Ready` status.
    #[error("loop status is {0}, expected ready")]
    NotReady(Status),
    /// The loop was asked to stop while not in the `Working` status.
    #[error("loop is not working")]
    NotWorking,
    /// The loop did not reach `Stopped` within the configured stop timeout.
    #[error("stop timed out after {0:?}")]
    StopTimeout(Duration),
    /// A synchronous action did not complete within the caller's budget.
    /// The queued action is not cancelled and still runs later.
    #[error("synchronous action timed out after {0:?}")]
    Timeout(Duration),
    /// The waited-on action was dropped before it signalled completion.
    #[error("action was interrupted before completion")]
    Interrupted,
    /// A worker panicked and no recoverer was configured.
    #[error("worker panicked: {0}")]
    Panicked(String),
    /// The actor's mailbox is gone; the backing loop has ended.
    #[error("mailbox is closed")]
    MailboxClosed,
    /// No cell is registered under the given ID.
    #[error("no cell with id {0:?}")]
    UnknownCell(String),
    /// A behavior's `init` failed; the cell never became visible.
    #[error("cell {id:?} failed to initialize: {cause}")]
    Init {
        /// ID of the behavior that failed to initialize.
        id: String,
        /// The underlying initialization failure.
        cause: Arc<anyhow::Error>,
    },
    /// A user-supplied action, worker, or recoverer returned an error.
    #[error("{0}")]
    Action(Arc<anyhow::Error>),
    /// Several independent failures collected by a bulk operation.
    #[error("{} errors occurred: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<Error>),
    /// A reply was attempted but nobody is listening (or one was already sent).
    #[error("no reply listener")]
    NoReplyListener,
}

impl Error {
    /// Wraps a user-supplied error.
    pub fn action(err: impl Into<anyhow::Error>) -> Self {
        Error::Action(Arc::new(err.into()))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Action(Arc::new(err))
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_lists_every_failure() {
        let err = Error::Multiple(vec![
            Error::UnknownCell("a".into()),
            Error::NotWorking,
        ]);
        let rendered = err.to_string();
        assert!(rendered.starts_with("2 errors occurred"));
        assert!(rendered.contains("no cell with id \"a\""));
        assert!(rendered.contains("loop is not working"));
    }

    #[test]
    fn action_errors_render_transparently() {
        let err = Error::action(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
    }
}
