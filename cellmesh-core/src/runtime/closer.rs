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

use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Aggregates any number of independent termination sources into one done
/// signal.
///
/// Each added source gets a small fan-in task racing to cancel the shared
/// output token; cancellation is close-once, so concurrent or repeated fires
/// are safe. The fan-in task also exits when the output fires first, so no
/// task outlives the closer's purpose.
#[derive(Debug, Clone, Default)]
pub struct Closer {
    done: CancellationToken,
}

impl Closer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires an additional termination source.
    ///
    /// Must be called from within a tokio runtime. Adding a source after
    /// the closer already fired is harmless.
    pub fn add_source(&self, source: CancellationToken) {
        let done = self.done.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = source.cancelled() => {
                    trace!("termination source fired");
                    done.cancel();
                }
                _ = done.cancelled() => {}
            }
        });
    }

    /// Fires the done signal directly.
    pub fn close(&self) {
        self.done.cancel();
    }

    /// Completes once any wired source (or `close`) has fired.
    pub async fn done(&self) {
        self.done.cancelled().await;
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// The shared output token, for use inside `select!` arms.
    pub fn token(&self) -> CancellationToken {
        self.done.clone()
    }
}
