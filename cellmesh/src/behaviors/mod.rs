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

//! Ready-made stream-processing behaviors.
//!
//! Each behavior here is a generic building block parameterized with user
//! closures: buffer-and-fold ([`Collector`]), pattern matching over a
//! sliding window ([`Combo`]), countdown batching ([`Countdown`]),
//! targeted delivery ([`Router`], [`MeshRouter`]), periodic emission
//! ([`Ticker`], [`Cronjob`]), and plain per-event callbacks
//! ([`Callback`]). They communicate over the well-known topics below.

mod callback;
mod collector;
mod combo;
mod countdown;
mod cronjob;
mod router;
mod sink;
mod ticker;

pub use callback::Callback;
pub use collector::{Collector, SinkProcessor};
pub use combo::{Combo, Criterion, CriterionMatch};
pub use countdown::{Countdown, Zeroer};
pub use cronjob::Cronjob;
pub use router::{MeshRouter, Route, Router};
pub use sink::Sink;
pub use ticker::Ticker;

/// Asks a collecting behavior to fold its buffer now.
pub const TOPIC_PROCESS: &str = "process";
/// Asks a stateful behavior to drop its buffered state.
pub const TOPIC_RESET: &str = "reset";
/// Carried by periodic emissions of [`Ticker`] and [`Cronjob`].
pub const TOPIC_TICK: &str = "tick";
/// Carries a [`Collector`] fold result to its subscribers.
pub const TOPIC_COLLECTED: &str = "collected";
/// Carries a completed [`Combo`] match to its subscribers.
pub const TOPIC_COMBO: &str = "combo";
