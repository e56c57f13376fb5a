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

#![forbid(unsafe_code)]

//! # Cellmesh
//!
//! Supervised concurrency building blocks on top of Tokio, from single
//! background tasks up to a pub/sub mesh of stream-processing cells.
//!
//! ## Key Concepts
//!
//! - **Loop**: a supervised background task with panic recovery, a
//!   finalizer hook, and a monotonic lifecycle status.
//! - **Actor**: a serialized mailbox running submitted actions one at a
//!   time, in order, on top of a Loop.
//! - **Notifier / Bundle**: broadcast of the lifecycle transitions
//!   (`Starting → Ready → Working → Stopping → Stopped`) to any number of
//!   observers.
//! - **Mesh / Cells**: a registry of named cells, each hosting a
//!   user-defined [`Behavior`](prelude::Behavior) on its own actor, wired
//!   into a pub/sub topology.
//! - **Behaviors**: ready-made stream-processing behaviors (collecting,
//!   combining, routing, rate and countdown logic) in [`behaviors`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cellmesh::prelude::*;
//!
//! let mesh = Mesh::new();
//! mesh.spawn_cells(vec![Box::new(my_behavior)]).await?;
//! mesh.subscribe("source", &["sink"]).await?;
//! mesh.emit("source", Event::new("process", Payload::new().set("n", 1))).await?;
//! ```

/// Ready-made stream-processing behaviors for mesh cells.
pub mod behaviors;

/// A prelude module for conveniently importing the most commonly used items.
pub mod prelude {
    pub use cellmesh_core::prelude::*;

    pub use crate::behaviors::{
        Callback, Collector, Combo, Countdown, CriterionMatch, Cronjob, MeshRouter, Router, Sink,
        Ticker, TOPIC_COLLECTED, TOPIC_COMBO, TOPIC_PROCESS, TOPIC_RESET, TOPIC_TICK,
    };
}
