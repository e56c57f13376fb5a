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
//! Cellmesh Core Library
//!
//! This library provides the concurrency kernel for the Cellmesh framework:
//! the supervised [`Loop`](crate::runtime::Loop) primitive and its lifecycle
//! broadcast machinery, the serialized-mailbox [`Actor`](crate::runtime::Actor),
//! the [`Event`](crate::message::Event)/[`Payload`](crate::message::Payload)
//! message model, and the pub/sub [`Mesh`](crate::mesh::Mesh) of behavior cells.

/// Shared configuration used throughout the Cellmesh framework.
pub(crate) mod common;
pub(crate) mod errors;
pub(crate) mod mesh;
pub(crate) mod message;
pub(crate) mod runtime;
/// Trait definitions used in the Cellmesh framework.
pub(crate) mod traits;

/// Prelude module for convenient imports.
///
/// This module re-exports the public surface of the kernel, as well as the
/// `async_trait` crate needed to implement [`Behavior`](crate::traits::Behavior).
pub mod prelude {
    pub use async_trait::async_trait;
    pub use tokio_util::sync::CancellationToken;

    pub use crate::common::MeshConfig;
    pub use crate::errors::{Error, Result};
    pub use crate::mesh::{Emitter, Mesh};
    pub use crate::message::{Event, Payload, Value};
    pub use crate::runtime::{
        Action, Actor, ActorBuilder, Bundle, Closer, Finalizer, Loop, LoopBuilder, Notifier,
        Recoverer, Status, Worker, DEFAULT_QUEUE_CAPACITY, DEFAULT_STOP_TIMEOUT,
    };
    pub use crate::traits::Behavior;
}
