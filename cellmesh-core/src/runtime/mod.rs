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

mod actor;
mod closer;
mod looper;
mod status;

pub use actor::{Action, Actor, ActorBuilder, DEFAULT_QUEUE_CAPACITY};
pub use closer::Closer;
pub use looper::{Finalizer, Loop, LoopBuilder, Recoverer, Worker, DEFAULT_STOP_TIMEOUT};
pub use status::{Bundle, Notifier, Status};
