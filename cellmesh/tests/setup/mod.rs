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

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use anyhow::anyhow;
use cellmesh::prelude::*;
use tracing_subscriber::EnvFilter;

// Ensures tracing initialization happens only once across all tests.
static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for tests.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Records every event it receives, for delivery assertions.
pub struct Probe {
    id: String,
    seen: Arc<Mutex<Vec<Event>>>,
}

impl Probe {
    pub fn new(id: &str) -> (Box<dyn Behavior>, Arc<Mutex<Vec<Event>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = Probe {
            id: id.to_owned(),
            seen: seen.clone(),
        };
        (Box::new(probe), seen)
    }
}

#[async_trait]
impl Behavior for Probe {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, _emitter: Emitter) -> anyhow::Result<()> {
        Ok(())
    }

    async fn process(&mut self, event: Event) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(event);
        Ok(())
    }
}

/// Topics recorded by a probe so far.
pub fn topics_of(seen: &Arc<Mutex<Vec<Event>>>) -> Vec<String> {
    seen.lock()
        .unwrap()
        .iter()
        .map(|event| event.topic().to_owned())
        .collect()
}

/// Polls `cond` for up to a second; returns its final verdict.
pub async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// A behavior whose `init` always fails, for spawn-error tests.
pub struct InitFail {
    id: String,
}

impl InitFail {
    pub fn new(id: &str) -> Box<dyn Behavior> {
        Box::new(InitFail { id: id.to_owned() })
    }
}

#[async_trait]
impl Behavior for InitFail {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&mut self, _emitter: Emitter) -> anyhow::Result<()> {
        Err(anyhow!("refusing to start"))
    }

    async fn process(&mut self, _event: Event) -> anyhow::Result<()> {
        Ok(())
    }
}
