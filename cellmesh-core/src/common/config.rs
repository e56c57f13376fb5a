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

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::runtime::{DEFAULT_QUEUE_CAPACITY, DEFAULT_STOP_TIMEOUT};

const ENV_QUEUE_CAPACITY: &str = "CELLMESH_QUEUE_CAPACITY";
const ENV_STOP_TIMEOUT_MS: &str = "CELLMESH_STOP_TIMEOUT_MS";

/// Per-mesh settings applied to every spawned cell.
///
/// Resolution order: defaults, then the optional TOML file at the XDG
/// config location (`~/.config/cellmesh/config.toml`), then environment
/// variables. A malformed file or variable is logged and ignored rather
/// than failing mesh construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Bound of each cell's action queue.
    pub queue_capacity: usize,
    /// How long a cell teardown waits before recording a timeout, in
    /// milliseconds.
    pub stop_timeout_ms: u64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        MeshConfig {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT.as_millis() as u64,
        }
    }
}

impl MeshConfig {
    /// Resolves the effective configuration from file and environment.
    pub fn load() -> Self {
        let mut config = Self::from_file().unwrap_or_default();
        config.apply_env();
        config
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    fn from_file() -> Option<Self> {
        let dirs = xdg::BaseDirectories::with_prefix("cellmesh").ok()?;
        let path = dirs.find_config_file("config.toml")?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), %err, "could not read config file");
                return None;
            }
        };
        match toml::from_str(&raw) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config file");
                Some(config)
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "malformed config file ignored");
                None
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(ENV_QUEUE_CAPACITY) {
            match raw.parse() {
                Ok(value) => self.queue_capacity = value,
                Err(_) => warn!(var = ENV_QUEUE_CAPACITY, %raw, "ignoring unparsable value"),
            }
        }
        if let Ok(raw) = std::env::var(ENV_STOP_TIMEOUT_MS) {
            match raw.parse() {
                Ok(value) => self.stop_timeout_ms = value,
                Err(_) => warn!(var = ENV_STOP_TIMEOUT_MS, %raw, "ignoring unparsable value"),
            }
        }
    }
}
