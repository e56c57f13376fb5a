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

//! The nested, path-addressable key/value message body.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;

use crate::errors::{Error, Result};

/// A payload value: a scalar, or another payload for nesting.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(SystemTime),
    Duration(Duration),
    Nested(Payload),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<SystemTime> for Value {
    fn from(value: SystemTime) -> Self {
        Value::Time(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl From<Payload> for Value {
    fn from(value: Payload) -> Self {
        Value::Nested(value)
    }
}

/// An ordered-irrelevant mapping of string keys to values, with nested
/// payloads reachable via slash-separated paths like `"ab/bb/ca"`.
///
/// Typed accessors never fail: missing or unconvertible data yields the
/// caller-supplied default. A payload may additionally carry a one-shot
/// buffered reply channel, see [`Payload::with_reply`].
#[derive(Debug, Clone, Default)]
pub struct Payload {
    values: HashMap<String, Value>,
    reply: Option<mpsc::Sender<Payload>>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consuming setter: `Payload::new().set("a", 1).set("b", nested)`.
    ///
    /// A nested value set under a key that already holds a nested payload
    /// is deep-merged rather than overwritten, so path lookups keep working
    /// across repeated sets.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    /// Merges every entry of `other` into this payload, nesting-aware.
    pub fn merge(&mut self, other: Payload) {
        for (key, value) in other.values {
            self.insert(key, value);
        }
    }

    fn insert(&mut self, key: String, value: Value) {
        match value {
            Value::Nested(incoming) => match self.values.get_mut(&key) {
                Some(Value::Nested(existing)) => existing.merge(incoming),
                _ => {
                    self.values.insert(key, Value::Nested(incoming));
                }
            },
            other => {
                self.values.insert(key, other);
            }
        }
    }

    /// Looks a value up by slash-separated path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let mut value = self.values.get(segments.next()?)?;
        for segment in segments {
            match value {
                Value::Nested(nested) => value = nested.values.get(segment)?,
                _ => return None,
            }
        }
        Some(value)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn bool_at(&self, path: &str, default: bool) -> bool {
        match self.get(path) {
            Some(Value::Bool(value)) => *value,
            Some(Value::String(value)) => value.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn int_at(&self, path: &str, default: i64) -> i64 {
        match self.get(path) {
            Some(Value::Int(value)) => *value,
            Some(Value::Float(value)) => *value as i64,
            Some(Value::String(value)) => value.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn float_at(&self, path: &str, default: f64) -> f64 {
        match self.get(path) {
            Some(Value::Float(value)) => *value,
            Some(Value::Int(value)) => *value as f64,
            Some(Value::String(value)) => value.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn string_at(&self, path: &str, default: &str) -> String {
        match self.get(path) {
            Some(Value::String(value)) => value.clone(),
            Some(Value::Bool(value)) => value.to_string(),
            Some(Value::Int(value)) => value.to_string(),
            Some(Value::Float(value)) => value.to_string(),
            _ => default.to_owned(),
        }
    }

    pub fn time_at(&self, path: &str, default: SystemTime) -> SystemTime {
        match self.get(path) {
            Some(Value::Time(value)) => *value,
            _ => default,
        }
    }

    /// Durations convert from integer values interpreted as milliseconds.
    pub fn duration_at(&self, path: &str, default: Duration) -> Duration {
        match self.get(path) {
            Some(Value::Duration(value)) => *value,
            Some(Value::Int(value)) if *value >= 0 => Duration::from_millis(*value as u64),
            _ => default,
        }
    }

    /// Attaches a one-shot buffered reply channel and hands back its
    /// receiving end.
    pub fn with_reply(mut self) -> (Self, mpsc::Receiver<Payload>) {
        let (reply, receiver) = mpsc::channel(1);
        self.reply = Some(reply);
        (self, receiver)
    }

    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Sends a reply without ever blocking.
    ///
    /// Fails with [`Error::NoReplyListener`] when the payload carries no
    /// reply channel, a reply was already sent, or the receiver is gone.
    pub fn reply(&self, payload: Payload) -> Result<()> {
        let Some(reply) = &self.reply else {
            return Err(Error::NoReplyListener);
        };
        reply.try_send(payload).map_err(|_| Error::NoReplyListener)
    }
}

impl From<HashMap<String, Value>> for Payload {
    fn from(values: HashMap<String, Value>) -> Self {
        let mut payload = Payload::new();
        for (key, value) in values {
            payload.insert(key, value);
        }
        payload
    }
}
