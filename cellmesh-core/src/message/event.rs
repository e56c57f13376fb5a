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

use std::time::SystemTime;

use crate::message::Payload;

/// A timestamped, topic-tagged message.
///
/// Events are immutable after construction; rerouting one means building a
/// derived event via [`with_topic`](Event::with_topic).
#[derive(Debug, Clone)]
pub struct Event {
    timestamp: SystemTime,
    topic: String,
    payload: Payload,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Payload) -> Self {
        Event {
            timestamp: SystemTime::now(),
            topic: topic.into(),
            payload,
        }
    }

    /// A copy of this event under another topic, keeping the original
    /// timestamp and payload.
    pub fn with_topic(&self, topic: impl Into<String>) -> Self {
        Event {
            timestamp: self.timestamp,
            topic: topic.into(),
            payload: self.payload.clone(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_topic_keeps_timestamp_and_payload() {
        let event = Event::new("process", Payload::new().set("n", 7));
        let rerouted = event.with_topic("audit");
        assert_eq!(rerouted.topic(), "audit");
        assert_eq!(rerouted.timestamp(), event.timestamp());
        assert_eq!(rerouted.payload().int_at("n", 0), 7);
    }
}
