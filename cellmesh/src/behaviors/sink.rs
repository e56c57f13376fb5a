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

use std::collections::VecDeque;

use cellmesh_core::prelude::Event;

/// An in-order event buffer, optionally bounded.
///
/// A bounded sink evicts its oldest event on overflow, making it a sliding
/// window over the stream.
#[derive(Debug, Clone, Default)]
pub struct Sink {
    events: VecDeque<Event>,
    max: Option<usize>,
}

impl Sink {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max: usize) -> Self {
        Sink {
            events: VecDeque::with_capacity(max),
            max: Some(max),
        }
    }

    /// Appends `event`, evicting from the front when bounded.
    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
        if let Some(max) = self.max {
            while self.events.len() > max {
                self.events.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first(&self) -> Option<&Event> {
        self.events.front()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.back()
    }

    pub fn at(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Removes and returns the oldest event.
    pub fn pull_first(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Removes and returns the newest event.
    pub fn pull_last(&mut self) -> Option<Event> {
        self.events.pop_back()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// The buffered topics, oldest first.
    pub fn topics(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|event| event.topic().to_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use cellmesh_core::prelude::Payload;

    use super::*;

    #[test]
    fn bounded_sink_slides() {
        let mut sink = Sink::bounded(2);
        for topic in ["a", "b", "c"] {
            sink.push(Event::new(topic, Payload::new()));
        }
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.topics(), vec!["b", "c"]);
        assert_eq!(sink.first().map(Event::topic), Some("b"));
        assert_eq!(sink.last().map(Event::topic), Some("c"));
    }

    #[test]
    fn pulls_remove_from_either_end() {
        let mut sink = Sink::unbounded();
        for topic in ["a", "b", "c"] {
            sink.push(Event::new(topic, Payload::new()));
        }
        assert_eq!(sink.pull_first().map(|e| e.topic().to_owned()), Some("a".into()));
        assert_eq!(sink.pull_last().map(|e| e.topic().to_owned()), Some("c".into()));
        assert_eq!(sink.topics(), vec!["b"]);
    }
}
