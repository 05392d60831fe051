use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::TaskEvent;

/// Number of events kept per task.
pub const TASK_EVENT_CAPACITY: usize = 10;

/// Bounded, insertion-ordered event history.
///
/// When full, the oldest event is evicted before the new one is appended.
/// Decoding a longer list keeps only its newest [`TASK_EVENT_CAPACITY`] entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TaskEvent>", into = "Vec<TaskEvent>")]
pub struct EventRing {
    events: VecDeque<TaskEvent>,
}

impl EventRing {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(TASK_EVENT_CAPACITY),
        }
    }

    pub fn push(&mut self, event: TaskEvent) {
        if self.events.len() == TASK_EVENT_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskEvent> {
        self.events.iter()
    }

    pub fn first(&self) -> Option<&TaskEvent> {
        self.events.front()
    }

    pub fn last(&self) -> Option<&TaskEvent> {
        self.events.back()
    }
}

impl From<Vec<TaskEvent>> for EventRing {
    fn from(events: Vec<TaskEvent>) -> Self {
        let mut ring = EventRing::new();
        for e in events {
            ring.push(e);
        }
        ring
    }
}

impl From<EventRing> for Vec<TaskEvent> {
    fn from(ring: EventRing) -> Self {
        ring.events.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskEventKind;

    fn numbered(n: usize) -> TaskEvent {
        TaskEvent::new(TaskEventKind::DriverMessage).with_message(format!("event-{n}"))
    }

    #[test]
    fn eleventh_event_evicts_the_first() {
        let mut ring = EventRing::new();
        for n in 1..=11 {
            ring.push(numbered(n));
        }

        assert_eq!(ring.len(), TASK_EVENT_CAPACITY);
        assert!(ring.iter().all(|e| e.message != "event-1"));
        assert_eq!(ring.first().unwrap().message, "event-2");
        assert_eq!(ring.last().unwrap().message, "event-11");
    }

    #[test]
    fn order_is_preserved_below_capacity() {
        let mut ring = EventRing::new();
        for n in 1..=3 {
            ring.push(numbered(n));
        }
        let msgs: Vec<_> = ring.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(msgs, ["event-1", "event-2", "event-3"]);
    }

    #[test]
    fn decoding_an_oversized_list_keeps_the_newest() {
        let events: Vec<TaskEvent> = (1..=15).map(numbered).collect();
        let json = serde_json::to_string(&events).unwrap();

        let ring: EventRing = serde_json::from_str(&json).unwrap();
        assert_eq!(ring.len(), TASK_EVENT_CAPACITY);
        assert_eq!(ring.first().unwrap().message, "event-6");
        assert_eq!(ring.last().unwrap().message, "event-15");
    }
}
