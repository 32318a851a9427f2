//! Notifications for the host (renderer, audio, GUI).
//!
//! The core never dispatches globally: operations that produce observable
//! side effects take an `&mut impl EventSink` and push into it.

use crate::body::BodyId;
use std::collections::VecDeque;
use ultraviolet::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakReason {
    /// Stretched past `break_distance_factor * rest_length`.
    Stretched,
    /// Force exceeded the spring's `break_force`.
    Overloaded,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    BodyCreated {
        id: BodyId,
    },
    BodyDeleted {
        id: BodyId,
    },
    /// Two bodies were replaced by `merged`.
    BodiesMerged {
        absorbed: [BodyId; 2],
        merged: BodyId,
    },
    SpringLinked {
        a: BodyId,
        b: BodyId,
    },
    /// Removed on request, as opposed to [`Event::SpringBroken`].
    SpringUnlinked {
        a: BodyId,
        b: BodyId,
    },
    /// `midpoint` is where the spring was when it snapped, for cue placement.
    SpringBroken {
        a: BodyId,
        b: BodyId,
        midpoint: Vec2,
        reason: BreakReason,
    },
    Cleared,
    Paused,
    Resumed,
}

pub trait EventSink {
    fn emit(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

/// First-in first-out buffer for hosts that poll. Holds at most `capacity`
/// events; when full, the oldest one is dropped to make room.
#[derive(Clone, Debug)]
pub struct EventQueue {
    events: VecDeque<Event>,
    capacity: usize,
    dropped: u64,
    overflowing: bool,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl EventQueue {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
            capacity,
            dropped: 0,
            overflowing: false,
        }
    }

    pub fn pop(&mut self) -> Option<Event> {
        let event = self.events.pop_front();
        if self.events.is_empty() {
            self.overflowing = false;
        }
        event
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events discarded because the queue was full, over its whole life.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for EventQueue {
    fn emit(&mut self, event: Event) {
        if self.events.len() >= self.capacity {
            if !self.overflowing {
                log::warn!(
                    "Event queue full ({} events), dropping the oldest until it is drained",
                    self.capacity
                );
                self.overflowing = true;
            }
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: Event) {}
}

/// Forwards each event to a closure.
pub struct FnSink<F>(pub F);

impl<F: FnMut(Event)> EventSink for FnSink<F> {
    fn emit(&mut self, event: Event) {
        (self.0)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_sink_sees_every_event() {
        let mut count = 0;
        {
            let mut sink = FnSink(|_event: Event| count += 1);
            sink.emit(Event::Paused);
            sink.emit(Event::Resumed);
        }
        assert_eq!(count, 2);

        let mut log = Vec::new();
        log.emit(Event::Cleared);
        assert_eq!(log, vec![Event::Cleared]);
    }

    #[test]
    fn full_queue_drops_the_oldest() {
        let mut queue = EventQueue::with_capacity(2);
        queue.emit(Event::Paused);
        queue.emit(Event::Resumed);
        queue.emit(Event::Cleared);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop(), Some(Event::Resumed));
        assert_eq!(queue.pop(), Some(Event::Cleared));
        assert_eq!(queue.pop(), None);

        queue.emit(Event::Paused);
        assert_eq!(queue.pop(), Some(Event::Paused));
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn zero_capacity_still_keeps_the_latest() {
        let mut queue = EventQueue::with_capacity(0);
        queue.emit(Event::Paused);
        queue.emit(Event::Cleared);
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.pop(), Some(Event::Cleared));
        assert!(queue.is_empty());
    }
}
