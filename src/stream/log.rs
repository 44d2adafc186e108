//! Bounded in-memory event log.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::event::Event;

/// Default number of events retained.
pub const DEFAULT_CAPACITY: usize = 200;

/// Append-only ring of the most recent events, oldest first.
///
/// Display and local derivation only; historical correctness always comes
/// from the fetch interface.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<Arc<Event>>,
    capacity: usize,
}

impl EventLog {
    /// Create a log holding at most `capacity` events (minimum one).
    ///
    /// Storage grows with use; `capacity` is only the retention limit.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&mut self, event: Arc<Event>) {
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Copy of the current contents in arrival order.
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.events.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&Arc<Event>> {
        self.events.back()
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
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
