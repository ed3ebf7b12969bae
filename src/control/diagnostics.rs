//! Bounded FIFO of received control messages

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::message::ControlMessage;

/// Diagnostic log of the most recent control messages, oldest evicted first
#[derive(Debug)]
pub struct DiagnosticLog {
    capacity: usize,
    entries: Mutex<VecDeque<ControlMessage>>,
}

impl DiagnosticLog {
    /// Log retaining at most `capacity` messages (0 disables retention)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Maximum retained messages
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message, evicting the oldest when full
    pub fn record(&self, message: ControlMessage) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(message);
    }

    /// Copy of the retained messages, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<ControlMessage> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of retained messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every retained message
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(name: &str) -> ControlMessage {
        ControlMessage::parse(&format!(r#"{{"hook_event_name":"{name}"}}"#)).unwrap()
    }

    #[test]
    fn evicts_oldest_first() {
        let log = DiagnosticLog::new(2);
        log.record(message("SessionStart"));
        log.record(message("PreToolUse"));
        log.record(message("Stop"));

        let names: Vec<String> = log.snapshot().iter().map(|m| m.event.to_string()).collect();
        assert_eq!(names, ["PreToolUse", "Stop"]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let log = DiagnosticLog::new(0);
        log.record(message("Stop"));
        assert!(log.is_empty());
    }
}
