//! Single-slot handoff between the network loop and the clipboard thread
//!
//! Each direction holds at most one payload. Publishing replaces whatever is
//! still waiting, so only the latest clipboard state is ever delivered.

use std::sync::{Mutex, PoisonError};

use bytes::Bytes;

/// Outbound and inbound payload slots
#[derive(Debug, Default)]
pub struct SyncSlots {
    outbound: Mutex<Option<Bytes>>,
    inbound: Mutex<Option<Bytes>>,
}

fn replace(slot: &Mutex<Option<Bytes>>, payload: Bytes) -> bool {
    slot.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(payload)
        .is_some()
}

fn take(slot: &Mutex<Option<Bytes>>) -> Option<Bytes> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

impl SyncSlots {
    /// Creates empty slots
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a payload for the peer; returns true if an unsent one was replaced
    pub fn publish_outbound(&self, payload: Bytes) -> bool {
        replace(&self.outbound, payload)
    }

    /// Removes the payload waiting to be sent
    pub fn take_outbound(&self) -> Option<Bytes> {
        take(&self.outbound)
    }

    /// Stores a payload received from the peer; returns true if an unapplied
    /// one was replaced
    pub fn publish_inbound(&self, payload: Bytes) -> bool {
        replace(&self.inbound, payload)
    }

    /// Removes the payload waiting to be applied
    pub fn take_inbound(&self) -> Option<Bytes> {
        take(&self.inbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_last_write_wins() {
        let slots = SyncSlots::new();
        assert!(!slots.publish_outbound(Bytes::from_static(b"first")));
        assert!(slots.publish_outbound(Bytes::from_static(b"second")));

        assert_eq!(slots.take_outbound().unwrap(), Bytes::from_static(b"second"));
        assert_eq!(slots.take_outbound(), None);
    }

    #[test]
    fn test_directions_are_independent() {
        let slots = SyncSlots::new();
        slots.publish_inbound(Bytes::from_static(b"in"));

        assert_eq!(slots.take_outbound(), None);
        assert_eq!(slots.take_inbound().unwrap(), Bytes::from_static(b"in"));
    }

    #[test]
    fn test_concurrent_producers_leave_one_value() {
        let slots = Arc::new(SyncSlots::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let slots = Arc::clone(&slots);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        slots.publish_outbound(Bytes::from(format!("{i}-{j}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(slots.take_outbound().is_some());
        assert!(slots.take_outbound().is_none());
    }
}
