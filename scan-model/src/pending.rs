//! The process-wide count of leaves with an outstanding, not-yet-responded
//! access.
//!
//! Mutated from host callbacks running on different
//! [`crate::interface::AccessInterface`] worker threads, so this is a
//! dedicated `AtomicI64` rather than a plain integer behind a mutex.

use std::sync::atomic::{AtomicI64, Ordering};

/// Tracks how many leaves currently have a request in flight.
///
/// [`crate::scheduler::Scheduler`]'s worker loop spins while this is above
/// zero; every leaf, mux, TAP, network and portal node increments it when it
/// synthesizes a request and decrements it once the matching response has
/// been fully processed.
#[derive(Default)]
pub struct PendingTracker {
    count: AtomicI64,
}

impl PendingTracker {
    /// A tracker starting at zero.
    pub fn new() -> Self {
        PendingTracker {
            count: AtomicI64::new(0),
        }
    }

    /// Registers one more outstanding access.
    pub fn mark(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Clears one outstanding access. Clamped at zero so an error path that
    /// double-clears never drives the counter negative.
    pub fn clear(&self) {
        let _ = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(if v > 0 { v - 1 } else { 0 })
            });
    }

    /// The current count of outstanding accesses.
    pub fn get(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_below_zero_clamps() {
        let t = PendingTracker::new();
        t.clear();
        t.clear();
        assert_eq!(t.get(), 0);
    }

    #[test]
    fn mark_then_clear_nets_zero() {
        let t = PendingTracker::new();
        t.mark();
        t.mark();
        t.clear();
        assert_eq!(t.get(), 1);
    }
}
