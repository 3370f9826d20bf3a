//! Shared request counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic per-proxy request counter.
///
/// Every inbound request takes exactly one ticket. The increment and the
/// read are a single `fetch_add`, so concurrent requests can never observe
/// the same value and the Nth completed increment always yields N.
#[derive(Debug, Default)]
pub struct RequestCounter {
    seen: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request and return its 1-indexed arrival position.
    pub fn next(&self) -> u64 {
        self.seen.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of requests recorded so far.
    pub fn current(&self) -> u64 {
        self.seen.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_at_one() {
        let counter = RequestCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn concurrent_tickets_are_unique_and_dense() {
        let counter = Arc::new(RequestCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || (0..1_000).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for ticket in handle.join().unwrap() {
                assert!(seen.insert(ticket), "ticket {ticket} handed out twice");
            }
        }

        assert_eq!(seen.len(), 8_000);
        assert_eq!(seen.iter().copied().min(), Some(1));
        assert_eq!(seen.iter().copied().max(), Some(8_000));
        assert_eq!(counter.current(), 8_000);
    }
}
