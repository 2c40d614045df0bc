//! Per-key debounce for editor input.
//!
//! Rapid edits to the same sample coalesce: only the latest value survives,
//! and it fires once no new edit has arrived for the idle window. Bursts
//! fire in the order they started; nothing is ever reordered within a key.

use std::time::{Duration, Instant};

#[derive(Debug)]
struct Pending<K, V> {
    key: K,
    value: V,
    last_push: Instant,
}

#[derive(Debug)]
pub struct Debouncer<K, V> {
    window: Duration,
    pending: Vec<Pending<K, V>>,
}

impl<K: PartialEq, V> Debouncer<K, V> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record an edit; supersedes any pending value for the same key.
    pub fn push(&mut self, key: K, value: V, now: Instant) {
        match self.pending.iter_mut().find(|p| p.key == key) {
            Some(pending) => {
                pending.value = value;
                pending.last_push = now;
            }
            None => self.pending.push(Pending {
                key,
                value,
                last_push: now,
            }),
        }
    }

    /// The earliest instant at which something becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.last_push + self.window).min()
    }

    /// Remove and return every entry whose idle window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let window = self.window;
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.last_push + window <= now);
        self.pending = waiting;
        due.into_iter().map(|p| (p.key, p.value)).collect()
    }

    /// Remove and return everything, due or not.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|p| (p.key, p.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    #[test]
    fn test_burst_coalesces_to_latest() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.push("a", 1, start);
        debouncer.push("a", 2, start + Duration::from_millis(50));
        debouncer.push("a", 3, start + Duration::from_millis(100));

        assert!(debouncer.take_due(start + Duration::from_millis(250)).is_empty());
        assert_eq!(
            debouncer.take_due(start + Duration::from_millis(300)),
            vec![("a", 3)]
        );
        assert!(debouncer.is_empty());
    }

    #[test]
    fn test_deadline_tracks_last_push() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        assert_eq!(debouncer.next_deadline(), None);

        debouncer.push("a", (), start);
        debouncer.push("a", (), start + Duration::from_millis(150));
        assert_eq!(
            debouncer.next_deadline(),
            Some(start + Duration::from_millis(350))
        );
    }

    #[test]
    fn test_keys_fire_in_burst_order() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.push("b", 1, start);
        debouncer.push("a", 1, start + Duration::from_millis(10));
        debouncer.push("b", 2, start + Duration::from_millis(20));

        assert_eq!(
            debouncer.take_due(start + Duration::from_millis(500)),
            vec![("b", 2), ("a", 1)]
        );
    }

    #[test]
    fn test_independent_keys() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.push("a", 1, start);
        debouncer.push("b", 1, start + Duration::from_millis(150));

        assert_eq!(
            debouncer.take_due(start + Duration::from_millis(200)),
            vec![("a", 1)]
        );
        assert_eq!(debouncer.len(), 1);
        assert_eq!(debouncer.drain(), vec![("b", 1)]);
    }

    #[test]
    fn test_zero_window_fires_immediately() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);

        debouncer.push("a", 1, start);
        assert_eq!(debouncer.take_due(start), vec![("a", 1)]);
    }
}
