//! Append-only log with a fixed capacity and FIFO eviction.

use std::collections::VecDeque;

/// Default capacity for the thought and event logs.
pub const DEFAULT_LOG_CAP: usize = 200;

/// Ordered, append-only sequence that never holds more than `cap` entries.
///
/// Entries are only ever pushed at the tail; once the log is full the
/// oldest entry is evicted. Iteration order is arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    cap: usize,
    total_appended: u64,
}

impl<T> BoundedLog<T> {
    /// Create an empty log. A `cap` of zero is treated as one.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
            total_appended: 0,
        }
    }

    /// Append at the tail, evicting from the head while over capacity.
    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            let _ = self.entries.pop_front();
        }
        self.total_appended += 1;
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained entries.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Count of every entry ever appended, evicted ones included.
    ///
    /// Consumers compare this against a previously seen value to find the
    /// entries that arrived since.
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    /// Entries in arrival order, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Entries appended after `seen` total appends, oldest first.
    pub fn since(&self, seen: u64) -> impl Iterator<Item = &T> {
        let fresh = self.total_appended.saturating_sub(seen);
        let fresh = usize::try_from(fresh).unwrap_or(usize::MAX).min(self.entries.len());
        self.entries.iter().skip(self.entries.len() - fresh)
    }
}

impl<T: Clone> BoundedLog<T> {
    /// Copy of the retained entries, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl<T> Default for BoundedLog<T> {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_cap_entries() {
        let mut log = BoundedLog::new(2);
        log.push("A");
        log.push("B");
        log.push("C");
        assert_eq!(log.to_vec(), vec!["B", "C"]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_appended(), 3);
    }

    #[test]
    fn zero_cap_clamped() {
        let mut log = BoundedLog::new(0);
        assert_eq!(log.cap(), 1);
        log.push(1);
        log.push(2);
        assert_eq!(log.to_vec(), vec![2]);
    }

    #[test]
    fn default_cap() {
        let log: BoundedLog<u8> = BoundedLog::default();
        assert_eq!(log.cap(), DEFAULT_LOG_CAP);
        assert!(log.is_empty());
        assert!(log.latest().is_none());
    }

    #[test]
    fn since_returns_fresh_entries() {
        let mut log = BoundedLog::new(3);
        log.push(1);
        log.push(2);
        let seen = log.total_appended();
        log.push(3);
        log.push(4);
        assert_eq!(log.since(seen).copied().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(log.since(log.total_appended()).count(), 0);
    }

    #[test]
    fn since_clamps_to_retained() {
        let mut log = BoundedLog::new(2);
        for i in 0..10 {
            log.push(i);
        }
        assert_eq!(log.since(0).copied().collect::<Vec<_>>(), vec![8, 9]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn retains_tail_in_arrival_order(
                cap in 1usize..16,
                items in proptest::collection::vec(any::<u32>(), 0..64),
            ) {
                let mut log = BoundedLog::new(cap);
                for item in &items {
                    log.push(*item);
                    prop_assert!(log.len() <= cap);
                }
                let expected: Vec<u32> = items
                    .iter()
                    .skip(items.len().saturating_sub(cap))
                    .copied()
                    .collect();
                prop_assert_eq!(log.to_vec(), expected);
                prop_assert_eq!(log.latest().copied(), items.last().copied());
            }
        }
    }
}
