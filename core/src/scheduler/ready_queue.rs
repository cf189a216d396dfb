use alloc::collections::VecDeque;

use tickos_abi::Tid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ReadyEntry {
    tid: Tid,
    priority: u8,
}

/// Runnable threads, highest effective priority first, FIFO among equals.
///
/// Each entry caches the priority it was queued with. The scheduler
/// re-positions an entry whenever the thread's effective priority changes,
/// so the cache never goes stale.
pub struct ReadyQueue {
    entries: VecDeque<ReadyEntry>,
}

impl ReadyQueue {
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue behind every entry of equal or higher priority.
    pub fn insert(&mut self, tid: Tid, priority: u8) {
        debug_assert!(!self.contains(tid), "thread {} queued twice", tid);
        let idx = self.entries.partition_point(|e| e.priority >= priority);
        self.entries.insert(idx, ReadyEntry { tid, priority });
    }

    pub fn pop_front(&mut self) -> Option<Tid> {
        self.entries.pop_front().map(|e| e.tid)
    }

    pub fn front_priority(&self) -> Option<u8> {
        self.entries.front().map(|e| e.priority)
    }

    pub fn remove(&mut self, tid: Tid) -> bool {
        match self.entries.iter().position(|e| e.tid == tid) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Move a queued thread to its slot for `priority`, behind its new equals.
    pub fn reposition(&mut self, tid: Tid, priority: u8) {
        if self.remove(tid) {
            self.insert(tid, priority);
        }
    }

    /// Refresh every cached priority at once and re-sort. The sort is stable,
    /// so threads whose relative order is unchanged keep their FIFO position.
    pub fn resort(&mut self, mut priority_of: impl FnMut(Tid) -> u8) {
        for entry in self.entries.iter_mut() {
            entry.priority = priority_of(entry.tid);
        }
        self.entries
            .make_contiguous()
            .sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.entries.iter().any(|e| e.tid == tid)
    }

    pub fn iter(&self) -> impl Iterator<Item = Tid> + '_ {
        self.entries.iter().map(|e| e.tid)
    }

    pub fn is_sorted(&self) -> bool {
        self.entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .all(|(a, b)| a.priority >= b.priority)
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn order(q: &ReadyQueue) -> Vec<Tid> {
        q.iter().collect()
    }

    #[test]
    fn test_priority_order_fifo_among_equals() {
        let mut q = ReadyQueue::new();
        q.insert(1, 31);
        q.insert(2, 40);
        q.insert(3, 31);
        q.insert(4, 10);
        q.insert(5, 40);
        assert_eq!(order(&q), [2, 5, 1, 3, 4]);
        assert!(q.is_sorted());
        assert_eq!(q.front_priority(), Some(40));
        assert_eq!(q.pop_front(), Some(2));
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn test_reposition_goes_behind_new_equals() {
        let mut q = ReadyQueue::new();
        q.insert(1, 20);
        q.insert(2, 30);
        q.insert(3, 10);
        q.reposition(3, 30);
        assert_eq!(order(&q), [2, 3, 1]);
        q.reposition(2, 5);
        assert_eq!(order(&q), [3, 1, 2]);
        q.reposition(99, 63);
        assert_eq!(q.len(), 3);
        assert!(q.is_sorted());
    }

    #[test]
    fn test_resort_is_stable() {
        let mut q = ReadyQueue::new();
        for tid in 1..=4 {
            q.insert(tid, 31);
        }
        q.resort(|tid| if tid % 2 == 0 { 40 } else { 31 });
        assert_eq!(order(&q), [2, 4, 1, 3]);
        assert!(q.remove(4));
        assert!(!q.contains(4));
        assert!(!q.remove(4));
    }
}
