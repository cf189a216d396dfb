use alloc::collections::VecDeque;

use tickos_abi::Tid;
use tickos_lib::klog_trace;

use super::scheduler::Scheduler;
use super::thread::QueueLink;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SleepEntry {
    tid: Tid,
    wake_tick: u64,
}

/// Sleeping threads sorted by ascending wake tick, FIFO among equal ticks.
pub struct SleepQueue {
    entries: VecDeque<SleepEntry>,
}

impl SleepQueue {
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

    pub fn insert(&mut self, tid: Tid, wake_tick: u64) {
        let idx = self.entries.partition_point(|e| e.wake_tick <= wake_tick);
        self.entries.insert(idx, SleepEntry { tid, wake_tick });
    }

    /// Pop the head if its deadline has passed. Entries behind a not-yet-due
    /// head are never examined.
    pub fn pop_due(&mut self, now_tick: u64) -> Option<Tid> {
        let head = self.entries.front()?;
        if tick_reached(now_tick, head.wake_tick) {
            self.entries.pop_front().map(|e| e.tid)
        } else {
            None
        }
    }

    pub fn next_wake_tick(&self) -> Option<u64> {
        self.entries.front().map(|e| e.wake_tick)
    }

    pub fn wake_tick_of(&self, tid: Tid) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.tid == tid)
            .map(|e| e.wake_tick)
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
}

impl Default for SleepQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn tick_reached(now_tick: u64, deadline_tick: u64) -> bool {
    now_tick.wrapping_sub(deadline_tick) < (1u64 << 63)
}

impl Scheduler {
    /// Block the running thread for `ticks` timer ticks.
    ///
    /// The thread becomes Ready on the first tick at which the tick counter
    /// reaches `now + ticks`. Non-positive durations return immediately.
    pub fn sleep(&mut self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        let current = self.current();
        assert!(current != self.idle_tid(), "idle thread cannot sleep");
        assert!(!self.in_interrupt(), "sleep from interrupt context");

        let wake_tick = self.ticks().wrapping_add(ticks as u64);
        self.sleepers.insert(current, wake_tick);
        self.thread_mut(current).link = QueueLink::Sleeping;
        klog_trace!("sched: thread {} sleeps until tick {}", current, wake_tick);
        self.block();
    }

    /// Unblock every sleeper whose wake tick has been reached.
    pub(crate) fn wake_due_sleepers(&mut self) -> usize {
        let now = self.ticks();
        let mut woken = 0;
        while let Some(tid) = self.sleepers.pop_due(now) {
            self.make_ready(tid);
            woken += 1;
        }
        woken
    }

    pub fn sleeping_count(&self) -> usize {
        self.sleepers.len()
    }

    pub fn next_wake_tick(&self) -> Option<u64> {
        self.sleepers.next_wake_tick()
    }

    pub fn wake_tick_of(&self, tid: Tid) -> Option<u64> {
        self.sleepers.wake_tick_of(tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_by_deadline_fifo_on_ties() {
        let mut q = SleepQueue::new();
        q.insert(1, 50);
        q.insert(2, 20);
        q.insert(3, 50);
        q.insert(4, 30);
        assert_eq!(q.next_wake_tick(), Some(20));

        assert_eq!(q.pop_due(19), None);
        assert_eq!(q.pop_due(20), Some(2));
        assert_eq!(q.pop_due(20), None);
        assert_eq!(q.pop_due(60), Some(4));
        assert_eq!(q.pop_due(60), Some(1));
        assert_eq!(q.pop_due(60), Some(3));
        assert!(q.is_empty());
    }

    #[test]
    fn test_remove_and_lookup() {
        let mut q = SleepQueue::new();
        q.insert(7, 100);
        q.insert(8, 90);
        assert_eq!(q.wake_tick_of(7), Some(100));
        assert!(q.remove(8));
        assert!(!q.remove(8));
        assert_eq!(q.len(), 1);
        assert_eq!(q.wake_tick_of(8), None);
    }

    #[test]
    fn test_tick_reached_handles_wrap() {
        assert!(tick_reached(10, 10));
        assert!(tick_reached(11, 10));
        assert!(!tick_reached(9, 10));
        assert!(tick_reached(2, u64::MAX - 1));
    }
}
