//! Condition variables (Mesa semantics).
//!
//! Each waiter parks on a private one-shot semaphore. A signal removes the
//! highest-priority waiter and, because the signaller must hold the lock,
//! queues that waiter directly on the lock: it wakes already owning it.

use tickos_lib::klog_trace;

use super::{CondId, CondWaiter, LockId, highest_priority_index};
use super::lock::Lock;
use crate::scheduler::{Scheduler, with_scheduler};

impl Scheduler {
    pub fn cond_create(&mut self) -> CondId {
        self.alloc_cond()
    }

    /// Atomically release `lock` and wait for a signal; `lock` is held again
    /// when the thread next runs.
    pub fn cond_wait(&mut self, cond: CondId, lock: LockId) {
        let current = self.current();
        self.assert_cond_lock_held(cond, lock);
        assert!(!self.in_interrupt(), "{} wait in interrupt context", cond);

        let sema = self.alloc_sema(0);
        self.cond_mut(cond).waiters.push(CondWaiter { tid: current, sema });
        self.sema_enqueue(sema, current);
        self.lock_release_no_preempt(lock);
        self.block();
    }

    /// Wake the highest-priority waiter, if any.
    pub fn cond_signal(&mut self, cond: CondId, lock: LockId) {
        self.assert_cond_lock_held(cond, lock);
        assert!(!self.in_interrupt(), "{} signal in interrupt context", cond);

        let best = highest_priority_index(&self.cond(cond).waiters, |w| {
            self.thread(w.tid).priority
        });
        let Some(idx) = best else {
            return;
        };
        let waiter = self.cond_mut(cond).waiters.remove(idx);

        // One-shot: the semaphore dies with the signal that consumes it.
        self.sema_mut(waiter.sema)
            .waiters
            .retain(|&tid| tid != waiter.tid);
        self.free_sema(waiter.sema);

        klog_trace!("sched: {} signals thread {}", cond, waiter.tid);
        self.lock_enqueue(lock, waiter.tid);
        self.propagate_donation(lock);
    }

    /// Wake every waiter, highest priority first.
    pub fn cond_broadcast(&mut self, cond: CondId, lock: LockId) {
        self.assert_cond_lock_held(cond, lock);
        while !self.cond(cond).waiters.is_empty() {
            self.cond_signal(cond, lock);
        }
    }

    fn assert_cond_lock_held(&self, cond: CondId, lock: LockId) {
        assert!(
            self.lock_held_by_current(lock),
            "{} used without holding {}",
            cond,
            lock
        );
    }
}

/// Condition variable handle backed by the global scheduler.
pub struct Condition {
    id: CondId,
}

impl Condition {
    pub fn new() -> Self {
        Self {
            id: with_scheduler(|s| s.cond_create()),
        }
    }

    pub fn id(&self) -> CondId {
        self.id
    }

    pub fn wait(&self, lock: &Lock) {
        with_scheduler(|s| s.cond_wait(self.id, lock.id()));
    }

    pub fn signal(&self, lock: &Lock) {
        with_scheduler(|s| s.cond_signal(self.id, lock.id()));
    }

    pub fn broadcast(&self, lock: &Lock) {
        with_scheduler(|s| s.cond_broadcast(self.id, lock.id()));
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}
