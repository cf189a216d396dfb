//! Non-recursive lock with priority donation.
//!
//! A lock is a binary semaphore plus an owner. A thread that has to wait
//! lends its priority to the holder (and onward along the holder's own
//! wait chain) until it gets the lock.

use tickos_abi::Tid;
use tickos_lib::klog_trace;

use super::{LockId, highest_priority_index};
use crate::scheduler::{QueueLink, Scheduler, with_scheduler};

impl Scheduler {
    pub fn lock_create(&mut self) -> LockId {
        self.alloc_lock()
    }

    pub fn lock_acquire(&mut self, id: LockId) {
        let current = self.current();
        assert!(
            self.lock_state(id).holder != Some(current),
            "{} already held by thread {}",
            id,
            current
        );
        if self.lock_take(id, current) {
            return;
        }
        assert!(
            !self.in_interrupt(),
            "{} would block in interrupt context",
            id
        );
        self.lock_enqueue(id, current);
        self.propagate_donation(id);
        self.block();
    }

    pub fn lock_try_acquire(&mut self, id: LockId) -> bool {
        let current = self.current();
        assert!(
            self.lock_state(id).holder != Some(current),
            "{} already held by thread {}",
            id,
            current
        );
        self.lock_take(id, current)
    }

    pub fn lock_release(&mut self, id: LockId) {
        self.lock_release_no_preempt(id);
        self.preempt_check();
    }

    /// Release without yielding to a newly favoured thread. The caller is
    /// about to block anyway.
    pub(crate) fn lock_release_no_preempt(&mut self, id: LockId) {
        let current = self.current();
        assert!(
            self.lock_state(id).holder == Some(current),
            "{} released by thread {} which does not hold it",
            id,
            current
        );
        self.lock_state_mut(id).holder = None;
        self.thread_mut(current).held_locks.retain(|&held| held != id);
        self.refresh_priority(current);

        let best = highest_priority_index(&self.lock_state(id).sema.waiters, |&tid| {
            self.thread(tid).priority
        });
        match best {
            Some(idx) => {
                let next = self.lock_state_mut(id).sema.waiters.remove(idx);
                klog_trace!("sched: {} handed from {} to {}", id, current, next);
                self.lock_grant(id, next);
                self.make_ready(next);
            }
            None => self.lock_state_mut(id).sema.value += 1,
        }
    }

    pub fn lock_held_by_current(&self, id: LockId) -> bool {
        self.lock_state(id).holder == Some(self.current())
    }

    pub fn lock_holder(&self, id: LockId) -> Option<Tid> {
        self.lock_state(id).holder
    }

    /// Take the lock for `tid` if it is free.
    fn lock_take(&mut self, id: LockId, tid: Tid) -> bool {
        let sema = &mut self.lock_state_mut(id).sema;
        if sema.value == 0 {
            return false;
        }
        sema.value -= 1;
        self.lock_grant(id, tid);
        true
    }

    fn lock_grant(&mut self, id: LockId, tid: Tid) {
        self.lock_state_mut(id).holder = Some(tid);
        let thread = self.thread_mut(tid);
        thread.held_locks.push(id);
        thread.waiting_on = None;
        self.recompute_max_p(id);
        self.refresh_priority(tid);
    }

    /// Park `tid` on the lock's wait queue. The caller blocks it (or it is
    /// already blocked, when a condition signal moves it here).
    pub(crate) fn lock_enqueue(&mut self, id: LockId, tid: Tid) {
        let priority = self.thread(tid).priority;
        let slot = self.wait_slot(&self.lock_state(id).sema.waiters, priority);
        self.lock_state_mut(id).sema.waiters.insert(slot, tid);
        let thread = self.thread_mut(tid);
        thread.link = QueueLink::Lock(id);
        thread.waiting_on = Some(id);
    }
}

/// Lock handle backed by the global scheduler.
pub struct Lock {
    id: LockId,
}

impl Lock {
    pub fn new() -> Self {
        Self {
            id: with_scheduler(|s| s.lock_create()),
        }
    }

    pub fn id(&self) -> LockId {
        self.id
    }

    pub fn acquire(&self) {
        with_scheduler(|s| s.lock_acquire(self.id));
    }

    pub fn try_acquire(&self) -> bool {
        with_scheduler(|s| s.lock_try_acquire(self.id))
    }

    pub fn release(&self) {
        with_scheduler(|s| s.lock_release(self.id));
    }

    pub fn held_by_current(&self) -> bool {
        with_scheduler(|s| s.lock_held_by_current(self.id))
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}
