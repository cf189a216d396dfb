//! Priority donation.
//!
//! A thread's effective priority is the larger of its base priority and the
//! `max_p` of every lock it holds. When a thread starts waiting on a lock the
//! raise is pushed along the chain "waits for a lock held by" until it
//! reaches a thread that is not itself waiting. Disabled under MLFQS.

use tickos_abi::{MAX_THREADS, PRI_MIN, Tid};
use tickos_lib::klog_trace;

use super::scheduler::Scheduler;
use crate::sync::LockId;

impl Scheduler {
    /// Highest `max_p` among the locks `tid` holds.
    pub fn donated_priority(&self, tid: Tid) -> u8 {
        self.thread(tid)
            .held_locks
            .iter()
            .map(|&lock| self.lock_state(lock).max_p)
            .max()
            .unwrap_or(PRI_MIN)
    }

    pub(crate) fn recompute_max_p(&mut self, lock: LockId) {
        let max_p = self
            .lock_state(lock)
            .sema
            .waiters
            .iter()
            .map(|&tid| self.thread(tid).priority)
            .max()
            .unwrap_or(PRI_MIN);
        self.lock_state_mut(lock).max_p = max_p;
    }

    /// Recompute `tid`'s effective priority from its base and held locks.
    pub(crate) fn refresh_priority(&mut self, tid: Tid) {
        if self.config().mlfqs {
            return;
        }
        let thread = self.thread(tid);
        let effective = thread.base_priority.max(self.donated_priority(tid));
        if effective != thread.priority {
            klog_trace!(
                "sched: thread {} priority {} -> {}",
                tid,
                thread.priority,
                effective
            );
            self.apply_priority(tid, effective);
        }
    }

    /// Re-derive `max_p` of `lock` and of every lock further along the
    /// holder chain, refreshing each holder on the way.
    ///
    /// An acyclic chain has a distinct holder per lock, so the walk visits
    /// at most [`MAX_THREADS`] locks. Panics if the chain revisits a lock
    /// (the waiters are deadlocked).
    pub(crate) fn propagate_donation(&mut self, lock: LockId) {
        if self.config().mlfqs {
            return;
        }
        let mut visited = [None; MAX_THREADS + 1];
        let mut lock = lock;
        for depth in 0..=MAX_THREADS {
            assert!(
                !visited[..depth].contains(&Some(lock)),
                "priority donation cycle through {}",
                lock
            );
            visited[depth] = Some(lock);

            self.recompute_max_p(lock);
            let Some(holder) = self.lock_state(lock).holder else {
                return;
            };
            self.refresh_priority(holder);
            match self.thread(holder).waiting_on {
                Some(next) => lock = next,
                None => return,
            }
        }
        unreachable!("donation chain through {} has more holders than threads", lock);
    }
}
