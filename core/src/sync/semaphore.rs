use tickos_abi::Tid;

use super::{SemaId, highest_priority_index};
use crate::scheduler::{QueueLink, Scheduler, with_scheduler};

impl Scheduler {
    pub fn sema_create(&mut self, value: u32) -> SemaId {
        self.alloc_sema(value)
    }

    /// Take one unit, blocking the running thread until one is handed to it.
    pub fn sema_down(&mut self, id: SemaId) {
        let sema = self.sema_mut(id);
        if sema.value > 0 {
            sema.value -= 1;
            return;
        }
        assert!(
            !self.in_interrupt(),
            "{} would block in interrupt context",
            id
        );
        let current = self.current();
        self.sema_enqueue(id, current);
        self.block();
    }

    pub fn sema_try_down(&mut self, id: SemaId) -> bool {
        let sema = self.sema_mut(id);
        if sema.value > 0 {
            sema.value -= 1;
            true
        } else {
            false
        }
    }

    /// Release one unit. If anyone waits, the unit goes straight to the
    /// highest-priority waiter instead of the count. Safe from interrupt
    /// context.
    pub fn sema_up(&mut self, id: SemaId) {
        self.sema_wake_one(id);
        self.preempt_check();
    }

    pub(crate) fn sema_enqueue(&mut self, id: SemaId, tid: Tid) {
        let priority = self.thread(tid).priority;
        let slot = self.wait_slot(&self.sema(id).waiters, priority);
        self.sema_mut(id).waiters.insert(slot, tid);
        self.thread_mut(tid).link = QueueLink::Semaphore(id);
    }

    fn sema_wake_one(&mut self, id: SemaId) -> Option<Tid> {
        // Priorities may have moved since the waiters queued.
        let best = highest_priority_index(&self.sema(id).waiters, |&tid| {
            self.thread(tid).priority
        });
        match best {
            Some(idx) => {
                let tid = self.sema_mut(id).waiters.remove(idx);
                self.make_ready(tid);
                Some(tid)
            }
            None => {
                self.sema_mut(id).value += 1;
                None
            }
        }
    }
}

/// Counting semaphore backed by the global scheduler.
pub struct Semaphore {
    id: SemaId,
}

impl Semaphore {
    pub fn new(value: u32) -> Self {
        Self {
            id: with_scheduler(|s| s.sema_create(value)),
        }
    }

    pub fn id(&self) -> SemaId {
        self.id
    }

    pub fn down(&self) {
        with_scheduler(|s| s.sema_down(self.id));
    }

    pub fn try_down(&self) -> bool {
        with_scheduler(|s| s.sema_try_down(self.id))
    }

    pub fn up(&self) {
        with_scheduler(|s| s.sema_up(self.id));
    }

    pub fn value(&self) -> u32 {
        with_scheduler(|s| s.sema(self.id).value)
    }
}
