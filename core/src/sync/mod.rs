//! Blocking synchronization primitives.
//!
//! The wait-queue state of every semaphore, lock and condition variable lives
//! in arenas inside the [`Scheduler`](crate::scheduler::Scheduler) and is
//! addressed by typed ids. The handle types ([`Semaphore`], [`Lock`],
//! [`Condition`]) are thin wrappers that run each operation against the
//! global scheduler.

pub mod condvar;
pub mod lock;
pub mod semaphore;

use alloc::vec::Vec;
use core::fmt;

use tickos_abi::Tid;

use crate::scheduler::Scheduler;

pub use condvar::Condition;
pub use lock::Lock;
pub use semaphore::Semaphore;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Names a semaphore in the scheduler's arena.
    SemaId,
    "sema"
);
arena_id!(
    /// Names a lock in the scheduler's arena.
    LockId,
    "lock"
);
arena_id!(
    /// Names a condition variable in the scheduler's arena.
    CondId,
    "cond"
);

/// Counting semaphore state. Waiters are kept in priority order at insertion
/// time; the wake path rescans because priorities can move while blocked.
#[derive(Debug, Default)]
pub struct SemaState {
    pub(crate) value: u32,
    pub(crate) waiters: Vec<Tid>,
}

impl SemaState {
    pub(crate) fn new(value: u32) -> Self {
        Self {
            value,
            waiters: Vec::new(),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn waiters(&self) -> &[Tid] {
        &self.waiters
    }
}

/// Lock state: a binary semaphore plus the holder and the highest priority
/// among its waiters (`max_p`, `PRI_MIN` when nobody waits).
#[derive(Debug)]
pub struct LockState {
    pub(crate) holder: Option<Tid>,
    pub(crate) sema: SemaState,
    pub(crate) max_p: u8,
}

impl LockState {
    pub(crate) fn new() -> Self {
        Self {
            holder: None,
            sema: SemaState::new(1),
            max_p: tickos_abi::PRI_MIN,
        }
    }

    pub fn holder(&self) -> Option<Tid> {
        self.holder
    }

    pub fn max_p(&self) -> u8 {
        self.max_p
    }

    pub fn waiters(&self) -> &[Tid] {
        &self.sema.waiters
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CondWaiter {
    pub(crate) tid: Tid,
    pub(crate) sema: SemaId,
}

/// Condition variable state: one private one-shot semaphore per waiter.
#[derive(Debug, Default)]
pub struct CondState {
    pub(crate) waiters: Vec<CondWaiter>,
}

impl CondState {
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}

/// Index of the highest-priority entry, earliest among equals.
pub(crate) fn highest_priority_index<T>(
    items: &[T],
    priority_of: impl Fn(&T) -> u8,
) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (idx, item) in items.iter().enumerate() {
        let p = priority_of(item);
        match best {
            Some((_, bp)) if bp >= p => {}
            _ => best = Some((idx, p)),
        }
    }
    best.map(|(idx, _)| idx)
}

impl Scheduler {
    /// Slot for a waiter of `priority`: ahead of the first lower-priority
    /// waiter, behind all of its equals.
    pub(crate) fn wait_slot(&self, waiters: &[Tid], priority: u8) -> usize {
        waiters
            .iter()
            .position(|&tid| self.thread(tid).priority < priority)
            .unwrap_or(waiters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_priority_prefers_earliest() {
        let prios = [10u8, 40, 20, 40];
        assert_eq!(highest_priority_index(&prios, |p| *p), Some(1));
        assert_eq!(highest_priority_index::<u8>(&[], |p| *p), None);
    }
}
