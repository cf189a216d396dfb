//! Per-thread scheduling record.

use alloc::vec::Vec;
use core::fmt;

use tickos_abi::{THREAD_NAME_MAX_LEN, ThreadFunc, ThreadStatus, Tid};
use tickos_lib::Fixed;

use crate::sync::{LockId, SemaId};

/// Fixed-capacity thread name. Longer names are cut at a char boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ThreadName {
    bytes: [u8; THREAD_NAME_MAX_LEN],
    len: u8,
}

impl ThreadName {
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(THREAD_NAME_MAX_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; THREAD_NAME_MAX_LEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            bytes,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from a `&str` prefix ending on a char boundary.
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Which queue, if any, currently owns the thread.
///
/// A thread sits in at most one queue at a time, and in none while Running
/// or Dying. A condition-variable waiter is parked on its private one-shot
/// semaphore and so carries `Semaphore`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueueLink {
    #[default]
    NotQueued,
    Ready,
    Semaphore(SemaId),
    Lock(LockId),
    Sleeping,
}

pub struct Thread {
    pub(crate) tid: Tid,
    pub(crate) name: ThreadName,
    pub(crate) status: ThreadStatus,
    /// Priority set by the thread itself (or by MLFQS).
    pub(crate) base_priority: u8,
    /// Base priority raised by donations; what the queues order by.
    pub(crate) priority: u8,
    pub(crate) nice: i32,
    pub(crate) recent_cpu: Fixed,
    pub(crate) held_locks: Vec<LockId>,
    pub(crate) waiting_on: Option<LockId>,
    pub(crate) link: QueueLink,
    pub(crate) entry: Option<ThreadFunc>,
    pub(crate) aux: usize,
}

impl Thread {
    pub(crate) fn new(tid: Tid, name: &str, priority: u8) -> Self {
        Self {
            tid,
            name: ThreadName::new(name),
            status: ThreadStatus::Blocked,
            base_priority: priority,
            priority,
            nice: tickos_abi::NICE_DEFAULT,
            recent_cpu: Fixed::ZERO,
            held_locks: Vec::new(),
            waiting_on: None,
            link: QueueLink::NotQueued,
            entry: None,
            aux: 0,
        }
    }

    /// Move to `next`, panicking on a transition the state machine forbids.
    pub(crate) fn set_status(&mut self, next: ThreadStatus) {
        assert!(
            self.status.can_transition_to(next),
            "thread {} ({}): illegal transition {} -> {}",
            self.tid,
            self.name,
            self.status,
            next
        );
        self.status = next;
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn name(&self) -> ThreadName {
        self.name
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn base_priority(&self) -> u8 {
        self.base_priority
    }

    pub fn nice(&self) -> i32 {
        self.nice
    }

    pub fn recent_cpu(&self) -> Fixed {
        self.recent_cpu
    }

    pub fn link(&self) -> QueueLink {
        self.link
    }

    pub fn waiting_on(&self) -> Option<LockId> {
        self.waiting_on
    }

    pub fn held_locks(&self) -> &[LockId] {
        &self.held_locks
    }

    pub fn entry(&self) -> Option<(ThreadFunc, usize)> {
        self.entry.map(|f| (f, self.aux))
    }

    pub fn info(&self) -> ThreadInfo {
        ThreadInfo {
            tid: self.tid,
            name: self.name,
            status: self.status,
            priority: self.priority,
            base_priority: self.base_priority,
            nice: self.nice,
            recent_cpu: self.recent_cpu,
        }
    }
}

/// Snapshot handed out by `thread_foreach`.
#[derive(Clone, Copy, Debug)]
pub struct ThreadInfo {
    pub tid: Tid,
    pub name: ThreadName,
    pub status: ThreadStatus,
    pub priority: u8,
    pub base_priority: u8,
    pub nice: i32,
    pub recent_cpu: Fixed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_truncates_on_char_boundary() {
        assert_eq!(ThreadName::new("main").as_str(), "main");
        assert_eq!(
            ThreadName::new("a-very-long-thread-name").as_str(),
            "a-very-long-thre"
        );
        // 15 ASCII bytes followed by a two-byte char straddling the limit
        let name = ThreadName::new("abcdefghijklmnoé");
        assert_eq!(name.as_str(), "abcdefghijklmno");
    }

    #[test]
    #[should_panic(expected = "illegal transition")]
    fn test_illegal_transition_panics() {
        let mut t = Thread::new(5, "worker", 31);
        t.set_status(ThreadStatus::Dying);
    }

    #[test]
    #[should_panic(expected = "illegal transition blocked -> running")]
    fn test_blocked_thread_must_become_ready_first() {
        let mut t = Thread::new(6, "worker", 31);
        t.set_status(ThreadStatus::Running);
    }
}
