//! Thread ABI types shared between kernel subsystems.
//!
//! This module is the single source of truth for thread-related types and
//! constants. The scheduler, the synchronization primitives and the timer
//! import from here rather than defining their own copies.

use core::fmt;

// --- Thread Configuration ---

/// Upper bound on live threads (including the initial and idle threads).
pub const MAX_THREADS: usize = 64;
/// Names longer than this are truncated at creation.
pub const THREAD_NAME_MAX_LEN: usize = 16;

/// Thread identifier.
pub type Tid = u32;

pub const TID_ERROR: Tid = 0xFFFF_FFFF;
pub const INITIAL_TID: Tid = 1;

// --- Thread Priority ---

pub const PRI_MIN: u8 = 0;
pub const PRI_DEFAULT: u8 = 31;
pub const PRI_MAX: u8 = 63;

#[inline]
pub const fn priority_is_valid(priority: u8) -> bool {
    priority <= PRI_MAX
}

// --- Niceness ---

pub const NICE_MIN: i32 = -20;
pub const NICE_DEFAULT: i32 = 0;
pub const NICE_MAX: i32 = 20;

// --- Timer ---

/// Timer interrupts per second.
pub const TIMER_FREQ: u32 = 100;
pub const TIMER_FREQ_MIN: u32 = 19;
pub const TIMER_FREQ_MAX: u32 = 1000;

/// Ticks a thread may run before it is preempted in favour of an equal peer.
pub const TIME_SLICE: u32 = 4;

/// MLFQS priorities are recomputed every this many ticks.
pub const MLFQS_PRIORITY_PERIOD: u64 = 4;

// --- ThreadStatus ---

/// Type-safe thread status with explicit state-machine semantics.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThreadStatus {
    /// Currently executing on the CPU.
    Running = 0,
    /// Not running but ready to run, waiting in the ready queue.
    Ready = 1,
    /// Waiting for an event to trigger.
    #[default]
    Blocked = 2,
    /// About to be destroyed.
    Dying = 3,
}

impl ThreadStatus {
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Ready,
            3 => Self::Dying,
            _ => Self::Blocked,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Ready => matches!(target, Self::Running),
            Self::Running => matches!(target, Self::Ready | Self::Blocked | Self::Dying),
            Self::Blocked => matches!(target, Self::Ready),
            Self::Dying => false,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::Dying => "dying",
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry point of a kernel thread. The argument is the opaque `aux` word
/// passed to thread creation.
pub type ThreadFunc = fn(usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(ThreadStatus::Ready.can_transition_to(ThreadStatus::Running));
        assert!(ThreadStatus::Running.can_transition_to(ThreadStatus::Blocked));
        assert!(ThreadStatus::Running.can_transition_to(ThreadStatus::Dying));
        assert!(ThreadStatus::Blocked.can_transition_to(ThreadStatus::Ready));
        assert!(!ThreadStatus::Ready.can_transition_to(ThreadStatus::Blocked));
        assert!(!ThreadStatus::Blocked.can_transition_to(ThreadStatus::Dying));
        assert!(!ThreadStatus::Blocked.can_transition_to(ThreadStatus::Running));
        assert!(!ThreadStatus::Dying.can_transition_to(ThreadStatus::Ready));
    }

    #[test]
    fn test_status_raw_round_trip() {
        for status in [
            ThreadStatus::Running,
            ThreadStatus::Ready,
            ThreadStatus::Blocked,
            ThreadStatus::Dying,
        ] {
            assert_eq!(ThreadStatus::from_u8(status.as_u8()), status);
        }
    }

    #[test]
    fn test_priority_bounds() {
        assert!(priority_is_valid(PRI_MIN));
        assert!(priority_is_valid(PRI_DEFAULT));
        assert!(priority_is_valid(PRI_MAX));
        assert!(!priority_is_valid(PRI_MAX + 1));
    }
}
