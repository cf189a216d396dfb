//! Timer tick handling and tick-based sleeping.
//!
//! The board's timer interrupt calls [`timer_interrupt`] once per tick. All
//! per-tick scheduler work (time slicing, MLFQS updates, waking sleepers)
//! happens there, with the yield it may call for deferred to interrupt
//! return.

use bitflags::bitflags;
use tickos_lib::klog_info;

use crate::platform;
use crate::scheduler::{Scheduler, try_with_scheduler, with_scheduler};

bitflags! {
    /// Work performed by one timer tick.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TickEvents: u8 {
        /// The running thread was charged one tick of recent_cpu.
        const RECENT_CPU = 1 << 0;
        /// Once-per-second load average and recent_cpu decay.
        const LOAD_AVG = 1 << 1;
        /// MLFQS priorities were recomputed.
        const PRIORITIES = 1 << 2;
        /// At least one sleeper became Ready.
        const WOKE_SLEEPERS = 1 << 3;
        /// The running thread used up its time slice.
        const SLICE_EXPIRED = 1 << 4;
        /// A higher-priority thread is Ready; yield at interrupt return.
        const PREEMPTED = 1 << 5;
    }
}

impl Scheduler {
    /// Account one timer tick. Runs in interrupt context: anything that wants
    /// the CPU taken away sets the yield-on-return flag instead of switching.
    pub fn tick(&mut self) -> TickEvents {
        self.in_interrupt = true;
        self.ticks += 1;
        let mut events = TickEvents::empty();

        if self.current() == self.idle_tid() {
            self.stats.idle_ticks += 1;
        } else {
            self.stats.kernel_ticks += 1;
            self.slice_ticks += 1;
            if self.slice_ticks >= self.config().time_slice {
                self.yield_on_return = true;
                events |= TickEvents::SLICE_EXPIRED;
            }
        }

        if self.config().mlfqs {
            events |= self.mlfqs_tick();
        }

        if self.wake_due_sleepers() > 0 {
            events |= TickEvents::WOKE_SLEEPERS;
        }

        if self.preempt_check() {
            events |= TickEvents::PREEMPTED;
        }

        self.in_interrupt = false;
        events
    }

    /// Interrupt-return hook: perform the yield requested during the tick.
    pub fn finish_interrupt(&mut self) {
        if core::mem::take(&mut self.yield_on_return) {
            self.stats.preemptions += 1;
            self.yield_current();
        }
    }

    pub fn yield_pending(&self) -> bool {
        self.yield_on_return
    }
}

/// Ticks since boot.
pub fn timer_ticks() -> u64 {
    with_scheduler(|s| s.ticks())
}

/// Ticks elapsed since `then`, a value returned by [`timer_ticks`].
pub fn timer_elapsed(then: u64) -> u64 {
    timer_ticks().wrapping_sub(then)
}

/// Timer interrupt handler. Ticks arriving before the scheduler exists are
/// dropped.
pub fn timer_interrupt() -> TickEvents {
    try_with_scheduler(|s| {
        let events = s.tick();
        s.finish_interrupt();
        events
    })
    .unwrap_or(TickEvents::empty())
}

/// Sleep for approximately `ticks` timer ticks.
pub fn timer_sleep(ticks: i64) {
    with_scheduler(|s| s.sleep(ticks));
}

/// Sleep for approximately `ms` milliseconds.
pub fn timer_msleep(ms: i64) {
    real_time_sleep(ms, 1_000);
}

/// Sleep for approximately `us` microseconds.
pub fn timer_usleep(us: i64) {
    real_time_sleep(us, 1_000_000);
}

/// Sleep for approximately `ns` nanoseconds.
pub fn timer_nsleep(ns: i64) {
    real_time_sleep(ns, 1_000_000_000);
}

/// Whole ticks in `num / denom` seconds at `freq` Hz, rounded down.
pub fn ticks_for(num: i64, denom: i64, freq: u32) -> i64 {
    num.saturating_mul(i64::from(freq)) / denom
}

/// Sleep `num / denom` seconds: yield the CPU for whole ticks, busy-wait
/// below tick granularity for accuracy.
fn real_time_sleep(num: i64, denom: i64) {
    let freq = with_scheduler(|s| s.config().timer_freq);
    let ticks = ticks_for(num, denom, freq);
    if ticks > 0 {
        timer_sleep(ticks);
    } else if num > 0 {
        let ns = num.saturating_mul(1_000_000_000 / denom) as u64;
        platform::busy_wait_ns(ns);
    }
}

pub fn timer_print_stats() {
    klog_info!("Timer: {} ticks", timer_ticks());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedConfig;
    use tickos_abi::{PRI_DEFAULT, ThreadStatus};

    fn noop(_: usize) {}

    #[test]
    fn test_ticks_for_rounds_down() {
        assert_eq!(ticks_for(10, 1_000, 100), 1);
        assert_eq!(ticks_for(9, 1_000, 100), 0);
        assert_eq!(ticks_for(1_500, 1_000_000, 1000), 1);
        assert_eq!(ticks_for(-5, 1_000, 100), 0);
        assert_eq!(ticks_for(2, 1, 100), 200);
    }

    #[test]
    fn test_tick_counts_and_accounts() {
        let mut s = Scheduler::new(SchedConfig::default());
        let events = s.tick();
        assert_eq!(s.ticks(), 1);
        assert!(events.is_empty());
        assert_eq!(s.stats().kernel_ticks, 1);
        assert!(!s.in_interrupt());
    }

    #[test]
    fn test_slice_expiry_round_robins_equal_priorities() {
        let mut s = Scheduler::new(SchedConfig::default());
        let main = s.current();
        let peer = s.create("peer", PRI_DEFAULT, noop, 0).unwrap();
        assert_eq!(s.current(), main);

        for _ in 0..3 {
            let events = s.tick();
            assert!(!events.contains(TickEvents::SLICE_EXPIRED));
            s.finish_interrupt();
            assert_eq!(s.current(), main);
        }
        let events = s.tick();
        assert!(events.contains(TickEvents::SLICE_EXPIRED));
        assert!(s.yield_pending());
        s.finish_interrupt();
        assert_eq!(s.current(), peer);
        assert_eq!(s.status(main), ThreadStatus::Ready);
        assert_eq!(s.stats().preemptions, 1);
    }

    #[test]
    fn test_woken_sleeper_preempts_at_interrupt_return() {
        let mut s = Scheduler::new(SchedConfig::default());
        let main = s.current();
        let sleeper = s.create("sleeper", PRI_DEFAULT + 10, noop, 0).unwrap();
        assert_eq!(s.current(), sleeper);
        s.sleep(2);
        assert_eq!(s.current(), main);

        assert!(!s.tick().contains(TickEvents::WOKE_SLEEPERS));
        s.finish_interrupt();
        let events = s.tick();
        assert!(events.contains(TickEvents::WOKE_SLEEPERS | TickEvents::PREEMPTED));
        // still the interrupted thread until the handler returns
        assert_eq!(s.current(), main);
        s.finish_interrupt();
        assert_eq!(s.current(), sleeper);
    }
}
