//! Multi-level feedback queue scheduling.
//!
//! Priorities are derived from each thread's recent CPU usage and niceness;
//! user-set priorities and donation are ignored while this mode is active.

use tickos_abi::{MLFQS_PRIORITY_PERIOD, PRI_MAX, PRI_MIN, Tid};
use tickos_lib::Fixed;

use super::scheduler::Scheduler;
use crate::timer::TickEvents;

const LOAD_DECAY: Fixed = Fixed::ratio(59, 60);
const LOAD_GAIN: Fixed = Fixed::ratio(1, 60);

/// `PRI_MAX - recent_cpu/4 - 2*nice`, rounded and clamped to the valid range.
pub fn mlfqs_priority(recent_cpu: Fixed, nice: i32) -> u8 {
    let p = Fixed::from_int(PRI_MAX as i32) - recent_cpu.div_int(4) - Fixed::from_int(2 * nice);
    p.to_int_round().clamp(PRI_MIN as i32, PRI_MAX as i32) as u8
}

/// `(2*load)/(2*load + 1) * recent_cpu + nice`
pub fn decay_recent_cpu(load_avg: Fixed, recent_cpu: Fixed, nice: i32) -> Fixed {
    let twice = load_avg.mul_int(2);
    let coefficient = twice / twice.add_int(1);
    (coefficient * recent_cpu).add_int(nice)
}

/// `(59/60)*load + (1/60)*ready`
pub fn next_load_avg(load_avg: Fixed, ready: usize) -> Fixed {
    LOAD_DECAY * load_avg + LOAD_GAIN.mul_int(ready as i32)
}

impl Scheduler {
    pub(crate) fn mlfqs_update_priority(&mut self, tid: Tid) {
        if tid == self.idle_tid() {
            return;
        }
        let thread = self.thread_mut(tid);
        let priority = mlfqs_priority(thread.recent_cpu, thread.nice);
        thread.base_priority = priority;
        if priority != thread.priority {
            self.apply_priority(tid, priority);
        }
    }

    /// Threads that are Running or Ready, the idle thread excluded.
    pub fn running_or_ready_count(&self) -> usize {
        let running = usize::from(self.current() != self.idle_tid());
        self.ready.len() + running
    }

    /// Per-tick MLFQS bookkeeping; `self.ticks` has already advanced.
    pub(crate) fn mlfqs_tick(&mut self) -> TickEvents {
        let mut events = TickEvents::empty();
        let current = self.current();
        let idle = self.idle_tid();

        if current != idle {
            let thread = self.thread_mut(current);
            thread.recent_cpu = thread.recent_cpu.saturating_add_int(1);
            events |= TickEvents::RECENT_CPU;
        }

        if self.ticks % u64::from(self.config().timer_freq) == 0 {
            self.load_avg = next_load_avg(self.load_avg, self.running_or_ready_count());
            let load_avg = self.load_avg;
            for thread in self.threads.values_mut().filter(|t| t.tid != idle) {
                thread.recent_cpu = decay_recent_cpu(load_avg, thread.recent_cpu, thread.nice);
            }
            events |= TickEvents::LOAD_AVG;
        }

        if self.ticks % MLFQS_PRIORITY_PERIOD == 0 {
            for thread in self.threads.values_mut().filter(|t| t.tid != idle) {
                let priority = mlfqs_priority(thread.recent_cpu, thread.nice);
                thread.base_priority = priority;
                thread.priority = priority;
            }
            let threads = &self.threads;
            self.ready
                .resort(|tid| threads.get(&tid).map_or(PRI_MIN, |t| t.priority));
            events |= TickEvents::PRIORITIES;
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_formula() {
        assert_eq!(mlfqs_priority(Fixed::ZERO, 0), PRI_MAX);
        // 63 - 10/4 - 0 = 60.5, rounds up
        assert_eq!(mlfqs_priority(Fixed::from_int(10), 0), 61);
        assert_eq!(mlfqs_priority(Fixed::ZERO, 5), 53);
        assert_eq!(mlfqs_priority(Fixed::ZERO, -20), PRI_MAX);
        assert_eq!(mlfqs_priority(Fixed::from_int(400), 20), PRI_MIN);
    }

    #[test]
    fn test_load_avg_approaches_ready_count() {
        let mut load = Fixed::ZERO;
        load = next_load_avg(load, 1);
        // 1/60 = 0.0166..., reported as 2 hundredths
        assert_eq!(load.mul_int(100).to_int_round(), 2);
        for _ in 0..600 {
            load = next_load_avg(load, 3);
        }
        assert_eq!(load.to_int_round(), 3);
    }

    #[test]
    fn test_recent_cpu_decay() {
        // load 1: coefficient 2/3
        let rc = decay_recent_cpu(Fixed::ONE, Fixed::from_int(30), 0);
        assert_eq!(rc.to_int_round(), 20);
        let rc = decay_recent_cpu(Fixed::ZERO, Fixed::from_int(30), -2);
        assert_eq!(rc, Fixed::from_int(-2));
    }
}
