//! Thread scheduler.
//!
//! [`Scheduler`] is a plain value holding every queue, thread record and
//! primitive's wait state. The kernel keeps one instance behind an
//! `IrqMutex`; the free functions here lock it, run one operation and then
//! commit whatever context switch the operation decided, after the lock is
//! dropped but before interrupts are re-enabled.

mod donation;
mod mlfqs;
pub mod ready_queue;
#[allow(clippy::module_inception)]
pub mod scheduler;
pub mod sleep;
pub mod thread;


use spin::Once;
use tickos_abi::{ThreadFunc, Tid};
use tickos_lib::{IrqGuard, IrqMutex, klog_info, klog_set_level};

use crate::config::SchedConfig;
use crate::platform;

pub use mlfqs::{decay_recent_cpu, mlfqs_priority, next_load_avg};
pub use ready_queue::ReadyQueue;
pub use scheduler::{SchedError, SchedStats, Scheduler, Switch};
pub use sleep::SleepQueue;
pub use thread::{QueueLink, Thread, ThreadInfo, ThreadName};

static SCHEDULER: Once<IrqMutex<Scheduler>> = Once::new();

/// Create the global scheduler. The caller becomes the "main" thread.
/// Later calls are ignored.
pub fn init_scheduler(config: SchedConfig) {
    SCHEDULER.call_once(|| {
        if let Some(level) = config.log_level {
            klog_set_level(level);
        }
        IrqMutex::new(Scheduler::new(config))
    });
}

pub fn is_scheduler_initialized() -> bool {
    SCHEDULER.get().is_some()
}

/// Run `f` on the global scheduler with interrupts disabled, then perform
/// the context switch it decided, if any. Returns `None` before init.
///
/// The switch happens after the lock is released but with interrupts still
/// off; the level saved here is restored when this thread runs again.
pub fn try_with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> Option<R> {
    let mutex = SCHEDULER.get()?;
    let _irq = IrqGuard::new();
    let (result, switch) = {
        let mut sched = mutex.lock();
        let result = f(&mut sched);
        (result, sched.take_switch())
    };
    if let Some(switch) = switch {
        platform::context_switch(switch.from, switch.to, switch.reap_from);
    }
    Some(result)
}

#[inline]
pub fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    try_with_scheduler(f).expect("scheduler not initialized")
}

pub fn thread_create(
    name: &str,
    priority: u8,
    entry: ThreadFunc,
    aux: usize,
) -> Result<Tid, SchedError> {
    with_scheduler(|s| s.create(name, priority, entry, aux))
}

/// First code a new thread runs; the platform enters it on the new stack.
pub fn thread_run_entry() -> ! {
    let entry = with_scheduler(|s| s.thread(s.current()).entry());
    tickos_lib::intr_enable();
    if let Some((func, aux)) = entry {
        func(aux);
    }
    thread_exit()
}

pub fn thread_block() {
    with_scheduler(|s| s.block());
}

pub fn thread_unblock(tid: Tid) {
    with_scheduler(|s| s.unblock(tid));
}

pub fn thread_yield() {
    with_scheduler(|s| s.yield_current());
}

pub fn thread_exit() -> ! {
    let tid = with_scheduler(|s| {
        let tid = s.current();
        s.exit();
        tid
    });
    panic!("thread {} ran again after exit", tid);
}

pub fn thread_current() -> Tid {
    with_scheduler(|s| s.current())
}

pub fn thread_tid() -> Tid {
    thread_current()
}

pub fn thread_name() -> ThreadName {
    with_scheduler(|s| s.thread(s.current()).name())
}

/// Call `f` for every live thread, with the scheduler locked.
pub fn thread_foreach(f: impl FnMut(&ThreadInfo)) {
    with_scheduler(|s| s.foreach(f));
}

pub fn thread_get_priority() -> u8 {
    with_scheduler(|s| s.get_priority())
}

pub fn thread_set_priority(priority: u8) {
    with_scheduler(|s| s.set_priority(priority));
}

pub fn thread_get_nice() -> i32 {
    with_scheduler(|s| s.get_nice())
}

pub fn thread_set_nice(nice: i32) {
    with_scheduler(|s| s.set_nice(nice));
}

pub fn thread_get_recent_cpu() -> i32 {
    with_scheduler(|s| s.get_recent_cpu())
}

pub fn thread_get_load_avg() -> i32 {
    with_scheduler(|s| s.get_load_avg())
}

pub fn thread_print_stats() {
    let stats = with_scheduler(|s| s.stats());
    klog_info!(
        "Thread: {} idle ticks, {} kernel ticks, {} context switches, {} preemptions",
        stats.idle_ticks,
        stats.kernel_ticks,
        stats.context_switches,
        stats.preemptions
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PlatformServices, register_platform_services};
    use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tickos_abi::{PRI_DEFAULT, PRI_MAX};
    use tickos_lib::KlogLevel;

    static SWITCHES: AtomicUsize = AtomicUsize::new(0);
    static LAST_TO: AtomicU32 = AtomicU32::new(0);

    fn record_switch(_from: Tid, to: Tid, _reap_from: bool) {
        SWITCHES.fetch_add(1, Ordering::SeqCst);
        LAST_TO.store(to, Ordering::SeqCst);
        assert!(
            !tickos_lib::cpu::are_interrupts_enabled(),
            "switch committed with interrupts on"
        );
    }

    fn no_wait(_ns: u64) {}

    static TEST_PLATFORM: PlatformServices = PlatformServices {
        context_switch: record_switch,
        busy_wait_ns: no_wait,
    };

    fn noop(_: usize) {}

    // The global instance is shared by the whole test binary, so everything
    // that touches it lives in this one test.
    #[test]
    fn test_global_api_commits_switches() {
        assert!(try_with_scheduler(|s| s.current()).is_none());
        register_platform_services(&TEST_PLATFORM);
        init_scheduler(SchedConfig {
            log_level: Some(KlogLevel::Warn),
            ..SchedConfig::default()
        });
        assert!(is_scheduler_initialized());
        assert_eq!(tickos_lib::klog_get_level(), KlogLevel::Warn);

        let main = thread_current();
        assert_eq!(thread_tid(), main);
        assert_eq!(thread_name().as_str(), "main");
        assert_eq!(thread_get_priority(), PRI_DEFAULT);

        let low = thread_create("low", PRI_DEFAULT - 1, noop, 0).unwrap();
        assert_eq!(SWITCHES.load(Ordering::SeqCst), 0);
        assert_eq!(thread_current(), main);

        let high = thread_create("high", PRI_MAX, noop, 7).unwrap();
        assert_eq!(SWITCHES.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_TO.load(Ordering::SeqCst), high);
        assert_eq!(thread_current(), high);
        assert!(tickos_lib::cpu::are_interrupts_enabled());

        let mut seen = 0;
        thread_foreach(|info| {
            if info.tid == low || info.tid == high || info.tid == main {
                seen += 1;
            }
        });
        assert_eq!(seen, 3);

        assert_eq!(
            thread_create("bad", PRI_MAX + 1, noop, 0),
            Err(SchedError::InvalidPriority(PRI_MAX + 1))
        );
    }
}
