use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use tickos_abi::{
    INITIAL_TID, MAX_THREADS, NICE_MAX, NICE_MIN, PRI_DEFAULT, PRI_MIN, ThreadFunc, ThreadStatus,
    Tid, priority_is_valid,
};
use tickos_lib::{Fixed, klog_debug, klog_info, klog_trace};

use super::ready_queue::ReadyQueue;
use super::sleep::SleepQueue;
use super::thread::{QueueLink, Thread, ThreadInfo};
use crate::config::SchedConfig;
use crate::sync::{CondId, CondState, LockId, LockState, SemaId, SemaState};

/// Recoverable thread-creation failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedError {
    InvalidPriority(u8),
    ThreadLimit,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPriority(p) => write!(f, "priority {} out of range", p),
            Self::ThreadLimit => write!(f, "thread limit of {} reached", MAX_THREADS),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedStats {
    pub idle_ticks: u64,
    pub kernel_ticks: u64,
    pub context_switches: u64,
    pub preemptions: u64,
}

/// A context switch decided under the scheduler lock and committed by the
/// caller after the lock is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Switch {
    pub from: Tid,
    pub to: Tid,
    /// `from` exited; its record is gone and its stack may be freed once
    /// the switch completes.
    pub reap_from: bool,
}

/// All scheduling state of the single CPU.
///
/// Every mutation goes through `&mut Scheduler`. In the kernel the only way
/// to get one is [`with_scheduler`](super::with_scheduler), which holds the
/// global `IrqMutex`.
pub struct Scheduler {
    config: SchedConfig,
    pub(crate) threads: BTreeMap<Tid, Thread>,
    pub(crate) ready: ReadyQueue,
    pub(crate) sleepers: SleepQueue,
    semas: Vec<Option<SemaState>>,
    free_semas: Vec<SemaId>,
    locks: Vec<LockState>,
    conds: Vec<CondState>,
    next_tid: Tid,
    current: Tid,
    idle: Tid,
    pub(crate) ticks: u64,
    pub(crate) load_avg: Fixed,
    pub(crate) slice_ticks: u32,
    pub(crate) yield_on_return: bool,
    pub(crate) in_interrupt: bool,
    pending: Option<Switch>,
    pub(crate) stats: SchedStats,
}

impl Scheduler {
    /// Build the scheduler with the calling context as the Running "main"
    /// thread and a Blocked idle thread that runs whenever nothing is ready.
    pub fn new(config: SchedConfig) -> Self {
        let mut sched = Self {
            config,
            threads: BTreeMap::new(),
            ready: ReadyQueue::new(),
            sleepers: SleepQueue::new(),
            semas: Vec::new(),
            free_semas: Vec::new(),
            locks: Vec::new(),
            conds: Vec::new(),
            next_tid: INITIAL_TID,
            current: INITIAL_TID,
            idle: INITIAL_TID,
            ticks: 0,
            load_avg: Fixed::ZERO,
            slice_ticks: 0,
            yield_on_return: false,
            in_interrupt: false,
            pending: None,
            stats: SchedStats::default(),
        };

        let main = sched.alloc_tid();
        let mut main_thread = Thread::new(main, "main", PRI_DEFAULT);
        main_thread.status = ThreadStatus::Running;
        sched.threads.insert(main, main_thread);
        sched.current = main;

        let idle = sched.alloc_tid();
        sched.threads.insert(idle, Thread::new(idle, "idle", PRI_MIN));
        sched.idle = idle;

        if sched.config.mlfqs {
            sched.mlfqs_update_priority(main);
        }

        klog_info!(
            "sched: initialized, {} mode, {} Hz, slice {} ticks",
            if config.mlfqs { "mlfqs" } else { "priority" },
            config.timer_freq,
            config.time_slice
        );
        sched
    }

    fn alloc_tid(&mut self) -> Tid {
        let tid = self.next_tid;
        self.next_tid += 1;
        tid
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    #[inline]
    pub fn current(&self) -> Tid {
        self.current
    }

    #[inline]
    pub fn idle_tid(&self) -> Tid {
        self.idle
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    pub fn in_interrupt(&self) -> bool {
        self.in_interrupt
    }

    pub fn stats(&self) -> SchedStats {
        self.stats
    }

    pub fn thread(&self, tid: Tid) -> &Thread {
        match self.threads.get(&tid) {
            Some(t) => t,
            None => panic!("unknown thread {}", tid),
        }
    }

    pub(crate) fn thread_mut(&mut self, tid: Tid) -> &mut Thread {
        match self.threads.get_mut(&tid) {
            Some(t) => t,
            None => panic!("unknown thread {}", tid),
        }
    }

    pub fn try_thread(&self, tid: Tid) -> Option<&Thread> {
        self.threads.get(&tid)
    }

    pub fn status(&self, tid: Tid) -> ThreadStatus {
        self.thread(tid).status
    }

    pub fn priority_of(&self, tid: Tid) -> u8 {
        self.thread(tid).priority
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn ready_threads(&self) -> impl Iterator<Item = Tid> + '_ {
        self.ready.iter()
    }

    /// Call `f` for every live thread, in tid order.
    pub fn foreach(&self, mut f: impl FnMut(&ThreadInfo)) {
        for thread in self.threads.values() {
            f(&thread.info());
        }
    }

    /// Take the switch decided since the last call, if any.
    pub fn take_switch(&mut self) -> Option<Switch> {
        self.pending.take()
    }

    // -- Arenas -------------------------------------------------------------

    pub(crate) fn alloc_sema(&mut self, value: u32) -> SemaId {
        match self.free_semas.pop() {
            Some(id) => {
                self.semas[id.index()] = Some(SemaState::new(value));
                id
            }
            None => {
                let id = SemaId(self.semas.len() as u32);
                self.semas.push(Some(SemaState::new(value)));
                id
            }
        }
    }

    pub(crate) fn free_sema(&mut self, id: SemaId) {
        let slot = match self.semas.get_mut(id.index()) {
            Some(slot) if slot.is_some() => slot,
            _ => panic!("unknown semaphore {}", id),
        };
        *slot = None;
        self.free_semas.push(id);
    }

    pub fn sema(&self, id: SemaId) -> &SemaState {
        match self.semas.get(id.index()) {
            Some(Some(s)) => s,
            _ => panic!("unknown semaphore {}", id),
        }
    }

    pub(crate) fn sema_mut(&mut self, id: SemaId) -> &mut SemaState {
        match self.semas.get_mut(id.index()) {
            Some(Some(s)) => s,
            _ => panic!("unknown semaphore {}", id),
        }
    }

    pub(crate) fn alloc_lock(&mut self) -> LockId {
        let id = LockId(self.locks.len() as u32);
        self.locks.push(LockState::new());
        id
    }

    pub fn lock_state(&self, id: LockId) -> &LockState {
        match self.locks.get(id.index()) {
            Some(l) => l,
            None => panic!("unknown lock {}", id),
        }
    }

    pub(crate) fn lock_state_mut(&mut self, id: LockId) -> &mut LockState {
        match self.locks.get_mut(id.index()) {
            Some(l) => l,
            None => panic!("unknown lock {}", id),
        }
    }

    pub(crate) fn alloc_cond(&mut self) -> CondId {
        let id = CondId(self.conds.len() as u32);
        self.conds.push(CondState::default());
        id
    }

    pub fn cond(&self, id: CondId) -> &CondState {
        match self.conds.get(id.index()) {
            Some(c) => c,
            None => panic!("unknown condition {}", id),
        }
    }

    pub(crate) fn cond_mut(&mut self, id: CondId) -> &mut CondState {
        match self.conds.get_mut(id.index()) {
            Some(c) => c,
            None => panic!("unknown condition {}", id),
        }
    }

    // -- Thread lifecycle ---------------------------------------------------

    /// Create a thread and make it Ready. Preempts the caller if the new
    /// thread outranks it.
    pub fn create(
        &mut self,
        name: &str,
        priority: u8,
        entry: ThreadFunc,
        aux: usize,
    ) -> Result<Tid, SchedError> {
        if !priority_is_valid(priority) {
            return Err(SchedError::InvalidPriority(priority));
        }
        if self.threads.len() >= MAX_THREADS {
            return Err(SchedError::ThreadLimit);
        }

        let parent = self.thread(self.current);
        let (nice, recent_cpu) = (parent.nice, parent.recent_cpu);

        let tid = self.alloc_tid();
        let mut thread = Thread::new(tid, name, priority);
        thread.nice = nice;
        thread.recent_cpu = recent_cpu;
        thread.entry = Some(entry);
        thread.aux = aux;
        self.threads.insert(tid, thread);

        if self.config.mlfqs {
            self.mlfqs_update_priority(tid);
        }
        klog_debug!(
            "sched: created thread {} '{}' priority {}",
            tid,
            self.thread(tid).name,
            self.thread(tid).priority
        );

        self.make_ready(tid);
        self.preempt_check();
        Ok(tid)
    }

    /// Put the running thread to sleep until something unblocks it. Callers
    /// that park the thread on a queue set its link first.
    pub fn block(&mut self) {
        assert!(!self.in_interrupt, "thread_block in interrupt context");
        let current = self.current;
        self.thread_mut(current).set_status(ThreadStatus::Blocked);
        self.schedule();
    }

    /// Make a Blocked thread Ready. Does not preempt the caller.
    pub fn unblock(&mut self, tid: Tid) {
        let link = self.thread(tid).link;
        assert!(
            link == QueueLink::NotQueued,
            "thread {} is parked on {:?}",
            tid,
            link
        );
        self.make_ready(tid);
    }

    pub(crate) fn make_ready(&mut self, tid: Tid) {
        assert!(tid != self.idle, "idle thread is never queued");
        let thread = self.thread_mut(tid);
        assert!(
            thread.status == ThreadStatus::Blocked,
            "thread {} unblocked while {}",
            tid,
            thread.status
        );
        thread.set_status(ThreadStatus::Ready);
        thread.link = QueueLink::Ready;
        let priority = thread.priority;
        self.ready.insert(tid, priority);
    }

    /// Give up the CPU. The caller stays Ready and runs again once it is the
    /// best choice.
    pub fn yield_current(&mut self) {
        assert!(!self.in_interrupt, "thread_yield in interrupt context");
        let current = self.current;
        if current == self.idle {
            self.thread_mut(current).set_status(ThreadStatus::Blocked);
        } else {
            let thread = self.thread_mut(current);
            thread.set_status(ThreadStatus::Ready);
            thread.link = QueueLink::Ready;
            let priority = thread.priority;
            self.ready.insert(current, priority);
        }
        self.schedule();
    }

    /// Terminate the running thread. Its record is reaped as the scheduler
    /// switches away.
    pub fn exit(&mut self) {
        assert!(!self.in_interrupt, "thread_exit in interrupt context");
        let current = self.current;
        assert!(current != self.idle, "idle thread cannot exit");
        let thread = self.thread_mut(current);
        assert!(
            thread.held_locks.is_empty(),
            "thread {} exiting while holding {} lock(s)",
            current,
            thread.held_locks.len()
        );
        klog_debug!("sched: thread {} '{}' exiting", current, thread.name);
        thread.set_status(ThreadStatus::Dying);
        thread.link = QueueLink::NotQueued;
        self.schedule();
    }

    fn schedule(&mut self) {
        let prev = self.current;
        let next = self.ready.pop_front().unwrap_or(self.idle);
        let reap = self.thread(prev).status == ThreadStatus::Dying;

        let next_is_idle = next == self.idle;
        let thread = self.thread_mut(next);
        if next_is_idle {
            // never queued, so it passes through Ready here
            thread.set_status(ThreadStatus::Ready);
        }
        thread.set_status(ThreadStatus::Running);
        thread.link = QueueLink::NotQueued;
        self.slice_ticks = 0;

        if next == prev {
            return;
        }

        self.current = next;
        self.stats.context_switches += 1;
        if reap {
            self.threads.remove(&prev);
        }
        klog_trace!(
            "sched: switch {} -> {}{}",
            prev,
            next,
            if reap { " (reaping)" } else { "" }
        );
        self.record_switch(Switch {
            from: prev,
            to: next,
            reap_from: reap,
        });
    }

    /// Fold consecutive switches within one critical section into a single
    /// hop from the thread that actually ran to the thread that runs next.
    fn record_switch(&mut self, switch: Switch) {
        self.pending = match self.pending.take() {
            None => Some(switch),
            Some(first) if first.from == switch.to => None,
            Some(first) => Some(Switch {
                from: first.from,
                to: switch.to,
                reap_from: first.reap_from,
            }),
        };
    }

    /// Yield if a strictly higher-priority thread is Ready (any Ready thread
    /// when idling). Inside the timer interrupt the yield is deferred to
    /// interrupt return. Returns whether a yield was done or requested.
    pub(crate) fn preempt_check(&mut self) -> bool {
        let Some(front) = self.ready.front_priority() else {
            return false;
        };
        let current = self.current;
        if current != self.idle && front <= self.thread(current).priority {
            return false;
        }
        if self.in_interrupt {
            self.yield_on_return = true;
        } else {
            self.stats.preemptions += 1;
            self.yield_current();
        }
        true
    }

    /// Set a thread's effective priority, moving it within the ready queue
    /// if it is queued there.
    pub(crate) fn apply_priority(&mut self, tid: Tid, priority: u8) {
        let thread = self.thread_mut(tid);
        thread.priority = priority;
        if thread.status == ThreadStatus::Ready {
            self.ready.reposition(tid, priority);
        }
    }

    // -- Priority / nice ----------------------------------------------------

    /// Set the running thread's base priority. Ignored under MLFQS.
    pub fn set_priority(&mut self, priority: u8) {
        assert!(
            priority_is_valid(priority),
            "priority {} out of range",
            priority
        );
        if self.config.mlfqs {
            return;
        }
        let current = self.current;
        self.thread_mut(current).base_priority = priority;
        self.refresh_priority(current);
        self.preempt_check();
    }

    /// Effective priority of the running thread, donations included.
    pub fn get_priority(&self) -> u8 {
        self.thread(self.current).priority
    }

    pub fn set_nice(&mut self, nice: i32) {
        let current = self.current;
        self.thread_mut(current).nice = nice.clamp(NICE_MIN, NICE_MAX);
        if self.config.mlfqs {
            self.mlfqs_update_priority(current);
        }
        self.preempt_check();
    }

    pub fn get_nice(&self) -> i32 {
        self.thread(self.current).nice
    }

    /// 100 times the running thread's recent_cpu, rounded.
    pub fn get_recent_cpu(&self) -> i32 {
        hundredths(self.thread(self.current).recent_cpu)
    }

    /// 100 times the system load average, rounded.
    pub fn get_load_avg(&self) -> i32 {
        hundredths(self.load_avg)
    }

    pub fn load_avg(&self) -> Fixed {
        self.load_avg
    }
}

/// `100 * x`, rounded. Any 17.14 value scaled by 100 fits in an `i32`.
fn hundredths(x: Fixed) -> i32 {
    x.mul_int_round(100) as i32
}
