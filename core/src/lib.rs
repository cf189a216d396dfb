#![no_std]

//! Scheduler and synchronization core: threads, the priority ready queue,
//! tick-based sleeping, semaphores, locks and condition variables with
//! priority donation, and the MLFQS policy.

extern crate alloc;

pub mod config;
pub mod platform;
pub mod scheduler;
pub mod sync;
pub mod timer;

pub use config::{SchedConfig, config_from_cmdline};
pub use scheduler::{
    SchedError, Scheduler, init_scheduler, thread_create, thread_current, thread_exit,
    thread_yield, with_scheduler,
};
pub use sync::{Condition, Lock, Semaphore};
pub use timer::{TickEvents, timer_interrupt, timer_sleep, timer_ticks};
