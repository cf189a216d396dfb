#![no_std]

//! Kernel support library: interrupt-level control, the interrupt-masking
//! mutex, kernel logging, 17.14 fixed-point math, late-bound service tables
//! and command-line parsing.

pub mod cmdline;
pub mod cpu;
pub mod fixed_point;
pub mod klog;
pub mod service_cell;
pub mod service_macro;
pub mod spinlock;

#[doc(hidden)]
pub use paste;

pub use cpu::{IntrLevel, intr_disable, intr_enable, intr_get_level, intr_set_level};
pub use fixed_point::{FIXED_ONE, Fixed};
pub use klog::{KlogLevel, klog_get_level, klog_init, klog_register_backend, klog_set_level};
pub use service_cell::ServiceCell;
pub use spinlock::{IrqGuard, IrqMutex, IrqMutexGuard};
