//! tickos shared kernel ABI types.
//!
//! Single source of truth for the thread identifiers, status state machine,
//! and scheduling constants used by every other crate in the workspace.

#![no_std]
#![forbid(unsafe_code)]

pub mod thread;

pub use thread::*;
