//! Interrupt level management: disable/enable and irqsave/irqrestore.
//!
//! Masking interrupts is the kernel's single exclusion primitive on a
//! uniprocessor. On bare-metal x86_64 the level is the IF bit in RFLAGS and
//! is driven through the `x86_64` crate. Hosted builds (unit tests, the
//! simulator) keep an emulated flag so the same save/disable/restore
//! discipline runs off-target.

use core::fmt;

/// Interrupt enable level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntrLevel {
    Off,
    On,
}

impl IntrLevel {
    #[inline]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for IntrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
        }
    }
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod imp {
    use x86_64::instructions::interrupts;

    #[inline(always)]
    pub fn enabled() -> bool {
        interrupts::are_enabled()
    }

    #[inline(always)]
    pub fn enable() {
        interrupts::enable();
    }

    #[inline(always)]
    pub fn disable() {
        interrupts::disable();
    }
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
mod imp {
    use core::sync::atomic::{AtomicBool, Ordering};

    static IF_FLAG: AtomicBool = AtomicBool::new(true);

    #[inline]
    pub fn enabled() -> bool {
        IF_FLAG.load(Ordering::Acquire)
    }

    #[inline]
    pub fn enable() {
        IF_FLAG.store(true, Ordering::Release);
    }

    #[inline]
    pub fn disable() {
        IF_FLAG.store(false, Ordering::Release);
    }
}

/// Returns the current interrupt level.
#[inline(always)]
pub fn intr_get_level() -> IntrLevel {
    if imp::enabled() {
        IntrLevel::On
    } else {
        IntrLevel::Off
    }
}

/// Enable interrupts. Returns the previous level.
#[inline(always)]
pub fn intr_enable() -> IntrLevel {
    let old = intr_get_level();
    imp::enable();
    old
}

/// Disable interrupts (irqsave). Returns the previous level.
#[inline(always)]
pub fn intr_disable() -> IntrLevel {
    let old = intr_get_level();
    imp::disable();
    old
}

/// Restore a level saved by [`intr_disable`] (irqrestore). Returns the
/// level that was in effect before the call.
#[inline(always)]
pub fn intr_set_level(level: IntrLevel) -> IntrLevel {
    match level {
        IntrLevel::On => intr_enable(),
        IntrLevel::Off => intr_disable(),
    }
}

/// Returns true if interrupts are currently enabled.
#[inline(always)]
pub fn are_interrupts_enabled() -> bool {
    imp::enabled()
}
