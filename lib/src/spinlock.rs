use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::cpu::{self, IntrLevel};

/// Mutex that disables interrupts while held.
/// Essential for kernel state touched from both thread and interrupt context:
/// on a uniprocessor the interrupt mask alone gives exclusion, the spin flag
/// keeps the type sound if it is ever shared with another CPU.
pub struct IrqMutex<T> {
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: IrqMutex provides exclusive access through atomic locking with
// interrupts disabled, making it safe to share across contexts.
unsafe impl<T: Send> Send for IrqMutex<T> {}
unsafe impl<T: Send> Sync for IrqMutex<T> {}

pub struct IrqMutexGuard<'a, T> {
    mutex: &'a IrqMutex<T>,
    saved_level: IntrLevel,
}

impl<T> IrqMutex<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    pub fn lock(&self) -> IrqMutexGuard<'_, T> {
        let saved_level = cpu::intr_disable();

        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_loop();
        }

        IrqMutexGuard {
            mutex: self,
            saved_level,
        }
    }
}

impl<'a, T> IrqMutexGuard<'a, T> {
    /// Interrupt level that will be restored when the guard drops.
    #[inline]
    pub fn saved_level(&self) -> IntrLevel {
        self.saved_level
    }
}

impl<'a, T> Deref for IrqMutexGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> DerefMut for IrqMutexGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T> Drop for IrqMutexGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.mutex.lock.store(false, Ordering::Release);
        cpu::intr_set_level(self.saved_level);
    }
}

/// RAII interrupt-disable guard (irqsave on creation, irqrestore on drop).
///
/// Used around a context switch: the switching thread disables interrupts,
/// mutates scheduler state under the `IrqMutex`, releases the mutex and
/// switches away. The level it saved is restored only when it resumes.
#[must_use = "if unused, interrupts will be immediately restored"]
pub struct IrqGuard {
    saved_level: IntrLevel,
}

impl IrqGuard {
    #[inline]
    pub fn new() -> Self {
        Self {
            saved_level: cpu::intr_disable(),
        }
    }

    #[inline]
    pub fn saved_level(&self) -> IntrLevel {
        self.saved_level
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline]
    fn drop(&mut self) {
        cpu::intr_set_level(self.saved_level);
    }
}
