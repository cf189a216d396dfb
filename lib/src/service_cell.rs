//! Write-once slot holding a `&'static` service table.
//!
//! Lower layers declare a table of function pointers; a higher layer that can
//! see the concrete implementations registers it during init. Calls made
//! before registration are a kernel bug and panic.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

pub struct ServiceCell<T: 'static> {
    table: AtomicPtr<T>,
}

impl<T: 'static> ServiceCell<T> {
    pub const fn new() -> Self {
        Self {
            table: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Install the table. A later registration replaces the earlier one.
    pub fn register(&self, table: &'static T) {
        self.table
            .store(table as *const T as *mut T, Ordering::Release);
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        !self.table.load(Ordering::Acquire).is_null()
    }

    #[inline]
    pub fn try_get(&self) -> Option<&'static T>
    where
        T: Sync,
    {
        let table = self.table.load(Ordering::Acquire);
        // SAFETY: only `register` stores into the cell, and it only stores
        // pointers derived from `&'static T`.
        unsafe { table.as_ref() }
    }

    #[inline]
    pub fn get(&self) -> &'static T
    where
        T: Sync,
    {
        match self.try_get() {
            Some(table) => table,
            None => panic!("service table used before registration"),
        }
    }
}

impl<T: 'static> Default for ServiceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Table {
        answer: fn() -> u32,
    }

    fn forty_two() -> u32 {
        42
    }

    static TABLE: Table = Table { answer: forty_two };

    #[test]
    fn test_register_then_get() {
        let cell: ServiceCell<Table> = ServiceCell::new();
        assert!(!cell.is_registered());
        assert!(cell.try_get().is_none());

        cell.register(&TABLE);
        assert!(cell.is_registered());
        assert_eq!((cell.get().answer)(), 42);
    }

    #[test]
    #[should_panic(expected = "before registration")]
    fn test_get_unregistered_panics() {
        let cell: ServiceCell<Table> = ServiceCell::new();
        let _ = cell.get();
    }
}
