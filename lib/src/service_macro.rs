//! `define_service!`: declare a late-bound table of function pointers.
//!
//! ```ignore
//! tickos_lib::define_service! {
//!     /// Hooks provided by the board layer.
//!     platform => PlatformServices {
//!         context_switch(from: u32, to: u32, reap_from: bool);
//!         @no_wrapper busy_wait_ns(ns: u64);
//!     }
//! }
//! ```
//!
//! expands to a `PlatformServices` struct with one `fn` pointer field per
//! entry, a static [`ServiceCell`](crate::ServiceCell), and:
//!
//! - `register_platform_services(&'static PlatformServices)`
//! - `is_platform_registered() -> bool`
//! - `platform_services() -> &'static PlatformServices`
//! - a free function forwarding to each field, unless the entry is marked
//!   `@no_wrapper` (the caller then writes the wrapper by hand).

#[macro_export]
macro_rules! define_service {
    (@wrapper $name:ident $(#[$fmeta:meta])* @no_wrapper
        $func:ident ( $($arg:ident : $argty:ty),* ) $(-> $ret:ty)?) => {};

    (@wrapper $name:ident $(#[$fmeta:meta])*
        $func:ident ( $($arg:ident : $argty:ty),* ) $(-> $ret:ty)?) => {
        $crate::paste::paste! {
            $(#[$fmeta])*
            #[inline(always)]
            pub fn $func($($arg: $argty),*) $(-> $ret)? {
                ([<$name _services>]().$func)($($arg),*)
            }
        }
    };

    (
        $(#[$meta:meta])*
        $name:ident => $table:ident {
            $(
                $(#[$fmeta:meta])*
                $(@$flag:ident)? $func:ident ( $($arg:ident : $argty:ty),* $(,)? ) $(-> $ret:ty)? ;
            )*
        }
    ) => {
        $crate::paste::paste! {
            $(#[$meta])*
            pub struct $table {
                $(
                    $(#[$fmeta])*
                    pub $func: fn($($argty),*) $(-> $ret)?,
                )*
            }

            static [<$name:upper _SERVICES>]: $crate::ServiceCell<$table> =
                $crate::ServiceCell::new();

            pub fn [<register_ $name _services>](table: &'static $table) {
                [<$name:upper _SERVICES>].register(table);
            }

            pub fn [<is_ $name _registered>]() -> bool {
                [<$name:upper _SERVICES>].is_registered()
            }

            #[inline(always)]
            pub fn [<$name _services>]() -> &'static $table {
                [<$name:upper _SERVICES>].get()
            }
        }

        $(
            $crate::define_service!(@wrapper $name $(#[$fmeta])* $(@$flag)?
                $func ( $($arg : $argty),* ) $(-> $ret)?);
        )*
    };
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU64, Ordering};

    crate::define_service! {
        /// Table used only by these tests.
        probe => ProbeServices {
            /// Adds to the probe counter.
            bump(by: u64);
            total() -> u64;
            @no_wrapper reset();
        }
    }

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn bump_impl(by: u64) {
        COUNTER.fetch_add(by, Ordering::SeqCst);
    }

    fn total_impl() -> u64 {
        COUNTER.load(Ordering::SeqCst)
    }

    fn reset_impl() {
        COUNTER.store(0, Ordering::SeqCst);
    }

    static PROBE: ProbeServices = ProbeServices {
        bump: bump_impl,
        total: total_impl,
        reset: reset_impl,
    };

    #[test]
    fn test_generated_wrappers_forward_to_table() {
        assert!(!is_probe_registered());
        register_probe_services(&PROBE);
        assert!(is_probe_registered());

        (probe_services().reset)();
        bump(3);
        bump(4);
        assert_eq!(total(), 7);
    }
}
