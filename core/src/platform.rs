use tickos_abi::Tid;

tickos_lib::define_service! {
    /// Board layer hooks the scheduler drives.
    ///
    /// Registered once during early boot by whatever owns the thread stacks
    /// and the timer hardware.
    platform => PlatformServices {
        // -- Threads --------------------------------------------------------
        /// Save the CPU context of `from` and resume `to`, with interrupts
        /// disabled. Returns when `from` is scheduled again. When `reap_from`
        /// is set, `from` has exited and never returns here; its stack may be
        /// freed once the switch is complete.
        context_switch(from: Tid, to: Tid, reap_from: bool);

        // -- Timing ---------------------------------------------------------
        /// Spin for about `ns` nanoseconds without yielding.
        busy_wait_ns(ns: u64);
    }
}
