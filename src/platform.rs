// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

macro_rules! select_platform {
    (not(test), $mod:ident::$plat_impl:ident) => {
        #[cfg(not(test))]
        mod $mod;

        #[cfg(not(test))]
        pub use $mod::$plat_impl as PlatformImpl;
    };
    (test, $mod:ident::$plat_impl:ident) => {
        #[cfg(test)]
        pub mod $mod;

        #[cfg(test)]
        pub use $mod::$plat_impl as PlatformImpl;
    };
}

select_platform!(not(test), qemu::Qemu);
select_platform!(test, test::TestPlatform);

use crate::{logger::LogSink, memory::NsWindow};
use core::time::Duration;

/// Type alias for convenience, to avoid having to use the complicated type name everywhere.
pub type LogSinkImpl = <PlatformImpl as Platform>::LogSinkImpl;

/// The hooks implemented by all platforms.
pub trait Platform {
    /// The longest time a single dispatcher call may block the non-secure caller for, whatever
    /// timeout it asks for.
    const MAX_TIMEOUT: Duration;

    /// Platform dependent LogSink implementation type for Logger.
    type LogSinkImpl: LogSink;

    /// Initialises the logger. This should be called once, before any services are started.
    ///
    /// Any logs sent before this is called will be ignored.
    fn init_logger();

    /// Returns the window of memory shared with the non-secure world.
    ///
    /// Buffers passed by the non-secure world must lie entirely within this window.
    fn non_secure_window() -> NsWindow;
}
