//! This file ensures that defmt and log are optional, providing stubs if neither is available

#![macro_use]
#![allow(unused_macros)]

#[cfg(feature = "defmt")]
pub use defmt::bitflags;

#[cfg(not(feature = "defmt"))]
pub use bitflags::bitflags;

macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::debug!($fmt $(, $arg)*);
        #[cfg(feature = "log")]
        log::debug!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        {
            $(let _ = &$arg;)*
        }
    }};
}

macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::info!($fmt $(, $arg)*);
        #[cfg(feature = "log")]
        log::info!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        {
            $(let _ = &$arg;)*
        }
    }};
}

macro_rules! warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::warn!($fmt $(, $arg)*);
        #[cfg(feature = "log")]
        log::warn!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        {
            $(let _ = &$arg;)*
        }
    }};
}
