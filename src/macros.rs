//! Logging macros used across the emulator core.
//!
//! All of the diagnostics produced by the core are routed through the
//! [`log`](https://docs.rs/log) facade so that the host driver decides
//! where (and whether) they end up.

#[macro_export]
macro_rules! debugln {
    ($($rest:tt)*) => {
        ::log::debug!($($rest)*)
    };
}

#[macro_export]
macro_rules! infoln {
    ($($rest:tt)*) => {
        ::log::info!($($rest)*)
    };
}

#[macro_export]
macro_rules! warnln {
    ($($rest:tt)*) => {
        ::log::warn!($($rest)*)
    };
}
