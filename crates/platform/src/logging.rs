//! Log macros shared by every crate in the workspace.
//!
//! Hardware builds log through `defmt` (RTT), the desktop emulator logs
//! through `tracing`, and everything else compiles the call sites away.
//! The backend is selected by *this* crate's features:
//!
//! | Feature   | Backend           |
//! |-----------|-------------------|
//! | `defmt`   | `defmt::<level>!` |
//! | `tracing` | `tracing::<level>!` (when `defmt` is off) |
//! | neither   | arguments are borrowed and discarded |
//!
//! Only plain `{}` placeholders are portable across both backends, and every
//! argument must implement both `Display` and `defmt::Format`. defmt expands to
//! absolute `defmt::` paths, so a crate calling these macros on a defmt build
//! must itself depend on `defmt` (each workspace crate forwards a `defmt` feature).
//!
//! ```no_run
//! platform::info!("mounted {} ({} bytes)", "/storage", 4096u32);
//! ```

#[cfg(feature = "defmt")]
mod backend {
    #[doc(hidden)]
    #[macro_export]
    macro_rules! __log {
        ($level:ident, $($arg:tt)+) => { $crate::__private::defmt::$level!($($arg)+) };
    }
}

#[cfg(all(feature = "tracing", not(feature = "defmt")))]
mod backend {
    #[doc(hidden)]
    #[macro_export]
    macro_rules! __log {
        ($level:ident, $($arg:tt)+) => { $crate::__private::tracing::$level!($($arg)+) };
    }
}

#[cfg(not(any(feature = "defmt", feature = "tracing")))]
mod backend {
    #[doc(hidden)]
    #[macro_export]
    macro_rules! __log {
        ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
            let _ = ($( &$arg, )*);
        }};
    }
}

/// Log at TRACE level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__log!(trace, $($arg)+) };
}

/// Log at DEBUG level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::__log!(debug, $($arg)+) };
}

/// Log at INFO level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__log!(info, $($arg)+) };
}

/// Log at WARN level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__log!(warn, $($arg)+) };
}

/// Log at ERROR level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__log!(error, $($arg)+) };
}

#[cfg(test)]
mod tests {
    #[test]
    fn macros_accept_literal_only_and_arguments() {
        let path = "/storage/a.wav";
        let len = 44_usize;
        crate::trace!("tick");
        crate::debug!("scanning {}", path);
        crate::info!("file {} has {} bytes", path, len);
        crate::warn!("slow write: {} bytes", len,);
        crate::error!("failed: {}", path);
    }
}
