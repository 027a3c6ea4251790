//! Application constants and configuration validation errors
//!
//! All branding and naming should reference these constants rather than
//! hardcoding values.

use thiserror_no_std::Error;

/// The application name
pub const APP_NAME: &str = "Flash WAV Player";

/// The application type/category
pub const APP_TYPE: &str = "PCM streamer";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A configuration value that violates its invariant.
///
/// Produced by every `validate()` in the workspace ([`crate::MountConfig`],
/// [`crate::TransportConfig`], the application config) so that a bad value
/// is rejected before any hardware or filesystem resource is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("invalid configuration: {field} {reason}")]
pub struct ConfigError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Human-readable constraint that was violated.
    pub reason: &'static str,
}

impl ConfigError {
    /// Build a `ConfigError` for `field`.
    pub const fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}
