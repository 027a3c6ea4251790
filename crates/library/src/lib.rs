//! Music library access: enumerate the WAV files on the mounted volume.
//!
//! # Modules
//!
//! - [`scanner`]: single-directory walk, marker filtering, per-file dispatch

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
#![allow(async_fn_in_trait)] // single-threaded executor, Send bounds not needed

pub mod scanner;

// Top-level re-exports for convenience
pub use scanner::{
    FileHandler, ScanConfig, ScanError, ScanOrder, ScanPath, ScanSummary, Scanner,
    DEFAULT_PAUSE, MAX_PATH_LEN, MAX_SORTED_ENTRIES,
};
