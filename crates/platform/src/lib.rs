//! Hardware Abstraction Layer (HAL) for the flash WAV player
//!
//! This crate provides trait-based abstractions for every hardware component
//! the streaming pipeline touches, enabling development and testing without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate)
//!         ↓
//! Feature Layers (playback, library)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (I2S peripheral + DMA, flash VFS)
//! ```
//!
//! # Abstraction Levels
//!
//! ## High-Level Peripherals
//! - [`Storage`] / [`Volume`] - Mounted flash namespace
//! - [`I2sTransport`] - DMA-backed audio output channel
//! - [`Watchdog`] - Liveness signal
//!
//! ## Low-Level Peripherals
//! - [`I2sDriver`] - Raw I2S channel lifecycle (implemented per target)
//! - [`dma`] - DMA descriptor ring accounting
//!
//! # Features
//!
//! - `std`: Host implementations ([`storage_local`], [`mocks`])
//! - `defmt`: defmt derives and defmt-backed log macros
//! - `tracing`: tracing-backed log macros (desktop emulator)
//!
//! # Example
//!
//! ```no_run
//! use platform::{I2sDriver, I2sTransport, TransportConfig};
//!
//! async fn beep<D: I2sDriver>(driver: D, pcm: &[u8]) {
//!     let mut tx = I2sTransport::create(driver, TransportConfig::default()).unwrap();
//!     tx.write(pcm).await.unwrap();
//!     tx.delete().unwrap();
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // pin and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod logging;

pub mod audio;
pub mod audio_config;
pub mod audio_types;
pub mod config;
pub mod dma;
pub mod storage;
pub mod transport;
pub mod watchdog;

#[cfg(feature = "std")]
pub mod storage_local;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export main high-level traits
pub use audio::{DriverFault, I2sDriver};
pub use audio_config::{
    ChannelConfig, DataBitWidth, I2sPins, I2sRole, SlotLayout, SlotMode, StdModeConfig,
    TransportConfig,
};
pub use audio_types::{OutOfRangeError, SampleRateHz};
pub use config::ConfigError;
pub use storage::{
    DirEntry, Directory, EntryKind, File, MountConfig, MountError, Storage, StorageError, Volume,
    VolumeInfo,
};
pub use transport::{I2sTransport, TransportError};
pub use watchdog::{NoopWatchdog, Watchdog};

// Re-export DMA types
pub use dma::DescriptorRing;

/// Re-exports used by the exported log macros. Not public API.
#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "defmt")]
    pub use defmt;
    #[cfg(feature = "tracing")]
    pub use tracing;
}
