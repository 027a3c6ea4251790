//! Flash WAV Player Firmware
//!
//! Plays every WAV file on the flash partition once, in directory order,
//! through a DMA-backed I2S channel.
//!
//! # Architecture
//!
//! This firmware follows a layered architecture:
//!
//! ```text
//! Application Layer (app, config, main.rs)
//!         ↓
//! Feature Layers (library scanner, playback streamer)
//!         ↓
//! Platform HAL (storage, I2S transport, watchdog)
//!         ↓
//! Drivers (audio backends: vendor I2S on hardware, SimulatedI2s on desktop)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the board (defmt logging)
//! - `emulator` - Build the desktop player (tokio, tracing, host storage)
//! - `std` - Enable standard library (host storage, env config, SimulatedI2s)
//!
//! # Examples
//!
//! ## Emulator Target
//!
//! ```bash
//! MUSIC_PATH=./music RUST_LOG=info cargo run -p firmware --features emulator
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
#![allow(async_fn_in_trait)] // single-threaded executor, Send bounds not needed
// Pedantic lints too noisy for firmware application code:
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]

pub mod app;
pub mod audio;
pub mod config;

// Re-export key types
pub use app::{AppError, Application, PlaylistHandler, RunSummary, TransportSink};
pub use config::{AppConfig, FailurePolicy, RatePolicy};

#[cfg(any(test, feature = "std"))]
pub use audio::SimulatedI2s;
