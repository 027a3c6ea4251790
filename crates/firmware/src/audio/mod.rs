//! Audio backends: concrete [`platform::I2sDriver`] implementations.
//!
//! # Structure
//!
//! - `emulator`: [`SimulatedI2s`], a real-time paced channel for desktop runs
//!
//! # Dependency Injection
//!
//! Application code targets the [`platform::I2sDriver`] trait through
//! [`platform::I2sTransport`]. Concrete drivers are injected at the call site:
//!
//! ```rust,ignore
//! // Emulator:
//! app.run(&mut storage, SimulatedI2s::new(), &mut watchdog).await;
//! // Tests:
//! app.run(&mut storage, MockI2s::new(), &mut watchdog).await;
//! ```

#[cfg(any(test, feature = "std"))]
pub mod emulator;

#[cfg(any(test, feature = "std"))]
pub use emulator::SimulatedI2s;
