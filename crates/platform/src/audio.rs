//! I2S peripheral driver abstraction
//!
//! One implementation per target: the vendor I2S driver on hardware, the
//! paced emulator channel on the desktop, [`crate::mocks::MockI2s`] in tests.
//! Application code never calls this trait directly; it goes through
//! [`crate::I2sTransport`], which owns the lifecycle ordering and rollback.

use thiserror_no_std::Error;

use crate::audio_config::{ChannelConfig, StdModeConfig};
use crate::audio_types::SampleRateHz;

/// Fault reported by an [`I2sDriver`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverFault {
    /// DMA descriptors or channel memory could not be allocated.
    #[error("out of memory")]
    NoMem,
    /// The driver rejected a configuration value.
    #[error("invalid argument")]
    InvalidArg,
    /// The call is not valid in the channel's current state.
    #[error("invalid state")]
    InvalidState,
    /// No free controller / channel.
    #[error("no free channel")]
    NotFound,
    /// The driver's own wait expired.
    #[error("driver timeout")]
    Timeout,
    /// Bus or DMA fault.
    #[error("hardware fault")]
    Hardware,
}

/// Raw I2S TX channel lifecycle.
///
/// Calls arrive in this order for one channel:
/// `new_channel → init_std_mode → enable → write* → disable → delete_channel`,
/// with `reconfig_std_clock` only allowed while disabled.
pub trait I2sDriver {
    /// Allocate the channel and its DMA descriptors.
    fn new_channel(&mut self, config: &ChannelConfig) -> Result<(), DriverFault>;

    /// Apply clock, slot and GPIO configuration.
    fn init_std_mode(&mut self, config: &StdModeConfig) -> Result<(), DriverFault>;

    /// Change the frame clock of a disabled channel.
    fn reconfig_std_clock(&mut self, sample_rate: SampleRateHz) -> Result<(), DriverFault>;

    /// Start clocking data out.
    fn enable(&mut self) -> Result<(), DriverFault>;

    /// Stop clocking data out.
    fn disable(&mut self) -> Result<(), DriverFault>;

    /// Release the channel and its DMA memory.
    fn delete_channel(&mut self) -> Result<(), DriverFault>;

    /// Queue bytes into free DMA descriptors.
    ///
    /// Suspends until at least one byte fits, then accepts as many bytes as fit
    /// and returns that count. Returning `Ok(0)` for a non-empty buffer is a
    /// contract violation.
    fn write(
        &mut self,
        bytes: &[u8],
    ) -> impl core::future::Future<Output = Result<usize, DriverFault>>;
}
