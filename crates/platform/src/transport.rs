//! DMA-backed audio output channel.
//!
//! [`I2sTransport`] owns one [`I2sDriver`] channel for the whole process and
//! enforces its lifecycle:
//!
//! ```text
//! create: new_channel ─▶ init_std_mode ─▶ enable      (any failure rolls back)
//! write*: driver.write until every byte is queued    (the backpressure point)
//! delete: disable ─▶ delete_channel                  (consumes the transport)
//! ```
//!
//! `write` is the only place the pipeline suspends for the hardware: it
//! returns when the DMA ring has accepted the whole buffer, which paces file
//! reads to the wire rate. An optional [`TransportConfig::write_timeout`]
//! bounds each wait for ring space.

use embassy_time::{with_timeout, Duration};
use thiserror_no_std::Error;

use crate::audio::{DriverFault, I2sDriver};
use crate::audio_config::TransportConfig;
use crate::audio_types::SampleRateHz;
use crate::config::ConfigError;

/// Audio transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The configuration was rejected before touching the driver.
    #[error("{0}")]
    Config(ConfigError),
    /// Channel allocation failed.
    #[error("failed to create I2S channel: {0}")]
    Allocate(DriverFault),
    /// Standard-mode initialisation failed.
    #[error("failed to init I2S channel: {0}")]
    ModeInit(DriverFault),
    /// Enabling the channel failed.
    #[error("failed to enable I2S channel: {0}")]
    Enable(DriverFault),
    /// The driver faulted while queueing data.
    #[error("I2S write failed after {written} bytes: {fault}")]
    Write {
        /// Bytes accepted before the fault.
        written: usize,
        /// Driver fault.
        fault: DriverFault,
    },
    /// No DMA space became free within the configured bound.
    #[error("I2S write timed out after {written} bytes")]
    Timeout {
        /// Bytes accepted before the wait expired.
        written: usize,
    },
    /// The driver accepted zero bytes of a non-empty buffer.
    #[error("I2S driver stalled after {written} bytes")]
    Stalled {
        /// Bytes accepted before the stall.
        written: usize,
    },
    /// `write` or `set_sample_rate` on a disabled channel.
    #[error("I2S channel is not enabled")]
    NotEnabled,
    /// Disabling the channel failed.
    #[error("failed to disable I2S channel: {0}")]
    Disable(DriverFault),
    /// Releasing the channel failed.
    #[error("failed to delete I2S channel: {0}")]
    Delete(DriverFault),
    /// Re-clocking the channel failed.
    #[error("failed to reconfigure I2S clock: {0}")]
    Reconfigure(DriverFault),
    /// A stream's sample rate differs from the channel's and re-clocking is not allowed.
    #[error("stream rate {stream} Hz differs from channel rate {channel} Hz")]
    RateMismatch {
        /// Rate the stream declares.
        stream: u32,
        /// Rate the channel is clocked at.
        channel: u32,
    },
}

impl From<ConfigError> for TransportError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// An allocated, configured I2S TX channel.
///
/// Exclusively owned; lend it as `&mut` to the one writer that needs it.
pub struct I2sTransport<D: I2sDriver> {
    driver: D,
    config: TransportConfig,
    enabled: bool,
}

impl<D: I2sDriver> I2sTransport<D> {
    /// Allocate, initialise and enable a channel.
    ///
    /// The three steps run once each, in order; a failing step releases the
    /// channel allocated by the first step before the error is returned.
    ///
    /// # Errors
    ///
    /// [`TransportError::Config`], [`TransportError::Allocate`],
    /// [`TransportError::ModeInit`] or [`TransportError::Enable`].
    pub fn create(mut driver: D, config: TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        driver
            .new_channel(&config.channel)
            .map_err(TransportError::Allocate)?;

        if let Err(fault) = driver.init_std_mode(&config.std_mode) {
            crate::error!("I2S mode init failed: {}", fault);
            Self::release_after_failure(&mut driver);
            return Err(TransportError::ModeInit(fault));
        }

        if let Err(fault) = driver.enable() {
            crate::error!("I2S enable failed: {}", fault);
            Self::release_after_failure(&mut driver);
            return Err(TransportError::Enable(fault));
        }

        crate::info!(
            "I2S channel up: {} Hz, {} descriptors x {} frames",
            config.std_mode.sample_rate.get(),
            config.channel.dma_desc_num,
            config.channel.dma_frame_num
        );
        crate::debug!(
            "I2S clocks: bclk {} Hz, mclk {} Hz, {} byte DMA ring",
            config.std_mode.bclk_hz(),
            config.std_mode.mclk_hz(),
            config.ring_bytes()
        );
        Ok(Self {
            driver,
            config,
            enabled: true,
        })
    }

    fn release_after_failure(driver: &mut D) {
        if let Err(fault) = driver.delete_channel() {
            crate::warn!("I2S channel release after failed create also failed: {}", fault);
        }
    }

    /// Queue `bytes` for output, suspending until the DMA ring has accepted all of them.
    ///
    /// Returns `bytes.len()` on success.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotEnabled`], [`TransportError::Write`],
    /// [`TransportError::Timeout`] or [`TransportError::Stalled`]; each carries
    /// the number of bytes already queued where that is meaningful.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.enabled {
            return Err(TransportError::NotEnabled);
        }

        let mut written = 0usize;
        while let Some(pending) = bytes.get(written..).filter(|rest| !rest.is_empty()) {
            let accepted = match self.config.write_timeout {
                Some(bound) => {
                    Self::bounded_write(&mut self.driver, pending, bound, written).await?
                }
                None => self.driver.write(pending).await,
            }
            .map_err(|fault| TransportError::Write { written, fault })?;

            if accepted == 0 {
                return Err(TransportError::Stalled { written });
            }
            written = written.saturating_add(accepted.min(pending.len()));
        }
        Ok(written)
    }

    async fn bounded_write(
        driver: &mut D,
        pending: &[u8],
        bound: Duration,
        written: usize,
    ) -> Result<Result<usize, DriverFault>, TransportError> {
        with_timeout(bound, driver.write(pending))
            .await
            .map_err(|_| TransportError::Timeout { written })
    }

    /// Re-clock the channel for a new frame rate (disable, reconfigure, enable).
    ///
    /// # Errors
    ///
    /// [`TransportError::NotEnabled`], [`TransportError::Disable`],
    /// [`TransportError::Reconfigure`] or [`TransportError::Enable`]. After a
    /// reconfigure or enable failure the channel is left disabled.
    pub fn set_sample_rate(&mut self, rate: SampleRateHz) -> Result<(), TransportError> {
        if !self.enabled {
            return Err(TransportError::NotEnabled);
        }
        if rate == self.config.std_mode.sample_rate {
            return Ok(());
        }
        self.disable()?;
        self.driver
            .reconfig_std_clock(rate)
            .map_err(TransportError::Reconfigure)?;
        self.config.std_mode.sample_rate = rate;
        self.driver.enable().map_err(TransportError::Enable)?;
        self.enabled = true;
        crate::info!("I2S channel re-clocked to {} Hz", rate.get());
        Ok(())
    }

    /// Stop the channel. A second call is a no-op.
    ///
    /// # Errors
    ///
    /// [`TransportError::Disable`].
    pub fn disable(&mut self) -> Result<(), TransportError> {
        if self.enabled {
            self.driver.disable().map_err(TransportError::Disable)?;
            self.enabled = false;
        }
        Ok(())
    }

    /// Disable (if still enabled), then release the channel, returning the driver.
    ///
    /// # Errors
    ///
    /// [`TransportError::Disable`] or [`TransportError::Delete`].
    pub fn delete(mut self) -> Result<D, TransportError> {
        self.disable()?;
        self.driver.delete_channel().map_err(TransportError::Delete)?;
        crate::info!("I2S channel released");
        Ok(self.driver)
    }

    /// Frame rate the channel is clocked at.
    pub fn sample_rate(&self) -> SampleRateHz {
        self.config.std_mode.sample_rate
    }

    /// Width of one slot in bits.
    pub fn bits_per_sample(&self) -> u16 {
        self.config.std_mode.bit_width.bits()
    }

    /// `true` between a successful enable and the next disable.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The configuration currently applied.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use crate::mocks::{pcm_ramp as pcm, I2sCall, I2sStep, MockI2s};

    #[test]
    fn create_runs_three_steps_in_order() {
        let tx = I2sTransport::create(MockI2s::new(), TransportConfig::default()).unwrap();
        assert!(tx.is_enabled());
        assert_eq!(
            tx.driver().calls(),
            &[I2sCall::NewChannel, I2sCall::InitStdMode, I2sCall::Enable]
        );
    }

    #[test]
    fn allocate_failure_touches_nothing_else() {
        let driver = MockI2s::new().fail_at(I2sStep::NewChannel, DriverFault::NotFound);
        let probe = driver.probe();
        let err = I2sTransport::create(driver, TransportConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, TransportError::Allocate(DriverFault::NotFound));
        assert_eq!(probe.calls(), vec![I2sCall::NewChannel]);
    }

    #[test]
    fn mode_init_failure_releases_channel() {
        let driver = MockI2s::new().fail_at(I2sStep::InitStdMode, DriverFault::InvalidArg);
        let probe = driver.probe();
        let err = I2sTransport::create(driver, TransportConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, TransportError::ModeInit(DriverFault::InvalidArg));
        assert_eq!(
            probe.calls(),
            vec![I2sCall::NewChannel, I2sCall::InitStdMode, I2sCall::DeleteChannel]
        );
    }

    #[test]
    fn enable_failure_releases_channel() {
        let driver = MockI2s::new().fail_at(I2sStep::Enable, DriverFault::Hardware);
        let probe = driver.probe();
        let err = I2sTransport::create(driver, TransportConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, TransportError::Enable(DriverFault::Hardware));
        assert_eq!(
            probe.calls(),
            vec![
                I2sCall::NewChannel,
                I2sCall::InitStdMode,
                I2sCall::Enable,
                I2sCall::DeleteChannel
            ]
        );
    }

    #[test]
    fn invalid_config_never_reaches_driver() {
        let mut config = TransportConfig::default();
        config.channel.dma_frame_num = 0;
        let driver = MockI2s::new();
        let probe = driver.probe();
        let err = I2sTransport::create(driver, config).err().unwrap();
        assert!(matches!(err, TransportError::Config(_)));
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn multi_frame_write_survives_partial_acceptance() {
        // One 16-bit stereo DMA frame per driver call.
        let driver = MockI2s::new().accept_at_most(4);
        let mut tx = I2sTransport::create(driver, TransportConfig::default()).unwrap();
        let data = pcm(4 * 1024 * 3 + 2);

        let n = tx.write(&data).await.unwrap();

        assert_eq!(n, data.len());
        assert_eq!(tx.driver().captured(), data.as_slice());
        assert!(tx.driver().write_calls() > 1);
    }

    #[tokio::test]
    async fn write_fault_reports_bytes_already_queued() {
        let driver = MockI2s::new()
            .accept_at_most(8)
            .fail_write_after(16, DriverFault::Hardware);
        let mut tx = I2sTransport::create(driver, TransportConfig::default()).unwrap();

        let err = tx.write(&pcm(64)).await.unwrap_err();

        assert_eq!(
            err,
            TransportError::Write {
                written: 16,
                fault: DriverFault::Hardware
            }
        );
    }

    #[tokio::test]
    async fn stalled_sink_hits_write_timeout() {
        let mut config = TransportConfig::default();
        config.write_timeout = Some(Duration::from_millis(20));
        let driver = MockI2s::new().accept_at_most(4).stall_after(8);
        let mut tx = I2sTransport::create(driver, config).unwrap();

        let err = tx.write(&pcm(32)).await.unwrap_err();

        assert_eq!(err, TransportError::Timeout { written: 8 });
    }

    #[tokio::test]
    async fn zero_acceptance_is_reported_as_stall() {
        let driver = MockI2s::new().accept_at_most(0);
        let mut tx = I2sTransport::create(driver, TransportConfig::default()).unwrap();
        let err = tx.write(&pcm(4)).await.unwrap_err();
        assert_eq!(err, TransportError::Stalled { written: 0 });
    }

    #[tokio::test]
    async fn empty_write_is_a_no_op() {
        let mut tx = I2sTransport::create(MockI2s::new(), TransportConfig::default()).unwrap();
        assert_eq!(tx.write(&[]).await.unwrap(), 0);
        assert_eq!(tx.driver().write_calls(), 0);
    }

    #[tokio::test]
    async fn write_after_disable_is_rejected() {
        let mut tx = I2sTransport::create(MockI2s::new(), TransportConfig::default()).unwrap();
        tx.disable().unwrap();
        assert_eq!(tx.write(&pcm(4)).await.unwrap_err(), TransportError::NotEnabled);
    }

    #[test]
    fn teardown_disables_then_deletes_once() {
        let mut tx = I2sTransport::create(MockI2s::new(), TransportConfig::default()).unwrap();
        tx.disable().unwrap();
        tx.disable().unwrap();
        let driver = tx.delete().unwrap();
        assert_eq!(
            driver.calls(),
            &[
                I2sCall::NewChannel,
                I2sCall::InitStdMode,
                I2sCall::Enable,
                I2sCall::Disable,
                I2sCall::DeleteChannel
            ]
        );
    }

    #[test]
    fn delete_while_enabled_disables_first() {
        let tx = I2sTransport::create(MockI2s::new(), TransportConfig::default()).unwrap();
        let driver = tx.delete().unwrap();
        let calls = driver.calls();
        assert_eq!(&calls[calls.len() - 2..], &[I2sCall::Disable, I2sCall::DeleteChannel]);
    }

    #[test]
    fn set_sample_rate_reclocks_disabled_channel() {
        let mut tx = I2sTransport::create(MockI2s::new(), TransportConfig::default()).unwrap();
        let rate = SampleRateHz::new(48_000).unwrap();

        tx.set_sample_rate(rate).unwrap();

        assert_eq!(tx.sample_rate(), rate);
        assert!(tx.is_enabled());
        let calls = tx.driver().calls();
        assert_eq!(
            &calls[3..],
            &[
                I2sCall::Disable,
                I2sCall::ReconfigClock(48_000),
                I2sCall::Enable
            ]
        );
    }

    #[test]
    fn set_sample_rate_to_current_rate_skips_driver() {
        let mut tx = I2sTransport::create(MockI2s::new(), TransportConfig::default()).unwrap();
        tx.set_sample_rate(SampleRateHz::CD).unwrap();
        assert_eq!(tx.driver().calls().len(), 3);
    }
}
