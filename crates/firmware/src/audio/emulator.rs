//! Emulator I2S channel
//!
//! Stands in for the vendor driver on the desktop. Nothing reaches a DAC:
//! accepted bytes are counted and the DMA ring drains in real time at the
//! configured frame rate, so `write` applies the same backpressure the
//! hardware does and a 10 s file takes 10 s to "play".

use embassy_time::{Duration, Instant, Timer};
use platform::{
    ChannelConfig, DescriptorRing, DriverFault, I2sDriver, SampleRateHz, StdModeConfig,
    TransportConfig,
};

/// Real-time paced I2S channel with no audio output.
#[derive(Debug)]
pub struct SimulatedI2s {
    channel: Option<ChannelConfig>,
    std_mode: Option<StdModeConfig>,
    ring: DescriptorRing,
    enabled: bool,
    last_drain: Instant,
    bytes_accepted: u64,
}

impl Default for SimulatedI2s {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedI2s {
    /// Unallocated channel.
    pub fn new() -> Self {
        Self {
            channel: None,
            std_mode: None,
            ring: DescriptorRing::new(0, 0),
            enabled: false,
            last_drain: Instant::now(),
            bytes_accepted: 0,
        }
    }

    /// Total bytes queued since allocation.
    pub fn bytes_accepted(&self) -> u64 {
        self.bytes_accepted
    }

    /// Descriptors that went out as silence while enabled.
    pub fn underruns(&self) -> u32 {
        self.ring.underruns()
    }

    /// Current frame clock, once initialised.
    pub fn sample_rate(&self) -> Option<SampleRateHz> {
        self.std_mode.map(|m| m.sample_rate)
    }

    /// `true` between `new_channel` and `delete_channel`.
    pub fn is_allocated(&self) -> bool {
        self.channel.is_some()
    }

    /// Wall time one descriptor takes on the wire.
    fn descriptor_period(&self) -> Duration {
        let (Some(channel), Some(mode)) = (self.channel, self.std_mode) else {
            return Duration::from_ticks(0);
        };
        let micros = u64::from(channel.dma_frame_num)
            .saturating_mul(1_000_000)
            .checked_div(u64::from(mode.sample_rate.get()))
            .unwrap_or(0);
        Duration::from_micros(micros)
    }

    /// Retire every descriptor the wire has finished since the last drain.
    fn drain(&mut self) {
        let period = self.descriptor_period().as_ticks();
        let Some(done) = self.last_drain.elapsed().as_ticks().checked_div(period) else {
            return;
        };
        if done == 0 {
            return;
        }
        // Beyond one lap of the ring only the underrun count would change.
        let ring_len = self
            .ring
            .capacity()
            .checked_div(self.ring.descriptor_bytes())
            .unwrap_or(0);
        let retired = usize::try_from(done)
            .unwrap_or(usize::MAX)
            .min(ring_len.saturating_add(1));
        self.ring.complete(retired);
        let advanced = Duration::from_ticks(period.saturating_mul(done));
        self.last_drain = self.last_drain.checked_add(advanced).unwrap_or_else(Instant::now);
    }
}

impl I2sDriver for SimulatedI2s {
    fn new_channel(&mut self, config: &ChannelConfig) -> Result<(), DriverFault> {
        if self.channel.is_some() {
            return Err(DriverFault::NotFound);
        }
        if config.dma_desc_num == 0 || config.dma_frame_num == 0 {
            return Err(DriverFault::InvalidArg);
        }
        self.channel = Some(*config);
        self.bytes_accepted = 0;
        Ok(())
    }

    fn init_std_mode(&mut self, config: &StdModeConfig) -> Result<(), DriverFault> {
        let channel = self.channel.ok_or(DriverFault::InvalidState)?;
        if self.enabled {
            return Err(DriverFault::InvalidState);
        }
        self.ring = DescriptorRing::for_config(&TransportConfig {
            channel,
            std_mode: *config,
            ..TransportConfig::default()
        });
        self.std_mode = Some(*config);
        Ok(())
    }

    fn reconfig_std_clock(&mut self, sample_rate: SampleRateHz) -> Result<(), DriverFault> {
        if self.enabled {
            return Err(DriverFault::InvalidState);
        }
        let mode = self.std_mode.as_mut().ok_or(DriverFault::InvalidState)?;
        mode.sample_rate = sample_rate;
        Ok(())
    }

    fn enable(&mut self) -> Result<(), DriverFault> {
        if self.std_mode.is_none() || self.enabled {
            return Err(DriverFault::InvalidState);
        }
        self.enabled = true;
        self.last_drain = Instant::now();
        platform::debug!(
            "simulated I2S running, {} us per descriptor",
            self.descriptor_period().as_micros()
        );
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DriverFault> {
        if !self.enabled {
            return Err(DriverFault::InvalidState);
        }
        self.enabled = false;
        self.ring.clear();
        Ok(())
    }

    fn delete_channel(&mut self) -> Result<(), DriverFault> {
        if self.enabled || self.channel.is_none() {
            return Err(DriverFault::InvalidState);
        }
        self.channel = None;
        self.std_mode = None;
        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<usize, DriverFault> {
        if !self.enabled {
            return Err(DriverFault::InvalidState);
        }
        if bytes.is_empty() {
            return Ok(0);
        }
        loop {
            self.drain();
            if self.ring.free() > 0 {
                break;
            }
            Timer::after(self.descriptor_period()).await;
        }
        let accepted = self.ring.push(bytes.len());
        self.bytes_accepted = self
            .bytes_accepted
            .saturating_add(u64::try_from(accepted).unwrap_or(u64::MAX));
        Ok(accepted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use platform::I2sTransport;

    /// 2 descriptors of 16 stereo 16-bit frames at 8 kHz: 64 bytes, 2 ms each.
    fn tiny() -> TransportConfig {
        let mut config = TransportConfig::with_sample_rate(SampleRateHz::new(8_000).unwrap());
        config.channel.dma_desc_num = 2;
        config.channel.dma_frame_num = 16;
        config
    }

    #[tokio::test]
    async fn write_is_paced_by_the_wire_rate() {
        let mut tx = I2sTransport::create(SimulatedI2s::new(), tiny()).unwrap();
        let pcm = [0u8; 64 * 6];

        let started = std::time::Instant::now();
        assert_eq!(tx.write(&pcm).await.unwrap(), pcm.len());

        // Two descriptors fit immediately, the other four wait ~2 ms each.
        assert!(started.elapsed() >= std::time::Duration::from_millis(6));
        assert_eq!(tx.driver().bytes_accepted(), 384);
    }

    #[tokio::test]
    async fn ring_sized_write_does_not_wait() {
        let mut driver = SimulatedI2s::new();
        let config = tiny();
        driver.new_channel(&config.channel).unwrap();
        driver.init_std_mode(&config.std_mode).unwrap();
        driver.enable().unwrap();

        assert_eq!(driver.write(&[0u8; 200]).await.unwrap(), 128);
    }

    #[test]
    fn lifecycle_is_enforced() {
        let config = tiny();
        let mut driver = SimulatedI2s::new();
        assert_eq!(driver.init_std_mode(&config.std_mode), Err(DriverFault::InvalidState));
        driver.new_channel(&config.channel).unwrap();
        assert_eq!(driver.new_channel(&config.channel), Err(DriverFault::NotFound));
        assert_eq!(driver.enable(), Err(DriverFault::InvalidState));
        driver.init_std_mode(&config.std_mode).unwrap();
        driver.enable().unwrap();
        assert_eq!(
            driver.reconfig_std_clock(SampleRateHz::CD),
            Err(DriverFault::InvalidState)
        );
        assert_eq!(driver.delete_channel(), Err(DriverFault::InvalidState));
        driver.disable().unwrap();
        driver.reconfig_std_clock(SampleRateHz::CD).unwrap();
        assert_eq!(driver.sample_rate(), Some(SampleRateHz::CD));
        driver.delete_channel().unwrap();
        assert!(!driver.is_allocated());
    }

    #[tokio::test]
    async fn write_while_disabled_is_rejected() {
        let mut driver = SimulatedI2s::new();
        assert_eq!(driver.write(&[1, 2]).await, Err(DriverFault::InvalidState));
    }

    #[test]
    fn descriptor_period_follows_the_clock() {
        let config = TransportConfig::default();
        let mut driver = SimulatedI2s::new();
        driver.new_channel(&config.channel).unwrap();
        driver.init_std_mode(&config.std_mode).unwrap();
        // 1024 frames at 44.1 kHz
        assert_eq!(driver.descriptor_period(), Duration::from_micros(23_219));
    }
}
