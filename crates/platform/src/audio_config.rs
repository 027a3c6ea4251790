//! I2S peripheral configuration for the audio output channel.
//!
//! Defines the channel (DMA) configuration, the standard-mode (clock, slot,
//! GPIO) configuration, and the static pin map of the reference board.
//!
//! # Clock Chain
//!
//! The channel runs as bus master and derives every clock from the sample rate:
//!
//! ```text
//! PLL → MCLK = 256 × fs (unused on the reference board)
//!     → BCLK = bit_width × slots × fs
//!     → WS (LRCK) = fs
//! ```
//!
//! For 44.1 kHz / 16-bit / stereo: BCLK = 16 × 2 × 44 100 = 1.4112 MHz.
//!
//! # Pin Assignments (reference board)
//!
//! | Function | GPIO |
//! |----------|------|
//! | BCLK     | 15   |
//! | WS/LRCK  | 16   |
//! | DOUT     | 17   |
//! | MCLK     | unused |
//!
//! # DMA
//!
//! 8 descriptors × 1024 frames. One frame is one sample per slot, so a 16-bit
//! stereo frame is 4 bytes and one descriptor holds 4096 bytes (~23 ms at
//! 44.1 kHz). The whole ring buffers ~186 ms of audio ahead of the wire.

use embassy_time::Duration;

use crate::audio_types::SampleRateHz;
use crate::config::ConfigError;

/// Number of DMA descriptors in the output ring.
pub const DMA_BUFFER_COUNT: u16 = 8;

/// Frames per DMA descriptor.
pub const DMA_BUFFER_LEN: u16 = 1024;

/// Default output sample rate.
pub const SAMPLE_RATE_HZ: u32 = 44_100;

/// Bit clock GPIO.
pub const I2S_BCK_PIN: u8 = 15;

/// Word select (LR clock) GPIO.
pub const I2S_LRCK_PIN: u8 = 16;

/// Serial data out GPIO.
pub const I2S_DATA_PIN: u8 = 17;

/// MCLK multiplier used when an MCLK pin is routed: MCLK = 256 × fs.
pub const MCLK_FS_RATIO: u32 = 256;

/// Bus role of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2sRole {
    /// The channel generates BCLK and WS.
    Master,
    /// The channel follows externally generated clocks.
    Slave,
}

/// Width of one sample slot on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBitWidth {
    /// 16-bit samples.
    Bits16,
    /// 24-bit samples.
    Bits24,
    /// 32-bit samples.
    Bits32,
}

impl DataBitWidth {
    /// Bits per sample.
    pub const fn bits(self) -> u16 {
        match self {
            Self::Bits16 => 16,
            Self::Bits24 => 24,
            Self::Bits32 => 32,
        }
    }

    /// Bytes one sample occupies in a DMA buffer (24-bit samples use 32-bit containers).
    pub const fn container_bytes(self) -> usize {
        match self {
            Self::Bits16 => 2,
            Self::Bits24 | Self::Bits32 => 4,
        }
    }
}

/// Number of active slots per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotMode {
    /// One slot per frame.
    Mono,
    /// Left and right slots per frame.
    Stereo,
}

impl SlotMode {
    /// Slots per frame.
    pub const fn slots(self) -> u8 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Position of the data bits relative to WS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotLayout {
    /// Philips I2S: data delayed one BCLK after the WS edge.
    Philips,
    /// MSB-justified (left-justified): data aligned with the WS edge.
    MsbJustified,
    /// PCM short-frame sync.
    PcmShort,
}

/// GPIO assignment. Static board configuration, never changed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2sPins {
    /// Master clock output, `None` when not routed.
    pub mclk: Option<u8>,
    /// Bit clock.
    pub bclk: u8,
    /// Word select.
    pub ws: u8,
    /// Serial data out.
    pub dout: u8,
}

impl Default for I2sPins {
    fn default() -> Self {
        Self {
            mclk: None,
            bclk: I2S_BCK_PIN,
            ws: I2S_LRCK_PIN,
            dout: I2S_DATA_PIN,
        }
    }
}

/// Channel allocation parameters (role and DMA ring geometry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    /// Bus role.
    pub role: I2sRole,
    /// Number of DMA descriptors.
    pub dma_desc_num: u16,
    /// Frames per DMA descriptor.
    pub dma_frame_num: u16,
    /// Send silence instead of stale data when the ring underruns.
    pub auto_clear: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            role: I2sRole::Master,
            dma_desc_num: DMA_BUFFER_COUNT,
            dma_frame_num: DMA_BUFFER_LEN,
            auto_clear: true,
        }
    }
}

/// Standard (Philips/MSB/PCM) mode parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StdModeConfig {
    /// Frame rate.
    pub sample_rate: SampleRateHz,
    /// Sample width.
    pub bit_width: DataBitWidth,
    /// Slots per frame.
    pub slot_mode: SlotMode,
    /// Data alignment.
    pub slot_layout: SlotLayout,
    /// GPIO routing.
    pub pins: I2sPins,
}

impl Default for StdModeConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRateHz::CD,
            bit_width: DataBitWidth::Bits16,
            slot_mode: SlotMode::Stereo,
            slot_layout: SlotLayout::MsbJustified,
            pins: I2sPins::default(),
        }
    }
}

impl StdModeConfig {
    /// Bytes per frame across all slots.
    pub fn frame_bytes(&self) -> usize {
        self.bit_width
            .container_bytes()
            .saturating_mul(usize::from(self.slot_mode.slots()))
    }

    /// Bit clock frequency: `bit_width × slots × fs`.
    pub fn bclk_hz(&self) -> u32 {
        u32::from(self.bit_width.bits())
            .saturating_mul(u32::from(self.slot_mode.slots()))
            .saturating_mul(self.sample_rate.get())
    }

    /// Master clock frequency when routed: `256 × fs`.
    pub fn mclk_hz(&self) -> u32 {
        self.sample_rate.get().saturating_mul(MCLK_FS_RATIO)
    }
}

/// Everything [`crate::I2sTransport::create`] needs, fixed for the channel's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// DMA / role parameters.
    pub channel: ChannelConfig,
    /// Clock / slot / pin parameters.
    pub std_mode: StdModeConfig,
    /// Upper bound on a single wait for DMA space; `None` waits forever.
    pub write_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            std_mode: StdModeConfig::default(),
            write_timeout: None,
        }
    }
}

impl TransportConfig {
    /// Reference configuration at the given rate.
    pub fn with_sample_rate(sample_rate: SampleRateHz) -> Self {
        let mut config = Self::default();
        config.std_mode.sample_rate = sample_rate;
        config
    }

    /// Bytes one DMA descriptor holds.
    pub fn descriptor_bytes(&self) -> usize {
        usize::from(self.channel.dma_frame_num).saturating_mul(self.std_mode.frame_bytes())
    }

    /// Total bytes the DMA ring can hold ahead of the wire.
    pub fn ring_bytes(&self) -> usize {
        self.descriptor_bytes()
            .saturating_mul(usize::from(self.channel.dma_desc_num))
    }

    /// Check the invariants the driver relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first violated field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.role != I2sRole::Master {
            return Err(ConfigError::new("channel.role", "must be master"));
        }
        if self.channel.dma_desc_num < 2 {
            return Err(ConfigError::new("channel.dma_desc_num", "must be at least 2"));
        }
        if self.channel.dma_frame_num == 0 {
            return Err(ConfigError::new("channel.dma_frame_num", "must be non-zero"));
        }
        let p = self.std_mode.pins;
        if p.bclk == p.ws || p.bclk == p.dout || p.ws == p.dout {
            return Err(ConfigError::new("std_mode.pins", "must be distinct"));
        }
        if self.write_timeout == Some(Duration::from_ticks(0)) {
            return Err(ConfigError::new("write_timeout", "must be non-zero when set"));
        }
        Ok(())
    }
}
