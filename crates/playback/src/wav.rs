//! RIFF/WAVE container layout.
//!
//! All multi-byte fields are little-endian.
//!
//! ```text
//! offset  size  field
//! 0       4     "RIFF"
//! 4       4     RIFF chunk size (file length - 8)
//! 8       4     "WAVE"
//! 12      ...   sub-chunks: tag[4] len:u32 payload[len] (+1 pad byte if len is odd)
//! ```
//!
//! The `fmt ` payload's first 16 bytes are
//! `format:u16 channels:u16 sample_rate:u32 byte_rate:u32 block_align:u16 bits:u16`;
//! anything after that (extensible-format fields) is ignored.

use platform::{OutOfRangeError, SampleRateHz};

use crate::error::{FormatError, UnsupportedFormat};

/// Bytes in the RIFF/WAVE prologue.
pub const PROLOGUE_LEN: usize = 12;

/// Bytes in a sub-chunk header.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Bytes of the `fmt ` payload this parser reads.
pub const FMT_LEN: usize = 16;

/// Format code for linear PCM.
pub const PCM_FORMAT: u16 = 1;

/// Tag of the `fmt ` chunk.
pub const FMT_TAG: [u8; 4] = *b"fmt ";

/// Tag of the `data` chunk.
pub const DATA_TAG: [u8; 4] = *b"data";

/// Most channels the stereo output carries.
pub const MAX_CHANNELS: u16 = 2;

fn le_u16(b: [u8; 2]) -> u16 {
    u16::from_le_bytes(b)
}

fn le_u32(b: [u8; 4]) -> u32 {
    u32::from_le_bytes(b)
}

/// Validate the prologue and return the declared RIFF chunk size.
///
/// # Errors
///
/// [`FormatError::NotRiff`] or [`FormatError::NotWave`].
pub fn parse_prologue(bytes: &[u8; PROLOGUE_LEN]) -> Result<u32, FormatError> {
    let [r0, r1, r2, r3, s0, s1, s2, s3, w0, w1, w2, w3] = *bytes;
    if [r0, r1, r2, r3] != *b"RIFF" {
        return Err(FormatError::NotRiff);
    }
    if [w0, w1, w2, w3] != *b"WAVE" {
        return Err(FormatError::NotWave);
    }
    Ok(le_u32([s0, s1, s2, s3]))
}

/// Sub-chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChunkHeader {
    /// Four-character tag.
    pub tag: [u8; 4],
    /// Payload length, excluding the pad byte.
    pub len: u32,
}

impl ChunkHeader {
    /// Decode an 8-byte chunk header.
    pub fn parse(bytes: &[u8; CHUNK_HEADER_LEN]) -> Self {
        let [t0, t1, t2, t3, l0, l1, l2, l3] = *bytes;
        Self {
            tag: [t0, t1, t2, t3],
            len: le_u32([l0, l1, l2, l3]),
        }
    }

    /// Payload length rounded up to the even boundary the next chunk starts on.
    pub fn padded_len(&self) -> u64 {
        u64::from(self.len).saturating_add(u64::from(self.len & 1))
    }

    /// Tag as text, `"????"` when not ASCII.
    pub fn tag_str(&self) -> &str {
        core::str::from_utf8(&self.tag).unwrap_or("????")
    }
}

/// Contents of the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WavFormat {
    /// 1 for linear PCM.
    pub format_code: u16,
    /// Interleaved channels per frame.
    pub channels: u16,
    /// Frames per second.
    pub sample_rate: u32,
    /// Bytes per second.
    pub byte_rate: u32,
    /// Bytes per frame.
    pub block_align: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// Decode the 16 standard `fmt ` bytes.
    pub fn parse(bytes: &[u8; FMT_LEN]) -> Self {
        let [f0, f1, c0, c1, s0, s1, s2, s3, b0, b1, b2, b3, a0, a1, w0, w1] = *bytes;
        Self {
            format_code: le_u16([f0, f1]),
            channels: le_u16([c0, c1]),
            sample_rate: le_u32([s0, s1, s2, s3]),
            byte_rate: le_u32([b0, b1, b2, b3]),
            block_align: le_u16([a0, a1]),
            bits_per_sample: le_u16([w0, w1]),
        }
    }

    /// Check the format can be forwarded verbatim to an output `sink_bits` wide.
    ///
    /// # Errors
    ///
    /// [`UnsupportedFormat`] for a non-PCM code, more than two channels or a
    /// width mismatch; [`FormatError::ZeroChannels`] for a zero channel count.
    pub fn check_playable(&self, sink_bits: u16) -> Result<(), FormatCheck> {
        if self.format_code != PCM_FORMAT {
            return Err(UnsupportedFormat::Encoding(self.format_code).into());
        }
        if self.channels == 0 {
            return Err(FormatError::ZeroChannels.into());
        }
        if self.channels > MAX_CHANNELS {
            return Err(UnsupportedFormat::Channels(self.channels).into());
        }
        if self.bits_per_sample != sink_bits {
            return Err(UnsupportedFormat::BitsPerSample {
                file: self.bits_per_sample,
                sink: sink_bits,
            }
            .into());
        }
        Ok(())
    }

    /// Validated sample rate.
    ///
    /// # Errors
    ///
    /// [`OutOfRangeError`] when outside the I2S clock range.
    pub fn sample_rate_hz(&self) -> Result<SampleRateHz, OutOfRangeError> {
        SampleRateHz::new(self.sample_rate)
    }
}

/// Outcome of [`WavFormat::check_playable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCheck {
    /// Malformed.
    Format(FormatError),
    /// Unplayable.
    Unsupported(UnsupportedFormat),
}

impl From<FormatError> for FormatCheck {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<UnsupportedFormat> for FormatCheck {
    fn from(e: UnsupportedFormat) -> Self {
        Self::Unsupported(e)
    }
}

/// Everything learned from a file's header, valid for one playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WavHeader {
    /// RIFF chunk size as declared (not trusted).
    pub riff_size: u32,
    /// Stream format.
    pub format: WavFormat,
    /// File offset of the first PCM byte.
    pub data_offset: u64,
    /// Declared PCM payload length.
    pub data_len: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn fmt_bytes(code: u16, channels: u16, rate: u32, bits: u16) -> [u8; FMT_LEN] {
        let mut b = [0u8; FMT_LEN];
        b[0..2].copy_from_slice(&code.to_le_bytes());
        b[2..4].copy_from_slice(&channels.to_le_bytes());
        b[4..8].copy_from_slice(&rate.to_le_bytes());
        b[8..12].copy_from_slice(&(rate * 4).to_le_bytes());
        b[12..14].copy_from_slice(&4u16.to_le_bytes());
        b[14..16].copy_from_slice(&bits.to_le_bytes());
        b
    }

    #[test]
    fn prologue_returns_riff_size() {
        let mut p = *b"RIFF\0\0\0\0WAVE";
        p[4..8].copy_from_slice(&1234u32.to_le_bytes());
        assert_eq!(parse_prologue(&p).unwrap(), 1234);
    }

    #[test]
    fn prologue_rejects_other_containers() {
        assert_eq!(parse_prologue(b"RIFX\0\0\0\0WAVE"), Err(FormatError::NotRiff));
        assert_eq!(parse_prologue(b"RIFF\0\0\0\0AVI "), Err(FormatError::NotWave));
    }

    #[test]
    fn chunk_header_pads_odd_lengths() {
        let h = ChunkHeader::parse(b"LIST\x03\0\0\0");
        assert_eq!(h.tag_str(), "LIST");
        assert_eq!(h.len, 3);
        assert_eq!(h.padded_len(), 4);
        assert_eq!(ChunkHeader::parse(b"data\x04\0\0\0").padded_len(), 4);
    }

    #[test]
    fn chunk_header_max_len_does_not_overflow() {
        let h = ChunkHeader::parse(b"junk\xff\xff\xff\xff");
        assert_eq!(h.padded_len(), u64::from(u32::MAX) + 1);
    }

    #[test]
    fn fmt_fields_decode_little_endian() {
        let f = WavFormat::parse(&fmt_bytes(1, 2, 44_100, 16));
        assert_eq!(f.format_code, 1);
        assert_eq!(f.channels, 2);
        assert_eq!(f.sample_rate, 44_100);
        assert_eq!(f.byte_rate, 176_400);
        assert_eq!(f.block_align, 4);
        assert_eq!(f.bits_per_sample, 16);
        assert_eq!(f.sample_rate_hz().unwrap(), SampleRateHz::CD);
    }

    #[test]
    fn playable_check_order() {
        let check = |code, ch, bits| {
            WavFormat::parse(&fmt_bytes(code, ch, 44_100, bits)).check_playable(16)
        };
        assert_eq!(check(1, 2, 16), Ok(()));
        assert_eq!(check(1, 1, 16), Ok(()));
        assert_eq!(check(3, 2, 32), Err(UnsupportedFormat::Encoding(3).into()));
        assert_eq!(check(1, 0, 16), Err(FormatError::ZeroChannels.into()));
        assert_eq!(check(1, 6, 16), Err(UnsupportedFormat::Channels(6).into()));
        assert_eq!(
            check(1, 2, 24),
            Err(UnsupportedFormat::BitsPerSample { file: 24, sink: 16 }.into())
        );
    }
}
