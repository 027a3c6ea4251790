//! Audio domain newtypes for compile-time safety.
//!
//! - `SampleRateHz`: validates the 8000–192000 Hz range the I2S clock tree can
//!   generate from its PLL; every transport and WAV comparison goes through it.

use thiserror_no_std::Error;

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("{value} is outside {min}..={max}")]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

// ── SampleRateHz ─────────────────────────────────────────────────────────────

/// Sample rate in Hz, validated to the range supported by the I2S clock.
///
/// Valid range: 8000–192000 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SampleRateHz(u32);

impl SampleRateHz {
    /// Minimum supported sample rate: 8000 Hz (telephony).
    pub const MIN_HZ: u32 = 8_000;

    /// Maximum supported sample rate: 192000 Hz.
    pub const MAX_HZ: u32 = 192_000;

    /// CD rate, the reference board's default channel clock.
    pub const CD: Self = Self(44_100);

    /// Create a `SampleRateHz`, returning an error if out of 8000–192000 Hz.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `hz < 8000` or `hz > 192000`.
    pub fn new(hz: u32) -> Result<Self, OutOfRangeError> {
        if (Self::MIN_HZ..=Self::MAX_HZ).contains(&hz) {
            Ok(Self(hz))
        } else {
            Err(OutOfRangeError {
                value: hz,
                min: Self::MIN_HZ,
                max: Self::MAX_HZ,
            })
        }
    }

    /// Return the sample rate in Hz.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for SampleRateHz {
    fn default() -> Self {
        Self::CD
    }
}

impl TryFrom<u32> for SampleRateHz {
    type Error = OutOfRangeError;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        Self::new(hz)
    }
}

impl core::fmt::Display for SampleRateHz {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}
