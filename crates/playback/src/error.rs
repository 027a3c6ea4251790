//! Playback error types.

use platform::StorageError;
use thiserror_no_std::Error;

/// The byte stream is not a well-formed RIFF/WAVE container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    /// The file ended inside the 12-byte prologue or a chunk header.
    #[error("unexpected end of file in header")]
    UnexpectedEof,
    /// The first four bytes are not `RIFF`.
    #[error("missing RIFF tag")]
    NotRiff,
    /// Bytes 8..12 are not `WAVE`.
    #[error("missing WAVE tag")]
    NotWave,
    /// The `fmt ` chunk is shorter than the 16 bytes of the PCM layout.
    #[error("fmt chunk too short: {len} bytes")]
    ShortFmtChunk {
        /// Declared chunk length.
        len: u32,
    },
    /// A `data` chunk appeared before any `fmt ` chunk.
    #[error("data chunk before fmt chunk")]
    DataBeforeFmt,
    /// The file ended before a `fmt ` chunk.
    #[error("no fmt chunk")]
    MissingFmtChunk,
    /// The file ended before a `data` chunk.
    #[error("no data chunk")]
    MissingDataChunk,
    /// The `fmt ` chunk declares zero channels.
    #[error("zero channels")]
    ZeroChannels,
    /// The file ended before the declared data length.
    #[error("data truncated: {delivered} of {expected} bytes")]
    Truncated {
        /// Declared `data` chunk length.
        expected: u32,
        /// Bytes actually present and forwarded.
        delivered: u32,
    },
}

/// The container is well-formed but its payload cannot be played as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnsupportedFormat {
    /// Format code other than linear PCM.
    #[error("format code {0} is not linear PCM")]
    Encoding(u16),
    /// More channels than the stereo output carries.
    #[error("{0} channels")]
    Channels(u16),
    /// Sample width differs from the output slot width.
    #[error("{file}-bit samples on a {sink}-bit output")]
    BitsPerSample {
        /// Width the file declares.
        file: u16,
        /// Width the sink expects.
        sink: u16,
    },
}

/// Why one file could not be played to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlayError<E> {
    /// The file does not exist.
    #[error("file not found")]
    NotFound,
    /// Opening or reading the file failed.
    #[error("read failed: {0}")]
    Io(StorageError),
    /// Malformed container.
    #[error("malformed WAV: {0}")]
    Format(FormatError),
    /// Well-formed container with an unplayable payload.
    #[error("unsupported WAV: {0}")]
    UnsupportedFormat(UnsupportedFormat),
    /// The sink rejected a write; carries the sink's status unchanged.
    #[error("sink failed: {0}")]
    Sink(E),
}

impl<E> PlayError<E> {
    pub(crate) fn storage(e: impl Into<StorageError>) -> Self {
        match e.into() {
            StorageError::NotFound => Self::NotFound,
            other => Self::Io(other),
        }
    }
}

impl<E> From<FormatError> for PlayError<E> {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl<E> From<UnsupportedFormat> for PlayError<E> {
    fn from(e: UnsupportedFormat) -> Self {
        Self::UnsupportedFormat(e)
    }
}
