//! WAV playback: RIFF/WAVE header parsing and bounded PCM streaming to a sink
//!
//! [`WavPlayer`] reads one file through [`platform::Storage`], validates its
//! header against the sink's slot width, and forwards the `data` payload in
//! order, one scratch buffer at a time, to an [`AudioSink`]. The sink's
//! `write` await is the only backpressure point.
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod error;
pub mod player;
pub mod sink;
pub mod wav;

pub use error::{FormatError, PlayError, UnsupportedFormat};
pub use player::{PlayReport, PlayerState, WavPlayer, DEFAULT_CHUNK_BYTES};
pub use sink::AudioSink;
pub use wav::{WavFormat, WavHeader};
