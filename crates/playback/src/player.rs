//! Single-file WAV streamer.
//!
//! `WavPlayer` makes one linear pass over a file:
//!
//! ```text
//! Idle → HeaderParsing → ChunkScanning → Streaming → Completed
//!            └──────────────┴──────────────┴──────→ Failed
//! ```
//!
//! It validates the prologue, walks sub-chunks until `fmt ` and `data` are
//! found, then forwards the `data` payload verbatim to an [`AudioSink`] in
//! chunks of at most `N` bytes. Nothing past the declared data length is read
//! and nothing beyond one scratch buffer is held in memory. The file handle is
//! dropped (closed) before `play` returns, on success and on every failure.

use platform::{File, Storage, StorageError};

use crate::error::{FormatError, PlayError};
use crate::sink::AudioSink;
use crate::wav::{
    self, ChunkHeader, FormatCheck, WavFormat, WavHeader, CHUNK_HEADER_LEN, DATA_TAG, FMT_LEN,
    FMT_TAG, PROLOGUE_LEN,
};

/// Scratch buffer size used by the reference firmware.
pub const DEFAULT_CHUNK_BYTES: usize = 1024;

/// Where the player is in its pass over the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlayerState {
    /// No file played yet.
    Idle,
    /// Reading the 12-byte prologue.
    HeaderParsing,
    /// Walking sub-chunks towards `data`.
    ChunkScanning,
    /// Forwarding the PCM payload.
    Streaming,
    /// The last file was streamed in full.
    Completed,
    /// The last file failed; its handle is closed.
    Failed,
}

/// Result of one completed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlayReport {
    /// Parsed header.
    pub header: WavHeader,
    /// PCM bytes forwarded to the sink (equals `header.data_len`).
    pub bytes_streamed: u32,
    /// Number of `sink.write` calls.
    pub chunks: u32,
}

/// Streams WAV files through an `N`-byte scratch buffer.
pub struct WavPlayer<const N: usize = DEFAULT_CHUNK_BYTES> {
    scratch: [u8; N],
    state: PlayerState,
}

impl<const N: usize> Default for WavPlayer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> WavPlayer<N> {
    const NON_EMPTY: () = assert!(N > 0, "WavPlayer scratch buffer must be non-empty");

    /// Idle player.
    pub const fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            scratch: [0; N],
            state: PlayerState::Idle,
        }
    }

    /// State after the most recent transition.
    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Play the file at `path` to completion or first failure.
    ///
    /// # Errors
    ///
    /// * [`PlayError::NotFound`] / [`PlayError::Io`]: open or read failed.
    /// * [`PlayError::Format`]: malformed container, or the file ended before
    ///   the declared data length (after forwarding every byte present).
    /// * [`PlayError::UnsupportedFormat`]: not linear PCM at the sink's width.
    /// * [`PlayError::Sink`]: the sink's status, unchanged.
    ///
    /// Header failures happen before any sink call.
    pub async fn play<S, K>(
        &mut self,
        storage: &mut S,
        path: &str,
        sink: &mut K,
    ) -> Result<PlayReport, PlayError<K::Error>>
    where
        S: Storage,
        K: AudioSink,
    {
        self.state = PlayerState::HeaderParsing;
        let outcome = self.stream(storage, path, sink).await;
        self.state = if outcome.is_ok() {
            PlayerState::Completed
        } else {
            PlayerState::Failed
        };
        outcome
    }

    async fn stream<S, K>(
        &mut self,
        storage: &mut S,
        path: &str,
        sink: &mut K,
    ) -> Result<PlayReport, PlayError<K::Error>>
    where
        S: Storage,
        K: AudioSink,
    {
        let mut file = storage
            .open_file(path)
            .await
            .map_err(PlayError::<K::Error>::storage)?;
        let header = read_header::<S, K::Error>(&mut file, sink.bits_per_sample(), &mut self.state)
            .await?;

        platform::info!(
            "{}: {} Hz, {} ch, {} data bytes",
            path,
            header.format.sample_rate,
            header.format.channels,
            header.data_len
        );

        sink.begin(&header.format).await.map_err(PlayError::Sink)?;
        self.state = PlayerState::Streaming;

        let expected = header.data_len;
        let mut remaining = u64::from(expected);
        let mut delivered = 0u32;
        let mut chunks = 0u32;
        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(N, |r| r.min(N));
            let buf = self
                .scratch
                .get_mut(..want)
                .ok_or(PlayError::<K::Error>::Io(StorageError::Io))?;
            let n = file
                .read(buf)
                .await
                .map_err(PlayError::<K::Error>::storage)?
                .min(want);
            if n == 0 {
                platform::warn!("{}: data ends after {} of {} bytes", path, delivered, expected);
                return Err(FormatError::Truncated {
                    expected,
                    delivered,
                }
                .into());
            }
            let chunk = buf.get(..n).unwrap_or_default();
            sink.write(chunk).await.map_err(PlayError::Sink)?;

            let n = u32::try_from(n).unwrap_or(u32::MAX);
            delivered = delivered.saturating_add(n);
            remaining = remaining.saturating_sub(u64::from(n));
            chunks = chunks.saturating_add(1);
        }

        Ok(PlayReport {
            header,
            bytes_streamed: delivered,
            chunks,
        })
    }
}

/// Fill `buf` from `file`, stopping early only at end of file.
async fn read_full<F: File>(file: &mut F, buf: &mut [u8]) -> Result<usize, F::Error> {
    let mut filled = 0usize;
    while let Some(rest) = buf.get_mut(filled..).filter(|r| !r.is_empty()) {
        let n = file.read(rest).await?;
        if n == 0 {
            break;
        }
        filled = filled.saturating_add(n.min(rest.len()));
    }
    Ok(filled)
}

async fn read_header<S: Storage, E>(
    file: &mut S::File,
    sink_bits: u16,
    state: &mut PlayerState,
) -> Result<WavHeader, PlayError<E>> {
    let mut prologue = [0u8; PROLOGUE_LEN];
    if read_full(file, &mut prologue).await.map_err(PlayError::<E>::storage)? < PROLOGUE_LEN {
        return Err(FormatError::UnexpectedEof.into());
    }
    let riff_size = wav::parse_prologue(&prologue)?;

    *state = PlayerState::ChunkScanning;
    let mut pos = PROLOGUE_LEN as u64;
    let mut format: Option<WavFormat> = None;
    loop {
        let mut raw = [0u8; CHUNK_HEADER_LEN];
        if read_full(file, &mut raw).await.map_err(PlayError::<E>::storage)? < CHUNK_HEADER_LEN {
            return Err(if format.is_none() {
                FormatError::MissingFmtChunk
            } else {
                FormatError::MissingDataChunk
            }
            .into());
        }
        pos = pos.saturating_add(CHUNK_HEADER_LEN as u64);
        let chunk = ChunkHeader::parse(&raw);

        let skip = match chunk.tag {
            DATA_TAG => {
                let format = format.ok_or(FormatError::DataBeforeFmt)?;
                return Ok(WavHeader {
                    riff_size,
                    format,
                    data_offset: pos,
                    data_len: chunk.len,
                });
            }
            FMT_TAG if format.is_none() => {
                if u64::from(chunk.len) < FMT_LEN as u64 {
                    return Err(FormatError::ShortFmtChunk { len: chunk.len }.into());
                }
                let mut fields = [0u8; FMT_LEN];
                if read_full(file, &mut fields).await.map_err(PlayError::<E>::storage)? < FMT_LEN {
                    return Err(FormatError::UnexpectedEof.into());
                }
                let parsed = WavFormat::parse(&fields);
                parsed.check_playable(sink_bits).map_err(|e| match e {
                    FormatCheck::Format(e) => PlayError::<E>::Format(e),
                    FormatCheck::Unsupported(e) => PlayError::<E>::UnsupportedFormat(e),
                })?;
                format = Some(parsed);
                pos = pos.saturating_add(FMT_LEN as u64);
                chunk.padded_len().saturating_sub(FMT_LEN as u64)
            }
            _ => {
                platform::debug!("skipping {} chunk ({} bytes)", chunk.tag_str(), chunk.len);
                chunk.padded_len()
            }
        };

        if skip > 0 {
            pos = pos.saturating_add(skip);
            file.seek(pos).await.map_err(PlayError::<E>::storage)?;
        }
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
    use crate::error::UnsupportedFormat;
    use platform::mocks::{pcm_ramp, MockStorage, WavFixture};

    /// Records every chunk it is given.
    #[derive(Default)]
    struct Recorder {
        begun: Vec<WavFormat>,
        chunks: Vec<Vec<u8>>,
        fail_on_chunk: Option<usize>,
    }

    impl AudioSink for Recorder {
        type Error = &'static str;

        fn bits_per_sample(&self) -> u16 {
            16
        }

        async fn begin(&mut self, format: &WavFormat) -> Result<(), Self::Error> {
            self.begun.push(*format);
            Ok(())
        }

        async fn write(&mut self, pcm: &[u8]) -> Result<(), Self::Error> {
            if self.fail_on_chunk == Some(self.chunks.len()) {
                return Err("sink full");
            }
            self.chunks.push(pcm.to_vec());
            Ok(())
        }
    }

    impl Recorder {
        fn bytes(&self) -> Vec<u8> {
            self.chunks.concat()
        }
    }

    fn storage_with(bytes: Vec<u8>) -> MockStorage {
        MockStorage::new().with_file("/storage/t.wav", bytes)
    }

    #[tokio::test]
    async fn streams_stereo_payload_in_bounded_chunks() {
        let pcm = pcm_ramp(2500);
        let mut storage = storage_with(WavFixture::pcm16(2, 44_100, pcm.clone()).build());
        let mut player = WavPlayer::<1024>::new();
        let mut sink = Recorder::default();

        let report = player.play(&mut storage, "/storage/t.wav", &mut sink).await.unwrap();

        assert_eq!(player.state(), PlayerState::Completed);
        assert_eq!(report.bytes_streamed, 2500);
        assert_eq!(report.chunks, 3);
        assert_eq!(
            sink.chunks.iter().map(Vec::len).collect::<Vec<_>>(),
            [1024, 1024, 452]
        );
        assert_eq!(sink.bytes(), pcm);
        assert_eq!(sink.begun.len(), 1);
        assert_eq!(storage.open_files(), 0);
    }

    #[tokio::test]
    async fn skips_unknown_chunks_and_fmt_extension() {
        let pcm = pcm_ramp(64);
        let fixture = WavFixture::pcm16(1, 22_050, pcm.clone())
            .leading_chunk(*b"JUNK", vec![0xAA; 5])
            .fmt_extension(vec![0, 0])
            .chunk(*b"LIST", vec![0xBB; 7]);
        let mut storage = storage_with(fixture.build());
        let mut player = WavPlayer::<16>::new();
        let mut sink = Recorder::default();

        let report = player.play(&mut storage, "/storage/t.wav", &mut sink).await.unwrap();

        assert_eq!(report.header.data_offset, fixture.data_offset() as u64);
        assert_eq!(report.header.format.channels, 1);
        assert_eq!(report.header.format.sample_rate, 22_050);
        assert_eq!(sink.bytes(), pcm);
    }

    #[tokio::test]
    async fn short_reads_are_reassembled() {
        let pcm = pcm_ramp(300);
        let mut storage =
            storage_with(WavFixture::pcm16(2, 44_100, pcm.clone()).build()).max_read(7);
        let mut player = WavPlayer::<64>::new();
        let mut sink = Recorder::default();

        player.play(&mut storage, "/storage/t.wav", &mut sink).await.unwrap();

        assert_eq!(sink.bytes(), pcm);
        assert!(sink.chunks.iter().all(|c| c.len() <= 7));
    }

    #[tokio::test]
    async fn trailing_bytes_after_data_are_never_forwarded() {
        let mut bytes = WavFixture::pcm16(2, 44_100, pcm_ramp(40)).build();
        bytes.extend_from_slice(b"tailtailtail");
        let mut storage = storage_with(bytes);
        let mut sink = Recorder::default();

        WavPlayer::<1024>::new()
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.bytes(), pcm_ramp(40));
    }

    #[tokio::test]
    async fn truncated_data_forwards_what_exists_then_fails() {
        let fixture = WavFixture::pcm16(2, 44_100, pcm_ramp(100)).declared_data_len(400);
        let mut storage = storage_with(fixture.build());
        let mut player = WavPlayer::<32>::new();
        let mut sink = Recorder::default();

        let err = player
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PlayError::Format(FormatError::Truncated {
                expected: 400,
                delivered: 100
            })
        );
        assert_eq!(sink.bytes(), pcm_ramp(100));
        assert_eq!(player.state(), PlayerState::Failed);
        assert_eq!(storage.open_files(), 0);
    }

    #[tokio::test]
    async fn not_riff_fails_before_any_sink_call() {
        let mut bytes = WavFixture::pcm16(2, 44_100, pcm_ramp(8)).build();
        bytes[..4].copy_from_slice(b"RIFX");
        let mut storage = storage_with(bytes);
        let mut sink = Recorder::default();

        let err = WavPlayer::<64>::new()
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap_err();

        assert_eq!(err, PlayError::Format(FormatError::NotRiff));
        assert!(sink.begun.is_empty());
        assert!(sink.chunks.is_empty());
    }

    #[tokio::test]
    async fn non_pcm_format_is_unsupported() {
        let fixture = WavFixture::pcm16(2, 44_100, pcm_ramp(8)).format_code(3);
        let mut storage = storage_with(fixture.build());
        let mut sink = Recorder::default();

        let err = WavPlayer::<64>::new()
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap_err();

        assert_eq!(err, PlayError::UnsupportedFormat(UnsupportedFormat::Encoding(3)));
        assert!(sink.chunks.is_empty());
    }

    #[tokio::test]
    async fn bit_width_must_match_sink() {
        let fixture = WavFixture::pcm16(2, 44_100, pcm_ramp(8)).bits_per_sample(24);
        let mut storage = storage_with(fixture.build());
        let mut sink = Recorder::default();

        let err = WavPlayer::<64>::new()
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PlayError::UnsupportedFormat(UnsupportedFormat::BitsPerSample { file: 24, sink: 16 })
        );
    }

    #[tokio::test]
    async fn header_edge_cases_are_format_errors() {
        let cases: Vec<(Vec<u8>, FormatError)> = vec![
            (b"RIFF\x04\0\0".to_vec(), FormatError::UnexpectedEof),
            (b"RIFF\x04\0\0\0WAVE".to_vec(), FormatError::MissingFmtChunk),
            (
                WavFixture::pcm16(2, 44_100, vec![]).without_data().build(),
                FormatError::MissingDataChunk,
            ),
            (
                b"RIFF\x0c\0\0\0WAVEdata\0\0\0\0".to_vec(),
                FormatError::DataBeforeFmt,
            ),
            (
                b"RIFF\x14\0\0\0WAVEfmt \x04\0\0\0\x01\0\x02\0".to_vec(),
                FormatError::ShortFmtChunk { len: 4 },
            ),
        ];
        for (bytes, expected) in cases {
            let mut storage = storage_with(bytes);
            let mut sink = Recorder::default();
            let err = WavPlayer::<64>::new()
                .play(&mut storage, "/storage/t.wav", &mut sink)
                .await
                .unwrap_err();
            assert_eq!(err, PlayError::Format(expected));
            assert!(sink.chunks.is_empty());
        }
    }

    #[tokio::test]
    async fn zero_channels_is_format_error() {
        let mut bytes = WavFixture::pcm16(2, 44_100, pcm_ramp(8)).build();
        // channels field: prologue (12) + chunk header (8) + format code (2)
        bytes[22..24].copy_from_slice(&0u16.to_le_bytes());
        let mut storage = storage_with(bytes);
        let mut sink = Recorder::default();

        let err = WavPlayer::<64>::new()
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap_err();

        assert_eq!(err, PlayError::Format(FormatError::ZeroChannels));
    }

    #[tokio::test]
    async fn sink_failure_aborts_and_closes_file() {
        let mut storage = storage_with(WavFixture::pcm16(2, 44_100, pcm_ramp(256)).build());
        let mut player = WavPlayer::<32>::new();
        let mut sink = Recorder {
            fail_on_chunk: Some(2),
            ..Recorder::default()
        };

        let err = player
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap_err();

        assert_eq!(err, PlayError::Sink("sink full"));
        assert_eq!(sink.chunks.len(), 2);
        assert_eq!(player.state(), PlayerState::Failed);
        assert_eq!(storage.open_files(), 0);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let mut storage = MockStorage::new();
        let mut sink = Recorder::default();
        let err = WavPlayer::<64>::new()
            .play(&mut storage, "/storage/none.wav", &mut sink)
            .await
            .unwrap_err();
        assert_eq!(err, PlayError::NotFound);
    }

    #[tokio::test]
    async fn read_fault_is_io_error() {
        let fixture = WavFixture::pcm16(2, 44_100, pcm_ramp(128));
        let fault_at = fixture.data_offset() as u64 + 40;
        let mut storage = storage_with(fixture.build()).fail_reads_at("/storage/t.wav", fault_at);
        let mut sink = Recorder::default();

        let err = WavPlayer::<32>::new()
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap_err();

        assert_eq!(err, PlayError::Io(StorageError::Io));
        assert_eq!(sink.bytes(), pcm_ramp(40));
    }

    #[tokio::test]
    async fn empty_data_chunk_completes_without_writes() {
        let mut storage = storage_with(WavFixture::pcm16(2, 44_100, vec![]).build());
        let mut sink = Recorder::default();
        let report = WavPlayer::<64>::new()
            .play(&mut storage, "/storage/t.wav", &mut sink)
            .await
            .unwrap();
        assert_eq!(report.bytes_streamed, 0);
        assert_eq!(report.chunks, 0);
        assert_eq!(sink.begun.len(), 1);
    }
}
