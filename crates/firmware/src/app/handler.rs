//! Per-file handler the scanner calls: play the file, apply the failure policy.

use library::FileHandler;
use platform::{I2sDriver, Storage, TransportError, Watchdog};
use playback::{PlayError, WavPlayer};

use super::sink::TransportSink;
use crate::config::FailurePolicy;

/// Plays every file it is handed through one shared transport.
pub struct PlaylistHandler<'a, D: I2sDriver, W: Watchdog> {
    player: WavPlayer,
    sink: TransportSink<'a, D>,
    watchdog: &'a mut W,
    on_error: FailurePolicy,
    played: u32,
    failed: u32,
}

impl<'a, D: I2sDriver, W: Watchdog> PlaylistHandler<'a, D, W> {
    /// Handler writing into `sink` and feeding `watchdog` between files.
    pub fn new(sink: TransportSink<'a, D>, watchdog: &'a mut W, on_error: FailurePolicy) -> Self {
        Self {
            player: WavPlayer::new(),
            sink,
            watchdog,
            on_error,
            played: 0,
            failed: 0,
        }
    }

    /// Files streamed to completion.
    pub fn played(&self) -> u32 {
        self.played
    }

    /// Files that failed (and were skipped, or aborted the run).
    pub fn failed(&self) -> u32 {
        self.failed
    }
}

impl<S: Storage, D: I2sDriver, W: Watchdog> FileHandler<S> for PlaylistHandler<'_, D, W> {
    type Error = PlayError<TransportError>;

    async fn handle(&mut self, storage: &mut S, path: &str) -> Result<(), Self::Error> {
        let outcome = self.player.play(storage, path, &mut self.sink).await;
        self.watchdog.feed();

        match outcome {
            Ok(report) => {
                self.played = self.played.saturating_add(1);
                platform::info!("finished {}: {} bytes", path, report.bytes_streamed);
                Ok(())
            }
            Err(e) => {
                self.failed = self.failed.saturating_add(1);
                match self.on_error {
                    FailurePolicy::Abort => Err(e),
                    FailurePolicy::Skip => {
                        platform::warn!("skipping {}: {}", path, e);
                        Ok(())
                    }
                }
            }
        }
    }

    fn on_pause(&mut self) {
        self.watchdog.feed();
    }
}
