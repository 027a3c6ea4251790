//! Application driver: one pass over the flash volume.
//!
//! ```text
//! info ─▶ create transport ─▶ scan + play each file ─▶ delete transport ─▶ unmount
//! ```
//!
//! The transport is created once and torn down exactly once, whatever the
//! scan returned. The volume is unmounted and the watchdog released on every
//! path out of [`Application::run`].
//!
//! # Dependency Injection
//!
//! ```rust,ignore
//! // Hardware:
//! app.run(&mut spiffs, VendorI2s::take(), &mut task_wdt).await;
//! // Emulator:
//! let mut storage = LocalFileStorage::mount(dir, config.mount)?;
//! app.run(&mut storage, SimulatedI2s::new(), &mut NoopWatchdog).await;
//! // Tests:
//! app.run(&mut MockStorage::new(), MockI2s::new(), &mut CountingWatchdog::new()).await;
//! ```

pub mod handler;
pub mod sink;

use library::{ScanError, Scanner};
use platform::{
    ConfigError, I2sDriver, I2sTransport, Storage, StorageError, TransportError, Volume, Watchdog,
};
use playback::PlayError;
use thiserror_no_std::Error;

pub use handler::PlaylistHandler;
pub use sink::TransportSink;

use crate::config::AppConfig;

/// Why a run ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppError {
    /// Partition information could not be read.
    #[error("failed to get partition information: {0}")]
    Storage(StorageError),
    /// The I2S channel could not be brought up.
    #[error("failed to initialize I2S: {0}")]
    Transport(TransportError),
    /// The scan stopped: listing failure, sort overflow or an aborting file.
    #[error("error processing WAV files: {0}")]
    Scan(ScanError<PlayError<TransportError>>),
    /// Playback finished but the channel could not be released.
    #[error("failed to release I2S: {0}")]
    Teardown(TransportError),
}

/// Counts from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunSummary {
    /// Files streamed to completion.
    pub played: u32,
    /// Files that failed and were skipped.
    pub failed: u32,
    /// Directory entries that were not WAV files.
    pub skipped: u32,
}

/// Validated configuration plus the run sequence.
#[derive(Debug, Clone, Copy)]
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Application for `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] from [`AppConfig::validate`].
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in effect.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Play every WAV file on the mounted volume once.
    ///
    /// # Errors
    ///
    /// [`AppError`]; the first failure wins over a later teardown failure,
    /// which is then only logged.
    pub async fn run<S, D, W>(
        &self,
        storage: &mut S,
        driver: D,
        watchdog: &mut W,
    ) -> Result<RunSummary, AppError>
    where
        S: Storage + Volume,
        D: I2sDriver,
        W: Watchdog,
    {
        watchdog.feed();
        let outcome = self.play_volume(storage, driver, watchdog).await;

        storage.unmount();
        platform::info!("partition {} unmounted", self.config.mount.partition_label);
        watchdog.unsubscribe();

        match &outcome {
            Ok(summary) => platform::info!(
                "Playback complete: {} played, {} failed, {} skipped",
                summary.played,
                summary.failed,
                summary.skipped
            ),
            Err(e) => platform::error!("{}", e),
        }
        outcome
    }

    async fn play_volume<S, D, W>(
        &self,
        storage: &mut S,
        driver: D,
        watchdog: &mut W,
    ) -> Result<RunSummary, AppError>
    where
        S: Storage + Volume,
        D: I2sDriver,
        W: Watchdog,
    {
        let info = storage.info().map_err(AppError::Storage)?;
        platform::info!(
            "Partition size: total: {}, used: {}",
            info.total_bytes,
            info.used_bytes
        );

        let mut transport =
            I2sTransport::create(driver, self.config.transport).map_err(AppError::Transport)?;

        let scanned = {
            let sink = TransportSink::new(&mut transport, self.config.rate_policy);
            let mut handler = PlaylistHandler::new(sink, watchdog, self.config.on_error);
            let result = Scanner::new(self.config.scan)
                .enumerate(storage, &mut handler)
                .await;
            result.map(|scan| RunSummary {
                played: handler.played(),
                failed: handler.failed(),
                skipped: scan.skipped,
            })
        };

        let teardown = transport.delete();
        match (scanned, teardown) {
            (Ok(summary), Ok(_)) => Ok(summary),
            (Ok(_), Err(e)) => Err(AppError::Teardown(e)),
            (Err(e), torn) => {
                if let Err(t) = torn {
                    platform::warn!("I2S teardown after failed scan also failed: {}", t);
                }
                Err(AppError::Scan(e))
            }
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
    use crate::config::{FailurePolicy, RatePolicy};
    use embassy_time::Duration;
    use library::ScanConfig;
    use platform::mocks::{
        pcm_ramp, CountingWatchdog, I2sCall, I2sStep, MockI2s, MockStorage, WavFixture,
    };
    use platform::DriverFault;
    use playback::FormatError;

    fn config(on_error: FailurePolicy) -> AppConfig {
        AppConfig {
            scan: ScanConfig {
                pause: Duration::from_ticks(0),
                ..ScanConfig::default()
            },
            on_error,
            ..AppConfig::default()
        }
    }

    fn wav(len: usize) -> Vec<u8> {
        WavFixture::pcm16(2, 44_100, pcm_ramp(len)).build()
    }

    #[tokio::test]
    async fn plays_every_file_then_tears_down_once() {
        let mut storage = MockStorage::new()
            .with_file("/storage/a.wav", wav(3000))
            .with_file("/storage/notes.txt", b"x".to_vec())
            .with_file("/storage/b.wav", wav(500));
        let driver = MockI2s::new();
        let probe = driver.probe();
        let mut watchdog = CountingWatchdog::new();

        let summary = Application::new(config(FailurePolicy::Abort))
            .unwrap()
            .run(&mut storage, driver, &mut watchdog)
            .await
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                played: 2,
                failed: 0,
                skipped: 1
            }
        );
        let mut expected = pcm_ramp(3000);
        expected.extend(pcm_ramp(500));
        assert_eq!(probe.captured(), expected);

        let calls = probe.calls();
        assert_eq!(calls[..3], [I2sCall::NewChannel, I2sCall::InitStdMode, I2sCall::Enable]);
        assert_eq!(calls[3..], [I2sCall::Disable, I2sCall::DeleteChannel]);
        assert!(!probe.is_allocated());
        assert!(!storage.is_mounted());
        assert!(watchdog.is_unsubscribed());
        // start + one per file + one per pause
        assert_eq!(watchdog.feeds(), 5);
    }

    #[tokio::test]
    async fn abort_policy_stops_at_the_first_bad_file() {
        let mut storage = MockStorage::new()
            .with_file("/storage/1.wav", wav(64))
            .with_file("/storage/2.wav", b"RIFX garbage".to_vec())
            .with_file("/storage/3.wav", wav(64));
        let driver = MockI2s::new();
        let probe = driver.probe();

        let err = Application::new(config(FailurePolicy::Abort))
            .unwrap()
            .run(&mut storage, driver, &mut CountingWatchdog::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppError::Scan(ScanError::Handler(PlayError::Format(FormatError::NotRiff)))
        );
        assert_eq!(probe.captured(), pcm_ramp(64));
        assert!(!storage.opened().iter().any(|p| p == "/storage/3.wav"));
        assert_eq!(probe.calls().last(), Some(&I2sCall::DeleteChannel));
        assert!(!storage.is_mounted());
    }

    #[tokio::test]
    async fn skip_policy_counts_and_continues() {
        let mut storage = MockStorage::new()
            .with_file("/storage/1.wav", wav(64))
            .with_file("/storage/2.wav", b"RIFX garbage".to_vec())
            .with_file("/storage/3.wav", wav(32));
        let driver = MockI2s::new();
        let probe = driver.probe();

        let summary = Application::new(config(FailurePolicy::Skip))
            .unwrap()
            .run(&mut storage, driver, &mut CountingWatchdog::new())
            .await
            .unwrap();

        assert_eq!(summary.played, 2);
        assert_eq!(summary.failed, 1);
        let mut expected = pcm_ramp(64);
        expected.extend(pcm_ramp(32));
        assert_eq!(probe.captured(), expected);
    }

    #[tokio::test]
    async fn transport_failure_still_unmounts() {
        let mut storage = MockStorage::new().with_file("/storage/a.wav", wav(64));
        let driver = MockI2s::new().fail_at(I2sStep::Enable, DriverFault::Hardware);
        let probe = driver.probe();
        let mut watchdog = CountingWatchdog::new();

        let err = Application::new(config(FailurePolicy::Abort))
            .unwrap()
            .run(&mut storage, driver, &mut watchdog)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppError::Transport(TransportError::Enable(DriverFault::Hardware))
        );
        assert!(storage.opened().is_empty());
        assert!(!probe.is_allocated());
        assert!(!storage.is_mounted());
        assert!(watchdog.is_unsubscribed());
    }

    #[tokio::test]
    async fn teardown_failure_is_reported_after_a_clean_scan() {
        let mut storage = MockStorage::new();
        let driver = MockI2s::new().fail_at(I2sStep::DeleteChannel, DriverFault::InvalidState);

        let err = Application::new(config(FailurePolicy::Abort))
            .unwrap()
            .run(&mut storage, driver, &mut CountingWatchdog::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppError::Teardown(TransportError::Delete(DriverFault::InvalidState))
        );
    }

    #[tokio::test]
    async fn rate_mismatch_fails_the_file_under_reject() {
        let mut storage = MockStorage::new()
            .with_file("/storage/hi.wav", WavFixture::pcm16(2, 48_000, pcm_ramp(64)).build());
        let driver = MockI2s::new();
        let probe = driver.probe();

        let err = Application::new(config(FailurePolicy::Abort))
            .unwrap()
            .run(&mut storage, driver, &mut CountingWatchdog::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppError::Scan(ScanError::Handler(PlayError::Sink(
                TransportError::RateMismatch {
                    stream: 48_000,
                    channel: 44_100
                }
            )))
        );
        assert!(probe.captured().is_empty());
    }

    #[tokio::test]
    async fn reconfigure_policy_plays_mixed_rates() {
        let mut storage = MockStorage::new()
            .with_file("/storage/a.wav", WavFixture::pcm16(2, 48_000, pcm_ramp(64)).build())
            .with_file("/storage/b.wav", wav(64));
        let driver = MockI2s::new();
        let probe = driver.probe();
        let app = Application::new(AppConfig {
            rate_policy: RatePolicy::Reconfigure,
            ..config(FailurePolicy::Abort)
        })
        .unwrap();

        let summary = app
            .run(&mut storage, driver, &mut CountingWatchdog::new())
            .await
            .unwrap();

        assert_eq!(summary.played, 2);
        let reclocks: Vec<_> = probe
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                I2sCall::ReconfigClock(hz) => Some(hz),
                _ => None,
            })
            .collect();
        assert_eq!(reclocks, [48_000, 44_100]);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let bad = AppConfig {
            scan: ScanConfig {
                root: "/elsewhere",
                ..ScanConfig::default()
            },
            ..AppConfig::default()
        };
        assert_eq!(Application::new(bad).unwrap_err().field, "scan.root");
    }
}
