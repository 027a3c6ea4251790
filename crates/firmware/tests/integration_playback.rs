//! Playback integration tests: full runs over a host directory.
// Integration test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]
//!
//! A tempdir is mounted through `LocalFileStorage`, WAV fixtures are written
//! into it and `Application::run` drives the scanner, player and transport
//! exactly as the emulator binary does, with `MockI2s` capturing the wire.
//!
//! Run with: cargo test -p firmware --test integration_playback

use std::fs;

use embassy_time::Duration;
use firmware::{AppConfig, AppError, Application, FailurePolicy, RunSummary};
use library::{ScanConfig, ScanError, ScanOrder};
use platform::mocks::{pcm_ramp, CountingWatchdog, I2sCall, MockI2s, WavFixture};
use platform::storage_local::LocalFileStorage;
use platform::{MountConfig, MountError, Volume};
use playback::{FormatError, PlayError, UnsupportedFormat};

fn config(on_error: FailurePolicy) -> AppConfig {
    AppConfig {
        scan: ScanConfig {
            pause: Duration::from_ticks(0),
            order: ScanOrder::Sorted,
            ..ScanConfig::default()
        },
        on_error,
        ..AppConfig::default()
    }
}

fn stereo(pcm: Vec<u8>) -> Vec<u8> {
    WavFixture::pcm16(2, 44_100, pcm).build()
}

#[tokio::test]
async fn plays_a_directory_byte_exact_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = pcm_ramp(5000);
    let second = pcm_ramp(1234);
    fs::write(dir.path().join("02-second.wav"), stereo(second.clone())).unwrap();
    fs::write(
        dir.path().join("01-first.wav"),
        WavFixture::pcm16(2, 44_100, first.clone())
            .leading_chunk(*b"LIST", b"INFOtitle".to_vec())
            .build(),
    )
    .unwrap();
    fs::write(dir.path().join("cover.jpg"), [0xFFu8, 0xD8]).unwrap();

    let mut storage = LocalFileStorage::mount(dir.path(), MountConfig::default()).unwrap();
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
    let mut expected = first;
    expected.extend(second);
    assert_eq!(probe.captured(), expected);
    assert_eq!(storage.open_files(), 0);
    assert!(!storage.is_mounted());
    assert!(watchdog.is_unsubscribed());
}

#[tokio::test]
async fn mono_file_is_forwarded_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let pcm = pcm_ramp(777);
    fs::write(
        dir.path().join("mono.wav"),
        WavFixture::pcm16(1, 44_100, pcm.clone()).build(),
    )
    .unwrap();

    let mut storage = LocalFileStorage::mount(dir.path(), MountConfig::default()).unwrap();
    let driver = MockI2s::new().accept_at_most(100);
    let probe = driver.probe();

    Application::new(config(FailurePolicy::Abort))
        .unwrap()
        .run(&mut storage, driver, &mut CountingWatchdog::new())
        .await
        .unwrap();

    assert_eq!(probe.captured(), pcm);
}

#[tokio::test]
async fn abort_policy_reports_the_failing_file_status() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.wav"), stereo(pcm_ramp(64))).unwrap();
    fs::write(
        dir.path().join("b.wav"),
        WavFixture::pcm16(2, 44_100, pcm_ramp(64))
            .format_code(3)
            .build(),
    )
    .unwrap();
    fs::write(dir.path().join("c.wav"), stereo(pcm_ramp(64))).unwrap();

    let mut storage = LocalFileStorage::mount(dir.path(), MountConfig::default()).unwrap();
    let driver = MockI2s::new();
    let probe = driver.probe();

    let err = Application::new(config(FailurePolicy::Abort))
        .unwrap()
        .run(&mut storage, driver, &mut CountingWatchdog::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AppError::Scan(ScanError::Handler(PlayError::UnsupportedFormat(
            UnsupportedFormat::Encoding(3)
        )))
    );
    assert_eq!(probe.captured(), pcm_ramp(64));
    let calls = probe.calls();
    assert_eq!(calls[calls.len() - 2..], [I2sCall::Disable, I2sCall::DeleteChannel]);
}

#[tokio::test]
async fn skip_policy_plays_around_a_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let truncated = WavFixture::pcm16(2, 44_100, pcm_ramp(100))
        .declared_data_len(400)
        .build();
    fs::write(dir.path().join("1.wav"), truncated).unwrap();
    fs::write(dir.path().join("2.wav"), stereo(pcm_ramp(48))).unwrap();

    let mut storage = LocalFileStorage::mount(dir.path(), MountConfig::default()).unwrap();
    let driver = MockI2s::new();
    let probe = driver.probe();

    let summary = Application::new(config(FailurePolicy::Skip))
        .unwrap()
        .run(&mut storage, driver, &mut CountingWatchdog::new())
        .await
        .unwrap();

    assert_eq!(summary.played, 1);
    assert_eq!(summary.failed, 1);
    // Every byte present in the truncated file still went out first.
    let mut expected = pcm_ramp(100);
    expected.extend(pcm_ramp(48));
    assert_eq!(probe.captured(), expected);
}

#[tokio::test]
async fn truncated_file_aborts_with_delivered_count() {
    let dir = tempfile::tempdir().unwrap();
    let truncated = WavFixture::pcm16(2, 44_100, pcm_ramp(100))
        .declared_data_len(400)
        .build();
    fs::write(dir.path().join("1.wav"), truncated).unwrap();

    let mut storage = LocalFileStorage::mount(dir.path(), MountConfig::default()).unwrap();
    let err = Application::new(config(FailurePolicy::Abort))
        .unwrap()
        .run(&mut storage, MockI2s::new(), &mut CountingWatchdog::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AppError::Scan(ScanError::Handler(PlayError::Format(FormatError::Truncated {
            expected: 400,
            delivered: 100
        })))
    );
}

#[test]
fn missing_music_directory_fails_to_mount_without_format() {
    let dir = tempfile::tempdir().unwrap();
    let config = MountConfig {
        format_if_mount_failed: false,
        ..MountConfig::default()
    };
    let err = LocalFileStorage::mount(dir.path().join("absent"), config)
        .err()
        .unwrap();
    assert_eq!(err, MountError::MountFailed);
}

#[cfg(feature = "std")]
#[tokio::test]
async fn simulated_channel_runs_a_short_file_end_to_end() {
    use firmware::SimulatedI2s;

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("beep.wav"), stereo(pcm_ramp(4 * 441))).unwrap();
    let mut storage = LocalFileStorage::mount(dir.path(), MountConfig::default()).unwrap();

    let summary = Application::new(config(FailurePolicy::Abort))
        .unwrap()
        .run(&mut storage, SimulatedI2s::new(), &mut CountingWatchdog::new())
        .await
        .unwrap();

    assert_eq!(summary.played, 1);
}
