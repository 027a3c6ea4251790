//! Integration tests for the scanner against a host directory mounted
//! through `LocalFileStorage`.
//!
//! Each test builds a throwaway directory with `tempfile`, mounts it at
//! `/storage` and runs a full pass with the pause disabled.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::fs;
use std::path::Path;

use embassy_time::Duration;
use library::{FileHandler, ScanConfig, ScanError, ScanOrder, ScanSummary, Scanner};
use platform::storage_local::LocalFileStorage;
use platform::{File, MountConfig, Storage, StorageError};

/// Opens every path it is given and records `(path, size)`.
#[derive(Default)]
struct SizeProbe {
    seen: Vec<(String, u64)>,
    fail_on: Option<&'static str>,
}

impl<S: Storage> FileHandler<S> for SizeProbe {
    type Error = StorageError;

    async fn handle(&mut self, storage: &mut S, path: &str) -> Result<(), StorageError> {
        let file = storage.open_file(path).await.map_err(Into::<StorageError>::into)?;
        self.seen.push((path.to_owned(), file.size()));
        if self.fail_on.is_some_and(|p| path.ends_with(p)) {
            return Err(StorageError::Io);
        }
        Ok(())
    }
}

fn mount(dir: &Path) -> LocalFileStorage {
    LocalFileStorage::mount(dir, MountConfig::default()).unwrap()
}

fn fast(order: ScanOrder) -> ScanConfig {
    ScanConfig {
        pause: Duration::from_ticks(0),
        order,
        ..ScanConfig::default()
    }
}

fn seen_names(probe: &SizeProbe) -> Vec<&str> {
    probe.seen.iter().map(|(p, _)| p.as_str()).collect()
}

#[tokio::test]
async fn only_marked_regular_files_are_handled() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.wav"), [0u8; 44]).unwrap();
    fs::write(dir.path().join("b.txt"), [0u8; 3]).unwrap();
    fs::write(dir.path().join("c.WAV"), [0u8; 3]).unwrap();
    fs::create_dir(dir.path().join("nested.wav")).unwrap();
    fs::write(dir.path().join("nested.wav").join("deep.wav"), [0u8; 3]).unwrap();

    let mut storage = mount(dir.path());
    let mut probe = SizeProbe::default();
    let summary = Scanner::new(fast(ScanOrder::Sorted))
        .enumerate(&mut storage, &mut probe)
        .await
        .unwrap();

    assert_eq!(probe.seen, [("/storage/a.wav".to_owned(), 44)]);
    assert_eq!(summary, ScanSummary { handled: 1, skipped: 3 });
    assert_eq!(storage.open_files(), 0);
}

#[tokio::test]
async fn sorted_pass_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["03.wav", "01.wav", "02.wav"] {
        fs::write(dir.path().join(name), b"RIFF").unwrap();
    }

    let mut storage = mount(dir.path());
    let mut probe = SizeProbe::default();
    Scanner::new(fast(ScanOrder::Sorted))
        .enumerate(&mut storage, &mut probe)
        .await
        .unwrap();

    assert_eq!(
        seen_names(&probe),
        ["/storage/01.wav", "/storage/02.wav", "/storage/03.wav"]
    );
}

#[tokio::test]
async fn directory_order_visits_every_match_once() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["x.wav", "y.wav", "z.wav", "readme.md"] {
        fs::write(dir.path().join(name), b"").unwrap();
    }

    let mut storage = mount(dir.path());
    let mut probe = SizeProbe::default();
    let summary = Scanner::new(fast(ScanOrder::Directory))
        .enumerate(&mut storage, &mut probe)
        .await
        .unwrap();

    let mut names = seen_names(&probe);
    names.sort_unstable();
    assert_eq!(names, ["/storage/x.wav", "/storage/y.wav", "/storage/z.wav"]);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn failing_handler_stops_after_its_file() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["1.wav", "2.wav", "3.wav"] {
        fs::write(dir.path().join(name), b"").unwrap();
    }

    let mut storage = mount(dir.path());
    let mut probe = SizeProbe {
        fail_on: Some("2.wav"),
        ..SizeProbe::default()
    };
    let err = Scanner::new(fast(ScanOrder::Sorted))
        .enumerate(&mut storage, &mut probe)
        .await
        .unwrap_err();

    assert_eq!(err, ScanError::Handler(StorageError::Io));
    assert_eq!(seen_names(&probe), ["/storage/1.wav", "/storage/2.wav"]);
}

#[tokio::test]
async fn empty_directory_is_a_clean_pass() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = mount(dir.path());
    let summary = Scanner::new(fast(ScanOrder::Directory))
        .enumerate(&mut storage, &mut SizeProbe::default())
        .await
        .unwrap();
    assert_eq!(summary, ScanSummary::default());
}

#[tokio::test]
async fn root_outside_the_mount_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = mount(dir.path());
    let config = ScanConfig {
        root: "/sdcard",
        ..fast(ScanOrder::Directory)
    };
    let err = Scanner::new(config)
        .enumerate(&mut storage, &mut SizeProbe::default())
        .await
        .unwrap_err();
    assert_eq!(err, ScanError::NotFound);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn undecodable_file_name_does_not_end_the_pass() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        fs::write(dir.path().join(format!("{i:02}.wav")), b"").unwrap();
    }
    fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.txt")), b"").unwrap();
    fs::write(dir.path().join(OsStr::from_bytes(b"odd\xfe.wav")), b"").unwrap();

    let mut storage = mount(dir.path());
    let mut probe = SizeProbe::default();
    let summary = Scanner::new(fast(ScanOrder::Directory))
        .enumerate(&mut storage, &mut probe)
        .await
        .unwrap();

    assert_eq!(summary.handled, 20);
    assert_eq!(probe.seen.len(), 20);
    assert_eq!(storage.open_files(), 0);
}
