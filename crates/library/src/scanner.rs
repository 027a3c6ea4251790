//! Scanner: lists one directory and hands every matching file to a handler.
//!
//! An entry matches when it is a regular file whose name *contains* the
//! marker (default `".wav"`, case-sensitive). `song.wav.bak` matches,
//! `SONG.WAV` does not. Each match is joined onto the root as
//! `root + "/" + name` in a bounded buffer and passed to
//! [`FileHandler::handle`]; a match that does not fit the buffer is logged
//! and skipped. The first failing handler stops the pass: later
//! files are never handled and the handler's status is returned unchanged.
//! A fixed pause follows every successful file.

use core::future::Future;

use embassy_time::{Duration, Timer};
use heapless::{String, Vec};
use platform::{ConfigError, DirEntry, Directory, Storage, StorageError};
use thiserror_no_std::Error;

/// Longest path the scanner builds.
pub const MAX_PATH_LEN: usize = 300;

/// Most matching entries [`ScanOrder::Sorted`] can order.
pub const MAX_SORTED_ENTRIES: usize = 64;

/// Pause after each successfully handled file.
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(500);

/// Full path of a matched file.
pub type ScanPath = String<MAX_PATH_LEN>;

/// Order in which matching files are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanOrder {
    /// Whatever order the filesystem lists entries in.
    #[default]
    Directory,
    /// Byte-wise ascending by name; at most [`MAX_SORTED_ENTRIES`] matches.
    Sorted,
}

/// What to scan and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanConfig {
    /// Directory to list (not recursed into).
    pub root: &'static str,
    /// Substring a file name must contain.
    pub marker: &'static str,
    /// Wait after each successful file; zero disables.
    pub pause: Duration,
    /// Handling order.
    pub order: ScanOrder,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: "/storage",
            marker: ".wav",
            pause: DEFAULT_PAUSE,
            order: ScanOrder::Directory,
        }
    }
}

impl ScanConfig {
    /// Check the configuration before any storage access.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for a relative root or an empty marker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.root.starts_with('/') {
            return Err(ConfigError::new("scan.root", "must be absolute"));
        }
        if self.marker.is_empty() {
            return Err(ConfigError::new("scan.marker", "must be non-empty"));
        }
        Ok(())
    }
}

/// Why a scan stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanError<E> {
    /// The scan configuration was rejected.
    #[error("{0}")]
    Config(ConfigError),
    /// The root directory does not exist.
    #[error("directory not found")]
    NotFound,
    /// Opening or listing the directory failed.
    #[error("directory listing failed: {0}")]
    Io(StorageError),
    /// `root + "/" + name` does not fit [`MAX_PATH_LEN`].
    #[error("path of {len} bytes exceeds {max}")]
    PathTooLong {
        /// Length the path would have had.
        len: usize,
        /// [`MAX_PATH_LEN`].
        max: usize,
    },
    /// More than [`MAX_SORTED_ENTRIES`] matches in sorted mode.
    #[error("more than {0} matching entries to sort")]
    TooManyEntries(usize),
    /// The handler failed; carries its status unchanged.
    #[error("handler failed: {0}")]
    Handler(E),
}

impl<E> ScanError<E> {
    fn storage(e: impl Into<StorageError>) -> Self {
        match e.into() {
            StorageError::NotFound | StorageError::NotADirectory => Self::NotFound,
            other => Self::Io(other),
        }
    }
}

impl<E> From<ConfigError> for ScanError<E> {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Counts from a completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanSummary {
    /// Files handed to the handler, all successfully.
    pub handled: u32,
    /// Entries not handed over: non-matches, directories and overlong paths.
    pub skipped: u32,
}

/// Per-file processor invoked by [`Scanner::enumerate`].
pub trait FileHandler<S: Storage> {
    /// Status the handler fails with.
    type Error;

    /// Process one file. The storage is lent back so the handler can open `path`.
    fn handle(&mut self, storage: &mut S, path: &str)
        -> impl Future<Output = Result<(), Self::Error>>;

    /// Runs after each successful file, before the pause.
    fn on_pause(&mut self) {}
}

/// Single-directory scanner.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    /// Scanner for `config`.
    pub const fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// `true` for regular files whose name contains the marker.
    pub fn matches(&self, entry: &DirEntry) -> bool {
        entry.is_file() && entry.name.contains(self.config.marker)
    }

    /// `root + "/" + name`, bounded to [`MAX_PATH_LEN`].
    ///
    /// # Errors
    ///
    /// [`ScanError::PathTooLong`].
    pub fn build_path<E>(&self, name: &str) -> Result<ScanPath, ScanError<E>> {
        let root = self.config.root.trim_end_matches('/');
        let len = root.len().saturating_add(1).saturating_add(name.len());
        let too_long = || ScanError::PathTooLong {
            len,
            max: MAX_PATH_LEN,
        };
        let mut path = ScanPath::new();
        path.push_str(root).map_err(|_| too_long())?;
        path.push('/').map_err(|_| too_long())?;
        path.push_str(name).map_err(|_| too_long())?;
        Ok(path)
    }

    /// Hand every matching file under the root to `handler`, one at a time.
    ///
    /// # Errors
    ///
    /// [`ScanError::NotFound`]/[`ScanError::Io`] if the root cannot be listed,
    /// [`ScanError::TooManyEntries`], or the first [`ScanError::Handler`]
    /// failure. Files handled before the failure stay handled. A match whose
    /// path would exceed [`MAX_PATH_LEN`] is logged and skipped.
    pub async fn enumerate<S, H>(
        &self,
        storage: &mut S,
        handler: &mut H,
    ) -> Result<ScanSummary, ScanError<H::Error>>
    where
        S: Storage,
        H: FileHandler<S>,
    {
        self.config.validate()?;
        let mut dir = storage
            .open_dir(self.config.root)
            .await
            .map_err(ScanError::<H::Error>::storage)?;
        let mut summary = ScanSummary::default();

        match self.config.order {
            ScanOrder::Directory => {
                while let Some(entry) = next(&mut dir).await? {
                    match self.accept(&entry) {
                        Some(path) => {
                            self.dispatch(storage, handler, &path).await?;
                            summary.handled = summary.handled.saturating_add(1);
                        }
                        None => summary.skipped = summary.skipped.saturating_add(1),
                    }
                }
            }
            ScanOrder::Sorted => {
                // Every path shares the `root/` prefix, so this sorts by name.
                let mut paths: Vec<ScanPath, MAX_SORTED_ENTRIES> = Vec::new();
                while let Some(entry) = next(&mut dir).await? {
                    match self.accept(&entry) {
                        Some(path) => paths
                            .push(path)
                            .map_err(|_| ScanError::TooManyEntries(MAX_SORTED_ENTRIES))?,
                        None => summary.skipped = summary.skipped.saturating_add(1),
                    }
                }
                paths.sort_unstable();
                for path in &paths {
                    self.dispatch(storage, handler, path).await?;
                    summary.handled = summary.handled.saturating_add(1);
                }
            }
        }

        platform::info!(
            "scan of {} done: {} handled, {} skipped",
            self.config.root,
            summary.handled,
            summary.skipped
        );
        Ok(summary)
    }

    /// Path to hand over for `entry`, or `None` if the entry is skipped.
    fn accept(&self, entry: &DirEntry) -> Option<ScanPath> {
        if !self.matches(entry) {
            platform::debug!("skipping {}", entry.name.as_str());
            return None;
        }
        match self.build_path::<()>(&entry.name) {
            Ok(path) => Some(path),
            Err(ScanError::PathTooLong { len, max }) => {
                platform::error!(
                    "filename too long ({} > {} bytes), skipping: {}",
                    len,
                    max,
                    entry.name.as_str()
                );
                None
            }
            Err(_) => None,
        }
    }

    async fn dispatch<S, H>(
        &self,
        storage: &mut S,
        handler: &mut H,
        path: &str,
    ) -> Result<(), ScanError<H::Error>>
    where
        S: Storage,
        H: FileHandler<S>,
    {
        platform::info!("processing file: {}", path);
        if let Err(e) = handler.handle(storage, path).await {
            platform::error!("failed to process file: {}", path);
            return Err(ScanError::Handler(e));
        }

        handler.on_pause();
        if self.config.pause > Duration::from_ticks(0) {
            Timer::after(self.config.pause).await;
        }
        Ok(())
    }
}

async fn next<D: Directory, E>(dir: &mut D) -> Result<Option<DirEntry>, ScanError<E>>
where
    D::Error: Into<StorageError>,
{
    dir.next_entry()
        .await
        .map_err(|e| ScanError::Io(e.into()))
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
    use platform::mocks::MockStorage;
    use platform::EntryKind;
    use std::vec::Vec as StdVec;

    /// Records handled paths; fails on the `fail_on`-th call (0-based).
    #[derive(Default)]
    struct Recorder {
        paths: StdVec<std::string::String>,
        pauses: usize,
        fail_on: Option<usize>,
    }

    impl<S: Storage> FileHandler<S> for Recorder {
        type Error = u32;

        async fn handle(&mut self, _storage: &mut S, path: &str) -> Result<(), u32> {
            let index = self.paths.len();
            self.paths.push(path.to_string());
            if self.fail_on == Some(index) {
                return Err(0xE0 + index as u32);
            }
            Ok(())
        }

        fn on_pause(&mut self) {
            self.pauses += 1;
        }
    }

    fn no_pause() -> ScanConfig {
        ScanConfig {
            pause: Duration::from_ticks(0),
            ..ScanConfig::default()
        }
    }

    #[tokio::test]
    async fn marker_is_case_sensitive_substring() {
        let mut storage = MockStorage::new()
            .with_file("/storage/a.wav", vec![])
            .with_file("/storage/b.txt", vec![])
            .with_file("/storage/c.WAV", vec![])
            .with_file("/storage/d.wav.bak", vec![]);
        let mut handler = Recorder::default();

        let summary = Scanner::new(no_pause())
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap();

        assert_eq!(handler.paths, ["/storage/a.wav", "/storage/d.wav.bak"]);
        assert_eq!(summary, ScanSummary { handled: 2, skipped: 2 });
    }

    #[tokio::test]
    async fn directories_are_skipped_even_when_named_like_wav() {
        let mut storage = MockStorage::new()
            .with_dir("/storage/album.wav")
            .with_file("/storage/album.wav/x.wav", vec![])
            .with_file("/storage/top.wav", vec![]);
        let mut handler = Recorder::default();

        let summary = Scanner::new(no_pause())
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap();

        assert_eq!(handler.paths, ["/storage/top.wav"]);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn first_handler_failure_stops_the_pass() {
        let mut storage = MockStorage::new()
            .with_file("/storage/1.wav", vec![])
            .with_file("/storage/2.wav", vec![])
            .with_file("/storage/3.wav", vec![]);
        let mut handler = Recorder {
            fail_on: Some(1),
            ..Recorder::default()
        };

        let err = Scanner::new(no_pause())
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap_err();

        assert_eq!(err, ScanError::Handler(0xE1));
        assert_eq!(handler.paths, ["/storage/1.wav", "/storage/2.wav"]);
        assert_eq!(handler.pauses, 1);
    }

    #[tokio::test]
    async fn missing_root_is_not_found() {
        let mut storage = MockStorage::new();
        let config = ScanConfig {
            root: "/sdcard",
            ..no_pause()
        };
        let err = Scanner::new(config)
            .enumerate(&mut storage, &mut Recorder::default())
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::NotFound);
    }

    #[tokio::test]
    async fn listing_fault_is_io() {
        let mut storage = MockStorage::new()
            .with_file("/storage/a.wav", vec![])
            .with_file("/storage/b.wav", vec![])
            .fail_listing_after(1);
        let mut handler = Recorder::default();
        let err = Scanner::new(no_pause())
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::Io(StorageError::Io));
        assert_eq!(handler.paths.len(), 1);
    }

    #[tokio::test]
    async fn overlong_path_is_skipped_and_the_pass_continues() {
        // 100-byte root, so a 200-byte name lands one byte past the limit.
        let root: &'static str = Box::leak(format!("/storage/{}", "d".repeat(91)).into_boxed_str());
        let long_name = format!("{}.wav", "n".repeat(196));
        let mut storage = MockStorage::new()
            .with_dir(root)
            .with_file(&format!("{root}/ok.wav"), vec![])
            .with_file(&format!("{root}/{long_name}"), vec![])
            .with_file(&format!("{root}/later.wav"), vec![]);
        let mut handler = Recorder::default();
        let config = ScanConfig { root, ..no_pause() };

        let summary = Scanner::new(config)
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap();

        assert_eq!(
            handler.paths,
            [format!("{root}/ok.wav"), format!("{root}/later.wav")]
        );
        assert_eq!(summary, ScanSummary { handled: 2, skipped: 1 });
    }

    #[tokio::test]
    async fn overlong_path_does_not_take_a_sorted_slot() {
        let root: &'static str = Box::leak(format!("/storage/{}", "d".repeat(91)).into_boxed_str());
        let mut storage = MockStorage::new()
            .with_dir(root)
            .with_file(&format!("{root}/{}.wav", "n".repeat(196)), vec![]);
        for i in 0..MAX_SORTED_ENTRIES {
            storage.add_file(&format!("{root}/{i:03}.wav"), vec![]);
        }
        let mut handler = Recorder::default();
        let config = ScanConfig {
            root,
            order: ScanOrder::Sorted,
            ..no_pause()
        };

        let summary = Scanner::new(config)
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap();

        assert_eq!(summary.handled as usize, MAX_SORTED_ENTRIES);
        assert_eq!(summary.skipped, 1);
        assert_eq!(handler.paths[0], format!("{root}/000.wav"));
    }

    #[test]
    fn build_path_reports_the_overflow() {
        let scanner = Scanner::new(no_pause());
        let name = "n".repeat(MAX_PATH_LEN);
        assert_eq!(
            scanner.build_path::<()>(&name).unwrap_err(),
            ScanError::PathTooLong {
                len: "/storage/".len() + MAX_PATH_LEN,
                max: MAX_PATH_LEN
            }
        );
    }

    #[test]
    fn path_at_exact_limit_fits() {
        let scanner = Scanner::new(no_pause());
        let name = "n".repeat(MAX_PATH_LEN - "/storage/".len());
        let path = scanner.build_path::<()>(&name).unwrap();
        assert_eq!(path.len(), MAX_PATH_LEN);
    }

    #[tokio::test]
    async fn sorted_order_is_bytewise() {
        let mut storage = MockStorage::new()
            .with_file("/storage/b.wav", vec![])
            .with_file("/storage/B.wav", vec![])
            .with_file("/storage/a.wav", vec![])
            .with_file("/storage/notes.txt", vec![]);
        let mut handler = Recorder::default();
        let config = ScanConfig {
            order: ScanOrder::Sorted,
            ..no_pause()
        };

        Scanner::new(config)
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap();

        assert_eq!(
            handler.paths,
            ["/storage/B.wav", "/storage/a.wav", "/storage/b.wav"]
        );
    }

    #[tokio::test]
    async fn sorted_order_is_bounded() {
        let mut storage = MockStorage::new();
        for i in 0..=MAX_SORTED_ENTRIES {
            storage.add_file(&format!("/storage/{i:03}.wav"), vec![]);
        }
        let config = ScanConfig {
            order: ScanOrder::Sorted,
            ..no_pause()
        };
        let mut handler = Recorder::default();

        let err = Scanner::new(config)
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap_err();

        assert_eq!(err, ScanError::TooManyEntries(MAX_SORTED_ENTRIES));
        assert!(handler.paths.is_empty());
    }

    #[tokio::test]
    async fn pause_follows_each_successful_file() {
        let mut storage = MockStorage::new()
            .with_file("/storage/a.wav", vec![])
            .with_file("/storage/b.wav", vec![]);
        let config = ScanConfig {
            pause: Duration::from_millis(30),
            ..ScanConfig::default()
        };
        let mut handler = Recorder::default();

        let started = std::time::Instant::now();
        Scanner::new(config)
            .enumerate(&mut storage, &mut handler)
            .await
            .unwrap();

        assert!(started.elapsed() >= std::time::Duration::from_millis(60));
        assert_eq!(handler.pauses, 2);
    }

    #[test]
    fn matches_requires_regular_file() {
        let scanner = Scanner::default();
        assert!(scanner.matches(&DirEntry::new("x.wav", EntryKind::File).unwrap()));
        assert!(!scanner.matches(&DirEntry::new("x.wav", EntryKind::Directory).unwrap()));
        assert!(!scanner.matches(&DirEntry::new("x.WAV", EntryKind::File).unwrap()));
    }

    #[test]
    fn config_validation() {
        assert!(ScanConfig::default().validate().is_ok());
        let relative = ScanConfig {
            root: "storage",
            ..ScanConfig::default()
        };
        assert_eq!(relative.validate().unwrap_err().field, "scan.root");
        let empty = ScanConfig {
            marker: "",
            ..ScanConfig::default()
        };
        assert_eq!(empty.validate().unwrap_err().field, "scan.marker");
    }
}
