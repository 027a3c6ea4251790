//! Local filesystem Storage implementation for the desktop emulator.
//!
//! `LocalFileStorage` mounts a host directory at the VFS base path of a
//! [`MountConfig`], so `/storage/a.wav` resolves to `<root>/a.wav`. It keeps
//! the device mount's rules: the open-file limit, format-on-failure and
//! "everything fails after unmount".

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::storage::{
    DirEntry, Directory, EntryKind, File, MountConfig, MountError, Storage, StorageError, Volume,
    VolumeInfo,
};

/// Capacity reported by [`Volume::info`] unless overridden.
pub const DEFAULT_CAPACITY_BYTES: u64 = 1024 * 1024;

/// Error type for local filesystem operations.
#[derive(Debug)]
pub enum LocalStorageError {
    /// A mount-level rule was violated.
    Storage(StorageError),
    /// The host filesystem failed.
    Io(std::io::Error),
}

impl core::fmt::Display for LocalStorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "local storage error: {e}"),
            Self::Io(e) => write!(f, "local storage error: {e}"),
        }
    }
}

impl std::error::Error for LocalStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(_) => None,
            Self::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for LocalStorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<StorageError> for LocalStorageError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<LocalStorageError> for StorageError {
    fn from(e: LocalStorageError) -> Self {
        match e {
            LocalStorageError::Storage(kind) => kind,
            LocalStorageError::Io(io) => match io.kind() {
                std::io::ErrorKind::NotFound => StorageError::NotFound,
                _ => StorageError::Io,
            },
        }
    }
}

/// Decrements the mount's open-file count when the handle is dropped.
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An open file on the local filesystem.
pub struct LocalFile {
    inner: fs::File,
    size: u64,
    _guard: OpenGuard,
}

impl File for LocalFile {
    type Error = LocalStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(Read::read(&mut self.inner, buf)?)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        Ok(Seek::seek(&mut self.inner, SeekFrom::Start(pos))?)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Directory listing in host `read_dir` order.
pub struct LocalDir {
    inner: fs::ReadDir,
}

impl Directory for LocalDir {
    type Error = LocalStorageError;

    /// Entries whose host name is not UTF-8 cannot be addressed by a
    /// `&str` path, so they are logged and left out of the listing.
    async fn next_entry(&mut self) -> Result<Option<DirEntry>, Self::Error> {
        for entry in self.inner.by_ref() {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                crate::warn!("ignoring non UTF-8 name: {}", &*name.to_string_lossy());
                continue;
            };
            let kind = if entry.file_type()?.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            return Ok(Some(DirEntry::new(name, kind)?));
        }
        Ok(None)
    }
}

/// A `platform::Storage` implementation backed by `std::fs`.
///
/// # Example
/// ```no_run
/// # async fn example() {
/// use platform::storage_local::LocalFileStorage;
/// use platform::{MountConfig, Storage};
/// let mut storage = LocalFileStorage::mount("/home/user/music", MountConfig::default()).unwrap();
/// let file = storage.open_file("/storage/intro.wav").await.unwrap();
/// # }
/// ```
pub struct LocalFileStorage {
    root: PathBuf,
    config: MountConfig,
    capacity: u64,
    open_files: Arc<AtomicUsize>,
    mounted: bool,
}

impl LocalFileStorage {
    /// Mount `root` at `config.base_path`.
    ///
    /// A missing `root` fails the mount unless `format_if_mount_failed` is set,
    /// in which case the directory is created.
    ///
    /// # Errors
    ///
    /// [`MountError::Config`], [`MountError::MountFailed`] or [`MountError::FormatFailed`].
    pub fn mount(root: impl Into<PathBuf>, config: MountConfig) -> Result<Self, MountError> {
        config.validate()?;
        let root = root.into();

        if !root.is_dir() {
            if !config.format_if_mount_failed {
                crate::error!("failed to mount partition {}", config.partition_label);
                return Err(MountError::MountFailed);
            }
            crate::warn!("partition {} missing, formatting", config.partition_label);
            fs::create_dir_all(&root).map_err(|_| MountError::FormatFailed)?;
        }

        crate::info!(
            "partition {} mounted at {}",
            config.partition_label,
            config.base_path
        );
        Ok(Self {
            root,
            config,
            capacity: DEFAULT_CAPACITY_BYTES,
            open_files: Arc::new(AtomicUsize::new(0)),
            mounted: true,
        })
    }

    /// Override the capacity [`Volume::info`] reports.
    #[must_use]
    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = bytes;
        self
    }

    /// The mount configuration in effect.
    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Files currently open through this mount.
    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::Acquire)
    }

    /// Map a VFS path under the base path onto the host directory.
    fn resolve(&self, path: &str) -> Result<PathBuf, LocalStorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted.into());
        }
        let rest = path
            .strip_prefix(self.config.base_path)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or(StorageError::NotFound)?;
        let relative = Path::new(rest.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::NotFound.into());
        }
        Ok(self.root.join(relative))
    }

    fn used_bytes(&self) -> Result<u64, std::io::Error> {
        let mut used = 0u64;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let meta = entry.metadata()?;
                if meta.is_dir() {
                    pending.push(entry.path());
                } else {
                    used = used.saturating_add(meta.len());
                }
            }
        }
        Ok(used)
    }
}

impl Storage for LocalFileStorage {
    type Error = LocalStorageError;
    type File = LocalFile;
    type Dir = LocalDir;

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let full = self.resolve(path)?;
        if self.open_files() >= usize::from(self.config.max_files) {
            return Err(StorageError::TooManyOpenFiles.into());
        }
        let file = fs::File::open(&full)?;
        let meta = file.metadata()?;
        if meta.is_dir() {
            return Err(StorageError::NotFound.into());
        }
        self.open_files.fetch_add(1, Ordering::AcqRel);
        Ok(LocalFile {
            inner: file,
            size: meta.len(),
            _guard: OpenGuard(Arc::clone(&self.open_files)),
        })
    }

    async fn open_dir(&mut self, path: &str) -> Result<Self::Dir, Self::Error> {
        let full = self.resolve(path)?;
        if full.is_file() {
            return Err(StorageError::NotADirectory.into());
        }
        Ok(LocalDir {
            inner: fs::read_dir(full)?,
        })
    }
}

impl Volume for LocalFileStorage {
    fn info(&self) -> Result<VolumeInfo, StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        let used_bytes = self.used_bytes().map_err(|_| StorageError::Io)?;
        Ok(VolumeInfo {
            total_bytes: self.capacity,
            used_bytes,
        })
    }

    fn unmount(&mut self) {
        if self.mounted {
            self.mounted = false;
            crate::info!("partition {} unmounted", self.config.partition_label);
        }
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::{Directory, File, Storage, Volume};
    use std::fs;
    use tempfile::TempDir;

    fn mounted(tmp: &TempDir) -> LocalFileStorage {
        LocalFileStorage::mount(tmp.path(), MountConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn local_storage_read_full_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("test.wav"), b"hello world").unwrap();
        let mut storage = mounted(&tmp);
        let mut file = storage.open_file("/storage/test.wav").await.unwrap();
        let mut buf = [0u8; 11];
        let n = file.read(&mut buf).await.unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
        assert_eq!(file.size(), 11);
    }

    #[tokio::test]
    async fn local_storage_seek_and_read() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("seek.bin"), b"ABCDEFGH").unwrap();
        let mut storage = mounted(&tmp);
        let mut file = storage.open_file("/storage/seek.bin").await.unwrap();
        file.seek(4).await.unwrap();
        let mut buf = [0u8; 4];
        file.read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"EFGH");
    }

    #[tokio::test]
    async fn paths_outside_base_path_are_not_found() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.wav"), b"x").unwrap();
        let mut storage = mounted(&tmp);
        for path in ["a.wav", "/other/a.wav", "/storagea.wav", "/storage/../a.wav"] {
            let err: StorageError = storage.open_file(path).await.err().unwrap().into();
            assert_eq!(err, StorageError::NotFound, "{path}");
        }
    }

    #[tokio::test]
    async fn missing_file_maps_to_not_found() {
        let tmp = TempDir::new().unwrap();
        let mut storage = mounted(&tmp);
        let err: StorageError = storage
            .open_file("/storage/missing.wav")
            .await
            .err()
            .unwrap()
            .into();
        assert_eq!(err, StorageError::NotFound);
    }

    #[tokio::test]
    async fn open_file_limit_is_enforced_and_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.wav"), b"x").unwrap();
        let config = MountConfig {
            max_files: 2,
            ..MountConfig::default()
        };
        let mut storage = LocalFileStorage::mount(tmp.path(), config).unwrap();

        let first = storage.open_file("/storage/a.wav").await.unwrap();
        let _second = storage.open_file("/storage/a.wav").await.unwrap();
        let err: StorageError = storage
            .open_file("/storage/a.wav")
            .await
            .err()
            .unwrap()
            .into();
        assert_eq!(err, StorageError::TooManyOpenFiles);

        drop(first);
        assert_eq!(storage.open_files(), 1);
        assert!(storage.open_file("/storage/a.wav").await.is_ok());
    }

    #[tokio::test]
    async fn listing_reports_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.wav"), b"x").unwrap();
        fs::create_dir(tmp.path().join("sub.wav")).unwrap();
        let mut storage = mounted(&tmp);

        let mut dir = storage.open_dir("/storage").await.unwrap();
        let mut seen = Vec::new();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            seen.push((entry.name.to_string(), entry.kind));
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("a.wav".to_string(), EntryKind::File),
                ("sub.wav".to_string(), EntryKind::Directory)
            ]
        );
    }

    #[tokio::test]
    async fn open_dir_on_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.wav"), b"x").unwrap();
        let mut storage = mounted(&tmp);
        let err: StorageError = storage
            .open_dir("/storage/a.wav")
            .await
            .err()
            .unwrap()
            .into();
        assert_eq!(err, StorageError::NotADirectory);
    }

    #[test]
    fn missing_root_without_format_fails_to_mount() {
        let tmp = TempDir::new().unwrap();
        let config = MountConfig {
            format_if_mount_failed: false,
            ..MountConfig::default()
        };
        let err = LocalFileStorage::mount(tmp.path().join("absent"), config)
            .err()
            .unwrap();
        assert_eq!(err, MountError::MountFailed);
    }

    #[test]
    fn missing_root_with_format_is_created() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("fresh");
        let storage = LocalFileStorage::mount(&root, MountConfig::default()).unwrap();
        assert!(root.is_dir());
        assert_eq!(storage.info().unwrap().used_bytes, 0);
    }

    #[test]
    fn invalid_config_is_rejected_before_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("never");
        let config = MountConfig {
            max_files: 0,
            ..MountConfig::default()
        };
        let err = LocalFileStorage::mount(&root, config).err().unwrap();
        assert!(matches!(err, MountError::Config(_)));
        assert!(!root.exists());
    }

    #[test]
    fn info_reports_capacity_and_usage() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.wav"), [0u8; 100]).unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested").join("b.wav"), [0u8; 28]).unwrap();
        let storage = mounted(&tmp).with_capacity(4096);
        assert_eq!(
            storage.info().unwrap(),
            VolumeInfo {
                total_bytes: 4096,
                used_bytes: 128
            }
        );
    }

    #[tokio::test]
    async fn unmount_is_idempotent_and_blocks_access() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.wav"), b"x").unwrap();
        let mut storage = mounted(&tmp);

        storage.unmount();
        storage.unmount();

        assert!(!storage.is_mounted());
        assert_eq!(storage.info().unwrap_err(), StorageError::NotMounted);
        let err: StorageError = storage
            .open_file("/storage/a.wav")
            .await
            .err()
            .unwrap()
            .into();
        assert_eq!(err, StorageError::NotMounted);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn non_utf8_names_are_left_out_of_the_listing() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(OsStr::from_bytes(b"bad\xff.txt")), b"x").unwrap();
        fs::write(tmp.path().join("good.wav"), b"x").unwrap();
        let mut storage = mounted(&tmp);

        let mut dir = storage.open_dir("/storage").await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            names.push(entry.name.to_string());
        }
        assert_eq!(names, ["good.wav"]);
    }
}
