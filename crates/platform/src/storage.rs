//! Storage abstraction for the mounted flash namespace
//!
//! [`Storage`] is the VFS view the scanner and player read through; [`Volume`]
//! is the mount lifecycle the application driver owns. Both are implemented by
//! [`crate::storage_local::LocalFileStorage`] on the host and by
//! [`crate::mocks::MockStorage`] in tests.

use thiserror_no_std::Error;

use crate::config::ConfigError;

/// Longest entry name a directory listing can report.
pub const MAX_NAME_LEN: usize = 255;

/// Bounded entry name.
pub type EntryName = heapless::String<MAX_NAME_LEN>;

/// Storage operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No entry at the path.
    #[error("not found")]
    NotFound,
    /// The path names a file where a directory was expected.
    #[error("not a directory")]
    NotADirectory,
    /// The mount's open-file limit is reached.
    #[error("too many open files")]
    TooManyOpenFiles,
    /// An entry name does not fit [`MAX_NAME_LEN`].
    #[error("name too long")]
    NameTooLong,
    /// The volume has been unmounted.
    #[error("volume not mounted")]
    NotMounted,
    /// Any other read/seek/listing fault.
    #[error("I/O error")]
    Io,
}

/// Mount failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MountError {
    /// The mount configuration was rejected.
    #[error("{0}")]
    Config(ConfigError),
    /// The partition could not be mounted and formatting was not allowed.
    #[error("failed to mount partition")]
    MountFailed,
    /// Formatting after a failed mount also failed.
    #[error("failed to format partition")]
    FormatFailed,
}

impl From<ConfigError> for MountError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Parameters for mounting the flash partition into the VFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MountConfig {
    /// VFS prefix every path starts with, e.g. `/storage`.
    pub base_path: &'static str,
    /// Partition label in the flash partition table.
    pub partition_label: &'static str,
    /// Simultaneously open files the mount allows.
    pub max_files: u8,
    /// Format the partition when the first mount attempt fails.
    pub format_if_mount_failed: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            base_path: "/storage",
            partition_label: "storage",
            max_files: 5,
            format_if_mount_failed: true,
        }
    }
}

impl MountConfig {
    /// Check the invariants the mount relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first violated field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition_label.is_empty() {
            return Err(ConfigError::new("partition_label", "must be non-empty"));
        }
        if !self.base_path.starts_with('/') {
            return Err(ConfigError::new("base_path", "must be absolute"));
        }
        if self.base_path.len() < 2 || self.base_path.ends_with('/') {
            return Err(ConfigError::new("base_path", "must name a directory below /"));
        }
        if self.max_files == 0 {
            return Err(ConfigError::new("max_files", "must be at least 1"));
        }
        Ok(())
    }
}

/// Partition usage as reported by the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VolumeInfo {
    /// Partition capacity.
    pub total_bytes: u64,
    /// Bytes in use.
    pub used_bytes: u64,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Sub-directory.
    Directory,
}

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name without any path prefix.
    pub name: EntryName,
    /// File or directory.
    pub kind: EntryKind,
}

impl DirEntry {
    /// Build an entry, rejecting names longer than [`MAX_NAME_LEN`].
    ///
    /// # Errors
    ///
    /// [`StorageError::NameTooLong`].
    pub fn new(name: &str, kind: EntryKind) -> Result<Self, StorageError> {
        let mut bounded = EntryName::new();
        bounded
            .push_str(name)
            .map_err(|_| StorageError::NameTooLong)?;
        Ok(Self {
            name: bounded,
            kind,
        })
    }

    /// `true` for regular files.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Storage trait for file system access
pub trait Storage {
    /// Error type
    type Error: Into<StorageError> + core::fmt::Debug;
    /// File type
    type File: File<Error = Self::Error>;
    /// Directory listing type
    type Dir: Directory<Error = Self::Error>;

    /// Open file for reading
    fn open_file(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;

    /// Open a directory for listing
    fn open_dir(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Self::Dir, Self::Error>>;
}

/// File trait for reading files. Dropping the handle closes the file.
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from current position; `Ok(0)` means end of file.
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Seek to position
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>>;

    /// Get file size
    fn size(&self) -> u64;
}

/// Directory listing handle. Entry order is whatever the filesystem yields.
pub trait Directory {
    /// Error type
    type Error: core::fmt::Debug;

    /// Next entry, `None` once the listing is exhausted.
    fn next_entry(
        &mut self,
    ) -> impl core::future::Future<Output = Result<Option<DirEntry>, Self::Error>>;
}

/// Mount lifecycle of a flash partition.
pub trait Volume {
    /// Capacity and usage of the mounted partition.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotMounted`] after [`Volume::unmount`].
    fn info(&self) -> Result<VolumeInfo, StorageError>;

    /// Unmount the partition. A second call is a no-op.
    fn unmount(&mut self);

    /// `true` until [`Volume::unmount`].
    fn is_mounted(&self) -> bool;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn default_mount_config_is_valid() {
        let c = MountConfig::default();
        assert_eq!(c.base_path, "/storage");
        assert_eq!(c.partition_label, "storage");
        assert_eq!(c.max_files, 5);
        assert!(c.format_if_mount_failed);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn mount_config_rejects_empty_label() {
        let c = MountConfig {
            partition_label: "",
            ..MountConfig::default()
        };
        assert_eq!(c.validate().unwrap_err().field, "partition_label");
    }

    #[test]
    fn mount_config_rejects_relative_base_path() {
        for base_path in ["", "storage", "/", "/storage/"] {
            let c = MountConfig {
                base_path,
                ..MountConfig::default()
            };
            assert_eq!(c.validate().unwrap_err().field, "base_path", "{base_path:?}");
        }
    }

    #[test]
    fn mount_config_rejects_zero_max_files() {
        let c = MountConfig {
            max_files: 0,
            ..MountConfig::default()
        };
        assert_eq!(c.validate().unwrap_err().field, "max_files");
    }

    #[test]
    fn dir_entry_rejects_overlong_name() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            DirEntry::new(&long, EntryKind::File).unwrap_err(),
            StorageError::NameTooLong
        );
        assert!(DirEntry::new("a.wav", EntryKind::File).unwrap().is_file());
    }
}
