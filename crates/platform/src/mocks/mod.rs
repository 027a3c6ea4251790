//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests, plus a WAV byte-stream builder.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::arithmetic_side_effects)] // test doubles: sizes are small and known

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::audio::{DriverFault, I2sDriver};
use crate::audio_config::{ChannelConfig, StdModeConfig};
use crate::audio_types::SampleRateHz;
use crate::storage::{
    DirEntry, Directory, EntryKind, File, Storage, StorageError, Volume, VolumeInfo,
};
use crate::watchdog::Watchdog;

// ── MockI2s ──────────────────────────────────────────────────────────────────

/// One recorded [`I2sDriver`] lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2sCall {
    /// `new_channel`
    NewChannel,
    /// `init_std_mode`
    InitStdMode,
    /// `reconfig_std_clock` with the requested rate
    ReconfigClock(u32),
    /// `enable`
    Enable,
    /// `disable`
    Disable,
    /// `delete_channel`
    DeleteChannel,
}

/// Lifecycle step a [`MockI2s`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2sStep {
    /// `new_channel`
    NewChannel,
    /// `init_std_mode`
    InitStdMode,
    /// `reconfig_std_clock`
    ReconfigClock,
    /// `enable`
    Enable,
    /// `disable`
    Disable,
    /// `delete_channel`
    DeleteChannel,
}

#[derive(Debug, Default)]
struct I2sState {
    calls: Vec<I2sCall>,
    captured: Vec<u8>,
    write_calls: usize,
    allocated: bool,
    enabled: bool,
    channel: Option<ChannelConfig>,
    std_mode: Option<StdModeConfig>,
}

/// Recording I2S driver.
///
/// Every lifecycle call is logged; every accepted byte is captured. A
/// [`I2sProbe`] taken before the driver is moved into a transport keeps
/// observing it, including after a failed `create` drops the driver.
#[derive(Debug, Default)]
pub struct MockI2s {
    state: Rc<RefCell<I2sState>>,
    fail_at: Option<(I2sStep, DriverFault)>,
    accept_at_most: Option<usize>,
    fail_write_after: Option<(usize, DriverFault)>,
    stall_after: Option<usize>,
}

/// Read-only view of a [`MockI2s`]'s recorded state.
#[derive(Debug, Clone)]
pub struct I2sProbe {
    state: Rc<RefCell<I2sState>>,
}

impl I2sProbe {
    /// Lifecycle calls in order.
    pub fn calls(&self) -> Vec<I2sCall> {
        self.state.borrow().calls.clone()
    }

    /// Every byte accepted by `write`, in order.
    pub fn captured(&self) -> Vec<u8> {
        self.state.borrow().captured.clone()
    }

    /// `true` while the channel is allocated.
    pub fn is_allocated(&self) -> bool {
        self.state.borrow().allocated
    }
}

impl MockI2s {
    /// Driver that accepts everything immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `step` with `fault`.
    #[must_use]
    pub fn fail_at(mut self, step: I2sStep, fault: DriverFault) -> Self {
        self.fail_at = Some((step, fault));
        self
    }

    /// Accept at most `n` bytes per `write` call.
    #[must_use]
    pub fn accept_at_most(mut self, n: usize) -> Self {
        self.accept_at_most = Some(n);
        self
    }

    /// Fail `write` with `fault` once `bytes` have been captured.
    #[must_use]
    pub fn fail_write_after(mut self, bytes: usize, fault: DriverFault) -> Self {
        self.fail_write_after = Some((bytes, fault));
        self
    }

    /// Never complete a `write` once `bytes` have been captured.
    #[must_use]
    pub fn stall_after(mut self, bytes: usize) -> Self {
        self.stall_after = Some(bytes);
        self
    }

    /// Observer sharing this driver's state.
    pub fn probe(&self) -> I2sProbe {
        I2sProbe {
            state: Rc::clone(&self.state),
        }
    }

    /// Lifecycle calls in order.
    pub fn calls(&self) -> Vec<I2sCall> {
        self.state.borrow().calls.clone()
    }

    /// Every byte accepted by `write`, in order.
    pub fn captured(&self) -> Vec<u8> {
        self.state.borrow().captured.clone()
    }

    /// Number of `write` calls, including partial ones.
    pub fn write_calls(&self) -> usize {
        self.state.borrow().write_calls
    }

    /// Standard-mode configuration last applied.
    pub fn std_mode(&self) -> Option<StdModeConfig> {
        self.state.borrow().std_mode
    }

    /// Channel configuration the channel was allocated with.
    pub fn channel(&self) -> Option<ChannelConfig> {
        self.state.borrow().channel
    }

    fn record(&mut self, call: I2sCall, step: I2sStep) -> Result<(), DriverFault> {
        self.state.borrow_mut().calls.push(call);
        match self.fail_at {
            Some((failing, fault)) if failing == step => Err(fault),
            _ => Ok(()),
        }
    }
}

impl I2sDriver for MockI2s {
    fn new_channel(&mut self, config: &ChannelConfig) -> Result<(), DriverFault> {
        self.record(I2sCall::NewChannel, I2sStep::NewChannel)?;
        let mut state = self.state.borrow_mut();
        state.allocated = true;
        state.channel = Some(*config);
        Ok(())
    }

    fn init_std_mode(&mut self, config: &StdModeConfig) -> Result<(), DriverFault> {
        self.record(I2sCall::InitStdMode, I2sStep::InitStdMode)?;
        self.state.borrow_mut().std_mode = Some(*config);
        Ok(())
    }

    fn reconfig_std_clock(&mut self, sample_rate: SampleRateHz) -> Result<(), DriverFault> {
        self.record(
            I2sCall::ReconfigClock(sample_rate.get()),
            I2sStep::ReconfigClock,
        )?;
        let mut state = self.state.borrow_mut();
        if state.enabled {
            return Err(DriverFault::InvalidState);
        }
        if let Some(mode) = state.std_mode.as_mut() {
            mode.sample_rate = sample_rate;
        }
        Ok(())
    }

    fn enable(&mut self) -> Result<(), DriverFault> {
        self.record(I2sCall::Enable, I2sStep::Enable)?;
        self.state.borrow_mut().enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DriverFault> {
        self.record(I2sCall::Disable, I2sStep::Disable)?;
        self.state.borrow_mut().enabled = false;
        Ok(())
    }

    fn delete_channel(&mut self) -> Result<(), DriverFault> {
        self.record(I2sCall::DeleteChannel, I2sStep::DeleteChannel)?;
        self.state.borrow_mut().allocated = false;
        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<usize, DriverFault> {
        embassy_futures::yield_now().await;

        let captured = {
            let mut state = self.state.borrow_mut();
            state.write_calls += 1;
            if !state.enabled {
                return Err(DriverFault::InvalidState);
            }
            state.captured.len()
        };
        if let Some((after, fault)) = self.fail_write_after {
            if captured >= after {
                return Err(fault);
            }
        }
        if self.stall_after.is_some_and(|after| captured >= after) {
            core::future::pending::<()>().await;
        }

        let n = self
            .accept_at_most
            .map_or(bytes.len(), |max| bytes.len().min(max));
        let accepted = bytes.get(..n).unwrap_or(bytes);
        self.state.borrow_mut().captured.extend_from_slice(accepted);
        Ok(accepted.len())
    }
}

// ── MockStorage ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Node {
    path: String,
    kind: EntryKind,
    data: Rc<[u8]>,
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", path.get(1..).unwrap_or("")),
        Some(i) => (path.get(..i).unwrap_or(""), path.get(i + 1..).unwrap_or("")),
        None => ("", path),
    }
}

/// In-memory mounted volume.
///
/// Directory listings follow insertion order. `/storage` exists from the start.
#[derive(Debug)]
pub struct MockStorage {
    nodes: Vec<Node>,
    capacity: u64,
    max_read: Option<usize>,
    read_faults: Vec<(String, u64)>,
    list_fault_after: Option<usize>,
    open_files: Rc<Cell<usize>>,
    opened: Vec<String>,
    mounted: bool,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorage {
    /// Empty volume with a `/storage` directory.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                path: "/storage".to_string(),
                kind: EntryKind::Directory,
                data: Rc::from(Vec::new()),
            }],
            capacity: 1024 * 1024,
            max_read: None,
            read_faults: Vec::new(),
            list_fault_after: None,
            open_files: Rc::new(Cell::new(0)),
            opened: Vec::new(),
            mounted: true,
        }
    }

    /// Add a file at an absolute path.
    #[must_use]
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, data);
        self
    }

    /// Add a directory at an absolute path.
    #[must_use]
    pub fn with_dir(mut self, path: &str) -> Self {
        self.nodes.push(Node {
            path: path.to_string(),
            kind: EntryKind::Directory,
            data: Rc::from(Vec::new()),
        });
        self
    }

    /// Add a file at an absolute path.
    pub fn add_file(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        self.nodes.push(Node {
            path: path.to_string(),
            kind: EntryKind::File,
            data: Rc::from(data.into()),
        });
    }

    /// Return at most `n` bytes per `read`.
    #[must_use]
    pub fn max_read(mut self, n: usize) -> Self {
        self.max_read = Some(n);
        self
    }

    /// Fail reads of `path` once the position reaches `offset`.
    #[must_use]
    pub fn fail_reads_at(mut self, path: &str, offset: u64) -> Self {
        self.read_faults.push((path.to_string(), offset));
        self
    }

    /// Fail directory listings after `entries` entries.
    #[must_use]
    pub fn fail_listing_after(mut self, entries: usize) -> Self {
        self.list_fault_after = Some(entries);
        self
    }

    /// Files currently open.
    pub fn open_files(&self) -> usize {
        self.open_files.get()
    }

    /// Every path passed to `open_file`, in order.
    pub fn opened(&self) -> &[String] {
        &self.opened
    }

    fn find(&self, path: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.path == path)
    }

    fn check_mounted(&self) -> Result<(), StorageError> {
        if self.mounted {
            Ok(())
        } else {
            Err(StorageError::NotMounted)
        }
    }
}

/// Open in-memory file.
#[derive(Debug)]
pub struct MockFile {
    data: Rc<[u8]>,
    pos: u64,
    max_read: Option<usize>,
    fault_at: Option<u64>,
    open_files: Rc<Cell<usize>>,
}

impl Drop for MockFile {
    fn drop(&mut self) {
        self.open_files.set(self.open_files.get().saturating_sub(1));
    }
}

impl File for MockFile {
    type Error = StorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.fault_at.is_some_and(|at| self.pos >= at) {
            return Err(StorageError::Io);
        }
        let start = usize::try_from(self.pos).map_err(|_| StorageError::Io)?;
        let rest = self.data.get(start..).unwrap_or(&[]);
        let mut n = buf.len().min(rest.len());
        if let Some(max) = self.max_read {
            n = n.min(max);
        }
        if let Some(at) = self.fault_at {
            let until_fault = usize::try_from(at.saturating_sub(self.pos)).unwrap_or(usize::MAX);
            n = n.min(until_fault);
        }
        let (Some(dst), Some(src)) = (buf.get_mut(..n), rest.get(..n)) else {
            return Err(StorageError::Io);
        };
        dst.copy_from_slice(src);
        self.pos += n as u64;
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = pos.min(self.size());
        Ok(self.pos)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Snapshot listing of one in-memory directory.
#[derive(Debug)]
pub struct MockDir {
    entries: std::vec::IntoIter<DirEntry>,
    remaining_before_fault: Option<usize>,
}

impl Directory for MockDir {
    type Error = StorageError;

    async fn next_entry(&mut self) -> Result<Option<DirEntry>, Self::Error> {
        if let Some(left) = self.remaining_before_fault.as_mut() {
            if *left == 0 {
                return Err(StorageError::Io);
            }
            *left -= 1;
        }
        Ok(self.entries.next())
    }
}

impl Storage for MockStorage {
    type Error = StorageError;
    type File = MockFile;
    type Dir = MockDir;

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        self.check_mounted()?;
        self.opened.push(path.to_string());
        let node = self.find(path).ok_or(StorageError::NotFound)?;
        if node.kind != EntryKind::File {
            return Err(StorageError::NotFound);
        }
        let data = Rc::clone(&node.data);
        let fault_at = self
            .read_faults
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, at)| *at);
        self.open_files.set(self.open_files.get() + 1);
        Ok(MockFile {
            data,
            pos: 0,
            max_read: self.max_read,
            fault_at,
            open_files: Rc::clone(&self.open_files),
        })
    }

    async fn open_dir(&mut self, path: &str) -> Result<Self::Dir, Self::Error> {
        self.check_mounted()?;
        match self.find(path) {
            None => return Err(StorageError::NotFound),
            Some(node) if node.kind == EntryKind::File => return Err(StorageError::NotADirectory),
            Some(_) => {}
        }
        let entries = self
            .nodes
            .iter()
            .filter_map(|n| {
                let (parent, name) = split_parent(&n.path);
                (parent == path).then(|| DirEntry::new(name, n.kind))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MockDir {
            entries: entries.into_iter(),
            remaining_before_fault: self.list_fault_after,
        })
    }
}

impl Volume for MockStorage {
    fn info(&self) -> Result<VolumeInfo, StorageError> {
        self.check_mounted()?;
        let used_bytes = self.nodes.iter().map(|n| n.data.len() as u64).sum();
        Ok(VolumeInfo {
            total_bytes: self.capacity,
            used_bytes,
        })
    }

    fn unmount(&mut self) {
        self.mounted = false;
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }
}

// ── CountingWatchdog ─────────────────────────────────────────────────────────

/// Watchdog that counts feeds.
#[derive(Debug, Default)]
pub struct CountingWatchdog {
    feeds: usize,
    unsubscribed: bool,
}

impl CountingWatchdog {
    /// Fresh watchdog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `feed` calls.
    pub fn feeds(&self) -> usize {
        self.feeds
    }

    /// `true` after `unsubscribe`.
    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribed
    }
}

impl Watchdog for CountingWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }

    fn unsubscribe(&mut self) {
        self.unsubscribed = true;
    }
}

// ── WavFixture ───────────────────────────────────────────────────────────────

/// Deterministic PCM test pattern of `len` bytes.
pub fn pcm_ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Builder for RIFF/WAVE byte streams, valid or deliberately broken.
#[derive(Debug, Clone)]
pub struct WavFixture {
    format_code: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    fmt_extension: Vec<u8>,
    leading_chunks: Vec<([u8; 4], Vec<u8>)>,
    middle_chunks: Vec<([u8; 4], Vec<u8>)>,
    declared_data_len: Option<u32>,
    omit_data: bool,
    pcm: Vec<u8>,
}

impl WavFixture {
    /// 16-bit linear PCM with the given layout and payload.
    pub fn pcm16(channels: u16, sample_rate: u32, pcm: Vec<u8>) -> Self {
        Self {
            format_code: 1,
            channels,
            sample_rate,
            bits_per_sample: 16,
            fmt_extension: Vec::new(),
            leading_chunks: Vec::new(),
            middle_chunks: Vec::new(),
            declared_data_len: None,
            omit_data: false,
            pcm,
        }
    }

    /// Override the `fmt ` format code.
    #[must_use]
    pub fn format_code(mut self, code: u16) -> Self {
        self.format_code = code;
        self
    }

    /// Override bits per sample.
    #[must_use]
    pub fn bits_per_sample(mut self, bits: u16) -> Self {
        self.bits_per_sample = bits;
        self
    }

    /// Append bytes after the 16 standard `fmt ` bytes.
    #[must_use]
    pub fn fmt_extension(mut self, bytes: Vec<u8>) -> Self {
        self.fmt_extension = bytes;
        self
    }

    /// Insert a chunk before `fmt `.
    #[must_use]
    pub fn leading_chunk(mut self, tag: [u8; 4], payload: Vec<u8>) -> Self {
        self.leading_chunks.push((tag, payload));
        self
    }

    /// Insert a chunk between `fmt ` and `data`.
    #[must_use]
    pub fn chunk(mut self, tag: [u8; 4], payload: Vec<u8>) -> Self {
        self.middle_chunks.push((tag, payload));
        self
    }

    /// Declare a `data` length different from the payload actually written.
    #[must_use]
    pub fn declared_data_len(mut self, len: u32) -> Self {
        self.declared_data_len = Some(len);
        self
    }

    /// Leave out the `data` chunk entirely.
    #[must_use]
    pub fn without_data(mut self) -> Self {
        self.omit_data = true;
        self
    }

    /// Byte offset of the first PCM byte in [`Self::build`]'s output.
    pub fn data_offset(&self) -> usize {
        let chunks = |list: &[([u8; 4], Vec<u8>)]| {
            list.iter()
                .map(|(_, p)| 8 + p.len() + p.len() % 2)
                .sum::<usize>()
        };
        let fmt_len = 16 + self.fmt_extension.len();
        12 + chunks(&self.leading_chunks)
            + 8
            + fmt_len
            + fmt_len % 2
            + chunks(&self.middle_chunks)
            + 8
    }

    /// Serialize to bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"WAVE");
        for (tag, payload) in &self.leading_chunks {
            push_chunk(&mut body, *tag, payload, None);
        }
        let block_align = self.channels * (self.bits_per_sample / 8);
        let mut fmt = Vec::with_capacity(16 + self.fmt_extension.len());
        fmt.extend_from_slice(&self.format_code.to_le_bytes());
        fmt.extend_from_slice(&self.channels.to_le_bytes());
        fmt.extend_from_slice(&self.sample_rate.to_le_bytes());
        fmt.extend_from_slice(&(self.sample_rate * u32::from(block_align)).to_le_bytes());
        fmt.extend_from_slice(&block_align.to_le_bytes());
        fmt.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        fmt.extend_from_slice(&self.fmt_extension);
        push_chunk(&mut body, *b"fmt ", &fmt, None);
        for (tag, payload) in &self.middle_chunks {
            push_chunk(&mut body, *tag, payload, None);
        }
        if !self.omit_data {
            push_chunk(&mut body, *b"data", &self.pcm, self.declared_data_len);
        }

        let mut out = Vec::with_capacity(body.len() + 8);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }
}

fn push_chunk(out: &mut Vec<u8>, tag: [u8; 4], payload: &[u8], declared: Option<u32>) {
    out.extend_from_slice(&tag);
    let len = declared.unwrap_or(payload.len() as u32);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_storage_lists_in_insertion_order() {
        let mut storage = MockStorage::new()
            .with_file("/storage/b.wav", vec![1])
            .with_dir("/storage/sub")
            .with_file("/storage/a.wav", vec![2])
            .with_file("/storage/sub/c.wav", vec![3]);

        let mut dir = storage.open_dir("/storage").await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            names.push(entry.name.to_string());
        }
        assert_eq!(names, ["b.wav", "sub", "a.wav"]);
    }

    #[tokio::test]
    async fn mock_file_counts_handles_and_bounds_reads() {
        let mut storage = MockStorage::new()
            .with_file("/storage/a.wav", pcm_ramp(10))
            .max_read(3);
        let mut file = storage.open_file("/storage/a.wav").await.unwrap();
        assert_eq!(storage.open_files(), 1);

        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).await.unwrap(), 3);
        drop(file);
        assert_eq!(storage.open_files(), 0);
    }

    #[tokio::test]
    async fn mock_file_fault_delivers_bytes_before_offset() {
        let mut storage = MockStorage::new()
            .with_file("/storage/a.wav", pcm_ramp(10))
            .fail_reads_at("/storage/a.wav", 4);
        let mut file = storage.open_file("/storage/a.wav").await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).await.unwrap(), 4);
        assert_eq!(file.read(&mut buf).await.unwrap_err(), StorageError::Io);
    }

    #[test]
    fn wav_fixture_layout() {
        let fixture = WavFixture::pcm16(2, 44_100, pcm_ramp(5)).chunk(*b"LIST", vec![0; 3]);
        let bytes = fixture.build();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(
            u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize,
            bytes.len() - 8
        );
        assert_eq!(&bytes[8..12], b"WAVE");
        let offset = fixture.data_offset();
        assert_eq!(&bytes[offset - 8..offset - 4], b"data");
        assert_eq!(&bytes[offset..offset + 5], pcm_ramp(5).as_slice());
        // odd payload padded
        assert_eq!(bytes.len(), offset + 6);
    }

    #[test]
    fn mock_i2s_rejects_write_before_enable() {
        let mut driver = MockI2s::new();
        let err = embassy_futures::block_on(driver.write(&[0; 4])).unwrap_err();
        assert_eq!(err, DriverFault::InvalidState);
    }
}
