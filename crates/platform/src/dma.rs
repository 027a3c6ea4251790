//! DMA descriptor ring accounting
//!
//! The I2S peripheral drains a ring of `count` descriptors, each holding
//! `descriptor_bytes` of PCM. Software fills descriptors at the write pointer;
//! hardware completes them at the wire rate. [`DescriptorRing`] tracks how
//! much of the ring is queued so a backend can tell how many bytes a write may
//! accept right now, and counts underruns, which the peripheral fills with
//! silence when auto-clear is on.
//!
//! Pure bookkeeping: no buffer memory lives here, so the same type serves the
//! emulator backend and host-side tests.

use crate::audio_config::TransportConfig;

/// Fill level of the DMA descriptor ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptorRing {
    count: usize,
    descriptor_bytes: usize,
    queued: usize,
    underruns: u32,
}

impl DescriptorRing {
    /// Empty ring of `count` descriptors of `descriptor_bytes` each.
    pub const fn new(count: usize, descriptor_bytes: usize) -> Self {
        Self {
            count,
            descriptor_bytes,
            queued: 0,
            underruns: 0,
        }
    }

    /// Ring geometry for a transport configuration.
    pub fn for_config(config: &TransportConfig) -> Self {
        Self::new(
            usize::from(config.channel.dma_desc_num),
            config.descriptor_bytes(),
        )
    }

    /// Total bytes the ring holds.
    pub fn capacity(&self) -> usize {
        self.count.saturating_mul(self.descriptor_bytes)
    }

    /// Bytes waiting to go out.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Bytes a write can accept without waiting.
    pub fn free(&self) -> usize {
        self.capacity().saturating_sub(self.queued)
    }

    /// Bytes per descriptor.
    pub fn descriptor_bytes(&self) -> usize {
        self.descriptor_bytes
    }

    /// Descriptors that went out as silence because nothing was queued.
    pub fn underruns(&self) -> u32 {
        self.underruns
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queued == 0
    }

    /// Queue up to `len` bytes and return how many fit.
    pub fn push(&mut self, len: usize) -> usize {
        let accepted = len.min(self.free());
        self.queued = self.queued.saturating_add(accepted);
        accepted
    }

    /// Hardware finished `descriptors` descriptors.
    ///
    /// A descriptor that completes with less than a full descriptor queued
    /// drains what was there and counts as an underrun.
    pub fn complete(&mut self, descriptors: usize) {
        for _ in 0..descriptors {
            if self.queued < self.descriptor_bytes {
                self.underruns = self.underruns.saturating_add(1);
            }
            self.queued = self.queued.saturating_sub(self.descriptor_bytes);
        }
    }

    /// Drop everything queued (channel disabled).
    pub fn clear(&mut self) {
        self.queued = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_ring_holds_eight_descriptors() {
        let ring = DescriptorRing::for_config(&TransportConfig::default());
        assert_eq!(ring.descriptor_bytes(), 4096);
        assert_eq!(ring.capacity(), 32_768);
        assert_eq!(ring.free(), 32_768);
        assert!(ring.is_empty());
    }

    #[test]
    fn push_accepts_only_free_space() {
        let mut ring = DescriptorRing::new(2, 8);
        assert_eq!(ring.push(10), 10);
        assert_eq!(ring.push(10), 6);
        assert_eq!(ring.free(), 0);
        assert_eq!(ring.push(1), 0);
    }

    #[test]
    fn completion_frees_whole_descriptors() {
        let mut ring = DescriptorRing::new(4, 8);
        ring.push(32);
        ring.complete(1);
        assert_eq!(ring.queued(), 24);
        assert_eq!(ring.free(), 8);
        assert_eq!(ring.underruns(), 0);
    }

    #[test]
    fn completing_short_descriptor_counts_underrun() {
        let mut ring = DescriptorRing::new(4, 8);
        ring.push(12);
        ring.complete(3);
        assert!(ring.is_empty());
        assert_eq!(ring.underruns(), 2);
    }

    #[test]
    fn clear_drops_queued_bytes() {
        let mut ring = DescriptorRing::new(2, 8);
        ring.push(16);
        ring.clear();
        assert_eq!(ring.free(), 16);
    }
}
