//! Destination for streamed PCM bytes.

use crate::wav::WavFormat;

/// Accepts one file's PCM payload, chunk by chunk, in file order.
///
/// `write` returns only once the chunk has been accepted in full; that await
/// is where a hardware sink applies backpressure.
pub trait AudioSink {
    /// Status returned when the sink rejects a call.
    type Error;

    /// Sample width the sink plays, in bits. Files of any other width are rejected.
    fn bits_per_sample(&self) -> u16;

    /// Called once per file, after the header is validated and before the first write.
    fn begin(
        &mut self,
        format: &WavFormat,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>> {
        let _ = format;
        core::future::ready(Ok(()))
    }

    /// Forward one chunk of PCM bytes.
    fn write(&mut self, pcm: &[u8]) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}

impl<K: AudioSink> AudioSink for &mut K {
    type Error = K::Error;

    fn bits_per_sample(&self) -> u16 {
        (**self).bits_per_sample()
    }

    fn begin(
        &mut self,
        format: &WavFormat,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>> {
        (**self).begin(format)
    }

    fn write(&mut self, pcm: &[u8]) -> impl core::future::Future<Output = Result<(), Self::Error>> {
        (**self).write(pcm)
    }
}
