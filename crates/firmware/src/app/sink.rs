//! [`AudioSink`] adapter that feeds the player's chunks into the I2S transport.

use platform::{I2sDriver, I2sTransport, TransportError};
use playback::{AudioSink, WavFormat};

use crate::config::RatePolicy;

/// Borrows the transport for the duration of a run.
pub struct TransportSink<'a, D: I2sDriver> {
    transport: &'a mut I2sTransport<D>,
    rate_policy: RatePolicy,
}

impl<'a, D: I2sDriver> TransportSink<'a, D> {
    /// Sink writing into `transport`, handling rate mismatches per `rate_policy`.
    pub fn new(transport: &'a mut I2sTransport<D>, rate_policy: RatePolicy) -> Self {
        Self {
            transport,
            rate_policy,
        }
    }

    /// The transport being written.
    pub fn transport(&self) -> &I2sTransport<D> {
        self.transport
    }
}

impl<D: I2sDriver> AudioSink for TransportSink<'_, D> {
    type Error = TransportError;

    fn bits_per_sample(&self) -> u16 {
        self.transport.bits_per_sample()
    }

    async fn begin(&mut self, format: &WavFormat) -> Result<(), TransportError> {
        let channel = self.transport.sample_rate();
        if format.sample_rate == channel.get() {
            return Ok(());
        }
        let mismatch = TransportError::RateMismatch {
            stream: format.sample_rate,
            channel: channel.get(),
        };
        match self.rate_policy {
            RatePolicy::Reject => {
                platform::error!(
                    "file is {} Hz but the channel runs at {} Hz",
                    format.sample_rate,
                    channel.get()
                );
                Err(mismatch)
            }
            RatePolicy::Reconfigure => {
                let rate = format.sample_rate_hz().map_err(|_| mismatch)?;
                self.transport.set_sample_rate(rate)
            }
        }
    }

    async fn write(&mut self, pcm: &[u8]) -> Result<(), TransportError> {
        self.transport.write(pcm).await.map(|_| ())
    }
}
