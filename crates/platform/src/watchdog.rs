//! Task watchdog abstraction
//!
//! The playback task subscribes once at startup, feeds the watchdog between
//! files (the scanner pause) and after each file, and unsubscribes on the way
//! out. A single file can take longer than the timeout on a slow card, so the
//! hardware timeout must cover the longest file plus one pause.

/// Task watchdog timeout on the reference board.
pub const WATCHDOG_TIMEOUT_MS: u32 = 8_000;

/// Liveness signal for the calling task.
pub trait Watchdog {
    /// Reset the countdown.
    fn feed(&mut self);

    /// Stop watching the calling task. Default: nothing to release.
    fn unsubscribe(&mut self) {}
}

/// Watchdog for targets without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatchdog;

impl Watchdog for NoopWatchdog {
    fn feed(&mut self) {}
}

impl<W: Watchdog + ?Sized> Watchdog for &mut W {
    fn feed(&mut self) {
        (**self).feed();
    }

    fn unsubscribe(&mut self) {
        (**self).unsubscribe();
    }
}
