//! Type system enforcement tests for the platform newtypes and config types.
//! These reject bad clock and mount configuration before any driver call.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

// ── SampleRateHz ─────────────────────────────────────────────────────────────

#[test]
fn sample_rate_hz_accepts_boundaries() {
    use platform::audio_types::SampleRateHz;
    assert_eq!(SampleRateHz::new(8_000).unwrap().get(), 8_000);
    assert_eq!(SampleRateHz::new(192_000).unwrap().get(), 192_000);
}

#[test]
fn sample_rate_hz_rejects_outside_range() {
    use platform::audio_types::SampleRateHz;
    let err = SampleRateHz::new(7_999).unwrap_err();
    assert_eq!(err.value, 7_999);
    assert_eq!(err.min, 8_000);
    assert_eq!(err.max, 192_000);
    assert!(SampleRateHz::new(192_001).is_err());
    assert!(SampleRateHz::new(0).is_err());
}

#[test]
fn sample_rate_hz_default_is_cd_rate() {
    use platform::audio_types::SampleRateHz;
    assert_eq!(SampleRateHz::default(), SampleRateHz::CD);
    assert_eq!(SampleRateHz::CD.get(), 44_100);
}

#[test]
fn sample_rate_hz_try_from_matches_new() {
    use platform::audio_types::SampleRateHz;
    assert_eq!(SampleRateHz::try_from(48_000), SampleRateHz::new(48_000));
    assert!(SampleRateHz::try_from(1).is_err());
}

#[test]
fn sample_rate_hz_display() {
    use platform::audio_types::SampleRateHz;
    assert_eq!(SampleRateHz::CD.to_string(), "44100 Hz");
}

#[test]
fn out_of_range_error_display() {
    use platform::audio_types::SampleRateHz;
    let err = SampleRateHz::new(500).unwrap_err();
    assert_eq!(err.to_string(), "500 is outside 8000..=192000");
}

#[test]
fn sample_rate_hz_is_transparent() {
    use platform::audio_types::SampleRateHz;
    assert_eq!(core::mem::size_of::<SampleRateHz>(), 4);
}

// ── Error display ────────────────────────────────────────────────────────────

#[test]
fn transport_error_messages_name_the_failing_step() {
    use platform::{DriverFault, TransportError};
    assert_eq!(
        TransportError::Allocate(DriverFault::NoMem).to_string(),
        "failed to create I2S channel: out of memory"
    );
    assert_eq!(
        TransportError::ModeInit(DriverFault::InvalidArg).to_string(),
        "failed to init I2S channel: invalid argument"
    );
    assert_eq!(
        TransportError::Timeout { written: 12 }.to_string(),
        "I2S write timed out after 12 bytes"
    );
}

#[test]
fn mount_error_wraps_config_error() {
    use platform::{ConfigError, MountError};
    let err = MountError::from(ConfigError::new("max_files", "must be at least 1"));
    assert_eq!(
        err.to_string(),
        "invalid configuration: max_files must be at least 1"
    );
}
