//! Application configuration.
//!
//! [`AppConfig::default`] is the reference board: `/storage` on the `storage`
//! partition, 44.1 kHz stereo 16-bit I2S on pins 15/16/17, a 500 ms pause
//! between files, abort on the first failed file, reject rate mismatches.
//!
//! Host builds can overlay environment variables with [`AppConfig::from_env`]:
//!
//! | Variable                  | Field                     | Values |
//! |---------------------------|---------------------------|--------|
//! | `PLAYER_SAMPLE_RATE`      | channel clock             | 8000..=192000 |
//! | `PLAYER_ON_ERROR`         | [`FailurePolicy`]         | `abort`, `skip` |
//! | `PLAYER_RATE_POLICY`      | [`RatePolicy`]            | `reject`, `reconfigure` |
//! | `PLAYER_PAUSE_MS`         | inter-file pause          | ms, `0` disables |
//! | `PLAYER_WRITE_TIMEOUT_MS` | bound on one DMA wait     | ms, `0` waits forever |
//!
//! `MUSIC_PATH` (the host directory mounted as the volume) is read separately
//! by [`music_path_from_env`].

use library::ScanConfig;
use platform::{ConfigError, MountConfig, TransportConfig};

/// What to do when one file fails to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailurePolicy {
    /// Stop the whole run at the first failed file.
    #[default]
    Abort,
    /// Log the failure, count it and continue with the next file.
    Skip,
}

/// What to do with a file whose sample rate differs from the channel's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RatePolicy {
    /// Fail the file with `TransportError::RateMismatch`.
    #[default]
    Reject,
    /// Re-clock the channel to the file's rate before streaming.
    Reconfigure,
}

/// Everything the application driver needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppConfig {
    /// Flash partition mount.
    pub mount: MountConfig,
    /// I2S channel.
    pub transport: TransportConfig,
    /// Directory scan.
    pub scan: ScanConfig,
    /// Per-file failure handling.
    pub on_error: FailurePolicy,
    /// Sample-rate mismatch handling.
    pub rate_policy: RatePolicy,
}

impl AppConfig {
    /// Validate every section and their agreement.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mount.validate()?;
        self.transport.validate()?;
        self.scan.validate()?;
        let under_mount = self
            .scan
            .root
            .strip_prefix(self.mount.base_path)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if !under_mount {
            return Err(ConfigError::new("scan.root", "must be inside mount.base_path"));
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
mod env {
    use super::{AppConfig, FailurePolicy, RatePolicy};
    use embassy_time::Duration;
    use platform::{ConfigError, SampleRateHz};

    /// Default emulator volume when `MUSIC_PATH` is unset.
    pub const DEFAULT_MUSIC_PATH: &str = "music";

    impl AppConfig {
        /// Defaults overlaid with the `PLAYER_*` environment variables.
        ///
        /// # Errors
        ///
        /// [`ConfigError`] for an unparsable or out-of-range value.
        pub fn from_env() -> Result<Self, ConfigError> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Defaults overlaid with whatever `lookup` returns for each variable.
        ///
        /// # Errors
        ///
        /// [`ConfigError`] for an unparsable or out-of-range value.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
            let mut config = Self::default();

            if let Some(raw) = lookup("PLAYER_SAMPLE_RATE") {
                let hz = parse_u32(&raw, "PLAYER_SAMPLE_RATE")?;
                config.transport.std_mode.sample_rate = SampleRateHz::new(hz).map_err(|_| {
                    ConfigError::new("PLAYER_SAMPLE_RATE", "must be within 8000..=192000")
                })?;
            }
            if let Some(raw) = lookup("PLAYER_ON_ERROR") {
                config.on_error = match raw.trim() {
                    "abort" => FailurePolicy::Abort,
                    "skip" => FailurePolicy::Skip,
                    _ => return Err(ConfigError::new("PLAYER_ON_ERROR", "must be abort or skip")),
                };
            }
            if let Some(raw) = lookup("PLAYER_RATE_POLICY") {
                config.rate_policy = match raw.trim() {
                    "reject" => RatePolicy::Reject,
                    "reconfigure" => RatePolicy::Reconfigure,
                    _ => {
                        return Err(ConfigError::new(
                            "PLAYER_RATE_POLICY",
                            "must be reject or reconfigure",
                        ))
                    }
                };
            }
            if let Some(raw) = lookup("PLAYER_PAUSE_MS") {
                let ms = parse_u32(&raw, "PLAYER_PAUSE_MS")?;
                config.scan.pause = Duration::from_millis(u64::from(ms));
            }
            if let Some(raw) = lookup("PLAYER_WRITE_TIMEOUT_MS") {
                let ms = parse_u32(&raw, "PLAYER_WRITE_TIMEOUT_MS")?;
                config.transport.write_timeout =
                    (ms != 0).then_some(Duration::from_millis(u64::from(ms)));
            }

            config.validate()?;
            Ok(config)
        }
    }

    /// Host directory to mount, from `MUSIC_PATH`.
    pub fn music_path_from_env() -> std::path::PathBuf {
        std::env::var_os("MUSIC_PATH")
            .map_or_else(|| DEFAULT_MUSIC_PATH.into(), std::path::PathBuf::from)
    }

    fn parse_u32(raw: &str, field: &'static str) -> Result<u32, ConfigError> {
        raw.trim()
            .parse()
            .map_err(|_| ConfigError::new(field, "must be an unsigned integer"))
    }
}

#[cfg(feature = "std")]
pub use env::{music_path_from_env, DEFAULT_MUSIC_PATH};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_board() {
        let c = AppConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.scan.root, c.mount.base_path);
        assert_eq!(c.on_error, FailurePolicy::Abort);
        assert_eq!(c.rate_policy, RatePolicy::Reject);
        assert_eq!(c.transport.std_mode.sample_rate.get(), 44_100);
    }

    #[test]
    fn scan_root_must_live_under_the_mount() {
        for root in ["/sdcard", "/storagex", "/"] {
            let c = AppConfig {
                scan: ScanConfig {
                    root,
                    ..ScanConfig::default()
                },
                ..AppConfig::default()
            };
            assert_eq!(c.validate().unwrap_err().field, "scan.root", "{root}");
        }
        let nested = AppConfig {
            scan: ScanConfig {
                root: "/storage/albums",
                ..ScanConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(nested.validate().is_ok());
    }

    #[cfg(feature = "std")]
    mod env {
        use super::super::*;
        use embassy_time::Duration;
        use std::collections::HashMap;

        fn lookup(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
            let map: HashMap<String, String> = vars
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect();
            AppConfig::from_lookup(|key| map.get(key).cloned())
        }

        #[test]
        fn empty_environment_is_default() {
            assert_eq!(lookup(&[]).unwrap(), AppConfig::default());
        }

        #[test]
        fn overlays_every_variable() {
            let c = lookup(&[
                ("PLAYER_SAMPLE_RATE", "48000"),
                ("PLAYER_ON_ERROR", "skip"),
                ("PLAYER_RATE_POLICY", "reconfigure"),
                ("PLAYER_PAUSE_MS", "0"),
                ("PLAYER_WRITE_TIMEOUT_MS", "250"),
            ])
            .unwrap();
            assert_eq!(c.transport.std_mode.sample_rate.get(), 48_000);
            assert_eq!(c.on_error, FailurePolicy::Skip);
            assert_eq!(c.rate_policy, RatePolicy::Reconfigure);
            assert_eq!(c.scan.pause, Duration::from_millis(0));
            assert_eq!(c.transport.write_timeout, Some(Duration::from_millis(250)));
        }

        #[test]
        fn zero_write_timeout_waits_forever() {
            let c = lookup(&[("PLAYER_WRITE_TIMEOUT_MS", "0")]).unwrap();
            assert_eq!(c.transport.write_timeout, None);
        }

        #[test]
        fn bad_values_name_their_variable() {
            let cases = [
                ("PLAYER_SAMPLE_RATE", "fast"),
                ("PLAYER_SAMPLE_RATE", "4000"),
                ("PLAYER_ON_ERROR", "retry"),
                ("PLAYER_RATE_POLICY", "resample"),
                ("PLAYER_PAUSE_MS", "-1"),
                ("PLAYER_WRITE_TIMEOUT_MS", "soon"),
            ];
            for (key, value) in cases {
                assert_eq!(lookup(&[(key, value)]).unwrap_err().field, key, "{key}={value}");
            }
        }
    }
}
