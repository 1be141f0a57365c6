//! Environment-sourced configuration for the sync service.
//!
//! All process-wide settings are read once at startup into an immutable
//! [`SyncConfig`] and threaded through constructors; nothing in the crate
//! reads the environment after construction, so tests can build arbitrary
//! configurations directly.
//!
//! Validation failures here are the only fatal errors in the system: a
//! brightness range with `min >= max`, malformed numbers, or an unknown
//! timezone refuse startup. Everything downstream degrades and retries.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info};

use crate::contract::{SlideshowKind, SlideshowSettings, UPLOADED_CATEGORY};
use crate::fleet::parse_device_list;

/// Timeout for opening a device session.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for an individual device RPC once connected.
pub const API_TIMEOUT: Duration = Duration::from_secs(10);
/// Spacing between sequential uploads, to avoid overwhelming the device.
pub const UPLOAD_DELAY: Duration = Duration::from_secs(1);
/// Spacing between the tracked and unknown deletion batches.
pub const DELETE_DELAY: Duration = Duration::from_millis(500);
/// Attempts per file before an upload is deferred to the next cycle.
pub const UPLOAD_ATTEMPTS: u32 = 3;
/// Backoff between upload attempts for the same file.
pub const UPLOAD_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {variable}: {reason}")]
    Invalid {
        variable: &'static str,
        value: String,
        reason: String,
    },
    #[error("BRIGHTNESS_MIN ({min}) must be strictly below BRIGHTNESS_MAX ({max})")]
    BrightnessRange { min: u8, max: u8 },
    #[error("solar brightness requires {0} to be set")]
    MissingLocation(&'static str),
}

/// Location and range inputs for the solar brightness model.
#[derive(Debug, Clone)]
pub struct SolarConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Tz,
    pub brightness_min: u8,
    pub brightness_max: u8,
}

impl SolarConfig {
    /// Reads `LOCATION_LATITUDE`, `LOCATION_LONGITUDE`, `LOCATION_TIMEZONE`
    /// and the brightness range. Used both by the sync path (when solar
    /// brightness is enabled) and by the solar preview, which needs a
    /// location without the rest of the sync configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        let latitude = require_parsed("LOCATION_LATITUDE")?;
        let longitude = require_parsed("LOCATION_LONGITUDE")?;
        let tz_raw =
            env::var("LOCATION_TIMEZONE").map_err(|_| ConfigError::MissingLocation("LOCATION_TIMEZONE"))?;
        let timezone = tz_raw.parse::<Tz>().map_err(|e| ConfigError::Invalid {
            variable: "LOCATION_TIMEZONE",
            value: tz_raw.clone(),
            reason: e.to_string(),
        })?;
        let brightness_min = parsed_or("BRIGHTNESS_MIN", 2u8)?;
        let brightness_max = parsed_or("BRIGHTNESS_MAX", 10u8)?;
        if brightness_min >= brightness_max {
            return Err(ConfigError::BrightnessRange {
                min: brightness_min,
                max: brightness_max,
            });
        }
        Ok(SolarConfig {
            latitude,
            longitude,
            timezone,
            brightness_min,
            brightness_max,
        })
    }
}

/// How the per-cycle brightness value is derived.
#[derive(Debug, Clone)]
pub enum BrightnessPolicy {
    /// Never touch device brightness.
    Off,
    /// Apply a fixed level every cycle.
    Manual(u8),
    /// Derive the level from current sun elevation every cycle.
    Solar(SolarConfig),
}

/// Whether slideshow settings are read back from the device or synthesized
/// from configuration before reapplying them post-mutation.
#[derive(Debug, Clone)]
pub enum SlideshowPolicy {
    /// Snapshot whatever the device reports before mutating.
    PreserveDevice,
    /// Ignore the device state and reapply these settings.
    Override(SlideshowSettings),
}

/// Immutable process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root of the files to mirror.
    pub artwork_dir: PathBuf,
    /// Ordered device addresses, duplicates and blanks stripped.
    pub devices: Vec<String>,
    pub sync_interval: Duration,
    /// Matte/frame style passed through on upload, `None` for no matte.
    pub matte: Option<String>,
    /// Directory holding per-device pairing tokens and mapping documents.
    pub token_dir: PathBuf,
    pub slideshow: SlideshowPolicy,
    pub brightness: BrightnessPolicy,
    /// When set, content on the device that the mapping does not track is
    /// deleted instead of left in place.
    pub remove_unknown: bool,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let artwork_dir = PathBuf::from(env::var("ARTWORK_DIR").unwrap_or_else(|_| "/artwork".into()));
        let devices = parse_device_list(&env::var("TV_IPS").unwrap_or_default());
        let interval_minutes: u64 = parsed_or("SYNC_INTERVAL_MINUTES", 5)?;
        let matte = match env::var("MATTE_STYLE") {
            Ok(style) if !style.is_empty() && style != "none" => Some(style),
            _ => None,
        };
        let token_dir = PathBuf::from(env::var("TOKEN_DIR").unwrap_or_else(|_| "/tokens".into()));

        let slideshow = slideshow_policy_from_env()?;
        let brightness = brightness_policy_from_env()?;
        let remove_unknown = flag_or("REMOVE_UNKNOWN_IMAGES", false);

        Ok(SyncConfig {
            artwork_dir,
            devices,
            sync_interval: Duration::from_secs(interval_minutes * 60),
            matte,
            token_dir,
            slideshow,
            brightness,
            remove_unknown,
        })
    }

    pub fn trace_loaded(&self) {
        info!(
            artwork_dir = %self.artwork_dir.display(),
            devices = self.devices.len(),
            interval_secs = self.sync_interval.as_secs(),
            remove_unknown = self.remove_unknown,
            "Loaded sync configuration"
        );
        debug!(?self, "Sync configuration (full debug)");
    }
}

fn slideshow_policy_from_env() -> Result<SlideshowPolicy, ConfigError> {
    let enabled = env::var("SLIDESHOW_ENABLED").ok();
    let interval = env::var("SLIDESHOW_INTERVAL_MINUTES").ok();
    let mode = env::var("SLIDESHOW_MODE").ok();
    if enabled.is_none() && interval.is_none() && mode.is_none() {
        return Ok(SlideshowPolicy::PreserveDevice);
    }
    // Any slideshow variable present switches to override mode; the unset
    // ones take defaults.
    if let Some(raw) = &enabled {
        if !parse_flag(raw) {
            return Ok(SlideshowPolicy::PreserveDevice);
        }
    }
    let minutes: u32 = match interval {
        Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            variable: "SLIDESHOW_INTERVAL_MINUTES",
            value: raw.clone(),
            reason: e.to_string(),
        })?,
        None => 3,
    };
    let kind = match mode.as_deref() {
        Some(raw) => slideshow_kind_from_config(raw)?,
        None => SlideshowKind::Shuffle,
    };
    Ok(SlideshowPolicy::Override(SlideshowSettings {
        value: minutes.to_string(),
        kind,
        category: UPLOADED_CATEGORY.to_string(),
    }))
}

/// Strict parse of the user-facing `SLIDESHOW_MODE` spellings. The device
/// wire values are accepted too, but an unrecognized string is fatal rather
/// than silently falling back to shuffle.
fn slideshow_kind_from_config(raw: &str) -> Result<SlideshowKind, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "shuffle" | "shuffleslideshow" => Ok(SlideshowKind::Shuffle),
        "sequential" | "slideshow" => Ok(SlideshowKind::Sequential),
        _ => Err(ConfigError::Invalid {
            variable: "SLIDESHOW_MODE",
            value: raw.to_string(),
            reason: "expected \"shuffle\" or \"sequential\"".to_string(),
        }),
    }
}

fn brightness_policy_from_env() -> Result<BrightnessPolicy, ConfigError> {
    if flag_or("SOLAR_BRIGHTNESS_ENABLED", false) {
        return Ok(BrightnessPolicy::Solar(SolarConfig::from_env()?));
    }
    match env::var("BRIGHTNESS") {
        Ok(raw) => {
            let level = raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                variable: "BRIGHTNESS",
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            Ok(BrightnessPolicy::Manual(level))
        }
        Err(_) => Ok(BrightnessPolicy::Off),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn flag_or(variable: &str, default: bool) -> bool {
    env::var(variable).map(|raw| parse_flag(&raw)).unwrap_or(default)
}

fn parsed_or<T>(variable: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(variable) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            variable,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn require_parsed<T>(variable: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(variable).map_err(|_| ConfigError::MissingLocation(variable))?;
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        variable,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flag_accepts_common_truthy_spellings() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }

    #[test]
    fn slideshow_mode_accepts_both_user_spellings() {
        assert_eq!(
            slideshow_kind_from_config("sequential").unwrap(),
            SlideshowKind::Sequential
        );
        assert_eq!(
            slideshow_kind_from_config("Shuffle").unwrap(),
            SlideshowKind::Shuffle
        );
    }

    #[test]
    fn slideshow_mode_accepts_the_wire_spellings() {
        assert_eq!(
            slideshow_kind_from_config("slideshow").unwrap(),
            SlideshowKind::Sequential
        );
        assert_eq!(
            slideshow_kind_from_config("shuffleslideshow").unwrap(),
            SlideshowKind::Shuffle
        );
    }

    #[test]
    fn slideshow_mode_rejects_unrecognized_values_instead_of_defaulting() {
        let err = slideshow_kind_from_config("sequentail").unwrap_err();
        assert!(err.to_string().contains("SLIDESHOW_MODE"));
    }

    #[test]
    fn brightness_range_must_be_strict() {
        let err = ConfigError::BrightnessRange { min: 5, max: 5 };
        assert!(err.to_string().contains("strictly below"));
    }
}
