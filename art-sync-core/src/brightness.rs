//! Solar brightness model.
//!
//! Maps a sun elevation angle to a display brightness level via the
//! Kasten-Young air-mass approximation:
//!
//! ```text
//! air_mass = 1 / (sin(elev) + 0.50572 * (elev_deg + 6.07995)^-1.6364)
//! relative_irradiance = 0.7 ^ (air_mass ^ 0.678)
//! brightness = min + floor((max - min) * relative_irradiance)
//! ```
//!
//! At or below the horizon the configured minimum applies. The peak at 90°
//! elevation is ~0.7 of the configured range, not the full maximum; that is
//! the atmospheric model's intended shape, not a rounding defect.
//!
//! Sun position itself is delegated to the `sun` crate; only the
//! elevation-to-brightness mapping is ours.

use chrono::{DateTime, Utc};

/// Compute a brightness level from a sun elevation in degrees.
///
/// Total over elevation in [-90, 90]; the range precondition `min < max` is
/// validated at configuration time. The result is always within
/// `[min, max)`.
pub fn brightness_from_elevation(elevation_degrees: f64, min: u8, max: u8) -> u8 {
    if elevation_degrees <= 0.0 {
        return min;
    }
    let air_mass = 1.0
        / (elevation_degrees.to_radians().sin()
            + 0.50572 * (elevation_degrees + 6.07995).powf(-1.6364));
    let relative_irradiance = 0.7f64.powf(air_mass.powf(0.678));
    let span = (max - min) as f64;
    min + (span * relative_irradiance).floor() as u8
}

/// Astronomical sun elevation in degrees for a location at an instant.
pub fn elevation_degrees(latitude: f64, longitude: f64, at: DateTime<Utc>) -> f64 {
    sun::pos(at.timestamp_millis(), latitude, longitude)
        .altitude
        .to_degrees()
}
