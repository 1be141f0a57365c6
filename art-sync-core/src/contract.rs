//! # contract: capability interface for art-mode displays
//!
//! This module defines the traits ([`ArtDevice`], [`DeviceConnector`]) and
//! supporting value objects through which the rest of the crate talks to a
//! display. The concrete vendor client lives in the binary crate; tests use
//! generated mocks.
//!
//! ## Interface & Extensibility
//! - Implement [`ArtDevice`] for a live device session; one instance maps to
//!   one open connection for the duration of one reconciliation pass.
//! - Implement [`DeviceConnector`] to produce sessions with a bounded
//!   connect timeout.
//! - All methods are async, returning results with boxed error types, so
//!   implementations are free to fail on transport, timeout, or malformed
//!   vendor payloads without constraining the caller's error taxonomy.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; consumers generate
//!   deterministic mocks for unit/integration tests via the
//!   `test-export-mocks` feature.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Uniform boxed error for all device capability methods.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Vendor category identifier of the uploaded-photos slot ("My Photos").
pub const UPLOADED_CATEGORY: &str = "MY-C0002";

/// Wire-level image type accepted by the upload channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Classify by file extension; anything that is not PNG uploads as JPEG,
    /// matching the supported-extension filter in [`crate::artwork`].
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".png") {
            ImageKind::Png
        } else {
            ImageKind::Jpeg
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }
}

/// Auto-advance presentation mode of the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideshowKind {
    Shuffle,
    Sequential,
}

impl SlideshowKind {
    /// Lenient decode of a device-reported type string; anything
    /// unrecognized reads as shuffle. Configuration input is parsed
    /// strictly in [`crate::config`].
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "slideshow" => SlideshowKind::Sequential,
            _ => SlideshowKind::Shuffle,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            SlideshowKind::Shuffle => "shuffleslideshow",
            SlideshowKind::Sequential => "slideshow",
        }
    }

    pub fn is_shuffle(&self) -> bool {
        matches!(self, SlideshowKind::Shuffle)
    }
}

/// Snapshot of the display's auto-advance settings.
///
/// Captured before mutating the photo set and reapplied afterwards, because
/// devices pause or reset the slideshow when the active content set changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideshowSettings {
    /// Advance interval in minutes as the device reports it, or `"off"`.
    pub value: String,
    pub kind: SlideshowKind,
    /// Category the slideshow draws from, normally [`UPLOADED_CATEGORY`].
    pub category: String,
}

impl SlideshowSettings {
    pub fn enabled(&self) -> bool {
        !self.value.is_empty() && self.value != "off"
    }
}

/// Power and presentation-mode state of a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerAndMode {
    pub powered_on: bool,
    /// `None` when the art-mode state could not be determined; callers fail
    /// open and treat the device as available.
    pub art_mode: Option<bool>,
}

impl PowerAndMode {
    /// A device is eligible for mutation only while powered on and passively
    /// displaying art; an undeterminable mode counts as available.
    pub fn available_for_sync(&self) -> bool {
        self.powered_on && self.art_mode.unwrap_or(true)
    }
}

/// One image upload: raw bytes plus the presentation hints passed through to
/// the device.
#[derive(Debug)]
pub struct UploadRequest<'a> {
    pub filename: &'a str,
    pub data: &'a [u8],
    pub file_type: ImageKind,
    /// Matte/frame style, `None` to upload without a matte.
    pub matte: Option<&'a str>,
}

/// One live session against an art-mode display.
///
/// Every method may fail independently; the reconciler decides per call
/// whether a failure is retried, deferred to the next cycle, or merely
/// logged.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArtDevice: Send + Sync {
    /// Network address this session was opened against.
    fn address(&self) -> &str;

    /// Content identifiers currently present in the uploaded-photos slot.
    async fn list_inventory(&self) -> Result<Vec<String>, DeviceError>;

    /// Upload one image, returning the device-assigned content identifier.
    async fn upload<'a>(&self, req: UploadRequest<'a>) -> Result<String, DeviceError>;

    /// Delete a batch of content identifiers in one request.
    async fn delete_batch(&self, content_ids: &[String]) -> Result<(), DeviceError>;

    /// Make a content id the visible image, optionally switching display to it.
    async fn select_content(&self, content_id: &str, show: bool) -> Result<(), DeviceError>;

    /// Current slideshow settings; `None` when the slideshow is off.
    async fn get_slideshow(&self) -> Result<Option<SlideshowSettings>, DeviceError>;

    async fn set_slideshow(&self, settings: &SlideshowSettings) -> Result<(), DeviceError>;

    async fn set_brightness(&self, level: u8) -> Result<(), DeviceError>;

    /// Power and art-mode state used for the availability filter.
    async fn power_and_mode(&self) -> Result<PowerAndMode, DeviceError>;

    /// Close the session. Infallible by contract: implementations swallow and
    /// log close errors, since cleanup runs on every path.
    async fn close(&self);
}

/// Produces device sessions. Implementations apply the connection timeout;
/// a connect failure excludes the device for the current cycle only.
#[cfg_attr(
    any(test, feature = "test-export-mocks"),
    automock(type Device = MockArtDevice;)
)]
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    type Device: ArtDevice + 'static;

    async fn connect(&self, address: &str) -> Result<Self::Device, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_kind_is_case_insensitive_on_extension() {
        assert_eq!(ImageKind::from_filename("sunset.PNG"), ImageKind::Png);
        assert_eq!(ImageKind::from_filename("sunset.jpeg"), ImageKind::Jpeg);
        assert_eq!(ImageKind::from_filename("sunset.jpg"), ImageKind::Jpeg);
    }

    #[test]
    fn undeterminable_art_mode_fails_open() {
        let state = PowerAndMode {
            powered_on: true,
            art_mode: None,
        };
        assert!(state.available_for_sync());

        let off = PowerAndMode {
            powered_on: false,
            art_mode: None,
        };
        assert!(!off.available_for_sync());

        let foreground = PowerAndMode {
            powered_on: true,
            art_mode: Some(false),
        };
        assert!(!foreground.available_for_sync());
    }

    #[test]
    fn slideshow_off_is_not_enabled() {
        let settings = SlideshowSettings {
            value: "off".to_string(),
            kind: SlideshowKind::Shuffle,
            category: UPLOADED_CATEGORY.to_string(),
        };
        assert!(!settings.enabled());
    }
}
