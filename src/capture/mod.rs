mod nokhwa_source;

pub use nokhwa_source::NokhwaSource;

use std::fmt;
use thiserror::Error;

/// Errors raised by a frame source
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No capture device named {0:?}")]
    DeviceNotFound(String),

    #[error("No native format matches {0}")]
    FormatUnavailable(FormatProfile),

    #[error("No capture device has been activated")]
    NotActivated,

    #[error("No capture format has been negotiated")]
    NotNegotiated,

    #[error("Capture backend error: {0}")]
    Backend(String),
}

/// Pixel layouts a profile can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelEncoding {
    /// Packed 8-bit red, green, blue
    Rgb24,
    /// 24-bit RGB stored blue first, as Media Foundation delivers RGB24
    Bgr24,
}

impl PixelEncoding {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelEncoding::Rgb24 | PixelEncoding::Bgr24 => 3,
        }
    }

    /// Same pixel format apart from byte order
    pub fn is_equivalent(self, other: PixelEncoding) -> bool {
        self.bytes_per_pixel() == other.bytes_per_pixel()
    }
}

/// Frame rate as a rational number of frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// A capture configuration: encoding, resolution and frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatProfile {
    pub encoding: PixelEncoding,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
}

impl FormatProfile {
    /// The only profile the agent captures with: RGB24, 640x480 at 30/1 fps
    pub const fn standard() -> Self {
        Self {
            encoding: PixelEncoding::Rgb24,
            width: 640,
            height: 480,
            frame_rate: FrameRate::new(30, 1),
        }
    }

    /// Bytes per row of a dense raster in this profile
    pub fn stride(&self) -> usize {
        (self.width * self.encoding.bytes_per_pixel()) as usize
    }

    /// Bytes in one full frame
    pub fn frame_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// Field-by-field equality up to byte order; frame rates are compared as written, not reduced
    pub fn matches(&self, other: &FormatProfile) -> bool {
        self.encoding.is_equivalent(other.encoding)
            && self.width == other.width
            && self.height == other.height
            && self.frame_rate == other.frame_rate
    }
}

impl fmt::Display for FormatProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}x{} @ {}/{} fps",
            self.encoding,
            self.width,
            self.height,
            self.frame_rate.numerator,
            self.frame_rate.denominator
        )
    }
}

/// A capture-capable device as reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Friendly name advertised by the device
    pub name: String,
    /// Backend-specific handle used to activate the device
    pub handle: String,
}

/// One captured frame. A zero-length buffer means no frame was ready.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Trait for camera frame sources
///
/// Implementations wrap one platform capture API. The controller only ever
/// talks to this trait, so tests can substitute scripted sources.
pub trait FrameSource {
    /// Enumerate devices and activate the first whose name equals `name` exactly
    fn discover(&mut self, name: &str) -> Result<DeviceDescriptor, CaptureError>;

    /// Commit the first native format, in device order, matching `profile`
    ///
    /// Returns the committed native profile, whose byte order may differ from
    /// the request. On failure the device stays activated with no format
    /// committed.
    fn negotiate(&mut self, profile: &FormatProfile) -> Result<FormatProfile, CaptureError>;

    /// Blocking read of one frame
    ///
    /// `Ok(None)` and empty buffers both mean "not ready yet"; callers retry.
    fn pull(&mut self) -> Result<Option<FrameBuffer>, CaptureError>;

    /// Drop any buffered or in-flight frame so the next pull starts fresh
    fn reset(&mut self) -> Result<(), CaptureError>;

    /// Release the device. Safe to call more than once.
    fn close(&mut self) {}
}

/// Index of the first device whose name is exactly `name`
pub fn select_device<'a, I>(names: I, name: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().position(|candidate| candidate == name)
}

/// Index of the first native format equal to `wanted`
pub fn select_format(native: &[FormatProfile], wanted: &FormatProfile) -> Option<usize> {
    native.iter().position(|format| format.matches(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(width: u32, height: u32, num: u32, den: u32) -> FormatProfile {
        FormatProfile {
            encoding: PixelEncoding::Rgb24,
            width,
            height,
            frame_rate: FrameRate::new(num, den),
        }
    }

    #[test]
    fn test_select_device_exact_match() {
        let names = ["Integrated Camera", "TestCam", "TestCam"];
        assert_eq!(select_device(names, "TestCam"), Some(1));
    }

    #[test]
    fn test_select_device_is_case_sensitive() {
        let names = ["testcam", "TestCam 2", " TestCam"];
        assert_eq!(select_device(names, "TestCam"), None);
    }

    #[test]
    fn test_select_device_empty_enumeration() {
        assert_eq!(select_device(std::iter::empty(), "TestCam"), None);
    }

    #[test]
    fn test_select_format_first_match_wins() {
        let native = [
            profile(1280, 720, 30, 1),
            profile(640, 480, 15, 1),
            profile(640, 480, 30, 1),
            profile(640, 480, 30, 1),
        ];
        assert_eq!(select_format(&native, &FormatProfile::standard()), Some(2));
    }

    #[test]
    fn test_select_format_requires_all_fields() {
        let native = [
            profile(640, 480, 60, 2),
            profile(640, 481, 30, 1),
            profile(639, 480, 30, 1),
            profile(640, 480, 30, 2),
        ];
        assert_eq!(select_format(&native, &FormatProfile::standard()), None);
    }

    #[test]
    fn test_select_format_accepts_bgr_order() {
        let mut bgr = FormatProfile::standard();
        bgr.encoding = PixelEncoding::Bgr24;
        let native = [profile(320, 240, 30, 1), bgr];

        let position = select_format(&native, &FormatProfile::standard());

        assert_eq!(position, Some(1));
        assert_eq!(native[1].encoding, PixelEncoding::Bgr24);
    }

    #[test]
    fn test_standard_profile_geometry() {
        let standard = FormatProfile::standard();
        assert_eq!(standard.stride(), 1920);
        assert_eq!(standard.frame_len(), 1920 * 480);
    }

    #[test]
    fn test_frame_buffer_empty() {
        assert!(FrameBuffer::default().is_empty());
        assert_eq!(FrameBuffer::new(vec![0; 4000]).len(), 4000);
    }
}
