use super::{
    select_device, select_format, CaptureError, DeviceDescriptor, FormatProfile, FrameBuffer,
    FrameRate, FrameSource, PixelEncoding,
};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::{Camera, NokhwaError};

/// Frame source backed by the platform's native capture API through nokhwa
pub struct NokhwaSource {
    camera: Option<Camera>,
    committed: Option<FormatProfile>,
}

impl NokhwaSource {
    pub fn new() -> Self {
        Self {
            camera: None,
            committed: None,
        }
    }

    fn camera_mut(&mut self) -> Result<&mut Camera, CaptureError> {
        self.camera.as_mut().ok_or(CaptureError::NotActivated)
    }

    fn require_committed(&self) -> Result<(), CaptureError> {
        if self.committed.is_none() {
            return Err(CaptureError::NotNegotiated);
        }
        Ok(())
    }
}

impl Default for NokhwaSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a native nokhwa format into a profile, if it has an encoding we support
fn native_profile(format: &CameraFormat) -> Option<FormatProfile> {
    let encoding = match format.format() {
        FrameFormat::RAWRGB => PixelEncoding::Rgb24,
        FrameFormat::RAWBGR => PixelEncoding::Bgr24,
        _ => return None,
    };

    // nokhwa reports integral frame rates only
    Some(FormatProfile {
        encoding,
        width: format.resolution().width(),
        height: format.resolution().height(),
        frame_rate: FrameRate::new(format.frame_rate(), 1),
    })
}

fn backend(err: NokhwaError) -> CaptureError {
    CaptureError::Backend(err.to_string())
}

impl FrameSource for NokhwaSource {
    fn discover(&mut self, name: &str) -> Result<DeviceDescriptor, CaptureError> {
        let devices: Vec<CameraInfo> = nokhwa::query(ApiBackend::Auto).map_err(backend)?;
        tracing::debug!("Enumerated {} capture devices", devices.len());
        for device in &devices {
            tracing::debug!("  {:?} at {}", device.human_name(), device.index());
        }

        let names: Vec<String> = devices.iter().map(|d| d.human_name()).collect();
        let position = select_device(names.iter().map(String::as_str), name)
            .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?;
        let device = &devices[position];

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let camera = Camera::new(device.index().clone(), requested).map_err(backend)?;

        tracing::info!("Activated capture device {:?}", device.human_name());

        self.camera = Some(camera);
        self.committed = None;

        Ok(DeviceDescriptor {
            name: device.human_name(),
            handle: device.index().to_string(),
        })
    }

    fn negotiate(&mut self, profile: &FormatProfile) -> Result<FormatProfile, CaptureError> {
        let camera = self.camera_mut()?;

        let native: Vec<(CameraFormat, FormatProfile)> = camera
            .compatible_camera_formats()
            .map_err(backend)?
            .into_iter()
            .filter_map(|format| native_profile(&format).map(|profile| (format, profile)))
            .collect();
        tracing::debug!("{} native RGB formats available", native.len());

        let profiles: Vec<FormatProfile> = native.iter().map(|(_, profile)| *profile).collect();
        let position = select_format(&profiles, profile)
            .ok_or(CaptureError::FormatUnavailable(*profile))?;
        let (chosen, committed) = native[position];

        camera
            .set_camera_requset(RequestedFormat::new::<RgbFormat>(
                RequestedFormatType::Exact(chosen),
            ))
            .map_err(backend)?;
        camera.open_stream().map_err(backend)?;

        tracing::info!("Committed capture format {}", committed);
        self.committed = Some(committed);
        Ok(committed)
    }

    fn pull(&mut self) -> Result<Option<FrameBuffer>, CaptureError> {
        self.require_committed()?;
        let camera = self.camera_mut()?;

        match camera.frame() {
            Ok(buffer) => Ok(Some(FrameBuffer::new(buffer.buffer().to_vec()))),
            // Frame timeouts surface here while the stream warms up
            Err(NokhwaError::ReadFrameError(reason)) => {
                tracing::debug!("No frame ready: {}", reason);
                Ok(None)
            }
            Err(err) => Err(backend(err)),
        }
    }

    fn reset(&mut self) -> Result<(), CaptureError> {
        self.require_committed()?;
        let camera = self.camera_mut()?;

        // Reopening the stream discards whatever the driver had queued
        camera.stop_stream().map_err(backend)?;
        camera.open_stream().map_err(backend)?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if camera.is_stream_open() {
                if let Err(err) = camera.stop_stream() {
                    tracing::warn!("Failed to stop capture stream: {}", err);
                }
            }
            tracing::info!("Capture device released");
        }
        self.committed = None;
    }
}

impl Drop for NokhwaSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nokhwa::utils::Resolution;

    #[test]
    fn test_native_profile_bgr_mode() {
        let format = CameraFormat::new(Resolution::new(640, 480), FrameFormat::RAWBGR, 30);

        let profile = native_profile(&format).unwrap();

        assert_eq!(profile.encoding, PixelEncoding::Bgr24);
        assert!(profile.matches(&FormatProfile::standard()));
    }

    #[test]
    fn test_native_profile_rgb_mode() {
        let format = CameraFormat::new(Resolution::new(640, 480), FrameFormat::RAWRGB, 30);

        assert_eq!(native_profile(&format), Some(FormatProfile::standard()));
    }

    #[test]
    fn test_native_profile_skips_compressed_modes() {
        let format = CameraFormat::new(Resolution::new(640, 480), FrameFormat::MJPEG, 30);

        assert_eq!(native_profile(&format), None);
    }
}
