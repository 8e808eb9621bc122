use super::{capture_file_name, ImageWriter, WriteError};
use crate::capture::{FormatProfile, FrameBuffer, PixelEncoding};
use chrono::{Local, NaiveDateTime};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes each frame as a JPEG named after the local wall-clock time
pub struct JpegWriter {
    output_dir: PathBuf,
    slot: String,
    quality: u8,
}

impl JpegWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P, slot: &str, quality: u8) -> Self {
        let output_dir = output_dir.as_ref().to_path_buf();
        tracing::info!(
            "Writing JPEG captures to {} (slot {}, quality {})",
            output_dir.display(),
            slot,
            quality
        );

        Self {
            output_dir,
            slot: slot.to_string(),
            quality: quality.clamp(1, 100),
        }
    }

    /// Same as [`ImageWriter::write`] with an explicit timestamp for the file name
    pub fn write_at(
        &self,
        frame: &FrameBuffer,
        profile: &FormatProfile,
        time: NaiveDateTime,
    ) -> Result<PathBuf, WriteError> {
        let _span = tracing::debug_span!("encode_jpeg").entered();

        let image = raster_from_frame(frame, profile)?;
        let path = self.output_dir.join(capture_file_name(&time, &self.slot));

        // Encode fully before touching the file so a failure leaves nothing behind
        let mut encoded = Vec::with_capacity(profile.frame_len() / 4);
        JpegEncoder::new_with_quality(&mut encoded, self.quality)
            .encode_image(&image)
            .map_err(|err| WriteError::EncodeFailure(err.to_string()))?;

        // An existing capture from the same second is overwritten
        let written = File::create(&path).and_then(|mut file| file.write_all(&encoded));
        if let Err(source) = written {
            return Err(WriteError::WriteFailure { path, source });
        }

        Ok(path)
    }
}

impl ImageWriter for JpegWriter {
    fn write(
        &mut self,
        frame: &FrameBuffer,
        profile: &FormatProfile,
    ) -> Result<PathBuf, WriteError> {
        self.write_at(frame, profile, Local::now().naive_local())
    }
}

/// Interpret the frame as a dense raster with row stride `width * bytes_per_pixel`
///
/// Bytes past the last full row are ignored.
fn raster_from_frame(frame: &FrameBuffer, profile: &FormatProfile) -> Result<RgbImage, WriteError> {
    let needed = profile.frame_len();
    let bytes = frame.as_bytes();
    if bytes.len() < needed {
        return Err(WriteError::EncodeFailure(format!(
            "frame holds {} bytes, {} needs {}",
            bytes.len(),
            profile,
            needed
        )));
    }

    let mut pixels = bytes[..needed].to_vec();
    match profile.encoding {
        PixelEncoding::Rgb24 => {}
        PixelEncoding::Bgr24 => pixels.chunks_exact_mut(3).for_each(|px| px.swap(0, 2)),
    }

    RgbImage::from_raw(profile.width, profile.height, pixels).ok_or_else(|| {
        WriteError::EncodeFailure(format!("cannot build {}x{} raster", profile.width, profile.height))
    })
}
