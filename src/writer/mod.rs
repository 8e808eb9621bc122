mod jpeg;

pub use jpeg::JpegWriter;

use crate::capture::{FormatProfile, FrameBuffer};
use chrono::{Datelike, Timelike};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a frame into a file
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to encode frame: {0}")]
    EncodeFailure(String),

    #[error("Failed to create {}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Trait for still-image destinations
pub trait ImageWriter {
    /// Encode one frame laid out per `profile` and persist it, returning the path written
    fn write(&mut self, frame: &FrameBuffer, profile: &FormatProfile)
        -> Result<PathBuf, WriteError>;
}

/// File name for a capture taken at `time`: `Y-M-D-H-Min-S-<slot>.jpg`, fields unpadded
pub fn capture_file_name<T>(time: &T, slot: &str) -> String
where
    T: Datelike + Timelike,
{
    format!(
        "{}-{}-{}-{}-{}-{}-{}.jpg",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second(),
        slot
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_capture_file_name_unpadded() {
        let time = NaiveDate::from_ymd_opt(2015, 3, 7)
            .and_then(|d| d.and_hms_opt(9, 5, 2))
            .unwrap();
        assert_eq!(capture_file_name(&time, "A"), "2015-3-7-9-5-2-A.jpg");
    }

    #[test]
    fn test_capture_file_name_two_digit_fields() {
        let time = NaiveDate::from_ymd_opt(2024, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 58))
            .unwrap();
        assert_eq!(capture_file_name(&time, "A"), "2024-12-31-23-59-58-A.jpg");
    }
}
