//! Captured screen frames

use chrono::{DateTime, Local};
use image::RgbImage;

/// One captured screen image and the time it was taken.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self::with_timestamp(image, Local::now())
    }

    pub fn with_timestamp(image: RgbImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A zero-sized frame carries nothing to search.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// `YYYYMMDD_HHMMSS` stamp used in output file names
    pub fn timestamp_label(&self) -> String {
        self.captured_at.format("%Y%m%d_%H%M%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_label() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 42).unwrap();
        let frame = Frame::with_timestamp(RgbImage::new(4, 4), at);
        assert_eq!(frame.timestamp_label(), "20240307_090542");
    }

    #[test]
    fn test_empty_frame() {
        assert!(Frame::new(RgbImage::new(0, 10)).is_empty());
        assert!(!Frame::new(RgbImage::new(1, 1)).is_empty());
    }
}
