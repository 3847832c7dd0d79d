//! Image loading and conversion helpers on top of the `image` crate

use crate::Result;
use anyhow::Context;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use std::path::Path;

/// Image utility functions
pub struct ImageUtils;

impl ImageUtils {
    /// Decode an image file into 8-bit RGB, dropping any alpha channel
    pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
        let img = image::open(&path)
            .with_context(|| format!("Failed to open image: {:?}", path.as_ref()))?;

        Ok(img.to_rgb8())
    }

    /// Save an RGB image; the format follows the file extension
    pub fn save_rgb<P: AsRef<Path>>(img: &RgbImage, path: P) -> Result<()> {
        img.save(&path)
            .with_context(|| format!("Failed to save image: {:?}", path.as_ref()))
    }

    /// Luma conversion used by grayscale matchers
    pub fn to_grayscale(img: &RgbImage) -> GrayImage {
        image::imageops::grayscale(img)
    }

    /// Convert a captured RGBA buffer to RGB
    pub fn rgba_to_rgb(rgba_image: RgbaImage) -> RgbImage {
        DynamicImage::ImageRgba8(rgba_image).to_rgb8()
    }
}
