//! Writing scan results to disk

use ab_glyph::{FontRef, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::info;
use monscan_cv::utils::ImageUtils;
use monscan_cv::{BBox, DetectionResult, Frame};
use std::fs;
use std::path::{Path, PathBuf};

/// Receives every scanned frame together with what was found on it.
pub trait Persistence {
    /// Store the frame; returns the path of the written image.
    fn save(&mut self, frame: &Frame, result: &DetectionResult) -> Result<PathBuf>;
}

impl<T: Persistence + ?Sized> Persistence for Box<T> {
    fn save(&mut self, frame: &Frame, result: &DetectionResult) -> Result<PathBuf> {
        (**self).save(frame, result)
    }
}

static LABEL_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

/// Saves timestamped PNG screenshots, annotated when something was detected.
///
/// Annotated screenshots get a JSON file of the same name listing every
/// detection with its category label and the per-template summaries.
pub struct ScreenshotWriter {
    output_dir: PathBuf,
    font: FontRef<'static>,
    line_thickness: u32,
    dot_radius: i32,
    label_size: f32,
}

impl ScreenshotWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let font = FontRef::try_from_slice(LABEL_FONT).context("Failed to parse bundled label font")?;
        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            font,
            line_thickness: 2,
            dot_radius: 3,
            label_size: 16.0,
        })
    }

    /// Draw every detection in its category color: an outline, a center dot
    /// and the category name just above the box (kept below the top edge).
    pub fn annotate(&self, image: &RgbImage, detections: &[BBox]) -> RgbImage {
        let mut output = image.clone();

        for bbox in detections {
            let color = Rgb(bbox.color.to_array());

            for inset in 0..self.line_thickness as i32 {
                let (w, h) = (bbox.width - 2 * inset, bbox.height - 2 * inset);
                if w <= 0 || h <= 0 {
                    break;
                }
                let rect = Rect::at(bbox.x + inset, bbox.y + inset).of_size(w as u32, h as u32);
                draw_hollow_rect_mut(&mut output, rect, color);
            }

            draw_filled_circle_mut(&mut output, bbox.center(), self.dot_radius, color);

            if !bbox.label.is_empty() {
                let baseline = (bbox.y - 5).max(15);
                let top = baseline - self.label_size as i32;
                let scale = PxScale::from(self.label_size);
                draw_text_mut(&mut output, color, bbox.x, top, scale, &self.font, &bbox.label);
            }
        }

        output
    }

    fn file_stem(frame: &Frame, result: &DetectionResult) -> String {
        let timestamp = frame.timestamp_label();
        if result.is_empty() {
            format!("screenshot_{}_no_detections", timestamp)
        } else {
            format!("detection_{}_{}monsters", timestamp, result.len())
        }
    }
}

impl Persistence for ScreenshotWriter {
    fn save(&mut self, frame: &Frame, result: &DetectionResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output folder: {:?}", self.output_dir))?;

        let stem = Self::file_stem(frame, result);
        let path = self.output_dir.join(format!("{}.png", stem));

        if result.is_empty() {
            ImageUtils::save_rgb(frame.image(), &path)?;
            info!("Screenshot saved: {} (No detections)", path.display());
        } else {
            let annotated = self.annotate(frame.image(), result.detections.as_slice());
            ImageUtils::save_rgb(&annotated, &path)?;
            result.export_json(&self.output_dir.join(format!("{}.json", stem)))?;
            info!(
                "Screenshot saved: {} (Found {} monsters)",
                path.display(),
                result.len()
            );
        }

        Ok(path)
    }
}
