//! Template matching through OpenCV's `matchTemplate`

use super::Template;
use crate::Result;
use crate::bbox::{BBox, BBoxCollection};
use crate::error::MatchError;
use crate::frame::Frame;
use crate::traits::TemplateMatchable;
use anyhow::Context;
use image::RgbImage;
use opencv::{
    core::{self, Mat, Vec3b},
    imgproc,
    prelude::*,
};

/// `TM_CCOEFF_NORMED` matcher backed by OpenCV
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvMatcher;

impl OpenCvMatcher {
    pub fn new() -> Self {
        Self
    }

    fn to_mat(image: &RgbImage) -> Result<Mat> {
        let pixels: Vec<Vec3b> = image.pixels().map(|p| Vec3b::from(p.0)).collect();
        let borrowed = Mat::new_rows_cols_with_data(image.height() as i32, image.width() as i32, &pixels)
            .context("Failed to wrap image in an OpenCV Mat")?;
        borrowed.try_clone().context("Failed to copy OpenCV Mat")
    }
}

impl TemplateMatchable for OpenCvMatcher {
    fn match_template(&self, frame: &Frame, template: &Template, threshold: f64) -> Result<BBoxCollection> {
        if template.width() > frame.width() || template.height() > frame.height() {
            return Err(MatchError::TemplateTooLarge {
                template: template.name.clone(),
                template_width: template.width(),
                template_height: template.height(),
                frame_width: frame.width(),
                frame_height: frame.height(),
            }
            .into());
        }

        let image = Self::to_mat(frame.image())?;
        let templ = Self::to_mat(&template.image)?;

        let mut result = Mat::default();
        imgproc::match_template(
            &image,
            &templ,
            &mut result,
            imgproc::TM_CCOEFF_NORMED,
            &core::no_array(),
        )
        .context("Template matching failed")?;

        let (width, height) = (template.width() as i32, template.height() as i32);
        let mut matches = BBoxCollection::new();
        for y in 0..result.rows() {
            for x in 0..result.cols() {
                let score = *result.at_2d::<f32>(y, x)? as f64;
                if score >= threshold {
                    matches.push(BBox::new(x, y, width, height, score));
                }
            }
        }

        Ok(matches)
    }
}
