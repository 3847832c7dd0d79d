//! Template matching on top of the `image` and `imageproc` crates

use super::{MatchingMethod, Template};
use crate::Result;
use crate::bbox::{BBox, BBoxCollection};
use crate::error::MatchError;
use crate::frame::Frame;
use crate::traits::TemplateMatchable;
use crate::utils::ImageUtils;
use image::{ImageBuffer, Luma, RgbImage};
use imageproc::template_matching::{self, MatchTemplateMethod};

/// Per-location similarity scores; pixel `(x, y)` scores the template placed
/// with its top-left corner at `(x, y)`.
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Windows with less variance than this are treated as flat and score 0.
const FLAT_EPSILON: f64 = 1e-6;

/// CPU template matcher
#[derive(Debug, Clone, Default)]
pub struct ImageMatcher {
    method: MatchingMethod,
}

impl ImageMatcher {
    /// Create new template matcher
    pub fn new(method: MatchingMethod) -> Self {
        Self { method }
    }

    /// Score every placement of `template` inside `image`
    pub fn score_map(&self, image: &RgbImage, template: &Template) -> Result<ScoreMap> {
        check_fits(image, template)?;

        match self.method {
            MatchingMethod::CCoeffNormed => ccoeff_normed(image, &template.image),
            MatchingMethod::CCorrNormed => Ok(template_matching::match_template(
                &ImageUtils::to_grayscale(image),
                &ImageUtils::to_grayscale(&template.image),
                MatchTemplateMethod::CrossCorrelationNormalized,
            )),
        }
    }
}

impl TemplateMatchable for ImageMatcher {
    fn match_template(&self, frame: &Frame, template: &Template, threshold: f64) -> Result<BBoxCollection> {
        let scores = self.score_map(frame.image(), template)?;
        let (width, height) = (template.width() as i32, template.height() as i32);

        let matches = scores
            .enumerate_pixels()
            .filter(|(_, _, score)| score.0[0] as f64 >= threshold)
            .map(|(x, y, score)| BBox::new(x as i32, y as i32, width, height, score.0[0] as f64))
            .collect();

        Ok(matches)
    }
}

fn check_fits(image: &RgbImage, template: &Template) -> Result<()> {
    if template.width() == 0 || template.height() == 0 {
        return Err(MatchError::EmptyTemplate {
            template: template.name.clone(),
        }
        .into());
    }
    if template.width() > image.width() || template.height() > image.height() {
        return Err(MatchError::TemplateTooLarge {
            template: template.name.clone(),
            template_width: template.width(),
            template_height: template.height(),
            frame_width: image.width(),
            frame_height: image.height(),
        }
        .into());
    }
    Ok(())
}

/// Summed-area tables of pixel values and squared pixel values, one per channel.
struct IntegralImages {
    stride: usize,
    sum: Vec<[f64; 3]>,
    sq_sum: Vec<[f64; 3]>,
}

impl IntegralImages {
    fn new(image: &RgbImage) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let stride = width + 1;
        let mut sum = vec![[0.0; 3]; stride * (height + 1)];
        let mut sq_sum = vec![[0.0; 3]; stride * (height + 1)];

        for y in 0..height {
            let mut row_sum = [0.0; 3];
            let mut row_sq = [0.0; 3];
            for x in 0..width {
                let pixel = image.get_pixel(x as u32, y as u32).0;
                let above = y * stride + x + 1;
                let here = (y + 1) * stride + x + 1;
                for c in 0..3 {
                    let v = pixel[c] as f64;
                    row_sum[c] += v;
                    row_sq[c] += v * v;
                    sum[here][c] = sum[above][c] + row_sum[c];
                    sq_sum[here][c] = sq_sum[above][c] + row_sq[c];
                }
            }
        }

        Self { stride, sum, sq_sum }
    }

    /// Per-channel sums over the `w x h` window at `(x, y)`
    fn window(&self, table: &[[f64; 3]], x: usize, y: usize, w: usize, h: usize) -> [f64; 3] {
        let tl = table[y * self.stride + x];
        let tr = table[y * self.stride + x + w];
        let bl = table[(y + h) * self.stride + x];
        let br = table[(y + h) * self.stride + x + w];
        [0, 1, 2].map(|c| br[c] - tr[c] - bl[c] + tl[c])
    }
}

/// Zero-mean normalized cross-correlation summed over the three channels.
fn ccoeff_normed(image: &RgbImage, template: &RgbImage) -> Result<ScoreMap> {
    let (iw, ih) = (image.width() as usize, image.height() as usize);
    let (tw, th) = (template.width() as usize, template.height() as usize);
    let (cols, rows) = (iw - tw + 1, ih - th + 1);
    let n = (tw * th) as f64;

    let mut means = [0.0; 3];
    for pixel in template.pixels() {
        for c in 0..3 {
            means[c] += pixel.0[c] as f64;
        }
    }
    means = means.map(|m| m / n);

    let centered: Vec<f64> = template
        .as_raw()
        .iter()
        .enumerate()
        .map(|(i, &v)| v as f64 - means[i % 3])
        .collect();
    let template_norm: f64 = centered.iter().map(|v| v * v).sum();

    let integrals = IntegralImages::new(image);
    let raw = image.as_raw();
    let row_len = tw * 3;

    let score_row = |y: usize| -> Vec<f32> {
        (0..cols)
            .map(|x| {
                let mut num = 0.0;
                for ty in 0..th {
                    let start = ((y + ty) * iw + x) * 3;
                    let frame_row = &raw[start..start + row_len];
                    let template_row = &centered[ty * row_len..(ty + 1) * row_len];
                    num += frame_row
                        .iter()
                        .zip(template_row)
                        .map(|(&f, &t)| f as f64 * t)
                        .sum::<f64>();
                }

                let sums = integrals.window(&integrals.sum, x, y, tw, th);
                let sq_sums = integrals.window(&integrals.sq_sum, x, y, tw, th);
                let variance: f64 = (0..3).map(|c| (sq_sums[c] - sums[c] * sums[c] / n).max(0.0)).sum();

                let denom = (template_norm * variance).sqrt();
                if denom <= FLAT_EPSILON {
                    0.0
                } else {
                    (num / denom).clamp(-1.0, 1.0) as f32
                }
            })
            .collect()
    };

    #[cfg(feature = "parallel")]
    let data: Vec<f32> = {
        use rayon::prelude::*;
        (0..rows).into_par_iter().flat_map_iter(score_row).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let data: Vec<f32> = (0..rows).flat_map(score_row).collect();

    ScoreMap::from_raw(cols as u32, rows as u32, data).ok_or_else(|| {
        MatchError::ScoreMap {
            width: cols as u32,
            height: rows as u32,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Deterministic texture so correlation has a single clear peak.
    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 37 + y * 91 + x * y * 13) % 251) as u8;
            Rgb([v, v.wrapping_mul(3), 255 - v])
        })
    }

    fn crop(image: &RgbImage, x: u32, y: u32, w: u32, h: u32) -> RgbImage {
        image::imageops::crop_imm(image, x, y, w, h).to_image()
    }

    #[test]
    fn test_exact_patch_scores_one() -> Result<()> {
        let image = textured(40, 30);
        let template = Template::new("patch", crop(&image, 12, 7, 8, 6));

        let scores = ImageMatcher::default().score_map(&image, &template)?;
        assert_eq!(scores.dimensions(), (33, 25));
        assert!((scores.get_pixel(12, 7).0[0] - 1.0).abs() < 1e-4);

        let best = scores
            .enumerate_pixels()
            .max_by(|a, b| a.2.0[0].total_cmp(&b.2.0[0]))
            .map(|(x, y, _)| (x, y));
        assert_eq!(best, Some((12, 7)));
        Ok(())
    }

    #[test]
    fn test_brightness_shift_still_matches() -> Result<()> {
        let image = RgbImage::from_fn(30, 30, |x, y| Rgb([(x * 5) as u8, (y * 5) as u8, ((x + y) * 2) as u8]));
        let patch = crop(&image, 5, 5, 6, 6);
        let brighter = RgbImage::from_fn(6, 6, |x, y| {
            let p = patch.get_pixel(x, y).0;
            Rgb([p[0] + 20, p[1] + 20, p[2] + 20])
        });

        let scores = ImageMatcher::default().score_map(&image, &Template::new("bright", brighter))?;
        assert!(scores.get_pixel(5, 5).0[0] > 0.99);
        Ok(())
    }

    #[test]
    fn test_match_template_reports_template_sized_boxes() -> Result<()> {
        let image = textured(40, 30);
        let template = Template::new("patch", crop(&image, 20, 10, 10, 8));
        let frame = Frame::new(image);

        let matches = ImageMatcher::default().match_template(&frame, &template, 0.99)?;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.as_slice()[0].rect(), (20, 10, 10, 8));
        Ok(())
    }

    #[test]
    fn test_ccorr_normed_method() -> Result<()> {
        let image = textured(20, 20);
        let template = Template::new("patch", crop(&image, 3, 4, 5, 5));
        let matcher = ImageMatcher::new(MatchingMethod::CCorrNormed);

        let scores = matcher.score_map(&image, &template)?;
        assert_eq!(scores.dimensions(), (16, 16));
        assert!(scores.get_pixel(3, 4).0[0] > 0.999);
        Ok(())
    }

    #[test]
    fn test_template_larger_than_frame_is_an_error() {
        let frame = Frame::new(RgbImage::new(10, 10));
        let template = Template::new("huge", RgbImage::new(20, 5));

        let err = ImageMatcher::default()
            .match_template(&frame, &template, 0.7)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchError>(),
            Some(MatchError::TemplateTooLarge { .. })
        ));
    }

    #[test]
    fn test_flat_regions_score_zero() -> Result<()> {
        let image = RgbImage::from_pixel(10, 10, Rgb([90, 90, 90]));
        let template = Template::new("flat", RgbImage::from_pixel(3, 3, Rgb([90, 90, 90])));

        let scores = ImageMatcher::default().score_map(&image, &template)?;
        assert!(scores.pixels().all(|p| p.0[0] == 0.0));
        Ok(())
    }
}
