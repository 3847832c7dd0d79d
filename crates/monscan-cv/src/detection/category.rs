//! Per-category aggregation of template matches

use super::config::DetectionConfig;
use crate::Result;
use crate::bbox::BBoxCollection;
use crate::frame::Frame;
use crate::template::Template;
use crate::traits::TemplateMatchable;
use crate::utils::RectangleGrouping;
use anyhow::Context;
use monscan_core::{CategoryConfig, Rgb};
use serde::{Deserialize, Serialize};

/// Summary of the matches one template produced in one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionInfo {
    pub monster: String,
    pub template: String,
    pub angle: String,
    pub threshold: f64,
    pub count: usize,
    pub color: Rgb,
}

/// Boxes and per-template summaries produced by one category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryDetections {
    pub boxes: BBoxCollection,
    pub info: Vec<DetectionInfo>,
}

/// A monster type: its templates plus how its detections are reported
#[derive(Debug, Clone)]
pub struct Category {
    pub key: String,
    pub display_name: String,
    pub color: Rgb,
    pub enabled: bool,
    pub threshold: f64,
    templates: Vec<Template>,
}

impl Category {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>, color: Rgb, threshold: f64) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            color,
            enabled: true,
            threshold,
            templates: Vec::new(),
        }
    }

    /// Build from configuration with an already resolved match threshold.
    pub fn from_config(config: &CategoryConfig, threshold: f64, templates: Vec<Template>) -> Self {
        Self {
            key: config.key.clone(),
            display_name: config.display_name.clone(),
            color: config.color,
            enabled: config.enabled,
            threshold,
            templates,
        }
    }

    pub fn with_templates(mut self, templates: Vec<Template>) -> Self {
        self.templates = templates;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Match every template, group raw hits per template and merge the
    /// survivors, removing boxes where several templates found the same object.
    pub fn detect<M>(&self, matcher: &M, frame: &Frame, config: &DetectionConfig) -> Result<CategoryDetections>
    where
        M: TemplateMatchable + ?Sized,
    {
        let raw_matches = self.match_templates(matcher, frame)?;
        let grouping = config.grouping();

        let mut detections = CategoryDetections::default();
        for (template, raw) in self.templates.iter().zip(raw_matches) {
            if raw.is_empty() {
                continue;
            }

            let grouped: BBoxCollection = RectangleGrouping::group(raw, grouping)
                .into_iter()
                .map(|bbox| {
                    bbox.with_class(self.key.as_str(), self.display_name.as_str(), self.color)
                        .with_metadata("template", template.name.as_str())
                        .with_metadata("angle", template.angle.as_str())
                })
                .collect();
            if grouped.is_empty() {
                continue;
            }

            detections.info.push(DetectionInfo {
                monster: self.display_name.clone(),
                template: template.name.clone(),
                angle: template.angle.clone(),
                threshold: self.threshold,
                count: grouped.len(),
                color: self.color,
            });
            detections.boxes.extend(grouped);
        }

        if detections.boxes.len() > 1 {
            detections.boxes = detections.boxes.remove_duplicates(config.overlap_threshold);
        }

        Ok(detections)
    }

    /// Raw matcher output per template, in template order
    fn match_templates<M>(&self, matcher: &M, frame: &Frame) -> Result<Vec<BBoxCollection>>
    where
        M: TemplateMatchable + ?Sized,
    {
        let match_one = |template: &Template| {
            matcher
                .match_template(frame, template, self.threshold)
                .with_context(|| format!("Matching {} failed", template.name))
        };

        #[cfg(feature = "parallel")]
        let matches = {
            use rayon::prelude::*;
            self.templates.par_iter().map(match_one).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let matches = self.templates.iter().map(match_one).collect();

        matches
    }
}
