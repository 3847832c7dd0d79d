//! Detection across all monster categories

use super::category::{Category, DetectionInfo};
use super::config::DetectionConfig;
use crate::Result;
use crate::bbox::BBoxCollection;
use crate::frame::Frame;
use crate::template::TemplateLoader;
use crate::traits::TemplateMatchable;
use anyhow::Context;
use log::{debug, info};
use monscan_core::MonsterSystemConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// Everything one scan found
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    pub detections: BBoxCollection,
    pub info: Vec<DetectionInfo>,
    pub stats: DetectionStats,
}

/// Detection statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionStats {
    pub total_detections: usize,
    pub category_counts: BTreeMap<String, usize>,
    pub processing_time_ms: u64,
}

impl DetectionResult {
    /// Nothing searched, nothing found
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// Export detection results in JSON format
    pub fn export_json(&self, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize detection results")?;

        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write JSON to: {:?}", output_path))?;

        Ok(())
    }
}

/// Runs every enabled category against a frame
pub struct MonsterDetector<M> {
    config: DetectionConfig,
    categories: Vec<Category>,
    matcher: M,
}

impl<M: TemplateMatchable> MonsterDetector<M> {
    /// Create new detector from already loaded categories
    pub fn new(config: DetectionConfig, categories: Vec<Category>, matcher: M) -> Self {
        Self {
            config,
            categories,
            matcher,
        }
    }

    /// Load templates for every enabled category and build the detector.
    ///
    /// Disabled categories are kept without templates; they are never run.
    pub fn from_config(system: &MonsterSystemConfig, loader: &TemplateLoader, matcher: M) -> Result<Self> {
        let mut categories = Vec::with_capacity(system.monsters.len());

        for monster in &system.monsters {
            let templates = if monster.enabled {
                info!(
                    "Loading {} templates from {}...",
                    monster.display_name,
                    monster.folder.display()
                );
                loader
                    .load_category(&monster.folder, &monster.display_name)
                    .with_context(|| format!("Failed to load templates for '{}'", monster.key))?
            } else {
                debug!("Skipping disabled category {}", monster.key);
                Vec::new()
            };
            categories.push(Category::from_config(monster, system.threshold_for(monster), templates));
        }

        Ok(Self::new(DetectionConfig::from_system(system), categories, matcher))
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn template_count(&self) -> usize {
        self.categories.iter().map(|c| c.templates().len()).sum()
    }

    /// Detect monsters in a frame.
    ///
    /// An absent or zero-sized frame yields an empty result without touching
    /// the matcher. Boxes are concatenated in category order; duplicates are
    /// only removed within a category unless cross-category dedup is enabled.
    pub fn detect(&self, frame: Option<&Frame>) -> Result<DetectionResult> {
        let Some(frame) = frame.filter(|f| !f.is_empty()) else {
            return Ok(DetectionResult::empty());
        };

        let start_time = Instant::now();
        let mut detections = BBoxCollection::new();
        let mut info = Vec::new();

        for category in self.categories.iter().filter(|c| c.enabled) {
            let found = category
                .detect(&self.matcher, frame, &self.config)
                .with_context(|| format!("Detection failed for '{}'", category.key))?;
            debug!("{}: {} detections", category.display_name, found.boxes.len());

            detections.extend(found.boxes);
            info.extend(found.info);
        }

        if self.config.cross_category_dedup && detections.len() > 1 {
            detections = detections.remove_duplicates(self.config.overlap_threshold);
        }

        let stats = DetectionStats {
            total_detections: detections.len(),
            category_counts: detections.count_by_class(),
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        };

        Ok(DetectionResult {
            detections,
            info,
            stats,
        })
    }
}
