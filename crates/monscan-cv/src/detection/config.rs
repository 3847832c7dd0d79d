//! Detection configuration

use crate::utils::GroupingParams;
use monscan_core::MonsterSystemConfig;
use serde::{Deserialize, Serialize};

/// Knobs of the aggregation pipeline shared by every category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Fraction of the smaller box that must be covered to call two boxes duplicates
    pub overlap_threshold: f64,
    pub group_threshold: usize,
    pub group_eps: f64,
    /// Also deduplicate across categories after all of them ran
    pub cross_category_dedup: bool,
}

impl DetectionConfig {
    pub fn from_system(config: &MonsterSystemConfig) -> Self {
        Self {
            overlap_threshold: config.overlap_threshold,
            group_threshold: config.group_threshold,
            group_eps: config.group_eps,
            cross_category_dedup: config.cross_category_dedup,
        }
    }

    pub fn grouping(&self) -> GroupingParams {
        GroupingParams {
            threshold: self.group_threshold,
            eps: self.group_eps,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self::from_system(&MonsterSystemConfig::default())
    }
}
