//! High-level detection module

pub mod category;
pub mod config;
pub mod detector;

pub use category::{Category, CategoryDetections, DetectionInfo};
pub use config::DetectionConfig;
pub use detector::{DetectionResult, DetectionStats, MonsterDetector};
