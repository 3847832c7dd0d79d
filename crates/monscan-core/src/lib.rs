//! Monscan core types
//!
//! Configuration model and process-lifetime counters shared by the detection
//! pipeline and the scan scheduler.

pub mod config;
pub mod stats;

pub use config::{CategoryConfig, MonsterSystemConfig, Rgb};
pub use stats::ScanStatistics;
