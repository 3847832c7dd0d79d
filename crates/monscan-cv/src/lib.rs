//! Monscan Computer Vision Library
//!
//! Template matching, grouping of raw hits and per-category aggregation of
//! monster detections.

pub mod bbox;
pub mod detection;
pub mod error;
pub mod frame;
pub mod template;
pub mod utils;

// Re-export commonly used types
pub use bbox::{BBox, BBoxCollection};
pub use detection::{Category, DetectionConfig, DetectionInfo, DetectionResult, MonsterDetector};
pub use error::MatchError;
pub use frame::Frame;
pub use template::{ImageMatcher, MatchingMethod, Template, TemplateLoader};
#[cfg(feature = "opencv")]
pub use template::OpenCvMatcher;

// Error handling
pub type Result<T> = anyhow::Result<T>;

/// Core traits for the CV system
pub mod traits {
    use super::*;

    /// Trait for template matching implementations.
    ///
    /// Returns one template-sized box for every placement whose similarity
    /// score is at least `threshold`; an empty collection when nothing clears it.
    pub trait TemplateMatchable: Sync {
        fn match_template(&self, frame: &Frame, template: &Template, threshold: f64) -> Result<BBoxCollection>;
    }

    impl<T: TemplateMatchable + ?Sized> TemplateMatchable for Box<T> {
        fn match_template(&self, frame: &Frame, template: &Template, threshold: f64) -> Result<BBoxCollection> {
            (**self).match_template(frame, template, threshold)
        }
    }
}
