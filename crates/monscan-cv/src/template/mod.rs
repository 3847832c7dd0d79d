//! Templates and the matchers that search frames for them

pub mod loader;
pub mod matcher;
#[cfg(feature = "opencv")]
pub mod opencv_matcher;

pub use loader::TemplateLoader;
pub use matcher::ImageMatcher;
#[cfg(feature = "opencv")]
pub use opencv_matcher::OpenCvMatcher;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One reference image of a monster, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Template {
    /// `"{display name}_{Stem}"`, used in detection reports
    pub name: String,
    /// Lowercase file stem; usually names the pose or rotation
    pub angle: String,
    pub filename: String,
    pub image: RgbImage,
}

impl Template {
    pub fn new(name: impl Into<String>, image: RgbImage) -> Self {
        let name = name.into();
        Self {
            angle: name.to_lowercase(),
            filename: String::new(),
            name,
            image,
        }
    }

    pub fn with_source(mut self, filename: impl Into<String>, angle: impl Into<String>) -> Self {
        self.filename = filename.into();
        self.angle = angle.into();
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Score used by [`ImageMatcher`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchingMethod {
    /// Zero-mean normalized correlation over RGB (robust to linear lighting changes)
    #[default]
    CCoeffNormed,
    /// Normalized cross-correlation on luma
    CCorrNormed,
}
