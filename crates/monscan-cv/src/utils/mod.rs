//! Utility modules

pub mod group;
pub mod image;

pub use self::group::{GroupingParams, RectangleGrouping};
pub use self::image::ImageUtils;
