//! Bounding boxes and duplicate removal
//!
//! Core abstraction for representing candidate matches and detections.

use monscan_core::Rgb;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A rectangle in frame pixel coordinates plus the category it is attributed to.
///
/// Raw matcher output only fills geometry and confidence; the detector attaches
/// category key, display name and color before a box leaves the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
    pub class_id: String,
    pub label: String,
    pub color: Rgb,
    pub metadata: HashMap<String, String>,
}

impl BBox {
    /// Create a new bounding box
    pub fn new(x: i32, y: i32, width: i32, height: i32, confidence: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            class_id: String::new(),
            label: String::new(),
            color: Rgb::WHITE,
            metadata: HashMap::new(),
        }
    }

    /// Geometry as an `(x, y, width, height)` tuple
    pub fn rect(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.width, self.height)
    }

    /// Calculate area of the bounding box
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Calculate center point
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Area shared with another box, zero when they are disjoint
    pub fn intersection_area(&self, other: &BBox) -> i64 {
        let overlap_x = ((self.x + self.width).min(other.x + other.width) - self.x.max(other.x)).max(0);
        let overlap_y = ((self.y + self.height).min(other.y + other.height) - self.y.max(other.y)).max(0);
        overlap_x as i64 * overlap_y as i64
    }

    /// Cheap gate: boxes further apart than the larger extent on either axis
    /// are never compared further.
    pub fn is_far_from(&self, other: &BBox) -> bool {
        (self.x - other.x).abs() > self.width.max(other.width)
            || (self.y - other.y).abs() > self.height.max(other.height)
    }

    /// True when the shared area exceeds `threshold` of the smaller box.
    pub fn duplicates(&self, other: &BBox, threshold: f64) -> bool {
        if self.is_far_from(other) {
            return false;
        }
        let smaller = self.area().min(other.area());
        self.intersection_area(other) as f64 > threshold * smaller as f64
    }

    /// Attach category information
    pub fn with_class(mut self, class_id: impl Into<String>, label: impl Into<String>, color: Rgb) -> Self {
        self.class_id = class_id.into();
        self.label = label.into();
        self.color = color;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Collection of bounding boxes with batch operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BBoxCollection {
    boxes: Vec<BBox>,
}

impl BBoxCollection {
    /// Create new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from vector of boxes
    pub fn from_vec(boxes: Vec<BBox>) -> Self {
        Self { boxes }
    }

    /// Add a box to the collection
    pub fn push(&mut self, bbox: BBox) {
        self.boxes.push(bbox);
    }

    /// Extend with another collection
    pub fn extend(&mut self, other: BBoxCollection) {
        self.boxes.extend(other.boxes);
    }

    /// Get boxes as slice
    pub fn as_slice(&self) -> &[BBox] {
        &self.boxes
    }

    /// Get number of boxes
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Remove boxes that mostly cover an already kept, larger box.
    ///
    /// Boxes are visited largest first (stable for equal areas). A box is
    /// dropped when its intersection with any kept box exceeds
    /// `overlap_threshold` times the smaller of the two areas. The result is
    /// in descending-area order.
    pub fn remove_duplicates(mut self, overlap_threshold: f64) -> Self {
        if self.boxes.len() <= 1 {
            return self;
        }

        self.boxes.sort_by(|a, b| b.area().cmp(&a.area()));

        let mut unique: Vec<BBox> = Vec::with_capacity(self.boxes.len());
        for bbox in self.boxes {
            let is_duplicate = unique
                .iter()
                .any(|kept| bbox.duplicates(kept, overlap_threshold));
            if !is_duplicate {
                unique.push(bbox);
            }
        }

        Self::from_vec(unique)
    }

    /// Number of boxes per category key, in key order
    pub fn count_by_class(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for bbox in &self.boxes {
            *counts.entry(bbox.class_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Convert to iterator
    pub fn iter(&self) -> std::slice::Iter<'_, BBox> {
        self.boxes.iter()
    }
}

impl IntoIterator for BBoxCollection {
    type Item = BBox;
    type IntoIter = std::vec::IntoIter<BBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.into_iter()
    }
}

impl<'a> IntoIterator for &'a BBoxCollection {
    type Item = &'a BBox;
    type IntoIter = std::slice::Iter<'a, BBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}

impl FromIterator<BBox> for BBoxCollection {
    fn from_iter<T: IntoIterator<Item = BBox>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}
