//! Rectangle grouping for raw template matches
//!
//! A correlation peak usually clears the threshold at several neighbouring
//! pixel offsets. Grouping collapses those hits into one rectangle per object.

use crate::bbox::{BBox, BBoxCollection};

/// Parameters of the grouping rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingParams {
    /// A cluster needs more than this many members to survive; 0 disables grouping.
    pub threshold: usize,
    /// Relative tolerance used when comparing rectangle edges.
    pub eps: f64,
}

impl Default for GroupingParams {
    fn default() -> Self {
        Self {
            threshold: 1,
            eps: 0.5,
        }
    }
}

/// Rectangle grouping utility functions
pub struct RectangleGrouping;

impl RectangleGrouping {
    /// Two rectangles are similar when every edge moves by at most
    /// `eps * (min(w1, w2) + min(h1, h2)) / 2`.
    pub fn similar(a: &BBox, b: &BBox, eps: f64) -> bool {
        let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
        ((a.x - b.x).abs() as f64) <= delta
            && ((a.y - b.y).abs() as f64) <= delta
            && ((a.x + a.width - b.x - b.width).abs() as f64) <= delta
            && ((a.y + a.height - b.y - b.height).abs() as f64) <= delta
    }

    /// Cluster similar rectangles and return one averaged rectangle per
    /// surviving cluster, ordered by first member.
    ///
    /// Clusters with `threshold` members or fewer are dropped, so with the
    /// default threshold an isolated single hit disappears. A surviving
    /// cluster lying inside a stronger one is dropped as well.
    pub fn group(boxes: BBoxCollection, params: GroupingParams) -> BBoxCollection {
        if params.threshold == 0 || boxes.is_empty() {
            return boxes;
        }

        let boxes = boxes.as_slice();
        let labels = Self::partition(boxes, params.eps);
        let class_count = labels.iter().copied().max().map_or(0, |max| max + 1);

        let mut sums = vec![[0i64; 4]; class_count];
        let mut members = vec![0usize; class_count];
        let mut best: Vec<Option<&BBox>> = vec![None; class_count];

        for (bbox, &label) in boxes.iter().zip(&labels) {
            let sum = &mut sums[label];
            sum[0] += bbox.x as i64;
            sum[1] += bbox.y as i64;
            sum[2] += bbox.width as i64;
            sum[3] += bbox.height as i64;
            members[label] += 1;

            if best[label].is_none_or(|b| bbox.confidence > b.confidence) {
                best[label] = Some(bbox);
            }
        }

        let averaged: Vec<BBox> = (0..class_count)
            .map(|label| {
                let n = members[label] as f64;
                let [x, y, w, h] = sums[label].map(|v| round(v as f64 / n));
                let mut bbox = best[label].cloned().unwrap_or_else(|| BBox::new(0, 0, 0, 0, 0.0));
                bbox.x = x;
                bbox.y = y;
                bbox.width = w;
                bbox.height = h;
                bbox
            })
            .collect();

        let mut grouped = BBoxCollection::new();
        for (i, inner) in averaged.iter().enumerate() {
            let n1 = members[i];
            if n1 <= params.threshold {
                continue;
            }

            let swallowed = averaged.iter().enumerate().any(|(j, outer)| {
                let n2 = members[j];
                j != i
                    && n2 > params.threshold
                    && Self::inside(inner, outer, params.eps)
                    && (n2 > n1.max(3) || n1 < 3)
            });

            if !swallowed {
                grouped.push(inner.clone());
            }
        }

        grouped
    }

    /// Assign a cluster label to every rectangle; labels follow the index of
    /// each cluster's first member.
    fn partition(boxes: &[BBox], eps: f64) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..boxes.len()).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if Self::similar(&boxes[i], &boxes[j], eps) {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        parent[ri.max(rj)] = ri.min(rj);
                    }
                }
            }
        }

        let mut class_of_root = vec![usize::MAX; boxes.len()];
        let mut next = 0;
        (0..boxes.len())
            .map(|i| {
                let root = find(&mut parent, i);
                if class_of_root[root] == usize::MAX {
                    class_of_root[root] = next;
                    next += 1;
                }
                class_of_root[root]
            })
            .collect()
    }

    /// `inner` fits in `outer` grown by `eps` of the outer size
    fn inside(inner: &BBox, outer: &BBox, eps: f64) -> bool {
        let dx = round(outer.width as f64 * eps);
        let dy = round(outer.height as f64 * eps);
        inner.x >= outer.x - dx
            && inner.y >= outer.y - dy
            && inner.x + inner.width <= outer.x + outer.width + dx
            && inner.y + inner.height <= outer.y + outer.height + dy
    }
}

fn round(value: f64) -> i32 {
    value.round_ties_even() as i32
}
