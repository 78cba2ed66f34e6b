//! Ground-truth box remapping, one function per geometric transform, plus the clip-and-filter
//! policy applied after transforms that can push boxes off the image.

use crate::affine::AffineTransform;
use crate::config::FixedCrop;
use crate::geometric::{CropPlacement, FlipAxis};
use serde::{Deserialize, Serialize};

/// An axis-aligned ground-truth box in integer pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroundTruthBox {
    /// Dense index into the included classes
    pub class_id: usize,
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
}

impl GroundTruthBox {
    pub fn new(class_id: usize, xmin: i32, xmax: i32, ymin: i32, ymax: i32) -> Self {
        GroundTruthBox {
            class_id,
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// Signed area; a box whose corners crossed over has a non-positive area
    pub fn area(&self) -> i64 {
        let width = i64::from(self.xmax) - i64::from(self.xmin);
        let height = i64::from(self.ymax) - i64::from(self.ymin);
        width * height
    }

    /// Whether the box lies inside `[0, width) x [0, height)`
    pub fn is_within(&self, height: usize, width: usize) -> bool {
        let (h, w) = (height as i64, width as i64);
        let inside = |v: i32, extent: i64| (0..extent).contains(&i64::from(v));
        inside(self.xmin, w) && inside(self.xmax, w) && inside(self.ymin, h) && inside(self.ymax, h)
    }

    /// Saturates instead of wrapping, so a shift far past the frame still clamps cleanly
    fn shifted(&self, dx: i32, dy: i32) -> Self {
        GroundTruthBox {
            xmin: self.xmin.saturating_add(dx),
            xmax: self.xmax.saturating_add(dx),
            ymin: self.ymin.saturating_add(dy),
            ymax: self.ymax.saturating_add(dy),
            ..*self
        }
    }

    fn clamped(&self, edges: ClipEdges, height: usize, width: usize) -> Self {
        let upper = |v: i32, extent: usize| v.min(i32::try_from(extent).unwrap_or(i32::MAX) - 1);

        let mut b = *self;
        if edges.left {
            b.xmin = b.xmin.max(0);
            b.xmax = b.xmax.max(0);
        }
        if edges.right {
            b.xmin = upper(b.xmin, width);
            b.xmax = upper(b.xmax, width);
        }
        if edges.top {
            b.ymin = b.ymin.max(0);
            b.ymax = b.ymax.max(0);
        }
        if edges.bottom {
            b.ymin = upper(b.ymin, height);
            b.ymax = upper(b.ymax, height);
        }
        b
    }
}

/// Which image edges a transform may have pushed boxes across
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipEdges {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl ClipEdges {
    pub const ALL: ClipEdges = ClipEdges {
        top: true,
        bottom: true,
        left: true,
        right: true,
    };
    pub const NONE: ClipEdges = ClipEdges {
        top: false,
        bottom: false,
        left: false,
        right: false,
    };

    /// Only edges with a non-zero margin can cut into a box
    pub fn for_fixed_crop(crop: &FixedCrop) -> Self {
        ClipEdges {
            top: crop.top > 0,
            bottom: crop.bottom > 0,
            left: crop.left > 0,
            right: crop.right > 0,
        }
    }

    /// Axes where the window was cut out of the source; canvas axes cannot clip anything
    pub fn for_placement(placement: &CropPlacement) -> Self {
        let vertical = placement.y_range >= 0;
        let horizontal = placement.x_range >= 0;
        ClipEdges {
            top: vertical,
            bottom: vertical,
            left: horizontal,
            right: horizontal,
        }
    }

    pub fn any(&self) -> bool {
        self.top || self.bottom || self.left || self.right
    }
}

/// Whether and how strictly boxes are limited to the image after each geometric transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipPolicy {
    pub limit_boxes: bool,
    pub include_thresh: f64,
}

impl ClipPolicy {
    /// Clip-and-filter on `edges`, or pass the boxes through untouched when limiting is off
    pub fn apply(
        &self,
        boxes: Vec<GroundTruthBox>,
        height: usize,
        width: usize,
        edges: ClipEdges,
    ) -> Vec<GroundTruthBox> {
        if !self.limit_boxes || !edges.any() {
            return boxes;
        }
        clip_and_filter(boxes, height, width, edges, self.include_thresh)
    }

    /// Clamp `edges` without the area filter, for transforms that only overshoot by a pixel
    pub fn clamp(
        &self,
        boxes: Vec<GroundTruthBox>,
        height: usize,
        width: usize,
        edges: ClipEdges,
    ) -> Vec<GroundTruthBox> {
        if !self.limit_boxes || !edges.any() {
            return boxes;
        }
        boxes
            .into_iter()
            .map(|b| b.clamped(edges, height, width))
            .collect()
    }
}

/// Clamp the given edges into `[0, extent - 1]` and drop boxes that lost too much area.
///
/// A threshold of zero keeps boxes with strictly positive remaining area; any other threshold
/// keeps boxes whose remaining area is at least `include_thresh` of the original, so a threshold
/// of one keeps exactly the boxes that needed no clamping.
pub fn clip_and_filter(
    boxes: Vec<GroundTruthBox>,
    height: usize,
    width: usize,
    edges: ClipEdges,
    include_thresh: f64,
) -> Vec<GroundTruthBox> {
    boxes
        .into_iter()
        .filter_map(|b| {
            let before = b.area() as f64;
            let clamped = b.clamped(edges, height, width);
            let after = clamped.area() as f64;
            let keep = if include_thresh == 0.0 {
                after > 0.0
            } else {
                after >= include_thresh * before
            };
            keep.then_some(clamped)
        })
        .collect()
}

/// Mirror boxes to follow [`crate::geometric::flip`]; min and max swap roles on the flipped axis.
///
/// An edge touching the near border lands one past the far border (`width - 0`), so callers
/// limiting boxes follow this with [`ClipPolicy::clamp`].
pub fn flip(
    boxes: &[GroundTruthBox],
    axis: FlipAxis,
    height: usize,
    width: usize,
) -> Vec<GroundTruthBox> {
    let (h, w) = (height as i32, width as i32);
    boxes
        .iter()
        .map(|b| match axis {
            FlipAxis::Horizontal => GroundTruthBox {
                xmin: w - b.xmax,
                xmax: w - b.xmin,
                ..*b
            },
            FlipAxis::Vertical => GroundTruthBox {
                ymin: h - b.ymax,
                ymax: h - b.ymin,
                ..*b
            },
        })
        .collect()
}

pub fn translate(boxes: &[GroundTruthBox], dx: i32, dy: i32) -> Vec<GroundTruthBox> {
    boxes.iter().map(|b| b.shifted(dx, dy)).collect()
}

/// Push the top-left and bottom-right corners through `transform`, truncating toward zero.
///
/// The corners are written back as they come out, without re-sorting.
#[allow(clippy::cast_possible_truncation)]
pub fn scale(boxes: &[GroundTruthBox], transform: &AffineTransform) -> Vec<GroundTruthBox> {
    boxes
        .iter()
        .map(|b| {
            let (xmin, ymin) = transform.apply((b.xmin as f32, b.ymin as f32));
            let (xmax, ymax) = transform.apply((b.xmax as f32, b.ymax as f32));
            GroundTruthBox {
                xmin: xmin as i32,
                xmax: xmax as i32,
                ymin: ymin as i32,
                ymax: ymax as i32,
                ..*b
            }
        })
        .collect()
}

/// Move boxes into the coordinate frame of a crop window.
///
/// Cropped axes shift by minus the window origin, canvas axes by plus the placement offset.
pub fn crop(boxes: &[GroundTruthBox], placement: &CropPlacement) -> Vec<GroundTruthBox> {
    let offset = |range: i64, origin: usize| -> i32 {
        let origin = origin as i32;
        if range >= 0 {
            -origin
        } else {
            origin
        }
    };
    let dy = offset(placement.y_range, placement.origin_y);
    let dx = offset(placement.x_range, placement.origin_x);
    translate(boxes, dx, dy)
}

pub fn crop_fixed(boxes: &[GroundTruthBox], crop: &FixedCrop) -> Vec<GroundTruthBox> {
    translate(boxes, -(crop.left as i32), -(crop.top as i32))
}

/// Rescale coordinates from an `old` to a `new` extent, both given as (`height`, `width`).
///
/// Computed in integers so `x * new / old` truncates exactly.
#[allow(clippy::cast_possible_truncation)]
pub fn resize(
    boxes: &[GroundTruthBox],
    old: (usize, usize),
    new: (usize, usize),
) -> Vec<GroundTruthBox> {
    let (old_h, old_w) = (old.0 as i64, old.1 as i64);
    let (new_h, new_w) = (new.0 as i64, new.1 as i64);
    let sx = |v: i32| (i64::from(v) * new_w / old_w) as i32;
    let sy = |v: i32| (i64::from(v) * new_h / old_h) as i32;

    boxes
        .iter()
        .map(|b| GroundTruthBox {
            xmin: sx(b.xmin),
            xmax: sx(b.xmax),
            ymin: sy(b.ymin),
            ymax: sy(b.ymax),
            ..*b
        })
        .collect()
}
