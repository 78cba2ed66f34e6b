//! Fixed-order augmentation of (image, boxes) pairs.

use crate::boxes::{self, ClipEdges, ClipPolicy, GroundTruthBox};
use crate::config::TransformConfig;
use crate::crop::{CropOutcome, CropRetryController};
use crate::error::BatchResult;
use crate::geometric::{self, FlipAxis};
use crate::photometric;
use log::debug;
use ndarray::Array3;
use rand::Rng;

/// An image with the boxes that describe it
#[derive(Clone, Debug, PartialEq)]
pub struct Augmented {
    pub image: Array3<u8>,
    pub boxes: Vec<GroundTruthBox>,
}

impl Augmented {
    pub fn new(image: Array3<u8>, boxes: Vec<GroundTruthBox>) -> Self {
        Augmented { image, boxes }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImageOutcome {
    Kept(Augmented),
    /// Random cropping never produced an acceptable window
    Removed { trials: usize },
}

/// Result of augmenting a whole batch
#[derive(Clone, Debug, Default)]
pub struct PipelineOutput {
    /// Surviving pairs in their original order
    pub items: Vec<Augmented>,
    /// Position of each surviving pair in the input batch
    pub kept: Vec<usize>,
    pub removed: usize,
}

/// Draw `p` uniformly in `[0, 1)` and fire iff `p >= 1 - prob`
fn fires<R: Rng + ?Sized>(prob: f64, rng: &mut R) -> bool {
    let p: f64 = rng.gen();
    p >= 1.0 - prob
}

/// Applies the configured transforms in a fixed order:
/// equalize, brightness, flip, translate, scale, random crop, fixed crop, resize, gray.
#[derive(Clone, Debug)]
pub struct AugmentationPipeline {
    config: TransformConfig,
}

impl AugmentationPipeline {
    pub fn new(config: TransformConfig) -> BatchResult<Self> {
        config.validate()?;
        Ok(AugmentationPipeline { config })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    fn policy(&self) -> ClipPolicy {
        ClipPolicy {
            limit_boxes: self.config.limit_boxes,
            include_thresh: self.config.include_thresh,
        }
    }

    /// Augment one pair. A failed random crop skips everything after it.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        item: Augmented,
        rng: &mut R,
    ) -> BatchResult<ImageOutcome> {
        let cfg = &self.config;
        let policy = self.policy();
        let Augmented {
            mut image,
            mut boxes,
        } = item;
        let (mut height, mut width) = (image.shape()[0], image.shape()[1]);

        if cfg.equalize {
            image = photometric::histogram_eq(&image);
        }

        if let Some(b) = &cfg.brightness {
            if fires(b.prob, rng) {
                image = photometric::brightness(&image, b.min, b.max, rng)?;
            }
        }

        if let Some(prob) = cfg.flip {
            if fires(prob, rng) {
                image = geometric::flip(&image, FlipAxis::Horizontal);
                let mirrored = boxes::flip(&boxes, FlipAxis::Horizontal, height, width);
                let edges = ClipEdges {
                    left: true,
                    right: true,
                    ..ClipEdges::NONE
                };
                boxes = policy.clamp(mirrored, height, width, edges);
            }
        }

        if let Some(t) = &cfg.translate {
            if fires(t.prob, rng) {
                let (shifted, (dx, dy)) =
                    geometric::translate(&image, t.horizontal, t.vertical, rng);
                image = shifted;
                boxes = policy.apply(
                    boxes::translate(&boxes, dx, dy),
                    height,
                    width,
                    ClipEdges::ALL,
                );
            }
        }

        if let Some(s) = &cfg.scale {
            if fires(s.prob, rng) {
                let (scaled, transform) = geometric::scale(&image, s.min, s.max, rng);
                image = scaled;
                boxes = boxes::scale(&boxes, &transform);
                // Shrinking cannot push a box out of the frame
                if transform.scale > 1.0 {
                    boxes = policy.apply(boxes, height, width, ClipEdges::ALL);
                }
            }
        }

        if let Some(rc) = &cfg.random_crop {
            match CropRetryController::new(*rc, policy).run(&image, &boxes, rng) {
                CropOutcome::Accepted {
                    image: patch,
                    boxes: kept,
                    ..
                } => {
                    image = patch;
                    boxes = kept;
                    height = rc.height;
                    width = rc.width;
                }
                CropOutcome::Exhausted { trials } => {
                    return Ok(ImageOutcome::Removed { trials });
                }
            }
        }

        if let Some(crop) = &cfg.crop {
            image = geometric::crop_fixed(&image, crop)?;
            height -= crop.top + crop.bottom;
            width -= crop.left + crop.right;
            boxes = policy.apply(
                boxes::crop_fixed(&boxes, crop),
                height,
                width,
                ClipEdges::for_fixed_crop(crop),
            );
        }

        if let Some((new_width, new_height)) = cfg.resize {
            image = geometric::resize(&image.view(), new_width, new_height);
            boxes = boxes::resize(&boxes, (height, width), (new_height, new_width));
        }

        if cfg.gray {
            image = photometric::grayscale(&image)?;
        }

        Ok(ImageOutcome::Kept(Augmented { image, boxes }))
    }

    /// Augment every pair of a batch, then drop the ones whose crop was exhausted.
    ///
    /// Any transform error abandons the whole batch.
    pub fn apply_batch<R: Rng + ?Sized>(
        &self,
        batch: Vec<Augmented>,
        rng: &mut R,
    ) -> BatchResult<PipelineOutput> {
        let outcomes = batch
            .into_iter()
            .map(|item| self.apply(item, rng))
            .collect::<BatchResult<Vec<_>>>()?;

        let mut output = PipelineOutput::default();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                ImageOutcome::Kept(item) => {
                    output.items.push(item);
                    output.kept.push(index);
                }
                ImageOutcome::Removed { trials } => {
                    debug!("Dropping batch item {index}: no valid random crop in {trials} trials");
                    output.removed += 1;
                }
            }
        }
        Ok(output)
    }
}
