//! Bounded-retry random cropping.

use crate::boxes::{self, ClipEdges, ClipPolicy, GroundTruthBox};
use crate::config::RandomCropConfig;
use crate::geometric::{self, CropPlacement};
use ndarray::Array3;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropState {
    Trying,
    Accepted,
    Exhausted,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CropOutcome {
    /// The crop to keep; its extent is the configured crop size
    Accepted {
        image: Array3<u8>,
        boxes: Vec<GroundTruthBox>,
        trials: usize,
    },
    /// Every trial left the image without a box; it has to be removed from the batch
    Exhausted { trials: usize },
}

/// Draws crop windows until one satisfies the "at least one object" constraint or the trial
/// budget runs out.
#[derive(Clone, Debug)]
pub struct CropRetryController {
    config: RandomCropConfig,
    policy: ClipPolicy,
    state: CropState,
    trials: usize,
}

impl CropRetryController {
    pub fn new(config: RandomCropConfig, policy: ClipPolicy) -> Self {
        CropRetryController {
            config,
            policy,
            state: CropState::Trying,
            trials: 0,
        }
    }

    pub fn state(&self) -> CropState {
        self.state
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Run one trial, returning the candidate if it was accepted
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        image: &Array3<u8>,
        boxes: &[GroundTruthBox],
        rng: &mut R,
    ) -> Option<(Array3<u8>, Vec<GroundTruthBox>)> {
        if self.state != CropState::Trying {
            return None;
        }
        if self.trials >= self.config.max_trials {
            self.state = CropState::Exhausted;
            return None;
        }

        let (src_h, src_w) = (image.shape()[0], image.shape()[1]);
        let placement = CropPlacement::new(src_h, src_w, self.config.height, self.config.width)
            .with_random_origin(rng);

        let patch = geometric::crop_or_place(image, &placement);
        let moved = boxes::crop(boxes, &placement);
        let kept = self.policy.apply(
            moved,
            placement.height,
            placement.width,
            ClipEdges::for_placement(&placement),
        );
        self.trials += 1;

        if !self.config.min_one_object || !kept.is_empty() {
            self.state = CropState::Accepted;
            return Some((patch, kept));
        }
        if self.trials >= self.config.max_trials {
            self.state = CropState::Exhausted;
        }
        None
    }

    /// Keep stepping until the controller leaves [`CropState::Trying`]
    pub fn run<R: Rng + ?Sized>(
        mut self,
        image: &Array3<u8>,
        boxes: &[GroundTruthBox],
        rng: &mut R,
    ) -> CropOutcome {
        while self.state == CropState::Trying {
            if let Some((image, boxes)) = self.step(image, boxes, rng) {
                return CropOutcome::Accepted {
                    image,
                    boxes,
                    trials: self.trials,
                };
            }
        }
        CropOutcome::Exhausted {
            trials: self.trials,
        }
    }
}
