//! Augmentation options. Every transform is disabled unless its field is set.

use crate::error::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A uniform factor range `[min, max]` together with the probability of applying it
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeProb {
    pub min: f64,
    pub max: f64,
    pub prob: f64,
}

/// Random shift magnitudes in pixels; the sign of each axis is drawn separately
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranslateConfig {
    pub horizontal: (i32, i32),
    pub vertical: (i32, i32),
    pub prob: f64,
}

/// Random crop of a `height` x `width` patch. Larger than the source in a dimension means the
/// source is placed at a random offset on a black canvas instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomCropConfig {
    pub height: usize,
    pub width: usize,
    /// Reject crops that leave no box behind
    #[serde(default)]
    pub min_one_object: bool,
    pub max_trials: usize,
}

/// Pixels cut off each side of the image
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedCrop {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    pub equalize: bool,
    pub brightness: Option<RangeProb>,
    /// Probability of a horizontal flip
    pub flip: Option<f64>,
    pub translate: Option<TranslateConfig>,
    pub scale: Option<RangeProb>,
    pub random_crop: Option<RandomCropConfig>,
    pub crop: Option<FixedCrop>,
    /// Output size as (`width`, `height`)
    pub resize: Option<(usize, usize)>,
    pub gray: bool,
    /// Clamp boxes to the image after every geometric transform
    pub limit_boxes: bool,
    /// Minimum fraction of a box's area that must survive clamping
    pub include_thresh: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            equalize: false,
            brightness: None,
            flip: None,
            translate: None,
            scale: None,
            random_crop: None,
            crop: None,
            resize: None,
            gray: false,
            limit_boxes: true,
            include_thresh: 0.3,
        }
    }
}

fn check_prob(name: &str, p: f64) -> BatchResult<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(BatchError::config(format!(
            "{name} probability must be in [0.0, 1.0] (got {p})"
        )))
    }
}

fn check_range(name: &str, r: &RangeProb, allow_zero: bool) -> BatchResult<()> {
    let lower_ok = if allow_zero { r.min >= 0.0 } else { r.min > 0.0 };
    if !lower_ok || r.min > r.max || !r.max.is_finite() {
        return Err(BatchError::config(format!(
            "{name} range must satisfy 0 {} min <= max (got [{}, {}])",
            if allow_zero { "<=" } else { "<" },
            r.min,
            r.max
        )));
    }
    check_prob(name, r.prob)
}

impl TransformConfig {
    pub fn from_json_str(json: &str) -> BatchResult<Self> {
        let cfg: TransformConfig = serde_json::from_str(json).map_err(|source| BatchError::Json {
            path: "<inline>".into(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> BatchResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: TransformConfig =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| BatchError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject option values no transform could honour
    pub fn validate(&self) -> BatchResult<()> {
        if let Some(b) = &self.brightness {
            check_range("brightness", b, true)?;
        }
        if let Some(p) = self.flip {
            check_prob("flip", p)?;
        }
        if let Some(t) = &self.translate {
            for (axis, (lo, hi)) in [("horizontal", t.horizontal), ("vertical", t.vertical)] {
                if lo < 0 || lo > hi {
                    return Err(BatchError::config(format!(
                        "translate {axis} range must satisfy 0 <= min <= max (got ({lo}, {hi}))"
                    )));
                }
            }
            check_prob("translate", t.prob)?;
        }
        if let Some(s) = &self.scale {
            check_range("scale", s, false)?;
        }
        if let Some(rc) = &self.random_crop {
            if rc.height == 0 || rc.width == 0 {
                return Err(BatchError::config(format!(
                    "random_crop size must be positive (got {}x{})",
                    rc.height, rc.width
                )));
            }
            if rc.max_trials == 0 {
                return Err(BatchError::config("random_crop max_trials must be at least 1"));
            }
        }
        if let Some((w, h)) = self.resize {
            if w == 0 || h == 0 {
                return Err(BatchError::config(format!(
                    "resize dimensions must be positive (got {w}x{h})"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.include_thresh) {
            return Err(BatchError::config(format!(
                "include_thresh must be in [0.0, 1.0] (got {})",
                self.include_thresh
            )));
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        fn opt<T: std::fmt::Debug>(v: &Option<T>) -> String {
            v.as_ref()
                .map(|x| format!("{x:?}"))
                .unwrap_or_else(|| "off".to_string())
        }
        format!(
            "equalize={} brightness={} flip={} translate={} scale={} random_crop={} crop={} resize={} gray={} limit_boxes={} include_thresh={:.2}",
            self.equalize,
            opt(&self.brightness),
            opt(&self.flip),
            opt(&self.translate),
            opt(&self.scale),
            opt(&self.random_crop),
            opt(&self.crop),
            opt(&self.resize),
            self.gray,
            self.limit_boxes,
            self.include_thresh
        )
    }
}
