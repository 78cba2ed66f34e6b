//! Ground-truth label sources.
//!
//! A source turns an annotation file into one [`Sample`] per image, keeping only the boxes of
//! the included classes and renumbering their class ids through a [`ClassMap`].

mod coco;
mod csv;

pub use self::coco::{CocoAnnotation, CocoAnnotations, CocoCategory, CocoImage, CocoLabelSource};
pub use self::csv::{CsvLabelSource, InputFormat};

use crate::boxes::GroundTruthBox;
use crate::error::{BatchError, BatchResult};
use std::collections::HashMap;

/// One image and its ground-truth boxes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub filename: String,
    pub boxes: Vec<GroundTruthBox>,
}

/// Maps raw dataset class ids onto dense indices `0..K-1`, in the order the classes were listed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassMap {
    included: Vec<i64>,
    dense: HashMap<i64, usize>,
}

impl ClassMap {
    pub fn new(included: &[i64]) -> BatchResult<Self> {
        let mut dense = HashMap::with_capacity(included.len());
        for (index, &raw) in included.iter().enumerate() {
            if dense.insert(raw, index).is_some() {
                return Err(BatchError::config(format!(
                    "class id {raw} is listed more than once"
                )));
            }
        }
        Ok(ClassMap {
            included: included.to_vec(),
            dense,
        })
    }

    /// Dense index of `raw`, or `None` if the class is excluded
    pub fn dense(&self, raw: i64) -> Option<usize> {
        self.dense.get(&raw).copied()
    }

    pub fn raw(&self, dense: usize) -> Option<i64> {
        self.included.get(dense).copied()
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }
}

pub trait LabelSource {
    /// Read every sample; boxes are already restricted to `classes` and renumbered
    fn load(&self, classes: &ClassMap) -> BatchResult<Vec<Sample>>;
}

/// Sort (filename, box) rows and group them into one sample per file
pub(crate) fn group_rows(mut rows: Vec<(String, GroundTruthBox)>) -> Vec<Sample> {
    rows.sort();

    let mut samples: Vec<Sample> = Vec::new();
    for (filename, gt_box) in rows {
        match samples.last_mut() {
            Some(last) if last.filename == filename => last.boxes.push(gt_box),
            _ => samples.push(Sample {
                filename,
                boxes: vec![gt_box],
            }),
        }
    }
    samples
}
