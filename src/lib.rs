//! Indefinite batch generation for object-detection training.
//!
//! Samples are drawn from a shuffled cycle over the dataset, decoded, pushed through a fixed
//! chain of geometric and photometric transforms with the ground-truth boxes following every
//! geometric step, and handed out as batches.

pub mod affine;
pub mod boxes;
pub mod config;
mod convert;
pub mod crop;
pub mod cycler;
pub mod error;
pub mod generator;
pub mod geometric;
pub mod labels;
pub mod loader;
pub mod photometric;
pub mod pipeline;
#[cfg(feature = "python")]
mod python;

pub use boxes::{ClipEdges, ClipPolicy, GroundTruthBox};
pub use config::{FixedCrop, RandomCropConfig, RangeProb, TransformConfig, TranslateConfig};
pub use crop::{CropOutcome, CropRetryController, CropState};
pub use cycler::BatchCycler;
pub use error::{BatchError, BatchResult};
pub use generator::{Batch, BatchGenerator, BatchLabels, BatchMode, LabelEncoder};
pub use labels::{ClassMap, CocoLabelSource, CsvLabelSource, InputFormat, LabelSource, Sample};
pub use loader::{FileImageLoader, ImageLoader};
pub use pipeline::{AugmentationPipeline, Augmented, ImageOutcome, PipelineOutput};
