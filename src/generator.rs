//! The batch generator: picks a window of samples, decodes and augments them, and hands the
//! result to an encoder (training) or back with filenames (inference).

use crate::boxes::GroundTruthBox;
use crate::config::TransformConfig;
use crate::cycler::BatchCycler;
use crate::error::{BatchError, BatchResult};
use crate::labels::{ClassMap, LabelSource, Sample};
use crate::loader::ImageLoader;
use crate::pipeline::{AugmentationPipeline, Augmented};
use log::{debug, info};
use ndarray::{Array3, Array4, ArrayD, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

/// Turns the final per-image boxes of a batch into whatever the training loss consumes
pub trait LabelEncoder {
    type Target;

    fn encode(&self, boxes: &[Vec<GroundTruthBox>]) -> BatchResult<Self::Target>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchMode {
    /// Labels go through the encoder
    Train,
    /// Raw boxes come back together with the source filenames
    Infer,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BatchLabels<T> {
    Encoded(T),
    Boxes {
        boxes: Vec<Vec<GroundTruthBox>>,
        filenames: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Batch<T> {
    pub images: Vec<Array3<u8>>,
    pub labels: BatchLabels<T>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Stack the images into one `batch x height x width x channels` array.
    ///
    /// Fails unless every image has the same shape, which only a `resize` or a crop guarantees.
    pub fn stack_images(&self) -> BatchResult<Array4<u8>> {
        let Some(first) = self.images.first() else {
            return Err(BatchError::transform("stack", "batch has no images"));
        };
        if let Some(odd) = self.images.iter().find(|img| img.shape() != first.shape()) {
            return Err(BatchError::transform(
                "stack",
                format!(
                    "image shapes differ ({:?} vs {:?}); configure resize to get a uniform batch",
                    first.shape(),
                    odd.shape()
                ),
            ));
        }
        let views: Vec<_> = self.images.iter().map(|img| img.view()).collect();
        ndarray::stack(Axis(0), &views).map_err(|e| BatchError::transform("stack", e.to_string()))
    }
}

/// Indefinite producer of augmented detection batches.
///
/// The dataset is fixed at construction; only the visiting order changes between passes.
pub struct BatchGenerator<T = ArrayD<f32>> {
    samples: Vec<Sample>,
    loader: Box<dyn ImageLoader>,
    encoder: Option<Box<dyn LabelEncoder<Target = T>>>,
    pipeline: AugmentationPipeline,
    cycler: BatchCycler,
    rng: StdRng,
}

impl<T> BatchGenerator<T> {
    /// `seed` makes the visiting order and every augmentation draw reproducible
    pub fn new(
        samples: Vec<Sample>,
        loader: impl ImageLoader + 'static,
        seed: Option<u64>,
    ) -> BatchResult<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let cycler = BatchCycler::new(samples.len(), StdRng::seed_from_u64(rng.gen()))?;

        let boxes: usize = samples.iter().map(|s| s.boxes.len()).sum();
        info!(
            "Batch generator ready: {} images, {} boxes",
            samples.len(),
            boxes
        );

        Ok(BatchGenerator {
            samples,
            loader: Box::new(loader),
            encoder: None,
            pipeline: AugmentationPipeline::new(TransformConfig::default())?,
            cycler,
            rng,
        })
    }

    pub fn from_source(
        source: &dyn LabelSource,
        classes: &ClassMap,
        loader: impl ImageLoader + 'static,
        seed: Option<u64>,
    ) -> BatchResult<Self> {
        Self::new(source.load(classes)?, loader, seed)
    }

    /// Needed before any [`BatchMode::Train`] batch
    #[must_use]
    pub fn with_encoder(mut self, encoder: impl LabelEncoder<Target = T> + 'static) -> Self {
        self.encoder = Some(Box::new(encoder));
        self
    }

    pub fn set_encoder(&mut self, encoder: Box<dyn LabelEncoder<Target = T>>) {
        self.encoder = Some(encoder);
    }

    /// Replace the augmentation options; invalid options leave the current ones in place
    pub fn configure(&mut self, config: TransformConfig) -> BatchResult<()> {
        self.pipeline = AugmentationPipeline::new(config)?;
        info!("Transforms: {}", self.pipeline.config().describe());
        Ok(())
    }

    pub fn config(&self) -> &TransformConfig {
        self.pipeline.config()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Passes over the dataset started so far
    pub fn pass(&self) -> usize {
        self.cycler.pass()
    }

    /// Produce the next batch of up to `batch_size` images.
    ///
    /// Images whose random crop never kept an object are dropped, so the batch can come back
    /// smaller than requested. Any decode, transform or encode error abandons the whole batch.
    pub fn next_batch(&mut self, batch_size: usize, mode: BatchMode) -> BatchResult<Batch<T>> {
        if mode == BatchMode::Train && self.encoder.is_none() {
            return Err(BatchError::config("training batches need a label encoder"));
        }

        let started = Instant::now();
        let window = self.cycler.next_window(batch_size)?;

        let images = window
            .iter()
            .map(|&i| self.loader.load(&self.samples[i].filename))
            .collect::<BatchResult<Vec<_>>>()?;
        let items = images
            .into_iter()
            .zip(&window)
            .map(|(image, &i)| Augmented::new(image, self.samples[i].boxes.clone()))
            .collect();

        let output = self.pipeline.apply_batch(items, &mut self.rng)?;
        debug!(
            "Batch of {} images ({} dropped) in pass {}, {:.1}ms",
            output.items.len(),
            output.removed,
            self.cycler.pass(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        let (images, boxes): (Vec<_>, Vec<_>) = output
            .items
            .into_iter()
            .map(|item| (item.image, item.boxes))
            .unzip();

        let labels = match (mode, &self.encoder) {
            (BatchMode::Train, Some(encoder)) => BatchLabels::Encoded(encoder.encode(&boxes)?),
            (BatchMode::Train, None) => {
                return Err(BatchError::config("training batches need a label encoder"))
            }
            (BatchMode::Infer, _) => BatchLabels::Boxes {
                boxes,
                filenames: output
                    .kept
                    .iter()
                    .map(|&k| self.samples[window[k]].filename.clone())
                    .collect(),
            },
        };

        Ok(Batch { images, labels })
    }
}
