//! Common test utilities for integration tests
//! Provides synthetic scenes with known boxes, an in-memory image loader and a trivial encoder
#![allow(dead_code)]

use detection_batch_gen::{
    BatchError, BatchResult, GroundTruthBox, ImageLoader, LabelEncoder, Sample,
};
use ndarray::Array3;
use std::collections::HashMap;

/// Gray level of the scene background
pub const BACKGROUND: u8 = 128;

/// Distinct object colors (RGB), cycled by object index
pub const COLORS: [[u8; 3]; 8] = [
    [255, 0, 0],     // Red
    [0, 255, 0],     // Green
    [0, 0, 255],     // Blue
    [255, 255, 0],   // Yellow
    [255, 0, 255],   // Magenta
    [0, 255, 255],   // Cyan
    [192, 192, 192], // Silver
    [128, 0, 0],     // Maroon
];

/// Synthetic image with the boxes of the objects drawn on it
#[derive(Clone, Debug)]
pub struct TestScene {
    /// Height x width x 3 RGB pixels
    pub image: Array3<u8>,
    /// One box per drawn object, class id = object index modulo `num_classes`
    pub boxes: Vec<GroundTruthBox>,
}

/// Generate a scene with filled, non-overlapping rectangles
///
/// Objects sit in the cells of a grid, each covering the middle half of its cell, so every box
/// is strictly inside the image.
///
/// # Arguments
/// * `num_objects` - Number of objects to draw
/// * `num_classes` - Number of classes the objects are spread over
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
///
/// # Returns
/// `TestScene` with the image and one box per object
pub fn generate_scene(
    num_objects: usize,
    num_classes: usize,
    width: usize,
    height: usize,
) -> TestScene {
    let mut image = Array3::from_elem((height, width, 3), BACKGROUND);
    let mut boxes = Vec::with_capacity(num_objects);
    if num_objects == 0 {
        return TestScene { image, boxes };
    }

    let cols = (num_objects as f64).sqrt().ceil() as usize;
    let rows = num_objects.div_ceil(cols);
    let cell_w = width / cols;
    let cell_h = height / rows;

    for index in 0..num_objects {
        let (row, col) = (index / cols, index % cols);
        let xmin = col * cell_w + cell_w / 4;
        let xmax = col * cell_w + 3 * cell_w / 4;
        let ymin = row * cell_h + cell_h / 4;
        let ymax = row * cell_h + 3 * cell_h / 4;

        let color = COLORS[index % COLORS.len()];
        for y in ymin..ymax {
            for x in xmin..xmax {
                for c in 0..3 {
                    image[[y, x, c]] = color[c];
                }
            }
        }

        boxes.push(GroundTruthBox::new(
            index % num_classes.max(1),
            xmin as i32,
            xmax as i32,
            ymin as i32,
            ymax as i32,
        ));
    }

    TestScene { image, boxes }
}

/// Fraction of pixels inside `b` (clamped to the image) whose RGB equals `color`
pub fn fill_ratio(image: &Array3<u8>, b: &GroundTruthBox, color: [u8; 3]) -> f64 {
    let (height, width) = (image.shape()[0] as i32, image.shape()[1] as i32);
    let (x0, x1) = (b.xmin.max(0), b.xmax.min(width));
    let (y0, y1) = (b.ymin.max(0), b.ymax.min(height));
    if x1 <= x0 || y1 <= y0 {
        return 0.0;
    }

    let mut hits = 0usize;
    for y in y0..y1 {
        for x in x0..x1 {
            let (y, x) = (y as usize, x as usize);
            if (0..3).all(|c| image[[y, x, c]] == color[c]) {
                hits += 1;
            }
        }
    }
    hits as f64 / ((x1 - x0) * (y1 - y0)) as f64
}

/// Image loader over an in-memory map of filename to pixels
#[derive(Clone, Debug, Default)]
pub struct MemoryLoader {
    pub images: HashMap<String, Array3<u8>>,
}

impl ImageLoader for MemoryLoader {
    fn load(&self, filename: &str) -> BatchResult<Array3<u8>> {
        self.images.get(filename).cloned().ok_or_else(|| BatchError::Io {
            path: filename.into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not in memory"),
        })
    }
}

/// Build `count` scenes of `width` x `height`, each with `1 + i % 4` objects
///
/// # Returns
/// Samples named `scene_000.png`, `scene_001.png`, ... and a loader serving their pixels
pub fn build_dataset(count: usize, width: usize, height: usize) -> (Vec<Sample>, MemoryLoader) {
    let mut loader = MemoryLoader::default();
    let samples = (0..count)
        .map(|i| {
            let scene = generate_scene(1 + i % 4, 3, width, height);
            let filename = format!("scene_{i:03}.png");
            loader.images.insert(filename.clone(), scene.image);
            Sample {
                filename,
                boxes: scene.boxes,
            }
        })
        .collect();
    (samples, loader)
}

/// Encodes a batch as the number of boxes per image
pub struct BoxCountEncoder;

impl LabelEncoder for BoxCountEncoder {
    type Target = Vec<usize>;

    fn encode(&self, boxes: &[Vec<GroundTruthBox>]) -> BatchResult<Vec<usize>> {
        Ok(boxes.iter().map(Vec::len).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_single_object() {
        let scene = generate_scene(1, 1, 64, 32);
        assert_eq!(scene.image.shape(), &[32, 64, 3]);
        assert_eq!(scene.boxes, vec![GroundTruthBox::new(0, 16, 48, 8, 24)]);
        assert!((fill_ratio(&scene.image, &scene.boxes[0], COLORS[0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_generate_multiple_objects() {
        for num_objects in [1, 3, 5, 8] {
            let scene = generate_scene(num_objects, 3, 200, 120);
            assert_eq!(scene.boxes.len(), num_objects);
            for (i, b) in scene.boxes.iter().enumerate() {
                assert!(b.is_within(120, 200));
                assert_eq!(b.class_id, i % 3);
                assert!(fill_ratio(&scene.image, b, COLORS[i % COLORS.len()]) > 0.99);
            }
        }
    }

    #[test]
    fn test_generate_empty() {
        let scene = generate_scene(0, 1, 32, 32);
        assert!(scene.boxes.is_empty());
        assert!(scene.image.iter().all(|&v| v == BACKGROUND));
    }
}
