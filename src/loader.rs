//! Image decoding.

use crate::convert;
use crate::error::{BatchError, BatchResult};
use ndarray::Array3;
use std::path::{Path, PathBuf};

/// Decodes the image behind a sample's filename
pub trait ImageLoader {
    /// Height x width x 3 RGB pixels
    fn load(&self, filename: &str) -> BatchResult<Array3<u8>>;
}

/// Reads image files from a root directory with the `image` crate
#[derive(Clone, Debug)]
pub struct FileImageLoader {
    root: PathBuf,
}

impl FileImageLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        FileImageLoader {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageLoader for FileImageLoader {
    fn load(&self, filename: &str) -> BatchResult<Array3<u8>> {
        load_image_as_rgb(self.root.join(filename))
    }
}

/// Decode any format the `image` crate knows into an RGB array
pub fn load_image_as_rgb(path: impl AsRef<Path>) -> BatchResult<Array3<u8>> {
    let path = path.as_ref();
    let rgb = image::open(path)
        .map_err(|source| BatchError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    Ok(convert::from_rgb_image(&rgb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_png_round_trip_keeps_rgb_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = RgbImage::new(4, 3);
        img.put_pixel(2, 1, Rgb([200, 10, 50]));
        img.save(dir.path().join("frame.png")).unwrap();

        let loader = FileImageLoader::new(dir.path());
        let array = loader.load("frame.png").unwrap();
        assert_eq!(array.shape(), &[3, 4, 3]);
        assert_eq!(array[[1, 2, 0]], 200);
        assert_eq!(array[[1, 2, 1]], 10);
        assert_eq!(array[[1, 2, 2]], 50);
        assert_eq!(array[[0, 0, 0]], 0);
    }

    #[test]
    fn test_missing_file_is_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileImageLoader::new(dir.path()).load("nope.png").unwrap_err();
        assert!(matches!(err, BatchError::Image { .. }));
    }
}
