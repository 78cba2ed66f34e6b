//! Conversions between `Array3<u8>` (height x width x channels) and `image` buffers.

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array3, ArrayView3};

/// Expects exactly three channels; callers check the shape first
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn to_rgb_image(image: &ArrayView3<'_, u8>) -> RgbImage {
    let (height, width) = (image.shape()[0], image.shape()[1]);
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([image[[y, x, 0]], image[[y, x, 1]], image[[y, x, 2]]])
    })
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn from_rgb_image(rgb: &RgbImage) -> Array3<u8> {
    let (width, height) = rgb.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c]
    })
}

/// One channel of `image` as a luma buffer
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn channel_plane(image: &ArrayView3<'_, u8>, channel: usize) -> GrayImage {
    let (height, width) = (image.shape()[0], image.shape()[1]);
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([image[[y as usize, x as usize, channel]]])
    })
}

/// Stack same-sized luma planes back into a `height x width x planes.len()` array
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn from_planes(planes: &[GrayImage], height: usize, width: usize) -> Array3<u8> {
    Array3::from_shape_fn((height, width, planes.len()), |(y, x, c)| {
        planes[c].get_pixel(x as u32, y as u32)[0]
    })
}
