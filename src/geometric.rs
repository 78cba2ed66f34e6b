//! Spatial transforms. Each returns the new image together with whatever the box remapping
//! in [`crate::boxes`] needs to follow it.

use crate::affine::{warp_affine, AffineTransform};
use crate::config::FixedCrop;
use crate::convert;
use crate::error::{BatchError, BatchResult};
use image::imageops::{self, FilterType};
use ndarray::{s, Array3, ArrayView3};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Where a crop window sits relative to its source image.
///
/// A negative range on an axis means the window is larger than the source there; the origin on
/// that axis is then the offset of the source on a black canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropPlacement {
    pub height: usize,
    pub width: usize,
    pub y_range: i64,
    pub x_range: i64,
    pub origin_y: usize,
    pub origin_x: usize,
}

impl CropPlacement {
    pub fn new(src_height: usize, src_width: usize, height: usize, width: usize) -> Self {
        CropPlacement {
            height,
            width,
            y_range: src_height as i64 - height as i64,
            x_range: src_width as i64 - width as i64,
            origin_y: 0,
            origin_x: 0,
        }
    }

    /// Draw an origin uniformly over the `|range| + 1` positions of each axis
    pub fn with_random_origin<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.origin_y = rng.gen_range(0..=self.y_range.unsigned_abs() as usize);
        self.origin_x = rng.gen_range(0..=self.x_range.unsigned_abs() as usize);
        self
    }

    /// `(source start, destination start, length)` for one axis
    fn axis_span(range: i64, origin: usize, window: usize, source: usize) -> (usize, usize, usize) {
        if range >= 0 {
            (origin, 0, window)
        } else {
            (0, origin, source)
        }
    }
}

/// Shift the image by a random amount inside the given magnitude ranges.
///
/// Each axis picks a magnitude uniformly in `[min, max]` and flips its sign with probability
/// one half. Revealed pixels are black. Returns the signed shift.
pub fn translate<R: Rng + ?Sized>(
    image: &Array3<u8>,
    horizontal: (i32, i32),
    vertical: (i32, i32),
    rng: &mut R,
) -> (Array3<u8>, (i32, i32)) {
    let x = rng.gen_range(horizontal.0..=horizontal.1);
    let y = rng.gen_range(vertical.0..=vertical.1);
    let dx = if rng.gen_bool(0.5) { -x } else { x };
    let dy = if rng.gen_bool(0.5) { -y } else { y };
    (shift(image, dx, dy), (dx, dy))
}

/// Deterministic part of [`translate`]
pub fn shift(image: &Array3<u8>, dx: i32, dy: i32) -> Array3<u8> {
    let (height, width) = (image.shape()[0], image.shape()[1]);
    let transform = AffineTransform::translation(dx as f32, dy as f32);
    warp_affine(&image.view(), &transform, height, width)
}

pub fn flip(image: &Array3<u8>, axis: FlipAxis) -> Array3<u8> {
    match axis {
        FlipAxis::Horizontal => image.slice(s![.., ..;-1, ..]).to_owned(),
        FlipAxis::Vertical => image.slice(s![..;-1, .., ..]).to_owned(),
    }
}

/// Zoom about the image center by a factor drawn from `[min, max]`, keeping the extent.
pub fn scale<R: Rng + ?Sized>(
    image: &Array3<u8>,
    min: f64,
    max: f64,
    rng: &mut R,
) -> (Array3<u8>, AffineTransform) {
    let factor = if max > min { rng.gen_range(min..max) } else { min };
    scale_by(image, factor as f32)
}

/// Deterministic part of [`scale`]
pub fn scale_by(image: &Array3<u8>, factor: f32) -> (Array3<u8>, AffineTransform) {
    let (height, width) = (image.shape()[0], image.shape()[1]);
    let center = (width as f32 / 2.0, height as f32 / 2.0);
    let transform = AffineTransform::about_center(center, factor);
    let warped = warp_affine(&image.view(), &transform, height, width);
    (warped, transform)
}

/// Triangle-filtered resize to `width` x `height`, one `image` luma plane per channel so any
/// channel count goes through the same filter.
#[allow(clippy::cast_possible_truncation)]
pub fn resize(image: &ArrayView3<'_, u8>, width: usize, height: usize) -> Array3<u8> {
    let shape = image.shape();
    if shape[0] == height && shape[1] == width {
        return image.to_owned();
    }

    let planes: Vec<_> = (0..shape[2])
        .map(|c| {
            let plane = convert::channel_plane(image, c);
            imageops::resize(&plane, width as u32, height as u32, FilterType::Triangle)
        })
        .collect();
    convert::from_planes(&planes, height, width)
}

/// Cut fixed margins off each side
pub fn crop_fixed(image: &Array3<u8>, crop: &FixedCrop) -> BatchResult<Array3<u8>> {
    let (height, width) = (image.shape()[0], image.shape()[1]);
    if crop.top + crop.bottom >= height || crop.left + crop.right >= width {
        return Err(BatchError::transform(
            "crop",
            format!("margins {crop:?} leave nothing of a {width}x{height} image"),
        ));
    }
    Ok(image
        .slice(s![
            crop.top..height - crop.bottom,
            crop.left..width - crop.right,
            ..
        ])
        .to_owned())
}

/// Cut the window described by `placement` out of the image, placing the source on a black
/// canvas along any axis where the window is the larger of the two.
pub fn crop_or_place(image: &Array3<u8>, placement: &CropPlacement) -> Array3<u8> {
    let shape = image.shape();
    let (src_h, src_w, channels) = (shape[0], shape[1], shape[2]);

    let (sy, dy, len_y) =
        CropPlacement::axis_span(placement.y_range, placement.origin_y, placement.height, src_h);
    let (sx, dx, len_x) =
        CropPlacement::axis_span(placement.x_range, placement.origin_x, placement.width, src_w);

    let mut canvas = Array3::zeros((placement.height, placement.width, channels));
    canvas
        .slice_mut(s![dy..dy + len_y, dx..dx + len_x, ..])
        .assign(&image.slice(s![sy..sy + len_y, sx..sx + len_x, ..]));
    canvas
}
