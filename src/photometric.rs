//! Pixel-value transforms. None of these move pixels, so boxes are never touched.

use crate::convert;
use crate::error::{BatchError, BatchResult};
use image::DynamicImage;
use ndarray::{Array3, Axis};
use rand::Rng;

/// RGB in `0..=255` to HSV with hue in degrees, saturation in `[0, 1]` and value in `0..=255`
fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= f32::EPSILON {
        0.0
    } else if (max - r).abs() <= f32::EPSILON {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if (max - g).abs() <= f32::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };

    (hue, saturation, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let chroma = v * s;
    let sector = h / 60.0;
    let x = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let m = v - chroma;

    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    (r + m, g + m, b + m)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Multiply the HSV value channel by a factor drawn from `[min, max]`.
///
/// The value channel saturates at 255 instead of wrapping.
pub fn brightness<R: Rng + ?Sized>(
    image: &Array3<u8>,
    min: f64,
    max: f64,
    rng: &mut R,
) -> BatchResult<Array3<u8>> {
    let factor = if max > min { rng.gen_range(min..max) } else { min };
    brightness_by(image, factor as f32)
}

/// Deterministic part of [`brightness`]
pub fn brightness_by(image: &Array3<u8>, factor: f32) -> BatchResult<Array3<u8>> {
    if image.shape()[2] != 3 {
        return Err(BatchError::transform(
            "brightness",
            format!("expected 3 RGB channels, got {}", image.shape()[2]),
        ));
    }

    let mut output = image.clone();
    for mut pixel in output.lanes_mut(Axis(2)) {
        let (h, s, v) = rgb_to_hsv(
            f32::from(pixel[0]),
            f32::from(pixel[1]),
            f32::from(pixel[2]),
        );
        let (r, g, b) = hsv_to_rgb(h, s, (v * factor).min(255.0));
        pixel[0] = to_u8(r);
        pixel[1] = to_u8(g);
        pixel[2] = to_u8(b);
    }
    Ok(output)
}

/// Per-channel histogram equalization; the channel count is preserved.
pub fn histogram_eq(image: &Array3<u8>) -> Array3<u8> {
    let mut output = image.clone();

    for mut channel in output.axis_iter_mut(Axis(2)) {
        let mut hist = [0usize; 256];
        for &v in channel.iter() {
            hist[v as usize] += 1;
        }
        let total: usize = hist.iter().sum();
        let Some(first) = hist.iter().position(|&count| count > 0) else {
            continue;
        };
        // A flat channel has nothing to spread out
        if hist[first] == total {
            continue;
        }

        let scale = 255.0 / (total - hist[first]) as f32;
        let mut lut = [0u8; 256];
        let mut cumulative = 0usize;
        for level in first + 1..256 {
            cumulative += hist[level];
            lut[level] = to_u8(cumulative as f32 * scale);
        }

        channel.mapv_inplace(|v| lut[v as usize]);
    }

    output
}

/// Single-channel luma through the `image` crate's RGB to luma conversion.
pub fn grayscale(image: &Array3<u8>) -> BatchResult<Array3<u8>> {
    match image.shape()[2] {
        1 => Ok(image.clone()),
        3 => {
            let rgb = DynamicImage::ImageRgb8(convert::to_rgb_image(&image.view()));
            let luma = rgb.to_luma8();
            let (height, width) = (image.shape()[0], image.shape()[1]);
            Ok(convert::from_planes(&[luma], height, width))
        }
        n => Err(BatchError::transform(
            "gray",
            format!("expected 1 or 3 channels, got {n}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn pixel(rgb: [u8; 3]) -> Array3<u8> {
        Array3::from_shape_vec((1, 1, 3), rgb.to_vec()).unwrap()
    }

    #[test]
    fn test_hsv_round_trip() {
        for rgb in [[0, 0, 0], [255, 255, 255], [200, 30, 90], [12, 240, 7], [40, 90, 250]] {
            let (h, s, v) = rgb_to_hsv(f32::from(rgb[0]), f32::from(rgb[1]), f32::from(rgb[2]));
            let (r, g, b) = hsv_to_rgb(h, s, v);
            assert_eq!([to_u8(r), to_u8(g), to_u8(b)], rgb);
        }
    }

    #[test]
    fn test_brightness_doubles_value() {
        let out = brightness_by(&pixel([100, 50, 24]), 2.0).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[200, 100, 48]);
    }

    #[test]
    fn test_brightness_saturates_without_overflow() {
        let out = brightness_by(&pixel([100, 50, 20]), 3.0).unwrap();
        let px = out.as_slice().unwrap();
        assert_eq!(px[0], 255);
        assert!((i32::from(px[1]) - 128).abs() <= 1);
        assert!((i32::from(px[2]) - 51).abs() <= 1);
    }

    #[test]
    fn test_brightness_requires_rgb() {
        let gray = Array3::<u8>::zeros((2, 2, 1));
        assert!(brightness_by(&gray, 1.5).is_err());
    }

    #[test]
    fn test_histogram_eq_spreads_levels() {
        let image = Array3::from_shape_vec((1, 4, 1), vec![10, 10, 20, 30]).unwrap();
        let out = histogram_eq(&image);
        assert_eq!(out.as_slice().unwrap(), &[0, 0, 128, 255]);
    }

    #[test]
    fn test_histogram_eq_keeps_flat_channel_and_channel_count() {
        let image = Array3::from_elem((3, 3, 3), 42u8);
        let out = histogram_eq(&image);
        assert_eq!(out, image);
    }

    #[test]
    fn test_grayscale_single_channel() {
        let white = grayscale(&pixel([255, 255, 255])).unwrap();
        assert_eq!(white.shape(), &[1, 1, 1]);
        assert_eq!(white[[0, 0, 0]], 255);
        assert_eq!(grayscale(&pixel([0, 0, 0])).unwrap()[[0, 0, 0]], 0);

        // Green weighs most, blue least
        let luma = |rgb| grayscale(&pixel(rgb)).unwrap()[[0, 0, 0]];
        assert!(luma([0, 255, 0]) > luma([255, 0, 0]));
        assert!(luma([255, 0, 0]) > luma([0, 0, 255]));

        let gray = Array3::from_elem((2, 2, 1), 9u8);
        assert_eq!(grayscale(&gray).unwrap(), gray);
        assert!(grayscale(&Array3::zeros((2, 2, 4))).is_err());
    }
}
