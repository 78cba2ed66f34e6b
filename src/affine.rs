use ndarray::{Array2, Array3, ArrayView3};

/// A 2x3 affine transformation matrix and the zoom factor it was built from
#[derive(Clone, Debug)]
pub struct AffineTransform {
    /// 2x3 affine transformation matrix, maps source pixel coordinates to destination
    pub matrix: Array2<f32>,
    pub scale: f32,
}

impl AffineTransform {
    /// Uniform scaling about `center`: `[[s, 0, (1-s)cx], [0, s, (1-s)cy]]`, the layout
    /// OpenCV's `getRotationMatrix2D` produces at zero angle.
    pub fn about_center(center: (f32, f32), scale: f32) -> Self {
        let (cx, cy) = center;

        let mut matrix = Array2::zeros((2, 3));
        matrix[[0, 0]] = scale;
        matrix[[0, 2]] = (1.0 - scale) * cx;
        matrix[[1, 1]] = scale;
        matrix[[1, 2]] = (1.0 - scale) * cy;

        AffineTransform { matrix, scale }
    }

    /// Pure translation by (`dx`, `dy`)
    pub fn translation(dx: f32, dy: f32) -> Self {
        let mut matrix = Self::identity().matrix;
        matrix[[0, 2]] = dx;
        matrix[[1, 2]] = dy;
        AffineTransform { matrix, scale: 1.0 }
    }

    /// Create identity transformation
    pub fn identity() -> Self {
        AffineTransform {
            matrix: Array2::from_shape_fn((2, 3), |(i, j)| if i == j { 1.0 } else { 0.0 }),
            scale: 1.0,
        }
    }

    /// Apply the transformation to a point given in homogeneous form `(x, y, 1)`
    pub fn apply(&self, point: (f32, f32)) -> (f32, f32) {
        let (x, y) = point;
        let m = &self.matrix;

        let new_x = m[[0, 0]] * x + m[[0, 1]] * y + m[[0, 2]];
        let new_y = m[[1, 0]] * x + m[[1, 1]] * y + m[[1, 2]];

        (new_x, new_y)
    }

    /// Inverse transformation; a singular matrix falls back to identity
    pub fn inverse(&self) -> AffineTransform {
        let m = &self.matrix;

        let det = m[[0, 0]] * m[[1, 1]] - m[[0, 1]] * m[[1, 0]];
        if det.abs() < 1e-10 {
            return AffineTransform::identity();
        }

        let mut inv_m = Array2::zeros((2, 3));

        inv_m[[0, 0]] = m[[1, 1]] / det;
        inv_m[[0, 1]] = -m[[0, 1]] / det;
        inv_m[[1, 0]] = -m[[1, 0]] / det;
        inv_m[[1, 1]] = m[[0, 0]] / det;

        inv_m[[0, 2]] = -(inv_m[[0, 0]] * m[[0, 2]] + inv_m[[0, 1]] * m[[1, 2]]);
        inv_m[[1, 2]] = -(inv_m[[1, 0]] * m[[0, 2]] + inv_m[[1, 1]] * m[[1, 2]]);

        AffineTransform {
            matrix: inv_m,
            scale: 1.0 / self.scale,
        }
    }
}

/// Bilinear sample of channel `c` at fractional source position (`x`, `y`); pixels outside the
/// image read as zero
fn sample_bilinear(image: &ArrayView3<'_, u8>, x: f32, y: f32, c: usize) -> f32 {
    let shape = image.shape();
    let (height, width) = (shape[0] as i64, shape[1] as i64);

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let pixel = |px: i64, py: i64| -> f32 {
        if px < 0 || py < 0 || px >= width || py >= height {
            0.0
        } else {
            f32::from(image[[py as usize, px as usize, c]])
        }
    };

    let top = pixel(x0, y0) * (1.0 - fx) + pixel(x0 + 1, y0) * fx;
    let bottom = pixel(x0, y0 + 1) * (1.0 - fx) + pixel(x0 + 1, y0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Warp `image` through `transform` into an output of `out_height` x `out_width`.
///
/// Each destination pixel is mapped back through the inverse matrix and sampled bilinearly;
/// destination pixels whose source lies outside the input are black.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn warp_affine(
    image: &ArrayView3<'_, u8>,
    transform: &AffineTransform,
    out_height: usize,
    out_width: usize,
) -> Array3<u8> {
    let channels = image.shape()[2];
    let inverse = transform.inverse();
    let mut output = Array3::zeros((out_height, out_width, channels));

    for y in 0..out_height {
        for x in 0..out_width {
            let (src_x, src_y) = inverse.apply((x as f32, y as f32));
            for c in 0..channels {
                let value = sample_bilinear(image, src_x, src_y, c);
                output[[y, x, c]] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let t = AffineTransform::identity();
        let (x, y) = t.apply((10.0, 20.0));
        assert!((x - 10.0).abs() < 1e-5);
        assert!((y - 20.0).abs() < 1e-5);
    }

    #[test]
    fn test_translation() {
        let t = AffineTransform::translation(5.0, 10.0);
        let (x, y) = t.apply((0.0, 0.0));
        assert!((x - 5.0).abs() < 1e-5);
        assert!((y - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_scale_about_center_keeps_center_fixed() {
        let t = AffineTransform::about_center((50.0, 25.0), 1.7);
        let (x, y) = t.apply((50.0, 25.0));
        assert!((x - 50.0).abs() < 1e-4);
        assert!((y - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_scale_about_center_moves_corners_outward() {
        // [[s, 0, (1-s)cx], [0, s, (1-s)cy]] with s = 2, c = (10, 10)
        let t = AffineTransform::about_center((10.0, 10.0), 2.0);
        assert!((t.matrix[[0, 2]] + 10.0).abs() < 1e-5);
        assert!((t.matrix[[1, 2]] + 10.0).abs() < 1e-5);
        let (x, y) = t.apply((0.0, 0.0));
        assert!((x + 10.0).abs() < 1e-5);
        assert!((y + 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = AffineTransform::about_center((32.0, 16.0), 1.5);
        let inv = t.inverse();
        assert!((inv.scale - 1.0 / 1.5).abs() < 1e-6);

        let point = (100.0, 50.0);
        let forward = t.apply(point);
        let back = inv.apply(forward);

        assert!((back.0 - point.0).abs() < 1e-3);
        assert!((back.1 - point.1).abs() < 1e-3);
    }

    #[test]
    fn test_singular_matrix_inversion_falls_back_to_identity() {
        let t = AffineTransform::about_center((0.0, 0.0), 0.0);
        let inv = t.inverse();
        let (x, y) = inv.apply((5.0, 5.0));
        assert!((x - 5.0).abs() < 1e-5);
        assert!((y - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_warp_identity_is_exact_copy() {
        let image = Array3::from_shape_fn((6, 9, 3), |(y, x, c)| (y * 31 + x * 7 + c) as u8);
        let warped = warp_affine(&image.view(), &AffineTransform::identity(), 6, 9);
        assert_eq!(warped, image);
    }

    #[test]
    fn test_warp_integer_translation_shifts_and_fills_black() {
        let image = Array3::from_elem((4, 4, 1), 200u8);
        let warped = warp_affine(&image.view(), &AffineTransform::translation(2.0, 1.0), 4, 4);

        assert_eq!(warped[[0, 0, 0]], 0);
        assert_eq!(warped[[1, 1, 0]], 0);
        assert_eq!(warped[[1, 2, 0]], 200);
        assert_eq!(warped[[3, 3, 0]], 200);
    }

    #[test]
    fn test_sample_bilinear_blends_and_fills_black() {
        let image = Array3::from_shape_fn((2, 2, 1), |(y, x, _)| (y * 2 + x) as u8 * 10);
        let view = image.view();
        assert!((sample_bilinear(&view, 0.5, 0.0, 0) - 5.0).abs() < 1e-5);
        assert!((sample_bilinear(&view, 0.5, 0.5, 0) - 15.0).abs() < 1e-5);
        assert!(sample_bilinear(&view, -3.0, -3.0, 0).abs() < 1e-5);
    }
}
