use crate::error::OmrError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;

/// Foreground value in every binary mask produced here
pub const FOREGROUND: u8 = 255;

/// Binarize with Otsu's global level, dark content becoming foreground.
/// Header crops come out as light text on a black background.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OmrError> {
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(otsu_inverted(&gray)))
}

/// Global Otsu threshold, inverted: pixels at or below the level are set
pub fn otsu_inverted(img: &GrayImage) -> GrayImage {
    if img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    // No contrast, nothing to separate
    let first = img.get_pixel(0, 0).0[0];
    if img.pixels().all(|p| p.0[0] == first) {
        return GrayImage::new(img.width(), img.height());
    }
    let level = otsu_level(img);
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y).0[0] <= level {
            Luma([FOREGROUND])
        } else {
            Luma([0u8])
        }
    })
}

/// Local mean threshold, inverted: a pixel is set when it is at least
/// `offset` darker than the mean of the `block_size` window around it.
/// Copes with uneven illumination where a single global level cannot.
pub fn adaptive_mean_inverted(img: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let half_window = (block_size / 2) as i32;

    // Precompute integral images for efficient window statistics
    let integral = compute_integral_image(img);

    GrayImage::from_fn(width, height, |x, y| {
        let x1 = (x as i32 - half_window).max(0) as u32;
        let y1 = (y as i32 - half_window).max(0) as u32;
        let x2 = (x as i32 + half_window).min(width as i32 - 1) as u32;
        let y2 = (y as i32 + half_window).min(height as i32 - 1) as u32;

        let mean = window_mean(&integral, x1, y1, x2, y2);
        let pixel = img.get_pixel(x, y).0[0] as f32;
        if pixel <= mean - offset {
            Luma([FOREGROUND])
        } else {
            Luma([0u8])
        }
    })
}

/// Pixel-wise OR of two masks of equal size
pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y).0[0].max(b.get_pixel(x, y).0[0])])
    })
}

/// Compute the integral image
fn compute_integral_image(img: &GrayImage) -> Vec<Vec<f64>> {
    let (width, height) = img.dimensions();
    let mut integral = vec![vec![0.0f64; width as usize + 1]; height as usize + 1];

    for y in 0..height as usize {
        for x in 0..width as usize {
            let val = img.get_pixel(x as u32, y as u32).0[0] as f64;
            integral[y + 1][x + 1] = val + integral[y][x + 1] + integral[y + 1][x] - integral[y][x];
        }
    }

    integral
}

/// Mean of an inclusive window using the integral image
fn window_mean(integral: &[Vec<f64>], x1: u32, y1: u32, x2: u32, y2: u32) -> f32 {
    let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize + 1, y2 as usize + 1);
    let area = ((x2 - x1) * (y2 - y1)) as f64;

    let sum = integral[y2][x2] - integral[y1][x2] - integral[y2][x1] + integral[y1][x1];

    (sum / area) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_binarizes_image() {
        let img = GrayImage::from_fn(50, 50, |x, _| Luma([(x as u8 * 5).min(255)]));

        let result = apply(DynamicImage::ImageLuma8(img)).unwrap();
        let result_gray = result.to_luma8();

        for pixel in result_gray.pixels() {
            assert!(
                pixel.0[0] == 0 || pixel.0[0] == FOREGROUND,
                "Expected binary pixel, got {}",
                pixel.0[0]
            );
        }
    }

    #[test]
    fn test_otsu_marks_dark_text_as_foreground() {
        let mut img = GrayImage::from_pixel(50, 20, Luma([240]));
        for x in 10..40 {
            img.put_pixel(x, 10, Luma([20]));
        }

        let mask = otsu_inverted(&img);

        assert_eq!(mask.get_pixel(25, 10).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(25, 5).0[0], 0);
    }

    #[test]
    fn test_otsu_uniform_image_has_no_foreground() {
        let img = GrayImage::from_pixel(20, 20, Luma([230]));
        let mask = otsu_inverted(&img);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_adaptive_handles_uneven_lighting() {
        // Illumination falls off from left to right; a faint stroke on the
        // bright side and one on the dark side must both be found
        let mut img = GrayImage::from_fn(60, 20, |x, _| Luma([230 - (x as u8 * 2)]));
        for y in 5..15 {
            img.put_pixel(10, y, Luma([170]));
            img.put_pixel(50, y, Luma([90]));
        }

        let mask = adaptive_mean_inverted(&img, 15, 3.0);

        assert_eq!(mask.get_pixel(10, 10).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(50, 10).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(30, 10).0[0], 0);
    }

    #[test]
    fn test_union_combines_masks() {
        let mut a = GrayImage::new(4, 1);
        let mut b = GrayImage::new(4, 1);
        a.put_pixel(0, 0, Luma([FOREGROUND]));
        b.put_pixel(3, 0, Luma([FOREGROUND]));

        let merged = union(&a, &b);

        assert_eq!(merged.get_pixel(0, 0).0[0], FOREGROUND);
        assert_eq!(merged.get_pixel(3, 0).0[0], FOREGROUND);
        assert_eq!(merged.get_pixel(1, 0).0[0], 0);
    }
}
