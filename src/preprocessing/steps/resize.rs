use crate::error::OmrError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Default enlargement of header crops before recognition
pub const DEFAULT_UPSCALE: u32 = 3;
/// Maximum dimension to avoid memory issues
const MAX_DIMENSION: u32 = 8000;

/// Scale both sides by `factor`, clamped to a sane maximum. Small text
/// crops need strokes several pixels wide to be recognized.
pub fn upscale(image: DynamicImage, factor: u32) -> Result<DynamicImage, OmrError> {
    let (width, height) = image.dimensions();
    if factor <= 1 || width == 0 || height == 0 {
        return Ok(image);
    }

    let mut new_width = width.saturating_mul(factor);
    let mut new_height = height.saturating_mul(factor);

    if new_width > MAX_DIMENSION || new_height > MAX_DIMENSION {
        let max_dim = new_width.max(new_height);
        let scale_down = MAX_DIMENSION as f32 / max_dim as f32;
        new_width = ((new_width as f32 * scale_down) as u32).max(1);
        new_height = ((new_height as f32 * scale_down) as u32).max(1);
    }

    Ok(image.resize_exact(new_width, new_height, FilterType::CatmullRom))
}

/// Resize to `target_width`, keeping the aspect ratio
pub fn to_width(image: &DynamicImage, target_width: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width == target_width || width == 0 || target_width == 0 {
        return image.clone();
    }
    let scale = target_width as f64 / width as f64;
    let target_height = ((height as f64 * scale).round() as u32).max(1);
    image.resize_exact(target_width, target_height, FilterType::Triangle)
}
