use crate::error::OmrError;
use image::{DynamicImage, GrayImage};
use imageproc::filter::median_filter;

/// Apply median filter to reduce noise
/// Median filter preserves edges better than Gaussian blur
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OmrError> {
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(median(&gray, 1)))
}

/// Square median filter of the given radius (0 leaves the image as is)
pub fn median(gray: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return gray.clone();
    }
    median_filter(gray, radius, radius)
}
