use crate::error::OmrError;
use image::DynamicImage;

/// Reduce to a single luma channel. Alpha is dropped; sheets are opaque.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OmrError> {
    match image {
        DynamicImage::ImageLuma8(_) => Ok(image),
        other => Ok(DynamicImage::ImageLuma8(other.to_luma8())),
    }
}
