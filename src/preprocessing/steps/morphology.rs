use crate::error::OmrError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Largest square element side; the anchor has to fit in a `u8`
const MAX_ELEMENT: u32 = 255;

/// Close small gaps in binarized strokes with a 2x2 element
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OmrError> {
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(close(&gray, 2)))
}

/// Erosion then dilation with a `size`x`size` square: removes specks
/// narrower than the element
pub fn open(img: &GrayImage, size: u32) -> GrayImage {
    let (element, reflected) = square(size);
    grayscale_dilate(&grayscale_erode(img, &element), &reflected)
}

/// Dilation then erosion with a `size`x`size` square: fills gaps narrower
/// than the element
pub fn close(img: &GrayImage, size: u32) -> GrayImage {
    let (element, reflected) = square(size);
    grayscale_erode(&grayscale_dilate(img, &reflected), &element)
}

/// A square element anchored at `size / 2`, and its reflection.
///
/// imageproc takes the neighbourhood at `p + m` for both erosion and
/// dilation, so the dilation has to use the reflected element for even
/// sizes to leave shapes larger than the element in place.
fn square(size: u32) -> (Mask, Mask) {
    let side = size.clamp(1, MAX_ELEMENT);
    let block = GrayImage::from_pixel(side, side, Luma([255]));
    let anchor = (side / 2) as u8;
    let reflected = (side - 1) as u8 - anchor;
    (
        Mask::from_image(&block, anchor, anchor),
        Mask::from_image(&block, reflected, reflected),
    )
}
