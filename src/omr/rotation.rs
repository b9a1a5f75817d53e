//! Upright normalization driven by the recognizer's orientation cue

use super::config::RotationConfig;
use crate::engine::{Rotation, TextRecognizer};
use image::DynamicImage;

/// Rotate `image` upright when the recognizer reports a quarter turn.
/// Recognizer failures leave the image untouched.
pub fn normalize_rotation(
    image: DynamicImage,
    recognizer: &dyn TextRecognizer,
    config: &RotationConfig,
) -> (DynamicImage, Rotation) {
    if !config.enabled {
        return (image, Rotation::None);
    }

    match recognizer.detect_orientation(&image) {
        Ok(Rotation::None) => (image, Rotation::None),
        Ok(rotation) => {
            tracing::info!("Correcting sheet rotated by {} degrees", rotation.degrees());
            (rotation.correct(&image), rotation)
        }
        Err(e) => {
            tracing::warn!("Orientation detection failed, keeping input as is: {}", e);
            (image, Rotation::None)
        }
    }
}
