use crate::error::OmrError;
use image::DynamicImage;
use serde::Serialize;

/// Text recognition result
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f32,
}

/// Layout hint passed along with each recognition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionHint {
    /// Free-form page content (used by the orientation sweep)
    Page,
    /// A single line of text, optionally restricted to the given
    /// Tesseract-style language list (e.g. "eng+sin")
    SingleLine { languages: Option<String> },
}

/// Rotation reported by an orientation cue, in degrees clockwise as
/// printed on the page (the correction applied is the inverse).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Rotation {
    #[default]
    None,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Self::None),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Rotate `image` so that content reported at this rotation becomes upright
    pub fn correct(&self, image: &DynamicImage) -> DynamicImage {
        match self {
            Self::None => image.clone(),
            Self::Deg90 => image.rotate270(),
            Self::Deg180 => image.rotate180(),
            Self::Deg270 => image.rotate90(),
        }
    }
}

/// Minimum ratio by which a rotated reading must beat the upright one
const ORIENTATION_MARGIN: f32 = 1.25;

/// Trait that all text recognition engines must implement
pub trait TextRecognizer: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize the text in `image`
    fn recognize(&self, image: &DynamicImage, hint: &RegionHint) -> Result<OcrResult, OmrError>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;

    /// Estimate how the page is rotated.
    ///
    /// The default reads the page under each of the four corrections and
    /// keeps the one with the best recognition score, staying upright unless
    /// another reading is clearly better.
    fn detect_orientation(&self, image: &DynamicImage) -> Result<Rotation, OmrError> {
        let upright = reading_score(&self.recognize(image, &RegionHint::Page)?);
        let mut best = (Rotation::None, upright);

        for rotation in [Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            let candidate = rotation.correct(image);
            let score = reading_score(&self.recognize(&candidate, &RegionHint::Page)?);
            if score > best.1 {
                best = (rotation, score);
            }
        }

        if best.0 != Rotation::None && best.1 < upright * ORIENTATION_MARGIN {
            return Ok(Rotation::None);
        }

        Ok(best.0)
    }
}

fn reading_score(result: &OcrResult) -> f32 {
    let alphanumeric = result.text.chars().filter(|c| c.is_alphanumeric()).count();
    result.confidence * alphanumeric as f32
}
