//! OCRS engine implementation
//!
//! Pure Rust text recognizer built on the ocrs library. No system dependencies
//! required. Downloads neural network models automatically on first use.
//! ocrs reads Latin script only, so language hints are ignored.

use super::download::{cache_dir, ensure_cached};
use crate::config::Config;
use crate::engine::{OcrResult, RegionHint, TextRecognizer};
use crate::error::OmrError;
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;
use std::sync::Arc;

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// Text recognizer wrapping the ocrs library
pub struct OcrsEngine {
    engine: Arc<OcrsOcrEngine>,
}

impl OcrsEngine {
    /// Create a new recognizer, downloading models if needed
    pub fn new(_config: &Config) -> Result<Self, OmrError> {
        tracing::info!("Initializing ocrs engine...");

        let models = cache_dir(None)?;
        let detection_model_path =
            ensure_cached(DETECTION_MODEL_URL, &models, "text-detection.rten")?;
        let recognition_model_path =
            ensure_cached(RECOGNITION_MODEL_URL, &models, "text-recognition.rten")?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OmrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OmrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OmrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");

        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Detect words, group them into lines and read each line
    fn read_lines(&self, img: &DynamicImage) -> Result<Vec<String>, OmrError> {
        // ImageSource::from_bytes expects HWC RGB
        let rgb_img = img.to_rgb8();
        let dimensions = rgb_img.dimensions();

        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
            OmrError::Recognition(format!("Failed to create image source: {}", e))
        })?;

        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| OmrError::Recognition(format!("Failed to prepare input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| OmrError::Recognition(format!("Failed to detect words: {}", e)))?;

        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| OmrError::Recognition(format!("Failed to recognize text: {}", e)))?;

        Ok(line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .map(|line| {
                line.words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect())
    }
}

impl TextRecognizer for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn recognize(&self, image: &DynamicImage, hint: &RegionHint) -> Result<OcrResult, OmrError> {
        let lines = self.read_lines(image)?;

        // A header window holds one field; keep its longest line
        let text = match hint {
            RegionHint::Page => lines.join("\n"),
            RegionHint::SingleLine { .. } => lines
                .into_iter()
                .max_by_key(|line| line.len())
                .unwrap_or_default(),
        };

        let confidence = calculate_confidence(&text);
        tracing::debug!(chars = text.len(), confidence, "ocrs recognition finished");

        Ok(OcrResult { text, confidence })
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["eng".to_string()]
    }
}

/// ocrs reports no per-character scores, so confidence is judged from the
/// shape of the text itself. Upside-down or sideways reads come back as
/// punctuation soup, single-letter fragments and long runs of one glyph.
fn calculate_confidence(text: &str) -> f32 {
    let glyphs: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if glyphs.is_empty() {
        return 0.0;
    }

    let confidence = 0.5 * alphanumeric_share(&glyphs)
        + 0.3 * word_share(text)
        + 0.2 * run_score(&glyphs);

    confidence.clamp(0.0, 1.0)
}

fn alphanumeric_share(glyphs: &[char]) -> f32 {
    let alphanumeric = glyphs.iter().filter(|c| c.is_alphanumeric()).count();
    alphanumeric as f32 / glyphs.len() as f32
}

/// Share of whitespace-separated tokens at least two characters long
fn word_share(text: &str) -> f32 {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let words = tokens.iter().filter(|t| t.chars().count() >= 2).count();
    words as f32 / tokens.len() as f32
}

/// Penalizes the longest run of a repeated glyph
fn run_score(glyphs: &[char]) -> f32 {
    let mut longest = 1;
    let mut current = 1;
    for pair in glyphs.windows(2) {
        if pair[0] == pair[1] {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 1;
        }
    }

    match longest {
        1..=3 => 1.0,
        4..=6 => 0.6,
        _ => 0.2,
    }
}
