//! Leptess/Tesseract engine implementation
//!
//! Tesseract-based text recognizer. Handles the mixed-script header fields
//! (e.g. "eng+sin") that ocrs cannot read. Uses tesseract-static crate for
//! static linking (no system dependencies). Downloads tessdata (training
//! data) automatically on first use of each language.

use super::download::{cache_dir, ensure_cached};
use crate::config::Config;
use crate::engine::{OcrResult, RegionHint, TextRecognizer};
use crate::error::OmrError;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Mutex;
use tesseract_static::tesseract::Tesseract;

/// Tesseract page segmentation mode for a single text line
const PSM_SINGLE_LINE: &str = "7";

/// Tesseract OCR Engine
pub struct LeptessEngine {
    /// Path to tessdata directory
    tessdata_path: String,
    /// Whether missing languages may be fetched into `tessdata_path`
    downloads: bool,
    /// Languages known to be present in `tessdata_path`
    available: Mutex<Vec<String>>,
    /// Default language for OCR
    default_language: String,
}

impl LeptessEngine {
    /// Create a new Tesseract-based text recognizer
    pub fn new(config: &Config) -> Result<Self, OmrError> {
        let default_language = config.default_language.clone();

        let (dir, downloads) = match &config.tessdata_path {
            Some(path) => (PathBuf::from(path), false),
            None => (cache_dir(Some("tessdata"))?, true),
        };
        let tessdata_path = dir
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| OmrError::InitializationError("Invalid tessdata path".to_string()))?;

        let engine = Self {
            tessdata_path,
            downloads,
            available: Mutex::new(Vec::new()),
            default_language,
        };

        // Validate that tessdata is accessible by doing a test initialization
        engine.ensure_languages(&engine.default_language)?;
        Tesseract::new(Some(&engine.tessdata_path), Some(&engine.default_language)).map_err(
            |e| OmrError::InitializationError(format!("Failed to initialize Tesseract: {}", e)),
        )?;

        tracing::info!(
            "Leptess engine initialized (tessdata: {}, language: {})",
            engine.tessdata_path,
            engine.default_language
        );

        Ok(engine)
    }

    /// Make sure every language in a "+"-joined list has training data
    fn ensure_languages(&self, languages: &str) -> Result<(), OmrError> {
        if !self.downloads {
            return Ok(());
        }

        let mut available = self
            .available
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for language in languages.split('+').filter(|l| !l.is_empty()) {
            if available.iter().any(|l| l == language) {
                continue;
            }
            let filename = format!("{}.traineddata", language);
            ensure_cached(
                &tessdata_url(language),
                std::path::Path::new(&self.tessdata_path),
                &filename,
            )
            .map_err(|e| OmrError::Recognition(e.to_string()))?;
            available.push(language.to_string());
        }

        Ok(())
    }
}

impl TextRecognizer for LeptessEngine {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - multilingual, better for noisy phone photos"
    }

    fn recognize(&self, img: &DynamicImage, hint: &RegionHint) -> Result<OcrResult, OmrError> {
        let (languages, single_line) = match hint {
            RegionHint::Page => (self.default_language.as_str(), false),
            RegionHint::SingleLine { languages } => (
                languages.as_deref().unwrap_or(&self.default_language),
                true,
            ),
        };
        self.ensure_languages(languages)?;

        // BMP is always supported by leptonica
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();
        let mut bmp_data = Vec::new();
        rgb_img
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| OmrError::Recognition(format!("Failed to convert to BMP: {}", e)))?;

        tracing::debug!(
            "Processing image: {}x{}, languages: {}, BMP size: {} bytes",
            width,
            height,
            languages,
            bmp_data.len()
        );

        let mut tess = Tesseract::new(Some(&self.tessdata_path), Some(languages))
            .map_err(|e| OmrError::Recognition(format!("Failed to create Tesseract: {}", e)))?;

        if single_line {
            tess = tess
                .set_variable("tessedit_pageseg_mode", PSM_SINGLE_LINE)
                .map_err(|e| OmrError::Recognition(format!("Failed to set page mode: {}", e)))?;
        }

        tess = tess.set_image_from_mem(&bmp_data).map_err(|e| {
            OmrError::Recognition(format!(
                "Failed to set image ({}x{}, {} bytes): {}",
                width,
                height,
                bmp_data.len(),
                e
            ))
        })?;

        tess = tess
            .recognize()
            .map_err(|e| OmrError::Recognition(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| OmrError::Recognition(format!("Failed to get text: {}", e)))?;

        // Tesseract reports 0-100
        let confidence = tess.mean_text_conf() as f32 / 100.0;

        Ok(OcrResult {
            text: text.trim().to_string(),
            confidence,
        })
    }

    fn supported_languages(&self) -> Vec<String> {
        // Any tessdata_fast language is fetched on demand; these are the
        // ones answer sheets are printed in
        vec![
            "eng".to_string(), // English
            "sin".to_string(), // Sinhala
            "tam".to_string(), // Tamil
        ]
    }
}

/// Get tessdata download URL for a language
fn tessdata_url(language: &str) -> String {
    // tessdata_fast keeps downloads small
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}
