//! Student metadata from the printed header band
//!
//! Each field lives in a fixed window of the rectified sheet. The window is
//! cleaned up with the preprocessing pipeline and read as a single line.
//! A field that cannot be read is reported as [`NOT_DETECTED`].

use super::config::{FieldWindow, HeaderConfig, MediumTerm};
use crate::engine::{RegionHint, TextRecognizer};
use crate::error::OmrError;
use crate::preprocessing::Pipeline;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Placeholder for a field that could not be read
pub const NOT_DETECTED: &str = "Not detected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub subject: String,
    pub medium: String,
    pub name: String,
}

impl Default for StudentInfo {
    fn default() -> Self {
        Self {
            subject: NOT_DETECTED.to_string(),
            medium: NOT_DETECTED.to_string(),
            name: NOT_DETECTED.to_string(),
        }
    }
}

/// Read subject, medium and name from the header of a rectified sheet
pub fn extract_student_info(
    sheet: &DynamicImage,
    recognizer: &dyn TextRecognizer,
    config: &HeaderConfig,
) -> StudentInfo {
    let mut info = StudentInfo::default();
    if !config.enabled {
        return info;
    }

    if let Some(text) = read_field(sheet, recognizer, &config.subject, config.upscale, "subject") {
        if let Some(subject) = accept_text(&text, &[], config.subject.min_len) {
            info.subject = subject;
        }
    }

    if let Some(text) = read_field(sheet, recognizer, &config.medium, config.upscale, "medium") {
        if let Some(medium) = match_medium(&text, &config.medium_vocabulary) {
            info.medium = medium;
        }
    }

    if let Some(text) = read_field(sheet, recognizer, &config.name, config.upscale, "name") {
        if let Some(name) = accept_text(&text, &['|', '_'], config.name.min_len) {
            info.name = name;
        }
    }

    tracing::info!(
        subject = %info.subject,
        medium = %info.medium,
        name = %info.name,
        "Header fields read"
    );
    info
}

fn read_field(
    sheet: &DynamicImage,
    recognizer: &dyn TextRecognizer,
    window: &FieldWindow,
    upscale: u32,
    field: &str,
) -> Option<String> {
    match recognize_window(sheet, recognizer, window, upscale) {
        Ok(text) => {
            tracing::debug!(field, text = %text, "Header field recognized");
            Some(text)
        }
        Err(e) => {
            tracing::warn!(field, "Header field not readable: {}", e);
            None
        }
    }
}

fn recognize_window(
    sheet: &DynamicImage,
    recognizer: &dyn TextRecognizer,
    window: &FieldWindow,
    upscale: u32,
) -> Result<String, OmrError> {
    let (width, height) = (sheet.width() as f32, sheet.height() as f32);
    let x = (window.x0 * width).floor() as u32;
    let y = (window.y0 * height).floor() as u32;
    let w = (((window.x1 - window.x0) * width).round() as u32).max(1);
    let h = (((window.y1 - window.y0) * height).round() as u32).max(1);
    if x >= sheet.width() || y >= sheet.height() {
        return Err(OmrError::Recognition("field window outside the sheet".to_string()));
    }

    let crop = sheet.crop_imm(x, y, w, h);
    let prepared = Pipeline::new(window.preset)
        .with_upscale(upscale)
        .process(crop)?;

    let hint = RegionHint::SingleLine {
        languages: window.languages.clone(),
    };
    Ok(recognizer.recognize(&prepared.image, &hint)?.text)
}

/// Collapse whitespace, drop `strip` characters, and accept the result when
/// it is longer than `min_len` characters
fn accept_text(raw: &str, strip: &[char], min_len: usize) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !strip.contains(c)).collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (collapsed.chars().count() > min_len).then_some(collapsed)
}

/// Case-insensitive substring lookup in the medium vocabulary
fn match_medium(raw: &str, vocabulary: &[MediumTerm]) -> Option<String> {
    let lowered = raw.to_lowercase();
    vocabulary
        .iter()
        .find(|term| lowered.contains(&term.needle.to_lowercase()))
        .map(|term| term.label.clone())
}
