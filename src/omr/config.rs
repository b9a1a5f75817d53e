//! Tunable parameters of the OMR pipeline
//!
//! Every threshold the detector relies on lives here so that it can be
//! recalibrated for a scanner or printer from a JSON file. Omitted fields
//! keep their defaults.

use crate::error::OmrError;
use crate::preprocessing::Preset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OmrConfig {
    pub layout: LayoutConfig,
    pub rotation: RotationConfig,
    pub rectify: RectifyConfig,
    pub header: HeaderConfig,
    pub bubbles: BubbleConfig,
    pub marks: MarkConfig,
    pub grid: GridConfig,
}

impl OmrConfig {
    /// Load overrides from a JSON file
    pub fn load(path: &Path) -> Result<Self, OmrError> {
        let data = fs::read_to_string(path).map_err(|e| {
            OmrError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            OmrError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), OmrError> {
        let layout = &self.layout;
        if layout.rows_per_column == 0 || layout.answer_columns == 0 || layout.choices == 0 {
            return Err(OmrError::InvalidConfig(
                "rows_per_column, answer_columns and choices must be positive".to_string(),
            ));
        }
        if layout.choices > u8::MAX as usize {
            return Err(OmrError::InvalidConfig(format!(
                "choices must not exceed {}",
                u8::MAX
            )));
        }
        if layout.min_choices() > layout.choices {
            return Err(OmrError::InvalidConfig(
                "min_choices must not exceed choices".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&layout.header_fraction)
            || layout.answer_bottom_fraction <= layout.header_fraction
            || layout.answer_bottom_fraction > 1.0
        {
            return Err(OmrError::InvalidConfig(
                "expected 0 <= header_fraction < answer_bottom_fraction <= 1".to_string(),
            ));
        }
        if self.bubbles.min_area > self.bubbles.max_area
            || self.bubbles.min_aspect > self.bubbles.max_aspect
        {
            return Err(OmrError::InvalidConfig(
                "bubble area and aspect bounds are inverted".to_string(),
            ));
        }
        if self.bubbles.morph_kernel == 0 || self.bubbles.adaptive_block_size == 0 {
            return Err(OmrError::InvalidConfig(
                "morph_kernel and adaptive_block_size must be positive".to_string(),
            ));
        }
        self.rectify.validate()?;
        for window in [&self.header.subject, &self.header.medium, &self.header.name] {
            if window.x0 >= window.x1
                || window.y0 >= window.y1
                || window.x1 > 1.0
                || window.y1 > 1.0
            {
                return Err(OmrError::InvalidConfig(format!(
                    "header window {:?} is empty or out of range",
                    window
                )));
            }
        }
        Ok(())
    }
}

/// Sheet layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Questions per answer column
    pub rows_per_column: usize,
    /// Number of answer columns across the sheet
    pub answer_columns: usize,
    /// Options per question
    pub choices: usize,
    /// Fewest candidates a cell may hold and still be read. Defaults to
    /// `choices - 1`.
    pub min_choices: Option<usize>,
    /// Fraction of the sheet height occupied by the header
    pub header_fraction: f32,
    /// Bottom edge of the answer band as a fraction of the sheet height
    pub answer_bottom_fraction: f32,
}

impl LayoutConfig {
    pub fn total_questions(&self) -> usize {
        self.rows_per_column * self.answer_columns
    }

    pub fn min_choices(&self) -> usize {
        self.min_choices
            .unwrap_or_else(|| self.choices.saturating_sub(1))
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rows_per_column: 10,
            answer_columns: 4,
            choices: 4,
            min_choices: None,
            header_fraction: 0.20,
            answer_bottom_fraction: 0.97,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub enabled: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Canny hysteresis thresholds for one quadrilateral search pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePreset {
    pub low: f32,
    pub high: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Edge detection passes, ordered from low to high tolerance
    pub edge_presets: Vec<EdgePreset>,
    /// Gaussian blur applied before edge detection
    pub blur_sigma: f32,
    /// Dilation radius (chessboard norm) that closes gaps in the sheet outline
    pub dilate_radius: u8,
    /// How many of the largest contours are tested per pass
    pub max_contours: usize,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter
    pub approx_epsilon: f64,
    /// Minimum quadrilateral area as a fraction of the image area
    pub min_area_fraction: f64,
    /// Longest side of the copy the quadrilateral search runs on
    pub detection_max_dimension: u32,
    /// Padding around the content bounding box
    pub crop_padding: u32,
    /// Width every rectified sheet is scaled to. `None` keeps the warped size.
    pub working_width: Option<u32>,
    /// Size used when nothing on the sheet could be located
    pub fallback_size: (u32, u32),
}

impl RectifyConfig {
    fn validate(&self) -> Result<(), OmrError> {
        if self.edge_presets.is_empty() {
            return Err(OmrError::InvalidConfig(
                "at least one edge preset is required".to_string(),
            ));
        }
        for preset in &self.edge_presets {
            if !(preset.low >= 0.0 && preset.low <= preset.high) {
                return Err(OmrError::InvalidConfig(format!(
                    "edge preset needs 0 <= low <= high, got {:?}",
                    preset
                )));
            }
        }
        if !(self.blur_sigma > 0.0 && self.blur_sigma.is_finite()) {
            return Err(OmrError::InvalidConfig(format!(
                "blur_sigma must be positive, got {}",
                self.blur_sigma
            )));
        }
        let (width, height) = self.fallback_size;
        if width == 0 || height == 0 || self.working_width == Some(0) {
            return Err(OmrError::InvalidConfig(
                "fallback_size and working_width must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            edge_presets: vec![
                EdgePreset { low: 50.0, high: 150.0 },
                EdgePreset { low: 30.0, high: 100.0 },
                EdgePreset { low: 75.0, high: 200.0 },
            ],
            blur_sigma: 1.1,
            dilate_radius: 2,
            max_contours: 15,
            approx_epsilon: 0.02,
            min_area_fraction: 0.30,
            detection_max_dimension: 1600,
            crop_padding: 20,
            working_width: Some(1200),
            fallback_size: (1200, 1600),
        }
    }
}

/// A header sub-window, in fractions of the full rectified sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWindow {
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
    /// Language list handed to the recognizer
    pub languages: Option<String>,
    /// Text must be longer than this to be accepted
    pub min_len: usize,
    /// Preprocessing applied to the crop before recognition
    pub preset: Preset,
}

/// Substring that identifies a medium, and the label reported for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediumTerm {
    pub needle: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub enabled: bool,
    pub subject: FieldWindow,
    pub medium: FieldWindow,
    pub name: FieldWindow,
    /// Checked in order; the first match wins
    pub medium_vocabulary: Vec<MediumTerm>,
    pub upscale: u32,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subject: FieldWindow {
                x0: 0.10,
                x1: 0.30,
                y0: 0.08,
                y1: 0.18,
                languages: Some("eng+sin".to_string()),
                min_len: 1,
                preset: Preset::Default,
            },
            medium: FieldWindow {
                x0: 0.40,
                x1: 0.55,
                y0: 0.08,
                y1: 0.18,
                languages: Some("eng".to_string()),
                min_len: 0,
                preset: Preset::Default,
            },
            name: FieldWindow {
                x0: 0.58,
                x1: 0.95,
                y0: 0.08,
                y1: 0.18,
                languages: Some("sin+eng".to_string()),
                min_len: 2,
                preset: Preset::Aggressive,
            },
            medium_vocabulary: vec![
                MediumTerm {
                    needle: "eng".to_string(),
                    label: "English".to_string(),
                },
                MediumTerm {
                    needle: "sinh".to_string(),
                    label: "Sinhala".to_string(),
                },
                MediumTerm {
                    needle: "tamil".to_string(),
                    label: "Tamil".to_string(),
                },
            ],
            upscale: 3,
        }
    }
}

/// Binarization and candidate filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleConfig {
    /// Median filter radius applied before thresholding (0 disables)
    pub denoise_radius: u32,
    /// Side of the local window for adaptive thresholding
    pub adaptive_block_size: u32,
    /// Offset subtracted from the local mean
    pub adaptive_offset: f32,
    /// Side of the square structuring element for open/close
    pub morph_kernel: u32,
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_circularity: f64,
    /// Shrinks the sampling disc inside each bubble outline
    pub mask_inset: u32,
    /// Bubbles whose sampling disc is smaller than this are never marked
    pub min_mask_radius: u32,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            denoise_radius: 1,
            adaptive_block_size: 15,
            adaptive_offset: 3.0,
            morph_kernel: 2,
            min_area: 80.0,
            max_area: 5000.0,
            min_aspect: 0.5,
            max_aspect: 2.0,
            min_circularity: 0.3,
            mask_inset: 2,
            min_mask_radius: 3,
        }
    }
}

/// One way of recognizing a filled bubble. Every bound that is set must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkRule {
    pub min_fill: Option<f64>,
    pub max_avg_intensity: Option<f64>,
    pub max_min_intensity: Option<f64>,
    pub max_std_intensity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkConfig {
    /// A bubble is marked when any rule matches
    pub rules: Vec<MarkRule>,
    pub intensity_weight: f64,
    pub fill_weight: f64,
    pub darkness_weight: f64,
}

impl Default for MarkConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                MarkRule {
                    min_fill: Some(0.40),
                    max_avg_intensity: Some(150.0),
                    ..MarkRule::default()
                },
                MarkRule {
                    max_min_intensity: Some(100.0),
                    ..MarkRule::default()
                },
                MarkRule {
                    min_fill: Some(0.50),
                    max_avg_intensity: Some(170.0),
                    ..MarkRule::default()
                },
                MarkRule {
                    min_fill: Some(0.35),
                    max_avg_intensity: Some(140.0),
                    max_std_intensity: Some(35.0),
                    ..MarkRule::default()
                },
            ],
            intensity_weight: 0.3,
            fill_weight: 0.4,
            darkness_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Row tolerance as a fraction of the expected row height
    pub row_tolerance: f32,
    /// How far the last column's left edge moves outward, in band widths
    pub last_column_relaxation: f32,
    /// With one extra candidate, the smallest is treated as a stray glyph
    /// when its area is below this fraction of the others' mean
    pub stray_area_ratio: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 0.5,
            last_column_relaxation: 0.1,
            stray_area_ratio: 0.7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(OmrConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "layout": { "rows_per_column": 25, "choices": 5 },
            "grid": { "last_column_relaxation": 0.2 }
        }"#;
        let config: OmrConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.layout.rows_per_column, 25);
        assert_eq!(config.layout.choices, 5);
        assert_eq!(config.layout.answer_columns, 4);
        assert_eq!(config.layout.min_choices(), 4);
        assert_eq!(config.grid.last_column_relaxation, 0.2);
        assert_eq!(config.marks.rules.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_total_questions() {
        assert_eq!(LayoutConfig::default().total_questions(), 40);
    }

    #[test]
    fn test_rejects_zero_choices() {
        let mut config = OmrConfig::default();
        config.layout.choices = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_answer_band() {
        let mut config = OmrConfig::default();
        config.layout.answer_bottom_fraction = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_blur() {
        for sigma in [0.0, -1.0, f32::NAN] {
            let mut config = OmrConfig::default();
            config.rectify.blur_sigma = sigma;
            assert!(config.validate().is_err(), "blur_sigma {} accepted", sigma);
        }
    }

    #[test]
    fn test_rejects_inverted_edge_preset() {
        let json = r#"{ "rectify": { "edge_presets": [{ "low": 200, "high": 50 }] } }"#;
        let config: OmrConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(OmrError::InvalidConfig(_))));
    }

    #[test]
    fn test_accepts_equal_edge_thresholds() {
        let mut config = OmrConfig::default();
        config.rectify.edge_presets = vec![EdgePreset { low: 80.0, high: 80.0 }];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_fallback_size() {
        let mut config = OmrConfig::default();
        config.rectify.fallback_size = (0, 1600);
        assert!(config.validate().is_err());

        let mut config = OmrConfig::default();
        config.rectify.working_width = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_unusable_rectify_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omr.json");
        fs::write(&path, r#"{ "rectify": { "blur_sigma": 0.0 } }"#).unwrap();

        assert!(matches!(OmrConfig::load(&path), Err(OmrError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omr.json");
        fs::write(&path, r#"{ "bubbles": { "min_area": 50.0 } }"#).unwrap();

        let config = OmrConfig::load(&path).unwrap();
        assert_eq!(config.bubbles.min_area, 50.0);
        assert_eq!(config.bubbles.max_area, 5000.0);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(OmrConfig::load(&path), Err(OmrError::InvalidConfig(_))));
    }
}
