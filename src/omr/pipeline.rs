//! End-to-end sheet scanning
//!
//! decode -> rotation -> rectification -> { header fields, bubbles -> grid }
//! -> assembled result. Only decoding can fail; every later stage degrades.

use super::bubbles::detect_bubbles;
use super::config::OmrConfig;
use super::diagnostics::Diagnostics;
use super::grid::assign_cells;
use super::header::extract_student_info;
use super::rectify::rectify;
use super::result::{assemble, SheetScan};
use super::rotation::normalize_rotation;
use crate::decode::decode_image;
use crate::engine::TextRecognizer;
use crate::error::OmrError;
use image::{DynamicImage, GrayImage};
use std::sync::Arc;
use std::time::Instant;

/// A configured scanner. Cheap to clone and safe to share across threads;
/// each scan owns all of its intermediate data.
#[derive(Clone)]
pub struct OmrPipeline {
    config: Arc<OmrConfig>,
    recognizer: Arc<dyn TextRecognizer>,
    diagnostics: Option<Arc<Diagnostics>>,
}

impl OmrPipeline {
    pub fn new(config: Arc<OmrConfig>, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            config,
            recognizer,
            diagnostics: None,
        }
    }

    /// Write debug artifacts for every scan
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn config(&self) -> &OmrConfig {
        &self.config
    }

    /// Decode and scan an uploaded sheet
    pub fn scan(&self, bytes: &[u8]) -> Result<SheetScan, OmrError> {
        let image = decode_image(bytes)?;
        Ok(self.scan_image(image))
    }

    /// Scan an already decoded sheet
    pub fn scan_image(&self, image: DynamicImage) -> SheetScan {
        let start = Instant::now();
        let config = &*self.config;

        let (upright, rotation) =
            normalize_rotation(image, self.recognizer.as_ref(), &config.rotation);
        let sheet = rectify(&upright, &config.rectify);

        let student_info =
            extract_student_info(&sheet.image, self.recognizer.as_ref(), &config.header);

        let region = answer_region(&sheet.image.to_luma8(), config);
        let detection = detect_bubbles(&region, &config.bubbles, &config.marks);
        let outcomes = assign_cells(
            &detection.candidates,
            region.width(),
            region.height(),
            &config.layout,
            &config.grid,
        );
        let (answers, low_confidence) = assemble(&outcomes, &config.layout);

        if let Some(diagnostics) = &self.diagnostics {
            let boundaries = column_boundaries(region.width(), config);
            diagnostics.record(&region, &detection.mask, &detection.candidates, &boundaries);
        }

        tracing::info!(
            rectification = ?sheet.rectification,
            rotation = rotation.degrees(),
            candidates = detection.candidates.len(),
            answers = answers.len(),
            ambiguous = low_confidence.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sheet scanned"
        );

        SheetScan {
            student_info,
            answers,
            low_confidence,
            rectification: sheet.rectification,
            rotation_degrees: rotation.degrees(),
            candidates: detection.candidates.len(),
        }
    }
}

/// Horizontal band between the header and the bottom margin
fn answer_region(sheet: &GrayImage, config: &OmrConfig) -> GrayImage {
    let height = sheet.height();
    let top = (config.layout.header_fraction * height as f32) as u32;
    let bottom = (config.layout.answer_bottom_fraction * height as f32) as u32;
    let bottom = bottom.clamp(top + 1, height.max(top + 1));
    image::imageops::crop_imm(sheet, 0, top, sheet.width(), bottom - top).to_image()
}

/// X positions where answer columns start, the last one relaxed
fn column_boundaries(width: u32, config: &OmrConfig) -> Vec<f32> {
    let columns = config.layout.answer_columns;
    let band = width as f32 / columns as f32;
    (1..columns)
        .map(|c| {
            let x = c as f32 * band;
            if c == columns - 1 {
                x - config.grid.last_column_relaxation * band
            } else {
                x
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omr::rectify::Rectification;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    /// A 1200x1600 sheet on a dark table, question `q` marked on option
    /// `(q - 1) % 4 + 1`
    fn photographed_sheet(config: &OmrConfig) -> GrayImage {
        let layout = &config.layout;
        let (width, height, margin) = (1200u32, 1600u32, 50i32);
        let mut canvas = GrayImage::from_pixel(width + 100, height + 100, Luma([60]));
        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(margin, margin).of_size(width, height),
            Luma([245]),
        );

        let top = layout.header_fraction * height as f32;
        let bottom = layout.answer_bottom_fraction * height as f32;
        let row_height = (bottom - top) / layout.rows_per_column as f32;
        let band = width as f32 / layout.answer_columns as f32;
        for column in 0..layout.answer_columns {
            for row in 0..layout.rows_per_column {
                let question = column * layout.rows_per_column + row;
                let cy = (top + (row as f32 + 0.5) * row_height) as i32 + margin;
                for option in 0..layout.choices {
                    let cx = (column as f32 * band + 60.0 + option as f32 * 50.0) as i32 + margin;
                    if question % layout.choices == option {
                        draw_filled_circle_mut(&mut canvas, (cx, cy), 12, Luma([30]));
                    } else {
                        draw_filled_circle_mut(&mut canvas, (cx, cy), 12, Luma([150]));
                        draw_filled_circle_mut(&mut canvas, (cx, cy), 9, Luma([245]));
                    }
                }
            }
        }
        canvas
    }

    #[test]
    fn test_rectified_band_yields_every_bubble() {
        let config = OmrConfig::default();
        let photo = DynamicImage::ImageLuma8(photographed_sheet(&config));

        let sheet = rectify(&photo, &config.rectify);
        assert_eq!(sheet.rectification, Rectification::Accept);

        let region = answer_region(&sheet.image.to_luma8(), &config);
        let detection = detect_bubbles(&region, &config.bubbles, &config.marks);

        assert_eq!(detection.candidates.len(), 160);
        assert_eq!(detection.candidates.iter().filter(|c| c.is_marked).count(), 40);
    }

    #[test]
    fn test_answer_region_spans_band() {
        let sheet = GrayImage::from_pixel(100, 1000, Luma([255]));
        let region = answer_region(&sheet, &OmrConfig::default());
        assert_eq!(region.dimensions(), (100, 770));
    }

    #[test]
    fn test_column_boundaries_relax_last() {
        let bounds = column_boundaries(1200, &OmrConfig::default());
        assert_eq!(bounds, vec![300.0, 600.0, 870.0]);
    }
}
