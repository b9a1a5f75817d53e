//! Synthetic answer sheets and a scripted recognizer shared by the
//! integration tests

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use sheet_omr::engine::{OcrResult, RegionHint, Rotation, TextRecognizer};
use sheet_omr::omr::config::LayoutConfig;
use sheet_omr::OmrError;
use std::io::Cursor;

pub const SHEET_WIDTH: u32 = 1200;
pub const SHEET_HEIGHT: u32 = 1600;
pub const MARGIN: u32 = 50;

const PAPER: u8 = 245;
const BACKGROUND: u8 = 60;
const INK: u8 = 30;
const OUTLINE: u8 = 150;

/// Render a sheet lying on a dark table. `marks` lists every filled
/// (question, option) pair; a question may appear more than once.
pub fn render_sheet(layout: &LayoutConfig, marks: &[(u32, u8)]) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(
        SHEET_WIDTH + 2 * MARGIN,
        SHEET_HEIGHT + 2 * MARGIN,
        Luma([BACKGROUND]),
    );
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(MARGIN as i32, MARGIN as i32).of_size(SHEET_WIDTH, SHEET_HEIGHT),
        Luma([PAPER]),
    );

    // Title bar near the top edge, away from the sheet border
    let title_top = (0.02 * SHEET_HEIGHT as f32) as i32 + MARGIN as i32;
    let title_height = (0.04 * SHEET_HEIGHT as f32) as u32;
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at((0.3 * SHEET_WIDTH as f32) as i32 + MARGIN as i32, title_top)
            .of_size((0.4 * SHEET_WIDTH as f32) as u32, title_height),
        Luma([INK]),
    );

    let top = layout.header_fraction * SHEET_HEIGHT as f32;
    let bottom = layout.answer_bottom_fraction * SHEET_HEIGHT as f32;
    let row_height = (bottom - top) / layout.rows_per_column as f32;
    let band = SHEET_WIDTH as f32 / layout.answer_columns as f32;
    let spacing = (50.0f32).min((band - 80.0) / layout.choices as f32);

    for column in 0..layout.answer_columns {
        for row in 0..layout.rows_per_column {
            let question = (column * layout.rows_per_column + row + 1) as u32;
            let cy = top + (row as f32 + 0.5) * row_height;
            for option in 1..=layout.choices {
                let cx = column as f32 * band + 60.0 + (option - 1) as f32 * spacing;
                let center = (
                    cx as i32 + MARGIN as i32,
                    cy as i32 + MARGIN as i32,
                );
                let filled = marks.contains(&(question, option as u8));
                if filled {
                    draw_filled_circle_mut(&mut canvas, center, 12, Luma([INK]));
                } else {
                    draw_filled_circle_mut(&mut canvas, center, 12, Luma([OUTLINE]));
                    draw_filled_circle_mut(&mut canvas, center, 9, Luma([PAPER]));
                }
            }
        }
    }

    canvas
}

pub fn encode_png(image: &GrayImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// Returns fixed header text per language hint and judges orientation by
/// which edge of the page carries more ink
pub struct SheetReader;

pub const SUBJECT: &str = "Science";
pub const NAME: &str = "Nimal Perera";

impl TextRecognizer for SheetReader {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn description(&self) -> &'static str {
        "scripted reader for synthetic sheets"
    }

    fn recognize(&self, _image: &DynamicImage, hint: &RegionHint) -> Result<OcrResult, OmrError> {
        let text = match hint {
            RegionHint::SingleLine { languages } => match languages.as_deref() {
                Some("eng+sin") => format!(" {}\n", SUBJECT),
                Some("eng") => "Medium: ENGLISH".to_string(),
                Some("sin+eng") => format!("| {} _", NAME),
                _ => String::new(),
            },
            RegionHint::Page => String::new(),
        };
        Ok(OcrResult {
            text,
            confidence: 0.9,
        })
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["eng".to_string(), "sin".to_string()]
    }

    fn detect_orientation(&self, image: &DynamicImage) -> Result<Rotation, OmrError> {
        let gray = image.to_luma8();
        let strip = gray.height() * 8 / 100;
        let ink = |y0: u32| -> u64 {
            (y0..y0 + strip)
                .flat_map(|y| (0..gray.width()).map(move |x| (x, y)))
                .map(|(x, y)| 255 - gray.get_pixel(x, y).0[0] as u64)
                .sum()
        };
        let (top, bottom) = (ink(0), ink(gray.height() - strip));
        Ok(if bottom > top {
            Rotation::Deg180
        } else {
            Rotation::None
        })
    }
}

/// Recognizer whose every call fails
pub struct BrokenReader;

impl TextRecognizer for BrokenReader {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn description(&self) -> &'static str {
        "always fails"
    }

    fn recognize(&self, _image: &DynamicImage, _hint: &RegionHint) -> Result<OcrResult, OmrError> {
        Err(OmrError::Recognition("engine offline".to_string()))
    }

    fn supported_languages(&self) -> Vec<String> {
        vec![]
    }
}
