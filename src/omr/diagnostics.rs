//! Optional debug artifacts for tuning detection thresholds
//!
//! Each scan writes three PNGs sharing a sequence-numbered prefix: the
//! answer region before binarization, the binary mask, and an overlay with
//! every candidate outlined, marked bubbles crossed and column boundaries
//! drawn. Write failures are logged and never affect the scan.

use super::bubbles::BubbleCandidate;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const CANDIDATE: Rgb<u8> = Rgb([0, 160, 255]);
const MARKED: Rgb<u8> = Rgb([220, 30, 30]);
const COLUMN: Rgb<u8> = Rgb([40, 180, 40]);

pub struct Diagnostics {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl Diagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the artifacts of one scan
    pub fn record(
        &self,
        gray: &GrayImage,
        mask: &GrayImage,
        candidates: &[BubbleCandidate],
        column_boundaries: &[f32],
    ) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let prefix = format!("scan-{:05}", seq);

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!("Cannot create diagnostics directory {:?}: {}", self.dir, e);
            return;
        }

        let overlay = render_overlay(gray, candidates, column_boundaries);
        self.save(&format!("{}-gray.png", prefix), |path| gray.save(path));
        self.save(&format!("{}-mask.png", prefix), |path| mask.save(path));
        self.save(&format!("{}-overlay.png", prefix), |path| overlay.save(path));
    }

    fn save<F>(&self, name: &str, write: F)
    where
        F: FnOnce(&Path) -> image::ImageResult<()>,
    {
        let path = self.dir.join(name);
        match write(&path) {
            Ok(()) => tracing::debug!("Wrote {:?}", path),
            Err(e) => tracing::warn!("Failed to write {:?}: {}", path, e),
        }
    }
}

/// Draw candidates, crossed marks and column boundaries over the region
pub fn render_overlay(
    gray: &GrayImage,
    candidates: &[BubbleCandidate],
    column_boundaries: &[f32],
) -> RgbImage {
    let mut overlay = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });

    let bottom = gray.height() as f32;
    for &x in column_boundaries {
        draw_line_segment_mut(&mut overlay, (x, 0.0), (x, bottom), COLUMN);
    }

    for candidate in candidates {
        let center = (candidate.cx as i32, candidate.cy as i32);
        let radius = (candidate.width.min(candidate.height) / 2) as i32;
        draw_hollow_circle_mut(&mut overlay, center, radius, CANDIDATE);

        if candidate.is_marked {
            let (x0, y0) = (candidate.x as f32, candidate.y as f32);
            let (x1, y1) = (x0 + candidate.width as f32, y0 + candidate.height as f32);
            draw_line_segment_mut(&mut overlay, (x0, y0), (x1, y1), MARKED);
            draw_line_segment_mut(&mut overlay, (x0, y1), (x1, y0), MARKED);
        }
    }

    overlay
}
