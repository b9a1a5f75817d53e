//! Bubble detection in the answer band
//!
//! The band is binarized twice, once with a local mean threshold that copes
//! with shading and once with a global Otsu level that catches solidly filled
//! bubbles, and the masks are merged. Round outer contours of plausible size
//! become candidates, each measured inside an inset circular mask.

use super::config::{BubbleConfig, MarkConfig, MarkRule};
use super::geometry;
use crate::preprocessing::steps::{denoise, morphology, threshold};
use image::GrayImage;
use imageproc::contours::find_contours;
use serde::Serialize;
use std::f64::consts::PI;

/// A round shape that may be a choice bubble
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubbleCandidate {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub cx: f32,
    pub cy: f32,
    pub area: f64,
    pub circularity: f64,
    pub stats: MarkStats,
    pub mark_strength: f64,
    pub is_marked: bool,
}

/// Intensity statistics inside a bubble's circular mask
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MarkStats {
    pub fill_ratio: f64,
    pub avg_intensity: f64,
    pub min_intensity: f64,
    pub std_intensity: f64,
}

impl MarkStats {
    /// Whether any configured rule classifies these statistics as a mark
    pub fn is_marked(&self, marks: &MarkConfig) -> bool {
        marks.rules.iter().any(|rule| self.satisfies(rule))
    }

    /// Relative strength, used only to rank marks within one cell
    pub fn strength(&self, marks: &MarkConfig) -> f64 {
        marks.intensity_weight * (255.0 - self.avg_intensity) / 255.0
            + marks.fill_weight * self.fill_ratio
            + marks.darkness_weight * (255.0 - self.min_intensity) / 255.0
    }

    fn satisfies(&self, rule: &MarkRule) -> bool {
        if rule.min_fill.is_none()
            && rule.max_avg_intensity.is_none()
            && rule.max_min_intensity.is_none()
            && rule.max_std_intensity.is_none()
        {
            return false;
        }
        rule.min_fill.map_or(true, |v| self.fill_ratio > v)
            && rule.max_avg_intensity.map_or(true, |v| self.avg_intensity < v)
            && rule.max_min_intensity.map_or(true, |v| self.min_intensity < v)
            && rule.max_std_intensity.map_or(true, |v| self.std_intensity < v)
    }
}

/// Candidates plus the intermediate images, kept for diagnostics
#[derive(Debug, Clone)]
pub struct BubbleDetection {
    pub candidates: Vec<BubbleCandidate>,
    pub mask: GrayImage,
}

/// Find and score bubble candidates in a grayscale answer region
pub fn detect_bubbles(
    region: &GrayImage,
    config: &BubbleConfig,
    marks: &MarkConfig,
) -> BubbleDetection {
    let denoised = denoise::median(region, config.denoise_radius);
    let adaptive = threshold::adaptive_mean_inverted(
        &denoised,
        config.adaptive_block_size,
        config.adaptive_offset,
    );
    let global = threshold::otsu_inverted(&denoised);
    let merged = threshold::union(&adaptive, &global);
    let opened = morphology::open(&merged, config.morph_kernel);
    let mask = morphology::close(&opened, config.morph_kernel);

    let contours = find_contours::<i32>(&mask);
    let mut candidates = Vec::new();
    let mut rejected = 0usize;
    for (index, contour) in contours.iter().enumerate() {
        if !geometry::is_external(&contours, index) {
            continue;
        }
        match measure_contour(&contour.points, region, &mask, config, marks) {
            Some(candidate) => candidates.push(candidate),
            None => rejected += 1,
        }
    }

    tracing::debug!(
        accepted = candidates.len(),
        rejected,
        marked = candidates.iter().filter(|c| c.is_marked).count(),
        "Bubble candidates extracted"
    );

    BubbleDetection { candidates, mask }
}

fn measure_contour(
    points: &[imageproc::point::Point<i32>],
    gray: &GrayImage,
    mask: &GrayImage,
    config: &BubbleConfig,
    marks: &MarkConfig,
) -> Option<BubbleCandidate> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    let width = (max_x - min_x + 1) as u32;
    let height = (max_y - min_y + 1) as u32;

    let outline = geometry::to_points(points);
    let area = geometry::polygon_area(&outline);
    if area < config.min_area || area > config.max_area {
        return None;
    }

    let aspect = width as f64 / height as f64;
    if aspect < config.min_aspect || aspect > config.max_aspect {
        return None;
    }

    let perimeter = geometry::perimeter(&outline);
    if perimeter <= 0.0 {
        return None;
    }
    let circularity = 4.0 * PI * area / (perimeter * perimeter);
    if circularity < config.min_circularity {
        return None;
    }

    let x = min_x as u32;
    let y = min_y as u32;
    let cx = x as f32 + width as f32 / 2.0;
    let cy = y as f32 + height as f32 / 2.0;
    let radius = width.min(height) as f32 / 2.0 - config.mask_inset as f32;

    let (stats, mark_strength, is_marked) = if radius < config.min_mask_radius as f32 {
        (MarkStats::default(), 0.0, false)
    } else {
        let stats = mask_stats(gray, mask, cx, cy, radius);
        (stats, stats.strength(marks), stats.is_marked(marks))
    };

    Some(BubbleCandidate {
        x,
        y,
        width,
        height,
        cx,
        cy,
        area,
        circularity,
        stats,
        mark_strength,
        is_marked,
    })
}

/// Statistics over pixels whose centres lie within `radius` of (cx, cy)
fn mask_stats(gray: &GrayImage, mask: &GrayImage, cx: f32, cy: f32, radius: f32) -> MarkStats {
    let (width, height) = gray.dimensions();
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil() as u32).min(width);
    let y1 = ((cy + radius).ceil() as u32).min(height);
    let r2 = radius * radius;

    let mut count = 0u32;
    let mut filled = 0u32;
    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    let mut min = u8::MAX;

    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let value = gray.get_pixel(px, py).0[0];
            count += 1;
            sum += value as f64;
            sum_sq += (value as f64).powi(2);
            min = min.min(value);
            if mask.get_pixel(px, py).0[0] == threshold::FOREGROUND {
                filled += 1;
            }
        }
    }

    if count == 0 {
        return MarkStats::default();
    }

    let n = count as f64;
    let mean = sum / n;
    MarkStats {
        fill_ratio: filled as f64 / n,
        avg_intensity: mean,
        min_intensity: min as f64,
        std_intensity: (sum_sq / n - mean * mean).max(0.0).sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_circle_mut;

    const PAPER: u8 = 245;

    fn draw_bubble(img: &mut GrayImage, center: (i32, i32), marked: bool) {
        if marked {
            draw_filled_circle_mut(img, center, 12, Luma([30]));
        } else {
            draw_filled_circle_mut(img, center, 12, Luma([150]));
            draw_filled_circle_mut(img, center, 9, Luma([PAPER]));
        }
    }

    fn stats(fill: f64, avg: f64, min: f64, std: f64) -> MarkStats {
        MarkStats {
            fill_ratio: fill,
            avg_intensity: avg,
            min_intensity: min,
            std_intensity: std,
        }
    }

    #[test]
    fn test_detects_row_of_bubbles() {
        let mut img = GrayImage::from_pixel(240, 60, Luma([PAPER]));
        for i in 0..4 {
            draw_bubble(&mut img, (40 + i * 50, 30), i == 2);
        }

        let detection = detect_bubbles(&img, &BubbleConfig::default(), &MarkConfig::default());

        let mut found = detection.candidates.clone();
        found.sort_by(|a, b| a.cx.total_cmp(&b.cx));
        assert_eq!(found.len(), 4);
        let marked: Vec<bool> = found.iter().map(|c| c.is_marked).collect();
        assert_eq!(marked, vec![false, false, true, false]);
        assert!(found[2].mark_strength > found[0].mark_strength);
    }

    #[test]
    fn test_rejects_lines_and_specks() {
        let mut img = GrayImage::from_pixel(200, 60, Luma([PAPER]));
        // Long rule line: fails the aspect filter
        for x in 10..190 {
            for y in 10..14 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
        // Dot well under the minimum area
        draw_filled_circle_mut(&mut img, (100, 40), 3, Luma([20]));

        let detection = detect_bubbles(&img, &BubbleConfig::default(), &MarkConfig::default());

        assert!(detection.candidates.is_empty());
    }

    #[test]
    fn test_mark_rules() {
        let marks = MarkConfig::default();
        assert!(stats(0.45, 140.0, 120.0, 50.0).is_marked(&marks));
        assert!(stats(0.10, 220.0, 90.0, 40.0).is_marked(&marks));
        assert!(stats(0.55, 165.0, 120.0, 50.0).is_marked(&marks));
        assert!(stats(0.36, 139.0, 120.0, 30.0).is_marked(&marks));
        assert!(!stats(0.36, 139.0, 120.0, 40.0).is_marked(&marks));
        assert!(!stats(0.26, 220.0, 150.0, 40.0).is_marked(&marks));
    }

    #[test]
    fn test_darker_never_unmarks() {
        let marks = MarkConfig::default();
        for fill in [0.2, 0.36, 0.41, 0.51, 0.8] {
            let mut was_marked = false;
            for avg in (60..=240).rev().step_by(5) {
                let marked = stats(fill, avg as f64, 120.0, 30.0).is_marked(&marks);
                assert!(!was_marked || marked, "fill {} avg {} flipped back", fill, avg);
                was_marked = marked;
            }
        }
    }

    #[test]
    fn test_strength_weights() {
        let marks = MarkConfig::default();
        let strong = stats(0.6, 120.0, 90.0, 20.0).strength(&marks);
        let weak = stats(0.42, 160.0, 90.0, 20.0).strength(&marks);
        assert!(strong > weak);
        assert!((stats(1.0, 0.0, 0.0, 0.0).strength(&marks) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_rule_never_matches() {
        let marks = MarkConfig {
            rules: vec![MarkRule::default()],
            ..MarkConfig::default()
        };
        assert!(!stats(1.0, 0.0, 0.0, 0.0).is_marked(&marks));
    }

    #[test]
    fn test_bubbles_beside_edge_strip_are_found() {
        // Dark strip along the left edge, as left behind by a perspective warp
        let mut img = GrayImage::from_pixel(260, 60, Luma([PAPER]));
        for y in 0..60 {
            for x in 0..2 {
                img.put_pixel(x, y, Luma([60]));
            }
        }
        for i in 0..4 {
            draw_bubble(&mut img, (50 + i * 50, 30), i == 1);
        }

        let detection = detect_bubbles(&img, &BubbleConfig::default(), &MarkConfig::default());

        assert_eq!(detection.candidates.len(), 4);
        assert_eq!(detection.candidates.iter().filter(|c| c.is_marked).count(), 1);
    }

    #[test]
    fn test_dot_inside_ring_is_not_a_candidate() {
        let mut img = GrayImage::from_pixel(120, 120, Luma([PAPER]));
        // Large ring whose hole holds a bubble-sized dot
        draw_filled_circle_mut(&mut img, (60, 60), 45, Luma([20]));
        draw_filled_circle_mut(&mut img, (60, 60), 40, Luma([PAPER]));
        draw_filled_circle_mut(&mut img, (60, 60), 12, Luma([30]));

        let detection = detect_bubbles(&img, &BubbleConfig::default(), &MarkConfig::default());

        assert!(detection.candidates.is_empty());
    }
}
