//! Sheet boundary detection and perspective correction
//!
//! Tries to find the paper's outline and project it onto an axis-aligned
//! rectangle. When no outline is found the sheet is cropped to its printed
//! content, and as a last resort the whole frame is resized. Every path ends
//! in a usable image.

use super::config::RectifyConfig;
use super::geometry::{self, Point2};
use crate::preprocessing::steps::{resize, threshold};
use image::{imageops::FilterType, DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::morphology::dilate;
use serde::Serialize;

/// Which branch of the fallback chain produced the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rectification {
    /// Sheet outline found and perspective-corrected
    Accept,
    /// No outline; cropped to the bounding box of the printed content
    ContentCrop,
    /// Nothing usable; the frame was resized to the fallback size
    FixedResize,
}

/// The rectified sheet and how it was obtained
#[derive(Debug, Clone)]
pub struct RectifiedSheet {
    pub image: DynamicImage,
    pub rectification: Rectification,
    /// Detected corners in input coordinates, ordered TL, TR, BR, BL
    pub corners: Option<[Point2; 4]>,
}

/// Rectify a photographed or scanned sheet
pub fn rectify(image: &DynamicImage, config: &RectifyConfig) -> RectifiedSheet {
    let gray = image.to_luma8();

    if let Some(corners) = find_sheet_quad(&gray, config) {
        if let Some(warped) = warp_quad(image, corners) {
            tracing::info!(
                width = warped.width(),
                height = warped.height(),
                "Sheet outline found, perspective corrected"
            );
            let image = match config.working_width {
                Some(width) => resize::to_width(&warped, width),
                None => warped,
            };
            return RectifiedSheet {
                image,
                rectification: Rectification::Accept,
                corners: Some(corners),
            };
        }
        tracing::warn!("Degenerate sheet outline {:?}, falling back to content crop", corners);
    }

    if let Some(cropped) = crop_to_content(image, &gray, config.crop_padding) {
        tracing::warn!("No sheet outline found, using content bounding box");
        let image = match config.working_width {
            Some(width) => resize::to_width(&cropped, width),
            None => cropped,
        };
        return RectifiedSheet {
            image,
            rectification: Rectification::ContentCrop,
            corners: None,
        };
    }

    let (width, height) = config.fallback_size;
    tracing::warn!("No content found, resizing frame to {}x{}", width, height);
    RectifiedSheet {
        image: image.resize_exact(width, height, FilterType::Triangle),
        rectification: Rectification::FixedResize,
        corners: None,
    }
}

/// Find the largest convex-looking quadrilateral across all edge presets.
/// Works on a downscaled copy; the corners returned are in input coordinates.
pub fn find_sheet_quad(gray: &GrayImage, config: &RectifyConfig) -> Option<[Point2; 4]> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let longest = width.max(height);
    let scale = if config.detection_max_dimension > 0 && longest > config.detection_max_dimension
    {
        config.detection_max_dimension as f64 / longest as f64
    } else {
        1.0
    };
    let small = if scale < 1.0 {
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        image::imageops::resize(gray, w, h, FilterType::Triangle)
    } else {
        gray.clone()
    };

    let min_area = small.width() as f64 * small.height() as f64 * config.min_area_fraction;
    let blurred = gaussian_blur_f32(&small, config.blur_sigma);

    let mut best: Option<([Point2; 4], f64)> = None;
    for preset in &config.edge_presets {
        let edges = canny(&blurred, preset.low, preset.high);
        let edges = dilate(&edges, Norm::LInf, config.dilate_radius);

        let contours = find_contours::<i32>(&edges);
        let mut outlines: Vec<(Vec<Point2>, f64)> = contours
            .iter()
            .enumerate()
            .filter(|(index, _)| geometry::is_external(&contours, *index))
            .map(|(_, c)| {
                let points = geometry::to_points(&c.points);
                let area = geometry::polygon_area(&points);
                (points, area)
            })
            .collect();
        outlines.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        for (points, _) in outlines.iter().take(config.max_contours) {
            let epsilon = config.approx_epsilon * geometry::perimeter(points);
            let polygon = geometry::approx_closed_polygon(points, epsilon);
            if polygon.len() != 4 {
                continue;
            }
            let area = geometry::polygon_area(&polygon);
            if area > min_area && best.as_ref().map_or(true, |(_, a)| area > *a) {
                best = Some(([polygon[0], polygon[1], polygon[2], polygon[3]], area));
            }
        }

        tracing::debug!(
            low = preset.low,
            high = preset.high,
            contours = outlines.len(),
            found = best.is_some(),
            "Edge preset evaluated"
        );
    }

    best.map(|(quad, _)| {
        let restored = quad.map(|(x, y)| (x / scale, y / scale));
        geometry::order_corners(restored)
    })
}

/// Project the quadrilateral onto an axis-aligned rectangle sized by the
/// longer of each pair of opposing edges
fn warp_quad(image: &DynamicImage, corners: [Point2; 4]) -> Option<DynamicImage> {
    let [tl, tr, br, bl] = corners;
    let width = geometry::distance(tl, tr).max(geometry::distance(bl, br)).round();
    let height = geometry::distance(tl, bl).max(geometry::distance(tr, br)).round();
    if width < 1.0 || height < 1.0 {
        return None;
    }

    let src = corners.map(|(x, y)| (x as f32, y as f32));
    let dst = [
        (0.0, 0.0),
        (width as f32, 0.0),
        (width as f32, height as f32),
        (0.0, height as f32),
    ];
    let projection = Projection::from_control_points(src, dst)?;

    let input = image.to_rgb8();
    let mut output = RgbImage::new(width as u32, height as u32);
    warp_into(
        &input,
        &projection,
        Interpolation::Bilinear,
        Rgb([255u8, 255, 255]),
        &mut output,
    );
    Some(DynamicImage::ImageRgb8(output))
}

/// Crop to the padded bounding box of all dark content
fn crop_to_content(image: &DynamicImage, gray: &GrayImage, padding: u32) -> Option<DynamicImage> {
    let mask = threshold::otsu_inverted(gray);
    let (width, height) = mask.dimensions();

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] != threshold::FOREGROUND {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    let (x0, y0, x1, y1) = bounds?;
    let left = x0.saturating_sub(padding);
    let top = y0.saturating_sub(padding);
    let right = (x1 + padding).min(width - 1);
    let bottom = (y1 + padding).min(height - 1);

    Some(image.crop_imm(left, top, right - left + 1, bottom - top + 1))
}
