use crate::error::OmrError;
use image::{DynamicImage, GrayImage, Luma};

/// Tiles per side
const GRID: u32 = 8;
/// Histogram clip limit, relative to a flat histogram
const CLIP_LIMIT: f32 = 3.0;

/// Contrast-limited adaptive histogram equalization
/// Lifts faint handwriting without blowing up flat paper regions
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OmrError> {
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(clahe(&gray, GRID, CLIP_LIMIT)))
}

/// Equalize each tile of a `grid`x`grid` partition with a clipped
/// histogram, then blend neighbouring tile mappings bilinearly
pub fn clahe(img: &GrayImage, grid: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || grid == 0 {
        return img.clone();
    }

    let tile_w = width.div_ceil(grid.min(width));
    let tile_h = height.div_ceil(grid.min(height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(img, x0, y0, x1, y1, clip_limit));
        }
    }
    let lut = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let value = img.get_pixel(x, y).0[0] as usize;

        // Position relative to tile centres
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = fx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
        let ty0 = fy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (fx - tx0 as f32).clamp(0.0, 1.0);
        let ay = (fy - ty0 as f32).clamp(0.0, 1.0);

        let top = lut(tx0, ty0)[value] as f32 * (1.0 - ax) + lut(tx1, ty0)[value] as f32 * ax;
        let bottom = lut(tx0, ty1)[value] as f32 * (1.0 - ax) + lut(tx1, ty1)[value] as f32 * ax;
        let blended = top * (1.0 - ay) + bottom * ay;

        Luma([blended.round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(img: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut histogram = [0f32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[img.get_pixel(x, y).0[0] as usize] += 1.0;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)) as f32;

    // Clip and spread the excess evenly over all bins
    let clip = (clip_limit * area / 256.0).max(1.0);
    let mut excess = 0f32;
    for count in histogram.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }
    let share = excess / 256.0;

    let mut lut = [0u8; 256];
    let mut cumulative = 0f32;
    for (i, count) in histogram.iter().enumerate() {
        cumulative += count + share;
        lut[i] = (cumulative * 255.0 / area).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
