//! Upload decoding
//!
//! Turns the raw bytes of an uploaded sheet into an image. Raster formats go
//! through the `image` crate; PDFs are searched for the first embedded image
//! XObject, since scanned sheets carry the page as a single picture.

use crate::error::OmrError;
use image::{DynamicImage, ImageFormat};
use lopdf::{Document, Object, Stream};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Decode an uploaded sheet
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, OmrError> {
    if bytes.is_empty() {
        return Err(OmrError::Decode("empty upload".to_string()));
    }

    if bytes.starts_with(PDF_MAGIC) {
        return first_pdf_image(bytes);
    }

    image::load_from_memory(bytes)
        .map_err(|e| OmrError::Decode(format!("Failed to decode image: {}", e)))
}

/// Extract the first image XObject that can be decoded, in object order
fn first_pdf_image(bytes: &[u8]) -> Result<DynamicImage, OmrError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| OmrError::Decode(format!("Failed to load PDF: {}", e)))?;

    for (object_id, object) in doc.objects.iter() {
        let Ok(stream) = object.as_stream() else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|name| name == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        match image_from_stream(&doc, stream) {
            Ok(img) => {
                tracing::debug!("Using PDF image object {:?}", object_id);
                return Ok(img);
            }
            Err(e) => {
                tracing::warn!("Failed to extract image from object {:?}: {}", object_id, e);
            }
        }
    }

    Err(OmrError::Decode("PDF contains no usable image".to_string()))
}

/// Decode a single image stream
fn image_from_stream(doc: &Document, stream: &Stream) -> Result<DynamicImage, OmrError> {
    // JPEG payloads are stored as-is
    if has_filter(stream, b"DCTDecode") {
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|e| OmrError::Decode(format!("Failed to decode JPEG stream: {}", e)));
    }

    let width = dict_u32(stream, b"Width")?;
    let height = dict_u32(stream, b"Height")?;

    // Unfiltered streams have nothing to decompress
    let data = if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| OmrError::Decode(format!("Failed to decompress image: {}", e)))?
    } else {
        stream.content.clone()
    };

    let color_space = color_space(doc, stream);
    let bits_per_component = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|b| b.as_i64().ok())
        .unwrap_or(8);

    tracing::debug!(
        "PDF image: {}x{}, {} bits, color_space={}, data_len={}",
        width,
        height,
        bits_per_component,
        color_space,
        data.len()
    );

    if bits_per_component != 8 {
        return Err(OmrError::Decode(format!(
            "Unsupported bit depth: {}",
            bits_per_component
        )));
    }

    let pixels = width as usize * height as usize;
    match color_space.as_str() {
        "DeviceGray" if data.len() >= pixels => {
            image::GrayImage::from_raw(width, height, data[..pixels].to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| OmrError::Decode("Invalid grayscale image data".to_string()))
        }
        // ICCBased with 3 components is typically RGB
        "DeviceRGB" | "ICCBased" if data.len() >= pixels * 3 => {
            image::RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| OmrError::Decode("Invalid RGB image data".to_string()))
        }
        "DeviceCMYK" if data.len() >= pixels * 4 => {
            let rgb: Vec<u8> = data[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 1.0 - cmyk[3] as f32 / 255.0;
                    [0, 1, 2].map(|i| ((1.0 - cmyk[i] as f32 / 255.0) * k * 255.0) as u8)
                })
                .collect();
            image::RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| OmrError::Decode("Invalid CMYK->RGB conversion".to_string()))
        }
        other => Err(OmrError::Decode(format!(
            "Unsupported image layout: {} with {} bytes for {}x{}",
            other,
            data.len(),
            width,
            height
        ))),
    }
}

fn dict_u32(stream: &Stream, key: &[u8]) -> Result<u32, OmrError> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .filter(|v| *v > 0)
        .map(|v| v as u32)
        .ok_or_else(|| {
            OmrError::Decode(format!(
                "Missing image {}",
                String::from_utf8_lossy(key).to_lowercase()
            ))
        })
}

fn has_filter(stream: &Stream, filter: &[u8]) -> bool {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => name.as_slice() == filter,
        Ok(Object::Array(items)) => items
            .iter()
            .any(|item| item.as_name().map(|n| n == filter).unwrap_or(false)),
        _ => false,
    }
}

/// Get the color space name from a PDF stream, resolving indirect references
fn color_space(doc: &Document, stream: &Stream) -> String {
    let Ok(cs_obj) = stream.dict.get(b"ColorSpace") else {
        return "DeviceRGB".to_string();
    };

    let resolved = match cs_obj.as_reference() {
        Ok(reference) => match doc.get_object(reference) {
            Ok(obj) => obj,
            Err(_) => return "DeviceRGB".to_string(),
        },
        Err(_) => cs_obj,
    };

    if let Ok(name) = resolved.as_name() {
        return String::from_utf8_lossy(name).to_string();
    }

    // Arrays like [/ICCBased ref]
    resolved
        .as_array()
        .ok()
        .and_then(|array| array.first())
        .and_then(|first| first.as_name().ok())
        .map(|name| String::from_utf8_lossy(name).to_string())
        .unwrap_or_else(|| "DeviceRGB".to_string())
}
