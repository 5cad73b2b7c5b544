//! Live preview images
//!
//! Camera frames shown while recording travel to the webview as small
//! self-describing images, the same payload type finished recordings use.

use super::error::{CaptureError, CaptureResult};
use super::payload::EncodedPayload;

pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";

/// Encode packed 8-bit RGB pixels as a PNG preview image
pub fn encode_png(width: u32, height: u32, rgb: &[u8]) -> CaptureResult<EncodedPayload> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        return Err(CaptureError::Capture(format!(
            "Preview frame is {} bytes, expected {} for {}x{} RGB",
            rgb.len(),
            expected,
            width,
            height
        )));
    }

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| CaptureError::Capture(format!("PNG header: {}", e)))?;
    writer
        .write_image_data(rgb)
        .map_err(|e| CaptureError::Capture(format!("PNG data: {}", e)))?;
    writer
        .finish()
        .map_err(|e| CaptureError::Capture(format!("PNG finish: {}", e)))?;

    Ok(EncodedPayload::new(PNG_MIME, out))
}

/// Synthetic colour-bar frame, shifted by `sequence` so successive frames differ
pub fn test_pattern(width: u32, height: u32, sequence: usize) -> CaptureResult<EncodedPayload> {
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let bar = ((x * 8 / width.max(1)) as usize + sequence) % 8;
            rgb.push(if bar & 1 != 0 { 0xE0 } else { 0x20 });
            rgb.push(if bar & 2 != 0 { 0xE0 } else { 0x20 });
            rgb.push(if bar & 4 != 0 { 0xE0 } else { (y * 255 / height.max(1)) as u8 });
        }
    }
    encode_png(width, height, &rgb)
}
