//! PNG conversion for clipboard images
//!
//! Platform clipboards hand out raw RGBA pixels; the wire carries PNG.

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use std::io::Cursor;

use crate::error::{ClipboardError, ClipboardResult};

/// Raw RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Row-major RGBA bytes, `width * height * 4` long
    pub bytes: Vec<u8>,
}

/// Encodes RGBA pixels as PNG
///
/// # Errors
///
/// Returns `ClipboardError::Image` if the buffer does not match the
/// dimensions or encoding fails
pub fn encode_png(image: &RgbaImage) -> ClipboardResult<Vec<u8>> {
    let (width, height) = dimensions(image)?;
    let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width, height, image.bytes.clone()).ok_or_else(|| {
            ClipboardError::Image(format!(
                "{} bytes do not form a {}x{} RGBA image",
                image.bytes.len(),
                width,
                height
            ))
        })?;

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(buffer).write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Decodes PNG bytes into RGBA pixels
///
/// # Errors
///
/// Returns `ClipboardError::Image` if the bytes are not a PNG
pub fn decode_png(png: &[u8]) -> ClipboardResult<RgbaImage> {
    let rgba = image::load_from_memory_with_format(png, ImageFormat::Png)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(RgbaImage {
        width: width as usize,
        height: height as usize,
        bytes: rgba.into_raw(),
    })
}

fn dimensions(image: &RgbaImage) -> ClipboardResult<(u32, u32)> {
    let width = u32::try_from(image.width)
        .map_err(|_| ClipboardError::Image(format!("width {} too large", image.width)))?;
    let height = u32::try_from(image.height)
        .map_err(|_| ClipboardError::Image(format!("height {} too large", image.height)))?;
    Ok((width, height))
}
