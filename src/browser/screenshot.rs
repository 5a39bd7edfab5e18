//! Element screenshot cropping.
//!
//! The engine captures the whole document; the element region is cut out
//! here, scaled by the device pixel ratio and clamped to the image bounds.

// ============================================================================
// Imports
// ============================================================================

use std::io::Cursor;

use image::{GenericImageView, ImageFormat};

use crate::error::{Error, Result};

use super::ElementBox;

// ============================================================================
// Cropping
// ============================================================================

/// Crops `clip` out of a full-page PNG and re-encodes it as PNG.
///
/// # Errors
///
/// - [`Error::RenderFailed`] if the region is empty or lies outside the page
/// - [`Error::ScriptError`] if the image cannot be decoded or encoded
pub fn crop_png(full_page: &[u8], clip: &ElementBox) -> Result<Vec<u8>> {
    if clip.is_empty() {
        return Err(Error::render_failed("Element has zero dimensions"));
    }
    let scale = if clip.scale > 0.0 { clip.scale } else { 1.0 };

    let left = clip.x * scale;
    let top = clip.y * scale;
    let right = (clip.x + clip.width) * scale;
    let bottom = (clip.y + clip.height) * scale;

    let img = image::load_from_memory(full_page)
        .map_err(|e| Error::script_error(format!("Failed to load image: {e}")))?;
    let (img_width, img_height) = img.dimensions();

    if left >= f64::from(img_width)
        || top >= f64::from(img_height)
        || right <= 0.0
        || bottom <= 0.0
    {
        return Err(Error::render_failed("Element lies outside the captured page"));
    }

    // Clamp crop region to image bounds
    let x = left.max(0.0).floor() as u32;
    let y = top.max(0.0).floor() as u32;
    let width = (right.min(f64::from(img_width)).ceil() as u32).saturating_sub(x);
    let height = (bottom.min(f64::from(img_height)).ceil() as u32).saturating_sub(y);

    if width == 0 || height == 0 {
        return Err(Error::render_failed("Element lies outside the captured page"));
    }

    let cropped = img.crop_imm(x, y, width, height);

    let mut output = Cursor::new(Vec::new());
    cropped
        .write_to(&mut output, ImageFormat::Png)
        .map_err(|e| Error::script_error(format!("Failed to encode PNG: {e}")))?;

    Ok(output.into_inner())
}

// ============================================================================
// Tests
// ============================================================================
