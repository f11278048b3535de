// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Image cropping utilities for fruit bounding boxes (spec.md §4.2).

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::error::BrainError;
use crate::models::BoundingBox;

/// Wraps a decoded image to generate JPEG crops for bounding boxes.
///
/// Decodes the source bytes exactly once at construction time.
pub struct ImageCropper {
    image: DynamicImage,
}

impl ImageCropper {
    pub fn new(image_bytes: &[u8]) -> Result<Self, BrainError> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| BrainError::Pipeline(format!("failed to decode captured image: {e}")))?;
        Ok(Self { image })
    }

    /// Returns `(width, height)` of the underlying image.
    pub fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Returns the encoded JPEG bytes for the requested bounding box.
    ///
    /// Fractional coordinates truncate toward zero; the rectangle is
    /// clamped to the image bounds rather than panicking or silently
    /// padding, since handing the defect detector a black-padded crop would
    /// misrepresent what was actually captured.
    pub fn crop(&self, bbox: &BoundingBox) -> Result<Vec<u8>, BrainError> {
        let (img_w, img_h) = self.size();
        let (x_min, y_min, x_max, y_max) = bbox.as_pixel_rect();

        let x_min = x_min.min(img_w.saturating_sub(1));
        let y_min = y_min.min(img_h.saturating_sub(1));
        let x_max = x_max.clamp(x_min + 1, img_w.max(x_min + 1));
        let y_max = y_max.clamp(y_min + 1, img_h.max(y_min + 1));
        let width = x_max - x_min;
        let height = y_max - y_min;

        let cropped = self.image.crop_imm(x_min, y_min, width, height);

        let mut buffer = Cursor::new(Vec::new());
        cropped
            .to_rgb8()
            .write_to(&mut buffer, ImageFormat::Jpeg)
            .map_err(|e| BrainError::Pipeline(format!("failed to encode crop: {e}")))?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
#[path = "image_ops_tests.rs"]
mod tests;
