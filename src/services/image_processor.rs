// src/services/image_processor.rs
use crate::errors::IconError;
use crate::models::ReferenceImage;
use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat};
use log::{info, warn};
use std::io::Cursor;

// Anthropic rejects inline images over 5MB of base64 (~3.75MB raw)
const ANTHROPIC_MAX_BYTES: usize = 3_750_000;

#[derive(Debug, Clone, Default)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Checks an uploaded reference image.
    ///
    /// Only the MIME type and content are enforced. Raster dimensions are
    /// returned when the bytes decode; formats the decoder lacks (HEIC, AVIF)
    /// are accepted as is and left to the provider.
    pub fn validate(&self, image: &ReferenceImage) -> Result<Option<(u32, u32)>, IconError> {
        if !image.mime_type.starts_with("image/") {
            return Err(IconError::Validation(format!(
                "Unsupported file type: {}",
                image.mime_type
            )));
        }
        if image.data.is_empty() {
            return Err(IconError::Validation("Image file is empty".to_string()));
        }
        if image.is_vector() {
            return Ok(None);
        }

        match image::load_from_memory(&image.data) {
            Ok(img) => Ok(Some(img.dimensions())),
            Err(e) => {
                warn!(
                    "Could not decode {} ({}): {}; accepting without dimensions",
                    image.filename, image.mime_type, e
                );
                Ok(None)
            }
        }
    }

    /// Downscales and re-encodes raster images that exceed Anthropic's payload limit.
    pub fn fit_for_anthropic(&self, image: &ReferenceImage) -> Result<ReferenceImage, IconError> {
        if image.data.len() <= ANTHROPIC_MAX_BYTES || image.is_vector() {
            return Ok(image.clone());
        }

        let img = image::load_from_memory(&image.data)
            .map_err(|e| IconError::ImageProcessing(format!("Failed to load image: {}", e)))?;
        let (width, height) = img.dimensions();

        let scale_factor = ((ANTHROPIC_MAX_BYTES as f64 / image.data.len() as f64).sqrt() * 0.9) as f32;
        let new_width = ((width as f32 * scale_factor) as u32).max(256);
        let new_height = ((height as f32 * scale_factor) as u32).max(256);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        DynamicImage::ImageRgb8(resized.to_rgb8())
            .write_to(&mut Cursor::new(&mut output), ImgFormat::Jpeg)
            .map_err(|e| {
                IconError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        info!(
            "Resized {} from {} to {} bytes for Anthropic",
            image.filename,
            image.data.len(),
            output.len()
        );

        Ok(ReferenceImage {
            filename: image.filename.clone(),
            mime_type: "image/jpeg".to_string(),
            data: output,
        })
    }
}
