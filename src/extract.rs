//! Extractor: turns the raw pixel grid of a record into an 8-bit JPEG

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, GrayImage};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ExtractOptions, Layout};
use crate::error::{Error, IoContext, Result};
use crate::source::{ENTITY_FIELD, IMAGE_FIELD};
use crate::types::{PixelGrid, Record, IMAGE_EXTENSION};

/// Rescale intensities to 0..=255 using the grid's own minimum and maximum.
///
/// A constant grid has no range to stretch and maps to all zeros.
pub fn normalize_to_u8(data: &[f64]) -> Vec<u8> {
    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
            (min.min(v), max.max(v))
        });

    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0; data.len()];
    }

    let scale = 255.0 / range;
    data.iter()
        .map(|&v| (scale * (v - min)).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// Decode the UTF-16 character codes MATLAB stores for a string.
///
/// Returns `None` for invalid code units or an identifier that is blank once
/// trailing padding is removed.
pub fn decode_entity_id(codes: &[u16]) -> Option<String> {
    let decoded = String::from_utf16(codes).ok()?;
    let trimmed = decoded.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Directory name of the patient owning `record`, when the layout nests by patient
pub fn entity_dir(record: &Record, layout: Layout) -> Result<Option<String>> {
    if layout == Layout::Flat {
        return Ok(None);
    }

    let codes = record
        .entity_codes
        .as_deref()
        .ok_or_else(|| Error::MissingField {
            path: record.source.clone(),
            field: ENTITY_FIELD,
        })?;
    let id = decode_entity_id(codes).ok_or_else(|| Error::MalformedField {
        path: record.source.clone(),
        field: ENTITY_FIELD,
        reason: "patient identifier is not a valid, non-blank string".to_string(),
    })?;

    let dir = sanitize_filename::sanitize(&id);
    if dir.is_empty() {
        return Err(Error::MalformedField {
            path: record.source.clone(),
            field: ENTITY_FIELD,
            reason: format!("patient identifier `{id}` is not usable as a directory name"),
        });
    }
    Ok(Some(dir))
}

/// Output path `<dir>[/<entity>]/<base>.<ext>`, creating the entity directory on demand
pub(crate) fn artifact_path(
    record: &Record,
    dir: &Path,
    layout: Layout,
    extension: &str,
) -> Result<PathBuf> {
    let parent = match entity_dir(record, layout)? {
        Some(entity) => {
            let nested = dir.join(entity);
            fs::create_dir_all(&nested).with_path(&nested)?;
            nested
        }
        None => dir.to_path_buf(),
    };
    Ok(parent.join(format!("{}.{extension}", record.base_name()?)))
}

/// Build the 8-bit image for a grid, resized when a target size is configured
pub fn render(grid: &PixelGrid, options: &ExtractOptions) -> Option<GrayImage> {
    let pixels = normalize_to_u8(&grid.data);
    let image = GrayImage::from_raw(grid.width as u32, grid.height as u32, pixels)?;

    Some(match options.target_size {
        Some(size) if (image.width(), image.height()) != (size, size) => {
            imageops::resize(&image, size, size, options.filter.into())
        }
        _ => image,
    })
}

/// Write the JPEG for `record` into `images_dir` and return its path
pub fn extract_image(
    record: &Record,
    images_dir: &Path,
    options: &ExtractOptions,
) -> Result<PathBuf> {
    if record.image.is_empty() {
        return Err(Error::EmptyImage {
            path: record.source.clone(),
        });
    }
    if record.image.data.iter().any(|v| !v.is_finite()) {
        return Err(Error::MalformedField {
            path: record.source.clone(),
            field: IMAGE_FIELD,
            reason: "image contains non-finite intensities".to_string(),
        });
    }

    let output_path = artifact_path(record, images_dir, options.layout, IMAGE_EXTENSION)?;
    let image = render(&record.image, options).ok_or_else(|| Error::MalformedField {
        path: record.source.clone(),
        field: IMAGE_FIELD,
        reason: "grid dimensions exceed the supported image size".to_string(),
    })?;

    let mut encoded = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(
            &mut encoded,
            options.jpeg_quality,
        ))
        .map_err(|source| Error::Image {
            path: output_path.clone(),
            source,
        })?;
    fs::write(&output_path, &encoded).with_path(&output_path)?;

    debug!(
        "Processed: {} -> {}",
        record.source.display(),
        output_path.display()
    );
    Ok(output_path)
}
