//! Annotator: derives the YOLO bounding box of a record from its tumour border

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::AnnotateOptions;
use crate::error::{Error, IoContext, Result};
use crate::extract::artifact_path;
use crate::source::BORDER_FIELD;
use crate::types::{Record, YoloBox, LABEL_EXTENSION};

/// Zero-based class index for a 1-indexed source label
pub fn class_index(record: &Record, num_classes: u32) -> Result<u32> {
    let label = record.label;
    if label.fract() != 0.0 || label < 1.0 || label > f64::from(num_classes) {
        return Err(Error::LabelOutOfRange {
            path: record.source.clone(),
            label,
            max: num_classes,
        });
    }
    Ok(label as u32 - 1)
}

/// Axis-aligned extent `(x_min, y_min, x_max, y_max)` of an interleaved
/// `[x1, y1, x2, y2, ...]` border
pub fn border_extent(record: &Record) -> Result<(f64, f64, f64, f64)> {
    let malformed = |reason: &str| Error::MalformedField {
        path: record.source.clone(),
        field: BORDER_FIELD,
        reason: reason.to_string(),
    };

    let border = &record.border;
    if border.is_empty() {
        return Err(malformed("border has no points"));
    }
    if border.len() % 2 != 0 {
        return Err(malformed("border has an odd number of coordinates"));
    }
    if border.iter().any(|v| !v.is_finite()) {
        return Err(malformed("border contains non-finite coordinates"));
    }

    Ok(border.chunks_exact(2).fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(x_min, y_min, x_max, y_max), point| {
            let (x, y) = (point[0], point[1]);
            (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
        },
    ))
}

/// Calculate the normalized bounding box against the fixed source resolution
pub fn calculate_bounding_box(record: &Record, options: &AnnotateOptions) -> Result<YoloBox> {
    let class_index = class_index(record, options.num_classes)?;
    let (x_min, y_min, x_max, y_max) = border_extent(record)?;
    let resolution = options.source_resolution;

    Ok(YoloBox {
        class_index,
        x_center: (x_min + x_max) / 2.0 / resolution,
        y_center: (y_min + y_max) / 2.0 / resolution,
        width: (x_max - x_min) / resolution,
        height: (y_max - y_min) / resolution,
    })
}

/// Write the label file for `record` into `labels_dir` and return its path
pub fn annotate_record(
    record: &Record,
    labels_dir: &Path,
    options: &AnnotateOptions,
) -> Result<PathBuf> {
    let bbox = calculate_bounding_box(record, options)?;
    write_label(record, &bbox, labels_dir, options)
}

/// Write an already computed box as the label file of `record`
pub fn write_label(
    record: &Record,
    bbox: &YoloBox,
    labels_dir: &Path,
    options: &AnnotateOptions,
) -> Result<PathBuf> {
    let output_path = artifact_path(record, labels_dir, options.layout, LABEL_EXTENSION)?;

    fs::write(&output_path, format!("{bbox}\n")).with_path(&output_path)?;

    debug!(
        "Processed: {} -> {}",
        record.source.display(),
        output_path.display()
    );
    Ok(output_path)
}
