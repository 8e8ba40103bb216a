use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Extension of the source containers
pub const SOURCE_EXTENSION: &str = "mat";

/// Extension of the images written by the extractor
pub const IMAGE_EXTENSION: &str = "jpg";

/// Extension of the label files written by the annotator
pub const LABEL_EXTENSION: &str = "txt";

/// Reference resolution the tumour borders are expressed in
pub const DEFAULT_SOURCE_RESOLUTION: f64 = 512.0;

// A row-major grid of raw intensities as stored in the container
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl PixelGrid {
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Option<Self> {
        (width.checked_mul(height)? == data.len()).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// One source case, read once and discarded after conversion
#[derive(Debug, Clone)]
pub struct Record {
    /// Path of the container this record came from
    pub source: PathBuf,
    pub image: PixelGrid,
    /// Class label as stored (1-indexed)
    pub label: f64,
    /// Interleaved border coordinates `[x1, y1, x2, y2, ...]`
    pub border: Vec<f64>,
    /// UTF-16 character codes of the patient identifier, when present
    pub entity_codes: Option<Vec<u16>>,
}

/// Sanitized file stem of a source path; every artifact of the source is named after it
pub fn source_base_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(sanitize_filename::sanitize)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::MalformedField {
            path: path.to_path_buf(),
            field: "file name",
            reason: "source file has no usable base name".to_string(),
        })
}

impl Record {
    /// Base name of the source file, used to name every artifact of the record
    pub fn base_name(&self) -> Result<String> {
        source_base_name(&self.source)
    }
}

/// Normalized YOLO bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloBox {
    pub class_index: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl fmt::Display for YoloBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_index, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// The three dataset splits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Train,
    Val,
    Test,
}

impl SplitKind {
    pub const ALL: [SplitKind; 3] = [SplitKind::Train, SplitKind::Val, SplitKind::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Val => "val",
            SplitKind::Test => "test",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// Struct to hold the split partition units for training, validation, and testing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitData<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> SplitData<T> {
    pub fn get(&self, kind: SplitKind) -> &[T] {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Val => &self.val,
            SplitKind::Test => &self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Train and validation proportions; the test split takes the remainder
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitRatios {
    train: f64,
    val: f64,
}

impl SplitRatios {
    // Slack for sums such as 0.7 + 0.3 that land a hair above 1.0
    const SUM_TOLERANCE: f64 = 1e-9;

    pub fn new(train: f64, val: f64) -> Result<Self> {
        for (name, value) in [("train_ratio", train), ("val_ratio", val)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidRatios(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        if train + val > 1.0 + Self::SUM_TOLERANCE {
            return Err(Error::InvalidRatios(format!(
                "train_ratio + val_ratio must not exceed 1.0, got {train} + {val}"
            )));
        }
        Ok(Self { train, val })
    }

    pub fn train(&self) -> f64 {
        self.train
    }

    pub fn val(&self) -> f64 {
        self.val
    }

    pub fn test(&self) -> f64 {
        (1.0 - self.train - self.val).max(0.0)
    }

    /// Split sizes for `n` units: `(floor(n * train), floor(n * val), remainder)`
    pub fn counts(&self, n: usize) -> (usize, usize, usize) {
        let n_train = ((n as f64 * self.train).floor() as usize).min(n);
        let n_val = ((n as f64 * self.val).floor() as usize).min(n - n_train);
        (n_train, n_val, n - n_train - n_val)
    }
}

// Struct to hold the paths of the flat (pre-split) output directories
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub split_root: PathBuf,
}

// Struct to hold conversion statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub records_read: usize,
    pub images_written: usize,
    pub labels_written: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.records_read += other.records_read;
        self.images_written += other.images_written;
        self.labels_written += other.labels_written;
        self
    }

    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("Records read: {}", self.records_read);
        log::info!("Images written: {}", self.images_written);
        log::info!("Label files written: {}", self.labels_written);
    }
}
