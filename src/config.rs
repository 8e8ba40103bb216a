use clap::{Parser, ValueEnum};
use image::imageops::FilterType;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Result;
use crate::types::{SplitRatios, DEFAULT_SOURCE_RESOLUTION};

/// Command-line arguments for converting MATLAB brain-MRI records to a YOLO dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directories containing the source .mat files
    #[arg(short = 'i', long = "input_dir", num_args = 1..)]
    pub input_dirs: Vec<PathBuf>,

    /// Directory receiving images/, labels/ and the split dataset
    #[arg(short = 'o', long = "output_dir", default_value = "output")]
    pub output_dir: PathBuf,

    /// Name of the split dataset directory inside output_dir
    #[arg(long = "split_dir", default_value = "dataset")]
    pub split_dir: String,

    /// Proportion of units used for training
    #[arg(long = "train_ratio", default_value_t = 0.7, value_parser = validate_ratio)]
    pub train_ratio: f64,

    /// Proportion of units used for validation; test takes the remainder
    #[arg(long = "val_ratio", default_value_t = 0.1, value_parser = validate_ratio)]
    pub val_ratio: f64,

    /// Seed for the split shuffle
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Keep every patient's images together in one split
    #[arg(long = "group_by_patient")]
    pub group_by_patient: bool,

    /// Side length of the square images fed to the model
    #[arg(long = "image_size", default_value_t = 224, value_parser = clap::value_parser!(u32).range(1..))]
    pub image_size: u32,

    /// Keep the native resolution instead of resizing
    #[arg(long = "keep_resolution")]
    pub keep_resolution: bool,

    /// Resampling filter used when resizing
    #[arg(long = "filter", value_enum, default_value = "lanczos3")]
    pub filter: ResizeFilter,

    /// JPEG quality of the written images
    #[arg(long = "jpeg_quality", default_value_t = 75, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Resolution the tumour border coordinates are expressed in
    #[arg(long = "source_resolution", default_value_t = DEFAULT_SOURCE_RESOLUTION, value_parser = validate_resolution)]
    pub source_resolution: f64,

    /// Ordered class names; label 1 maps to the first entry
    #[arg(
        long = "class_names",
        use_value_delimiter = true,
        default_value = "meningioma,glioma,pituitary"
    )]
    pub class_names: Vec<String>,

    /// Only split the existing images/ and labels/ directories
    #[arg(long = "split_only")]
    pub split_only: bool,
}

/// Resampling filters offered for resizing (no nearest-neighbour)
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum ResizeFilter {
    #[default]
    Lanczos3,
    CatmullRom,
    Gaussian,
    Triangle,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Triangle => FilterType::Triangle,
        }
    }
}

/// Output layout of the converted records
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Every file directly in images/ and labels/, split by record
    #[default]
    Flat,
    /// One subdirectory per patient, split by patient
    ByEntity,
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Square target size, `None` keeps the native resolution
    pub target_size: Option<u32>,
    pub filter: ResizeFilter,
    pub jpeg_quality: u8,
    pub layout: Layout,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            target_size: Some(224),
            filter: ResizeFilter::default(),
            jpeg_quality: 75,
            layout: Layout::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    pub source_resolution: f64,
    pub num_classes: u32,
    pub layout: Layout,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            source_resolution: DEFAULT_SOURCE_RESOLUTION,
            num_classes: 3,
            layout: Layout::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub ratios: SplitRatios,
    pub seed: u64,
    pub layout: Layout,
}

impl Args {
    pub fn layout(&self) -> Layout {
        if self.group_by_patient {
            Layout::ByEntity
        } else {
            Layout::Flat
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            target_size: (!self.keep_resolution).then_some(self.image_size),
            filter: self.filter,
            jpeg_quality: self.jpeg_quality,
            layout: self.layout(),
        }
    }

    pub fn annotate_options(&self) -> AnnotateOptions {
        AnnotateOptions {
            source_resolution: self.source_resolution,
            num_classes: self.class_names.len() as u32,
            layout: self.layout(),
        }
    }

    /// Build the split configuration, rejecting ratios that sum above one
    pub fn split_config(&self) -> Result<SplitConfig> {
        Ok(SplitConfig {
            ratios: SplitRatios::new(self.train_ratio, self.val_ratio)?,
            seed: self.seed,
            layout: self.layout(),
        })
    }
}

// Validate that the ratio is between 0.0 and 1.0
pub fn validate_ratio(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0".to_string()),
    }
}

// Validate that the resolution is a positive, finite number of pixels
pub fn validate_resolution(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val > 0.0 => Ok(val),
        _ => Err("RESOLUTION must be a positive number".to_string()),
    }
}
