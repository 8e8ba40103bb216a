//! MATLAB brain-MRI to YOLO dataset converter
//!
//! This library converts MATLAB v7.3 (HDF5) tumour records into normalized JPEG
//! images with YOLO bounding-box labels, then splits the corpus into
//! train/val/test, optionally keeping each patient's images in a single split.

pub mod annotate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod io;
pub mod source;
pub mod split;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{AnnotateOptions, Args, ExtractOptions, Layout, ResizeFilter, SplitConfig};
pub use dataset::{process_dataset, run_pipeline};
pub use error::{Error, Result};
pub use source::{MatFileReader, RecordReader};
pub use split::{split_dataset, SplitReport};
pub use types::{OutputDirs, PixelGrid, Record, SplitData, SplitKind, SplitRatios, YoloBox};
