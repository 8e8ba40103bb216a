//! Error type shared by every stage of the conversion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: missing field `{field}`", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("{}: malformed field `{field}`: {reason}", path.display())]
    MalformedField {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },

    #[error("{}: class label {label} is outside 1..={max}", path.display())]
    LabelOutOfRange { path: PathBuf, label: f64, max: u32 },

    #[error("{}: image grid is empty", path.display())]
    EmptyImage { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid split ratios: {0}")]
    InvalidRatios(String),

    #[error("duplicate record name `{name}` in {} and {}", first.display(), second.display())]
    DuplicateRecord {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to encode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read container {}: {message}", path.display())]
    Container { path: PathBuf, message: String },

    #[error("cannot read {}: built without HDF5 support (enable the `hdf5` feature)", path.display())]
    Unsupported { path: PathBuf },

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to serialize split manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Attach the offending path to an I/O error
pub trait IoContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
