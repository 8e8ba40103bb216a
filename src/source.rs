//! Source containers
//!
//! Each case of the dataset is a MATLAB v7.3 file, which is an HDF5 file holding a
//! `cjdata` group with the datasets `image`, `label`, `tumorBorder` and, in the
//! patient-tagged releases, `PID`. Readers hand back a [`Record`] and fail fast on
//! any absent or malformed field so that no case silently drops out of the corpus.

use std::path::Path;

use crate::error::Result;
use crate::types::Record;

/// Name of the struct group MATLAB writes the case into
pub const RECORD_GROUP: &str = "cjdata";

pub const IMAGE_FIELD: &str = "image";
pub const LABEL_FIELD: &str = "label";
pub const BORDER_FIELD: &str = "tumorBorder";
pub const ENTITY_FIELD: &str = "PID";

/// Something that can turn a source path into a [`Record`]
pub trait RecordReader {
    fn read(&self, path: &Path) -> Result<Record>;
}

/// Reader for MATLAB v7.3 `.mat` files
#[derive(Debug, Clone, Default)]
pub struct MatFileReader;

impl MatFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl RecordReader for MatFileReader {
    #[cfg(feature = "hdf5")]
    fn read(&self, path: &Path) -> Result<Record> {
        mat::read_record(path)
    }

    #[cfg(not(feature = "hdf5"))]
    fn read(&self, path: &Path) -> Result<Record> {
        Err(crate::error::Error::Unsupported {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(feature = "hdf5")]
mod mat {
    use std::path::Path;

    use super::{BORDER_FIELD, ENTITY_FIELD, IMAGE_FIELD, LABEL_FIELD, RECORD_GROUP};
    use crate::error::{Error, Result};
    use crate::types::{PixelGrid, Record};

    fn container_error(path: &Path, err: hdf5::Error) -> Error {
        Error::Container {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    fn dataset(group: &hdf5::Group, path: &Path, field: &'static str) -> Result<hdf5::Dataset> {
        if !group.link_exists(field) {
            return Err(Error::MissingField {
                path: path.to_path_buf(),
                field,
            });
        }
        group.dataset(field).map_err(|e| container_error(path, e))
    }

    pub(super) fn read_record(path: &Path) -> Result<Record> {
        let file = hdf5::File::open(path).map_err(|e| container_error(path, e))?;
        if !file.link_exists(RECORD_GROUP) {
            return Err(Error::MissingField {
                path: path.to_path_buf(),
                field: RECORD_GROUP,
            });
        }
        let group = file
            .group(RECORD_GROUP)
            .map_err(|e| container_error(path, e))?;

        // Read as f64 so the rescale sees the full dynamic range
        let image_ds = dataset(&group, path, IMAGE_FIELD)?;
        let shape = image_ds.shape();
        let [height, width] = shape[..] else {
            return Err(Error::MalformedField {
                path: path.to_path_buf(),
                field: IMAGE_FIELD,
                reason: format!("expected a 2-D array, got shape {shape:?}"),
            });
        };
        let data = image_ds
            .read_raw::<f64>()
            .map_err(|e| container_error(path, e))?;
        let image = PixelGrid::new(width, height, data).ok_or_else(|| Error::MalformedField {
            path: path.to_path_buf(),
            field: IMAGE_FIELD,
            reason: "pixel count does not match the array shape".to_string(),
        })?;

        let label = dataset(&group, path, LABEL_FIELD)?
            .read_raw::<f64>()
            .map_err(|e| container_error(path, e))?
            .first()
            .copied()
            .ok_or_else(|| Error::MalformedField {
                path: path.to_path_buf(),
                field: LABEL_FIELD,
                reason: "label array is empty".to_string(),
            })?;

        let border = dataset(&group, path, BORDER_FIELD)?
            .read_raw::<f64>()
            .map_err(|e| container_error(path, e))?;

        let entity_codes = if group.link_exists(ENTITY_FIELD) {
            let codes = dataset(&group, path, ENTITY_FIELD)?
                .read_raw::<u16>()
                .map_err(|e| container_error(path, e))?;
            Some(codes)
        } else {
            None
        };

        Ok(Record {
            source: path.to_path_buf(),
            image,
            label,
            border,
            entity_codes,
        })
    }
}
