#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use mat2yolo::{PixelGrid, Record, RecordReader, Result};

/// A square grid whose intensities rise along each row
pub fn gradient_grid(size: usize) -> PixelGrid {
    let data = (0..size * size).map(|i| (i % size) as f64 * 10.0 - 40.0).collect();
    PixelGrid::new(size, size, data).unwrap()
}

pub fn record(name: &str, label: f64, border: Vec<f64>, patient: Option<&str>) -> Record {
    Record {
        source: PathBuf::from(format!("/data/{name}.mat")),
        image: gradient_grid(16),
        label,
        border,
        entity_codes: patient.map(|id| id.encode_utf16().collect()),
    }
}

pub fn square_border() -> Vec<f64> {
    vec![100.0, 50.0, 200.0, 50.0, 200.0, 150.0, 100.0, 150.0]
}

/// In-memory stand-in for the HDF5 container, keyed by source base name
#[derive(Default)]
pub struct MemoryReader {
    pub records: HashMap<String, Record>,
}

impl MemoryReader {
    pub fn insert(&mut self, record: Record) {
        let name = record
            .source
            .file_stem()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        self.records.insert(name, record);
    }
}

impl RecordReader for MemoryReader {
    fn read(&self, path: &Path) -> Result<Record> {
        let name = path.file_stem().unwrap().to_string_lossy().into_owned();
        let mut record = self.records.get(&name).cloned().ok_or_else(|| {
            mat2yolo::Error::MissingField {
                path: path.to_path_buf(),
                field: "cjdata",
            }
        })?;
        record.source = path.to_path_buf();
        Ok(record)
    }
}

/// Create an empty placeholder source file for every record name
pub fn touch_sources(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(format!("{name}.mat")), b"").unwrap();
    }
}

/// Sorted file names in a directory, empty when it does not exist
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
