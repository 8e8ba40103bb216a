use glob::glob;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, IoContext, Result};
use crate::split::SplitManifest;
use crate::types::{source_base_name, OutputDirs, SplitKind, SOURCE_EXTENSION};
use crate::utils::{ensure_directory, recreate_directory};

pub const IMAGES_DIR: &str = "images";
pub const LABELS_DIR: &str = "labels";
pub const DATASET_YAML: &str = "dataset.yaml";
pub const SPLIT_MANIFEST: &str = "split_manifest.json";

/// Set up the flat output directories and the split root below `output_dir`.
///
/// Existing contents are kept: converted records are overwritten in place on a rerun.
pub fn setup_output_directories(output_dir: &Path, split_dir: &str) -> Result<OutputDirs> {
    let nested_in_corpus = Path::new(split_dir)
        .components()
        .find(|c| !matches!(c, Component::CurDir))
        .is_some_and(|c| c.as_os_str() == IMAGES_DIR || c.as_os_str() == LABELS_DIR);
    if nested_in_corpus {
        return Err(Error::Config(format!(
            "split_dir `{split_dir}` would place the split inside the converted {IMAGES_DIR}/ or {LABELS_DIR}/ directory"
        )));
    }

    Ok(OutputDirs {
        images_dir: ensure_directory(&output_dir.join(IMAGES_DIR))?,
        labels_dir: ensure_directory(&output_dir.join(LABELS_DIR))?,
        split_root: ensure_directory(&output_dir.join(split_dir))?,
    })
}

/// Recreate `<split_root>/{train,val,test}/{images,labels}` empty
pub fn setup_split_directories(split_root: &Path) -> Result<()> {
    for kind in SplitKind::ALL {
        let split_dir = recreate_directory(&split_root.join(kind.as_str()))?;
        ensure_directory(&split_dir.join(IMAGES_DIR))?;
        ensure_directory(&split_dir.join(LABELS_DIR))?;
    }
    Ok(())
}

/// Collect every source container across `input_dirs`, sorted by path.
///
/// Two sources whose sanitized base names match would write the same outputs, so
/// that is rejected instead of letting one silently overwrite the other.
pub fn collect_source_files(input_dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for dir in input_dirs {
        if !dir.is_dir() {
            return Err(Error::Io {
                path: dir.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "input directory does not exist",
                ),
            });
        }

        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            SOURCE_EXTENSION
        );
        let before = sources.len();
        for entry in glob(&pattern)? {
            match entry {
                Ok(path) => sources.push(path),
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }
        if sources.len() == before {
            warn!("No .{} files found in {}", SOURCE_EXTENSION, dir.display());
        } else {
            debug!(
                "Found {} source files in {}",
                sources.len() - before,
                dir.display()
            );
        }
    }
    sources.sort();

    let mut seen: HashMap<String, &PathBuf> = HashMap::new();
    for path in &sources {
        let name = source_base_name(path)?;
        if let Some(first) = seen.insert(name.clone(), path) {
            return Err(Error::DuplicateRecord {
                name,
                first: first.clone(),
                second: path.clone(),
            });
        }
    }

    Ok(sources)
}

/// Create the dataset.yaml file for YOLO training
pub fn create_dataset_yaml(split_root: &Path, class_names: &[String]) -> Result<PathBuf> {
    let dataset_yaml_path = split_root.join(DATASET_YAML);
    let absolute_path = fs::canonicalize(split_root).with_path(split_root)?;

    let mut yaml_content = format!("path: {}\n", absolute_path.to_string_lossy());
    for kind in SplitKind::ALL {
        yaml_content.push_str(&format!("{}: {}/{}\n", kind, kind, IMAGES_DIR));
    }
    yaml_content.push_str("\nnames:\n");
    for (id, name) in class_names.iter().enumerate() {
        yaml_content.push_str(&format!("    {}: {}\n", id, name));
    }

    let mut dataset_yaml =
        BufWriter::new(File::create(&dataset_yaml_path).with_path(&dataset_yaml_path)?);
    dataset_yaml
        .write_all(yaml_content.as_bytes())
        .and_then(|_| dataset_yaml.flush())
        .with_path(&dataset_yaml_path)?;
    Ok(dataset_yaml_path)
}

/// Record which units landed in which split
pub fn write_split_manifest(split_root: &Path, manifest: &SplitManifest) -> Result<PathBuf> {
    let manifest_path = split_root.join(SPLIT_MANIFEST);
    let file = File::create(&manifest_path).with_path(&manifest_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, manifest)?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .with_path(&manifest_path)?;
    Ok(manifest_path)
}
