use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar().template(&format!(
        "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
        label
    )) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_directory(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path).with_path(path)?;
    Ok(path.to_path_buf())
}

/// Delete a directory if present and recreate it empty
pub fn recreate_directory(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        log::warn!(
            "Directory {:?} already exists. Deleting and recreating it.",
            path
        );
        fs::remove_dir_all(path).with_path(path)?;
    }
    ensure_directory(path)
}

/// Copy `src` to `dst`, overwriting `dst`, and carry over the access and
/// modification times of `src`
pub fn copy_preserving_times(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).with_path(src)?;

    let metadata = fs::metadata(src).with_path(src)?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }

    File::options()
        .write(true)
        .open(dst)
        .and_then(|file| file.set_times(times))
        .with_path(dst)
}

/// Sorted list of the files in `dir` with the given extension (non-recursive)
pub fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_path(dir)? {
        let path = entry.with_path(dir)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Sorted names of the immediate subdirectories of `dir`
pub fn list_subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        if entry.file_type().with_path(entry.path())?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            } else {
                log::warn!("Skipping non UTF-8 directory {:?}", entry.path());
            }
        }
    }
    names.sort();
    Ok(names)
}
