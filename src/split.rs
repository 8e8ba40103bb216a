//! Organizer: deterministic train/val/test partitioning of the converted corpus
//!
//! Partition units are either single images (flat layout) or whole patients
//! (per-patient layout). Units are sorted by id, shuffled with an explicitly
//! seeded [`ChaCha12Rng`] and cut at `floor(n * train_ratio)` and
//! `floor(n * val_ratio)`; the test split takes the remainder. Files are copied,
//! never moved, so the converted corpus stays intact.

use log::{info, warn};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{Layout, SplitConfig};
use crate::error::{Error, Result};
use crate::io::{setup_split_directories, write_split_manifest, IMAGES_DIR, LABELS_DIR};
use crate::types::{OutputDirs, SplitData, SplitKind, SplitRatios, IMAGE_EXTENSION, LABEL_EXTENSION};
use crate::utils::{copy_preserving_times, list_files_with_extension, list_subdirectories};

/// An image together with the label file expected next to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitImage {
    pub image: PathBuf,
    /// Expected label path; it may not exist
    pub label: PathBuf,
}

/// The smallest group of images that is assigned to a split as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: String,
    pub images: Vec<UnitImage>,
}

/// Random generator used for the split shuffle
pub fn split_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

fn unit_images(image_dir: &Path, label_dir: &Path) -> Result<Vec<UnitImage>> {
    list_files_with_extension(image_dir, IMAGE_EXTENSION)?
        .into_iter()
        .map(|image| {
            let stem = image.file_stem().ok_or_else(|| Error::MalformedField {
                path: image.clone(),
                field: "file name",
                reason: "image has no base name".to_string(),
            })?;
            let mut label_name = stem.to_os_string();
            label_name.push(".");
            label_name.push(LABEL_EXTENSION);
            let label = label_dir.join(label_name);
            Ok(UnitImage { image, label })
        })
        .collect()
}

/// Enumerate the partition units found in the converted corpus, sorted by id
pub fn collect_units(images_dir: &Path, labels_dir: &Path, layout: Layout) -> Result<Vec<Unit>> {
    let mut units = match layout {
        Layout::Flat => unit_images(images_dir, labels_dir)?
            .into_iter()
            .map(|image| Unit {
                id: image
                    .image
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                images: vec![image],
            })
            .collect::<Vec<_>>(),
        Layout::ByEntity => list_subdirectories(images_dir)?
            .into_iter()
            .map(|entity| {
                let images = unit_images(&images_dir.join(&entity), &labels_dir.join(&entity))?;
                if images.is_empty() {
                    warn!("Patient {} has no images", entity);
                }
                Ok(Unit {
                    id: entity,
                    images,
                })
            })
            .collect::<Result<Vec<_>>>()?,
    };
    units.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(units)
}

/// Shuffle `units` with `rng` and cut them into train, val and test.
///
/// Split sizes are exactly those of [`SplitRatios::counts`], whatever the rounding.
pub fn partition<T, R>(mut units: Vec<T>, ratios: &SplitRatios, rng: &mut R) -> SplitData<T>
where
    R: Rng + ?Sized,
{
    units.shuffle(rng);
    let (n_train, n_val, _) = ratios.counts(units.len());

    let test = units.split_off(n_train + n_val);
    let val = units.split_off(n_train);
    SplitData {
        train: units,
        val,
        test,
    }
}

/// Sort units by id, then partition them with a generator seeded from `config`
pub fn assign_units(mut units: Vec<Unit>, config: &SplitConfig) -> SplitData<Unit> {
    units.sort_by(|a, b| a.id.cmp(&b.id));
    partition(units, &config.ratios, &mut split_rng(config.seed))
}

/// Per-split tallies of a materialized split
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitCount {
    pub units: usize,
    pub images: usize,
    pub labels: usize,
    pub missing_labels: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    pub layout: Layout,
    pub train: SplitCount,
    pub val: SplitCount,
    pub test: SplitCount,
}

impl SplitReport {
    pub fn get(&self, kind: SplitKind) -> &SplitCount {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Val => &self.val,
            SplitKind::Test => &self.test,
        }
    }

    fn get_mut(&mut self, kind: SplitKind) -> &mut SplitCount {
        match kind {
            SplitKind::Train => &mut self.train,
            SplitKind::Val => &mut self.val,
            SplitKind::Test => &mut self.test,
        }
    }

    pub fn total_units(&self) -> usize {
        SplitKind::ALL.iter().map(|&kind| self.get(kind).units).sum()
    }

    pub fn total_images(&self) -> usize {
        SplitKind::ALL.iter().map(|&kind| self.get(kind).images).sum()
    }

    pub fn print_summary(&self) {
        let unit_name = match self.layout {
            Layout::Flat => "images",
            Layout::ByEntity => "patients",
        };
        info!("=== Split Summary ===");
        for kind in SplitKind::ALL {
            let count = self.get(kind);
            match self.layout {
                Layout::Flat => info!("{:>5}: {} {}", kind, count.units, unit_name),
                Layout::ByEntity => info!(
                    "{:>5}: {} {} ({} images)",
                    kind, count.units, unit_name, count.images
                ),
            }
        }
        info!(
            "Total: {} {} ({} images)",
            self.total_units(),
            unit_name,
            self.total_images()
        );

        let missing: usize = SplitKind::ALL
            .iter()
            .map(|&kind| self.get(kind).missing_labels)
            .sum();
        if missing > 0 {
            warn!("{} images were copied without a label file", missing);
        }
    }
}

/// Copy every unit's images and labels into `<split_root>/<split>/{images,labels}`.
///
/// A missing label is reported and skipped; any copy failure aborts.
pub fn materialize(
    split: &SplitData<Unit>,
    split_root: &Path,
    layout: Layout,
) -> Result<SplitReport> {
    let mut report = SplitReport {
        layout,
        train: SplitCount::default(),
        val: SplitCount::default(),
        test: SplitCount::default(),
    };

    for kind in SplitKind::ALL {
        let images_dst = split_root.join(kind.as_str()).join(IMAGES_DIR);
        let labels_dst = split_root.join(kind.as_str()).join(LABELS_DIR);
        let count = report.get_mut(kind);

        for unit in split.get(kind) {
            count.units += 1;
            for UnitImage { image, label } in &unit.images {
                let Some(file_name) = image.file_name() else {
                    continue;
                };
                copy_preserving_times(image, &images_dst.join(file_name))?;
                count.images += 1;

                if label.is_file() {
                    let Some(label_name) = label.file_name() else {
                        continue;
                    };
                    copy_preserving_times(label, &labels_dst.join(label_name))?;
                    count.labels += 1;
                } else {
                    match layout {
                        Layout::Flat => {
                            warn!("Label file not found for image {}", image.display())
                        }
                        Layout::ByEntity => warn!(
                            "Label file not found for patient {}, image {}",
                            unit.id,
                            image.display()
                        ),
                    }
                    count.missing_labels += 1;
                }
            }
        }
    }

    Ok(report)
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestUnit {
    pub id: String,
    pub images: usize,
}

/// Reproducibility record of a split run
#[derive(Debug, Clone, Serialize)]
pub struct SplitManifest {
    pub seed: u64,
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub test_ratio: f64,
    pub layout: Layout,
    pub train: Vec<ManifestUnit>,
    pub val: Vec<ManifestUnit>,
    pub test: Vec<ManifestUnit>,
}

impl SplitManifest {
    pub fn new(split: &SplitData<Unit>, config: &SplitConfig) -> Self {
        let units = |kind: SplitKind| -> Vec<ManifestUnit> {
            split
                .get(kind)
                .iter()
                .map(|unit| ManifestUnit {
                    id: unit.id.clone(),
                    images: unit.images.len(),
                })
                .collect()
        };
        Self {
            seed: config.seed,
            train_ratio: config.ratios.train(),
            val_ratio: config.ratios.val(),
            test_ratio: config.ratios.test(),
            layout: config.layout,
            train: units(SplitKind::Train),
            val: units(SplitKind::Val),
            test: units(SplitKind::Test),
        }
    }
}

/// Split the converted corpus in `dirs` and materialize it under `dirs.split_root`
pub fn split_dataset(dirs: &OutputDirs, config: &SplitConfig) -> Result<SplitReport> {
    let units = collect_units(&dirs.images_dir, &dirs.labels_dir, config.layout)?;
    info!("Collected {} partition units.", units.len());

    let split = assign_units(units, config);
    setup_split_directories(&dirs.split_root)?;
    let report = materialize(&split, &dirs.split_root, config.layout)?;
    write_split_manifest(&dirs.split_root, &SplitManifest::new(&split, config))?;

    Ok(report)
}
