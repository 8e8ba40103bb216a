use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::annotate::{calculate_bounding_box, write_label};
use crate::config::{AnnotateOptions, Args, ExtractOptions};
use crate::error::{Error, Result};
use crate::extract::extract_image;
use crate::io::{collect_source_files, create_dataset_yaml, setup_output_directories};
use crate::source::{MatFileReader, RecordReader};
use crate::split::{split_dataset, SplitReport};
use crate::types::{OutputDirs, ProcessingStats};
use crate::utils::create_progress_bar;

/// Read one source and write its image and label.
///
/// The box is computed first so that a rejected record leaves no image behind.
pub fn convert_record<R: RecordReader + ?Sized>(
    reader: &R,
    path: &Path,
    dirs: &OutputDirs,
    extract: &ExtractOptions,
    annotate: &AnnotateOptions,
) -> Result<ProcessingStats> {
    let record = reader.read(path)?;
    let bbox = calculate_bounding_box(&record, annotate)?;
    extract_image(&record, &dirs.images_dir, extract)?;
    write_label(&record, &bbox, &dirs.labels_dir, annotate)?;

    Ok(ProcessingStats {
        records_read: 1,
        images_written: 1,
        labels_written: 1,
    })
}

/// Convert every source in parallel; the first failing record aborts the run
pub fn convert_records<R: RecordReader + Sync + ?Sized>(
    reader: &R,
    sources: &[PathBuf],
    dirs: &OutputDirs,
    extract: &ExtractOptions,
    annotate: &AnnotateOptions,
) -> Result<ProcessingStats> {
    let pb = create_progress_bar(sources.len() as u64, "Convert");

    let stats = sources
        .par_iter()
        .map(|path| -> Result<ProcessingStats> {
            let stats = convert_record(reader, path, dirs, extract, annotate)?;
            pb.inc(1);
            Ok(stats)
        })
        .try_reduce(ProcessingStats::new, |a, b| Ok(a.merge(b)));

    match &stats {
        Ok(_) => pb.finish_with_message("Conversion complete"),
        Err(_) => pb.abandon_with_message("Conversion failed"),
    }
    stats
}

/// Main dataset processing pipeline: convert every record, then split once
pub fn run_pipeline<R: RecordReader + Sync + ?Sized>(
    reader: &R,
    args: &Args,
) -> Result<SplitReport> {
    // Reject bad ratios before touching any file
    let split_config = args.split_config()?;
    if args.class_names.is_empty() {
        return Err(Error::Config("at least one class name is required".to_string()));
    }
    if !args.split_only && args.input_dirs.is_empty() {
        return Err(Error::Config(
            "at least one --input_dir is required unless --split_only is set".to_string(),
        ));
    }

    let dirs = setup_output_directories(&args.output_dir, &args.split_dir)?;

    let converted = if args.split_only {
        info!("Skipping conversion, splitting existing records...");
        None
    } else {
        let sources = collect_source_files(&args.input_dirs)?;
        info!("Found {} source files.", sources.len());

        let stats = convert_records(
            reader,
            &sources,
            &dirs,
            &args.extract_options(),
            &args.annotate_options(),
        )?;
        stats.print_summary();
        Some(stats.images_written)
    };

    info!("Splitting dataset into train/val/test...");
    let report = split_dataset(&dirs, &split_config)?;

    if let Some(converted) = converted {
        if report.total_images() != converted {
            warn!(
                "Split population ({} images) differs from the {} records converted in this run; \
                 leftovers from an earlier run in {} change the split",
                report.total_images(),
                converted,
                dirs.images_dir.display()
            );
        }
    }

    info!("Creating dataset.yaml file...");
    create_dataset_yaml(&dirs.split_root, &args.class_names)?;
    report.print_summary();
    info!("Conversion process completed successfully.");

    Ok(report)
}

/// Run the pipeline over MATLAB v7.3 sources
pub fn process_dataset(args: &Args) -> Result<SplitReport> {
    run_pipeline(&MatFileReader::new(), args)
}
