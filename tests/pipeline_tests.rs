mod common;

use clap::Parser;
use std::fs;
use std::path::Path;

use common::{file_names, record, square_border, touch_sources, MemoryReader};
use mat2yolo::{run_pipeline, Args, Error, MatFileReader, RecordReader};

fn args(extra: &[&str]) -> Args {
    let mut argv = vec!["mat2yolo"];
    argv.extend_from_slice(extra);
    Args::try_parse_from(argv).unwrap()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Ten patients spread over two input directories, three records for patient p0
fn patient_dataset(root: &Path) -> MemoryReader {
    let mut reader = MemoryReader::default();
    let mut part1 = Vec::new();
    let mut part2 = Vec::new();
    for i in 0..12 {
        let patient = format!("p{}", i.min(9));
        let name = format!("{}", i + 1);
        reader.insert(record(&name, (i % 3 + 1) as f64, square_border(), Some(&patient)));
        if i < 6 {
            part1.push(name);
        } else {
            part2.push(name);
        }
    }
    let part1: Vec<&str> = part1.iter().map(String::as_str).collect();
    let part2: Vec<&str> = part2.iter().map(String::as_str).collect();
    touch_sources(&root.join("part1"), &part1);
    touch_sources(&root.join("part2"), &part2);
    reader
}

#[test]
fn test_pipeline_groups_by_patient() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let reader = patient_dataset(root);
    let out = root.join("output");
    let args = args(&[
        "-i",
        path_str(&root.join("part1")),
        path_str(&root.join("part2")),
        "-o",
        path_str(&out),
        "--group_by_patient",
        "--image_size",
        "32",
    ]);

    let report = run_pipeline(&reader, &args).unwrap();

    assert_eq!(report.total_units(), 10);
    assert_eq!(report.total_images(), 12);
    assert_eq!(
        (report.train.units, report.val.units, report.test.units),
        (7, 1, 2)
    );
    assert_eq!(file_names(&out.join("images")).len(), 10);
    assert_eq!(
        file_names(&out.join("images").join("p9")),
        vec!["10.jpg", "11.jpg", "12.jpg"]
    );
    let label = fs::read_to_string(out.join("labels").join("p1").join("2.txt")).unwrap();
    assert!(label.starts_with("1 "));
    assert_eq!(label.lines().count(), 1);
    let image = image::open(out.join("images").join("p1").join("2.jpg")).unwrap();
    assert_eq!((image.width(), image.height()), (32, 32));

    let yaml = fs::read_to_string(out.join("dataset").join("dataset.yaml")).unwrap();
    assert!(yaml.contains("path:"));
    assert!(yaml.contains("train: train/images"));
    assert!(yaml.contains("val: val/images"));
    assert!(yaml.contains("test: test/images"));
    assert!(yaml.contains("0: meningioma"));
    assert!(yaml.contains("2: pituitary"));
    assert!(out.join("dataset").join("split_manifest.json").is_file());
}

#[test]
fn test_pipeline_label_line_format() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let mut reader = MemoryReader::default();
    reader.insert(record("case", 2.0, square_border(), None));
    touch_sources(&root.join("in"), &["case"]);
    let out = root.join("out");

    run_pipeline(
        &reader,
        &args(&["-i", path_str(&root.join("in")), "-o", path_str(&out)]),
    )
    .unwrap();

    let line = fs::read_to_string(out.join("labels").join("case.txt")).unwrap();
    assert!(line.ends_with('\n'));
    let fields: Vec<&str> = line.split_whitespace().collect();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields[0], "1");
    for field in &fields[1..] {
        assert_eq!(field.split('.').nth(1).unwrap().len(), 6);
    }
    let values: Vec<f64> = fields[1..].iter().map(|f| f.parse().unwrap()).collect();
    for (value, expected) in values.iter().zip([0.2930, 0.1953, 0.1953, 0.1953]) {
        assert!((value - expected).abs() < 1e-4);
    }
}

#[test]
fn test_pipeline_is_reproducible() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let reader = patient_dataset(root);

    let mut manifests = Vec::new();
    for run in ["a", "b"] {
        let out = root.join(run);
        run_pipeline(
            &reader,
            &args(&[
                "-i",
                path_str(&root.join("part1")),
                path_str(&root.join("part2")),
                "-o",
                path_str(&out),
                "--group_by_patient",
            ]),
        )
        .unwrap();
        manifests.push(fs::read_to_string(out.join("dataset").join("split_manifest.json")).unwrap());
    }

    assert_eq!(manifests[0], manifests[1]);
}

#[test]
fn test_pipeline_rejects_bad_ratios_before_writing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let reader = patient_dataset(root);
    let out = root.join("out");

    let result = run_pipeline(
        &reader,
        &args(&[
            "-i",
            path_str(&root.join("part1")),
            "-o",
            path_str(&out),
            "--train_ratio",
            "0.9",
            "--val_ratio",
            "0.2",
        ]),
    );

    assert!(matches!(result, Err(Error::InvalidRatios(_))));
    assert!(!out.exists());
}

#[test]
fn test_pipeline_fails_fast_on_invalid_label() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let mut reader = MemoryReader::default();
    reader.insert(record("good", 1.0, square_border(), None));
    reader.insert(record("bad", 7.0, square_border(), None));
    touch_sources(&root.join("in"), &["good", "bad"]);
    let out = root.join("out");

    let result = run_pipeline(
        &reader,
        &args(&["-i", path_str(&root.join("in")), "-o", path_str(&out)]),
    );

    match result {
        Err(Error::LabelOutOfRange { path, label, max }) => {
            assert_eq!(path.file_stem().unwrap(), "bad");
            assert_eq!(label, 7.0);
            assert_eq!(max, 3);
        }
        other => panic!("expected LabelOutOfRange, got {other:?}"),
    }
    assert!(file_names(&out.join("dataset")).is_empty());
    assert!(!out.join("images").join("bad.jpg").exists());
    assert!(!out.join("labels").join("bad.txt").exists());
}

#[test]
fn test_pipeline_requires_patient_id_when_grouping() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let mut reader = MemoryReader::default();
    reader.insert(record("anon", 1.0, square_border(), None));
    touch_sources(&root.join("in"), &["anon"]);

    let result = run_pipeline(
        &reader,
        &args(&[
            "-i",
            path_str(&root.join("in")),
            "-o",
            path_str(&root.join("out")),
            "--group_by_patient",
        ]),
    );

    assert!(matches!(
        result,
        Err(Error::MissingField { field: "PID", .. })
    ));
}

#[test]
fn test_pipeline_rejects_duplicate_base_names() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let mut reader = MemoryReader::default();
    reader.insert(record("1", 1.0, square_border(), None));
    touch_sources(&root.join("a"), &["1"]);
    touch_sources(&root.join("b"), &["1"]);

    let result = run_pipeline(
        &reader,
        &args(&[
            "-i",
            path_str(&root.join("a")),
            path_str(&root.join("b")),
            "-o",
            path_str(&root.join("out")),
        ]),
    );

    assert!(matches!(result, Err(Error::DuplicateRecord { .. })));
}

#[test]
fn test_pipeline_rejects_names_colliding_after_sanitizing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let mut reader = MemoryReader::default();
    reader.insert(record("a:b", 1.0, square_border(), None));
    reader.insert(record("ab", 2.0, square_border(), None));
    touch_sources(&root.join("in"), &["a:b", "ab"]);
    let out = root.join("out");

    let result = run_pipeline(
        &reader,
        &args(&["-i", path_str(&root.join("in")), "-o", path_str(&out)]),
    );

    match result {
        Err(Error::DuplicateRecord { name, .. }) => assert_eq!(name, "ab"),
        other => panic!("expected DuplicateRecord, got {other:?}"),
    }
    assert!(file_names(&out.join("images")).is_empty());
}

#[test]
fn test_pipeline_rejects_split_dir_inside_corpus() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let reader = patient_dataset(root);

    for (run, split_dir) in ["images", "labels", "./labels/split"].iter().enumerate() {
        let out = root.join(format!("out{run}"));
        let result = run_pipeline(
            &reader,
            &args(&[
                "-i",
                path_str(&root.join("part1")),
                "-o",
                path_str(&out),
                "--split_dir",
                split_dir,
            ]),
        );

        assert!(matches!(result, Err(Error::Config(_))), "{split_dir}");
        assert!(!out.exists());
    }
}

#[test]
fn test_split_only_reuses_converted_records() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let reader = patient_dataset(root);
    let out = root.join("out");
    run_pipeline(
        &reader,
        &args(&[
            "-i",
            path_str(&root.join("part1")),
            path_str(&root.join("part2")),
            "-o",
            path_str(&out),
        ]),
    )
    .unwrap();

    let report = run_pipeline(
        &MemoryReader::default(),
        &args(&[
            "-o",
            path_str(&out),
            "--split_only",
            "--train_ratio",
            "0.5",
            "--val_ratio",
            "0.25",
        ]),
    )
    .unwrap();

    assert_eq!(report.total_images(), 12);
    assert_eq!(
        (report.train.units, report.val.units, report.test.units),
        (6, 3, 3)
    );
}

#[test]
fn test_pipeline_requires_input_dir_unless_split_only() {
    let temp_dir = tempfile::tempdir().unwrap();
    let result = run_pipeline(
        &MemoryReader::default(),
        &args(&["-o", path_str(&temp_dir.path().join("out"))]),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[cfg(not(feature = "hdf5"))]
#[test]
fn test_mat_reader_without_hdf5_support() {
    let result = MatFileReader::new().read(Path::new("case.mat"));
    assert!(matches!(result, Err(Error::Unsupported { .. })));
}

/// Write a MATLAB v7.3 style `cjdata` group holding a 2x3 image
#[cfg(feature = "hdf5")]
fn write_mat_record(path: &Path, with_border: bool) -> hdf5::Result<()> {
    let file = hdf5::File::create(path)?;
    let group = file.create_group("cjdata")?;
    group
        .new_dataset::<i16>()
        .shape((2, 3))
        .create("image")?
        .write_raw(&[0i16, 10, 20, 30, 40, 50][..])?;
    group
        .new_dataset::<f64>()
        .shape((1, 1))
        .create("label")?
        .write_raw(&[2.0f64][..])?;
    if with_border {
        group
            .new_dataset::<f64>()
            .shape(4)
            .create("tumorBorder")?
            .write_raw(&[100.0f64, 50.0, 200.0, 150.0][..])?;
    }
    let pid: Vec<u16> = "MRI-042".encode_utf16().collect();
    group
        .new_dataset::<u16>()
        .shape(pid.len())
        .create("PID")?
        .write_raw(&pid[..])?;
    Ok(())
}

#[cfg(feature = "hdf5")]
#[test]
fn test_mat_reader_reads_record() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("1.mat");
    write_mat_record(&path, true).unwrap();

    let record = MatFileReader::new().read(&path).unwrap();

    assert_eq!((record.image.height, record.image.width), (2, 3));
    assert_eq!(record.image.data, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
    assert_eq!(record.label, 2.0);
    assert_eq!(record.border, vec![100.0, 50.0, 200.0, 150.0]);
    let codes = record.entity_codes.as_deref().unwrap();
    assert_eq!(
        mat2yolo::extract::decode_entity_id(codes).as_deref(),
        Some("MRI-042")
    );
    assert_eq!(record.source, path);
}

#[cfg(feature = "hdf5")]
#[test]
fn test_mat_reader_requires_border() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("2.mat");
    write_mat_record(&path, false).unwrap();

    let result = MatFileReader::new().read(&path);
    assert!(matches!(
        result,
        Err(Error::MissingField {
            field: "tumorBorder",
            ..
        })
    ));
}

#[cfg(feature = "hdf5")]
#[test]
fn test_mat_reader_reports_unreadable_container() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.mat");
    fs::write(&path, b"not an hdf5 file").unwrap();

    let result = MatFileReader::new().read(&path);
    assert!(matches!(result, Err(Error::Container { .. })));
}
