use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use rusty_scan::scan::{read_scan, read_scan_info, rewrite_scan, write_scan};
use rusty_scan::{
    Measurements, Notice, OutputDims, PartialFilePolicy, ReadOptions, ScanData, ScanError,
    ScanHeader, WriteOptions,
};
use std::fs::{self, OpenOptions};
use std::io::Write;

fn sequential(shape: &[usize]) -> ArrayD<f64> {
    let n: usize = shape.iter().product();
    ArrayD::from_shape_vec(IxDyn(shape), (0..n).map(|v| v as f64).collect()).unwrap()
}

fn grid_scan() -> ScanData {
    ScanData::uniform(
        vec![vec![0.0, 1.0], vec![10.0, 20.0, 30.0]],
        vec![1.5e9, 2.5e9],
        sequential(&[2, 3, 2, 1]),
    )
    .with_header(ScanHeader::stamped("2x3 grid", "VNA").with_channel_names(["S21"]))
}

#[test]
fn test_write_and_read_with_default_extension() {
    let dir = tempfile::tempdir().unwrap();
    let scan = grid_scan();

    let report = write_scan(dir.path().join("grid"), &scan, &WriteOptions::default()).unwrap();
    assert_eq!(report.path, dir.path().join("grid.scan"));
    assert!(report.notices.is_empty());
    assert!(report.path.exists());

    let decoded = read_scan(dir.path().join("grid"), &ReadOptions::default()).unwrap();
    assert_eq!(decoded.scan, scan);
    assert!(decoded.notices.is_empty());
}

#[test]
fn test_existing_extension_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let report = write_scan(
        dir.path().join("grid.dat"),
        &grid_scan(),
        &WriteOptions::default(),
    )
    .unwrap();
    assert_eq!(report.path, dir.path().join("grid.dat"));
}

#[test]
fn test_read_info_only() {
    let dir = tempfile::tempdir().unwrap();
    let report = write_scan(dir.path().join("grid"), &grid_scan(), &WriteOptions::default())
        .unwrap();

    let info = read_scan_info(&report.path).unwrap();
    assert!(info.grid.is_uniform);
    assert_eq!(info.grid.dim_order, vec![0, 1]);
    assert_eq!(info.grid.dim_size, vec![2, 3]);
    assert_eq!(info.num_channels, 1);
    assert_eq!(info.num_freq, 2);
    assert!(!info.is_complex);
    assert_eq!(info.header.description, "2x3 grid");
    assert_eq!(info.header.channel_names, vec!["S21"]);
}

#[test]
fn test_truncated_file_is_zero_padded() {
    let dir = tempfile::tempdir().unwrap();
    let report = write_scan(dir.path().join("grid"), &grid_scan(), &WriteOptions::default())
        .unwrap();

    let bytes = fs::read(&report.path).unwrap();
    fs::write(&report.path, &bytes[..bytes.len() - 8]).unwrap();

    let decoded = read_scan(&report.path, &ReadOptions::default()).unwrap();
    assert_eq!(
        decoded.notices,
        vec![Notice::DataTruncated {
            expected: 12,
            actual: 11
        }]
    );

    // The last wire value is x = 1, y = 2, f = 1; y = 2 is swept forwards.
    let Measurements::Real(data) = &decoded.scan.data else {
        panic!("expected real data");
    };
    assert_eq!(data[IxDyn(&[1, 2, 1, 0])], 0.0);
    assert_eq!(data[IxDyn(&[0, 2, 1, 0])], 5.0);
    assert_eq!(data[IxDyn(&[1, 1, 1, 0])], 9.0);
}

#[test]
fn test_overlong_file_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let scan = grid_scan();
    let report = write_scan(dir.path().join("grid"), &scan, &WriteOptions::default()).unwrap();

    let mut file = OpenOptions::new().append(true).open(&report.path).unwrap();
    file.write_all(&[0u8; 16]).unwrap();
    drop(file);

    let decoded = read_scan(&report.path, &ReadOptions::default()).unwrap();
    assert_eq!(decoded.scan, scan);
    assert_eq!(decoded.notices, vec![Notice::TrailingData { extra_bytes: 16 }]);
}

#[test]
fn test_invalid_scan_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let scan = ScanData::uniform(
        vec![vec![0.0, 1.0, 2.0]],
        vec![1.0],
        sequential(&[2, 1]),
    );

    let result = write_scan(dir.path().join("bad"), &scan, &WriteOptions::default());
    assert!(matches!(result, Err(ScanError::ShapeMismatch(_))));
    assert!(!dir.path().join("bad.scan").exists());
}

#[test]
fn test_three_axis_complex_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let shape = [2, 3, 4, 2, 2];
    let n: usize = shape.iter().product();
    let samples: Vec<Complex64> = (0..n)
        .map(|i| Complex64::new(i as f64, 1.0 / (i as f64 + 1.0)))
        .collect();
    let scan = ScanData::uniform(
        vec![vec![0.0, 1.0], vec![0.0, 0.5, 1.0], vec![-1.0, 0.0, 1.0, 2.0]],
        vec![1.0e9, 2.0e9],
        ArrayD::from_shape_vec(IxDyn(&shape), samples).unwrap(),
    )
    .with_header(ScanHeader::new("volume", "VNA").with_channel_names(["S11", "S21"]));

    let report = write_scan(dir.path().join("volume"), &scan, &WriteOptions::default()).unwrap();
    let decoded = read_scan(&report.path, &ReadOptions::default()).unwrap();
    assert_eq!(decoded.scan, scan);
}

#[test]
fn test_output_dims_on_singleton_axis() {
    let dir = tempfile::tempdir().unwrap();
    let scan = ScanData::uniform(
        vec![vec![0.0, 1.0], vec![0.0, 1.0, 2.0], vec![7.0]],
        vec![1.0],
        sequential(&[2, 3, 1, 1]),
    );
    let report = write_scan(dir.path().join("flat"), &scan, &WriteOptions::default()).unwrap();

    let exact = ReadOptions {
        output_dims: OutputDims::Exact(2),
        ..Default::default()
    };
    let decoded = read_scan(&report.path, &exact).unwrap();
    assert_eq!(decoded.scan.axes.len(), 2);
    assert_eq!(decoded.scan.data.shape(), &[2, 3, 1, 1]);
    assert_eq!(
        decoded.notices,
        vec![Notice::DroppedSingletonAxes {
            stored: 3,
            requested: 2
        }]
    );

    let significant = ReadOptions {
        output_dims: OutputDims::Significant,
        ..Default::default()
    };
    let decoded = read_scan(&report.path, &significant).unwrap();
    assert_eq!(decoded.scan.axes.len(), 2);
    assert_eq!(
        decoded.notices,
        vec![Notice::InferredOutputAxes {
            stored: 3,
            inferred: 2
        }]
    );

    let too_few = ReadOptions {
        output_dims: OutputDims::Exact(1),
        ..Default::default()
    };
    assert!(matches!(
        read_scan(&report.path, &too_few),
        Err(ScanError::DimensionMismatch {
            requested: 1,
            significant: 2
        })
    ));
}

#[test]
fn test_not_a_scan_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.scan");
    fs::write(&path, 1234.0f64.to_le_bytes()).unwrap();

    let err = read_scan(&path, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, ScanError::UnrecognizedFormat { .. }));
    assert!(err.is_format_error());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_scan(dir.path().join("missing"), &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, ScanError::Io { .. }));
}

#[cfg(unix)]
#[test]
fn test_partial_file_policy_on_failed_write() {
    // Writes to /dev/full fail with "no space left on device".
    if !std::path::Path::new("/dev/full").exists() {
        return;
    }

    for (policy, kept) in [
        (PartialFilePolicy::Keep, true),
        (PartialFilePolicy::Remove, false),
    ] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.scan");
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        let options = WriteOptions {
            partial_file: policy,
            ..Default::default()
        };
        let err = write_scan(&path, &grid_scan(), &options).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }), "{policy:?}: {err}");
        assert_eq!(fs::symlink_metadata(&path).is_ok(), kept, "{policy:?}");
    }
}

#[test]
fn test_rewrite_restores_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let scan = ScanData::uniform(
        vec![vec![0.0, 1.0], vec![10.0, 20.0, 30.0]],
        vec![1.5e9, 2.5e9],
        sequential(&[2, 3, 2, 1]),
    )
    .with_header(ScanHeader::new("2x3 grid", "").with_channel_names(["S21"]));

    let source = write_scan(dir.path().join("source"), &scan, &WriteOptions::default())
        .unwrap()
        .path;
    let full_len = fs::metadata(&source).unwrap().len();
    let bytes = fs::read(&source).unwrap();
    fs::write(&source, &bytes[..bytes.len() - 8]).unwrap();

    let report = rewrite_scan(
        &source,
        dir.path().join("fixed"),
        &ReadOptions::default(),
        &WriteOptions::default(),
        Some("bench"),
    )
    .unwrap();
    assert_eq!(report.path, dir.path().join("fixed.scan"));
    assert_eq!(
        report.read_notices,
        vec![Notice::DataTruncated {
            expected: 12,
            actual: 11
        }]
    );
    assert!(report.write_notices.is_empty());
    // Same payload, device name now stored.
    assert_eq!(
        fs::metadata(&report.path).unwrap().len(),
        full_len + 8 * "bench".len() as u64
    );

    let fixed = read_scan(&report.path, &ReadOptions::default()).unwrap();
    assert!(fixed.notices.is_empty());
    assert_eq!(fixed.scan.header.device_name, "bench");
    assert_eq!(fixed.scan.axes, scan.axes);
    let Measurements::Real(data) = &fixed.scan.data else {
        panic!("expected real data");
    };
    assert_eq!(data.shape(), &[2, 3, 2, 1]);
    assert_eq!(data[IxDyn(&[1, 2, 1, 0])], 0.0);
    assert_eq!(data[IxDyn(&[1, 1, 1, 0])], 9.0);

    // A stored device name is left alone.
    let again = rewrite_scan(
        &report.path,
        dir.path().join("again"),
        &ReadOptions::default(),
        &WriteOptions::default(),
        Some("other"),
    )
    .unwrap();
    let again = read_scan(&again.path, &ReadOptions::default()).unwrap();
    assert_eq!(again.scan.header.device_name, "bench");
}
