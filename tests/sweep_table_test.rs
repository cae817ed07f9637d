//! Integration tests for sweep directories on disk.

use qlab::data::{OuterAxisOrder, SweepAxis, SweepMetadata, SweepTable, SweepWriter};
use qlab::error::LabError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const META_2D: &str = "#Inner\n3\n0\n2\nfrequency\n#Outer\n2\n1\n0\npower\n#Outmost\n1\n0\n1\nNothing\n#for each of the values\n2\nMeasurement\n";

fn sweep_dir(table: &str, meta: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("scan.dat"), table).unwrap();
    fs::write(dir.path().join("scan.meta.txt"), meta).unwrap();
    dir
}

fn table_text(rows: &[[f64; 4]]) -> String {
    rows.iter()
        .map(|r| format!("{}\t{}\t{}\t{}\n", r[0], r[1], r[2], r[3]))
        .collect()
}

#[test]
fn test_column_reshapes_inner_fastest() {
    // inner = frequency (3 points), outer = power (2 points)
    let rows = [
        [0.0, 0.0, 0.0, 10.0],
        [1.0, 0.0, 1.0, 11.0],
        [2.0, 0.0, 2.0, 12.0],
        [0.0, 1.0, 3.0, 13.0],
        [1.0, 1.0, 4.0, 14.0],
        [2.0, 1.0, 5.0, 15.0],
    ];
    let dir = sweep_dir(&table_text(&rows), META_2D);
    let table = SweepTable::open(dir.path()).unwrap();

    assert_eq!(table.metadata().dimensionality(), 2);
    assert_eq!(table.num_data_columns(), 2);

    let first = table.read_column(0).unwrap();
    assert_eq!(first.shape(), &[2, 3]);
    assert_eq!(first.row(0).to_vec(), vec![0.0, 1.0, 2.0]);
    assert_eq!(first.row(1).to_vec(), vec![3.0, 4.0, 5.0]);

    let second = table.read_column(1).unwrap();
    assert_eq!(second[[1, 2]], 15.0);

    assert_eq!(table.x_axis().to_vec(), vec![0.0, 1.0, 2.0]);
    assert_eq!(table.y_axis().to_vec(), vec![0.0, 1.0]);
}

#[test]
fn test_size_mismatch_reports_counts() {
    let rows = [
        [0.0, 0.0, 0.0, 0.0],
        [1.0, 0.0, 1.0, 0.0],
        [2.0, 0.0, 2.0, 0.0],
        [0.0, 1.0, 3.0, 0.0],
        [1.0, 1.0, 4.0, 0.0],
    ];
    let dir = sweep_dir(&table_text(&rows), META_2D);
    let table = SweepTable::open(dir.path()).unwrap();

    let err = table.read_column(0).unwrap_err();
    match err {
        LabError::SizeMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, 6);
            assert_eq!(found, 5);
        }
        other => panic!("expected SizeMismatch, got {other:?}"),
    }
}

#[test]
fn test_column_index_out_of_range() {
    let dir = sweep_dir("0 0 1\n1 0 2\n2 0 3\n", "3\n0\n2\nx\n");
    let table = SweepTable::open(dir.path()).unwrap();
    assert_eq!(table.num_data_columns(), 1);
    assert!(matches!(
        table.read_column(1),
        Err(LabError::ColumnIndex {
            index: 1,
            available: 1
        })
    ));
}

#[test]
fn test_two_tables_is_not_found() {
    let dir = sweep_dir("0 0 1\n", "1\n0\n0\nx\n");
    fs::write(dir.path().join("other.dat"), "0 0 1\n").unwrap();

    let err = SweepTable::open(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        LabError::NotFound {
            pattern: ".dat",
            found: 2,
            ..
        }
    ));
}

#[test]
fn test_missing_meta_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("scan.dat"), "0 0 1\n").unwrap();
    let err = SweepTable::open(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        LabError::NotFound {
            pattern: ".meta.txt",
            found: 0,
            ..
        }
    ));
}

#[test]
fn test_malformed_meta() {
    let dir = sweep_dir("0 0 1\n", "#Inner\n3\n0\n");
    assert!(matches!(
        SweepTable::open(dir.path()),
        Err(LabError::MalformedMetadata { .. })
    ));
}

#[test]
fn test_oversized_geometry_is_malformed() {
    let dir = sweep_dir(
        "0 0 1\n",
        "4294967296\n0\n1\nx\n4294967296\n1\n0\ny\n",
    );
    assert!(matches!(
        SweepTable::open(dir.path()),
        Err(LabError::MalformedMetadata { .. })
    ));
}

#[test]
fn test_first_last_outer_order() {
    let rows = [
        [0.0, 1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0, 0.0],
        [2.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [2.0, 0.0, 0.0, 0.0],
    ];
    let dir = sweep_dir(&table_text(&rows), META_2D);
    let table = SweepTable::open_with(dir.path(), OuterAxisOrder::FirstLast).unwrap();
    assert_eq!(table.y_axis().to_vec(), vec![1.0, 0.0]);
}

fn write_sweep(dir: &Path, metadata: SweepMetadata) {
    let inner = metadata.inner().values();
    let outer = match metadata.outer() {
        Some(axis) => axis.values().to_vec(),
        None => vec![0.0],
    };
    let mut writer = SweepWriter::create(dir, "resonator", metadata).unwrap();
    for (j, y) in outer.iter().enumerate() {
        for (i, x) in inner.iter().enumerate() {
            let signal = (j * 100 + i) as f64;
            writer.append_row(&[*x, *y, signal, -signal]).unwrap();
        }
    }
    writer.finish().unwrap();
}

#[test]
fn test_writer_output_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = SweepMetadata::two_dimensional(
        SweepAxis::new("frequency", 4.5e9, 5.5e9, 11).unwrap(),
        SweepAxis::new("power", -30.0, -10.0, 3).unwrap(),
    );
    write_sweep(dir.path(), metadata.clone());

    let table = SweepTable::open(dir.path()).unwrap();
    assert_eq!(table.metadata(), &metadata);
    assert_eq!(table.num_data_columns(), 2);

    let signal = table.read_column(0).unwrap();
    assert_eq!(signal.shape(), &[3, 11]);
    assert_eq!(signal[[2, 10]], 210.0);
    assert_eq!(table.read_column(1).unwrap()[[1, 0]], -100.0);
}

#[test]
fn test_one_dimensional_sweep_is_single_row() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = SweepMetadata::one_dimensional(
        SweepAxis::from_step("flux", 0.0, 1.0, 0.25).unwrap(),
    );
    write_sweep(dir.path(), metadata);

    let table = SweepTable::open(dir.path()).unwrap();
    assert_eq!(table.metadata().dimensionality(), 1);
    let column = table.read_column(0).unwrap();
    assert_eq!(column.shape(), &[1, 5]);
    assert_eq!(table.x_axis().to_vec(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    assert_eq!(table.y_axis().to_vec(), vec![0.0]);
}
