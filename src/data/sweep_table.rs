//! Sweep directory reader.
//!
//! A sweep directory holds exactly one `<stem>.dat` table and one `<stem>.meta.txt` metadata
//! file. Table rows are written inner-loop fastest, so a data column reshapes row-major into
//! `(outer.point_count, inner.point_count)`.
//!
//! Columns are parsed from disk on every request; nothing is cached.

use super::sweep_meta::{OuterAxisOrder, SweepMetadata};
use crate::error::{AppResult, LabError};
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Suffix of the columnar data file.
pub const TABLE_SUFFIX: &str = ".dat";

/// Suffix of the metadata file.
pub const META_SUFFIX: &str = ".meta.txt";

/// Leading table columns holding the swept variables themselves.
pub const RESERVED_COLUMNS: usize = 2;

/// A loaded sweep: geometry plus lazily read data columns.
#[derive(Debug, Clone)]
pub struct SweepTable {
    table_path: PathBuf,
    meta_path: PathBuf,
    metadata: SweepMetadata,
    num_data_columns: usize,
}

impl SweepTable {
    /// Open the single sweep stored in `directory` using the canonical outer-axis order.
    pub fn open(directory: impl AsRef<Path>) -> AppResult<Self> {
        Self::open_with(directory, OuterAxisOrder::default())
    }

    /// Open a sweep, reading the outer-axis block in the given field order.
    pub fn open_with(directory: impl AsRef<Path>, order: OuterAxisOrder) -> AppResult<Self> {
        let directory = directory.as_ref();
        let table_path = find_single(directory, TABLE_SUFFIX)?;
        let meta_path = find_single(directory, META_SUFFIX)?;

        let metadata = SweepMetadata::from_file(&meta_path, order)?;
        let total_columns = count_columns(&table_path)?;
        let num_data_columns = total_columns.saturating_sub(RESERVED_COLUMNS);

        tracing::debug!(
            table = %table_path.display(),
            dimensionality = metadata.dimensionality(),
            inner_points = metadata.inner().point_count(),
            outer_points = metadata.outer_point_count(),
            num_data_columns,
            "Opened sweep table"
        );

        Ok(Self {
            table_path,
            meta_path,
            metadata,
            num_data_columns,
        })
    }

    /// Sweep geometry.
    pub fn metadata(&self) -> &SweepMetadata {
        &self.metadata
    }

    /// Path of the `.dat` file.
    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    /// Path of the `.meta.txt` file.
    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    /// Number of dependent data columns (total columns minus the two swept variables).
    pub fn num_data_columns(&self) -> usize {
        self.num_data_columns
    }

    /// Read data column `index` and reshape it to `(outer, inner)`.
    ///
    /// Data column `index` is table column `index + 2`. The column must hold exactly
    /// `inner.point_count * outer.point_count` samples.
    ///
    /// Older analysis scripts indexed raw file columns, counting the two swept variables, so
    /// their column `n` is `read_column(n - 2)` here.
    pub fn read_column(&self, index: usize) -> AppResult<Array2<f64>> {
        if index >= self.num_data_columns {
            return Err(LabError::ColumnIndex {
                index,
                available: self.num_data_columns,
            });
        }

        let values = read_table_column(&self.table_path, index + RESERVED_COLUMNS)?;

        let inner = self.metadata.inner().point_count();
        let outer = self.metadata.outer_point_count();
        let expected = self.metadata.total_points();
        if values.len() != expected {
            return Err(LabError::SizeMismatch {
                column: index,
                expected,
                found: values.len(),
                inner,
                outer,
            });
        }

        Array2::from_shape_vec((outer, inner), values).map_err(|e| LabError::MalformedTable {
            path: self.table_path.clone(),
            line: 0,
            reason: e.to_string(),
        })
    }

    /// Inner-axis sample positions.
    pub fn x_axis(&self) -> Array1<f64> {
        self.metadata.inner().values()
    }

    /// Outer-axis sample positions. A 1D sweep has a single row, reported at `0.0`.
    pub fn y_axis(&self) -> Array1<f64> {
        self.metadata
            .outer()
            .map_or_else(|| Array1::zeros(1), |axis| axis.values())
    }
}

fn find_single(directory: &Path, suffix: &'static str) -> AppResult<PathBuf> {
    let not_found = |found| LabError::NotFound {
        directory: directory.to_path_buf(),
        pattern: suffix,
        found,
    };
    if !directory.is_dir() {
        return Err(not_found(0));
    }

    let mut matches = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            matches.push(entry.path());
        }
    }

    match matches.len() {
        1 => Ok(matches.remove(0)),
        found => Err(not_found(found)),
    }
}

/// Strip `#` comments and surrounding whitespace; `None` for lines without data.
fn data_part(line: &str) -> Option<&str> {
    let data = line.split('#').next().unwrap_or_default().trim();
    (!data.is_empty()).then_some(data)
}

fn count_columns(path: &Path) -> AppResult<usize> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if let Some(data) = data_part(&line) {
            return Ok(data.split_whitespace().count());
        }
    }
    Err(LabError::MalformedTable {
        path: path.to_path_buf(),
        line: 0,
        reason: "no numeric data found".to_string(),
    })
}

fn read_table_column(path: &Path, column: usize) -> AppResult<Vec<f64>> {
    let reader = BufReader::new(File::open(path)?);
    let mut values = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let Some(data) = data_part(&line) else {
            continue;
        };
        let malformed = |reason: String| LabError::MalformedTable {
            path: path.to_path_buf(),
            line: number + 1,
            reason,
        };
        let token = data.split_whitespace().nth(column).ok_or_else(|| {
            malformed(format!(
                "row has {} columns, column {column} requested",
                data.split_whitespace().count()
            ))
        })?;
        let value = token
            .parse::<f64>()
            .map_err(|_| malformed(format!("'{token}' is not a number")))?;
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn data_part_strips_comments() {
        assert_eq!(data_part("  1 2 3 # note"), Some("1 2 3"));
        assert_eq!(data_part("# header"), None);
        assert_eq!(data_part("   "), None);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let err = SweepTable::open("/definitely/not/here").unwrap_err();
        assert!(matches!(err, LabError::NotFound { found: 0, .. }));
    }

    #[test]
    fn table_without_rows_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.dat"), "# only a header\n").unwrap();
        fs::write(dir.path().join("run.meta.txt"), "3\n0\n1\nx\n").unwrap();
        let err = SweepTable::open(dir.path()).unwrap_err();
        assert!(matches!(err, LabError::MalformedTable { .. }));
    }

    #[test]
    fn short_row_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.dat"), "0 0 1 2\n1 0 3\n").unwrap();
        fs::write(dir.path().join("run.meta.txt"), "2\n0\n1\nx\n").unwrap();
        let table = SweepTable::open(dir.path()).unwrap();
        let err = table.read_column(1).unwrap_err();
        assert!(matches!(err, LabError::MalformedTable { line: 2, .. }));
    }
}
