//! Sweep directory writer.
//!
//! Mirrors what the acquisition loops do: rows are appended tab-separated to `<stem>.dat` as
//! they are measured, and `<stem>.meta.txt` is written once the sweep is finished.

use super::sweep_meta::SweepMetadata;
use super::sweep_table::{META_SUFFIX, TABLE_SUFFIX};
use crate::error::{AppResult, LabError};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends sweep rows and writes the matching metadata file.
pub struct SweepWriter {
    table_path: PathBuf,
    meta_path: PathBuf,
    metadata: SweepMetadata,
    file: BufWriter<File>,
    columns: Option<usize>,
    rows_written: usize,
}

impl SweepWriter {
    /// Create (or append to) `<directory>/<stem>.dat`, creating the directory if needed.
    pub fn create(
        directory: impl AsRef<Path>,
        stem: &str,
        metadata: SweepMetadata,
    ) -> AppResult<Self> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;
        let table_path = directory.join(format!("{stem}{TABLE_SUFFIX}"));
        let meta_path = directory.join(format!("{stem}{META_SUFFIX}"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&table_path)?;

        tracing::debug!(table = %table_path.display(), "Sweep writer ready");

        Ok(Self {
            table_path,
            meta_path,
            metadata,
            file: BufWriter::new(file),
            columns: None,
            rows_written: 0,
        })
    }

    /// Append one row. Every row must have the same number of columns.
    pub fn append_row(&mut self, row: &[f64]) -> AppResult<()> {
        if row.is_empty() {
            return Err(LabError::Configuration("cannot write an empty sweep row".into()));
        }
        match self.columns {
            Some(columns) if columns != row.len() => {
                return Err(LabError::Configuration(format!(
                    "row {} has {} columns, previous rows had {columns}",
                    self.rows_written,
                    row.len()
                )));
            }
            Some(_) => {}
            None => self.columns = Some(row.len()),
        }

        let line = row
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(self.file, "{line}")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Rows appended so far.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush the table and write the metadata file. Returns the table path.
    pub fn finish(mut self) -> AppResult<PathBuf> {
        self.file.flush()?;

        let expected = self.metadata.total_points();
        if self.rows_written != expected {
            tracing::warn!(
                rows = self.rows_written,
                expected,
                "Sweep finished with a partial table"
            );
        }

        let columns = self.columns.unwrap_or_default();
        std::fs::write(&self.meta_path, self.metadata.render(columns))?;
        tracing::info!(
            table = %self.table_path.display(),
            rows = self.rows_written,
            "Sweep saved"
        );
        Ok(self.table_path)
    }
}
