//! Custom error types for the toolkit.
//!
//! This module defines the primary error type, `LabError`, shared by the sweep-file reader,
//! the grid optimizer, and the calibration procedures. Using the `thiserror` crate, it gives
//! every failure a descriptive message and lets callers propagate with `?`.
//!
//! ## Error Hierarchy
//!
//! - **`NotFound`**: the sweep directory has zero or several candidate data/metadata files.
//! - **`MalformedMetadata`**: the `.meta.txt` file does not follow the fixed line grammar.
//! - **`MalformedTable`**: a `.dat` row could not be parsed.
//! - **`ColumnIndex`**: a data column outside `0..num_data_columns` was requested.
//! - **`SizeMismatch`**: a column does not hold `inner x outer` samples.
//! - **`InvalidConfiguration`**: degenerate optimizer stages (too few points, empty span, ...).
//! - **`NonFiniteCost`**: a cost function returned NaN.
//! - **`Instrument`**: any error raised inside a cost closure or an instrument driver. These
//!   are never retried here; retry policy belongs to the driver layer.
//! - **`Config`** / **`Configuration`**: figment extraction failures and semantic validation.
//! - **`Io`** / **`Csv`**: file system and CSV export failures.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the toolkit error type.
pub type AppResult<T> = std::result::Result<T, LabError>;

/// Errors produced by the toolkit.
#[derive(Error, Debug)]
pub enum LabError {
    /// Missing or ambiguous sweep files in a directory.
    #[error("Expected exactly one '*{pattern}' file in {}, found {found}", directory.display())]
    NotFound {
        /// Directory that was searched.
        directory: PathBuf,
        /// File suffix that was looked for.
        pattern: &'static str,
        /// Number of matching files.
        found: usize,
    },

    /// Metadata file does not match the fixed positional grammar.
    #[error("Malformed metadata file {}: {reason}", path.display())]
    MalformedMetadata {
        /// Offending file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// A row of the table file could not be parsed.
    #[error("Malformed table file {} at line {line}: {reason}", path.display())]
    MalformedTable {
        /// Offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// Requested data column does not exist.
    #[error("Invalid column index {index}: table has {available} data columns")]
    ColumnIndex {
        /// Requested index.
        index: usize,
        /// Number of data columns in the table.
        available: usize,
    },

    /// Column length disagrees with the sweep geometry.
    #[error("Column {column} has {found} samples, expected {expected} ({inner} inner x {outer} outer)")]
    SizeMismatch {
        /// Data column index.
        column: usize,
        /// Samples the geometry requires.
        expected: usize,
        /// Samples actually read.
        found: usize,
        /// Inner-axis point count.
        inner: usize,
        /// Outer-axis point count.
        outer: usize,
    },

    /// Optimizer was given degenerate grid parameters.
    #[error("Invalid optimizer configuration: {0}")]
    InvalidConfiguration(String),

    /// Cost function produced NaN.
    #[error("Cost function returned NaN at {point}")]
    NonFiniteCost {
        /// Formatted coordinates of the evaluation.
        point: String,
    },

    /// Error raised by an instrument driver or cost closure.
    #[error("Instrument error: {0:#}")]
    Instrument(anyhow::Error),

    /// Configuration could not be extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but is semantically invalid.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<anyhow::Error> for LabError {
    fn from(value: anyhow::Error) -> Self {
        LabError::Instrument(value)
    }
}

impl From<figment::Error> for LabError {
    fn from(value: figment::Error) -> Self {
        LabError::Config(Box::new(value))
    }
}
