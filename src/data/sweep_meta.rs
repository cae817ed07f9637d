//! `.meta.txt` parsing and rendering.
//!
//! The metadata file is line oriented. Lines starting with `#` and blank lines are ignored;
//! the remaining lines are consumed positionally:
//!
//! ```text
//! #Inner
//! 201          <- point count
//! 4.5e9        <- first value
//! 5.5e9        <- last value
//! frequency    <- name
//! #Outer
//! 11           <- point count
//! -10          <- last value   (see OuterAxisOrder)
//! -30          <- first value
//! power
//! #Outmost
//! 1
//! 0
//! 1
//! Nothing
//! #for each of the values
//! 3
//! Measurement
//! ```
//!
//! Only the inner and outer blocks are interpreted. Anything after them is ignored.

use super::sweep_axis::{SweepAxis, PLACEHOLDER_AXIS_NAME};
use crate::error::{AppResult, LabError};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Field order of the outer-axis block.
///
/// Both acquisition writers store the outer axis as `count, last, first, name`, which is the
/// canonical layout here. Files from the analysis path that wrote `count, first, last, name`
/// can be read with [`OuterAxisOrder::FirstLast`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OuterAxisOrder {
    /// `count, last, first, name` (canonical).
    #[default]
    LastFirst,
    /// `count, first, last, name`.
    FirstLast,
}

/// Geometry of a 1D or 2D sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepMetadata {
    inner: SweepAxis,
    outer: Option<SweepAxis>,
}

impl SweepMetadata {
    /// 1D sweep over `inner`.
    pub fn one_dimensional(inner: SweepAxis) -> Self {
        Self { inner, outer: None }
    }

    /// 2D sweep, `inner` varying fastest.
    pub fn two_dimensional(inner: SweepAxis, outer: SweepAxis) -> Self {
        Self {
            inner,
            outer: Some(outer),
        }
    }

    /// Inner (fast) axis.
    pub fn inner(&self) -> &SweepAxis {
        &self.inner
    }

    /// Outer (slow) axis, absent for 1D sweeps.
    pub fn outer(&self) -> Option<&SweepAxis> {
        self.outer.as_ref()
    }

    /// 1 or 2.
    pub fn dimensionality(&self) -> usize {
        if self.outer.is_some() {
            2
        } else {
            1
        }
    }

    /// Outer point count, 1 for 1D sweeps.
    pub fn outer_point_count(&self) -> usize {
        self.outer.as_ref().map_or(1, SweepAxis::point_count)
    }

    /// Samples per data column. Saturates instead of wrapping.
    pub fn total_points(&self) -> usize {
        self.inner
            .point_count()
            .saturating_mul(self.outer_point_count())
    }

    /// Read and parse a metadata file.
    pub fn from_file(path: &Path, order: OuterAxisOrder) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, order).map_err(|reason| LabError::MalformedMetadata {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse metadata text. Errors are returned as a reason string so the caller can attach
    /// the file path.
    pub fn parse(text: &str, order: OuterAxisOrder) -> Result<Self, String> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();

        if lines.len() < 4 {
            return Err(format!(
                "expected at least 4 data lines for the inner axis, found {}",
                lines.len()
            ));
        }
        let inner = parse_axis("inner", &lines[0..4], OuterAxisOrder::FirstLast)?;

        let outer = match lines.len() {
            4 => None,
            5..=7 => {
                return Err(format!(
                    "incomplete outer axis block: {} of 4 lines present",
                    lines.len() - 4
                ))
            }
            _ => Some(parse_axis("outer", &lines[4..8], order)?)
                .filter(|axis| !axis.is_placeholder()),
        };

        let outer_points = outer.as_ref().map_or(1, SweepAxis::point_count);
        if inner.point_count().checked_mul(outer_points).is_none() {
            return Err(format!(
                "sweep geometry {} x {outer_points} overflows",
                inner.point_count()
            ));
        }

        Ok(Self { inner, outer })
    }

    /// Render in the canonical layout written by the acquisition scripts.
    ///
    /// `value_columns` is recorded in the trailing `#for each of the values` block.
    pub fn render(&self, value_columns: usize) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "#Inner\n{}\n{}\n{}\n{}\n",
            self.inner.point_count(),
            self.inner.first_value(),
            self.inner.last_value(),
            self.inner.name()
        );
        match &self.outer {
            Some(outer) => {
                let _ = write!(
                    out,
                    "#Outer\n{}\n{}\n{}\n{}\n",
                    outer.point_count(),
                    outer.last_value(),
                    outer.first_value(),
                    outer.name()
                );
            }
            None => {
                let _ = write!(out, "#Outer\n1\n0\n1\n{PLACEHOLDER_AXIS_NAME}\n");
            }
        }
        let _ = write!(out, "#Outmost\n1\n0\n1\n{PLACEHOLDER_AXIS_NAME}\n");
        let _ = write!(out, "#for each of the values\n{value_columns}\nMeasurement\n");
        out
    }
}

fn parse_axis(role: &str, block: &[&str], order: OuterAxisOrder) -> Result<SweepAxis, String> {
    let point_count: usize = block[0]
        .parse()
        .map_err(|_| format!("{role} point count '{}' is not an integer", block[0]))?;
    let a = parse_value(role, block[1])?;
    let b = parse_value(role, block[2])?;
    let (first, last) = match order {
        OuterAxisOrder::FirstLast => (a, b),
        OuterAxisOrder::LastFirst => (b, a),
    };
    SweepAxis::new(block[3], first, last, point_count).map_err(|e| e.to_string())
}

fn parse_value(role: &str, raw: &str) -> Result<f64, String> {
    raw.parse()
        .map_err(|_| format!("{role} axis value '{raw}' is not a number"))
}
