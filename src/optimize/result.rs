//! Optimizer output.

use crate::error::{AppResult, LabError};
use std::fmt::Debug;
use std::io::Write;
use std::path::Path;

/// Coordinates the optimizer can search over.
pub trait GridPoint: Copy + Debug {
    /// Number of coordinates.
    const DIMENSIONS: usize;

    /// Coordinates in axis order.
    fn coordinates(&self) -> Vec<f64>;
}

impl GridPoint for f64 {
    const DIMENSIONS: usize = 1;

    fn coordinates(&self) -> Vec<f64> {
        vec![*self]
    }
}

impl GridPoint for (f64, f64) {
    const DIMENSIONS: usize = 2;

    fn coordinates(&self) -> Vec<f64> {
        vec![self.0, self.1]
    }
}

/// One cost evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<P> {
    /// Where the cost was measured.
    pub point: P,
    /// Measured cost.
    pub cost: f64,
}

/// Winning coordinates plus the final stage's samples.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult<P> {
    coordinates: P,
    best_cost: f64,
    history: Vec<Sample<P>>,
    evaluations: usize,
}

impl<P: GridPoint> OptimizationResult<P> {
    pub(crate) fn new(best: Sample<P>, history: Vec<Sample<P>>, evaluations: usize) -> Self {
        Self {
            coordinates: best.point,
            best_cost: best.cost,
            history,
            evaluations,
        }
    }

    /// Extremal coordinates of the last stage.
    pub fn coordinates(&self) -> P {
        self.coordinates
    }

    /// Cost measured at [`Self::coordinates`].
    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    /// Final-stage samples in evaluation order.
    pub fn history(&self) -> &[Sample<P>] {
        &self.history
    }

    /// Cost evaluations across all stages.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Write the final-stage history as CSV: one column per axis, then `cost`.
    pub fn write_history_csv<W: Write>(&self, writer: W, axis_names: &[&str]) -> AppResult<()> {
        if axis_names.len() != P::DIMENSIONS {
            return Err(LabError::Configuration(format!(
                "history has {} axes, {} names given",
                P::DIMENSIONS,
                axis_names.len()
            )));
        }
        let mut csv = csv::Writer::from_writer(writer);
        let mut header: Vec<&str> = axis_names.to_vec();
        header.push("cost");
        csv.write_record(&header)?;
        for sample in &self.history {
            let mut record: Vec<String> = sample
                .point
                .coordinates()
                .iter()
                .map(f64::to_string)
                .collect();
            record.push(sample.cost.to_string());
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// [`Self::write_history_csv`] into a new file.
    pub fn save_history_csv(&self, path: &Path, axis_names: &[&str]) -> AppResult<()> {
        let file = std::fs::File::create(path)?;
        self.write_history_csv(file, axis_names)
    }
}
