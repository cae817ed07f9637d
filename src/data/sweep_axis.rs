//! Swept-variable description.
//!
//! A `SweepAxis` is one 4-line block of a `.meta.txt` file: point count, first value, last
//! value, and the variable name. The sample positions are never stored in the metadata; they
//! are regenerated with `linspace` semantics whenever an axis is requested.

use crate::error::{AppResult, LabError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Name the acquisition scripts write for an unused loop level.
pub const PLACEHOLDER_AXIS_NAME: &str = "Nothing";

/// Tolerance used when deriving a point count from a step increment.
const STEP_TOLERANCE: f64 = 1e-12;

/// Largest point count accepted for one axis.
pub const MAX_AXIS_POINTS: usize = 1 << 24;

/// One swept variable of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis {
    point_count: usize,
    first_value: f64,
    last_value: f64,
    name: String,
}

impl SweepAxis {
    /// Create an axis of `point_count` evenly spaced values from `first_value` to `last_value`.
    pub fn new(
        name: impl Into<String>,
        first_value: f64,
        last_value: f64,
        point_count: usize,
    ) -> AppResult<Self> {
        let name = name.into();
        if point_count == 0 {
            return Err(LabError::Configuration(format!(
                "sweep axis '{name}' needs at least one point"
            )));
        }
        if point_count > MAX_AXIS_POINTS {
            return Err(LabError::Configuration(format!(
                "sweep axis '{name}' has {point_count} points, limit is {MAX_AXIS_POINTS}"
            )));
        }
        if !first_value.is_finite() || !last_value.is_finite() {
            return Err(LabError::Configuration(format!(
                "sweep axis '{name}' has non-finite bounds ({first_value}, {last_value})"
            )));
        }
        Ok(Self {
            point_count,
            first_value,
            last_value,
            name,
        })
    }

    /// Create an axis from a step increment, including `last_value` when the step lands on it.
    ///
    /// The sign of `step` is taken from the direction `first_value -> last_value`, so
    /// `from_step("v", 1.0, 0.0, 0.25)` walks downwards.
    pub fn from_step(
        name: impl Into<String>,
        first_value: f64,
        last_value: f64,
        step: f64,
    ) -> AppResult<Self> {
        let name = name.into();
        if step == 0.0 || !step.is_finite() {
            return Err(LabError::Configuration(format!(
                "sweep axis '{name}' needs a finite, non-zero step"
            )));
        }
        let span = (last_value - first_value).abs();
        let intervals = (span / step.abs() + STEP_TOLERANCE).floor();
        if intervals >= MAX_AXIS_POINTS as f64 {
            return Err(LabError::Configuration(format!(
                "sweep axis '{name}' with step {step} exceeds {MAX_AXIS_POINTS} points"
            )));
        }
        let point_count = intervals as usize + 1;
        let direction = if last_value >= first_value { 1.0 } else { -1.0 };
        let last_reached = first_value + direction * step.abs() * intervals;
        Self::new(name, first_value, last_reached, point_count)
    }

    /// Number of samples along this axis.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// First value written by the sweep.
    pub fn first_value(&self) -> f64 {
        self.first_value
    }

    /// Last value written by the sweep.
    pub fn last_value(&self) -> f64 {
        self.last_value
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the `1, 0, 1, Nothing` block written for unused loop levels.
    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_AXIS_NAME
    }

    /// Evenly spaced sample positions, `linspace(first, last, point_count)`.
    pub fn values(&self) -> Array1<f64> {
        Array1::linspace(self.first_value, self.last_value, self.point_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn values_span_first_to_last() {
        let axis = SweepAxis::new("flux", -0.5, 0.5, 11).unwrap();
        let values = axis.values();
        assert_eq!(values.len(), 11);
        assert_relative_eq!(values[0], -0.5);
        assert_relative_eq!(values[10], 0.5, epsilon = 1e-12);
        assert!(values.windows(2).into_iter().all(|w| w[1] > w[0]));
    }

    #[test]
    fn descending_axis_is_monotonic_decreasing() {
        let axis = SweepAxis::new("power", 10.0, -20.0, 7).unwrap();
        let values = axis.values();
        assert_relative_eq!(values[0], 10.0);
        assert_relative_eq!(values[6], -20.0, epsilon = 1e-12);
        assert!(values.windows(2).into_iter().all(|w| w[1] < w[0]));
    }

    #[test]
    fn single_point_axis_yields_first_value() {
        let axis = SweepAxis::new("Nothing", 0.0, 1.0, 1).unwrap();
        assert_eq!(axis.values().to_vec(), vec![0.0]);
        assert!(axis.is_placeholder());
    }

    #[test]
    fn zero_points_rejected() {
        assert!(SweepAxis::new("freq", 0.0, 1.0, 0).is_err());
    }

    #[test]
    fn oversized_axis_rejected() {
        assert!(SweepAxis::new("freq", 0.0, 1.0, MAX_AXIS_POINTS).is_ok());
        assert!(SweepAxis::new("freq", 0.0, 1.0, MAX_AXIS_POINTS + 1).is_err());
        assert!(SweepAxis::from_step("freq", 0.0, 1.0, 1e-12).is_err());
    }

    #[test]
    fn from_step_includes_endpoint() {
        let axis = SweepAxis::from_step("current", 0.0, 100.0, 5.0).unwrap();
        assert_eq!(axis.point_count(), 21);
        assert_relative_eq!(axis.last_value(), 100.0);
    }

    #[test]
    fn from_step_stops_before_overshoot() {
        let axis = SweepAxis::from_step("v", 1.0, 0.0, 0.3).unwrap();
        assert_eq!(axis.point_count(), 4);
        assert_relative_eq!(axis.last_value(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn from_step_rejects_zero_step() {
        assert!(SweepAxis::from_step("v", 0.0, 1.0, 0.0).is_err());
    }
}
