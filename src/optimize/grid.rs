//! Evenly spaced sample grid around a center value.

use crate::error::{AppResult, LabError};
use ndarray::Array1;

/// Closed clamp range for grid samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Lower limit.
    pub min: f64,
    /// Upper limit.
    pub max: f64,
}

impl Bounds {
    /// No clamping.
    pub const UNBOUNDED: Bounds = Bounds {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    /// `min < max`, neither NaN.
    pub fn validate(&self) -> AppResult<()> {
        if self.min < self.max {
            Ok(())
        } else {
            Err(LabError::InvalidConfiguration(format!(
                "clamp range [{}, {}] is empty",
                self.min, self.max
            )))
        }
    }

    /// Clamp without panicking on inverted limits.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// `point_count` samples spread evenly over `[center - half_width, center + half_width]`.
///
/// Built fresh for every refinement stage and dropped afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationGrid {
    name: String,
    center: f64,
    half_width: f64,
    point_count: usize,
    bounds: Bounds,
}

impl OptimizationGrid {
    /// Create a grid. Requires at least two points and a finite, positive half-width.
    pub fn new(
        name: impl Into<String>,
        center: f64,
        half_width: f64,
        point_count: usize,
    ) -> AppResult<Self> {
        let name = name.into();
        if point_count < 2 {
            return Err(LabError::InvalidConfiguration(format!(
                "grid '{name}' needs at least 2 points, got {point_count}"
            )));
        }
        if !center.is_finite() {
            return Err(LabError::InvalidConfiguration(format!(
                "grid '{name}' has non-finite center {center}"
            )));
        }
        if !(half_width.is_finite() && half_width > 0.0) {
            return Err(LabError::InvalidConfiguration(format!(
                "grid '{name}' around {center} has degenerate half-width {half_width}"
            )));
        }
        Ok(Self {
            name,
            center,
            half_width,
            point_count,
            bounds: Bounds::UNBOUNDED,
        })
    }

    /// Clamp samples into `bounds`.
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Axis name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grid center.
    pub fn center(&self) -> f64 {
        self.center
    }

    /// Half of the covered interval.
    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Number of samples.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Samples in ascending order, clamped. Clamping can repeat values at the limits.
    pub fn samples(&self) -> Array1<f64> {
        Array1::linspace(
            self.center - self.half_width,
            self.center + self.half_width,
            self.point_count,
        )
        .mapv(|value| self.bounds.clamp(value))
    }
}
