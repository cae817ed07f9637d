//! Refinement stage definitions.
//!
//! A stage says how wide the grid around the current center is and how many points it holds.
//! Stages are plain data: they are validated by the optimizer before any cost evaluation, so
//! a bad stage table never reaches the instruments.
//!
//! In TOML a stage is written as
//!
//! ```toml
//! { half_width = 25e-3, point_count = 10 }
//! { relative = 0.03, point_count = 21 }             # half-width = 3% of |center|
//! { half_width = 0.1, point_count = 20, min = 0.0, max = 0.9333 }
//! ```

use super::grid::{Bounds, OptimizationGrid};
use crate::error::{AppResult, LabError};
use serde::{Deserialize, Serialize};

/// Width of a stage grid around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Span {
    /// Fixed half-width.
    HalfWidth(f64),
    /// Half-width as a fraction of `|center|`.
    Relative(f64),
}

impl Span {
    fn half_width(self, center: f64) -> f64 {
        match self {
            Span::HalfWidth(half_width) => half_width,
            Span::Relative(fraction) => fraction * center.abs(),
        }
    }
}

/// One refinement stage along a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StageRepr", into = "StageRepr")]
pub struct Stage {
    span: Span,
    point_count: usize,
    bounds: Bounds,
}

impl Stage {
    /// Stage covering `[center - half_width, center + half_width]` with `point_count` samples.
    pub fn new(half_width: f64, point_count: usize) -> Self {
        Self {
            span: Span::HalfWidth(half_width),
            point_count,
            bounds: Bounds::UNBOUNDED,
        }
    }

    /// Stage whose half-width is `fraction * |center|`.
    pub fn relative(fraction: f64, point_count: usize) -> Self {
        Self {
            span: Span::Relative(fraction),
            point_count,
            bounds: Bounds::UNBOUNDED,
        }
    }

    /// Clamp every sample into `[min, max]`.
    pub fn clamped(mut self, min: f64, max: f64) -> Self {
        self.bounds = Bounds { min, max };
        self
    }

    /// Grid width rule.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Samples per stage.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Sample clamp range.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Check the stage is usable independent of its center.
    pub fn validate(&self) -> AppResult<()> {
        if self.point_count < 2 {
            return Err(LabError::InvalidConfiguration(format!(
                "stage needs at least 2 points, got {}",
                self.point_count
            )));
        }
        let width = match self.span {
            Span::HalfWidth(width) | Span::Relative(width) => width,
        };
        if !(width.is_finite() && width > 0.0) {
            return Err(LabError::InvalidConfiguration(format!(
                "stage span must be finite and positive, got {width}"
            )));
        }
        self.bounds.validate()
    }

    /// [`Self::validate`] plus a usable half-width at `center`.
    ///
    /// Only a relative span can degenerate here, when `center` is 0.
    pub fn validate_around(&self, center: f64) -> AppResult<()> {
        self.validate()?;
        let half_width = self.span.half_width(center);
        if half_width.is_finite() && half_width > 0.0 {
            Ok(())
        } else {
            Err(LabError::InvalidConfiguration(format!(
                "stage around {center} has degenerate half-width {half_width}"
            )))
        }
    }

    /// Build the grid for this stage around `center`.
    pub fn grid(&self, name: &str, center: f64) -> AppResult<OptimizationGrid> {
        self.validate()?;
        let half_width = self.span.half_width(center);
        let grid = OptimizationGrid::new(name, center, half_width, self.point_count)?;
        Ok(grid.with_bounds(self.bounds))
    }
}

/// Pair of stages for a 2D search, one per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Stage2dRepr", into = "Stage2dRepr")]
pub struct Stage2d {
    /// Axis A (outer loop).
    pub a: Stage,
    /// Axis B (inner loop).
    pub b: Stage,
}

impl Stage2d {
    /// Different stages per axis.
    pub fn new(a: Stage, b: Stage) -> Self {
        Self { a, b }
    }

    /// Same stage on both axes.
    pub fn square(stage: Stage) -> Self {
        Self { a: stage, b: stage }
    }

    /// Evaluations this stage costs.
    pub fn evaluations(&self) -> usize {
        self.a.point_count * self.b.point_count
    }

    /// Validate both axes.
    pub fn validate(&self) -> AppResult<()> {
        self.a.validate()?;
        self.b.validate()
    }

    /// Validate both axes around `(a, b)`.
    pub fn validate_around(&self, (a, b): (f64, f64)) -> AppResult<()> {
        self.a.validate_around(a)?;
        self.b.validate_around(b)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StageRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    half_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relative: Option<f64>,
    point_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
}

impl TryFrom<StageRepr> for Stage {
    type Error = String;

    fn try_from(repr: StageRepr) -> Result<Self, Self::Error> {
        let span = match (repr.half_width, repr.relative) {
            (Some(half_width), None) => Span::HalfWidth(half_width),
            (None, Some(fraction)) => Span::Relative(fraction),
            (Some(_), Some(_)) => {
                return Err("stage takes either `half_width` or `relative`, not both".into())
            }
            (None, None) => return Err("stage needs `half_width` or `relative`".into()),
        };
        Ok(Self {
            span,
            point_count: repr.point_count,
            bounds: Bounds {
                min: repr.min.unwrap_or(f64::NEG_INFINITY),
                max: repr.max.unwrap_or(f64::INFINITY),
            },
        })
    }
}

impl From<Stage> for StageRepr {
    fn from(stage: Stage) -> Self {
        let (half_width, relative) = match stage.span {
            Span::HalfWidth(half_width) => (Some(half_width), None),
            Span::Relative(fraction) => (None, Some(fraction)),
        };
        Self {
            half_width,
            relative,
            point_count: stage.point_count,
            min: Some(stage.bounds.min).filter(|v| v.is_finite()),
            max: Some(stage.bounds.max).filter(|v| v.is_finite()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Stage2dRepr {
    Split { a: Stage, b: Stage },
    Square(Stage),
}

impl From<Stage2dRepr> for Stage2d {
    fn from(repr: Stage2dRepr) -> Self {
        match repr {
            Stage2dRepr::Split { a, b } => Stage2d::new(a, b),
            Stage2dRepr::Square(stage) => Stage2d::square(stage),
        }
    }
}

impl From<Stage2d> for Stage2dRepr {
    fn from(stage: Stage2d) -> Self {
        Stage2dRepr::Split {
            a: stage.a,
            b: stage.b,
        }
    }
}
