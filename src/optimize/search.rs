//! Staged grid refinement.
//!
//! Each stage evaluates the cost on a grid around the current center and moves the center to
//! the best sample. Evaluations are strictly sequential: a cost call usually drives an
//! instrument and must finish before the next one starts. An error from the cost function
//! stops the search immediately and is returned unchanged in [`LabError::Instrument`].

use super::result::{GridPoint, OptimizationResult, Sample};
use super::stage::{Stage, Stage2d};
use crate::error::{AppResult, LabError};
use serde::{Deserialize, Serialize};

/// Which extremum to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extremum {
    /// Smallest cost wins.
    Min,
    /// Largest cost wins.
    Max,
}

impl Extremum {
    /// Strict comparison, so ties keep the earlier sample.
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Extremum::Min => candidate < incumbent,
            Extremum::Max => candidate > incumbent,
        }
    }
}

/// Find an extremum of a one-argument cost by grid refinement.
///
/// Stage `k` is centered on the winner of stage `k - 1`; the first stage is centered on
/// `initial_guess`. All stages are validated before the first evaluation.
///
/// # Example
///
/// ```
/// use qlab::optimize::{optimize_1d, Extremum, Stage};
///
/// let stages = [Stage::new(10.0, 21), Stage::new(2.0, 21), Stage::new(0.2, 21)];
/// let result = optimize_1d(|x| Ok(-(x - 5.0).powi(2)), 0.0, &stages, Extremum::Max).unwrap();
/// assert!((result.coordinates() - 5.0).abs() < 0.01);
/// ```
pub fn optimize_1d<F>(
    mut cost_fn: F,
    initial_guess: f64,
    stages: &[Stage],
    extremum: Extremum,
) -> AppResult<OptimizationResult<f64>>
where
    F: FnMut(f64) -> anyhow::Result<f64>,
{
    for stage in stages {
        stage.validate()?;
    }
    if let Some(first) = stages.first() {
        first.validate_around(initial_guess)?;
    }
    refine(
        initial_guess,
        stages,
        extremum,
        |stage, center| Ok(stage.grid("x", center)?.samples().to_vec()),
        |x| cost_fn(x),
    )
}

/// Find an extremum of a two-argument cost by grid refinement.
///
/// Every stage evaluates the full `a x b` product in row-major order: axis A is the outer
/// loop, axis B the inner loop. Tie-breaking by first occurrence follows that order.
pub fn optimize_2d<F>(
    mut cost_fn: F,
    initial_guess: (f64, f64),
    stages: &[Stage2d],
    extremum: Extremum,
) -> AppResult<OptimizationResult<(f64, f64)>>
where
    F: FnMut(f64, f64) -> anyhow::Result<f64>,
{
    for stage in stages {
        stage.validate()?;
    }
    if let Some(first) = stages.first() {
        first.validate_around(initial_guess)?;
    }
    refine(
        initial_guess,
        stages,
        extremum,
        |stage, (a, b)| {
            let a_samples = stage.a.grid("a", a)?.samples();
            let b_samples = stage.b.grid("b", b)?.samples();
            Ok(a_samples
                .iter()
                .flat_map(|&x| b_samples.iter().map(move |&y| (x, y)))
                .collect())
        },
        |(a, b)| cost_fn(a, b),
    )
}

fn refine<P, S, G, C>(
    initial: P,
    stages: &[S],
    extremum: Extremum,
    mut points_for: G,
    mut cost: C,
) -> AppResult<OptimizationResult<P>>
where
    P: GridPoint,
    G: FnMut(&S, P) -> AppResult<Vec<P>>,
    C: FnMut(P) -> anyhow::Result<f64>,
{
    if stages.is_empty() {
        return Err(LabError::InvalidConfiguration(
            "at least one refinement stage is required".into(),
        ));
    }

    let mut center = initial;
    let mut evaluations = 0;
    let mut last_stage = None;

    for (index, stage) in stages.iter().enumerate() {
        let span = tracing::debug_span!("refine_stage", stage = index, center = ?center);
        let _enter = span.enter();

        let points = points_for(stage, center)?;
        let mut history = Vec::with_capacity(points.len());
        let mut best: Option<Sample<P>> = None;

        for point in points {
            let value = cost(point)?;
            evaluations += 1;
            if value.is_nan() {
                return Err(LabError::NonFiniteCost {
                    point: format!("{point:?}"),
                });
            }
            tracing::trace!(?point, cost = value, "Evaluated");

            let sample = Sample { point, cost: value };
            if best.map_or(true, |b| extremum.improves(value, b.cost)) {
                best = Some(sample);
            }
            history.push(sample);
        }

        let best = best.ok_or_else(|| {
            LabError::InvalidConfiguration(format!("stage {index} produced no grid points"))
        })?;
        tracing::debug!(best = ?best.point, cost = best.cost, "Stage complete");
        center = best.point;
        last_stage = Some((best, history));
    }

    let (best, history) = last_stage.ok_or_else(|| {
        LabError::InvalidConfiguration("at least one refinement stage is required".into())
    })?;
    Ok(OptimizationResult::new(best, history, evaluations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn converges_on_parabola_peak() {
        let stages = [Stage::new(10.0, 21), Stage::new(2.0, 21), Stage::new(0.2, 21)];
        let result =
            optimize_1d(|x| Ok(-(x - 5.0).powi(2)), 0.0, &stages, Extremum::Max).unwrap();
        assert_abs_diff_eq!(result.coordinates(), 5.0, epsilon = 0.01);
        assert_eq!(result.evaluations(), 63);
        assert_eq!(result.history().len(), 21);
    }

    #[test]
    fn minimum_is_found_too() {
        let stages = [Stage::new(4.0, 41), Stage::new(0.2, 41), Stage::new(0.01, 41)];
        let result =
            optimize_1d(|x| Ok((x + 1.234).powi(2)), 0.0, &stages, Extremum::Min).unwrap();
        assert_abs_diff_eq!(result.coordinates(), -1.234, epsilon = 1e-3);
    }

    #[test]
    fn two_dimensional_search_is_deterministic() {
        let cost = |a: f64, b: f64| Ok(-((a - 0.3).powi(2) + 2.0 * (b + 0.7).powi(2)));
        let stages = [
            Stage2d::square(Stage::new(1.0, 11)),
            Stage2d::square(Stage::new(0.2, 11)),
            Stage2d::new(Stage::new(0.02, 11), Stage::new(0.04, 9)),
        ];
        let first = optimize_2d(cost, (0.0, 0.0), &stages, Extremum::Max).unwrap();
        let second = optimize_2d(cost, (0.0, 0.0), &stages, Extremum::Max).unwrap();

        let (a, b) = first.coordinates();
        assert_eq!(first.coordinates(), second.coordinates());
        assert_abs_diff_eq!(a, 0.3, epsilon = 0.01);
        assert_abs_diff_eq!(b, -0.7, epsilon = 0.01);
        assert_eq!(first.evaluations(), 121 + 121 + 99);
    }

    #[test]
    fn two_dimensional_order_is_row_major() {
        let mut seen = Vec::new();
        optimize_2d(
            |a, b| {
                seen.push((a, b));
                Ok(0.0)
            },
            (0.0, 0.0),
            &[Stage2d::new(Stage::new(1.0, 2), Stage::new(1.0, 3))],
            Extremum::Min,
        )
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (-1.0, -1.0),
                (-1.0, 0.0),
                (-1.0, 1.0),
                (1.0, -1.0),
                (1.0, 0.0),
                (1.0, 1.0),
            ]
        );
    }

    #[test]
    fn ties_keep_first_occurrence() {
        // flat cost: the first grid point wins
        let result =
            optimize_1d(|_| Ok(1.0), 0.0, &[Stage::new(1.0, 5)], Extremum::Max).unwrap();
        assert_eq!(result.coordinates(), -1.0);

        let result = optimize_2d(
            |_, _| Ok(1.0),
            (0.0, 0.0),
            &[Stage2d::square(Stage::new(1.0, 3))],
            Extremum::Min,
        )
        .unwrap();
        assert_eq!(result.coordinates(), (-1.0, -1.0));
    }

    #[test]
    fn degenerate_stage_is_rejected_before_any_evaluation() {
        let mut calls = 0;
        let stages = [Stage::new(1.0, 5), Stage::new(0.1, 1)];
        let err = optimize_1d(
            |x| {
                calls += 1;
                Ok(x)
            },
            0.0,
            &stages,
            Extremum::Max,
        )
        .unwrap_err();
        assert!(matches!(err, LabError::InvalidConfiguration(_)));
        assert_eq!(calls, 0);

        let err = optimize_1d(|x| Ok(x), 0.0, &[Stage::new(0.0, 5)], Extremum::Max).unwrap_err();
        assert!(matches!(err, LabError::InvalidConfiguration(_)));
    }

    #[test]
    fn relative_first_stage_at_zero_is_rejected_before_any_evaluation() {
        let mut calls = 0;
        let err = optimize_1d(
            |x| {
                calls += 1;
                Ok(x)
            },
            0.0,
            &[Stage::relative(0.1, 5)],
            Extremum::Max,
        )
        .unwrap_err();
        assert!(matches!(err, LabError::InvalidConfiguration(_)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn empty_stage_list_is_rejected() {
        let err = optimize_1d(|x| Ok(x), 0.0, &[], Extremum::Max).unwrap_err();
        assert!(matches!(err, LabError::InvalidConfiguration(_)));
        let err = optimize_2d(|a, _| Ok(a), (0.0, 0.0), &[], Extremum::Max).unwrap_err();
        assert!(matches!(err, LabError::InvalidConfiguration(_)));
    }

    #[test]
    fn cost_error_aborts_remaining_evaluations() {
        let mut calls = 0;
        let stages = [Stage::new(1.0, 5), Stage::new(0.1, 5)];
        let err = optimize_1d(
            |x| {
                calls += 1;
                if calls == 3 {
                    anyhow::bail!("analyzer timed out at {x}");
                }
                Ok(x)
            },
            0.0,
            &stages,
            Extremum::Max,
        )
        .unwrap_err();
        assert_eq!(calls, 3);
        match err {
            LabError::Instrument(inner) => assert!(inner.to_string().contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn nan_cost_is_reported() {
        let err = optimize_1d(
            |x| Ok(if x > 0.0 { f64::NAN } else { x }),
            0.0,
            &[Stage::new(1.0, 3)],
            Extremum::Max,
        )
        .unwrap_err();
        assert!(matches!(err, LabError::NonFiniteCost { .. }));
    }

    #[test]
    fn relative_and_clamped_stages() {
        let stages = [
            Stage::new(0.1, 21).clamped(0.0, 0.95),
            Stage::relative(0.01, 21),
        ];
        // peak lies outside the clamp range of the first stage
        let result =
            optimize_1d(|x| Ok(-(x - 1.2).powi(2)), 0.9, &stages, Extremum::Max).unwrap();
        assert!(result.history().iter().all(|s| s.point <= 0.95 * 1.01 + 1e-12));
        assert_abs_diff_eq!(result.coordinates(), 0.95 * 1.01, epsilon = 1e-9);
    }
}
