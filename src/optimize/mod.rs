//! Grid-refinement optimizer for expensive black-box cost functions.
//!
//! Each cost evaluation is typically a live instrument measurement, so the search keeps the
//! evaluation count explicit and predictable: a run costs exactly the sum of the stage grid
//! sizes. See [`optimize_1d`] and [`optimize_2d`].
pub mod grid;
pub mod result;
pub mod search;
pub mod stage;

pub use grid::{Bounds, OptimizationGrid};
pub use result::{GridPoint, OptimizationResult, Sample};
pub use search::{optimize_1d, optimize_2d, Extremum};
pub use stage::{Span, Stage, Stage2d};
