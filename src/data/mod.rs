//! Sweep data files.
//!
//! Sweeps are stored as a `(<stem>.dat, <stem>.meta.txt)` pair, one pair per directory.
//! [`SweepTable`] loads a pair and reshapes columns to the sweep geometry; [`SweepWriter`]
//! produces one.
pub mod sweep_axis;
pub mod sweep_meta;
pub mod sweep_table;
pub mod sweep_writer;

pub use sweep_axis::SweepAxis;
pub use sweep_meta::{OuterAxisOrder, SweepMetadata};
pub use sweep_table::SweepTable;
pub use sweep_writer::SweepWriter;
