//! # qlab Core Library
//!
//! Calibration and sweep-data tooling for superconducting-qubit experiments. The library
//! holds all logic; the `qlab` binary (`main.rs`) is a thin CLI over it.
//!
//! ## Crate Structure
//!
//! - **`config`**: `LabConfig`, loaded with figment from defaults, a TOML file and `QLAB_`
//!   environment variables, then validated.
//! - **`data`**: the tabular sweep-file format. `SweepTable` loads a `.dat`/`.meta.txt`
//!   pair and reshapes data columns to `(outer, inner)` arrays; `SweepWriter` produces one.
//! - **`error`**: the `LabError` enum shared by every module.
//! - **`hardware`**: synchronous instrument capability traits and a simulated IQ-mixer bench.
//! - **`logging`**: tracing-subscriber setup driven by the configuration.
//! - **`optimize`**: staged grid refinement (`optimize_1d`, `optimize_2d`) for expensive
//!   black-box cost functions.
//! - **`procedures`**: single-sideband mixer calibration built on the optimizer, and the
//!   append-only calibration log.

pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod optimize;
pub mod procedures;
