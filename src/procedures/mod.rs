//! Calibration procedures.
//!
//! A procedure composes the grid optimizer with instrument capabilities:
//!
//! ```text
//! SsbCalibration::run
//!   ├─ DC offsets   optimize_2d  (min carrier)      IqModulator::set_dc_offset
//!   ├─ IQ phase     optimize_1d  (max rejection)    IqModulator::set_phase
//!   └─ amplitudes   optimize_1d | optimize_2d       IqModulator::set_amplitude
//!                                                   SpectrumAnalyzer readings
//! ```
//!
//! Results can be appended to a [`CalibrationLog`].
//!
//! # Example Usage
//!
//! ```rust
//! use qlab::hardware::{simulated_bench, SimulationParams};
//! use qlab::procedures::SsbCalibration;
//!
//! let (mut modulator, mut analyzer) = simulated_bench(SimulationParams::default());
//! let outcome = SsbCalibration::default().run(&mut modulator, &mut analyzer)?;
//! println!("rejection {:.1} dB", outcome.rejection_db());
//! # Ok::<(), qlab::error::LabError>(())
//! ```
pub mod record;
pub mod ssb_calibration;

pub use record::{CalibrationLog, CalibrationRecord};
pub use crate::hardware::Sideband;
pub use ssb_calibration::{
    AmplitudeSearch, SsbCalibration, SsbCalibrationConfig, SsbCalibrationOutcome,
};
