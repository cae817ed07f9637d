//! Single-Sideband Mixer Calibration
//!
//! Tunes an IQ mixer so it emits only the wanted sideband:
//! 1. DC offsets (2D, minimise carrier leakage, starting at `(0, 0)`)
//! 2. I/Q phase (1D, maximise sideband rejection)
//! 3. Amplitude imbalance (hold I and sweep Q, or search both jointly)
//!
//! Each phase is a staged grid search from [`crate::optimize`]; every cost evaluation is a
//! live measurement. The best settings of each phase are applied before the next starts.
//!
//! # Configuration
//!
//! ```toml
//! [calibration]
//! sideband = "right"
//! lo_frequency_hz = 6.0e9
//! if_frequency_hz = 50.0e6
//! dc_stages = [
//!     { half_width = 0.5, point_count = 25 },
//!     { half_width = 25e-3, point_count = 10 },
//! ]
//! phase_guess = 1.5707963
//! phase_stages = [{ half_width = 1.5707963, point_count = 41 }, { half_width = 0.0471, point_count = 21 }]
//!
//! [calibration.amplitude]
//! mode = "balanced"
//! base_i = 0.9
//! stages = [{ half_width = 0.1, point_count = 41, min = 0.0, max = 1.0 }]
//! ```

use crate::error::{AppResult, LabError};
use crate::hardware::{IqChannel, IqModulator, Sideband, SidebandPowers, SpectrumAnalyzer};
use crate::optimize::{optimize_1d, optimize_2d, Extremum, OptimizationResult, Stage, Stage2d};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// DC offsets every calibration starts from.
const DC_INITIAL_GUESS: (f64, f64) = (0.0, 0.0);

// =============================================================================
// Configuration
// =============================================================================

/// How the tone amplitudes are balanced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AmplitudeSearch {
    /// Hold I at `base_i` and sweep Q, starting from `base_i`.
    Balanced {
        /// Fixed I amplitude.
        base_i: f64,
        /// Q stages.
        stages: Vec<Stage>,
    },
    /// Search I (axis A) and Q (axis B) together.
    Joint {
        /// Starting I amplitude.
        initial_i: f64,
        /// Starting Q amplitude.
        initial_q: f64,
        /// 2D stages.
        stages: Vec<Stage2d>,
    },
}

impl Default for AmplitudeSearch {
    fn default() -> Self {
        AmplitudeSearch::Balanced {
            base_i: 0.9,
            stages: vec![
                Stage::new(0.1, 41).clamped(0.0, 1.0),
                Stage::new(0.05, 41).clamped(0.0, 1.0),
                Stage::new(0.01, 41).clamped(0.0, 1.0),
            ],
        }
    }
}

impl AmplitudeSearch {
    /// Joint search with stages clamped below the modulator's linear range.
    pub fn joint_default() -> Self {
        let limit = 700e-3 / 750e-3;
        AmplitudeSearch::Joint {
            initial_i: 0.9,
            initial_q: 0.9,
            stages: vec![
                Stage2d::square(Stage::new(0.1, 11).clamped(0.0, limit)),
                Stage2d::square(Stage::new(0.02, 11).clamped(0.0, limit)),
                Stage2d::square(Stage::new(0.004, 11).clamped(0.0, limit)),
            ],
        }
    }

    fn validate(&self) -> AppResult<()> {
        match self {
            AmplitudeSearch::Balanced { base_i, stages } => {
                check_amplitude("base_i", *base_i)?;
                check_stages("amplitude", stages, Stage::validate, |first| {
                    first.validate_around(*base_i)
                })
            }
            AmplitudeSearch::Joint {
                initial_i,
                initial_q,
                stages,
            } => {
                check_amplitude("initial_i", *initial_i)?;
                check_amplitude("initial_q", *initial_q)?;
                check_stages("amplitude", stages, Stage2d::validate, |first| {
                    first.validate_around((*initial_i, *initial_q))
                })
            }
        }
    }
}

/// Typed configuration for SSB calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsbCalibrationConfig {
    /// Sideband to keep
    #[serde(default)]
    pub sideband: Sideband,

    /// LO frequency (Hz)
    #[serde(default = "default_lo_frequency")]
    pub lo_frequency_hz: f64,

    /// IF (modulation) frequency (Hz)
    #[serde(default = "default_if_frequency")]
    pub if_frequency_hz: f64,

    /// DC offset stages, axis A = I, axis B = Q
    #[serde(default = "default_dc_stages")]
    pub dc_stages: Vec<Stage2d>,

    /// Amplitude of both tones while the phase is searched
    #[serde(default = "default_phase_amplitude")]
    pub phase_amplitude: f64,

    /// Center of the first phase stage (radians)
    #[serde(default = "default_phase_guess")]
    pub phase_guess: f64,

    /// Phase stages
    #[serde(default = "default_phase_stages")]
    pub phase_stages: Vec<Stage>,

    /// Amplitude balancing
    #[serde(default)]
    pub amplitude: AmplitudeSearch,
}

fn default_lo_frequency() -> f64 {
    6.0e9
}
fn default_if_frequency() -> f64 {
    50.0e6
}
fn default_dc_stages() -> Vec<Stage2d> {
    vec![
        Stage2d::square(Stage::new(500e-3, 25)),
        Stage2d::square(Stage::new(25e-3, 10)),
        Stage2d::square(Stage::new(5e-3, 10)),
        Stage2d::square(Stage::new(1e-3, 20)),
    ]
}
fn default_phase_amplitude() -> f64 {
    0.5
}
fn default_phase_guess() -> f64 {
    FRAC_PI_2
}
fn default_phase_stages() -> Vec<Stage> {
    vec![
        Stage::new(FRAC_PI_2, 41),
        Stage::new(FRAC_PI_2 * 0.03, 21),
        Stage::new(FRAC_PI_2 * 0.005, 21),
    ]
}

impl Default for SsbCalibrationConfig {
    fn default() -> Self {
        Self {
            sideband: Sideband::default(),
            lo_frequency_hz: default_lo_frequency(),
            if_frequency_hz: default_if_frequency(),
            dc_stages: default_dc_stages(),
            phase_amplitude: default_phase_amplitude(),
            phase_guess: default_phase_guess(),
            phase_stages: default_phase_stages(),
            amplitude: AmplitudeSearch::default(),
        }
    }
}

impl SsbCalibrationConfig {
    /// Check frequencies, amplitudes and every stage before any instrument is touched.
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("lo_frequency_hz", self.lo_frequency_hz),
            ("if_frequency_hz", self.if_frequency_hz),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(LabError::Configuration(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !self.phase_guess.is_finite() {
            return Err(LabError::Configuration(format!(
                "phase_guess must be finite, got {}",
                self.phase_guess
            )));
        }
        check_amplitude("phase_amplitude", self.phase_amplitude)?;
        check_stages("dc", &self.dc_stages, Stage2d::validate, |first| {
            first.validate_around(DC_INITIAL_GUESS)
        })?;
        check_stages("phase", &self.phase_stages, Stage::validate, |first| {
            first.validate_around(self.phase_guess)
        })?;
        self.amplitude.validate()
    }
}

fn check_amplitude(name: &str, value: f64) -> AppResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(LabError::Configuration(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

/// Every stage must be usable; the first one also around its known starting center.
fn check_stages<S>(
    phase: &str,
    stages: &[S],
    validate: impl Fn(&S) -> AppResult<()>,
    validate_first: impl Fn(&S) -> AppResult<()>,
) -> AppResult<()> {
    if stages.is_empty() {
        return Err(LabError::Configuration(format!(
            "{phase} calibration needs at least one stage"
        )));
    }
    for (index, stage) in stages.iter().enumerate() {
        let checked = if index == 0 {
            validate_first(stage)
        } else {
            validate(stage)
        };
        checked.map_err(|e| LabError::Configuration(format!("{phase} stage {index}: {e}")))?;
    }
    Ok(())
}

/// Name the calibration phase in errors raised while it runs.
fn during(phase: &'static str) -> impl FnOnce(LabError) -> LabError {
    move |err| match err {
        LabError::InvalidConfiguration(reason) => {
            LabError::InvalidConfiguration(format!("{phase} calibration: {reason}"))
        }
        LabError::NonFiniteCost { point } => LabError::NonFiniteCost {
            point: format!("{point} ({phase} calibration)"),
        },
        LabError::Instrument(inner) => {
            LabError::Instrument(inner.context(format!("{phase} calibration")))
        }
        other => other,
    }
}

// =============================================================================
// Calibration Results
// =============================================================================

/// Settings found by a calibration run and the powers measured with them applied.
#[derive(Debug, Clone)]
pub struct SsbCalibrationOutcome {
    /// Sideband that was optimized.
    pub sideband: Sideband,
    /// `(I, Q)` DC offsets, volts.
    pub dc_offsets: (f64, f64),
    /// I/Q phase, radians.
    pub phase: f64,
    /// `(I, Q)` tone amplitudes.
    pub amplitudes: (f64, f64),
    /// Final sideband powers.
    pub powers: SidebandPowers,
    /// Final carrier leakage, dBm.
    pub carrier_dbm: f64,
    /// Cost evaluations across all phases.
    pub evaluations: usize,
    /// DC offset search, kept for diagnostics.
    pub dc_search: OptimizationResult<(f64, f64)>,
    /// Phase search, kept for diagnostics.
    pub phase_search: OptimizationResult<f64>,
}

impl SsbCalibrationOutcome {
    /// Wanted minus image sideband power, dB.
    pub fn rejection_db(&self) -> f64 {
        self.sideband.rejection(self.powers)
    }
}

// =============================================================================
// Procedure
// =============================================================================

/// SSB calibration procedure.
#[derive(Debug, Clone, Default)]
pub struct SsbCalibration {
    config: SsbCalibrationConfig,
}

impl SsbCalibration {
    /// Create with the given configuration.
    pub fn new(config: SsbCalibrationConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &SsbCalibrationConfig {
        &self.config
    }

    /// Run DC, phase and amplitude calibration in order and leave the best settings applied.
    pub fn run<M, A>(&self, modulator: &mut M, analyzer: &mut A) -> AppResult<SsbCalibrationOutcome>
    where
        M: IqModulator,
        A: SpectrumAnalyzer,
    {
        self.config.validate()?;
        let config = &self.config;
        analyzer.tune(config.lo_frequency_hz, config.if_frequency_hz)?;

        tracing::info!(
            sideband = %config.sideband,
            lo_hz = config.lo_frequency_hz,
            if_hz = config.if_frequency_hz,
            "Starting SSB calibration"
        );

        let dc_search = self
            .calibrate_dc(modulator, analyzer)
            .map_err(during("dc"))?;
        let phase_search = self
            .calibrate_phase(modulator, analyzer)
            .map_err(during("phase"))?;
        let (amplitudes, amplitude_evaluations) = self
            .calibrate_amplitude(modulator, analyzer)
            .map_err(during("amplitude"))?;

        let powers = analyzer.sideband_powers()?;
        let carrier_dbm = analyzer.carrier_power()?;
        let outcome = SsbCalibrationOutcome {
            sideband: config.sideband,
            dc_offsets: dc_search.coordinates(),
            phase: phase_search.coordinates(),
            amplitudes,
            powers,
            carrier_dbm,
            evaluations: dc_search.evaluations()
                + phase_search.evaluations()
                + amplitude_evaluations,
            dc_search,
            phase_search,
        };

        tracing::info!(
            dc_i = outcome.dc_offsets.0,
            dc_q = outcome.dc_offsets.1,
            phase = outcome.phase,
            amplitude_i = outcome.amplitudes.0,
            amplitude_q = outcome.amplitudes.1,
            rejection_db = outcome.rejection_db(),
            carrier_dbm,
            evaluations = outcome.evaluations,
            "SSB calibration complete"
        );
        Ok(outcome)
    }

    fn calibrate_dc<M, A>(
        &self,
        modulator: &mut M,
        analyzer: &mut A,
    ) -> AppResult<OptimizationResult<(f64, f64)>>
    where
        M: IqModulator,
        A: SpectrumAnalyzer,
    {
        tracing::info!("Optimizing DC offsets");
        let mut current_i = None;
        let result = optimize_2d(
            |i, q| {
                if current_i != Some(i) {
                    modulator.set_dc_offset(IqChannel::I, i)?;
                    current_i = Some(i);
                }
                modulator.set_dc_offset(IqChannel::Q, q)?;
                analyzer.carrier_power()
            },
            DC_INITIAL_GUESS,
            &self.config.dc_stages,
            Extremum::Min,
        )?;

        let (i, q) = result.coordinates();
        modulator.set_dc_offset(IqChannel::I, i)?;
        modulator.set_dc_offset(IqChannel::Q, q)?;
        tracing::info!(dc_i = i, dc_q = q, carrier_dbm = result.best_cost(), "DC offsets set");
        Ok(result)
    }

    fn calibrate_phase<M, A>(
        &self,
        modulator: &mut M,
        analyzer: &mut A,
    ) -> AppResult<OptimizationResult<f64>>
    where
        M: IqModulator,
        A: SpectrumAnalyzer,
    {
        tracing::info!("Optimizing IQ phase");
        let sideband = self.config.sideband;
        modulator.set_amplitude(IqChannel::I, self.config.phase_amplitude)?;
        modulator.set_amplitude(IqChannel::Q, self.config.phase_amplitude)?;

        let result = optimize_1d(
            |phase| {
                modulator.set_phase(phase)?;
                Ok(sideband.rejection(analyzer.sideband_powers()?))
            },
            self.config.phase_guess,
            &self.config.phase_stages,
            Extremum::Max,
        )?;

        modulator.set_phase(result.coordinates())?;
        tracing::info!(
            phase = result.coordinates(),
            rejection_db = result.best_cost(),
            "Phase set"
        );
        Ok(result)
    }

    /// Returns the applied `(I, Q)` amplitudes and the evaluations spent.
    fn calibrate_amplitude<M, A>(
        &self,
        modulator: &mut M,
        analyzer: &mut A,
    ) -> AppResult<((f64, f64), usize)>
    where
        M: IqModulator,
        A: SpectrumAnalyzer,
    {
        tracing::info!("Optimizing amplitude balance");
        let sideband = self.config.sideband;
        let (amplitudes, evaluations, rejection) = match &self.config.amplitude {
            AmplitudeSearch::Balanced { base_i, stages } => {
                modulator.set_amplitude(IqChannel::I, *base_i)?;
                let result = optimize_1d(
                    |q| {
                        modulator.set_amplitude(IqChannel::Q, q)?;
                        Ok(sideband.rejection(analyzer.sideband_powers()?))
                    },
                    *base_i,
                    stages,
                    Extremum::Max,
                )?;
                (
                    (*base_i, result.coordinates()),
                    result.evaluations(),
                    result.best_cost(),
                )
            }
            AmplitudeSearch::Joint {
                initial_i,
                initial_q,
                stages,
            } => {
                let mut current_i = None;
                let result = optimize_2d(
                    |i, q| {
                        if current_i != Some(i) {
                            modulator.set_amplitude(IqChannel::I, i)?;
                            current_i = Some(i);
                        }
                        modulator.set_amplitude(IqChannel::Q, q)?;
                        Ok(sideband.rejection(analyzer.sideband_powers()?))
                    },
                    (*initial_i, *initial_q),
                    stages,
                    Extremum::Max,
                )?;
                (result.coordinates(), result.evaluations(), result.best_cost())
            }
        };

        modulator.set_amplitude(IqChannel::I, amplitudes.0)?;
        modulator.set_amplitude(IqChannel::Q, amplitudes.1)?;
        tracing::info!(
            amplitude_i = amplitudes.0,
            amplitude_q = amplitudes.1,
            rejection_db = rejection,
            "Amplitudes set"
        );
        Ok((amplitudes, evaluations))
    }
}
