//! Simulated IQ Mixer Bench
//!
//! A modulator and a spectrum analyzer sharing one mixer model, for tests and for running
//! calibrations without hardware.
//!
//! # Model
//!
//! - LO leakage grows with the distance of the DC offsets from the mixer's own offset:
//!   `P_lo = leakage * ((i - i0)^2 + (q - q0)^2)`
//! - With Q gain `g` and phase error `e = phase - phase_optimum`, the wanted and image
//!   sideband powers are `conversion * |a_i ± g a_q exp(j e)|^2 / 4`
//! - Every reading sits on a noise floor and can carry seeded uniform jitter
//!
//! A perfect calibration therefore lands on `(i0, q0)`, `phase_optimum`, and
//! `a_q = a_i / g`.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::hardware::capabilities::{
    IqChannel, IqModulator, Sideband, SidebandPowers, SpectrumAnalyzer,
};

/// Parameters of the simulated mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// DC offset on I that nulls the LO leakage, volts.
    pub dc_optimum_i: f64,
    /// DC offset on Q that nulls the LO leakage, volts.
    pub dc_optimum_q: f64,
    /// I/Q phase with no quadrature error, radians.
    pub phase_optimum: f64,
    /// Q path gain relative to I.
    pub gain_imbalance: f64,
    /// LO leakage per squared volt of DC error, mW.
    pub leakage_mw_per_v2: f64,
    /// Sideband conversion scale, mW.
    pub conversion_mw: f64,
    /// Analyzer noise floor, dBm.
    pub noise_floor_dbm: f64,
    /// Peak uniform jitter added to each reading, dB. Zero disables noise.
    pub jitter_db: f64,
    /// Jitter seed. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Sideband the mixer emits at `phase_optimum`.
    pub sideband: Sideband,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            dc_optimum_i: -18.49e-3,
            dc_optimum_q: -24.24e-3,
            phase_optimum: 1.5460,
            gain_imbalance: 0.95,
            leakage_mw_per_v2: 1.0,
            conversion_mw: 1.0,
            noise_floor_dbm: -120.0,
            jitter_db: 0.0,
            seed: None,
            sideband: Sideband::Right,
        }
    }
}

/// Current modulator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerSettings {
    /// I port DC offset, volts.
    pub dc_i: f64,
    /// Q port DC offset, volts.
    pub dc_q: f64,
    /// I/Q phase, radians.
    pub phase: f64,
    /// I tone amplitude.
    pub amplitude_i: f64,
    /// Q tone amplitude.
    pub amplitude_q: f64,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            dc_i: 0.0,
            dc_q: 0.0,
            phase: 0.0,
            amplitude_i: 0.5,
            amplitude_q: 0.5,
        }
    }
}

struct MixerState {
    params: SimulationParams,
    settings: MixerSettings,
    dc_writes: [usize; 2],
    measurements: usize,
    tuned: Option<(f64, f64)>,
    rng: StdRng,
}

impl MixerState {
    fn jitter(&mut self) -> f64 {
        let peak = self.params.jitter_db;
        if peak > 0.0 {
            self.rng.gen_range(-peak..=peak)
        } else {
            0.0
        }
    }

    fn floor_mw(&self) -> f64 {
        10f64.powf(self.params.noise_floor_dbm / 10.0)
    }

    fn to_dbm(&mut self, milliwatts: f64) -> f64 {
        10.0 * (milliwatts + self.floor_mw()).log10() + self.jitter()
    }

    fn carrier_mw(&self) -> f64 {
        let di = self.settings.dc_i - self.params.dc_optimum_i;
        let dq = self.settings.dc_q - self.params.dc_optimum_q;
        self.params.leakage_mw_per_v2 * (di * di + dq * dq)
    }

    /// `(wanted, image)` in mW.
    fn sidebands_mw(&self) -> (f64, f64) {
        let a = self.settings.amplitude_i;
        let b = self.params.gain_imbalance * self.settings.amplitude_q;
        let error = self.settings.phase - self.params.phase_optimum;
        let common = a * a + b * b;
        let cross = 2.0 * a * b * error.cos();
        let scale = self.params.conversion_mw / 4.0;
        (scale * (common + cross), scale * (common - cross).max(0.0))
    }
}

type SharedState = Arc<Mutex<MixerState>>;

fn lock(state: &SharedState) -> Result<MutexGuard<'_, MixerState>> {
    state
        .lock()
        .map_err(|_| anyhow!("simulated mixer state poisoned"))
}

/// Build a modulator/analyzer pair sharing one simulated mixer.
pub fn simulated_bench(params: SimulationParams) -> (SimulatedModulator, SimulatedAnalyzer) {
    let rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let state = Arc::new(Mutex::new(MixerState {
        params,
        settings: MixerSettings::default(),
        dc_writes: [0; 2],
        measurements: 0,
        tuned: None,
        rng,
    }));
    (
        SimulatedModulator {
            state: Arc::clone(&state),
        },
        SimulatedAnalyzer { state },
    )
}

/// Modulator half of the simulated bench.
pub struct SimulatedModulator {
    state: SharedState,
}

impl SimulatedModulator {
    /// Settings currently applied.
    pub fn settings(&self) -> Result<MixerSettings> {
        Ok(lock(&self.state)?.settings)
    }

    /// Number of DC offset writes on `channel` so far.
    pub fn dc_writes(&self, channel: IqChannel) -> Result<usize> {
        let state = lock(&self.state)?;
        Ok(match channel {
            IqChannel::I => state.dc_writes[0],
            IqChannel::Q => state.dc_writes[1],
        })
    }
}

impl IqModulator for SimulatedModulator {
    fn set_dc_offset(&mut self, channel: IqChannel, volts: f64) -> Result<()> {
        let mut state = lock(&self.state)?;
        match channel {
            IqChannel::I => {
                state.settings.dc_i = volts;
                state.dc_writes[0] += 1;
            }
            IqChannel::Q => {
                state.settings.dc_q = volts;
                state.dc_writes[1] += 1;
            }
        }
        Ok(())
    }

    fn set_phase(&mut self, radians: f64) -> Result<()> {
        lock(&self.state)?.settings.phase = radians;
        Ok(())
    }

    fn set_amplitude(&mut self, channel: IqChannel, scale: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&scale) {
            anyhow::bail!("{channel} amplitude {scale} outside full scale [0, 1]");
        }
        let mut state = lock(&self.state)?;
        match channel {
            IqChannel::I => state.settings.amplitude_i = scale,
            IqChannel::Q => state.settings.amplitude_q = scale,
        }
        Ok(())
    }
}

/// Analyzer half of the simulated bench.
pub struct SimulatedAnalyzer {
    state: SharedState,
}

impl SimulatedAnalyzer {
    /// Measurements taken so far.
    pub fn measurements(&self) -> Result<usize> {
        Ok(lock(&self.state)?.measurements)
    }

    /// Last `(lo, if)` passed to [`SpectrumAnalyzer::tune`].
    pub fn tuned(&self) -> Result<Option<(f64, f64)>> {
        Ok(lock(&self.state)?.tuned)
    }
}

impl SpectrumAnalyzer for SimulatedAnalyzer {
    fn tune(&mut self, lo_frequency_hz: f64, if_frequency_hz: f64) -> Result<()> {
        if !(lo_frequency_hz > 0.0 && if_frequency_hz > 0.0) {
            anyhow::bail!("cannot tune to LO {lo_frequency_hz} Hz, IF {if_frequency_hz} Hz");
        }
        lock(&self.state)?.tuned = Some((lo_frequency_hz, if_frequency_hz));
        Ok(())
    }

    fn carrier_power(&mut self) -> Result<f64> {
        let mut state = lock(&self.state)?;
        state.measurements += 1;
        let carrier = state.carrier_mw();
        Ok(state.to_dbm(carrier))
    }

    fn sideband_powers(&mut self) -> Result<SidebandPowers> {
        let mut state = lock(&self.state)?;
        state.measurements += 1;
        let (wanted, image) = state.sidebands_mw();
        let wanted_dbm = state.to_dbm(wanted);
        let image_dbm = state.to_dbm(image);
        Ok(match state.params.sideband {
            Sideband::Right => SidebandPowers {
                lower_dbm: image_dbm,
                upper_dbm: wanted_dbm,
            },
            Sideband::Left => SidebandPowers {
                lower_dbm: wanted_dbm,
                upper_dbm: image_dbm,
            },
        })
    }
}
