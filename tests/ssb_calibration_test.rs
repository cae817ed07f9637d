//! End-to-end calibration against the simulated bench.

use approx::assert_abs_diff_eq;
use qlab::config::LabConfig;
use qlab::error::LabError;
use qlab::hardware::{
    simulated_bench, IqChannel, IqModulator, SidebandPowers, SimulationParams, SpectrumAnalyzer,
};
use qlab::procedures::{CalibrationLog, CalibrationRecord, Sideband, SsbCalibration};

#[test]
fn test_calibration_is_logged_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LabConfig::default();
    config.storage.calibration_log = dir.path().join("qubit").join("ssb.tsv");
    config.simulation.seed = Some(3);
    config.validate().unwrap();

    let (mut modulator, mut analyzer) = simulated_bench(config.simulation.clone());
    let outcome = SsbCalibration::new(config.calibration.clone())
        .run(&mut modulator, &mut analyzer)
        .unwrap();

    let log = CalibrationLog::new(&config.storage.calibration_log);
    let record = CalibrationRecord::from_outcome(
        &outcome,
        config.calibration.lo_frequency_hz,
        config.calibration.if_frequency_hz,
    );
    log.append(&record).unwrap();

    let latest = log.latest().unwrap().unwrap();
    assert_eq!(latest, record);
    assert_eq!(latest.sideband, Sideband::Right);
    assert_abs_diff_eq!(latest.dc_i, config.simulation.dc_optimum_i, epsilon = 1e-4);
    assert!(latest.rejection_db() > 50.0);
}

#[test]
fn test_calibration_tolerates_measurement_jitter() {
    let params = SimulationParams {
        jitter_db: 0.05,
        seed: Some(11),
        ..SimulationParams::default()
    };
    let (mut modulator, mut analyzer) = simulated_bench(params.clone());
    let outcome = SsbCalibration::default()
        .run(&mut modulator, &mut analyzer)
        .unwrap();

    assert_abs_diff_eq!(outcome.dc_offsets.0, params.dc_optimum_i, epsilon = 2e-3);
    assert_abs_diff_eq!(outcome.dc_offsets.1, params.dc_optimum_q, epsilon = 2e-3);
    assert_abs_diff_eq!(outcome.phase, params.phase_optimum, epsilon = 2e-2);
    assert!(outcome.rejection_db() > 20.0);
}

/// Analyzer whose connection drops after a fixed number of readings.
struct FlakyAnalyzer {
    remaining: usize,
}

impl SpectrumAnalyzer for FlakyAnalyzer {
    fn carrier_power(&mut self) -> anyhow::Result<f64> {
        if self.remaining == 0 {
            anyhow::bail!("VISA timeout");
        }
        self.remaining -= 1;
        Ok(-40.0)
    }

    fn sideband_powers(&mut self) -> anyhow::Result<SidebandPowers> {
        Ok(SidebandPowers {
            lower_dbm: -40.0,
            upper_dbm: -10.0,
        })
    }
}

/// Modulator that only counts writes.
#[derive(Default)]
struct CountingModulator {
    writes: usize,
}

impl IqModulator for CountingModulator {
    fn set_dc_offset(&mut self, _channel: IqChannel, _volts: f64) -> anyhow::Result<()> {
        self.writes += 1;
        Ok(())
    }

    fn set_phase(&mut self, _radians: f64) -> anyhow::Result<()> {
        self.writes += 1;
        Ok(())
    }

    fn set_amplitude(&mut self, _channel: IqChannel, _scale: f64) -> anyhow::Result<()> {
        self.writes += 1;
        Ok(())
    }
}

#[test]
fn test_instrument_error_aborts_calibration() {
    let mut modulator = CountingModulator::default();
    let mut analyzer = FlakyAnalyzer { remaining: 10 };

    let err = SsbCalibration::default()
        .run(&mut modulator, &mut analyzer)
        .unwrap_err();

    match err {
        LabError::Instrument(inner) => assert!(inner.to_string().contains("VISA timeout")),
        other => panic!("expected instrument error, got {other}"),
    }
    assert_eq!(analyzer.remaining, 0);
    // 10 successful readings plus the one that failed, each after one Q write
    // and with I written once for the first grid row
    assert_eq!(modulator.writes, 12);
}
