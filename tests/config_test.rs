//! The shipped configuration file.

use qlab::config::LabConfig;
use qlab::hardware::SimulationParams;
use qlab::procedures::SsbCalibrationConfig;

const SHIPPED: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config/qlab.toml");

#[test]
fn test_shipped_config_matches_defaults() {
    let config = LabConfig::load_from(SHIPPED).unwrap();
    config.validate().unwrap();
    assert_eq!(config.calibration, SsbCalibrationConfig::default());
    assert_eq!(config.simulation, SimulationParams::default());
}

#[test]
fn test_negative_if_frequency_rejected() {
    let mut config = LabConfig::load_from(SHIPPED).unwrap();
    config.calibration.if_frequency_hz = -50e6;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("if_frequency_hz must be positive"));
}
