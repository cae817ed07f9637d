//! Instrument Capabilities
//!
//! Small capability traits for the instruments an SSB mixer calibration talks to:
//!
//! - an AWG/lock-in driving the I and Q ports of the mixer implements [`IqModulator`]
//! - a spectrum analyzer watching the mixer output implements [`SpectrumAnalyzer`]
//!
//! Procedures take `impl IqModulator` / `impl SpectrumAnalyzer` instead of concrete drivers,
//! so they run the same against the simulated bench in [`crate::hardware::mock`].
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is synchronous: a calibration owns its instruments for the whole run and talks to them
//!   one command at a time
//! - Takes `&mut self`, since every call changes or reads live instrument state
//! - Uses `anyhow::Result` for errors, which the optimizer wraps as
//!   [`LabError::Instrument`](crate::error::LabError::Instrument)
//!
//! # Example
//!
//! ```rust
//! use qlab::hardware::{IqChannel, IqModulator, SpectrumAnalyzer};
//!
//! fn zero_offsets(modulator: &mut impl IqModulator, analyzer: &mut impl SpectrumAnalyzer) -> anyhow::Result<f64> {
//!     modulator.set_dc_offset(IqChannel::I, 0.0)?;
//!     modulator.set_dc_offset(IqChannel::Q, 0.0)?;
//!     analyzer.carrier_power()
//! }
//! ```

use crate::error::LabError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two mixer baseband ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IqChannel {
    /// In-phase port.
    I,
    /// Quadrature port.
    Q,
}

impl fmt::Display for IqChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IqChannel::I => write!(f, "I"),
            IqChannel::Q => write!(f, "Q"),
        }
    }
}

/// Capability: IQ Modulation
///
/// Drives the baseband ports of an IQ mixer with a tone at the intermediate frequency.
///
/// # Contract
/// - DC offsets are in volts at the output port
/// - `set_phase` sets the Q tone phase relative to I, in radians
/// - Amplitudes are dimensionless scale factors of the full-scale tone
/// - Settings take effect before the call returns
pub trait IqModulator {
    /// Set the DC offset of one port.
    fn set_dc_offset(&mut self, channel: IqChannel, volts: f64) -> Result<()>;

    /// Set the I/Q relative phase.
    fn set_phase(&mut self, radians: f64) -> Result<()>;

    /// Set the tone amplitude of one port.
    fn set_amplitude(&mut self, channel: IqChannel, scale: f64) -> Result<()>;
}

/// Powers of the two sidebands around the LO, in dBm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SidebandPowers {
    /// Power at `LO - IF`.
    pub lower_dbm: f64,
    /// Power at `LO + IF`.
    pub upper_dbm: f64,
}

/// Wanted sideband relative to the LO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sideband {
    /// Keep `LO - IF`.
    #[serde(alias = "lower")]
    Left,
    /// Keep `LO + IF`.
    #[default]
    #[serde(alias = "upper")]
    Right,
}

impl Sideband {
    /// Wanted minus unwanted sideband power, in dB. Larger is better.
    pub fn rejection(self, powers: SidebandPowers) -> f64 {
        match self {
            Sideband::Right => powers.upper_dbm - powers.lower_dbm,
            Sideband::Left => powers.lower_dbm - powers.upper_dbm,
        }
    }

    /// The other sideband.
    pub fn image(self) -> Self {
        match self {
            Sideband::Left => Sideband::Right,
            Sideband::Right => Sideband::Left,
        }
    }
}

impl fmt::Display for Sideband {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sideband::Left => write!(f, "left"),
            Sideband::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Sideband {
    type Err = LabError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "lower" => Ok(Sideband::Left),
            "right" | "upper" => Ok(Sideband::Right),
            other => Err(LabError::Configuration(format!(
                "unknown sideband '{other}', expected 'left' or 'right'"
            ))),
        }
    }
}

/// Capability: Spectrum Measurement
///
/// Reads mixer output power at the LO and at the two sidebands.
///
/// # Contract
/// - Powers are in dBm
/// - Each call performs a fresh measurement; results are never cached
pub trait SpectrumAnalyzer {
    /// Center the analyzer on the LO and set the sideband spacing.
    ///
    /// # Default Implementation
    /// Accepts any setting; analyzers with fixed markers need nothing here.
    fn tune(&mut self, lo_frequency_hz: f64, if_frequency_hz: f64) -> Result<()> {
        let _ = (lo_frequency_hz, if_frequency_hz);
        Ok(())
    }

    /// Power leaking through at the LO frequency.
    fn carrier_power(&mut self) -> Result<f64>;

    /// Power of both sidebands.
    fn sideband_powers(&mut self) -> Result<SidebandPowers>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_oriented_by_sideband() {
        let powers = SidebandPowers {
            lower_dbm: -60.0,
            upper_dbm: -10.0,
        };
        assert_eq!(Sideband::Right.rejection(powers), 50.0);
        assert_eq!(Sideband::Left.rejection(powers), -50.0);
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("right".parse::<Sideband>().unwrap(), Sideband::Right);
        assert_eq!(" Lower ".parse::<Sideband>().unwrap(), Sideband::Left);
        assert!("middle".parse::<Sideband>().is_err());
        assert_eq!(Sideband::Left.to_string(), "left");
    }

    #[test]
    fn unknown_sideband_fails_deserialization() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[allow(dead_code)]
            sideband: Sideband,
        }
        assert!(toml::from_str::<Wrapper>("sideband = \"upper\"").is_ok());
        assert!(toml::from_str::<Wrapper>("sideband = \"both\"").is_err());
    }
}
