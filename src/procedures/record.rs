//! Append-only log of calibration results.
//!
//! One tab-separated line per calibration run:
//!
//! ```text
//! # timestamp  lo_hz  if_hz  sideband  dc_i  dc_q  phase  amplitude_i  amplitude_q  lower_dbm  upper_dbm
//! ```

use super::ssb_calibration::SsbCalibrationOutcome;
use crate::error::{AppResult, LabError};
use crate::hardware::{Sideband, SidebandPowers};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const HEADER: &str =
    "# timestamp\tlo_hz\tif_hz\tsideband\tdc_i\tdc_q\tphase\tamplitude_i\tamplitude_q\tlower_dbm\tupper_dbm";

const FIELDS: usize = 11;

/// One logged calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    /// When the calibration finished.
    pub timestamp: DateTime<Utc>,
    /// LO frequency.
    pub lo_frequency_hz: f64,
    /// IF frequency.
    pub if_frequency_hz: f64,
    /// Wanted sideband.
    pub sideband: Sideband,
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
    /// Final lower sideband power, dBm.
    pub lower_dbm: f64,
    /// Final upper sideband power, dBm.
    pub upper_dbm: f64,
}

impl CalibrationRecord {
    /// Record a finished calibration, stamped now.
    pub fn from_outcome(
        outcome: &SsbCalibrationOutcome,
        lo_frequency_hz: f64,
        if_frequency_hz: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            lo_frequency_hz,
            if_frequency_hz,
            sideband: outcome.sideband,
            dc_i: outcome.dc_offsets.0,
            dc_q: outcome.dc_offsets.1,
            phase: outcome.phase,
            amplitude_i: outcome.amplitudes.0,
            amplitude_q: outcome.amplitudes.1,
            lower_dbm: outcome.powers.lower_dbm,
            upper_dbm: outcome.powers.upper_dbm,
        }
    }

    /// Wanted minus image sideband power, dB.
    pub fn rejection_db(&self) -> f64 {
        self.sideband.rejection(SidebandPowers {
            lower_dbm: self.lower_dbm,
            upper_dbm: self.upper_dbm,
        })
    }

    /// Tab-separated log line, without newline.
    pub fn to_line(&self) -> String {
        let mut line = self.timestamp.to_rfc3339();
        let _ = write!(
            line,
            "\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.lo_frequency_hz,
            self.if_frequency_hz,
            self.sideband,
            self.dc_i,
            self.dc_q,
            self.phase,
            self.amplitude_i,
            self.amplitude_q,
            self.lower_dbm,
            self.upper_dbm
        );
        line
    }
}

impl FromStr for CalibrationRecord {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split('\t').collect();
        if fields.len() != FIELDS {
            return Err(format!("expected {FIELDS} fields, found {}", fields.len()));
        }
        let number = |index: usize| -> Result<f64, String> {
            fields[index]
                .parse()
                .map_err(|_| format!("field {index} '{}' is not a number", fields[index]))
        };
        let timestamp = DateTime::parse_from_rfc3339(fields[0])
            .map_err(|e| format!("bad timestamp '{}': {e}", fields[0]))?
            .with_timezone(&Utc);
        let sideband = fields[3].parse::<Sideband>().map_err(|e| e.to_string())?;

        Ok(Self {
            timestamp,
            lo_frequency_hz: number(1)?,
            if_frequency_hz: number(2)?,
            sideband,
            dc_i: number(4)?,
            dc_q: number(5)?,
            phase: number(6)?,
            amplitude_i: number(7)?,
            amplitude_q: number(8)?,
            lower_dbm: number(9)?,
            upper_dbm: number(10)?,
        })
    }
}

/// Calibration results file. Lines are only ever appended.
#[derive(Debug, Clone)]
pub struct CalibrationLog {
    path: PathBuf,
}

impl CalibrationLog {
    /// Log at `path`. Nothing is touched until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file (with a header) and parent directories.
    pub fn append(&self, record: &CalibrationRecord) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let is_new = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if is_new {
            writeln!(file, "{HEADER}")?;
        }
        writeln!(file, "{}", record.to_line())?;
        tracing::info!(log = %self.path.display(), "Calibration recorded");
        Ok(())
    }

    /// Most recent record, or `None` when the log does not exist or holds no records.
    pub fn latest(&self) -> AppResult<Option<CalibrationRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        let last = text
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .last();
        let Some((index, line)) = last else {
            return Ok(None);
        };
        line.parse()
            .map(Some)
            .map_err(|reason| LabError::MalformedTable {
                path: self.path.clone(),
                line: index + 1,
                reason,
            })
    }
}
