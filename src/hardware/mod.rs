//! Instrument abstractions.
//!
//! Capability traits live in [`capabilities`]; [`mock`] provides the simulated bench.
pub mod capabilities;
pub mod mock;

pub use capabilities::{IqChannel, IqModulator, Sideband, SidebandPowers, SpectrumAnalyzer};
pub use mock::{simulated_bench, MixerSettings, SimulatedAnalyzer, SimulatedModulator, SimulationParams};
