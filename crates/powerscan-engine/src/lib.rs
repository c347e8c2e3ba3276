//! powerscan scan engine
//!
//! Plans a sweep over the requested band, drives the SDR through the
//! per-tuning retune/dwell cycle, transforms sample blocks to magnitude
//! frames and accumulates them into one wide spectrum, which the embedded
//! HTTP publisher serves concurrently.

pub mod accumulator;
pub mod dsp_types;
pub mod fft;
pub mod plan;
pub mod radio;
pub mod scan;
pub mod signal;
pub mod tuner;
pub mod web;

// Re-export commonly used items
pub use accumulator::{SharedSpectrum, SpectrumAccumulator, SpectrumSnapshot};
pub use plan::{PlanError, ScanPlan, plan};
pub use radio::{DeviceInfo, RadioError, RadioReceiver, ReadBlock};
pub use scan::{ScanOutcome, Scanner};
pub use signal::SignalMonitor;
pub use web::Publisher;
