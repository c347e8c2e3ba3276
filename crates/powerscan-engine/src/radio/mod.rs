//! Capability surface over the SDR driver.
//!
//! The scan engine only ever talks to a [`RadioReceiver`]; the SoapySDR
//! implementation lives in [`soapy`] and tests substitute a mock device.

pub mod soapy;

use core::fmt;

use powerscan_core::Frequency;

use crate::dsp_types::RawIq;

/// Timeout for blocking driver calls, in microseconds.
pub const READ_TIMEOUT_US: i64 = 1_000_000;

#[derive(Debug)]
pub enum RadioError {
    /// No device matched the requested device string.
    DeviceNotFound(String),
    /// The requested RX channel does not exist on the device.
    InvalidChannel { requested: usize, available: usize },
    /// The driver rejected a setup or control call.
    Driver(soapysdr::Error),
    /// A single read failed or timed out. Recoverable: the tuner retries,
    /// the scan loop abandons the current tuning.
    Read,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioError::DeviceNotFound(name) => write!(f, "SDR device not found: '{}'", name),
            RadioError::InvalidChannel { requested, available } => {
                write!(f, "RX channel {} out of range ({} available)", requested, available)
            }
            RadioError::Driver(err) => write!(f, "SDR driver error: {}", err),
            RadioError::Read => write!(f, "SDR read failed"),
        }
    }
}

impl std::error::Error for RadioError {}

impl From<soapysdr::Error> for RadioError {
    fn from(err: soapysdr::Error) -> Self {
        RadioError::Driver(err)
    }
}

/// Capabilities of the opened device, filled once at open time except for
/// the chosen sample rate, which is updated when the rate is set.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Number of RX channels on the device
    pub channel_count: usize,
    /// Sample rates the device advertises, in Hz, ascending
    pub sample_rates: Vec<f64>,
    /// Sample rate currently configured (the rate the driver actually
    /// achieved, read back after setting). 0 until first set.
    pub sample_rate: f64,
    /// Native stream format descriptor, e.g. "CS16"
    pub stream_format: String,
}

/// Result of one blocking stream read.
#[derive(Debug, Clone, Copy)]
pub struct ReadBlock {
    /// Number of I/Q pairs written into the caller's buffer
    pub pairs: usize,
    /// Driver timestamp of the block, if the device has hardware time.
    /// Callers substitute the monotonic clock when absent.
    pub timestamp_ns: Option<i64>,
}

/// A tunable RX-only SDR. All calls are synchronous; reads block for at
/// most [`READ_TIMEOUT_US`].
pub trait RadioReceiver {
    fn device_info(&self) -> &DeviceInfo;

    /// Set the RX sample rate; returns the rate the driver achieved.
    fn set_sample_rate(&mut self, rate: f64) -> Result<f64, RadioError>;

    fn set_gain(&mut self, gain_db: f64) -> Result<(), RadioError>;

    fn set_frequency(&mut self, frequency: Frequency) -> Result<(), RadioError>;

    /// Set up and activate the RX stream. Idempotent.
    fn activate(&mut self) -> Result<(), RadioError>;

    /// Read up to `buffer.len()` sample pairs.
    fn read(&mut self, buffer: &mut [RawIq]) -> Result<ReadBlock, RadioError>;

    /// Deactivate the stream and release the device.
    fn shutdown(&mut self);
}
