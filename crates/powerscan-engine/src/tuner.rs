//! Retune and post-retune flush handling.
//!
//! After the synthesizer is moved, the driver's buffers still hold samples
//! taken at the old frequency; the tuner sleeps briefly and discards reads
//! until the stream is known to carry the new tuning.

use std::time::Duration;

use powerscan_core::{ClockTime, Frequency, monotonic_micros, ns_to_micros};
use powerscan_core::freqs::to_mhz;

use crate::dsp_types::RawIq;
use crate::radio::{RadioError, RadioReceiver};

/// Settle time after a retune before any read is attempted, in microseconds.
pub const RETUNE_SLEEP_US: u64 = 5_000;
/// Largest block requested from the driver in one read, in sample pairs.
pub const MAX_SAMPLES: usize = 1 << 16;
/// Discard reads attempted before a retune is declared failed.
const FLUSH_ATTEMPTS: u32 = 3;

pub struct Tuner {
    /// Center frequency committed by the last successful retune.
    current_frequency: Option<Frequency>,
    /// Scan-clock time of the most recent read, in microseconds.
    last_time: ClockTime,
    /// Scan-clock time of the first flush read of the process.
    first_time: Option<ClockTime>,
    flush_buffer: Vec<RawIq>,
}

impl Default for Tuner {
    fn default() -> Self {
        Self::new()
    }
}

impl Tuner {
    pub fn new() -> Self {
        Self {
            current_frequency: None,
            last_time: 0,
            first_time: None,
            flush_buffer: vec![num::zero(); MAX_SAMPLES],
        }
    }

    /// Frequency the stream is currently known to carry. None while a
    /// retune is in progress or after one has failed.
    pub fn current_frequency(&self) -> Option<Frequency> {
        self.current_frequency
    }

    pub fn last_time(&self) -> ClockTime {
        self.last_time
    }

    pub fn first_time(&self) -> Option<ClockTime> {
        self.first_time
    }

    /// Record the timestamp of a dwell read.
    pub fn note_read_time(&mut self, time: ClockTime) {
        self.last_time = time;
    }

    /// Move the receiver to `frequency` and flush stale samples.
    /// Returns true once the stream is ready to dwell; on failure the
    /// tuning is abandoned and the caller advances.
    pub fn retune(&mut self, radio: &mut dyn RadioReceiver, frequency: Frequency) -> bool {
        self.current_frequency = None;

        if let Err(err) = radio.set_frequency(frequency) {
            tracing::warn!("retune to {:.6} MHz failed: {}", to_mhz(frequency), err);
            return false;
        }

        let flush_start = monotonic_micros();
        std::thread::sleep(Duration::from_micros(RETUNE_SLEEP_US));

        let mut failures = 0;
        while failures < FLUSH_ATTEMPTS {
            match radio.read(&mut self.flush_buffer) {
                Ok(block) => {
                    let time = block
                        .timestamp_ns
                        .map(ns_to_micros)
                        .unwrap_or_else(monotonic_micros);
                    // A stale driver timestamp must not eat into the dwell
                    self.last_time = time.max(flush_start);
                    if self.first_time.is_none() {
                        self.first_time = Some(self.last_time);
                    }
                    self.current_frequency = Some(frequency);
                    return true;
                }
                Err(RadioError::Read) => {
                    failures += 1;
                }
                Err(err) => {
                    tracing::warn!("flush read at {:.6} MHz failed: {}", to_mhz(frequency), err);
                    failures += 1;
                }
            }
        }

        tracing::warn!(
            "abandoning tuning at {:.6} MHz after {} failed flush reads",
            to_mhz(frequency),
            FLUSH_ATTEMPTS
        );
        false
    }
}
