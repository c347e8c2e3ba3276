//! The outer scan loop: repetitions over tunings over dwell reads.

use powerscan_core::{monotonic_micros, ns_to_micros};
use powerscan_core::freqs::to_mhz;
use rustfft::FftPlanner;

use crate::accumulator::SharedSpectrum;
use crate::dsp_types::RawIq;
use crate::fft::FftPipeline;
use crate::plan::ScanPlan;
use crate::radio::{RadioError, RadioReceiver};
use crate::signal::SignalMonitor;
use crate::tuner::{MAX_SAMPLES, Tuner};

/// How a scan run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The configured number of sweeps completed
    Completed,
    /// A first interrupt arrived; the current tuning was drained first
    Finished,
    /// A second interrupt arrived; the scan returned immediately
    Aborted,
}

pub struct Scanner {
    plan: ScanPlan,
    repetition_limit: u32,
    spectrum: SharedSpectrum,
    signals: SignalMonitor,
    tuner: Tuner,
    pipeline: FftPipeline,
    read_buffer: Vec<RawIq>,
}

impl Scanner {
    pub fn new(
        plan: &ScanPlan,
        repetition_limit: u32,
        spectrum: SharedSpectrum,
        signals: SignalMonitor,
    ) -> Self {
        let mut fft_planner = FftPlanner::new();
        Self {
            plan: plan.clone(),
            repetition_limit,
            spectrum,
            signals,
            tuner: Tuner::new(),
            pipeline: FftPipeline::new(&mut fft_planner, plan.fft_size),
            read_buffer: vec![num::zero(); MAX_SAMPLES],
        }
    }

    /// Run sweeps until the repetition limit is reached or an interrupt
    /// arrives. Device setup errors are fatal; single read failures only
    /// abandon the tuning they occur in.
    pub fn run(&mut self, radio: &mut dyn RadioReceiver) -> Result<ScanOutcome, RadioError> {
        let mut repetition = 0u32;
        loop {
            if self.repetition_limit != 0 && repetition >= self.repetition_limit {
                self.log_acquisition_time();
                return Ok(ScanOutcome::Completed);
            }
            if self.signals.level() >= 1 {
                self.log_acquisition_time();
                return Ok(ScanOutcome::Finished);
            }

            radio.set_sample_rate(self.plan.sample_rate as f64)?;

            let mut frequency = self.plan.tuning_start;
            for tuning in 0..self.plan.tuning_count {
                match self.signals.level() {
                    0 => {}
                    1 => {
                        self.log_acquisition_time();
                        return Ok(ScanOutcome::Finished);
                    }
                    _ => return Ok(ScanOutcome::Aborted),
                }

                if !self.tuner.retune(radio, frequency) {
                    // Transient trouble; skip the rest of this sweep
                    tracing::warn!(
                        "sweep {}: abandoning at tuning {}/{}",
                        repetition,
                        tuning + 1,
                        self.plan.tuning_count
                    );
                    break;
                }
                self.pipeline.reset();

                let deadline = self.tuner.last_time() + self.plan.dwell_time_us;
                while self.tuner.last_time() < deadline {
                    if self.signals.level() > 1 {
                        return Ok(ScanOutcome::Aborted);
                    }
                    if !self.acquire_one_block(radio) {
                        break;
                    }
                }

                frequency += self.plan.tuning_bandwidth;
            }

            repetition += 1;
            tracing::debug!(
                "sweep {} done, {} frames accumulated",
                repetition,
                self.spectrum.read().unwrap().accumulation_count()
            );
        }
    }

    /// Total time spent acquiring, from the first flush read of the process
    /// to the most recent read.
    fn log_acquisition_time(&self) {
        if let Some(first_time) = self.tuner.first_time() {
            let acquired_s = (self.tuner.last_time() - first_time) as f64 / 1e6;
            tracing::info!(
                "{} frames accumulated over {:.1} s of acquisition",
                self.spectrum.read().unwrap().accumulation_count(),
                acquired_s
            );
        }
    }

    /// One blocking read, fed straight into the FFT pipeline. Returns false
    /// when the tuning should be abandoned.
    fn acquire_one_block(&mut self, radio: &mut dyn RadioReceiver) -> bool {
        let frequency = match self.tuner.current_frequency() {
            Some(frequency) => frequency,
            None => return false,
        };

        match radio.read(&mut self.read_buffer) {
            Ok(block) => {
                let time = block
                    .timestamp_ns
                    .map(ns_to_micros)
                    .unwrap_or_else(monotonic_micros);
                self.tuner.note_read_time(time);

                let spectrum = &self.spectrum;
                self.pipeline.feed(&self.read_buffer[..block.pairs], |magnitudes| {
                    spectrum.write().unwrap().add_frame(frequency, magnitudes);
                });
                true
            }
            Err(err) => {
                tracing::debug!(
                    "read at {:.6} MHz failed ({}), abandoning tuning",
                    to_mhz(frequency),
                    err
                );
                false
            }
        }
    }
}
