//! Cross-tuning power accumulation.
//!
//! Each completed FFT frame contributes its retained bins into one global
//! array spanning the planned band. The array is shared with the publisher
//! behind a reader-writer lock; the writer holds the lock only while adding
//! one frame's bins.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use powerscan_core::Frequency;

use crate::dsp_types::RealSample;
use crate::plan::ScanPlan;

pub type SharedSpectrum = Arc<RwLock<SpectrumAccumulator>>;

pub struct SpectrumAccumulator {
    start_frequency: Frequency,
    frequency_resolution: Frequency,
    tuning_bandwidth: Frequency,
    fft_size: usize,
    power_accumulation: Vec<RealSample>,
    accumulation_count: u64,
}

/// Copy of the accumulator taken under the read lock, ready to serve.
#[derive(Debug, Clone, Serialize)]
pub struct SpectrumSnapshot {
    pub start_frequency: Frequency,
    pub frequency_resolution: Frequency,
    pub accumulation_count: u64,
    /// Per-bin power, averaged over `accumulation_count` frames
    pub power: Vec<RealSample>,
}

impl SpectrumAccumulator {
    pub fn new(plan: &ScanPlan) -> Self {
        Self {
            start_frequency: plan.start_frequency,
            frequency_resolution: plan.frequency_resolution,
            tuning_bandwidth: plan.tuning_bandwidth,
            fft_size: plan.fft_size,
            power_accumulation: vec![0.0; plan.power_buckets],
            accumulation_count: 0,
        }
    }

    pub fn shared(plan: &ScanPlan) -> SharedSpectrum {
        Arc::new(RwLock::new(Self::new(plan)))
    }

    /// Add one FFT frame taken at `center_frequency`.
    ///
    /// `magnitudes` is in DC-centered natural order (`[DC, +f1 .. +fmax,
    /// -fmax .. -f1]`) with the DC entry zeroed. Frames whose retained bins
    /// would fall outside the planned band are dropped whole; this is the
    /// expected outcome at sweep edges and during shutdown. Returns whether
    /// the frame was accumulated.
    pub fn add_frame(&mut self, center_frequency: Frequency, magnitudes: &[RealSample]) -> bool {
        debug_assert_eq!(magnitudes.len(), self.fft_size);

        let lowest_retained = center_frequency - self.tuning_bandwidth / 2;
        let lowest_bin =
            (lowest_retained - self.start_frequency).div_euclid(self.frequency_resolution);
        let retained_bin_count = (self.tuning_bandwidth / self.frequency_resolution) as usize;

        if lowest_bin < 0
            || lowest_bin as usize + retained_bin_count > self.power_accumulation.len()
        {
            return false;
        }
        let lowest_bin = lowest_bin as usize;

        // Baseband offset of the first retained bin, in bins (negative:
        // the retained band starts below the tuning's center).
        let base = nearest_bin(lowest_retained - center_frequency, self.frequency_resolution);
        let half = (self.fft_size / 2) as i64;

        for j in 0..retained_bin_count {
            let offset = base + j as i64;
            if offset == 0 || offset < -half || offset >= half {
                // Center bin carries no information (DC dropped); offsets
                // beyond Nyquist cannot occur for a sane plan.
                continue;
            }
            let k = if offset > 0 {
                offset as usize
            } else {
                (offset + self.fft_size as i64) as usize
            };
            self.power_accumulation[lowest_bin + j] += magnitudes[k];
        }

        self.accumulation_count += 1;
        true
    }

    /// Forget everything accumulated so far. Never called between sweep
    /// repetitions by the scan loop itself; long scans converge toward a
    /// stable noise floor.
    pub fn reset(&mut self) {
        self.power_accumulation.fill(0.0);
        self.accumulation_count = 0;
    }

    pub fn accumulation_count(&self) -> u64 {
        self.accumulation_count
    }

    pub fn power(&self) -> &[RealSample] {
        &self.power_accumulation
    }

    /// Averaged copy for the publisher.
    pub fn snapshot(&self) -> SpectrumSnapshot {
        let scale = if self.accumulation_count > 0 {
            1.0 / self.accumulation_count as RealSample
        } else {
            0.0
        };
        SpectrumSnapshot {
            start_frequency: self.start_frequency,
            frequency_resolution: self.frequency_resolution,
            accumulation_count: self.accumulation_count,
            power: self.power_accumulation.iter().map(|&p| p * scale).collect(),
        }
    }

    /// Largest averaged bin, as (frequency, value). None until something
    /// has been accumulated.
    pub fn peak(&self) -> Option<(Frequency, RealSample)> {
        if self.accumulation_count == 0 {
            return None;
        }
        self.power_accumulation
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, &value)| {
                (
                    self.start_frequency + bin as Frequency * self.frequency_resolution,
                    value / self.accumulation_count as RealSample,
                )
            })
    }
}

/// Nearest bin number for a baseband offset in Hz.
fn nearest_bin(offset_hz: Frequency, resolution: Frequency) -> i64 {
    (2 * offset_hz + resolution).div_euclid(2 * resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ScanPlan;

    fn test_plan() -> ScanPlan {
        // One tuning, no crop: 64 buckets of 1 kHz under a 64-point FFT
        ScanPlan {
            start_frequency: 100_000_000,
            end_frequency: 100_064_000,
            frequency_resolution: 1_000,
            sample_rate: 64_000,
            crop_ratio: 0.0,
            tuning_bandwidth: 64_000,
            tuning_start: 100_032_000,
            tuning_count: 1,
            dwell_time_us: 100_000,
            fft_size: 64,
            power_buckets: 64,
        }
    }

    fn ramp_frame(fft_size: usize) -> Vec<RealSample> {
        // Distinct value per bin so reordering mistakes are visible
        let mut frame: Vec<RealSample> = (0..fft_size).map(|k| k as RealSample).collect();
        frame[0] = 0.0;
        frame
    }

    #[test]
    fn test_accumulator_linearity() {
        let plan = test_plan();
        let mut acc = SpectrumAccumulator::new(&plan);
        let frame = ramp_frame(plan.fft_size);

        let n = 7;
        for _ in 0..n {
            assert!(acc.add_frame(plan.tuning_start, &frame));
        }
        assert_eq!(acc.accumulation_count(), n);

        let mut single = SpectrumAccumulator::new(&plan);
        single.add_frame(plan.tuning_start, &frame);
        for (many, one) in acc.power().iter().zip(single.power().iter()) {
            assert!((many - one * n as RealSample).abs() <= 1e-3 * one.abs().max(1.0));
        }
    }

    #[test]
    fn test_bin_reordering() {
        let plan = test_plan();
        let mut acc = SpectrumAccumulator::new(&plan);
        acc.add_frame(plan.tuning_start, &ramp_frame(plan.fft_size));

        // Bucket j holds the bin at offset (j - 32) kHz from the center.
        // Negative offsets come from the upper half of the FFT output.
        let power = acc.power();
        assert_eq!(power[0], 32.0); // -32 kHz -> k = 64 - 32
        assert_eq!(power[31], 63.0); // -1 kHz -> k = 63
        assert_eq!(power[32], 0.0); // center: DC dropped
        assert_eq!(power[33], 1.0); // +1 kHz -> k = 1
        assert_eq!(power[63], 31.0); // +31 kHz -> k = 31
    }

    #[test]
    fn test_edge_drop() {
        let plan = test_plan();
        let mut acc = SpectrumAccumulator::new(&plan);
        let frame = ramp_frame(plan.fft_size);

        // Center so low that lowest_bin goes negative
        assert!(!acc.add_frame(plan.start_frequency, &frame));
        // Center so high that the frame overruns the last bucket
        assert!(!acc.add_frame(plan.end_frequency, &frame));

        assert_eq!(acc.accumulation_count(), 0);
        assert!(acc.power().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_reset() {
        let plan = test_plan();
        let mut acc = SpectrumAccumulator::new(&plan);
        acc.add_frame(plan.tuning_start, &ramp_frame(plan.fft_size));
        assert!(acc.accumulation_count() > 0);

        acc.reset();
        assert_eq!(acc.accumulation_count(), 0);
        assert!(acc.power().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_snapshot_averages() {
        let plan = test_plan();
        let mut acc = SpectrumAccumulator::new(&plan);
        let frame = ramp_frame(plan.fft_size);
        acc.add_frame(plan.tuning_start, &frame);
        acc.add_frame(plan.tuning_start, &frame);

        let snapshot = acc.snapshot();
        assert_eq!(snapshot.accumulation_count, 2);
        assert_eq!(snapshot.power.len(), plan.power_buckets);
        assert_eq!(snapshot.power[33], 1.0);

        let (peak_freq, peak_value) = acc.peak().unwrap();
        assert_eq!(peak_freq, plan.start_frequency + 31_000);
        assert_eq!(peak_value, 63.0);
    }

    #[test]
    fn test_crop_keeps_outer_bins_untouched() {
        // 25% crop: a 48 kHz slice of the 64 kHz digitised band is retained
        let mut plan = test_plan();
        plan.crop_ratio = 0.25;
        plan.tuning_bandwidth = 48_000;
        plan.end_frequency = plan.start_frequency + 48_000;
        plan.power_buckets = 48;
        plan.tuning_start = plan.start_frequency + 24_000;

        let mut acc = SpectrumAccumulator::new(&plan);
        assert!(acc.add_frame(plan.tuning_start, &ramp_frame(plan.fft_size)));

        let power = acc.power();
        assert_eq!(power.len(), 48);
        // Offsets run -24 kHz .. +23 kHz; the cropped |offset| > 24 kHz
        // region of the FFT output (k in 25..=39) never lands anywhere.
        assert_eq!(power[0], 40.0); // -24 kHz -> k = 40
        assert_eq!(power[24], 0.0); // center
        assert_eq!(power[47], 23.0); // +23 kHz -> k = 23
    }
}
