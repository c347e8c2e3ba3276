//! Scan planner: pure derivation of every per-sweep parameter from the
//! user configuration and the opened device's capabilities.

use core::fmt;

use serde::Serialize;

use powerscan_config::ScanConfig;
use powerscan_core::Frequency;

use crate::radio::DeviceInfo;

/// Shortest dwell at one tuning, in microseconds.
pub const MIN_DWELL_US: i64 = 100_000;
/// FFT size bounds. The upper bound also caps the samples one frame may need.
pub const MIN_FFT_SIZE: usize = 4;
pub const MAX_FFT_SIZE: usize = 1 << 16;

/// Everything derived from `ScanConfig` + `DeviceInfo`. Immutable once
/// planned; the publisher shares it read-only with the scan loop.
#[derive(Debug, Clone, Serialize)]
pub struct ScanPlan {
    /// First frequency of the planned band, in Hz
    pub start_frequency: Frequency,
    /// One past the last frequency of the planned band
    pub end_frequency: Frequency,
    /// Effective width of one spectrum bin, in Hz
    pub frequency_resolution: Frequency,
    /// Device sample rate the plan was computed for, in Hz
    pub sample_rate: Frequency,
    /// Effective crop ratio after clamping
    pub crop_ratio: f64,
    /// Bandwidth retained from each tuning, in Hz
    pub tuning_bandwidth: Frequency,
    /// Center frequency of the first tuning
    pub tuning_start: Frequency,
    /// Number of tunings per sweep
    pub tuning_count: u32,
    /// Acquisition time per tuning, in microseconds
    pub dwell_time_us: i64,
    /// FFT frame length, a power of two
    pub fft_size: usize,
    /// Length of the global power accumulation array
    pub power_buckets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// No positive start frequency was configured
    MissingStartFrequency,
    /// The device advertises no usable sample rate under the requested cap
    NoUsableSampleRate { cap: Frequency },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::MissingStartFrequency => {
                write!(f, "configuration: missing start frequency")
            }
            PlanError::NoUsableSampleRate { cap } => {
                write!(f, "device: no sample rate available under cap of {} Hz", cap)
            }
        }
    }
}

impl std::error::Error for PlanError {}

/// Derive a `ScanPlan`. Pure: no logging, no device calls.
pub fn plan(config: &ScanConfig, device: &DeviceInfo) -> Result<ScanPlan, PlanError> {
    let crop_ratio = config.clamped_crop_ratio();

    if config.start_frequency <= 0 {
        return Err(PlanError::MissingStartFrequency);
    }

    // Largest supported rate within the requested cap (0 = unlimited)
    let cap = config.requested_sample_rate_cap;
    let sample_rate_f = device
        .sample_rates
        .iter()
        .copied()
        .filter(|&rate| cap == 0 || rate <= cap as f64)
        .fold(0.0_f64, f64::max);
    if sample_rate_f <= 0.0 {
        return Err(PlanError::NoUsableSampleRate { cap });
    }
    let sample_rate = sample_rate_f.round() as Frequency;

    // Without a usable end frequency, scan one receiver's worth of usable
    // bandwidth centered on the requested start.
    let (start_frequency, end_frequency) =
        if config.end_frequency <= 0 || config.end_frequency <= config.start_frequency {
            let default_bw = (sample_rate_f * (1.0 - crop_ratio)).round() as Frequency;
            let start = config.start_frequency - default_bw / 2;
            (start, start + default_bw)
        } else {
            (config.start_frequency, config.end_frequency)
        };

    // Bin width: as requested, unless one FFT frame would need more than
    // MAX_FFT_SIZE samples.
    let default_resolution = (sample_rate / MAX_FFT_SIZE as Frequency).max(1);
    let requested_resolution = config.frequency_resolution;
    let frequency_resolution = if requested_resolution <= 0
        || sample_rate / requested_resolution > MAX_FFT_SIZE as Frequency
    {
        default_resolution
    } else {
        requested_resolution
    };

    let tuning_bandwidth = (sample_rate_f * (1.0 - crop_ratio)).ceil() as Frequency;
    let tuning_start = start_frequency + tuning_bandwidth / 2;

    let total_scan = (end_frequency - start_frequency) + (crop_ratio * sample_rate_f).floor() as Frequency;
    let tuning_count = (((total_scan + tuning_bandwidth - 1) / tuning_bandwidth).max(1)) as u32;

    let dwell_time_us =
        ((1_000_000.0 * config.scan_time_s / tuning_count as f64) as i64).max(MIN_DWELL_US);

    // The resolution-driven FFT size is authoritative; the resolution is
    // recomputed from the size actually used.
    let fft_size = round_up_pow2((sample_rate / frequency_resolution) as usize)
        .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE);
    let frequency_resolution = (sample_rate / fft_size as Frequency).max(1);

    let power_buckets =
        ((end_frequency - start_frequency + frequency_resolution - 1) / frequency_resolution) as usize;

    Ok(ScanPlan {
        start_frequency,
        end_frequency,
        frequency_resolution,
        sample_rate,
        crop_ratio,
        tuning_bandwidth,
        tuning_start,
        tuning_count,
        dwell_time_us,
        fft_size,
        power_buckets,
    })
}

fn round_up_pow2(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(rates: &[f64]) -> DeviceInfo {
        DeviceInfo {
            channel_count: 1,
            sample_rates: rates.to_vec(),
            sample_rate: 0.0,
            stream_format: "CS16".to_string(),
        }
    }

    fn base_config() -> ScanConfig {
        let mut cfg = ScanConfig::default();
        cfg.start_frequency = 100_000_000;
        cfg.end_frequency = 108_000_000;
        cfg
    }

    #[test]
    fn test_planner_totality() {
        // Any positive start and non-empty rate set must yield a valid plan
        let rates = [250_000.0, 1_024_000.0, 2_048_000.0, 10_000_000.0];
        for start in [1_i64, 10_000, 100_000_000, 5_900_000_000] {
            for end in [0_i64, start / 2, start + 1_000, start + 30_000_000] {
                for crop in [-1.0, 0.0, 0.25, 0.6, 2.0] {
                    for resolution in [0_i64, 1, 250, 1_000_000_000] {
                        let mut cfg = ScanConfig::default();
                        cfg.start_frequency = start;
                        cfg.end_frequency = end;
                        cfg.crop_ratio = crop;
                        cfg.frequency_resolution = resolution;
                        let plan = plan(&cfg, &device(&rates)).unwrap();
                        assert!(plan.tuning_count >= 1);
                        assert!(plan.fft_size.is_power_of_two());
                        assert!(plan.fft_size >= MIN_FFT_SIZE && plan.fft_size <= MAX_FFT_SIZE);
                        assert!(plan.power_buckets >= 1);
                        assert!(plan.frequency_resolution >= 1);
                        assert!(plan.start_frequency < plan.end_frequency);
                    }
                }
            }
        }
    }

    #[test]
    fn test_coverage_invariant() {
        for crop in [0.0, 0.1, 0.25, 0.6] {
            let mut cfg = base_config();
            cfg.crop_ratio = crop;
            let plan = plan(&cfg, &device(&[2_048_000.0])).unwrap();
            let covered = plan.tuning_count as i64 * plan.tuning_bandwidth;
            let needed = (plan.end_frequency - plan.start_frequency)
                + (crop * plan.sample_rate as f64).floor() as i64;
            assert!(covered >= needed, "covered {} < needed {}", covered, needed);
        }
    }

    #[test]
    fn test_dwell_floor() {
        let mut cfg = base_config();
        cfg.scan_time_s = 0.001;
        let rushed = plan(&cfg, &device(&[2_048_000.0])).unwrap();
        assert_eq!(rushed.dwell_time_us, MIN_DWELL_US);

        cfg.scan_time_s = 60.0;
        let unhurried = plan(&cfg, &device(&[2_048_000.0])).unwrap();
        assert!(unhurried.dwell_time_us >= MIN_DWELL_US);
        assert_eq!(
            unhurried.dwell_time_us,
            (60_000_000.0 / unhurried.tuning_count as f64) as i64
        );
    }

    #[test]
    fn test_crop_clamp() {
        let mut cfg = base_config();
        cfg.crop_ratio = 0.9;
        assert_eq!(plan(&cfg, &device(&[2_048_000.0])).unwrap().crop_ratio, 0.6);
        cfg.crop_ratio = -0.5;
        assert_eq!(plan(&cfg, &device(&[2_048_000.0])).unwrap().crop_ratio, 0.0);
    }

    #[test]
    fn test_missing_start_rejected() {
        let mut cfg = base_config();
        cfg.start_frequency = 0;
        assert!(matches!(
            plan(&cfg, &device(&[2_048_000.0])),
            Err(PlanError::MissingStartFrequency)
        ));
    }

    #[test]
    fn test_empty_rate_set_rejected() {
        let cfg = base_config();
        assert!(matches!(
            plan(&cfg, &device(&[])),
            Err(PlanError::NoUsableSampleRate { .. })
        ));
    }

    #[test]
    fn test_rate_cap() {
        let mut cfg = base_config();
        cfg.requested_sample_rate_cap = 1_500_000;
        let plan = plan(&cfg, &device(&[250_000.0, 1_024_000.0, 2_048_000.0])).unwrap();
        assert_eq!(plan.sample_rate, 1_024_000);
    }

    #[test]
    fn test_auto_end_frequency() {
        // Band of one receiver's usable bandwidth, centered on the start
        let mut cfg = base_config();
        cfg.end_frequency = 0;
        cfg.crop_ratio = 0.25;
        let plan = plan(&cfg, &device(&[2_048_000.0])).unwrap();
        let default_bw = (2_048_000.0_f64 * 0.75).round() as i64;
        assert_eq!(plan.end_frequency - plan.start_frequency, default_bw);
        let center = (plan.start_frequency + plan.end_frequency) / 2;
        assert!((center - cfg.start_frequency).abs() <= 1);
        assert_eq!(plan.tuning_count, 1);
    }

    #[test]
    fn test_resolution_drives_fft_size() {
        let mut cfg = base_config();
        cfg.end_frequency = cfg.start_frequency + 2_048_000;
        cfg.frequency_resolution = 250;
        cfg.crop_ratio = 0.0;
        let plan = plan(&cfg, &device(&[2_048_000.0])).unwrap();
        assert_eq!(plan.fft_size, 8192);
        assert_eq!(plan.frequency_resolution, 250);
        assert_eq!(plan.power_buckets, 8192);
        assert_eq!(plan.tuning_count, 1);
    }

    #[test]
    fn test_too_fine_resolution_overridden() {
        let mut cfg = base_config();
        cfg.frequency_resolution = 1;
        let plan = plan(&cfg, &device(&[10_000_000.0])).unwrap();
        // 1 Hz would need 10^7 samples per frame; falls back to the default
        assert_eq!(plan.fft_size, MAX_FFT_SIZE);
        assert_eq!(plan.frequency_resolution, 10_000_000 / MAX_FFT_SIZE as i64);
    }
}
