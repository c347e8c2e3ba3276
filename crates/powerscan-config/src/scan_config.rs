use powerscan_core::Frequency;

/// Maximum fraction of each tuning's bandwidth that may be cropped away.
pub const MAX_CROP_RATIO: f64 = 0.6;

/// User-facing scan parameters. Immutable once the CLI and any preset file
/// have been merged; everything derived from it lives in `ScanPlan`.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// SoapySDR device string, e.g. "driver=rtlsdr"
    pub sdr_name: String,
    /// RX channel index on the device
    pub sdr_channel: usize,
    /// Overall RX gain in dB
    pub gain_db: f64,

    /// First frequency of the requested band, in Hz. Must be positive.
    pub start_frequency: Frequency,
    /// One past the last frequency of the requested band. 0 = derive from
    /// the start frequency and the usable receiver bandwidth.
    pub end_frequency: Frequency,
    /// Width of one spectrum bin in Hz. 0 = derive from the sample rate.
    pub frequency_resolution: Frequency,
    /// Upper limit on the device sample rate. 0 = unlimited.
    pub requested_sample_rate_cap: Frequency,

    /// Number of full sweeps to run. 0 = continuous.
    pub repetition_limit: u32,
    /// Wall-time target for one full sweep, in seconds.
    pub scan_time_s: f64,
    /// Fraction of each tuning's digitised bandwidth discarded symmetrically
    /// at the edges, in [0, 0.6].
    pub crop_ratio: f64,

    /// HTTP port for the live spectrum. 0 = no server.
    pub web_port: u16,
    /// Directory served at the HTTP root.
    pub web_root: String,

    pub verbose: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sdr_name: String::new(),
            sdr_channel: 0,
            gain_db: 0.0,
            start_frequency: 0,
            end_frequency: 0,
            frequency_resolution: 0,
            requested_sample_rate_cap: 0,
            repetition_limit: 0,
            scan_time_s: 10.0,
            crop_ratio: 0.25,
            web_port: 0,
            web_root: "public".to_string(),
            verbose: false,
        }
    }
}

impl ScanConfig {
    /// Crop ratio clamped into its valid range. Non-finite input maps to 0.
    pub fn clamped_crop_ratio(&self) -> f64 {
        if self.crop_ratio.is_finite() {
            self.crop_ratio.clamp(0.0, MAX_CROP_RATIO)
        } else {
            0.0
        }
    }
}
