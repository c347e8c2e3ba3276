use std::f64::consts::PI;

use powerscan_core::Frequency;
use powerscan_engine::dsp_types::RawIq;
use powerscan_engine::radio::{DeviceInfo, RadioError, RadioReceiver, ReadBlock};

/// Deterministic stand-in for SDR hardware.
///
/// Synthesises either full-scale DC or a pure tone at a fixed baseband
/// offset from whatever frequency is currently tuned, with timestamps
/// advancing at the configured sample rate. The clock starts far enough in
/// the future that the tuner's flush clamp never interferes with test
/// arithmetic.
pub struct MockRadio {
    info: DeviceInfo,
    frequency: Frequency,
    tone_offset_hz: Option<f64>,
    amplitude: f64,
    sample_index: u64,
    clock_ns: i64,
    reads: usize,
    /// Called with the 1-based read number before samples are produced.
    /// Lets tests raise interrupts at a precise point in the scan.
    pub on_read: Option<Box<dyn FnMut(usize) + Send>>,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            info: DeviceInfo {
                channel_count: 1,
                sample_rates: vec![sample_rate],
                sample_rate,
                stream_format: "CS16".to_string(),
            },
            frequency: 0,
            tone_offset_hz: None,
            amplitude: 16384.0,
            sample_index: 0,
            clock_ns: 3_600_000_000_000,
            reads: 0,
            on_read: None,
        }
    }

    /// Emit a tone at `offset_hz` from the tuned center instead of DC.
    pub fn with_tone(mut self, offset_hz: f64) -> Self {
        self.tone_offset_hz = Some(offset_hz);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn tuned_frequency(&self) -> Frequency {
        self.frequency
    }
}

impl RadioReceiver for MockRadio {
    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<f64, RadioError> {
        self.info.sample_rate = rate;
        Ok(rate)
    }

    fn set_gain(&mut self, _gain_db: f64) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_frequency(&mut self, frequency: Frequency) -> Result<(), RadioError> {
        self.frequency = frequency;
        Ok(())
    }

    fn activate(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    fn read(&mut self, buffer: &mut [RawIq]) -> Result<ReadBlock, RadioError> {
        self.reads += 1;
        let reads = self.reads;
        if let Some(on_read) = self.on_read.as_mut() {
            on_read(reads);
        }

        let rate = self.info.sample_rate;
        match self.tone_offset_hz {
            Some(offset_hz) => {
                for slot in buffer.iter_mut() {
                    let phase = 2.0 * PI * offset_hz * self.sample_index as f64 / rate;
                    *slot = RawIq::new(
                        (self.amplitude * phase.cos()).round() as i16,
                        (self.amplitude * phase.sin()).round() as i16,
                    );
                    self.sample_index += 1;
                }
            }
            None => {
                let level = self.amplitude as i16;
                for slot in buffer.iter_mut() {
                    *slot = RawIq::new(level, 0);
                    self.sample_index += 1;
                }
            }
        }

        let timestamp_ns = self.clock_ns;
        self.clock_ns += (buffer.len() as f64 * 1e9 / rate) as i64;
        Ok(ReadBlock {
            pairs: buffer.len(),
            timestamp_ns: Some(timestamp_ns),
        })
    }

    fn shutdown(&mut self) {}
}
