//! SoapySDR implementation of the radio facade.

use powerscan_core::{Frequency, freqs::to_mhz};

use crate::dsp_types::RawIq;

use super::{DeviceInfo, RadioError, RadioReceiver, ReadBlock, READ_TIMEOUT_US};

/// It is annoying to repeat error handling so do that in a macro.
/// ? could be used but then it could not print which SoapySDR call failed.
macro_rules! soapycheck {
    ($text:literal, $soapysdr_call:expr) => {
        match $soapysdr_call {
            Ok(ret) => ret,
            Err(err) => {
                tracing::error!("SoapySDR: Failed to {}: {}", $text, err);
                return Err(RadioError::Driver(err));
            }
        }
    };
}

/// List descriptors of all devices SoapySDR can see, one string per device.
pub fn enumerate() -> Result<Vec<String>, RadioError> {
    let devices = soapysdr::enumerate("")?;
    Ok(devices.iter().map(|args| args.to_string()).collect())
}

pub struct SoapyRadio {
    channel: usize,
    info: DeviceInfo,
    /// Whether the device reports hardware time. When false, read blocks
    /// carry no timestamp and callers fall back to the monotonic clock.
    has_time: bool,
    dev: soapysdr::Device,
    /// Receive stream. None until activated.
    rx: Option<soapysdr::RxStream<RawIq>>,
}

impl SoapyRadio {
    /// Open a device by SoapySDR device string (e.g. "driver=rtlsdr").
    /// An empty string lets SoapySDR pick the first available device.
    pub fn open(name: &str, channel: usize) -> Result<Self, RadioError> {
        let dev = match soapysdr::Device::new(name) {
            Ok(dev) => dev,
            Err(err) => {
                tracing::error!("SoapySDR: Failed to open device '{}': {}", name, err);
                return Err(RadioError::DeviceNotFound(name.to_string()));
            }
        };

        let driver_key = dev.driver_key().unwrap_or_default();
        let hardware_key = dev.hardware_key().unwrap_or_default();

        let channel_count = soapycheck!("query RX channel count",
            dev.num_channels(soapysdr::Direction::Rx));
        if channel >= channel_count {
            return Err(RadioError::InvalidChannel {
                requested: channel,
                available: channel_count,
            });
        }

        let ranges = soapycheck!("list RX sample rates",
            dev.get_sample_rate_range(soapysdr::Direction::Rx, channel));
        let mut sample_rates = Vec::new();
        for range in &ranges {
            if range.minimum > 0.0 {
                sample_rates.push(range.minimum);
            }
            if range.maximum > range.minimum {
                sample_rates.push(range.maximum);
            }
        }
        sample_rates.sort_by(|a, b| a.total_cmp(b));
        sample_rates.dedup();

        tracing::info!(
            "Opened '{}' ({}), {} RX channel(s), rates {:?}",
            driver_key, hardware_key, channel_count, sample_rates
        );

        Ok(Self {
            channel,
            info: DeviceInfo {
                channel_count,
                sample_rates,
                sample_rate: 0.0,
                stream_format: "CS16".to_string(),
            },
            has_time: dev.has_hardware_time(None).unwrap_or(false),
            dev,
            rx: None,
        })
    }
}

impl RadioReceiver for SoapyRadio {
    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<f64, RadioError> {
        soapycheck!("set RX sample rate",
            self.dev.set_sample_rate(soapysdr::Direction::Rx, self.channel, rate));
        // Read the actual sample rate obtained and store it
        // to avoid having to read it again every time it is needed.
        let achieved = soapycheck!("get RX sample rate",
            self.dev.sample_rate(soapysdr::Direction::Rx, self.channel));
        self.info.sample_rate = achieved;
        Ok(achieved)
    }

    fn set_gain(&mut self, gain_db: f64) -> Result<(), RadioError> {
        soapycheck!("set RX gain",
            self.dev.set_gain(soapysdr::Direction::Rx, self.channel, gain_db));
        Ok(())
    }

    fn set_frequency(&mut self, frequency: Frequency) -> Result<(), RadioError> {
        soapycheck!("set RX center frequency",
            self.dev.set_frequency(
                soapysdr::Direction::Rx,
                self.channel,
                frequency as f64,
                soapysdr::Args::new(),
            ));
        tracing::debug!("tuned to {:.6} MHz", to_mhz(frequency));
        Ok(())
    }

    fn activate(&mut self) -> Result<(), RadioError> {
        if self.rx.is_none() {
            let mut rx = soapycheck!("setup RX stream",
                self.dev.rx_stream::<RawIq>(&[self.channel]));
            soapycheck!("activate RX stream", rx.activate(None));
            self.rx = Some(rx);
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [RawIq]) -> Result<ReadBlock, RadioError> {
        let rx = self.rx.as_mut().ok_or(RadioError::Read)?;
        match rx.read(&mut [buffer], READ_TIMEOUT_US) {
            Ok(pairs) => {
                let timestamp_ns = if self.has_time { Some(rx.time_ns()) } else { None };
                Ok(ReadBlock { pairs, timestamp_ns })
            }
            Err(err) => {
                tracing::debug!("SoapySDR: read failed: {}", err);
                Err(RadioError::Read)
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            if let Err(err) = rx.deactivate(None) {
                tracing::warn!("SoapySDR: Failed to deactivate RX stream: {}", err);
            }
        }
    }
}
