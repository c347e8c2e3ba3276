use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;

use powerscan_core::{Frequency, frequency_from_str};

use super::scan_config::ScanConfig;

/// Build a `ScanPreset` from a TOML preset file
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ScanPreset, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut toml_str = String::new();
    reader.read_to_string(&mut toml_str)?;
    from_toml_str(&toml_str)
}

/// Build a `ScanPreset` from a TOML string
pub fn from_toml_str(toml_str: &str) -> Result<ScanPreset, Box<dyn std::error::Error>> {
    let root: TomlPresetRoot = toml::from_str(toml_str)?;

    // Various sanity checks
    let expected_config_version = "1";
    if root.config_version != expected_config_version {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, expected_config_version
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    let scan = root.scan.unwrap_or_default();
    if !scan.extra.is_empty() {
        return Err(format!("Unrecognized fields: scan::{:?}", sorted_keys(&scan.extra)).into());
    }
    let web = root.web.unwrap_or_default();
    if !web.extra.is_empty() {
        return Err(format!("Unrecognized fields: web::{:?}", sorted_keys(&web.extra)).into());
    }

    Ok(ScanPreset {
        device: scan.device,
        channel: scan.channel,
        gain_db: scan.gain_db,
        start_frequency: scan.start_frequency.map(|v| freq_value("start_frequency", &v)).transpose()?,
        end_frequency: scan.end_frequency.map(|v| freq_value("end_frequency", &v)).transpose()?,
        frequency_resolution: scan
            .frequency_resolution
            .map(|v| freq_value("frequency_resolution", &v))
            .transpose()?,
        sample_rate_cap: scan.sample_rate_cap.map(|v| freq_value("sample_rate_cap", &v)).transpose()?,
        repetition_limit: scan.repetition_limit,
        scan_time_s: scan.scan_time_s,
        crop_ratio: scan.crop_ratio,
        web_port: web.port,
        web_root: web.root,
    })
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

/// Frequencies in presets may be written as integers ("433920000") or as
/// frequency literals ("433.92M").
fn freq_value(field: &str, value: &Value) -> Result<Frequency, Box<dyn std::error::Error>> {
    match value {
        Value::Integer(hz) => Ok(*hz),
        Value::String(literal) => {
            frequency_from_str(literal).map_err(|e| format!("{}: {}", field, e).into())
        }
        other => Err(format!("{}: expected integer or frequency literal, got {}", field, other).into()),
    }
}

/// Scan parameters loaded from a preset file. Every field is optional;
/// fields the CLI sets explicitly take precedence.
#[derive(Debug, Clone, Default)]
pub struct ScanPreset {
    pub device: Option<String>,
    pub channel: Option<usize>,
    pub gain_db: Option<f64>,
    pub start_frequency: Option<Frequency>,
    pub end_frequency: Option<Frequency>,
    pub frequency_resolution: Option<Frequency>,
    pub sample_rate_cap: Option<Frequency>,
    pub repetition_limit: Option<u32>,
    pub scan_time_s: Option<f64>,
    pub crop_ratio: Option<f64>,
    pub web_port: Option<u16>,
    pub web_root: Option<String>,
}

impl ScanPreset {
    /// Fill `cfg` from the preset. Only fields still at their built-in
    /// defaults are touched; anything the caller already set wins.
    pub fn apply_to(&self, cfg: &mut ScanConfig) {
        let defaults = ScanConfig::default();
        if cfg.sdr_name == defaults.sdr_name {
            if let Some(ref v) = self.device {
                cfg.sdr_name = v.clone();
            }
        }
        if cfg.sdr_channel == defaults.sdr_channel {
            if let Some(v) = self.channel {
                cfg.sdr_channel = v;
            }
        }
        if cfg.gain_db == defaults.gain_db {
            if let Some(v) = self.gain_db {
                cfg.gain_db = v;
            }
        }
        if cfg.start_frequency == defaults.start_frequency {
            if let Some(v) = self.start_frequency {
                cfg.start_frequency = v;
            }
        }
        if cfg.end_frequency == defaults.end_frequency {
            if let Some(v) = self.end_frequency {
                cfg.end_frequency = v;
            }
        }
        if cfg.frequency_resolution == defaults.frequency_resolution {
            if let Some(v) = self.frequency_resolution {
                cfg.frequency_resolution = v;
            }
        }
        if cfg.requested_sample_rate_cap == defaults.requested_sample_rate_cap {
            if let Some(v) = self.sample_rate_cap {
                cfg.requested_sample_rate_cap = v;
            }
        }
        if cfg.repetition_limit == defaults.repetition_limit {
            if let Some(v) = self.repetition_limit {
                cfg.repetition_limit = v;
            }
        }
        if cfg.scan_time_s == defaults.scan_time_s {
            if let Some(v) = self.scan_time_s {
                cfg.scan_time_s = v;
            }
        }
        if cfg.crop_ratio == defaults.crop_ratio {
            if let Some(v) = self.crop_ratio {
                cfg.crop_ratio = v;
            }
        }
        if cfg.web_port == defaults.web_port {
            if let Some(v) = self.web_port {
                cfg.web_port = v;
            }
        }
        if cfg.web_root == defaults.web_root {
            if let Some(ref v) = self.web_root {
                cfg.web_root = v.clone();
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlPresetRoot {
    config_version: String,
    scan: Option<TomlScan>,
    web: Option<TomlWeb>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlScan {
    device: Option<String>,
    channel: Option<usize>,
    gain_db: Option<f64>,
    start_frequency: Option<Value>,
    end_frequency: Option<Value>,
    frequency_resolution: Option<Value>,
    sample_rate_cap: Option<Value>,
    repetition_limit: Option<u32>,
    scan_time_s: Option<f64>,
    crop_ratio: Option<f64>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlWeb {
    port: Option<u16>,
    root: Option<String>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}
