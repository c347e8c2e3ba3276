use clap::Parser;

use powerscan_config::{ScanConfig, toml_config};
use powerscan_core::{Frequency, debug, frequency_from_str};
use powerscan_core::freqs::to_mhz;
use powerscan_engine::radio::soapy::{self, SoapyRadio};
use powerscan_engine::{
    Publisher, RadioReceiver, Scanner, SignalMonitor, SpectrumAccumulator, plan,
};

#[derive(Parser, Debug)]
#[command(
    name = "powerscan",
    version = powerscan_core::STACK_VERSION,
    about = "Wideband power spectrum scanner",
    long_about = "Sweeps an SDR receiver across a frequency range and accumulates \
                  a single power spectrum, optionally published over HTTP"
)]
struct Args {
    /// Verbose logging to stderr
    #[arg(short = 'v')]
    verbose: bool,

    /// SoapySDR device string (e.g. "driver=rtlsdr"); "help" lists devices
    #[arg(short = 'd')]
    device: Option<String>,

    /// RX channel index
    #[arg(short = 'C')]
    channel: Option<usize>,

    /// RX gain in dB
    #[arg(short = 'g')]
    gain: Option<f64>,

    /// Start frequency, e.g. "88M"
    #[arg(short = 's', value_parser = frequency_from_str)]
    start: Option<Frequency>,

    /// End frequency (default: one receiver bandwidth centered on start)
    #[arg(short = 'e', value_parser = frequency_from_str)]
    end: Option<Frequency>,

    /// Frequency resolution per bin (default: derived from the sample rate)
    #[arg(short = 'r', value_parser = frequency_from_str)]
    resolution: Option<Frequency>,

    /// Sample-rate upper limit (default: unlimited)
    #[arg(short = 'R', value_parser = frequency_from_str)]
    rate_limit: Option<Frequency>,

    /// Crop ratio: fraction of each tuning discarded at the edges (0-0.6)
    #[arg(short = 'c')]
    crop: Option<f64>,

    /// Wall-time target for one full sweep, in seconds
    #[arg(short = 't')]
    scan_time: Option<f64>,

    /// Run a single sweep and exit
    #[arg(short = '1')]
    single: bool,

    /// Number of sweeps to run (0 = continuous)
    #[arg(short = 'l')]
    limit: Option<u32>,

    /// HTTP port for the live spectrum (0 = no server)
    #[arg(short = 'w')]
    web_port: Option<u16>,

    /// TOML preset file; explicit flags take precedence
    #[arg(short = 'f')]
    preset: Option<String>,
}

fn build_config(args: &Args) -> Result<ScanConfig, String> {
    let mut cfg = ScanConfig::default();
    cfg.verbose = args.verbose;
    if let Some(ref device) = args.device {
        cfg.sdr_name = device.clone();
    }
    if let Some(channel) = args.channel {
        cfg.sdr_channel = channel;
    }
    if let Some(gain) = args.gain {
        cfg.gain_db = gain;
    }
    if let Some(start) = args.start {
        cfg.start_frequency = start;
    }
    if let Some(end) = args.end {
        cfg.end_frequency = end;
    }
    if let Some(resolution) = args.resolution {
        cfg.frequency_resolution = resolution;
    }
    if let Some(cap) = args.rate_limit {
        cfg.requested_sample_rate_cap = cap;
    }
    if let Some(crop) = args.crop {
        cfg.crop_ratio = crop;
    }
    if let Some(scan_time) = args.scan_time {
        cfg.scan_time_s = scan_time;
    }
    if let Some(limit) = args.limit {
        cfg.repetition_limit = limit;
    }
    if let Some(port) = args.web_port {
        cfg.web_port = port;
    }

    if let Some(ref path) = args.preset {
        let preset = toml_config::from_file(path)
            .map_err(|err| format!("failed to load preset {}: {}", path, err))?;
        preset.apply_to(&mut cfg);
    }

    // -1 wins over any sweep count
    if args.single {
        cfg.repetition_limit = 1;
    }

    if cfg.start_frequency <= 0 {
        return Err("missing start frequency (-s); try 'powerscan -h'".to_string());
    }
    Ok(cfg)
}

fn setup_radio(
    radio: &mut SoapyRadio,
    config: &ScanConfig,
    plan: &powerscan_engine::ScanPlan,
) -> Result<(), powerscan_engine::RadioError> {
    radio.set_sample_rate(plan.sample_rate as f64)?;
    radio.set_gain(config.gain_db)?;
    radio.activate()
}

fn list_devices() -> i32 {
    match soapy::enumerate() {
        Ok(devices) if devices.is_empty() => {
            eprintln!("No SoapySDR devices found");
            0
        }
        Ok(devices) => {
            eprintln!("Available SDR devices:");
            for device in devices {
                eprintln!("  {}", device);
            }
            0
        }
        Err(err) => {
            eprintln!("Device enumeration failed: {}", err);
            1
        }
    }
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let args = Args::parse();
    let _log_guard = debug::setup_logging_default(args.verbose, None);

    eprintln!("powerscan {}", powerscan_core::STACK_VERSION);

    if args.device.as_deref() == Some("help") {
        return list_devices();
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{}", err);
            return 2;
        }
    };

    let mut radio = match SoapyRadio::open(&config.sdr_name, config.sdr_channel) {
        Ok(radio) => radio,
        Err(err) => {
            tracing::error!("{}", err);
            return 1;
        }
    };

    let plan = match plan::plan(&config, radio.device_info()) {
        Ok(plan) => plan,
        Err(err) => {
            tracing::error!("{}", err);
            radio.shutdown();
            return 2;
        }
    };
    tracing::info!(
        "scanning {:.6} - {:.6} MHz: {} tunings of {:.6} MHz, {} Hz/bin, fft {}, dwell {} ms",
        to_mhz(plan.start_frequency),
        to_mhz(plan.end_frequency),
        plan.tuning_count,
        to_mhz(plan.tuning_bandwidth),
        plan.frequency_resolution,
        plan.fft_size,
        plan.dwell_time_us / 1_000,
    );

    if let Err(err) = setup_radio(&mut radio, &config, &plan) {
        tracing::error!("device setup failed: {}", err);
        radio.shutdown();
        return 1;
    }

    let spectrum = SpectrumAccumulator::shared(&plan);

    let mut publisher = None;
    if config.web_port != 0 {
        match Publisher::spawn(config.web_port, &config.web_root, &plan, spectrum.clone()) {
            Ok(p) => publisher = Some(p),
            Err(err) => {
                tracing::error!("failed to start web server on port {}: {}", config.web_port, err);
                radio.shutdown();
                return 1;
            }
        }
    }

    let signals = SignalMonitor::new();
    if let Err(err) = signals.install() {
        tracing::warn!("failed to install signal handler: {}", err);
    }

    let mut scanner = Scanner::new(&plan, config.repetition_limit, spectrum.clone(), signals);
    let exit_code = match scanner.run(&mut radio) {
        Ok(outcome) => {
            tracing::info!(
                "scan {:?}, {} frames accumulated",
                outcome,
                spectrum.read().unwrap().accumulation_count()
            );
            0
        }
        Err(err) => {
            tracing::error!("scan failed: {}", err);
            1
        }
    };

    if let Some(mut publisher) = publisher {
        publisher.stop();
    }
    radio.shutdown();
    exit_code
}
