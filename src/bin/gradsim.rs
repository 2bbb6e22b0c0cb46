//! Simulate a sequence and write the produced series as text files.
//!
//! Usage: `gradsim <xml> [--config FILE] [--data-type T] [--output-mode M] [--verbose N] [--out DIR]`

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info};
use serde::de::DeserializeOwned;

use gradsim::{DataType, OutputMode, RunConfig, Simulator, Storage, Verbosity};

#[derive(Parser, Debug)]
#[command(name = "gradsim")]
#[command(about = "Simulate gradient, k-space, slew rate or eddy current waveforms of a sequence")]
struct Args {
    /// Root instruction document
    xml: PathBuf,

    /// JSON run configuration, including the decay coefficients
    #[arg(long)]
    config: Option<PathBuf>,

    /// gradient, kspace, slew_rate, eddy_current or eddy_phase
    #[arg(long, value_parser = parse_enum::<DataType>)]
    data_type: Option<DataType>,

    /// full or interpolated_to_rx
    #[arg(long, value_parser = parse_enum::<OutputMode>)]
    output_mode: Option<OutputMode>,

    /// Verbosity bit flags
    #[arg(long)]
    verbose: Option<u32>,

    /// Read the gradients from the DSV files next to the document instead
    #[arg(long)]
    dsv: bool,

    /// Output directory, defaults to the directory of the document
    #[arg(long = "out")]
    out_dir: Option<PathBuf>,
}

fn parse_enum<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_owned())).map_err(|e| e.to_string())
}

fn load_config(args: &Args) -> Result<RunConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            serde_json::from_str(&text).map_err(|e| format!("Invalid config {}: {e}", path.display()))?
        }
        None => RunConfig::default(),
    };
    if let Some(data_type) = args.data_type {
        config.data_type = data_type;
    }
    if let Some(output_mode) = args.output_mode {
        config.output_mode = output_mode;
    }
    if let Some(bits) = args.verbose {
        config.verbosity = Verbosity(bits);
    }
    Ok(config)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let mut simulator = Simulator::new(config);
    let result = if args.dsv {
        simulator.run_dsv(&args.xml)
    } else {
        simulator.run_file(&args.xml, Storage::SelfOwned)
    };
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            error!("Simulation of {} failed: {e}", args.xml.display());
            process::exit(1);
        }
    };

    let out_dir = args
        .out_dir
        .clone()
        .or_else(|| args.xml.parent().map(PathBuf::from))
        .unwrap_or_default();
    let stem = args
        .xml
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sequence".to_owned());

    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        error!("Failed to create {}: {e}", out_dir.display());
        process::exit(1);
    }
    match output.write_to_dir(&out_dir, &stem) {
        Ok(files) => info!("Wrote {} files to {}", files.len(), out_dir.display()),
        Err(e) => {
            error!("Failed to write output: {e}");
            process::exit(1);
        }
    }
}
