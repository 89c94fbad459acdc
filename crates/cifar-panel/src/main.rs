//! CIFAR Panel
//!
//! Classifies the first images of a CIFAR-10 batch and shows each image with
//! its predicted label and confidence on the LCD panel.

mod config;
mod dataset;
mod prediction;
mod runner;

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use cifar_panel_hw::{LcdPanel, StdDelay};
use cifar_panel_infer::{
    export_model, CifarNetConfig, CpuBackend, Model, ModelHeader, SCHEMA_VERSION,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use dataset::Dataset;
use runner::{prepare_interpreter, FaultPolicy, Runner};

/// Configuration file read when `--config` is not given.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Parser)]
#[command(name = "cifar-panel")]
#[command(about = "Show CIFAR-10 classifier predictions on an LCD panel")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: config/default.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the dataset and show each result on the panel (default)
    Run(RunArgs),
    /// Write a freshly initialized model container
    InitModel {
        /// Output file path
        #[arg(long, default_value = "models/cifar10.cpnm")]
        out: PathBuf,

        /// Seed for weight initialization
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Schema version written to the header
        #[arg(long, default_value_t = SCHEMA_VERSION)]
        schema_version: u32,
    },
    /// Print a model container's header
    Inspect {
        /// Model file path
        model: PathBuf,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Model file (overrides config)
    #[arg(long)]
    model: Option<PathBuf>,

    /// CIFAR-10 binary batch (overrides config)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Directory for per-image PNG snapshots
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Skip the hold time after each image
    #[arg(long)]
    no_pause: bool,

    /// Fault handling (overrides config)
    #[arg(long, value_enum)]
    fault_policy: Option<FaultPolicy>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => handle_run(config, args),
        Commands::InitModel {
            out,
            seed,
            schema_version,
        } => handle_init_model(&out, seed, schema_version),
        Commands::Inspect { model } => handle_inspect(&model),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Loads the given config file, or the default one if it exists.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            info!("Loaded configuration from: {}", path.display());
            Ok(config)
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let config = Config::load(DEFAULT_CONFIG_PATH)?;
            info!("Loaded configuration from: {}", DEFAULT_CONFIG_PATH);
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn handle_run(mut config: Config, args: RunArgs) -> Result<()> {
    if let Some(model) = args.model {
        config.model.path = model;
    }
    if let Some(dataset) = args.dataset {
        config.dataset.path = dataset;
    }
    if let Some(dir) = args.snapshots {
        config.display.snapshot_dir = Some(dir);
    }
    if let Some(policy) = args.fault_policy {
        config.model.fault_policy = policy;
    }
    if args.no_pause {
        config.display.pause_ms = 0;
    }

    let model_bytes = std::fs::read(&config.model.path)
        .with_context(|| format!("Failed to read model {}", config.model.path.display()))?;
    let mut interpreter = prepare_interpreter::<CpuBackend>(
        &model_bytes,
        config.model.arena_size,
        config.model.fault_policy,
        &Default::default(),
    )?;

    let dataset = Dataset::load(&config.dataset.path, config.dataset.count)?;
    if dataset.is_empty() {
        warn!("Dataset count is 0, nothing to classify");
    }
    let mut panel = LcdPanel::new(config.display.panel_settings()?, StdDelay);

    let mut runner = Runner::new(
        &mut interpreter,
        &mut panel,
        config.display.layout(),
        config.model.fault_policy,
    );
    let report = runner.run(&dataset)?;
    debug!("Runner finished in stage {:?}", runner.stage());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn handle_init_model(out: &Path, seed: u64, schema_version: u32) -> Result<()> {
    CpuBackend::seed(seed);
    let network = CifarNetConfig::new().init::<CpuBackend>(&Default::default());
    let header = ModelHeader {
        schema_version,
        ..ModelHeader::cifar10()
    };
    let bytes = export_model(network, header).context("Failed to encode model")?;

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, &bytes)
        .with_context(|| format!("Failed to write model {}", out.display()))?;
    println!("Wrote {} ({} bytes)", out.display(), bytes.len());
    Ok(())
}

fn handle_inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read model {}", path.display()))?;
    let model = Model::from_bytes(&bytes).context("Failed to parse model")?;

    println!("{}", serde_json::to_string_pretty(model.header())?);
    println!("Weights: {} bytes", model.weights().len());
    match model.check_schema() {
        Ok(()) => println!("Schema: supported"),
        Err(e) => println!("Schema: {}", e),
    }
    Ok(())
}
