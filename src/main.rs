//! text-scraper - Batch OCR text extraction
//!
//! Reads every image in a directory through an external OCR engine, drops
//! low-confidence detections, groups the rest into paragraphs and writes one
//! JSON artifact per image.

mod analysis;
mod app;
mod command;
mod config;
mod storage;
mod vision;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::analysis::languages::parse_language_list;
use crate::analysis::Annotator;
use crate::app::{default_workers, run_batch, Extractor};
use crate::command::CommandSpec;
use crate::config::{AppConfig, OutputMode};
use crate::vision::{build_engine, OcrBackend};

/// text-scraper - Extract and structure text from a directory of images
#[derive(Parser, Debug)]
#[command(name = "text-scraper")]
#[command(about = "Extract text from images in a given directory")]
struct Args {
    /// Directory containing images to extract text from
    input_dir: PathBuf,

    /// Directory to save extracted text to
    output_dir: PathBuf,

    /// Language(s) to extract text in, comma-separated [default: en]
    #[arg(long)]
    lang: Option<String>,

    /// Minimum confidence level for text extraction [default: 0.5]
    #[arg(long)]
    conf: Option<f64>,

    /// Print debug information
    #[arg(long)]
    debug: bool,

    /// Output shape [default: paragraph]
    #[arg(long, value_enum)]
    mode: Option<OutputMode>,

    /// Horizontal merge threshold, relative to box height [default: 1.0]
    #[arg(long)]
    x_ths: Option<f64>,

    /// Vertical merge threshold, relative to box height [default: 0.5]
    #[arg(long)]
    y_ths: Option<f64>,

    /// Number of images processed in parallel [default: available CPUs]
    #[arg(long)]
    workers: Option<usize>,

    /// Where OCR detections come from [default: command]
    #[arg(long, value_enum)]
    ocr_backend: Option<OcrBackend>,

    /// OCR program and its leading arguments, e.g. "easyocr-json --gpu false"
    #[arg(long)]
    ocr_command: Option<String>,

    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save the effective configuration to this file
    #[arg(long)]
    save_config: Option<PathBuf>,
}

impl Args {
    /// Override configuration values with the flags that were given
    fn apply(&self, config: &mut AppConfig) {
        if let Some(lang) = &self.lang {
            config.ocr.languages = parse_language_list(lang);
        }
        if let Some(conf) = self.conf {
            config.ocr.confidence_threshold = conf;
        }
        if let Some(mode) = self.mode {
            config.batch.mode = mode;
        }
        if let Some(x_ths) = self.x_ths {
            config.clustering.x_ths = x_ths;
        }
        if let Some(y_ths) = self.y_ths {
            config.clustering.y_ths = y_ths;
        }
        if let Some(workers) = self.workers {
            config.batch.workers = Some(workers);
        }
        if let Some(backend) = self.ocr_backend {
            config.ocr.backend = backend;
        }
        if let Some(command) = &self.ocr_command {
            let mut words = command.split_whitespace();
            if let Some(program) = words.next() {
                let rest: Vec<&str> = words.collect();
                config.ocr.command = Some(CommandSpec::new(program, &rest));
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str())),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if let Some(path) = &args.save_config {
        config::save_config(&config, path)
            .with_context(|| format!("Failed to save configuration to {:?}", path))?;
        info!("Saved configuration to {:?}", path);
    }

    let engine = build_engine(&config.ocr)?;

    if !args.input_dir.is_dir() {
        bail!("Input directory {:?} does not exist", args.input_dir);
    }
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", args.output_dir))?;

    let images = storage::list_images(&args.input_dir)?;
    if images.is_empty() {
        warn!("No images found in {:?}", args.input_dir);
        return Ok(());
    }

    let annotator = Annotator::from_settings(&config.annotation, &config.ocr.languages[0]);
    let extractor = Extractor::new(engine, annotator, &config, args.output_dir.clone());

    info!(
        "Extracting text ({:?} mode, languages {:?}, confidence >= {})",
        config.batch.mode, config.ocr.languages, config.ocr.confidence_threshold
    );

    let workers = config.batch.workers.unwrap_or_else(default_workers);
    let summary = run_batch(&extractor, &images, workers);
    summary.log();

    if summary.all_failed() {
        bail!("None of the {} images could be processed", summary.total());
    }

    Ok(())
}

/// Load configuration from the given file, the default location, or defaults
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable configuration {:?}: {:#}", config_path, e),
            }
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}
