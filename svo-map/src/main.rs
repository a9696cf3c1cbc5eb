//! svo-map - service-order heatmap generator
//!
//! Reads one or more order spreadsheets and writes, per file:
//! - a single-day heatmap for `--date` (or for unscheduled orders)
//! - an animated heatmap of the upcoming window
//!
//! plus a combined `mmaps.html` index, into `{root}/static/temp_maps`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use svo_common::config::{default_config_path, try_load_toml_config, DEFAULT_LOG_LEVEL};
use svo_map::config::{load_config, PipelineSettings};
use svo_map::models::DateContext;
use svo_map::workflow::{pair_items, BatchRequest};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for svo-map
#[derive(Parser, Debug)]
#[command(name = "svo-map")]
#[command(about = "Heatmaps of scheduled service orders")]
#[command(version)]
struct Args {
    /// Input spreadsheet (.xlsx, .xls, .ods or .csv); repeatable
    #[arg(short, long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Day of the single-day map (YYYY-MM-DD); omit for unscheduled orders
    #[arg(short, long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// City context per input, in order; omit to use the first city in each file
    #[arg(short, long = "city")]
    cities: Vec<String>,

    /// Config file (default: ~/.config/svo-map/config.toml)
    #[arg(long, env = "SVO_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the geocode cache and generated maps
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Skip the upcoming-window maps
    #[arg(long)]
    no_rolling: bool,

    /// First day of the upcoming window (YYYY-MM-DD, default: today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

fn parse_date(text: &str) -> Result<NaiveDate, String> {
    svo_common::time::parse_iso_date(text).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().or_else(default_config_path);

    // Level from config, RUST_LOG wins
    let level = config_path
        .as_deref()
        .and_then(|p| try_load_toml_config(p).ok())
        .map(|c| c.logging.level)
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("svo_map={0},svo_common={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting svo-map v{} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let config = load_config(config_path.as_deref());
    let settings = PipelineSettings::resolve(&config, args.root_folder.clone())
        .context("Failed to initialize root folder")?;

    let mut orchestrator =
        svo_map::build_orchestrator(&settings).context("Failed to build pipeline")?;

    let date_context = args.date.map_or(DateContext::Unscheduled, DateContext::Day);
    let mut request = BatchRequest::new(pair_items(&args.inputs, &args.cities), date_context);
    request.rolling = !args.no_rolling;
    if let Some(today) = args.today {
        request.today = today;
    }

    let result = orchestrator
        .run(&request)
        .await
        .context("Batch produced no usable input")?;

    for artifact in &result.artifacts {
        println!("{}\t{}", artifact.label, artifact.path.display());
    }
    for failure in &result.failures {
        eprintln!(
            "failed\t{}\t{}\t{}",
            failure.source.display(),
            failure.error_code,
            failure.error_message
        );
    }

    if !result.has_artifacts() {
        warn!("No maps were produced");
    }

    Ok(())
}
