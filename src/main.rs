use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::{Path, PathBuf};

use dramaturgy::core::config::{Config, InputFormat};
use dramaturgy::core::io::NativeStorage;
use dramaturgy::core::metadata::MetadataTable;
use dramaturgy::services::workflow::BatchRunner;

#[derive(Parser, Debug)]
#[command(name = "dramaturgy")]
#[command(about = "Scene casts, utterance counts and play statistics from annotated plays")]
struct Cli {
    /// YAML config; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    input: Option<String>,
    #[arg(long)]
    output: Option<String>,
    /// Tab-delimited metadata table
    #[arg(long)]
    metadata: Option<String>,
    /// Input format; inferred per file from its extension when absent
    #[arg(long, value_enum)]
    format: Option<InputFormat>,
    /// Take title, author and date from the metadata table for TEI plays
    #[arg(long, default_value_t = false)]
    custom_metadata: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(input) = cli.input {
        config.input_folder = input;
    }
    if let Some(output) = cli.output {
        config.output_folder = output;
    }
    if cli.metadata.is_some() {
        config.metadata_path = cli.metadata;
    }
    if cli.format.is_some() {
        config.format = cli.format;
    }
    config.custom_metadata |= cli.custom_metadata;

    config.ensure_directories()?;

    let table = match &config.metadata_path {
        Some(path) => Some(MetadataTable::load(Path::new(path))?),
        None => None,
    };

    let runner = BatchRunner::new(config, table, NativeStorage::new());
    let report = runner.run()?;

    info!("{} plays written", report.processed.len());
    if !report.failed.is_empty() {
        warn!("{} plays failed:", report.failed.len());
        for (name, reason) in &report.failed {
            warn!("  {}: {}", name, reason);
        }
    }

    Ok(())
}
