//! softcity CLI
//!
//! Reads an edge list (jdeps `-dotoutput` style), builds the city and prints
//! the layout as JSON on stdout. Logs go to stderr; set `RUST_LOG` to tune them.
//!
//! ```bash
//! softcity deps.dot --pretty
//! softcity deps.dot --config city.json --loads loads.json
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use softcity_core::{CityConfig, LoadTable, compile_city_output};

#[derive(Parser)]
#[command(name = "softcity")]
#[command(about = "Lay out a dependency graph as a software city", long_about = None)]
struct Cli {
    /// Edge-list file ("a.B" -> "c.D" per line)
    input: PathBuf,

    /// JSON city configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON load table from a trace importer
    #[arg(long)]
    loads: Option<PathBuf>,

    /// Override the spacing from the configuration
    #[arg(long)]
    spacing: Option<f32>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let mut cfg = match &cli.config {
        Some(path) => read_json::<CityConfig>(path)?,
        None => CityConfig::default(),
    };
    if let Some(spacing) = cli.spacing {
        cfg.spacing = spacing;
    }

    let loads = cli.loads.as_deref().map(read_json::<LoadTable>).transpose()?;

    let output = compile_city_output(&source, &cfg, loads.as_ref());
    let json = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}")?;

    Ok(if output.error.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}
