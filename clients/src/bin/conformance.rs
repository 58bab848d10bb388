//! `ldes-conformance`: Validates a built LDES fragment tree.
//!
//! Runs the conformance suite across:
//! - Layout (root document, ancestor documents, stale and foreign files)
//! - Leaves (observation placement, duplicates, stream membership)
//! - Relations (GE/LT pairs, calendar bounds, timestamp path, event stream)
//!
//! **Usage:**
//! ```text
//! ldes-conformance [--config ldes.toml] [--out <path>] [--format <format>] [--json]
//! ```
//!
//! Exits non-zero if any conformance check fails.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use ldes_conformance::{run_all, Severity};
use ldes_fragmenter::{FragmenterConfig, OutputFormat};
use tracing_subscriber::EnvFilter;

/// Run the LDES conformance suite.
#[derive(Parser)]
#[command(
    name = "ldes-conformance",
    about = "Validate an LDES fragment tree built by ldes-build"
)]
struct Args {
    /// TOML configuration file used for the build.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory of the fragment tree.
    #[arg(long)]
    out: Option<PathBuf>,

    /// IRI the output directory is published at.
    #[arg(long)]
    base_iri: Option<String>,

    /// Name of the root document and event stream.
    #[arg(long)]
    stream_name: Option<String>,

    /// Serialization the tree was built with.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => FragmenterConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => FragmenterConfig::default(),
    };
    if let Some(out) = args.out {
        config.output_dir = out;
    }
    if let Some(base_iri) = args.base_iri {
        config.base_iri = base_iri;
    }
    if let Some(stream_name) = args.stream_name {
        config.stream_name = stream_name;
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    config.validate().context("Invalid configuration")?;

    let report = run_all(&config)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize report to JSON")?;
        println!("{json}");
        if !report.all_passed() {
            process::exit(1);
        }
        return Ok(());
    }

    println!("LDES Conformance Report");
    println!("=======================");
    println!("Tree: {} ({})", config.output_dir.display(), config.format);
    println!();

    for result in &report.results {
        println!("[{}] {} — {}", result.severity.label(), result.validator, result.message);
        for detail in &result.details {
            println!("       {}", detail);
        }
    }

    let failed = report.count(Severity::Failure);
    println!();
    println!(
        "Summary: {} passed, {} warnings, {} failed",
        report.count(Severity::Pass),
        report.count(Severity::Warning),
        failed
    );

    if failed > 0 {
        eprintln!("Conformance FAILED: {} check(s) did not pass.", failed);
        process::exit(1);
    }

    println!("Conformance PASSED.");
    Ok(())
}
