//! `ldes-build`: Fragments a Turtle file of `sosa:Observation`s (or
//! `tss:Snippet`s) into an LDES year/month/day fragment tree.
//!
//! **Outputs** (under `--out`, default `LDES/`):
//! - `<stream>.<ext>`: root document with the event stream and year relations
//! - `<yyyy>/<yyyy>.<ext>`: year documents
//! - `<yyyy>/<mm>/<mm>.<ext>`: month documents
//! - `<yyyy>/<mm>/<dd>/readings.<ext>`: leaf data files
//!
//! **Usage:**
//! ```text
//! ldes-build --input observations.ttl [--config ldes.toml] [--out <path>]
//!            [--base-iri <iri>] [--format turtle|ntriples|trig]
//!            [--source observations|snippets] [--no-leaf-stream] [--json]
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ldes_fragmenter::{pipeline, FragmenterConfig, OutputFormat, SourceKind};
use tracing_subscriber::EnvFilter;

/// Build an LDES fragment tree from sensor observations.
#[derive(Parser)]
#[command(name = "ldes-build", about = "Build an LDES year/month/day fragment tree")]
struct Args {
    /// Turtle or N-Triples file holding the observations or snippets.
    #[arg(long)]
    input: PathBuf,

    /// Base IRI for relative IRIs in the input.
    #[arg(long)]
    input_base: Option<String>,

    /// TOML configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for the fragment tree.
    #[arg(long)]
    out: Option<PathBuf>,

    /// IRI the output directory is published at (must end in `/`).
    #[arg(long)]
    base_iri: Option<String>,

    /// Name of the root document and event stream.
    #[arg(long)]
    stream_name: Option<String>,

    /// Output serialization: turtle, ntriples or trig.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Kind of member to read: observations or snippets.
    #[arg(long)]
    source: Option<SourceKind>,

    /// Do not take the advisory lock on the output directory.
    #[arg(long)]
    no_lock: bool,

    /// Do not declare `tree:member` links in leaf files.
    #[arg(long)]
    no_members: bool,

    /// Do not repeat the event stream declaration in leaf files.
    #[arg(long)]
    no_leaf_stream: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

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
    if let Some(source) = args.source {
        config.source = source;
    }
    if args.no_lock {
        config.lock = false;
    }
    if args.no_members {
        config.leaf_members = false;
    }
    if args.no_leaf_stream {
        config.leaf_stream = false;
    }
    config.validate().context("Invalid configuration")?;
    tracing::debug!(?config, "resolved configuration");

    let summary = pipeline::run_from_path(&config, &args.input, args.input_base.as_deref())
        .with_context(|| format!("Failed to fragment {}", args.input.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .context("Failed to serialize run summary to JSON")?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "LDES fragment tree ({}): {} {}, {} skipped, {} leaf fragments, {} metadata documents",
        summary.format,
        summary.members,
        summary.source,
        summary.skipped,
        summary.leaf_fragments,
        summary.metadata_documents
    );
    for (reason, count) in &summary.skipped_by_reason {
        println!("  Skipped ({}): {count}", reason.as_str());
    }
    if summary.removed_files > 0 {
        println!("  Removed from earlier runs: {}", summary.removed_files);
    }
    println!("  Written: {}", summary.output_dir.display());
    println!("Build complete.");
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
