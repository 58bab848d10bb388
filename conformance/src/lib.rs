//! Conformance suite for generated LDES fragment trees.
//!
//! Re-reads an output directory produced by `ldes-fragmenter` and checks it
//! against the invariants the builder promises, without trusting any state
//! from the run that wrote it.
//!
//! # Conformance Scope
//!
//! | Validator | Checks |
//! |-----------|--------|
//! | `layout` | root document, ancestor documents per leaf, stale documents, mixed formats |
//! | `leaves` | parseable, non-empty, observations or snippets inside their day, no duplicates, membership, stream declaration |
//! | `relations` | one GE/LT pair per child, calendar bounds, timestamp path, disjoint siblings, event stream |
//!
//! # Entry Point
//!
//! ```no_run
//! use ldes_conformance::run_all;
//! use ldes_fragmenter::FragmenterConfig;
//!
//! let config = FragmenterConfig::default();
//! let report = run_all(&config).expect("Failed to run conformance");
//! assert!(report.all_passed());
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod rdf;
pub mod report;
pub mod validators;

use ldes_fragmenter::{FragmenterConfig, Layout};

pub use report::{ConformanceReport, Severity, TestResult};

/// Runs all validators against the output directory of `config` and returns
/// the aggregated report.
///
/// Validators are run in this order:
/// 1. Layout (directory shape, stale and foreign files)
/// 2. Leaves (member placement and shape)
/// 3. Relations (TREE navigation and event stream)
///
/// # Errors
///
/// Returns an error only if a file system operation fails.
pub fn run_all(config: &FragmenterConfig) -> anyhow::Result<ConformanceReport> {
    let layout = Layout::new(config);
    let inventory = validators::inventory::scan(&layout)?;

    let mut report = ConformanceReport::new();
    report.extend(validators::layout::validate(&layout, &inventory));
    if !inventory.exists {
        return Ok(report);
    }
    report.extend(validators::leaves::validate(&layout, &inventory)?);
    report.extend(validators::relations::validate(&layout, &inventory)?);
    Ok(report)
}
