//! Error types.
//!
//! [`FragmentError`] is the fatal taxonomy of a run; [`RunError`] attributes
//! it to the pipeline [`Stage`] that failed. Malformed source rows are not
//! errors: they are counted in [`Extraction`](crate::Extraction).

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while loading or validating a [`FragmenterConfig`](crate::FragmenterConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A configuration value failed validation.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An output format name was not recognised.
    #[error("unknown output format `{0}` (expected turtle, ntriples or trig)")]
    UnknownFormat(String),

    /// A source kind name was not recognised.
    #[error("unknown source kind `{0}` (expected observations or snippets)")]
    UnknownSource(String),
}

/// Errors raised by the graph source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The input file could not be read.
    #[error("failed to read input {}: {source}", .path.display())]
    Read {
        /// Path of the input file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The base IRI used to resolve relative IRIs is not a valid IRI.
    #[error("invalid base IRI `{0}`")]
    BaseIri(String),

    /// The input is not valid Turtle.
    #[error("failed to parse {origin}: {message}")]
    Parse {
        /// File name or other description of the input.
        origin: String,
        /// Parser diagnostic.
        message: String,
    },

    /// Iterating the in-memory graph failed.
    #[error("graph query failed: {0}")]
    Query(String),
}

/// Errors raised by the boundary calculator for keys outside the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// The key does not name a real calendar date.
    #[error("{0} is not a valid calendar key")]
    InvalidKey(String),

    /// The key is valid but its upper bound is outside the supported range.
    #[error("no upper bound representable after {0}")]
    Overflow(String),

    /// The root fragment spans all observations and has no bound of its own.
    #[error("the root fragment has no interval")]
    Unbounded,
}

/// Fatal errors of a fragmentation run.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// The observation source could not be loaded or queried.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A leaf fragment could not be written completely.
    #[error("failed to write leaf fragment {}: {source}", .path.display())]
    PartitionWrite {
        /// Target path of the leaf fragment.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A node's children cannot be given a well-formed disjoint interval set.
    #[error("hierarchy inconsistency at {node}: {reason}")]
    HierarchyInconsistency {
        /// The node whose relations could not be built.
        node: String,
        /// What was wrong.
        reason: String,
    },

    /// A metadata document could not be written.
    #[error("failed to write metadata document {}: {source}", .path.display())]
    MetadataWrite {
        /// Target path of the document.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Previously generated output could not be removed.
    #[error("failed to clear prior output {}: {source}", .path.display())]
    Clear {
        /// Path that could not be removed or listed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Another run holds the advisory lock on the output directory.
    #[error("output directory is locked by another run (remove {} if no run is active)", .path.display())]
    LockHeld {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// The advisory lock could not be created.
    #[error("failed to acquire run lock {}: {source}", .path.display())]
    Lock {
        /// Path of the lock file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage {
    /// Acquiring the advisory lock on the output directory.
    Lock,
    /// Loading the source and extracting observations.
    Extract,
    /// Grouping observations and writing leaf fragments.
    Partition,
    /// Removing metadata and stale leaves from earlier runs.
    ClearPriorMetadata,
    /// Building the in-memory tree and computing every relation.
    BuildTree,
    /// Writing one metadata document per internal node.
    EmitMetadata,
}

impl Stage {
    /// Returns the stage name used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Lock => "lock",
            Stage::Extract => "extract",
            Stage::Partition => "partition",
            Stage::ClearPriorMetadata => "clear-prior-metadata",
            Stage::BuildTree => "build-tree",
            Stage::EmitMetadata => "emit-metadata",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed run: one taxonomy entry attributed to one stage.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct RunError {
    /// Stage that failed.
    pub stage: Stage,
    /// What went wrong.
    pub source: FragmentError,
}

impl RunError {
    /// Wraps `source` as a failure of `stage`.
    #[must_use]
    pub fn new(stage: Stage, source: impl Into<FragmentError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}
