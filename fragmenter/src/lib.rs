//! Hierarchical time-based fragmentation of sensor observations into a
//! Linked Data Event Stream (LDES).
//!
//! The crate takes a flat collection of `sosa:Observation` records (or
//! `tss:Snippet` time series snippets), groups them by calendar day and publishes them as a directory-shaped fragment
//! tree (`root → year → month → day`). Every internal fragment carries a
//! metadata document with one `tree:GreaterThanOrEqualToRelation` /
//! `tree:LessThanRelation` pair per child, so a client can navigate to the
//! fragments covering any time range.
//!
//! # Entry Point
//!
//! ```no_run
//! use ldes_fragmenter::{pipeline, FragmenterConfig};
//! use std::path::Path;
//!
//! let config = FragmenterConfig::default();
//! let summary = pipeline::run_from_path(&config, Path::new("observations.ttl"), None)
//!     .expect("fragmentation run failed");
//! println!("{} members in {} leaves", summary.members, summary.leaf_fragments);
//! ```
//!
//! # Stages
//!
//! `Extract → Partition → ClearPriorMetadata → BuildTree → EmitMetadata`.
//! The tree is derived in memory from the partition keys; the output
//! directory is never scanned to discover structure.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod boundary;
pub mod config;
pub mod error;
pub mod extract;
pub mod fsio;
pub mod layout;
pub mod model;
pub mod partition;
pub mod pipeline;
pub mod serializer;
pub mod source;
pub mod tree;
pub mod vocab;

pub use config::{FragmenterConfig, OutputFormat, SourceKind};
pub use error::{BoundaryError, ConfigError, FragmentError, RunError, SourceError, Stage};
pub use extract::{Extraction, RawRecord, RawRow, RawSnippet, RawTemplate, SkipReason};
pub use layout::Layout;
pub use model::{
    BucketKey, EventStream, FragmentId, Granularity, Interval, Member, MemberSlice, Observation,
    PointTemplate, Relation, RelationKind, Snippet,
};
pub use pipeline::RunSummary;
pub use tree::{FragmentTree, NodeDocument};
