//! The per-run pipeline.
//!
//! ```text
//! Lock → Extract → Partition → ClearPriorMetadata → BuildTree → EmitMetadata
//! ```
//!
//! Stages run strictly in sequence. The first fatal error stops the run and
//! is reported as a [`RunError`] naming its stage. The configuration is
//! assumed to have passed [`FragmenterConfig::validate`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{FragmenterConfig, OutputFormat, SourceKind};
use crate::error::{FragmentError, RunError, SourceError, Stage};
use crate::extract::{self, RawRecord, SkipReason};
use crate::fsio::{self, RunLock};
use crate::layout::Layout;
use crate::model::{BucketKey, FragmentId};
use crate::partition;
use crate::serializer;
use crate::source::GraphSource;
use crate::tree::{self, FragmentTree};
use crate::vocab;

/// Counts reported by a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Kind of member that was fragmented.
    pub source: SourceKind,
    /// Members placed in leaf fragments.
    pub members: usize,
    /// Source rows dropped as malformed.
    pub skipped: usize,
    /// Dropped rows by reason.
    pub skipped_by_reason: BTreeMap<SkipReason, usize>,
    /// Leaf data files written.
    pub leaf_fragments: usize,
    /// Metadata documents written (root, years, months).
    pub metadata_documents: usize,
    /// Files from earlier runs that were removed.
    pub removed_files: usize,
    /// Serialization used for every document.
    pub format: OutputFormat,
    /// Directory the tree was written to.
    pub output_dir: PathBuf,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u128,
}

/// Loads `input` as Turtle and runs the pipeline over its observations or
/// snippets, as selected by [`FragmenterConfig::source`].
///
/// Relative IRIs in the input resolve against `input_base` when given.
///
/// # Errors
///
/// Returns a [`RunError`] naming the failed stage. An unreadable or
/// unparseable input fails the `extract` stage.
pub fn run_from_path(
    config: &FragmenterConfig,
    input: &Path,
    input_base: Option<&str>,
) -> Result<RunSummary, RunError> {
    let load = || GraphSource::from_path(input, input_base, &config.identifier_predicate);
    match config.source {
        SourceKind::Observations => execute(config, || load()?.rows()),
        SourceKind::Snippets => execute(config, || load()?.snippet_rows()),
    }
}

/// Runs the pipeline over already-queried rows, observation
/// ([`RawRow`](crate::RawRow)) or snippet ([`RawSnippet`](crate::RawSnippet)).
///
/// # Errors
///
/// Returns a [`RunError`] naming the failed stage.
pub fn run<R, I>(config: &FragmenterConfig, rows: I) -> Result<RunSummary, RunError>
where
    R: RawRecord,
    I: IntoIterator<Item = R>,
{
    execute(config, || Ok(rows))
}

fn execute<R, I, F>(config: &FragmenterConfig, load: F) -> Result<RunSummary, RunError>
where
    R: RawRecord,
    I: IntoIterator<Item = R>,
    F: FnOnce() -> Result<I, SourceError>,
{
    let started = Instant::now();
    let layout = Layout::new(config);
    info!(
        output = %layout.base_dir().display(),
        format = %config.format,
        source = %config.source,
        "starting fragmentation run"
    );

    let _lock = if config.lock {
        Some(acquire_lock(&layout).map_err(|e| RunError::new(Stage::Lock, e))?)
    } else {
        None
    };

    let rows = load().map_err(|e| RunError::new(Stage::Extract, e))?;
    let extraction = extract::extract(rows, &layout);
    let members = extraction.members.len();
    info!(
        stage = %Stage::Extract,
        members,
        skipped = extraction.skipped_total(),
        "extracted members"
    );

    let skipped = extraction.skipped_total();
    let skipped_by_reason = extraction.skipped.clone();
    let buckets = partition::partition(extraction.members);
    let leaves = partition::write_leaves(&buckets, &layout)
        .map_err(|e| RunError::new(Stage::Partition, e))?;
    info!(stage = %Stage::Partition, leaves = leaves.len(), "wrote leaf fragments");

    let produced: BTreeSet<BucketKey> = buckets.keys().copied().collect();
    let removed_files = clear_prior_output(&layout, &produced)
        .map_err(|e| RunError::new(Stage::ClearPriorMetadata, e))?;
    info!(stage = %Stage::ClearPriorMetadata, removed = removed_files, "cleared prior output");

    let tree = FragmentTree::from_keys(produced.iter().copied());
    let documents =
        tree::plan_documents(&tree, &layout).map_err(|e| RunError::new(Stage::BuildTree, e))?;
    info!(
        stage = %Stage::BuildTree,
        nodes = tree.len(),
        documents = documents.len(),
        "built fragment tree"
    );

    // Children before parents; the root goes last.
    for doc in documents.iter().rev() {
        let body = serializer::metadata_document(config.format, doc);
        fsio::write_atomic(&doc.path, body.as_bytes()).map_err(|source| {
            RunError::new(
                Stage::EmitMetadata,
                FragmentError::MetadataWrite {
                    path: doc.path.clone(),
                    source,
                },
            )
        })?;
        debug!(document = %doc.path.display(), relations = doc.relations.len(), "wrote metadata");
    }
    info!(stage = %Stage::EmitMetadata, documents = documents.len(), "wrote metadata documents");

    let summary = RunSummary {
        source: config.source,
        members,
        skipped,
        skipped_by_reason,
        leaf_fragments: leaves.len(),
        metadata_documents: documents.len(),
        removed_files,
        format: config.format,
        output_dir: layout.base_dir().to_path_buf(),
        elapsed_ms: started.elapsed().as_millis(),
    };
    info!(
        members = summary.members,
        skipped = summary.skipped,
        leaves = summary.leaf_fragments,
        documents = summary.metadata_documents,
        elapsed_ms = summary.elapsed_ms,
        "fragmentation run complete"
    );
    Ok(summary)
}

fn acquire_lock(layout: &Layout<'_>) -> Result<RunLock, FragmentError> {
    let path = layout.lock_path();
    match RunLock::acquire(&path) {
        Ok(Some(lock)) => Ok(lock),
        Ok(None) => Err(FragmentError::LockHeld { path }),
        Err(source) => Err(FragmentError::Lock { path, source }),
    }
}

/// Removes output of earlier runs that this run did not just write: every
/// metadata document in any format, every leaf whose key was not produced
/// or whose format differs, and the root document of a stream published
/// under another name. Empty directories are pruned.
///
/// Other files are left alone.
///
/// # Errors
///
/// Returns [`FragmentError::Clear`] for the first path that cannot be
/// listed or removed.
pub fn clear_prior_output(
    layout: &Layout<'_>,
    produced: &BTreeSet<BucketKey>,
) -> Result<usize, FragmentError> {
    let base = layout.base_dir();
    if !base.exists() {
        return Ok(0);
    }
    let format = layout.config().format;

    let mut removed = 0;
    for entry in WalkDir::new(base).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| FragmentError::Clear {
            path: e.path().map_or_else(|| base.to_path_buf(), Path::to_path_buf),
            source: std::io::Error::other(e.to_string()),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(base) else {
            continue;
        };
        let Some((id, found)) = layout.classify(relative) else {
            if is_prior_root(relative, path) {
                std::fs::remove_file(path).map_err(|source| FragmentError::Clear {
                    path: path.to_path_buf(),
                    source,
                })?;
                warn!(file = %relative.display(), "removed root document of a renamed stream");
                removed += 1;
            }
            continue;
        };
        let stale = match id {
            FragmentId::Day(key) => found != format || !produced.contains(&key),
            _ => true,
        };
        if stale {
            std::fs::remove_file(path).map_err(|source| FragmentError::Clear {
                path: path.to_path_buf(),
                source,
            })?;
            if id.is_internal() {
                debug!(file = %relative.display(), "removed prior metadata document");
            } else {
                warn!(file = %relative.display(), "removed stale leaf fragment");
            }
            removed += 1;
        }
    }

    let pruned = fsio::prune_empty_dirs(base)
        .map_err(|(path, source)| FragmentError::Clear { path, source })?;
    debug!(pruned, "pruned empty directories");
    Ok(removed)
}

/// A top-level document in a supported format whose stem could be a
/// stream name and which declares an event stream with a view.
fn is_prior_root(relative: &Path, path: &Path) -> bool {
    if relative.components().count() != 1 {
        return false;
    }
    let known_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| OutputFormat::ALL.iter().any(|f| f.extension() == e));
    let stream_like = path.file_stem().and_then(|s| s.to_str()).is_some_and(|stem| {
        !stem.is_empty()
            && stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && !stem.chars().all(|c| c.is_ascii_digit())
    });
    if !known_ext || !stream_like {
        return false;
    }
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    let declares_stream =
        content.contains("ldes:EventStream") || content.contains(vocab::LDES_EVENT_STREAM);
    let has_view = content.contains("tree:view") || content.contains(vocab::TREE_VIEW);
    declares_stream && has_view
}
