//! Inventory of a built output directory.
//!
//! Classifies every file below the output directory with the fragmenter's
//! own [`Layout`], so the validators agree with the builder on what each
//! path means.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ldes_fragmenter::layout::LOCK_FILE;
use ldes_fragmenter::{BucketKey, FragmentId, Layout, OutputFormat};
use walkdir::WalkDir;

/// What a scan of the output directory found.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// Whether the output directory exists at all.
    pub exists: bool,
    /// Metadata documents in the configured format, root included.
    pub documents: BTreeMap<FragmentId, PathBuf>,
    /// Leaf data files in the configured format.
    pub leaves: BTreeMap<BucketKey, PathBuf>,
    /// Generated artifacts in a format other than the configured one.
    pub foreign: Vec<(PathBuf, OutputFormat)>,
    /// Whether a run lock file was left behind.
    pub lock_present: bool,
}

/// Scans the output directory of `layout`.
///
/// # Errors
///
/// Returns an error if a directory cannot be listed.
pub fn scan(layout: &Layout<'_>) -> Result<Inventory> {
    let base = layout.base_dir();
    let mut inventory = Inventory {
        exists: base.is_dir(),
        ..Inventory::default()
    };
    if !inventory.exists {
        return Ok(inventory);
    }
    let format = layout.config().format;

    for entry in WalkDir::new(base).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {}", base.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(base).unwrap_or(path);
        if relative.as_os_str() == LOCK_FILE {
            inventory.lock_present = true;
            continue;
        }
        match layout.classify(relative) {
            Some((_, found)) if found != format => {
                inventory.foreign.push((path.to_path_buf(), found));
            }
            Some((FragmentId::Day(key), _)) => {
                inventory.leaves.insert(key, path.to_path_buf());
            }
            Some((id, _)) => {
                inventory.documents.insert(id, path.to_path_buf());
            }
            None => {}
        }
    }
    Ok(inventory)
}
