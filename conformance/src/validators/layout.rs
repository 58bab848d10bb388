//! Directory layout validator.
//!
//! - the output directory and the root document exist
//! - every leaf has its month and year documents
//! - every year/month document has at least one leaf below it
//! - no generated artifact is in a different format
//! - no run lock was left behind

use ldes_fragmenter::{FragmentId, Layout};

use super::inventory::Inventory;
use crate::report::{ConformanceReport, TestResult};

const VALIDATOR: &str = "layout";

/// Checks the shape of the output directory.
pub fn validate(layout: &Layout<'_>, inventory: &Inventory) -> ConformanceReport {
    let mut report = ConformanceReport::new();
    let base = layout.base_dir().display();

    if !inventory.exists {
        report.push(TestResult::fail(
            VALIDATOR,
            format!("output directory {base} does not exist"),
        ));
        return report;
    }

    if inventory.documents.contains_key(&FragmentId::Root) {
        report.push(TestResult::pass(
            VALIDATOR,
            format!("root document {} present", layout.relative_path(FragmentId::Root).display()),
        ));
    } else {
        report.push(TestResult::fail(
            VALIDATOR,
            format!("root document {} missing", layout.relative_path(FragmentId::Root).display()),
        ));
    }

    if inventory.leaves.is_empty() {
        report.push(TestResult::warn(VALIDATOR, "no leaf fragments found"));
    }

    let mut missing = Vec::new();
    for key in inventory.leaves.keys() {
        let mut ancestor = FragmentId::Day(*key).parent();
        while let Some(id) = ancestor {
            if id != FragmentId::Root && !inventory.documents.contains_key(&id) {
                let line = format!("{} (above leaf {key})", layout.relative_path(id).display());
                if !missing.contains(&line) {
                    missing.push(line);
                }
            }
            ancestor = id.parent();
        }
    }
    report.push(TestResult::check(
        VALIDATOR,
        format!("all {} leaves have year and month documents", inventory.leaves.len()),
        "metadata documents missing above leaves",
        missing,
    ));

    let orphans: Vec<String> = inventory
        .documents
        .keys()
        .filter(|id| **id != FragmentId::Root)
        .filter(|id| !inventory.leaves.keys().any(|key| is_ancestor(**id, *key)))
        .map(|id| layout.relative_path(*id).display().to_string())
        .collect();
    report.push(TestResult::check(
        VALIDATOR,
        format!("all {} metadata documents cover existing leaves", inventory.documents.len()),
        "stale metadata documents with no leaf below them",
        orphans,
    ));

    let foreign: Vec<String> = inventory
        .foreign
        .iter()
        .map(|(path, format)| format!("{} ({format})", path.display()))
        .collect();
    report.push(TestResult::check(
        VALIDATOR,
        format!("every artifact is {}", layout.config().format),
        "artifacts in another format left over",
        foreign,
    ));

    if inventory.lock_present {
        report.push(TestResult::warn(
            VALIDATOR,
            format!("run lock {} present; a run may be in progress", layout.lock_path().display()),
        ));
    }

    report
}

fn is_ancestor(id: FragmentId, key: ldes_fragmenter::BucketKey) -> bool {
    let mut current = FragmentId::Day(key).parent();
    while let Some(node) = current {
        if node == id {
            return true;
        }
        current = node.parent();
    }
    false
}
