//! Leaf fragment validator.
//!
//! Re-parses every leaf and checks that:
//! - it parses and holds at least one member of the configured kind
//! - each observation has an integer identifier, a numeric result, a
//!   property IRI and a result time inside the leaf's day
//! - each snippet starts inside the leaf's day, ends no earlier, carries a
//!   point type, a JSON array of points and a typed point template with
//!   sensor and property IRIs
//! - no member appears in two leaves
//! - each member is a `tree:member` of the stream, when leaves declare
//!   membership
//! - the leaf repeats the stream declaration, when configured to

use std::collections::BTreeMap;

use anyhow::Result;
use ldes_fragmenter::boundary::day_bounds;
use ldes_fragmenter::extract::parse_timestamp;
use ldes_fragmenter::source::TermValue;
use ldes_fragmenter::{vocab, BucketKey, Interval, Layout, SourceKind};

use super::inventory::Inventory;
use crate::rdf::{self, Document};
use crate::report::{ConformanceReport, TestResult};

const VALIDATOR: &str = "leaves";

#[derive(Default)]
struct Findings {
    unparseable: Vec<String>,
    empty: Vec<String>,
    malformed: Vec<String>,
    out_of_bounds: Vec<String>,
    not_members: Vec<String>,
    duplicates: Vec<String>,
    stream: Vec<String>,
    total: usize,
}

/// Checks every leaf data file in `inventory`.
///
/// # Errors
///
/// Returns an error if a leaf file cannot be read.
pub fn validate(layout: &Layout<'_>, inventory: &Inventory) -> Result<ConformanceReport> {
    let mut report = ConformanceReport::new();
    if inventory.leaves.is_empty() {
        return Ok(report);
    }
    let config = layout.config();
    let stream = TermValue::Iri(layout.event_stream_iri());
    let (class, noun) = match config.source {
        SourceKind::Observations => (vocab::SOSA_OBSERVATION, "observations"),
        SourceKind::Snippets => (vocab::TSS_SNIPPET, "snippets"),
    };

    let mut findings = Findings::default();
    let mut seen: BTreeMap<String, BucketKey> = BTreeMap::new();

    for (key, path) in &inventory.leaves {
        let shown = path.display();
        let doc = match rdf::load(path, config.format)? {
            Ok(doc) => doc,
            Err(message) => {
                findings.unparseable.push(format!("{shown}: {message}"));
                continue;
            }
        };
        let Ok(bounds) = day_bounds(key.year, key.month, key.day) else {
            findings.malformed.push(format!("{shown}: {key} is not a calendar day"));
            continue;
        };
        if config.leaf_stream {
            check_stream_declaration(layout, &doc, &shown.to_string(), &mut findings);
        }

        let members = doc.instances_of(class);
        if members.is_empty() {
            findings.empty.push(shown.to_string());
        }
        for subject in members {
            findings.total += 1;
            let Some(iri) = subject.as_iri() else {
                findings.malformed.push(format!("{shown}: member without an IRI"));
                continue;
            };
            match config.source {
                SourceKind::Observations => check_observation(
                    &doc,
                    subject,
                    iri,
                    &config.identifier_predicate,
                    bounds,
                    &mut findings,
                ),
                SourceKind::Snippets => check_snippet(&doc, subject, iri, bounds, &mut findings),
            }

            if config.leaf_members
                && !doc.objects(&stream, vocab::TREE_MEMBER).any(|m| m == subject)
            {
                findings.not_members.push(format!("{iri} in {shown}"));
            }
            if let Some(first) = seen.insert(iri.to_owned(), *key) {
                findings.duplicates.push(format!("{iri} in {first} and {key}"));
            }
        }
    }

    let leaves = inventory.leaves.len();
    let total = findings.total;
    report.push(TestResult::check(
        VALIDATOR,
        format!("all {leaves} leaf fragments parse as {}", config.format),
        "leaf fragments failed to parse",
        findings.unparseable,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        format!("every leaf fragment holds at least one of the {noun}"),
        "empty leaf fragments",
        findings.empty,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        match config.source {
            SourceKind::Observations => {
                format!("all {total} observations carry id, result, property and time")
            }
            SourceKind::Snippets => {
                format!("all {total} snippets carry span, point type, points and template")
            }
        },
        format!("malformed {noun}"),
        findings.malformed,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        format!("all {total} {noun} fall inside their leaf's day"),
        format!("{noun} outside their leaf's day"),
        findings.out_of_bounds,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        format!("all {total} {noun} appear in exactly one leaf"),
        format!("{noun} in more than one leaf"),
        findings.duplicates,
    ));
    if config.leaf_members {
        report.push(TestResult::check(
            VALIDATOR,
            format!("all {total} {noun} are tree:members of the event stream"),
            format!("{noun} without tree:member link"),
            findings.not_members,
        ));
    }
    if config.leaf_stream {
        report.push(TestResult::check(
            VALIDATOR,
            format!("all {leaves} leaf fragments declare the event stream"),
            "leaf fragments with a missing or wrong event stream declaration",
            findings.stream,
        ));
    }
    Ok(report)
}

fn check_observation(
    doc: &Document,
    subject: &TermValue,
    iri: &str,
    identifier_predicate: &str,
    bounds: Interval,
    findings: &mut Findings,
) {
    let id = doc.object(subject, identifier_predicate);
    if id.and_then(|t| t.text().parse::<i64>().ok()).is_none() {
        findings.malformed.push(format!("{iri}: missing or non-integer identifier"));
    }
    let value = doc.object(subject, vocab::SOSA_HAS_SIMPLE_RESULT);
    if value.and_then(|t| t.text().parse::<f64>().ok()).is_none() {
        findings.malformed.push(format!("{iri}: missing or non-numeric result"));
    }
    if doc
        .object(subject, vocab::SOSA_OBSERVED_PROPERTY)
        .and_then(TermValue::as_iri)
        .is_none()
    {
        findings.malformed.push(format!("{iri}: observed property is not an IRI"));
    }
    match doc
        .object(subject, vocab::SOSA_RESULT_TIME)
        .and_then(|t| parse_timestamp(t.text()))
    {
        Some(time) if bounds.contains(time) => {}
        Some(time) => findings.out_of_bounds.push(format!("{iri}: {time} outside {bounds}")),
        None => findings.malformed.push(format!("{iri}: missing or invalid result time")),
    }
}

fn check_snippet(
    doc: &Document,
    subject: &TermValue,
    iri: &str,
    bounds: Interval,
    findings: &mut Findings,
) {
    let time = |predicate: &str| {
        doc.object(subject, predicate)
            .and_then(|t| parse_timestamp(t.text()))
    };
    match (time(vocab::TSS_FROM), time(vocab::TSS_TO)) {
        (Some(from), Some(to)) => {
            if !bounds.contains(from) {
                findings.out_of_bounds.push(format!("{iri}: {from} outside {bounds}"));
            }
            if to < from {
                findings.malformed.push(format!("{iri}: tss:to {to} before tss:from {from}"));
            }
        }
        _ => findings.malformed.push(format!("{iri}: missing or invalid tss:from or tss:to")),
    }
    if doc.object(subject, vocab::TSS_POINT_TYPE).is_none() {
        findings.malformed.push(format!("{iri}: missing tss:pointType"));
    }
    let points = doc.object(subject, vocab::TSS_POINTS).map(TermValue::text);
    if !matches!(
        points.map(serde_json::from_str::<serde_json::Value>),
        Some(Ok(serde_json::Value::Array(_)))
    ) {
        findings.malformed.push(format!("{iri}: tss:points is not a JSON array"));
    }

    let template = doc.object(subject, vocab::TSS_ABOUT);
    let typed = template.is_some_and(|t| {
        doc.objects(t, vocab::RDF_TYPE)
            .any(|c| c.as_iri() == Some(vocab::TSS_POINT_TEMPLATE))
    });
    let Some(template) = template.filter(|_| typed) else {
        findings.malformed.push(format!("{iri}: no tss:PointTemplate"));
        return;
    };
    for (predicate, name) in [
        (vocab::SOSA_MADE_BY_SENSOR, "sensor"),
        (vocab::SOSA_OBSERVED_PROPERTY, "observed property"),
    ] {
        if doc.object(template, predicate).and_then(TermValue::as_iri).is_none() {
            findings.malformed.push(format!("{iri}: template {name} is not an IRI"));
        }
    }
}

fn check_stream_declaration(
    layout: &Layout<'_>,
    doc: &Document,
    shown: &str,
    findings: &mut Findings,
) {
    let expected = layout.event_stream();
    let stream = TermValue::Iri(expected.iri.clone());
    let typed = doc
        .objects(&stream, vocab::RDF_TYPE)
        .any(|c| c.as_iri() == Some(vocab::LDES_EVENT_STREAM));
    if !typed {
        findings
            .stream
            .push(format!("{shown}: {} is not typed ldes:EventStream", expected.iri));
        return;
    }
    let path = doc
        .object(&stream, vocab::LDES_TIMESTAMP_PATH)
        .and_then(TermValue::as_iri);
    if path != Some(expected.timestamp_path.as_str()) {
        findings.stream.push(format!(
            "{shown}: ldes:timestampPath is {}, expected {}",
            path.unwrap_or("missing"),
            expected.timestamp_path
        ));
    }
    let view = doc.object(&stream, vocab::TREE_VIEW).and_then(TermValue::as_iri);
    if view != Some(expected.view.as_str()) {
        findings.stream.push(format!(
            "{shown}: tree:view is {}, expected {}",
            view.unwrap_or("missing"),
            expected.view
        ));
    }
}
