//! TREE relation validator.
//!
//! The expected hierarchy is rebuilt from the leaves on disk with the
//! fragmenter's [`FragmentTree`]. Each internal node's document is then
//! re-parsed and its relations compared with it:
//! - exactly one `GreaterThanOrEqualTo` and one `LessThan` relation per child
//! - bound values equal the calendar boundaries of the child
//! - every relation compares on the configured timestamp path
//! - sibling intervals do not overlap
//! - no relation points at a node that is not a child
//! - only the root declares the event stream, with its timestamp path and view

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use ldes_fragmenter::boundary::fragment_bounds;
use ldes_fragmenter::extract::parse_timestamp;
use ldes_fragmenter::source::TermValue;
use ldes_fragmenter::{vocab, FragmentId, FragmentTree, Interval, Layout, RelationKind};

use super::inventory::Inventory;
use crate::rdf::{self, Document};
use crate::report::{ConformanceReport, TestResult};

const VALIDATOR: &str = "relations";

#[derive(Default)]
struct Findings {
    unparseable: Vec<String>,
    malformed: Vec<String>,
    pairing: Vec<String>,
    bounds: Vec<String>,
    paths: Vec<String>,
    overlaps: Vec<String>,
    unexpected: Vec<String>,
    stream: Vec<String>,
    documents: usize,
    relations: usize,
}

/// A relation as read back from a document.
struct ReadRelation {
    kind: RelationKind,
    target: String,
    path: Option<String>,
    value: Option<DateTime<Utc>>,
}

/// Checks the relations of every internal node's metadata document.
///
/// # Errors
///
/// Returns an error if a metadata document cannot be read.
pub fn validate(layout: &Layout<'_>, inventory: &Inventory) -> Result<ConformanceReport> {
    let mut findings = Findings::default();
    let tree = FragmentTree::from_keys(inventory.leaves.keys().copied());

    for node in tree.internal_nodes() {
        let Some(path) = inventory.documents.get(&node.id) else {
            continue;
        };
        let doc = match rdf::load(path, layout.config().format)? {
            Ok(doc) => doc,
            Err(message) => {
                findings.unparseable.push(format!("{}: {message}", path.display()));
                continue;
            }
        };
        findings.documents += 1;

        let children: Vec<FragmentId> = node
            .children
            .iter()
            .filter_map(|&idx| tree.node(idx).map(|child| child.id))
            .collect();
        check_node(layout, node.id, &children, &doc, &mut findings);
        check_stream(layout, node.id, &doc, &mut findings);
    }

    let mut report = ConformanceReport::new();
    let Findings {
        unparseable,
        malformed,
        pairing,
        bounds,
        paths,
        overlaps,
        unexpected,
        stream,
        documents,
        relations,
    } = findings;
    report.push(TestResult::check(
        VALIDATOR,
        format!("{documents} metadata documents parse"),
        "metadata documents failed to parse",
        unparseable,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        format!("all {relations} relations are typed and carry tree:node"),
        "malformed relations",
        malformed,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        "every child has exactly one GreaterThanOrEqualTo and one LessThan relation",
        "children without exactly one relation pair",
        pairing,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        "every bound equals its child's calendar boundary",
        "relation bounds differ from calendar boundaries",
        bounds,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        format!("every relation compares on <{}>", layout.config().timestamp_path()),
        "relations on the wrong path",
        paths,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        "sibling intervals are disjoint",
        "overlapping sibling intervals",
        overlaps,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        "no relation points outside its node's children",
        "relations to nodes that are not children",
        unexpected,
    ));
    report.push(TestResult::check(
        VALIDATOR,
        "only the root declares the event stream, with timestamp path and view",
        "event stream declaration problems",
        stream,
    ));
    Ok(report)
}

fn check_node(
    layout: &Layout<'_>,
    id: FragmentId,
    children: &[FragmentId],
    doc: &Document,
    findings: &mut Findings,
) {
    let node = TermValue::Iri(layout.iri(id));
    if !doc.instances_of(vocab::TREE_NODE_CLASS).contains(&&node) {
        findings
            .malformed
            .push(format!("{id}: {} is not typed tree:Node", node.text()));
    }

    let mut by_target: BTreeMap<String, Vec<ReadRelation>> = BTreeMap::new();
    for subject in doc.objects(&node, vocab::TREE_RELATION) {
        findings.relations += 1;
        match read_relation(doc, subject) {
            Ok(relation) => by_target.entry(relation.target.clone()).or_default().push(relation),
            Err(reason) => findings.malformed.push(format!("{id}: {reason}")),
        }
    }

    let expected: BTreeMap<String, FragmentId> =
        children.iter().map(|child| (layout.iri(*child), *child)).collect();
    for target in by_target.keys() {
        if !expected.contains_key(target) {
            findings.unexpected.push(format!("{id}: relation to {target}"));
        }
    }

    let mut intervals: Vec<(FragmentId, Interval)> = Vec::new();
    for (target, child) in &expected {
        let relations = by_target.get(target).map(Vec::as_slice).unwrap_or_default();
        let ge: Vec<&ReadRelation> = relations
            .iter()
            .filter(|r| r.kind == RelationKind::GreaterThanOrEqual)
            .collect();
        let lt: Vec<&ReadRelation> = relations
            .iter()
            .filter(|r| r.kind == RelationKind::LessThan)
            .collect();
        let ([ge], [lt]) = (ge.as_slice(), lt.as_slice()) else {
            findings.pairing.push(format!(
                "{id} → {child}: {} GE and {} LT relations",
                ge.len(),
                lt.len()
            ));
            continue;
        };

        for relation in [ge, lt] {
            if relation.path.as_deref() != Some(layout.config().timestamp_path()) {
                findings.paths.push(format!(
                    "{id} → {child}: path {}",
                    relation.path.as_deref().unwrap_or("missing")
                ));
            }
        }

        let Ok(expected_bounds) = fragment_bounds(*child) else {
            findings.bounds.push(format!("{id} → {child}: child has no calendar interval"));
            continue;
        };
        match (ge.value, lt.value) {
            (Some(lower), Some(upper)) => {
                let found = Interval { lower, upper };
                if found != expected_bounds {
                    findings
                        .bounds
                        .push(format!("{id} → {child}: {found}, expected {expected_bounds}"));
                }
                intervals.push((*child, found));
            }
            _ => findings
                .bounds
                .push(format!("{id} → {child}: bound value missing or not an xsd:dateTime")),
        }
    }

    intervals.sort_by_key(|(_, interval)| interval.lower);
    for pair in intervals.windows(2) {
        let [(a, first), (b, second)] = pair else {
            continue;
        };
        if first.overlaps(second) {
            findings
                .overlaps
                .push(format!("{id}: {a} {first} overlaps {b} {second}"));
        }
    }
}

fn read_relation(doc: &Document, subject: &TermValue) -> Result<ReadRelation, String> {
    let kinds: Vec<RelationKind> = doc
        .objects(subject, vocab::RDF_TYPE)
        .filter_map(|t| t.as_iri().and_then(RelationKind::from_class_iri))
        .collect();
    let [kind] = kinds.as_slice() else {
        return Err(format!("relation {} has {} relation types", subject.text(), kinds.len()));
    };
    let Some(target) = doc.object(subject, vocab::TREE_NODE).and_then(TermValue::as_iri) else {
        return Err(format!("relation {} has no single tree:node IRI", subject.text()));
    };
    let path = doc
        .object(subject, vocab::TREE_PATH)
        .and_then(TermValue::as_iri)
        .map(str::to_owned);
    let value = doc.object(subject, vocab::TREE_VALUE).and_then(|t| match t {
        TermValue::Literal {
            lexical,
            datatype: Some(datatype),
        } if datatype == vocab::XSD_DATE_TIME => parse_timestamp(lexical),
        _ => None,
    });
    Ok(ReadRelation {
        kind: *kind,
        target: target.to_owned(),
        path,
        value,
    })
}

fn check_stream(layout: &Layout<'_>, id: FragmentId, doc: &Document, findings: &mut Findings) {
    let streams = doc.instances_of(vocab::LDES_EVENT_STREAM);
    if id != FragmentId::Root {
        if !streams.is_empty() {
            findings
                .stream
                .push(format!("{id}: non-root document declares an event stream"));
        }
        return;
    }

    let expected = layout.event_stream();
    let stream = TermValue::Iri(expected.iri.clone());
    if !streams.contains(&&stream) {
        findings
            .stream
            .push(format!("root: {} is not typed ldes:EventStream", expected.iri));
        return;
    }
    let path = doc
        .object(&stream, vocab::LDES_TIMESTAMP_PATH)
        .and_then(TermValue::as_iri);
    if path != Some(expected.timestamp_path.as_str()) {
        findings.stream.push(format!(
            "root: ldes:timestampPath is {}, expected {}",
            path.unwrap_or("missing"),
            expected.timestamp_path
        ));
    }
    let view = doc.object(&stream, vocab::TREE_VIEW).and_then(TermValue::as_iri);
    if view != Some(expected.view.as_str()) {
        findings.stream.push(format!(
            "root: tree:view is {}, expected {}",
            view.unwrap_or("missing"),
            expected.view
        ));
    }
}
