//! Serializers for leaf and metadata documents.
//!
//! Three formats are supported, selected by [`OutputFormat`]:
//! - **Turtle** ([`turtle`]): prefixed, one subject block per resource
//! - **N-Triples** ([`ntriples`]): one triple per line, absolute IRIs
//! - **TriG** ([`trig`]): Turtle metadata; leaf members each in a named graph
//!
//! All writers are pure string builders. Given the same input they return
//! the same bytes, which is what makes a rebuild byte-identical.

pub mod ntriples;
pub mod trig;
pub mod turtle;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::OutputFormat;
use crate::model::{EventStream, MemberSlice};
use crate::tree::NodeDocument;

/// Content of one leaf data file.
#[derive(Debug, Clone, Copy)]
pub struct LeafDocument<'a> {
    /// Event stream to declare at the top of the leaf, if any.
    pub stream: Option<&'a EventStream>,
    /// Event stream IRI to declare `tree:member` links from, if any.
    pub member_of: Option<&'a str>,
    /// Predicate carrying the observation identifier.
    pub identifier_predicate: &'a str,
    /// The bucket's members, already in output order.
    pub members: MemberSlice<'a>,
}

/// Serializes a leaf data file in `format`.
#[must_use]
pub fn leaf_document(format: OutputFormat, leaf: &LeafDocument<'_>) -> String {
    match format {
        OutputFormat::Turtle => turtle::leaf(leaf),
        OutputFormat::NTriples => ntriples::leaf(leaf),
        OutputFormat::TriG => trig::leaf(leaf),
    }
}

/// Serializes an internal node's metadata document in `format`.
#[must_use]
pub fn metadata_document(format: OutputFormat, doc: &NodeDocument) -> String {
    match format {
        OutputFormat::Turtle => turtle::metadata(doc),
        OutputFormat::NTriples => ntriples::metadata(doc),
        OutputFormat::TriG => trig::metadata(doc),
    }
}

/// Lexical `xsd:dateTime` form of a boundary value, whole seconds, `Z` zone.
#[must_use]
pub fn xsd_date_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Lexical `xsd:dateTime` form of an observation time. Sub-second
/// precision is kept when present.
#[must_use]
pub fn observation_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Escapes a string for a quoted Turtle or N-Triples literal.
#[must_use]
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Lexical `xsd:double` form. Finite values only; the extractor drops the rest.
#[must_use]
pub fn double_lexical(value: f64) -> String {
    format!("{value:?}")
}
