//! Turtle 1.1 serializer.
//!
//! Every document starts with the shared prefix block from
//! [`vocab::PREFIXES`]. Relations and snippet point templates are written
//! as anonymous blank nodes (`[ ... ]`).

use super::{double_lexical, escape_literal, observation_time, xsd_date_time, LeafDocument};
use crate::model::{EventStream, MemberSlice, Observation, Relation, Snippet};
use crate::tree::NodeDocument;
use crate::vocab;

/// Serializes a leaf data file to Turtle.
#[must_use]
pub fn leaf(leaf: &LeafDocument<'_>) -> String {
    let mut out = String::with_capacity(256 + leaf.members.len() * 320);
    write_prefixes(&mut out);
    write_leaf_header(&mut out, leaf);

    match leaf.members {
        MemberSlice::Observations(observations) => {
            for obs in observations {
                write_observation(&mut out, obs, leaf.identifier_predicate, "");
                out.push('\n');
            }
        }
        MemberSlice::Snippets(snippets) => {
            for snippet in snippets {
                write_snippet(&mut out, snippet, "");
                out.push('\n');
            }
        }
    }
    out
}

/// Serializes an internal node's metadata document to Turtle.
#[must_use]
pub fn metadata(doc: &NodeDocument) -> String {
    let mut out = String::with_capacity(512 + doc.relations.len() * 256);
    write_prefixes(&mut out);

    if let Some(stream) = &doc.event_stream {
        write_stream(&mut out, stream);
    }

    out.push_str(&format!("<{}>\n    a tree:Node", doc.iri));
    for (i, relation) in doc.relations.iter().enumerate() {
        out.push_str(if i == 0 { " ;\n    tree:relation " } else { " , " });
        write_relation(&mut out, relation);
    }
    out.push_str(" .\n");
    out
}

pub(crate) fn write_prefixes(out: &mut String) {
    for (prefix, ns) in vocab::PREFIXES {
        out.push_str(&format!("@prefix {prefix}: <{ns}> .\n"));
    }
    out.push('\n');
}

/// `<stream> a ldes:EventStream ; ldes:timestampPath .. ; tree:view <..> .`
pub(crate) fn write_stream(out: &mut String, stream: &EventStream) {
    out.push_str(&format!(
        "<{}>\n    a ldes:EventStream ;\n    ldes:timestampPath {} ;\n    tree:view <{}> .\n\n",
        stream.iri,
        term(&stream.timestamp_path),
        stream.view
    ));
}

/// Stream declaration and membership links, the default-graph part of a
/// leaf in both Turtle and TriG.
pub(crate) fn write_leaf_header(out: &mut String, leaf: &LeafDocument<'_>) {
    if let Some(stream) = leaf.stream {
        write_stream(out, stream);
    }
    if let Some(member_of) = leaf.member_of {
        write_members(out, member_of, &leaf.members.subjects());
    }
}

/// `<stream> tree:member <a> , <b> .`
fn write_members(out: &mut String, stream: &str, subjects: &[&str]) {
    if subjects.is_empty() {
        return;
    }
    out.push_str(&format!("<{stream}> tree:member"));
    for (i, subject) in subjects.iter().enumerate() {
        if i > 0 {
            out.push_str(" ,\n   ");
        }
        out.push_str(&format!(" <{subject}>"));
    }
    out.push_str(" .\n\n");
}

pub(crate) fn write_observation(
    out: &mut String,
    obs: &Observation,
    id_predicate: &str,
    indent: &str,
) {
    out.push_str(&format!(
        "{indent}<{subject}>\n\
         {indent}    a sosa:Observation ;\n\
         {indent}    {id_pred} \"{id}\"^^xsd:integer ;\n\
         {indent}    sosa:hasSimpleResult \"{value}\"^^xsd:double ;\n\
         {indent}    sosa:observedProperty {property} ;\n\
         {indent}    sosa:resultTime \"{time}\"^^xsd:dateTime .\n",
        subject = obs.subject,
        id_pred = term(id_predicate),
        id = obs.id,
        value = double_lexical(obs.value),
        property = term(&obs.property),
        time = observation_time(obs.time),
    ));
}

/// A snippet with its point template as a nested blank node.
pub(crate) fn write_snippet(out: &mut String, snippet: &Snippet, indent: &str) {
    out.push_str(&format!(
        "{indent}<{subject}>\n\
         {indent}    a tss:Snippet ;\n\
         {indent}    tss:about [\n\
         {indent}        a tss:PointTemplate ;\n\
         {indent}        sosa:madeBySensor {sensor} ;\n\
         {indent}        sosa:observedProperty {property}\n\
         {indent}    ] ;\n\
         {indent}    tss:from \"{from}\"^^xsd:dateTime ;\n\
         {indent}    tss:to \"{to}\"^^xsd:dateTime ;\n\
         {indent}    tss:pointType \"{point_type}\" ;\n\
         {indent}    tss:points \"{points}\" .\n",
        subject = snippet.subject,
        sensor = term(&snippet.template.sensor),
        property = term(&snippet.template.property),
        from = observation_time(snippet.from),
        to = observation_time(snippet.to),
        point_type = escape_literal(&snippet.point_type),
        points = escape_literal(&snippet.points),
    ));
}

fn write_relation(out: &mut String, relation: &Relation) {
    out.push_str(&format!(
        "[\n        a {class} ;\n        tree:node <{node}> ;\n        tree:path {path} ;\n        tree:value \"{value}\"^^xsd:dateTime\n    ]",
        class = term(relation.kind.class_iri()),
        node = relation.target,
        path = term(&relation.path),
        value = xsd_date_time(relation.value),
    ));
}

/// Prefixed name when one of the shared prefixes applies, `<iri>` otherwise.
pub(crate) fn term(iri: &str) -> String {
    vocab::compact(iri).unwrap_or_else(|| format!("<{iri}>"))
}
