//! N-Triples serializer.
//!
//! One triple per line, absolute IRIs only. Relation blank nodes are
//! labelled `_:r0`, `_:r1`, ... and snippet point templates `_:t0`, `_:t1`,
//! ... in document order so repeated runs produce identical bytes.

use super::{double_lexical, escape_literal, observation_time, xsd_date_time, LeafDocument};
use crate::model::{EventStream, MemberSlice, Observation, Snippet};
use crate::tree::NodeDocument;
use crate::vocab::{
    LDES_EVENT_STREAM, LDES_TIMESTAMP_PATH, RDF_TYPE, SOSA_HAS_SIMPLE_RESULT, SOSA_MADE_BY_SENSOR,
    SOSA_OBSERVATION, SOSA_OBSERVED_PROPERTY, SOSA_RESULT_TIME, TREE_MEMBER, TREE_NODE,
    TREE_NODE_CLASS, TREE_PATH, TREE_RELATION, TREE_VALUE, TREE_VIEW, TSS_ABOUT, TSS_FROM,
    TSS_POINTS, TSS_POINT_TEMPLATE, TSS_POINT_TYPE, TSS_SNIPPET, TSS_TO, XSD_DATE_TIME, XSD_DOUBLE,
    XSD_INTEGER,
};

/// Serializes a leaf data file to N-Triples.
#[must_use]
pub fn leaf(leaf: &LeafDocument<'_>) -> String {
    let mut out = String::with_capacity(256 + leaf.members.len() * 512);
    if let Some(stream) = leaf.stream {
        write_stream(&mut out, stream);
    }
    if let Some(member_of) = leaf.member_of {
        for subject in leaf.members.subjects() {
            triple(&mut out, &iri(member_of), TREE_MEMBER, &iri(subject));
        }
    }
    match leaf.members {
        MemberSlice::Observations(observations) => {
            for obs in observations {
                write_observation(&mut out, obs, leaf.identifier_predicate);
            }
        }
        MemberSlice::Snippets(snippets) => {
            for (i, snippet) in snippets.iter().enumerate() {
                write_snippet(&mut out, snippet, &format!("_:t{i}"));
            }
        }
    }
    out
}

/// Serializes an internal node's metadata document to N-Triples.
#[must_use]
pub fn metadata(doc: &NodeDocument) -> String {
    let mut out = String::with_capacity(256 + doc.relations.len() * 384);

    if let Some(stream) = &doc.event_stream {
        write_stream(&mut out, stream);
    }

    let node = iri(&doc.iri);
    triple(&mut out, &node, RDF_TYPE, &iri(TREE_NODE_CLASS));
    for (i, relation) in doc.relations.iter().enumerate() {
        let bnode = format!("_:r{i}");
        triple(&mut out, &node, TREE_RELATION, &bnode);
        triple(&mut out, &bnode, RDF_TYPE, &iri(relation.kind.class_iri()));
        triple(&mut out, &bnode, TREE_NODE, &iri(&relation.target));
        triple(&mut out, &bnode, TREE_PATH, &iri(&relation.path));
        triple(
            &mut out,
            &bnode,
            TREE_VALUE,
            &lit(&xsd_date_time(relation.value), XSD_DATE_TIME),
        );
    }
    out
}

fn write_stream(out: &mut String, stream: &EventStream) {
    let s = iri(&stream.iri);
    triple(out, &s, RDF_TYPE, &iri(LDES_EVENT_STREAM));
    triple(out, &s, LDES_TIMESTAMP_PATH, &iri(&stream.timestamp_path));
    triple(out, &s, TREE_VIEW, &iri(&stream.view));
}

fn write_observation(out: &mut String, obs: &Observation, id_predicate: &str) {
    let s = iri(&obs.subject);
    triple(out, &s, RDF_TYPE, &iri(SOSA_OBSERVATION));
    triple(out, &s, id_predicate, &lit(&obs.id.to_string(), XSD_INTEGER));
    triple(out, &s, SOSA_HAS_SIMPLE_RESULT, &lit(&double_lexical(obs.value), XSD_DOUBLE));
    triple(out, &s, SOSA_OBSERVED_PROPERTY, &iri(&obs.property));
    triple(out, &s, SOSA_RESULT_TIME, &lit(&observation_time(obs.time), XSD_DATE_TIME));
}

fn write_snippet(out: &mut String, snippet: &Snippet, template: &str) {
    let s = iri(&snippet.subject);
    triple(out, &s, RDF_TYPE, &iri(TSS_SNIPPET));
    triple(out, &s, TSS_ABOUT, template);
    triple(out, &s, TSS_FROM, &lit(&observation_time(snippet.from), XSD_DATE_TIME));
    triple(out, &s, TSS_TO, &lit(&observation_time(snippet.to), XSD_DATE_TIME));
    triple(out, &s, TSS_POINT_TYPE, &plain(&snippet.point_type));
    triple(out, &s, TSS_POINTS, &plain(&snippet.points));
    triple(out, template, RDF_TYPE, &iri(TSS_POINT_TEMPLATE));
    triple(out, template, SOSA_MADE_BY_SENSOR, &iri(&snippet.template.sensor));
    triple(out, template, SOSA_OBSERVED_PROPERTY, &iri(&snippet.template.property));
}

/// Appends `subj <pred> obj .`; `subj` and `obj` are already-formatted terms.
fn triple(out: &mut String, subj: &str, pred: &str, obj: &str) {
    out.push_str(subj);
    out.push_str(" <");
    out.push_str(pred);
    out.push_str("> ");
    out.push_str(obj);
    out.push_str(" .\n");
}

fn iri(s: &str) -> String {
    format!("<{s}>")
}

fn lit(lexical: &str, datatype: &str) -> String {
    format!("\"{lexical}\"^^<{datatype}>")
}

fn plain(value: &str) -> String {
    format!("\"{}\"", escape_literal(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FragmentId, PointTemplate, Relation, RelationKind};
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn month_document() -> NodeDocument {
        let day = |d| {
            Utc.with_ymd_and_hms(2023, 1, d, 0, 0, 0)
                .single()
                .unwrap_or_default()
        };
        let target = "https://example.org/LDES/2023/01/31/readings.nt".to_owned();
        NodeDocument {
            node: FragmentId::Month { year: 2023, month: 1 },
            path: PathBuf::from("LDES/2023/01/01.nt"),
            iri: "https://example.org/LDES/2023/01/01.nt".to_owned(),
            event_stream: None,
            relations: vec![
                Relation {
                    kind: RelationKind::GreaterThanOrEqual,
                    value: day(31),
                    target: target.clone(),
                    path: SOSA_RESULT_TIME.to_owned(),
                },
                Relation {
                    kind: RelationKind::LessThan,
                    value: day(31) + chrono::Duration::days(1),
                    target,
                    path: SOSA_RESULT_TIME.to_owned(),
                },
            ],
        }
    }

    #[test]
    fn every_line_is_a_terminated_triple() {
        let nt = metadata(&month_document());
        assert!(!nt.is_empty());
        for line in nt.lines() {
            assert!(line.ends_with(" ."), "Line does not end with ' .': {line}");
            assert!(line.starts_with('<') || line.starts_with("_:r"), "{line}");
        }
    }

    #[test]
    fn relation_blank_nodes_are_numbered_in_order() {
        let nt = metadata(&month_document());
        assert!(nt.contains(&format!("_:r0 <{RDF_TYPE}> <{}>", RelationKind::GreaterThanOrEqual.class_iri())));
        assert!(nt.contains(&format!("_:r1 <{RDF_TYPE}> <{}>", RelationKind::LessThan.class_iri())));
        assert!(nt.contains(&format!(
            "_:r1 <{TREE_VALUE}> \"2023-02-01T00:00:00Z\"^^<{XSD_DATE_TIME}>"
        )));
    }

    #[test]
    fn leaf_lists_members_before_observations() {
        let observations = [Observation {
            subject: "https://example.org/obs/9".to_owned(),
            id: 9,
            value: 0.5,
            property: "https://example.org/p".to_owned(),
            time: Utc
                .with_ymd_and_hms(2023, 2, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        }];
        let nt = leaf(&LeafDocument {
            stream: None,
            member_of: Some("https://example.org/LDES/LDES#eventstream"),
            identifier_predicate: "http://example.org/id",
            members: MemberSlice::Observations(&observations),
        });
        let first = nt.lines().next().unwrap_or_default();
        assert!(first.contains(TREE_MEMBER), "{first}");
        assert!(nt.contains("\"9\"^^<http://www.w3.org/2001/XMLSchema#integer>"));
        assert_eq!(nt.lines().count(), 6);
    }

    #[test]
    fn snippet_templates_get_numbered_blank_nodes() {
        let from = Utc
            .with_ymd_and_hms(2023, 3, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        let snippet = |n: u32| Snippet {
            subject: format!("https://example.org/snippet/{n}"),
            from,
            to: from,
            point_type: "float".to_owned(),
            points: "[\"a\"]".to_owned(),
            template: PointTemplate {
                sensor: "https://example.org/sensor/s1".to_owned(),
                property: "https://example.org/p".to_owned(),
            },
        };
        let snippets = [snippet(1), snippet(2)];
        let stream = EventStream {
            iri: "https://example.org/LDES/LDES#eventstream".to_owned(),
            timestamp_path: TSS_FROM.to_owned(),
            view: "https://example.org/LDES/LDES.nt".to_owned(),
        };
        let nt = leaf(&LeafDocument {
            stream: Some(&stream),
            member_of: None,
            identifier_predicate: "http://example.org/id",
            members: MemberSlice::Snippets(&snippets),
        });
        assert!(nt.starts_with("<https://example.org/LDES/LDES#eventstream> "));
        assert!(nt.contains(&format!("<https://example.org/snippet/2> <{TSS_ABOUT}> _:t1 .")));
        assert!(nt.contains(&format!("_:t0 <{RDF_TYPE}> <{TSS_POINT_TEMPLATE}> .")));
        assert!(nt.contains(&format!("<{TSS_POINTS}> \"[\\\"a\\\"]\" .")));
        for line in nt.lines() {
            assert!(line.ends_with(" ."), "{line}");
        }
        // 3 stream triples, 9 per snippet
        assert_eq!(nt.lines().count(), 21);
    }
}
