//! TriG serializer.
//!
//! Metadata documents are plain Turtle, which is valid TriG (default graph
//! only). Leaf documents keep the stream declaration and membership in the
//! default graph and place each member in a named graph named after it.
//! Snippets also repeat their `tss:from` in the default graph so a client
//! can order members without opening the named graphs.

use super::observation_time;
use super::turtle::{write_leaf_header, write_observation, write_prefixes, write_snippet};
use super::LeafDocument;
use crate::model::MemberSlice;
use crate::tree::NodeDocument;

/// Serializes a leaf data file to TriG.
#[must_use]
pub fn leaf(leaf: &LeafDocument<'_>) -> String {
    let mut out = String::with_capacity(256 + leaf.members.len() * 360);
    write_prefixes(&mut out);
    write_leaf_header(&mut out, leaf);

    match leaf.members {
        MemberSlice::Observations(observations) => {
            for obs in observations {
                out.push_str(&format!("<{}> {{\n", obs.subject));
                write_observation(&mut out, obs, leaf.identifier_predicate, "    ");
                out.push_str("}\n\n");
            }
        }
        MemberSlice::Snippets(snippets) => {
            for snippet in snippets {
                out.push_str(&format!(
                    "<{}> tss:from \"{}\"^^xsd:dateTime .\n\n",
                    snippet.subject,
                    observation_time(snippet.from)
                ));
            }
            for snippet in snippets {
                out.push_str(&format!("<{}> {{\n", snippet.subject));
                write_snippet(&mut out, snippet, "    ");
                out.push_str("}\n\n");
            }
        }
    }
    out
}

/// Serializes an internal node's metadata document to TriG.
#[must_use]
pub fn metadata(doc: &NodeDocument) -> String {
    super::turtle::metadata(doc)
}
