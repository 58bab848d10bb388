//! Vocabulary IRIs used in the source graph and in generated documents.
//!
//! Only W3C / community vocabulary terms live here. Deployment-specific
//! IRIs (base IRI, event stream, identifier predicate) are part of
//! [`FragmenterConfig`](crate::FragmenterConfig).

/// `rdf:` namespace.
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
/// `xsd:` namespace.
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
/// `sosa:` namespace.
pub const SOSA: &str = "http://www.w3.org/ns/sosa/";
/// `ldes:` namespace.
pub const LDES: &str = "https://w3id.org/ldes#";
/// `tree:` namespace.
pub const TREE: &str = "https://w3id.org/tree#";
/// `tss:` (time series snippet) namespace.
pub const TSS: &str = "https://w3id.org/tss#";

/// `rdf:type`.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// `xsd:integer`.
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
/// `xsd:double`.
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
/// `xsd:dateTime`.
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

/// `sosa:Observation`.
pub const SOSA_OBSERVATION: &str = "http://www.w3.org/ns/sosa/Observation";
/// `sosa:hasSimpleResult`.
pub const SOSA_HAS_SIMPLE_RESULT: &str = "http://www.w3.org/ns/sosa/hasSimpleResult";
/// `sosa:observedProperty`.
pub const SOSA_OBSERVED_PROPERTY: &str = "http://www.w3.org/ns/sosa/observedProperty";
/// `sosa:resultTime`.
pub const SOSA_RESULT_TIME: &str = "http://www.w3.org/ns/sosa/resultTime";
/// `sosa:madeBySensor`.
pub const SOSA_MADE_BY_SENSOR: &str = "http://www.w3.org/ns/sosa/madeBySensor";

/// `tss:Snippet`.
pub const TSS_SNIPPET: &str = "https://w3id.org/tss#Snippet";
/// `tss:PointTemplate`.
pub const TSS_POINT_TEMPLATE: &str = "https://w3id.org/tss#PointTemplate";
/// `tss:about` (snippet to point template).
pub const TSS_ABOUT: &str = "https://w3id.org/tss#about";
/// `tss:from`, start of the snippet's time span.
pub const TSS_FROM: &str = "https://w3id.org/tss#from";
/// `tss:to`, end of the snippet's time span.
pub const TSS_TO: &str = "https://w3id.org/tss#to";
/// `tss:pointType`.
pub const TSS_POINT_TYPE: &str = "https://w3id.org/tss#pointType";
/// `tss:points`, the JSON-encoded point array.
pub const TSS_POINTS: &str = "https://w3id.org/tss#points";

/// `ldes:EventStream`.
pub const LDES_EVENT_STREAM: &str = "https://w3id.org/ldes#EventStream";
/// `ldes:timestampPath`.
pub const LDES_TIMESTAMP_PATH: &str = "https://w3id.org/ldes#timestampPath";

/// `tree:Node`.
pub const TREE_NODE_CLASS: &str = "https://w3id.org/tree#Node";
/// `tree:view`.
pub const TREE_VIEW: &str = "https://w3id.org/tree#view";
/// `tree:member`.
pub const TREE_MEMBER: &str = "https://w3id.org/tree#member";
/// `tree:relation`.
pub const TREE_RELATION: &str = "https://w3id.org/tree#relation";
/// `tree:GreaterThanOrEqualToRelation`.
pub const TREE_GREATER_THAN_OR_EQUAL_TO_RELATION: &str =
    "https://w3id.org/tree#GreaterThanOrEqualToRelation";
/// `tree:LessThanRelation`.
pub const TREE_LESS_THAN_RELATION: &str = "https://w3id.org/tree#LessThanRelation";
/// `tree:node` (relation target).
pub const TREE_NODE: &str = "https://w3id.org/tree#node";
/// `tree:path` (relation comparison path).
pub const TREE_PATH: &str = "https://w3id.org/tree#path";
/// `tree:value` (relation bound value).
pub const TREE_VALUE: &str = "https://w3id.org/tree#value";

/// Prefix declarations shared by every Turtle/TriG document, in output order.
pub const PREFIXES: &[(&str, &str)] = &[
    ("rdf", RDF),
    ("xsd", XSD),
    ("sosa", SOSA),
    ("ldes", LDES),
    ("tree", TREE),
    ("tss", TSS),
];

/// Compacts `iri` against [`PREFIXES`], returning `None` when no prefix
/// applies or the local part is not a plain Turtle local name.
#[must_use]
pub fn compact(iri: &str) -> Option<String> {
    PREFIXES.iter().find_map(|(prefix, ns)| {
        let local = iri.strip_prefix(ns)?;
        let plain = !local.is_empty()
            && local.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && local.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        plain.then(|| format!("{prefix}:{local}"))
    })
}
