//! Graph source: loads the input RDF into memory and answers the
//! observation and snippet queries.
//!
//! The query is the fixed pattern
//!
//! ```sparql
//! SELECT ?obs ?id ?result ?property ?time WHERE {
//!     ?obs a sosa:Observation ;
//!          <identifier-predicate> ?id ;
//!          sosa:hasSimpleResult ?result ;
//!          sosa:observedProperty ?property ;
//!          sosa:resultTime ?time .
//! }
//! ```
//!
//! except that a missing property yields a row with that field empty instead
//! of no row at all, so the extractor can count incomplete observations.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use sophia_api::graph::Graph;
use sophia_api::parser::TripleParser;
use sophia_api::source::TripleSource;
use sophia_api::term::{Term, TermKind};
use sophia_api::triple::Triple;
use sophia_inmem::graph::LightGraph;
use sophia_iri::Iri;
use sophia_turtle::parser::turtle::TurtleParser;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::extract::{RawRow, RawSnippet, RawTemplate};
use crate::vocab;

/// Owned view of an RDF term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TermValue {
    /// An IRI.
    Iri(String),
    /// A blank node label.
    BlankNode(String),
    /// A literal with its datatype IRI.
    Literal {
        /// Lexical form.
        lexical: String,
        /// Datatype IRI, if the parser reported one.
        datatype: Option<String>,
    },
}

impl TermValue {
    /// Returns the IRI, blank node label or lexical form.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            TermValue::Iri(s) | TermValue::BlankNode(s) => s,
            TermValue::Literal { lexical, .. } => lexical,
        }
    }

    /// Returns the IRI if this term is one.
    #[must_use]
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            TermValue::Iri(s) => Some(s),
            _ => None,
        }
    }
}

/// Converts any sophia term into a [`TermValue`]; variables and quoted
/// triples yield `None`.
pub fn term_value<T: Term>(term: T) -> Option<TermValue> {
    match term.kind() {
        TermKind::Iri => term.iri().map(|iri| TermValue::Iri(iri.as_str().to_owned())),
        TermKind::BlankNode => term
            .bnode_id()
            .map(|id| TermValue::BlankNode(id.as_str().to_owned())),
        TermKind::Literal => term.lexical_form().map(|lexical| TermValue::Literal {
            lexical: String::from(&*lexical),
            datatype: term.datatype().map(|dt| dt.as_str().to_owned()),
        }),
        _ => None,
    }
}

/// Parses a Turtle (or N-Triples) document into an in-memory graph.
///
/// # Errors
///
/// Returns [`SourceError::BaseIri`] for an invalid base and
/// [`SourceError::Parse`] for syntax errors.
pub fn parse_turtle(
    content: &str,
    base: Option<&str>,
    origin: &str,
) -> Result<LightGraph, SourceError> {
    let base = base
        .map(|b| Iri::new(b.to_owned()).map_err(|_| SourceError::BaseIri(b.to_owned())))
        .transpose()?;
    TurtleParser { base }
        .parse_str(content)
        .collect_triples::<LightGraph>()
        .map_err(|e| SourceError::Parse {
            origin: origin.to_owned(),
            message: e.to_string(),
        })
}

/// An in-memory RDF graph holding the input observations.
pub struct GraphSource {
    graph: LightGraph,
    identifier_predicate: String,
}

impl GraphSource {
    /// Loads the Turtle/N-Triples file at `path`.
    ///
    /// Relative IRIs in the file are resolved against `base`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Read`] if the file cannot be read, otherwise
    /// the errors of [`parse_turtle`].
    pub fn from_path(
        path: &Path,
        base: Option<&str>,
        identifier_predicate: &str,
    ) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();
        let source = Self::from_turtle_str(&content, base, &origin, identifier_predicate)?;
        info!(input = %path.display(), triples = source.len(), "loaded source graph");
        Ok(source)
    }

    /// Parses an in-memory Turtle document.
    ///
    /// # Errors
    ///
    /// See [`parse_turtle`].
    pub fn from_turtle_str(
        content: &str,
        base: Option<&str>,
        origin: &str,
        identifier_predicate: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            graph: parse_turtle(content, base, origin)?,
            identifier_predicate: identifier_predicate.to_owned(),
        })
    }

    /// Number of triples in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.triples().count()
    }

    /// Returns `true` if the graph has no triples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the observation query, one row per `sosa:Observation` subject,
    /// ordered by subject.
    ///
    /// A subject with several values for one field contributes the smallest
    /// term, so repeated runs see identical rows.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Query`] if the graph cannot be iterated.
    pub fn rows(&self) -> Result<Vec<RawRow>, SourceError> {
        let scan = self.scan(&[
            self.identifier_predicate.as_str(),
            vocab::SOSA_HAS_SIMPLE_RESULT,
            vocab::SOSA_OBSERVED_PROPERTY,
            vocab::SOSA_RESULT_TIME,
        ])?;
        let rows: Vec<RawRow> = scan
            .instances(vocab::SOSA_OBSERVATION)
            .map(|subject| RawRow {
                id: scan.text(subject, &self.identifier_predicate),
                value: scan.text(subject, vocab::SOSA_HAS_SIMPLE_RESULT),
                property: scan.term(subject, vocab::SOSA_OBSERVED_PROPERTY),
                time: scan.text(subject, vocab::SOSA_RESULT_TIME),
                subject: Some(subject.clone()),
            })
            .collect();
        debug!(rows = rows.len(), "observation query complete");
        Ok(rows)
    }

    /// Runs the snippet query, one row per `tss:Snippet` subject, ordered
    /// by subject:
    ///
    /// ```sparql
    /// SELECT ?snippet ?from ?to ?pointType ?points ?sensor ?property WHERE {
    ///     ?snippet a tss:Snippet ;
    ///              tss:about ?template ;
    ///              tss:from ?from ;
    ///              tss:to ?to ;
    ///              tss:pointType ?pointType ;
    ///              tss:points ?points .
    ///     ?template a tss:PointTemplate ;
    ///               sosa:madeBySensor ?sensor ;
    ///               sosa:observedProperty ?property .
    /// }
    /// ```
    ///
    /// As with [`GraphSource::rows`], missing fields stay empty instead of
    /// dropping the row. `tss:about` objects not typed `tss:PointTemplate`
    /// leave the template empty.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Query`] if the graph cannot be iterated.
    pub fn snippet_rows(&self) -> Result<Vec<RawSnippet>, SourceError> {
        let scan = self.scan(&[
            vocab::TSS_ABOUT,
            vocab::TSS_FROM,
            vocab::TSS_TO,
            vocab::TSS_POINT_TYPE,
            vocab::TSS_POINTS,
            vocab::SOSA_MADE_BY_SENSOR,
            vocab::SOSA_OBSERVED_PROPERTY,
        ])?;
        let rows: Vec<RawSnippet> = scan
            .instances(vocab::TSS_SNIPPET)
            .map(|subject| {
                let template = scan
                    .term(subject, vocab::TSS_ABOUT)
                    .filter(|t| scan.is_a(t, vocab::TSS_POINT_TEMPLATE))
                    .map(|t| RawTemplate {
                        sensor: scan.term(&t, vocab::SOSA_MADE_BY_SENSOR),
                        property: scan.term(&t, vocab::SOSA_OBSERVED_PROPERTY),
                    });
                RawSnippet {
                    from: scan.text(subject, vocab::TSS_FROM),
                    to: scan.text(subject, vocab::TSS_TO),
                    point_type: scan.text(subject, vocab::TSS_POINT_TYPE),
                    points: scan.text(subject, vocab::TSS_POINTS),
                    template,
                    subject: Some(subject.clone()),
                }
            })
            .collect();
        debug!(rows = rows.len(), "snippet query complete");
        Ok(rows)
    }

    /// One pass over the graph collecting every `rdf:type` statement and,
    /// for the wanted predicates, the smallest object per subject.
    fn scan(&self, wanted: &[&str]) -> Result<Scan, SourceError> {
        let mut scan = Scan::default();
        for triple in self.graph.triples() {
            let triple = triple.map_err(|e| SourceError::Query(e.to_string()))?;
            let (Some(subject), Some(predicate), Some(object)) = (
                term_value(triple.s()),
                term_value(triple.p()),
                term_value(triple.o()),
            ) else {
                continue;
            };
            let Some(predicate) = predicate.as_iri() else {
                continue;
            };

            if predicate == vocab::RDF_TYPE {
                if let TermValue::Iri(class) = object {
                    scan.types.entry(class).or_default().insert(subject);
                }
                continue;
            }
            if !wanted.contains(&predicate) {
                continue;
            }
            match scan.values.entry((subject, predicate.to_owned())) {
                Entry::Occupied(mut slot) => {
                    if object < *slot.get() {
                        slot.insert(object);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(object);
                }
            }
        }
        Ok(scan)
    }
}

#[derive(Debug, Default)]
struct Scan {
    types: BTreeMap<String, BTreeSet<TermValue>>,
    values: BTreeMap<(TermValue, String), TermValue>,
}

impl Scan {
    fn instances<'a>(&'a self, class: &str) -> impl Iterator<Item = &'a TermValue> + 'a {
        self.types.get(class).into_iter().flatten()
    }

    fn is_a(&self, subject: &TermValue, class: &str) -> bool {
        self.types.get(class).is_some_and(|s| s.contains(subject))
    }

    fn term(&self, subject: &TermValue, predicate: &str) -> Option<TermValue> {
        self.values
            .get(&(subject.clone(), predicate.to_owned()))
            .cloned()
    }

    fn text(&self, subject: &TermValue, predicate: &str) -> Option<String> {
        self.term(subject, predicate).map(|t| t.text().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"
        @prefix sosa: <http://www.w3.org/ns/sosa/> .
        @prefix ex:   <http://example.org/> .
        @prefix xsd:  <http://www.w3.org/2001/XMLSchema#> .

        ex:obs1 a sosa:Observation ;
            ex:id "1"^^xsd:int ;
            sosa:hasSimpleResult "3.25"^^xsd:float ;
            sosa:observedProperty ex:waterLevel ;
            sosa:resultTime "2023-01-31T23:59:59Z"^^xsd:dateTime .

        <obs2> a sosa:Observation ;
            ex:id "2"^^xsd:int ;
            sosa:observedProperty ex:waterLevel ;
            sosa:resultTime "2023-02-01T00:00:00Z"^^xsd:dateTime .

        [] a sosa:Observation ;
            ex:id "3" ;
            sosa:hasSimpleResult "1" ;
            sosa:observedProperty ex:flow ;
            sosa:resultTime "2023-02-01T08:00:00Z" .

        ex:notAnObservation ex:id "99" .
    "#;

    fn source() -> GraphSource {
        let source = GraphSource::from_turtle_str(
            INPUT,
            Some("https://example.org/"),
            "inline",
            "http://example.org/id",
        );
        match source {
            Ok(s) => s,
            Err(e) => panic!("fixture should parse: {e}"),
        }
    }

    #[test]
    fn rows_cover_every_typed_observation() {
        let rows = match source().rows() {
            Ok(r) => r,
            Err(e) => panic!("query failed: {e}"),
        };
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.id.as_deref() != Some("99")));
    }

    #[test]
    fn relative_iris_resolve_against_base_and_missing_fields_stay_empty() {
        let rows = match source().rows() {
            Ok(r) => r,
            Err(e) => panic!("query failed: {e}"),
        };
        let obs2 = rows
            .iter()
            .find(|r| r.subject.as_ref().and_then(TermValue::as_iri) == Some("https://example.org/obs2"));
        let obs2 = match obs2 {
            Some(r) => r,
            None => panic!("obs2 should resolve against the base IRI: {rows:?}"),
        };
        assert_eq!(obs2.value, None);
        assert_eq!(obs2.time.as_deref(), Some("2023-02-01T00:00:00Z"));
    }

    #[test]
    fn blank_node_observations_have_no_subject_iri() {
        let rows = match source().rows() {
            Ok(r) => r,
            Err(e) => panic!("query failed: {e}"),
        };
        let blank = rows
            .iter()
            .filter(|r| matches!(r.subject, Some(TermValue::BlankNode(_))))
            .count();
        assert_eq!(blank, 1);
    }

    #[test]
    fn literal_properties_keep_their_term_kind() {
        let input = r#"
            @prefix sosa: <http://www.w3.org/ns/sosa/> .
            @prefix ex:   <http://example.org/> .
            ex:obs a sosa:Observation ;
                ex:id 1 ;
                sosa:hasSimpleResult 2.0 ;
                sosa:observedProperty "http://example.org/waterLevel" ;
                sosa:resultTime "2023-01-01T00:00:00Z" .
        "#;
        let rows = GraphSource::from_turtle_str(input, None, "inline", "http://example.org/id")
            .and_then(|s| s.rows());
        let rows = match rows {
            Ok(r) => r,
            Err(e) => panic!("query failed: {e}"),
        };
        assert!(matches!(rows[0].property, Some(TermValue::Literal { .. })));
    }

    const SNIPPETS: &str = r#"
        @prefix tss:  <https://w3id.org/tss#> .
        @prefix sosa: <http://www.w3.org/ns/sosa/> .
        @prefix ex:   <http://example.org/> .
        @prefix xsd:  <http://www.w3.org/2001/XMLSchema#> .

        ex:snip1 a tss:Snippet ;
            tss:about [
                a tss:PointTemplate ;
                sosa:madeBySensor ex:sensor1 ;
                sosa:observedProperty ex:waterLevel
            ] ;
            tss:from "2023-03-01T00:00:00Z"^^xsd:dateTime ;
            tss:to "2023-03-01T23:59:00Z"^^xsd:dateTime ;
            tss:pointType "float" ;
            tss:points '[{"value": 1.5}]' .

        ex:snip2 a tss:Snippet ;
            tss:about ex:untyped ;
            tss:from "2023-03-02T00:00:00Z"^^xsd:dateTime .

        ex:untyped sosa:madeBySensor ex:sensor2 .
    "#;

    #[test]
    fn snippet_rows_follow_the_point_template() {
        let rows = GraphSource::from_turtle_str(SNIPPETS, None, "inline", "http://example.org/id")
            .and_then(|s| s.snippet_rows());
        let rows = match rows {
            Ok(r) => r,
            Err(e) => panic!("query failed: {e}"),
        };
        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(first.from.as_deref(), Some("2023-03-01T00:00:00Z"));
        assert_eq!(first.points.as_deref(), Some("[{\"value\": 1.5}]"));
        let template = first.template.clone().unwrap_or_default();
        assert_eq!(
            template.sensor,
            Some(TermValue::Iri("http://example.org/sensor1".to_owned()))
        );
        assert_eq!(rows[1].template, None);
        assert_eq!(rows[1].to, None);
    }

    #[test]
    fn syntax_errors_are_reported_with_origin() {
        let err = GraphSource::from_turtle_str(
            "this is not turtle",
            None,
            "broken.ttl",
            "http://example.org/id",
        );
        match err {
            Err(SourceError::Parse { origin, .. }) => assert_eq!(origin, "broken.ttl"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("garbage should not parse"),
        }
    }
}
