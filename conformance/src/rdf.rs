//! Re-reads generated documents as flat statement lists.
//!
//! Turtle and N-Triples go through the same parser the fragmenter uses for
//! its input; TriG is parsed as a dataset and its graph names are dropped.
//! A statement asserted in several graphs is kept once.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use ldes_fragmenter::source::{parse_turtle, term_value, TermValue};
use ldes_fragmenter::OutputFormat;
use sophia_api::dataset::Dataset;
use sophia_api::graph::Graph;
use sophia_api::parser::QuadParser;
use sophia_api::quad::Quad;
use sophia_api::source::QuadSource;
use sophia_api::triple::Triple;
use sophia_inmem::dataset::LightDataset;
use sophia_turtle::parser::trig::TriGParser;

/// `[subject, predicate, object]`.
pub type Statement = [TermValue; 3];

/// A parsed document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Every distinct statement in the document, graph names ignored.
    pub statements: Vec<Statement>,
}

impl Document {
    /// Parses `content` in `format`.
    ///
    /// # Errors
    ///
    /// Returns the parser diagnostic as a string.
    pub fn parse(content: &str, format: OutputFormat, origin: &str) -> Result<Self, String> {
        let mut statements = Statements::default();
        match format {
            OutputFormat::Turtle | OutputFormat::NTriples => {
                let graph = parse_turtle(content, None, origin).map_err(|e| e.to_string())?;
                for t in graph.triples() {
                    let t = t.map_err(|e| e.to_string())?;
                    push(&mut statements, term_value(t.s()), term_value(t.p()), term_value(t.o()));
                }
            }
            OutputFormat::TriG => {
                let dataset = TriGParser { base: None }
                    .parse_str(content)
                    .collect_quads::<LightDataset>()
                    .map_err(|e| format!("failed to parse {origin}: {e}"))?;
                for q in dataset.quads() {
                    let q = q.map_err(|e| e.to_string())?;
                    push(&mut statements, term_value(q.s()), term_value(q.p()), term_value(q.o()));
                }
            }
        }
        Ok(Self {
            statements: statements.list,
        })
    }

    /// Objects of `subject` `predicate` statements.
    pub fn objects<'a>(
        &'a self,
        subject: &'a TermValue,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a TermValue> + 'a {
        self.statements
            .iter()
            .filter(move |[s, p, _]| s == subject && p.as_iri() == Some(predicate))
            .map(|[_, _, o]| o)
    }

    /// The single object of `subject` `predicate`, or `None` if there is not
    /// exactly one.
    pub fn object<'a>(
        &'a self,
        subject: &'a TermValue,
        predicate: &'a str,
    ) -> Option<&'a TermValue> {
        let mut objects = self.objects(subject, predicate);
        let first = objects.next()?;
        objects.next().is_none().then_some(first)
    }

    /// Subjects with `rdf:type class`, each once, in document order.
    pub fn instances_of(&self, class: &str) -> Vec<&TermValue> {
        let mut found: Vec<&TermValue> = Vec::new();
        for [s, p, o] in &self.statements {
            if p.as_iri() == Some(ldes_fragmenter::vocab::RDF_TYPE)
                && o.as_iri() == Some(class)
                && !found.contains(&s)
            {
                found.push(s);
            }
        }
        found
    }
}

/// Reads and parses the document at `path`.
///
/// The outer result fails on I/O errors; the inner one carries parse errors
/// so the caller can report them as check failures.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn load(path: &Path, format: OutputFormat) -> Result<Result<Document, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Document::parse(&content, format, &path.display().to_string()))
}

#[derive(Default)]
struct Statements {
    list: Vec<Statement>,
    seen: BTreeSet<Statement>,
}

fn push(
    out: &mut Statements,
    s: Option<TermValue>,
    p: Option<TermValue>,
    o: Option<TermValue>,
) {
    if let (Some(s), Some(p), Some(o)) = (s, p, o) {
        let statement = [s, p, o];
        if out.seen.insert(statement.clone()) {
            out.list.push(statement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trig_graph_contents_are_flattened() {
        let doc = Document::parse(
            "<http://e.org/g> { <http://e.org/s> <http://e.org/p> \"1\" . }\n\
             <http://e.org/a> <http://e.org/p> <http://e.org/b> .\n",
            OutputFormat::TriG,
            "inline",
        );
        let doc = match doc {
            Ok(d) => d,
            Err(e) => panic!("should parse: {e}"),
        };
        assert_eq!(doc.statements.len(), 2);
        let s = TermValue::Iri("http://e.org/s".to_owned());
        assert_eq!(doc.object(&s, "http://e.org/p").map(TermValue::text), Some("1"));
    }

    #[test]
    fn statements_repeated_across_graphs_are_kept_once() {
        let doc = Document::parse(
            "<http://e.org/g> { <http://e.org/s> <http://e.org/p> \"1\" . }\n\
             <http://e.org/s> <http://e.org/p> \"1\" .\n",
            OutputFormat::TriG,
            "inline",
        );
        let doc = match doc {
            Ok(d) => d,
            Err(e) => panic!("should parse: {e}"),
        };
        assert_eq!(doc.statements.len(), 1);
        let s = TermValue::Iri("http://e.org/s".to_owned());
        assert!(doc.object(&s, "http://e.org/p").is_some());
    }

    #[test]
    fn parse_errors_are_returned_not_raised() {
        assert!(Document::parse("<broken", OutputFormat::Turtle, "x.ttl").is_err());
    }
}
