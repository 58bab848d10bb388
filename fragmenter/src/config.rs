//! Run configuration.
//!
//! A single immutable [`FragmenterConfig`] is threaded through every stage.
//! It can be loaded from a TOML file; every field has a default so a file
//! only needs the values it overrides:
//!
//! ```toml
//! output_dir = "LDES"
//! base_iri = "https://example.github.io/usecase/LDES/"
//! stream_name = "LDES"
//! format = "trig"
//! source = "snippets"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sophia_iri::Iri;

use crate::error::ConfigError;
use crate::vocab;

/// Serialization format of every generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Turtle 1.1 (`.ttl`).
    #[default]
    Turtle,
    /// N-Triples (`.nt`).
    NTriples,
    /// TriG (`.trig`); leaf observations are placed in per-observation named graphs.
    TriG,
}

impl OutputFormat {
    /// All supported formats.
    pub const ALL: [OutputFormat; 3] = [
        OutputFormat::Turtle,
        OutputFormat::NTriples,
        OutputFormat::TriG,
    ];

    /// Returns the file extension (without the dot).
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Turtle => "ttl",
            OutputFormat::NTriples => "nt",
            OutputFormat::TriG => "trig",
        }
    }

    /// Returns the name accepted in configuration files and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Turtle => "turtle",
            OutputFormat::NTriples => "ntriples",
            OutputFormat::TriG => "trig",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(OutputFormat::Turtle),
            "ntriples" | "nt" => Ok(OutputFormat::NTriples),
            "trig" => Ok(OutputFormat::TriG),
            _ => Err(ConfigError::UnknownFormat(s.to_owned())),
        }
    }
}

/// Kind of stream member read from the input graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `sosa:Observation` resources with a single simple result.
    #[default]
    Observations,
    /// `tss:Snippet` resources carrying a JSON array of points.
    Snippets,
}

impl SourceKind {
    /// Returns the name accepted in configuration files and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Observations => "observations",
            SourceKind::Snippets => "snippets",
        }
    }

    /// Property members of this kind are ordered by when no
    /// `timestamp_path` is configured.
    #[must_use]
    pub fn default_timestamp_path(self) -> &'static str {
        match self {
            SourceKind::Observations => vocab::SOSA_RESULT_TIME,
            SourceKind::Snippets => vocab::TSS_FROM,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "observations" | "sosa" => Ok(SourceKind::Observations),
            "snippets" | "tss" => Ok(SourceKind::Snippets),
            _ => Err(ConfigError::UnknownSource(s.to_owned())),
        }
    }
}

/// Configuration of one fragmentation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FragmenterConfig {
    /// Directory the fragment tree is written to (`{base}` in the layout).
    pub output_dir: PathBuf,
    /// IRI at which `output_dir` is published. Must end in `/`.
    pub base_iri: String,
    /// Name of the root document and of the event stream resource.
    pub stream_name: String,
    /// Output serialization.
    pub format: OutputFormat,
    /// Kind of member read from the input.
    pub source: SourceKind,
    /// File stem of leaf data files.
    pub leaf_name: String,
    /// Property the event stream is ordered by and relations compare
    /// against. Defaults per [`SourceKind`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_path: Option<String>,
    /// Predicate carrying the integer observation identifier.
    pub identifier_predicate: String,
    /// Hold an advisory lock file on the output directory during the run.
    pub lock: bool,
    /// Declare `tree:member` links from the event stream in every leaf.
    pub leaf_members: bool,
    /// Repeat the event stream declaration (type, timestamp path, view) in
    /// every leaf.
    pub leaf_stream: bool,
}

impl Default for FragmenterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("LDES"),
            base_iri: "https://example.org/LDES/".to_owned(),
            stream_name: "LDES".to_owned(),
            format: OutputFormat::default(),
            source: SourceKind::default(),
            leaf_name: "readings".to_owned(),
            timestamp_path: None,
            identifier_predicate: "http://example.org/id".to_owned(),
            lock: true,
            leaf_members: true,
            leaf_stream: true,
        }
    }
}

impl FragmenterConfig {
    /// Returns the configured timestamp path or the source kind's default.
    #[must_use]
    pub fn timestamp_path(&self) -> &str {
        self.timestamp_path
            .as_deref()
            .unwrap_or_else(|| self.source.default_timestamp_path())
    }

    /// Parses and validates a TOML configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] when a value fails validation.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: FragmenterConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
    /// the errors of [`FragmenterConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Checks the invariants the layout and serializers rely on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(invalid("output_dir", "must not be empty"));
        }
        if !self.base_iri.contains("://") || !self.base_iri.ends_with('/') {
            return Err(invalid(
                "base_iri",
                format!("`{}` must be an absolute IRI ending in `/`", self.base_iri),
            ));
        }
        check_segment("stream_name", &self.stream_name)?;
        check_segment("leaf_name", &self.leaf_name)?;
        if self.stream_name.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(
                "stream_name",
                "must not be purely numeric (it would collide with year directories)",
            ));
        }
        for (field, iri) in [
            ("timestamp_path", self.timestamp_path()),
            ("identifier_predicate", self.identifier_predicate.as_str()),
        ] {
            if Iri::new(iri).is_err() {
                return Err(invalid(field, format!("`{iri}` is not an absolute IRI")));
            }
        }
        Ok(())
    }
}

fn check_segment(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("`{value}` must be a non-empty ASCII name ([A-Za-z0-9_-])"),
        ))
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(FragmenterConfig::default().validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_given_fields() {
        let config = FragmenterConfig::from_toml_str(
            "base_iri = \"https://host.example/LDESTSS/\"\nformat = \"trig\"\n",
            Path::new("test.toml"),
        );
        let config = match config {
            Ok(c) => c,
            Err(e) => panic!("config should parse: {e}"),
        };
        assert_eq!(config.base_iri, "https://host.example/LDESTSS/");
        assert_eq!(config.format, OutputFormat::TriG);
        assert_eq!(config.leaf_name, "readings");
        assert_eq!(config.timestamp_path(), vocab::SOSA_RESULT_TIME);
        assert!(config.leaf_stream);
    }

    #[test]
    fn snippet_source_orders_by_span_start() {
        let config = FragmenterConfig::from_toml_str("source = \"snippets\"\n", Path::new("t.toml"));
        let config = match config {
            Ok(c) => c,
            Err(e) => panic!("config should parse: {e}"),
        };
        assert_eq!(config.source, SourceKind::Snippets);
        assert_eq!(config.timestamp_path(), vocab::TSS_FROM);

        let pinned = FragmenterConfig {
            timestamp_path: Some(vocab::SOSA_RESULT_TIME.to_owned()),
            ..config
        };
        assert_eq!(pinned.timestamp_path(), vocab::SOSA_RESULT_TIME);
    }

    #[test]
    fn malformed_predicate_iris_are_rejected() {
        let config = FragmenterConfig {
            identifier_predicate: "urn:ex:a^b".to_owned(),
            ..FragmenterConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "identifier_predicate", .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FragmenterConfig::from_toml_str("bogus = 1\n", Path::new("x.toml"));
        assert!(matches!(err, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn base_iri_must_end_with_slash() {
        let config = FragmenterConfig {
            base_iri: "https://example.org/LDES".to_owned(),
            ..FragmenterConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "base_iri", .. })
        ));
    }

    #[test]
    fn numeric_stream_name_is_rejected() {
        let config = FragmenterConfig {
            stream_name: "2023".to_owned(),
            ..FragmenterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn format_parses_names_and_extensions() {
        assert_eq!("TriG".parse::<OutputFormat>().ok(), Some(OutputFormat::TriG));
        assert_eq!("nt".parse::<OutputFormat>().ok(), Some(OutputFormat::NTriples));
        assert!("jsonld".parse::<OutputFormat>().is_err());
        assert_eq!("TSS".parse::<SourceKind>().ok(), Some(SourceKind::Snippets));
        assert!("csv".parse::<SourceKind>().is_err());
    }
}
