//! Output layout: the single builder for every artifact path and IRI.
//!
//! ```text
//! {base}/{stream}.{ext}                        root metadata document
//! {base}/{yyyy}/{yyyy}.{ext}                   year metadata document
//! {base}/{yyyy}/{mm}/{mm}.{ext}                month metadata document
//! {base}/{yyyy}/{mm}/{dd}/{leaf}.{ext}         leaf data file
//! ```
//!
//! IRIs mirror the relative paths under the configured base IRI.

use std::path::{Component, Path, PathBuf};

use crate::config::{FragmenterConfig, OutputFormat};
use crate::model::{BucketKey, EventStream, FragmentId};

/// Name of the advisory lock file inside the output directory.
pub const LOCK_FILE: &str = ".ldes.lock";

/// Resolves fragment identities to paths and IRIs for one configuration.
#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    config: &'a FragmenterConfig,
}

impl<'a> Layout<'a> {
    /// Creates a layout over `config`.
    #[must_use]
    pub fn new(config: &'a FragmenterConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration this layout resolves against.
    #[must_use]
    pub fn config(&self) -> &'a FragmenterConfig {
        self.config
    }

    /// Returns the output directory.
    #[must_use]
    pub fn base_dir(&self) -> &'a Path {
        &self.config.output_dir
    }

    /// Returns the path segments of `id` relative to the output directory in
    /// the configured format.
    #[must_use]
    pub fn segments(&self, id: FragmentId) -> Vec<String> {
        self.segments_as(id, self.config.format)
    }

    fn segments_as(&self, id: FragmentId, format: OutputFormat) -> Vec<String> {
        let ext = format.extension();
        match id {
            FragmentId::Root => vec![format!("{}.{ext}", self.config.stream_name)],
            FragmentId::Year(year) => {
                let y = format!("{year:04}");
                vec![y.clone(), format!("{y}.{ext}")]
            }
            FragmentId::Month { year, month } => {
                let m = format!("{month:02}");
                vec![format!("{year:04}"), m.clone(), format!("{m}.{ext}")]
            }
            FragmentId::Day(key) => vec![
                format!("{:04}", key.year),
                format!("{:02}", key.month),
                format!("{:02}", key.day),
                format!("{}.{ext}", self.config.leaf_name),
            ],
        }
    }

    /// Returns the path of `id`'s document relative to the output directory.
    #[must_use]
    pub fn relative_path(&self, id: FragmentId) -> PathBuf {
        self.segments(id).iter().collect()
    }

    /// Returns the on-disk path of `id`'s document.
    #[must_use]
    pub fn path(&self, id: FragmentId) -> PathBuf {
        self.base_dir().join(self.relative_path(id))
    }

    /// Returns the on-disk path of the leaf data file for `key`.
    #[must_use]
    pub fn leaf_path(&self, key: BucketKey) -> PathBuf {
        self.path(FragmentId::Day(key))
    }

    /// Returns the published IRI of `id`'s document.
    #[must_use]
    pub fn iri(&self, id: FragmentId) -> String {
        format!("{}{}", self.config.base_iri, self.segments(id).join("/"))
    }

    /// Returns the IRI of the `ldes:EventStream` resource.
    #[must_use]
    pub fn event_stream_iri(&self) -> String {
        format!("{}{}#eventstream", self.config.base_iri, self.config.stream_name)
    }

    /// Returns the event stream descriptor declared by the root document.
    #[must_use]
    pub fn event_stream(&self) -> EventStream {
        EventStream {
            iri: self.event_stream_iri(),
            timestamp_path: self.config.timestamp_path().to_owned(),
            view: self.iri(FragmentId::Root),
        }
    }

    /// Mints an IRI under `{base}{collection}/` for a member the source only
    /// gave a blank node. Characters outside the unreserved set are
    /// percent-encoded, so the result is always a valid IRI.
    #[must_use]
    pub fn mint_iri(&self, collection: &str, local: &str) -> String {
        let mut iri = format!("{}{collection}/", self.config.base_iri);
        for byte in local.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
                iri.push(char::from(byte));
            } else {
                iri.push_str(&format!("%{byte:02X}"));
            }
        }
        iri
    }

    /// Returns the path of the advisory lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.base_dir().join(LOCK_FILE)
    }

    /// Recognises a generated artifact from its path relative to the output
    /// directory, in any supported format.
    ///
    /// Returns `None` for anything this layout would not have produced,
    /// including files whose directory names are not canonical
    /// (`2023/1/...`) or whose date is not a real calendar date.
    #[must_use]
    pub fn classify(&self, relative: &Path) -> Option<(FragmentId, OutputFormat)> {
        let parts: Vec<&str> = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;

        let id = match parts.as_slice() {
            [_] => FragmentId::Root,
            [y, _] => FragmentId::Year(number(y, 4)?),
            [y, m, _] => FragmentId::Month {
                year: number(y, 4)?,
                month: number(m, 2)?,
            },
            [y, m, d, _] => FragmentId::Day(BucketKey::new(number(y, 4)?, number(m, 2)?, number(d, 2)?)),
            _ => return None,
        };
        if crate::boundary::fragment_bounds(id).is_err() && id != FragmentId::Root {
            return None;
        }
        OutputFormat::ALL.into_iter().find_map(|format| {
            let expected = self.segments_as(id, format);
            (expected.len() == parts.len() && expected.iter().zip(&parts).all(|(a, b)| a == b))
                .then_some((id, format))
        })
    }
}

fn number<T: std::str::FromStr>(segment: &str, width: usize) -> Option<T> {
    if segment.len() == width && segment.bytes().all(|b| b.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}
