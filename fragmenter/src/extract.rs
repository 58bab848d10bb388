//! Member extractor: raw query rows to [`Observation`] and [`Snippet`]
//! records.
//!
//! A row missing any required field, or whose fields do not parse, is
//! dropped and counted by [`SkipReason`]. Skipping is never fatal.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use sophia_iri::Iri;
use tracing::{debug, warn};

use crate::layout::Layout;
use crate::model::{Member, Observation, PointTemplate, Snippet};
use crate::source::TermValue;

/// One row of the observation query. Literal fields hold their lexical
/// form; subject and property keep the term kind so a literal or a blank
/// node can be told apart from an IRI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// The observation resource; `None` when the row has no subject term.
    pub subject: Option<TermValue>,
    /// Identifier literal.
    pub id: Option<String>,
    /// Simple result literal.
    pub value: Option<String>,
    /// Observed property.
    pub property: Option<TermValue>,
    /// Result time literal.
    pub time: Option<String>,
}

/// The `tss:PointTemplate` a snippet row points at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTemplate {
    /// `sosa:madeBySensor` object.
    pub sensor: Option<TermValue>,
    /// `sosa:observedProperty` object.
    pub property: Option<TermValue>,
}

/// One row of the snippet query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSnippet {
    /// The snippet resource.
    pub subject: Option<TermValue>,
    /// `tss:from` literal.
    pub from: Option<String>,
    /// `tss:to` literal.
    pub to: Option<String>,
    /// `tss:pointType` literal.
    pub point_type: Option<String>,
    /// `tss:points` literal (a JSON array).
    pub points: Option<String>,
    /// The typed point template reached through `tss:about`.
    pub template: Option<RawTemplate>,
}

/// Why a row was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No identifier.
    MissingId,
    /// No simple result.
    MissingValue,
    /// No observed property.
    MissingProperty,
    /// No result time (observations) or span start (snippets).
    MissingTime,
    /// No span end.
    MissingEnd,
    /// No point type.
    MissingPointType,
    /// No points.
    MissingPoints,
    /// No typed point template.
    MissingTemplate,
    /// Point template without a sensor.
    MissingSensor,
    /// Subject is a literal or a malformed IRI.
    InvalidSubject,
    /// Identifier is not an integer.
    InvalidId,
    /// Result is not a finite number.
    InvalidValue,
    /// Observed property is not a valid absolute IRI.
    InvalidProperty,
    /// Sensor is not a valid absolute IRI.
    InvalidSensor,
    /// Result time or span start is not an `xsd:dateTime`.
    InvalidTime,
    /// Span end does not parse or lies before the start.
    InvalidInterval,
    /// Points are not a JSON array.
    InvalidPoints,
    /// An earlier row already produced a member with this IRI.
    DuplicateSubject,
}

impl SkipReason {
    /// Returns the snake_case label used in logs and summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingId => "missing_id",
            SkipReason::MissingValue => "missing_value",
            SkipReason::MissingProperty => "missing_property",
            SkipReason::MissingTime => "missing_time",
            SkipReason::MissingEnd => "missing_end",
            SkipReason::MissingPointType => "missing_point_type",
            SkipReason::MissingPoints => "missing_points",
            SkipReason::MissingTemplate => "missing_template",
            SkipReason::MissingSensor => "missing_sensor",
            SkipReason::InvalidSubject => "invalid_subject",
            SkipReason::InvalidId => "invalid_id",
            SkipReason::InvalidValue => "invalid_value",
            SkipReason::InvalidProperty => "invalid_property",
            SkipReason::InvalidSensor => "invalid_sensor",
            SkipReason::InvalidTime => "invalid_time",
            SkipReason::InvalidInterval => "invalid_interval",
            SkipReason::InvalidPoints => "invalid_points",
            SkipReason::DuplicateSubject => "duplicate_subject",
        }
    }
}

/// A query row that converts into one stream member.
pub trait RawRecord {
    /// The member this row becomes.
    type Member: Member;

    /// The row's subject term, for diagnostics.
    fn subject(&self) -> Option<&TermValue>;

    /// Converts the row. `ordinal` is the row's position in the input and
    /// only used to mint an IRI for a row without any subject term.
    ///
    /// # Errors
    ///
    /// Returns the first [`SkipReason`] that applies.
    fn into_member(self, ordinal: usize, layout: &Layout<'_>) -> Result<Self::Member, SkipReason>;
}

impl RawRecord for RawRow {
    type Member = Observation;

    fn subject(&self) -> Option<&TermValue> {
        self.subject.as_ref()
    }

    fn into_member(self, ordinal: usize, layout: &Layout<'_>) -> Result<Observation, SkipReason> {
        parse_row(self, ordinal, layout)
    }
}

impl RawRecord for RawSnippet {
    type Member = Snippet;

    fn subject(&self) -> Option<&TermValue> {
        self.subject.as_ref()
    }

    fn into_member(self, ordinal: usize, layout: &Layout<'_>) -> Result<Snippet, SkipReason> {
        parse_snippet(self, ordinal, layout)
    }
}

/// Result of the extract stage.
#[derive(Debug, Clone)]
pub struct Extraction<M = Observation> {
    /// Valid members, in source order.
    pub members: Vec<M>,
    /// Dropped rows by reason.
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl<M> Default for Extraction<M> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            skipped: BTreeMap::new(),
        }
    }
}

impl<M> Extraction<M> {
    /// Total number of dropped rows.
    #[must_use]
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Converts raw rows into members, counting the rows it drops.
///
/// When two rows yield the same member IRI the first one wins.
pub fn extract<R, I>(rows: I, layout: &Layout<'_>) -> Extraction<R::Member>
where
    R: RawRecord,
    I: IntoIterator<Item = R>,
{
    let mut extraction = Extraction::default();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for (ordinal, row) in rows.into_iter().enumerate() {
        let subject = row.subject().map(|s| s.text().to_owned());
        let result = row.into_member(ordinal, layout).and_then(|member| {
            if seen.insert(member.subject().to_owned()) {
                Ok(member)
            } else {
                Err(SkipReason::DuplicateSubject)
            }
        });
        match result {
            Ok(member) => extraction.members.push(member),
            Err(reason) => {
                debug!(
                    subject = subject.as_deref().unwrap_or("_:blank"),
                    reason = reason.as_str(),
                    "skipping malformed row"
                );
                *extraction.skipped.entry(reason).or_default() += 1;
            }
        }
    }
    if extraction.skipped_total() > 0 {
        warn!(
            skipped = extraction.skipped_total(),
            kept = extraction.members.len(),
            "dropped malformed rows"
        );
    }
    extraction
}

/// Converts one observation row, or explains why it cannot be converted.
///
/// # Errors
///
/// Returns the first [`SkipReason`] that applies, checking presence of all
/// four fields before parsing any of them.
pub fn parse_row(row: RawRow, ordinal: usize, layout: &Layout<'_>) -> Result<Observation, SkipReason> {
    let id = row.id.ok_or(SkipReason::MissingId)?;
    let value = row.value.ok_or(SkipReason::MissingValue)?;
    let property = row.property.ok_or(SkipReason::MissingProperty)?;
    let time = row.time.ok_or(SkipReason::MissingTime)?;

    let id: i64 = id.trim().parse().map_err(|_| SkipReason::InvalidId)?;
    let value: f64 = value.trim().parse().map_err(|_| SkipReason::InvalidValue)?;
    if !value.is_finite() {
        return Err(SkipReason::InvalidValue);
    }
    let property = absolute_iri(property).ok_or(SkipReason::InvalidProperty)?;
    let time = parse_timestamp(&time).ok_or(SkipReason::InvalidTime)?;
    let subject = member_iri(row.subject, "observation", ordinal, layout)?;

    Ok(Observation {
        subject,
        id,
        value,
        property,
        time,
    })
}

/// Converts one snippet row, or explains why it cannot be converted.
///
/// # Errors
///
/// Returns the first [`SkipReason`] that applies, checking presence of
/// every field before parsing any of them.
pub fn parse_snippet(
    row: RawSnippet,
    ordinal: usize,
    layout: &Layout<'_>,
) -> Result<Snippet, SkipReason> {
    let from = row.from.ok_or(SkipReason::MissingTime)?;
    let to = row.to.ok_or(SkipReason::MissingEnd)?;
    let point_type = row.point_type.ok_or(SkipReason::MissingPointType)?;
    let points = row.points.ok_or(SkipReason::MissingPoints)?;
    let template = row.template.ok_or(SkipReason::MissingTemplate)?;
    let sensor = template.sensor.ok_or(SkipReason::MissingSensor)?;
    let property = template.property.ok_or(SkipReason::MissingProperty)?;

    let from = parse_timestamp(&from).ok_or(SkipReason::InvalidTime)?;
    let to = parse_timestamp(&to)
        .filter(|to| *to >= from)
        .ok_or(SkipReason::InvalidInterval)?;
    if !matches!(
        serde_json::from_str::<serde_json::Value>(&points),
        Ok(serde_json::Value::Array(_))
    ) {
        return Err(SkipReason::InvalidPoints);
    }
    let sensor = absolute_iri(sensor).ok_or(SkipReason::InvalidSensor)?;
    let property = absolute_iri(property).ok_or(SkipReason::InvalidProperty)?;
    let subject = member_iri(row.subject, "snippet", ordinal, layout)?;

    Ok(Snippet {
        subject,
        from,
        to,
        point_type,
        points,
        template: PointTemplate { sensor, property },
    })
}

/// The IRI a member is published under. IRIs are kept when well formed;
/// blank nodes get one minted from their label, which is unique within the
/// source graph, and rows without a subject get one from their position.
fn member_iri(
    subject: Option<TermValue>,
    collection: &str,
    ordinal: usize,
    layout: &Layout<'_>,
) -> Result<String, SkipReason> {
    match subject {
        Some(TermValue::Iri(iri)) if Iri::new(iri.as_str()).is_ok() => Ok(iri),
        Some(TermValue::BlankNode(label)) => Ok(layout.mint_iri(collection, &label)),
        None => Ok(layout.mint_iri(collection, &format!("row-{ordinal}"))),
        Some(_) => Err(SkipReason::InvalidSubject),
    }
}

fn absolute_iri(term: TermValue) -> Option<String> {
    match term {
        TermValue::Iri(iri) if Iri::new(iri.as_str()).is_ok() => Some(iri),
        _ => None,
    }
}

/// Parses an `xsd:dateTime` lexical form into UTC.
///
/// Accepts RFC 3339 (`Z` or a numeric offset, converted to UTC) and the
/// zone-less form, which is taken to be UTC. Fractional seconds are optional.
#[must_use]
pub fn parse_timestamp(lexical: &str) -> Option<DateTime<Utc>> {
    let lexical = lexical.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(lexical) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
