//! Core fragmentation model types.
//!
//! Stream members ([`Observation`]s or time series [`Snippet`]s) and bucket
//! keys are transient values recomputed on every run. Fragment identities, intervals and relations describe the build
//! output and are what the serializers consume.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::vocab;

/// A single sensor observation, immutable once extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// IRI of the observation resource.
    pub subject: String,
    /// Numeric identifier of the observation.
    pub id: i64,
    /// Simple result value.
    pub value: f64,
    /// IRI of the observed property.
    pub property: String,
    /// Result time, normalised to UTC.
    pub time: DateTime<Utc>,
}

impl Observation {
    /// Returns the calendar-day bucket this observation belongs to.
    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::from_time(self.time)
    }
}

/// Sensor and property a snippet's points were measured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointTemplate {
    /// IRI of the sensor (`sosa:madeBySensor`).
    pub sensor: String,
    /// IRI of the observed property.
    pub property: String,
}

/// A time series snippet: a run of points from one sensor between `from`
/// and `to`, carried as a single stream member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// IRI of the snippet resource.
    pub subject: String,
    /// Start of the span, normalised to UTC. Snippets are bucketed by it.
    pub from: DateTime<Utc>,
    /// End of the span, never before `from`.
    pub to: DateTime<Utc>,
    /// Lexical form of `tss:pointType`.
    pub point_type: String,
    /// JSON array of points, kept verbatim.
    pub points: String,
    /// The point template the snippet is about.
    pub template: PointTemplate,
}

/// One bucket's members, borrowed for serialization.
#[derive(Debug, Clone, Copy)]
pub enum MemberSlice<'a> {
    /// Observation members.
    Observations(&'a [Observation]),
    /// Snippet members.
    Snippets(&'a [Snippet]),
}

impl<'a> MemberSlice<'a> {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            MemberSlice::Observations(items) => items.len(),
            MemberSlice::Snippets(items) => items.len(),
        }
    }

    /// Returns `true` if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Member IRIs, in output order.
    #[must_use]
    pub fn subjects(&self) -> Vec<&'a str> {
        match self {
            MemberSlice::Observations(items) => items.iter().map(|o| o.subject.as_str()).collect(),
            MemberSlice::Snippets(items) => items.iter().map(|s| s.subject.as_str()).collect(),
        }
    }
}

/// A stream member that can be bucketed by day and written to a leaf.
pub trait Member {
    /// IRI of the member resource.
    fn subject(&self) -> &str;

    /// The instant the member is bucketed by.
    fn time(&self) -> DateTime<Utc>;

    /// Order of members inside one leaf.
    fn leaf_order(&self, other: &Self) -> Ordering;

    /// Borrows a bucket of members for the serializers.
    fn as_slice(members: &[Self]) -> MemberSlice<'_>
    where
        Self: Sized;
}

impl Member for Observation {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn time(&self) -> DateTime<Utc> {
        self.time
    }

    fn leaf_order(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.id.cmp(&other.id))
            .then_with(|| self.subject.cmp(&other.subject))
    }

    fn as_slice(members: &[Self]) -> MemberSlice<'_> {
        MemberSlice::Observations(members)
    }
}

impl Member for Snippet {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn time(&self) -> DateTime<Utc> {
        self.from
    }

    fn leaf_order(&self, other: &Self) -> Ordering {
        self.from
            .cmp(&other.from)
            .then(self.to.cmp(&other.to))
            .then_with(|| self.subject.cmp(&other.subject))
    }

    fn as_slice(members: &[Self]) -> MemberSlice<'_> {
        MemberSlice::Snippets(members)
    }
}

/// The `(year, month, day)` grouping key of an observation.
///
/// Ordering is chronological, so a `BTreeMap<BucketKey, _>` iterates days
/// in calendar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BucketKey {
    /// Calendar year.
    pub year: i32,
    /// Month of year, `1..=12` for well-formed keys.
    pub month: u32,
    /// Day of month, `1..=31` for well-formed keys.
    pub day: u32,
}

impl BucketKey {
    /// Creates a key without validating it. Calendar validity is checked by
    /// the [`boundary`](crate::boundary) functions when bounds are computed.
    #[must_use]
    pub const fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Truncates a UTC timestamp to its calendar day.
    #[must_use]
    pub fn from_time(time: DateTime<Utc>) -> Self {
        Self {
            year: time.year(),
            month: time.month(),
            day: time.day(),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Calendar granularity of a fragment node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// The tree root, spanning every observation.
    Root,
    /// One calendar year.
    Year,
    /// One calendar month.
    Month,
    /// One calendar day; always a leaf.
    Day,
}

impl Granularity {
    /// Returns the granularity of this node's children, or `None` for leaves.
    #[must_use]
    pub fn child(self) -> Option<Granularity> {
        match self {
            Granularity::Root => Some(Granularity::Year),
            Granularity::Year => Some(Granularity::Month),
            Granularity::Month => Some(Granularity::Day),
            Granularity::Day => None,
        }
    }

    /// Returns the lowercase label used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Root => "root",
            Granularity::Year => "year",
            Granularity::Month => "month",
            Granularity::Day => "day",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a node in the fragment hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FragmentId {
    /// The root fragment.
    Root,
    /// A year fragment.
    Year(i32),
    /// A month fragment.
    Month {
        /// Calendar year.
        year: i32,
        /// Month of year.
        month: u32,
    },
    /// A day (leaf) fragment.
    Day(BucketKey),
}

impl FragmentId {
    /// Returns the granularity of this node.
    #[must_use]
    pub fn granularity(self) -> Granularity {
        match self {
            FragmentId::Root => Granularity::Root,
            FragmentId::Year(_) => Granularity::Year,
            FragmentId::Month { .. } => Granularity::Month,
            FragmentId::Day(_) => Granularity::Day,
        }
    }

    /// Returns the parent node, or `None` for the root.
    #[must_use]
    pub fn parent(self) -> Option<FragmentId> {
        match self {
            FragmentId::Root => None,
            FragmentId::Year(_) => Some(FragmentId::Root),
            FragmentId::Month { year, .. } => Some(FragmentId::Year(year)),
            FragmentId::Day(key) => Some(FragmentId::Month {
                year: key.year,
                month: key.month,
            }),
        }
    }

    /// Returns `true` for internal nodes (root, year, month).
    #[must_use]
    pub fn is_internal(self) -> bool {
        !matches!(self, FragmentId::Day(_))
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentId::Root => f.write_str("root"),
            FragmentId::Year(year) => write!(f, "{year:04}"),
            FragmentId::Month { year, month } => write!(f, "{year:04}-{month:02}"),
            FragmentId::Day(key) => key.fmt(f),
        }
    }
}

/// A half-open time interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    /// Inclusive lower bound.
    pub lower: DateTime<Utc>,
    /// Exclusive upper bound.
    pub upper: DateTime<Utc>,
}

impl Interval {
    /// Returns `true` if `time` falls inside the interval.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.lower <= time && time < self.upper
    }

    /// Returns `true` if the two intervals share at least one instant.
    #[must_use]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.lower < other.upper && other.lower < self.upper
    }

    /// Returns `true` if `self` lies entirely inside `outer`.
    #[must_use]
    pub fn is_within(&self, outer: &Interval) -> bool {
        outer.lower <= self.lower && self.upper <= outer.upper
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            crate::serializer::xsd_date_time(self.lower),
            crate::serializer::xsd_date_time(self.upper)
        )
    }
}

/// Comparison operator of a TREE relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RelationKind {
    /// `tree:GreaterThanOrEqualToRelation`.
    GreaterThanOrEqual,
    /// `tree:LessThanRelation`.
    LessThan,
}

impl RelationKind {
    /// Returns the full IRI of the relation class.
    #[must_use]
    pub fn class_iri(self) -> &'static str {
        match self {
            RelationKind::GreaterThanOrEqual => vocab::TREE_GREATER_THAN_OR_EQUAL_TO_RELATION,
            RelationKind::LessThan => vocab::TREE_LESS_THAN_RELATION,
        }
    }

    /// Maps a relation class IRI back to its kind.
    #[must_use]
    pub fn from_class_iri(iri: &str) -> Option<Self> {
        match iri {
            vocab::TREE_GREATER_THAN_OR_EQUAL_TO_RELATION => Some(RelationKind::GreaterThanOrEqual),
            vocab::TREE_LESS_THAN_RELATION => Some(RelationKind::LessThan),
            _ => None,
        }
    }
}

/// A navigation relation from a parent fragment to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Comparison operator.
    pub kind: RelationKind,
    /// Bound value compared against the timestamp path.
    pub value: DateTime<Utc>,
    /// IRI of the child fragment.
    pub target: String,
    /// IRI of the property the bound applies to.
    pub path: String,
}

/// The event stream descriptor declared by the root document (and, when
/// configured, by every leaf).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStream {
    /// IRI of the `ldes:EventStream` resource.
    pub iri: String,
    /// Property used to order and query members.
    pub timestamp_path: String,
    /// Entry point into the fragment tree (the root document).
    pub view: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_key_truncates_to_day() {
        let time = Utc.with_ymd_and_hms(2023, 1, 31, 23, 59, 59).single();
        let key = time.map(BucketKey::from_time);
        assert_eq!(key, Some(BucketKey::new(2023, 1, 31)));
    }

    #[test]
    fn bucket_keys_order_chronologically() {
        let mut keys = vec![
            BucketKey::new(2024, 1, 1),
            BucketKey::new(2023, 12, 31),
            BucketKey::new(2023, 2, 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                BucketKey::new(2023, 2, 1),
                BucketKey::new(2023, 12, 31),
                BucketKey::new(2024, 1, 1),
            ]
        );
    }

    #[test]
    fn fragment_parents_walk_to_root() {
        let day = FragmentId::Day(BucketKey::new(2023, 1, 31));
        let month = day.parent();
        assert_eq!(month, Some(FragmentId::Month { year: 2023, month: 1 }));
        assert_eq!(month.and_then(FragmentId::parent), Some(FragmentId::Year(2023)));
        assert_eq!(FragmentId::Year(2023).parent(), Some(FragmentId::Root));
        assert_eq!(FragmentId::Root.parent(), None);
    }

    #[test]
    fn granularity_chain_ends_at_day() {
        assert_eq!(Granularity::Root.child(), Some(Granularity::Year));
        assert_eq!(Granularity::Month.child(), Some(Granularity::Day));
        assert_eq!(Granularity::Day.child(), None);
    }

    #[test]
    fn half_open_intervals_touching_do_not_overlap() {
        let a = Interval {
            lower: Utc.timestamp_opt(0, 0).unwrap(),
            upper: Utc.timestamp_opt(10, 0).unwrap(),
        };
        let b = Interval {
            lower: Utc.timestamp_opt(10, 0).unwrap(),
            upper: Utc.timestamp_opt(20, 0).unwrap(),
        };
        assert!(!a.overlaps(&b));
        assert!(!a.contains(b.lower));
        assert!(b.contains(b.lower));
    }

    #[test]
    fn snippets_order_by_span_start() {
        let at = |h| Utc.with_ymd_and_hms(2023, 3, 1, h, 0, 0).unwrap();
        let snippet = |subject: &str, from, to| Snippet {
            subject: subject.to_owned(),
            from: at(from),
            to: at(to),
            point_type: "float".to_owned(),
            points: "[]".to_owned(),
            template: PointTemplate {
                sensor: "https://example.org/sensor".to_owned(),
                property: "https://example.org/p".to_owned(),
            },
        };
        let early = snippet("https://example.org/b", 1, 2);
        let late = snippet("https://example.org/a", 3, 4);
        assert_eq!(early.leaf_order(&late), Ordering::Less);
        assert_eq!(Member::time(&late), at(3));
        assert_eq!(Snippet::as_slice(&[early, late]).len(), 2);
    }

    #[test]
    fn relation_kind_round_trips_class_iri() {
        for kind in [RelationKind::GreaterThanOrEqual, RelationKind::LessThan] {
            assert_eq!(RelationKind::from_class_iri(kind.class_iri()), Some(kind));
        }
        assert_eq!(RelationKind::from_class_iri(vocab::TREE_NODE_CLASS), None);
    }
}
