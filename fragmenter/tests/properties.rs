//! Property-based tests for partitioning, tree planning and calendar bounds.
//!
//! Observation times are drawn from 1970 through 2099 so every generated
//! key has real year, month and day boundaries.

use chrono::{DateTime, Datelike, Duration, Utc};
use ldes_fragmenter::boundary::{day_bounds, fragment_bounds, month_bounds, year_bounds};
use ldes_fragmenter::partition::partition;
use ldes_fragmenter::tree::plan_documents;
use ldes_fragmenter::{
    BucketKey, FragmentId, FragmentTree, FragmenterConfig, Interval, Layout, Observation,
    RelationKind,
};
use proptest::prelude::*;

const MAX_SECONDS: i64 = 4_102_444_800; // 2100-01-01T00:00:00Z

fn time(seconds: i64, millis: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, millis * 1_000_000).unwrap_or_default()
}

fn observations(times: &[(i64, u32)]) -> Vec<Observation> {
    times
        .iter()
        .enumerate()
        .map(|(i, &(seconds, millis))| Observation {
            subject: format!("https://example.org/obs/{i}"),
            id: i as i64,
            value: i as f64 * 0.5,
            property: "https://example.org/property/waterLevel".to_owned(),
            time: time(seconds, millis),
        })
        .collect()
}

fn timestamps() -> impl Strategy<Value = Vec<(i64, u32)>> {
    prop::collection::vec((0..MAX_SECONDS, 0u32..1000), 0..64)
}

// =============================================================================
// Partition Properties
// =============================================================================

proptest! {
    /// Every observation lands in exactly one bucket.
    #[test]
    fn prop_partition_preserves_count(times in timestamps()) {
        let input = observations(&times);
        let total = input.len();
        let buckets = partition(input);
        prop_assert_eq!(buckets.values().map(Vec::len).sum::<usize>(), total);
        prop_assert!(buckets.values().all(|b| !b.is_empty()));
    }

    /// Each bucket holds only observations of its day, inside the day's interval.
    #[test]
    fn prop_partition_bucket_matches_day(times in timestamps()) {
        for (key, bucket) in partition(observations(&times)) {
            let bounds = day_bounds(key.year, key.month, key.day).unwrap_or_else(|e| panic!("{e}"));
            for obs in &bucket {
                prop_assert_eq!(obs.bucket_key(), key);
                prop_assert!(bounds.contains(obs.time), "{} outside {}", obs.time, bounds);
            }
        }
    }

    /// Bucket contents are sorted by time, whatever the input order.
    #[test]
    fn prop_partition_orders_by_time(times in timestamps()) {
        let forward = partition(observations(&times));
        let mut reversed_input = observations(&times);
        reversed_input.reverse();
        let reversed = partition(reversed_input);
        prop_assert_eq!(&forward, &reversed);
        for bucket in forward.values() {
            prop_assert!(bucket.windows(2).all(|w| w[0].time <= w[1].time));
        }
    }
}

// =============================================================================
// Boundary Properties
// =============================================================================

proptest! {
    /// A day interval is exactly 24 hours and contains its own midnight.
    #[test]
    fn prop_day_is_one_day_long(seconds in 0..MAX_SECONDS) {
        let t = time(seconds, 0);
        let bounds = day_bounds(t.year(), t.month(), t.day()).unwrap_or_else(|e| panic!("{e}"));
        prop_assert_eq!(bounds.upper - bounds.lower, Duration::days(1));
        prop_assert!(bounds.contains(t));
    }

    /// Day within month within year.
    #[test]
    fn prop_bounds_nest(seconds in 0..MAX_SECONDS) {
        let t = time(seconds, 0);
        let day = day_bounds(t.year(), t.month(), t.day()).unwrap_or_else(|e| panic!("{e}"));
        let month = month_bounds(t.year(), t.month()).unwrap_or_else(|e| panic!("{e}"));
        let year = year_bounds(t.year()).unwrap_or_else(|e| panic!("{e}"));
        prop_assert!(day.is_within(&month));
        prop_assert!(month.is_within(&year));
    }

    /// A month ends where the next one starts.
    #[test]
    fn prop_months_are_contiguous(year in 1970i32..2100, month in 1u32..=12) {
        let this = month_bounds(year, month).unwrap_or_else(|e| panic!("{e}"));
        let next = if month == 12 {
            month_bounds(year + 1, 1)
        } else {
            month_bounds(year, month + 1)
        }
        .unwrap_or_else(|e| panic!("{e}"));
        prop_assert_eq!(this.upper, next.lower);
    }
}

// =============================================================================
// Tree Planning Properties
// =============================================================================

proptest! {
    /// Every internal node gets one GE/LT pair per child, the pair equals the
    /// child's calendar interval and sibling intervals are disjoint and
    /// inside the parent's.
    #[test]
    fn prop_planned_relations_partition_the_parent(times in timestamps()) {
        let keys: Vec<BucketKey> = partition(observations(&times)).into_keys().collect();
        let tree = FragmentTree::from_keys(keys.iter().copied());
        let config = FragmenterConfig::default();
        let layout = Layout::new(&config);
        let documents = plan_documents(&tree, &layout).unwrap_or_else(|e| panic!("{e}"));

        prop_assert_eq!(tree.leaves(), keys);
        prop_assert_eq!(documents.len(), tree.internal_nodes().count());
        prop_assert_eq!(documents[0].node, FragmentId::Root);

        for (doc, node) in documents.iter().zip(tree.internal_nodes()) {
            prop_assert_eq!(doc.node, node.id);
            prop_assert_eq!(doc.event_stream.is_some(), node.id == FragmentId::Root);
            prop_assert_eq!(doc.relations.len(), node.children.len() * 2);

            let parent = match node.id {
                FragmentId::Root => None,
                id => Some(fragment_bounds(id).unwrap_or_else(|e| panic!("{e}"))),
            };
            let mut previous: Option<Interval> = None;
            for (pair, &child_idx) in doc.relations.chunks(2).zip(&node.children) {
                let child = tree.node(child_idx).unwrap_or_else(|| panic!("dangling {child_idx}"));
                let expected = fragment_bounds(child.id).unwrap_or_else(|e| panic!("{e}"));
                prop_assert_eq!(pair[0].kind, RelationKind::GreaterThanOrEqual);
                prop_assert_eq!(pair[1].kind, RelationKind::LessThan);
                prop_assert_eq!(&pair[0].target, &pair[1].target);
                prop_assert_eq!(pair[0].value, expected.lower);
                prop_assert_eq!(pair[1].value, expected.upper);

                let found = Interval { lower: pair[0].value, upper: pair[1].value };
                if let Some(outer) = parent {
                    prop_assert!(found.is_within(&outer));
                }
                if let Some(prev) = previous {
                    prop_assert!(!prev.overlaps(&found));
                    prop_assert!(prev.upper <= found.lower);
                }
                previous = Some(found);
            }
        }
    }
}
