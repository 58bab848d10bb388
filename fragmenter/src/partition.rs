//! Partitioner: groups stream members by calendar day and writes one leaf
//! fragment per group.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::error::FragmentError;
use crate::fsio;
use crate::layout::Layout;
use crate::model::{BucketKey, FragmentId, Member};
use crate::serializer::{self, LeafDocument};

/// Groups members by the [`BucketKey`] of their [`Member::time`].
///
/// Every member lands in exactly one bucket and no bucket is empty. Within
/// a bucket members are ordered by [`Member::leaf_order`], so the serialized
/// leaf does not depend on source order.
#[must_use]
pub fn partition<M: Member>(members: Vec<M>) -> BTreeMap<BucketKey, Vec<M>> {
    let mut buckets: BTreeMap<BucketKey, Vec<M>> = BTreeMap::new();
    for member in members {
        buckets
            .entry(BucketKey::from_time(member.time()))
            .or_default()
            .push(member);
    }
    for bucket in buckets.values_mut() {
        bucket.sort_by(M::leaf_order);
    }
    buckets
}

/// A leaf fragment written by this run.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafFragment {
    /// The day this leaf covers.
    pub key: BucketKey,
    /// Where the leaf was written.
    pub path: PathBuf,
    /// Published IRI of the leaf.
    pub iri: String,
    /// Number of members in the leaf.
    pub members: usize,
}

/// Writes one leaf data file per bucket, in calendar order.
///
/// Each file is written atomically and replaces any previous content.
///
/// # Errors
///
/// Returns [`FragmentError::PartitionWrite`] for the first leaf that cannot
/// be written. Leaves written before it stay on disk.
pub fn write_leaves<M: Member>(
    buckets: &BTreeMap<BucketKey, Vec<M>>,
    layout: &Layout<'_>,
) -> Result<Vec<LeafFragment>, FragmentError> {
    let config = layout.config();
    let stream = config.leaf_stream.then(|| layout.event_stream());
    let member_of = config.leaf_members.then(|| layout.event_stream_iri());

    let mut leaves = Vec::with_capacity(buckets.len());
    for (key, members) in buckets {
        let id = FragmentId::Day(*key);
        let path = layout.path(id);
        let body = serializer::leaf_document(
            config.format,
            &LeafDocument {
                stream: stream.as_ref(),
                member_of: member_of.as_deref(),
                identifier_predicate: &config.identifier_predicate,
                members: M::as_slice(members),
            },
        );
        fsio::write_atomic(&path, body.as_bytes()).map_err(|source| {
            FragmentError::PartitionWrite {
                path: path.clone(),
                source,
            }
        })?;
        debug!(leaf = %path.display(), members = members.len(), "wrote leaf fragment");
        leaves.push(LeafFragment {
            key: *key,
            iri: layout.iri(id),
            path,
            members: members.len(),
        });
    }
    Ok(leaves)
}
