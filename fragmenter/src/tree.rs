//! Fragment tree builder.
//!
//! The hierarchy is derived from the leaf keys produced by the partitioner,
//! never by scanning the output directory. Nodes live in an arena and refer
//! to each other by index; children are kept in calendar order.
//!
//! [`plan_documents`] computes every relation of the whole tree before
//! anything is written, so a bound that fails validation aborts the run with
//! no metadata on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::boundary;
use crate::error::FragmentError;
use crate::layout::Layout;
use crate::model::{BucketKey, EventStream, FragmentId, Interval, Relation, RelationKind};

/// Index of a node in [`FragmentTree`].
pub type NodeIndex = usize;

/// One node of the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentNode {
    /// Identity of the fragment.
    pub id: FragmentId,
    /// Parent index, `None` for the root.
    pub parent: Option<NodeIndex>,
    /// Child indices in calendar order.
    pub children: Vec<NodeIndex>,
}

/// The `root → year → month → day` hierarchy of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentTree {
    nodes: Vec<FragmentNode>,
}

impl FragmentTree {
    /// Index of the root node.
    pub const ROOT: NodeIndex = 0;

    /// Builds the tree covering `keys`. Duplicate keys collapse into one leaf.
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = BucketKey>,
    {
        // Sorting first makes arena order (and therefore output order) depend
        // only on the key set.
        let mut keys: Vec<BucketKey> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let mut tree = Self {
            nodes: vec![FragmentNode {
                id: FragmentId::Root,
                parent: None,
                children: Vec::new(),
            }],
        };
        let mut index: BTreeMap<FragmentId, NodeIndex> = BTreeMap::new();
        index.insert(FragmentId::Root, Self::ROOT);

        for key in keys {
            let year = FragmentId::Year(key.year);
            let month = FragmentId::Month {
                year: key.year,
                month: key.month,
            };
            let y = tree.child_of(&mut index, Self::ROOT, year);
            let m = tree.child_of(&mut index, y, month);
            tree.child_of(&mut index, m, FragmentId::Day(key));
        }
        tree
    }

    fn child_of(
        &mut self,
        index: &mut BTreeMap<FragmentId, NodeIndex>,
        parent: NodeIndex,
        id: FragmentId,
    ) -> NodeIndex {
        if let Some(&existing) = index.get(&id) {
            return existing;
        }
        let idx = self.nodes.len();
        self.nodes.push(FragmentNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(idx);
        index.insert(id, idx);
        idx
    }

    /// Returns the node at `idx`, if any.
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> Option<&FragmentNode> {
        self.nodes.get(idx)
    }

    /// All nodes in arena order (parents before children).
    #[must_use]
    pub fn nodes(&self) -> &[FragmentNode] {
        &self.nodes
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Keys of every leaf, in calendar order.
    #[must_use]
    pub fn leaves(&self) -> Vec<BucketKey> {
        let mut keys: Vec<BucketKey> = self
            .nodes
            .iter()
            .filter_map(|n| match n.id {
                FragmentId::Day(key) => Some(key),
                _ => None,
            })
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Internal nodes (root, years, months) in arena order.
    pub fn internal_nodes(&self) -> impl Iterator<Item = &FragmentNode> {
        self.nodes.iter().filter(|n| n.id.is_internal())
    }
}

/// A metadata document ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDocument {
    /// The internal node this document describes.
    pub node: FragmentId,
    /// On-disk path of the document.
    pub path: PathBuf,
    /// Published IRI of the document.
    pub iri: String,
    /// Event stream descriptor, present on the root document only.
    pub event_stream: Option<EventStream>,
    /// One GE/LT pair per child, children in calendar order.
    pub relations: Vec<Relation>,
}

/// Computes the metadata document of every internal node.
///
/// Documents are returned in arena order (root first). For each child the
/// interval comes from the [`boundary`] calculator at the child's
/// granularity and is checked against the parent's own interval and the
/// previous sibling before it is accepted.
///
/// # Errors
///
/// Returns [`FragmentError::HierarchyInconsistency`] if a key is outside the
/// calendar, a child's interval escapes its parent's, or two siblings
/// overlap.
pub fn plan_documents(
    tree: &FragmentTree,
    layout: &Layout<'_>,
) -> Result<Vec<NodeDocument>, FragmentError> {
    let path = layout.config().timestamp_path();
    let mut documents = Vec::new();

    for node in tree.internal_nodes() {
        let parent_bounds = match node.id {
            FragmentId::Root => None,
            id => Some(bounds(id)?),
        };

        let mut relations = Vec::with_capacity(node.children.len() * 2);
        let mut previous: Option<Interval> = None;
        for &child_idx in &node.children {
            let Some(child) = tree.node(child_idx) else {
                return Err(inconsistency(node.id, format!("dangling child index {child_idx}")));
            };
            if child.id.parent() != Some(node.id) {
                return Err(inconsistency(node.id, format!("{} is not a direct child", child.id)));
            }
            let interval = bounds(child.id)?;
            if let Some(outer) = parent_bounds {
                if !interval.is_within(&outer) {
                    return Err(inconsistency(
                        node.id,
                        format!("child {} interval {interval} escapes {outer}", child.id),
                    ));
                }
            }
            if let Some(prev) = previous {
                if prev.overlaps(&interval) || interval.lower < prev.lower {
                    return Err(inconsistency(
                        node.id,
                        format!("child {} interval {interval} overlaps {prev}", child.id),
                    ));
                }
            }
            previous = Some(interval);

            let target = layout.iri(child.id);
            relations.push(Relation {
                kind: RelationKind::GreaterThanOrEqual,
                value: interval.lower,
                target: target.clone(),
                path: path.to_owned(),
            });
            relations.push(Relation {
                kind: RelationKind::LessThan,
                value: interval.upper,
                target,
                path: path.to_owned(),
            });
        }

        debug!(node = %node.id, relations = relations.len(), "planned metadata document");
        documents.push(NodeDocument {
            node: node.id,
            path: layout.path(node.id),
            iri: layout.iri(node.id),
            event_stream: (node.id == FragmentId::Root).then(|| layout.event_stream()),
            relations,
        });
    }
    Ok(documents)
}

fn bounds(id: FragmentId) -> Result<Interval, FragmentError> {
    boundary::fragment_bounds(id).map_err(|e| inconsistency(id, e.to_string()))
}

fn inconsistency(node: FragmentId, reason: String) -> FragmentError {
    FragmentError::HierarchyInconsistency {
        node: node.to_string(),
        reason,
    }
}
