//! Ancestor-aware subgraph extraction
//!
//! A node survives when its root-to-node path contains an include match and
//! no exclude match. Survivors are copied into a new tree under a synthetic
//! root; each copy hangs from the copy of its nearest surviving ancestor and
//! remembers its original parent as `old_parent`.

use tracing::debug;

use crate::config::Limits;
use crate::error::Result;
use crate::tree::{Lineage, Node, NodeId, NodeKind, Tree};

/// A surviving source node with the survivors hanging below it
#[derive(Debug)]
struct Staged {
    source: NodeId,
    children: Vec<Staged>,
}

/// Extract the pruned, lineage-annotated copy of `source`.
///
/// Names in `inc` and `exc` are matched exactly against every node on the
/// path. An empty `inc` makes every node a candidate; an exclude match
/// anywhere on the path drops the node and its whole subtree.
pub fn filter_subgraph<S: AsRef<str>>(
    source: &Tree,
    inc: &[S],
    exc: &[S],
    kind: NodeKind,
    base_name: &str,
    limits: &Limits,
) -> Result<Tree> {
    let survives = mark_survivors(source, inc, exc, limits)?;

    // Post-order: a node's children are resolved before the node itself.
    // Copies of pruned nodes' descendants bubble up to the nearest survivor.
    let mut pending: Vec<Vec<Staged>> = (0..source.node_count()).map(|_| Vec::new()).collect();
    let mut top: Vec<Staged> = Vec::new();

    for id in source.post_order() {
        let below = std::mem::take(&mut pending[id]);
        let lifted = if survives[id] {
            vec![Staged {
                source: id,
                children: below,
            }]
        } else {
            below
        };

        match source.parent(id) {
            Some(parent) => pending[parent].extend(lifted),
            None => top.extend(lifted),
        }
    }

    let result = materialize(source, top, kind, base_name, limits)?;
    debug!(
        "filter_subgraph kept {} of {} nodes under {:?}",
        result.node_count() - 1,
        source.node_count(),
        base_name
    );
    Ok(result)
}

/// Top-down pass: does each node's path hold an include hit and no exclude hit
fn mark_survivors<S: AsRef<str>>(
    source: &Tree,
    inc: &[S],
    exc: &[S],
    limits: &Limits,
) -> Result<Vec<bool>> {
    let n = source.node_count();
    let mut included = vec![false; n];
    let mut excluded = vec![false; n];

    for (id, depth) in source.pre_order() {
        limits.check_depth(depth)?;
        let node = source.node_ref(id);
        let (inc_above, exc_above) = match source.parent(id) {
            Some(parent) => (included[parent], excluded[parent]),
            None => (false, false),
        };

        included[id] = inc_above || inc.is_empty() || node.filter_name(inc, &[]);
        excluded[id] = exc_above || !node.filter_name(&[], exc);
    }

    Ok(included
        .into_iter()
        .zip(excluded)
        .map(|(inc, exc)| inc && !exc)
        .collect())
}

/// Copy staged survivors into a fresh tree under `base_name`
fn materialize(
    source: &Tree,
    top: Vec<Staged>,
    kind: NodeKind,
    base_name: &str,
    limits: &Limits,
) -> Result<Tree> {
    let mut result = Tree::synthetic(source.pool().clone(), base_name);
    let root = result.root();

    let mut stack: Vec<(NodeId, Staged)> = top.into_iter().rev().map(|s| (root, s)).collect();
    while let Some((parent, staged)) = stack.pop() {
        limits.check_nodes(result.node_count() + 1)?;

        let id = result.add_child(parent, copy_of(source, staged.source, kind));

        for child in staged.children.into_iter().rev() {
            stack.push((id, child));
        }
    }

    Ok(result)
}

/// Copy of `id` whose `origin` and `old_parent` always point into the loaded
/// tree. A derived source passes its own lineage through; its synthetic
/// nodes stay without origin.
fn copy_of(source: &Tree, id: NodeId, kind: NodeKind) -> Node {
    let node = source.node(id);
    let mut copy = kind.build(node, id);

    if !source.is_derived() {
        copy.old_parent = source.parent(id).map(|p| Lineage {
            node: p,
            name: source.node(p).name,
        });
        return copy;
    }

    copy.origin = node.origin;
    copy.old_parent = match node.origin {
        None => None,
        // merge output keeps source parentage, so a live parent's origin
        // is the original parent
        Some(_) => node.old_parent.or_else(|| {
            let parent = source.parent(id)?;
            Some(Lineage {
                node: source.node(parent).origin?,
                name: source.node(parent).name,
            })
        }),
    };
    copy
}
