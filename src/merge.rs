//! Lineage-preserving tree merge
//!
//! Rebuilds one tree from a set of nodes by walking each node's ancestor
//! chain down from the root and reusing any equivalent node already present
//! at each level. Equivalence is by stable id when the node has one, else by
//! name, and lookups go through a hash index rather than node identity.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::config::Limits;
use crate::error::Result;
use crate::pool::Sym;
use crate::tree::{Lineage, Node, NodeId, NodeKind, StableId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MergeKey {
    Id(StableId),
    Name(Sym),
}

impl MergeKey {
    fn of(node: &Node) -> Self {
        match node.id {
            Some(id) => MergeKey::Id(id),
            None => MergeKey::Name(node.name),
        }
    }
}

/// Incremental builder of a merged tree.
///
/// All chains are expressed in `lineage`, the tree whose nodes the result
/// copies: the source tree for extraction output, or the input tree itself
/// when it was loaded rather than derived.
pub struct TreeMerger<'a> {
    lineage: &'a Tree,
    kind: NodeKind,
    limits: Limits,
    result: Tree,
    index: FxHashMap<(NodeId, MergeKey), NodeId>,
}

impl<'a> TreeMerger<'a> {
    pub fn new(lineage: &'a Tree, kind: NodeKind, limits: Limits) -> Self {
        let root = lineage.root();
        let result = Tree::derived(lineage.pool().clone(), kind.build(lineage.node(root), root));
        Self {
            lineage,
            kind,
            limits,
            result,
            index: FxHashMap::default(),
        }
    }

    /// Add `id` of tree `from` with its whole ancestor chain. Returns the
    /// node standing for it in the merged tree, or `None` for synthetic
    /// nodes that have no counterpart in the lineage tree.
    pub fn insert(&mut self, from: &Tree, id: NodeId) -> Result<Option<NodeId>> {
        let Some((chain, old_parent)) = self.chain(from, id) else {
            return Ok(None);
        };
        self.limits.check_depth(chain.len().saturating_sub(1))?;

        let mut at = self.result.root();
        for &src in chain.iter().skip(1) {
            at = self.child_for(at, src)?;
        }

        if let Some(lineage) = old_parent {
            let node = self.result.node_mut(at);
            if node.old_parent.is_none() {
                node.old_parent = Some(lineage);
            }
        }
        Ok(Some(at))
    }

    /// Add every descendant of lineage node `src` below merged node `at`
    pub fn insert_subtree(&mut self, at: NodeId, src: NodeId) -> Result<()> {
        let base_depth = self.result.depth(at);
        let mut placed: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        placed.insert(src, at);

        let lineage = self.lineage;
        for (id, depth) in lineage.pre_order_from(src).skip(1) {
            self.limits.check_depth(base_depth + depth)?;
            let Some(parent) = lineage.parent(id).and_then(|p| placed.get(&p).copied()) else {
                continue;
            };
            let child = self.child_for(parent, id)?;
            placed.insert(id, child);
        }
        Ok(())
    }

    /// Finish the merge: siblings are ordered as in the lineage tree
    pub fn finish(mut self) -> Tree {
        self.result
            .sort_children_by_key(|node| node.origin.unwrap_or(NodeId::MAX));
        debug!("Merged tree has {} nodes", self.result.node_count());
        self.result
    }

    /// Existing child of `at` equivalent to lineage node `src`, or a new copy
    fn child_for(&mut self, at: NodeId, src: NodeId) -> Result<NodeId> {
        let node = self.lineage.node(src);
        let key = (at, MergeKey::of(node));

        if let Some(&existing) = self.index.get(&key) {
            // same-named siblings collapse; keep the earliest source position
            let merged = self.result.node_mut(existing);
            if merged.origin.is_some_and(|o| src < o) {
                merged.origin = Some(src);
            }
            return Ok(existing);
        }

        self.limits.check_nodes(self.result.node_count() + 1)?;
        let id = self.result.add_child(at, self.kind.build(node, src));
        self.index.insert(key, id);
        Ok(id)
    }

    /// Root-first chain of lineage ids ending at the node, plus its lineage
    fn chain(&self, from: &Tree, id: NodeId) -> Option<(Vec<NodeId>, Option<Lineage>)> {
        let node = from.node(id);

        if !from.is_derived() {
            if !from.pool().same_pool(self.lineage.pool()) {
                warn!("Skipping node {} from an unrelated tree", id);
                return None;
            }
            return Some((from.path(id), None));
        }

        let Some(origin) = node.origin else {
            // synthetic result roots
            return None;
        };
        let in_lineage = |n: NodeId| n < self.lineage.node_count();
        if !from.pool().same_pool(self.lineage.pool())
            || !in_lineage(origin)
            || node.old_parent.is_some_and(|l| !in_lineage(l.node))
        {
            warn!("Skipping node {} copied from another graph", id);
            return None;
        }

        let mut chain = match node.old_parent {
            Some(lineage) => self.lineage.path(lineage.node),
            None => {
                let mut above: Vec<NodeId> = self.lineage.ancestors(origin).collect();
                above.reverse();
                above
            }
        };
        chain.push(origin);
        Some((chain, node.old_parent))
    }
}

/// Merge `nodes` of tree `from` into one deduplicated tree rooted at a copy
/// of the lineage root. `source` is the tree `from` was extracted from; when
/// `from` is a loaded tree it is its own lineage and `source` is unused.
pub fn merge_nodes_into_tree<I>(
    source: &Tree,
    from: &Tree,
    nodes: I,
    kind: NodeKind,
    limits: &Limits,
) -> Result<Tree>
where
    I: IntoIterator<Item = NodeId>,
{
    let lineage = if from.is_derived() { source } else { from };
    let mut merger = TreeMerger::new(lineage, kind, *limits);
    for id in nodes {
        merger.insert(from, id)?;
    }
    Ok(merger.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphOptions;
    use crate::loader;
    use crate::subgraph::filter_subgraph;

    const TREE_JSON: &str = r#"{"Source": {"children": {
        "symptom": {"children": {
            "nervous system": {"children": {
                "headache": {"type": "symptom", "children": {
                    "ache": {"type": "symptom", "body": "dull ache"}
                }},
                "pain": {"children": {"neuralgia": {"type": "symptom"}}},
                "dizziness": {"type": "symptom"}
            }},
            "digestive system": {"children": {
                "nausea": {"type": "symptom"},
                "ache": {"type": "symptom", "body": "stomach ache"}
            }}
        }},
        "disorder": {"type": "disorder", "children": {
            "nervous system": {"children": {"epilepsy": {"type": "disorder"}}}
        }}
    }}}"#;

    fn create_test_tree(assign_ids: bool) -> Tree {
        let options = GraphOptions {
            assign_ids,
            ..GraphOptions::default()
        };
        loader::from_str(TREE_JSON, &options).unwrap()
    }

    fn extract(tree: &Tree, inc: &[&str], exc: &[&str]) -> Tree {
        filter_subgraph(tree, inc, exc, NodeKind::Concept, "subgraph results", &Limits::default())
            .unwrap()
    }

    fn merge(source: &Tree, from: &Tree, nodes: Vec<NodeId>) -> Tree {
        merge_nodes_into_tree(source, from, nodes, NodeKind::Concept, &Limits::default()).unwrap()
    }

    #[test]
    fn test_merge_restores_lineage() {
        let tree = create_test_tree(true);
        let subgraph = extract(&tree, &["nervous system"], &["pain"]);
        let nodes: Vec<NodeId> = subgraph.descendants().collect();
        let merged = merge(&tree, &subgraph, nodes);

        let expected = "\
Source
├── symptom
│   └── nervous system
│       ├── headache
│       │   └── ache
│       └── dizziness
└── disorder
    └── nervous system
        └── epilepsy
";
        assert_eq!(merged.pretty_print(), expected);
        assert!(merged.is_derived());
    }

    #[test]
    fn test_shared_ancestors_are_deduplicated() {
        let tree = create_test_tree(true);
        let nausea = tree.find_by_name("nausea").next().unwrap();
        let dizziness = tree.find_by_name("dizziness").next().unwrap();
        let merged = merge(&tree, &tree, vec![nausea, dizziness]);

        assert_eq!(
            merged.names(),
            vec![
                "Source",
                "symptom",
                "nervous system",
                "dizziness",
                "digestive system",
                "nausea"
            ]
        );
        assert_eq!(merged.find_by_name("symptom").count(), 1);
    }

    #[test]
    fn test_merge_is_idempotent_and_order_independent() {
        let tree = create_test_tree(true);
        let subgraph = extract(&tree, &["nervous system", "nausea"], &[]);
        let nodes: Vec<NodeId> = subgraph.descendants().collect();

        let forward = merge(&tree, &subgraph, nodes.clone());

        let mut reversed = nodes.clone();
        reversed.reverse();
        let backward = merge(&tree, &subgraph, reversed);

        let mut doubled = nodes.clone();
        doubled.extend(nodes.iter().copied());
        let twice = merge(&tree, &subgraph, doubled);

        assert_eq!(forward.pretty_print(), backward.pretty_print());
        assert_eq!(forward.pretty_print(), twice.pretty_print());
        assert_eq!(forward.node_count(), twice.node_count());
    }

    #[test]
    fn test_round_trip_keeps_leaf_set() {
        let tree = create_test_tree(true);
        let subgraph = extract(&tree, &["symptom"], &["pain"]);
        let merged = merge(&tree, &subgraph, subgraph.descendants().collect());

        let leaf_origins = |t: &Tree| -> Vec<NodeId> {
            let mut origins: Vec<NodeId> = t.leaves().filter_map(|id| t.node(id).origin).collect();
            origins.sort();
            origins
        };
        assert_eq!(leaf_origins(&subgraph), leaf_origins(&merged));
    }

    #[test]
    fn test_without_ids_same_names_share_a_node() {
        let tree = create_test_tree(false);
        let aches: Vec<NodeId> = tree.find_by_name("ache").collect();
        assert_eq!(aches.len(), 2);

        // different parents, so both survive
        let merged = merge(&tree, &tree, aches.clone());
        assert_eq!(merged.find_by_name("ache").count(), 2);

        // the same node twice collapses
        let merged = merge(&tree, &tree, vec![aches[0], aches[0]]);
        assert_eq!(merged.find_by_name("ache").count(), 1);
    }

    #[test]
    fn test_empty_input_and_synthetic_roots() {
        let tree = create_test_tree(true);
        let merged = merge(&tree, &tree, Vec::new());
        assert_eq!(merged.pretty_print(), "Source\n");

        let subgraph = extract(&tree, &["epilepsy"], &[]);
        let merged = merge(&tree, &subgraph, vec![subgraph.root()]);
        assert_eq!(merged.node_count(), 1);
    }

    #[test]
    fn test_merged_nodes_keep_lineage() {
        let tree = create_test_tree(true);
        let subgraph = extract(&tree, &["epilepsy"], &[]);
        let epilepsy = subgraph.children(subgraph.root())[0];
        assert_eq!(subgraph.label(epilepsy), "epilepsy - nervous system");

        let merged = merge(&tree, &subgraph, vec![epilepsy]);
        let copy = merged.find_by_name("epilepsy").next().unwrap();
        assert!(merged.node(copy).old_parent.is_some());
        // back under its original parent, so the label is plain again
        assert_eq!(merged.label(copy), "epilepsy");
    }

    #[test]
    fn test_insert_subtree_attaches_all_descendants() {
        let tree = create_test_tree(true);
        let symptom = tree.find_by_name("symptom").next().unwrap();

        let mut merger = TreeMerger::new(&tree, NodeKind::Concept, Limits::default());
        let at = merger.insert(&tree, symptom).unwrap().unwrap();
        merger.insert_subtree(at, symptom).unwrap();
        // a second pass adds nothing
        merger.insert_subtree(at, symptom).unwrap();
        let merged = merger.finish();

        assert_eq!(merged.node_count(), 11);
        assert_eq!(merged.find_by_name("neuralgia").count(), 1);
    }

    #[test]
    fn test_collapsed_siblings_render_plain_labels() {
        let json = r#"{"name": "Source", "children": [
            {"name": "x", "children": [{"name": "c"}]},
            {"name": "x", "children": [{"name": "d"}]}
        ]}"#;
        let tree = loader::from_str(json, &GraphOptions::default()).unwrap();
        let subgraph = extract(&tree, &["c", "d"], &[]);
        assert_eq!(subgraph.label(subgraph.children(0)[1]), "d - x");

        let merged = merge(&tree, &subgraph, subgraph.descendants().collect());
        let expected = "\
Source
└── x
    ├── c
    └── d
";
        assert_eq!(merged.pretty_print(), expected);
    }

    #[test]
    fn test_lineage_outside_source_is_skipped() {
        let tree = create_test_tree(true);
        let mut stray = Tree::synthetic(tree.pool().clone(), "stray");
        let mut copy = NodeKind::Concept.build(tree.node(3), 3);
        copy.old_parent = Some(Lineage {
            node: tree.node_count() + 5,
            name: tree.node(2).name,
        });
        let id = stray.add_child(0, copy);

        let merged = merge(&tree, &stray, vec![id]);
        assert_eq!(merged.pretty_print(), "Source\n");
    }
}
