//! Search façade over a loaded concept tree
//!
//! `ComorbidGraph` owns the source tree and runs the full pipeline for one
//! query:
//! 1. Compile the query text into a `FilterSpec`
//! 2. Extract the subgraph selected by the `ancestor` dimension
//! 3. Apply the remaining dimensions to each surviving node
//! 4. Merge the matches back into one tree with their lineage
//! 5. Optionally re-attach each match's full original subtree
//!
//! The source tree is never modified, so a graph can be shared between
//! threads and queried concurrently.

use std::path::Path;
use tracing::{debug, info};

use crate::config::{GraphOptions, Limits};
use crate::error::Result;
use crate::filter::FilterSpec;
use crate::loader;
use crate::merge::{TreeMerger, merge_nodes_into_tree};
use crate::query::build_query;
use crate::subgraph::filter_subgraph;
use crate::tree::{NodeId, NodeKind, Tree};

/// Outcome of one search
#[derive(Debug, Clone)]
pub struct SearchResult {
    tree: Tree,
    matches: Vec<NodeId>,
}

impl SearchResult {
    /// Result tree: a synthetic root holding the merged lineage of the matches
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn into_tree(self) -> Tree {
        self.tree
    }

    /// Source ids of the matched nodes, in source pre-order
    pub fn matches(&self) -> &[NodeId] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn pretty_print(&self) -> String {
        self.tree.pretty_print()
    }
}

/// A loaded concept tree and the operations over it
#[derive(Debug, Clone)]
pub struct ComorbidGraph {
    tree: Tree,
    options: GraphOptions,
}

impl ComorbidGraph {
    pub fn new(tree: Tree) -> Self {
        Self::with_options(tree, GraphOptions::default())
    }

    pub fn with_options(tree: Tree, options: GraphOptions) -> Self {
        Self { tree, options }
    }

    pub fn from_json(text: &str, options: GraphOptions) -> Result<Self> {
        let tree = loader::from_str(text, &options)?;
        Ok(Self::with_options(tree, options))
    }

    pub fn from_file(path: impl AsRef<Path>, options: GraphOptions) -> Result<Self> {
        let tree = loader::from_file(path, &options)?;
        Ok(Self::with_options(tree, options))
    }

    /// The source tree
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn limits(&self) -> &Limits {
        &self.options.limits
    }

    pub fn pretty_print_tree(&self) -> String {
        self.tree.pretty_print()
    }

    /// See [`filter_subgraph`]
    pub fn filter_subgraph<S: AsRef<str>>(
        &self,
        inc: &[S],
        exc: &[S],
        kind: NodeKind,
        base_name: &str,
    ) -> Result<Tree> {
        filter_subgraph(&self.tree, inc, exc, kind, base_name, self.limits())
    }

    /// Merge nodes of `from` (this graph's tree, or a tree derived from it)
    pub fn merge_nodes_into_tree<I>(&self, from: &Tree, nodes: I, kind: NodeKind) -> Result<Tree>
    where
        I: IntoIterator<Item = NodeId>,
    {
        merge_nodes_into_tree(&self.tree, from, nodes, kind, self.limits())
    }

    pub fn build_query(&self, query: &str) -> Result<FilterSpec> {
        Ok(build_query(query)?)
    }

    /// Compile and run a text query
    pub fn advanced_search(
        &self,
        query: &str,
        kind: NodeKind,
        with_children: bool,
        base_name: &str,
    ) -> Result<SearchResult> {
        let spec = build_query(query)?;
        self.search(&spec, kind, with_children, base_name)
    }

    /// Run an already compiled query
    pub fn search(
        &self,
        spec: &FilterSpec,
        kind: NodeKind,
        with_children: bool,
        base_name: &str,
    ) -> Result<SearchResult> {
        let mut filter = spec.compile()?;
        // the ancestor dimension is answered by extraction, not per node
        let ancestor = std::mem::take(&mut filter.ancestor);

        let subgraph = self.filter_subgraph(&ancestor.inc, &ancestor.exc, kind, base_name)?;

        let mut matched: Vec<(NodeId, NodeId)> = subgraph
            .descendants()
            .filter_map(|copy| subgraph.node(copy).origin.map(|src| (copy, src)))
            .filter(|&(_, src)| filter.matches(&self.tree.node_ref(src)))
            .collect();
        matched.sort_by_key(|&(_, src)| src);
        debug!(
            "{} of {} extracted nodes pass the node filter",
            matched.len(),
            subgraph.node_count() - 1
        );

        let mut result = Tree::synthetic(self.tree.pool().clone(), base_name);
        if !matched.is_empty() {
            let mut merger = TreeMerger::new(&self.tree, kind, *self.limits());
            for &(copy, src) in &matched {
                if let Some(at) = merger.insert(&subgraph, copy)? {
                    if with_children {
                        merger.insert_subtree(at, src)?;
                    }
                }
            }
            let merged = merger.finish();
            self.limits()
                .check_nodes(result.node_count() + merged.node_count())?;
            let root = result.root();
            result.graft(root, &merged);
        }

        let matches: Vec<NodeId> = matched.into_iter().map(|(_, src)| src).collect();
        info!(
            "Search matched {} nodes ({} in result tree)",
            matches.len(),
            result.node_count()
        );
        Ok(SearchResult {
            tree: result,
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::query::QueryError;

    /// Source
    ///   ├─ symptom
    ///   │    ├─ nervous system
    ///   │    │    ├─ headache ── ache
    ///   │    │    └─ symptom (nested label)
    ///   │    └─ digestive system ── ache
    ///   └─ disorder ── ache
    fn create_test_graph() -> ComorbidGraph {
        let json = r#"{"Source": {"children": {
            "symptom": {"children": {
                "nervous system": {"children": {
                    "headache": {"type": "symptom", "body": "pain in the head", "children": {
                        "ache": {"type": "symptom", "body": "dull ache"}
                    }},
                    "symptom": {"type": "symptom"}
                }},
                "digestive system": {"children": {
                    "ache": {"type": "symptom", "body": "stomach ache", "children": {
                        "cramp": {"type": "symptom", "body": "sharp"}
                    }}
                }}
            }},
            "disorder": {"type": "disorder", "children": {
                "ache": {"type": "disorder"}
            }}
        }}}"#;
        ComorbidGraph::from_json(json, GraphOptions::default().with_ids()).unwrap()
    }

    fn names_of(graph: &ComorbidGraph, result: &SearchResult) -> Vec<String> {
        result
            .matches()
            .iter()
            .map(|&id| graph.tree().name(id).to_string())
            .collect()
    }

    #[test]
    fn test_advanced_search() {
        let graph = create_test_graph();
        let query = "
            inc_name:symptom,ache
            inc_ancestor:symptom
        ";
        let result = graph
            .advanced_search(query, NodeKind::Concept, false, "search results")
            .unwrap();

        assert_eq!(names_of(&graph, &result), vec!["symptom", "ache", "symptom", "ache"]);

        let expected = "\
search results
└── Source
    └── symptom
        ├── nervous system
        │   ├── headache
        │   │   └── ache
        │   └── symptom
        └── digestive system
            └── ache
";
        assert_eq!(result.pretty_print(), expected);
    }

    #[test]
    fn test_with_children_attaches_full_subtrees() {
        let graph = create_test_graph();
        let result = graph
            .advanced_search("inc_name: digestive system", NodeKind::Concept, true, "r")
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(
            result.tree().names(),
            vec!["r", "Source", "symptom", "digestive system", "ache", "cramp"]
        );

        let without = graph
            .advanced_search("inc_name: digestive system", NodeKind::Concept, false, "r")
            .unwrap();
        assert_eq!(without.tree().node_count(), 4);
    }

    #[test]
    fn test_search_by_type_and_length() {
        let graph = create_test_graph();
        let result = graph
            .advanced_search(
                "inc_type: symptom\ninc_text_length: 9\nexc_content: head",
                NodeKind::Concept,
                false,
                "r",
            )
            .unwrap();

        // "dull ache" and "stomach ache" are long enough; "pain in the head" is excluded
        assert_eq!(names_of(&graph, &result), vec!["ache", "ache"]);
    }

    #[test]
    fn test_search_by_parent() {
        let graph = create_test_graph();
        let result = graph
            .advanced_search("inc_parent: disorder", NodeKind::Bare, false, "r")
            .unwrap();

        assert_eq!(result.len(), 1);
        let ache = result.tree().find_by_name("ache").next().unwrap();
        assert!(result.tree().node(ache).body.is_none());
        assert_eq!(result.tree().node_type(ache), "disorder");
    }

    #[test]
    fn test_exclude_ancestor_vetoes_full_path() {
        let graph = create_test_graph();
        let result = graph
            .advanced_search("inc_name: ache\nexc_ancestor: nervous system", NodeKind::Concept, false, "r")
            .unwrap();

        let parents: Vec<&str> = result
            .matches()
            .iter()
            .filter_map(|&id| graph.tree().parent(id))
            .map(|p| graph.tree().name(p))
            .collect();
        assert_eq!(parents, vec!["digestive system", "disorder"]);
    }

    #[test]
    fn test_empty_search_is_root_only() {
        let graph = create_test_graph();
        let result = graph
            .advanced_search("inc_name: fever", NodeKind::Concept, true, "nothing")
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.pretty_print(), "nothing\n");
    }

    #[test]
    fn test_query_errors_abort_search() {
        let graph = create_test_graph();

        assert!(matches!(
            graph.advanced_search("inc_name symptom", NodeKind::Concept, false, "r"),
            Err(Error::Parse(QueryError::Syntax(_)))
        ));
        assert!(matches!(
            graph.advanced_search("name:symptom", NodeKind::Concept, false, "r"),
            Err(Error::Parse(QueryError::UnknownDirective { .. }))
        ));
    }

    #[test]
    fn test_source_tree_untouched() {
        let graph = create_test_graph();
        let before = graph.pretty_print_tree();
        let count = graph.tree().node_count();

        graph
            .advanced_search("inc_ancestor: symptom", NodeKind::Concept, true, "r")
            .unwrap();
        graph
            .filter_subgraph(&["symptom"], &["ache"], NodeKind::Concept, "r")
            .unwrap();

        assert_eq!(graph.pretty_print_tree(), before);
        assert_eq!(graph.tree().node_count(), count);
    }

    #[test]
    fn test_concurrent_queries() {
        let graph = std::sync::Arc::new(create_test_graph());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let graph = graph.clone();
                std::thread::spawn(move || {
                    graph
                        .advanced_search("inc_name: ache", NodeKind::Concept, false, "r")
                        .unwrap()
                        .len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3);
        }
    }
}
