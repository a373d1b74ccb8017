//! Python bindings for comorbid_graphs
//!
//! This module provides PyO3-based Python bindings for the Rust core.

use pyo3::exceptions::{PyIOError, PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{GraphOptions, Limits};
use crate::error::Error;
use crate::filter::FilterSpec;
use crate::loader::LoadError;
use crate::searcher::ComorbidGraph as RustGraph;
use crate::tree::{NodeId, NodeKind, NodeRef, Tree as RustTree};

/// Convert crate errors to Python exceptions
impl From<Error> for PyErr {
    fn from(err: Error) -> PyErr {
        match err {
            Error::Load(LoadError::Io(e)) => PyIOError::new_err(e.to_string()),
            Error::Resource { .. } => PyRuntimeError::new_err(err.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

fn options(assign_ids: bool, max_depth: Option<usize>, max_nodes: Option<usize>) -> GraphOptions {
    let defaults = Limits::default();
    GraphOptions {
        assign_ids,
        limits: Limits {
            max_depth: max_depth.unwrap_or(defaults.max_depth),
            max_nodes: max_nodes.unwrap_or(defaults.max_nodes),
        },
    }
}

type LabeledFilter = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// A concept tree, either loaded or produced by a search operation.
#[pyclass(name = "Tree", frozen)]
#[derive(Clone)]
pub struct PyTree {
    pub(crate) inner: Arc<RustTree>,
}

impl PyTree {
    fn node_ref(&self, id: NodeId) -> PyResult<NodeRef<'_>> {
        if id >= self.inner.node_count() {
            return Err(PyIndexError::new_err(format!("node index out of range: {}", id)));
        }
        Ok(self.inner.node_ref(id))
    }
}

#[pymethods]
impl PyTree {
    /// Render the tree with box-drawing guides, one node per line.
    fn pretty_print_tree(&self) -> String {
        self.inner.pretty_print()
    }

    /// Node names in pre-order.
    fn names(&self) -> Vec<String> {
        self.inner.names().into_iter().map(str::to_string).collect()
    }

    /// Name of the node with arena index `id`.
    fn name(&self, id: NodeId) -> PyResult<String> {
        self.inner
            .get_node(id)
            .map(|node| self.inner.pool().resolve(node.name).to_string())
            .ok_or_else(|| PyIndexError::new_err(format!("node index out of range: {}", id)))
    }

    /// Arena indices of every node except the root, in pre-order.
    fn descendants(&self) -> Vec<NodeId> {
        self.inner.descendants().collect()
    }

    fn __len__(&self) -> usize {
        self.inner.node_count()
    }

    /// Exact name test on node `id`.
    #[pyo3(signature = (id, inc=Vec::new(), exc=Vec::new()))]
    fn filter_name(&self, id: NodeId, inc: Vec<String>, exc: Vec<String>) -> PyResult<bool> {
        Ok(self.node_ref(id)?.filter_name(&inc, &exc))
    }

    /// Exact test on the name of the parent of node `id`.
    #[pyo3(signature = (id, inc=Vec::new(), exc=Vec::new()))]
    fn filter_parent(&self, id: NodeId, inc: Vec<String>, exc: Vec<String>) -> PyResult<bool> {
        Ok(self.node_ref(id)?.filter_parent(&inc, &exc))
    }

    /// Exact test on every name from the root down to node `id`.
    #[pyo3(signature = (id, inc=Vec::new(), exc=Vec::new()))]
    fn filter_ancestor(&self, id: NodeId, inc: Vec<String>, exc: Vec<String>) -> PyResult<bool> {
        Ok(self.node_ref(id)?.filter_ancestor(&inc, &exc))
    }

    #[pyo3(signature = (id, inc=Vec::new(), exc=Vec::new()))]
    fn filter_type(&self, id: NodeId, inc: Vec<String>, exc: Vec<String>) -> PyResult<bool> {
        Ok(self.node_ref(id)?.filter_type(&inc, &exc))
    }

    /// Minimum body lengths in characters; a node without a body matches none.
    #[pyo3(signature = (id, inc=Vec::new(), exc=Vec::new()))]
    fn filter_text_length(&self, id: NodeId, inc: Vec<usize>, exc: Vec<usize>) -> PyResult<bool> {
        Ok(self.node_ref(id)?.filter_text_length(&inc, &exc))
    }

    /// Case-sensitive substring test on the body.
    #[pyo3(signature = (id, inc=Vec::new(), exc=Vec::new()))]
    fn filter_content(&self, id: NodeId, inc: Vec<String>, exc: Vec<String>) -> PyResult<bool> {
        Ok(self.node_ref(id)?.filter_content(&inc, &exc))
    }

    /// Test node `id` against a labeled filter.
    ///
    /// Example:
    ///     >>> tree.apply_lbl_content_filter(3, {"type": {"inc": ["symptom"], "exc": []}})
    ///     True
    fn apply_lbl_content_filter(&self, id: NodeId, spec: LabeledFilter) -> PyResult<bool> {
        let spec = FilterSpec::from_labeled(spec).map_err(Error::from)?;
        let matched = self
            .node_ref(id)?
            .apply_lbl_content_filter(&spec)
            .map_err(Error::from)?;
        Ok(matched)
    }

    fn __str__(&self) -> String {
        self.inner.pretty_print()
    }

    fn __repr__(&self) -> String {
        format!(
            "<Tree root='{}' len={}>",
            self.inner.name(self.inner.root()),
            self.inner.node_count()
        )
    }
}

/// A loaded concept graph with filtering, extraction, merge and search.
///
/// Node kinds are given as strings: "ComorbidGraphNode" (full copies) or
/// "Node" (copies without body text).
#[pyclass(name = "ComorbidGraph", frozen)]
pub struct PyComorbidGraph {
    inner: Arc<RustGraph>,
}

#[pymethods]
impl PyComorbidGraph {
    /// Build a graph from a JSON document.
    ///
    /// Args:
    ///     text: JSON records keyed by concept name
    ///     assign_ids: Give every node a stable id (pre-order, from 0)
    ///
    /// Returns:
    ///     ComorbidGraph instance
    #[staticmethod]
    #[pyo3(signature = (text, assign_ids=false, max_depth=None, max_nodes=None))]
    fn from_json(
        py: Python<'_>,
        text: &str,
        assign_ids: bool,
        max_depth: Option<usize>,
        max_nodes: Option<usize>,
    ) -> PyResult<Self> {
        let options = options(assign_ids, max_depth, max_nodes);
        let graph = py.detach(|| RustGraph::from_json(text, options))?;
        Ok(PyComorbidGraph {
            inner: Arc::new(graph),
        })
    }

    /// Build a graph from a JSON file.
    ///
    /// Automatically detects and handles gzip-compressed files (.json.gz).
    #[staticmethod]
    #[pyo3(signature = (path, assign_ids=false, max_depth=None, max_nodes=None))]
    fn from_file(
        py: Python<'_>,
        path: &str,
        assign_ids: bool,
        max_depth: Option<usize>,
        max_nodes: Option<usize>,
    ) -> PyResult<Self> {
        let options = options(assign_ids, max_depth, max_nodes);
        let graph = py.detach(|| RustGraph::from_file(path, options))?;
        Ok(PyComorbidGraph {
            inner: Arc::new(graph),
        })
    }

    /// The source tree.
    #[getter]
    fn tree(&self) -> PyTree {
        PyTree {
            inner: Arc::new(self.inner.tree().clone()),
        }
    }

    fn pretty_print_tree(&self) -> String {
        self.inner.pretty_print_tree()
    }

    /// Copy the nodes whose path contains an `inc` name and no `exc` name.
    ///
    /// Returns:
    ///     Tree rooted at a synthetic node called `base_name`
    #[pyo3(signature = (inc, exc, node_type="ComorbidGraphNode", base_name="subgraph results"))]
    fn filter_subgraph(
        &self,
        py: Python<'_>,
        inc: Vec<String>,
        exc: Vec<String>,
        node_type: &str,
        base_name: &str,
    ) -> PyResult<PyTree> {
        let kind: NodeKind = node_type.parse()?;
        let tree = py.detach(|| self.inner.filter_subgraph(&inc, &exc, kind, base_name))?;
        Ok(PyTree {
            inner: Arc::new(tree),
        })
    }

    /// Merge nodes of `tree` back into one tree with their full lineage.
    ///
    /// Args:
    ///     tree: This graph's tree or a tree derived from it
    ///     nodes: Node indices within `tree`
    #[pyo3(signature = (tree, nodes, node_type="ComorbidGraphNode"))]
    fn merge_nodes_into_tree(
        &self,
        py: Python<'_>,
        tree: &PyTree,
        nodes: Vec<NodeId>,
        node_type: &str,
    ) -> PyResult<PyTree> {
        let kind: NodeKind = node_type.parse()?;
        if let Some(&bad) = nodes.iter().find(|&&id| id >= tree.inner.node_count()) {
            return Err(PyIndexError::new_err(format!("node index out of range: {}", bad)));
        }
        let merged = py.detach(|| self.inner.merge_nodes_into_tree(&tree.inner, nodes, kind))?;
        Ok(PyTree {
            inner: Arc::new(merged),
        })
    }

    /// Compile query text into a labeled filter.
    ///
    /// Example:
    ///     >>> graph.build_query("inc_name:symptom,ache")
    ///     {'name': {'inc': ['symptom', 'ache'], 'exc': []}}
    fn build_query(&self, query: &str) -> PyResult<LabeledFilter> {
        let spec = self.inner.build_query(query)?;
        Ok(spec
            .iter()
            .map(|(dimension, selector)| {
                let entry = BTreeMap::from([
                    ("inc".to_string(), selector.inc.clone()),
                    ("exc".to_string(), selector.exc.clone()),
                ]);
                (dimension.to_string(), entry)
            })
            .collect())
    }

    /// Run a text query and return the merged result tree.
    ///
    /// Example:
    ///     >>> tree = graph.advanced_search("inc_name:ache\ninc_ancestor:symptom")
    ///     >>> print(tree.pretty_print_tree())
    #[pyo3(signature = (query, node_type="ComorbidGraphNode", with_children=false, base_name="search results"))]
    fn advanced_search(
        &self,
        py: Python<'_>,
        query: &str,
        node_type: &str,
        with_children: bool,
        base_name: &str,
    ) -> PyResult<PyTree> {
        let kind: NodeKind = node_type.parse()?;
        let result = py.detach(|| self.inner.advanced_search(query, kind, with_children, base_name))?;
        Ok(PyTree {
            inner: Arc::new(result.into_tree()),
        })
    }

    fn __len__(&self) -> usize {
        self.inner.tree().node_count()
    }

    fn __repr__(&self) -> String {
        format!("<ComorbidGraph len={}>", self.inner.tree().node_count())
    }
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn comorbid_graphs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTree>()?;
    m.add_class::<PyComorbidGraph>()?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;

    Ok(())
}
