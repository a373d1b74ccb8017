//! Arena tree of concept nodes
//!
//! Nodes live in a `Vec` and refer to each other by index. Trees produced by
//! extraction or merge are new arenas that share the source's string pool
//! and remember, per node, which source node they were copied from.

use crate::error::Error;
use crate::pool::{StringPool, Sym};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Index of a node within its tree
pub type NodeId = usize;

/// Type tag given to nodes whose record carries none
pub const DEFAULT_TYPE: &str = "default";

/// Identifier assigned at load time, kept across copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StableId(pub u64);

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Weak back-reference from a copy to its parent in the source tree.
/// Used for lookup and display only, never for traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lineage {
    pub node: NodeId,
    pub name: Sym,
}

/// A concept in the knowledge graph
#[derive(Debug, Clone)]
pub struct Node {
    pub name: Sym,
    pub node_type: Sym,
    pub body: Option<Arc<str>>,
    pub id: Option<StableId>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub old_parent: Option<Lineage>,
    /// Source node this one was copied from
    pub origin: Option<NodeId>,
}

impl Node {
    /// Create a detached node with no body
    pub fn new(name: Sym, node_type: Sym) -> Self {
        Self {
            name,
            node_type,
            body: None,
            id: None,
            parent: None,
            children: Vec::new(),
            old_parent: None,
            origin: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Arc<str>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_id(mut self, id: StableId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Constructor used for nodes of extraction and merge output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// Full copy: name, type, body and id
    #[default]
    Concept,
    /// Outline copy: name, type and id, without the body
    Bare,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Concept => "ComorbidGraphNode",
            NodeKind::Bare => "Node",
        }
    }

    /// Build a detached copy of `src` recording where it came from
    pub fn build(&self, src: &Node, origin: NodeId) -> Node {
        let body = match self {
            NodeKind::Concept => src.body.clone(),
            NodeKind::Bare => None,
        };
        Node {
            name: src.name,
            node_type: src.node_type,
            body,
            id: src.id,
            parent: None,
            children: Vec::new(),
            old_parent: None,
            origin: Some(origin),
        }
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ComorbidGraphNode" | "concept" => Ok(NodeKind::Concept),
            "Node" | "bare" => Ok(NodeKind::Bare),
            _ => Err(Error::Lookup(s.to_string())),
        }
    }
}

/// A rooted tree of nodes
#[derive(Debug, Clone)]
pub struct Tree {
    pool: StringPool,
    nodes: Vec<Node>,
    root: NodeId,
    derived: bool,
}

impl Tree {
    /// Create a source tree holding just `root`
    pub fn new(pool: StringPool, root: Node) -> Self {
        Self::with_root(pool, root, false)
    }

    /// Create a tree of copies holding just `root`
    pub fn derived(pool: StringPool, root: Node) -> Self {
        Self::with_root(pool, root, true)
    }

    /// Create a tree of copies under a synthetic root called `base_name`
    pub fn synthetic(pool: StringPool, base_name: &str) -> Self {
        let name = pool.get_or_intern(base_name);
        let node_type = pool.get_or_intern(DEFAULT_TYPE);
        Self::derived(pool, Node::new(name, node_type))
    }

    fn with_root(pool: StringPool, mut root: Node, derived: bool) -> Self {
        root.parent = None;
        root.children.clear();
        Self {
            pool,
            nodes: vec![root],
            root: 0,
            derived,
        }
    }

    /// Append `node` as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = self.nodes.len();
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// True for trees produced by extraction or merge
    pub fn is_derived(&self) -> bool {
        self.derived
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.pool.resolve(self.nodes[id].name)
    }

    pub fn node_type(&self, id: NodeId) -> &str {
        self.pool.resolve(self.nodes[id].node_type)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Iterate from the parent of `id` up to the root
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.nodes[id].parent,
        }
    }

    /// Nodes from the root down to and including `id`
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path: Vec<NodeId> = self.ancestors(id).collect();
        path.reverse();
        path.push(id);
        path
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Pre-order walk of the whole tree yielding `(node, depth)`
    pub fn pre_order(&self) -> PreOrder<'_> {
        self.pre_order_from(self.root)
    }

    /// Pre-order walk of the subtree rooted at `id`
    pub fn pre_order_from(&self, id: NodeId) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![(id, 0)],
        }
    }

    /// Post-order listing of the whole tree: children before parents
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.nodes[id].children.iter().rev() {
                stack.push((child, false));
            }
        }
        out
    }

    /// Every node except the root, in pre-order
    pub fn descendants(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pre_order().skip(1).map(|(id, _)| id)
    }

    /// Nodes named `name`, in pre-order
    pub fn find_by_name<'a>(&'a self, name: &str) -> impl Iterator<Item = NodeId> + 'a {
        let sym = self.pool.get(name);
        self.pre_order()
            .map(|(id, _)| id)
            .filter(move |&id| Some(self.nodes[id].name) == sym)
    }

    /// Nodes without children, in pre-order
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pre_order()
            .map(|(id, _)| id)
            .filter(|&id| self.nodes[id].children.is_empty())
    }

    /// Resolved names of every node, in pre-order
    pub fn names(&self) -> Vec<&str> {
        self.pre_order().map(|(id, _)| self.name(id)).collect()
    }

    /// Display label: the name, followed by the original parent's name when
    /// the node was relocated away from it
    pub fn label(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        let name = self.pool.resolve(node.name);
        match node.old_parent {
            Some(lineage) if !self.is_live_parent(id, lineage) => {
                format!("{} - {}", name, self.pool.resolve(lineage.name))
            }
            _ => name.to_string(),
        }
    }

    /// Same source node, or a merged stand-in carrying the same name
    fn is_live_parent(&self, id: NodeId, lineage: Lineage) -> bool {
        self.nodes[id].parent.is_some_and(|p| {
            let parent = &self.nodes[p];
            parent.origin == Some(lineage.node) || parent.name == lineage.name
        })
    }

    /// Copy all of `other` below `parent`, returning the id of its root copy.
    /// Both trees must share a string pool.
    pub fn graft(&mut self, parent: NodeId, other: &Tree) -> NodeId {
        let mut placed = vec![0; other.nodes.len()];
        for (id, _) in other.pre_order() {
            let at = match other.nodes[id].parent {
                Some(p) => placed[p],
                None => parent,
            };
            placed[id] = self.add_child(at, other.nodes[id].clone());
        }
        placed[other.root]
    }

    /// Reorder every child list by `key`, keeping equal keys in place
    pub(crate) fn sort_children_by_key<K: Ord>(&mut self, key: impl Fn(&Node) -> K) {
        for id in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[id].children);
            children.sort_by_key(|&child| key(&self.nodes[child]));
            self.nodes[id].children = children;
        }
    }

    /// Render the tree as indented text, one node per line
    pub fn pretty_print(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // (node, prefix inherited from ancestors, is last sibling)
        let mut stack: Vec<(NodeId, String, bool)> = vec![(self.root, String::new(), true)];
        while let Some((id, prefix, last)) = stack.pop() {
            let is_root = id == self.root;
            let connector = match (is_root, last) {
                (true, _) => "",
                (false, true) => "└── ",
                (false, false) => "├── ",
            };
            writeln!(f, "{}{}{}", prefix, connector, self.label(id))?;

            let child_prefix = match (is_root, last) {
                (true, _) => String::new(),
                (false, true) => format!("{}    ", prefix),
                (false, false) => format!("{}│   ", prefix),
            };
            let children = &self.nodes[id].children;
            for (i, &child) in children.iter().enumerate().rev() {
                stack.push((child, child_prefix.clone(), i + 1 == children.len()));
            }
        }
        Ok(())
    }
}

/// Iterator over the ancestors of a node, nearest first
pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree.nodes[id].parent;
        Some(id)
    }
}

/// Depth-first pre-order iterator
pub struct PreOrder<'a> {
    tree: &'a Tree,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for PreOrder<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        for &child in self.tree.nodes[id].children.iter().rev() {
            self.stack.push((child, depth + 1));
        }
        Some((id, depth))
    }
}

/// A node together with the tree it lives in
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    pub tree: &'a Tree,
    pub id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn node(&self) -> &'a Node {
        self.tree.node(self.id)
    }

    pub fn name(&self) -> &'a str {
        self.tree.name(self.id)
    }

    pub fn node_type(&self) -> &'a str {
        self.tree.node_type(self.id)
    }

    pub fn body(&self) -> Option<&'a str> {
        self.node().body.as_deref()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.tree.parent(self.id).map(|id| self.tree.node_ref(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.children(self.id).iter().map(move |&id| tree.node_ref(id))
    }
}
