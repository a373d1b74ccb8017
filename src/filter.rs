//! Node predicates
//!
//! Every predicate takes an include list and an exclude list. With both lists
//! empty it matches everything. Otherwise at least one include entry must
//! match (when there are any) and no exclude entry may match; an entry in both
//! lists rejects the node.

use atoi::FromRadix10Checked;
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::query::QueryError;
use crate::tree::NodeRef;

/// Core include/exclude rule shared by all predicates
#[inline]
fn inc_exc<T>(inc: &[T], exc: &[T], matches: impl Fn(&T) -> bool) -> bool {
    if exc.iter().any(&matches) {
        return false;
    }
    inc.is_empty() || inc.iter().any(&matches)
}

/// Parse a non-negative decimal threshold, rejecting signs and trailing junk
pub(crate) fn parse_threshold(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    match usize::from_radix_10_checked(bytes) {
        (Some(n), used) if used == bytes.len() => Some(n),
        _ => None,
    }
}

impl NodeRef<'_> {
    /// Exact match on the node's name
    pub fn filter_name<S: AsRef<str>>(&self, inc: &[S], exc: &[S]) -> bool {
        let name = self.name();
        inc_exc(inc, exc, |s| s.as_ref() == name)
    }

    /// Exact match on the immediate parent's name; the root has no parent
    /// and so matches no entry
    pub fn filter_parent<S: AsRef<str>>(&self, inc: &[S], exc: &[S]) -> bool {
        let parent = self.parent().map(|p| p.name());
        inc_exc(inc, exc, |s| parent == Some(s.as_ref()))
    }

    /// Exact match on any name along the root-to-node path, the node included
    pub fn filter_ancestor<S: AsRef<str>>(&self, inc: &[S], exc: &[S]) -> bool {
        let tree = self.tree;
        let on_path = |s: &S| {
            let s = s.as_ref();
            self.name() == s || tree.ancestors(self.id).any(|id| tree.name(id) == s)
        };
        inc_exc(inc, exc, on_path)
    }

    /// Exact match on the node's type
    pub fn filter_type<S: AsRef<str>>(&self, inc: &[S], exc: &[S]) -> bool {
        let node_type = self.node_type();
        inc_exc(inc, exc, |s| s.as_ref() == node_type)
    }

    /// Thresholds are minimum body lengths in characters, inclusive. A node
    /// without a body matches no threshold, not even zero.
    pub fn filter_text_length(&self, inc: &[usize], exc: &[usize]) -> bool {
        let length = self.body().map(|body| body.chars().count());
        inc_exc(inc, exc, |&threshold| {
            length.is_some_and(|length| length >= threshold)
        })
    }

    /// Case-sensitive substring search in the body. A node without a body
    /// matches no keyword.
    pub fn filter_content<S: AsRef<str>>(&self, inc: &[S], exc: &[S]) -> bool {
        let body = self.body();
        inc_exc(inc, exc, |keyword| {
            body.is_some_and(|body| {
                memmem::find(body.as_bytes(), keyword.as_ref().as_bytes()).is_some()
            })
        })
    }

    /// True when every dimension of the labeled filter accepts the node.
    /// Fails only on a `text_length` entry that is not an integer; compile
    /// once and use [`NodeFilter::matches`] when testing many nodes.
    pub fn apply_lbl_content_filter(&self, spec: &FilterSpec) -> Result<bool, QueryError> {
        Ok(spec.compile()?.matches(self))
    }
}

/// A predicate dimension addressable from queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Name,
    Parent,
    Ancestor,
    Type,
    Content,
    TextLength,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Name,
        Dimension::Parent,
        Dimension::Ancestor,
        Dimension::Type,
        Dimension::Content,
        Dimension::TextLength,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Name => "name",
            Dimension::Parent => "parent",
            Dimension::Ancestor => "ancestor",
            Dimension::Type => "type",
            Dimension::Content => "content",
            Dimension::TextLength => "text_length",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| QueryError::UnknownDimension(s.to_string()))
    }
}

/// Include and exclude entries for one dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector<T = String> {
    pub inc: Vec<T>,
    pub exc: Vec<T>,
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Self {
            inc: Vec::new(),
            exc: Vec::new(),
        }
    }
}

impl<T> Selector<T> {
    pub fn new(inc: Vec<T>, exc: Vec<T>) -> Self {
        Self { inc, exc }
    }

    pub fn is_empty(&self) -> bool {
        self.inc.is_empty() && self.exc.is_empty()
    }
}

/// Labeled filter: dimension → include/exclude strings.
///
/// Serializes as `{"name": {"inc": [...], "exc": [...]}, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec(BTreeMap<Dimension, Selector>);

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dimension: Dimension) -> Option<&Selector> {
        self.0.get(&dimension)
    }

    /// Selector for `dimension`, created empty if absent
    pub fn selector_mut(&mut self, dimension: Dimension) -> &mut Selector {
        self.0.entry(dimension).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &Selector)> {
        self.0.iter().map(|(d, s)| (*d, s))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from the plain nested-map shape, `{"name": {"inc": [..], "exc": [..]}}`.
    /// Either list may be missing.
    pub fn from_labeled(
        labeled: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    ) -> Result<Self, QueryError> {
        labeled
            .into_iter()
            .map(|(dimension, mut lists)| {
                let dimension: Dimension = dimension.parse()?;
                if let Some(key) = lists.keys().find(|k| *k != "inc" && *k != "exc") {
                    return Err(QueryError::Malformed(format!(
                        "unknown list {:?} for {} (expected inc or exc)",
                        key, dimension
                    )));
                }
                let inc = lists.remove("inc").unwrap_or_default();
                let exc = lists.remove("exc").unwrap_or_default();
                Ok((dimension, Selector::new(inc, exc)))
            })
            .collect()
    }

    /// Turn the string entries into a typed filter
    pub fn compile(&self) -> Result<NodeFilter, QueryError> {
        let mut filter = NodeFilter::default();
        for (dimension, selector) in self.iter() {
            match dimension {
                Dimension::Name => extend(&mut filter.name, selector),
                Dimension::Parent => extend(&mut filter.parent, selector),
                Dimension::Ancestor => extend(&mut filter.ancestor, selector),
                Dimension::Type => extend(&mut filter.node_type, selector),
                Dimension::Content => extend(&mut filter.content, selector),
                Dimension::TextLength => {
                    filter.text_length.inc.extend(thresholds(&selector.inc)?);
                    filter.text_length.exc.extend(thresholds(&selector.exc)?);
                }
            }
        }
        Ok(filter)
    }
}

impl FromIterator<(Dimension, Selector)> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = (Dimension, Selector)>>(iter: I) -> Self {
        let mut spec = FilterSpec::new();
        for (dimension, selector) in iter {
            let entry = spec.selector_mut(dimension);
            entry.inc.extend(selector.inc);
            entry.exc.extend(selector.exc);
        }
        spec
    }
}

fn extend(target: &mut Selector, source: &Selector) {
    target.inc.extend(source.inc.iter().cloned());
    target.exc.extend(source.exc.iter().cloned());
}

fn thresholds(values: &[String]) -> Result<Vec<usize>, QueryError> {
    values
        .iter()
        .map(|v| parse_threshold(v).ok_or_else(|| QueryError::InvalidThreshold(v.clone())))
        .collect()
}

/// Typed filter over every dimension; empty selectors are vacuous
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub name: Selector,
    pub parent: Selector,
    pub ancestor: Selector,
    pub node_type: Selector,
    pub content: Selector,
    pub text_length: Selector<usize>,
}

impl NodeFilter {
    pub fn matches(&self, node: &NodeRef<'_>) -> bool {
        // cheap structural checks first, path and body scans last
        node.filter_name(&self.name.inc, &self.name.exc)
            && node.filter_type(&self.node_type.inc, &self.node_type.exc)
            && node.filter_parent(&self.parent.inc, &self.parent.exc)
            && node.filter_text_length(&self.text_length.inc, &self.text_length.exc)
            && node.filter_ancestor(&self.ancestor.inc, &self.ancestor.exc)
            && node.filter_content(&self.content.inc, &self.content.exc)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.parent.is_empty()
            && self.ancestor.is_empty()
            && self.node_type.is_empty()
            && self.content.is_empty()
            && self.text_length.is_empty()
    }
}
