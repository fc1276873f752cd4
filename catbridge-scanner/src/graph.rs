use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::error::ScanError;

pub const CATEGORY_PREFIX: &str = "Category:";
pub const ROOT_IDENTIFIER: &str = "root_node";

/// Adds the `Category:` prefix when it is missing.
pub fn category_title(name: &str) -> String {
    if name.starts_with(CATEGORY_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", CATEGORY_PREFIX, name)
    }
}

/// Strips a leading `Category:` prefix, if any.
pub fn strip_category_prefix(title: &str) -> &str {
    title.strip_prefix(CATEGORY_PREFIX).unwrap_or(title)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Category,
    Page,
}

/// Which attribute keys a node for the duration of one crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeIdentity {
    #[default]
    Url,
    Name,
}

impl FromStr for NodeIdentity {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "url" => Ok(NodeIdentity::Url),
            "name" | "title" => Ok(NodeIdentity::Name),
            _ => Err(ScanError::InvalidNodeIdentityMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub identifier: String,
    pub title: String,
    pub url: Option<String>,
    pub page_id: Option<u64>,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_article: Option<String>,
}

impl GraphNode {
    pub fn root() -> Self {
        Self {
            identifier: ROOT_IDENTIFIER.to_string(),
            title: ROOT_IDENTIFIER.to_string(),
            url: None,
            page_id: None,
            kind: NodeKind::Root,
            main_article: None,
        }
    }

    pub fn new(
        kind: NodeKind,
        identity: NodeIdentity,
        title: &str,
        url: &str,
        page_id: Option<u64>,
    ) -> Self {
        let title = match kind {
            NodeKind::Category => category_title(title),
            _ => title.to_string(),
        };
        let identifier = match identity {
            NodeIdentity::Url => url.to_string(),
            NodeIdentity::Name => title.clone(),
        };
        Self {
            identifier,
            title,
            url: Some(url.to_string()),
            page_id,
            kind,
            main_article: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }
}

/// Directed category graph with a single sentinel root.
#[derive(Debug, Clone)]
pub struct CategoryGraph {
    graph: DiGraph<GraphNode, ()>,
    index: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl CategoryGraph {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(GraphNode::root());
        let mut index = HashMap::new();
        index.insert(ROOT_IDENTIFIER.to_string(), root);
        Self { graph, index, root }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Inserts a node, or merges missing attributes into the node that
    /// already carries the same identifier.
    pub fn upsert(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.identifier) {
            let existing = &mut self.graph[idx];
            if existing.url.is_none() {
                existing.url = node.url;
            }
            if existing.page_id.is_none() {
                existing.page_id = node.page_id;
            }
            if existing.main_article.is_none() {
                existing.main_article = node.main_article;
            }
            return idx;
        }
        let identifier = node.identifier.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(identifier, idx);
        idx
    }

    /// Adds `parent -> child`; inserting the same edge twice is a no-op.
    pub fn add_edge(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.graph.update_edge(parent, child, ());
    }

    pub fn set_main_article(&mut self, idx: NodeIndex, url: String) {
        if let Some(node) = self.graph.node_weight_mut(idx) {
            node.main_article = Some(url);
        }
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub fn find(&self, identifier: &str) -> Option<&GraphNode> {
        self.index.get(identifier).map(|&idx| &self.graph[idx])
    }

    pub fn index_of(&self, identifier: &str) -> Option<NodeIndex> {
        self.index.get(identifier).copied()
    }

    pub fn has_edge(&self, parent: &str, child: &str) -> bool {
        match (self.index_of(parent), self.index_of(child)) {
            (Some(a), Some(b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    pub fn parents(&self, identifier: &str) -> Vec<&GraphNode> {
        self.index_of(identifier)
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .map(|p| &self.graph[p])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Every node except the sentinel root, in insertion order.
    pub fn non_root_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights().filter(|n| !n.is_root())
    }

    pub fn edges(&self) -> impl Iterator<Item = (&GraphNode, &GraphNode)> {
        self.graph.raw_edges().iter().map(|e| {
            (&self.graph[e.source()], &self.graph[e.target()])
        })
    }

    /// Prefixed titles of every category node.
    pub fn category_titles(&self) -> HashSet<&str> {
        self.graph
            .node_weights()
            .filter(|n| n.kind == NodeKind::Category)
            .map(|n| n.title.as_str())
            .collect()
    }

    pub fn contains_category(&self, title: &str) -> bool {
        let wanted = category_title(title);
        self.graph
            .node_weights()
            .any(|n| n.kind == NodeKind::Category && n.title == wanted)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.graph.node_weights().filter(|n| n.kind == kind).count()
    }

    /// Number of edges on the longest path from the root, or `None` when the
    /// graph contains a cycle.
    pub fn longest_path_len(&self) -> Option<usize> {
        let order = toposort(&self.graph, None).ok()?;
        let mut dist: HashMap<NodeIndex, usize> = HashMap::new();
        dist.insert(self.root, 0);
        let mut longest = 0;
        for idx in order {
            let Some(&d) = dist.get(&idx) else {
                continue;
            };
            longest = longest.max(d);
            for child in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let entry = dist.entry(child).or_insert(0);
                *entry = (*entry).max(d + 1);
            }
        }
        Some(longest)
    }

    pub fn inner(&self) -> &DiGraph<GraphNode, ()> {
        &self.graph
    }
}

impl Default for CategoryGraph {
    fn default() -> Self {
        Self::new()
    }
}
