// Graph export to node-link JSON and Graphviz DOT

use catbridge_scanner::error::{Result, ScanError};
use catbridge_scanner::{CategoryGraph, GraphNode, NodeKind};
use petgraph::dot::{Config, Dot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphFormat {
    #[default]
    Json,
    Dot,
}

impl FromStr for GraphFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(GraphFormat::Json),
            "dot" | "graphviz" => Ok(GraphFormat::Dot),
            _ => Err(ScanError::InvalidOption {
                option: "graph format",
                value: s.to_string(),
                expected: "json or dot",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
}

/// Node-link document, keyed by node identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub directed: bool,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphDocument {
    pub fn from_graph(graph: &CategoryGraph) -> Self {
        Self {
            directed: true,
            nodes: graph.nodes().cloned().collect(),
            edges: graph
                .edges()
                .map(|(parent, child)| EdgeRecord {
                    source: parent.identifier.clone(),
                    target: child.identifier.clone(),
                })
                .collect(),
        }
    }
}

pub fn graph_to_json(graph: &CategoryGraph) -> Result<String> {
    serde_json::to_string_pretty(&GraphDocument::from_graph(graph))
        .map_err(|e| ScanError::ParseError(e.to_string()))
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_attributes(node: &GraphNode) -> String {
    let shape = match node.kind {
        NodeKind::Root => "point",
        NodeKind::Category => "box",
        NodeKind::Page => "ellipse",
    };
    let mut attrs = format!("label = \"{}\" shape = {} ", escape(&node.title), shape);
    if let Some(url) = &node.url {
        attrs.push_str(&format!("URL = \"{}\" ", escape(url)));
    }
    attrs
}

pub fn graph_to_dot(graph: &CategoryGraph) -> String {
    let inner = graph.inner();
    let dot = Dot::with_attr_getters(
        inner,
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &|_, _| String::new(),
        &|_, (_, node)| node_attributes(node),
    );
    format!("{:?}", dot)
}

pub fn render_graph(graph: &CategoryGraph, format: GraphFormat) -> Result<String> {
    match format {
        GraphFormat::Json => graph_to_json(graph),
        GraphFormat::Dot => Ok(graph_to_dot(graph)),
    }
}

/// Expands a leading `~` in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

pub fn write_graph(graph: &CategoryGraph, path: &Path, format: GraphFormat) -> Result<()> {
    let rendered = render_graph(graph, format)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, rendered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catbridge_scanner::NodeIdentity;

    fn sample() -> CategoryGraph {
        let mut graph = CategoryGraph::new();
        let root = graph.root();
        let ai = graph.upsert(GraphNode::new(
            NodeKind::Category,
            NodeIdentity::Name,
            "Artificial intelligence",
            "https://en.wikipedia.org/wiki/Category:Artificial_intelligence",
            Some(1),
        ));
        let page = graph.upsert(GraphNode::new(
            NodeKind::Page,
            NodeIdentity::Name,
            "Perceptron \"classic\"",
            "https://en.wikipedia.org/wiki/Perceptron",
            Some(2),
        ));
        graph.add_edge(root, ai);
        graph.add_edge(ai, page);
        graph
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<GraphFormat>().unwrap(), GraphFormat::Json);
        assert_eq!("dot".parse::<GraphFormat>().unwrap(), GraphFormat::Dot);
        assert!(matches!(
            "xml".parse::<GraphFormat>(),
            Err(ScanError::InvalidOption { option: "graph format", ref value, .. }) if value == "xml"
        ));
    }

    #[test]
    fn test_json_document_lists_nodes_and_edges() {
        let doc = GraphDocument::from_graph(&sample());
        assert!(doc.directed);
        assert_eq!(doc.nodes.len(), 3);
        assert!(doc.edges.contains(&EdgeRecord {
            source: "root_node".to_string(),
            target: "Category:Artificial intelligence".to_string(),
        }));

        let json = graph_to_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(value["edges"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_dot_escapes_titles() {
        let dot = graph_to_dot(&sample());
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("shape = box"));
        assert!(dot.contains(r#"label = "Perceptron \"classic\"""#));
        assert!(dot.contains("->"));
    }

    #[test]
    fn test_expand_path_keeps_plain_paths() {
        assert_eq!(expand_path("out/graph.json"), PathBuf::from("out/graph.json"));
    }
}
