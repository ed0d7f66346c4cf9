// SPDX-License-Identifier: AGPL-3.0

//! Execution graph side-channel for debugging explorations.
//!
//! Nodes correspond to schedule entries; edges are labelled with the branch
//! direction ("T"/"F", empty for assumptions). Terminal nodes carry the
//! path's outcome and a color. Rendering the DOT output is left to external
//! tools.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// Node color in the rendered graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeColor {
    /// Ordinary decision or terminal node.
    Black,
    /// Path discarded as unsatisfiable.
    Blue,
    /// Path aborted by an error or uncheckable constraint.
    Red,
}

impl NodeColor {
    fn as_str(&self) -> &'static str {
        match self {
            NodeColor::Black => "black",
            NodeColor::Blue => "blue",
            NodeColor::Red => "red",
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    label: String,
    color: NodeColor,
}

/// The exploration graph of one `explore` call.
#[derive(Debug)]
pub struct ExploreGraph {
    graph: DiGraph<NodeData, String>,
}

impl ExploreGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
        }
    }

    /// Add a node with the placeholder label.
    pub fn new_node(&mut self) -> NodeIndex {
        self.graph.add_node(NodeData {
            label: "?".to_string(),
            color: NodeColor::Black,
        })
    }

    pub fn new_edge(&mut self, from: NodeIndex, to: NodeIndex, label: &str) {
        self.graph.add_edge(from, to, label.to_string());
    }

    pub fn set_label(&mut self, node: NodeIndex, label: &str) {
        if let Some(data) = self.graph.node_weight_mut(node) {
            data.label = label.to_string();
        }
    }

    pub fn set_color(&mut self, node: NodeIndex, color: NodeColor) {
        if let Some(data) = self.graph.node_weight_mut(node) {
            data.color = color;
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Render GraphViz source.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph G {\n");
        for node in self.graph.node_indices() {
            let data = &self.graph[node];
            out.push_str(&format!(
                "n{} [label={},color={},shape=box];\n",
                node.index(),
                dot_quote(&truncate_label(&data.label)),
                dot_quote(data.color.as_str()),
            ));
        }
        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "n{} -> n{} [label={}];\n",
                edge.source().index(),
                edge.target().index(),
                dot_quote(edge.weight()),
            ));
        }
        out.push_str("}\n");
        out
    }
}

impl Default for ExploreGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn dot_quote(s: &str) -> String {
    format!(
        "\"{}\"",
        s.replace('\\', "\\\\").replace('\n', "\\l").replace('"', "\\\"")
    )
}

/// Keep long labels readable: first five and last four lines.
fn truncate_label(label: &str) -> String {
    let lines: Vec<&str> = label.lines().collect();
    if lines.len() <= 10 {
        return label.to_string();
    }
    let mut kept: Vec<String> = lines[..5].iter().map(|s| s.to_string()).collect();
    kept.push(format!(".. {} more lines ..", lines.len() - 9));
    kept.extend(lines[lines.len() - 4..].iter().map(|s| s.to_string()));
    kept.join("\n")
}
