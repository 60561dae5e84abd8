//! Mermaid risk map for an extracted graph, addressed through mermaid.ink.

use base64::Engine;
use std::collections::{HashMap, HashSet};

use crate::{Edge, Graph, Node, RiskAnnotation};

pub const MERMAID_IMAGE_BASE: &str = "https://mermaid.ink/img/";

const WARNING_GLYPH: &str = "⚠️";
const NORMAL_CLASS: &str = "normalNode";
const RISKY_CLASS: &str = "riskyNode";
const NORMAL_CLASS_DEF: &str = "    classDef normalNode fill:#ffffff,stroke:#333,stroke-width:1px;";
const RISKY_CLASS_DEF: &str =
    "    classDef riskyNode fill:#fff5f5,stroke:#ff0000,stroke-width:2px,stroke-dasharray: 5 5;";

/// Edge labels longer than this (in chars) get one line break at the first space.
const WRAP_THRESHOLD: usize = 12;

const RESERVED_WORDS: &[&str] = &[
    "end", "graph", "flowchart", "subgraph", "direction", "style", "class", "classdef", "click",
    "linkstyle", "default",
];

/// Mermaid flowchart for the graph with risky elements highlighted.
///
/// Nodes and relationships keep their input order; relationship positions
/// are what `RiskAnnotation::edge_indices` refer to. Unknown node ids and
/// out-of-range indices in the annotation simply never match.
pub fn render_mermaid(graph: &Graph, risk: &RiskAnnotation) -> String {
    let ids = DiagramIds::for_graph(graph);
    let mut lines: Vec<String> = Vec::with_capacity(graph.nodes.len() + graph.relationships.len() + 3);
    lines.push("graph TD".to_string());

    for node in &graph.nodes {
        lines.push(node_line(node, ids.token(&node.id), risk.is_risky_node(&node.id)));
    }

    for (index, edge) in graph.relationships.iter().enumerate() {
        lines.push(edge_line(
            edge,
            ids.token(&edge.source_id),
            ids.token(&edge.target_id),
            risk.is_risky_edge(index),
        ));
    }

    lines.push(NORMAL_CLASS_DEF.to_string());
    lines.push(RISKY_CLASS_DEF.to_string());
    lines.join("\n")
}

/// mermaid.ink image URL: standard, padded base64 of the UTF-8 markup.
pub fn mermaid_image_url(markup: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(markup.as_bytes());
    format!("{MERMAID_IMAGE_BASE}{encoded}")
}

pub fn graph_image_url(graph: &Graph, risk: &RiskAnnotation) -> String {
    mermaid_image_url(&render_mermaid(graph, risk))
}

/// Relationship label: underscores become spaces, and a long multi-word
/// label is broken once at its first space.
pub fn edge_label(kind: &str) -> String {
    let label = kind.replace('_', " ");
    if label.chars().count() > WRAP_THRESHOLD && label.contains(' ') {
        label.replacen(' ', "\\n", 1)
    } else {
        label
    }
}

fn node_line(node: &Node, token: &str, risky: bool) -> String {
    let name = escape_label(&node.display_name());
    let text = match node.role() {
        Some(role) => format!("<b>{name}</b><br/>[{}]", escape_label(&role)),
        None => name,
    };
    let (prefix, class) = if risky {
        (format!("{WARNING_GLYPH} "), RISKY_CLASS)
    } else {
        (String::new(), NORMAL_CLASS)
    };
    format!("    {token}[\"{prefix}{text}\"]:::{class}")
}

fn edge_line(edge: &Edge, source: &str, target: &str, risky: bool) -> String {
    let label = escape_label(&edge_label(edge.kind.as_deref().unwrap_or_default()));
    if risky {
        format!("    {source} -. \"{WARNING_GLYPH} {label}\" .-> {target}")
    } else {
        format!("    {source} ---|\"{label}\"| {target}")
    }
}

/// Double quotes would terminate the quoted label; Mermaid reads `#quot;` as one.
fn escape_label(text: &str) -> String {
    text.replace('"', "#quot;")
}

fn is_safe_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.contains(&id.to_ascii_lowercase().as_str())
}

/// Stable mapping from graph ids to Mermaid node identifiers.
///
/// Safe ids pass through unchanged. Anything else gets the next free `n{k}`
/// token, assigned in order of first appearance (nodes first, then
/// relationship endpoints), skipping tokens that collide with a safe id.
struct DiagramIds<'a> {
    tokens: HashMap<&'a str, String>,
}

impl<'a> DiagramIds<'a> {
    fn for_graph(graph: &'a Graph) -> Self {
        let appearances: Vec<&'a str> = graph
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .chain(
                graph
                    .relationships
                    .iter()
                    .flat_map(|e| [e.source_id.as_str(), e.target_id.as_str()]),
            )
            .collect();
        let taken: HashSet<&str> = appearances
            .iter()
            .copied()
            .filter(|id| is_safe_identifier(id))
            .collect();

        let mut tokens = HashMap::new();
        let mut next = 0usize;
        for id in appearances {
            if tokens.contains_key(id) {
                continue;
            }
            let token = if is_safe_identifier(id) {
                id.to_string()
            } else {
                loop {
                    let candidate = format!("n{next}");
                    next += 1;
                    if !taken.contains(candidate.as_str()) {
                        break candidate;
                    }
                }
            };
            tokens.insert(id, token);
        }
        Self { tokens }
    }

    fn token(&self, id: &str) -> &str {
        // every id reaching here was collected in for_graph
        self.tokens.get(id).map(String::as_str).unwrap_or("n_unknown")
    }
}
