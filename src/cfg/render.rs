//! CFG rendering utilities.
//!
//! Text output formats for a routine CFG:
//! - Mermaid: flowcharts for documentation
//! - DOT (Graphviz): publication-quality graphs
//!
//! JSON output goes through serde on [`Cfg`] directly.

use crate::cfg::types::{Cfg, NodeKind};

/// Escape special characters for Mermaid labels.
fn escape_mermaid_label(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push('\''),
            '\n' => result.push(' '),
            '\r' => {}
            '|' => result.push_str("\\|"),
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '{' => result.push_str("#123;"),
            '}' => result.push_str("#125;"),
            '[' => result.push_str("#91;"),
            ']' => result.push_str("#93;"),
            '`' => result.push('\''),
            ';' => result.push(','),
            '#' => result.push_str("#35;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape special characters for DOT labels.
fn escape_dot_label(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('|', "\\|")
}

/// Sanitize a string for use as a DOT identifier.
fn sanitize_dot_id(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_alphanumeric() || c == '_' {
            result.push(c);
        } else {
            result.push('_');
        }
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    if result.is_empty() {
        result.push_str("_anonymous");
    }
    result
}

/// Graphviz shape for a node kind.
fn dot_shape(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Entry | NodeKind::Exit => "box",
        NodeKind::Condition | NodeKind::LoopHeader | NodeKind::SwitchHead => "diamond",
        _ => "ellipse",
    }
}

/// Render a routine CFG to Mermaid flowchart format.
///
/// The node table is id-ordered, so output is deterministic.
pub fn to_mermaid(cfg: &Cfg) -> String {
    let mut out = String::from("flowchart TD\n");

    for node in cfg.nodes.values() {
        let label = escape_mermaid_label(&node.source_text);
        out.push_str(&format!("    N{}[\"{}\"]\n", node.id, label));
    }
    for node in cfg.nodes.values() {
        for succ in &node.successors {
            // Cross-routine targets are rendered as bare ids.
            match node.edge_label(*succ) {
                Some(label) => out.push_str(&format!(
                    "    N{} -->|{}| N{}\n",
                    node.id,
                    escape_mermaid_label(label),
                    succ
                )),
                None => out.push_str(&format!("    N{} --> N{}\n", node.id, succ)),
            }
        }
    }
    out
}

/// Render a routine CFG to DOT (Graphviz) format.
pub fn to_dot(cfg: &Cfg) -> String {
    let graph_name = sanitize_dot_id(cfg.function_name.as_deref().unwrap_or("routine"));
    let mut out = format!("digraph {} {{\n", graph_name);
    out.push_str("    rankdir=TB;\n");
    out.push_str("    node [fontname=\"monospace\"];\n");

    for node in cfg.nodes.values() {
        let label = escape_dot_label(&node.source_text);
        let shape = dot_shape(node.kind);
        let style = match node.kind {
            NodeKind::Entry => ", style=filled, fillcolor=lightgreen",
            NodeKind::Exit => ", style=filled, fillcolor=lightcoral",
            _ => "",
        };
        out.push_str(&format!(
            "    N{} [label=\"{}: {}\", shape={}{}];\n",
            node.id, node.id, label, shape, style
        ));
    }
    for node in cfg.nodes.values() {
        for succ in &node.successors {
            match node.edge_label(*succ) {
                Some(label) => out.push_str(&format!(
                    "    N{} -> N{} [label=\"{}\"];\n",
                    node.id,
                    succ,
                    escape_dot_label(label)
                )),
                None => out.push_str(&format!("    N{} -> N{};\n", node.id, succ)),
            }
        }
    }
    out.push_str("}\n");
    out
}
