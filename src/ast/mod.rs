//! Thin adapter over externally parsed tree-sitter trees.
//!
//! The rest of the crate never touches parser internals directly; it goes
//! through these helpers for text extraction, spans, and child access, and
//! through [`parse_source`] for the initial parse.

use tree_sitter::{Node, Parser, Tree};

use crate::error::{Result, SapflowError};

/// Extract the verbatim source slice for a node.
///
/// Falls back to the empty string when the slice is not valid UTF-8, which
/// only happens on malformed input the parser already flagged.
#[inline]
pub fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    std::str::from_utf8(&source[node.start_byte()..node.end_byte()]).unwrap_or("")
}

/// Extract node text as an owned String.
#[inline]
pub fn node_text_owned(node: Node, source: &[u8]) -> String {
    node_text(node, source).to_string()
}

/// Byte span of a node in the original source.
#[inline]
pub fn span(node: Node) -> (usize, usize) {
    (node.start_byte(), node.end_byte())
}

/// Get a child node by field name.
#[inline]
pub fn child_by_field<'a>(node: Node<'a>, field: &str) -> Option<Node<'a>> {
    node.child_by_field_name(field)
}

/// Collect the named children of a node.
///
/// Tree-sitter's cursor API ties child iteration to a borrow of the cursor;
/// collecting up front keeps call sites simple.
pub fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Collect all children of a node, named or not.
pub fn children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Parse source bytes with the given parser.
///
/// Rejects empty input and input the grammar cannot make any sense of
/// (a root `ERROR` node). Localized syntax errors deeper in the tree do
/// not fail the parse; callers surface those as warnings.
pub fn parse_source(parser: &mut Parser, source: &[u8]) -> Result<Tree> {
    if source.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(SapflowError::EmptySource);
    }
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| SapflowError::parse("parser returned no tree"))?;
    if tree.root_node().is_error() {
        return Err(SapflowError::parse("source could not be parsed"));
    }
    Ok(tree)
}
