//! Identifier-scanning helpers shared by the language classifiers.

use tree_sitter::Node;

use crate::ast;

/// Collect the text of every `identifier` node in a subtree, in source
/// order.
pub fn identifiers_within(node: Node, source: &[u8], out: &mut Vec<String>) {
    if node.kind() == "identifier" {
        out.push(ast::node_text_owned(node, source));
        return;
    }
    for child in ast::named_children(node) {
        identifiers_within(child, source, out);
    }
}

/// Identifier names per positional argument of a call's argument list.
///
/// A bare identifier argument yields one name; a compound expression
/// yields every identifier inside it; a literal yields none.
pub fn argument_identifiers(args: Node, source: &[u8]) -> Vec<Vec<String>> {
    ast::named_children(args)
        .into_iter()
        .map(|arg| {
            let mut idents = Vec::new();
            identifiers_within(arg, source, &mut idents);
            idents
        })
        .collect()
}
