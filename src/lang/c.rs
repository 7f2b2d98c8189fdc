//! C language support.
//!
//! Construct handlers for the tree-sitter-c grammar: sequential blocks,
//! if/else, the three loop forms, switch with fall-through, break/continue,
//! return, and goto/label pairs. The identifier classifier distinguishes
//! declarations, assignment targets, update expressions (which both define
//! and use their operand), call targets, and plain reads.

use tree_sitter::Node;

use crate::ast;
use crate::cfg::types::{CallArguments, NodeKind, NodeMetadata, LABEL_FALSE, LABEL_TRUE};
use crate::cfg::visitor::{CfgVisitor, Fragment};
use crate::lang::{common, LanguageCfg};

/// C language implementation.
pub struct C;

/// Descend through declarator wrappers (pointers, arrays, parens) to the
/// `function_declarator` node, if any.
fn find_function_declarator(node: Node) -> Option<Node> {
    if node.kind() == "function_declarator" {
        return Some(node);
    }
    find_function_declarator(ast::child_by_field(node, "declarator")?)
}

/// Descend through declarator wrappers to the declared identifier.
fn declarator_identifier(node: Node) -> Option<Node> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(node),
        _ => declarator_identifier(ast::child_by_field(node, "declarator")?),
    }
}

impl C {
    fn visit_function_definition(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let declarator = ast::child_by_field(node, "declarator");
        let body = ast::child_by_field(node, "body");

        let fdecl = declarator.and_then(find_function_declarator);
        let name_node = fdecl
            .and_then(|d| ast::child_by_field(d, "declarator"))
            .and_then(declarator_identifier);
        let name = name_node.map(|n| v.text(n));
        if name.is_none() {
            v.warn("function definition without a resolvable name");
        }

        let mut parameters = Vec::new();
        if let Some(params) = fdecl.and_then(|d| ast::child_by_field(d, "parameters")) {
            for param in ast::named_children(params) {
                if param.kind() != "parameter_declaration" {
                    continue;
                }
                if let Some(ident) = ast::child_by_field(param, "declarator")
                    .and_then(declarator_identifier)
                {
                    parameters.push(v.text(ident));
                }
            }
        }

        let closing = body.and_then(|b| ast::children(b).into_iter().find(|c| c.kind() == "}"));
        v.visit_routine(name, parameters, name_node, closing, body)
    }

    fn visit_if(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let Some(condition) = ast::child_by_field(node, "condition") else {
            return self.malformed(v, "if statement without condition");
        };
        let cond_id = v.branch_node(NodeKind::Condition, condition);
        let join = v.new_node(NodeKind::Placeholder, "if join", None);

        if let Some(frag) = ast::child_by_field(node, "consequence").and_then(|n| v.visit(n)) {
            v.add_edge(cond_id, frag.entry, Some(LABEL_TRUE));
            v.connect_exits(&frag, join);
        } else {
            v.warn("if statement without consequence");
            v.add_edge(cond_id, join, Some(LABEL_TRUE));
        }

        match ast::child_by_field(node, "alternative").and_then(|n| v.visit(n)) {
            Some(frag) => {
                v.add_edge(cond_id, frag.entry, Some(LABEL_FALSE));
                v.connect_exits(&frag, join);
            }
            None => {
                v.add_edge(cond_id, join, Some(LABEL_FALSE));
            }
        }

        Fragment {
            entry: cond_id,
            exits: vec![join],
        }
    }

    fn visit_while(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let Some(condition) = ast::child_by_field(node, "condition") else {
            return self.malformed(v, "while loop without condition");
        };
        let header = v.branch_node(NodeKind::LoopHeader, condition);
        let exit = v.new_node(NodeKind::Placeholder, "while exit", None);

        v.ctx.push_loop(exit, header);
        if let Some(frag) = ast::child_by_field(node, "body").and_then(|n| v.visit(n)) {
            v.add_edge(header, frag.entry, Some(LABEL_TRUE));
            for body_exit in &frag.exits {
                v.add_edge(*body_exit, header, None);
            }
        } else {
            v.warn("while loop without body");
        }
        v.ctx.pop_loop();

        v.add_edge(header, exit, Some(LABEL_FALSE));
        Fragment {
            entry: header,
            exits: vec![exit],
        }
    }

    fn visit_do_while(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let Some(condition) = ast::child_by_field(node, "condition") else {
            return self.malformed(v, "do-while loop without condition");
        };
        let header = v.branch_node(NodeKind::LoopHeader, condition);
        let exit = v.new_node(NodeKind::Placeholder, "do-while exit", None);

        v.ctx.push_loop(exit, header);
        let body = ast::child_by_field(node, "body").and_then(|n| v.visit(n));
        v.ctx.pop_loop();

        let entry = match body {
            Some(frag) => {
                for body_exit in &frag.exits {
                    v.add_edge(*body_exit, header, None);
                }
                v.add_edge(header, frag.entry, Some(LABEL_TRUE));
                frag.entry
            }
            None => {
                v.warn("do-while loop without body");
                v.add_edge(header, header, Some(LABEL_TRUE));
                header
            }
        };
        v.add_edge(header, exit, Some(LABEL_FALSE));
        Fragment {
            entry,
            exits: vec![exit],
        }
    }

    fn visit_for(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let init = ast::child_by_field(node, "initializer");
        let condition = ast::child_by_field(node, "condition");
        let update = ast::child_by_field(node, "update");
        let body = ast::child_by_field(node, "body");

        let init_frag = init.map(|n| v.linear_statement(NodeKind::Statement, n));
        let header = match condition {
            Some(cond) => v.branch_node(NodeKind::LoopHeader, cond),
            // for (;;) runs unconditionally
            None => v.new_node(NodeKind::LoopHeader, "true", None),
        };
        let update_frag = update.map(|n| v.linear_statement(NodeKind::Statement, n));
        let exit = v.new_node(NodeKind::Placeholder, "for exit", None);

        if let Some(ref frag) = init_frag {
            v.connect_exits(frag, header);
        }

        // continue re-enters at the update when there is one
        let continue_target = update_frag.as_ref().map(|f| f.entry).unwrap_or(header);
        v.ctx.push_loop(exit, continue_target);
        if let Some(frag) = body.and_then(|n| v.visit(n)) {
            v.add_edge(header, frag.entry, Some(LABEL_TRUE));
            for body_exit in &frag.exits {
                v.add_edge(*body_exit, continue_target, None);
            }
        } else {
            v.warn("for loop without body");
        }
        v.ctx.pop_loop();

        if let Some(ref frag) = update_frag {
            v.connect_exits(frag, header);
        }
        v.add_edge(header, exit, Some(LABEL_FALSE));

        Fragment {
            entry: init_frag.map(|f| f.entry).unwrap_or(header),
            exits: vec![exit],
        }
    }

    fn visit_switch(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let Some(condition) = ast::child_by_field(node, "condition") else {
            return self.malformed(v, "switch statement without selector");
        };
        let head = v.branch_node(NodeKind::SwitchHead, condition);
        let exit = v.new_node(NodeKind::Placeholder, "switch exit", None);

        v.ctx.push_switch(exit, head);
        match ast::child_by_field(node, "body").and_then(|n| v.visit(n)) {
            Some(frag) => {
                v.add_edge(head, frag.entry, None);
                v.connect_exits(&frag, exit);
            }
            None => {
                v.add_edge(head, exit, None);
            }
        }
        v.ctx.pop_switch();

        Fragment {
            entry: head,
            exits: vec![exit],
        }
    }

    /// One `case X:` or `default:` and its statements. The case node wires
    /// itself to the switch head; statements chain off it, and open exits
    /// fall through to whatever the enclosing block chains next.
    fn visit_case(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let value = ast::child_by_field(node, "value");
        let (case_id, label) = match value {
            Some(value_node) => {
                let text = v.text(value_node);
                let id = v.new_node(
                    NodeKind::Case,
                    format!("case {}", text),
                    Some(ast::span(node)),
                );
                (id, text)
            }
            None => {
                let id =
                    v.new_node(NodeKind::Default, "default", Some(ast::span(node)));
                (id, "default".to_string())
            }
        };

        match v.ctx.switch_head() {
            Some(head) => v.add_edge(head, case_id, Some(&label)),
            None => v.warn("case label outside of switch"),
        }

        let mut exits = vec![case_id];
        for child in ast::named_children(node) {
            if value.map(|n| n.id()) == Some(child.id()) {
                continue;
            }
            let Some(frag) = v.visit(child) else {
                continue;
            };
            for exit in &exits {
                v.add_edge(*exit, frag.entry, None);
            }
            exits = frag.exits;
            if exits.is_empty() {
                // break/return/goto: no fall-through, rest is unreachable
                break;
            }
        }

        Fragment {
            entry: case_id,
            exits,
        }
    }

    fn visit_break(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let id = v.new_ast_node(NodeKind::Break, node);
        match v.ctx.break_target() {
            Some(target) => v.add_edge(id, target, None),
            None => v.warn("break outside of loop or switch"),
        }
        Fragment::terminal(id)
    }

    fn visit_continue(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let id = v.new_ast_node(NodeKind::Continue, node);
        match v.ctx.continue_target() {
            Some(target) => v.add_edge(id, target, None),
            None => v.warn("continue outside of loop"),
        }
        Fragment::terminal(id)
    }

    fn visit_return(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let frag = v.linear_statement(NodeKind::Return, node);
        if let Some(exit) = v.routine_exit() {
            v.connect_exits(&frag, exit);
        }
        Fragment::terminal(frag.entry)
    }

    fn visit_goto(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let label = ast::child_by_field(node, "label")
            .map(|n| v.text(n))
            .unwrap_or_default();
        let id = v.new_node(NodeKind::Goto, label.clone(), Some(ast::span(node)));
        if let Some(target) = v.ctx.add_goto(&label, id) {
            v.add_edge(id, target, None);
        }
        Fragment::terminal(id)
    }

    fn visit_labeled(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let label_node = ast::child_by_field(node, "label");
        let label = label_node.map(|n| v.text(n)).unwrap_or_default();
        let label_id = v.new_node(
            NodeKind::Label,
            label.clone(),
            label_node.map(ast::span),
        );
        for goto_id in v.ctx.add_label(&label, label_id) {
            v.add_edge(goto_id, label_id, None);
        }

        let body = ast::named_children(node)
            .into_iter()
            .find(|c| label_node.map(|l| l.id()) != Some(c.id()));
        match body.and_then(|b| v.visit(b)) {
            Some(frag) => {
                v.add_edge(label_id, frag.entry, None);
                Fragment {
                    entry: label_id,
                    exits: frag.exits,
                }
            }
            None => Fragment::single(label_id),
        }
    }

    fn malformed(&self, v: &mut CfgVisitor, what: &str) -> Fragment {
        v.warn(what.to_string());
        let id = v.new_node(NodeKind::Placeholder, "malformed", None);
        Fragment::single(id)
    }
}

impl LanguageCfg for C {
    fn name(&self) -> &'static str {
        "c"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".c", ".h"]
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_c::LANGUAGE.into()
    }

    fn routine_query(&self) -> &'static str {
        "(function_definition) @routine"
    }

    fn visit(&self, v: &mut CfgVisitor, node: Node) -> Option<Fragment> {
        match node.kind() {
            "function_definition" => Some(self.visit_function_definition(v, node)),
            "compound_statement" => Some(v.visit_sequence(node)),
            "expression_statement" | "declaration" => {
                Some(v.linear_statement(NodeKind::Statement, node))
            }
            "if_statement" => Some(self.visit_if(v, node)),
            "while_statement" => Some(self.visit_while(v, node)),
            "do_statement" => Some(self.visit_do_while(v, node)),
            "for_statement" => Some(self.visit_for(v, node)),
            "switch_statement" => Some(self.visit_switch(v, node)),
            "case_statement" => Some(self.visit_case(v, node)),
            "break_statement" => Some(self.visit_break(v, node)),
            "continue_statement" => Some(self.visit_continue(v, node)),
            "return_statement" => Some(self.visit_return(v, node)),
            "goto_statement" => Some(self.visit_goto(v, node)),
            "labeled_statement" => Some(self.visit_labeled(v, node)),
            // else branches arrive wrapped; unwrap to the inner statement
            "else_clause" => ast::named_children(node)
                .into_iter()
                .next()
                .and_then(|inner| v.visit(inner)),
            _ => None,
        }
    }

    fn scan_metadata(&self, node: Node, source: &[u8]) -> NodeMetadata {
        let mut meta = NodeMetadata::default();
        scan_expr(node, source, &mut meta);
        meta
    }
}

/// Recursive identifier classifier for C expressions and declarations.
fn scan_expr(node: Node, source: &[u8], meta: &mut NodeMetadata) {
    match node.kind() {
        "declaration" => {
            for child in ast::named_children(node) {
                match child.kind() {
                    "init_declarator" => scan_expr(child, source, meta),
                    "identifier" => meta.add_definition(ast::node_text(child, source)),
                    "pointer_declarator" | "array_declarator" => {
                        if let Some(ident) = declarator_identifier(child) {
                            meta.add_definition(ast::node_text(ident, source));
                        }
                    }
                    _ => {}
                }
            }
        }
        "init_declarator" => {
            if let Some(ident) = ast::child_by_field(node, "declarator")
                .and_then(declarator_identifier)
            {
                meta.add_definition(ast::node_text(ident, source));
            }
            if let Some(value) = ast::child_by_field(node, "value") {
                scan_expr(value, source, meta);
            }
        }
        "assignment_expression" => {
            let compound = ast::child_by_field(node, "operator")
                .map(|op| ast::node_text(op, source) != "=")
                .unwrap_or(false);
            if let Some(left) = ast::child_by_field(node, "left") {
                if left.kind() == "identifier" {
                    let name = ast::node_text(left, source);
                    meta.add_definition(name);
                    if compound {
                        meta.add_use(name);
                    }
                } else {
                    // a[i] = .. / s.f = ..: base and index are reads
                    scan_expr(left, source, meta);
                }
            }
            if let Some(right) = ast::child_by_field(node, "right") {
                scan_expr(right, source, meta);
            }
        }
        "update_expression" => {
            // x++ both defines and uses x
            match ast::child_by_field(node, "argument") {
                Some(arg) if arg.kind() == "identifier" => {
                    let name = ast::node_text(arg, source);
                    meta.add_definition(name);
                    meta.add_use(name);
                }
                Some(arg) => scan_expr(arg, source, meta),
                None => {}
            }
        }
        "call_expression" => {
            let function = ast::child_by_field(node, "function");
            let callee = match function {
                Some(f) if f.kind() == "identifier" => {
                    let name = ast::node_text(f, source).to_string();
                    meta.add_call(name.clone());
                    Some(name)
                }
                Some(f) => {
                    scan_expr(f, source, meta);
                    None
                }
                None => None,
            };
            if let Some(args) = ast::child_by_field(node, "arguments") {
                scan_expr(args, source, meta);
                if let Some(callee) = callee {
                    meta.call_arguments.push(CallArguments {
                        callee,
                        args: common::argument_identifiers(args, source),
                    });
                }
            }
        }
        "identifier" => {
            meta.add_use(ast::node_text(node, source));
        }
        _ => {
            for child in ast::named_children(node) {
                scan_expr(child, source, meta);
            }
        }
    }
}
