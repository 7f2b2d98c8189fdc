//! Java language support.
//!
//! Construct handlers for the tree-sitter-java grammar. Java shares most
//! shapes with C (blocks, if/else, while, for, do-while, switch with
//! fall-through, break/continue, return); the additions are the enhanced
//! for loop, modeled as a loop header over the iterable whose metadata
//! carries the loop variable as a definition, and method-invocation call
//! targets, which resolve to the rightmost identifier of the receiver
//! chain.

use tree_sitter::Node;

use crate::ast;
use crate::cfg::types::{CallArguments, NodeKind, NodeMetadata, LABEL_FALSE, LABEL_TRUE};
use crate::cfg::visitor::{CfgVisitor, Fragment};
use crate::lang::{common, LanguageCfg};

/// Java language implementation.
pub struct Java;

impl Java {
    fn visit_method_declaration(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let name_node = ast::child_by_field(node, "name");
        let name = name_node.map(|n| v.text(n));
        if name.is_none() {
            v.warn("method declaration without a name");
        }

        let mut parameters = Vec::new();
        if let Some(params) = ast::child_by_field(node, "parameters") {
            for param in ast::named_children(params) {
                if param.kind() != "formal_parameter" {
                    continue;
                }
                if let Some(ident) = ast::child_by_field(param, "name") {
                    parameters.push(v.text(ident));
                }
            }
        }

        let body = ast::child_by_field(node, "body");
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
        let init = ast::child_by_field(node, "init");
        let condition = ast::child_by_field(node, "condition");
        let update = ast::child_by_field(node, "update");
        let body = ast::child_by_field(node, "body");

        let init_frag = init.map(|n| v.linear_statement(NodeKind::Statement, n));
        let header = match condition {
            Some(cond) => v.branch_node(NodeKind::LoopHeader, cond),
            None => v.new_node(NodeKind::LoopHeader, "true", None),
        };
        let update_frag = update.map(|n| v.linear_statement(NodeKind::Statement, n));
        let exit = v.new_node(NodeKind::Placeholder, "for exit", None);

        if let Some(ref frag) = init_frag {
            v.connect_exits(frag, header);
        }

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

    /// for (T x : iterable) body — a loop header over the iterable whose
    /// metadata defines the loop variable.
    fn visit_enhanced_for(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let Some(value) = ast::child_by_field(node, "value") else {
            return self.malformed(v, "for-each loop without iterable");
        };
        let header = v.branch_node(NodeKind::LoopHeader, value);
        if let Some(var) = ast::child_by_field(node, "name") {
            let var_name = v.text(var);
            if let Some(meta) = v.node_metadata_mut(header) {
                meta.add_definition(var_name);
            }
        }
        let exit = v.new_node(NodeKind::Placeholder, "for-each exit", None);

        v.ctx.push_loop(exit, header);
        if let Some(frag) = ast::child_by_field(node, "body").and_then(|n| v.visit(n)) {
            v.add_edge(header, frag.entry, Some(LABEL_TRUE));
            for body_exit in &frag.exits {
                v.add_edge(*body_exit, header, None);
            }
        } else {
            v.warn("for-each loop without body");
        }
        v.ctx.pop_loop();

        v.add_edge(header, exit, Some(LABEL_FALSE));
        Fragment {
            entry: header,
            exits: vec![exit],
        }
    }

    fn visit_switch(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let Some(condition) = ast::child_by_field(node, "condition") else {
            return self.malformed(v, "switch without selector");
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

    /// One `case ...:`/`default:` group and its statements. Every label of
    /// the group gets its own CASE/DEFAULT node attached to the switch
    /// head; all of them feed the group body.
    fn visit_switch_group(&self, v: &mut CfgVisitor, node: Node) -> Fragment {
        let mut labels: Vec<Node> = Vec::new();
        let mut statements: Vec<Node> = Vec::new();
        for child in ast::named_children(node) {
            if child.kind() == "switch_label" {
                labels.push(child);
            } else {
                statements.push(child);
            }
        }

        if labels.is_empty() {
            v.warn("switch group without a case label");
            let id = v.new_node(NodeKind::Placeholder, "empty switch group", None);
            return Fragment::single(id);
        }

        let mut label_ids = Vec::new();
        for label in &labels {
            let value = ast::named_children(*label).into_iter().next();
            let (id, text) = match value {
                Some(value_node) => {
                    let text = v.text(value_node);
                    let id = v.new_node(
                        NodeKind::Case,
                        format!("case {}", text),
                        Some(ast::span(*label)),
                    );
                    (id, text)
                }
                None => {
                    let id =
                        v.new_node(NodeKind::Default, "default", Some(ast::span(*label)));
                    (id, "default".to_string())
                }
            };
            match v.ctx.switch_head() {
                Some(head) => v.add_edge(head, id, Some(&text)),
                None => v.warn("case label outside of switch"),
            }
            label_ids.push(id);
        }

        let mut exits = label_ids.clone();
        for stmt in statements {
            let Some(frag) = v.visit(stmt) else {
                continue;
            };
            for exit in &exits {
                v.add_edge(*exit, frag.entry, None);
            }
            exits = frag.exits;
            if exits.is_empty() {
                break;
            }
        }

        Fragment {
            entry: label_ids[0],
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

    fn malformed(&self, v: &mut CfgVisitor, what: &str) -> Fragment {
        v.warn(what.to_string());
        let id = v.new_node(NodeKind::Placeholder, "malformed", None);
        Fragment::single(id)
    }
}

impl LanguageCfg for Java {
    fn name(&self) -> &'static str {
        "java"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".java"]
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn routine_query(&self) -> &'static str {
        "(method_declaration) @routine"
    }

    fn visit(&self, v: &mut CfgVisitor, node: Node) -> Option<Fragment> {
        match node.kind() {
            "method_declaration" => Some(self.visit_method_declaration(v, node)),
            "block" | "switch_block" => Some(v.visit_sequence(node)),
            "expression_statement" | "local_variable_declaration" => {
                Some(v.linear_statement(NodeKind::Statement, node))
            }
            "if_statement" => Some(self.visit_if(v, node)),
            "while_statement" => Some(self.visit_while(v, node)),
            "do_statement" => Some(self.visit_do_while(v, node)),
            "for_statement" => Some(self.visit_for(v, node)),
            "enhanced_for_statement" => Some(self.visit_enhanced_for(v, node)),
            "switch_expression" => Some(self.visit_switch(v, node)),
            "switch_block_statement_group" => Some(self.visit_switch_group(v, node)),
            "break_statement" => Some(self.visit_break(v, node)),
            "continue_statement" => Some(self.visit_continue(v, node)),
            "return_statement" => Some(self.visit_return(v, node)),
            _ => None,
        }
    }

    fn scan_metadata(&self, node: Node, source: &[u8]) -> NodeMetadata {
        let mut meta = NodeMetadata::default();
        scan_expr(node, source, &mut meta);
        meta
    }
}

/// Recursive identifier classifier for Java expressions and declarations.
fn scan_expr(node: Node, source: &[u8], meta: &mut NodeMetadata) {
    match node.kind() {
        "variable_declarator" => {
            if let Some(name) = ast::child_by_field(node, "name") {
                meta.add_definition(ast::node_text(name, source));
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
                    scan_expr(left, source, meta);
                }
            }
            if let Some(right) = ast::child_by_field(node, "right") {
                scan_expr(right, source, meta);
            }
        }
        "update_expression" => {
            match ast::named_children(node).into_iter().next() {
                Some(arg) if arg.kind() == "identifier" => {
                    let name = ast::node_text(arg, source);
                    meta.add_definition(name);
                    meta.add_use(name);
                }
                Some(arg) => scan_expr(arg, source, meta),
                None => {}
            }
        }
        "method_invocation" => {
            // The rightmost identifier of the receiver chain is the target;
            // bare identifier receivers are class/object names, not reads.
            let callee = ast::child_by_field(node, "name")
                .map(|n| ast::node_text(n, source).to_string());
            if let Some(name) = &callee {
                meta.add_call(name.clone());
            }
            if let Some(object) = ast::child_by_field(node, "object") {
                if object.kind() != "identifier" {
                    scan_expr(object, source, meta);
                }
            }
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
        "field_access" => {
            // Field reads stay opaque; only dig into compound receivers so
            // nested calls are still found.
            if let Some(object) = ast::child_by_field(node, "object") {
                if object.kind() != "identifier" {
                    scan_expr(object, source, meta);
                }
            }
        }
        "identifier" => {
            meta.add_use(ast::node_text(node, source));
        }
        "method_declaration" | "class_declaration" | "formal_parameter" => {}
        _ => {
            for child in ast::named_children(node) {
                scan_expr(child, source, meta);
            }
        }
    }
}
