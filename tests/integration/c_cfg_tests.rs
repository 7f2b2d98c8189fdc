//! C control-flow graph construction tests.

use sapflow::{NodeKind, SapflowError};

use crate::common::{assert_invariants, build, edge_label, node_by_text, nodes_of_kind, routine};

// =============================================================================
// Straight-line code
// =============================================================================

#[test]
fn test_straight_line_function() {
    let result = build("int f() { int a = 1; return a; }", "c");
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    assert_eq!(cfg.nodes.len(), 4, "ENTRY, STATEMENT, RETURN, EXIT");

    let entry = cfg.entry().unwrap();
    let exit = cfg.exit().unwrap();
    let decl = node_by_text(cfg, "int a = 1;");
    let ret = node_by_text(cfg, "return a;");

    assert_eq!(decl.kind, NodeKind::Statement);
    assert_eq!(ret.kind, NodeKind::Return);
    assert_eq!(cfg.node(entry).unwrap().successors, vec![decl.id]);
    assert_eq!(decl.successors, vec![ret.id]);
    assert_eq!(ret.successors, vec![exit]);

    assert_eq!(decl.metadata.variable_definitions, vec!["a"]);
    assert!(decl.metadata.variable_uses.is_empty());
    assert_eq!(ret.metadata.variable_uses, vec!["a"]);
}

#[test]
fn test_parameters_recorded_on_entry() {
    let result = build("int g(int a) { int b = a + 1; return b; }", "c");
    assert_invariants(&result);

    let cfg = routine(&result, "g");
    assert_eq!(cfg.parameters, vec!["a"]);
    let entry = cfg.node(cfg.entry().unwrap()).unwrap();
    assert_eq!(entry.metadata.variable_definitions, vec!["a"]);
    assert_eq!(entry.source_text, "g");

    let decl = node_by_text(cfg, "int b = a + 1;");
    assert_eq!(decl.metadata.variable_definitions, vec!["b"]);
    assert_eq!(decl.metadata.variable_uses, vec!["a"]);
}

#[test]
fn test_empty_body_collapses_to_entry_exit() {
    let result = build("void e() {}", "c");
    assert_invariants(&result);

    let cfg = routine(&result, "e");
    assert_eq!(cfg.nodes.len(), 2);
    let entry = cfg.entry().unwrap();
    let exit = cfg.exit().unwrap();
    assert_eq!(cfg.node(entry).unwrap().successors, vec![exit]);
}

#[test]
fn test_statement_spans_are_byte_offsets() {
    let source = "int f() { int a = 1; return a; }";
    let result = build(source, "c");
    let cfg = routine(&result, "f");
    let decl = node_by_text(cfg, "int a = 1;");

    let start = source.find("int a = 1;").unwrap();
    assert_eq!(decl.start_index, Some(start));
    assert_eq!(decl.end_index, Some(start + "int a = 1;".len()));
}

// =============================================================================
// Conditionals
// =============================================================================

#[test]
fn test_if_without_else() {
    let result = build("int f(int x) { if (x > 0) { x = 1; } return x; }", "c");
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let cond = node_by_text(cfg, "(x > 0)");
    let then = node_by_text(cfg, "x = 1;");
    let ret = node_by_text(cfg, "return x;");

    assert_eq!(cond.kind, NodeKind::Condition);
    assert_eq!(edge_label(cfg, cond.id, then.id).as_deref(), Some("true"));
    assert_eq!(edge_label(cfg, cond.id, ret.id).as_deref(), Some("false"));
    assert_eq!(then.successors, vec![ret.id]);
}

#[test]
fn test_if_else_joins_at_successor() {
    let result = build(
        "int f(int x) { int r; if (x) { r = 1; } else { r = 2; } return r; }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let cond = node_by_text(cfg, "(x)");
    let then = node_by_text(cfg, "r = 1;");
    let els = node_by_text(cfg, "r = 2;");
    let ret = node_by_text(cfg, "return r;");

    assert_eq!(edge_label(cfg, cond.id, then.id).as_deref(), Some("true"));
    assert_eq!(edge_label(cfg, cond.id, els.id).as_deref(), Some("false"));
    assert_eq!(then.successors, vec![ret.id]);
    assert_eq!(els.successors, vec![ret.id]);
}

#[test]
fn test_both_branches_return() {
    let result = build("int f(int x) { if (x) { return 1; } else { return 2; } }", "c");
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let exit = cfg.exit().unwrap();
    let returns = nodes_of_kind(cfg, NodeKind::Return);
    assert_eq!(returns.len(), 2);
    for ret in returns {
        assert_eq!(ret.successors, vec![exit]);
    }
}

// =============================================================================
// Loops
// =============================================================================

#[test]
fn test_while_loop_shape() {
    let result = build(
        "int w(int n) { int s = 0; while (n > 0) { s = s + n; n = n - 1; } return s; }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "w");
    let header = node_by_text(cfg, "(n > 0)");
    let first = node_by_text(cfg, "s = s + n;");
    let last = node_by_text(cfg, "n = n - 1;");
    let ret = node_by_text(cfg, "return s;");

    assert_eq!(header.kind, NodeKind::LoopHeader);
    assert_eq!(edge_label(cfg, header.id, first.id).as_deref(), Some("true"));
    assert_eq!(edge_label(cfg, header.id, ret.id).as_deref(), Some("false"));
    // Body tail loops back to the header.
    assert_eq!(last.successors, vec![header.id]);
}

#[test]
fn test_for_loop_wiring() {
    let result = build(
        "int f(int n) { int s = 0; for (int i = 0; i < n; i++) { s = s + i; } return s; }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let init = node_by_text(cfg, "int i = 0");
    let header = node_by_text(cfg, "i < n");
    let body = node_by_text(cfg, "s = s + i;");
    let update = node_by_text(cfg, "i++");
    let ret = node_by_text(cfg, "return s;");

    assert_eq!(header.kind, NodeKind::LoopHeader);
    assert_eq!(init.successors, vec![header.id]);
    assert_eq!(edge_label(cfg, header.id, body.id).as_deref(), Some("true"));
    assert_eq!(body.successors, vec![update.id]);
    assert_eq!(update.successors, vec![header.id]);
    assert_eq!(edge_label(cfg, header.id, ret.id).as_deref(), Some("false"));
}

#[test]
fn test_do_while_enters_body_first() {
    let result = build("int d(int n) { do { n = n - 1; } while (n > 0); return n; }", "c");
    assert_invariants(&result);

    let cfg = routine(&result, "d");
    let entry = cfg.entry().unwrap();
    let body = node_by_text(cfg, "n = n - 1;");
    let header = node_by_text(cfg, "(n > 0)");
    let ret = node_by_text(cfg, "return n;");

    assert_eq!(cfg.node(entry).unwrap().successors, vec![body.id]);
    assert_eq!(body.successors, vec![header.id]);
    assert_eq!(edge_label(cfg, header.id, body.id).as_deref(), Some("true"));
    assert_eq!(edge_label(cfg, header.id, ret.id).as_deref(), Some("false"));
}

#[test]
fn test_continue_targets_for_update() {
    let result = build(
        "int f(int n) { int s = 0; for (int i = 0; i < n; i++) { if (i == 2) continue; s = s + i; } return s; }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let update = node_by_text(cfg, "i++");
    let conts = nodes_of_kind(cfg, NodeKind::Continue);
    assert_eq!(conts.len(), 1);
    assert_eq!(conts[0].successors, vec![update.id]);
}

#[test]
fn test_break_targets_innermost_loop() {
    let result = build(
        "int f(int n) { while (n > 0) { while (n > 5) { break; } n = n - 1; } return n; }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let after_inner = node_by_text(cfg, "n = n - 1;");
    let breaks = nodes_of_kind(cfg, NodeKind::Break);
    assert_eq!(breaks.len(), 1);
    // The inner loop's exit threads to the statement after it, not to the
    // outer loop's exit.
    assert_eq!(breaks[0].successors, vec![after_inner.id]);
}

// =============================================================================
// Switch
// =============================================================================

#[test]
fn test_switch_cases_compact_onto_labeled_edges() {
    let result = build(
        "int s(int x) { switch (x) { case 1: return 1; case 2: return 2; default: return 0; } }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "s");
    let head = node_by_text(cfg, "(x)");
    assert_eq!(head.kind, NodeKind::SwitchHead);
    assert_eq!(head.successors.len(), 3);

    let ret1 = node_by_text(cfg, "return 1;");
    let ret2 = node_by_text(cfg, "return 2;");
    let ret0 = node_by_text(cfg, "return 0;");
    assert_eq!(edge_label(cfg, head.id, ret1.id).as_deref(), Some("1"));
    assert_eq!(edge_label(cfg, head.id, ret2.id).as_deref(), Some("2"));
    assert_eq!(edge_label(cfg, head.id, ret0.id).as_deref(), Some("default"));
}

#[test]
fn test_switch_fall_through() {
    let result = build(
        "int s(int x) { int r = 0; switch (x) { case 1: r = 1; case 2: r = 2; break; } return r; }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "s");
    let case1 = node_by_text(cfg, "r = 1;");
    let case2 = node_by_text(cfg, "r = 2;");
    // Without a break, case 1's body falls into case 2's body.
    assert_eq!(case1.successors, vec![case2.id]);
}

#[test]
fn test_nested_switch_outer_fall_through_resumes() {
    let result = build(
        "int n(int x, int y) {\
           switch (x) {\
             case 1:\
               switch (y) { case 1: break; default: break; }\
               x = 2;\
               break;\
             case 2: x = 3; break;\
           }\
           return x;\
         }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "n");
    let resume = node_by_text(cfg, "x = 2;");
    // Inner breaks resolve against the inner switch, so control resumes at
    // the statement after the inner switch.
    let breaks = nodes_of_kind(cfg, NodeKind::Break);
    let inner_breaks: Vec<_> = breaks
        .iter()
        .filter(|b| b.successors == vec![resume.id])
        .collect();
    assert_eq!(inner_breaks.len(), 2, "both inner breaks resume the outer case");
}

// =============================================================================
// Goto and labels
// =============================================================================

#[test]
fn test_forward_goto_resolves_to_label() {
    let result = build(
        "int g(int x) { if (x) goto end; x = 1; end: return x; }",
        "c",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "g");
    let gotos = nodes_of_kind(cfg, NodeKind::Goto);
    let labels = nodes_of_kind(cfg, NodeKind::Label);
    assert_eq!(gotos.len(), 1);
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].source_text, "end");
    assert_eq!(gotos[0].successors, vec![labels[0].id]);

    let ret = node_by_text(cfg, "return x;");
    assert_eq!(labels[0].successors, vec![ret.id]);
}

#[test]
fn test_unresolved_goto_is_a_warning_not_an_error() {
    let result = build("void f() { goto nowhere; }", "c");
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("unresolved goto label 'nowhere'")));
}

// =============================================================================
// Unreachable code and calls
// =============================================================================

#[test]
fn test_code_after_return_is_dropped() {
    let result = build("int f() { return 1; int dead = 0; }", "c");
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    assert!(
        !cfg.nodes.values().any(|n| n.source_text.contains("dead")),
        "statement after return must be swept"
    );
}

#[test]
fn test_call_edges_wired_within_translation_unit() {
    let result = build(
        "int g(int a) { return a + 1; }\
         int m() { int x = 5; return g(x); }",
        "c",
    );
    assert_invariants(&result);

    let g = routine(&result, "g");
    let m = routine(&result, "m");
    let call_site = node_by_text(m, "return g(x);");
    assert_eq!(call_site.metadata.function_calls, vec!["g"]);
    assert_eq!(call_site.metadata.variable_uses, vec!["x"]);

    let g_entry = g.entry().unwrap();
    let g_exit = g.exit().unwrap();
    assert_eq!(
        call_site.edge_label(g_entry),
        Some("function_call"),
        "call site jumps into the callee"
    );
    let exit_node = g.node(g_exit).unwrap();
    assert!(
        exit_node
            .successors
            .iter()
            .any(|s| exit_node.edge_label(*s) == Some("function_return")),
        "callee exit returns to the call site"
    );
}

#[test]
fn test_call_to_unknown_routine_adds_no_edges() {
    let result = build("int f(int x) { return missing(x); }", "c");
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let call_site = node_by_text(cfg, "missing(x)");
    assert_eq!(call_site.metadata.function_calls, vec!["missing"]);
    assert!(call_site
        .edge_labels
        .values()
        .all(|l| l != "function_call"));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unsupported_language() {
    let err = sapflow::build_cfgs(b"print(1)", "python").unwrap_err();
    assert!(matches!(err, SapflowError::UnsupportedLanguage(_)));
}

#[test]
fn test_empty_source() {
    let err = sapflow::build_cfgs(b"  \n", "c").unwrap_err();
    assert!(matches!(err, SapflowError::EmptySource));
}
