//! Java control-flow graph construction tests.

use sapflow::NodeKind;

use crate::common::{assert_invariants, build, edge_label, node_by_text, nodes_of_kind, routine};

fn in_class(body: &str) -> String {
    format!("class T {{ {} }}", body)
}

#[test]
fn test_simple_method() {
    let result = build(&in_class("int f(int a) { int b = a + 1; return b; }"), "java");
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    assert_eq!(cfg.parameters, vec!["a"]);
    assert_eq!(cfg.nodes.len(), 4);

    let entry = cfg.node(cfg.entry().unwrap()).unwrap();
    assert_eq!(entry.metadata.variable_definitions, vec!["a"]);

    let decl = node_by_text(cfg, "int b = a + 1;");
    assert_eq!(decl.metadata.variable_definitions, vec!["b"]);
    assert_eq!(decl.metadata.variable_uses, vec!["a"]);
}

#[test]
fn test_method_without_body_is_entry_exit() {
    let result = build("abstract class T { abstract int f(int x); }", "java");
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    assert_eq!(cfg.nodes.len(), 2);
    let entry = cfg.entry().unwrap();
    assert_eq!(cfg.node(entry).unwrap().successors, vec![cfg.exit().unwrap()]);
}

#[test]
fn test_if_else() {
    let result = build(
        &in_class("int f(int x) { int r; if (x > 0) { r = 1; } else { r = 2; } return r; }"),
        "java",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let cond = node_by_text(cfg, "(x > 0)");
    let then = node_by_text(cfg, "r = 1;");
    let els = node_by_text(cfg, "r = 2;");
    assert_eq!(cond.kind, NodeKind::Condition);
    assert_eq!(edge_label(cfg, cond.id, then.id).as_deref(), Some("true"));
    assert_eq!(edge_label(cfg, cond.id, els.id).as_deref(), Some("false"));
}

#[test]
fn test_while_loop() {
    let result = build(
        &in_class("int f(int n) { while (n > 0) { n = n - 1; } return n; }"),
        "java",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let header = node_by_text(cfg, "(n > 0)");
    let body = node_by_text(cfg, "n = n - 1;");
    let ret = node_by_text(cfg, "return n;");
    assert_eq!(header.kind, NodeKind::LoopHeader);
    assert_eq!(edge_label(cfg, header.id, body.id).as_deref(), Some("true"));
    assert_eq!(edge_label(cfg, header.id, ret.id).as_deref(), Some("false"));
    assert_eq!(body.successors, vec![header.id]);
}

#[test]
fn test_do_while_loop() {
    let result = build(
        &in_class("int f(int n) { do { n = n - 1; } while (n > 0); return n; }"),
        "java",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let body = node_by_text(cfg, "n = n - 1;");
    let header = node_by_text(cfg, "(n > 0)");
    let entry = cfg.entry().unwrap();
    assert_eq!(cfg.node(entry).unwrap().successors, vec![body.id]);
    assert_eq!(edge_label(cfg, header.id, body.id).as_deref(), Some("true"));
}

#[test]
fn test_enhanced_for_models_iterable_header() {
    let result = build(
        &in_class("int sum(int[] xs) { int t = 0; for (int x : xs) { t += x; } return t; }"),
        "java",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "sum");
    let headers = nodes_of_kind(cfg, NodeKind::LoopHeader);
    assert_eq!(headers.len(), 1);
    let header = headers[0];

    // The header's source is the iterable; the loop variable is defined
    // there and the iterable is used there.
    assert_eq!(header.source_text, "xs");
    assert!(header.metadata.variable_definitions.contains(&"x".to_string()));
    assert!(header.metadata.variable_uses.contains(&"xs".to_string()));

    let body = node_by_text(cfg, "t += x;");
    assert_eq!(edge_label(cfg, header.id, body.id).as_deref(), Some("true"));
    assert_eq!(body.successors, vec![header.id]);
    assert_eq!(body.metadata.variable_definitions, vec!["t"]);
    assert_eq!(body.metadata.variable_uses, vec!["t", "x"]);
}

#[test]
fn test_switch_with_fall_through_and_default() {
    let result = build(
        &in_class(
            "int s(int x) { int r = 0; switch (x) { case 1: r = 1; break; case 2: r = 2; default: r = 3; } return r; }",
        ),
        "java",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "s");
    let heads = nodes_of_kind(cfg, NodeKind::SwitchHead);
    assert_eq!(heads.len(), 1);
    let head = heads[0];

    let case1 = node_by_text(cfg, "r = 1;");
    let case2 = node_by_text(cfg, "r = 2;");
    let dflt = node_by_text(cfg, "r = 3;");
    assert_eq!(edge_label(cfg, head.id, case1.id).as_deref(), Some("1"));
    assert_eq!(edge_label(cfg, head.id, case2.id).as_deref(), Some("2"));
    assert_eq!(edge_label(cfg, head.id, dflt.id).as_deref(), Some("default"));
    // case 2 has no break: it falls into the default body.
    assert_eq!(case2.successors, vec![dflt.id]);
}

#[test]
fn test_break_and_continue_in_loop() {
    let result = build(
        &in_class(
            "int f(int n) { int s = 0; while (n > 0) { n = n - 1; if (n == 3) continue; if (n == 1) break; s = s + n; } return s; }",
        ),
        "java",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let header = node_by_text(cfg, "(n > 0)");
    let ret = node_by_text(cfg, "return s;");

    let conts = nodes_of_kind(cfg, NodeKind::Continue);
    assert_eq!(conts.len(), 1);
    assert_eq!(conts[0].successors, vec![header.id]);

    let breaks = nodes_of_kind(cfg, NodeKind::Break);
    assert_eq!(breaks.len(), 1);
    // The loop exit threads straight to the return.
    assert_eq!(breaks[0].successors, vec![ret.id]);
}

#[test]
fn test_method_calls_wired_and_target_rightmost_name() {
    let result = build(
        "class T { int g(int a) { return a + 1; } int m() { int x = 5; return g(x); } }",
        "java",
    );
    assert_invariants(&result);

    let g = routine(&result, "g");
    let m = routine(&result, "m");
    let call_site = node_by_text(m, "return g(x);");
    assert_eq!(call_site.metadata.function_calls, vec!["g"]);
    assert_eq!(
        call_site.edge_label(g.entry().unwrap()),
        Some("function_call")
    );
}

#[test]
fn test_chained_call_resolves_rightmost_only() {
    let result = build(
        &in_class("void f(Thing a) { a.b().c(); }"),
        "java",
    );
    assert_invariants(&result);

    let cfg = routine(&result, "f");
    let stmt = node_by_text(cfg, "a.b().c();");
    assert_eq!(stmt.metadata.function_calls, vec!["c", "b"]);
}
