//! Def-use / use-def analysis integration tests, C and Java.

use sapflow::{analyze_def_use, DefUseAnalysis, NodeId};

use crate::common::{build, node_by_text, routine};

fn def_nodes(analysis: &DefUseAnalysis, variable: &str, use_node: NodeId) -> Vec<NodeId> {
    analysis
        .use_def
        .iter()
        .find(|c| c.variable == variable && c.use_node_id == use_node)
        .map(|c| c.def_node_ids.clone())
        .unwrap_or_else(|| panic!("no use-def chain for '{}' at {}", variable, use_node))
}

// =============================================================================
// Intra-procedural chains
// =============================================================================

#[test]
fn test_single_def_single_use() {
    let result = build("int f() { int a = 1; return a; }", "c");
    let analysis = analyze_def_use(&result.routines);
    let cfg = routine(&result, "f");

    let decl = node_by_text(cfg, "int a = 1;").id;
    let ret = node_by_text(cfg, "return a;").id;
    assert_eq!(def_nodes(&analysis, "a", ret), vec![decl]);

    let chain = analysis
        .chains
        .iter()
        .find(|c| c.variable == "a")
        .expect("def-use chain for a");
    assert_eq!(chain.def_node_id, decl);
    assert_eq!(chain.use_node_ids, vec![ret]);
}

#[test]
fn test_redefinition_kills_previous() {
    let result = build("int f() { int v = 1; v = 2; use(v); }", "c");
    let analysis = analyze_def_use(&result.routines);
    let cfg = routine(&result, "f");

    let second = node_by_text(cfg, "v = 2;").id;
    let use_site = node_by_text(cfg, "use(v);").id;
    assert_eq!(def_nodes(&analysis, "v", use_site), vec![second]);
}

#[test]
fn test_branch_merge_reaches_both_defs() {
    let result = build("int f(int c) { int v = 1; if (c) { v = 2; } use(v); }", "c");
    let analysis = analyze_def_use(&result.routines);
    let cfg = routine(&result, "f");

    let first = node_by_text(cfg, "int v = 1;").id;
    let second = node_by_text(cfg, "v = 2;").id;
    let use_site = node_by_text(cfg, "use(v);").id;
    assert_eq!(def_nodes(&analysis, "v", use_site), vec![first, second]);
}

#[test]
fn test_loop_body_def_reaches_condition_use() {
    let result = build(
        "int w(int n) { int s = 0; while (n > 0) { s = s + n; n = n - 1; } return s; }",
        "c",
    );
    let analysis = analyze_def_use(&result.routines);
    let cfg = routine(&result, "w");

    // At the loop header, n may come from the parameter or the decrement.
    let header = node_by_text(cfg, "(n > 0)").id;
    let entry = cfg.entry().unwrap();
    let decrement = node_by_text(cfg, "n = n - 1;").id;
    assert_eq!(def_nodes(&analysis, "n", header), vec![entry, decrement]);

    // The return sees s from before the loop and from inside it.
    let init = node_by_text(cfg, "int s = 0;").id;
    let body = node_by_text(cfg, "s = s + n;").id;
    let ret = node_by_text(cfg, "return s;").id;
    assert_eq!(def_nodes(&analysis, "s", ret), vec![init, body]);
}

#[test]
fn test_update_expression_self_chain() {
    let result = build("int u() { int a = 0; a++; return a; }", "c");
    let analysis = analyze_def_use(&result.routines);
    let cfg = routine(&result, "u");

    let decl = node_by_text(cfg, "int a = 0;").id;
    let update = node_by_text(cfg, "a++;").id;
    // a++ reads a from the declaration and from itself.
    assert_eq!(def_nodes(&analysis, "a", update), vec![decl, update]);
}

// =============================================================================
// Inter-procedural parameter aliasing
// =============================================================================

#[test]
fn test_parameter_alias_reaches_argument_definition() {
    let result = build(
        "void f(int a) { use(a); }\
         void main() { int x = 5; f(x); }",
        "c",
    );
    let analysis = analyze_def_use(&result.routines);

    let f = routine(&result, "f");
    let main = routine(&result, "main");
    let use_site = node_by_text(f, "use(a);").id;
    let entry = f.entry().unwrap();
    let x_def = node_by_text(main, "int x = 5;").id;

    // The use of a inside f resolves to the parameter's entry definition
    // and to the definition of the argument at the call site.
    assert_eq!(def_nodes(&analysis, "a", use_site), vec![entry, x_def]);
}

#[test]
fn test_parameter_alias_collects_every_call_site() {
    let result = build(
        "void f(int a) { use(a); }\
         void g() { int p = 1; f(p); }\
         void h() { int q = 2; f(q); }",
        "c",
    );
    let analysis = analyze_def_use(&result.routines);

    let f = routine(&result, "f");
    let g = routine(&result, "g");
    let h = routine(&result, "h");
    let use_site = node_by_text(f, "use(a);").id;
    let defs = def_nodes(&analysis, "a", use_site);

    assert!(defs.contains(&f.entry().unwrap()));
    assert!(defs.contains(&node_by_text(g, "int p = 1;").id));
    assert!(defs.contains(&node_by_text(h, "int q = 2;").id));
    assert_eq!(defs.len(), 3);
}

#[test]
fn test_second_parameter_maps_to_second_argument() {
    let result = build(
        "void f(int a, int b) { use(b); }\
         void main() { int x = 1; int y = 2; f(x, y); }",
        "c",
    );
    let analysis = analyze_def_use(&result.routines);

    let f = routine(&result, "f");
    let main = routine(&result, "main");
    let use_site = node_by_text(f, "use(b);").id;
    let y_def = node_by_text(main, "int y = 2;").id;
    let defs = def_nodes(&analysis, "b", use_site);

    assert!(defs.contains(&y_def), "b aliases the second argument");
    assert!(
        !defs.contains(&node_by_text(main, "int x = 1;").id),
        "b does not alias the first argument"
    );
}

#[test]
fn test_excess_arguments_are_ignored() {
    let result = build(
        "void f(int a) { use(a); }\
         void main() { int x = 1; int y = 2; f(x, y); }",
        "c",
    );
    let analysis = analyze_def_use(&result.routines);

    let f = routine(&result, "f");
    let main = routine(&result, "main");
    let use_site = node_by_text(f, "use(a);").id;
    let defs = def_nodes(&analysis, "a", use_site);
    assert!(defs.contains(&node_by_text(main, "int x = 1;").id));
    assert!(!defs.contains(&node_by_text(main, "int y = 2;").id));
}

#[test]
fn test_java_parameter_alias() {
    let result = build(
        "class T { int g(int a) { return a + 1; } int m() { int x = 5; return g(x); } }",
        "java",
    );
    let analysis = analyze_def_use(&result.routines);

    let g = routine(&result, "g");
    let m = routine(&result, "m");
    let use_site = node_by_text(g, "return a + 1;").id;
    let x_def = node_by_text(m, "int x = 5;").id;
    let defs = def_nodes(&analysis, "a", use_site);
    assert!(defs.contains(&g.entry().unwrap()));
    assert!(defs.contains(&x_def));
}

// =============================================================================
// Tolerance
// =============================================================================

#[test]
fn test_routine_without_body_is_tolerated() {
    let result = build("abstract class T { abstract int f(int x); }", "java");
    let analysis = analyze_def_use(&result.routines);
    // ENTRY->EXIT only; nothing uses anything.
    assert!(analysis.use_def.is_empty());
    assert!(analysis.chains.is_empty());
}

#[test]
fn test_call_to_absent_routine_is_normal() {
    let result = build("int f(int x) { return missing(x); }", "c");
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let analysis = analyze_def_use(&result.routines);
    let cfg = routine(&result, "f");
    let ret = node_by_text(cfg, "return missing(x);").id;
    // x still resolves intra-procedurally to the parameter.
    assert_eq!(def_nodes(&analysis, "x", ret), vec![cfg.entry().unwrap()]);
}
