//! Control flow graph construction.
//!
//! Builds one CFG per routine from a parsed source file, normalized so that
//! every routine has a single ENTRY and EXIT, no construction-time
//! passthrough nodes remain, and intra-file call sites are wired to their
//! callees with `function_call`/`function_return` edges.
//!
//! # Modules
//!
//! - [`types`]: node/graph data model
//! - [`visitor`]: fragment-based construction framework
//! - [`postprocess`]: normalization passes and invariant checks
//! - [`render`]: DOT and Mermaid output
//!
//! # Example
//!
//! ```no_run
//! use sapflow::cfg::build_cfgs;
//!
//! let result = build_cfgs(b"int f() { return 0; }", "c")?;
//! for routine in &result.routines {
//!     println!("{:?}: {} nodes", routine.function_name, routine.nodes.len());
//! }
//! # Ok::<(), sapflow::SapflowError>(())
//! ```

pub mod postprocess;
pub mod render;
pub mod types;
pub mod visitor;

pub use types::{Cfg, CfgNode, NodeId, NodeKind, NodeMetadata};
pub use visitor::{CfgVisitor, Fragment};

use serde::{Deserialize, Serialize};
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Query, QueryCursor};

use crate::ast;
use crate::error::{Result, SapflowError};
use crate::lang::LanguageRegistry;

/// Routine CFGs built from one source file, plus the structural warnings
/// the traversal accumulated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CfgBuildResult {
    /// One CFG per routine, in source order
    pub routines: Vec<Cfg>,
    /// Non-fatal structural warnings (unknown kinds, unresolved gotos, ...)
    pub warnings: Vec<String>,
}

/// Build control flow graphs for every routine in `source`.
///
/// `language` must name a registered language (`"c"` or `"java"`).
///
/// # Errors
///
/// * [`SapflowError::UnsupportedLanguage`] - language not registered
/// * [`SapflowError::EmptySource`] - source is empty or whitespace
/// * [`SapflowError::Parse`] - the grammar could not parse the input at all
/// * [`SapflowError::Invariant`] - a normalization invariant was violated
///   (a bug in a visitor, never caused by well-formed input)
pub fn build_cfgs(source: &[u8], language: &str) -> Result<CfgBuildResult> {
    let lang = LanguageRegistry::global()
        .get_by_name(language)
        .ok_or_else(|| SapflowError::UnsupportedLanguage(language.to_string()))?;

    let mut parser = lang.parser()?;
    let tree = ast::parse_source(&mut parser, source)?;

    let mut visitor = CfgVisitor::new(source, lang);
    if tree.root_node().has_error() {
        visitor.warn("parse tree contains syntax errors; analysis may be incomplete");
    }

    let routine_nodes = find_routines(&tree, source, lang.routine_query(), lang.name())?;
    debug!(language, routines = routine_nodes.len(), "building CFGs");
    for node in routine_nodes {
        visitor.visit(node);
    }

    postprocess::run(visitor.finish())
}

/// Locate routine definition nodes with the language's tree-sitter query.
fn find_routines<'tree>(
    tree: &'tree tree_sitter::Tree,
    source: &[u8],
    query_str: &str,
    language: &str,
) -> Result<Vec<Node<'tree>>> {
    let query = Query::new(&tree.language(), query_str).map_err(|e| {
        SapflowError::TreeSitter(format!("{} routine query failed to compile: {}", language, e))
    })?;

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);
    let mut routines: Vec<Node<'tree>> = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if !routines.iter().any(|n| n.id() == capture.node.id()) {
                routines.push(capture.node);
            }
        }
    }
    routines.sort_by_key(|n| n.start_byte());
    Ok(routines)
}
