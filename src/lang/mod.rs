//! Language abstraction layer.
//!
//! Each supported language implements [`LanguageCfg`] to provide its
//! tree-sitter grammar, the query that locates routine definitions, the
//! per-kind construct handlers, and the identifier classifier that fills
//! node metadata.

pub mod common;
pub mod registry;

pub mod c;
pub mod java;

pub use registry::LanguageRegistry;

use tree_sitter::{Node, Parser};

use crate::cfg::types::NodeMetadata;
use crate::cfg::visitor::{CfgVisitor, Fragment};
use crate::error::{Result, SapflowError};

/// Trait for language-specific CFG construction.
pub trait LanguageCfg: Send + Sync {
    /// Language identifier (e.g. "c", "java").
    fn name(&self) -> &'static str;

    /// File extensions for this language (e.g. &[".c", ".h"]).
    fn extensions(&self) -> &[&'static str];

    /// The tree-sitter grammar for this language.
    fn grammar(&self) -> tree_sitter::Language;

    /// A configured parser for this language.
    fn parser(&self) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|e| SapflowError::TreeSitter(e.to_string()))?;
        Ok(parser)
    }

    /// Tree-sitter query locating routine definitions; must capture each
    /// routine node as `@routine`.
    fn routine_query(&self) -> &'static str;

    /// Whether an AST kind is a comment. Comment nodes never reach the
    /// handlers.
    fn is_comment(&self, kind: &str) -> bool {
        kind == "comment" || kind.ends_with("_comment")
    }

    /// Handle one AST node, returning its fragment.
    ///
    /// Returning `None` defers to the framework's default handler (a
    /// single STATEMENT spanning the node).
    fn visit(&self, v: &mut CfgVisitor, node: Node) -> Option<Fragment>;

    /// Classify the identifiers under `node` into definitions, uses, and
    /// call targets.
    fn scan_metadata(&self, node: Node, source: &[u8]) -> NodeMetadata;
}
