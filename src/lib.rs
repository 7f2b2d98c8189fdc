//! sapflow: multi-language control-flow and def-use analysis.
//!
//! Given C or Java source text, sapflow parses it with tree-sitter, builds
//! a normalized per-routine control flow graph, and derives def-use /
//! use-def chains from a reaching-definitions dataflow analysis, including
//! direct parameter-argument aliases across call sites within the same
//! file.
//!
//! # Example
//!
//! ```no_run
//! use sapflow::{analyze_def_use, build_cfgs};
//!
//! let source = b"int f(int a) { int b = a + 1; return b; }";
//! let cfgs = build_cfgs(source, "c")?;
//! let chains = analyze_def_use(&cfgs.routines);
//! for chain in &chains.chains {
//!     println!("{} defined at {} used at {:?}",
//!         chain.variable, chain.def_node_id, chain.use_node_ids);
//! }
//! # Ok::<(), sapflow::SapflowError>(())
//! ```
//!
//! # Architecture
//!
//! - [`ast`]: adapter over the external tree-sitter parse tree
//! - [`cfg`]: graph model, visitor framework, post-processing, rendering
//! - [`lang`]: per-language construct handlers and identifier classifiers
//! - [`dataflow`]: generic GEN/KILL solver, reaching definitions, chains
//!
//! The core is synchronous and shares nothing between requests: each call
//! to [`build_cfgs`] owns its visitor and graphs, so concurrent callers
//! just invoke it from their own threads.

pub mod ast;
pub mod cfg;
pub mod dataflow;
pub mod error;
pub mod lang;

pub use cfg::{build_cfgs, Cfg, CfgBuildResult, CfgNode, NodeId, NodeKind, NodeMetadata};
pub use dataflow::{analyze_def_use, DefUseAnalysis, DefUseChain, UseDefChain};
pub use error::{Result, SapflowError};
pub use lang::LanguageRegistry;
