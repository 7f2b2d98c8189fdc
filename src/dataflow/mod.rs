//! Dataflow analysis over routine CFGs.
//!
//! [`solver`] is a generic monotone forward GEN/KILL worklist solver;
//! [`reaching_definitions`] instantiates it, and [`def_use`] layers
//! def-use / use-def chains with inter-procedural parameter aliasing on
//! top of the per-routine results.

pub mod def_use;
pub mod reaching_definitions;
pub mod solver;

pub use def_use::{analyze_def_use, DefUseAnalysis, DefUseChain, UseDefChain};
pub use reaching_definitions::ReachingDefinition;
pub use solver::{BitSet, DataflowResult, FactIndex, GenKillProblem};
