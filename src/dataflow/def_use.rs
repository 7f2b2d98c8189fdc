//! Def-use / use-def chain extraction.
//!
//! Instantiates Reaching Definitions per routine, reads each node's uses
//! against the facts at its entry, and resolves direct parameter aliases
//! across intra-file call sites: a use of parameter `k` also chains to
//! every definition reaching the k-th argument of each call site that
//! targets the routine.
//!
//! A node that both defines and uses a variable (an update expression like
//! `x++`) chains the use to the node itself in addition to the defs
//! reaching it.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cfg::types::{CallArguments, Cfg, NodeId};
use crate::dataflow::reaching_definitions::{self, ReachingDefinition};
use crate::dataflow::solver::DataflowResult;

/// One definition and every use it reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefUseChain {
    /// Variable name
    pub variable: String,
    /// Node where the definition occurs
    pub def_node_id: NodeId,
    /// Nodes where that definition is used, ascending
    pub use_node_ids: Vec<NodeId>,
}

/// One use and every definition that reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseDefChain {
    /// Variable name
    pub variable: String,
    /// Node where the use occurs
    pub use_node_id: NodeId,
    /// Nodes whose definitions reach the use, ascending; empty for a use
    /// no definition reaches
    pub def_node_ids: Vec<NodeId>,
}

/// Chains for a whole translation unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefUseAnalysis {
    /// Def-use chains, ordered by (variable, defining node)
    pub chains: Vec<DefUseChain>,
    /// Use-def chains, ordered by (variable, using node)
    pub use_def: Vec<UseDefChain>,
}

/// Build def-use and use-def chains for the routines of one translation
/// unit.
///
/// Routines called but not present contribute no aliases, silently; a call
/// with fewer arguments than the callee has parameters contributes nothing
/// for the missing positions.
pub fn analyze_def_use(routines: &[Cfg]) -> DefUseAnalysis {
    let rd: Vec<DataflowResult<ReachingDefinition>> =
        routines.iter().map(reaching_definitions::solve).collect();

    // Call sites per callee name, with their per-argument identifiers.
    let mut call_sites: FxHashMap<&str, Vec<(usize, NodeId, &CallArguments)>> =
        FxHashMap::default();
    for (ri, cfg) in routines.iter().enumerate() {
        for node in cfg.nodes.values() {
            for call in &node.metadata.call_arguments {
                call_sites
                    .entry(call.callee.as_str())
                    .or_default()
                    .push((ri, node.id, call));
            }
        }
    }

    let mut use_defs: BTreeMap<(String, NodeId), BTreeSet<NodeId>> = BTreeMap::new();

    for (ri, cfg) in routines.iter().enumerate() {
        for node in cfg.nodes.values() {
            for variable in &node.metadata.variable_uses {
                let mut defs: BTreeSet<NodeId> = reaching_defs_of(&rd[ri], node.id, variable);

                // An update expression's use sees its own definition too.
                if node.metadata.variable_definitions.contains(variable) {
                    defs.insert(node.id);
                }

                // Direct parameter alias: defs of the matching argument at
                // every call site targeting this routine.
                if let (Some(k), Some(name)) = (
                    cfg.parameters.iter().position(|p| p == variable),
                    cfg.function_name.as_deref(),
                ) {
                    for (caller, call_node, call) in
                        call_sites.get(name).into_iter().flatten()
                    {
                        let Some(arg_idents) = call.args.get(k) else {
                            // Arity mismatch: missing argument aliases nothing.
                            continue;
                        };
                        for ident in arg_idents {
                            defs.extend(reaching_defs_of(&rd[*caller], *call_node, ident));
                        }
                    }
                }

                use_defs.insert((variable.clone(), node.id), defs);
            }
        }
    }

    // Def-use is the inverse relation, assembled in the same pass.
    let mut def_uses: BTreeMap<(String, NodeId), BTreeSet<NodeId>> = BTreeMap::new();
    for ((variable, use_node), defs) in &use_defs {
        for def_node in defs {
            def_uses
                .entry((variable.clone(), *def_node))
                .or_default()
                .insert(*use_node);
        }
    }

    let analysis = DefUseAnalysis {
        chains: def_uses
            .into_iter()
            .map(|((variable, def_node_id), uses)| DefUseChain {
                variable,
                def_node_id,
                use_node_ids: uses.into_iter().collect(),
            })
            .collect(),
        use_def: use_defs
            .into_iter()
            .map(|((variable, use_node_id), defs)| UseDefChain {
                variable,
                use_node_id,
                def_node_ids: defs.into_iter().collect(),
            })
            .collect(),
    };
    debug!(
        chains = analysis.chains.len(),
        use_def = analysis.use_def.len(),
        "def-use analysis complete"
    );
    analysis
}

fn reaching_defs_of(
    rd: &DataflowResult<ReachingDefinition>,
    node: NodeId,
    variable: &str,
) -> BTreeSet<NodeId> {
    rd.facts_in(node)
        .into_iter()
        .filter(|f| f.variable == variable)
        .map(|f| f.node_id)
        .collect()
}
