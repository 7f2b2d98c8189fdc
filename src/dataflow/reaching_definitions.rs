//! Reaching Definitions analysis.
//!
//! For each program point, determines which definitions of each variable
//! may reach that point without being overwritten by another definition of
//! the same variable.
//!
//! A fact is a `(variable, defining node)` pair. GEN at a node produces one
//! fact per variable the node defines; KILL removes every other definition
//! of those variables from the whole universe. Routine parameters reach the
//! body through the ENTRY node, which carries them as definitions.

use crate::cfg::types::{Cfg, CfgNode, NodeId};
use crate::dataflow::solver::{solve_forward, BitSet, DataflowResult, FactIndex, GenKillProblem};

/// A definition of `variable` at `node_id` that may reach a program point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReachingDefinition {
    /// Variable name
    pub variable: String,
    /// Node where the definition occurs
    pub node_id: NodeId,
}

/// The Reaching Definitions problem instance.
pub struct ReachingDefinitions;

impl GenKillProblem for ReachingDefinitions {
    type Fact = ReachingDefinition;

    fn universe(&self, cfg: &Cfg) -> Vec<ReachingDefinition> {
        let mut facts = Vec::new();
        for node in cfg.nodes.values() {
            for variable in &node.metadata.variable_definitions {
                facts.push(ReachingDefinition {
                    variable: variable.clone(),
                    node_id: node.id,
                });
            }
        }
        facts
    }

    fn gen(&self, node: &CfgNode, index: &FactIndex<ReachingDefinition>) -> BitSet {
        let mut set = index.empty_set();
        for variable in &node.metadata.variable_definitions {
            let fact = ReachingDefinition {
                variable: variable.clone(),
                node_id: node.id,
            };
            if let Some(i) = index.index_of(&fact) {
                set.insert(i);
            }
        }
        set
    }

    fn kill(&self, node: &CfgNode, index: &FactIndex<ReachingDefinition>) -> BitSet {
        // A new definition of v kills every other definition of v.
        let mut set = index.empty_set();
        for (i, fact) in index.facts().iter().enumerate() {
            if fact.node_id != node.id
                && node
                    .metadata
                    .variable_definitions
                    .contains(&fact.variable)
            {
                set.insert(i);
            }
        }
        set
    }
}

/// Run Reaching Definitions over one routine.
pub fn solve(cfg: &Cfg) -> DataflowResult<ReachingDefinition> {
    solve_forward(cfg, &ReachingDefinitions)
}
