//! Post-construction normalization of a translation unit's CFGs.
//!
//! Runs after every routine has been visited, in this order: call/return
//! edge wiring, passthrough compaction (CASE/DEFAULT/PLACEHOLDER nodes),
//! reachability sweep, invariant check. Goto resolution already happened at
//! routine finalization.
//!
//! The two cross-routine edge labels (`function_call`/`function_return`)
//! connect nodes living in different routine graphs; all rewiring here goes
//! through a unit-wide id-to-routine index so those edges stay coherent.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::cfg::types::{
    Cfg, NodeId, NodeKind, LABEL_DEFAULT, LABEL_FALSE, LABEL_FUNCTION_CALL,
    LABEL_FUNCTION_RETURN, LABEL_TRUE,
};
use crate::cfg::visitor::TranslationUnit;
use crate::cfg::CfgBuildResult;
use crate::error::{Result, SapflowError};

/// Maps every node id to the routine that owns it.
struct NodeIndex {
    owner: FxHashMap<NodeId, usize>,
}

impl NodeIndex {
    fn build(routines: &[Cfg]) -> Self {
        let mut owner = FxHashMap::default();
        for (idx, cfg) in routines.iter().enumerate() {
            for id in cfg.nodes.keys() {
                owner.insert(*id, idx);
            }
        }
        Self { owner }
    }

    fn routine_of(&self, id: NodeId) -> Option<usize> {
        self.owner.get(&id).copied()
    }

    fn forget(&mut self, id: NodeId) {
        self.owner.remove(&id);
    }
}

/// Add an edge between any two nodes of the unit, intra- or cross-routine.
fn add_edge(routines: &mut [Cfg], index: &NodeIndex, from: NodeId, to: NodeId, label: Option<&str>) {
    let (Some(rf), Some(rt)) = (index.routine_of(from), index.routine_of(to)) else {
        return;
    };
    if let Some(node) = routines[rf].node_mut(from) {
        node.add_successor(to, label);
    }
    if let Some(node) = routines[rt].node_mut(to) {
        node.add_predecessor(from);
    }
}

/// Run all normalization passes and the final invariant check.
pub fn run(unit: TranslationUnit) -> Result<CfgBuildResult> {
    let TranslationUnit {
        mut routines,
        functions,
        call_returns,
        warnings,
    } = unit;

    let mut index = NodeIndex::build(&routines);

    // Pair every call site with its callee, when the callee was parsed from
    // the same translation unit. Unknown callees are normal, not warnings.
    for call in &call_returns {
        let Some(target) = functions.get(&call.callee) else {
            continue;
        };
        add_edge(
            &mut routines,
            &index,
            call.call_node,
            target.entry,
            Some(LABEL_FUNCTION_CALL),
        );
        if let Some(return_point) = call.return_point {
            add_edge(
                &mut routines,
                &index,
                target.exit,
                return_point,
                Some(LABEL_FUNCTION_RETURN),
            );
        }
    }

    compact_passthrough_nodes(&mut routines, &mut index);
    sweep_unreachable(&mut routines, &mut index);
    check_invariants(&routines, &index)?;

    Ok(CfgBuildResult { routines, warnings })
}

/// Remove every CASE/DEFAULT/PLACEHOLDER node, re-threading each
/// predecessor to each successor (Cartesian product). The predecessor's
/// edge label wins over the removed node's own outgoing label, so a CASE
/// node's in-edge value survives onto the case body.
fn compact_passthrough_nodes(routines: &mut [Cfg], index: &mut NodeIndex) {
    let targets: Vec<(usize, NodeId)> = routines
        .iter()
        .enumerate()
        .flat_map(|(ri, cfg)| {
            cfg.nodes
                .values()
                .filter(|n| n.kind.is_passthrough())
                .map(move |n| (ri, n.id))
        })
        .collect();
    debug!(count = targets.len(), "compacting passthrough nodes");

    for (ri, id) in targets {
        let Some(node) = routines[ri].nodes.remove(&id) else {
            continue;
        };
        index.forget(id);

        let preds: Vec<(NodeId, Option<String>)> = node
            .predecessors
            .iter()
            .filter(|p| **p != id)
            .map(|p| {
                let label = index
                    .routine_of(*p)
                    .and_then(|rp| routines[rp].node(*p))
                    .and_then(|n| n.edge_label(id))
                    .map(str::to_string);
                (*p, label)
            })
            .collect();
        let succs: Vec<(NodeId, Option<String>)> = node
            .successors
            .iter()
            .filter(|s| **s != id)
            .map(|s| (*s, node.edge_label(*s).map(str::to_string)))
            .collect();

        for (p, _) in &preds {
            if let Some(n) = index.routine_of(*p).and_then(|rp| routines[rp].node_mut(*p)) {
                n.remove_successor(id);
            }
        }
        for (s, _) in &succs {
            if let Some(n) = index.routine_of(*s).and_then(|rs| routines[rs].node_mut(*s)) {
                n.remove_predecessor(id);
            }
        }
        for (p, pred_label) in &preds {
            for (s, succ_label) in &succs {
                let label = pred_label.as_deref().or(succ_label.as_deref());
                add_edge(routines, index, *p, *s, label);
            }
        }
    }
}

/// Delete every node not forward-reachable from its routine's ENTRY.
///
/// Cross-routine call/return edges do not grant reachability; a routine is
/// swept purely on its own control flow. Code textually after an
/// unconditional jump disappears here. LABEL nodes need no special case:
/// resolved goto edges already exist, so a label is reachable exactly when
/// some reachable jump or fall-through path leads to it.
fn sweep_unreachable(routines: &mut [Cfg], index: &mut NodeIndex) {
    for ri in 0..routines.len() {
        let Some(entry) = routines[ri].entry() else {
            continue;
        };
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        let mut queue = vec![entry];
        while let Some(id) = queue.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = routines[ri].node(id) {
                for succ in &node.successors {
                    // Stay within this routine.
                    if index.routine_of(*succ) == Some(ri) {
                        queue.push(*succ);
                    }
                }
            }
        }

        let dead: Vec<NodeId> = routines[ri]
            .nodes
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect();
        if dead.is_empty() {
            continue;
        }
        debug!(routine = ri, count = dead.len(), "sweeping unreachable nodes");

        for id in dead {
            let Some(node) = routines[ri].nodes.remove(&id) else {
                continue;
            };
            index.forget(id);
            for p in &node.predecessors {
                if let Some(n) = index.routine_of(*p).and_then(|rp| routines[rp].node_mut(*p)) {
                    n.remove_successor(id);
                }
            }
            for s in &node.successors {
                if let Some(n) = index.routine_of(*s).and_then(|rs| routines[rs].node_mut(*s)) {
                    n.remove_predecessor(id);
                }
            }
        }
    }
}

/// Validate the structural invariants every produced CFG must satisfy. A
/// violation here is a bug in a visitor, not bad input.
fn check_invariants(routines: &[Cfg], index: &NodeIndex) -> Result<()> {
    for cfg in routines {
        let name = cfg.function_name.as_deref().unwrap_or("<anonymous>");
        if cfg.entry_node_ids.len() != 1 || cfg.exit_node_ids.len() != 1 {
            return Err(SapflowError::Invariant(format!(
                "routine '{}' must have exactly one entry and one exit",
                name
            )));
        }
        let entry = cfg.entry_node_ids[0];
        let exit = cfg.exit_node_ids[0];

        let entry_node = cfg
            .node(entry)
            .ok_or_else(|| SapflowError::Invariant(format!("missing entry node in '{}'", name)))?;
        if entry_node.kind != NodeKind::Entry {
            return Err(SapflowError::Invariant(format!(
                "entry node of '{}' has kind {:?}",
                name, entry_node.kind
            )));
        }
        // Only call-site edges may enter an ENTRY node.
        for pred in &entry_node.predecessors {
            let label = index
                .routine_of(*pred)
                .and_then(|rp| routines[rp].node(*pred))
                .and_then(|n| n.edge_label(entry));
            if label != Some(LABEL_FUNCTION_CALL) {
                return Err(SapflowError::Invariant(format!(
                    "entry of '{}' has a non-call predecessor {}",
                    name, pred
                )));
            }
        }

        let exit_node = cfg
            .node(exit)
            .ok_or_else(|| SapflowError::Invariant(format!("missing exit node in '{}'", name)))?;
        if exit_node.kind != NodeKind::Exit {
            return Err(SapflowError::Invariant(format!(
                "exit node of '{}' has kind {:?}",
                name, exit_node.kind
            )));
        }
        // Only return edges back to call sites may leave an EXIT node.
        for succ in &exit_node.successors {
            if exit_node.edge_label(*succ) != Some(LABEL_FUNCTION_RETURN) {
                return Err(SapflowError::Invariant(format!(
                    "exit of '{}' has a non-return successor {}",
                    name, succ
                )));
            }
        }

        for node in cfg.nodes.values() {
            if node.kind.is_passthrough() {
                return Err(SapflowError::Invariant(format!(
                    "passthrough node {} survived post-processing in '{}'",
                    node.id, name
                )));
            }

            // Bidirectional consistency, cross-routine edges included.
            for succ in &node.successors {
                let ok = index
                    .routine_of(*succ)
                    .and_then(|rs| routines[rs].node(*succ))
                    .map(|n| n.predecessors.contains(&node.id))
                    .unwrap_or(false);
                if !ok {
                    return Err(SapflowError::Invariant(format!(
                        "edge {} -> {} lacks a predecessor entry",
                        node.id, succ
                    )));
                }
            }
            for pred in &node.predecessors {
                let ok = index
                    .routine_of(*pred)
                    .and_then(|rp| routines[rp].node(*pred))
                    .map(|n| n.successors.contains(&node.id))
                    .unwrap_or(false);
                if !ok {
                    return Err(SapflowError::Invariant(format!(
                        "edge {} -> {} lacks a successor entry",
                        pred, node.id
                    )));
                }
            }

            // Labels appear only where they mean something.
            let mut default_count = 0;
            for (succ, label) in &node.edge_labels {
                if label.is_empty() {
                    return Err(SapflowError::Invariant(format!(
                        "empty edge label on {} -> {}",
                        node.id, succ
                    )));
                }
                if label == LABEL_FUNCTION_CALL || label == LABEL_FUNCTION_RETURN {
                    continue;
                }
                match node.kind {
                    NodeKind::Condition | NodeKind::LoopHeader => {
                        if label != LABEL_TRUE && label != LABEL_FALSE {
                            return Err(SapflowError::Invariant(format!(
                                "branch node {} carries label '{}'",
                                node.id, label
                            )));
                        }
                    }
                    NodeKind::SwitchHead => {
                        if label == LABEL_DEFAULT {
                            default_count += 1;
                        }
                    }
                    _ => {
                        return Err(SapflowError::Invariant(format!(
                            "node {} of kind {:?} carries label '{}'",
                            node.id, node.kind, label
                        )));
                    }
                }
            }
            if default_count > 1 {
                return Err(SapflowError::Invariant(format!(
                    "switch head {} has {} default edges",
                    node.id, default_count
                )));
            }
            if node.kind.is_branch() && !node.edge_labels.is_empty() {
                let labels: Vec<&str> = node
                    .edge_labels
                    .values()
                    .map(String::as_str)
                    .filter(|l| *l == LABEL_TRUE || *l == LABEL_FALSE)
                    .collect();
                if labels.is_empty() {
                    return Err(SapflowError::Invariant(format!(
                        "branch node {} has no true/false edge",
                        node.id
                    )));
                }
            }
        }
    }
    Ok(())
}
