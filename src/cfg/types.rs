//! CFG type definitions.
//!
//! Nodes reference each other by id rather than by pointer; the graph owns
//! an id-to-node map and edges are id lists. This sidesteps cyclic
//! ownership and makes serialization trivial.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a CFG node.
///
/// Ids are allocated monotonically by one counter per analysis request, so
/// they are unique across all routines of a translation unit. That keeps
/// cross-routine call/return edges unambiguous.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edge label for the taken branch of a condition or loop header.
pub const LABEL_TRUE: &str = "true";
/// Edge label for the not-taken branch of a condition or loop header.
pub const LABEL_FALSE: &str = "false";
/// Edge label for a switch default branch.
pub const LABEL_DEFAULT: &str = "default";
/// Edge label from a call site into the callee's entry.
pub const LABEL_FUNCTION_CALL: &str = "function_call";
/// Edge label from a callee's exit back to the call site's return point.
pub const LABEL_FUNCTION_RETURN: &str = "function_return";

/// Kind of a CFG node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    /// Routine entry point; source text is the routine name
    Entry,
    /// Routine exit point; source text is the routine name
    Exit,
    /// Linear statement
    Statement,
    /// Branch condition (if)
    Condition,
    /// Loop condition (while, for, do-while, for-each)
    LoopHeader,
    /// Break statement
    Break,
    /// Continue statement
    Continue,
    /// Return statement
    Return,
    /// Switch selector expression
    SwitchHead,
    /// Case label; compacted away by post-processing
    Case,
    /// Default label; compacted away by post-processing
    Default,
    /// Goto target label
    Label,
    /// Goto statement
    Goto,
    /// Internal join/exit point; compacted away by post-processing
    Placeholder,
}

impl NodeKind {
    /// Passthrough kinds exist only during construction and never survive
    /// post-processing.
    #[inline]
    pub fn is_passthrough(self) -> bool {
        matches!(self, NodeKind::Case | NodeKind::Default | NodeKind::Placeholder)
    }

    /// Kinds whose outgoing edges carry `true`/`false` labels.
    #[inline]
    pub fn is_branch(self) -> bool {
        matches!(self, NodeKind::Condition | NodeKind::LoopHeader)
    }
}

/// Identifiers a single call site passes per positional argument.
///
/// Retained in memory for the parameter-alias pass; not part of the JSON
/// surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArguments {
    /// Callee name as written at the call site
    pub callee: String,
    /// Identifier names appearing in each positional argument expression
    pub args: Vec<Vec<String>>,
}

/// Per-node identifier metadata recorded by the language visitors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Names of routines called from this node
    pub function_calls: Vec<String>,
    /// Variables this node defines
    pub variable_definitions: Vec<String>,
    /// Variables this node reads
    pub variable_uses: Vec<String>,
    /// Positional argument identifiers per call, for parameter aliasing
    #[serde(skip)]
    pub call_arguments: Vec<CallArguments>,
}

impl NodeMetadata {
    /// Record a definition, preserving first-seen order without duplicates.
    pub fn add_definition(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.variable_definitions.contains(&name) {
            self.variable_definitions.push(name);
        }
    }

    /// Record a use, preserving first-seen order without duplicates.
    pub fn add_use(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.variable_uses.contains(&name) {
            self.variable_uses.push(name);
        }
    }

    /// Record a call target.
    pub fn add_call(&mut self, name: impl Into<String>) {
        self.function_calls.push(name.into());
    }
}

/// A node in the control flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfgNode {
    /// Node identifier
    pub id: NodeId,
    /// Node kind
    #[serde(rename = "node_type")]
    pub kind: NodeKind,
    /// Verbatim source slice (routine name for ENTRY/EXIT)
    pub source_text: String,
    /// Start byte offset; `None` for synthetic nodes
    pub start_index: Option<usize>,
    /// End byte offset; `None` for synthetic nodes
    pub end_index: Option<usize>,
    /// Successor ids in insertion order, no duplicates
    pub successors: Vec<NodeId>,
    /// Predecessor ids, maintained coherently with `successors`
    pub predecessors: Vec<NodeId>,
    /// Label per outgoing edge; only present where the edge carries meaning
    pub edge_labels: BTreeMap<NodeId, String>,
    /// Identifier metadata
    #[serde(default)]
    pub metadata: NodeMetadata,
}

impl CfgNode {
    /// Create a node with no edges.
    pub fn new(id: NodeId, kind: NodeKind, source_text: String, span: Option<(usize, usize)>) -> Self {
        Self {
            id,
            kind,
            source_text,
            start_index: span.map(|(s, _)| s),
            end_index: span.map(|(_, e)| e),
            successors: Vec::new(),
            predecessors: Vec::new(),
            edge_labels: BTreeMap::new(),
            metadata: NodeMetadata::default(),
        }
    }

    /// Add a successor with an optional edge label.
    ///
    /// Re-adding an existing successor is a no-op for ordering; a label is
    /// only installed if the edge does not already carry one.
    pub fn add_successor(&mut self, id: NodeId, label: Option<&str>) {
        if !self.successors.contains(&id) {
            self.successors.push(id);
        }
        if let Some(label) = label {
            self.edge_labels.entry(id).or_insert_with(|| label.to_string());
        }
    }

    /// Add a predecessor.
    pub fn add_predecessor(&mut self, id: NodeId) {
        if !self.predecessors.contains(&id) {
            self.predecessors.push(id);
        }
    }

    /// Drop a successor and its label, if present.
    pub fn remove_successor(&mut self, id: NodeId) -> Option<String> {
        self.successors.retain(|s| *s != id);
        self.edge_labels.remove(&id)
    }

    /// Drop a predecessor, if present.
    pub fn remove_predecessor(&mut self, id: NodeId) {
        self.predecessors.retain(|p| *p != id);
    }

    /// Label of the edge to `successor`, if any.
    pub fn edge_label(&self, successor: NodeId) -> Option<&str> {
        self.edge_labels.get(&successor).map(String::as_str)
    }
}

/// Control flow graph for a single routine.
///
/// The node table is ordered by id, which equals insertion order, so
/// serialized output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cfg {
    /// Routine name, if one was found
    pub function_name: Option<String>,
    /// Parameter names in declaration order
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Entry node ids (exactly one after post-processing)
    pub entry_node_ids: Vec<NodeId>,
    /// Exit node ids (exactly one after post-processing)
    pub exit_node_ids: Vec<NodeId>,
    /// All nodes of the routine, keyed by id
    pub nodes: BTreeMap<NodeId, CfgNode>,
}

impl Cfg {
    /// Create an empty routine graph.
    pub fn new(function_name: Option<String>) -> Self {
        Self {
            function_name,
            ..Self::default()
        }
    }

    /// Look up a node.
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&CfgNode> {
        self.nodes.get(&id)
    }

    /// Look up a node mutably.
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut CfgNode> {
        self.nodes.get_mut(&id)
    }

    /// Insert a freshly created node.
    pub fn insert_node(&mut self, node: CfgNode) {
        debug_assert!(
            !self.nodes.contains_key(&node.id),
            "duplicate node id {}",
            node.id
        );
        self.nodes.insert(node.id, node);
    }

    /// The routine's entry node id.
    pub fn entry(&self) -> Option<NodeId> {
        self.entry_node_ids.first().copied()
    }

    /// The routine's exit node id.
    pub fn exit(&self) -> Option<NodeId> {
        self.exit_node_ids.first().copied()
    }

    /// Add an intra-routine edge with an optional label.
    ///
    /// Both endpoints must live in this routine; cross-routine call/return
    /// edges are wired by the post-processor, which has access to every
    /// routine of the request.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, label: Option<&str>) {
        if !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(&from) {
            node.add_successor(to, label);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.add_predecessor(from);
        }
    }

    /// Redirect the edge `from -> old_to` to `from -> new_to`, preserving
    /// its label and position in the successor order.
    pub fn replace_target(&mut self, from: NodeId, old_to: NodeId, new_to: NodeId) {
        {
            let Some(node) = self.nodes.get_mut(&from) else {
                return;
            };
            let Some(pos) = node.successors.iter().position(|s| *s == old_to) else {
                return;
            };
            let label = node.edge_labels.remove(&old_to);
            if node.successors.contains(&new_to) {
                node.successors.remove(pos);
            } else {
                node.successors[pos] = new_to;
            }
            if let Some(label) = label {
                node.edge_labels.entry(new_to).or_insert(label);
            }
        }
        if let Some(node) = self.nodes.get_mut(&old_to) {
            node.remove_predecessor(from);
        }
        if let Some(node) = self.nodes.get_mut(&new_to) {
            node.add_predecessor(from);
        }
    }

    /// Remove a node, re-threading each predecessor to each successor.
    ///
    /// The predecessor's edge label wins over the removed node's own
    /// outgoing label, which is what keeps case-value labels intact when a
    /// CASE node is compacted. Only intra-routine neighbors are touched;
    /// cross-routine cleanup is the post-processor's job.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        let preds: Vec<(NodeId, Option<String>)> = node
            .predecessors
            .iter()
            .filter(|p| **p != id)
            .map(|p| {
                let label = self
                    .nodes
                    .get(p)
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
            if let Some(n) = self.nodes.get_mut(p) {
                n.remove_successor(id);
            }
        }
        for (s, _) in &succs {
            if let Some(n) = self.nodes.get_mut(s) {
                n.remove_predecessor(id);
            }
        }
        for (p, pred_label) in &preds {
            for (s, succ_label) in &succs {
                let label = pred_label.as_deref().or(succ_label.as_deref());
                self.add_edge(*p, *s, label);
            }
        }
    }

    /// Check that successor and predecessor lists agree for every
    /// intra-routine edge.
    pub fn is_bidirectionally_consistent(&self) -> bool {
        for node in self.nodes.values() {
            for succ in &node.successors {
                if let Some(target) = self.nodes.get(succ) {
                    if !target.predecessors.contains(&node.id) {
                        return false;
                    }
                }
            }
            for pred in &node.predecessors {
                if let Some(source) = self.nodes.get(pred) {
                    if !source.successors.contains(&node.id) {
                        return false;
                    }
                }
            }
        }
        true
    }
}
