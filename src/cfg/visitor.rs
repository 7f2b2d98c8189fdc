//! Visitor framework for CFG construction.
//!
//! Each language handler consumes AST nodes and returns [`Fragment`]s: a
//! partial CFG with one entry and the set of still-open exit points. The
//! framework owns id allocation, the control-flow scoping stacks, and the
//! routine entry/finalization protocol; language visitors own the per-kind
//! construct handlers.

use rustc_hash::FxHashMap;
use tracing::debug;
use tree_sitter::Node;

use crate::ast;
use crate::cfg::types::{Cfg, CfgNode, NodeId, NodeKind, NodeMetadata};
use crate::lang::LanguageCfg;

/// A partial CFG produced by one handler: an entry node and the exits whose
/// successors are not yet connected.
///
/// Empty `exits` models control flow that does not fall through (code after
/// `return`, `break`, `continue`, or `goto`).
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Entry node of the fragment
    pub entry: NodeId,
    /// Open exit points, in creation order
    pub exits: Vec<NodeId>,
}

impl Fragment {
    /// Fragment consisting of a single fall-through node.
    pub fn single(id: NodeId) -> Self {
        Self {
            entry: id,
            exits: vec![id],
        }
    }

    /// Fragment for a jump: control enters but never falls through.
    pub fn terminal(id: NodeId) -> Self {
        Self {
            entry: id,
            exits: Vec::new(),
        }
    }
}

/// Lexically scoped control-flow context for the routine being visited.
///
/// Loops and switches both push onto `break_targets`, so the innermost
/// break target is always the top of that one stack regardless of how
/// loops and switches interleave.
#[derive(Debug, Default)]
pub struct ControlFlowContext {
    break_targets: Vec<NodeId>,
    continue_targets: Vec<NodeId>,
    switch_heads: Vec<NodeId>,
    labels: FxHashMap<String, NodeId>,
    pending_gotos: Vec<(NodeId, String)>,
}

impl ControlFlowContext {
    /// Enter a loop: break goes to `break_target`, continue to
    /// `continue_target`.
    pub fn push_loop(&mut self, break_target: NodeId, continue_target: NodeId) {
        self.break_targets.push(break_target);
        self.continue_targets.push(continue_target);
    }

    /// Leave the innermost loop.
    pub fn pop_loop(&mut self) {
        self.break_targets.pop();
        self.continue_targets.pop();
    }

    /// Enter a switch: break goes to `break_target`; cases attach to
    /// `switch_head`.
    pub fn push_switch(&mut self, break_target: NodeId, switch_head: NodeId) {
        self.break_targets.push(break_target);
        self.switch_heads.push(switch_head);
    }

    /// Leave the innermost switch.
    pub fn pop_switch(&mut self) {
        self.break_targets.pop();
        self.switch_heads.pop();
    }

    /// Innermost break target across loops and switches.
    pub fn break_target(&self) -> Option<NodeId> {
        self.break_targets.last().copied()
    }

    /// Innermost continue target.
    pub fn continue_target(&self) -> Option<NodeId> {
        self.continue_targets.last().copied()
    }

    /// Innermost switch head.
    pub fn switch_head(&self) -> Option<NodeId> {
        self.switch_heads.last().copied()
    }

    /// Register a label; returns pending goto nodes that referenced it
    /// forward.
    pub fn add_label(&mut self, name: &str, id: NodeId) -> Vec<NodeId> {
        self.labels.insert(name.to_string(), id);
        let mut resolved = Vec::new();
        self.pending_gotos.retain(|(goto_id, label)| {
            if label == name {
                resolved.push(*goto_id);
                false
            } else {
                true
            }
        });
        resolved
    }

    /// Register a goto; returns the label's node when already known,
    /// otherwise records a forward reference.
    pub fn add_goto(&mut self, label: &str, goto_id: NodeId) -> Option<NodeId> {
        match self.labels.get(label) {
            Some(target) => Some(*target),
            None => {
                self.pending_gotos.push((goto_id, label.to_string()));
                None
            }
        }
    }

    fn is_balanced(&self) -> bool {
        self.break_targets.is_empty()
            && self.continue_targets.is_empty()
            && self.switch_heads.is_empty()
    }

    fn reset(&mut self) {
        self.break_targets.clear();
        self.continue_targets.clear();
        self.switch_heads.clear();
        self.labels.clear();
        self.pending_gotos.clear();
    }
}

/// Entry and exit node of a finished routine, for call-edge wiring.
#[derive(Debug, Clone, Copy)]
pub struct RoutineRef {
    /// Index into the unit's routine list
    pub routine: usize,
    /// ENTRY node id
    pub entry: NodeId,
    /// EXIT node id
    pub exit: NodeId,
}

/// A call site awaiting pairing with its callee once the whole translation
/// unit has been visited.
#[derive(Debug, Clone)]
pub struct PendingCall {
    /// Index of the routine containing the call site
    pub routine: usize,
    /// Node the call occurs on
    pub call_node: NodeId,
    /// Synthetic point control returns to after the call, when the call
    /// sits on a linear node
    pub return_point: Option<NodeId>,
    /// Callee name as written at the call site
    pub callee: String,
}

/// Everything one traversal of a translation unit produced, handed to the
/// post-processor.
pub struct TranslationUnit {
    /// Routine graphs in source order
    pub routines: Vec<Cfg>,
    /// Routine name -> entry/exit, for call wiring
    pub functions: FxHashMap<String, RoutineRef>,
    /// Call sites to pair with callees
    pub call_returns: Vec<PendingCall>,
    /// Structural warnings accumulated during visitation
    pub warnings: Vec<String>,
}

/// Drives a depth-first walk of the parse tree, dispatching each node to
/// the active language visitor and owning all shared construction state.
pub struct CfgVisitor<'src> {
    source: &'src [u8],
    lang: &'static dyn LanguageCfg,
    next_id: usize,
    routines: Vec<Cfg>,
    current: Cfg,
    /// Scoping context; one routine's lifetime
    pub ctx: ControlFlowContext,
    functions: FxHashMap<String, RoutineRef>,
    call_returns: Vec<PendingCall>,
    warnings: Vec<String>,
    current_exit: Option<NodeId>,
}

impl<'src> CfgVisitor<'src> {
    /// Create a visitor for one translation unit.
    pub fn new(source: &'src [u8], lang: &'static dyn LanguageCfg) -> Self {
        Self {
            source,
            lang,
            next_id: 0,
            routines: Vec::new(),
            current: Cfg::default(),
            ctx: ControlFlowContext::default(),
            functions: FxHashMap::default(),
            call_returns: Vec::new(),
            warnings: Vec::new(),
            current_exit: None,
        }
    }

    /// The source bytes being analyzed.
    #[inline]
    pub fn source(&self) -> &'src [u8] {
        self.source
    }

    /// Verbatim text of an AST node.
    #[inline]
    pub fn text(&self, node: Node) -> String {
        ast::node_text_owned(node, self.source)
    }

    /// Record a structural warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(warning = %message, "structural warning");
        self.warnings.push(message);
    }

    /// Allocate a synthetic node in the current routine.
    pub fn new_node(
        &mut self,
        kind: NodeKind,
        source_text: impl Into<String>,
        span: Option<(usize, usize)>,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.current
            .insert_node(CfgNode::new(id, kind, source_text.into(), span));
        id
    }

    /// Allocate a node backed by an AST node (text and span taken from it).
    pub fn new_ast_node(&mut self, kind: NodeKind, node: Node) -> NodeId {
        let text = self.text(node);
        self.new_node(kind, text, Some(ast::span(node)))
    }

    /// Add an intra-routine edge.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, label: Option<&str>) {
        self.current.add_edge(from, to, label);
    }

    /// Connect every open exit of `frag` to `to`.
    pub fn connect_exits(&mut self, frag: &Fragment, to: NodeId) {
        for exit in &frag.exits {
            self.current.add_edge(*exit, to, None);
        }
    }

    /// EXIT node of the routine being visited.
    pub fn routine_exit(&self) -> Option<NodeId> {
        self.current_exit
    }

    /// Mutable access to a node's metadata, for handlers that record
    /// synthetic defs (e.g. a for-each loop variable on its header).
    pub fn node_metadata_mut(&mut self, id: NodeId) -> Option<&mut NodeMetadata> {
        self.current.node_mut(id).map(|n| &mut n.metadata)
    }

    /// Visit one AST node, dispatching by kind.
    ///
    /// Returns `None` for nodes that contribute nothing to the graph
    /// (anonymous tokens, comments). Unrecognized kinds fall back to the
    /// default fragment.
    pub fn visit(&mut self, node: Node) -> Option<Fragment> {
        let lang = self.lang;
        if !node.is_named() || lang.is_comment(node.kind()) {
            return None;
        }
        match lang.visit(self, node) {
            Some(fragment) => Some(fragment),
            None => Some(self.default_fragment(node)),
        }
    }

    /// Default handler for unrecognized kinds: a single STATEMENT spanning
    /// the node, metadata from the language's identifier scanner.
    fn default_fragment(&mut self, node: Node) -> Fragment {
        let kind = node.kind();
        if !kind.ends_with("_statement") && !kind.ends_with("declaration") {
            self.warn(format!("no handler for AST kind '{}'", kind));
        }
        self.linear_statement(NodeKind::Statement, node)
    }

    /// Visit the named children of `node` in order, chaining each child's
    /// exits to the next child's entry.
    ///
    /// A child with no exits leaves the following children disconnected,
    /// which is how code after a jump ends up unreachable. An empty
    /// sequence yields a placeholder the post-processor compacts away.
    pub fn visit_sequence(&mut self, node: Node) -> Fragment {
        let mut entry: Option<NodeId> = None;
        let mut exits: Vec<NodeId> = Vec::new();

        for child in ast::named_children(node) {
            let Some(frag) = self.visit(child) else {
                continue;
            };
            match entry {
                None => entry = Some(frag.entry),
                Some(_) => {
                    for exit in &exits {
                        self.current.add_edge(*exit, frag.entry, None);
                    }
                }
            }
            exits = frag.exits;
        }

        match entry {
            Some(entry) => Fragment { entry, exits },
            None => {
                let id = self.new_node(NodeKind::Placeholder, "empty block", None);
                Fragment::single(id)
            }
        }
    }

    /// Create a linear node for `ast_node`, scan its identifiers, and emit
    /// call touch-points.
    ///
    /// When the statement contains calls, a placeholder "return point" is
    /// chained directly after it and each call is recorded for later
    /// pairing with its callee.
    pub fn linear_statement(&mut self, kind: NodeKind, ast_node: Node) -> Fragment {
        let id = self.new_ast_node(kind, ast_node);
        let meta = self.lang.scan_metadata(ast_node, self.source);
        let has_calls = !meta.function_calls.is_empty();
        if let Some(node) = self.current.node_mut(id) {
            node.metadata = meta;
        }
        if !has_calls {
            return Fragment::single(id);
        }

        let return_point = self.new_node(NodeKind::Placeholder, "", None);
        self.add_edge(id, return_point, None);
        self.record_calls(id, Some(return_point));
        Fragment {
            entry: id,
            exits: vec![return_point],
        }
    }

    /// Create a branch-kind node (CONDITION/LOOP_HEADER/SWITCH_HEAD) for an
    /// expression, scanning identifiers but emitting no return point: a
    /// labeled branch node has no single point control returns to.
    pub fn branch_node(&mut self, kind: NodeKind, ast_node: Node) -> NodeId {
        let id = self.new_ast_node(kind, ast_node);
        let meta = self.lang.scan_metadata(ast_node, self.source);
        if let Some(node) = self.current.node_mut(id) {
            node.metadata = meta;
        }
        self.record_calls(id, None);
        id
    }

    fn record_calls(&mut self, call_node: NodeId, return_point: Option<NodeId>) {
        let callees: Vec<String> = self
            .current
            .node(call_node)
            .map(|n| n.metadata.function_calls.clone())
            .unwrap_or_default();
        for callee in callees {
            self.call_returns.push(PendingCall {
                routine: self.routines.len(),
                call_node,
                return_point,
                callee,
            });
        }
    }

    /// Build the ENTRY/EXIT pair and top-level fragment for one routine,
    /// then finalize it.
    ///
    /// `name_node` and `closing_node` supply spans for the synthetic entry
    /// and exit; `body` is the routine body, absent for declarations
    /// without one (those become a bare ENTRY->EXIT graph).
    pub fn visit_routine(
        &mut self,
        name: Option<String>,
        parameters: Vec<String>,
        name_node: Option<Node>,
        closing_node: Option<Node>,
        body: Option<Node>,
    ) -> Fragment {
        if self.current_exit.is_some() {
            // A routine definition nested inside another routine's body
            // (GNU C nested functions). Not modeled; keep the outer graph
            // intact.
            self.warn(format!(
                "nested routine definition '{}' skipped",
                name.as_deref().unwrap_or("<anonymous>")
            ));
            let id = self.new_node(NodeKind::Placeholder, "nested routine", None);
            return Fragment::single(id);
        }
        self.current = Cfg::new(name.clone());
        self.current.parameters = parameters.clone();
        self.ctx.reset();

        let display = name.clone().unwrap_or_default();
        let entry = self.new_node(NodeKind::Entry, display.clone(), name_node.map(ast::span));
        if let Some(node) = self.current.node_mut(entry) {
            for param in &parameters {
                node.metadata.add_definition(param.clone());
            }
        }
        self.current.entry_node_ids.push(entry);

        let exit = self.new_node(NodeKind::Exit, display, closing_node.map(ast::span));
        self.current.exit_node_ids.push(exit);
        self.current_exit = Some(exit);

        match body.and_then(|b| self.visit(b)) {
            Some(frag) => {
                self.add_edge(entry, frag.entry, None);
                self.connect_exits(&frag, exit);
            }
            None => {
                self.add_edge(entry, exit, None);
            }
        }

        self.finalize_routine(&name, entry, exit);
        Fragment {
            entry,
            exits: vec![exit],
        }
    }

    fn finalize_routine(&mut self, name: &Option<String>, entry: NodeId, exit: NodeId) {
        // Forward gotos whose label never appeared.
        let unresolved: Vec<(NodeId, String)> = std::mem::take(&mut self.ctx.pending_gotos);
        for (goto_id, label) in unresolved {
            match self.ctx.labels.get(&label) {
                Some(target) => {
                    let target = *target;
                    self.add_edge(goto_id, target, None);
                }
                None => {
                    self.warn(format!(
                        "unresolved goto label '{}' in routine '{}'",
                        label,
                        name.as_deref().unwrap_or("<anonymous>")
                    ));
                }
            }
        }

        if !self.ctx.is_balanced() {
            self.warn(format!(
                "control-flow context not balanced at end of routine '{}'",
                name.as_deref().unwrap_or("<anonymous>")
            ));
            self.ctx.reset();
        }

        if let Some(name) = name {
            self.functions.insert(
                name.clone(),
                RoutineRef {
                    routine: self.routines.len(),
                    entry,
                    exit,
                },
            );
        }

        self.current_exit = None;
        let finished = std::mem::take(&mut self.current);
        self.routines.push(finished);
    }

    /// Hand off everything built so far to the post-processor.
    pub fn finish(self) -> TranslationUnit {
        TranslationUnit {
            routines: self.routines,
            functions: self.functions,
            call_returns: self.call_returns,
            warnings: self.warnings,
        }
    }
}
