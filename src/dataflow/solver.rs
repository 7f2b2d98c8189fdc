//! Generic monotone forward dataflow solver.
//!
//! Problems are phrased in GEN/KILL form over a finite fact universe that
//! is enumerated up front. Per-node IN/OUT sets are dense bit-sets indexed
//! into that universe, so the meet (set union) and transfer are word-wise
//! operations regardless of how many facts a routine produces.
//!
//! # Dataflow equations (forward, may-analysis)
//!
//! - `IN[n]  = ⋃ OUT[p]` over the intra-routine predecessors of `n`
//! - `OUT[n] = GEN[n] ∪ (IN[n] ∖ KILL[n])`
//!
//! Termination: the lattice (subsets of the finite universe) is finite and
//! the transfer function is monotone.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::hash::Hash;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::cfg::types::{Cfg, CfgNode, NodeId, LABEL_FUNCTION_CALL, LABEL_FUNCTION_RETURN};

// =============================================================================
// BitSet
// =============================================================================

/// A dense bit set over `0..capacity`.
///
/// Backed by a `Vec<u64>`; union and difference are O(capacity/64).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
    bits: Vec<u64>,
    capacity: usize,
}

impl BitSet {
    /// Create an empty set able to hold `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: vec![0; capacity.div_ceil(64)],
            capacity,
        }
    }

    /// Insert an element. Returns true if it was not already present.
    #[inline]
    pub fn insert(&mut self, elem: usize) -> bool {
        if elem >= self.capacity {
            return false;
        }
        let mask = 1u64 << (elem % 64);
        let word = &mut self.bits[elem / 64];
        let was_present = *word & mask != 0;
        *word |= mask;
        !was_present
    }

    /// Check membership.
    #[inline]
    pub fn contains(&self, elem: usize) -> bool {
        elem < self.capacity && self.bits[elem / 64] & (1u64 << (elem % 64)) != 0
    }

    /// Union: `self = self ∪ other`.
    #[inline]
    pub fn union_with(&mut self, other: &BitSet) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= *b;
        }
    }

    /// Difference: `self = self ∖ other`.
    #[inline]
    pub fn difference_with(&mut self, other: &BitSet) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a &= !*b;
        }
    }

    /// Whether the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the elements in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let capacity = self.capacity;
        self.bits.iter().enumerate().flat_map(move |(word_idx, &word)| {
            (0..64).filter_map(move |bit_idx| {
                if word & (1u64 << bit_idx) != 0 {
                    let elem = word_idx * 64 + bit_idx;
                    (elem < capacity).then_some(elem)
                } else {
                    None
                }
            })
        })
    }
}

// =============================================================================
// Fact indexing
// =============================================================================

/// Bijection between facts and dense indices.
#[derive(Debug, Clone)]
pub struct FactIndex<F> {
    facts: Vec<F>,
    by_fact: FxHashMap<F, usize>,
}

impl<F: Clone + Eq + Hash> FactIndex<F> {
    /// Build an index from a fact list, deduplicating while preserving
    /// first-seen order.
    pub fn new(universe: Vec<F>) -> Self {
        let mut facts = Vec::with_capacity(universe.len());
        let mut by_fact = FxHashMap::default();
        for fact in universe {
            if !by_fact.contains_key(&fact) {
                by_fact.insert(fact.clone(), facts.len());
                facts.push(fact);
            }
        }
        Self { facts, by_fact }
    }

    /// Number of distinct facts.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Whether the universe is empty.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Dense index of a fact.
    pub fn index_of(&self, fact: &F) -> Option<usize> {
        self.by_fact.get(fact).copied()
    }

    /// Fact at a dense index.
    pub fn fact(&self, index: usize) -> Option<&F> {
        self.facts.get(index)
    }

    /// All facts, in index order.
    pub fn facts(&self) -> &[F] {
        &self.facts
    }

    /// An empty bit-set sized for this universe.
    pub fn empty_set(&self) -> BitSet {
        BitSet::with_capacity(self.facts.len())
    }
}

// =============================================================================
// Problem definition and solver
// =============================================================================

/// A forward may-analysis in GEN/KILL form.
pub trait GenKillProblem {
    /// The fact type; `(variable, defining node)` for reaching definitions.
    type Fact: Clone + Eq + Hash;

    /// Enumerate every fact the routine can produce.
    fn universe(&self, cfg: &Cfg) -> Vec<Self::Fact>;

    /// Facts generated at a node.
    fn gen(&self, node: &CfgNode, index: &FactIndex<Self::Fact>) -> BitSet;

    /// Facts invalidated at a node.
    fn kill(&self, node: &CfgNode, index: &FactIndex<Self::Fact>) -> BitSet;

    /// Facts live on entry to the routine (OUT of the boundary), usually
    /// empty.
    fn boundary(&self, _cfg: &Cfg, index: &FactIndex<Self::Fact>) -> BitSet {
        index.empty_set()
    }
}

/// Converged IN/OUT sets for one routine.
#[derive(Debug, Clone)]
pub struct DataflowResult<F> {
    /// The fact universe the bit-sets index into
    pub index: FactIndex<F>,
    /// Facts reaching each node's entry
    pub in_facts: BTreeMap<NodeId, BitSet>,
    /// Facts leaving each node
    pub out_facts: BTreeMap<NodeId, BitSet>,
    /// Worklist iterations until the fixpoint
    pub iterations: usize,
}

impl<F: Clone + Eq + Hash> DataflowResult<F> {
    /// Facts reaching the entry of `node`, resolved through the index.
    pub fn facts_in(&self, node: NodeId) -> Vec<&F> {
        self.in_facts
            .get(&node)
            .map(|set| set.iter().filter_map(|i| self.index.fact(i)).collect())
            .unwrap_or_default()
    }
}

/// The two call-wiring labels; edges carrying them stay invisible to the
/// solver so the fact universe remains intra-procedural.
fn is_call_edge(label: Option<&str>) -> bool {
    matches!(label, Some(LABEL_FUNCTION_CALL) | Some(LABEL_FUNCTION_RETURN))
}

fn dataflow_predecessors(cfg: &Cfg, node: &CfgNode) -> Vec<NodeId> {
    node.predecessors
        .iter()
        .filter(|p| {
            cfg.node(**p)
                .map(|pred| !is_call_edge(pred.edge_label(node.id)))
                .unwrap_or(false)
        })
        .copied()
        .collect()
}

fn dataflow_successors(cfg: &Cfg, node: &CfgNode) -> Vec<NodeId> {
    node.successors
        .iter()
        .filter(|s| cfg.nodes.contains_key(s) && !is_call_edge(node.edge_label(**s)))
        .copied()
        .collect()
}

/// Solve a forward GEN/KILL problem over one routine with a FIFO worklist.
pub fn solve_forward<P: GenKillProblem>(cfg: &Cfg, problem: &P) -> DataflowResult<P::Fact> {
    let index = FactIndex::new(problem.universe(cfg));

    let mut gen_sets: BTreeMap<NodeId, BitSet> = BTreeMap::new();
    let mut kill_sets: BTreeMap<NodeId, BitSet> = BTreeMap::new();
    let mut in_facts: BTreeMap<NodeId, BitSet> = BTreeMap::new();
    let mut out_facts: BTreeMap<NodeId, BitSet> = BTreeMap::new();

    for (id, node) in &cfg.nodes {
        gen_sets.insert(*id, problem.gen(node, &index));
        kill_sets.insert(*id, problem.kill(node, &index));
        in_facts.insert(*id, index.empty_set());
        out_facts.insert(*id, index.empty_set());
    }
    // Boundary facts behave like facts generated at the entry, so they
    // survive every recomputation of the entry's OUT set.
    if let Some(entry) = cfg.entry() {
        let boundary = problem.boundary(cfg, &index);
        if let Some(gen) = gen_sets.get_mut(&entry) {
            gen.union_with(&boundary);
        }
        out_facts.insert(entry, boundary);
    }

    let mut worklist: VecDeque<NodeId> = cfg.nodes.keys().copied().collect();
    let mut queued: std::collections::BTreeSet<NodeId> = worklist.iter().copied().collect();
    let mut iterations = 0usize;

    while let Some(id) = worklist.pop_front() {
        queued.remove(&id);
        iterations += 1;
        let Some(node) = cfg.node(id) else { continue };

        let mut incoming = index.empty_set();
        for pred in dataflow_predecessors(cfg, node) {
            if let Some(out) = out_facts.get(&pred) {
                incoming.union_with(out);
            }
        }

        // OUT = GEN ∪ (IN ∖ KILL)
        let mut outgoing = incoming.clone();
        if let Some(kill) = kill_sets.get(&id) {
            outgoing.difference_with(kill);
        }
        if let Some(gen) = gen_sets.get(&id) {
            outgoing.union_with(gen);
        }

        in_facts.insert(id, incoming);
        let changed = out_facts.get(&id) != Some(&outgoing);
        if changed {
            out_facts.insert(id, outgoing);
            for succ in dataflow_successors(cfg, node) {
                if queued.insert(succ) {
                    worklist.push_back(succ);
                }
            }
        }
    }

    debug!(
        routine = cfg.function_name.as_deref().unwrap_or("<anonymous>"),
        facts = index.len(),
        iterations,
        "dataflow converged"
    );

    DataflowResult {
        index,
        in_facts,
        out_facts,
        iterations,
    }
}
