//! Natural-loop detection from dominance-identified back edges.
//!
//! A back edge is an edge whose target dominates its source; the natural
//! loop of that edge is the target (the header) plus every block that can
//! reach the source without passing through the header. Loops sharing a
//! header are merged, and the detected loops are arranged into a nesting
//! forest.
//!
//! ```text
//!     [preheader]          single non-loop predecessor, when one exists
//!          |
//!          v
//!     [header] <------+    dominates every block in the body
//!          |          |
//!          v          |
//!     [body ...]      |
//!          |          |
//!          v          |
//!     [latch] --------+    back edge source
//!          |
//!          v
//!     [exit ...]           outside the body, reached from inside
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::analysis::dominance::{DominancePhase, DominatorTree};
use crate::cfg::{BlockId, ControlFlowGraph};
use crate::phase::{AnalysisDep, AnalysisInfoHook, Phase, PhaseId};

/// Shape classification of a detected loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// Exit tested at the header before the body runs (`while`).
    PreTested,
    /// Exit tested at the latch after the body runs (`do-while`).
    PostTested,
    /// No exit edge leaves the body.
    Infinite,
    /// Multiple latches or mixed exit placement.
    Complex,
}

/// One edge leaving a loop body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopExit {
    /// The block inside the loop that branches out.
    pub exiting_block: BlockId,
    /// The target outside the loop.
    pub exit_block: BlockId,
}

/// One natural loop: its header, body, and structural classification.
#[derive(Debug, Clone)]
pub struct NaturalLoop {
    /// Single entry point; dominates every body block.
    pub header: BlockId,
    /// All blocks in the loop, header included.
    pub body: BTreeSet<BlockId>,
    /// Back edge sources, in detection order.
    pub latches: Vec<BlockId>,
    /// The single non-loop predecessor of the header, when exactly one
    /// exists.
    pub preheader: Option<BlockId>,
    /// Edges leaving the body, ordered by exiting block.
    pub exits: Vec<LoopExit>,
    /// Nesting depth; 0 for outermost loops.
    pub depth: usize,
    /// Header of the innermost enclosing loop, if nested.
    pub parent: Option<BlockId>,
    /// Headers of immediately nested loops.
    pub children: Vec<BlockId>,
    /// Shape classification.
    pub kind: LoopKind,
}

impl NaturalLoop {
    fn new(header: BlockId) -> Self {
        let mut body = BTreeSet::new();
        body.insert(header);
        NaturalLoop {
            header,
            body,
            latches: Vec::new(),
            preheader: None,
            exits: Vec::new(),
            depth: 0,
            parent: None,
            children: Vec::new(),
            kind: LoopKind::Complex,
        }
    }

    /// Returns `true` if `block` belongs to this loop.
    #[must_use]
    pub fn contains(&self, block: BlockId) -> bool {
        self.body.contains(&block)
    }

    /// Returns the number of blocks in the body.
    #[must_use]
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Returns the single latch when the loop has exactly one.
    #[must_use]
    pub fn single_latch(&self) -> Option<BlockId> {
        match self.latches.as_slice() {
            [latch] => Some(*latch),
            _ => None,
        }
    }

    /// Returns `true` for a loop with a preheader and a single latch.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.preheader.is_some() && self.latches.len() == 1
    }

    /// Returns `true` if no other loop nests inside this one.
    #[must_use]
    pub fn is_innermost(&self) -> bool {
        self.children.is_empty()
    }
}

/// All natural loops of one function, with innermost-loop lookup by block.
///
/// Function phases normally obtain this from the scheduler as the cached
/// result of the `loops` phase. Loops are ordered by header id, so
/// iteration is deterministic for a given graph.
#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    loops: Vec<NaturalLoop>,
    /// Innermost loop index per block slot.
    block_to_loop: Vec<Option<usize>>,
}

impl LoopForest {
    /// Detects the natural loops of `cfg` using its dominator tree.
    ///
    /// Back edges out of unreachable blocks are ignored; the dominator
    /// tree does not cover them and they cannot execute.
    #[must_use]
    pub fn detect(cfg: &ControlFlowGraph, tree: &DominatorTree) -> Self {
        let mut by_header: BTreeMap<BlockId, NaturalLoop> = BTreeMap::new();

        for bb in cfg.body_blocks() {
            if !tree.is_reachable(bb.id()) {
                continue;
            }
            for &succ in bb.succs() {
                if tree.dominates(succ, bb.id()) {
                    let natural = by_header
                        .entry(succ)
                        .or_insert_with(|| NaturalLoop::new(succ));
                    natural.latches.push(bb.id());
                    expand_body(cfg, natural, bb.id());
                }
            }
        }

        let mut loops: Vec<NaturalLoop> = by_header.into_values().collect();
        for natural in &mut loops {
            find_preheader(cfg, natural);
            find_exits(cfg, natural);
            natural.kind = classify(natural);
        }
        link_nesting(&mut loops);

        let mut block_to_loop = vec![None; cfg.slot_count()];
        for (index, natural) in loops.iter().enumerate() {
            for &block in &natural.body {
                let slot = &mut block_to_loop[block.index()];
                let deeper = slot
                    .map_or(true, |current: usize| loops[current].depth < natural.depth);
                if deeper {
                    *slot = Some(index);
                }
            }
        }

        LoopForest {
            loops,
            block_to_loop,
        }
    }

    /// Returns all loops, ordered by header id.
    #[must_use]
    pub fn loops(&self) -> &[NaturalLoop] {
        &self.loops
    }

    /// Returns the number of loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns `true` if the function has no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Returns the innermost loop containing `block`.
    #[must_use]
    pub fn innermost(&self, block: BlockId) -> Option<&NaturalLoop> {
        self.block_to_loop
            .get(block.index())
            .copied()
            .flatten()
            .map(|index| &self.loops[index])
    }

    /// Returns the loop headed by `header`.
    #[must_use]
    pub fn at_header(&self, header: BlockId) -> Option<&NaturalLoop> {
        self.loops
            .iter()
            .find(|natural| natural.header == header)
    }

    /// Returns the nesting count of `block`: 0 outside any loop, 1 in an
    /// outermost body, and so on inward.
    #[must_use]
    pub fn loop_depth(&self, block: BlockId) -> usize {
        self.innermost(block).map_or(0, |natural| natural.depth + 1)
    }

    /// Returns `true` if `block` is inside any loop.
    #[must_use]
    pub fn is_in_loop(&self, block: BlockId) -> bool {
        self.innermost(block).is_some()
    }
}

/// Grows the body with every block that reaches `latch` without passing
/// through the header.
fn expand_body(cfg: &ControlFlowGraph, natural: &mut NaturalLoop, latch: BlockId) {
    if natural.body.contains(&latch) {
        return;
    }
    let mut worklist = vec![latch];
    while let Some(block) = worklist.pop() {
        if !natural.body.insert(block) {
            continue;
        }
        let Some(bb) = cfg.block(block) else { continue };
        for &pred in bb.preds() {
            if pred != natural.header && !natural.body.contains(&pred) {
                worklist.push(pred);
            }
        }
    }
}

/// The preheader is the header's single predecessor outside the body.
fn find_preheader(cfg: &ControlFlowGraph, natural: &mut NaturalLoop) {
    let Some(header) = cfg.block(natural.header) else {
        return;
    };
    let mut outside = header
        .preds()
        .iter()
        .copied()
        .filter(|pred| !natural.body.contains(pred));
    let preheader = match (outside.next(), outside.next()) {
        (Some(pred), None) => Some(pred),
        _ => None,
    };
    natural.preheader = preheader;
}

fn find_exits(cfg: &ControlFlowGraph, natural: &mut NaturalLoop) {
    natural.exits.clear();
    for &block in &natural.body {
        let Some(bb) = cfg.block(block) else { continue };
        for &succ in bb.succs() {
            if !natural.body.contains(&succ) {
                natural.exits.push(LoopExit {
                    exiting_block: block,
                    exit_block: succ,
                });
            }
        }
    }
}

fn classify(natural: &NaturalLoop) -> LoopKind {
    if natural.exits.is_empty() {
        return LoopKind::Infinite;
    }
    if natural.latches.len() > 1 {
        return LoopKind::Complex;
    }
    if let Some(latch) = natural.single_latch() {
        let from_latch = natural
            .exits
            .iter()
            .filter(|exit| exit.exiting_block == latch)
            .count();
        if from_latch == natural.exits.len() {
            return LoopKind::PostTested;
        }
    }
    let from_header = natural
        .exits
        .iter()
        .filter(|exit| exit.exiting_block == natural.header)
        .count();
    if from_header == natural.exits.len() {
        return LoopKind::PreTested;
    }
    LoopKind::Complex
}

/// Links parents, children, and depths. The parent of a loop is the
/// smallest other loop whose body contains its header.
fn link_nesting(loops: &mut [NaturalLoop]) {
    let count = loops.len();
    for i in 0..count {
        let header = loops[i].header;
        let parent = (0..count)
            .filter(|&j| j != i && loops[j].body.contains(&header))
            .min_by_key(|&j| loops[j].size());
        loops[i].parent = parent.map(|j| loops[j].header);
    }
    for i in 0..count {
        if let Some(parent_header) = loops[i].parent {
            let header = loops[i].header;
            if let Some(parent) = loops.iter_mut().find(|l| l.header == parent_header) {
                parent.children.push(header);
            }
        }
    }
    for i in 0..count {
        let mut depth = 0;
        let mut current = loops[i].parent;
        while let Some(header) = current {
            depth += 1;
            current = loops
                .iter()
                .find(|l| l.header == header)
                .and_then(|l| l.parent);
        }
        loops[i].depth = depth;
    }
}

/// The `loops` analysis phase: detects natural loops using the cached
/// `dominance` result and stores the [`LoopForest`].
#[derive(Debug, Default)]
pub struct LoopsPhase {
    forest: Option<LoopForest>,
}

impl LoopsPhase {
    /// Registry id of this phase.
    pub const ID: PhaseId = PhaseId::new(2);
    /// Registry name of this phase.
    pub const NAME: &'static str = "loops";

    /// Creates the phase in its not-yet-run state.
    #[must_use]
    pub fn new() -> Self {
        LoopsPhase::default()
    }
}

impl Phase<ControlFlowGraph> for LoopsPhase {
    fn declare_dependencies(&self, dep: &mut AnalysisDep) {
        dep.add_required(DominancePhase::ID);
    }

    fn run(
        &mut self,
        unit: &mut ControlFlowGraph,
        hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
    ) -> bool {
        let tree = hook.expect_result::<DominatorTree>(unit.unit_id(), DominancePhase::ID);
        self.forest = Some(LoopForest::detect(unit, tree));
        false
    }

    fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
        self.forest
            .map(|forest| Box::new(forest) as Box<dyn Any + Send + Sync>)
    }
}
