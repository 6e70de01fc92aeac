//! Dominator tree computation over the per-function control-flow graph.
//!
//! A block `d` dominates a block `b` when every path from an entry to `b`
//! passes through `d`. The tree of immediate dominators underpins loop
//! detection and most forward dataflow placement decisions.
//!
//! The computation roots at the common-entry sentinel so functions with
//! several entries (subroutine resumption points) still get a single tree:
//! the sentinel dominates everything, and blocks reachable from more than
//! one entry converge on it.

use std::any::Any;

use crate::cfg::{BlockId, ControlFlowGraph};
use crate::phase::{AnalysisInfoHook, Phase, PhaseId};

/// Immediate dominators and tree queries for one function.
///
/// Built with [`DominatorTree::compute`]; function phases normally obtain it
/// from the scheduler as the cached result of the `dominance` phase. Blocks
/// unreachable from every entry are outside the tree: they have no
/// immediate dominator and are dominated only by themselves.
///
/// # Examples
///
/// ```rust,ignore
/// let tree = DominatorTree::compute(&cfg);
/// let header = BlockId::new(2);
/// for &body in tree.children(header) {
///     assert!(tree.strictly_dominates(header, body));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The common-entry sentinel the tree is rooted at.
    root: BlockId,
    /// Immediate dominator per block slot. `None` for the root itself and
    /// for slots outside the tree (unreachable or deleted).
    idom: Vec<Option<BlockId>>,
    /// Dominator-tree children per block slot, in reverse postorder.
    children: Vec<Vec<BlockId>>,
    /// Reachable blocks in reverse postorder, root first.
    rpo: Vec<BlockId>,
}

impl DominatorTree {
    /// Computes the dominator tree of `cfg`.
    ///
    /// Runs the iterative two-finger algorithm over the reverse postorder:
    /// each round narrows every block's candidate dominator to the common
    /// ancestor of its processed predecessors, until nothing changes. The
    /// common-entry sentinel is treated as an extra predecessor of every
    /// entry block, which is the only place its one-sided adjacency enters
    /// the computation.
    #[must_use]
    pub fn compute(cfg: &ControlFlowGraph) -> Self {
        let slots = cfg.slot_count();
        let root = BlockId::COMMON_ENTRY;

        let (order, po_num) = postorder(cfg, root);
        let rpo: Vec<BlockId> = order.iter().rev().copied().collect();

        // Predecessor lists with the sentinel edge onto each entry block.
        let mut preds: Vec<Vec<BlockId>> = vec![Vec::new(); slots];
        for bb in cfg.body_blocks() {
            preds[bb.id().index()] = bb.preds().to_vec();
        }
        for &entry in cfg.entries() {
            preds[entry.index()].push(root);
        }

        // The root self-loop below keeps intersect walks terminating; it is
        // removed again once the fixpoint settles.
        let mut idom: Vec<Option<BlockId>> = vec![None; slots];
        idom[root.index()] = Some(root);
        let mut changed = true;
        while changed {
            changed = false;
            for &block in &rpo {
                if block == root {
                    continue;
                }
                let mut candidate: Option<BlockId> = None;
                for &pred in &preds[block.index()] {
                    if idom[pred.index()].is_none() {
                        continue;
                    }
                    candidate = Some(match candidate {
                        Some(current) => intersect(&po_num, &idom, current, pred),
                        None => pred,
                    });
                }
                if let Some(new_idom) = candidate {
                    if idom[block.index()] != Some(new_idom) {
                        idom[block.index()] = Some(new_idom);
                        changed = true;
                    }
                }
            }
        }
        idom[root.index()] = None;

        let mut children: Vec<Vec<BlockId>> = vec![Vec::new(); slots];
        for &block in &rpo {
            if let Some(parent) = idom[block.index()] {
                children[parent.index()].push(block);
            }
        }

        DominatorTree {
            root,
            idom,
            children,
            rpo,
        }
    }

    /// Returns the root of the tree, the common-entry sentinel.
    #[must_use]
    pub const fn root(&self) -> BlockId {
        self.root
    }

    /// Returns the immediate dominator of `block`, or `None` for the root
    /// and for blocks outside the tree.
    #[must_use]
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(block.index()).copied().flatten()
    }

    /// Returns `true` if `block` is reachable from some entry.
    #[must_use]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        block == self.root || self.immediate_dominator(block).is_some()
    }

    /// Returns whether `a` dominates `b`. Every block dominates itself.
    ///
    /// Walks the immediate-dominator chain of `b`, so the cost is the depth
    /// of `b` in the tree.
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let mut current = b;
        while let Some(idom) = self.immediate_dominator(current) {
            if idom == a {
                return true;
            }
            current = idom;
        }
        false
    }

    /// Returns whether `a` dominates `b` and `a != b`.
    #[must_use]
    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns the dominator-tree children of `block`.
    #[must_use]
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children
            .get(block.index())
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the depth of `block` below the root; the root has depth 0.
    /// Blocks outside the tree report depth 0 as well.
    #[must_use]
    pub fn depth(&self, block: BlockId) -> usize {
        let mut depth = 0;
        let mut current = block;
        while let Some(idom) = self.immediate_dominator(current) {
            depth += 1;
            current = idom;
        }
        depth
    }

    /// Returns an iterator over the dominators of `block`, from the block
    /// itself up to and including the root.
    pub fn dominators(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        let mut current = Some(block);
        std::iter::from_fn(move || {
            let block = current?;
            current = self.immediate_dominator(block);
            Some(block)
        })
    }

    /// Returns the reachable blocks in reverse postorder, root first.
    #[must_use]
    pub fn reverse_postorder(&self) -> &[BlockId] {
        &self.rpo
    }
}

/// Depth-first postorder from `root`, following the sentinel's entry list
/// out of the root and ordinary successor lists everywhere else.
fn postorder(cfg: &ControlFlowGraph, root: BlockId) -> (Vec<BlockId>, Vec<usize>) {
    let slots = cfg.slot_count();
    let succs_of = |block: BlockId| -> &[BlockId] {
        if block == root {
            cfg.entries()
        } else {
            cfg.block(block).map_or(&[], |bb| bb.succs())
        }
    };

    let mut visited = vec![false; slots];
    let mut order = Vec::new();
    let mut stack: Vec<(BlockId, usize)> = vec![(root, 0)];
    visited[root.index()] = true;
    while let Some((block, cursor)) = stack.last_mut() {
        if let Some(&next) = succs_of(*block).get(*cursor) {
            *cursor += 1;
            if !visited[next.index()] {
                visited[next.index()] = true;
                stack.push((next, 0));
            }
        } else {
            order.push(*block);
            stack.pop();
        }
    }

    let mut po_num = vec![usize::MAX; slots];
    for (i, &block) in order.iter().enumerate() {
        po_num[block.index()] = i;
    }
    (order, po_num)
}

/// Two-finger walk to the nearest common dominator candidate of `a` and `b`.
fn intersect(
    po_num: &[usize],
    idom: &[Option<BlockId>],
    mut a: BlockId,
    mut b: BlockId,
) -> BlockId {
    while a != b {
        while po_num[a.index()] < po_num[b.index()] {
            let Some(up) = idom[a.index()] else { return b };
            a = up;
        }
        while po_num[b.index()] < po_num[a.index()] {
            let Some(up) = idom[b.index()] else { return a };
            b = up;
        }
    }
    a
}

/// The `dominance` analysis phase: computes a [`DominatorTree`] for the
/// function and caches it for dependent phases.
#[derive(Debug, Default)]
pub struct DominancePhase {
    tree: Option<DominatorTree>,
}

impl DominancePhase {
    /// Registry id of this phase.
    pub const ID: PhaseId = PhaseId::new(1);
    /// Registry name of this phase.
    pub const NAME: &'static str = "dominance";

    /// Creates the phase in its not-yet-run state.
    #[must_use]
    pub fn new() -> Self {
        DominancePhase::default()
    }
}

impl Phase<ControlFlowGraph> for DominancePhase {
    fn run(
        &mut self,
        unit: &mut ControlFlowGraph,
        _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
    ) -> bool {
        self.tree = Some(DominatorTree::compute(unit));
        false
    }

    fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
        self.tree
            .map(|tree| Box::new(tree) as Box<dyn Any + Send + Sync>)
    }
}
