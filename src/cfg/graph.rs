//! The per-function control-flow graph and its invariant-preserving mutators.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::cfg::block::{BasicBlock, BlockAttributes, BlockId, BlockKind};
use crate::cfg::build::CfgBuilder;
use crate::error::raise_fatal;
use crate::ir::{Function, LabelId, Stmt};
use crate::phase::UnitId;
use crate::Result;

/// Control-flow graph of one function.
///
/// Blocks live in a table indexed by [`BlockId`]; deleting a block nulls its
/// slot and the id is never reused, so ids handed out to analyses stay
/// stable. Slots 0 and 1 always hold the common-entry and common-exit
/// sentinels. Edges are id lists kept dual on both endpoints by the methods
/// here; the sentinels are adjacent to the graph only through their own
/// lists ([`ControlFlowGraph::add_entry`] and [`ControlFlowGraph::add_exit`]),
/// never through an ordinary block's.
///
/// The graph is created once when optimization of a function begins, mutated
/// in place by every transform, and discarded when the function is done.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    func_name: String,
    unit: UnitId,
    blocks: Vec<Option<BasicBlock>>,
    label_to_block: HashMap<LabelId, BlockId>,
    /// Maps every block inside a try region to the region's handler labels.
    try_handlers: HashMap<BlockId, Vec<LabelId>>,
    /// Maps each region-closing block back to the block that opened the
    /// region.
    end_try_to_start: HashMap<BlockId, BlockId>,
}

impl ControlFlowGraph {
    /// Creates a graph holding only the two sentinels.
    pub(crate) fn empty(func_name: impl Into<String>, unit: UnitId) -> Self {
        let mut common_entry = BasicBlock::new(BlockId::COMMON_ENTRY);
        common_entry.set_attribute(BlockAttributes::ENTRY);
        let mut common_exit = BasicBlock::new(BlockId::COMMON_EXIT);
        common_exit.set_attribute(BlockAttributes::EXIT);
        ControlFlowGraph {
            func_name: func_name.into(),
            unit,
            blocks: vec![Some(common_entry), Some(common_exit)],
            label_to_block: HashMap::new(),
            try_handlers: HashMap::new(),
            end_try_to_start: HashMap::new(),
        }
    }

    /// Builds the graph of `function` from its statement list.
    ///
    /// Blocks are formed at labels and after terminators, classified by
    /// their last statement, and wired according to branch targets and
    /// exception regions. Ill-formed input, such as a branch to a label no
    /// statement defines or a try region that never closes, is reported as
    /// [`crate::Error::Malformed`].
    pub fn build(function: &Function) -> Result<Self> {
        CfgBuilder::new(function).build()
    }

    /// Returns the name of the function this graph belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.func_name
    }

    /// Returns the scheduler unit id of the owning function.
    #[must_use]
    pub const fn unit_id(&self) -> UnitId {
        self.unit
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Returns the block with the given id, or `None` for a deleted slot or
    /// an out-of-range id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns the block with the given id mutably.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Returns the common-entry sentinel.
    #[must_use]
    pub fn common_entry(&self) -> &BasicBlock {
        self.expect_block(BlockId::COMMON_ENTRY)
    }

    /// Returns the common-exit sentinel.
    #[must_use]
    pub fn common_exit(&self) -> &BasicBlock {
        self.expect_block(BlockId::COMMON_EXIT)
    }

    /// Returns the ids of the function's entry blocks, in registration
    /// order.
    #[must_use]
    pub fn entries(&self) -> &[BlockId] {
        self.common_entry().succs()
    }

    /// Returns the ids of the function's exit blocks, in registration
    /// order.
    #[must_use]
    pub fn exits(&self) -> &[BlockId] {
        self.common_exit().preds()
    }

    /// Returns the first live block after the sentinels, in id order.
    #[must_use]
    pub fn first_block(&self) -> Option<&BasicBlock> {
        self.blocks.iter().skip(BlockId::FIRST.index()).flatten().next()
    }

    /// Iterates every live block in id order, sentinels included.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().flatten()
    }

    /// Iterates the live non-sentinel blocks in id order.
    pub fn body_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().skip(BlockId::FIRST.index()).flatten()
    }

    /// Returns the number of live blocks, sentinels included.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.iter().flatten().count()
    }

    /// Returns the size of the block table, deleted slots included.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.blocks.len()
    }

    /// Resolves a label to the block carrying it.
    #[must_use]
    pub fn label_block(&self, label: LabelId) -> Option<BlockId> {
        self.label_to_block.get(&label).copied()
    }

    /// Returns the handler labels protecting `bb`, if it lies inside a try
    /// region.
    #[must_use]
    pub fn handlers_of(&self, bb: BlockId) -> Option<&[LabelId]> {
        self.try_handlers.get(&bb).map(Vec::as_slice)
    }

    /// Returns the block that opened the region `end` closes.
    #[must_use]
    pub fn try_start_of(&self, end: BlockId) -> Option<BlockId> {
        self.end_try_to_start.get(&end).copied()
    }

    /// Returns `true` if `bb` opens a try region: it carries the try
    /// attribute, does not close a region, and its first statement is the
    /// region header.
    #[must_use]
    pub fn is_try_start(&self, bb: BlockId) -> bool {
        let Some(block) = self.block(bb) else {
            return false;
        };
        if !block.has_attribute(BlockAttributes::TRY)
            || block.has_attribute(BlockAttributes::TRY_END)
        {
            return false;
        }
        matches!(block.first_stmt(), Some(Stmt::Try { .. }))
    }

    /// Returns `true` if `bb` is registered with the common-exit sentinel.
    #[must_use]
    pub fn is_exit(&self, bb: BlockId) -> bool {
        self.common_exit().find_pred(bb).is_some()
    }

    pub(crate) fn set_label_block(&mut self, label: LabelId, bb: BlockId) {
        self.label_to_block.insert(label, bb);
    }

    pub(crate) fn set_try_handlers(&mut self, bb: BlockId, handlers: Vec<LabelId>) {
        self.try_handlers.insert(bb, handlers);
    }

    pub(crate) fn set_end_try_start(&mut self, end: BlockId, start: BlockId) {
        self.end_try_to_start.insert(end, start);
    }

    pub(crate) fn remove_end_try_start(&mut self, end: BlockId) -> Option<BlockId> {
        self.end_try_to_start.remove(&end)
    }

    fn expect_block(&self, id: BlockId) -> &BasicBlock {
        match self.blocks.get(id.index()).and_then(Option::as_ref) {
            Some(bb) => bb,
            None => raise_fatal(&contract_error!(
                "{} is not a live block of `{}`",
                id,
                self.func_name
            )),
        }
    }

    fn expect_block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        match self.blocks.get_mut(id.index()) {
            Some(Some(bb)) => bb,
            _ => raise_fatal(&contract_error!(
                "{} is not a live block of `{}`",
                id,
                self.func_name
            )),
        }
    }

    fn check_not_sentinel(&self, id: BlockId) {
        if id.is_sentinel() {
            raise_fatal(&contract_error!(
                "sentinel {} may only gain edges through add_entry/add_exit in `{}`",
                id,
                self.func_name
            ));
        }
    }

    fn next_id(&self) -> BlockId {
        BlockId::new(u32::try_from(self.blocks.len()).unwrap_or(u32::MAX))
    }

    // ========================================================================
    // Edge mutation
    // ========================================================================

    /// Adds the edge `from -> to`, appending to both adjacency lists.
    ///
    /// Adding an edge that already exists, or one with a sentinel endpoint,
    /// is a contract violation and fatal.
    pub fn add_succ(&mut self, from: BlockId, to: BlockId) {
        let pos = self.expect_block(from).succ_count();
        self.add_succ_at(from, to, pos);
    }

    /// Adds the edge `from -> to` with the successor entry at position
    /// `pos`, for terminators whose successor order is meaningful.
    pub fn add_succ_at(&mut self, from: BlockId, to: BlockId, pos: usize) {
        self.check_not_sentinel(from);
        self.check_not_sentinel(to);
        if pos > self.expect_block(from).succ_count() {
            raise_fatal(&contract_error!(
                "successor position {} out of range for {} in `{}`",
                pos,
                from,
                self.func_name
            ));
        }
        self.check_edge_absent(from, to);
        self.expect_block_mut(from).insert_succ(pos, to, 0);
        self.expect_block_mut(to).push_pred(from);
    }

    /// Adds the edge `pred -> bb`, appending on both sides.
    pub fn add_pred(&mut self, bb: BlockId, pred: BlockId) {
        let pos = self.expect_block(bb).pred_count();
        self.add_pred_at(bb, pred, pos);
    }

    /// Adds the edge `pred -> bb` with the predecessor entry at position
    /// `pos`. Existing φ-nodes of `bb` gain a placeholder operand at the
    /// same position.
    pub fn add_pred_at(&mut self, bb: BlockId, pred: BlockId, pos: usize) {
        self.check_not_sentinel(bb);
        self.check_not_sentinel(pred);
        if pos > self.expect_block(bb).pred_count() {
            raise_fatal(&contract_error!(
                "predecessor position {} out of range for {} in `{}`",
                pos,
                bb,
                self.func_name
            ));
        }
        self.check_edge_absent(pred, bb);
        self.expect_block_mut(bb).insert_pred(pos, pred);
        self.expect_block_mut(pred).push_succ(bb, 0);
    }

    fn check_edge_absent(&self, from: BlockId, to: BlockId) {
        if self.expect_block(from).find_succ(to).is_some()
            || self.expect_block(to).find_pred(from).is_some()
        {
            raise_fatal(&contract_error!(
                "edge {} -> {} already exists in `{}`",
                from,
                to,
                self.func_name
            ));
        }
    }

    /// Removes the edge `from -> to` from both sides. Removing an absent
    /// edge is a no-op.
    ///
    /// With `update_phi`, `to` drops the φ operand contributed along the
    /// edge, and when its predecessor count reaches one or zero its φ-nodes
    /// are degraded: lowered to identity assignments at one predecessor,
    /// cleared at zero. Every SSA-based phase relies on this post-condition.
    pub fn remove_succ(&mut self, from: BlockId, to: BlockId, update_phi: bool) {
        self.remove_edge(from, to, update_phi);
    }

    /// Removes the edge `pred -> bb`; see [`ControlFlowGraph::remove_succ`].
    pub fn remove_pred(&mut self, bb: BlockId, pred: BlockId, update_phi: bool) {
        self.remove_edge(pred, bb, update_phi);
    }

    fn remove_edge(&mut self, from: BlockId, to: BlockId, update_phi: bool) -> bool {
        let Some(si) = self.expect_block(from).find_succ(to) else {
            return false;
        };
        self.expect_block_mut(from).remove_succ_at(si);
        if let Some(pi) = self.expect_block(to).find_pred(from) {
            self.expect_block_mut(to).remove_pred_at(pi, update_phi);
        }
        if update_phi {
            self.degrade_phis(to);
        }
        true
    }

    pub(crate) fn degrade_phis(&mut self, bb: BlockId) {
        let block = self.expect_block_mut(bb);
        match block.pred_count() {
            0 => block.clear_phis(),
            1 => block.convert_phis_to_identity_assigns(),
            _ => {}
        }
    }

    /// Re-points the edge `old_pred -> of` to come from `new_pred` instead.
    ///
    /// The predecessor slot of `of` is rewritten in place, so φ operand
    /// positions survive; the edge's tracked frequency moves with it.
    /// Returns `false` when `old_pred` is not a predecessor of `of`.
    pub fn replace_pred(&mut self, of: BlockId, old_pred: BlockId, new_pred: BlockId) -> bool {
        self.check_not_sentinel(of);
        self.check_not_sentinel(new_pred);
        let Some(i) = self.expect_block(of).find_pred(old_pred) else {
            return false;
        };
        let carried = match self.expect_block(old_pred).find_succ(of) {
            Some(j) => {
                let freq = self.expect_block(old_pred).edge_freq(j);
                self.expect_block_mut(old_pred).remove_succ_at(j);
                freq
            }
            None => 0,
        };
        self.expect_block_mut(new_pred).push_succ(of, carried);
        self.expect_block_mut(of).set_pred_at(i, new_pred);
        true
    }

    /// Re-points the edge `of -> old_succ` to lead to `new_succ` instead.
    ///
    /// The successor slot of `of` is rewritten in place, keeping its tracked
    /// frequency; `old_succ` loses the incoming edge with φ maintenance as
    /// in [`ControlFlowGraph::remove_succ`]. Returns `false` when `old_succ`
    /// is not a successor of `of`.
    pub fn replace_succ(&mut self, of: BlockId, old_succ: BlockId, new_succ: BlockId) -> bool {
        self.check_not_sentinel(of);
        self.check_not_sentinel(new_succ);
        let Some(i) = self.expect_block(of).find_succ(old_succ) else {
            return false;
        };
        if let Some(pi) = self.expect_block(old_succ).find_pred(of) {
            self.expect_block_mut(old_succ).remove_pred_at(pi, true);
            self.degrade_phis(old_succ);
        }
        self.expect_block_mut(new_succ).push_pred(of);
        self.expect_block_mut(of).set_succ_at(i, new_succ);
        true
    }

    /// Detaches every incoming edge of `bb`. Its φ-nodes are cleared.
    pub fn remove_all_pred(&mut self, bb: BlockId) {
        let preds: Vec<BlockId> = self.expect_block(bb).preds().to_vec();
        for p in preds {
            if let Some(j) = self.expect_block(p).find_succ(bb) {
                self.expect_block_mut(p).remove_succ_at(j);
            }
        }
        self.expect_block_mut(bb).clear_preds();
    }

    /// Detaches every outgoing edge of `bb`, with φ maintenance on each
    /// former successor when `update_phi` is set.
    pub fn remove_all_succ(&mut self, bb: BlockId, update_phi: bool) {
        let succs: Vec<BlockId> = self.expect_block(bb).succs().to_vec();
        for s in succs {
            self.remove_edge(bb, s, update_phi);
        }
    }

    // ========================================================================
    // Sentinel edges
    // ========================================================================

    /// Registers `bb` as a function entry with the common-entry sentinel.
    /// The registration is one-sided: `bb`'s own predecessor list is not
    /// touched. Registering an already registered block is a no-op.
    pub fn add_entry(&mut self, bb: BlockId) {
        self.check_not_sentinel(bb);
        let _ = self.expect_block(bb);
        let entry = self.expect_block_mut(BlockId::COMMON_ENTRY);
        if entry.find_succ(bb).is_none() {
            entry.push_succ(bb, 0);
        }
    }

    /// Unregisters `bb` from the common-entry sentinel.
    pub fn remove_entry(&mut self, bb: BlockId) {
        if let Some(i) = self.expect_block(BlockId::COMMON_ENTRY).find_succ(bb) {
            self.expect_block_mut(BlockId::COMMON_ENTRY).remove_succ_at(i);
        }
    }

    /// Registers `bb` as a function exit with the common-exit sentinel,
    /// one-sided like [`ControlFlowGraph::add_entry`].
    pub fn add_exit(&mut self, bb: BlockId) {
        self.check_not_sentinel(bb);
        let _ = self.expect_block(bb);
        let exit = self.expect_block_mut(BlockId::COMMON_EXIT);
        if exit.find_pred(bb).is_none() {
            exit.push_pred(bb);
        }
    }

    /// Unregisters `bb` from the common-exit sentinel.
    pub fn remove_exit(&mut self, bb: BlockId) {
        if let Some(i) = self.expect_block(BlockId::COMMON_EXIT).find_pred(bb) {
            self.expect_block_mut(BlockId::COMMON_EXIT)
                .remove_pred_at(i, false);
        }
    }

    // ========================================================================
    // Block creation and deletion
    // ========================================================================

    /// Appends a fresh [`BlockKind::Unknown`] block at the end of the table
    /// and returns its id.
    pub fn new_block(&mut self) -> BlockId {
        let id = self.next_id();
        self.blocks.push(Some(BasicBlock::new(id)));
        id
    }

    /// Inserts a fresh block immediately before `pos` in id order,
    /// renumbering every block at or behind the insertion point.
    pub fn insert_block_before(&mut self, pos: BlockId) -> BlockId {
        self.insert_block_at(pos.index())
    }

    /// Inserts a fresh block immediately after `pos` in id order,
    /// renumbering every block behind the insertion point.
    pub fn insert_block_after(&mut self, pos: BlockId) -> BlockId {
        self.insert_block_at(pos.index() + 1)
    }

    fn insert_block_at(&mut self, index: usize) -> BlockId {
        if index < BlockId::FIRST.index() || index > self.blocks.len() {
            raise_fatal(&contract_error!(
                "cannot insert a block at slot {} of `{}`",
                index,
                self.func_name
            ));
        }
        let threshold = u32::try_from(index).unwrap_or(u32::MAX);
        let bump = move |id: BlockId| {
            if id.0 >= threshold {
                BlockId::new(id.0 + 1)
            } else {
                id
            }
        };

        for slot in self.blocks.iter_mut().flatten() {
            slot.remap_ids(bump);
        }
        let labels = std::mem::take(&mut self.label_to_block);
        self.label_to_block = labels.into_iter().map(|(l, b)| (l, bump(b))).collect();
        let handlers = std::mem::take(&mut self.try_handlers);
        self.try_handlers = handlers.into_iter().map(|(b, h)| (bump(b), h)).collect();
        let ends = std::mem::take(&mut self.end_try_to_start);
        self.end_try_to_start = ends
            .into_iter()
            .map(|(e, s)| (bump(e), bump(s)))
            .collect();

        let id = BlockId::new(threshold);
        self.blocks.insert(index, Some(BasicBlock::new(id)));
        id
    }

    /// Nulls the slot of `bb` and returns the removed block, its kind
    /// marked [`BlockKind::Invalid`]. The id is never reused.
    ///
    /// Callers detach all edges first; the slot removal itself touches no
    /// adjacency list. Label and try bookkeeping for the block is dropped.
    pub fn delete_block(&mut self, bb: BlockId) -> Option<BasicBlock> {
        self.check_not_sentinel(bb);
        let mut removed = self.blocks.get_mut(bb.index()).and_then(Option::take)?;
        removed.set_kind(BlockKind::Invalid);
        if let Some(label) = removed.label() {
            if self.label_to_block.get(&label) == Some(&bb) {
                self.label_to_block.remove(&label);
            }
        }
        self.try_handlers.remove(&bb);
        self.end_try_to_start.remove(&bb);
        Some(removed)
    }

    /// Splits `bb` before the statement at `at`: statements `at..` and all
    /// successors move to a fresh block inserted right behind `bb`, which
    /// becomes a [`BlockKind::Fallthrough`] into it.
    ///
    /// The tail inherits the head's kind, frequency, and the try, try-end,
    /// exit, and wont-exit attributes; the head keeps its label and φ-nodes
    /// and is no longer an exit. Ids behind `bb` renumber contiguously.
    /// Returns the tail's id.
    pub fn split_block(&mut self, bb: BlockId, at: usize) -> BlockId {
        self.check_not_sentinel(bb);
        if at > self.expect_block(bb).stmts().len() {
            raise_fatal(&contract_error!(
                "split point {} past the end of {} in `{}`",
                at,
                bb,
                self.func_name
            ));
        }
        let tail_id = self.insert_block_after(bb);

        let head = self.expect_block_mut(bb);
        let moved = head.take_stmts_from(at);
        let kind = head.kind();
        let attrs = head.attributes();
        let freq = head.frequency();
        head.set_kind(BlockKind::Fallthrough);

        let tail = self.expect_block_mut(tail_id);
        *tail.stmts_mut() = moved;
        tail.set_kind(kind);
        tail.set_frequency(freq);
        tail.copy_flags_after_split(attrs);

        if self.is_exit(bb) {
            self.remove_exit(bb);
            self.add_exit(tail_id);
        }

        loop {
            let Some(&first) = self.expect_block(bb).succs().first() else {
                break;
            };
            if !self.replace_pred(first, bb, tail_id) {
                raise_fatal(&contract_error!(
                    "adjacency of {} and {} out of sync in `{}`",
                    bb,
                    first,
                    self.func_name
                ));
            }
        }
        self.add_succ(bb, tail_id);
        if freq != 0 {
            self.expect_block_mut(bb).set_edge_freq(0, freq);
        }

        if self.expect_block(tail_id).has_attribute(BlockAttributes::TRY_END) {
            if let Some(start) = self.end_try_to_start.remove(&bb) {
                self.end_try_to_start.insert(tail_id, start);
            }
        }
        let head = self.expect_block_mut(bb);
        head.clear_attribute(BlockAttributes::TRY_END | BlockAttributes::EXIT);

        tail_id
    }

    /// Merges `bb`'s sole successor into `bb`, undoing a split or fusing a
    /// straight-line pair.
    ///
    /// The merge runs only when the successor is reached from nowhere else:
    /// `bb` must have exactly one successor whose only predecessor is `bb`,
    /// carrying no label, no φ-nodes, and not opening a try region. `bb`
    /// appends the successor's statements (dropping its own trailing goto
    /// first, when present), takes over its kind, successors, and the
    /// try-end, exit, and wont-exit roles, and the successor's slot is
    /// deleted. Returns whether the merge happened.
    pub fn merge_block(&mut self, bb: BlockId) -> bool {
        self.check_not_sentinel(bb);
        let &[tail_id] = self.expect_block(bb).succs() else {
            return false;
        };
        let tail = self.expect_block(tail_id);
        let &[only_pred] = tail.preds() else {
            return false;
        };
        if only_pred != bb
            || tail.label().is_some()
            || !tail.phis().is_empty()
            || tail.has_attribute(BlockAttributes::TRY)
        {
            return false;
        }
        let tail_kind = tail.kind();
        let tail_attrs = tail.attributes();
        if self.common_entry().find_succ(tail_id).is_some() {
            return false;
        }

        if self.expect_block(bb).kind() == BlockKind::Goto {
            if let Some(Stmt::Goto(_)) = self.expect_block(bb).last_stmt() {
                self.expect_block_mut(bb).stmts_mut().pop();
            }
        }

        self.remove_succ(bb, tail_id, false);
        loop {
            let Some(&first) = self.expect_block(tail_id).succs().first() else {
                break;
            };
            if !self.replace_pred(first, tail_id, bb) {
                raise_fatal(&contract_error!(
                    "adjacency of {} and {} out of sync in `{}`",
                    tail_id,
                    first,
                    self.func_name
                ));
            }
        }
        if self.is_exit(tail_id) {
            self.remove_exit(tail_id);
            self.add_exit(bb);
        }
        if let Some(start) = self.end_try_to_start.remove(&tail_id) {
            self.end_try_to_start.insert(bb, start);
        }

        let Some(mut removed) = self.delete_block(tail_id) else {
            return false;
        };
        let moved = std::mem::take(removed.stmts_mut());

        const TAKEN: BlockAttributes = BlockAttributes::TRY_END
            .union(BlockAttributes::EXIT)
            .union(BlockAttributes::WONT_EXIT);
        let head = self.expect_block_mut(bb);
        head.stmts_mut().extend(moved);
        head.set_kind(tail_kind);
        head.set_attribute(tail_attrs & TAKEN);
        true
    }

    /// Drops every block and edge frequency in the graph, returning it to
    /// the untracked state. Transforms whose edits cannot keep the counts
    /// conserved call this instead of leaving stale profile data behind.
    pub fn clear_frequencies(&mut self) {
        for slot in self.blocks.iter_mut().flatten() {
            slot.set_frequency(0);
            slot.set_succ_freqs(Vec::new());
        }
    }

    // ========================================================================
    // Reachability sweeps
    // ========================================================================

    /// Marks every block reachable from the common-entry sentinel by a
    /// forward sweep. The result is indexed by block slot.
    #[must_use]
    pub fn find_reachable(&self) -> Vec<bool> {
        let mut visited = vec![false; self.blocks.len()];
        visited[BlockId::COMMON_ENTRY.index()] = true;
        let mut stack = vec![BlockId::COMMON_ENTRY];
        while let Some(id) = stack.pop() {
            if let Some(bb) = self.block(id) {
                for &s in bb.succs() {
                    if !visited[s.index()] {
                        visited[s.index()] = true;
                        stack.push(s);
                    }
                }
            }
        }
        visited
    }

    /// Marks every block from which the common-exit sentinel is reachable,
    /// by a backward sweep over predecessor lists.
    #[must_use]
    pub fn find_will_exit(&self) -> Vec<bool> {
        let mut visited = vec![false; self.blocks.len()];
        visited[BlockId::COMMON_EXIT.index()] = true;
        let mut stack = vec![BlockId::COMMON_EXIT];
        while let Some(id) = stack.pop() {
            if let Some(bb) = self.block(id) {
                for &p in bb.preds() {
                    if !visited[p.index()] {
                        visited[p.index()] = true;
                        stack.push(p);
                    }
                }
            }
        }
        visited
    }

    /// Returns the reachable ordinary blocks in breadth-first order from the
    /// function entries. The sentinels are not part of the order.
    #[must_use]
    pub fn bfs_order(&self) -> Vec<BlockId> {
        let mut seen = vec![false; self.blocks.len()];
        seen[BlockId::COMMON_ENTRY.index()] = true;
        seen[BlockId::COMMON_EXIT.index()] = true;
        let mut queue: VecDeque<BlockId> = VecDeque::new();
        for &entry in self.entries() {
            if !seen[entry.index()] {
                seen[entry.index()] = true;
                queue.push_back(entry);
            }
        }
        let mut order = Vec::new();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(bb) = self.block(id) {
                for &s in bb.succs() {
                    if !seen[s.index()] {
                        seen[s.index()] = true;
                        queue.push_back(s);
                    }
                }
            }
        }
        order
    }

    // ========================================================================
    // Consistency checks
    // ========================================================================

    /// Checks the structural invariants: slot/id agreement, edge duality,
    /// sentinel separation, classified kinds, and the successor shape and
    /// target of conditional and unconditional branches.
    ///
    /// A failure signals a phase bug; callers in the pass pipeline treat it
    /// as fatal for the unit.
    pub fn verify(&self) -> Result<()> {
        for (slot, bb) in self.blocks.iter().enumerate() {
            let Some(bb) = bb else { continue };
            let id = bb.id();
            if id.index() != slot {
                return Err(structural_error!(
                    &self.func_name,
                    vec![id.0],
                    "block in slot {} carries id {}",
                    slot,
                    id
                ));
            }
            self.verify_adjacency(bb)?;
            if id.is_sentinel() {
                continue;
            }
            if matches!(bb.kind(), BlockKind::Unknown | BlockKind::Invalid) {
                return Err(structural_error!(
                    &self.func_name,
                    vec![id.0],
                    "{} was never classified ({})",
                    id,
                    bb.kind()
                ));
            }
            self.verify_branch_shape(bb)?;
        }
        if !self.common_entry().preds().is_empty() || !self.common_exit().succs().is_empty() {
            return Err(structural_error!(
                &self.func_name,
                vec![0, 1],
                "sentinels must not have ordinary edges on their far side"
            ));
        }
        self.verify_try_regions()
    }

    fn verify_adjacency(&self, bb: &BasicBlock) -> Result<()> {
        let id = bb.id();
        // Sentinel edges are one-sided; every body-block edge must be dual.
        for &s in bb.succs() {
            if s.is_sentinel() && !id.is_sentinel() {
                return Err(structural_error!(
                    &self.func_name,
                    vec![id.0, s.0],
                    "{} lists sentinel {} as successor",
                    id,
                    s
                ));
            }
            let dual = self
                .block(s)
                .is_some_and(|t| id == BlockId::COMMON_ENTRY || t.find_pred(id).is_some());
            if !dual {
                return Err(structural_error!(
                    &self.func_name,
                    vec![id.0, s.0],
                    "edge {} -> {} has no dual predecessor entry",
                    id,
                    s
                ));
            }
        }
        for &p in bb.preds() {
            if p.is_sentinel() && !id.is_sentinel() {
                return Err(structural_error!(
                    &self.func_name,
                    vec![id.0, p.0],
                    "{} lists sentinel {} as predecessor",
                    id,
                    p
                ));
            }
            let dual = self
                .block(p)
                .is_some_and(|t| id == BlockId::COMMON_EXIT || t.find_succ(id).is_some());
            if !dual {
                return Err(structural_error!(
                    &self.func_name,
                    vec![id.0, p.0],
                    "edge {} -> {} has no dual successor entry",
                    p,
                    id
                ));
            }
        }
        Ok(())
    }

    fn verify_branch_shape(&self, bb: &BasicBlock) -> Result<()> {
        let id = bb.id();
        let relaxed = bb.has_attribute(BlockAttributes::TRY)
            || bb.has_attribute(BlockAttributes::WONT_EXIT);
        match bb.kind() {
            BlockKind::CondGoto => {
                if bb.succ_count() != 2 && !relaxed {
                    return Err(structural_error!(
                        &self.func_name,
                        vec![id.0],
                        "conditional {} has {} successors",
                        id,
                        bb.succ_count()
                    ));
                }
                if bb.succ_count() == 2 {
                    let Some(Stmt::CondGoto { target, .. }) = bb.last_stmt() else {
                        return Err(structural_error!(
                            &self.func_name,
                            vec![id.0],
                            "conditional {} lacks a conditional terminator",
                            id
                        ));
                    };
                    let taken = bb.succs()[1];
                    if self.block(taken).and_then(BasicBlock::label) != Some(*target) {
                        return Err(structural_error!(
                            &self.func_name,
                            vec![id.0, taken.0],
                            "successor 1 of {} does not carry branch target {}",
                            id,
                            target
                        ));
                    }
                }
            }
            BlockKind::Goto => {
                // A throw that unwinds into local handlers also classifies
                // as goto; its successors are the handlers, not a label.
                if let Some(Stmt::Goto(target)) = bb.last_stmt() {
                    if bb.succ_count() != 1 && !relaxed {
                        return Err(structural_error!(
                            &self.func_name,
                            vec![id.0],
                            "goto {} has {} successors",
                            id,
                            bb.succ_count()
                        ));
                    }
                    if let Some(&only) = bb.succs().first() {
                        if self.block(only).and_then(BasicBlock::label) != Some(*target) {
                            return Err(structural_error!(
                                &self.func_name,
                                vec![id.0, only.0],
                                "successor of {} does not carry goto target {}",
                                id,
                                target
                            ));
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn verify_try_regions(&self) -> Result<()> {
        let mut open: Option<BlockId> = None;
        for bb in self.blocks() {
            let id = bb.id();
            if self.is_try_start(id) {
                if let Some(prev) = open {
                    return Err(structural_error!(
                        &self.func_name,
                        vec![prev.0, id.0],
                        "try region of {} is still open when {} opens another",
                        prev,
                        id
                    ));
                }
                open = Some(id);
            }
            if bb.has_attribute(BlockAttributes::TRY_END) {
                let start = self.try_start_of(id);
                if start.is_none() || (open.is_some() && start != open) {
                    return Err(structural_error!(
                        &self.func_name,
                        vec![id.0],
                        "{} closes a region it is not mapped to",
                        id
                    ));
                }
                open = None;
            }
        }
        if let Some(start) = open {
            return Err(structural_error!(
                &self.func_name,
                vec![start.0],
                "try region of {} is never closed",
                start
            ));
        }
        Ok(())
    }

    /// Checks that every explicit branch target resolves to a live block
    /// carrying the target label.
    pub fn verify_labels(&self) -> Result<()> {
        for bb in self.body_blocks() {
            match bb.last_stmt() {
                Some(Stmt::Goto(target)) => {
                    self.check_branch_target(bb.id(), *target)?;
                }
                Some(Stmt::CondGoto { target, .. }) => {
                    self.check_branch_target(bb.id(), *target)?;
                }
                Some(Stmt::Switch { default, cases, .. }) => {
                    self.check_branch_target(bb.id(), *default)?;
                    for &(_, case) in cases {
                        self.check_branch_target(bb.id(), case)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_branch_target(&self, from: BlockId, target: LabelId) -> Result<()> {
        let resolved = self
            .label_to_block
            .get(&target)
            .copied()
            .and_then(|id| self.block(id));
        match resolved {
            Some(bb) if bb.label() == Some(target) => Ok(()),
            _ => Err(structural_error!(
                &self.func_name,
                vec![from.0],
                "branch target {} of {} does not resolve to a labelled block",
                target,
                from
            )),
        }
    }

    /// Checks frequency conservation: for every block whose edge counts are
    /// tracked, the outgoing counts sum to the block's own frequency.
    pub fn verify_frequencies(&self) -> Result<()> {
        for bb in self.body_blocks() {
            if bb.succ_freqs().len() != bb.succ_count() || bb.succs().is_empty() {
                continue;
            }
            let total: u64 = bb.succ_freqs().iter().sum();
            if total != bb.frequency() {
                return Err(structural_error!(
                    &self.func_name,
                    vec![bb.id().0],
                    "outgoing frequency {} of {} does not match block frequency {}",
                    total,
                    bb.id(),
                    bb.frequency()
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cfg of `{}`: {} blocks in {} slots",
            self.func_name,
            self.block_count(),
            self.slot_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CondKind, Operand, VarId};

    fn graph_with_blocks(n: usize) -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::empty("test", UnitId::new(0));
        for _ in 0..n {
            let id = cfg.new_block();
            if let Some(bb) = cfg.block_mut(id) {
                bb.set_kind(BlockKind::Fallthrough);
            }
        }
        cfg
    }

    #[test]
    fn test_empty_graph_holds_sentinels() {
        let cfg = ControlFlowGraph::empty("f", UnitId::new(0));
        assert_eq!(cfg.slot_count(), 2);
        assert!(cfg.common_entry().has_attribute(BlockAttributes::ENTRY));
        assert!(cfg.common_exit().has_attribute(BlockAttributes::EXIT));
        assert!(cfg.first_block().is_none());
    }

    #[test]
    fn test_new_block_ids_are_dense() {
        let mut cfg = ControlFlowGraph::empty("f", UnitId::new(0));
        assert_eq!(cfg.new_block(), BlockId::new(2));
        assert_eq!(cfg.new_block(), BlockId::new(3));
        assert_eq!(cfg.block_count(), 4);
    }

    #[test]
    fn test_add_succ_maintains_duality() {
        let mut cfg = graph_with_blocks(2);
        cfg.add_succ(BlockId::new(2), BlockId::new(3));
        assert_eq!(cfg.block(BlockId::new(2)).unwrap().succs(), &[BlockId::new(3)]);
        assert_eq!(cfg.block(BlockId::new(3)).unwrap().preds(), &[BlockId::new(2)]);
        assert!(cfg.verify().is_ok());
    }

    #[test]
    fn test_add_succ_at_orders_successors() {
        let mut cfg = graph_with_blocks(3);
        cfg.add_succ(BlockId::new(2), BlockId::new(3));
        cfg.add_succ_at(BlockId::new(2), BlockId::new(4), 0);
        assert_eq!(
            cfg.block(BlockId::new(2)).unwrap().succs(),
            &[BlockId::new(4), BlockId::new(3)]
        );
    }

    #[test]
    fn test_remove_succ_degrades_phis() {
        let mut cfg = graph_with_blocks(3);
        let join = BlockId::new(4);
        cfg.add_succ(BlockId::new(2), join);
        cfg.add_succ(BlockId::new(3), join);
        cfg.block_mut(join).unwrap().add_phi(VarId::new(7));

        cfg.remove_succ(BlockId::new(2), join, true);
        // One predecessor left: the φ collapses to an identity assignment.
        let bb = cfg.block(join).unwrap();
        assert!(bb.phis().is_empty());
        assert!(matches!(
            bb.stmts()[0],
            Stmt::Assign { dest, .. } if dest == VarId::new(7)
        ));

        cfg.remove_succ(BlockId::new(3), join, true);
        assert_eq!(cfg.block(join).unwrap().pred_count(), 0);
    }

    #[test]
    fn test_remove_absent_edge_is_noop() {
        let mut cfg = graph_with_blocks(2);
        cfg.remove_succ(BlockId::new(2), BlockId::new(3), true);
        assert_eq!(cfg.block(BlockId::new(2)).unwrap().succ_count(), 0);
    }

    #[test]
    fn test_replace_pred_preserves_phi_slot() {
        let mut cfg = graph_with_blocks(4);
        let join = BlockId::new(5);
        cfg.add_succ(BlockId::new(2), join);
        cfg.add_succ(BlockId::new(3), join);
        cfg.block_mut(join).unwrap().add_phi(VarId::new(9));
        cfg.block_mut(join).unwrap().phis_mut()[0].operands_mut()[0] = VarId::new(1);
        cfg.block_mut(join).unwrap().phis_mut()[0].operands_mut()[1] = VarId::new(2);

        assert!(cfg.replace_pred(join, BlockId::new(2), BlockId::new(4)));
        let bb = cfg.block(join).unwrap();
        assert_eq!(bb.preds(), &[BlockId::new(4), BlockId::new(3)]);
        // Operand 0 still belongs to slot 0, now fed by the new block.
        assert_eq!(bb.phis()[0].operands(), &[VarId::new(1), VarId::new(2)]);
        assert_eq!(cfg.block(BlockId::new(2)).unwrap().succ_count(), 0);
        assert_eq!(cfg.block(BlockId::new(4)).unwrap().succs(), &[join]);
        assert!(cfg.verify().is_ok());
    }

    #[test]
    fn test_sentinel_registration_is_one_sided() {
        let mut cfg = graph_with_blocks(1);
        cfg.add_entry(BlockId::new(2));
        cfg.add_exit(BlockId::new(2));
        assert_eq!(cfg.entries(), &[BlockId::new(2)]);
        assert_eq!(cfg.exits(), &[BlockId::new(2)]);
        let bb = cfg.block(BlockId::new(2)).unwrap();
        assert_eq!(bb.pred_count(), 0);
        assert_eq!(bb.succ_count(), 0);
        assert!(cfg.is_exit(BlockId::new(2)));

        cfg.remove_exit(BlockId::new(2));
        assert!(!cfg.is_exit(BlockId::new(2)));
    }

    #[test]
    fn test_insert_block_renumbers_everything() {
        let mut cfg = graph_with_blocks(2);
        let label = LabelId::new(1);
        cfg.block_mut(BlockId::new(3)).unwrap().set_label(label);
        cfg.set_label_block(label, BlockId::new(3));
        cfg.add_succ(BlockId::new(2), BlockId::new(3));

        let inserted = cfg.insert_block_before(BlockId::new(3));
        assert_eq!(inserted, BlockId::new(3));
        // The old bb3 is now bb4 and every reference moved with it.
        assert_eq!(cfg.block(BlockId::new(2)).unwrap().succs(), &[BlockId::new(4)]);
        assert_eq!(cfg.block(BlockId::new(4)).unwrap().preds(), &[BlockId::new(2)]);
        assert_eq!(cfg.label_block(label), Some(BlockId::new(4)));
        assert_eq!(cfg.block(BlockId::new(4)).unwrap().label(), Some(label));
    }

    #[test]
    fn test_delete_block_nulls_slot() {
        let mut cfg = graph_with_blocks(2);
        let removed = cfg.delete_block(BlockId::new(2));
        assert_eq!(removed.map(|bb| bb.kind()), Some(BlockKind::Invalid));
        assert!(cfg.block(BlockId::new(2)).is_none());
        assert_eq!(cfg.slot_count(), 4);
        assert_eq!(cfg.block_count(), 3);
        // Ids are not reused; the next block goes behind the hole.
        assert_eq!(cfg.new_block(), BlockId::new(4));
    }

    #[test]
    fn test_split_block_moves_tail_and_successors() {
        let mut cfg = graph_with_blocks(3);
        let bb = BlockId::new(2);
        cfg.block_mut(bb).unwrap().set_kind(BlockKind::CondGoto);
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::Assign {
            dest: VarId::new(0),
            src: Operand::Const(1),
        });
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::CondGoto {
            kind: CondKind::BrTrue,
            cond: VarId::new(0),
            target: LabelId::new(1),
        });
        cfg.add_succ(bb, BlockId::new(3));
        cfg.add_succ(bb, BlockId::new(4));

        let tail = cfg.split_block(bb, 1);
        assert_eq!(tail, BlockId::new(3));

        let head = cfg.block(bb).unwrap();
        assert_eq!(head.kind(), BlockKind::Fallthrough);
        assert_eq!(head.stmts().len(), 1);
        assert_eq!(head.succs(), &[tail]);

        // Old bb3/bb4 renumbered to bb4/bb5 and now hang off the tail.
        let tail_bb = cfg.block(tail).unwrap();
        assert_eq!(tail_bb.kind(), BlockKind::CondGoto);
        assert_eq!(tail_bb.stmts().len(), 1);
        assert_eq!(tail_bb.succs(), &[BlockId::new(4), BlockId::new(5)]);
        assert_eq!(cfg.block(BlockId::new(4)).unwrap().preds(), &[tail]);
        assert_eq!(cfg.block(BlockId::new(5)).unwrap().preds(), &[tail]);
    }

    #[test]
    fn test_split_block_carries_frequencies() {
        let mut cfg = graph_with_blocks(3);
        let bb = BlockId::new(2);
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::Assign {
            dest: VarId::new(0),
            src: Operand::Const(1),
        });
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::Return(None));
        cfg.block_mut(bb).unwrap().set_kind(BlockKind::CondGoto);
        cfg.add_succ(bb, BlockId::new(3));
        cfg.add_succ(bb, BlockId::new(4));
        cfg.block_mut(bb).unwrap().set_frequency(100);
        cfg.block_mut(bb).unwrap().set_edge_freq(0, 60);
        cfg.block_mut(bb).unwrap().set_edge_freq(1, 40);

        let tail = cfg.split_block(bb, 1);
        let head = cfg.block(bb).unwrap();
        assert_eq!(head.frequency(), 100);
        assert_eq!(head.succ_freqs(), &[100]);
        let tail_bb = cfg.block(tail).unwrap();
        assert_eq!(tail_bb.frequency(), 100);
        assert_eq!(tail_bb.succ_freqs(), &[60, 40]);
        assert!(cfg.verify_frequencies().is_ok());
    }

    #[test]
    fn test_split_block_transfers_exit_attribute() {
        let mut cfg = graph_with_blocks(1);
        let bb = BlockId::new(2);
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::Return(None));
        cfg.block_mut(bb).unwrap().set_kind_return();
        cfg.add_exit(bb);

        let tail = cfg.split_block(bb, 0);
        assert!(!cfg.is_exit(bb));
        assert!(cfg.is_exit(tail));
        assert!(!cfg.block(bb).unwrap().has_attribute(BlockAttributes::EXIT));
        assert!(cfg.block(tail).unwrap().has_attribute(BlockAttributes::EXIT));
        assert_eq!(cfg.block(tail).unwrap().kind(), BlockKind::Return);
    }

    #[test]
    fn test_merge_block_undoes_split() {
        // bb4 branches backwards to 2 and 3, so the split tail gets the
        // highest id and no other block renumbers.
        let mut cfg = graph_with_blocks(3);
        let bb = BlockId::new(4);
        cfg.block_mut(bb).unwrap().set_kind(BlockKind::CondGoto);
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::Assign {
            dest: VarId::new(0),
            src: Operand::Const(1),
        });
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::CondGoto {
            kind: CondKind::BrTrue,
            cond: VarId::new(0),
            target: LabelId::new(1),
        });
        cfg.add_succ(bb, BlockId::new(2));
        cfg.add_succ(bb, BlockId::new(3));
        cfg.block_mut(BlockId::new(3)).unwrap().set_label(LabelId::new(1));
        cfg.set_label_block(LabelId::new(1), BlockId::new(3));
        let original = cfg.block(bb).unwrap().stmts().to_vec();

        let tail = cfg.split_block(bb, 1);
        assert_eq!(cfg.block(bb).unwrap().succs(), &[tail]);
        assert_eq!(
            cfg.block(tail).unwrap().succs(),
            &[BlockId::new(2), BlockId::new(3)]
        );

        assert!(cfg.merge_block(bb));
        let merged = cfg.block(bb).unwrap();
        assert_eq!(merged.kind(), BlockKind::CondGoto);
        assert_eq!(merged.stmts(), &original[..]);
        assert_eq!(merged.succs(), &[BlockId::new(2), BlockId::new(3)]);
        assert_eq!(cfg.block(BlockId::new(2)).unwrap().preds(), &[bb]);
        assert_eq!(cfg.block(BlockId::new(3)).unwrap().preds(), &[bb]);
        assert!(cfg.block(tail).is_none());
        assert!(cfg.verify().is_ok());
    }

    #[test]
    fn test_merge_block_carries_frequencies() {
        let mut cfg = graph_with_blocks(3);
        let bb = BlockId::new(4);
        cfg.block_mut(bb).unwrap().set_kind(BlockKind::CondGoto);
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::CondGoto {
            kind: CondKind::BrFalse,
            cond: VarId::new(0),
            target: LabelId::new(1),
        });
        cfg.add_succ(bb, BlockId::new(2));
        cfg.add_succ(bb, BlockId::new(3));
        cfg.block_mut(BlockId::new(3)).unwrap().set_label(LabelId::new(1));
        cfg.set_label_block(LabelId::new(1), BlockId::new(3));
        cfg.block_mut(bb).unwrap().set_frequency(10);
        cfg.block_mut(bb).unwrap().set_edge_freq(0, 6);
        cfg.block_mut(bb).unwrap().set_edge_freq(1, 4);
        assert!(cfg.verify_frequencies().is_ok());

        cfg.split_block(bb, 0);
        assert!(cfg.verify_frequencies().is_ok());

        assert!(cfg.merge_block(bb));
        let merged = cfg.block(bb).unwrap();
        assert_eq!(merged.frequency(), 10);
        assert_eq!(merged.succ_freqs(), &[6, 4]);
        assert!(cfg.verify_frequencies().is_ok());
    }

    #[test]
    fn test_merge_block_refuses_shared_or_labeled_tail() {
        let mut cfg = graph_with_blocks(3);
        cfg.add_succ(BlockId::new(2), BlockId::new(4));
        cfg.add_succ(BlockId::new(3), BlockId::new(4));
        // bb4 has a second predecessor.
        assert!(!cfg.merge_block(BlockId::new(2)));
        assert_eq!(cfg.block(BlockId::new(4)).unwrap().pred_count(), 2);

        let mut cfg = graph_with_blocks(2);
        cfg.add_succ(BlockId::new(2), BlockId::new(3));
        cfg.block_mut(BlockId::new(3)).unwrap().set_label(LabelId::new(5));
        cfg.set_label_block(LabelId::new(5), BlockId::new(3));
        // A labeled tail may still be a branch target.
        assert!(!cfg.merge_block(BlockId::new(2)));
        assert!(cfg.block(BlockId::new(3)).is_some());
    }

    #[test]
    fn test_merge_block_adopts_tail_kind_and_exit() {
        let mut cfg = graph_with_blocks(2);
        let head = BlockId::new(2);
        let tail = BlockId::new(3);
        cfg.block_mut(head).unwrap().set_kind(BlockKind::Goto);
        cfg.block_mut(head).unwrap().push_stmt(Stmt::Goto(LabelId::new(7)));
        cfg.block_mut(tail).unwrap().push_stmt(Stmt::Return(None));
        cfg.block_mut(tail).unwrap().set_kind_return();
        cfg.add_succ(head, tail);
        cfg.add_exit(tail);

        assert!(cfg.merge_block(head));
        let merged = cfg.block(head).unwrap();
        // The redundant goto is gone and the tail's return took its place.
        assert_eq!(merged.stmts(), &[Stmt::Return(None)][..]);
        assert_eq!(merged.kind(), BlockKind::Return);
        assert!(merged.has_attribute(BlockAttributes::EXIT));
        assert!(cfg.is_exit(head));
        assert!(!cfg.is_exit(tail));
        assert!(cfg.block(tail).is_none());
    }

    #[test]
    fn test_find_reachable_follows_entry_edges() {
        let mut cfg = graph_with_blocks(3);
        cfg.add_entry(BlockId::new(2));
        cfg.add_succ(BlockId::new(2), BlockId::new(3));
        // bb4 has no incoming edge.
        let visited = cfg.find_reachable();
        assert!(visited[2]);
        assert!(visited[3]);
        assert!(!visited[4]);
    }

    #[test]
    fn test_find_will_exit_walks_backwards() {
        let mut cfg = graph_with_blocks(3);
        cfg.add_succ(BlockId::new(2), BlockId::new(3));
        cfg.add_exit(BlockId::new(3));
        // bb4 loops on itself and never reaches the exit.
        let visited = cfg.find_will_exit();
        assert!(visited[2]);
        assert!(visited[3]);
        assert!(!visited[4]);
    }

    #[test]
    fn test_bfs_order_is_level_by_level() {
        // Diamond: 2 -> {3, 4} -> 5, plus an unreachable 6.
        let mut cfg = graph_with_blocks(5);
        cfg.add_entry(BlockId::new(2));
        cfg.add_succ(BlockId::new(2), BlockId::new(3));
        cfg.add_succ(BlockId::new(2), BlockId::new(4));
        cfg.add_succ(BlockId::new(3), BlockId::new(5));
        cfg.add_succ(BlockId::new(4), BlockId::new(5));
        let order = cfg.bfs_order();
        assert_eq!(
            order,
            vec![BlockId::new(2), BlockId::new(3), BlockId::new(4), BlockId::new(5)]
        );
    }

    #[test]
    fn test_verify_detects_dangling_edge() {
        let mut cfg = graph_with_blocks(2);
        // Break duality through the raw single-sided primitive.
        cfg.block_mut(BlockId::new(2))
            .unwrap()
            .push_succ(BlockId::new(3), 0);
        assert!(cfg.verify().is_err());
    }

    #[test]
    fn test_verify_checks_condgoto_shape() {
        let mut cfg = graph_with_blocks(2);
        let bb = BlockId::new(2);
        cfg.block_mut(bb).unwrap().set_kind(BlockKind::CondGoto);
        cfg.add_succ(bb, BlockId::new(3));
        assert!(cfg.verify().is_err());
    }

    #[test]
    fn test_verify_checks_condgoto_target_label() {
        let mut cfg = graph_with_blocks(3);
        let bb = BlockId::new(2);
        cfg.block_mut(bb).unwrap().set_kind(BlockKind::CondGoto);
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::CondGoto {
            kind: CondKind::BrTrue,
            cond: VarId::new(0),
            target: LabelId::new(9),
        });
        cfg.add_succ(bb, BlockId::new(3));
        cfg.add_succ(bb, BlockId::new(4));
        // Successor 1 carries no label at all.
        assert!(cfg.verify().is_err());

        cfg.block_mut(BlockId::new(4)).unwrap().set_label(LabelId::new(9));
        cfg.set_label_block(LabelId::new(9), BlockId::new(4));
        assert!(cfg.verify().is_ok());
    }

    #[test]
    fn test_verify_labels_catches_unresolved_target() {
        let mut cfg = graph_with_blocks(2);
        let bb = BlockId::new(2);
        cfg.block_mut(bb).unwrap().set_kind(BlockKind::Goto);
        cfg.block_mut(bb).unwrap().push_stmt(Stmt::Goto(LabelId::new(3)));
        assert!(cfg.verify_labels().is_err());

        cfg.block_mut(BlockId::new(3)).unwrap().set_label(LabelId::new(3));
        cfg.set_label_block(LabelId::new(3), BlockId::new(3));
        assert!(cfg.verify_labels().is_ok());
    }

    #[test]
    fn test_verify_frequencies_conservation() {
        let mut cfg = graph_with_blocks(3);
        let bb = BlockId::new(2);
        cfg.add_succ(bb, BlockId::new(3));
        cfg.add_succ(bb, BlockId::new(4));
        cfg.block_mut(bb).unwrap().set_frequency(10);
        cfg.block_mut(bb).unwrap().set_edge_freq(0, 4);
        cfg.block_mut(bb).unwrap().set_edge_freq(1, 6);
        assert!(cfg.verify_frequencies().is_ok());

        cfg.block_mut(bb).unwrap().set_edge_freq(1, 7);
        assert!(cfg.verify_frequencies().is_err());
    }

    #[test]
    fn test_remove_all_succ_detaches_block() {
        let mut cfg = graph_with_blocks(3);
        cfg.add_succ(BlockId::new(2), BlockId::new(3));
        cfg.add_succ(BlockId::new(2), BlockId::new(4));
        cfg.remove_all_succ(BlockId::new(2), false);
        assert_eq!(cfg.block(BlockId::new(2)).unwrap().succ_count(), 0);
        assert_eq!(cfg.block(BlockId::new(3)).unwrap().pred_count(), 0);
        assert_eq!(cfg.block(BlockId::new(4)).unwrap().pred_count(), 0);
    }
}
