//! Basic blocks and their identifiers, kinds, and attributes.
//!
//! A [`BasicBlock`] owns its statement list, φ-nodes, and both adjacency
//! lists. The predecessor and successor lists store [`BlockId`]s rather than
//! references; the owning [`crate::cfg::ControlFlowGraph`] resolves them and
//! is the only place edges are mutated on both sides at once. The methods
//! here that touch a single side are `pub(crate)` for that reason.
//!
//! φ-node operand lists stay parallel to the predecessor list under every
//! mutation: removing the predecessor at index `i` removes operand `i` from
//! each φ-node, and appending a predecessor appends a placeholder operand.

use std::fmt;

use crate::cfg::phi::PhiNode;
use crate::ir::{CondKind, LabelId, Stmt, VarId};

/// Identifier of a basic block within one function's control-flow graph.
///
/// Ids double as indices into the graph's block table. The table keeps two
/// sentinel slots at the front, so [`BlockId::FIRST`] is the lowest id a
/// real block can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// Sentinel predecessor of every entry block. Holds no statements.
    pub const COMMON_ENTRY: BlockId = BlockId(0);

    /// Sentinel successor of every exit block. Holds no statements.
    pub const COMMON_EXIT: BlockId = BlockId(1);

    /// Lowest id assignable to an ordinary block.
    pub const FIRST: BlockId = BlockId(2);

    /// Creates a block identifier from a raw id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        BlockId(id)
    }

    /// Returns the raw id as a table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for the two sentinel ids.
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 < 2
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl From<u32> for BlockId {
    fn from(id: u32) -> Self {
        BlockId(id)
    }
}

/// Classification of a block by its terminating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum BlockKind {
    /// Not yet classified. Only valid while a graph is under construction.
    #[strum(serialize = "unknown")]
    Unknown,
    /// Ends in a two-way conditional branch.
    #[strum(serialize = "condgoto")]
    CondGoto,
    /// Ends in an unconditional branch.
    #[strum(serialize = "goto")]
    Goto,
    /// Falls through to the next block in layout order.
    #[strum(serialize = "fallthru")]
    Fallthrough,
    /// Ends in a return, or leaves the function by throwing with no local
    /// handler.
    #[strum(serialize = "return")]
    Return,
    /// Ends in a call that never returns.
    #[strum(serialize = "noreturn")]
    NoReturn,
    /// Ends in a multi-way branch over case values.
    #[strum(serialize = "switch")]
    Switch,
    /// Ends in a computed branch over address-taken labels.
    #[strum(serialize = "igoto")]
    IndirectGoto,
    /// Resumes here after a local subroutine call returns.
    #[strum(serialize = "aftergosub")]
    AfterSubroutine,
    /// Slot was deleted; kept only so dumps of stale ids stay readable.
    #[strum(serialize = "invalid")]
    Invalid,
}

impl BlockKind {
    /// Returns `true` for kinds whose terminator names one or more explicit
    /// branch targets.
    #[must_use]
    pub const fn is_branching(self) -> bool {
        matches!(
            self,
            BlockKind::CondGoto | BlockKind::Goto | BlockKind::Switch | BlockKind::IndirectGoto
        )
    }
}

bitflags::bitflags! {
    /// Orthogonal block attributes, independent of [`BlockKind`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BlockAttributes: u16 {
        /// Function entry; fed by the common-entry sentinel.
        const ENTRY = 1 << 0;
        /// Function exit; feeds the common-exit sentinel.
        const EXIT = 1 << 1;
        /// No path from this block reaches an exit.
        const WONT_EXIT = 1 << 2;
        /// Inside a try region. The first block of the region also appears
        /// in the graph's handler table.
        const TRY = 1 << 3;
        /// Closes a try region. The graph maps this block back to the
        /// region's first block.
        const TRY_END = 1 << 4;
        /// First block of an exception handler.
        const CATCH = 1 << 5;
        /// Handler that catches every exception type.
        const FINALLY = 1 << 6;
        /// Synthesized by an analysis rather than built from source
        /// statements.
        const ARTIFICIAL = 1 << 7;
        /// Part of a natural loop body.
        const IN_LOOP = 1 << 8;
        /// Profiling instrumentation was inserted here.
        const INSTRUMENTED = 1 << 9;
    }
}

/// One node of a function's control-flow graph.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    id: BlockId,
    kind: BlockKind,
    attributes: BlockAttributes,
    label: Option<LabelId>,
    stmts: Vec<Stmt>,
    phis: Vec<PhiNode>,
    preds: Vec<BlockId>,
    succs: Vec<BlockId>,
    /// Edge execution counts, parallel to `succs` while profile data is
    /// tracked; empty otherwise.
    succ_freqs: Vec<u64>,
    frequency: u64,
}

impl BasicBlock {
    /// Creates an empty block of [`BlockKind::Unknown`].
    #[must_use]
    pub fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            kind: BlockKind::Unknown,
            attributes: BlockAttributes::empty(),
            label: None,
            stmts: Vec::new(),
            phis: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            succ_freqs: Vec::new(),
            frequency: 0,
        }
    }

    /// Returns this block's id.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: BlockId) {
        self.id = id;
    }

    /// Returns this block's kind.
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Reclassifies this block.
    pub fn set_kind(&mut self, kind: BlockKind) {
        self.kind = kind;
    }

    /// Marks this block as returning from the function: kind becomes
    /// [`BlockKind::Return`] and the exit attribute is set.
    pub fn set_kind_return(&mut self) {
        self.kind = BlockKind::Return;
        self.attributes |= BlockAttributes::EXIT;
    }

    /// Returns the attribute set.
    #[must_use]
    pub const fn attributes(&self) -> BlockAttributes {
        self.attributes
    }

    /// Returns `true` if every attribute in `attrs` is set.
    #[must_use]
    pub fn has_attribute(&self, attrs: BlockAttributes) -> bool {
        self.attributes.contains(attrs)
    }

    /// Sets the given attributes.
    pub fn set_attribute(&mut self, attrs: BlockAttributes) {
        self.attributes |= attrs;
    }

    /// Clears the given attributes.
    pub fn clear_attribute(&mut self, attrs: BlockAttributes) {
        self.attributes &= !attrs;
    }

    /// Copies the try, try-end, exit, and wont-exit attributes from a block
    /// that was just split, clearing any of the four the source lacks.
    pub(crate) fn copy_flags_after_split(&mut self, source: BlockAttributes) {
        const COPIED: BlockAttributes = BlockAttributes::TRY
            .union(BlockAttributes::TRY_END)
            .union(BlockAttributes::EXIT)
            .union(BlockAttributes::WONT_EXIT);
        self.attributes = (self.attributes & !COPIED) | (source & COPIED);
    }

    /// Returns the label this block starts with, if any.
    #[must_use]
    pub const fn label(&self) -> Option<LabelId> {
        self.label
    }

    /// Labels this block.
    pub fn set_label(&mut self, label: LabelId) {
        self.label = Some(label);
    }

    /// Returns the statement list.
    #[must_use]
    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    /// Returns the statement list mutably.
    pub fn stmts_mut(&mut self) -> &mut Vec<Stmt> {
        &mut self.stmts
    }

    /// Returns the first statement, if any.
    #[must_use]
    pub fn first_stmt(&self) -> Option<&Stmt> {
        self.stmts.first()
    }

    /// Returns the last statement, if any.
    #[must_use]
    pub fn last_stmt(&self) -> Option<&Stmt> {
        self.stmts.last()
    }

    /// Appends a statement.
    pub fn push_stmt(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    /// Drops the last statement, returning it.
    pub fn pop_stmt(&mut self) -> Option<Stmt> {
        self.stmts.pop()
    }

    /// Splits off and returns the statements from `index` to the end.
    pub(crate) fn take_stmts_from(&mut self, index: usize) -> Vec<Stmt> {
        self.stmts.split_off(index)
    }

    /// Returns `true` if the block holds no statements and no φ-nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty() && self.phis.is_empty()
    }

    /// Returns the φ-nodes.
    #[must_use]
    pub fn phis(&self) -> &[PhiNode] {
        &self.phis
    }

    /// Returns the φ-nodes mutably.
    pub fn phis_mut(&mut self) -> &mut Vec<PhiNode> {
        &mut self.phis
    }

    /// Inserts a φ-node for `result` with one placeholder operand per
    /// current predecessor.
    pub fn add_phi(&mut self, result: VarId) {
        let phi = PhiNode::placeholder(result, self.preds.len());
        self.phis.push(phi);
    }

    /// Removes every φ-node. Used when the block has no predecessors left
    /// and the merges are meaningless.
    pub fn clear_phis(&mut self) {
        self.phis.clear();
    }

    /// Lowers every φ-node to an identity assignment prepended to the
    /// statement list, then clears the φ list. Used when the block drops to
    /// a single predecessor.
    pub fn convert_phis_to_identity_assigns(&mut self) {
        for phi in self.phis.iter().rev() {
            self.stmts.insert(0, phi.to_identity_assign());
        }
        self.phis.clear();
    }

    /// Returns the predecessor list.
    #[must_use]
    pub fn preds(&self) -> &[BlockId] {
        &self.preds
    }

    /// Returns the successor list.
    #[must_use]
    pub fn succs(&self) -> &[BlockId] {
        &self.succs
    }

    /// Returns the number of predecessors.
    #[must_use]
    pub fn pred_count(&self) -> usize {
        self.preds.len()
    }

    /// Returns the number of successors.
    #[must_use]
    pub fn succ_count(&self) -> usize {
        self.succs.len()
    }

    /// Returns the sole predecessor. A list whose entries all name the same
    /// block counts as sole; two distinct predecessors return `None`.
    #[must_use]
    pub fn unique_pred(&self) -> Option<BlockId> {
        let first = *self.preds.first()?;
        if self.preds.iter().all(|&p| p == first) {
            Some(first)
        } else {
            None
        }
    }

    /// Returns the sole successor, under the same all-equal rule as
    /// [`BasicBlock::unique_pred`].
    #[must_use]
    pub fn unique_succ(&self) -> Option<BlockId> {
        let first = *self.succs.first()?;
        if self.succs.iter().all(|&s| s == first) {
            Some(first)
        } else {
            None
        }
    }

    /// Returns the (taken, not-taken) successor pair of a two-way
    /// conditional block, reading the branch sense from its terminator.
    /// Successor 0 is always the fallthrough edge and successor 1 the
    /// labelled target, so a `brtrue` takes successor 1 and a `brfalse`
    /// takes successor 0.
    #[must_use]
    pub fn true_false_branches(&self) -> Option<(BlockId, BlockId)> {
        if self.kind != BlockKind::CondGoto || self.succs.len() != 2 {
            return None;
        }
        match self.last_stmt() {
            Some(Stmt::CondGoto { kind, .. }) => match kind {
                CondKind::BrTrue => Some((self.succs[1], self.succs[0])),
                CondKind::BrFalse => Some((self.succs[0], self.succs[1])),
            },
            _ => None,
        }
    }

    /// Returns the position of `id` in the predecessor list.
    pub(crate) fn find_pred(&self, id: BlockId) -> Option<usize> {
        self.preds.iter().position(|&p| p == id)
    }

    /// Returns the position of `id` in the successor list.
    pub(crate) fn find_succ(&self, id: BlockId) -> Option<usize> {
        self.succs.iter().position(|&s| s == id)
    }

    /// Appends a predecessor, extending each φ-node with a placeholder
    /// operand so the lists stay parallel.
    pub(crate) fn push_pred(&mut self, id: BlockId) {
        self.preds.push(id);
        for phi in &mut self.phis {
            let result = phi.result();
            phi.operands_mut().push(result);
        }
    }

    /// Inserts a predecessor at `pos`, giving each φ-node a placeholder
    /// operand at the same position.
    pub(crate) fn insert_pred(&mut self, pos: usize, id: BlockId) {
        self.preds.insert(pos, id);
        for phi in &mut self.phis {
            let result = phi.result();
            phi.operands_mut().insert(pos, result);
        }
    }

    /// Drops every predecessor entry. φ-nodes are cleared as well since a
    /// block with no incoming edges merges nothing.
    pub(crate) fn clear_preds(&mut self) {
        self.preds.clear();
        self.phis.clear();
    }

    /// Appends a successor, recording `freq` while edge counts are tracked.
    pub(crate) fn push_succ(&mut self, id: BlockId, freq: u64) {
        if self.freqs_tracked() {
            self.succ_freqs.push(freq);
        }
        self.succs.push(id);
    }

    /// Inserts a successor at `pos`, keeping the frequency list parallel.
    pub(crate) fn insert_succ(&mut self, pos: usize, id: BlockId, freq: u64) {
        if self.freqs_tracked() {
            self.succ_freqs.insert(pos, freq);
        }
        self.succs.insert(pos, id);
    }

    /// Removes the predecessor at `index`. With `update_phi`, each φ-node
    /// drops the operand contributed along that edge.
    pub(crate) fn remove_pred_at(&mut self, index: usize, update_phi: bool) {
        self.preds.remove(index);
        if update_phi {
            for phi in &mut self.phis {
                phi.remove_operand(index);
            }
        }
    }

    /// Removes the successor at `index` along with its tracked frequency.
    pub(crate) fn remove_succ_at(&mut self, index: usize) {
        if index < self.succ_freqs.len() {
            self.succ_freqs.remove(index);
        }
        self.succs.remove(index);
    }

    /// Rewrites the predecessor slot at `index` in place, leaving φ operand
    /// positions untouched.
    pub(crate) fn set_pred_at(&mut self, index: usize, id: BlockId) {
        self.preds[index] = id;
    }

    /// Rewrites the successor slot at `index` in place.
    pub(crate) fn set_succ_at(&mut self, index: usize, id: BlockId) {
        self.succs[index] = id;
    }

    /// Returns this block's execution count.
    #[must_use]
    pub const fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Sets this block's execution count.
    pub fn set_frequency(&mut self, frequency: u64) {
        self.frequency = frequency;
    }

    /// Returns the tracked outgoing edge counts, parallel to
    /// [`BasicBlock::succs`]; empty when profile data is not tracked.
    #[must_use]
    pub fn succ_freqs(&self) -> &[u64] {
        &self.succ_freqs
    }

    /// Returns the tracked count of the edge to successor `index`.
    #[must_use]
    pub fn edge_freq(&self, index: usize) -> u64 {
        self.succ_freqs.get(index).copied().unwrap_or(0)
    }

    /// Sets the count of the edge to successor `index`, materializing the
    /// frequency list if counts were untracked.
    pub fn set_edge_freq(&mut self, index: usize, freq: u64) {
        if self.succ_freqs.len() != self.succs.len() {
            self.succ_freqs = vec![0; self.succs.len()];
        }
        self.succ_freqs[index] = freq;
    }

    /// Rewrites this block's id and every id in its adjacency lists.
    /// Used when inserting a block renumbers the slots behind it.
    pub(crate) fn remap_ids(&mut self, f: impl Fn(BlockId) -> BlockId) {
        self.id = f(self.id);
        for p in &mut self.preds {
            *p = f(*p);
        }
        for s in &mut self.succs {
            *s = f(*s);
        }
    }

    pub(crate) fn set_succ_freqs(&mut self, freqs: Vec<u64>) {
        self.succ_freqs = freqs;
    }

    pub(crate) fn take_succ_freqs(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.succ_freqs)
    }

    /// Returns `true` while the frequency list is parallel to the successor
    /// list and counts should be maintained through edge mutations.
    pub(crate) fn freqs_tracked(&self) -> bool {
        !self.succ_freqs.is_empty() || (self.frequency != 0 && self.succs.is_empty())
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.kind)?;
        if let Some(label) = self.label {
            write!(f, " {label}")?;
        }
        Ok(())
    }
}
