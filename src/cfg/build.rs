//! Construction of a [`ControlFlowGraph`] from a function body.
//!
//! Construction runs in two passes over the statement list. The first pass
//! forms blocks: labels and exception-region markers open blocks, branch
//! and return statements close them and fix their kind. The second pass
//! wires edges from each block's terminator, resolves branch labels, adds
//! handler edges for protected blocks, and registers entries and exits with
//! the sentinels.
//!
//! A try region header becomes a single-statement fallthrough block of its
//! own, so that statements ahead of the region are never merged into it;
//! downstream dataflow relies on that separation. The `endtry` marker is
//! consumed during formation: the region's last block carries the try-end
//! attribute instead.

use std::collections::HashSet;

use crate::cfg::block::{BasicBlock, BlockAttributes, BlockId, BlockKind};
use crate::cfg::graph::ControlFlowGraph;
use crate::ir::{Function, LabelId, Operand, Stmt, VarId};
use crate::Result;

pub(crate) struct CfgBuilder<'a> {
    function: &'a Function,
    cfg: ControlFlowGraph,
    cur: BlockId,
    /// Handler labels of the currently open try region.
    open_handlers: Option<Vec<LabelId>>,
    /// Block holding the open region's header statement.
    last_try: Option<BlockId>,
    /// Blocks that resume execution after a local subroutine call.
    post_gosub: HashSet<BlockId>,
    next_temp: u32,
}

impl<'a> CfgBuilder<'a> {
    pub(crate) fn new(function: &'a Function) -> Self {
        let mut cfg = ControlFlowGraph::empty(function.name(), function.unit_id());
        let first = cfg.new_block();
        if let Some(bb) = cfg.block_mut(first) {
            bb.set_attribute(BlockAttributes::ENTRY);
        }
        CfgBuilder {
            function,
            cfg,
            cur: first,
            open_handlers: None,
            last_try: None,
            post_gosub: HashSet::new(),
            next_temp: function.next_var_id(),
        }
    }

    pub(crate) fn build(mut self) -> Result<ControlFlowGraph> {
        if self.function.is_empty() {
            // An empty body gets a sentinel-only graph; drivers skip it.
            return Ok(ControlFlowGraph::empty(
                self.function.name(),
                self.function.unit_id(),
            ));
        }
        self.form_blocks()?;
        self.wire_edges()?;
        Ok(self.cfg)
    }

    // ========================================================================
    // Pass 1: block formation
    // ========================================================================

    fn form_blocks(&mut self) -> Result<()> {
        let len = self.function.body().len();
        for i in 0..len {
            let stmt = self.function.body()[i].clone();
            let has_next = i + 1 < len;
            let next_is_endtry = matches!(self.function.body().get(i + 1), Some(Stmt::EndTry));
            self.form_one(stmt, has_next, next_is_endtry)?;
        }
        if self.open_handlers.is_some() {
            return Err(malformed_error!(
                "try region in `{}` is never closed",
                self.function.name()
            ));
        }
        self.finish_last_block();
        Ok(())
    }

    fn form_one(&mut self, stmt: Stmt, has_next: bool, next_is_endtry: bool) -> Result<()> {
        match stmt {
            Stmt::Label(label) => self.form_label(label),
            Stmt::Goto(_) => {
                self.push(stmt);
                self.set_kind(BlockKind::Goto);
                if has_next {
                    self.finish_block(next_is_endtry);
                }
            }
            Stmt::IndirectGoto { .. } => {
                self.push(stmt);
                self.set_kind(BlockKind::IndirectGoto);
                if has_next {
                    self.finish_block(next_is_endtry);
                }
            }
            Stmt::CondGoto { .. } => {
                // A conditional always spawns its fallthrough block, even at
                // the end of the body; the trailing empty block then gets a
                // synthetic return.
                self.push(stmt);
                self.set_kind(BlockKind::CondGoto);
                self.finish_block(next_is_endtry);
            }
            Stmt::Switch { .. } => {
                self.push(stmt);
                self.set_kind(BlockKind::Switch);
                self.finish_block(next_is_endtry);
            }
            Stmt::Throw(_) => {
                self.push(stmt);
                if self.open_handlers.is_some() {
                    // Unwinds into local handlers, so control transfers like
                    // a branch rather than leaving the function.
                    self.set_kind(BlockKind::Goto);
                } else {
                    self.set_kind_return();
                }
                if has_next {
                    self.finish_block(next_is_endtry);
                }
            }
            Stmt::Return(_) | Stmt::RetSub => {
                self.push(stmt);
                self.set_kind_return();
                if has_next {
                    self.finish_block(next_is_endtry);
                }
            }
            Stmt::Gosub(_) => {
                self.push(stmt);
                self.set_kind_return();
                if has_next {
                    self.finish_block(next_is_endtry);
                    // Execution resumes here once the subroutine returns, so
                    // the block is a function entry in its own right.
                    if let Some(bb) = self.cfg.block_mut(self.cur) {
                        bb.set_attribute(BlockAttributes::ENTRY);
                    }
                    self.post_gosub.insert(self.cur);
                }
            }
            Stmt::Call { no_return: true, .. } => {
                self.push(stmt);
                self.set_kind(BlockKind::NoReturn);
                if has_next {
                    self.finish_block(next_is_endtry);
                }
            }
            Stmt::Try { handlers } => self.form_try(handlers, next_is_endtry)?,
            Stmt::EndTry => self.form_end_try()?,
            Stmt::Catch { catch_all } => self.form_catch(catch_all, next_is_endtry),
            _ => self.push(stmt),
        }
        Ok(())
    }

    fn form_label(&mut self, label: LabelId) {
        let labelled = self
            .cfg
            .block(self.cur)
            .is_some_and(|bb| bb.label().is_some());
        if !self.cur_is_empty() || labelled {
            self.close_current();
            let opened = self.cfg.new_block();
            self.cur = opened;
            if let Some(handlers) = self.open_handlers.clone() {
                if let Some(bb) = self.cfg.block_mut(opened) {
                    bb.set_attribute(BlockAttributes::TRY);
                }
                self.cfg.set_try_handlers(opened, handlers);
            }
        }
        self.cfg.set_label_block(label, self.cur);
        if let Some(bb) = self.cfg.block_mut(self.cur) {
            bb.set_label(label);
        }
    }

    fn form_try(&mut self, handlers: Vec<LabelId>, next_is_endtry: bool) -> Result<()> {
        if self.open_handlers.is_some() {
            return Err(malformed_error!(
                "nested try region in `{}`",
                self.function.name()
            ));
        }
        if !self.cur_is_empty() {
            self.close_current();
            self.cur = self.cfg.new_block();
        }
        // The header keeps the region statement as its only statement.
        let header = self.cur;
        self.push(Stmt::Try {
            handlers: handlers.clone(),
        });
        if let Some(bb) = self.cfg.block_mut(header) {
            bb.set_attribute(BlockAttributes::TRY);
            bb.set_kind(BlockKind::Fallthrough);
        }
        self.cfg.set_try_handlers(header, handlers.clone());
        self.open_handlers = Some(handlers);
        self.last_try = Some(header);
        self.finish_block(next_is_endtry);
        Ok(())
    }

    fn form_end_try(&mut self) -> Result<()> {
        if self.open_handlers.is_none() {
            return Err(malformed_error!(
                "endtry without an open try region in `{}`",
                self.function.name()
            ));
        }
        self.open_handlers = None;
        let labelled = self
            .cfg
            .block(self.cur)
            .is_some_and(|bb| bb.label().is_some());
        if !self.cur_is_empty() || labelled {
            self.close_current();
            if let Some(bb) = self.cfg.block_mut(self.cur) {
                bb.set_attribute(BlockAttributes::TRY_END);
            }
            if let Some(start) = self.last_try {
                self.cfg.set_end_try_start(self.cur, start);
            }
            self.cur = self.cfg.new_block();
        }
        // Otherwise the preceding terminator already took the marker.
        self.last_try = None;
        Ok(())
    }

    fn form_catch(&mut self, catch_all: bool, next_is_endtry: bool) {
        if !self.cur_is_empty() {
            self.close_current();
            let closed = self.cur;
            let opened = self.cfg.new_block();
            self.cur = opened;
            self.apply_try_info(closed, opened, next_is_endtry);
        }
        self.push(Stmt::Catch { catch_all });
        if let Some(bb) = self.cfg.block_mut(self.cur) {
            bb.set_attribute(BlockAttributes::CATCH);
            if catch_all {
                bb.set_attribute(BlockAttributes::FINALLY);
            }
        }
    }

    /// Ends the current block and opens a fresh one, recording try-region
    /// membership on whichever block the region bookkeeping says owns it.
    fn finish_block(&mut self, next_is_endtry: bool) {
        let closed = self.cur;
        let opened = self.cfg.new_block();
        self.cur = opened;
        self.apply_try_info(closed, opened, next_is_endtry);
    }

    /// The statement after a closed block decides the bookkeeping: an
    /// `endtry` means `closed` is the region's last block and takes the
    /// try-end marker; anything else keeps the region open, so the new
    /// block joins it.
    fn apply_try_info(&mut self, closed: BlockId, opened: BlockId, next_is_endtry: bool) {
        let Some(handlers) = self.open_handlers.clone() else {
            return;
        };
        if next_is_endtry {
            if let Some(bb) = self.cfg.block_mut(closed) {
                bb.set_attribute(BlockAttributes::TRY_END);
            }
            if let Some(start) = self.last_try {
                self.cfg.set_end_try_start(closed, start);
            }
        } else {
            if let Some(bb) = self.cfg.block_mut(opened) {
                bb.set_attribute(BlockAttributes::TRY);
            }
            self.cfg.set_try_handlers(opened, handlers);
        }
    }

    /// Gives an unclassified block its default kind when it is closed
    /// without a terminator.
    fn close_current(&mut self) {
        let default = if self.post_gosub.contains(&self.cur) {
            BlockKind::AfterSubroutine
        } else {
            BlockKind::Fallthrough
        };
        if let Some(bb) = self.cfg.block_mut(self.cur) {
            if bb.kind() == BlockKind::Unknown {
                bb.set_kind(default);
            }
        }
    }

    fn finish_last_block(&mut self) {
        let Some(bb) = self.cfg.block_mut(self.cur) else {
            return;
        };
        if bb.is_empty() {
            bb.push_stmt(Stmt::Return(None));
            bb.set_kind_return();
        } else if bb.kind() == BlockKind::Unknown {
            // Trailing straight-line statements return implicitly.
            bb.set_kind_return();
        }
    }

    fn push(&mut self, stmt: Stmt) {
        if let Some(bb) = self.cfg.block_mut(self.cur) {
            bb.push_stmt(stmt);
        }
    }

    fn set_kind(&mut self, kind: BlockKind) {
        if let Some(bb) = self.cfg.block_mut(self.cur) {
            bb.set_kind(kind);
        }
    }

    fn set_kind_return(&mut self) {
        if let Some(bb) = self.cfg.block_mut(self.cur) {
            bb.set_kind_return();
        }
    }

    fn cur_is_empty(&self) -> bool {
        self.cfg.block(self.cur).map_or(true, BasicBlock::is_empty)
    }

    // ========================================================================
    // Pass 2: edge wiring
    // ========================================================================

    fn wire_edges(&mut self) -> Result<()> {
        let mut entries = Vec::new();
        let mut exits = Vec::new();
        let ids: Vec<BlockId> = self.cfg.body_blocks().map(BasicBlock::id).collect();
        for id in ids {
            let Some(bb) = self.cfg.block(id) else { continue };
            if bb.has_attribute(BlockAttributes::ENTRY) {
                entries.push(id);
            }
            if bb.has_attribute(BlockAttributes::EXIT) {
                exits.push(id);
            }
            match bb.kind() {
                BlockKind::Goto => self.wire_goto(id)?,
                BlockKind::CondGoto => self.wire_cond_goto(id)?,
                BlockKind::Switch => self.wire_switch(id)?,
                BlockKind::IndirectGoto => self.wire_indirect_goto(id)?,
                BlockKind::Return | BlockKind::NoReturn => {}
                _ => {
                    if let Some(next) = self.next_block_after(id) {
                        self.cfg.add_succ(id, next);
                    }
                }
            }
            let is_try = self
                .cfg
                .block(id)
                .is_some_and(|bb| bb.has_attribute(BlockAttributes::TRY));
            if is_try {
                self.wire_handlers(id, &mut exits)?;
            }
        }
        for e in entries {
            self.cfg.add_entry(e);
        }
        for x in exits {
            self.cfg.add_exit(x);
        }
        Ok(())
    }

    fn wire_goto(&mut self, id: BlockId) -> Result<()> {
        let target = match self.cfg.block(id).and_then(BasicBlock::last_stmt) {
            // A throw classified as goto reaches only its handlers.
            Some(Stmt::Throw(_)) => return Ok(()),
            Some(&Stmt::Goto(target)) => target,
            _ => {
                return Err(malformed_error!(
                    "goto block {} in `{}` has no branch terminator",
                    id,
                    self.function.name()
                ))
            }
        };
        let target_bb = self.resolve_label(id, target)?;
        self.cfg.add_succ(id, target_bb);
        Ok(())
    }

    fn wire_cond_goto(&mut self, id: BlockId) -> Result<()> {
        let Some(next) = self.next_block_after(id) else {
            return Err(malformed_error!(
                "conditional block {} at the end of `{}`",
                id,
                self.function.name()
            ));
        };
        self.cfg.add_succ(id, next);
        let target = match self.cfg.block(id).and_then(BasicBlock::last_stmt) {
            Some(&Stmt::CondGoto { target, .. }) => target,
            _ => {
                return Err(malformed_error!(
                    "conditional block {} in `{}` has no conditional terminator",
                    id,
                    self.function.name()
                ))
            }
        };
        let target_bb = self.resolve_label(id, target)?;
        if target_bb == next {
            // Both arms reach the same block. Keep the condition value for
            // its side effects under a throwaway name and fall through.
            let cond = match self.cfg.block_mut(id).and_then(BasicBlock::pop_stmt) {
                Some(Stmt::CondGoto { cond, .. }) => cond,
                _ => {
                    return Err(malformed_error!(
                        "conditional block {} in `{}` lost its terminator",
                        id,
                        self.function.name()
                    ))
                }
            };
            let tmp = self.fresh_temp();
            if let Some(bb) = self.cfg.block_mut(id) {
                bb.push_stmt(Stmt::Assign {
                    dest: tmp,
                    src: Operand::Var(cond),
                });
                bb.set_kind(BlockKind::Fallthrough);
            }
        } else {
            self.cfg.add_succ(id, target_bb);
        }
        Ok(())
    }

    fn wire_switch(&mut self, id: BlockId) -> Result<()> {
        let (default, cases) = match self.cfg.block(id).and_then(BasicBlock::last_stmt) {
            Some(Stmt::Switch { default, cases, .. }) => (*default, cases.clone()),
            _ => {
                return Err(malformed_error!(
                    "switch block {} in `{}` has no switch terminator",
                    id,
                    self.function.name()
                ))
            }
        };
        let default_bb = self.resolve_label(id, default)?;
        self.cfg.add_succ(id, default_bb);
        for (_, case) in cases {
            let case_bb = self.resolve_label(id, case)?;
            let present = self
                .cfg
                .block(id)
                .is_some_and(|bb| bb.find_succ(case_bb).is_some());
            if !present {
                self.cfg.add_succ(id, case_bb);
            }
        }
        let only_default = self
            .cfg
            .block(id)
            .is_some_and(|bb| bb.succ_count() == 1);
        if only_default {
            // Every case lands on the default: the dispatch is decided.
            if let Some(bb) = self.cfg.block_mut(id) {
                bb.pop_stmt();
                bb.set_kind(BlockKind::Fallthrough);
            }
        }
        Ok(())
    }

    fn wire_indirect_goto(&mut self, id: BlockId) -> Result<()> {
        for &label in self.function.address_taken_labels() {
            let target_bb = self.resolve_label(id, label)?;
            let present = self
                .cfg
                .block(id)
                .is_some_and(|bb| bb.find_succ(target_bb).is_some());
            if !present {
                self.cfg.add_succ(id, target_bb);
            }
        }
        Ok(())
    }

    fn wire_handlers(&mut self, id: BlockId, exits: &mut Vec<BlockId>) -> Result<()> {
        let Some(handlers) = self.cfg.handlers_of(id).map(<[LabelId]>::to_vec) else {
            return Err(malformed_error!(
                "protected block {} in `{}` carries no handler info",
                id,
                self.function.name()
            ));
        };
        for label in &handlers {
            let handler_bb = self.resolve_label(id, *label)?;
            let is_catch = self
                .cfg
                .block(handler_bb)
                .is_some_and(|bb| bb.has_attribute(BlockAttributes::CATCH));
            if !is_catch {
                return Err(malformed_error!(
                    "handler {} of block {} in `{}` does not start a catch block",
                    label,
                    id,
                    self.function.name()
                ));
            }
            let present = self
                .cfg
                .block(id)
                .is_some_and(|bb| bb.find_succ(handler_bb).is_some());
            if !present {
                self.cfg.add_succ(id, handler_bb);
            }
        }
        if handlers.is_empty() {
            // Nothing catches here; an exception escapes the function.
            let already_exit = self
                .cfg
                .block(id)
                .is_some_and(|bb| bb.has_attribute(BlockAttributes::EXIT));
            if !already_exit {
                if let Some(bb) = self.cfg.block_mut(id) {
                    bb.set_attribute(BlockAttributes::EXIT);
                }
                exits.push(id);
            }
        }
        Ok(())
    }

    fn next_block_after(&self, id: BlockId) -> Option<BlockId> {
        (id.index() + 1..self.cfg.slot_count())
            .map(|i| BlockId::new(u32::try_from(i).unwrap_or(u32::MAX)))
            .find(|&i| self.cfg.block(i).is_some())
    }

    fn resolve_label(&self, from: BlockId, label: LabelId) -> Result<BlockId> {
        self.cfg.label_block(label).ok_or_else(|| {
            malformed_error!(
                "branch target {} of {} in `{}` is undefined",
                label,
                from,
                self.function.name()
            )
        })
    }

    fn fresh_temp(&mut self) -> VarId {
        let var = VarId::new(self.next_temp);
        self.next_temp += 1;
        var
    }
}
