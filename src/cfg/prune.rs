//! Whole-graph cleanups that run between construction and the first
//! dataflow pass: unreachable-block removal and exit analysis.
//!
//! Both sweeps work from a sentinel-rooted traversal. Unreachable blocks
//! are those no forward walk from the common entry visits; blocks that
//! cannot exit are those no backward walk from the common exit visits.

use crate::cfg::block::{BasicBlock, BlockAttributes, BlockId, BlockKind};
use crate::cfg::graph::ControlFlowGraph;

/// Deletes every block that no function entry reaches.
///
/// A deleted block is detached from each successor's predecessor list and
/// unregistered from the common-exit sentinel. With `update_phi` set the
/// successors' φ-nodes lose the operand of the removed edge and degrade
/// once a single predecessor remains.
///
/// Exception regions get two repairs. An unreachable region header whose
/// region still contains reachable blocks is kept and rewired to fall
/// through to the first of them, so the region keeps a header; a header
/// whose whole region is dead goes out with the rest. When the block
/// carrying the region's end marker is deleted, the marker moves to the
/// closest surviving in-region block ahead of it.
///
/// Returns whether the graph changed.
pub fn prune_unreachable(cfg: &mut ControlFlowGraph, update_phi: bool) -> bool {
    let mut reachable = cfg.find_reachable();
    let body: Vec<BlockId> = cfg.body_blocks().map(BasicBlock::id).collect();
    let mut changed = false;
    for (pos, &id) in body.iter().enumerate() {
        if reachable[id.index()] {
            continue;
        }
        let Some(bb) = cfg.block(id) else { continue };
        if bb.has_attribute(BlockAttributes::ENTRY) {
            continue;
        }
        let is_try_end = bb.has_attribute(BlockAttributes::TRY_END);
        if cfg.is_try_start(id) && fix_try_header(cfg, pos, &body, &mut reachable) {
            changed = true;
            continue;
        }
        if is_try_end {
            move_try_end_marker(cfg, pos, &body, id);
        }
        let Some(removed) = cfg.delete_block(id) else {
            continue;
        };
        for &succ in removed.succs() {
            detach_dead_pred(cfg, succ, id, update_phi);
        }
        cfg.remove_exit(id);
        changed = true;
    }
    changed
}

/// Keeps an unreachable region header alive when part of its region is
/// still reachable.
///
/// Scans forward for the first reachable block of the region. If the scan
/// hits the region's end marker on a dead block first, the whole region is
/// dead and the header reports unfixed so the caller deletes it. Otherwise
/// every predecessor of the found block is re-pointed at the header, the
/// header's own edges are replaced by a single fallthrough into the block,
/// and the header counts as reachable from here on.
fn fix_try_header(
    cfg: &mut ControlFlowGraph,
    pos: usize,
    body: &[BlockId],
    reachable: &mut [bool],
) -> bool {
    let start = body[pos];
    for &next in &body[pos + 1..] {
        let Some(bb) = cfg.block(next) else { continue };
        if !reachable[next.index()] && bb.has_attribute(BlockAttributes::TRY_END) {
            return false;
        }
        if !reachable[next.index()] {
            continue;
        }
        cfg.remove_all_pred(start);
        while let Some(&pred) = cfg.block(next).and_then(|bb| bb.preds().first()) {
            cfg.replace_succ(pred, next, start);
        }
        cfg.remove_all_succ(start, true);
        cfg.add_succ(start, next);
        reachable[start.index()] = true;
        return true;
    }
    false
}

/// Moves the try-end marker of a block about to be deleted onto the
/// closest live block ahead of it, provided that block is inside the same
/// region. A region that lost all its blocks loses the marker with them.
fn move_try_end_marker(cfg: &mut ControlFlowGraph, pos: usize, body: &[BlockId], end: BlockId) {
    for &prev in body[..pos].iter().rev() {
        let Some(bb) = cfg.block(prev) else { continue };
        if bb.has_attribute(BlockAttributes::TRY) && !bb.has_attribute(BlockAttributes::TRY_END) {
            if let Some(start) = cfg.try_start_of(end) {
                cfg.set_end_try_start(prev, start);
            }
            if let Some(bb) = cfg.block_mut(prev) {
                bb.set_attribute(BlockAttributes::TRY_END);
            }
        }
        return;
    }
}

/// Removes the deleted block `dead` from `succ`'s predecessor list.
fn detach_dead_pred(cfg: &mut ControlFlowGraph, succ: BlockId, dead: BlockId, update_phi: bool) {
    let Some(bb) = cfg.block_mut(succ) else { return };
    let Some(index) = bb.find_pred(dead) else { return };
    bb.remove_pred_at(index, update_phi);
    if update_phi {
        cfg.degrade_phis(succ);
    }
}

/// Marks every block from which no path reaches the common exit.
///
/// Such blocks sit in or behind infinite loops. Each gets the wont-exit
/// attribute; a goto block among them additionally grows an artificial
/// return successor registered with the common-exit sentinel, so backward
/// dataflow over exits still visits the loop. Already-marked blocks are
/// left alone, so a repeated sweep finds nothing new.
///
/// Returns whether any block was newly marked.
pub fn mark_wont_exit(cfg: &mut ControlFlowGraph) -> bool {
    let will_exit = cfg.find_will_exit();
    let body: Vec<BlockId> = cfg.body_blocks().map(BasicBlock::id).collect();
    let mut changed = false;
    for id in body {
        if will_exit[id.index()] {
            continue;
        }
        let Some(bb) = cfg.block_mut(id) else { continue };
        if bb.has_attribute(BlockAttributes::WONT_EXIT) {
            continue;
        }
        bb.set_attribute(BlockAttributes::WONT_EXIT);
        changed = true;
        if bb.kind() == BlockKind::Goto {
            let tail = cfg.new_block();
            if let Some(bb) = cfg.block_mut(tail) {
                bb.set_kind_return();
                bb.set_attribute(BlockAttributes::ARTIFICIAL);
            }
            cfg.add_succ(id, tail);
            cfg.add_exit(tail);
        }
    }
    changed
}
