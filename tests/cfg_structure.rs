//! Integration tests for control-flow graph construction and surgery.
//!
//! Every test goes through the public lowering entry point and checks the
//! structural contract the optimization phases lean on:
//! 1. Assemble a statement body with labels and branches
//! 2. Lower it with `ControlFlowGraph::build`
//! 3. Mutate the graph through the surgery API where the test calls for it
//! 4. Re-run the verifiers and walk the adjacency lists by hand

use optir::cfg::{prune_unreachable, BlockId, BlockKind, ControlFlowGraph};
use optir::ir::{CondKind, FuncId, Function, LabelId, Operand, Stmt, VarId};
use optir::{Error, Result};

/// Lowers `stmts` as the body of a function named `f`.
fn lower(stmts: Vec<Stmt>) -> Result<ControlFlowGraph> {
    let mut function = Function::new("f", FuncId::new(0));
    function.extend(stmts);
    ControlFlowGraph::build(&function)
}

/// A diamond: the entry block branches over two arms that join on a
/// returning tail. Lowers to the branch at block 2, the fallthrough arm
/// at 3, the taken arm at 4, and the join at 5.
fn diamond() -> Result<ControlFlowGraph> {
    lower(vec![
        Stmt::Assign {
            dest: VarId::new(0),
            src: Operand::Const(1),
        },
        Stmt::CondGoto {
            kind: CondKind::BrTrue,
            cond: VarId::new(0),
            target: LabelId::new(0),
        },
        Stmt::Assign {
            dest: VarId::new(1),
            src: Operand::Const(2),
        },
        Stmt::Goto(LabelId::new(1)),
        Stmt::Label(LabelId::new(0)),
        Stmt::Assign {
            dest: VarId::new(1),
            src: Operand::Const(3),
        },
        Stmt::Label(LabelId::new(1)),
        Stmt::Return(None),
    ])
}

#[test]
fn test_lowered_edges_are_mirrored_on_both_sides() -> Result<()> {
    let cfg = diamond()?;

    for bb in cfg.body_blocks() {
        for &succ in bb.succs() {
            let other = cfg.block(succ).expect("successor exists");
            assert!(
                other.preds().contains(&bb.id()),
                "block {} lists successor {} but is missing from its predecessors",
                bb.id(),
                succ
            );
        }
        for &pred in bb.preds() {
            let other = cfg.block(pred).expect("predecessor exists");
            assert!(
                other.succs().contains(&bb.id()),
                "block {} lists predecessor {} but is missing from its successors",
                bb.id(),
                pred
            );
        }
    }

    // Sentinel registration is one-sided: the entry block knows nothing
    // about the common-entry sentinel.
    assert_eq!(cfg.entries(), &[BlockId::new(2)], "one registered entry");
    assert!(
        cfg.block(BlockId::new(2))
            .expect("entry block exists")
            .preds()
            .is_empty(),
        "the entry block must not list the sentinel as a predecessor"
    );
    assert_eq!(cfg.exits(), &[BlockId::new(5)], "one registered exit");
    assert!(cfg.is_exit(BlockId::new(5)), "the join returns");
    Ok(())
}

#[test]
fn test_branch_block_shape_and_label_wiring() -> Result<()> {
    let cfg = diamond()?;
    let branch = cfg.block(BlockId::new(2)).expect("branch block exists");

    assert_eq!(branch.kind(), BlockKind::CondGoto);
    assert_eq!(
        branch.succs(),
        &[BlockId::new(3), BlockId::new(4)],
        "a conditional lists fallthrough first, branch target second"
    );
    assert_eq!(
        cfg.label_block(LabelId::new(0)),
        Some(BlockId::new(4)),
        "the branch label resolves to the taken arm"
    );
    assert_eq!(
        branch.true_false_branches(),
        Some((BlockId::new(4), BlockId::new(3))),
        "br-true takes the labeled arm when the condition holds"
    );
    assert_eq!(
        cfg.block(BlockId::new(3)).expect("arm exists").kind(),
        BlockKind::Goto,
        "the fallthrough arm ends in the join goto"
    );
    assert_eq!(
        cfg.block(BlockId::new(5)).expect("join exists").preds(),
        &[BlockId::new(3), BlockId::new(4)],
        "both arms join on the tail"
    );
    Ok(())
}

#[test]
fn test_switch_successors_come_deduplicated_default_first() -> Result<()> {
    let cfg = lower(vec![
        Stmt::Switch {
            opnd: VarId::new(0),
            default: LabelId::new(0),
            cases: vec![
                (0, LabelId::new(1)),
                (1, LabelId::new(0)),
                (2, LabelId::new(1)),
            ],
        },
        Stmt::Label(LabelId::new(0)),
        Stmt::Goto(LabelId::new(2)),
        Stmt::Label(LabelId::new(1)),
        Stmt::Assign {
            dest: VarId::new(1),
            src: Operand::Const(0),
        },
        Stmt::Label(LabelId::new(2)),
        Stmt::Return(None),
    ])?;

    let dispatch = cfg.block(BlockId::new(2)).expect("dispatch block exists");
    assert_eq!(dispatch.kind(), BlockKind::Switch);
    assert_eq!(
        dispatch.succs(),
        &[BlockId::new(3), BlockId::new(4)],
        "default first, then each distinct case target once"
    );
    assert_eq!(
        cfg.block(BlockId::new(3)).expect("default arm exists").preds(),
        &[BlockId::new(2)]
    );
    assert_eq!(
        cfg.block(BlockId::new(4)).expect("case arm exists").preds(),
        &[BlockId::new(2)]
    );
    cfg.verify_labels()?;
    Ok(())
}

#[test]
fn test_verifiers_accept_every_lowered_shape() -> Result<()> {
    let cfg = diamond()?;
    cfg.verify()?;
    cfg.verify_labels()?;
    cfg.verify_frequencies()?;

    let looped = lower(vec![
        Stmt::Label(LabelId::new(0)),
        Stmt::CondGoto {
            kind: CondKind::BrFalse,
            cond: VarId::new(0),
            target: LabelId::new(0),
        },
        Stmt::Return(None),
    ])?;
    looped.verify()?;
    looped.verify_labels()?;
    looped.verify_frequencies()?;
    Ok(())
}

#[test]
fn test_branch_to_missing_label_is_malformed() {
    let goto = lower(vec![Stmt::Goto(LabelId::new(7))]);
    assert!(
        matches!(goto, Err(Error::Malformed { .. })),
        "a goto to an undefined label must be rejected at build time"
    );

    let case = lower(vec![
        Stmt::Switch {
            opnd: VarId::new(0),
            default: LabelId::new(0),
            cases: vec![(0, LabelId::new(9))],
        },
        Stmt::Label(LabelId::new(0)),
        Stmt::Return(None),
    ]);
    assert!(
        matches!(case, Err(Error::Malformed { .. })),
        "a switch case naming an undefined label must be rejected"
    );
}

#[test]
fn test_split_and_merge_restore_the_lowered_branch() -> Result<()> {
    let mut cfg = diamond()?;
    let branch = BlockId::new(2);
    let original_stmts = cfg
        .block(branch)
        .expect("branch block exists")
        .stmts()
        .to_vec();
    let original_count = cfg.block_count();

    // Splitting before the terminator leaves the assignment in the head
    // and moves the conditional with both arms into the tail.
    let tail = cfg.split_block(branch, 1);
    assert_eq!(
        cfg.block(branch).expect("head exists").kind(),
        BlockKind::Fallthrough
    );
    assert_eq!(cfg.block(branch).expect("head exists").succs(), &[tail]);
    assert_eq!(
        cfg.block(tail).expect("tail exists").kind(),
        BlockKind::CondGoto
    );
    cfg.verify()?;
    cfg.verify_labels()?;

    assert!(cfg.merge_block(branch), "a lone fallthrough tail merges back");
    let taken = cfg.label_block(LabelId::new(0)).expect("label survives");
    let merged = cfg.block(branch).expect("merged block exists");
    assert_eq!(merged.kind(), BlockKind::CondGoto);
    assert_eq!(merged.stmts(), &original_stmts[..]);
    assert_eq!(
        merged.succs()[1],
        taken,
        "the taken arm is wired to the branch label again"
    );
    assert_eq!(cfg.block_count(), original_count);
    assert!(cfg.block(tail).is_none(), "the tail slot is gone");
    cfg.verify()?;
    cfg.verify_labels()?;
    Ok(())
}

#[test]
fn test_frequency_bookkeeping_survives_split_and_merge() -> Result<()> {
    let mut cfg = diamond()?;
    let branch = BlockId::new(2);
    {
        let bb = cfg.block_mut(branch).expect("branch block exists");
        bb.set_frequency(100);
        bb.set_edge_freq(0, 60);
        bb.set_edge_freq(1, 40);
    }
    cfg.verify_frequencies()?;

    cfg.split_block(branch, 1);
    cfg.verify_frequencies()?;

    assert!(cfg.merge_block(branch));
    let merged = cfg.block(branch).expect("merged block exists");
    assert_eq!(merged.frequency(), 100);
    assert_eq!(merged.succ_freqs(), &[60, 40]);
    cfg.verify_frequencies()?;
    Ok(())
}

#[test]
fn test_prune_removes_a_cut_arm_and_settles() -> Result<()> {
    let mut cfg = diamond()?;
    assert!(
        !prune_unreachable(&mut cfg, true),
        "a fully reachable graph has nothing to prune"
    );

    let taken = cfg.label_block(LabelId::new(0)).expect("label resolves");
    cfg.remove_succ(BlockId::new(2), taken, true);
    assert!(
        prune_unreachable(&mut cfg, true),
        "the stranded arm must be swept"
    );
    assert!(cfg.block(taken).is_none(), "the cut arm is deleted");
    assert_eq!(
        cfg.block(BlockId::new(5)).expect("join survives").preds(),
        &[BlockId::new(3)],
        "the join keeps only the surviving arm as predecessor"
    );
    assert!(
        !prune_unreachable(&mut cfg, true),
        "a second sweep finds nothing"
    );
    Ok(())
}

#[test]
fn test_dot_dump_names_the_function_and_draws_edges() -> Result<()> {
    let cfg = diamond()?;
    let dot = cfg.to_dot(false);
    assert!(dot.starts_with("digraph {"), "dot output opens a digraph");
    assert!(
        dot.contains("label=\"f\";"),
        "the graph carries the function name"
    );
    assert!(dot.contains(" -> "), "edges are drawn");
    Ok(())
}
