//! Benchmarks for graph construction and phase scheduling.
//!
//! Measures the hot paths of the middle end:
//! - Lowering statement bodies to control-flow graphs (chains, branches,
//!   switch dispatch)
//! - Dominator tree and loop forest computation over nested loops
//! - Scheduler cache hits and a full shipped pipeline

extern crate optir;

use criterion::{criterion_group, criterion_main, Criterion};
use optir::analysis::{DominatorTree, LoopForest, LoopsPhase};
use optir::cfg::ControlFlowGraph;
use optir::ir::{CondKind, FuncId, Function, LabelId, Operand, Stmt, VarId};
use optir::{Session, SessionOptions};
use std::hint::black_box;

/// A function whose body is `blocks` goto-linked blocks ending in a return.
fn chain_function(blocks: u32) -> Function {
    let mut function = Function::new("chain", FuncId::new(0));
    let mut stmts = Vec::with_capacity(2 * blocks as usize + 1);
    for i in 0..blocks {
        stmts.push(Stmt::Goto(LabelId::new(i)));
        stmts.push(Stmt::Label(LabelId::new(i)));
    }
    stmts.push(Stmt::Return(None));
    function.extend(stmts);
    function
}

/// A function dispatching over `cases` switch arms that all rejoin.
fn switch_function(cases: u32) -> Function {
    let mut function = Function::new("dispatch", FuncId::new(0));
    let join = LabelId::new(cases + 1);
    let mut stmts = vec![Stmt::Switch {
        opnd: VarId::new(0),
        default: LabelId::new(0),
        cases: (1..=cases)
            .map(|i| (i64::from(i), LabelId::new(i)))
            .collect(),
    }];
    for i in 0..=cases {
        stmts.push(Stmt::Label(LabelId::new(i)));
        stmts.push(Stmt::Goto(join));
    }
    stmts.push(Stmt::Label(join));
    stmts.push(Stmt::Return(None));
    function.extend(stmts);
    function
}

/// A two-deep loop nest: an inner counted loop inside an outer loop with
/// a single exit.
fn nested_loop_function() -> Function {
    let outer = LabelId::new(0);
    let inner = LabelId::new(1);
    let inner_exit = LabelId::new(2);
    let exit = LabelId::new(3);
    let mut function = Function::new("nest", FuncId::new(0));
    function.extend(vec![
        Stmt::Label(outer),
        Stmt::CondGoto {
            kind: CondKind::BrTrue,
            cond: VarId::new(0),
            target: exit,
        },
        Stmt::Label(inner),
        Stmt::CondGoto {
            kind: CondKind::BrTrue,
            cond: VarId::new(1),
            target: inner_exit,
        },
        Stmt::Assign {
            dest: VarId::new(1),
            src: Operand::Const(1),
        },
        Stmt::Goto(inner),
        Stmt::Label(inner_exit),
        Stmt::Goto(outer),
        Stmt::Label(exit),
        Stmt::Return(None),
    ]);
    function
}

/// Benchmark lowering a straight 64-block goto chain.
fn bench_build_chain(c: &mut Criterion) {
    let function = chain_function(64);

    c.bench_function("cfg_build_chain_64", |b| {
        b.iter(|| {
            let cfg = ControlFlowGraph::build(black_box(&function)).unwrap();
            black_box(cfg)
        });
    });
}

/// Benchmark lowering a 32-arm switch dispatch.
fn bench_build_switch(c: &mut Criterion) {
    let function = switch_function(32);

    c.bench_function("cfg_build_switch_32", |b| {
        b.iter(|| {
            let cfg = ControlFlowGraph::build(black_box(&function)).unwrap();
            black_box(cfg)
        });
    });
}

/// Benchmark lowering the nested loop body.
fn bench_build_nested_loops(c: &mut Criterion) {
    let function = nested_loop_function();

    c.bench_function("cfg_build_nested_loops", |b| {
        b.iter(|| {
            let cfg = ControlFlowGraph::build(black_box(&function)).unwrap();
            black_box(cfg)
        });
    });
}

/// Benchmark the dominator tree over the nested loop graph.
fn bench_dominance(c: &mut Criterion) {
    let cfg = ControlFlowGraph::build(&nested_loop_function()).unwrap();

    c.bench_function("analysis_dominance_nested", |b| {
        b.iter(|| {
            let tree = DominatorTree::compute(black_box(&cfg));
            black_box(tree)
        });
    });
}

/// Benchmark loop detection given a precomputed dominator tree.
fn bench_loop_forest(c: &mut Criterion) {
    let cfg = ControlFlowGraph::build(&nested_loop_function()).unwrap();
    let tree = DominatorTree::compute(&cfg);

    c.bench_function("analysis_loops_nested", |b| {
        b.iter(|| {
            let forest = LoopForest::detect(black_box(&cfg), black_box(&tree));
            black_box(forest)
        });
    });
}

/// Benchmark the scheduler's memoized fast path: every request after the
/// first is answered from the result cache.
fn bench_scheduler_cache_hit(c: &mut Criterion) {
    let session = Session::new(SessionOptions::default());
    let mut scheduler = session.scheduler();
    let mut cfg = ControlFlowGraph::build(&nested_loop_function()).unwrap();
    scheduler.run_analysis_phase(LoopsPhase::ID, &mut cfg);

    c.bench_function("phase_cache_hit", |b| {
        b.iter(|| black_box(scheduler.run_analysis_phase(LoopsPhase::ID, &mut cfg)));
    });
}

/// Benchmark one function through the whole shipped pipeline, lowering
/// included, the way the session driver processes it.
fn bench_full_pipeline(c: &mut Criterion) {
    let session = Session::new(SessionOptions::default());
    let sequence = session.function_registry().resolve_sequence(&[
        "dominance",
        "loops",
        "loop-marking",
        "unreachable-elim",
        "wontexit",
        "cfg-verify",
    ]);
    let function = nested_loop_function();

    c.bench_function("pipeline_nested_loops", |b| {
        b.iter(|| {
            let mut cfg = ControlFlowGraph::build(black_box(&function)).unwrap();
            let mut scheduler = session.scheduler();
            black_box(scheduler.run_pipeline(&sequence, &mut cfg))
        });
    });
}

criterion_group!(
    benches,
    // Graph construction
    bench_build_chain,
    bench_build_switch,
    bench_build_nested_loops,
    // Analyses
    bench_dominance,
    bench_loop_forest,
    // Scheduling
    bench_scheduler_cache_hit,
    bench_full_pipeline,
);
criterion_main!(benches);
