//! Per-function control-flow graph construction, mutation, and checks.
//!
//! The graph is the working representation of a function inside the middle
//! end: [`ControlFlowGraph::build`] groups a flat statement body into basic
//! blocks and wires edges, transform phases mutate the graph through its
//! invariant-preserving edge and block operations, and the verification
//! checks catch structural damage close to the phase that caused it.
//!
//! # Key Types
//!
//! - [`ControlFlowGraph`] - The block table, label index, and try-region maps
//! - [`BasicBlock`] - One block: kind, attributes, statements, φ-nodes, edges
//! - [`BlockId`] - Dense block id; slots 0 and 1 are the sentinels
//! - [`BlockKind`] / [`BlockAttributes`] - Terminator class and block flags
//! - [`PhiNode`] - SSA φ with operands parallel to the predecessor list
//!
//! # Sentinels
//!
//! Every graph carries a common-entry and a common-exit sentinel. They give
//! forward and backward dataflow a single root even when a function has
//! several entries (subroutine resumption points) or several exits (returns
//! and uncaught throws). Sentinel adjacency is one-sided: only the
//! sentinel's own edge list records it, so ordinary pred/succ lists never
//! mention blocks 0 and 1.
//!
//! # Cleanup Passes
//!
//! [`prune_unreachable`] deletes blocks no entry reaches and keeps the
//! try-region bookkeeping consistent while doing so; [`mark_wont_exit`]
//! flags blocks trapped in infinite loops and grafts artificial exits onto
//! them so backward analyses still terminate.

mod block;
mod build;
mod dot;
mod graph;
mod phi;
mod prune;

pub use block::{BasicBlock, BlockAttributes, BlockId, BlockKind};
pub use graph::ControlFlowGraph;
pub use phi::PhiNode;
pub use prune::{mark_wont_exit, prune_unreachable};
