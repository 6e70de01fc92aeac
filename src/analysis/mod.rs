//! Function- and module-level analyses shipped with the crate.
//!
//! Each analysis doubles as a [`Phase`](crate::phase::Phase): run under a
//! scheduler it deposits its result in the per-unit cache, where later
//! phases read it back by id. The result structures themselves are plain
//! data and can also be computed directly, outside any pipeline.
//!
//! # Key Types
//!
//! - [`DominatorTree`] - immediate-dominator tree of one function graph
//! - [`LoopForest`] - natural loops with nesting, preheaders, and exits
//! - [`CallGraph`] - module call edges plus bottom-up components
//!
//! Dominance and loops are function-level (`loops` depends on
//! `dominance` and pulls it in on demand); the call graph is
//! module-level and feeds the SCC traversal order of the module
//! optimizer.

pub mod callgraph;
pub mod dominance;
pub mod loops;

pub use callgraph::{CallGraph, CallGraphPhase};
pub use dominance::{DominancePhase, DominatorTree};
pub use loops::{LoopExit, LoopForest, LoopKind, LoopsPhase, NaturalLoop};
