//! Statement-level intermediate representation.
//!
//! This module holds the pre-CFG form of a compilation: a [`Module`] of
//! [`Function`]s whose bodies are flat [`Stmt`] sequences. The middle end
//! consumes this form exactly once per function, when
//! [`ControlFlowGraph::build`](crate::cfg::ControlFlowGraph::build) groups
//! the statements into basic blocks; afterwards the graph's blocks own the
//! working statement lists and all mutation happens there.
//!
//! # Key Types
//!
//! - [`Module`] - Ordered collection of functions, the module-level unit
//! - [`Function`] - One function body plus label/variable id counters
//! - [`Stmt`] - A single statement; terminators end basic blocks
//! - [`LabelId`] / [`VarId`] / [`FuncId`] - Strongly-typed dense identifiers

mod function;
mod module;
mod stmt;

pub use function::Function;
pub use module::Module;
pub use stmt::{CondKind, FuncId, LabelId, Operand, Stmt, VarId};
