//! # optir Prelude
//!
//! This module provides a convenient prelude for the most commonly used
//! types and traits in the library. Import it to lower IR into graphs,
//! write phases, and drive pipelines without a pile of `use` lines.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all optir operations
pub use crate::Error;

/// The result type used throughout optir
pub use crate::Result;

// ================================================================================================
// Input IR
// ================================================================================================

/// Modules and functions of the flat input IR
pub use crate::ir::{Function, Module};

/// Statements, operands, and the IR id spaces
pub use crate::ir::{CondKind, FuncId, LabelId, Operand, Stmt, VarId};

// ================================================================================================
// Control-Flow Graphs
// ================================================================================================

/// The per-function graph and its blocks
pub use crate::cfg::{BasicBlock, BlockAttributes, BlockId, BlockKind, ControlFlowGraph, PhiNode};

/// Graph sweeps shared by transforms and standalone callers
pub use crate::cfg::{mark_wont_exit, prune_unreachable};

// ================================================================================================
// Phase System
// ================================================================================================

/// The phase trait and its identity types
pub use crate::phase::{IrUnit, Phase, PhaseId, PhaseKind, UnitId};

/// Registration and scheduling
pub use crate::phase::{PhaseInfo, PhaseRegistry, PhaseScheduler, PhaseSequence};

/// Dependency declarations and result caching
pub use crate::phase::{AnalysisDataManager, AnalysisDep, AnalysisInfoHook, PreservationPolicy};

/// Scheduling observability
pub use crate::phase::{PhaseEvent, PhaseLog, PhaseTimings};

// ================================================================================================
// Shipped Analyses
// ================================================================================================

/// Dominator-tree computation
pub use crate::analysis::{DominancePhase, DominatorTree};

/// Natural-loop detection, classification, and nesting
pub use crate::analysis::{LoopForest, LoopKind, LoopsPhase, NaturalLoop};

/// Call-graph construction and condensation
pub use crate::analysis::{CallGraph, CallGraphPhase};

// ================================================================================================
// Shipped Transforms
// ================================================================================================

/// The graph-cleanup and attribute-marking transforms
pub use crate::transforms::{
    LoopMarkingPhase, UnreachableElimPhase, VerifyCfgPhase, WontExitPhase,
};

// ================================================================================================
// Sessions and Drivers
// ================================================================================================

/// Pipeline configuration and the module/function/component drivers
pub use crate::session::{DriverOutcome, Session, SessionOptions};
