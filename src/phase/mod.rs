//! The analysis and transform phase scheduler.
//!
//! Middle-end work is packaged as phases: an analysis computes a cacheable
//! result for a unit, a transform mutates the unit and declares which
//! cached results survive it. A [`PhaseRegistry`] maps stable ids and names
//! to constructors, and a [`PhaseScheduler`] runs phases over units of one
//! kind, resolving declared dependencies on demand and keeping results in
//! an [`AnalysisDataManager`].
//!
//! # Key Types
//!
//! - [`Phase`] - One unit of work; implemented by every analysis and transform
//! - [`PhaseRegistry`] / [`PhaseInfo`] - Id, name, kind, and constructor table
//! - [`PhaseScheduler`] - Dependency resolution, memoization, invalidation
//! - [`AnalysisDataManager`] - The per-scheduler result cache
//! - [`AnalysisInfoHook`] - A running body's handle back into the scheduler
//! - [`AnalysisDep`] / [`PreservationPolicy`] - What a phase needs and keeps
//! - [`PhaseLog`] / [`PhaseTimings`] - Event record and wall-clock table
//!
//! # Scheduling Contract
//!
//! Analyses are memoized per (unit, phase) and must deposit a result;
//! transforms run every time and finish by invalidating cached results
//! according to their preservation policy. Dependencies run before the
//! demanding body, in declaration order, recursively. Invalidation touches
//! only installed results, never the open scope of an analysis that is
//! still running further up the stack.

mod dep;
mod events;
mod hook;
mod manager;
mod registry;
mod scheduler;

pub use dep::{AnalysisDep, PreservationPolicy};
pub use events::{PhaseEvent, PhaseLog, PhaseTiming, PhaseTimings};
pub use hook::AnalysisInfoHook;
pub use manager::{AnalysisDataManager, AnalysisKey};
pub use registry::{
    IrUnit, Phase, PhaseConstructor, PhaseId, PhaseInfo, PhaseKind, PhaseRegistry, PhaseSequence,
    UnitId,
};
pub use scheduler::PhaseScheduler;
