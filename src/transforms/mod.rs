//! Function-level transform phases shipped with the crate.
//!
//! Each transform wraps one graph operation behind the
//! [`Phase`](crate::phase::Phase) contract and declares how the unit's
//! cached analysis results fare once it ran:
//!
//! - [`UnreachableElimPhase`] deletes dead blocks; evicts everything.
//! - [`LoopMarkingPhase`] syncs in-loop attributes; preserves everything.
//! - [`WontExitPhase`] marks exit-trapped blocks; preserves everything.
//! - [`VerifyCfgPhase`] checks invariants, skippable; preserves everything.

pub mod loop_marking;
pub mod unreachable;
pub mod verify;
pub mod wontexit;

pub use loop_marking::LoopMarkingPhase;
pub use unreachable::UnreachableElimPhase;
pub use verify::VerifyCfgPhase;
pub use wontexit::WontExitPhase;
