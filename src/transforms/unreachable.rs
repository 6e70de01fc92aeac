//! Unreachable-block elimination as a pipeline transform.

use crate::cfg::{prune_unreachable, ControlFlowGraph};
use crate::phase::{AnalysisInfoHook, Phase, PhaseId};

/// The `unreachable-elim` transform phase.
///
/// Wraps [`prune_unreachable`] with φ-maintenance enabled. The phase
/// declares nothing, so the default preservation policy applies and every
/// cached analysis result of the unit is evicted once the body returns;
/// deleting blocks invalidates any graph-shaped result.
#[derive(Debug, Default)]
pub struct UnreachableElimPhase;

impl UnreachableElimPhase {
    /// Registry id of this phase.
    pub const ID: PhaseId = PhaseId::new(4);
    /// Registry name of this phase.
    pub const NAME: &'static str = "unreachable-elim";

    /// Creates the phase.
    #[must_use]
    pub fn new() -> Self {
        UnreachableElimPhase
    }
}

impl Phase<ControlFlowGraph> for UnreachableElimPhase {
    fn run(
        &mut self,
        unit: &mut ControlFlowGraph,
        _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
    ) -> bool {
        prune_unreachable(unit, true)
    }
}
