//! Wont-exit marking as a pipeline transform.

use crate::cfg::{mark_wont_exit, ControlFlowGraph};
use crate::phase::{AnalysisDep, AnalysisInfoHook, Phase, PhaseId, PreservationPolicy};

/// The `wontexit` transform phase.
///
/// Wraps [`mark_wont_exit`]: blocks that cannot reach the common exit get
/// the wont-exit attribute, and trapped goto blocks grow an artificial
/// return successor on the exit side. Entry-side structure is untouched,
/// so the declared policy preserves the whole cache.
#[derive(Debug, Default)]
pub struct WontExitPhase;

impl WontExitPhase {
    /// Registry id of this phase.
    pub const ID: PhaseId = PhaseId::new(5);
    /// Registry name of this phase.
    pub const NAME: &'static str = "wontexit";

    /// Creates the phase.
    #[must_use]
    pub fn new() -> Self {
        WontExitPhase
    }
}

impl Phase<ControlFlowGraph> for WontExitPhase {
    fn declare_dependencies(&self, dep: &mut AnalysisDep) {
        dep.set_preserved(PreservationPolicy::PreserveAll);
    }

    fn run(
        &mut self,
        unit: &mut ControlFlowGraph,
        _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
    ) -> bool {
        mark_wont_exit(unit)
    }
}
