//! Structural verification as a skippable pipeline phase.

use crate::cfg::ControlFlowGraph;
use crate::error::raise_fatal;
use crate::phase::{AnalysisDep, AnalysisInfoHook, Phase, PhaseId, PreservationPolicy};

/// The `cfg-verify` transform phase.
///
/// Runs the graph's structural, label, and frequency checks in order and
/// escalates the first failure to a fatal diagnostic: a verifier failure
/// means an earlier phase corrupted the unit, and there is no way to
/// continue compiling it. The phase never changes the unit and preserves
/// the whole cache.
///
/// Registered skippable, so production pipelines can bypass it with the
/// skip options while debug pipelines keep it between transforms.
#[derive(Debug, Default)]
pub struct VerifyCfgPhase;

impl VerifyCfgPhase {
    /// Registry id of this phase.
    pub const ID: PhaseId = PhaseId::new(6);
    /// Registry name of this phase.
    pub const NAME: &'static str = "cfg-verify";

    /// Creates the phase.
    #[must_use]
    pub fn new() -> Self {
        VerifyCfgPhase
    }
}

impl Phase<ControlFlowGraph> for VerifyCfgPhase {
    fn declare_dependencies(&self, dep: &mut AnalysisDep) {
        dep.set_preserved(PreservationPolicy::PreserveAll);
    }

    fn run(
        &mut self,
        unit: &mut ControlFlowGraph,
        _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
    ) -> bool {
        let checked = unit
            .verify()
            .and_then(|()| unit.verify_labels())
            .and_then(|()| unit.verify_frequencies());
        if let Err(error) = checked {
            raise_fatal(&error);
        }
        false
    }
}
