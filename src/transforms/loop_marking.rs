//! Attribute marking of loop membership.

use crate::analysis::{LoopForest, LoopsPhase};
use crate::cfg::{BasicBlock, BlockAttributes, BlockId, ControlFlowGraph};
use crate::phase::{AnalysisDep, AnalysisInfoHook, Phase, PhaseId, PreservationPolicy};

/// The `loop-marking` transform phase.
///
/// Synchronizes every body block's in-loop attribute with the cached
/// `loops` result: blocks inside any natural loop gain the attribute,
/// blocks outside lose a stale one. Attributes are the only thing
/// touched, so the declared policy preserves the whole cache.
#[derive(Debug, Default)]
pub struct LoopMarkingPhase;

impl LoopMarkingPhase {
    /// Registry id of this phase.
    pub const ID: PhaseId = PhaseId::new(3);
    /// Registry name of this phase.
    pub const NAME: &'static str = "loop-marking";

    /// Creates the phase.
    #[must_use]
    pub fn new() -> Self {
        LoopMarkingPhase
    }
}

impl Phase<ControlFlowGraph> for LoopMarkingPhase {
    fn declare_dependencies(&self, dep: &mut AnalysisDep) {
        dep.add_required(LoopsPhase::ID)
            .set_preserved(PreservationPolicy::PreserveAll);
    }

    fn run(
        &mut self,
        unit: &mut ControlFlowGraph,
        hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
    ) -> bool {
        let forest = hook.expect_result::<LoopForest>(unit.unit_id(), LoopsPhase::ID);
        let body: Vec<BlockId> = unit.body_blocks().map(BasicBlock::id).collect();
        let mut changed = false;
        for id in body {
            let inside = forest.is_in_loop(id);
            let Some(bb) = unit.block_mut(id) else { continue };
            let marked = bb.has_attribute(BlockAttributes::IN_LOOP);
            if inside && !marked {
                bb.set_attribute(BlockAttributes::IN_LOOP);
                changed = true;
            } else if !inside && marked {
                bb.clear_attribute(BlockAttributes::IN_LOOP);
                changed = true;
            }
        }
        changed
    }
}
