//! In-body access to the scheduler from a running phase.
//!
//! Declared dependencies are resolved before a phase body starts, but some
//! phases only discover mid-run that they need a result, want one dropped,
//! or need to consult a cache kept at a coarser IR level. The
//! [`AnalysisInfoHook`] is the narrow door for that: a short-lived handle
//! the scheduler passes into every body, carrying the demanding phase's
//! name and nesting depth so forced work is attributed correctly in the
//! event log.

use std::any::Any;

use crate::error::raise_fatal;
use crate::phase::manager::AnalysisDataManager;
use crate::phase::registry::{IrUnit, PhaseId, PhaseInfo, UnitId};
use crate::phase::scheduler::PhaseScheduler;

/// A running phase's handle back into its scheduler.
///
/// Forced runs recurse through the same machinery as declared
/// dependencies: analyses stay memoized, transforms apply their
/// preservation policy, and every run or eviction lands in the log
/// attributed to the phase that forced it.
pub struct AnalysisInfoHook<'h, 's, U: IrUnit> {
    scheduler: &'h mut PhaseScheduler<'s, U>,
    /// Name of the phase whose body holds this hook.
    current: &'static str,
    /// Nesting depth of that body; forced work runs one level deeper.
    depth: usize,
}

impl<'h, 's, U: IrUnit> AnalysisInfoHook<'h, 's, U> {
    pub(crate) fn new(
        scheduler: &'h mut PhaseScheduler<'s, U>,
        current: &'static str,
        depth: usize,
    ) -> Self {
        AnalysisInfoHook {
            scheduler,
            current,
            depth,
        }
    }

    /// Returns whether an analysis result is cached for `unit`.
    #[must_use]
    pub fn is_available(&self, unit: UnitId, id: PhaseId) -> bool {
        self.scheduler.manager().is_available((unit, id))
    }

    /// Returns the cached result of an analysis, aborting if it has not
    /// run or was cached with a different payload type.
    ///
    /// Declared dependencies are guaranteed to be available here; anything
    /// else should be checked with [`is_available`](Self::is_available) or
    /// forced first.
    #[must_use]
    pub fn expect_result<T: Any>(&self, unit: UnitId, id: PhaseId) -> &T {
        self.scheduler.manager().expect_result((unit, id))
    }

    /// Runs an analysis now unless its result is already cached.
    ///
    /// A cache hit is silent and returns `false`; otherwise the analysis
    /// (and its own missing dependencies) run nested one level below the
    /// current body and the result is installed as usual.
    pub fn force_run_analysis_phase(&mut self, id: PhaseId, unit: &mut U) -> bool {
        let key = (unit.unit_id(), id);
        if self.scheduler.manager().is_available(key) {
            return false;
        }
        let name = self.scheduler.registry().expect(id).name();
        self.scheduler
            .note_dependency(key.0, name, self.current, self.depth + 1);
        self.scheduler.run_analysis_at(id, unit, self.depth + 1)
    }

    /// Runs a transform now, from inside the current body.
    ///
    /// Transforms are never cached, so this always executes and always
    /// applies the forced transform's preservation policy afterwards.
    /// Returns the body's changed report.
    pub fn force_run_transform_phase(&mut self, id: PhaseId, unit: &mut U) -> bool {
        let name = self.scheduler.registry().expect(id).name();
        self.scheduler
            .note_dependency(unit.unit_id(), name, self.current, self.depth + 1);
        self.scheduler.run_transform_at(id, unit, self.depth + 1)
    }

    /// Drops one cached analysis result, recording the eviction.
    ///
    /// Erasing a result that exists but belongs to a currently running
    /// analysis leaves it alone; erasing one that was never computed
    /// aborts.
    pub fn force_erase_analysis_phase(&mut self, unit: UnitId, id: PhaseId) {
        let name = self
            .scheduler
            .registry()
            .phase(id)
            .map_or("<unregistered>", PhaseInfo::name);
        if self.scheduler.manager_mut().erase((unit, id)) {
            self.scheduler.events_mut().evicted(unit, name, self.current);
        }
    }

    /// Drops every cached analysis result across all units, recording the
    /// evictions. Results of analyses still running are spared.
    pub fn force_erase_all(&mut self) {
        let evicted = self.scheduler.manager_mut().erase_all();
        for (unit, id) in evicted {
            let name = self
                .scheduler
                .registry()
                .phase(id)
                .map_or("<unregistered>", PhaseInfo::name);
            self.scheduler.events_mut().evicted(unit, name, self.current);
        }
    }

    /// Reads a result from the cache of an enclosing, higher-IR-level
    /// scheduler.
    ///
    /// Function-level phases use this to consult module-level results such
    /// as the call graph. Aborts when no enclosing cache was attached or
    /// the result is missing there.
    #[must_use]
    pub fn over_ir_result<T: Any>(&self, unit: UnitId, id: PhaseId) -> &T {
        match self.scheduler.over() {
            Some(over) => over.expect_result((unit, id)),
            None => raise_fatal(&contract_error!(
                "phase `{}` read an enclosing unit cache but none is attached",
                self.current
            )),
        }
    }
}
