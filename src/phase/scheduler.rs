//! The dependency-resolving phase scheduler.
//!
//! One scheduler drives phases over units of a single kind, holding the
//! unit kind's registry, its own [`AnalysisDataManager`], and an event log.
//! The run methods form a small recursion: running a phase first runs every
//! declared dependency that is not already cached, each of which may pull
//! in its own dependencies, before the demanding phase's body executes.
//!
//! ```text
//!  run_pipeline ──► run phase ──► dependencies? ──► run phase ──► ...
//!                      │                                │
//!                      ▼                                ▼
//!               analysis: cache result          (recursion, depth+1)
//!               transform: apply policy
//! ```
//!
//! Analyses are memoized per (unit, phase): a second run request is a
//! cache hit and the body never executes. Transforms execute every time
//! and finish by applying their preservation policy to the unit's cached
//! results. Given the same sequence and input, the set of results evicted
//! and recomputed at each step is deterministic.

use std::collections::HashMap;
use std::time::Instant;

use crate::error::raise_fatal;
use crate::phase::dep::AnalysisDep;
use crate::phase::events::{PhaseLog, PhaseTimings};
use crate::phase::hook::AnalysisInfoHook;
use crate::phase::manager::AnalysisDataManager;
use crate::phase::registry::{IrUnit, Phase, PhaseId, PhaseInfo, PhaseKind, PhaseRegistry, UnitId};
use crate::session::SessionOptions;

/// Runs analysis and transform phases over one kind of compilation unit.
///
/// The scheduler borrows the session's read-only pieces (registry, options,
/// timing table) and owns the mutable per-worker state (result cache,
/// dependency-declaration cache, event log). Function pipelines running on
/// separate rayon workers each construct their own scheduler; nothing here
/// is shared between workers except the timing table, which synchronizes
/// internally.
///
/// # Examples
///
/// ```rust,ignore
/// let mut scheduler = PhaseScheduler::new(registry, options, timings);
/// let sequence = registry.resolve_sequence(&["unreachable-elim", "cfg-verify"]);
/// let changed = scheduler.run_pipeline(&sequence, &mut cfg);
/// ```
pub struct PhaseScheduler<'s, U: IrUnit> {
    registry: &'s PhaseRegistry<U>,
    options: &'s SessionOptions,
    timings: &'s PhaseTimings,
    /// Cache of an enclosing scheduler at a higher IR level, readable
    /// through [`AnalysisInfoHook::over_ir_result`].
    over: Option<&'s AnalysisDataManager>,
    /// One dependency declaration per phase id, filled on first run.
    dep_cache: HashMap<PhaseId, AnalysisDep>,
    manager: AnalysisDataManager,
    events: PhaseLog,
}

impl<'s, U: IrUnit> PhaseScheduler<'s, U> {
    /// Creates a scheduler with an empty result cache.
    #[must_use]
    pub fn new(
        registry: &'s PhaseRegistry<U>,
        options: &'s SessionOptions,
        timings: &'s PhaseTimings,
    ) -> Self {
        PhaseScheduler {
            registry,
            options,
            timings,
            over: None,
            dep_cache: HashMap::new(),
            manager: AnalysisDataManager::new(),
            events: PhaseLog::new(),
        }
    }

    /// Attaches the result cache of an enclosing, higher-IR-level
    /// scheduler, making its results readable from phases run here.
    #[must_use]
    pub fn with_over_ir(mut self, over: &'s AnalysisDataManager) -> Self {
        self.over = Some(over);
        self
    }

    /// Returns the scheduler's result cache.
    #[must_use]
    pub fn manager(&self) -> &AnalysisDataManager {
        &self.manager
    }

    /// Returns the scheduler's result cache mutably.
    ///
    /// Drivers use this for whole-cache invalidation between units.
    pub fn manager_mut(&mut self) -> &mut AnalysisDataManager {
        &mut self.manager
    }

    /// Returns the event log.
    #[must_use]
    pub fn log(&self) -> &PhaseLog {
        &self.events
    }

    /// Moves the event log out, leaving an empty one behind.
    pub fn take_log(&mut self) -> PhaseLog {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn registry(&self) -> &'s PhaseRegistry<U> {
        self.registry
    }

    pub(crate) fn over(&self) -> Option<&'s AnalysisDataManager> {
        self.over
    }

    pub(crate) fn events_mut(&mut self) -> &mut PhaseLog {
        &mut self.events
    }

    /// Runs an analysis phase over `unit`, memoized per (unit, phase).
    ///
    /// A cache hit returns without constructing the phase. Otherwise the
    /// result entry is opened, every not-yet-available dependency runs
    /// first, and the body's payload is installed. Returns the body's
    /// changed report, `false` on a cache hit.
    pub fn run_analysis_phase(&mut self, id: PhaseId, unit: &mut U) -> bool {
        self.run_analysis_at(id, unit, 0)
    }

    /// Runs a transform phase over `unit`.
    ///
    /// Transforms are never memoized; the mutated unit is the effect.
    /// After the body returns, the phase's preservation policy is applied
    /// to the unit's cached analyses. Returns the body's changed report.
    pub fn run_transform_phase(&mut self, id: PhaseId, unit: &mut U) -> bool {
        self.run_transform_at(id, unit, 0)
    }

    /// Runs a resolved phase sequence over `unit`, honoring the session's
    /// skip-from/skip-after options.
    ///
    /// Returns `true` if any phase reported changing the unit.
    pub fn run_pipeline(&mut self, sequence: &[PhaseId], unit: &mut U) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i < sequence.len() {
            i = self.solve_skip_from(sequence, i, unit.unit_id());
            if i >= sequence.len() {
                break;
            }
            let info = self.registry.expect(sequence[i]);
            if self.options.verbose {
                println!("---Run {} phase [ {} ]---", info.kind(), info.name());
            }
            changed |= match info.kind() {
                PhaseKind::Analysis => self.run_analysis_at(sequence[i], unit, 0),
                PhaseKind::Transform => self.run_transform_at(sequence[i], unit, 0),
            };
            i = self.solve_skip_after(sequence, i, unit.unit_id());
            i += 1;
        }
        changed
    }

    pub(crate) fn run_analysis_at(&mut self, id: PhaseId, unit: &mut U, depth: usize) -> bool {
        let info = self.registry.expect(id);
        if info.kind() != PhaseKind::Analysis {
            raise_fatal(&contract_error!(
                "phase `{}` is not an analysis",
                info.name()
            ));
        }
        let key = (unit.unit_id(), id);
        if self.manager.is_available(key) {
            return false;
        }
        self.manager.open_result_scope(key, info.name());
        let mut phase = info.construct();
        let dep = self.cached_dependencies(id, phase.as_ref());
        self.run_dependencies(&dep, info.name(), unit, depth + 1);

        let started = Instant::now();
        let changed = phase.run(unit, &mut AnalysisInfoHook::new(self, info.name(), depth));
        self.timings.add(info.name(), started.elapsed());

        let Some(payload) = phase.into_result() else {
            raise_fatal(&contract_error!(
                "analysis `{}` completed without a result",
                info.name()
            ));
        };
        self.manager.install_result(key, payload);
        self.events.ran(key.0, info.name(), info.kind(), changed);
        changed
    }

    pub(crate) fn run_transform_at(&mut self, id: PhaseId, unit: &mut U, depth: usize) -> bool {
        let info = self.registry.expect(id);
        if info.kind() != PhaseKind::Transform {
            raise_fatal(&contract_error!(
                "phase `{}` is not a transform",
                info.name()
            ));
        }
        let mut phase = info.construct();
        let dep = self.cached_dependencies(id, phase.as_ref());
        self.run_dependencies(&dep, info.name(), unit, depth + 1);

        let started = Instant::now();
        let changed = phase.run(unit, &mut AnalysisInfoHook::new(self, info.name(), depth));
        self.timings.add(info.name(), started.elapsed());

        let unit_id = unit.unit_id();
        self.events.ran(unit_id, info.name(), info.kind(), changed);
        let evicted = self.manager.clear_invalid(unit_id, dep.preserved());
        for (evicted_unit, evicted_phase) in evicted {
            let name = self
                .registry
                .phase(evicted_phase)
                .map_or("<unregistered>", PhaseInfo::name);
            self.events.evicted(evicted_unit, name, info.name());
        }
        changed
    }

    /// Runs every declared dependency that is not already cached, in
    /// declaration order.
    fn run_dependencies(&mut self, dep: &AnalysisDep, by: &'static str, unit: &mut U, depth: usize) {
        for &required in dep.required() {
            let key = (unit.unit_id(), required);
            if self.manager.is_available(key) {
                continue;
            }
            let info = self.registry.expect(required);
            self.note_dependency(key.0, info.name(), by, depth);
            match info.kind() {
                PhaseKind::Analysis => {
                    self.run_analysis_at(required, unit, depth);
                }
                PhaseKind::Transform => {
                    self.run_transform_at(required, unit, depth);
                }
            }
        }
    }

    /// Fetches (computing once) the phase's dependency declaration.
    fn cached_dependencies(&mut self, id: PhaseId, phase: &dyn Phase<U>) -> AnalysisDep {
        if let Some(dep) = self.dep_cache.get(&id) {
            return dep.clone();
        }
        let mut dep = AnalysisDep::new();
        phase.declare_dependencies(&mut dep);
        self.dep_cache.insert(id, dep.clone());
        dep
    }

    pub(crate) fn note_dependency(
        &mut self,
        unit: UnitId,
        phase: &'static str,
        by: &'static str,
        depth: usize,
    ) {
        self.events.dependency_forced(unit, phase, by, depth);
        if self.options.verbose {
            let indent = "  ".repeat(depth);
            println!("{indent}  ++ trigger phase [ {phase} ]");
        }
    }

    fn note_skip(&mut self, unit: UnitId, phase: &'static str, option: &'static str) {
        self.events.skipped(unit, phase, option);
        if self.options.verbose {
            println!("---Skip phase [ {phase} ] ({option})---");
        }
    }

    /// Handles the skip-from option at position `i`: if the phase there is
    /// the named one, it and every consecutive skippable phase after it
    /// are bypassed. Naming an unskippable phase aborts. Returns the first
    /// position to run.
    fn solve_skip_from(&mut self, sequence: &[PhaseId], mut i: usize, unit: UnitId) -> usize {
        let Some(from) = self.options.skip_from.as_deref() else {
            return i;
        };
        let info = self.registry.expect(sequence[i]);
        if info.name() != from {
            return i;
        }
        if !info.can_skip() {
            raise_fatal(&contract_error!(
                "phase `{}` cannot be skipped",
                info.name()
            ));
        }
        while i < sequence.len() {
            let cur = self.registry.expect(sequence[i]);
            if !cur.can_skip() {
                break;
            }
            self.note_skip(unit, cur.name(), "skip-from");
            i += 1;
        }
        i
    }

    /// Handles the skip-after option at position `i`: the named phase has
    /// just run; every consecutive skippable phase after it is bypassed.
    /// Returns the last bypassed position.
    fn solve_skip_after(&mut self, sequence: &[PhaseId], mut i: usize, unit: UnitId) -> usize {
        let Some(after) = self.options.skip_after.as_deref() else {
            return i;
        };
        if self.registry.expect(sequence[i]).name() != after {
            return i;
        }
        while i + 1 < sequence.len() {
            let next = self.registry.expect(sequence[i + 1]);
            if !next.can_skip() {
                break;
            }
            self.note_skip(unit, next.name(), "skip-after");
            i += 1;
        }
        i
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::cfg::ControlFlowGraph;
    use crate::phase::dep::PreservationPolicy;
    use crate::phase::events::PhaseEvent;

    fn unit() -> ControlFlowGraph {
        ControlFlowGraph::empty("test", UnitId::new(0))
    }

    // ==== memoization ======================================================

    static MEMO_RUNS: AtomicUsize = AtomicUsize::new(0);

    struct MemoAnalysis;

    impl Phase<ControlFlowGraph> for MemoAnalysis {
        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            MEMO_RUNS.fetch_add(1, Ordering::SeqCst);
            false
        }

        fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
            Some(Box::new(41usize))
        }
    }

    #[test]
    fn test_analysis_is_memoized_per_unit() {
        let mut registry = PhaseRegistry::new();
        registry.register(PhaseInfo::analysis(PhaseId::new(1), "memo", || {
            Box::new(MemoAnalysis)
        }));
        let options = SessionOptions::default();
        let timings = PhaseTimings::new();
        let mut scheduler = PhaseScheduler::new(&registry, &options, &timings);
        let mut cfg = unit();

        scheduler.run_analysis_phase(PhaseId::new(1), &mut cfg);
        scheduler.run_analysis_phase(PhaseId::new(1), &mut cfg);

        assert_eq!(MEMO_RUNS.load(Ordering::SeqCst), 1);
        let key = (UnitId::new(0), PhaseId::new(1));
        assert!(scheduler.manager().is_available(key));
        assert_eq!(*scheduler.manager().expect_result::<usize>(key), 41);
        // One Ran record; the second call was a silent cache hit.
        assert_eq!(scheduler.log().len(), 1);
    }

    // ==== dependency ordering =============================================

    static DEP_SEQ: AtomicUsize = AtomicUsize::new(0);
    static DEP_ANALYSIS_SLOT: AtomicUsize = AtomicUsize::new(usize::MAX);
    static DEP_TRANSFORM_SLOT: AtomicUsize = AtomicUsize::new(usize::MAX);

    struct DepAnalysis;

    impl Phase<ControlFlowGraph> for DepAnalysis {
        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            DEP_ANALYSIS_SLOT.store(DEP_SEQ.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            false
        }

        fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
            Some(Box::new(()))
        }
    }

    struct DepTransform;

    impl Phase<ControlFlowGraph> for DepTransform {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            dep.add_required(PhaseId::new(10));
            dep.set_preserved(PreservationPolicy::PreserveNone);
        }

        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            DEP_TRANSFORM_SLOT.store(DEP_SEQ.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_dependency_runs_before_body_and_policy_applies_after() {
        let mut registry = PhaseRegistry::new();
        registry.register(PhaseInfo::analysis(PhaseId::new(10), "dep-analysis", || {
            Box::new(DepAnalysis)
        }));
        registry.register(PhaseInfo::transform(
            PhaseId::new(20),
            "dep-transform",
            || Box::new(DepTransform),
        ));
        let options = SessionOptions::default();
        let timings = PhaseTimings::new();
        let mut scheduler = PhaseScheduler::new(&registry, &options, &timings);
        let mut cfg = unit();

        let changed = scheduler.run_transform_phase(PhaseId::new(20), &mut cfg);

        assert!(changed);
        let analysis_slot = DEP_ANALYSIS_SLOT.load(Ordering::SeqCst);
        let transform_slot = DEP_TRANSFORM_SLOT.load(Ordering::SeqCst);
        assert!(analysis_slot < transform_slot);
        // PreserveNone evicted the dependency's result again.
        assert_eq!(scheduler.manager().live_results(UnitId::new(0)), 0);

        let kinds: Vec<&PhaseEvent> = scheduler.log().events().iter().collect();
        assert!(matches!(
            kinds[0],
            PhaseEvent::DependencyForced {
                phase: "dep-analysis",
                by: "dep-transform",
                depth: 1,
                ..
            }
        ));
        assert!(matches!(
            kinds[1],
            PhaseEvent::Ran {
                phase: "dep-analysis",
                ..
            }
        ));
        assert!(matches!(
            kinds[2],
            PhaseEvent::Ran {
                phase: "dep-transform",
                changed: true,
                ..
            }
        ));
        assert!(matches!(
            kinds[3],
            PhaseEvent::Evicted {
                phase: "dep-analysis",
                by: "dep-transform",
                ..
            }
        ));
    }

    // ==== preservation =====================================================

    struct UnitResult(u32);

    struct TaggedAnalysis(u32);

    impl Phase<ControlFlowGraph> for TaggedAnalysis {
        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            false
        }

        fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
            Some(Box::new(UnitResult(self.0)))
        }
    }

    struct KeepOnlyFirst;

    impl Phase<ControlFlowGraph> for KeepOnlyFirst {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            dep.set_preserved(PreservationPolicy::only([PhaseId::new(1)]));
        }

        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            true
        }
    }

    #[test]
    fn test_preserve_only_keeps_exactly_the_named_set() {
        let mut registry = PhaseRegistry::new();
        registry.register(PhaseInfo::analysis(PhaseId::new(1), "first", || {
            Box::new(TaggedAnalysis(1))
        }));
        registry.register(PhaseInfo::analysis(PhaseId::new(2), "second", || {
            Box::new(TaggedAnalysis(2))
        }));
        registry.register(PhaseInfo::transform(PhaseId::new(3), "keeper", || {
            Box::new(KeepOnlyFirst)
        }));
        let options = SessionOptions::default();
        let timings = PhaseTimings::new();
        let mut scheduler = PhaseScheduler::new(&registry, &options, &timings);
        let mut cfg = unit();

        scheduler.run_analysis_phase(PhaseId::new(1), &mut cfg);
        scheduler.run_analysis_phase(PhaseId::new(2), &mut cfg);
        scheduler.run_transform_phase(PhaseId::new(3), &mut cfg);

        let u = UnitId::new(0);
        assert!(scheduler.manager().is_available((u, PhaseId::new(1))));
        assert!(!scheduler.manager().is_available((u, PhaseId::new(2))));
        assert_eq!(
            scheduler
                .manager()
                .expect_result::<UnitResult>((u, PhaseId::new(1)))
                .0,
            1
        );
    }

    // ==== declaration caching =============================================

    static DECLARE_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct DeclareCounter;

    impl Phase<ControlFlowGraph> for DeclareCounter {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            DECLARE_CALLS.fetch_add(1, Ordering::SeqCst);
            dep.set_preserved(PreservationPolicy::PreserveAll);
        }

        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            false
        }
    }

    #[test]
    fn test_dependency_declaration_is_cached_per_phase_id() {
        let mut registry = PhaseRegistry::new();
        registry.register(PhaseInfo::transform(PhaseId::new(5), "declares", || {
            Box::new(DeclareCounter)
        }));
        let options = SessionOptions::default();
        let timings = PhaseTimings::new();
        let mut scheduler = PhaseScheduler::new(&registry, &options, &timings);
        let mut cfg = unit();

        scheduler.run_transform_phase(PhaseId::new(5), &mut cfg);
        scheduler.run_transform_phase(PhaseId::new(5), &mut cfg);
        scheduler.run_transform_phase(PhaseId::new(5), &mut cfg);

        assert_eq!(DECLARE_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.log().len(), 3);
    }

    // ==== skip options =====================================================

    // Each skip test owns its counters; stubs are not shared across tests
    // because the harness runs them in parallel.

    static SKIP_VICTIM_RUNS: AtomicUsize = AtomicUsize::new(0);
    static FROM_SURVIVOR_RUNS: AtomicUsize = AtomicUsize::new(0);

    struct SkipVictim;

    impl Phase<ControlFlowGraph> for SkipVictim {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            dep.set_preserved(PreservationPolicy::PreserveAll);
        }

        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            SKIP_VICTIM_RUNS.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    struct FromSurvivor;

    impl Phase<ControlFlowGraph> for FromSurvivor {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            dep.set_preserved(PreservationPolicy::PreserveAll);
        }

        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            FROM_SURVIVOR_RUNS.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    #[test]
    fn test_skip_from_bypasses_consecutive_skippable_phases() {
        let mut registry = PhaseRegistry::new();
        registry.register(
            PhaseInfo::transform(PhaseId::new(1), "victim-a", || Box::new(SkipVictim))
                .skippable(),
        );
        registry.register(
            PhaseInfo::transform(PhaseId::new(2), "victim-b", || Box::new(SkipVictim))
                .skippable(),
        );
        registry.register(PhaseInfo::transform(PhaseId::new(3), "survivor", || {
            Box::new(FromSurvivor)
        }));
        let mut options = SessionOptions::default();
        options.skip_from = Some("victim-a".to_string());
        let timings = PhaseTimings::new();
        let mut scheduler = PhaseScheduler::new(&registry, &options, &timings);
        let mut cfg = unit();

        let sequence = registry.resolve_sequence(&["victim-a", "victim-b", "survivor"]);
        scheduler.run_pipeline(&sequence, &mut cfg);

        assert_eq!(SKIP_VICTIM_RUNS.load(Ordering::SeqCst), 0);
        assert_eq!(FROM_SURVIVOR_RUNS.load(Ordering::SeqCst), 1);
        let skips = scheduler
            .log()
            .events()
            .iter()
            .filter(|event| matches!(event, PhaseEvent::Skipped { .. }))
            .count();
        assert_eq!(skips, 2);
    }

    static AFTER_NAMED_RUNS: AtomicUsize = AtomicUsize::new(0);
    static AFTER_TAIL_RUNS: AtomicUsize = AtomicUsize::new(0);

    struct AfterNamed;

    impl Phase<ControlFlowGraph> for AfterNamed {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            dep.set_preserved(PreservationPolicy::PreserveAll);
        }

        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            AFTER_NAMED_RUNS.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    struct AfterTail;

    impl Phase<ControlFlowGraph> for AfterTail {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            dep.set_preserved(PreservationPolicy::PreserveAll);
        }

        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            AFTER_TAIL_RUNS.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    #[test]
    fn test_skip_after_runs_the_named_phase_then_bypasses() {
        let mut registry = PhaseRegistry::new();
        registry.register(PhaseInfo::transform(PhaseId::new(1), "named", || {
            Box::new(AfterNamed)
        }));
        registry.register(
            PhaseInfo::transform(PhaseId::new(2), "tail", || Box::new(AfterTail)).skippable(),
        );
        let mut options = SessionOptions::default();
        options.skip_after = Some("named".to_string());
        let timings = PhaseTimings::new();
        let mut scheduler = PhaseScheduler::new(&registry, &options, &timings);
        let mut cfg = unit();

        let sequence = registry.resolve_sequence(&["named", "tail"]);
        scheduler.run_pipeline(&sequence, &mut cfg);

        assert_eq!(AFTER_NAMED_RUNS.load(Ordering::SeqCst), 1);
        assert_eq!(AFTER_TAIL_RUNS.load(Ordering::SeqCst), 0);
    }

    // ==== forced runs through the hook ====================================

    static FORCED_SAW: AtomicBool = AtomicBool::new(false);

    struct ForcedAnalysis;

    impl Phase<ControlFlowGraph> for ForcedAnalysis {
        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            false
        }

        fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
            Some(Box::new(41usize))
        }
    }

    struct Forcer;

    impl Phase<ControlFlowGraph> for Forcer {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            dep.set_preserved(PreservationPolicy::PreserveAll);
        }

        fn run(
            &mut self,
            unit: &mut ControlFlowGraph,
            hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            hook.force_run_analysis_phase(PhaseId::new(1), unit);
            let value = *hook.expect_result::<usize>(unit.unit_id(), PhaseId::new(1));
            FORCED_SAW.store(value == 41, Ordering::SeqCst);
            false
        }
    }

    #[test]
    fn test_forced_analysis_is_visible_inside_the_forcing_body() {
        let mut registry = PhaseRegistry::new();
        registry.register(PhaseInfo::analysis(PhaseId::new(1), "forced", || {
            Box::new(ForcedAnalysis)
        }));
        registry.register(PhaseInfo::transform(PhaseId::new(2), "forcer", || {
            Box::new(Forcer)
        }));
        let options = SessionOptions::default();
        let timings = PhaseTimings::new();
        let mut scheduler = PhaseScheduler::new(&registry, &options, &timings);
        let mut cfg = unit();

        scheduler.run_transform_phase(PhaseId::new(2), &mut cfg);

        assert!(FORCED_SAW.load(Ordering::SeqCst));
        assert!(scheduler
            .log()
            .events()
            .iter()
            .any(|event| matches!(
                event,
                PhaseEvent::DependencyForced {
                    phase: "forced",
                    by: "forcer",
                    ..
                }
            )));
    }

    // ==== timing ==========================================================

    struct InertTransform;

    impl Phase<ControlFlowGraph> for InertTransform {
        fn declare_dependencies(&self, dep: &mut AnalysisDep) {
            dep.set_preserved(PreservationPolicy::PreserveAll);
        }

        fn run(
            &mut self,
            _unit: &mut ControlFlowGraph,
            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>,
        ) -> bool {
            false
        }
    }

    #[test]
    fn test_body_time_lands_in_the_shared_table() {
        let mut registry = PhaseRegistry::new();
        registry.register(PhaseInfo::transform(PhaseId::new(5), "timed", || {
            Box::new(InertTransform)
        }));
        let options = SessionOptions::default();
        let timings = PhaseTimings::new();
        let mut scheduler = PhaseScheduler::new(&registry, &options, &timings);
        let mut cfg = unit();

        scheduler.run_transform_phase(PhaseId::new(5), &mut cfg);

        let snapshot = timings.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "timed");
        assert_eq!(snapshot[0].1.runs, 1);
    }
}
