//! Optimization sessions and the module, function, and component drivers.
//!
//! A [`Session`] owns what an optimization run shares: the options, one
//! phase registry per unit kind, and the wall-clock table. Schedulers are
//! per-unit and per-worker; each driver builds a fresh one for every unit
//! it visits and lets it drop when the unit is done, so no cached analysis
//! outlives the graph it describes. The only mutable state crossing worker
//! boundaries is the timing table, which synchronizes internally.
//!
//! Three drivers cover the common pipeline shapes:
//!
//! - [`Session::optimize_module`] runs module-level phases over the module
//!   itself
//! - [`Session::optimize_functions`] builds a graph per function and runs a
//!   function-level pipeline over each, optionally fanned out across rayon
//!   workers
//! - [`Session::optimize_sccs`] condenses the call graph and drives the
//!   function pipeline over one component at a time, callees before
//!   callers, with the module-level result cache readable from every
//!   function phase

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::analysis::{CallGraph, CallGraphPhase, DominancePhase, LoopsPhase};
use crate::cfg::ControlFlowGraph;
use crate::error::raise_fatal;
use crate::ir::{Function, Module};
use crate::phase::{
    AnalysisDataManager, PhaseId, PhaseInfo, PhaseRegistry, PhaseScheduler, PhaseTimings,
};
use crate::transforms::{LoopMarkingPhase, UnreachableElimPhase, VerifyCfgPhase, WontExitPhase};

/// Knobs shared by every driver of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Print phase banners and block orders while running.
    pub verbose: bool,
    /// Name of a phase to skip; skipping continues through any directly
    /// following skippable phases.
    pub skip_from: Option<String>,
    /// Name of the last phase to run; the skippable phases after it are
    /// bypassed.
    pub skip_after: Option<String>,
    /// Fan function pipelines out across rayon workers.
    pub parallel: bool,
    /// When set, write each optimized graph as Graphviz to
    /// `<prefix>.<function>.dot`.
    pub dump_cfg: Option<String>,
}

impl SessionOptions {
    /// Quiet options with function pipelines fanned out across workers.
    #[must_use]
    pub fn batch() -> Self {
        SessionOptions {
            parallel: true,
            ..SessionOptions::default()
        }
    }

    /// Verbose single-threaded options, keeping one function's banners
    /// contiguous in the output.
    #[must_use]
    pub fn debugging() -> Self {
        SessionOptions {
            verbose: true,
            ..SessionOptions::default()
        }
    }
}

/// What a function-level driver produced.
#[derive(Debug)]
pub struct DriverOutcome {
    /// The optimized graph of every driven function, in processing order.
    pub graphs: Vec<ControlFlowGraph>,
    /// Whether any phase reported changing any function.
    pub changed: bool,
}

/// One optimization run over a module.
///
/// Created with the shipped phases already registered; callers add their
/// own through [`Session::function_registry_mut`] and
/// [`Session::module_registry_mut`] before driving pipelines. The session
/// is immutable while drivers run, which is what lets
/// [`Session::optimize_functions`] hand `&self` to rayon workers.
///
/// # Examples
///
/// ```rust,ignore
/// let session = Session::new(SessionOptions::batch());
/// let outcome = session.optimize_functions(&module, &["unreachable-elim", "cfg-verify"]);
/// session.report();
/// ```
pub struct Session {
    options: SessionOptions,
    function_registry: PhaseRegistry<ControlFlowGraph>,
    module_registry: PhaseRegistry<Module>,
    timings: PhaseTimings,
}

impl Session {
    /// Creates a session with every shipped phase registered.
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        let mut function_registry = PhaseRegistry::new();
        function_registry.register(PhaseInfo::analysis(
            DominancePhase::ID,
            DominancePhase::NAME,
            || Box::new(DominancePhase::new()),
        ));
        function_registry.register(PhaseInfo::analysis(LoopsPhase::ID, LoopsPhase::NAME, || {
            Box::new(LoopsPhase::new())
        }));
        function_registry.register(PhaseInfo::transform(
            LoopMarkingPhase::ID,
            LoopMarkingPhase::NAME,
            || Box::new(LoopMarkingPhase::new()),
        ));
        function_registry.register(PhaseInfo::transform(
            UnreachableElimPhase::ID,
            UnreachableElimPhase::NAME,
            || Box::new(UnreachableElimPhase::new()),
        ));
        function_registry.register(PhaseInfo::transform(
            WontExitPhase::ID,
            WontExitPhase::NAME,
            || Box::new(WontExitPhase::new()),
        ));
        function_registry.register(
            PhaseInfo::transform(VerifyCfgPhase::ID, VerifyCfgPhase::NAME, || {
                Box::new(VerifyCfgPhase::new())
            })
            .skippable(),
        );

        let mut module_registry = PhaseRegistry::new();
        module_registry.register(PhaseInfo::analysis(
            CallGraphPhase::ID,
            CallGraphPhase::NAME,
            || Box::new(CallGraphPhase::new()),
        ));

        Session {
            options,
            function_registry,
            module_registry,
            timings: PhaseTimings::new(),
        }
    }

    /// Returns the session options.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Returns the shared wall-clock table.
    #[must_use]
    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    /// Returns the function-level phase registry.
    #[must_use]
    pub fn function_registry(&self) -> &PhaseRegistry<ControlFlowGraph> {
        &self.function_registry
    }

    /// Returns the function-level registry mutably, for registering
    /// additional phases before driving.
    pub fn function_registry_mut(&mut self) -> &mut PhaseRegistry<ControlFlowGraph> {
        &mut self.function_registry
    }

    /// Returns the module-level phase registry.
    #[must_use]
    pub fn module_registry(&self) -> &PhaseRegistry<Module> {
        &self.module_registry
    }

    /// Returns the module-level registry mutably.
    pub fn module_registry_mut(&mut self) -> &mut PhaseRegistry<Module> {
        &mut self.module_registry
    }

    /// Returns a fresh scheduler over function-level phases.
    #[must_use]
    pub fn scheduler(&self) -> PhaseScheduler<'_, ControlFlowGraph> {
        PhaseScheduler::new(&self.function_registry, &self.options, &self.timings)
    }

    /// Returns a fresh scheduler over module-level phases.
    #[must_use]
    pub fn module_scheduler(&self) -> PhaseScheduler<'_, Module> {
        PhaseScheduler::new(&self.module_registry, &self.options, &self.timings)
    }

    /// Runs a module-level pipeline over `module`.
    ///
    /// Returns `true` if any phase reported changing the module. The
    /// scheduler and its cached results are dropped when the pipeline
    /// finishes; use [`Session::module_scheduler`] directly to keep results
    /// alive, for example to feed [`Session::optimize_functions_over`].
    pub fn optimize_module(&self, module: &mut Module, phases: &[&str]) -> bool {
        let sequence = self.module_registry.resolve_sequence(phases);
        if self.options.verbose {
            println!(">>> Optimizing module < {} >", module.name());
        }
        let mut scheduler = self.module_scheduler();
        scheduler.run_pipeline(&sequence, module)
    }

    /// Runs a function-level pipeline over every function of `module`.
    ///
    /// Each function's graph is built from its statement body, driven
    /// through the pipeline by a scheduler of its own, and returned in the
    /// outcome. With [`SessionOptions::parallel`] set the functions fan out
    /// across rayon workers; graphs still come back in function order.
    pub fn optimize_functions(&self, module: &Module, phases: &[&str]) -> DriverOutcome {
        let sequence = self.function_registry.resolve_sequence(phases);
        self.drive(module.functions(), &sequence, None)
    }

    /// Like [`Session::optimize_functions`], with the results of an
    /// enclosing module-level scheduler readable from every function phase
    /// through [`crate::phase::AnalysisInfoHook::over_ir_result`].
    pub fn optimize_functions_over(
        &self,
        module: &Module,
        phases: &[&str],
        over: &AnalysisDataManager,
    ) -> DriverOutcome {
        let sequence = self.function_registry.resolve_sequence(phases);
        self.drive(module.functions(), &sequence, Some(over))
    }

    /// Runs a function-level pipeline bottom-up over the call graph of
    /// `module`.
    ///
    /// The call graph is computed through a module-level scheduler whose
    /// cache stays readable from every function phase. Components come out
    /// of the condensation callees-first, so a caller is driven only after
    /// everything it calls; functions inside one component are driven in id
    /// order. Graphs are returned in processing order, not function order.
    pub fn optimize_sccs(&self, module: &mut Module, phases: &[&str]) -> DriverOutcome {
        let sequence = self.function_registry.resolve_sequence(phases);
        let mut module_scheduler = self.module_scheduler();
        module_scheduler.run_analysis_phase(CallGraphPhase::ID, module);
        let graph = module_scheduler
            .manager()
            .expect_result::<CallGraph>((Module::UNIT_ID, CallGraphPhase::ID));

        let mut graphs = Vec::with_capacity(module.function_count());
        let mut changed = false;
        for component in graph.sccs() {
            if self.options.verbose {
                let names: Vec<&str> = component
                    .iter()
                    .filter_map(|&id| module.function(id).map(Function::name))
                    .collect();
                println!(">>> Optimizing component [ {} ]", names.join(", "));
            }
            let functions = module.detach(component);
            let outcome = self.drive(&functions, &sequence, Some(module_scheduler.manager()));
            module.restore(functions);
            changed |= outcome.changed;
            graphs.extend(outcome.graphs);
        }
        DriverOutcome { graphs, changed }
    }

    /// Prints the accumulated phase timing table.
    pub fn report(&self) {
        print!("{}", self.timings.report());
    }

    fn drive(
        &self,
        functions: &[Function],
        sequence: &[PhaseId],
        over: Option<&AnalysisDataManager>,
    ) -> DriverOutcome {
        if self.options.parallel && functions.len() > 1 {
            let changed = AtomicBool::new(false);
            let graphs: Vec<ControlFlowGraph> = functions
                .par_iter()
                .map(|function| {
                    let (graph, function_changed) = self.optimize_one(function, sequence, over);
                    if function_changed {
                        changed.store(true, Ordering::Relaxed);
                    }
                    graph
                })
                .collect();
            DriverOutcome {
                graphs,
                changed: changed.into_inner(),
            }
        } else {
            let mut graphs = Vec::with_capacity(functions.len());
            let mut changed = false;
            for function in functions {
                let (graph, function_changed) = self.optimize_one(function, sequence, over);
                changed |= function_changed;
                graphs.push(graph);
            }
            DriverOutcome { graphs, changed }
        }
    }

    /// Builds one function's graph and runs the pipeline over it.
    ///
    /// A body the builder rejects is a front-end bug, reported through the
    /// terminating route rather than per-function recovery.
    fn optimize_one(
        &self,
        function: &Function,
        sequence: &[PhaseId],
        over: Option<&AnalysisDataManager>,
    ) -> (ControlFlowGraph, bool) {
        if self.options.verbose {
            println!(">>> Optimizing function < {} >", function.name());
        }
        let mut cfg = match ControlFlowGraph::build(function) {
            Ok(cfg) => cfg,
            Err(error) => raise_fatal(&error),
        };
        if self.options.verbose {
            let order: Vec<String> = cfg.bfs_order().iter().map(|id| id.to_string()).collect();
            println!("    bfs order: [ {} ]", order.join(" "));
        }
        let mut scheduler = self.scheduler();
        if let Some(over) = over {
            scheduler = scheduler.with_over_ir(over);
        }
        let changed = scheduler.run_pipeline(sequence, &mut cfg);
        if let Some(prefix) = &self.options.dump_cfg {
            let path = format!("{}.{}.dot", prefix, cfg.name());
            if let Err(error) = std::fs::write(&path, cfg.to_dot(false)) {
                eprintln!("cannot write {path}: {error}");
            }
        }
        (cfg, changed)
    }
}
