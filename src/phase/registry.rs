//! Phase identity, the phase contract, and the table-driven dispatch
//! registry.
//!
//! Every phase the drivers can run is described once by a [`PhaseInfo`]
//! entry: a stable id, a command-line-friendly name, whether it is an
//! analysis or a transform, whether configuration may skip it, and a
//! constructor function pointer. A [`PhaseRegistry`] collects those entries
//! at session construction; after that the scheduler's hot path is a map
//! lookup plus one indirect call, with no open-ended dispatch.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::raise_fatal;
use crate::phase::dep::AnalysisDep;
use crate::phase::hook::AnalysisInfoHook;

/// Identifier of a registered phase.
///
/// Ids are chosen by the registering code and must be unique within one
/// registry. They key the dependency-declaration cache and, paired with a
/// [`UnitId`], the analysis result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhaseId(pub(crate) u32);

impl PhaseId {
    /// Creates a phase identifier from a raw id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        PhaseId(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Identifier of a compilation unit inside one scheduler's cache.
///
/// Function units use their function id; the module unit uses
/// [`crate::ir::Module::UNIT_ID`]. The two never collide because module
/// results and function results live in different
/// [`AnalysisDataManager`](crate::phase::AnalysisDataManager)s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) u32);

impl UnitId {
    /// Creates a unit identifier from a raw id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        UnitId(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Whether a phase computes a cached result or mutates the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum PhaseKind {
    /// Computes a result payload that is cached per unit and reused until
    /// a transform's preservation policy evicts it.
    #[strum(serialize = "analysis")]
    Analysis,
    /// Mutates the unit in place. Never cached; the changed IR is the
    /// effect.
    #[strum(serialize = "transform")]
    Transform,
}

/// A compilation unit the scheduler can drive phases over.
///
/// Implemented by [`ControlFlowGraph`](crate::cfg::ControlFlowGraph) for
/// function-level pipelines and by [`Module`](crate::ir::Module) for
/// module-level ones. The id keys the unit's analysis cache entries; the
/// name appears in diagnostics.
pub trait IrUnit {
    /// Returns the unit's cache key component.
    fn unit_id(&self) -> UnitId;

    /// Returns the unit's name for banners and fatal diagnostics.
    fn unit_name(&self) -> &str;
}

impl IrUnit for crate::cfg::ControlFlowGraph {
    fn unit_id(&self) -> UnitId {
        self.unit_id()
    }

    fn unit_name(&self) -> &str {
        self.name()
    }
}

impl IrUnit for crate::ir::Module {
    fn unit_id(&self) -> UnitId {
        crate::ir::Module::UNIT_ID
    }

    fn unit_name(&self) -> &str {
        self.name()
    }
}

/// The contract every analysis and transform phase implements.
///
/// A phase instance lives for exactly one run over one unit: the scheduler
/// constructs it through the registry, resolves its declared dependencies,
/// calls [`Phase::run`] once, and then either caches the payload it
/// surrenders through [`Phase::into_result`] (analyses) or applies its
/// preservation policy to the unit's cache (transforms). Instances are
/// never reused across units; only a cached analysis payload outlives its
/// phase.
///
/// # Examples
///
/// ```rust,ignore
/// struct EdgeCount(Option<usize>);
///
/// impl Phase<ControlFlowGraph> for EdgeCount {
///     fn run(&mut self, cfg: &mut ControlFlowGraph,
///            _hook: &mut AnalysisInfoHook<'_, '_, ControlFlowGraph>) -> bool {
///         self.0 = Some(cfg.body_blocks().map(|bb| bb.succs().len()).sum());
///         false
///     }
///
///     fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
///         self.0.map(|n| Box::new(n) as Box<dyn Any + Send + Sync>)
///     }
/// }
/// ```
pub trait Phase<U: IrUnit> {
    /// Declares the phases this one requires and, for transforms, which
    /// cached analyses survive it.
    ///
    /// Called at most once per phase id per scheduler; the declaration is
    /// cached and reused for every later run of the same phase.
    fn declare_dependencies(&self, dep: &mut AnalysisDep) {
        let _ = dep;
    }

    /// Executes the phase over `unit`.
    ///
    /// Every declared dependency has been computed when this is called.
    /// Returns `true` if the unit was changed; analyses conventionally
    /// return `false`.
    fn run(&mut self, unit: &mut U, hook: &mut AnalysisInfoHook<'_, '_, U>) -> bool;

    /// Surrenders the analysis payload to be cached.
    ///
    /// The default returns `None`, which is correct for transforms. An
    /// analysis phase that returns `None` after running is a contract
    /// violation the scheduler reports fatally.
    fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
        None
    }
}

/// Constructor signature stored in a [`PhaseInfo`] entry.
pub type PhaseConstructor<U> = fn() -> Box<dyn Phase<U>>;

/// A resolved, ordered list of phase ids ready to be run over units.
pub type PhaseSequence = Vec<PhaseId>;

/// Descriptor of one registered phase.
///
/// Everything the scheduler needs to know about a phase without
/// constructing it: identity, kind, whether skip options may bypass it,
/// and how to build an instance.
pub struct PhaseInfo<U: IrUnit> {
    id: PhaseId,
    name: &'static str,
    kind: PhaseKind,
    skippable: bool,
    constructor: PhaseConstructor<U>,
}

impl<U: IrUnit> PhaseInfo<U> {
    /// Describes an analysis phase.
    #[must_use]
    pub fn analysis(id: PhaseId, name: &'static str, constructor: PhaseConstructor<U>) -> Self {
        PhaseInfo {
            id,
            name,
            kind: PhaseKind::Analysis,
            skippable: false,
            constructor,
        }
    }

    /// Describes a transform phase.
    #[must_use]
    pub fn transform(id: PhaseId, name: &'static str, constructor: PhaseConstructor<U>) -> Self {
        PhaseInfo {
            id,
            name,
            kind: PhaseKind::Transform,
            skippable: false,
            constructor,
        }
    }

    /// Marks the phase as bypassable by the skip-from/skip-after options.
    #[must_use]
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    /// Returns the phase id.
    #[must_use]
    pub const fn id(&self) -> PhaseId {
        self.id
    }

    /// Returns the phase name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns whether this is an analysis or a transform.
    #[must_use]
    pub const fn kind(&self) -> PhaseKind {
        self.kind
    }

    /// Returns `true` if skip options may bypass this phase.
    #[must_use]
    pub const fn can_skip(&self) -> bool {
        self.skippable
    }

    /// Constructs a fresh instance for one run.
    #[must_use]
    pub fn construct(&self) -> Box<dyn Phase<U>> {
        (self.constructor)()
    }
}

impl<U: IrUnit> fmt::Debug for PhaseInfo<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("skippable", &self.skippable)
            .finish_non_exhaustive()
    }
}

/// The closed table of phases one scheduler family can dispatch.
///
/// Registration happens once, at session construction; lookups after that
/// never mutate. Unknown ids and names are contract violations surfaced
/// through the terminating diagnostic route, not recoverable errors:
/// a sequence naming an unregistered phase is a driver-authoring bug.
///
/// # Examples
///
/// ```rust,ignore
/// let mut registry = PhaseRegistry::new();
/// registry.register(PhaseInfo::analysis(DOMINANCE, "dominance", || {
///     Box::new(DominancePhase::default())
/// }));
/// let sequence = registry.resolve_sequence(&["dominance"]);
/// ```
#[derive(Debug)]
pub struct PhaseRegistry<U: IrUnit> {
    phases: BTreeMap<PhaseId, PhaseInfo<U>>,
    by_name: HashMap<&'static str, PhaseId>,
}

impl<U: IrUnit> PhaseRegistry<U> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        PhaseRegistry {
            phases: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Adds a phase descriptor.
    ///
    /// Registering a duplicate id or name aborts: two phases answering to
    /// the same identity would make dispatch ambiguous.
    pub fn register(&mut self, info: PhaseInfo<U>) {
        if self.phases.contains_key(&info.id()) {
            raise_fatal(&contract_error!(
                "phase id {} registered twice (second name `{}`)",
                info.id(),
                info.name()
            ));
        }
        if self.by_name.contains_key(info.name()) {
            raise_fatal(&contract_error!(
                "phase name `{}` registered twice (second id {})",
                info.name(),
                info.id()
            ));
        }
        self.by_name.insert(info.name(), info.id());
        self.phases.insert(info.id(), info);
    }

    /// Returns the descriptor for `id`, if registered.
    #[must_use]
    pub fn phase(&self, id: PhaseId) -> Option<&PhaseInfo<U>> {
        self.phases.get(&id)
    }

    /// Returns the descriptor for `name`, if registered.
    #[must_use]
    pub fn phase_by_name(&self, name: &str) -> Option<&PhaseInfo<U>> {
        self.by_name.get(name).and_then(|id| self.phases.get(id))
    }

    /// Returns the descriptor for `id`, aborting if it was never
    /// registered.
    #[must_use]
    pub fn expect(&self, id: PhaseId) -> &PhaseInfo<U> {
        match self.phases.get(&id) {
            Some(info) => info,
            None => raise_fatal(&contract_error!("phase id {} was never registered", id)),
        }
    }

    /// Resolves an ordered list of phase names into a [`PhaseSequence`].
    ///
    /// A name with no registered phase aborts, mirroring how a pipeline
    /// configuration naming a nonexistent phase cannot be run partially.
    #[must_use]
    pub fn resolve_sequence(&self, names: &[&str]) -> PhaseSequence {
        names
            .iter()
            .map(|name| match self.by_name.get(name) {
                Some(&id) => id,
                None => raise_fatal(&contract_error!("phase `{}` not found", name)),
            })
            .collect()
    }

    /// Returns the number of registered phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Iterates descriptors in id order.
    pub fn infos(&self) -> impl Iterator<Item = &PhaseInfo<U>> {
        self.phases.values()
    }
}

impl<U: IrUnit> Default for PhaseRegistry<U> {
    fn default() -> Self {
        Self::new()
    }
}
