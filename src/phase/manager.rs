//! Ownership and lifetime of cached analysis results.
//!
//! One [`AnalysisDataManager`] serves one scheduler: module pipelines have
//! their own, and every function pipeline owns one for its function. Keys
//! pair the unit with the phase, so a manager driving several units (the
//! sequential function driver reuses one across a module's functions) keeps
//! their results apart.
//!
//! A result entry passes through two steps: `open_result_scope` reserves
//! the entry before the analysis body runs, and `install_result` fills it
//! after. Eviction only ever touches installed results; an open scope whose
//! analysis is still executing survives every eviction path, so a phase
//! that forcibly clears the cache from inside its own body cannot destroy
//! the entry it is about to fill.

use std::any::Any;
use std::collections::BTreeMap;

use crate::error::raise_fatal;
use crate::phase::dep::PreservationPolicy;
use crate::phase::registry::{PhaseId, UnitId};

/// Cache key of one analysis result: the unit it was computed over and the
/// phase that computed it.
pub type AnalysisKey = (UnitId, PhaseId);

/// The cached-analysis store of one scheduler.
///
/// Results are type-erased payloads surrendered by analysis phases;
/// [`AnalysisDataManager::expect_result`] recovers the concrete type.
/// Lookups of results that are not available abort through the terminating
/// diagnostic route: a phase asking for an analysis it never declared (or
/// one evicted since) is a compiler-authoring bug, and answering it with
/// a recomputation here would hide the missing declaration.
///
/// Ordered maps keep eviction order deterministic for the event log.
#[derive(Debug, Default)]
pub struct AnalysisDataManager {
    /// Phase names of every opened entry, live from `open_result_scope`
    /// until the entry is evicted. Serves diagnostics and cycle detection.
    scopes: BTreeMap<AnalysisKey, &'static str>,
    results: BTreeMap<AnalysisKey, Box<dyn Any + Send + Sync>>,
}

impl AnalysisDataManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        AnalysisDataManager::default()
    }

    /// Reserves the cache entry that will own a phase's payload.
    ///
    /// Called before the analysis body runs. Finding the scope already open
    /// means the phase was demanded again while still executing, which is a
    /// circular dependency; both that and reopening over a cached result
    /// abort.
    pub fn open_result_scope(&mut self, key: AnalysisKey, phase_name: &'static str) {
        if self.scopes.contains_key(&key) {
            if self.results.contains_key(&key) {
                raise_fatal(&contract_error!(
                    "analysis `{}` scope reopened while its result is cached (unit {})",
                    phase_name,
                    key.0
                ));
            }
            raise_fatal(&contract_error!(
                "circular dependency: analysis `{}` demanded while it is running (unit {})",
                phase_name,
                key.0
            ));
        }
        self.scopes.insert(key, phase_name);
    }

    /// Installs the payload an analysis surrendered.
    ///
    /// The entry's scope must have been opened and not yet filled.
    pub fn install_result(&mut self, key: AnalysisKey, payload: Box<dyn Any + Send + Sync>) {
        if !self.scopes.contains_key(&key) {
            raise_fatal(&contract_error!(
                "result installed for {} with no open scope (unit {})",
                key.1,
                key.0
            ));
        }
        if self.results.insert(key, payload).is_some() {
            raise_fatal(&contract_error!(
                "result for {} installed twice (unit {})",
                key.1,
                key.0
            ));
        }
    }

    /// Returns `true` if a result is installed under `key`.
    #[must_use]
    pub fn is_available(&self, key: AnalysisKey) -> bool {
        self.results.contains_key(&key)
    }

    /// Fetches an installed result, downcast to its concrete type.
    ///
    /// Aborts if the result is unavailable or was cached with a different
    /// type than requested.
    #[must_use]
    pub fn expect_result<T: Any>(&self, key: AnalysisKey) -> &T {
        let Some(payload) = self.results.get(&key) else {
            raise_fatal(&contract_error!(
                "required analysis {} has not run for unit {}",
                self.describe(key),
                key.0
            ));
        };
        match payload.downcast_ref::<T>() {
            Some(result) => result,
            None => raise_fatal(&contract_error!(
                "analysis {} cached a different result type than requested",
                self.describe(key)
            )),
        }
    }

    /// Evicts one installed entry, freeing its payload.
    ///
    /// Returns `true` if a result was evicted. Erasing an entry that was
    /// never computed aborts; erasing one whose analysis is still running
    /// leaves the open scope alone and returns `false`.
    pub fn erase(&mut self, key: AnalysisKey) -> bool {
        if !self.scopes.contains_key(&key) && !self.results.contains_key(&key) {
            raise_fatal(&contract_error!(
                "erasing analysis {} that was never computed (unit {})",
                key.1,
                key.0
            ));
        }
        if self.results.remove(&key).is_some() {
            self.scopes.remove(&key);
            return true;
        }
        false
    }

    /// Evicts every installed entry. Idempotent.
    ///
    /// Returns the evicted keys in key order. Open scopes of running
    /// analyses survive.
    pub fn erase_all(&mut self) -> Vec<AnalysisKey> {
        let installed = std::mem::take(&mut self.results);
        for key in installed.keys() {
            self.scopes.remove(key);
        }
        installed.into_keys().collect()
    }

    /// Applies a transform's preservation policy to one unit's entries.
    ///
    /// Returns the evicted keys in key order. Entries of other units and
    /// open scopes of running analyses are never touched.
    pub fn clear_invalid(&mut self, unit: UnitId, policy: &PreservationPolicy) -> Vec<AnalysisKey> {
        let doomed: Vec<AnalysisKey> = match policy {
            PreservationPolicy::PreserveAll => Vec::new(),
            PreservationPolicy::PreserveNone => self
                .results
                .keys()
                .filter(|key| key.0 == unit)
                .copied()
                .collect(),
            PreservationPolicy::PreserveExcept(evict) => self
                .results
                .keys()
                .filter(|key| key.0 == unit && evict.contains(&key.1))
                .copied()
                .collect(),
            PreservationPolicy::PreserveOnly(keep) => self
                .results
                .keys()
                .filter(|key| key.0 == unit && !keep.contains(&key.1))
                .copied()
                .collect(),
        };
        for key in &doomed {
            self.results.remove(key);
            self.scopes.remove(key);
        }
        doomed
    }

    /// Number of installed results for one unit.
    #[must_use]
    pub fn live_results(&self, unit: UnitId) -> usize {
        self.results.keys().filter(|key| key.0 == unit).count()
    }

    /// Returns `true` if no entry, installed or merely opened, exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty() && self.results.is_empty()
    }

    fn describe(&self, key: AnalysisKey) -> String {
        match self.scopes.get(&key) {
            Some(name) => format!("`{name}`"),
            None => key.1.to_string(),
        }
    }
}
