//! Dependency declarations and cache preservation policies.
//!
//! A phase states, once, which analyses must be available before its body
//! runs and which cached results survive it. The scheduler caches the
//! declaration per phase id and consults it on every run, so declarations
//! must depend only on the phase's identity, never on the unit.

use std::collections::BTreeSet;

use crate::phase::registry::PhaseId;

/// Which cached analysis results survive a transform.
///
/// Applied by [`clear_invalid`](crate::phase::AnalysisDataManager::clear_invalid)
/// to the transformed unit's entries immediately after the transform body
/// returns. The four arms are independent and exhaustive; there is no
/// implicit interaction between a keep-set and an evict-set.
///
/// The ordered sets make eviction order deterministic, which keeps the
/// phase event log stable for a given pipeline and input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreservationPolicy {
    /// Every cached result survives.
    PreserveAll,
    /// No cached result for the unit survives. The default: a transform
    /// that declares nothing is assumed to invalidate everything.
    #[default]
    PreserveNone,
    /// Everything survives except the named analyses.
    PreserveExcept(BTreeSet<PhaseId>),
    /// Only the named analyses survive.
    PreserveOnly(BTreeSet<PhaseId>),
}

impl PreservationPolicy {
    /// Builds a [`PreservationPolicy::PreserveExcept`] from an id list.
    #[must_use]
    pub fn except<I: IntoIterator<Item = PhaseId>>(ids: I) -> Self {
        PreservationPolicy::PreserveExcept(ids.into_iter().collect())
    }

    /// Builds a [`PreservationPolicy::PreserveOnly`] from an id list.
    #[must_use]
    pub fn only<I: IntoIterator<Item = PhaseId>>(ids: I) -> Self {
        PreservationPolicy::PreserveOnly(ids.into_iter().collect())
    }
}

/// One phase's declared requirements and preservation contract.
///
/// Filled in by [`Phase::declare_dependencies`](crate::phase::Phase::declare_dependencies)
/// and cached per phase id by the scheduler. Required phases run, in
/// declaration order, before the declaring phase's body; the policy is
/// applied after a transform's body returns and is ignored for analyses.
#[derive(Debug, Clone, Default)]
pub struct AnalysisDep {
    required: Vec<PhaseId>,
    preserved: PreservationPolicy,
}

impl AnalysisDep {
    /// Creates an empty declaration: no requirements,
    /// [`PreservationPolicy::PreserveNone`].
    #[must_use]
    pub fn new() -> Self {
        AnalysisDep::default()
    }

    /// Requires `id` to be available before the declaring phase runs.
    ///
    /// Repeated declarations of the same id are collapsed; order of first
    /// mention is kept.
    pub fn add_required(&mut self, id: PhaseId) -> &mut Self {
        if !self.required.contains(&id) {
            self.required.push(id);
        }
        self
    }

    /// Sets the preservation policy applied after the declaring transform.
    pub fn set_preserved(&mut self, policy: PreservationPolicy) -> &mut Self {
        self.preserved = policy;
        self
    }

    /// Returns the required phases in declaration order.
    #[must_use]
    pub fn required(&self) -> &[PhaseId] {
        &self.required
    }

    /// Returns the preservation policy.
    #[must_use]
    pub const fn preserved(&self) -> &PreservationPolicy {
        &self.preserved
    }
}
