//! Scheduler diagnostics: the phase event log and wall-clock timing.
//!
//! Every scheduler owns a [`PhaseLog`] recording what ran, what was
//! skipped, which dependencies were pulled in, and which cached results a
//! transform evicted. Recording is unconditional and cheap; printing only
//! happens in verbose mode or when a driver replays the log. Timing is the
//! one cross-worker structure: all schedulers feed the session's shared
//! [`PhaseTimings`] table, which aggregates per phase name.

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;

use crate::phase::registry::{PhaseKind, UnitId};

/// One record in a scheduler's event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A phase body was executed over a unit.
    Ran {
        /// Unit the phase ran over.
        unit: UnitId,
        /// Name of the phase.
        phase: &'static str,
        /// Whether it was an analysis or a transform.
        kind: PhaseKind,
        /// Whether the body reported changing the unit.
        changed: bool,
    },
    /// A skippable phase was bypassed by configuration.
    Skipped {
        /// Unit the phase would have run over.
        unit: UnitId,
        /// Name of the bypassed phase.
        phase: &'static str,
        /// The option responsible, `skip-from` or `skip-after`.
        option: &'static str,
    },
    /// A phase was run to satisfy another phase's dependency.
    DependencyForced {
        /// Unit the dependency ran over.
        unit: UnitId,
        /// Name of the dependency.
        phase: &'static str,
        /// Name of the demanding phase.
        by: &'static str,
        /// Recursion depth of the trigger, for indented replay.
        depth: usize,
    },
    /// A cached analysis result was evicted.
    Evicted {
        /// Unit whose cache entry was evicted.
        unit: UnitId,
        /// Name of the evicted analysis.
        phase: &'static str,
        /// Name of the transform (or force request) responsible.
        by: &'static str,
    },
}

impl fmt::Display for PhaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseEvent::Ran {
                unit,
                phase,
                kind,
                changed,
            } => {
                write!(f, "[{unit}] run {kind} phase [ {phase} ]")?;
                if *changed {
                    write!(f, " (changed)")?;
                }
                Ok(())
            }
            PhaseEvent::Skipped {
                unit,
                phase,
                option,
            } => {
                write!(f, "[{unit}] skip phase [ {phase} ] ({option})")
            }
            PhaseEvent::DependencyForced {
                unit,
                phase,
                by,
                depth,
            } => {
                write!(f, "[{unit}] ")?;
                for _ in 0..*depth {
                    write!(f, "  ")?;
                }
                write!(f, "++ trigger phase [ {phase} ] (for {by})")
            }
            PhaseEvent::Evicted { unit, phase, by } => {
                write!(f, "[{unit}] evict analysis [ {phase} ] (after {by})")
            }
        }
    }
}

/// Ordered record of one scheduler's activity.
#[derive(Debug, Default)]
pub struct PhaseLog {
    events: Vec<PhaseEvent>,
}

impl PhaseLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        PhaseLog::default()
    }

    /// Records that a phase body executed.
    pub fn ran(&mut self, unit: UnitId, phase: &'static str, kind: PhaseKind, changed: bool) {
        self.events.push(PhaseEvent::Ran {
            unit,
            phase,
            kind,
            changed,
        });
    }

    /// Records that configuration bypassed a phase.
    pub fn skipped(&mut self, unit: UnitId, phase: &'static str, option: &'static str) {
        self.events.push(PhaseEvent::Skipped {
            unit,
            phase,
            option,
        });
    }

    /// Records that a dependency was pulled in for another phase.
    pub fn dependency_forced(
        &mut self,
        unit: UnitId,
        phase: &'static str,
        by: &'static str,
        depth: usize,
    ) {
        self.events.push(PhaseEvent::DependencyForced {
            unit,
            phase,
            by,
            depth,
        });
    }

    /// Records the eviction of a cached result.
    pub fn evicted(&mut self, unit: UnitId, phase: &'static str, by: &'static str) {
        self.events.push(PhaseEvent::Evicted { unit, phase, by });
    }

    /// Returns the recorded events in order.
    #[must_use]
    pub fn events(&self) -> &[PhaseEvent] {
        &self.events
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Prints every event, one per line, to stdout.
    pub fn print(&self) {
        for event in &self.events {
            println!("{event}");
        }
    }
}

/// Accumulated wall-clock time of one phase across all runs and workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    /// Total time spent in the phase body.
    pub total: Duration,
    /// Number of body executions.
    pub runs: u64,
}

/// Cross-worker table of per-phase wall-clock time.
///
/// Keyed by phase name; every scheduler adds the elapsed time of each body
/// it runs. The table is shared by reference across rayon workers, so
/// entries aggregate over the whole session regardless of which worker ran
/// a given function.
#[derive(Debug, Default)]
pub struct PhaseTimings {
    table: DashMap<&'static str, PhaseTiming>,
}

impl PhaseTimings {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        PhaseTimings::default()
    }

    /// Adds one body execution's elapsed time to a phase's total.
    pub fn add(&self, phase: &'static str, elapsed: Duration) {
        let mut entry = self.table.entry(phase).or_default();
        entry.total += elapsed;
        entry.runs += 1;
    }

    /// Returns the table's entries sorted by total time, longest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(&'static str, PhaseTiming)> {
        let mut entries: Vec<(&'static str, PhaseTiming)> = self
            .table
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        entries.sort_by(|a, b| b.1.total.cmp(&a.1.total).then(a.0.cmp(b.0)));
        entries
    }

    /// Returns `true` if no phase has been timed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Formats the timing summary, longest phase first, with each phase's
    /// share of the summed total.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write;

        let entries = self.snapshot();
        let grand_total: Duration = entries.iter().map(|(_, t)| t.total).sum();
        let mut out = String::from("==== phase timing ====\n");
        for (name, timing) in &entries {
            let share = if grand_total.is_zero() {
                0.0
            } else {
                timing.total.as_secs_f64() / grand_total.as_secs_f64() * 100.0
            };
            let _ = writeln!(
                out,
                "  {:<20} {:>10.3}ms {:>6.2}%  ({} runs)",
                name,
                timing.total.as_secs_f64() * 1e3,
                share,
                timing.runs
            );
        }
        let _ = writeln!(
            out,
            "  {:<20} {:>10.3}ms",
            "total",
            grand_total.as_secs_f64() * 1e3
        );
        out
    }
}
