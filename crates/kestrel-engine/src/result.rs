//! The result surface of a verification run.

use std::fmt;

use kestrel_arg::ArgId;
use serde::Serialize;

use crate::path::Counterexample;
use crate::statistics::RunStatistics;

/// The outcome of one verification run.
#[derive(Debug, Clone, Serialize)]
pub enum Verdict {
    /// The waitlist was exhausted without a feasible error path.
    Safe,
    /// A candidate error path was confirmed executable.
    Unsafe { counterexample: Counterexample },
    /// The run completed without a definite answer.
    Unknown { reason: String },
}

impl Verdict {
    /// Machine-readable verdict class, stable across runs with the same
    /// input and options.
    pub fn verdict_class(&self) -> &'static str {
        match self {
            Verdict::Safe => "safe",
            Verdict::Unsafe { .. } => "unsafe",
            Verdict::Unknown { .. } => "unknown",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => write!(f, "RESULT: SAFE"),
            Verdict::Unsafe { counterexample } => {
                writeln!(f, "RESULT: UNSAFE")?;
                write!(f, "{counterexample}")
            }
            Verdict::Unknown { reason } => {
                writeln!(f, "RESULT: UNKNOWN")?;
                write!(f, "Reason: {reason}")
            }
        }
    }
}

/// Audit entry for one refinement iteration.
#[derive(Debug, Clone, Serialize)]
pub struct RefinementAudit {
    /// Iteration index in execution order, starting at 1.
    pub iteration: usize,
    /// The ranked target this iteration worked on.
    pub target: ArgId,
    /// Exploration depth of the target when it was selected.
    pub target_depth: usize,
    /// `feasible` or `infeasible`.
    pub verdict_class: String,
    /// Interpolants returned for a spurious path; empty when feasible.
    pub interpolants: Vec<String>,
    /// Graph nodes pruned by this iteration.
    pub removed_states: usize,
    /// Reached-set size before pruning.
    pub reached_before: usize,
    /// Reached-set size after pruning.
    pub reached_after: usize,
    /// Precision measure before the refinement.
    pub measure_before: usize,
    /// Precision measure after the refinement; strictly larger on every
    /// spurious iteration.
    pub measure_after: usize,
}

/// Why the run stopped.
#[derive(Debug, Clone, Serialize)]
pub struct Termination {
    /// Stable reason code: `waitlist_exhausted`,
    /// `feasible_counterexample`, or `refinement_budget_exhausted`.
    pub reason: String,
    /// Configured refinement budget.
    pub refinement_budget: usize,
    /// Refinement iterations actually executed.
    pub refinements_used: usize,
}

/// Machine-readable report of one verification run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub verdict: Verdict,
    /// Every confirmed counterexample; more than one only when the run
    /// is configured to keep searching after the first bug.
    pub counterexamples: Vec<Counterexample>,
    /// Iteration-by-iteration refinement audit.
    pub refinements: Vec<RefinementAudit>,
    pub statistics: RunStatistics,
    pub termination: Termination,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.verdict)?;
        writeln!(
            f,
            "Termination: {} ({} of {} refinement(s) used)",
            self.termination.reason,
            self.termination.refinements_used,
            self.termination.refinement_budget
        )?;
        write!(f, "{}", self.statistics)
    }
}
