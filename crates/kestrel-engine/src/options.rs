//! Engine configuration.

use kestrel_arg::WaitlistPolicy;
use kestrel_domain::MergePolicy;

/// How candidate error states are ranked when several are pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetRanking {
    /// Prefer targets deeper in the reachability graph. Deeper targets
    /// tend to carry longer, more constrained paths, which refine the
    /// precision faster.
    #[default]
    DeepestFirst,
    /// Prefer shallow targets (shortest candidate paths first).
    ShallowestFirst,
    /// Prefer targets in creation order.
    OldestFirst,
}

/// What to do when the transfer relation cannot evaluate an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferErrorPolicy {
    /// Abort the whole run with a diagnosable error.
    #[default]
    Abort,
    /// Abort only the current state's exploration and record an
    /// unsoundness note; a run that skipped edges never reports `Safe`.
    SkipUnsound,
}

/// Options for one verification run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Function whose entry node seeds the exploration.
    pub entry_function: String,
    /// Waitlist exploration order.
    pub waitlist: WaitlistPolicy,
    /// Merge policy for same-location siblings; `Join` is validated
    /// against the domain when the engine is constructed.
    pub merge: MergePolicy,
    /// Ranking among pending candidate error states.
    pub target_ranking: TargetRanking,
    /// Stop at the first confirmed counterexample instead of searching
    /// for more bugs.
    pub halt_on_first_feasible: bool,
    /// Refinement iterations before the run gives up as `Unknown`.
    pub max_refinements: usize,
    /// Additional attempts after a failed feasibility check before the
    /// failure becomes fatal.
    pub max_feasibility_retries: u32,
    /// Handling of unevaluable edges.
    pub on_transfer_error: TransferErrorPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            entry_function: "main".into(),
            waitlist: WaitlistPolicy::default(),
            merge: MergePolicy::default(),
            target_ranking: TargetRanking::default(),
            halt_on_first_feasible: true,
            max_refinements: 100,
            max_feasibility_retries: 0,
            on_transfer_error: TransferErrorPolicy::default(),
        }
    }
}
