//! Run statistics.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Reached-set size around one refinement iteration.
#[derive(Debug, Clone, Serialize)]
pub struct ReachedSizeSample {
    pub iteration: usize,
    pub before: usize,
    pub after: usize,
}

/// Counters and timings for one verification run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    /// Transfer-relation invocations.
    pub transfer_calls: usize,
    /// Graph nodes ever created, including merged-away and pruned ones.
    pub states_created: usize,
    /// Sibling merges that changed the reached state.
    pub merges: usize,
    /// Candidates stopped by coverage.
    pub coverings: usize,
    /// Candidates dropped by precision adjustment.
    pub adjustment_breaks: usize,
    /// Candidate error states surfaced by exploration.
    pub targets_found: usize,
    /// Refinement iterations executed.
    pub refinements: usize,
    /// Targets proven spurious.
    pub spurious_targets: usize,
    /// Targets confirmed feasible.
    pub feasible_targets: usize,
    /// Peak reached-set size.
    pub max_reached_size: usize,
    /// Reached-set size before/after each refinement.
    pub reached_sizes: Vec<ReachedSizeSample>,
    /// Notes recorded when unevaluable edges were skipped; non-empty
    /// notes downgrade a `Safe` verdict to `Unknown`.
    pub unsound_skips: Vec<String>,
    /// Wall time spent in the reachability algorithm.
    pub explore_time: Duration,
    /// Wall time spent in feasibility checks and refinement.
    pub refine_time: Duration,
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Exploration statistics:")?;
        writeln!(f, "  Transfer calls:     {}", self.transfer_calls)?;
        writeln!(f, "  States created:     {}", self.states_created)?;
        writeln!(f, "  Merges:             {}", self.merges)?;
        writeln!(f, "  Coverings:          {}", self.coverings)?;
        writeln!(f, "  Adjustment breaks:  {}", self.adjustment_breaks)?;
        writeln!(f, "  Peak reached size:  {}", self.max_reached_size)?;
        writeln!(f, "  Exploration time:   {:?}", self.explore_time)?;
        writeln!(f, "Refinement statistics:")?;
        writeln!(f, "  Targets found:      {}", self.targets_found)?;
        writeln!(f, "  Refinements:        {}", self.refinements)?;
        writeln!(f, "  Spurious targets:   {}", self.spurious_targets)?;
        writeln!(f, "  Feasible targets:   {}", self.feasible_targets)?;
        writeln!(f, "  Refinement time:    {:?}", self.refine_time)?;
        for sample in &self.reached_sizes {
            writeln!(
                f,
                "  Iteration {}: reached {} -> {}",
                sample.iteration, sample.before, sample.after
            )?;
        }
        if !self.unsound_skips.is_empty() {
            writeln!(f, "Unsoundness notes:")?;
            for note in &self.unsound_skips {
                writeln!(f, "  {note}")?;
            }
        }
        Ok(())
    }
}
