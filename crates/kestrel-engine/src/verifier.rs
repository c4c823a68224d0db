//! Engine construction and the refinement loop.

use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use kestrel_arg::{Arg, ArgError, ArgId, ReachedSet};
use kestrel_cfa::Cfa;
use kestrel_domain::{
    AbstractDomain, AbstractState, ConfigError, MergeOp, PrecisionAdjustment, StopOp,
    TransferRelation,
};
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::explore::ExploreOutcome;
use crate::options::{EngineOptions, TargetRanking};
use crate::path::{Counterexample, ErrorPath, PathStep};
use crate::refine::{FeasibilityCheck, PrecisionRefiner, RefinementVerdict};
use crate::result::{RefinementAudit, RunReport, Termination, Verdict};
use crate::shutdown::ShutdownToken;
use crate::statistics::{ReachedSizeSample, RunStatistics};

/// The full operator set the engine drives. Blanket-implemented for any
/// analysis that provides the four contracts.
pub trait EngineAnalysis:
    AbstractDomain + TransferRelation + PrecisionAdjustment + PrecisionRefiner
{
}

impl<T> EngineAnalysis for T where
    T: AbstractDomain + TransferRelation + PrecisionAdjustment + PrecisionRefiner
{
}

pub(crate) enum TargetOutcome {
    Confirmed,
    Refined,
}

/// One verification run: the reachability algorithm driven repeatedly
/// under a refinement loop, against a shared reachability graph and
/// reached set.
///
/// Single-threaded and run-to-completion; the only blocking operation
/// is the feasibility collaborator. Cancellation is polled between
/// waitlist iterations and between refinement iterations via the
/// [`ShutdownToken`].
#[derive(Debug)]
pub struct Verifier<'c, A, C>
where
    A: EngineAnalysis,
    C: FeasibilityCheck<A::State>,
{
    pub(crate) analysis: A,
    pub(crate) cfa: &'c Cfa,
    pub(crate) checker: C,
    pub(crate) options: EngineOptions,
    pub(crate) shutdown: ShutdownToken,
    pub(crate) merge: MergeOp,
    pub(crate) stop: StopOp,
    pub(crate) arg: Arg<A::State>,
    pub(crate) reached: ReachedSet<A::Precision>,
    pub(crate) stats: RunStatistics,
    /// Targets confirmed feasible, permanently excluded from ranking.
    pub(crate) confirmed: IndexSet<ArgId>,
    /// Last interpolant sequence seen per target, for the non-progress
    /// check on consecutive spurious verdicts.
    pub(crate) last_interpolants: IndexMap<ArgId, Vec<String>>,
    pub(crate) counterexamples: Vec<Counterexample>,
    pub(crate) audits: Vec<RefinementAudit>,
}

impl<'c, A, C> Verifier<'c, A, C>
where
    A: EngineAnalysis,
    C: FeasibilityCheck<A::State>,
{
    /// Wire an analysis, a control-flow automaton, and a feasibility
    /// collaborator into a runnable engine.
    ///
    /// Configuration problems (join merging on a joinless domain, an
    /// unknown entry function) are rejected here, never mid-run.
    pub fn new(
        analysis: A,
        cfa: &'c Cfa,
        checker: C,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let merge = MergeOp::for_policy(options.merge, &analysis)?;
        let entry = cfa
            .entry(&options.entry_function)
            .ok_or_else(|| ConfigError::UnknownEntryFunction(options.entry_function.clone()))?;

        let mut arg = Arg::new();
        let mut reached = ReachedSet::new(options.waitlist);
        let state = analysis.initial_state(entry);
        let precision = analysis.initial_precision();
        let location = state.location();
        let root = arg.add_root(state);
        reached.add(root, location, precision);

        Ok(Self {
            analysis,
            cfa,
            checker,
            options,
            shutdown: ShutdownToken::new(),
            merge,
            stop: StopOp,
            arg,
            reached,
            stats: RunStatistics::default(),
            confirmed: IndexSet::new(),
            last_interpolants: IndexMap::new(),
            counterexamples: Vec::new(),
            audits: Vec::new(),
        })
    }

    /// A handle for requesting cooperative shutdown from outside.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Run to completion: alternate reachability and refinement until
    /// the state space is exhausted with no pending target, a
    /// counterexample is confirmed (and the run is configured to halt),
    /// or the refinement budget runs out.
    pub fn run(&mut self) -> Result<RunReport, EngineError> {
        info!(analysis = self.analysis.name(), "verification run started");
        let reason = loop {
            if self.shutdown.is_requested() {
                return Err(EngineError::Cancelled);
            }
            let explore_started = Instant::now();
            let outcome = self.explore();
            self.stats.explore_time += explore_started.elapsed();
            let outcome = outcome?;

            // Rank among every pending target, not just the one the
            // explorer may have stopped on. A target can outlive the
            // pruning of its own refinement through a second parent, so
            // an exhausted waitlist alone does not mean the run is
            // sound.
            let Some(target) = self.select_target()? else {
                match outcome {
                    ExploreOutcome::WaitlistExhausted => break "waitlist_exhausted",
                    ExploreOutcome::TargetFound(_) => continue,
                }
            };
            debug!(%target, "candidate error state selected");
            let refine_started = Instant::now();
            let handled = self.handle_target(target);
            self.stats.refine_time += refine_started.elapsed();
            match handled? {
                TargetOutcome::Confirmed => {
                    if self.options.halt_on_first_feasible {
                        break "feasible_counterexample";
                    }
                }
                TargetOutcome::Refined => {
                    if self.stats.refinements >= self.options.max_refinements {
                        break "refinement_budget_exhausted";
                    }
                }
            }
        };

        self.stats.states_created = self.arg.created();
        let verdict = self.final_verdict(reason);
        info!(
            verdict = verdict.verdict_class(),
            reason, "verification run finished"
        );
        Ok(RunReport {
            verdict,
            counterexamples: self.counterexamples.clone(),
            refinements: self.audits.clone(),
            statistics: self.stats.clone(),
            termination: Termination {
                reason: reason.to_string(),
                refinement_budget: self.options.max_refinements,
                refinements_used: self.stats.refinements,
            },
        })
    }

    fn final_verdict(&self, reason: &str) -> Verdict {
        if let Some(counterexample) = self.counterexamples.first() {
            return Verdict::Unsafe {
                counterexample: counterexample.clone(),
            };
        }
        if reason == "refinement_budget_exhausted" {
            return Verdict::Unknown {
                reason: format!(
                    "refinement budget of {} iteration(s) exhausted",
                    self.options.max_refinements
                ),
            };
        }
        if !self.stats.unsound_skips.is_empty() {
            return Verdict::Unknown {
                reason: format!(
                    "{} edge(s) were skipped as unevaluable; the explored state space is incomplete",
                    self.stats.unsound_skips.len()
                ),
            };
        }
        Verdict::Safe
    }

    /// The best pending target under the configured ranking.
    /// Confirmed-feasible targets are permanently excluded by id so the
    /// loop cannot cycle on the same bug; covered targets are excluded
    /// because their covering state subsumes them and its verdict
    /// governs.
    pub(crate) fn select_target(&self) -> Result<Option<ArgId>, EngineError> {
        let mut best: Option<(usize, ArgId)> = None;
        for id in self.arg.target_ids() {
            if self.confirmed.contains(&id) || self.arg.is_covered(id)? {
                continue;
            }
            let depth = self.arg.depth(id)?;
            let better = match (self.options.target_ranking, &best) {
                (_, None) => true,
                (TargetRanking::DeepestFirst, Some((d, b))) => {
                    depth > *d || (depth == *d && id < *b)
                }
                (TargetRanking::ShallowestFirst, Some((d, b))) => {
                    depth < *d || (depth == *d && id < *b)
                }
                (TargetRanking::OldestFirst, Some((_, b))) => id < *b,
            };
            if better {
                best = Some((depth, id));
            }
        }
        Ok(best.map(|(_, id)| id))
    }

    fn handle_target(&mut self, target: ArgId) -> Result<TargetOutcome, EngineError> {
        let path = self.build_path(target)?;
        let target_depth = path.len().saturating_sub(1);
        let verdict = self.check_feasibility(&path, target)?;
        let iteration = self.audits.len() + 1;

        match verdict {
            RefinementVerdict::Feasible { model } => {
                info!(%target, "counterexample confirmed feasible");
                self.confirmed.insert(target);
                self.stats.feasible_targets += 1;
                let counterexample =
                    Counterexample::from_path(&path, self.cfa, model, target);
                self.counterexamples.push(counterexample);
                self.audits.push(RefinementAudit {
                    iteration,
                    target,
                    target_depth,
                    verdict_class: "feasible".into(),
                    interpolants: Vec::new(),
                    removed_states: 0,
                    reached_before: self.reached.len(),
                    reached_after: self.reached.len(),
                    measure_before: self.current_measure(target),
                    measure_after: self.current_measure(target),
                });
                Ok(TargetOutcome::Confirmed)
            }
            RefinementVerdict::Infeasible { interpolants } => {
                debug!(%target, ?interpolants, "spurious target, refining");
                if path.len() <= 1 {
                    return Err(EngineError::NoProgress {
                        target,
                        reason: "the initial state was reported infeasible; there is no \
                                 ancestor to prune"
                            .into(),
                    });
                }
                if let Some(previous) = self.last_interpolants.get(&target) {
                    if previous == &interpolants {
                        return Err(EngineError::NoProgress {
                            target,
                            reason: "two consecutive infeasible verdicts carried an \
                                     identical interpolant sequence"
                                .into(),
                        });
                    }
                }
                self.last_interpolants.insert(target, interpolants.clone());

                let precision = self
                    .reached
                    .precision(target)
                    .cloned()
                    .ok_or(ArgError::Stale(target))?;
                let measure_before = self.analysis.precision_measure(&precision);
                let plan = self
                    .analysis
                    .refine(&path, &interpolants, &precision)
                    .map_err(|source| EngineError::RefinementHook { target, source })?;
                let measure_after = self.analysis.precision_measure(&plan.precision);
                if measure_after <= measure_before {
                    return Err(EngineError::NoProgress {
                        target,
                        reason: format!(
                            "precision measure did not increase ({measure_before} -> {measure_after})"
                        ),
                    });
                }

                let pivot_index = if (1..path.len()).contains(&plan.pivot) {
                    plan.pivot
                } else {
                    1
                };
                let pivot = path.steps()[pivot_index].id;
                let reached_before = self.reached.len();
                let removed = self.prune(pivot, &plan.precision)?;
                let reached_after = self.reached.len();

                self.stats.refinements += 1;
                self.stats.spurious_targets += 1;
                self.stats.reached_sizes.push(ReachedSizeSample {
                    iteration,
                    before: reached_before,
                    after: reached_after,
                });
                self.audits.push(RefinementAudit {
                    iteration,
                    target,
                    target_depth,
                    verdict_class: "infeasible".into(),
                    interpolants,
                    removed_states: removed,
                    reached_before,
                    reached_after,
                    measure_before,
                    measure_after,
                });
                Ok(TargetOutcome::Refined)
            }
        }
    }

    fn current_measure(&self, target: ArgId) -> usize {
        self.reached
            .precision(target)
            .map(|p| self.analysis.precision_measure(p))
            .unwrap_or(0)
    }

    /// Remove the subtree rooted at `pivot` and resume exploration from
    /// its surviving parents under the strengthened precision.
    fn prune(&mut self, pivot: ArgId, precision: &A::Precision) -> Result<usize, EngineError> {
        let parents: Vec<ArgId> = self.arg.parents(pivot)?.map(|(p, _)| p).collect();
        let removal = self.arg.remove_subtree(pivot)?;
        for id in &removal.removed {
            self.reached.remove(*id);
            self.confirmed.shift_remove(id);
        }
        for id in removal.uncovered {
            if !self.reached.requeue(id) {
                warn!(%id, "uncovered node was not re-waitlisted");
            }
        }
        for parent in parents {
            if self.reached.contains(parent) {
                self.reached.set_precision(parent, precision.clone());
                self.reached.requeue(parent);
            }
        }
        let arg = &self.arg;
        self.last_interpolants.retain(|id, _| arg.contains(*id));
        Ok(removal.removed.len())
    }

    fn check_feasibility(
        &mut self,
        path: &ErrorPath<A::State>,
        target: ArgId,
    ) -> Result<RefinementVerdict, EngineError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.checker.check(path, self.cfa) {
                Ok(verdict) => return Ok(verdict),
                Err(source) => {
                    if attempts > self.options.max_feasibility_retries {
                        return Err(EngineError::Feasibility {
                            target,
                            attempts,
                            source,
                        });
                    }
                    warn!(%target, attempts, %source, "feasibility check failed, retrying");
                }
            }
        }
    }

    fn build_path(&self, target: ArgId) -> Result<ErrorPath<A::State>, EngineError> {
        let raw = self.arg.path_to(target)?;
        let mut steps = Vec::with_capacity(raw.len());
        for (id, entering_edge) in raw {
            steps.push(PathStep {
                id,
                state: self.arg.state(id)?.clone(),
                entering_edge,
            });
        }
        Ok(ErrorPath::new(steps))
    }

    /// Read access to the reachability graph, mainly for inspection in
    /// tests and reporting.
    pub fn arg(&self) -> &Arg<A::State> {
        &self.arg
    }

    /// Read access to the reached set.
    pub fn reached(&self) -> &ReachedSet<A::Precision> {
        &self.reached
    }

    /// Read access to the feasibility collaborator.
    pub fn checker(&self) -> &C {
        &self.checker
    }
}
