//! The worklist reachability algorithm.
//!
//! One iteration pops a waiting state, computes its abstract successors
//! edge by edge, merges each candidate against its same-location
//! siblings, tests coverage, applies precision adjustment, and commits
//! the survivors to the reachability graph and the waitlist. Candidate
//! error states are surfaced to the refinement loop immediately instead
//! of being expanded; covered states join the graph for path
//! reconstruction but never re-enter the waitlist.

use kestrel_arg::{ArgError, ArgId};
use kestrel_cfa::EdgeId;
use kestrel_domain::{AbstractState, AdjustAction, MergePolicy, TransferError};
use tracing::{debug, trace, warn};

use crate::errors::EngineError;
use crate::options::TransferErrorPolicy;
use crate::refine::FeasibilityCheck;
use crate::verifier::{EngineAnalysis, Verifier};

/// Why one exploration phase returned.
pub(crate) enum ExploreOutcome {
    /// The abstract state space is exhausted under the current
    /// precision.
    WaitlistExhausted,
    /// A candidate error state was reached and awaits a feasibility
    /// verdict.
    TargetFound(ArgId),
}

impl<'c, A, C> Verifier<'c, A, C>
where
    A: EngineAnalysis,
    C: FeasibilityCheck<A::State>,
{
    pub(crate) fn explore(&mut self) -> Result<ExploreOutcome, EngineError> {
        loop {
            if self.shutdown.is_requested() {
                return Err(EngineError::Cancelled);
            }
            let Some(id) = self.reached.pop() else {
                return Ok(ExploreOutcome::WaitlistExhausted);
            };
            if self.arg.is_target(id)? {
                // Popped targets exist: the initial state may violate
                // the property, and pruning can uncover a previously
                // covered target. Either way it is surfaced, never
                // expanded.
                self.stats.targets_found += 1;
                return Ok(ExploreOutcome::TargetFound(id));
            }
            if let Some(found) = self.expand(id)? {
                return Ok(ExploreOutcome::TargetFound(found));
            }
            self.stats.max_reached_size = self.stats.max_reached_size.max(self.reached.len());
        }
    }

    /// Compute and process every successor of one popped state.
    fn expand(&mut self, id: ArgId) -> Result<Option<ArgId>, EngineError> {
        let precision = self
            .reached
            .precision(id)
            .cloned()
            .ok_or(ArgError::Stale(id))?;
        let state = self.arg.state(id)?.clone();
        trace!(%id, "expanding");

        match state.location() {
            Some(location) => {
                let edges: Vec<EdgeId> = self.cfa.leaving_edges(location).map(|e| e.id()).collect();
                for edge in edges {
                    self.stats.transfer_calls += 1;
                    let successors =
                        self.analysis
                            .successors_for_edge(&state, &precision, self.cfa.edge(edge));
                    match successors {
                        Ok(candidates) => {
                            for candidate in candidates {
                                if let Some(found) =
                                    self.process_candidate(id, candidate, &precision, Some(edge))?
                                {
                                    // The remaining edges of `id` stay
                                    // unexplored; requeue it so the run can
                                    // resume after the refiner is done.
                                    self.reached.requeue(id);
                                    return Ok(Some(found));
                                }
                            }
                        }
                        Err(source) => return self.transfer_failed(id, Some(edge), source),
                    }
                }
            }
            None => {
                self.stats.transfer_calls += 1;
                match self.analysis.successors(&state, &precision, self.cfa) {
                    Ok(candidates) => {
                        for candidate in candidates {
                            if let Some(found) =
                                self.process_candidate(id, candidate, &precision, None)?
                            {
                                self.reached.requeue(id);
                                return Ok(Some(found));
                            }
                        }
                    }
                    Err(source) => return self.transfer_failed(id, None, source),
                }
            }
        }
        Ok(None)
    }

    fn transfer_failed(
        &mut self,
        state: ArgId,
        edge: Option<EdgeId>,
        source: TransferError,
    ) -> Result<Option<ArgId>, EngineError> {
        match self.options.on_transfer_error {
            TransferErrorPolicy::Abort => Err(EngineError::Transfer {
                state,
                edge,
                source,
            }),
            TransferErrorPolicy::SkipUnsound => {
                warn!(%state, ?edge, %source, "skipping unevaluable edge");
                self.stats.unsound_skips.push(match edge {
                    Some(edge) => format!("state {state}, edge {edge}: {source}"),
                    None => format!("state {state}: {source}"),
                });
                // Abandon the rest of this state's exploration; other
                // waitlist entries are unaffected.
                Ok(None)
            }
        }
    }

    /// Merge, stop, adjust, insert — in that order — for one candidate
    /// successor. Returns the target id when the candidate violates the
    /// property.
    fn process_candidate(
        &mut self,
        parent: ArgId,
        candidate: A::State,
        precision: &A::Precision,
        edge: Option<EdgeId>,
    ) -> Result<Option<ArgId>, EngineError> {
        let location = candidate.location();

        // Merge pass: combine the candidate into each same-location
        // sibling; a changed sibling is removed and the merged state
        // reinserted (and re-explored).
        if self.merge.policy() == MergePolicy::Join {
            let siblings: Vec<ArgId> = self.reached.at_location(location).collect();
            for sibling in siblings {
                // On a self-loop the state under expansion is its own
                // sibling; replacing it here would invalidate the
                // parent handle of its remaining successors. Covered
                // and target siblings are left intact as well.
                if sibling == parent
                    || self.arg.is_covered(sibling)?
                    || self.arg.is_target(sibling)?
                {
                    continue;
                }
                let sibling_state = self.arg.state(sibling)?.clone();
                let merged = self
                    .merge
                    .merge(&self.analysis, &sibling_state, &candidate, precision)?;
                if merged != sibling_state {
                    let sibling_precision = self
                        .reached
                        .precision(sibling)
                        .cloned()
                        .ok_or(ArgError::Stale(sibling))?;
                    let replacement = self.arg.reinsert_merged(sibling, merged)?;
                    // The merged node now represents the candidate as
                    // well, so it gains the candidate's parent link.
                    self.arg.add_parent(replacement, parent, edge)?;
                    self.reached.remove(sibling);
                    self.reached.add(replacement, location, sibling_precision);
                    self.stats.merges += 1;
                    debug!(%sibling, %replacement, "sibling merged");
                }
            }
        }

        // Stop pass: the first uncovered sibling that subsumes the
        // candidate becomes its covering state. The candidate still
        // joins the graph, parent-linked, for path reconstruction.
        let covering = {
            let ids: Vec<ArgId> = self.reached.at_location(location).collect();
            let mut live: Vec<(ArgId, &A::State)> = Vec::with_capacity(ids.len());
            for sibling in ids {
                if self.arg.is_covered(sibling)? {
                    continue;
                }
                live.push((sibling, self.arg.state(sibling)?));
            }
            self.stop.first_covering(&self.analysis, &candidate, live)
        };
        if let Some(covering) = covering {
            let covered = self.arg.add_child(parent, candidate, edge)?;
            self.arg.set_covering(covered, covering)?;
            self.reached.add(covered, location, precision.clone());
            self.reached.suspend(covered);
            self.stats.coverings += 1;
            return Ok(None);
        }

        // Adjustment pass.
        let adjustment = {
            let ids: Vec<ArgId> = self.reached.at_location(location).collect();
            let mut pairs: Vec<(&A::State, &A::Precision)> = Vec::with_capacity(ids.len());
            for sibling in ids {
                if self.arg.is_covered(sibling)? {
                    continue;
                }
                if let (Ok(state), Some(prec)) =
                    (self.arg.state(sibling), self.reached.precision(sibling))
                {
                    pairs.push((state, prec));
                }
            }
            self.analysis.adjust(&candidate, precision, &pairs)
        };
        if adjustment.action == AdjustAction::Break {
            self.stats.adjustment_breaks += 1;
            return Ok(None);
        }

        let location = adjustment.state.location();
        let is_target = adjustment.state.is_target();
        let child = self.arg.add_child(parent, adjustment.state, edge)?;
        self.reached.add(child, location, adjustment.precision);
        if is_target {
            // Surface immediately; targets are never expanded.
            self.reached.suspend(child);
            self.stats.targets_found += 1;
            debug!(%child, "target state reached");
            return Ok(Some(child));
        }
        Ok(None)
    }
}
