//! The refinement seams: the external feasibility collaborator and the
//! analysis's precision-strengthening hook.

use kestrel_cfa::Cfa;
use kestrel_domain::Analysis;
use thiserror::Error;

use crate::path::ErrorPath;

/// Outcome of checking one candidate error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefinementVerdict {
    /// The path is executable; the model is a concrete witness
    /// valuation.
    Feasible { model: Vec<(String, i64)> },
    /// The path is spurious; the interpolant sequence separates cause
    /// from effect along it and feeds the precision refinement.
    Infeasible { interpolants: Vec<String> },
}

/// Failures of the feasibility collaborator. Fatal to the current
/// refinement iteration; retried per configuration, never silently
/// ignored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeasibilityError {
    #[error("solver failure: {0}")]
    Solver(String),
    #[error("solver timed out")]
    Timeout,
}

/// The external feasibility/interpolation collaborator.
///
/// The engine treats it as a black box: the request is the ordered
/// `(state, entering edge)` path from a graph root to the candidate
/// error state, the response classifies the path.
pub trait FeasibilityCheck<S> {
    fn check(
        &mut self,
        path: &ErrorPath<S>,
        cfa: &Cfa,
    ) -> Result<RefinementVerdict, FeasibilityError>;
}

/// The analysis could not turn the interpolants into a stronger
/// precision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RefinementError(pub String);

/// Result of one precision refinement.
#[derive(Debug, Clone)]
pub struct RefinementPlan<P> {
    /// The strengthened precision; must measure strictly larger than
    /// the precision it replaces.
    pub precision: P,
    /// Index into the error path of the deepest node invalidated by the
    /// new precision; the engine prunes the subtree rooted there. Index
    /// 0 (the root) is never pruned; out-of-range values fall back to
    /// the first non-root node.
    pub pivot: usize,
}

/// The concrete analysis's refinement hook.
///
/// Called on a spurious error path with the interpolants produced by
/// the feasibility collaborator. Every call must strengthen the
/// precision: the engine asserts that
/// [`precision_measure`](Self::precision_measure) strictly increases,
/// and rejects a refinement that does not as an internal error rather
/// than loop forever.
pub trait PrecisionRefiner: Analysis {
    fn refine(
        &self,
        path: &ErrorPath<Self::State>,
        interpolants: &[String],
        current: &Self::Precision,
    ) -> Result<RefinementPlan<Self::Precision>, RefinementError>;

    /// A monotonic size of `precision` (number of tracked predicates,
    /// variables, ...). Refinement must strictly increase it.
    fn precision_measure(&self, precision: &Self::Precision) -> usize;
}
