//! The core analysis contracts: lattice and transfer relation.

use kestrel_cfa::{Cfa, CfaEdge, NodeId};
use std::fmt;

use crate::errors::{ConfigError, TransferError};
use crate::state::AbstractState;

/// The base contract every analysis satisfies: one abstract state type,
/// one precision type, and the initial pair for an entry location.
///
/// Precisions are immutable values; refinement replaces a precision, it
/// never mutates one.
pub trait Analysis {
    type State: AbstractState;
    type Precision: Clone + fmt::Debug;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str {
        "analysis"
    }

    /// The abstract state describing the program at `entry` before any
    /// edge has been interpreted.
    fn initial_state(&self, entry: NodeId) -> Self::State;

    /// The coarsest precision this analysis starts from.
    fn initial_precision(&self) -> Self::Precision;
}

/// The lattice over an analysis's abstract states.
///
/// `join` and `is_less_or_equal` must agree: `a <= join(a, b)` and
/// `b <= join(a, b)` for all states the analysis can produce. A domain
/// without a meaningful join (a program-counter domain, say) implements
/// `is_less_or_equal` as structural equality and reports
/// `supports_join() == false`; requesting join-based merging on such a
/// domain is rejected when the merge operator is constructed, not when
/// it runs.
pub trait AbstractDomain: Analysis {
    /// Least upper bound of two states.
    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, ConfigError>;

    /// Partial order consistent with `join`.
    fn is_less_or_equal(&self, a: &Self::State, b: &Self::State) -> bool;

    /// Whether `join` is meaningful for this domain.
    fn supports_join(&self) -> bool {
        true
    }
}

/// Abstract successor computation.
///
/// Both variants must be pure: identical inputs produce structurally
/// identical outputs. An empty successor set means the edge is
/// infeasible under this state (bottom), which is a normal outcome, not
/// an error.
pub trait TransferRelation: Analysis {
    /// Successors of `state` across one CFA edge.
    fn successors_for_edge(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        edge: &CfaEdge,
    ) -> Result<Vec<Self::State>, TransferError>;

    /// Successors of `state` across every edge leaving its location.
    ///
    /// The default unions the edge-wise successors and requires the
    /// located-state capability; analyses whose states carry no
    /// location override this.
    fn successors(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        cfa: &Cfa,
    ) -> Result<Vec<Self::State>, TransferError> {
        let location = state.location().ok_or(TransferError::MissingLocation)?;
        let mut out = Vec::new();
        for edge in cfa.leaving_edges(location) {
            out.extend(self.successors_for_edge(state, precision, edge)?);
        }
        Ok(out)
    }
}
