//! Merge and stop operators.
//!
//! Both are engine-side values rather than per-analysis traits: the
//! only two merge behaviors are "keep siblings separate" and "join
//! same-location siblings", and the stop test is subsumption against
//! the reached siblings. What varies per analysis is the lattice they
//! consult, so both take the domain as an argument. Requesting the join
//! policy on a domain without a join fails here, at construction.

use crate::errors::ConfigError;
use crate::traits::AbstractDomain;

/// How sibling states at one program location are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Never combine: the new state is kept as-is next to its siblings.
    #[default]
    Separate,
    /// Combine via the domain's join.
    Join,
}

/// A validated merge operator.
#[derive(Debug, Clone, Copy)]
pub struct MergeOp {
    policy: MergePolicy,
}

impl MergeOp {
    /// The separate policy; valid for every domain.
    pub fn separate() -> Self {
        Self {
            policy: MergePolicy::Separate,
        }
    }

    /// The join policy; rejected at construction when `domain` has no
    /// join.
    pub fn join<A: AbstractDomain>(domain: &A) -> Result<Self, ConfigError> {
        if !domain.supports_join() {
            return Err(ConfigError::JoinMergeUnsupported {
                domain: domain.name(),
            });
        }
        Ok(Self {
            policy: MergePolicy::Join,
        })
    }

    /// Validate `policy` against `domain`.
    pub fn for_policy<A: AbstractDomain>(
        policy: MergePolicy,
        domain: &A,
    ) -> Result<Self, ConfigError> {
        match policy {
            MergePolicy::Separate => Ok(Self::separate()),
            MergePolicy::Join => Self::join(domain),
        }
    }

    /// The policy this operator was constructed with.
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Combine an existing reached state with a new sibling.
    ///
    /// Under `Separate` the new state is returned unchanged; under
    /// `Join` the domain join of both. The caller compares the result
    /// against `old` to decide whether the reached state must be
    /// replaced.
    pub fn merge<A: AbstractDomain>(
        &self,
        domain: &A,
        old: &A::State,
        new: &A::State,
        _precision: &A::Precision,
    ) -> Result<A::State, ConfigError> {
        match self.policy {
            MergePolicy::Separate => Ok(new.clone()),
            MergePolicy::Join => domain.join(old, new),
        }
    }
}

/// The coverage / fixpoint test.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOp;

impl StopOp {
    /// The first reached sibling that subsumes `candidate`, if any.
    ///
    /// "First" is the iteration order of `siblings`, which the caller
    /// derives from reached-set insertion order. When several siblings
    /// subsume the candidate this choice is deterministic per run but
    /// deliberately non-canonical: any subsuming sibling would be a
    /// sound covering state.
    pub fn first_covering<'a, A, H, I>(
        &self,
        domain: &A,
        candidate: &A::State,
        siblings: I,
    ) -> Option<H>
    where
        A: AbstractDomain,
        A::State: 'a,
        H: Copy,
        I: IntoIterator<Item = (H, &'a A::State)>,
    {
        siblings
            .into_iter()
            .find(|(_, sibling)| domain.is_less_or_equal(candidate, sibling))
            .map(|(handle, _)| handle)
    }
}
