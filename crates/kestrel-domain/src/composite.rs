//! Fixed-arity composition of analyses.
//!
//! A [`Product`] wraps two component analyses into one whose state is
//! the pair of component states. Arity is fixed by the type for a whole
//! run; wider compositions nest (`Product<A, Product<B, C>>`). All
//! operators act componentwise; successor sets combine as a cartesian
//! product, and an empty component successor set (bottom) empties the
//! whole product.

use kestrel_cfa::{CfaEdge, NodeId};

use crate::errors::{ConfigError, TransferError};
use crate::precision::{AdjustAction, Adjustment, PrecisionAdjustment};
use crate::state::AbstractState;
use crate::traits::{AbstractDomain, Analysis, TransferRelation};

/// The composite of two analyses.
#[derive(Debug, Clone)]
pub struct Product<A, B> {
    left: A,
    right: B,
}

impl<A, B> Product<A, B> {
    pub fn new(left: A, right: B) -> Self {
        Self { left, right }
    }

    pub fn left(&self) -> &A {
        &self.left
    }

    pub fn right(&self) -> &B {
        &self.right
    }
}

/// A composite abstract state: one component per wrapped analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductState<S, T> {
    pub left: S,
    pub right: T,
}

impl<S, T> ProductState<S, T> {
    pub fn new(left: S, right: T) -> Self {
        Self { left, right }
    }
}

impl<S: AbstractState, T: AbstractState> AbstractState for ProductState<S, T> {
    fn location(&self) -> Option<NodeId> {
        self.left.location().or_else(|| self.right.location())
    }

    fn is_target(&self) -> bool {
        self.left.is_target() || self.right.is_target()
    }
}

impl<A: Analysis, B: Analysis> Analysis for Product<A, B> {
    type State = ProductState<A::State, B::State>;
    type Precision = (A::Precision, B::Precision);

    fn name(&self) -> &'static str {
        "composite"
    }

    fn initial_state(&self, entry: NodeId) -> Self::State {
        ProductState::new(self.left.initial_state(entry), self.right.initial_state(entry))
    }

    fn initial_precision(&self) -> Self::Precision {
        (self.left.initial_precision(), self.right.initial_precision())
    }
}

impl<A: AbstractDomain, B: AbstractDomain> AbstractDomain for Product<A, B> {
    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, ConfigError> {
        Ok(ProductState::new(
            self.left.join(&a.left, &b.left)?,
            self.right.join(&a.right, &b.right)?,
        ))
    }

    fn is_less_or_equal(&self, a: &Self::State, b: &Self::State) -> bool {
        self.left.is_less_or_equal(&a.left, &b.left)
            && self.right.is_less_or_equal(&a.right, &b.right)
    }

    fn supports_join(&self) -> bool {
        self.left.supports_join() && self.right.supports_join()
    }
}

impl<A: TransferRelation, B: TransferRelation> TransferRelation for Product<A, B> {
    fn successors_for_edge(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        edge: &CfaEdge,
    ) -> Result<Vec<Self::State>, TransferError> {
        let lefts = self
            .left
            .successors_for_edge(&state.left, &precision.0, edge)?;
        if lefts.is_empty() {
            return Ok(Vec::new());
        }
        let rights = self
            .right
            .successors_for_edge(&state.right, &precision.1, edge)?;
        let mut out = Vec::with_capacity(lefts.len() * rights.len());
        for l in &lefts {
            for r in &rights {
                out.push(ProductState::new(l.clone(), r.clone()));
            }
        }
        Ok(out)
    }
}

impl<A: PrecisionAdjustment, B: PrecisionAdjustment> PrecisionAdjustment for Product<A, B> {
    fn adjust(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        siblings: &[(&Self::State, &Self::Precision)],
    ) -> Adjustment<Self::State, Self::Precision> {
        let left_siblings: Vec<(&A::State, &A::Precision)> =
            siblings.iter().map(|(s, p)| (&s.left, &p.0)).collect();
        let right_siblings: Vec<(&B::State, &B::Precision)> =
            siblings.iter().map(|(s, p)| (&s.right, &p.1)).collect();

        let left = self.left.adjust(&state.left, &precision.0, &left_siblings);
        let right = self
            .right
            .adjust(&state.right, &precision.1, &right_siblings);

        let action = if left.action == AdjustAction::Break || right.action == AdjustAction::Break {
            AdjustAction::Break
        } else {
            AdjustAction::Continue
        };
        Adjustment {
            state: ProductState::new(left.state, right.state),
            precision: (left.precision, right.precision),
            action,
        }
    }
}
