//! Precision adjustment: per-state abstraction tuning.

use crate::traits::Analysis;

/// What the exploration should do with an adjusted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustAction {
    /// Keep exploring from the adjusted state.
    Continue,
    /// Drop the state from further exploration without error.
    Break,
}

/// Result of one precision adjustment.
#[derive(Debug, Clone)]
pub struct Adjustment<S, P> {
    /// The (possibly re-represented) state to use from here on. If it
    /// differs from the input, the caller substitutes it throughout the
    /// exploration graph.
    pub state: S,
    /// The precision to continue with.
    pub precision: P,
    /// Whether to keep exploring this state.
    pub action: AdjustAction,
}

impl<S, P> Adjustment<S, P> {
    /// An adjustment that keeps everything as it was.
    pub fn unchanged(state: S, precision: P) -> Self {
        Self {
            state,
            precision,
            action: AdjustAction::Continue,
        }
    }
}

/// Strengthen or relax the abstraction for one state before it is
/// committed to the reached set.
///
/// Implementations must be idempotent: adjusting an already-adjusted
/// state returns it unchanged. The replacement state must be
/// semantically equal to the input (a re-representation, not a
/// widening).
pub trait PrecisionAdjustment: Analysis {
    /// Adjust `state` under `precision`, given the `(state, precision)`
    /// pairs already reached at the same program location.
    fn adjust(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        siblings: &[(&Self::State, &Self::Precision)],
    ) -> Adjustment<Self::State, Self::Precision> {
        let _ = siblings;
        Adjustment::unchanged(state.clone(), precision.clone())
    }
}
