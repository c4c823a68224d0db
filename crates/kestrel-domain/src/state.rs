//! The abstract-state capability trait.

use kestrel_cfa::NodeId;
use std::fmt;

/// One abstract value of an analysis.
///
/// States are immutable: operators never mutate a state in place, they
/// construct new ones. The two optional capabilities default to "not
/// present": an analysis that tracks program locations overrides
/// [`location`](AbstractState::location), and an analysis that can
/// recognize property violations overrides
/// [`is_target`](AbstractState::is_target).
pub trait AbstractState: Clone + fmt::Debug + PartialEq {
    /// The program location this state sits at, when the analysis
    /// tracks one. The engine uses it to partition the reached set and
    /// to drive edge-wise transfer.
    fn location(&self) -> Option<NodeId> {
        None
    }

    /// True when this state violates the checked property.
    fn is_target(&self) -> bool {
        false
    }
}
