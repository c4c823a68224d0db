//! Exploration history for the kestrel engine.
//!
//! This crate holds the two mutable structures the reachability
//! algorithm drives: the abstract reachability graph ([`Arg`]) with its
//! parent/child and covering edges, and the [`ReachedSet`] mapping
//! graph nodes to precisions with the waitlist of states still to be
//! explored.

pub mod arg;
pub mod reached;

pub use arg::{Arg, ArgError, ArgId, SubtreeRemoval};
pub use reached::{ReachedSet, WaitlistPolicy};
