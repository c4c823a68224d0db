//! The kestrel verification engine.
//!
//! This crate drives a pluggable analysis over a control-flow
//! automaton: the worklist reachability algorithm explores the abstract
//! state space into a reachability graph with covering, and the
//! refinement loop checks every candidate error against an external
//! feasibility collaborator, either confirming a counterexample or
//! strengthening precision and pruning the spurious subtree.

pub mod errors;
pub mod explore;
pub mod options;
pub mod path;
pub mod refine;
pub mod result;
pub mod shutdown;
pub mod statistics;
pub mod verifier;

pub use errors::EngineError;
pub use options::{EngineOptions, TargetRanking, TransferErrorPolicy};
pub use path::{Counterexample, CounterexampleStep, ErrorPath, PathStep};
pub use refine::{
    FeasibilityCheck, FeasibilityError, PrecisionRefiner, RefinementError, RefinementPlan,
    RefinementVerdict,
};
pub use result::{RefinementAudit, RunReport, Termination, Verdict};
pub use shutdown::ShutdownToken;
pub use statistics::{ReachedSizeSample, RunStatistics};
pub use verifier::{EngineAnalysis, Verifier};
