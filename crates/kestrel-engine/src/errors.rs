//! Engine-level error taxonomy.
//!
//! Every failure names the component it came from and, where it has
//! one, the graph node or edge it failed on, so a run either completes
//! with a verdict or terminates diagnosably.

use kestrel_arg::{ArgError, ArgId};
use kestrel_cfa::EdgeId;
use kestrel_domain::{ConfigError, TransferError};
use thiserror::Error;

use crate::refine::{FeasibilityError, RefinementError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The analysis configuration was rejected at construction.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The transfer relation failed and the abort policy is active.
    #[error("transfer failed while exploring {state} across {edge:?}: {source}")]
    Transfer {
        state: ArgId,
        edge: Option<EdgeId>,
        #[source]
        source: TransferError,
    },

    /// A reachability-graph operation was misused; programming error.
    #[error("reachability graph error: {0}")]
    Arg(#[from] ArgError),

    /// The feasibility collaborator failed after all configured
    /// retries.
    #[error("feasibility check for target {target} failed after {attempts} attempt(s): {source}")]
    Feasibility {
        target: ArgId,
        attempts: u32,
        #[source]
        source: FeasibilityError,
    },

    /// The analysis's refinement hook rejected the interpolants.
    #[error("precision refinement for target {target} failed: {source}")]
    RefinementHook {
        target: ArgId,
        #[source]
        source: RefinementError,
    },

    /// A refinement iteration failed to strengthen anything; without
    /// strict progress the refinement loop cannot converge.
    #[error("refinement made no progress on target {target}: {reason}")]
    NoProgress { target: ArgId, reason: String },

    /// Cooperative shutdown was requested.
    #[error("run cancelled by shutdown request")]
    Cancelled,
}
