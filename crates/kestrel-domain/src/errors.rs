//! Error taxonomy for the operator layer.
//!
//! The two kinds are deliberately separate types: [`TransferError`] is
//! recoverable (the caller decides the soundness trade-off for one
//! edge), [`ConfigError`] is fatal and can only arise while wiring an
//! analysis up, never at steady state.

use kestrel_cfa::EdgeId;
use thiserror::Error;

/// An edge could not be evaluated by the analysis.
///
/// Recoverable at the caller's discretion: the exploration of the
/// current state may be skipped (recording an unsoundness note) or the
/// whole run aborted. A transfer relation must return this rather than
/// fabricate a successor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("edge {edge} ({label:?}) is not evaluable: {reason}")]
    UnsupportedEdge {
        edge: EdgeId,
        label: String,
        reason: String,
    },
    #[error("state has no program location to expand from")]
    MissingLocation,
}

/// An analysis configuration is unusable.
///
/// Raised while constructing an engine, never during exploration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("domain {domain:?} has no join operator")]
    JoinUnsupported { domain: &'static str },
    #[error("join-based merging requested for domain {domain:?}, which has no join operator")]
    JoinMergeUnsupported { domain: &'static str },
    #[error("unknown entry function {0:?}")]
    UnknownEntryFunction(String),
}
