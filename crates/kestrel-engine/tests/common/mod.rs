//! Shared fixtures: a small sign analysis over single-variable edge
//! labels, CFA builders, and a scripted feasibility collaborator.
#![allow(dead_code)]

use std::collections::VecDeque;

use kestrel_cfa::{Cfa, CfaEdge, EdgeKind, NodeId};
use kestrel_domain::{
    AbstractDomain, AbstractState, Analysis, ConfigError, PrecisionAdjustment, TransferError,
    TransferRelation,
};
use kestrel_engine::{
    ErrorPath, FeasibilityCheck, FeasibilityError, PrecisionRefiner, RefinementError,
    RefinementPlan, RefinementVerdict,
};

/// Sign of the single tracked variable `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Neg,
    Zero,
    Pos,
    Top,
}

impl Sign {
    pub fn leq(self, other: Sign) -> bool {
        self == other || other == Sign::Top
    }

    pub fn join(self, other: Sign) -> Sign {
        if self == other {
            self
        } else {
            Sign::Top
        }
    }

    fn plus_one(self) -> Sign {
        match self {
            Sign::Neg => Sign::Top,
            Sign::Zero | Sign::Pos => Sign::Pos,
            Sign::Top => Sign::Top,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignState {
    pub node: NodeId,
    pub sign: Sign,
    pub target: bool,
}

impl AbstractState for SignState {
    fn location(&self) -> Option<NodeId> {
        Some(self.node)
    }

    fn is_target(&self) -> bool {
        self.target
    }
}

/// Precision: whether assignments and guards are evaluated at all, plus
/// the predicates learned from refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignPrecision {
    pub track_values: bool,
    pub tracked: Vec<String>,
}

/// Location-aware sign analysis over a tiny statement language:
/// `x := 0`, `x := 1`, `x := -1`, `x := x + 1`, `skip`,
/// `assume x > 0`, `assume x <= 0`. Unknown labels are not evaluable.
#[derive(Debug)]
pub struct SignAnalysis {
    pub error_nodes: Vec<NodeId>,
    pub initial_track: bool,
    /// When false, the refinement hook returns the precision unchanged;
    /// used to exercise the engine's progress assertion.
    pub refine_gains: bool,
}

impl SignAnalysis {
    pub fn new(error_nodes: Vec<NodeId>) -> Self {
        Self {
            error_nodes,
            initial_track: false,
            refine_gains: true,
        }
    }

    pub fn precise(error_nodes: Vec<NodeId>) -> Self {
        Self {
            error_nodes,
            initial_track: true,
            refine_gains: true,
        }
    }

    fn state_at(&self, node: NodeId, sign: Sign) -> SignState {
        SignState {
            node,
            sign,
            target: self.error_nodes.contains(&node),
        }
    }

    fn evaluate(
        &self,
        sign: Sign,
        track: bool,
        edge: &CfaEdge,
    ) -> Result<Option<Sign>, TransferError> {
        let label = edge.label();
        let next = match label {
            "" | "skip" => Some(sign),
            "x := 0" => Some(if track { Sign::Zero } else { Sign::Top }),
            "x := 1" => Some(if track { Sign::Pos } else { Sign::Top }),
            "x := -1" => Some(if track { Sign::Neg } else { Sign::Top }),
            "x := x + 1" => Some(if track { sign.plus_one() } else { Sign::Top }),
            "assume x > 0" => {
                if !track {
                    Some(sign)
                } else {
                    match sign {
                        Sign::Pos | Sign::Top => Some(Sign::Pos),
                        Sign::Zero | Sign::Neg => None,
                    }
                }
            }
            "assume x <= 0" => {
                if !track {
                    Some(sign)
                } else {
                    match sign {
                        Sign::Neg => Some(Sign::Neg),
                        Sign::Zero => Some(Sign::Zero),
                        Sign::Top => Some(Sign::Top),
                        Sign::Pos => None,
                    }
                }
            }
            other => {
                return Err(TransferError::UnsupportedEdge {
                    edge: edge.id(),
                    label: other.to_string(),
                    reason: "unknown statement".into(),
                })
            }
        };
        Ok(next)
    }
}

impl Analysis for SignAnalysis {
    type State = SignState;
    type Precision = SignPrecision;

    fn name(&self) -> &'static str {
        "sign"
    }

    fn initial_state(&self, entry: NodeId) -> SignState {
        self.state_at(entry, Sign::Top)
    }

    fn initial_precision(&self) -> SignPrecision {
        SignPrecision {
            track_values: self.initial_track,
            tracked: Vec::new(),
        }
    }
}

impl AbstractDomain for SignAnalysis {
    fn join(&self, a: &SignState, b: &SignState) -> Result<SignState, ConfigError> {
        // Joined states always share a location (merging is
        // location-partitioned).
        Ok(SignState {
            node: b.node,
            sign: a.sign.join(b.sign),
            target: a.target || b.target,
        })
    }

    fn is_less_or_equal(&self, a: &SignState, b: &SignState) -> bool {
        a.node == b.node && a.target == b.target && a.sign.leq(b.sign)
    }
}

impl TransferRelation for SignAnalysis {
    fn successors_for_edge(
        &self,
        state: &SignState,
        precision: &SignPrecision,
        edge: &CfaEdge,
    ) -> Result<Vec<SignState>, TransferError> {
        if state.node != edge.source() {
            return Ok(Vec::new());
        }
        match self.evaluate(state.sign, precision.track_values, edge)? {
            Some(sign) => Ok(vec![self.state_at(edge.target(), sign)]),
            None => Ok(Vec::new()),
        }
    }
}

impl PrecisionAdjustment for SignAnalysis {}

impl PrecisionRefiner for SignAnalysis {
    fn refine(
        &self,
        _path: &ErrorPath<SignState>,
        interpolants: &[String],
        current: &SignPrecision,
    ) -> Result<RefinementPlan<SignPrecision>, RefinementError> {
        if interpolants.is_empty() {
            return Err(RefinementError(
                "no interpolants to strengthen the precision with".into(),
            ));
        }
        if !self.refine_gains {
            return Ok(RefinementPlan {
                precision: current.clone(),
                pivot: 1,
            });
        }
        let mut precision = current.clone();
        precision.track_values = true;
        for interpolant in interpolants {
            if !precision.tracked.contains(interpolant) {
                precision.tracked.push(interpolant.clone());
            }
        }
        Ok(RefinementPlan {
            precision,
            pivot: 1,
        })
    }

    fn precision_measure(&self, precision: &SignPrecision) -> usize {
        usize::from(precision.track_values) + precision.tracked.len()
    }
}

/// Feasibility collaborator replaying a pre-programmed verdict script.
#[derive(Debug)]
pub struct ScriptedChecker {
    script: VecDeque<Result<RefinementVerdict, FeasibilityError>>,
    pub calls: usize,
}

impl ScriptedChecker {
    pub fn new(script: Vec<Result<RefinementVerdict, FeasibilityError>>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }

    /// A checker that must never be consulted.
    pub fn unreachable() -> Self {
        Self::new(Vec::new())
    }

    pub fn infeasible(interpolants: &[&str]) -> Result<RefinementVerdict, FeasibilityError> {
        Ok(RefinementVerdict::Infeasible {
            interpolants: interpolants.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn feasible(model: &[(&str, i64)]) -> Result<RefinementVerdict, FeasibilityError> {
        Ok(RefinementVerdict::Feasible {
            model: model.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
        })
    }
}

impl FeasibilityCheck<SignState> for ScriptedChecker {
    fn check(
        &mut self,
        _path: &ErrorPath<SignState>,
        _cfa: &Cfa,
    ) -> Result<RefinementVerdict, FeasibilityError> {
        self.calls += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(FeasibilityError::Solver("feasibility script exhausted".into())))
    }
}

/// Two branches ending at distinct terminal nodes; no merge point, no
/// error node.
///
/// ```text
/// n0 --assume x > 0--> n1 --skip--> n2
/// n0 --assume x <= 0-> n3 --skip--> n4
/// ```
pub fn two_branch_cfa() -> Cfa {
    let mut b = Cfa::builder();
    let n0 = b.add_node("main");
    let n1 = b.add_node("main");
    let n2 = b.add_node("main");
    let n3 = b.add_node("main");
    let n4 = b.add_node("main");
    b.add_edge(EdgeKind::Assume, n0, n1, "assume x > 0").unwrap();
    b.add_edge(EdgeKind::Statement, n1, n2, "skip").unwrap();
    b.add_edge(EdgeKind::Assume, n0, n3, "assume x <= 0").unwrap();
    b.add_edge(EdgeKind::Statement, n3, n4, "skip").unwrap();
    b.set_entry("main", n0).unwrap();
    b.build().unwrap()
}

/// An error node guarded by a condition that is false after `init`.
///
/// ```text
/// n0 --init--> n1 --assume x > 0--> n2 --skip--> n3 (error)
///              n1 --assume x <= 0-> n4
/// ```
pub fn guarded_error_cfa(init: &str) -> (Cfa, NodeId) {
    let mut b = Cfa::builder();
    let n0 = b.add_node("main");
    let n1 = b.add_node("main");
    let n2 = b.add_node("main");
    let n3 = b.add_node("main");
    let n4 = b.add_node("main");
    b.add_edge(EdgeKind::Statement, n0, n1, init).unwrap();
    b.add_edge(EdgeKind::Assume, n1, n2, "assume x > 0").unwrap();
    b.add_edge(EdgeKind::Statement, n2, n3, "skip").unwrap();
    b.add_edge(EdgeKind::Assume, n1, n4, "assume x <= 0").unwrap();
    b.set_entry("main", n0).unwrap();
    (b.build().unwrap(), n3)
}

/// A self-loop incrementing `x`.
///
/// ```text
/// n0 --x := 0--> n1 --x := x + 1--> n1
/// ```
pub fn loop_cfa() -> Cfa {
    let mut b = Cfa::builder();
    let n0 = b.add_node("main");
    let n1 = b.add_node("main");
    b.add_edge(EdgeKind::Statement, n0, n1, "x := 0").unwrap();
    b.add_edge(EdgeKind::Statement, n1, n1, "x := x + 1").unwrap();
    b.set_entry("main", n0).unwrap();
    b.build().unwrap()
}

/// A diamond reaching one merge location with two different values.
///
/// ```text
/// n0 --x := 0--> n1 --skip--> n3
/// n0 --x := 1--> n2 --skip--> n3
/// ```
pub fn diamond_cfa() -> (Cfa, NodeId) {
    let mut b = Cfa::builder();
    let n0 = b.add_node("main");
    let n1 = b.add_node("main");
    let n2 = b.add_node("main");
    let n3 = b.add_node("main");
    b.add_edge(EdgeKind::Statement, n0, n1, "x := 0").unwrap();
    b.add_edge(EdgeKind::Statement, n0, n2, "x := 1").unwrap();
    b.add_edge(EdgeKind::Statement, n1, n3, "skip").unwrap();
    b.add_edge(EdgeKind::Statement, n2, n3, "skip").unwrap();
    b.set_entry("main", n0).unwrap();
    (b.build().unwrap(), n3)
}

/// A diamond whose merge location leads into an error node.
///
/// ```text
/// n0 --x := 0--> n1 --skip--> n3 --skip--> n4 (error)
/// n0 --x := 1--> n2 --skip--> n3
/// ```
pub fn merged_error_cfa() -> (Cfa, NodeId) {
    let mut b = Cfa::builder();
    let n0 = b.add_node("main");
    let n1 = b.add_node("main");
    let n2 = b.add_node("main");
    let n3 = b.add_node("main");
    let n4 = b.add_node("main");
    b.add_edge(EdgeKind::Statement, n0, n1, "x := 0").unwrap();
    b.add_edge(EdgeKind::Statement, n0, n2, "x := 1").unwrap();
    b.add_edge(EdgeKind::Statement, n1, n3, "skip").unwrap();
    b.add_edge(EdgeKind::Statement, n2, n3, "skip").unwrap();
    b.add_edge(EdgeKind::Statement, n3, n4, "skip").unwrap();
    b.set_entry("main", n0).unwrap();
    (b.build().unwrap(), n4)
}
