//! Error paths and counterexample traces.

use std::fmt;

use kestrel_arg::ArgId;
use kestrel_cfa::{Cfa, EdgeId, NodeId};
use serde::Serialize;

/// One node on an error path, with the CFA edge that entered it.
#[derive(Debug, Clone)]
pub struct PathStep<S> {
    pub id: ArgId,
    pub state: S,
    /// `None` for the path's root.
    pub entering_edge: Option<EdgeId>,
}

/// An ordered path from a root of the reachability graph to a candidate
/// error state. This is the request shape handed to the feasibility
/// collaborator.
#[derive(Debug, Clone)]
pub struct ErrorPath<S> {
    steps: Vec<PathStep<S>>,
}

impl<S> ErrorPath<S> {
    pub fn new(steps: Vec<PathStep<S>>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep<S>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The candidate error state at the end of the path.
    pub fn target(&self) -> Option<&PathStep<S>> {
        self.steps.last()
    }

    /// The edges along the path, in order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.steps.iter().filter_map(|step| step.entering_edge)
    }
}

/// One step of a confirmed counterexample, snapshotted as plain data so
/// it survives later pruning of the reachability graph.
#[derive(Debug, Clone, Serialize)]
pub struct CounterexampleStep {
    /// Program location of the state, when the analysis tracks one.
    pub location: Option<NodeId>,
    /// Label of the edge entering this step; `None` at the path root.
    pub edge_label: Option<String>,
}

/// A confirmed error trace: the witness reported with an `Unsafe`
/// verdict. Reading the edge labels in order reconstructs the trace
/// through the program.
#[derive(Debug, Clone, Serialize)]
pub struct Counterexample {
    /// Graph node that was confirmed feasible.
    pub target: ArgId,
    pub steps: Vec<CounterexampleStep>,
    /// Concrete valuation produced by the feasibility collaborator.
    pub model: Vec<(String, i64)>,
}

impl Counterexample {
    /// Snapshot `path` against the CFA it was explored on.
    pub fn from_path<S: kestrel_domain::AbstractState>(
        path: &ErrorPath<S>,
        cfa: &Cfa,
        model: Vec<(String, i64)>,
        target: ArgId,
    ) -> Self {
        let steps = path
            .steps()
            .iter()
            .map(|step| CounterexampleStep {
                location: step.state.location(),
                edge_label: step
                    .entering_edge
                    .map(|edge| cfa.edge(edge).label().to_string()),
            })
            .collect();
        Self {
            target,
            steps,
            model,
        }
    }

    /// The edge labels along the trace, in order.
    pub fn edge_labels(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| s.edge_label.as_deref())
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Counterexample trace:")?;
        if !self.model.is_empty() {
            writeln!(f, "  Model:")?;
            for (name, value) in &self.model {
                writeln!(f, "    {name} = {value}")?;
            }
        }
        for (i, step) in self.steps.iter().enumerate() {
            let location = match step.location {
                Some(node) => node.to_string(),
                None => "<no location>".to_string(),
            };
            match &step.edge_label {
                None => writeln!(f, "  Step {i}: start at {location}")?,
                Some(label) => writeln!(f, "  Step {i}: --[{label}]--> {location}")?,
            }
        }
        Ok(())
    }
}
