//! Control-flow automaton (CFA) consumed by the kestrel engine.
//!
//! The CFA is produced by an external front-end and is immutable once
//! built: a set of program locations ([`CfaNode`]) connected by typed
//! edges ([`CfaEdge`]), with one designated entry node per function.
//! The graph may contain cycles (loops); the engine's reachability
//! graph stays acyclic by representing loop re-entry through covering.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// A unique identifier for a CFA node (program location).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw index into the node table.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// A unique identifier for a CFA edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeId(usize);

impl EdgeId {
    /// Raw index into the edge table.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// The operation class an edge carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    /// A state-changing statement (assignment, havoc, ...).
    Statement,
    /// A branch condition; the label carries the assumed guard.
    Assume,
    /// Interprocedural call edge into a function entry.
    Call,
    /// Interprocedural return edge back to a call site.
    Return,
    /// Summary edge short-circuiting a call/return pair at the call site.
    Summary,
    /// A no-op edge (declarations, blank fall-through).
    Blank,
}

/// One program location.
#[derive(Debug, Clone)]
pub struct CfaNode {
    id: NodeId,
    function: String,
    leaving: Vec<EdgeId>,
    entering: Vec<EdgeId>,
}

impl CfaNode {
    /// The node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name of the function this location belongs to.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Edges leaving this node, in insertion order.
    pub fn leaving(&self) -> &[EdgeId] {
        &self.leaving
    }

    /// Edges entering this node, in insertion order.
    pub fn entering(&self) -> &[EdgeId] {
        &self.entering
    }
}

/// One control-flow edge between two locations.
#[derive(Debug, Clone)]
pub struct CfaEdge {
    id: EdgeId,
    kind: EdgeKind,
    source: NodeId,
    target: NodeId,
    label: String,
}

impl CfaEdge {
    /// The edge's id.
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// The operation class of this edge.
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Source location.
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Target location.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Opaque operation label, interpreted by the analysis's transfer
    /// relation.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for CfaEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --[{}]--> {}",
            self.source,
            if self.label.is_empty() {
                "<blank>"
            } else {
                &self.label
            },
            self.target
        )
    }
}

/// Errors raised while assembling a CFA.
#[derive(Debug, Error)]
pub enum CfaError {
    #[error("unknown node {0} referenced by an edge or entry")]
    UnknownNode(NodeId),
    #[error("function {0:?} already has an entry node")]
    DuplicateEntry(String),
    #[error("function {0:?} has no entry node")]
    MissingEntry(String),
}

/// The immutable control-flow automaton.
///
/// Construction goes through [`CfaBuilder`]; after `build` the graph is
/// never mutated.
#[derive(Debug, Clone)]
pub struct Cfa {
    nodes: Vec<CfaNode>,
    edges: Vec<CfaEdge>,
    entries: IndexMap<String, NodeId>,
}

impl Cfa {
    /// A builder for a fresh graph.
    pub fn builder() -> CfaBuilder {
        CfaBuilder::default()
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> &CfaNode {
        &self.nodes[id.0]
    }

    /// Look up an edge by id.
    pub fn edge(&self, id: EdgeId) -> &CfaEdge {
        &self.edges[id.0]
    }

    /// Edges leaving `node`, in insertion order.
    pub fn leaving_edges(&self, node: NodeId) -> impl Iterator<Item = &CfaEdge> {
        self.nodes[node.0].leaving.iter().map(|e| &self.edges[e.0])
    }

    /// Edges entering `node`, in insertion order.
    pub fn entering_edges(&self, node: NodeId) -> impl Iterator<Item = &CfaEdge> {
        self.nodes[node.0].entering.iter().map(|e| &self.edges[e.0])
    }

    /// The entry node of `function`, if declared.
    pub fn entry(&self, function: &str) -> Option<NodeId> {
        self.entries.get(function).copied()
    }

    /// All declared function entries, in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Incremental CFA construction.
#[derive(Debug, Default)]
pub struct CfaBuilder {
    nodes: Vec<CfaNode>,
    edges: Vec<CfaEdge>,
    entries: IndexMap<String, NodeId>,
}

impl CfaBuilder {
    /// Add a location belonging to `function`.
    pub fn add_node(&mut self, function: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(CfaNode {
            id,
            function: function.into(),
            leaving: Vec::new(),
            entering: Vec::new(),
        });
        id
    }

    /// Add an edge; endpoints must already exist.
    pub fn add_edge(
        &mut self,
        kind: EdgeKind,
        source: NodeId,
        target: NodeId,
        label: impl Into<String>,
    ) -> Result<EdgeId, CfaError> {
        for endpoint in [source, target] {
            if endpoint.0 >= self.nodes.len() {
                return Err(CfaError::UnknownNode(endpoint));
            }
        }
        let id = EdgeId(self.edges.len());
        self.edges.push(CfaEdge {
            id,
            kind,
            source,
            target,
            label: label.into(),
        });
        self.nodes[source.0].leaving.push(id);
        self.nodes[target.0].entering.push(id);
        Ok(id)
    }

    /// Declare the entry node of `function`.
    pub fn set_entry(&mut self, function: impl Into<String>, node: NodeId) -> Result<(), CfaError> {
        if node.0 >= self.nodes.len() {
            return Err(CfaError::UnknownNode(node));
        }
        let function = function.into();
        if self.entries.contains_key(&function) {
            return Err(CfaError::DuplicateEntry(function));
        }
        self.entries.insert(function, node);
        Ok(())
    }

    /// Finish construction. Every function named by a node must have an
    /// entry.
    pub fn build(self) -> Result<Cfa, CfaError> {
        for node in &self.nodes {
            if !self.entries.contains_key(&node.function) {
                return Err(CfaError::MissingEntry(node.function.clone()));
            }
        }
        Ok(Cfa {
            nodes: self.nodes,
            edges: self.edges,
            entries: self.entries,
        })
    }
}
