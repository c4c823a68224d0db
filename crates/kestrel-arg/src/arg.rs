//! The abstract reachability graph.
//!
//! Nodes live in an arena and are addressed by [`ArgId`] handles;
//! parent, child, and covering relations are index sets, so removing a
//! subtree is a reachability sweep over the arena rather than pointer
//! surgery. The parent/child relation is acyclic in the exploration
//! direction; cycles in the program's control flow show up as covering
//! edges instead.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use kestrel_cfa::EdgeId;
use kestrel_domain::AbstractState;
use thiserror::Error;
use tracing::debug;

/// Handle of one node in the reachability graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ArgId(usize);

impl ArgId {
    /// Raw arena index; unique for the lifetime of the graph, never
    /// reused after removal.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ArgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Contract violations on graph operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("node {0} was removed or never existed")]
    Stale(ArgId),
    #[error("node {0} cannot cover itself")]
    SelfCover(ArgId),
    #[error("node {0} is already covered")]
    AlreadyCovered(ArgId),
    #[error("covering node {0} is itself covered")]
    CoveringIsCovered(ArgId),
    #[error("graph invariant violated: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Clone)]
struct ArgNode<S> {
    state: S,
    /// Parent id -> the CFA edge whose transfer produced this node from
    /// that parent. Insertion order fixes the deterministic parent
    /// choice in path reconstruction.
    parents: IndexMap<ArgId, Option<EdgeId>>,
    children: IndexSet<ArgId>,
    covered_by: Option<ArgId>,
    covers: IndexSet<ArgId>,
    is_target: bool,
}

/// Result of one subtree removal.
#[derive(Debug, Clone, Default)]
pub struct SubtreeRemoval {
    /// Nodes detached from the graph, in sweep order.
    pub removed: Vec<ArgId>,
    /// Surviving nodes whose covering node was removed; each must be
    /// reinserted into the waitlist exactly once.
    pub uncovered: Vec<ArgId>,
}

/// The exploration history: an arena of states with parent/child and
/// covering edges.
#[derive(Debug, Clone)]
pub struct Arg<S> {
    slots: Vec<Option<ArgNode<S>>>,
    roots: IndexSet<ArgId>,
    targets: IndexSet<ArgId>,
    live: usize,
}

impl<S: AbstractState> Default for Arg<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AbstractState> Arg<S> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            roots: IndexSet::new(),
            targets: IndexSet::new(),
            live: 0,
        }
    }

    fn node(&self, id: ArgId) -> Result<&ArgNode<S>, ArgError> {
        self.slots
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(ArgError::Stale(id))
    }

    fn node_mut(&mut self, id: ArgId) -> Result<&mut ArgNode<S>, ArgError> {
        self.slots
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(ArgError::Stale(id))
    }

    fn alloc(&mut self, state: S) -> ArgId {
        let id = ArgId(self.slots.len());
        let is_target = state.is_target();
        self.slots.push(Some(ArgNode {
            state,
            parents: IndexMap::new(),
            children: IndexSet::new(),
            covered_by: None,
            covers: IndexSet::new(),
            is_target,
        }));
        if is_target {
            self.targets.insert(id);
        }
        self.live += 1;
        id
    }

    /// Insert a root node (no parents).
    pub fn add_root(&mut self, state: S) -> ArgId {
        let id = self.alloc(state);
        self.roots.insert(id);
        id
    }

    /// Insert `state` as a child of `parent`, annotated with the CFA
    /// edge whose transfer produced it.
    pub fn add_child(
        &mut self,
        parent: ArgId,
        state: S,
        edge: Option<EdgeId>,
    ) -> Result<ArgId, ArgError> {
        self.node(parent)?;
        let id = self.alloc(state);
        self.node_mut(id)?.parents.insert(parent, edge);
        self.node_mut(parent)?.children.insert(id);
        Ok(id)
    }

    /// Record an additional parent link on an existing node.
    pub fn add_parent(
        &mut self,
        child: ArgId,
        parent: ArgId,
        edge: Option<EdgeId>,
    ) -> Result<(), ArgError> {
        self.node(parent)?;
        self.node_mut(child)?.parents.entry(parent).or_insert(edge);
        self.node_mut(parent)?.children.insert(child);
        Ok(())
    }

    /// Mark `covered` as subsumed by `covering`.
    ///
    /// The covered node stays in the graph for path reconstruction but
    /// must not be explored further. The covering node must not itself
    /// be covered, or coverage could chain onto a node that later
    /// silently disappears from the frontier.
    pub fn set_covering(&mut self, covered: ArgId, covering: ArgId) -> Result<(), ArgError> {
        if covered == covering {
            return Err(ArgError::SelfCover(covered));
        }
        if self.node(covered)?.covered_by.is_some() {
            return Err(ArgError::AlreadyCovered(covered));
        }
        if self.node(covering)?.covered_by.is_some() {
            return Err(ArgError::CoveringIsCovered(covering));
        }
        self.node_mut(covered)?.covered_by = Some(covering);
        self.node_mut(covering)?.covers.insert(covered);
        debug!(%covered, %covering, "covering established");
        Ok(())
    }

    /// Drop the covering mark on `id`, if any. Returns whether the node
    /// was covered.
    pub fn uncover(&mut self, id: ArgId) -> Result<bool, ArgError> {
        let Some(covering) = self.node_mut(id)?.covered_by.take() else {
            return Ok(false);
        };
        if let Ok(covering_node) = self.node_mut(covering) {
            covering_node.covers.shift_remove(&id);
        }
        Ok(true)
    }

    /// Replace a reached node with its merge result.
    ///
    /// The old node is removed and a fresh node takes over all of its
    /// parent, child, and covers links (the merged state subsumes the
    /// old one, so existing coverings stay sound). Returns the new id.
    pub fn reinsert_merged(&mut self, old: ArgId, merged: S) -> Result<ArgId, ArgError> {
        self.node(old)?;
        let new = self.alloc(merged);

        let (parents, children, covers, covered_by) = {
            let node = self.node(old)?;
            (
                node.parents.clone(),
                node.children.clone(),
                node.covers.clone(),
                node.covered_by,
            )
        };

        for (&parent, &edge) in &parents {
            let p = self.node_mut(parent)?;
            p.children.shift_remove(&old);
            p.children.insert(new);
            self.node_mut(new)?.parents.insert(parent, edge);
        }
        for &child in &children {
            let c = self.node_mut(child)?;
            if let Some(edge) = c.parents.shift_remove(&old) {
                c.parents.insert(new, edge);
            }
            self.node_mut(new)?.children.insert(child);
        }
        for &covered in &covers {
            self.node_mut(covered)?.covered_by = Some(new);
            self.node_mut(new)?.covers.insert(covered);
        }
        if let Some(covering) = covered_by {
            let c = self.node_mut(covering)?;
            c.covers.shift_remove(&old);
            c.covers.insert(new);
            self.node_mut(new)?.covered_by = Some(covering);
        }
        if self.roots.shift_remove(&old) {
            self.roots.insert(new);
        }

        self.discard(old);
        debug!(%old, %new, "merged node reinserted");
        Ok(new)
    }

    fn discard(&mut self, id: ArgId) {
        if self.slots[id.0].take().is_some() {
            self.live -= 1;
        }
        self.targets.shift_remove(&id);
        self.roots.shift_remove(&id);
    }

    /// Detach `root` and every descendant reachable only through it.
    ///
    /// Surviving nodes that were covered by a removed node are
    /// uncovered and reported, so the caller can put them back on the
    /// waitlist; this is the step where stale coverings would otherwise
    /// leak unexplored states.
    pub fn remove_subtree(&mut self, root: ArgId) -> Result<SubtreeRemoval, ArgError> {
        self.node(root)?;

        // Everything reachable from `root` in the exploration direction.
        let mut marked: IndexSet<ArgId> = IndexSet::new();
        let mut frontier = vec![root];
        while let Some(id) = frontier.pop() {
            if !marked.insert(id) {
                continue;
            }
            for &child in &self.node(id)?.children {
                frontier.push(child);
            }
        }

        // Keep nodes that are still reachable from outside the subtree:
        // a marked node (other than the root) with an unmarked parent
        // survives, which can cascade to its own descendants.
        loop {
            let mut changed = false;
            let snapshot: Vec<ArgId> = marked.iter().copied().collect();
            for id in snapshot {
                if id == root {
                    continue;
                }
                let has_outside_parent = self
                    .node(id)?
                    .parents
                    .keys()
                    .any(|parent| !marked.contains(parent));
                if has_outside_parent {
                    marked.shift_remove(&id);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut removal = SubtreeRemoval::default();
        for &id in &marked {
            for covered in self.node(id)?.covers.clone() {
                if !marked.contains(&covered) {
                    self.node_mut(covered)?.covered_by = None;
                    removal.uncovered.push(covered);
                }
            }
        }
        for &id in &marked {
            let (parents, children, covered_by) = {
                let node = self.node(id)?;
                (
                    node.parents.keys().copied().collect::<Vec<_>>(),
                    node.children.iter().copied().collect::<Vec<_>>(),
                    node.covered_by,
                )
            };
            for parent in parents {
                if !marked.contains(&parent) {
                    self.node_mut(parent)?.children.shift_remove(&id);
                }
            }
            for child in children {
                if !marked.contains(&child) {
                    self.node_mut(child)?.parents.shift_remove(&id);
                }
            }
            if let Some(covering) = covered_by {
                if !marked.contains(&covering) {
                    self.node_mut(covering)?.covers.shift_remove(&id);
                }
            }
            self.discard(id);
            removal.removed.push(id);
        }
        debug!(
            root = %root,
            removed = removal.removed.len(),
            uncovered = removal.uncovered.len(),
            "subtree removed"
        );
        Ok(removal)
    }

    /// One path from a root to `target`, as `(node, entering edge)`
    /// pairs; the root's entering edge is `None`.
    ///
    /// When a node has several parents (merges), the first parent in
    /// insertion order is chosen — arbitrary but deterministic per run,
    /// which keeps counterexamples reproducible.
    pub fn path_to(&self, target: ArgId) -> Result<Vec<(ArgId, Option<EdgeId>)>, ArgError> {
        let mut path = Vec::new();
        let mut visited = IndexSet::new();
        let mut current = target;
        loop {
            if !visited.insert(current) {
                return Err(ArgError::Inconsistent(format!(
                    "parent cycle through {current}"
                )));
            }
            let node = self.node(current)?;
            match node.parents.first() {
                Some((&parent, &edge)) => {
                    path.push((current, edge));
                    current = parent;
                }
                None => {
                    path.push((current, None));
                    break;
                }
            }
        }
        path.reverse();
        Ok(path)
    }

    /// Exploration depth of `target`: the number of edges on
    /// [`path_to`](Self::path_to).
    pub fn depth(&self, target: ArgId) -> Result<usize, ArgError> {
        Ok(self.path_to(target)?.len().saturating_sub(1))
    }

    /// The wrapped abstract state.
    pub fn state(&self, id: ArgId) -> Result<&S, ArgError> {
        Ok(&self.node(id)?.state)
    }

    /// Whether `id` is still part of the graph.
    pub fn contains(&self, id: ArgId) -> bool {
        self.slots.get(id.0).is_some_and(|slot| slot.is_some())
    }

    pub fn is_covered(&self, id: ArgId) -> Result<bool, ArgError> {
        Ok(self.node(id)?.covered_by.is_some())
    }

    pub fn covered_by(&self, id: ArgId) -> Result<Option<ArgId>, ArgError> {
        Ok(self.node(id)?.covered_by)
    }

    pub fn children(&self, id: ArgId) -> Result<impl Iterator<Item = ArgId> + '_, ArgError> {
        Ok(self.node(id)?.children.iter().copied())
    }

    pub fn parents(
        &self,
        id: ArgId,
    ) -> Result<impl Iterator<Item = (ArgId, Option<EdgeId>)> + '_, ArgError> {
        Ok(self.node(id)?.parents.iter().map(|(&p, &e)| (p, e)))
    }

    pub fn is_target(&self, id: ArgId) -> Result<bool, ArgError> {
        Ok(self.node(id)?.is_target)
    }

    /// Live target nodes, in creation order.
    pub fn target_ids(&self) -> impl Iterator<Item = ArgId> + '_ {
        self.targets.iter().copied()
    }

    /// Root nodes, in creation order.
    pub fn root_ids(&self) -> impl Iterator<Item = ArgId> + '_ {
        self.roots.iter().copied()
    }

    /// All live node ids, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ArgId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| ArgId(i)))
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total nodes ever created, including removed ones.
    pub fn created(&self) -> usize {
        self.slots.len()
    }

    /// Verify the structural invariants: symmetric and live
    /// parent/child links, symmetric and live covering links, and
    /// acyclicity in the exploration direction. Debugging aid; the
    /// mutation operations maintain these invariants themselves.
    pub fn check_invariants(&self) -> Result<(), ArgError> {
        for id in self.ids() {
            let node = self.node(id)?;
            for (&parent, _) in &node.parents {
                let p = self
                    .node(parent)
                    .map_err(|_| ArgError::Inconsistent(format!("{id} has dead parent {parent}")))?;
                if !p.children.contains(&id) {
                    return Err(ArgError::Inconsistent(format!(
                        "{parent} does not list child {id}"
                    )));
                }
            }
            for &child in &node.children {
                let c = self
                    .node(child)
                    .map_err(|_| ArgError::Inconsistent(format!("{id} has dead child {child}")))?;
                if !c.parents.contains_key(&id) {
                    return Err(ArgError::Inconsistent(format!(
                        "{child} does not list parent {id}"
                    )));
                }
            }
            if let Some(covering) = node.covered_by {
                let c = self.node(covering).map_err(|_| {
                    ArgError::Inconsistent(format!("{id} is covered by dead node {covering}"))
                })?;
                if !c.covers.contains(&id) {
                    return Err(ArgError::Inconsistent(format!(
                        "{covering} does not list covered node {id}"
                    )));
                }
            }
            for &covered in &node.covers {
                if self.node(covered)?.covered_by != Some(id) {
                    return Err(ArgError::Inconsistent(format!(
                        "{covered} does not point back to covering node {id}"
                    )));
                }
            }
        }

        // Acyclicity: DFS over children with an on-stack set.
        let mut done: IndexSet<ArgId> = IndexSet::new();
        for root in self.ids() {
            if done.contains(&root) {
                continue;
            }
            let mut on_stack: IndexSet<ArgId> = IndexSet::new();
            let mut stack: Vec<(ArgId, Vec<ArgId>)> = vec![(
                root,
                self.node(root)?.children.iter().copied().collect(),
            )];
            on_stack.insert(root);
            loop {
                let next = match stack.last_mut() {
                    Some((_, pending)) => pending.pop(),
                    None => break,
                };
                match next {
                    Some(child) => {
                        if on_stack.contains(&child) {
                            return Err(ArgError::Inconsistent(format!(
                                "exploration cycle through {child}"
                            )));
                        }
                        if done.contains(&child) {
                            continue;
                        }
                        on_stack.insert(child);
                        let grandchildren = self.node(child)?.children.iter().copied().collect();
                        stack.push((child, grandchildren));
                    }
                    None => {
                        if let Some((finished, _)) = stack.pop() {
                            on_stack.shift_remove(&finished);
                            done.insert(finished);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
