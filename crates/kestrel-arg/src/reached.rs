//! The reached set: precision bookkeeping plus the waitlist.
//!
//! Keys are [`ArgId`] handles into the reachability graph. The waitlist
//! is the subset of keys still awaiting exploration; its ordering
//! policy only affects performance and which counterexample is found
//! first, never correctness, but it is deterministic per run.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use kestrel_cfa::NodeId;
use serde::Serialize;

use crate::arg::ArgId;

/// Order in which waiting states are explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WaitlistPolicy {
    /// Depth-first: newest state first.
    #[default]
    Dfs,
    /// Breadth-first: oldest state first.
    Bfs,
}

#[derive(Debug, Clone)]
struct Entry<P> {
    precision: P,
    location: Option<NodeId>,
}

/// The working collection of `(state, precision)` pairs driving the
/// worklist algorithm.
#[derive(Debug, Clone)]
pub struct ReachedSet<P> {
    entries: IndexMap<ArgId, Entry<P>>,
    by_location: IndexMap<Option<NodeId>, IndexSet<ArgId>>,
    waitlist: VecDeque<ArgId>,
    queued: IndexSet<ArgId>,
    policy: WaitlistPolicy,
}

impl<P> ReachedSet<P> {
    pub fn new(policy: WaitlistPolicy) -> Self {
        Self {
            entries: IndexMap::new(),
            by_location: IndexMap::new(),
            waitlist: VecDeque::new(),
            queued: IndexSet::new(),
            policy,
        }
    }

    /// Insert a reached state and put it on the waitlist.
    pub fn add(&mut self, id: ArgId, location: Option<NodeId>, precision: P) {
        self.entries.insert(
            id,
            Entry {
                precision,
                location,
            },
        );
        self.by_location.entry(location).or_default().insert(id);
        self.enqueue(id);
    }

    fn enqueue(&mut self, id: ArgId) {
        if self.queued.insert(id) {
            self.waitlist.push_back(id);
        }
    }

    /// Pop the next state to explore, per the configured policy.
    pub fn pop(&mut self) -> Option<ArgId> {
        loop {
            let candidate = match self.policy {
                WaitlistPolicy::Dfs => self.waitlist.pop_back(),
                WaitlistPolicy::Bfs => self.waitlist.pop_front(),
            }?;
            // Entries removed from the waitlist stay in the deque until
            // popped; the `queued` set is authoritative.
            if self.queued.shift_remove(&candidate) {
                return Some(candidate);
            }
        }
    }

    /// Put a known state back on the waitlist. Returns false when the
    /// state is not in the reached set or is already waiting, so a
    /// caller can assert the exactly-once re-waitlisting of uncovered
    /// states.
    pub fn requeue(&mut self, id: ArgId) -> bool {
        if !self.entries.contains_key(&id) || self.queued.contains(&id) {
            return false;
        }
        self.enqueue(id);
        true
    }

    /// Take a state off the waitlist without removing it from the
    /// reached set (targets stay reached but are never expanded).
    pub fn suspend(&mut self, id: ArgId) -> bool {
        self.queued.shift_remove(&id)
    }

    /// Remove a state entirely. Returns its precision.
    pub fn remove(&mut self, id: ArgId) -> Option<P> {
        let entry = self.entries.shift_remove(&id)?;
        if let Some(bucket) = self.by_location.get_mut(&entry.location) {
            bucket.shift_remove(&id);
        }
        self.queued.shift_remove(&id);
        Some(entry.precision)
    }

    pub fn contains(&self, id: ArgId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn precision(&self, id: ArgId) -> Option<&P> {
        self.entries.get(&id).map(|e| &e.precision)
    }

    /// Replace the precision of a reached state. Returns false for an
    /// unknown id.
    pub fn set_precision(&mut self, id: ArgId, precision: P) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.precision = precision;
                true
            }
            None => false,
        }
    }

    pub fn location(&self, id: ArgId) -> Option<NodeId> {
        self.entries.get(&id).and_then(|e| e.location)
    }

    /// Reached states at `location`, in insertion order. This order is
    /// what makes the coverage tie-break deterministic.
    pub fn at_location(&self, location: Option<NodeId>) -> impl Iterator<Item = ArgId> + '_ {
        self.by_location
            .get(&location)
            .into_iter()
            .flat_map(|bucket| bucket.iter().copied())
    }

    /// All reached ids, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ArgId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn waitlist_len(&self) -> usize {
        self.queued.len()
    }

    pub fn waitlist_is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub fn policy(&self) -> WaitlistPolicy {
        self.policy
    }
}
