//! The explicit flat lattice.
//!
//! `Flat<T>` adds a unique least and a unique greatest element to an
//! unordered carrier set: `Bottom <= Value(x) <= Top` and two values are
//! comparable only when equal. Bottom and top are ordinary variants, so
//! there are no sentinel singletons to compare by identity.

use serde::Serialize;
use std::fmt;

/// A carrier value lifted into a flat lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Flat<T> {
    /// The unique least element (unreachable / no value).
    Bottom,
    /// A known concrete value.
    Value(T),
    /// The unique greatest element (any value).
    Top,
}

impl<T: Clone + PartialEq> Flat<T> {
    /// Partial order: bottom below everything, top above everything,
    /// values comparable only when equal.
    pub fn is_less_or_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Flat::Bottom, _) => true,
            (_, Flat::Top) => true,
            (Flat::Value(a), Flat::Value(b)) => a == b,
            _ => false,
        }
    }

    /// Least upper bound. Unequal values collapse to top.
    pub fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Flat::Bottom, x) | (x, Flat::Bottom) => x.clone(),
            (Flat::Top, _) | (_, Flat::Top) => Flat::Top,
            (Flat::Value(a), Flat::Value(b)) => {
                if a == b {
                    Flat::Value(a.clone())
                } else {
                    Flat::Top
                }
            }
        }
    }

    /// True for [`Flat::Bottom`].
    pub fn is_bottom(&self) -> bool {
        matches!(self, Flat::Bottom)
    }

    /// True for [`Flat::Top`].
    pub fn is_top(&self) -> bool {
        matches!(self, Flat::Top)
    }

    /// The carrier value, if this is a [`Flat::Value`].
    pub fn value(&self) -> Option<&T> {
        match self {
            Flat::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Apply `f` to the carrier value, preserving bottom and top.
    pub fn map<U: Clone + PartialEq>(&self, f: impl FnOnce(&T) -> U) -> Flat<U> {
        match self {
            Flat::Bottom => Flat::Bottom,
            Flat::Value(v) => Flat::Value(f(v)),
            Flat::Top => Flat::Top,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Flat<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flat::Bottom => write!(f, "⊥"),
            Flat::Value(v) => write!(f, "{v}"),
            Flat::Top => write!(f, "⊤"),
        }
    }
}
