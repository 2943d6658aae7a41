//! The per-item delta emitted by a keyed source or operator.
//!
//! See [`crate::change_set::ChangeSet`] for the batched form published by a
//! single edit transaction.

use std::cmp::Ordering;

/// The kind of delta carried by a [`Change`], without its payload.
///
/// Exposed separately so operators can match on "what happened" without
/// destructuring the full [`Change`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Reason {
    /// A new key was observed for the first time.
    Add,
    /// An existing key's value was replaced.
    Update,
    /// A key left the collection.
    Remove,
    /// The stored value did not change, but an external property of it did.
    Refresh,
    /// A sort- or order-aware producer moved an existing key to a new
    /// position without changing its value.
    Moved,
}

/// A single mutation of a keyed collection, produced by a source or an
/// operator further downstream.
///
/// Each [`Reason`] is represented by its own variant so that the fields a
/// reason requires (e.g. `previous` on `Update`) are always present and
/// fields it forbids (e.g. `previous` on `Add`) are unrepresentable, rather
/// than relying on a runtime invariant over optional fields.
#[derive(Clone, Debug)]
pub enum Change<T, K> {
    /// `key` was inserted with value `current`. `index`, when the producer
    /// is order-aware, is the position `current` now occupies.
    Add {
        /// Identity of the changed item.
        key: K,
        /// The value now stored under `key`.
        current: T,
        /// Position of `current` in an order-aware producer's projection.
        index: Option<usize>,
    },
    /// `key`'s value changed from `previous` to `current` without moving.
    Update {
        /// Identity of the changed item.
        key: K,
        /// The new value.
        current: T,
        /// The value `current` replaced.
        previous: T,
        /// Position of `current`, if order-aware.
        index: Option<usize>,
    },
    /// `key` left the collection; `current` is the value it held.
    Remove {
        /// Identity of the changed item.
        key: K,
        /// The value that was removed.
        current: T,
        /// Position `current` occupied before removal, if order-aware.
        index: Option<usize>,
    },
    /// `key`'s external state changed without the stored value being
    /// replaced.
    Refresh {
        /// Identity of the changed item.
        key: K,
        /// The (unchanged) stored value.
        current: T,
        /// Position of `current`, if order-aware.
        index: Option<usize>,
    },
    /// `key` moved from `previous_index` to `current_index` without its
    /// value changing.
    Moved {
        /// Identity of the changed item.
        key: K,
        /// The (unchanged) stored value.
        current: T,
        /// Position before the move.
        previous_index: usize,
        /// Position after the move.
        current_index: usize,
    },
}

impl<T, K> Change<T, K> {
    /// Returns this change's [`Reason`].
    #[must_use]
    pub fn reason(&self) -> Reason {
        match self {
            Self::Add { .. } => Reason::Add,
            Self::Update { .. } => Reason::Update,
            Self::Remove { .. } => Reason::Remove,
            Self::Refresh { .. } => Reason::Refresh,
            Self::Moved { .. } => Reason::Moved,
        }
    }

    /// Returns the key this change applies to.
    #[must_use]
    pub fn key(&self) -> &K {
        match self {
            Self::Add { key, .. }
            | Self::Update { key, .. }
            | Self::Remove { key, .. }
            | Self::Refresh { key, .. }
            | Self::Moved { key, .. } => key,
        }
    }

    /// Returns the current value carried by this change.
    #[must_use]
    pub fn current(&self) -> &T {
        match self {
            Self::Add { current, .. }
            | Self::Update { current, .. }
            | Self::Remove { current, .. }
            | Self::Refresh { current, .. }
            | Self::Moved { current, .. } => current,
        }
    }

    /// Returns the previous value, for `Update` only.
    #[must_use]
    pub fn previous(&self) -> Option<&T> {
        match self {
            Self::Update { previous, .. } => Some(previous),
            _ => None,
        }
    }

    /// Returns the position this change's value now occupies, if the
    /// producer is order-aware.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        match self {
            Self::Add { index, .. }
            | Self::Update { index, .. }
            | Self::Refresh { index, .. } => *index,
            Self::Moved { current_index, .. } => Some(*current_index),
            Self::Remove { .. } => None,
        }
    }

    /// Returns the position this change's value previously occupied, for
    /// `Moved` only.
    #[must_use]
    pub fn previous_index(&self) -> Option<usize> {
        match self {
            Self::Moved { previous_index, .. } => Some(*previous_index),
            _ => None,
        }
    }

    /// Maps the value carried by this change, keeping its shape.
    pub fn map_value<U>(self, mut f: impl FnMut(T) -> U) -> Change<U, K> {
        match self {
            Self::Add { key, current, index } => Change::Add {
                key,
                current: f(current),
                index,
            },
            Self::Update {
                key,
                current,
                previous,
                index,
            } => Change::Update {
                key,
                current: f(current),
                previous: f(previous),
                index,
            },
            Self::Remove { key, current, index } => Change::Remove {
                key,
                current: f(current),
                index,
            },
            Self::Refresh { key, current, index } => Change::Refresh {
                key,
                current: f(current),
                index,
            },
            Self::Moved {
                key,
                current,
                previous_index,
                current_index,
            } => Change::Moved {
                key,
                current: f(current),
                previous_index,
                current_index,
            },
        }
    }
}

impl<T, K> Change<T, K>
where
    K: Clone,
{
    /// Builds the `Moved` variant, asserting the invariant that its two
    /// indices differ.
    #[must_use]
    pub fn moved(key: K, current: T, previous_index: usize, current_index: usize) -> Self {
        debug_assert_ne!(
            previous_index, current_index,
            "Moved change must have distinct indices"
        );
        Self::Moved {
            key,
            current,
            previous_index,
            current_index,
        }
    }
}

/// Orders two order-aware changes by their effective position, used by
/// operators that must apply a change set to an externally indexed view in
/// a safe order (removals high-to-low, then additions low-to-high).
#[must_use]
pub fn index_order<T, K>(a: &Change<T, K>, b: &Change<T, K>) -> Ordering {
    a.current_index()
        .or_else(|| a.previous_index())
        .cmp(&b.current_index().or_else(|| b.previous_index()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_matches_variant() {
        let add: Change<i32, &str> = Change::Add {
            key: "a",
            current: 1,
            index: None,
        };
        assert_eq!(add.reason(), Reason::Add);
        assert_eq!(*add.current(), 1);
        assert!(add.previous().is_none());
    }

    #[test]
    fn update_carries_previous() {
        let upd: Change<i32, &str> = Change::Update {
            key: "a",
            current: 2,
            previous: 1,
            index: None,
        };
        assert_eq!(upd.previous(), Some(&1));
        assert_eq!(*upd.current(), 2);
    }

    #[test]
    fn moved_reports_both_indices() {
        let mv = Change::moved("a", 1, 0, 3);
        assert_eq!(mv.previous_index(), Some(0));
        assert_eq!(mv.current_index(), Some(3));
    }

    #[test]
    #[should_panic(expected = "distinct indices")]
    fn moved_rejects_equal_indices_in_debug() {
        let _ = Change::moved("a", 1, 2, 2);
    }
}
