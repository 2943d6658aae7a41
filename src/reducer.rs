//! Coalesces the primitive changes raised by one edit transaction into a
//! minimum-fidelity [`ChangeSet`].
//!
//! A source's mutator API does not push straight into the outgoing
//! [`ChangeSet`]: every primitive mutation for a key passes through a
//! [`Reducer`] first, which keeps exactly one pending [`Change`] per key,
//! combining a newly-arrived primitive change with whatever is already
//! pending for that key. Key order of first appearance is preserved, so
//! the emitted change set reflects call order.

use std::hash::Hash;

use indexmap::IndexMap;

use crate::{
    change::{Change, Reason},
    change_set::ChangeSet,
};

/// Accumulates primitive per-key changes for one edit transaction and
/// yields the reduced [`ChangeSet`] once the transaction completes.
pub struct Reducer<T, K> {
    // Each key keeps the index it was first touched at; a cancelled pair
    // (`Add` undone by a `Remove` in the same transaction) leaves its slot
    // `None` in place rather than removing the entry, so a later,
    // unrelated primitive change for the same key within the same
    // transaction still lands back at this key's original first-touch
    // position instead of being appended at the end.
    pending: IndexMap<K, Option<Change<T, K>>>,
}

impl<T, K> Reducer<T, K>
where
    K: Hash + Eq + Clone,
{
    /// Returns a new, empty reducer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: IndexMap::new(),
        }
    }

    /// Folds one more primitive change into the reducer's per-key state,
    /// combining it with whatever is already pending for this key via the
    /// §4.2 reduction table. Key order always reflects the order in which
    /// each key was *first* touched this transaction, never the order of
    /// its most recent touch.
    pub fn apply(&mut self, next: Change<T, K>) {
        let key = next.key().clone();
        match self.pending.get_mut(&key) {
            Some(slot) => {
                let previous = slot.take().expect(
                    "a key's slot is only `None` transiently, inside this method",
                );
                *slot = reduce(previous, next);
            }
            None => {
                self.pending.insert(key, Some(next));
            }
        }
    }

    /// Consumes the reducer, producing the [`ChangeSet`] for this
    /// transaction in first-touched key order.
    #[must_use]
    pub fn finish(self) -> ChangeSet<T, K> {
        let mut set = ChangeSet::with_capacity(self.pending.len());
        for (_, change) in self.pending {
            if let Some(change) = change {
                set.push(change);
            }
        }
        set
    }

    /// True if no key has accumulated any (non-cancelled) change yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.values().all(Option::is_none)
    }
}

impl<T, K> Default for Reducer<T, K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Combines a `previous` reduced change with a `next` primitive change for
/// the same key. Returns `None` when the pair cancels out (an `Add` fully
/// undone by a `Remove` in the same transaction).
fn reduce<T, K>(previous: Change<T, K>, next: Change<T, K>) -> Option<Change<T, K>> {
    use Reason::{Add, Moved, Refresh, Remove, Update};

    let prev_reason = previous.reason();
    let next_reason = next.reason();

    match (prev_reason, next_reason) {
        // Refresh is weaker than anything: the incoming reason always wins,
        // and since Refresh carried no information worth preserving, `next`
        // is taken wholesale.
        (Refresh, _) => Some(next),

        // Add, then ...
        (Add, Add) => Some(next), // overwrite Current
        (Add, Update) => {
            // Still an Add (the item never existed before this
            // transaction); keep the Add shape but adopt the new value.
            let (key, current, index) = match next {
                Change::Update { key, current, index, .. } => (key, current, index),
                _ => unreachable!(),
            };
            Some(Change::Add { key, current, index })
        }
        (Add, Remove) => None, // cancels
        (Add, Refresh) => {
            let (key, current, index) = match next {
                Change::Refresh { key, current, index } => (key, current, index),
                _ => unreachable!(),
            };
            Some(Change::Add { key, current, index })
        }

        // Update, then ...
        (Update, Add) => Some(next), // per spec table: Add wins outright
        (Update, Update) => {
            let earliest_previous = match previous {
                Change::Update { previous, .. } => previous,
                _ => unreachable!(),
            };
            let (key, current, index) = match next {
                Change::Update { key, current, index, .. } => (key, current, index),
                _ => unreachable!(),
            };
            Some(Change::Update {
                key,
                current,
                previous: earliest_previous,
                index,
            })
        }
        (Update, Remove) => {
            let (key, earliest_previous) = match previous {
                Change::Update { key, previous, .. } => (key, previous),
                _ => unreachable!(),
            };
            let index = match next {
                Change::Remove { index, .. } => index,
                _ => unreachable!(),
            };
            Some(Change::Remove {
                key,
                current: earliest_previous,
                index,
            })
        }
        (Update, Refresh) => Some(previous), // Refresh doesn't weaken Update

        // Remove, then ...
        (Remove, Add) => {
            let (key, removed) = match previous {
                Change::Remove { key, current, .. } => (key, current),
                _ => unreachable!(),
            };
            let (current, index) = match next {
                Change::Add { current, index, .. } => (current, index),
                _ => unreachable!(),
            };
            Some(Change::Update {
                key,
                current,
                previous: removed,
                index,
            })
        }
        (Remove, Update) => {
            // Illegal per spec: a key already reduced as Remove within this
            // transaction cannot be classified as Update by the mutator,
            // since the mutator only emits Update against a key it finds
            // present. Kept as a debug-only invariant check; defensively
            // treated like the `(Remove, Add)` case in release builds.
            debug_assert!(
                false,
                "reducer: Update following Remove within one transaction is illegal"
            );
            let (key, removed) = match previous {
                Change::Remove { key, current, .. } => (key, current),
                _ => unreachable!(),
            };
            let (current, previous, index) = match next {
                Change::Update { current, previous, index, .. } => (current, previous, index),
                _ => unreachable!(),
            };
            let _ = previous;
            Some(Change::Update {
                key,
                current,
                previous: removed,
                index,
            })
        }
        (Remove, Remove) => Some(previous), // stays Remove with earliest value
        (Remove, Refresh) => Some(previous), // Refresh doesn't weaken Remove

        // Moved never participates in primitive reduction: sort-aware
        // producers emit it outside the mutator's reducer pipeline.
        (Moved, _) | (_, Moved) => Some(next),
    }
}
