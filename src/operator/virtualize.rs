//! The `virtualize` operator: like `page`,
//! but reports the upstream's total size alongside the window, since a UI
//! virtualizing a list needs both ("here are the 20 rows to render, and
//! there are 4,000 rows total so size the scrollbar accordingly").

use crate::{change::Change, change_set::ChangeSet, operator::{page::apply_to_mirror, Operator}};

/// Either an ordinary upstream batch, or a request to move the viewport.
pub enum VirtualizeInput<K, T> {
    /// A batch of upstream (sort-ordered, indexed) changes.
    Edit(ChangeSet<T, K>),
    /// Move the viewport to start at `start` and show up to `size` items.
    Reposition {
        /// First upstream index included in the viewport.
        start: usize,
        /// Maximum number of items in the viewport.
        size: usize,
    },
}

/// The viewport's visible changes plus the upstream's current total size.
#[derive(Debug)]
pub struct VirtualizeResult<K, T> {
    /// Window-relative changes, as `page` would emit them.
    pub changes: ChangeSet<T, K>,
    /// Total number of items upstream, independent of the viewport size.
    pub total: usize,
}

/// Maintains a full mirror of an upstream sort-ordered projection and
/// re-exposes a moving viewport of it, alongside the upstream total.
pub struct Virtualize<K, T> {
    mirror: Vec<(K, T)>,
    window: Vec<(K, T)>,
    start: usize,
    size: usize,
}

impl<K, T> Virtualize<K, T> {
    /// Returns a new virtualize operator, initially empty, showing `size`
    /// items starting at upstream index `start`.
    #[must_use]
    pub fn new(start: usize, size: usize) -> Self {
        Self {
            mirror: Vec::new(),
            window: Vec::new(),
            start,
            size,
        }
    }
}

impl<K, T> Operator for Virtualize<K, T>
where
    K: Clone + Eq,
    T: Clone + PartialEq,
{
    type Input = VirtualizeInput<K, T>;
    type Output = VirtualizeResult<K, T>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        let had_edit = match input {
            VirtualizeInput::Edit(changes) => {
                if changes.is_empty() {
                    false
                } else {
                    for change in changes {
                        apply_to_mirror(&mut self.mirror, change);
                    }
                    true
                }
            }
            VirtualizeInput::Reposition { start, size } => {
                self.start = start;
                self.size = size;
                true
            }
        };
        if !had_edit {
            return None;
        }

        let end = (self.start + self.size).min(self.mirror.len());
        let new_window: Vec<(K, T)> = if self.start >= self.mirror.len() {
            Vec::new()
        } else {
            self.mirror[self.start..end].to_vec()
        };

        let mut changes = ChangeSet::new();
        let len = self.window.len().max(new_window.len());
        for i in 0..len {
            match (self.window.get(i), new_window.get(i)) {
                (Some((ok, ov)), Some((nk, nv))) if ok == nk => {
                    if ov != nv {
                        changes.push(Change::Update {
                            key: nk.clone(),
                            current: nv.clone(),
                            previous: ov.clone(),
                            index: Some(i),
                        });
                    }
                }
                (Some((ok, ov)), Some((nk, nv))) => {
                    changes.push(Change::Remove { key: ok.clone(), current: ov.clone(), index: Some(i) });
                    changes.push(Change::Add { key: nk.clone(), current: nv.clone(), index: Some(i) });
                }
                (Some((ok, ov)), None) => {
                    changes.push(Change::Remove { key: ok.clone(), current: ov.clone(), index: Some(i) });
                }
                (None, Some((nk, nv))) => {
                    changes.push(Change::Add { key: nk.clone(), current: nv.clone(), index: Some(i) });
                }
                (None, None) => unreachable!(),
            }
        }
        self.window = new_window;
        Some(VirtualizeResult {
            changes,
            total: self.mirror.len(),
        })
    }
}
