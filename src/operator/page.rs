//! The `page` operator: projects a fixed
//! `[start, start + size)` window of an upstream sort-ordered `ChangeSet`
//! stream, re-emitting it as its own window-relative `Add`/`Update`/
//! `Remove` set whenever the window's contents change.
//!
//! Rather than incrementally translating each upstream structural change
//! into a minimal window delta (index arithmetic that fans out awkwardly
//! once a single upstream insert can shift every subsequent window
//! position), this operator keeps a full mirror of the upstream order and
//! recomputes the window by position-wise diffing the window snapshot
//! before and after each batch. Simpler, and no less correct, at the cost
//! of O(page size) work per batch instead of O(changes).

use crate::{change::Change, change_set::ChangeSet, operator::Operator};

/// Either an ordinary upstream batch, or a request to look at a different
/// window of the same upstream order.
pub enum PageInput<K, T> {
    /// A batch of upstream (sort-ordered, indexed) changes.
    Edit(ChangeSet<T, K>),
    /// Move the window to start at `start` and show up to `size` items.
    Reposition {
        /// First upstream index included in the window.
        start: usize,
        /// Maximum number of items in the window.
        size: usize,
    },
}

/// Maintains a full mirror of an upstream sort-ordered projection and
/// re-exposes a fixed-size window of it.
pub struct Page<K, T> {
    mirror: Vec<(K, T)>,
    window: Vec<(K, T)>,
    start: usize,
    size: usize,
}

impl<K, T> Page<K, T> {
    /// Returns a new page operator, initially empty, showing `size` items
    /// starting at upstream index `start`.
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

impl<K, T> Operator for Page<K, T>
where
    K: Clone + Eq,
    T: Clone + PartialEq,
{
    type Input = PageInput<K, T>;
    type Output = ChangeSet<T, K>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        match input {
            PageInput::Edit(changes) => {
                if changes.is_empty() {
                    return None;
                }
                for change in changes {
                    apply_to_mirror(&mut self.mirror, change);
                }
            }
            PageInput::Reposition { start, size } => {
                self.start = start;
                self.size = size;
            }
        }
        self.diff_window()
    }
}

impl<K, T> Page<K, T>
where
    K: Clone + Eq,
    T: Clone + PartialEq,
{
    fn diff_window(&mut self) -> Option<ChangeSet<T, K>> {
        let end = (self.start + self.size).min(self.mirror.len());
        let new_window: Vec<(K, T)> = if self.start >= self.mirror.len() {
            Vec::new()
        } else {
            self.mirror[self.start..end].to_vec()
        };

        let mut out = ChangeSet::new();
        let len = self.window.len().max(new_window.len());
        for i in 0..len {
            match (self.window.get(i), new_window.get(i)) {
                (Some((ok, ov)), Some((nk, nv))) if ok == nk => {
                    if ov != nv {
                        out.push(Change::Update {
                            key: nk.clone(),
                            current: nv.clone(),
                            previous: ov.clone(),
                            index: Some(i),
                        });
                    }
                }
                (Some((ok, ov)), Some((nk, nv))) => {
                    out.push(Change::Remove {
                        key: ok.clone(),
                        current: ov.clone(),
                        index: Some(i),
                    });
                    out.push(Change::Add {
                        key: nk.clone(),
                        current: nv.clone(),
                        index: Some(i),
                    });
                }
                (Some((ok, ov)), None) => {
                    out.push(Change::Remove {
                        key: ok.clone(),
                        current: ov.clone(),
                        index: Some(i),
                    });
                }
                (None, Some((nk, nv))) => {
                    out.push(Change::Add {
                        key: nk.clone(),
                        current: nv.clone(),
                        index: Some(i),
                    });
                }
                (None, None) => unreachable!(),
            }
        }
        self.window = new_window;
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

/// Folds one upstream change into a full-order mirror keyed by position.
pub(super) fn apply_to_mirror<K, T>(mirror: &mut Vec<(K, T)>, change: Change<T, K>)
where
    K: Clone + Eq,
{
    match change {
        Change::Add { key, current, index } => {
            let index = index.unwrap_or(mirror.len());
            mirror.insert(index, (key, current));
        }
        Change::Update { key, current, index, .. } => {
            if let Some(index) = index {
                mirror[index] = (key, current);
            } else if let Some(pos) = mirror.iter().position(|(k, _)| *k == key) {
                mirror[pos] = (key, current);
            }
        }
        Change::Remove { key, index, .. } => {
            if let Some(index) = index {
                if index < mirror.len() {
                    mirror.remove(index);
                }
            } else if let Some(pos) = mirror.iter().position(|(k, _)| *k == key) {
                mirror.remove(pos);
            }
        }
        Change::Refresh { key, current, index } => {
            if let Some(index) = index {
                mirror[index] = (key, current);
            }
        }
        Change::Moved {
            key,
            current,
            previous_index,
            current_index,
        } => {
            if previous_index < mirror.len() {
                mirror.remove(previous_index);
            }
            mirror.insert(current_index.min(mirror.len()), (key, current));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(k: i32, v: i32, i: usize) -> Change<i32, i32> {
        Change::Add { key: k, current: v, index: Some(i) }
    }

    #[test]
    fn window_reports_only_items_in_range() {
        let mut op: Page<i32, i32> = Page::new(1, 2);
        let mut set = ChangeSet::new();
        set.push(add(0, 10, 0));
        set.push(add(1, 11, 1));
        set.push(add(2, 12, 2));
        set.push(add(3, 13, 3));
        let out = op.process(PageInput::Edit(set)).unwrap();
        let keys: Vec<_> = out.iter().map(|c| *c.key()).collect();
        assert_eq!(keys, vec![1, 2]);
    }

    #[test]
    fn reposition_emits_new_window_diff() {
        let mut op: Page<i32, i32> = Page::new(0, 2);
        let mut set = ChangeSet::new();
        set.push(add(0, 10, 0));
        set.push(add(1, 11, 1));
        set.push(add(2, 12, 2));
        op.process(PageInput::Edit(set));

        let out = op.process(PageInput::Reposition { start: 1, size: 2 }).unwrap();
        assert_eq!(out.len(), 2); // item 0 leaves, item 2 enters
    }
}
