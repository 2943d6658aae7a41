//! The `dispose_many` operator: a
//! pass-through operator whose only job is to run a disposal callback
//! against every value that leaves the visible set — on `Remove`, and on
//! `Update` for the value the update replaced.

use crate::{change::Change, change_set::ChangeSet, operator::Operator};

/// Calls `disposer` for every value that stops being visible.
pub struct DisposeMany<K, T, F> {
    disposer: F,
    _marker: std::marker::PhantomData<(K, T)>,
}

impl<K, T, F> DisposeMany<K, T, F>
where
    F: FnMut(&T),
{
    /// Returns a new dispose-many operator.
    #[must_use]
    pub fn new(disposer: F) -> Self {
        Self {
            disposer,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, T, F> Operator for DisposeMany<K, T, F>
where
    F: FnMut(&T),
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<T, K>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        if input.is_empty() {
            return None;
        }
        for change in &input {
            match change {
                Change::Remove { current, .. } => (self.disposer)(current),
                Change::Update { previous, .. } => (self.disposer)(previous),
                Change::Add { .. } | Change::Refresh { .. } | Change::Moved { .. } => {}
            }
        }
        Some(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn disposes_removed_and_replaced_values() {
        let disposed: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&disposed);
        let mut op = DisposeMany::new(move |v: &i32| sink.borrow_mut().push(*v));

        let mut set: ChangeSet<i32, &str> = ChangeSet::new();
        set.push(Change::Update {
            key: "a",
            current: 2,
            previous: 1,
            index: None,
        });
        set.push(Change::Remove {
            key: "b",
            current: 9,
            index: None,
        });
        op.process(set);
        assert_eq!(*disposed.borrow(), vec![1, 9]);
    }
}
