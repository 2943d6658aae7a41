//! The `group_on` operator: partitions a
//! keyed source by a group-key selector into a change set of *groups*,
//! where each group carries an owned, directly addressable store of its
//! current members. A group's `Add` fires when its first member arrives;
//! its `Remove` fires when its last member departs. An item moving from
//! one group to another (because its own value changed the group key it
//! projects to) is reported as a `Remove` of the vacated group (if it
//! emptied) and an `Add` of the newly created group (if it was new).

use std::{cell::RefCell, collections::HashMap, hash::Hash, rc::Rc};

use crate::{change::Change, change_set::ChangeSet, operator::Operator, store::KeyedStore};

/// One partition of a `group_on` source: a group key plus its current
/// members, keyed the same way the ungrouped upstream was.
pub struct Group<GK, K, T> {
    /// This group's key.
    pub key: GK,
    /// The group's members at the moment this `Group` was produced.
    pub members: Rc<RefCell<KeyedStore<K, T>>>,
}

impl<GK, K, T> Clone for Group<GK, K, T>
where
    GK: Clone,
{
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            members: Rc::clone(&self.members),
        }
    }
}

/// Maintains one member store per distinct group key, emitting group
/// lifecycle changes.
pub struct GroupOn<GK, K, T, F> {
    key_of: F,
    groups: HashMap<GK, Rc<RefCell<KeyedStore<K, T>>>>,
    /// Last-seen group key per upstream item, needed to find the group to
    /// remove an item from on `Update`/`Remove` without re-deriving it
    /// from a value that may no longer be current.
    item_group: HashMap<K, GK>,
}

impl<GK, K, T, F> GroupOn<GK, K, T, F>
where
    GK: Hash + Eq + Clone,
    K: Hash + Eq + Clone,
    T: Clone,
    F: Fn(&T) -> GK,
{
    /// Returns a new group-by operator partitioning on `key_of`.
    #[must_use]
    pub fn new(key_of: F) -> Self {
        Self {
            key_of,
            groups: HashMap::new(),
            item_group: HashMap::new(),
        }
    }

    fn insert_member(&mut self, group_key: GK, key: K, value: T, out: &mut ChangeSet<Group<GK, K, T>, GK>) {
        let is_new_group = !self.groups.contains_key(&group_key);
        let group = self
            .groups
            .entry(group_key.clone())
            .or_insert_with(|| Rc::new(RefCell::new(KeyedStore::new())));
        group.borrow_mut().add_or_update(key.clone(), value);
        let group = Rc::clone(group);
        self.item_group.insert(key, group_key.clone());
        if is_new_group {
            out.push(Change::Add {
                key: group_key.clone(),
                current: Group { key: group_key, members: group },
                index: None,
            });
        }
    }

    fn remove_member(&mut self, group_key: &GK, key: &K, out: &mut ChangeSet<Group<GK, K, T>, GK>) {
        let emptied = if let Some(group) = self.groups.get(group_key) {
            let removed = group.borrow_mut().remove(key);
            removed.is_some() && group.borrow().is_empty()
        } else {
            false
        };
        if emptied {
            let group = self.groups.remove(group_key).expect("checked above");
            out.push(Change::Remove {
                key: group_key.clone(),
                current: Group {
                    key: group_key.clone(),
                    members: group,
                },
                index: None,
            });
        }
    }
}

impl<GK, K, T, F> Operator for GroupOn<GK, K, T, F>
where
    GK: Hash + Eq + Clone,
    K: Hash + Eq + Clone,
    T: Clone,
    F: Fn(&T) -> GK,
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<Group<GK, K, T>, GK>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        let mut out = ChangeSet::new();
        for change in input {
            match change {
                Change::Add { key, current, .. } => {
                    let group_key = (self.key_of)(&current);
                    self.insert_member(group_key, key, current, &mut out);
                }
                Change::Update { key, current, .. } => {
                    let new_group_key = (self.key_of)(&current);
                    match self.item_group.get(&key).cloned() {
                        Some(old) if old == new_group_key => {
                            if let Some(group) = self.groups.get(&old) {
                                group.borrow_mut().add_or_update(key, current);
                            }
                        }
                        Some(old) => {
                            self.remove_member(&old, &key, &mut out);
                            self.insert_member(new_group_key, key, current, &mut out);
                        }
                        None => {
                            self.insert_member(new_group_key, key, current, &mut out);
                        }
                    }
                }
                Change::Remove { key, .. } => {
                    if let Some(group_key) = self.item_group.remove(&key) {
                        self.remove_member(&group_key, &key, &mut out);
                    }
                }
                Change::Refresh { key, current, .. } => {
                    if let Some(group_key) = self.item_group.get(&key) {
                        if let Some(group) = self.groups.get(group_key) {
                            group.borrow_mut().add_or_update(key, current);
                        }
                    }
                }
                Change::Moved { .. } => {
                    // Purely positional; group membership never depends on
                    // an upstream producer's own ordering.
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(k: i32, v: (i32, &'static str)) -> Change<(i32, &'static str), i32> {
        Change::Add { key: k, current: v, index: None }
    }

    #[test]
    fn first_member_emits_group_add() {
        let mut op = GroupOn::new(|v: &(i32, &'static str)| v.1);
        let mut set = ChangeSet::new();
        set.push(add(1, (1, "even")));
        let out = op.process(set).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reason(), crate::change::Reason::Add);
        assert_eq!(out[0].current().key, "even");
        assert_eq!(out[0].current().members.borrow().len(), 1);
    }

    #[test]
    fn second_member_of_same_group_does_not_re_emit_group_add() {
        let mut op = GroupOn::new(|v: &(i32, &'static str)| v.1);
        let mut first = ChangeSet::new();
        first.push(add(1, (1, "even")));
        op.process(first);

        let mut second = ChangeSet::new();
        second.push(add(2, (2, "even")));
        assert!(op.process(second).is_none());
    }

    #[test]
    fn last_member_leaving_emits_group_remove() {
        let mut op = GroupOn::new(|v: &(i32, &'static str)| v.1);
        let mut first = ChangeSet::new();
        first.push(add(1, (1, "even")));
        op.process(first);

        let mut second: ChangeSet<(i32, &str), i32> = ChangeSet::new();
        second.push(Change::Remove { key: 1, current: (1, "even"), index: None });
        let out = op.process(second).unwrap();
        assert_eq!(out[0].reason(), crate::change::Reason::Remove);
    }

    #[test]
    fn update_moving_group_emits_remove_then_add() {
        let mut op = GroupOn::new(|v: &(i32, &'static str)| v.1);
        let mut first = ChangeSet::new();
        first.push(add(1, (1, "even")));
        op.process(first);

        let mut second: ChangeSet<(i32, &str), i32> = ChangeSet::new();
        second.push(Change::Update {
            key: 1,
            current: (1, "odd"),
            previous: (1, "even"),
            index: None,
        });
        let out = op.process(second).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].reason(), crate::change::Reason::Remove);
        assert_eq!(out[1].reason(), crate::change::Reason::Add);
    }
}
