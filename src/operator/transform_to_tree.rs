//! The `transform_to_tree` operator: builds
//! a forest out of a flat keyed source by resolving, for every item, a
//! parent key projected from its own value. An item whose projected
//! parent does not currently exist (or would close a cycle) is treated as
//! a root; it is adopted into its proper parent's children the moment
//! that parent appears, and is promoted back to a root if its parent is
//! later removed.

use std::{collections::HashMap, collections::HashSet, hash::Hash};

use crate::{change::Change, change_set::ChangeSet, operator::Operator};

/// One node of the forest produced by [`TransformToTree`]: the item's own
/// value plus the keys of its current children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<T, K> {
    /// The item's own value.
    pub value: T,
    /// Keys of this node's current children, in arbitrary order.
    pub children: Vec<K>,
}

/// Resolves a flat keyed source into a forest, projecting each item's
/// parent key through `parent_of`.
pub struct TransformToTree<K, T, F> {
    parent_of: F,
    items: HashMap<K, T>,
    /// The parent key `parent_of` projected, unresolved — kept so a later
    /// arrival can re-check orphans without re-deriving it from a value
    /// that may reference a key not yet known.
    raw_parent: HashMap<K, Option<K>>,
    /// The effective parent actually in force: `None` for a declared root,
    /// a missing parent, or a parent that would close a cycle.
    effective_parent: HashMap<K, Option<K>>,
    children: HashMap<K, Vec<K>>,
    /// Keys whose raw parent is some key not currently present (or would
    /// cycle), checked again whenever a new key is added.
    orphans: HashSet<K>,
}

impl<K, T, F> TransformToTree<K, T, F>
where
    K: Hash + Eq + Clone,
    T: Clone,
    F: Fn(&T) -> Option<K>,
{
    /// Returns a new tree operator, projecting each item's parent key
    /// through `parent_of`.
    #[must_use]
    pub fn new(parent_of: F) -> Self {
        Self {
            parent_of,
            items: HashMap::new(),
            raw_parent: HashMap::new(),
            effective_parent: HashMap::new(),
            children: HashMap::new(),
            orphans: HashSet::new(),
        }
    }

    fn node_of(&self, key: &K) -> Node<T, K> {
        Node {
            value: self.items[key].clone(),
            children: self.children.get(key).cloned().unwrap_or_default(),
        }
    }

    /// True if making `parent` the parent of `child` would not close a
    /// cycle, walking the existing parent chain up to once per known key.
    fn is_well_founded(&self, child: &K, parent: &K) -> bool {
        let mut current = parent;
        for _ in 0..=self.items.len() {
            if current == child {
                return false;
            }
            match self.effective_parent.get(current).and_then(|p| p.as_ref()) {
                Some(next) => current = next,
                None => return true,
            }
        }
        false
    }

    fn attach(&mut self, key: &K, parent: K) {
        self.effective_parent.insert(key.clone(), Some(parent.clone()));
        self.children.entry(parent).or_default().push(key.clone());
        self.orphans.remove(key);
    }

    fn detach_from_current_parent(&mut self, key: &K) {
        if let Some(Some(parent)) = self.effective_parent.get(key).cloned() {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|k| k != key);
            }
        }
    }

    fn resolve_parent(&mut self, key: &K, raw_parent: Option<K>) -> Option<K> {
        match &raw_parent {
            Some(parent) if self.items.contains_key(parent) && self.is_well_founded(key, parent) => {
                Some(parent.clone())
            }
            Some(_) => {
                self.orphans.insert(key.clone());
                None
            }
            None => None,
        }
    }

    fn place(&mut self, key: K, value: T, out: &mut ChangeSet<Node<T, K>, K>) {
        let raw_parent = (self.parent_of)(&value);
        self.items.insert(key.clone(), value);
        self.raw_parent.insert(key.clone(), raw_parent.clone());
        let resolved = self.resolve_parent(&key, raw_parent);
        self.effective_parent.insert(key.clone(), None);
        if let Some(parent) = resolved {
            self.attach(&key, parent.clone());
            out.push(Change::Update {
                key: parent.clone(),
                current: self.node_of(&parent),
                previous: Node {
                    value: self.items[&parent].clone(),
                    children: {
                        let mut without = self.children[&parent].clone();
                        without.retain(|k| k != &key);
                        without
                    },
                },
                index: None,
            });
        }
        out.push(Change::Add {
            key: key.clone(),
            current: self.node_of(&key),
            index: None,
        });
        self.adopt_orphans_of(&key, out);
    }

    fn adopt_orphans_of(&mut self, new_parent: &K, out: &mut ChangeSet<Node<T, K>, K>) {
        let candidates: Vec<K> = self
            .orphans
            .iter()
            .filter(|orphan| {
                self.raw_parent.get(*orphan).and_then(|p| p.as_ref()) == Some(new_parent)
            })
            .cloned()
            .collect();
        for orphan in candidates {
            if self.is_well_founded(&orphan, new_parent) {
                let before = self.node_of(new_parent);
                self.attach(&orphan, new_parent.clone());
                out.push(Change::Update {
                    key: new_parent.clone(),
                    current: self.node_of(new_parent),
                    previous: before,
                    index: None,
                });
            }
        }
    }

    fn promote_children_to_roots(&mut self, key: &K, out: &mut ChangeSet<Node<T, K>, K>) {
        let children = self.children.remove(key).unwrap_or_default();
        for child in children {
            self.effective_parent.insert(child.clone(), None);
            self.orphans.insert(child);
        }
        let _ = out;
    }
}

impl<K, T, F> Operator for TransformToTree<K, T, F>
where
    K: Hash + Eq + Clone,
    T: Clone,
    F: Fn(&T) -> Option<K>,
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<Node<T, K>, K>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        let mut out = ChangeSet::new();
        for change in input {
            match change {
                Change::Add { key, current, .. } => {
                    self.place(key, current, &mut out);
                }
                Change::Update { key, current, .. } => {
                    self.detach_from_current_parent(&key);
                    self.items.remove(&key);
                    self.raw_parent.remove(&key);
                    self.effective_parent.remove(&key);
                    let existing_children = self.children.get(&key).cloned().unwrap_or_default();
                    self.place(key.clone(), current, &mut out);
                    self.children.insert(key, existing_children);
                }
                Change::Remove { key, .. } => {
                    self.detach_from_current_parent(&key);
                    self.promote_children_to_roots(&key, &mut out);
                    if let Some(value) = self.items.remove(&key) {
                        out.push(Change::Remove {
                            key: key.clone(),
                            current: Node {
                                value,
                                children: Vec::new(),
                            },
                            index: None,
                        });
                    }
                    self.raw_parent.remove(&key);
                    self.effective_parent.remove(&key);
                    self.orphans.remove(&key);
                }
                Change::Refresh { key, current, .. } => {
                    if self.items.contains_key(&key) {
                        self.items.insert(key.clone(), current);
                        out.push(Change::Refresh {
                            key: key.clone(),
                            current: self.node_of(&key),
                            index: None,
                        });
                    }
                }
                Change::Moved { .. } => {
                    // Tree membership is parent-derived, not positional.
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

    #[derive(Clone)]
    struct Item {
        id: i32,
        parent: Option<i32>,
    }

    fn add(id: i32, parent: Option<i32>) -> Change<Item, i32> {
        Change::Add {
            key: id,
            current: Item { id, parent },
            index: None,
        }
    }

    #[test]
    fn item_with_no_parent_is_a_root() {
        let mut op = TransformToTree::new(|i: &Item| i.parent);
        let mut set = ChangeSet::new();
        set.push(add(1, None));
        let out = op.process(set).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].current().children.is_empty());
    }

    #[test]
    fn child_arriving_after_parent_is_attached() {
        let mut op = TransformToTree::new(|i: &Item| i.parent);
        let mut first = ChangeSet::new();
        first.push(add(1, None));
        op.process(first);

        let mut second = ChangeSet::new();
        second.push(add(2, Some(1)));
        let out = op.process(second).unwrap();
        // Parent's Update (new child) then the child's own Add.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].reason(), crate::change::Reason::Update);
        assert_eq!(out[0].current().children, vec![2]);
    }

    #[test]
    fn orphan_adopted_once_its_parent_arrives() {
        let mut op = TransformToTree::new(|i: &Item| i.parent);
        let mut first = ChangeSet::new();
        first.push(add(2, Some(1))); // parent 1 doesn't exist yet
        let out = op.process(first).unwrap();
        assert_eq!(out.len(), 1); // only the orphan's own Add, as a root
        assert!(out[0].current().children.is_empty());

        let mut second = ChangeSet::new();
        second.push(add(1, None));
        let out = op.process(second).unwrap();
        // The new parent's own Add, then its Update adopting the orphan.
        assert!(out.iter().any(|c| c.current().children == vec![2]));
    }

    #[test]
    fn removing_a_parent_promotes_children_to_roots() {
        let mut op = TransformToTree::new(|i: &Item| i.parent);
        let mut first = ChangeSet::new();
        first.push(add(1, None));
        op.process(first);
        let mut second = ChangeSet::new();
        second.push(add(2, Some(1)));
        op.process(second);

        let mut third: ChangeSet<Item, i32> = ChangeSet::new();
        third.push(Change::Remove {
            key: 1,
            current: Item { id: 1, parent: None },
            index: None,
        });
        let out = op.process(third).unwrap();
        assert_eq!(out[0].reason(), crate::change::Reason::Remove);
        assert_eq!(*out[0].key(), 1);
    }

    #[test]
    fn mutually_cyclic_parents_resolve_by_arrival_order_instead_of_deadlocking() {
        let mut op = TransformToTree::new(|i: &Item| i.parent);
        // 1 declares 2 as its parent, but 2 doesn't exist yet, so 1 starts
        // as a root. When 2 arrives declaring 1 as its parent, that edge
        // is well-founded (1 has no parent yet), so 2 becomes 1's child;
        // the reverse edge is then permanently rejected as cyclic.
        let mut first = ChangeSet::new();
        first.push(add(1, Some(2)));
        op.process(first);

        let mut second = ChangeSet::new();
        second.push(add(2, Some(1)));
        op.process(second);

        assert_eq!(op.node_of(&1).children, vec![2]);
        assert!(op.node_of(&2).children.is_empty());
    }
}
