use std::cmp::Ordering;
use std::mem;

use super::{DEFAULT_ORDER, Slot, check_order, lower_bound};
use crate::OrderedIndex;
use crate::arena::{Arena, NodeId};
use crate::compare::{Comparator, Natural};
use crate::error::Result;

/// Multiway search tree of order `m` with entries stored in every node.
///
/// Each node holds at most `m` keys and, except for the root, at least
/// `ceil(m / 2) - 1`. All leaves sit at the same depth.
pub struct BTree<K, V, C = Natural> {
    nodes: Arena<Node<K, V>>,
    root: NodeId,
    len: usize,
    order: usize,
    cmp: C,
}

struct Node<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    /// Empty for leaves, `keys.len() + 1` entries otherwise.
    children: Vec<NodeId>,
}

impl<K, V> Node<K, V> {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl<K: Ord, V> BTree<K, V> {
    pub fn new() -> Self {
        Self::build(DEFAULT_ORDER, Natural)
    }

    pub fn with_order(order: usize) -> Result<Self> {
        Self::with_order_and_comparator(order, Natural)
    }
}

impl<K, V, C: Comparator<K>> BTree<K, V, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self::build(DEFAULT_ORDER, cmp)
    }

    pub fn with_order_and_comparator(order: usize, cmp: C) -> Result<Self> {
        Ok(Self::build(check_order(order)?, cmp))
    }

    fn build(order: usize, cmp: C) -> Self {
        Self {
            nodes: Arena::new(),
            root: NodeId::NIL,
            len: 0,
            order,
            cmp,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn max_keys(&self) -> usize {
        self.order
    }

    fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }

    fn search(&self, x: NodeId, key: &K) -> (usize, bool) {
        let keys = &self.nodes[x].keys;
        let idx = lower_bound(keys, key, &self.cmp);
        let found = idx < keys.len() && self.cmp.compare(key, &keys[idx]) == Ordering::Equal;
        (idx, found)
    }

    /// Splits an overflowing node around its middle key and returns the
    /// promoted entry with the new right sibling.
    fn split(&mut self, x: NodeId) -> (K, V, NodeId) {
        let node = &mut self.nodes[x];
        let pivot = node.keys.len() / 2;
        let keys = node.keys.split_off(pivot + 1);
        let values = node.values.split_off(pivot + 1);
        let children = if node.is_leaf() {
            Vec::new()
        } else {
            node.children.split_off(pivot + 1)
        };
        let key = node.keys.pop().expect("split of an empty node");
        let value = node.values.pop().expect("split of an empty node");
        tracing::trace!(left = pivot, right = keys.len(), "b-tree node split");
        let right = self.nodes.alloc(Node {
            keys,
            values,
            children,
        });
        (key, value, right)
    }

    fn insert_at(&mut self, x: NodeId, key: K, value: V) -> Option<V> {
        let (idx, found) = self.search(x, &key);
        let node = &mut self.nodes[x];
        if found {
            return Some(mem::replace(&mut node.values[idx], value));
        }
        if node.is_leaf() {
            node.keys.insert(idx, key);
            node.values.insert(idx, value);
            self.len += 1;
            return None;
        }
        let child = node.children[idx];
        let old = self.insert_at(child, key, value);
        if self.nodes[child].keys.len() > self.max_keys() {
            let (key, value, right) = self.split(child);
            let node = &mut self.nodes[x];
            node.keys.insert(idx, key);
            node.values.insert(idx, value);
            node.children.insert(idx + 1, right);
        }
        old
    }

    fn remove_at(&mut self, x: NodeId, key: &K) -> Option<(K, V)> {
        let (idx, found) = self.search(x, key);
        let node = &mut self.nodes[x];
        if node.is_leaf() {
            if !found {
                return None;
            }
            self.len -= 1;
            return Some((node.keys.remove(idx), node.values.remove(idx)));
        }
        let child = node.children[idx];
        let removed = if found {
            // The predecessor moves up from the leaf level.
            let (pk, pv) = self.remove_max(child);
            let node = &mut self.nodes[x];
            Some((
                mem::replace(&mut node.keys[idx], pk),
                mem::replace(&mut node.values[idx], pv),
            ))
        } else {
            self.remove_at(child, key)
        };
        if removed.is_some() && self.nodes[child].keys.len() < self.min_keys() {
            self.repair(x, idx);
        }
        removed
    }

    fn remove_max(&mut self, x: NodeId) -> (K, V) {
        let node = &mut self.nodes[x];
        if node.is_leaf() {
            self.len -= 1;
            let key = node.keys.pop().expect("empty b-tree leaf");
            let value = node.values.pop().expect("empty b-tree leaf");
            return (key, value);
        }
        let idx = node.children.len() - 1;
        let child = node.children[idx];
        let entry = self.remove_max(child);
        if self.nodes[child].keys.len() < self.min_keys() {
            self.repair(x, idx);
        }
        entry
    }

    /// Fixes the underflowing child `idx` of `parent`.
    fn repair(&mut self, parent: NodeId, idx: usize) {
        let (min, max) = (self.min_keys(), self.max_keys());
        let repaired = self.borrow_from_right(parent, idx, min)
            || self.merge_right(parent, idx, max)
            || self.borrow_from_left(parent, idx, min)
            || (idx > 0 && self.merge_right(parent, idx - 1, max));
        if !repaired {
            panic!("b-tree child {idx} underflows and no sibling can repair it");
        }
    }

    fn borrow_from_right(&mut self, parent: NodeId, idx: usize, min: usize) -> bool {
        let p = &self.nodes[parent];
        if idx == p.keys.len() {
            return false;
        }
        let (child, right) = (p.children[idx], p.children[idx + 1]);
        let r = &mut self.nodes[right];
        if r.keys.len() <= min {
            return false;
        }
        let key = r.keys.remove(0);
        let value = r.values.remove(0);
        let grandchild = (!r.is_leaf()).then(|| r.children.remove(0));

        let p = &mut self.nodes[parent];
        let key = mem::replace(&mut p.keys[idx], key);
        let value = mem::replace(&mut p.values[idx], value);

        let c = &mut self.nodes[child];
        c.keys.push(key);
        c.values.push(value);
        c.children.extend(grandchild);
        tracing::trace!(child = idx, "b-tree borrow from right");
        true
    }

    fn borrow_from_left(&mut self, parent: NodeId, idx: usize, min: usize) -> bool {
        if idx == 0 {
            return false;
        }
        let p = &self.nodes[parent];
        let (left, child) = (p.children[idx - 1], p.children[idx]);
        let l = &mut self.nodes[left];
        if l.keys.len() <= min {
            return false;
        }
        let key = l.keys.pop().expect("non-empty left sibling");
        let value = l.values.pop().expect("non-empty left sibling");
        let grandchild = l.children.pop();

        let p = &mut self.nodes[parent];
        let key = mem::replace(&mut p.keys[idx - 1], key);
        let value = mem::replace(&mut p.values[idx - 1], value);

        let c = &mut self.nodes[child];
        c.keys.insert(0, key);
        c.values.insert(0, value);
        if let Some(grandchild) = grandchild {
            c.children.insert(0, grandchild);
        }
        tracing::trace!(child = idx, "b-tree borrow from left");
        true
    }

    /// Folds child `idx + 1` and the separator between them into child `idx`.
    fn merge_right(&mut self, parent: NodeId, idx: usize, max: usize) -> bool {
        let p = &self.nodes[parent];
        if idx == p.keys.len() {
            return false;
        }
        let (child, right) = (p.children[idx], p.children[idx + 1]);
        if self.nodes[child].keys.len() + self.nodes[right].keys.len() + 1 > max {
            return false;
        }
        let p = &mut self.nodes[parent];
        let key = p.keys.remove(idx);
        let value = p.values.remove(idx);
        p.children.remove(idx + 1);

        let r = self.nodes.release(right);
        let c = &mut self.nodes[child];
        c.keys.push(key);
        c.values.push(value);
        c.keys.extend(r.keys);
        c.values.extend(r.values);
        c.children.extend(r.children);
        tracing::trace!(child = idx, keys = c.keys.len(), "b-tree merge");
        true
    }

    fn edge_leaf(&self, last: bool) -> Option<NodeId> {
        let mut x = self.root.to_option()?;
        loop {
            let node = &self.nodes[x];
            if node.is_leaf() {
                return Some(x);
            }
            x = if last {
                node.children[node.children.len() - 1]
            } else {
                node.children[0]
            };
        }
    }

    fn last_slot_under(&self, mut x: NodeId) -> Slot {
        while let Some(&child) = self.nodes[x].children.last() {
            x = child;
        }
        Slot::new(x, self.nodes[x].keys.len() - 1)
    }

    fn first_slot_under(&self, mut x: NodeId) -> Slot {
        while let Some(&child) = self.nodes[x].children.first() {
            x = child;
        }
        Slot::new(x, 0)
    }
}

impl<K, V, C: Comparator<K>> OrderedIndex for BTree<K, V, C> {
    type Key = K;
    type Value = V;
    type Pos = Slot;

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = NodeId::NIL;
        self.len = 0;
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.root.is_nil() {
            self.root = self.nodes.alloc(Node {
                keys: vec![key],
                values: vec![value],
                children: Vec::new(),
            });
            self.len = 1;
            return None;
        }
        let old = self.insert_at(self.root, key, value);
        if self.nodes[self.root].keys.len() > self.max_keys() {
            let (key, value, right) = self.split(self.root);
            self.root = self.nodes.alloc(Node {
                keys: vec![key],
                values: vec![value],
                children: vec![self.root, right],
            });
            tracing::trace!(len = self.len, "b-tree root split");
        }
        old
    }

    fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        if self.root.is_nil() {
            return None;
        }
        let removed = self.remove_at(self.root, key);
        let root = &self.nodes[self.root];
        if root.keys.is_empty() {
            let next = root.children.first().copied().unwrap_or(NodeId::NIL);
            self.nodes.release(self.root);
            self.root = next;
            tracing::trace!(len = self.len, "b-tree root collapse");
        }
        removed
    }

    fn locate(&self, key: &K) -> Option<Slot> {
        let mut x = self.root.to_option()?;
        loop {
            let (idx, found) = self.search(x, key);
            if found {
                return Some(Slot::new(x, idx));
            }
            x = *self.nodes[x].children.get(idx)?;
        }
    }

    fn locate_first(&self) -> Option<Slot> {
        self.edge_leaf(false).map(|x| Slot::new(x, 0))
    }

    fn locate_last(&self) -> Option<Slot> {
        self.edge_leaf(true)
            .map(|x| Slot::new(x, self.nodes[x].keys.len() - 1))
    }

    fn locate_prev(&self, key: &K) -> Option<Slot> {
        let mut x = self.root.to_option()?;
        // Last separator passed on its right-hand side.
        let mut turn = None;
        loop {
            let (idx, found) = self.search(x, key);
            let node = &self.nodes[x];
            if node.is_leaf() {
                return if idx > 0 { Some(Slot::new(x, idx - 1)) } else { turn };
            }
            if found {
                return Some(self.last_slot_under(node.children[idx]));
            }
            if idx > 0 {
                turn = Some(Slot::new(x, idx - 1));
            }
            x = node.children[idx];
        }
    }

    fn locate_next(&self, key: &K) -> Option<Slot> {
        let mut x = self.root.to_option()?;
        let mut turn = None;
        loop {
            let (mut idx, found) = self.search(x, key);
            let node = &self.nodes[x];
            if found {
                if !node.is_leaf() {
                    return Some(self.first_slot_under(node.children[idx + 1]));
                }
                idx += 1;
            }
            if node.is_leaf() {
                return if idx < node.keys.len() { Some(Slot::new(x, idx)) } else { turn };
            }
            if idx < node.keys.len() {
                turn = Some(Slot::new(x, idx));
            }
            x = node.children[idx];
        }
    }

    fn key_at(&self, pos: Slot) -> &K {
        &self.nodes[pos.node].keys[pos.index]
    }

    fn value_at(&self, pos: Slot) -> &V {
        &self.nodes[pos.node].values[pos.index]
    }

    fn value_at_mut(&mut self, pos: Slot) -> &mut V {
        &mut self.nodes[pos.node].values[pos.index]
    }
}

impl_collection_traits!(BTree, []);

#[cfg(test)]
mod tests {
    use super::BTree;
    use crate::OrderedIndex;
    use crate::arena::NodeId;
    use crate::compare::Comparator;
    use crate::error::Error;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::cmp::Ordering;

    /// Checks fill factor, key order and separator bounds below `x`, and
    /// returns the leaf depth.
    fn check_node<K, V, C: Comparator<K>>(
        tree: &BTree<K, V, C>,
        x: NodeId,
        lo: Option<&K>,
        hi: Option<&K>,
    ) -> usize {
        let node = &tree.nodes[x];
        assert!(node.keys.len() <= tree.max_keys());
        if x != tree.root {
            assert!(node.keys.len() >= tree.min_keys(), "underfull node");
        }
        assert_eq!(node.keys.len(), node.values.len());
        for w in node.keys.windows(2) {
            assert_eq!(tree.cmp.compare(&w[0], &w[1]), Ordering::Less);
        }
        if let (Some(lo), Some(first)) = (lo, node.keys.first()) {
            assert_eq!(tree.cmp.compare(lo, first), Ordering::Less);
        }
        if let (Some(hi), Some(last)) = (hi, node.keys.last()) {
            assert_eq!(tree.cmp.compare(last, hi), Ordering::Less);
        }
        if node.is_leaf() {
            return 0;
        }
        assert_eq!(node.children.len(), node.keys.len() + 1);
        let mut depth = None;
        for (i, &child) in node.children.iter().enumerate() {
            let lo = if i == 0 { lo } else { Some(&node.keys[i - 1]) };
            let hi = node.keys.get(i).or(hi);
            let d = check_node(tree, child, lo, hi);
            assert_eq!(*depth.get_or_insert(d), d, "leaves at different depths");
        }
        depth.unwrap_or(0) + 1
    }

    fn check<K, V, C: Comparator<K>>(tree: &BTree<K, V, C>) {
        if tree.root.is_nil() {
            assert_eq!(tree.len, 0);
            assert_eq!(tree.nodes.live(), 0);
            return;
        }
        assert!(!tree.nodes[tree.root].keys.is_empty());
        check_node(tree, tree.root, None, None);
    }

    #[test]
    fn rejects_small_orders() {
        assert!(matches!(
            BTree::<u32, u32>::with_order(2),
            Err(Error::InvalidOrder { order: 2, min: 3 })
        ));
        assert_eq!(BTree::<u32, u32>::with_order(3).map(|t| t.order()), Ok(3));
        assert_eq!(BTree::<u32, u32>::new().order(), 32);
    }

    #[test]
    fn structure_holds_for_small_orders() {
        let mut rng = StdRng::seed_from_u64(0x5EED_2026);
        for order in 3..=8 {
            let mut tree = BTree::with_order(order).expect("valid order");
            let mut keys: Vec<u32> = (0..600).collect();
            keys.shuffle(&mut rng);
            for &k in &keys {
                tree.insert(k, k + 1);
                check(&tree);
            }
            keys.shuffle(&mut rng);
            for &k in &keys {
                assert_eq!(tree.remove(&k), Some(k + 1));
                check(&tree);
            }
            assert!(tree.root.is_nil());
        }
    }

    #[test]
    fn mixed_operations_keep_structure() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut tree = BTree::with_order(4).expect("valid order");
        for _ in 0..8000 {
            let key = rng.random_range(0..500_u32);
            if rng.random_bool(0.5) {
                tree.insert(key, ());
            } else {
                tree.remove(&key);
            }
            check(&tree);
        }
    }

    #[test]
    fn neighbours_cross_internal_nodes() {
        let mut tree = BTree::with_order(3).expect("valid order");
        for k in 0..64_u32 {
            tree.insert(k * 10, k);
        }
        // Every separator sits in an internal node at this size.
        for k in 0..64_u32 {
            let key = k * 10;
            assert_eq!(tree.prev(&key).map(|c| *c.key()), key.checked_sub(10));
            assert_eq!(tree.next(&key).map(|c| *c.key()), (k < 63).then(|| key + 10));
            assert_eq!(tree.find(&key).map(|c| *c.value()), Some(k));
        }
    }
}
