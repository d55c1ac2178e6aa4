use std::cmp::Ordering;
use std::mem;

use super::{DEFAULT_ORDER, Slot, check_order, lower_bound};
use crate::OrderedIndex;
use crate::arena::{Arena, NodeId};
use crate::compare::{Comparator, Natural};
use crate::error::Result;

/// Multiway tree of order `m` keeping entries in doubly linked leaves.
///
/// Internal nodes only route: every key below separator `i` is `<=` it and
/// every key below separator `i + 1` is greater. Separators are copies of
/// leaf keys, hence the `K: Clone` bound. Cursor steps follow the leaf chain
/// without touching internal nodes.
pub struct BPlusTree<K, V, C = Natural> {
    nodes: Arena<Node<K, V>>,
    root: NodeId,
    len: usize,
    order: usize,
    cmp: C,
}

enum Node<K, V> {
    Leaf(Leaf<K, V>),
    Internal(Internal<K>),
}

struct Leaf<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    prev: NodeId,
    next: NodeId,
}

struct Internal<K> {
    keys: Vec<K>,
    children: Vec<NodeId>,
}

impl<K, V> Node<K, V> {
    fn keys(&self) -> &[K] {
        match self {
            Node::Leaf(leaf) => &leaf.keys,
            Node::Internal(node) => &node.keys,
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    pub fn new() -> Self {
        Self::build(DEFAULT_ORDER, Natural)
    }

    pub fn with_order(order: usize) -> Result<Self> {
        Self::with_order_and_comparator(order, Natural)
    }
}

impl<K: Clone, V, C: Comparator<K>> BPlusTree<K, V, C> {
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
        self.order - 1
    }

    fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }

    fn leaf(&self, x: NodeId) -> &Leaf<K, V> {
        match &self.nodes[x] {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => unreachable!("expected a leaf"),
        }
    }

    fn leaf_mut(&mut self, x: NodeId) -> &mut Leaf<K, V> {
        match &mut self.nodes[x] {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => unreachable!("expected a leaf"),
        }
    }

    fn internal(&self, x: NodeId) -> &Internal<K> {
        match &self.nodes[x] {
            Node::Internal(node) => node,
            Node::Leaf(_) => unreachable!("expected an internal node"),
        }
    }

    fn internal_mut(&mut self, x: NodeId) -> &mut Internal<K> {
        match &mut self.nodes[x] {
            Node::Internal(node) => node,
            Node::Leaf(_) => unreachable!("expected an internal node"),
        }
    }

    /// Leaf that would hold `key`.
    fn descend(&self, key: &K) -> Option<NodeId> {
        let mut x = self.root.to_option()?;
        while let Node::Internal(node) = &self.nodes[x] {
            x = node.children[lower_bound(&node.keys, key, &self.cmp)];
        }
        Some(x)
    }

    fn edge_leaf(&self, last: bool) -> Option<NodeId> {
        let mut x = self.root.to_option()?;
        while let Node::Internal(node) = &self.nodes[x] {
            x = if last {
                node.children[node.children.len() - 1]
            } else {
                node.children[0]
            };
        }
        Some(x)
    }

    /// Splits an overflowing node and returns the separator for the parent
    /// together with the new right sibling.
    fn split(&mut self, x: NodeId) -> (K, NodeId) {
        match &mut self.nodes[x] {
            Node::Leaf(leaf) => {
                // The left half keeps its maximum as the separator.
                let pivot = leaf.keys.len() / 2;
                let keys = leaf.keys.split_off(pivot);
                let values = leaf.values.split_off(pivot);
                let separator = leaf.keys[pivot - 1].clone();
                let next = leaf.next;
                tracing::trace!(left = pivot, right = keys.len(), "b+ tree leaf split");
                let right = self.nodes.alloc(Node::Leaf(Leaf {
                    keys,
                    values,
                    prev: x,
                    next,
                }));
                self.leaf_mut(x).next = right;
                if !next.is_nil() {
                    self.leaf_mut(next).prev = right;
                }
                (separator, right)
            }
            Node::Internal(node) => {
                let pivot = node.keys.len() / 2;
                let keys = node.keys.split_off(pivot + 1);
                let children = node.children.split_off(pivot + 1);
                let separator = node.keys.pop().expect("split of an empty node");
                tracing::trace!(left = pivot, right = keys.len(), "b+ tree internal split");
                let right = self.nodes.alloc(Node::Internal(Internal { keys, children }));
                (separator, right)
            }
        }
    }

    fn insert_at(&mut self, x: NodeId, key: K, value: V) -> Option<V> {
        match &mut self.nodes[x] {
            Node::Leaf(leaf) => {
                let idx = lower_bound(&leaf.keys, &key, &self.cmp);
                if idx < leaf.keys.len() && self.cmp.compare(&key, &leaf.keys[idx]) == Ordering::Equal {
                    return Some(mem::replace(&mut leaf.values[idx], value));
                }
                leaf.keys.insert(idx, key);
                leaf.values.insert(idx, value);
                self.len += 1;
                None
            }
            Node::Internal(node) => {
                let idx = lower_bound(&node.keys, &key, &self.cmp);
                let child = node.children[idx];
                let old = self.insert_at(child, key, value);
                if self.nodes[child].keys().len() > self.max_keys() {
                    let (separator, right) = self.split(child);
                    let node = self.internal_mut(x);
                    node.keys.insert(idx, separator);
                    node.children.insert(idx + 1, right);
                }
                old
            }
        }
    }

    fn remove_at(&mut self, x: NodeId, key: &K) -> Option<(K, V)> {
        match &mut self.nodes[x] {
            Node::Leaf(leaf) => {
                let idx = lower_bound(&leaf.keys, key, &self.cmp);
                if idx == leaf.keys.len() || self.cmp.compare(key, &leaf.keys[idx]) != Ordering::Equal {
                    return None;
                }
                self.len -= 1;
                Some((leaf.keys.remove(idx), leaf.values.remove(idx)))
            }
            Node::Internal(node) => {
                let idx = lower_bound(&node.keys, key, &self.cmp);
                let child = node.children[idx];
                let removed = self.remove_at(child, key);
                if removed.is_some() && self.nodes[child].keys().len() < self.min_keys() {
                    self.repair(x, idx);
                }
                removed
            }
        }
    }

    /// Fixes the underflowing child `idx` of `parent`.
    fn repair(&mut self, parent: NodeId, idx: usize) {
        let (min, max) = (self.min_keys(), self.max_keys());
        let repaired = self.borrow_from_right(parent, idx, min)
            || self.merge_right(parent, idx, max)
            || self.borrow_from_left(parent, idx, min)
            || (idx > 0 && self.merge_right(parent, idx - 1, max));
        if !repaired {
            panic!("b+ tree child {idx} underflows and no sibling can repair it");
        }
    }

    fn borrow_from_right(&mut self, parent: NodeId, idx: usize, min: usize) -> bool {
        let p = self.internal(parent);
        if idx == p.keys.len() {
            return false;
        }
        let (child, right) = (p.children[idx], p.children[idx + 1]);
        if self.nodes[right].keys().len() <= min {
            return false;
        }
        match &mut self.nodes[right] {
            Node::Leaf(r) => {
                let key = r.keys.remove(0);
                let value = r.values.remove(0);
                self.internal_mut(parent).keys[idx] = key.clone();
                let c = self.leaf_mut(child);
                c.keys.push(key);
                c.values.push(value);
            }
            Node::Internal(r) => {
                let key = r.keys.remove(0);
                let grandchild = r.children.remove(0);
                let separator = mem::replace(&mut self.internal_mut(parent).keys[idx], key);
                let c = self.internal_mut(child);
                c.keys.push(separator);
                c.children.push(grandchild);
            }
        }
        tracing::trace!(child = idx, "b+ tree borrow from right");
        true
    }

    fn borrow_from_left(&mut self, parent: NodeId, idx: usize, min: usize) -> bool {
        if idx == 0 {
            return false;
        }
        let p = self.internal(parent);
        let (left, child) = (p.children[idx - 1], p.children[idx]);
        if self.nodes[left].keys().len() <= min {
            return false;
        }
        match &mut self.nodes[left] {
            Node::Leaf(l) => {
                let key = l.keys.pop().expect("non-empty left sibling");
                let value = l.values.pop().expect("non-empty left sibling");
                let separator = l.keys.last().expect("left sibling above minimum").clone();
                self.internal_mut(parent).keys[idx - 1] = separator;
                let c = self.leaf_mut(child);
                c.keys.insert(0, key);
                c.values.insert(0, value);
            }
            Node::Internal(l) => {
                let key = l.keys.pop().expect("non-empty left sibling");
                let grandchild = l.children.pop().expect("non-empty left sibling");
                let separator = mem::replace(&mut self.internal_mut(parent).keys[idx - 1], key);
                let c = self.internal_mut(child);
                c.keys.insert(0, separator);
                c.children.insert(0, grandchild);
            }
        }
        tracing::trace!(child = idx, "b+ tree borrow from left");
        true
    }

    /// Folds child `idx + 1` into child `idx`. Internal merges also pull the
    /// separator down, so it counts towards the size limit.
    fn merge_right(&mut self, parent: NodeId, idx: usize, max: usize) -> bool {
        let p = self.internal(parent);
        if idx == p.keys.len() {
            return false;
        }
        let (child, right) = (p.children[idx], p.children[idx + 1]);
        let pulled = usize::from(!self.nodes[child].is_leaf());
        if self.nodes[child].keys().len() + self.nodes[right].keys().len() + pulled > max {
            return false;
        }
        let p = self.internal_mut(parent);
        let separator = p.keys.remove(idx);
        p.children.remove(idx + 1);
        match self.nodes.release(right) {
            Node::Leaf(r) => {
                let c = self.leaf_mut(child);
                c.keys.extend(r.keys);
                c.values.extend(r.values);
                c.next = r.next;
                if !r.next.is_nil() {
                    self.leaf_mut(r.next).prev = child;
                }
            }
            Node::Internal(r) => {
                let c = self.internal_mut(child);
                c.keys.push(separator);
                c.keys.extend(r.keys);
                c.children.extend(r.children);
            }
        }
        tracing::trace!(child = idx, keys = self.nodes[child].keys().len(), "b+ tree merge");
        true
    }
}

impl<K: Clone, V, C: Comparator<K>> OrderedIndex for BPlusTree<K, V, C> {
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
            self.root = self.nodes.alloc(Node::Leaf(Leaf {
                keys: vec![key],
                values: vec![value],
                prev: NodeId::NIL,
                next: NodeId::NIL,
            }));
            self.len = 1;
            return None;
        }
        let old = self.insert_at(self.root, key, value);
        if self.nodes[self.root].keys().len() > self.max_keys() {
            let (separator, right) = self.split(self.root);
            self.root = self.nodes.alloc(Node::Internal(Internal {
                keys: vec![separator],
                children: vec![self.root, right],
            }));
            tracing::trace!(len = self.len, "b+ tree root split");
        }
        old
    }

    fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        if self.root.is_nil() {
            return None;
        }
        let removed = self.remove_at(self.root, key);
        let next = match &self.nodes[self.root] {
            Node::Leaf(leaf) if leaf.keys.is_empty() => NodeId::NIL,
            Node::Internal(node) if node.children.len() == 1 => node.children[0],
            _ => return removed,
        };
        self.nodes.release(self.root);
        self.root = next;
        tracing::trace!(len = self.len, "b+ tree root collapse");
        removed
    }

    fn locate(&self, key: &K) -> Option<Slot> {
        let x = self.descend(key)?;
        let keys = &self.leaf(x).keys;
        let idx = lower_bound(keys, key, &self.cmp);
        (idx < keys.len() && self.cmp.compare(key, &keys[idx]) == Ordering::Equal)
            .then(|| Slot::new(x, idx))
    }

    fn locate_first(&self) -> Option<Slot> {
        self.edge_leaf(false).map(|x| Slot::new(x, 0))
    }

    fn locate_last(&self) -> Option<Slot> {
        self.edge_leaf(true)
            .map(|x| Slot::new(x, self.leaf(x).keys.len() - 1))
    }

    fn locate_prev(&self, key: &K) -> Option<Slot> {
        let x = self.descend(key)?;
        let idx = lower_bound(&self.leaf(x).keys, key, &self.cmp);
        if idx > 0 {
            return Some(Slot::new(x, idx - 1));
        }
        let prev = self.leaf(x).prev.to_option()?;
        Some(Slot::new(prev, self.leaf(prev).keys.len() - 1))
    }

    fn locate_next(&self, key: &K) -> Option<Slot> {
        let x = self.descend(key)?;
        let keys = &self.leaf(x).keys;
        let mut idx = lower_bound(keys, key, &self.cmp);
        if idx < keys.len() && self.cmp.compare(key, &keys[idx]) == Ordering::Equal {
            idx += 1;
        }
        if idx < keys.len() {
            return Some(Slot::new(x, idx));
        }
        let next = self.leaf(x).next.to_option()?;
        Some(Slot::new(next, 0))
    }

    fn step_next(&self, pos: Slot) -> Option<Slot> {
        let leaf = self.leaf(pos.node);
        if pos.index + 1 < leaf.keys.len() {
            return Some(Slot::new(pos.node, pos.index + 1));
        }
        leaf.next.to_option().map(|next| Slot::new(next, 0))
    }

    fn step_prev(&self, pos: Slot) -> Option<Slot> {
        if pos.index > 0 {
            return Some(Slot::new(pos.node, pos.index - 1));
        }
        let prev = self.leaf(pos.node).prev.to_option()?;
        Some(Slot::new(prev, self.leaf(prev).keys.len() - 1))
    }

    fn key_at(&self, pos: Slot) -> &K {
        &self.leaf(pos.node).keys[pos.index]
    }

    fn value_at(&self, pos: Slot) -> &V {
        &self.leaf(pos.node).values[pos.index]
    }

    fn value_at_mut(&mut self, pos: Slot) -> &mut V {
        &mut self.leaf_mut(pos.node).values[pos.index]
    }
}

impl_collection_traits!(BPlusTree, [Clone]);

#[cfg(test)]
mod tests {
    use super::{BPlusTree, Node};
    use crate::OrderedIndex;
    use crate::arena::NodeId;
    use crate::compare::{Comparator, Reverse};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::cmp::Ordering;

    /// Walks the tree checking fill factor and separator bounds. Collects
    /// leaves in order and returns the leaf depth.
    fn check_node<K: Clone, V, C: Comparator<K>>(
        tree: &BPlusTree<K, V, C>,
        x: NodeId,
        lo: Option<&K>,
        hi: Option<&K>,
        leaves: &mut Vec<NodeId>,
    ) -> usize {
        let keys = tree.nodes[x].keys();
        assert!(keys.len() <= tree.max_keys());
        if x != tree.root {
            assert!(keys.len() >= tree.min_keys(), "underfull node");
        }
        for w in keys.windows(2) {
            assert_eq!(tree.cmp.compare(&w[0], &w[1]), Ordering::Less);
        }
        for k in keys {
            if let Some(lo) = lo {
                assert_eq!(tree.cmp.compare(lo, k), Ordering::Less, "key left of its separator");
            }
            if let Some(hi) = hi {
                assert_ne!(tree.cmp.compare(k, hi), Ordering::Greater, "key right of its separator");
            }
        }
        match &tree.nodes[x] {
            Node::Leaf(leaf) => {
                assert_eq!(leaf.keys.len(), leaf.values.len());
                leaves.push(x);
                0
            }
            Node::Internal(node) => {
                assert_eq!(node.children.len(), node.keys.len() + 1);
                let mut depth = None;
                for (i, &child) in node.children.iter().enumerate() {
                    let lo = if i == 0 { lo } else { Some(&node.keys[i - 1]) };
                    let hi = node.keys.get(i).or(hi);
                    let d = check_node(tree, child, lo, hi, leaves);
                    assert_eq!(*depth.get_or_insert(d), d, "leaves at different depths");
                }
                depth.unwrap_or(0) + 1
            }
        }
    }

    fn check<K: Clone, V, C: Comparator<K>>(tree: &BPlusTree<K, V, C>) {
        if tree.root.is_nil() {
            assert_eq!(tree.len, 0);
            assert_eq!(tree.nodes.live(), 0);
            return;
        }
        let mut leaves = Vec::new();
        check_node(tree, tree.root, None, None, &mut leaves);

        // The chain links exactly the leaves found by the walk, both ways.
        let mut prev = NodeId::NIL;
        let mut total = 0;
        for &leaf in &leaves {
            assert_eq!(tree.leaf(leaf).prev, prev);
            if !prev.is_nil() {
                assert_eq!(tree.leaf(prev).next, leaf);
            }
            total += tree.leaf(leaf).keys.len();
            prev = leaf;
        }
        assert!(tree.leaf(prev).next.is_nil());
        assert_eq!(total, tree.len);
    }

    #[test]
    fn chain_survives_splits_and_merges() {
        let mut rng = StdRng::seed_from_u64(0x5EED_2026);
        for order in 3..=8 {
            let mut tree = BPlusTree::with_order(order).expect("valid order");
            let mut keys: Vec<u32> = (0..500).collect();
            keys.shuffle(&mut rng);
            for &k in &keys {
                tree.insert(k, k * 2);
                check(&tree);
            }
            keys.shuffle(&mut rng);
            for &k in &keys {
                assert_eq!(tree.remove(&k), Some(k * 2));
                check(&tree);
            }
            assert!(tree.root.is_nil());
            assert_eq!(tree.nodes.live(), 0);
        }
    }

    #[test]
    fn mixed_operations_keep_structure() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut tree = BPlusTree::with_order(5).expect("valid order");
        for _ in 0..8000 {
            let key = rng.random_range(0..400_u64);
            if rng.random_bool(0.55) {
                tree.insert(key, key);
            } else {
                tree.remove(&key);
            }
            check(&tree);
        }
    }

    #[test]
    fn cursor_steps_stay_on_the_chain() {
        let mut tree = BPlusTree::with_order(3).expect("valid order");
        for k in 0..100_u32 {
            tree.insert(k, ());
        }
        let mut cur = tree.leftmost();
        let mut seen = Vec::new();
        while let Some(c) = cur {
            seen.push(*c.key());
            cur = c.next();
        }
        assert_eq!(seen, (0..100).collect::<Vec<_>>());

        let back: Vec<u32> = tree.iter().rev().map(|(k, _)| *k).collect();
        assert_eq!(back, (0..100).rev().collect::<Vec<_>>());
    }

    #[test]
    fn reverse_comparator_flips_separators() {
        let mut tree = BPlusTree::with_order_and_comparator(4, Reverse).expect("valid order");
        for k in 0..50_i32 {
            tree.insert(k, k);
        }
        check(&tree);
        assert_eq!(tree.leftmost().map(|c| *c.key()), Some(49));
        assert_eq!(tree.next(&10).map(|c| *c.key()), Some(9));
        assert_eq!(tree.prev(&10).map(|c| *c.key()), Some(11));
    }
}
