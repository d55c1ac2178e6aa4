use std::cmp::Ordering;

use crate::OrderedIndex;
use crate::arena::{Arena, NodeId};
use crate::compare::{Comparator, Natural};

/// Height-balanced binary search tree.
///
/// Heights of sibling subtrees differ by at most one. The empty id has
/// height 0, so rebalancing never special-cases missing children.
pub struct AvlTree<K, V, C = Natural> {
    nodes: Arena<Node<K, V>>,
    root: NodeId,
    len: usize,
    cmp: C,
}

struct Node<K, V> {
    key: K,
    value: V,
    height: u8,
    left: NodeId,
    right: NodeId,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            height: 1,
            left: NodeId::NIL,
            right: NodeId::NIL,
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<K, V, C: Comparator<K>> AvlTree<K, V, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            nodes: Arena::new(),
            root: NodeId::NIL,
            len: 0,
            cmp,
        }
    }

    #[inline(always)]
    fn height(&self, x: NodeId) -> u8 {
        if x.is_nil() { 0 } else { self.nodes[x].height }
    }

    fn update_height(&mut self, x: NodeId) {
        let (l, r) = (self.nodes[x].left, self.nodes[x].right);
        self.nodes[x].height = 1 + self.height(l).max(self.height(r));
    }

    fn rotate_left(&mut self, root: NodeId) -> NodeId {
        let pivot = self.nodes[root].right;
        self.nodes[root].right = self.nodes[pivot].left;
        self.nodes[pivot].left = root;
        self.update_height(root);
        self.update_height(pivot);
        pivot
    }

    fn rotate_right(&mut self, root: NodeId) -> NodeId {
        let pivot = self.nodes[root].left;
        self.nodes[root].left = self.nodes[pivot].right;
        self.nodes[pivot].right = root;
        self.update_height(root);
        self.update_height(pivot);
        pivot
    }

    /// Restores the height bound at `root` and returns the subtree's new root.
    fn maintain(&mut self, root: NodeId) -> NodeId {
        let (l, r) = (self.nodes[root].left, self.nodes[root].right);
        let (hl, hr) = (self.height(l), self.height(r));
        if hl.abs_diff(hr) <= 1 {
            self.update_height(root);
            return root;
        }
        if hl > hr {
            // Zig-zag: lift the inner grandchild first.
            if self.height(self.nodes[l].left) < self.height(self.nodes[l].right) {
                self.nodes[root].left = self.rotate_left(l);
            }
            self.rotate_right(root)
        } else {
            if self.height(self.nodes[r].right) < self.height(self.nodes[r].left) {
                self.nodes[root].right = self.rotate_right(r);
            }
            self.rotate_left(root)
        }
    }

    fn insert_at(&mut self, root: NodeId, key: K, value: V) -> (NodeId, Option<V>) {
        if root.is_nil() {
            self.len += 1;
            return (self.nodes.alloc(Node::new(key, value)), None);
        }
        match self.cmp.compare(&key, &self.nodes[root].key) {
            Ordering::Equal => {
                let old = std::mem::replace(&mut self.nodes[root].value, value);
                return (root, Some(old));
            }
            Ordering::Less => {
                let (left, old) = self.insert_at(self.nodes[root].left, key, value);
                self.nodes[root].left = left;
                if old.is_some() {
                    return (root, old);
                }
            }
            Ordering::Greater => {
                let (right, old) = self.insert_at(self.nodes[root].right, key, value);
                self.nodes[root].right = right;
                if old.is_some() {
                    return (root, old);
                }
            }
        }
        (self.maintain(root), None)
    }

    fn remove_at(&mut self, root: NodeId, key: &K) -> (NodeId, Option<(K, V)>) {
        if root.is_nil() {
            return (NodeId::NIL, None);
        }
        let removed = match self.cmp.compare(key, &self.nodes[root].key) {
            Ordering::Less => {
                let (left, removed) = self.remove_at(self.nodes[root].left, key);
                self.nodes[root].left = left;
                removed
            }
            Ordering::Greater => {
                let (right, removed) = self.remove_at(self.nodes[root].right, key);
                self.nodes[root].right = right;
                removed
            }
            Ordering::Equal => {
                let (l, r) = (self.nodes[root].left, self.nodes[root].right);
                if l.is_nil() || r.is_nil() {
                    let child = if l.is_nil() { r } else { l };
                    let node = self.nodes.release(root);
                    self.len -= 1;
                    return (child, Some((node.key, node.value)));
                }
                // Two children: the in-order predecessor takes this slot.
                let (left, (pk, pv)) = self.remove_max(l);
                self.nodes[root].left = left;
                let node = &mut self.nodes[root];
                let key = std::mem::replace(&mut node.key, pk);
                let value = std::mem::replace(&mut node.value, pv);
                Some((key, value))
            }
        };
        if removed.is_none() {
            return (root, None);
        }
        (self.maintain(root), removed)
    }

    fn remove_max(&mut self, root: NodeId) -> (NodeId, (K, V)) {
        let right = self.nodes[root].right;
        if right.is_nil() {
            let node = self.nodes.release(root);
            self.len -= 1;
            return (node.left, (node.key, node.value));
        }
        let (right, entry) = self.remove_max(right);
        self.nodes[root].right = right;
        (self.maintain(root), entry)
    }

    fn extreme(&self, go_right: bool) -> Option<NodeId> {
        let mut cur = self.root.to_option()?;
        loop {
            let node = &self.nodes[cur];
            let next = if go_right { node.right } else { node.left };
            if next.is_nil() {
                return Some(cur);
            }
            cur = next;
        }
    }
}

impl<K, V, C: Comparator<K>> OrderedIndex for AvlTree<K, V, C> {
    type Key = K;
    type Value = V;
    type Pos = NodeId;

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = NodeId::NIL;
        self.len = 0;
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (root, old) = self.insert_at(self.root, key, value);
        self.root = root;
        old
    }

    fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let (root, removed) = self.remove_at(self.root, key);
        self.root = root;
        removed
    }

    fn locate(&self, key: &K) -> Option<NodeId> {
        let mut cur = self.root;
        while !cur.is_nil() {
            let node = &self.nodes[cur];
            match self.cmp.compare(key, &node.key) {
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
                Ordering::Equal => return Some(cur),
            }
        }
        None
    }

    fn locate_first(&self) -> Option<NodeId> {
        self.extreme(false)
    }

    fn locate_last(&self) -> Option<NodeId> {
        self.extreme(true)
    }

    fn locate_prev(&self, key: &K) -> Option<NodeId> {
        // Remember the last node where the search turned right.
        let mut cur = self.root;
        let mut candidate = NodeId::NIL;
        while !cur.is_nil() {
            let node = &self.nodes[cur];
            if self.cmp.compare(key, &node.key) == Ordering::Greater {
                candidate = cur;
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        candidate.to_option()
    }

    fn locate_next(&self, key: &K) -> Option<NodeId> {
        let mut cur = self.root;
        let mut candidate = NodeId::NIL;
        while !cur.is_nil() {
            let node = &self.nodes[cur];
            if self.cmp.compare(key, &node.key) == Ordering::Less {
                candidate = cur;
                cur = node.left;
            } else {
                cur = node.right;
            }
        }
        candidate.to_option()
    }

    fn key_at(&self, pos: NodeId) -> &K {
        &self.nodes[pos].key
    }

    fn value_at(&self, pos: NodeId) -> &V {
        &self.nodes[pos].value
    }

    fn value_at_mut(&mut self, pos: NodeId) -> &mut V {
        &mut self.nodes[pos].value
    }
}

impl_collection_traits!(AvlTree, []);
