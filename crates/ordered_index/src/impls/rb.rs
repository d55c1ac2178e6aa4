use std::cmp::Ordering;

use crate::OrderedIndex;
use crate::arena::{Arena, NodeId};
use crate::compare::{Comparator, Natural};

/// Node color with black weights 0, 1 and 2.
///
/// `DoubleBlack` only exists while a removal is being repaired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
    DoubleBlack,
}

impl Color {
    fn weight(self) -> u8 {
        match self {
            Color::Red => 0,
            Color::Black => 1,
            Color::DoubleBlack => 2,
        }
    }

    fn from_weight(weight: u8) -> Self {
        match weight {
            0 => Color::Red,
            1 => Color::Black,
            _ => Color::DoubleBlack,
        }
    }

    /// Adds the black weight of `other`.
    fn absorb(self, other: Color) -> Self {
        Self::from_weight(self.weight() + other.weight())
    }

    fn lighten(self) -> Self {
        Self::from_weight(self.weight().saturating_sub(1))
    }
}

/// Red-black tree.
///
/// Repairs are done on the way back up the recursion: red-red conflicts after
/// insertion, double-black nodes after removal.
pub struct RbTree<K, V, C = Natural> {
    nodes: Arena<Node<K, V>>,
    root: NodeId,
    len: usize,
    /// Color of the empty id. Black except while a removal is repaired.
    nil_color: Color,
    cmp: C,
}

struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    left: NodeId,
    right: NodeId,
}

impl<K: Ord, V> RbTree<K, V> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<K, V, C: Comparator<K>> RbTree<K, V, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            nodes: Arena::new(),
            root: NodeId::NIL,
            len: 0,
            nil_color: Color::Black,
            cmp,
        }
    }

    fn color(&self, x: NodeId) -> Color {
        if x.is_nil() { self.nil_color } else { self.nodes[x].color }
    }

    fn set_color(&mut self, x: NodeId, color: Color) {
        if x.is_nil() {
            self.nil_color = color;
        } else {
            self.nodes[x].color = color;
        }
    }

    fn left(&self, x: NodeId) -> NodeId {
        self.nodes[x].left
    }

    fn right(&self, x: NodeId) -> NodeId {
        self.nodes[x].right
    }

    fn has_red_child(&self, x: NodeId) -> bool {
        !x.is_nil()
            && (self.color(self.left(x)) == Color::Red || self.color(self.right(x)) == Color::Red)
    }

    fn rotate_left(&mut self, root: NodeId) -> NodeId {
        let pivot = self.nodes[root].right;
        self.nodes[root].right = self.nodes[pivot].left;
        self.nodes[pivot].left = root;
        pivot
    }

    fn rotate_right(&mut self, root: NodeId) -> NodeId {
        let pivot = self.nodes[root].left;
        self.nodes[root].left = self.nodes[pivot].right;
        self.nodes[pivot].right = root;
        pivot
    }

    /// Resolves a red child with a red grandchild below `root`.
    fn insert_maintain(&mut self, root: NodeId) -> NodeId {
        let (l, r) = (self.left(root), self.right(root));
        let (cl, cr) = (self.color(l), self.color(r));
        if cl != Color::Red && cr != Color::Red {
            return root;
        }
        if cl == Color::Red && cr == Color::Red {
            // Push the redness up; the parent resolves any new conflict.
            if self.has_red_child(l) || self.has_red_child(r) {
                self.set_color(root, Color::Red);
                self.set_color(l, Color::Black);
                self.set_color(r, Color::Black);
            }
            return root;
        }
        if cl == Color::Red && self.has_red_child(l) {
            if self.color(self.right(l)) == Color::Red {
                self.nodes[root].left = self.rotate_left(l);
            }
            let root = self.rotate_right(root);
            let demoted = self.left(root);
            self.set_color(demoted, Color::Black);
            return root;
        }
        if cr == Color::Red && self.has_red_child(r) {
            if self.color(self.left(r)) == Color::Red {
                self.nodes[root].right = self.rotate_right(r);
            }
            let root = self.rotate_left(root);
            let demoted = self.right(root);
            self.set_color(demoted, Color::Black);
            return root;
        }
        root
    }

    /// Resolves a double-black child of `root`.
    fn remove_maintain(&mut self, root: NodeId) -> NodeId {
        let (l, r) = (self.left(root), self.right(root));
        let db_left = self.color(l) == Color::DoubleBlack;
        if !db_left && self.color(r) != Color::DoubleBlack {
            return root;
        }
        let (db, sibling) = if db_left { (l, r) } else { (r, l) };

        // Black sibling with black children: move one unit of black up.
        if self.color(sibling) != Color::Red && !self.has_red_child(sibling) {
            let lighter = self.color(db).lighten();
            self.set_color(db, lighter);
            self.set_color(sibling, Color::Red);
            let darker = self.color(root).absorb(Color::Black);
            self.set_color(root, darker);
            return root;
        }

        // Red sibling: rotate it up, then repair the demoted root.
        if self.color(sibling) == Color::Red {
            return if db_left {
                let top = self.rotate_left(root);
                self.set_color(top, Color::Black);
                self.set_color(root, Color::Red);
                self.nodes[top].left = self.remove_maintain(root);
                top
            } else {
                let top = self.rotate_right(root);
                self.set_color(top, Color::Black);
                self.set_color(root, Color::Red);
                self.nodes[top].right = self.remove_maintain(root);
                top
            };
        }

        // Black sibling with a red child.
        self.set_color(db, Color::Black);
        let root_color = self.color(root);
        let top = if db_left {
            if self.color(self.right(sibling)) != Color::Red {
                self.nodes[root].right = self.rotate_right(sibling);
            }
            self.rotate_left(root)
        } else {
            if self.color(self.left(sibling)) != Color::Red {
                self.nodes[root].left = self.rotate_left(sibling);
            }
            self.rotate_right(root)
        };
        self.set_color(top, root_color);
        let (tl, tr) = (self.left(top), self.right(top));
        self.set_color(tl, Color::Black);
        self.set_color(tr, Color::Black);
        top
    }

    fn insert_at(&mut self, root: NodeId, key: K, value: V) -> (NodeId, Option<V>) {
        if root.is_nil() {
            self.len += 1;
            let node = Node {
                key,
                value,
                color: Color::Red,
                left: NodeId::NIL,
                right: NodeId::NIL,
            };
            return (self.nodes.alloc(node), None);
        }
        let old = match self.cmp.compare(&key, &self.nodes[root].key) {
            Ordering::Equal => {
                return (root, Some(std::mem::replace(&mut self.nodes[root].value, value)));
            }
            Ordering::Less => {
                let (left, old) = self.insert_at(self.left(root), key, value);
                self.nodes[root].left = left;
                old
            }
            Ordering::Greater => {
                let (right, old) = self.insert_at(self.right(root), key, value);
                self.nodes[root].right = right;
                old
            }
        };
        if old.is_some() {
            return (root, old);
        }
        (self.insert_maintain(root), None)
    }

    /// Unlinks `root`, which has at most one child, and returns that child
    /// carrying the removed black weight.
    fn splice(&mut self, root: NodeId) -> (NodeId, (K, V)) {
        let (l, r) = (self.left(root), self.right(root));
        let child = if l.is_nil() { r } else { l };
        let node = self.nodes.release(root);
        self.len -= 1;
        let color = self.color(child).absorb(node.color);
        self.set_color(child, color);
        (child, (node.key, node.value))
    }

    fn remove_at(&mut self, root: NodeId, key: &K) -> (NodeId, Option<(K, V)>) {
        if root.is_nil() {
            return (NodeId::NIL, None);
        }
        let removed = match self.cmp.compare(key, &self.nodes[root].key) {
            Ordering::Less => {
                let (left, removed) = self.remove_at(self.left(root), key);
                self.nodes[root].left = left;
                removed
            }
            Ordering::Greater => {
                let (right, removed) = self.remove_at(self.right(root), key);
                self.nodes[root].right = right;
                removed
            }
            Ordering::Equal => {
                let l = self.left(root);
                if l.is_nil() || self.right(root).is_nil() {
                    let (child, entry) = self.splice(root);
                    return (child, Some(entry));
                }
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
        (self.remove_maintain(root), removed)
    }

    fn remove_max(&mut self, root: NodeId) -> (NodeId, (K, V)) {
        let right = self.right(root);
        if right.is_nil() {
            return self.splice(root);
        }
        let (right, entry) = self.remove_max(right);
        self.nodes[root].right = right;
        (self.remove_maintain(root), entry)
    }

    fn settle_root(&mut self) {
        let root = self.root;
        if !root.is_nil() {
            self.nodes[root].color = Color::Black;
        }
        self.nil_color = Color::Black;
    }

    fn extreme(&self, go_right: bool) -> Option<NodeId> {
        let mut cur = self.root.to_option()?;
        loop {
            let next = if go_right { self.right(cur) } else { self.left(cur) };
            if next.is_nil() {
                return Some(cur);
            }
            cur = next;
        }
    }
}

impl<K, V, C: Comparator<K>> OrderedIndex for RbTree<K, V, C> {
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
        self.nil_color = Color::Black;
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (root, old) = self.insert_at(self.root, key, value);
        self.root = root;
        self.settle_root();
        old
    }

    fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let (root, removed) = self.remove_at(self.root, key);
        self.root = root;
        self.settle_root();
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
        let mut cur = self.root;
        let mut candidate = None;
        while !cur.is_nil() {
            let node = &self.nodes[cur];
            if self.cmp.compare(&node.key, key) == Ordering::Less {
                candidate = Some(cur);
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        candidate
    }

    fn locate_next(&self, key: &K) -> Option<NodeId> {
        let mut cur = self.root;
        let mut candidate = None;
        while !cur.is_nil() {
            let node = &self.nodes[cur];
            if self.cmp.compare(&node.key, key) == Ordering::Greater {
                candidate = Some(cur);
                cur = node.left;
            } else {
                cur = node.right;
            }
        }
        candidate
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

impl_collection_traits!(RbTree, []);
