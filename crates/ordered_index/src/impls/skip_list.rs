use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::OrderedIndex;
use crate::arena::{Arena, NodeId};
use crate::compare::{Comparator, Natural};

/// Highest level a node can be promoted to.
pub const MAX_LEVEL: usize = 32;

/// Randomized skip list.
///
/// A node reaches level `l + 1` from level `l` with probability 1/4. The
/// header has one forward link per level currently in use; `NodeId::NIL` in
/// a predecessor slot stands for the header itself.
pub struct SkipList<K, V, C = Natural> {
    nodes: Arena<Node<K, V>>,
    head: Vec<NodeId>,
    tail: NodeId,
    len: usize,
    rng: StdRng,
    cmp: C,
}

struct Node<K, V> {
    key: K,
    value: V,
    forward: Vec<NodeId>,
}

impl<K: Ord, V> SkipList<K, V> {
    pub fn new() -> Self {
        Self::build(StdRng::from_os_rng(), Natural)
    }

    /// Skip list whose level draws are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::build(StdRng::seed_from_u64(seed), Natural)
    }
}

impl<K, V, C: Comparator<K>> SkipList<K, V, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self::build(StdRng::from_os_rng(), cmp)
    }

    pub fn with_seed_and_comparator(seed: u64, cmp: C) -> Self {
        Self::build(StdRng::seed_from_u64(seed), cmp)
    }

    fn build(rng: StdRng, cmp: C) -> Self {
        Self {
            nodes: Arena::new(),
            head: vec![NodeId::NIL],
            tail: NodeId::NIL,
            len: 0,
            rng,
            cmp,
        }
    }

    /// Number of levels the header currently links.
    pub fn levels(&self) -> usize {
        self.head.len()
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < MAX_LEVEL && self.rng.random_ratio(1, 4) {
            level += 1;
        }
        level
    }

    #[inline]
    fn forward(&self, at: NodeId, level: usize) -> NodeId {
        if at.is_nil() {
            self.head[level]
        } else {
            self.nodes[at].forward[level]
        }
    }

    #[inline]
    fn set_forward(&mut self, at: NodeId, level: usize, to: NodeId) {
        if at.is_nil() {
            self.head[level] = to;
        } else {
            self.nodes[at].forward[level] = to;
        }
    }

    /// Rightmost node with a key below `key`, per level.
    fn predecessors(&self, key: &K) -> [NodeId; MAX_LEVEL] {
        let mut update = [NodeId::NIL; MAX_LEVEL];
        let mut pre = NodeId::NIL;
        for level in (0..self.head.len()).rev() {
            pre = self.advance(pre, level, key);
            update[level] = pre;
        }
        update
    }

    /// Rightmost node with a key below `key`, or NIL for the header.
    fn pre_locate(&self, key: &K) -> NodeId {
        (0..self.head.len())
            .rev()
            .fold(NodeId::NIL, |pre, level| self.advance(pre, level, key))
    }

    fn advance(&self, mut pre: NodeId, level: usize, key: &K) -> NodeId {
        loop {
            let next = self.forward(pre, level);
            if next.is_nil() || self.cmp.compare(key, &self.nodes[next].key) != Ordering::Greater {
                return pre;
            }
            pre = next;
        }
    }

    fn is_key(&self, x: NodeId, key: &K) -> bool {
        !x.is_nil() && self.cmp.compare(&self.nodes[x].key, key) == Ordering::Equal
    }
}

impl<K, V, C: Comparator<K>> OrderedIndex for SkipList<K, V, C> {
    type Key = K;
    type Value = V;
    type Pos = NodeId;

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.head = vec![NodeId::NIL];
        self.tail = NodeId::NIL;
        self.len = 0;
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        let update = self.predecessors(&key);
        let found = self.forward(update[0], 0);
        if self.is_key(found, &key) {
            return Some(std::mem::replace(&mut self.nodes[found].value, value));
        }

        let level = self.random_level();
        if level > self.head.len() {
            tracing::trace!(from = self.head.len(), to = level, "skip list header grows");
            // New levels start at the header, which `update` already encodes.
            self.head.resize(level, NodeId::NIL);
        }
        let x = self.nodes.alloc(Node {
            key,
            value,
            forward: vec![NodeId::NIL; level],
        });
        for (l, &pre) in update.iter().enumerate().take(level) {
            let next = self.forward(pre, l);
            self.nodes[x].forward[l] = next;
            self.set_forward(pre, l, x);
        }
        if self.nodes[x].forward[0].is_nil() {
            self.tail = x;
        }
        self.len += 1;
        None
    }

    fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let update = self.predecessors(key);
        let target = self.forward(update[0], 0);
        if !self.is_key(target, key) {
            return None;
        }
        for (l, &pre) in update.iter().enumerate().take(self.nodes[target].forward.len()) {
            if self.forward(pre, l) == target {
                let next = self.nodes[target].forward[l];
                self.set_forward(pre, l, next);
            }
        }
        if self.tail == target {
            self.tail = update[0];
        }
        let node = self.nodes.release(target);
        self.len -= 1;

        let levels = self.head.len();
        while self.head.len() > 1 && self.head.last().is_some_and(|x| x.is_nil()) {
            self.head.pop();
        }
        if self.head.len() < levels {
            tracing::trace!(from = levels, to = self.head.len(), "skip list header shrinks");
        }
        Some((node.key, node.value))
    }

    fn locate(&self, key: &K) -> Option<NodeId> {
        let x = self.forward(self.pre_locate(key), 0);
        self.is_key(x, key).then_some(x)
    }

    fn locate_first(&self) -> Option<NodeId> {
        self.head[0].to_option()
    }

    fn locate_last(&self) -> Option<NodeId> {
        self.tail.to_option()
    }

    fn locate_prev(&self, key: &K) -> Option<NodeId> {
        self.pre_locate(key).to_option()
    }

    fn locate_next(&self, key: &K) -> Option<NodeId> {
        let x = self.forward(self.pre_locate(key), 0);
        if x.is_nil() {
            return None;
        }
        if self.cmp.compare(&self.nodes[x].key, key) == Ordering::Greater {
            return Some(x);
        }
        self.nodes[x].forward[0].to_option()
    }

    fn step_next(&self, pos: NodeId) -> Option<NodeId> {
        self.nodes[pos].forward[0].to_option()
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

impl_collection_traits!(SkipList, []);
