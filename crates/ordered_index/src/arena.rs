use std::ops::{Index, IndexMut};

/// Handle to a node stored in a container's arena.
///
/// `NodeId::NIL` is the empty sentinel: it stands for every absent child,
/// link or position and never refers to a stored node.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) const NIL: Self = Self(u32::MAX);

    #[inline(always)]
    pub(crate) fn is_nil(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline(always)]
    fn idx(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub(crate) fn to_option(self) -> Option<Self> {
        if self.is_nil() { None } else { Some(self) }
    }
}

#[inline(always)]
fn id(v: usize) -> NodeId {
    debug_assert!(v < u32::MAX as usize);
    NodeId(v as u32)
}

/// Index-addressed node pool with slot reuse.
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<NodeId>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn alloc(&mut self, node: T) -> NodeId {
        if let Some(x) = self.free.pop() {
            debug_assert!(self.slots[x.idx()].is_none());
            self.slots[x.idx()] = Some(node);
            return x;
        }
        let x = id(self.slots.len());
        self.slots.push(Some(node));
        x
    }

    /// Removes the node from the pool and hands it back by value.
    pub(crate) fn release(&mut self, x: NodeId) -> T {
        debug_assert!(!x.is_nil());
        let node = self.slots[x.idx()]
            .take()
            .expect("released a vacant arena slot");
        self.free.push(x);
        node
    }

    /// Drops every node at once.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    /// Number of live nodes.
    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = T;

    #[inline(always)]
    fn index(&self, x: NodeId) -> &T {
        debug_assert!(!x.is_nil());
        match &self.slots[x.idx()] {
            Some(node) => node,
            None => panic!("access to vacant arena slot {}", x.0),
        }
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    #[inline(always)]
    fn index_mut(&mut self, x: NodeId) -> &mut T {
        debug_assert!(!x.is_nil());
        match &mut self.slots[x.idx()] {
            Some(node) => node,
            None => panic!("access to vacant arena slot {}", x.0),
        }
    }
}
