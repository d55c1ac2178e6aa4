use crate::OrderedIndex;

/// Min-heap over any ordered index.
///
/// Priorities are the index keys, so pushing a priority that is already
/// queued merges with it instead of queueing a second copy.
///
/// ```
/// use ordered_index::{RbTree, TreeHeap};
///
/// let mut heap = TreeHeap::new(RbTree::<i32, ()>::new());
/// for p in [5, 1, 4, 1] {
///     heap.push(p);
/// }
/// assert_eq!(heap.len(), 3);
/// assert_eq!(heap.pop(), Some(1));
/// assert_eq!(heap.peek(), Some(&4));
/// ```
pub struct TreeHeap<T> {
    index: T,
}

impl<T: OrderedIndex<Value = ()>> TreeHeap<T> {
    /// Wraps `index`; entries already in it are queued.
    pub fn new(index: T) -> Self {
        Self { index }
    }

    /// Queues `key`. Returns `false` when it was already queued.
    pub fn push(&mut self, key: T::Key) -> bool {
        self.index.insert(key, ()).is_none()
    }

    pub fn peek(&self) -> Option<&T::Key> {
        let pos = self.index.locate_first()?;
        Some(self.index.key_at(pos))
    }

    pub fn pop(&mut self) -> Option<T::Key>
    where
        T::Key: Clone,
    {
        let key = self.peek()?.clone();
        self.index.remove_entry(&key).map(|(key, ())| key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }

    pub fn into_inner(self) -> T {
        self.index
    }
}

impl<T: OrderedIndex<Value = ()> + Default> Default for TreeHeap<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: OrderedIndex<Value = ()>> Extend<T::Key> for TreeHeap<T> {
    fn extend<I: IntoIterator<Item = T::Key>>(&mut self, iter: I) {
        for key in iter {
            self.push(key);
        }
    }
}
