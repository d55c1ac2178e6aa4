//! Ordered, unique-key containers sharing one contract.
//!
//! Every variant keeps its keys sorted under the same [`Comparator`], treats
//! `insert` as an upsert, and hands out cursors that can step to the
//! in-order neighbour of any key, present or not. The variants differ only
//! in how they stay balanced:
//!
//! - [`AvlTree`]: height-balanced rotations.
//! - [`RbTree`]: red-black color fixups.
//! - [`BTree`]: multiway split / merge / borrow, values in every node.
//! - [`BPlusTree`]: values in linked leaves only.
//! - [`SkipList`]: randomized express lanes.

macro_rules! impl_collection_traits {
    ($name:ident, [$($bound:tt)*]) => {
        impl<K: Ord + $($bound)*, V> Default for $name<K, V, $crate::compare::Natural> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<K: $($bound)*, V, C: $crate::compare::Comparator<K>> Extend<(K, V)> for $name<K, V, C> {
            fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
                for (key, value) in iter {
                    $crate::OrderedIndex::insert(self, key, value);
                }
            }
        }

        impl<K: Ord + $($bound)*, V> FromIterator<(K, V)> for $name<K, V, $crate::compare::Natural> {
            fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
                let mut index = Self::new();
                index.extend(iter);
                index
            }
        }

        impl<K, V, C> std::fmt::Debug for $name<K, V, C>
        where
            K: std::fmt::Debug + $($bound)*,
            V: std::fmt::Debug,
            C: $crate::compare::Comparator<K>,
        {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_map()
                    .entries($crate::OrderedIndex::iter(self))
                    .finish()
            }
        }
    };
}

mod arena;
pub mod compare;
mod cursor;
pub mod error;
pub mod heap;
pub mod impls;

use std::fmt;

pub use arena::NodeId;
pub use compare::{Comparator, Natural, Reverse};
pub use cursor::{Cursor, CursorMut, Iter};
pub use error::{Error, Result};
pub use heap::TreeHeap;
pub use impls::{AvlTree, BPlusTree, BTree, DEFAULT_ORDER, MAX_LEVEL, MIN_ORDER, RbTree, SkipList, Slot};

/// Ordered index interface.
///
/// - Keys are unique.
/// - `insert` overwrites the existing value and returns the old one.
/// - `prev` / `next` take a key that need not be present and return the
///   strict in-order neighbour.
///
/// Implementors provide the positional primitives (`locate*`, `step_*`,
/// `*_at`); the cursor façade is built on top of them.
pub trait OrderedIndex {
    type Key;
    type Value;
    /// Location of one entry inside the container's node layout.
    type Pos: Copy + Eq + fmt::Debug;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    fn clear(&mut self);

    fn insert(&mut self, key: Self::Key, value: Self::Value) -> Option<Self::Value>;

    fn remove_entry(&mut self, key: &Self::Key) -> Option<(Self::Key, Self::Value)>;

    fn remove(&mut self, key: &Self::Key) -> Option<Self::Value> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    fn locate(&self, key: &Self::Key) -> Option<Self::Pos>;

    fn locate_first(&self) -> Option<Self::Pos>;

    fn locate_last(&self) -> Option<Self::Pos>;

    /// Largest entry whose key is strictly less than `key`.
    fn locate_prev(&self, key: &Self::Key) -> Option<Self::Pos>;

    /// Smallest entry whose key is strictly greater than `key`.
    fn locate_next(&self, key: &Self::Key) -> Option<Self::Pos>;

    fn step_next(&self, pos: Self::Pos) -> Option<Self::Pos> {
        self.locate_next(self.key_at(pos))
    }

    fn step_prev(&self, pos: Self::Pos) -> Option<Self::Pos> {
        self.locate_prev(self.key_at(pos))
    }

    fn key_at(&self, pos: Self::Pos) -> &Self::Key;

    fn value_at(&self, pos: Self::Pos) -> &Self::Value;

    fn value_at_mut(&mut self, pos: Self::Pos) -> &mut Self::Value;

    fn get(&self, key: &Self::Key) -> Option<&Self::Value> {
        let pos = self.locate(key)?;
        Some(self.value_at(pos))
    }

    fn get_mut(&mut self, key: &Self::Key) -> Option<&mut Self::Value> {
        let pos = self.locate(key)?;
        Some(self.value_at_mut(pos))
    }

    fn contains_key(&self, key: &Self::Key) -> bool {
        self.locate(key).is_some()
    }

    fn find(&self, key: &Self::Key) -> Option<Cursor<'_, Self>>
    where
        Self: Sized,
    {
        let pos = self.locate(key)?;
        Some(Cursor::new(self, pos))
    }

    /// Cursor on the minimum.
    fn leftmost(&self) -> Option<Cursor<'_, Self>>
    where
        Self: Sized,
    {
        let pos = self.locate_first()?;
        Some(Cursor::new(self, pos))
    }

    /// Cursor on the maximum.
    fn rightmost(&self) -> Option<Cursor<'_, Self>>
    where
        Self: Sized,
    {
        let pos = self.locate_last()?;
        Some(Cursor::new(self, pos))
    }

    fn prev(&self, key: &Self::Key) -> Option<Cursor<'_, Self>>
    where
        Self: Sized,
    {
        let pos = self.locate_prev(key)?;
        Some(Cursor::new(self, pos))
    }

    fn next(&self, key: &Self::Key) -> Option<Cursor<'_, Self>>
    where
        Self: Sized,
    {
        let pos = self.locate_next(key)?;
        Some(Cursor::new(self, pos))
    }

    fn find_mut(&mut self, key: &Self::Key) -> Option<CursorMut<'_, Self>>
    where
        Self: Sized,
    {
        let pos = self.locate(key)?;
        Some(CursorMut::new(self, pos))
    }

    fn leftmost_mut(&mut self) -> Option<CursorMut<'_, Self>>
    where
        Self: Sized,
    {
        let pos = self.locate_first()?;
        Some(CursorMut::new(self, pos))
    }

    fn rightmost_mut(&mut self) -> Option<CursorMut<'_, Self>>
    where
        Self: Sized,
    {
        let pos = self.locate_last()?;
        Some(CursorMut::new(self, pos))
    }

    fn iter(&self) -> Iter<'_, Self>
    where
        Self: Sized,
    {
        Iter::new(self)
    }
}
