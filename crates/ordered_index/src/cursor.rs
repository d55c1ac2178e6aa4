use std::fmt;
use std::iter::FusedIterator;

use crate::OrderedIndex;

/// Read-only handle on one entry.
///
/// The cursor borrows its container, so the container cannot change while
/// the cursor is alive. Stepping with [`Cursor::next`] / [`Cursor::prev`]
/// yields a new cursor on the in-order neighbour.
pub struct Cursor<'a, T: OrderedIndex> {
    index: &'a T,
    pos: T::Pos,
}

impl<'a, T: OrderedIndex> Cursor<'a, T> {
    pub(crate) fn new(index: &'a T, pos: T::Pos) -> Self {
        Self { index, pos }
    }

    pub fn key(&self) -> &'a T::Key {
        self.index.key_at(self.pos)
    }

    pub fn value(&self) -> &'a T::Value {
        self.index.value_at(self.pos)
    }

    pub fn entry(&self) -> (&'a T::Key, &'a T::Value) {
        (self.key(), self.value())
    }

    pub fn position(&self) -> T::Pos {
        self.pos
    }

    /// Cursor on the smallest key greater than this one.
    pub fn next(&self) -> Option<Self> {
        let pos = self.index.step_next(self.pos)?;
        Some(Self::new(self.index, pos))
    }

    /// Cursor on the largest key smaller than this one.
    pub fn prev(&self) -> Option<Self> {
        let pos = self.index.step_prev(self.pos)?;
        Some(Self::new(self.index, pos))
    }
}

impl<T: OrderedIndex> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: OrderedIndex> Copy for Cursor<'_, T> {}

impl<T> fmt::Debug for Cursor<'_, T>
where
    T: OrderedIndex,
    T::Key: fmt::Debug,
    T::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("key", self.key())
            .field("value", self.value())
            .finish()
    }
}

/// Handle on one entry that may rewrite the entry's value.
///
/// Holding the container exclusively keeps the position valid: only the
/// value under the cursor can change, never the node layout.
pub struct CursorMut<'a, T: OrderedIndex> {
    index: &'a mut T,
    pos: T::Pos,
}

impl<'a, T: OrderedIndex> CursorMut<'a, T> {
    pub(crate) fn new(index: &'a mut T, pos: T::Pos) -> Self {
        Self { index, pos }
    }

    pub fn key(&self) -> &T::Key {
        self.index.key_at(self.pos)
    }

    pub fn value(&self) -> &T::Value {
        self.index.value_at(self.pos)
    }

    pub fn value_mut(&mut self) -> &mut T::Value {
        self.index.value_at_mut(self.pos)
    }

    /// Replaces the value and returns the previous one.
    pub fn set_value(&mut self, value: T::Value) -> T::Value {
        std::mem::replace(self.value_mut(), value)
    }

    pub fn into_value_mut(self) -> &'a mut T::Value {
        let Self { index, pos } = self;
        index.value_at_mut(pos)
    }

    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor::new(&*self.index, self.pos)
    }

    pub fn next(self) -> Option<Self> {
        let pos = self.index.step_next(self.pos)?;
        Some(Self::new(self.index, pos))
    }

    pub fn prev(self) -> Option<Self> {
        let pos = self.index.step_prev(self.pos)?;
        Some(Self::new(self.index, pos))
    }
}

impl<T> fmt::Debug for CursorMut<'_, T>
where
    T: OrderedIndex,
    T::Key: fmt::Debug,
    T::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorMut")
            .field("key", self.key())
            .field("value", self.value())
            .finish()
    }
}

/// In-order iterator over `(&K, &V)`.
pub struct Iter<'a, T: OrderedIndex> {
    index: &'a T,
    front: Option<T::Pos>,
    back: Option<T::Pos>,
    remaining: usize,
}

impl<'a, T: OrderedIndex> Iter<'a, T> {
    pub(crate) fn new(index: &'a T) -> Self {
        Self {
            index,
            front: index.locate_first(),
            back: index.locate_last(),
            remaining: index.len(),
        }
    }
}

impl<'a, T: OrderedIndex> Iterator for Iter<'a, T> {
    type Item = (&'a T::Key, &'a T::Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.front?;
        self.remaining -= 1;
        self.front = if self.remaining == 0 {
            None
        } else {
            self.index.step_next(pos)
        };
        Some((self.index.key_at(pos), self.index.value_at(pos)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: OrderedIndex> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.back?;
        self.remaining -= 1;
        self.back = if self.remaining == 0 {
            None
        } else {
            self.index.step_prev(pos)
        };
        Some((self.index.key_at(pos), self.index.value_at(pos)))
    }
}

impl<T: OrderedIndex> ExactSizeIterator for Iter<'_, T> {}

impl<T: OrderedIndex> FusedIterator for Iter<'_, T> {}
