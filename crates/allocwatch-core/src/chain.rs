//! Ordered double-ended sequence with positional access and bound cursors.
//!
//! A [`Chain`] backs both the allocation registry (a chain of infos) and every
//! per-allocation trace log (a chain of traces). Values are pushed at the back
//! and popped from the front, so a chain drained with [`Chain::pop`] yields
//! values in insertion order.
//!
//! A [`ChainCursor`] walks a chain from either end. The cursor sits *between*
//! elements: `next` yields the element after it and moves forward, `prev`
//! yields the element before it and moves backward. Because the cursor borrows
//! the chain, the chain cannot be structurally mutated while a cursor exists.

use std::collections::VecDeque;

/// End of a chain a cursor is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainBound {
    /// Before the first element.
    Begin,
    /// After the last element.
    End,
}

/// Ordered, double-ended, indexable sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain<T> {
    items: VecDeque<T>,
}

impl<T> Chain<T> {
    /// Create an empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append `value` at the back.
    pub fn push(&mut self, value: T) {
        self.items.push_back(value);
    }

    /// Remove and return the front value, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    /// Value at `index`, counted from the front.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of values currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Remove every value.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Destroy the chain structure.
    ///
    /// Callers drain the chain first when the values need individual teardown;
    /// anything still held is dropped here.
    pub fn delete(self) {
        debug_assert!(
            self.items.is_empty(),
            "chain deleted with {} values still held",
            self.items.len()
        );
    }

    /// Cursor over this chain positioned at `bound`.
    #[must_use]
    pub fn cursor(&self, bound: ChainBound) -> ChainCursor<'_, T> {
        let mut cursor = ChainCursor {
            chain: self,
            position: 0,
        };
        cursor.rewind(bound);
        cursor
    }

    /// Front-to-back iterator.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for Chain<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a Chain<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Bidirectional cursor over a [`Chain`].
#[derive(Debug, Clone)]
pub struct ChainCursor<'a, T> {
    chain: &'a Chain<T>,
    /// Gap index in `0..=len`; the cursor sits before `items[position]`.
    position: usize,
}

impl<'a, T> ChainCursor<'a, T> {
    /// Reset the cursor to `bound`.
    pub fn rewind(&mut self, bound: ChainBound) {
        self.position = match bound {
            ChainBound::Begin => 0,
            ChainBound::End => self.chain.len(),
        };
    }

    /// Yield the element after the cursor and move forward.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&'a T> {
        let value = self.chain.get(self.position)?;
        self.position += 1;
        Some(value)
    }

    /// Yield the element before the cursor and move backward.
    pub fn prev(&mut self) -> Option<&'a T> {
        let index = self.position.checked_sub(1)?;
        let value = self.chain.get(index)?;
        self.position = index;
        Some(value)
    }

    /// Current gap index.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chain_is_empty() {
        let chain: Chain<u32> = Chain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
        assert_eq!(chain.front(), None);
        assert_eq!(chain.back(), None);
    }

    #[test]
    fn push_then_pop_is_fifo() {
        let mut chain = Chain::new();
        chain.push(1);
        chain.push(2);
        chain.push(3);
        assert_eq!(chain.front(), Some(&1));
        assert_eq!(chain.back(), Some(&3));
        assert_eq!(chain.pop(), Some(1));
        assert_eq!(chain.pop(), Some(2));
        assert_eq!(chain.pop(), Some(3));
        assert_eq!(chain.pop(), None);
        assert!(chain.is_empty());
    }

    #[test]
    fn size_tracks_pushes_minus_successful_pops() {
        let mut chain = Chain::new();
        let mut expected = 0_usize;
        for step in 0..200_u32 {
            if step % 3 == 2 {
                if chain.pop().is_some() {
                    expected -= 1;
                }
            } else {
                chain.push(step);
                expected += 1;
            }
            assert_eq!(chain.len(), expected);
            assert_eq!(chain.is_empty(), expected == 0);
        }
    }

    #[test]
    fn positional_access_counts_from_front() {
        let chain: Chain<char> = "abc".chars().collect();
        assert_eq!(chain.get(0), Some(&'a'));
        assert_eq!(chain.get(2), Some(&'c'));
        assert_eq!(chain.get(3), None);
    }

    #[test]
    fn clear_removes_everything() {
        let mut chain: Chain<u8> = (0..10).collect();
        chain.clear();
        assert!(chain.is_empty());
        chain.delete();
    }

    #[test]
    fn begin_cursor_walks_forward_in_push_order() {
        let chain: Chain<u32> = (1..=5).collect();
        let mut cursor = chain.cursor(ChainBound::Begin);
        let mut seen = Vec::new();
        while let Some(v) = cursor.next() {
            seen.push(*v);
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn end_cursor_walks_backward_in_reverse_order() {
        let chain: Chain<u32> = (1..=5).collect();
        let mut cursor = chain.cursor(ChainBound::End);
        assert_eq!(cursor.next(), None);
        let mut seen = Vec::new();
        while let Some(v) = cursor.prev() {
            seen.push(*v);
        }
        assert_eq!(seen, vec![5, 4, 3, 2, 1]);
        assert_eq!(cursor.prev(), None);
    }

    #[test]
    fn cursor_changes_direction_between_elements() {
        let chain: Chain<u32> = (1..=3).collect();
        let mut cursor = chain.cursor(ChainBound::Begin);
        assert_eq!(cursor.next(), Some(&1));
        assert_eq!(cursor.next(), Some(&2));
        assert_eq!(cursor.prev(), Some(&2));
        assert_eq!(cursor.prev(), Some(&1));
        assert_eq!(cursor.prev(), None);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn rewind_resets_to_either_bound() {
        let chain: Chain<u32> = (1..=3).collect();
        let mut cursor = chain.cursor(ChainBound::Begin);
        while cursor.next().is_some() {}
        cursor.rewind(ChainBound::Begin);
        assert_eq!(cursor.next(), Some(&1));
        cursor.rewind(ChainBound::End);
        assert_eq!(cursor.prev(), Some(&3));
    }

    #[test]
    fn cursor_on_empty_chain_yields_nothing() {
        let chain: Chain<u32> = Chain::new();
        let mut cursor = chain.cursor(ChainBound::Begin);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.prev(), None);
    }
}
