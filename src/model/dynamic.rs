use crate::error::IndexOutOfRange;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

pub const INITIAL_CAPACITY: usize = 10;

/// An ordered, growable sequence that doubles its reserved capacity when full and never shrinks.
///
/// Elements stay in insertion order until [`DynamicSequence::sort`] or
/// [`DynamicSequence::sort_by`] is called. Removing an element drops it immediately, so no
/// vacated slot keeps a stale value alive.
///
/// Iteration borrows the sequence, so structural mutation while an iteration is in progress is
/// rejected at compile time rather than being left undefined.
#[derive(Debug, Clone)]
pub struct DynamicSequence<T> {
    elements: Vec<T>,
    capacity: usize,
}

impl<T> DynamicSequence<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::with_capacity(INITIAL_CAPACITY),
            capacity: INITIAL_CAPACITY,
        }
    }

    /// Appends `value` at the end, same as `insert(len, value)`.
    pub fn append(&mut self, value: T) {
        self.grow_if_full();
        self.elements.push(value);
    }

    /// Inserts `value` at `index`, shifting `[index, len)` one slot to the right.
    pub fn insert(&mut self, index: usize, value: T) -> Result<(), IndexOutOfRange> {
        if index > self.elements.len() {
            return Err(self.out_of_range(index));
        }

        self.grow_if_full();
        self.elements.insert(index, value);

        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&T, IndexOutOfRange> {
        self.elements.get(index).ok_or(self.out_of_range(index))
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut T, IndexOutOfRange> {
        let err = self.out_of_range(index);
        self.elements.get_mut(index).ok_or(err)
    }

    /// Replaces the element at `index` and returns the old one.
    ///
    /// Accepts exactly the indices `get` accepts (`[0, len)`). Writing one past the end is not a
    /// way to append.
    pub fn set(&mut self, index: usize, value: T) -> Result<T, IndexOutOfRange> {
        let slot = self.get_mut(index)?;
        Ok(std::mem::replace(slot, value))
    }

    /// Removes and returns the element at `index`, shifting the tail left.
    pub fn remove_at(&mut self, index: usize) -> Result<T, IndexOutOfRange> {
        if index >= self.elements.len() {
            return Err(self.out_of_range(index));
        }

        Ok(self.elements.remove(index))
    }

    /// Removes the first element matching `predicate`, if any.
    pub fn remove_first_where<F: FnMut(&T) -> bool>(&mut self, predicate: F) -> Option<T> {
        let index = self.elements.iter().position(predicate)?;
        Some(self.elements.remove(index))
    }

    /// Drops every element. The reserved capacity is kept.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Stable sort with a caller-supplied order; ties keep their insertion order.
    pub fn sort_by<F: FnMut(&T, &T) -> Ordering>(&mut self, compare: F) {
        self.elements.sort_by(compare);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The number of elements the sequence can hold before it doubles.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.elements.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    fn grow_if_full(&mut self) {
        if self.elements.len() == self.capacity {
            self.capacity *= 2;
            self.elements
                .reserve_exact(self.capacity - self.elements.len());
        }
    }

    fn out_of_range(&self, index: usize) -> IndexOutOfRange {
        IndexOutOfRange {
            index,
            len: self.elements.len(),
        }
    }
}

impl<T: PartialEq> DynamicSequence<T> {
    /// Removes the first element equal to `value`. Absent values leave the sequence untouched.
    pub fn remove_value(&mut self, value: &T) -> Option<T> {
        self.remove_first_where(|element| element == value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.elements.contains(value)
    }
}

impl<T: Ord> DynamicSequence<T> {
    /// Sorts ascending by the elements' natural order.
    pub fn sort(&mut self) {
        self.elements.sort();
    }
}

impl<T> Default for DynamicSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PartialEq for DynamicSequence<T> {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl<'a, T> IntoIterator for &'a DynamicSequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> FromIterator<T> for DynamicSequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut sequence = Self::new();
        for value in iter {
            sequence.append(value);
        }
        sequence
    }
}

impl<T: Serialize> Serialize for DynamicSequence<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.elements.iter())
    }
}
