//! # Bounded Top-K Heap
//!
//! Fixed-capacity min-heap that keeps the `capacity` most relevant items
//! seen so far, with the least relevant at the root for cheap eviction.
//!
//! Relevance is defined by a comparator: `cmp(a, b) == Greater` means `a`
//! is more relevant than `b`. Similarity scores use natural order,
//! distances use reversed order.
//!
//! Selecting k of n costs O(n log k) instead of the O(n log n) of a full
//! sort.

use std::cmp::Ordering;

/// Min-heap bounded to `capacity` items
pub struct BoundedHeap<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    items: Vec<T>,
    capacity: usize,
    cmp: F,
}

impl<T, F> BoundedHeap<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    pub fn new(capacity: usize, cmp: F) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            cmp,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Least relevant retained item
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Offer a candidate. Below capacity it is always kept; once full it
    /// replaces the root only if strictly more relevant. Returns whether
    /// the candidate was kept.
    pub fn push(&mut self, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }

        if self.items.len() < self.capacity {
            self.items.push(item);
            self.sift_up(self.items.len() - 1);
            return true;
        }

        if (self.cmp)(&item, &self.items[0]) == Ordering::Greater {
            self.items[0] = item;
            self.sift_down(0);
            return true;
        }

        false
    }

    /// Remove and return the least relevant item
    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let item = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        item
    }

    /// Retained items, most relevant first
    pub fn into_sorted_vec(self) -> Vec<T> {
        let Self { mut items, cmp, .. } = self;
        items.sort_unstable_by(|a, b| cmp(b, a));
        items
    }

    #[inline]
    fn less(&self, i: usize, j: usize) -> bool {
        (self.cmp)(&self.items[i], &self.items[j]) == Ordering::Less
    }

    fn sift_up(&mut self, mut child: usize) {
        while child > 0 {
            let parent = (child - 1) / 2;
            if !self.less(child, parent) {
                break;
            }
            self.items.swap(child, parent);
            child = parent;
        }
    }

    fn sift_down(&mut self, mut parent: usize) {
        let n = self.items.len();
        loop {
            let left = 2 * parent + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let smallest = if right < n && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(smallest, parent) {
                break;
            }
            self.items.swap(parent, smallest);
            parent = smallest;
        }
    }
}
