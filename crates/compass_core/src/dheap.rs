//! Keyed d-ary heap over node indices.
//!
//! Every element in `0..capacity` owns a key slot; the heap tracks which
//! elements are currently members and where they sit, so keys can be changed
//! and members deleted in place. The tour builders lean on this for lazy
//! priority-queue updates.

/// Heap arity. Three children per node trades a slightly deeper sift-up for
/// cheaper sift-downs, which dominate under delete-min heavy workloads.
const HEAP_D: usize = 3;

const NOT_IN_HEAP: usize = usize::MAX;

#[derive(Debug)]
pub struct DHeap {
    key: Vec<f64>,
    entry: Vec<usize>,
    loc: Vec<usize>,
}

impl DHeap {
    /// Creates an empty heap able to hold elements `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            key: vec![0.0; capacity],
            entry: Vec::with_capacity(capacity),
            loc: vec![NOT_IN_HEAP; capacity],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn contains(&self, element: usize) -> bool {
        self.loc[element] != NOT_IN_HEAP
    }

    pub fn key(&self, element: usize) -> f64 {
        self.key[element]
    }

    /// Inserts `element` using its current key slot. The element must not
    /// already be a member.
    pub fn insert(&mut self, element: usize, key: f64) {
        debug_assert!(!self.contains(element));
        self.key[element] = key;
        self.entry.push(element);
        self.loc[element] = self.entry.len() - 1;
        self.sift_up(self.entry.len() - 1);
    }

    /// Removes `element` from the heap, keeping its key slot intact.
    pub fn delete(&mut self, element: usize) {
        let hole = self.loc[element];
        debug_assert_ne!(hole, NOT_IN_HEAP);
        self.loc[element] = NOT_IN_HEAP;

        let Some(last) = self.entry.pop() else {
            return;
        };
        if last == element {
            return;
        }
        self.entry[hole] = last;
        self.loc[last] = hole;
        // The filler can come from a different subtree, so it may need to
        // move either direction.
        if hole > 0 && self.key[last] < self.key[self.entry[(hole - 1) / HEAP_D]] {
            self.sift_up(hole);
        } else {
            self.sift_down(hole);
        }
    }

    /// Removes and returns the element with the smallest key.
    pub fn delete_min(&mut self) -> Option<usize> {
        let min = *self.entry.first()?;
        self.delete(min);
        Some(min)
    }

    pub fn peek_min(&self) -> Option<usize> {
        self.entry.first().copied()
    }

    /// Lowers the key of a member element and restores heap order.
    pub fn decrease_key(&mut self, element: usize, key: f64) {
        debug_assert!(self.contains(element));
        debug_assert!(key <= self.key[element]);
        self.key[element] = key;
        self.sift_up(self.loc[element]);
    }

    fn sift_up(&mut self, mut pos: usize) {
        let element = self.entry[pos];
        while pos > 0 {
            let parent = (pos - 1) / HEAP_D;
            if self.key[self.entry[parent]] <= self.key[element] {
                break;
            }
            self.entry[pos] = self.entry[parent];
            self.loc[self.entry[pos]] = pos;
            pos = parent;
        }
        self.entry[pos] = element;
        self.loc[element] = pos;
    }

    fn sift_down(&mut self, mut pos: usize) {
        let element = self.entry[pos];
        loop {
            let first_child = pos * HEAP_D + 1;
            if first_child >= self.entry.len() {
                break;
            }
            let last_child = (first_child + HEAP_D).min(self.entry.len());
            let mut best = first_child;
            for child in first_child + 1..last_child {
                if self.key[self.entry[child]] < self.key[self.entry[best]] {
                    best = child;
                }
            }
            if self.key[element] <= self.key[self.entry[best]] {
                break;
            }
            self.entry[pos] = self.entry[best];
            self.loc[self.entry[pos]] = pos;
            pos = best;
        }
        self.entry[pos] = element;
        self.loc[element] = pos;
    }
}
