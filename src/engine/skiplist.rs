//! LessDB - SkipList
//! Probabilistic ordered set with one writer and lock-free readers.
//!
//! Based on William Pugh, "Skip Lists: A Probabilistic Alternative to
//! Balanced Trees".
//!
//! ## Concurrency Model
//! - [`SkipList`] is the only handle that can insert, and insertion takes
//!   `&mut self`, so at most one insert runs at a time.
//! - [`SkipListReader`] handles are cheap clones that can be sent to other
//!   threads and read while the writer inserts, without locks.
//! - Every forward slot is published with a `Release` store and read with
//!   an `Acquire` load, so a reader that sees a new node also sees its key
//!   and its own forward slots.
//! - Nodes are never unlinked. They are freed together when the last
//!   handle is dropped, so any node a reader reaches stays valid for as
//!   long as it holds the handle.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{self, AtomicPtr, AtomicUsize};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Maximum tower height of any node.
pub const MAX_HEIGHT: usize = 12;

/// A node grows one more level with probability `1 / BRANCHING`.
const BRANCHING: u32 = 4;

/// Three-way ordering used by the list. Keys that compare `Equal` are
/// treated as the same element.
pub trait KeyComparator<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their `Ord` implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<K: Ord> KeyComparator<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Forward slots of a node (or of the head), one per level.
type Links<K> = [AtomicPtr<Node<K>>];

struct Node<K> {
    key: K,
    next: Box<Links<K>>,
}

fn new_links<K>(height: usize) -> Box<Links<K>> {
    (0..height).map(|_| AtomicPtr::new(ptr::null_mut())).collect()
}

/// Acquire-load the successor at `level`.
fn load_next<K>(links: &Links<K>, level: usize) -> Option<&Node<K>> {
    // SAFETY: linked nodes are only freed when the list itself drops, and
    // the `links` borrow keeps the list alive.
    unsafe { links[level].load(atomic::Ordering::Acquire).as_ref() }
}

struct Inner<K, C> {
    head: Box<Links<K>>,
    /// Number of levels in use. Only grows, and may be read stale: levels
    /// a reader has not seen yet hold nothing it would miss, since an
    /// unset slot sorts after every key.
    height: AtomicUsize,
    len: AtomicUsize,
    cmp: C,
    _owns: PhantomData<Box<Node<K>>>,
}

impl<K, C: KeyComparator<K>> Inner<K, C> {
    fn height(&self) -> usize {
        self.height.load(atomic::Ordering::Relaxed)
    }

    /// First node whose key is not less than `key`. When `prev` is given,
    /// records the last links visited on each level.
    fn find_greater_or_equal<'a>(
        &'a self,
        key: &K,
        mut prev: Option<&mut [&'a Links<K>; MAX_HEIGHT]>,
    ) -> Option<&'a Node<K>> {
        let mut links: &Links<K> = &self.head;
        let mut level = self.height() - 1;
        loop {
            let next = load_next(links, level);
            match next {
                Some(node) if self.cmp.compare(&node.key, key) == Ordering::Less => {
                    links = &node.next[..];
                }
                _ => {
                    if let Some(prev) = prev.as_deref_mut() {
                        prev[level] = links;
                    }
                    if level == 0 {
                        return next;
                    }
                    level -= 1;
                }
            }
        }
    }

    /// First node whose key is greater than `key`.
    fn find_greater<'a>(&'a self, key: &K) -> Option<&'a Node<K>> {
        let mut links: &Links<K> = &self.head;
        let mut level = self.height() - 1;
        loop {
            let next = load_next(links, level);
            match next {
                Some(node) if self.cmp.compare(&node.key, key) != Ordering::Greater => {
                    links = &node.next[..];
                }
                _ => {
                    if level == 0 {
                        return next;
                    }
                    level -= 1;
                }
            }
        }
    }
}

impl<K, C> Drop for Inner<K, C> {
    fn drop(&mut self) {
        let mut node = *self.head[0].get_mut();
        while !node.is_null() {
            // SAFETY: every node comes from `Box::into_raw` in `insert` and
            // is linked exactly once on level 0.
            let mut boxed = unsafe { Box::from_raw(node) };
            node = *boxed.next[0].get_mut();
        }
    }
}

/// Read handle onto a skiplist. Cloning is cheap; all clones and the
/// writer see the same nodes.
pub struct SkipListReader<K, C> {
    inner: Arc<Inner<K, C>>,
}

impl<K, C> Clone for SkipListReader<K, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, C: KeyComparator<K>> SkipListReader<K, C> {
    /// Position of the element equivalent to `key`, or the end.
    pub fn find(&self, key: &K) -> Cursor<'_, K> {
        match self.inner.find_greater_or_equal(key, None) {
            Some(node) if self.inner.cmp.compare(key, &node.key) == Ordering::Equal => {
                Cursor::at(node)
            }
            _ => self.end(),
        }
    }

    /// First element not less than `key`.
    pub fn lower_bound(&self, key: &K) -> Cursor<'_, K> {
        Cursor {
            node: self.inner.find_greater_or_equal(key, None),
        }
    }

    /// First element greater than `key`.
    pub fn upper_bound(&self, key: &K) -> Cursor<'_, K> {
        Cursor {
            node: self.inner.find_greater(key),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        !self.find(key).is_end()
    }

    pub fn comparator(&self) -> &C {
        &self.inner.cmp
    }
}

impl<K, C> SkipListReader<K, C> {
    /// Position of the smallest element.
    pub fn begin(&self) -> Cursor<'_, K> {
        Cursor {
            node: load_next(&self.inner.head, 0),
        }
    }

    pub fn end(&self) -> Cursor<'_, K> {
        Cursor { node: None }
    }

    pub fn is_empty(&self) -> bool {
        self.begin().is_end()
    }

    /// Number of elements. Concurrent readers may see a slightly stale
    /// count.
    pub fn len(&self) -> usize {
        self.inner.len.load(atomic::Ordering::Relaxed)
    }

    /// Current number of levels in use.
    pub fn height(&self) -> usize {
        self.inner.height.load(atomic::Ordering::Relaxed)
    }

    /// In-order iterator over all elements.
    pub fn iter(&self) -> Iter<'_, K> {
        self.begin().into_iter()
    }
}

/// The writer handle. Dereferences to a [`SkipListReader`] for lookups.
pub struct SkipList<K, C> {
    reader: SkipListReader<K, C>,
    rng: StdRng,
}

impl<K, C: KeyComparator<K>> SkipList<K, C> {
    /// Create an empty list seeded from OS entropy.
    pub fn new(cmp: C) -> Self {
        Self::with_rng(cmp, StdRng::from_entropy())
    }

    /// Create an empty list whose node heights are reproducible.
    pub fn with_seed(cmp: C, seed: u64) -> Self {
        Self::with_rng(cmp, StdRng::seed_from_u64(seed))
    }

    fn with_rng(cmp: C, rng: StdRng) -> Self {
        let inner = Inner {
            head: new_links(MAX_HEIGHT),
            height: AtomicUsize::new(1),
            len: AtomicUsize::new(0),
            cmp,
            _owns: PhantomData,
        };
        Self {
            reader: SkipListReader {
                inner: Arc::new(inner),
            },
            rng,
        }
    }

    /// A new read handle that can outlive or leave the writer's thread.
    pub fn reader(&self) -> SkipListReader<K, C> {
        self.reader.clone()
    }

    /// Insert `key` unless an equivalent key is already present.
    ///
    /// Returns the position of the new element, or of the existing
    /// equivalent one (in which case `key` is dropped).
    pub fn insert(&mut self, key: K) -> Cursor<'_, K> {
        let inner: &Inner<K, C> = &self.reader.inner;
        let head: &Links<K> = &inner.head;
        let mut prev: [&Links<K>; MAX_HEIGHT] = [head; MAX_HEIGHT];

        if let Some(node) = inner.find_greater_or_equal(&key, Some(&mut prev)) {
            if inner.cmp.compare(&key, &node.key) == Ordering::Equal {
                return Cursor::at(node);
            }
        }

        let height = random_height(&mut self.rng);
        let current = inner.height();
        if height > current {
            for slot in &mut prev[current..height] {
                *slot = head;
            }
            // Relaxed: a reader that sees the new height before the new
            // head slots below just finds them unset and moves down.
            inner.height.store(height, atomic::Ordering::Relaxed);
            log::trace!("skiplist height raised {} -> {}", current, height);
        }

        let node = Box::into_raw(Box::new(Node {
            key,
            next: new_links(height),
        }));
        // SAFETY: freshly allocated and owned by the list from here on.
        let node_ref: &Node<K> = unsafe { &*node };

        for (level, links) in prev.iter().enumerate().take(height) {
            // The node is unreachable until the release store below, so
            // its own slot needs no ordering.
            node_ref.next[level].store(
                links[level].load(atomic::Ordering::Relaxed),
                atomic::Ordering::Relaxed,
            );
            links[level].store(node, atomic::Ordering::Release);
        }
        inner.len.fetch_add(1, atomic::Ordering::Relaxed);

        Cursor::at(node_ref)
    }
}

impl<K: Ord> Default for SkipList<K, NaturalOrder> {
    fn default() -> Self {
        Self::new(NaturalOrder)
    }
}

impl<K, C> Deref for SkipList<K, C> {
    type Target = SkipListReader<K, C>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

/// Geometric height: start at 1, add a level with probability 1/4.
fn random_height(rng: &mut StdRng) -> usize {
    let mut height = 1;
    while height < MAX_HEIGHT && rng.gen_range(0..BRANCHING) == 0 {
        height += 1;
    }
    height
}

/// A position in the list: an element or the end.
/// Two cursors are equal when they point at the same node.
pub struct Cursor<'a, K> {
    node: Option<&'a Node<K>>,
}

impl<'a, K> Cursor<'a, K> {
    fn at(node: &'a Node<K>) -> Self {
        Self { node: Some(node) }
    }

    /// Key at this position, `None` at the end.
    pub fn key(&self) -> Option<&'a K> {
        self.node.map(|node| &node.key)
    }

    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Move to the next element. Advancing the end cursor is a no-op.
    pub fn advance(&mut self) {
        if let Some(node) = self.node {
            self.node = load_next(&node.next, 0);
        }
    }
}

impl<K> Clone for Cursor<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Cursor<'_, K> {}

impl<K> PartialEq for Cursor<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        match (self.node, other.node) {
            (Some(a), Some(b)) => ptr::eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<K> Eq for Cursor<'_, K> {}

impl<K: std::fmt::Debug> std::fmt::Debug for Cursor<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.key() {
            Some(key) => f.debug_tuple("Cursor").field(key).finish(),
            None => f.write_str("Cursor(end)"),
        }
    }
}

impl<'a, K> IntoIterator for Cursor<'a, K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Iter<'a, K> {
        Iter { cursor: self }
    }
}

/// Forward iterator starting at some cursor.
pub struct Iter<'a, K> {
    cursor: Cursor<'a, K>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        let key = self.cursor.key()?;
        self.cursor.advance();
        Some(key)
    }
}
