//! Bounded LRU map.
//!
//! Entries live in an arena of nodes linked into a doubly-linked recency list
//! (head = most recently used, tail = least recently used). A hash index maps
//! each key to its node, so lookup, promotion and eviction are all O(1).
//! The list and the index are guarded by a single mutex.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::common::{HeapError, Result};

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct LruState<K, V> {
    /// Node arena; `None` marks a recycled slot
    nodes: Vec<Option<Node<K, V>>>,
    /// Recycled arena slots
    free: Vec<usize>,
    /// Key -> arena slot
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Eq + Hash + Clone, V> LruState<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn node(&self, idx: usize) -> &Node<K, V> {
        self.nodes[idx].as_ref().expect("linked node must be live")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        self.nodes[idx].as_mut().expect("linked node must be live")
    }

    /// Detaches a node from the recency list, leaving it in the arena.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    /// Links a detached node in at the head.
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn promote(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn insert_front(&mut self, key: K, value: V) {
        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    /// Unlinks and frees a node, returning its key and value.
    fn release(&mut self, idx: usize) -> (K, V) {
        self.unlink(idx);
        let node = self.nodes[idx].take().expect("linked node must be live");
        self.free.push(idx);
        self.index.remove(&node.key);
        (node.key, node.value)
    }

    fn pop_back(&mut self) -> Option<(K, V)> {
        let tail = self.tail?;
        Some(self.release(tail))
    }
}

/// A fixed-capacity map that evicts its least recently used entry.
///
/// `get` and `put` both count as a use. Evicted entries are handed back to the
/// caller so that write-back decisions (e.g. flushing dirty pages) stay with
/// the owner of the values.
pub struct LruCache<K, V> {
    capacity: usize,
    state: Mutex<LruState<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(HeapError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            state: Mutex::new(LruState::new(capacity)),
        })
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let idx = *state.index.get(key)?;
        state.promote(idx);
        Some(state.node(idx).value.clone())
    }

    /// Returns the value for `key` without changing its recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        let idx = *state.index.get(key)?;
        Some(state.node(idx).value.clone())
    }

    /// Inserts or updates `key` and marks it most recently used.
    /// If a new key would exceed the capacity, the least recently used entry
    /// is evicted first and returned.
    pub fn put(&self, key: K, value: V) -> Option<(K, V)> {
        let mut state = self.state.lock();

        if let Some(&idx) = state.index.get(&key) {
            state.node_mut(idx).value = value;
            state.promote(idx);
            return None;
        }

        let evicted = if state.index.len() >= self.capacity {
            state.pop_back()
        } else {
            None
        };
        state.insert_front(key, value);
        evicted
    }

    /// Returns the resident value for `key` if there is one, otherwise inserts
    /// `value`. Either way the entry becomes most recently used. The second
    /// element is the entry evicted to make room, if any.
    pub fn get_or_insert(&self, key: K, value: V) -> (V, Option<(K, V)>) {
        let mut state = self.state.lock();

        if let Some(&idx) = state.index.get(&key) {
            state.promote(idx);
            return (state.node(idx).value.clone(), None);
        }

        let evicted = if state.index.len() >= self.capacity {
            state.pop_back()
        } else {
            None
        };
        state.insert_front(key, value.clone());
        (value, evicted)
    }

    /// Removes `key` from the cache.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let idx = *state.index.get(key)?;
        Some(state.release(idx).1)
    }

    /// Evicts the least recently used entry. Returns None on an empty cache.
    pub fn discard_lru(&self) -> Option<(K, V)> {
        self.state.lock().pop_back()
    }

    /// Returns true if `key` is resident. Does not affect recency.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().index.contains_key(key)
    }

    /// Returns the resident keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        let state = self.state.lock();
        let mut keys = Vec::with_capacity(state.index.len());
        let mut cursor = state.head;
        while let Some(idx) = cursor {
            let node = state.node(idx);
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }

    /// Returns the resident entries from most to least recently used.
    pub fn entries(&self) -> Vec<(K, V)> {
        let state = self.state.lock();
        let mut entries = Vec::with_capacity(state.index.len());
        let mut cursor = state.head;
        while let Some(idx) = cursor {
            let node = state.node(idx);
            entries.push((node.key.clone(), node.value.clone()));
            cursor = node.next;
        }
        entries
    }

    /// Returns the number of resident entries.
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Returns true if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
