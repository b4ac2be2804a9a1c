//! KeyIndex implementation
//!
//! Chained hash table whose nodes live in a fixed arena managed by a
//! SlotPool. Capacity is a hard ceiling: a full arena fails inserts.

use crate::error::{GridError, Result};
use crate::keys::{KeyCodec, StoreKey, MAX_KEY_LEN};
use crate::pool::SlotPool;

use super::Location;

/// One arena node. A released node keeps its storage but resets `tag`
/// to 0, so live and free nodes are distinguishable in the same array.
#[derive(Clone)]
struct Node {
    prev: Option<u32>,
    next: Option<u32>,
    tag: u8,
    key_len: u16,
    key: [u8; MAX_KEY_LEN],
    location: Location,
}

impl Node {
    fn empty() -> Self {
        Self {
            prev: None,
            next: None,
            tag: 0,
            key_len: 0,
            key: [0u8; MAX_KEY_LEN],
            location: Location {
                size_class: 0,
                file_no: 0,
                slot: 0,
            },
        }
    }
}

/// Hash table mapping `(type tag, key)` pairs to grid locations.
///
/// At most one live entry exists per distinct pair: `set` on a present
/// key overwrites its location in place without reallocation.
pub struct KeyIndex {
    buckets: Vec<Option<u32>>,
    nodes: Vec<Node>,
    pool: SlotPool,
}

impl KeyIndex {
    /// Create an index with `buckets` chains and a `capacity`-node arena.
    pub fn new(buckets: u32, capacity: u32) -> Self {
        Self {
            buckets: vec![None; buckets as usize],
            nodes: vec![Node::empty(); capacity as usize],
            pool: SlotPool::new(capacity),
        }
    }

    fn bucket_of(&self, key: &dyn StoreKey) -> usize {
        (key.hash_code() as usize) % self.buckets.len()
    }

    /// Walk `key`'s bucket chain and return the matching node's arena
    /// index, if any. A match requires the stored tag to equal the key's
    /// tag and the decoded stored key to compare equal.
    fn find(&self, key: &dyn StoreKey, codec: &dyn KeyCodec) -> Option<u32> {
        let mut cursor = self.buckets[self.bucket_of(key)];

        while let Some(idx) = cursor {
            let node = &self.nodes[idx as usize];
            cursor = node.next;

            if node.tag != key.type_tag() {
                continue;
            }

            let stored = match codec.decode(&node.key[..node.key_len as usize]) {
                Ok(k) => k,
                Err(_) => continue,
            };

            if stored.compare(key).is_eq() {
                return Some(idx);
            }
        }

        None
    }

    /// Look up the location stored for `key`.
    pub fn get(&self, key: &dyn StoreKey, codec: &dyn KeyCodec) -> Option<Location> {
        self.find(key, codec)
            .map(|idx| self.nodes[idx as usize].location)
    }

    /// Insert or update `key`'s location.
    ///
    /// Present keys are updated in place. Absent keys take a node from
    /// the arena pool; `IndexFull` is returned when none remain, and
    /// `SerializationOverflow` if the encoded key exceeds the fixed node
    /// buffer.
    pub fn set(&mut self, key: &dyn StoreKey, codec: &dyn KeyCodec, location: Location) -> Result<()> {
        if let Some(idx) = self.find(key, codec) {
            self.nodes[idx as usize].location = location;
            return Ok(());
        }

        // Serialize before acquiring so a failed encode leaves the pool
        // untouched.
        let mut encoded = Vec::with_capacity(MAX_KEY_LEN);
        let key_len = key.encode(&mut encoded)?;
        if key_len > MAX_KEY_LEN {
            return Err(GridError::SerializationOverflow(format!(
                "encoded key is {} bytes, limit is {}",
                key_len, MAX_KEY_LEN
            )));
        }

        let idx = self.pool.acquire().ok_or(GridError::IndexFull {
            capacity: self.pool.capacity(),
        })?;

        let bucket = self.bucket_of(key);
        let old_head = self.buckets[bucket];

        let node = &mut self.nodes[idx as usize];
        node.prev = None;
        node.next = old_head;
        node.tag = key.type_tag();
        node.key_len = key_len as u16;
        node.key[..key_len].copy_from_slice(&encoded);
        node.location = location;

        if let Some(h) = old_head {
            self.nodes[h as usize].prev = Some(idx);
        }
        self.buckets[bucket] = Some(idx);

        Ok(())
    }

    /// Remove `key`'s entry, unlinking its node and releasing it back to
    /// the arena pool. `KeyNotFound` if absent.
    pub fn remove(&mut self, key: &dyn StoreKey, codec: &dyn KeyCodec) -> Result<()> {
        let idx = self.find(key, codec).ok_or(GridError::KeyNotFound)?;

        let (prev, next) = {
            let node = &self.nodes[idx as usize];
            (node.prev, node.next)
        };
        if let Some(p) = prev {
            self.nodes[p as usize].next = next;
        }
        if let Some(n) = next {
            self.nodes[n as usize].prev = prev;
        }

        let bucket = self.bucket_of(key);
        if self.buckets[bucket] == Some(idx) {
            self.buckets[bucket] = next;
        }

        let node = &mut self.nodes[idx as usize];
        node.prev = None;
        node.next = None;
        node.tag = 0;
        node.key_len = 0;

        self.pool.release(idx);

        Ok(())
    }

    /// Number of free arena nodes. Callers can refuse an insert up front
    /// instead of discovering a full arena mid-operation.
    pub fn available(&self) -> u32 {
        self.pool.available()
    }

    /// Number of live entries.
    pub fn len(&self) -> u32 {
        self.pool.capacity() - self.pool.available()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every live arena node in index order, yielding the stored
    /// type tag and key bytes.
    pub fn iter(&self) -> KeyIndexIter<'_> {
        KeyIndexIter {
            index: self,
            cursor: 0,
        }
    }
}

/// Full-arena iterator over live nodes, produced by [`KeyIndex::iter`].
pub struct KeyIndexIter<'a> {
    index: &'a KeyIndex,
    cursor: usize,
}

impl<'a> Iterator for KeyIndexIter<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.index.nodes.len() {
            let node = &self.index.nodes[self.cursor];
            self.cursor += 1;

            if node.tag != 0 {
                return Some((node.tag, &node.key[..node.key_len as usize]));
            }
        }

        None
    }
}
