//! The ordered, partitioned keyspace.

use versefetch_shared::{Key, Result, VerseFetchError};

/// Static `partition → item count` table with the total key order over it.
///
/// Partitions are numbered from 1. A partition with count 0 contributes no
/// keys and is skipped by every traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceIndex {
    counts: Vec<u32>,
}

impl KeyspaceIndex {
    /// Build an index. An empty table is a configuration error.
    pub fn new(counts: Vec<u32>) -> Result<Self> {
        if counts.is_empty() {
            return Err(VerseFetchError::config("keyspace count table is empty"));
        }
        Ok(Self { counts })
    }

    /// Number of partitions, `P`.
    pub fn partitions(&self) -> u32 {
        self.counts.len() as u32
    }

    /// Item count of `partition`; 0 outside `1..=P`.
    pub fn count(&self, partition: u32) -> u32 {
        partition
            .checked_sub(1)
            .and_then(|idx| self.counts.get(idx as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_keys(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    pub fn contains(&self, key: Key) -> bool {
        key.item >= 1 && key.item <= self.count(key.partition)
    }

    pub fn first_key(&self) -> Option<Key> {
        self.first_key_from(1)
    }

    pub fn last_key(&self) -> Option<Key> {
        self.counts
            .iter()
            .enumerate()
            .rev()
            .find(|(_, c)| **c > 0)
            .map(|(idx, &c)| Key::new(idx as u32 + 1, c))
    }

    /// The next key after `key` in total order.
    ///
    /// `key` need not be in the keyspace: an item past the end of its
    /// partition moves on to the next non-empty partition, and item 0 means
    /// "before the first item".
    pub fn successor(&self, key: Key) -> Option<Key> {
        if key.partition == 0 {
            return self.first_key();
        }
        if key.item < self.count(key.partition) {
            return Some(Key::new(key.partition, key.item + 1));
        }
        self.first_key_from(key.partition.checked_add(1)?)
    }

    /// True when `key` is the final item of its partition.
    pub fn is_last_key_of_partition(&self, key: Key) -> bool {
        self.contains(key) && key.item == self.count(key.partition)
    }

    /// Up to `size` keys following `after` (or from the start when `None`).
    ///
    /// A batch never spans two partitions, so every partition ends on a
    /// batch boundary.
    pub fn next_batch(&self, after: Option<Key>, size: usize) -> Vec<Key> {
        if size == 0 {
            return Vec::new();
        }
        let mut keys = self.keys_after(after);
        let Some(first) = keys.next() else {
            return Vec::new();
        };

        let mut batch = Vec::with_capacity(size);
        batch.push(first);
        batch.extend(
            keys.take_while(|k| k.partition == first.partition)
                .take(size - 1),
        );
        batch
    }

    /// Lazily iterate every key strictly after `after`.
    pub fn keys_after(&self, after: Option<Key>) -> KeysAfter<'_> {
        let next = match after {
            Some(key) => self.successor(key),
            None => self.first_key(),
        };
        KeysAfter { index: self, next }
    }

    fn first_key_from(&self, partition: u32) -> Option<Key> {
        (partition..=self.partitions())
            .find(|&p| self.count(p) > 0)
            .map(|p| Key::new(p, 1))
    }
}

/// Iterator returned by [`KeyspaceIndex::keys_after`].
#[derive(Debug, Clone)]
pub struct KeysAfter<'a> {
    index: &'a KeyspaceIndex,
    next: Option<Key>,
}

impl Iterator for KeysAfter<'_> {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        let current = self.next?;
        self.next = self.index.successor(current);
        Some(current)
    }
}
