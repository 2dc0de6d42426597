//! In-memory record store with JSON snapshot persistence.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{info, instrument};

use versefetch_shared::{Key, Record, Result};

use crate::atomic::{LoadStatus, read_json_lenient, write_json_atomic};

/// Nested `partition → item → record` mapping, as it is laid out on disk.
pub type Snapshot<'a> = BTreeMap<u32, BTreeMap<u32, &'a Record>>;

type Partitions = HashMap<u32, HashMap<u32, Record>>;

/// Records fetched so far, keyed by `(partition, item)`.
///
/// Keys are never removed during a run; [`RecordStore::retain_within`] exists
/// only for pruning a freshly loaded file against the keyspace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    partitions: Partitions,
    len: usize,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a records file. Absent, blank or corrupt files yield an empty store.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<(Self, LoadStatus)> {
        let (partitions, status) = read_json_lenient::<Partitions>(path)?;
        let store = Self::from_partitions(partitions.unwrap_or_default());
        if status == LoadStatus::Loaded {
            info!(records = store.len(), "loaded records");
        }
        Ok((store, status))
    }

    fn from_partitions(partitions: Partitions) -> Self {
        let len = partitions.values().map(HashMap::len).sum();
        Self { partitions, len }
    }

    pub fn get(&self, key: Key) -> Option<&Record> {
        self.partitions.get(&key.partition)?.get(&key.item)
    }

    /// Insert or overwrite. Returns the previous record, if any.
    pub fn put(&mut self, key: Key, record: Record) -> Option<Record> {
        let previous = self
            .partitions
            .entry(key.partition)
            .or_default()
            .insert(key.item, record);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn has(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every stored key, in ascending order.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .partitions
            .iter()
            .flat_map(|(&p, items)| items.keys().map(move |&i| Key::new(p, i)))
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Deterministically ordered view for persistence.
    pub fn snapshot(&self) -> Snapshot<'_> {
        self.partitions
            .iter()
            .map(|(&p, items)| (p, items.iter().map(|(&i, r)| (i, r)).collect()))
            .collect()
    }

    /// Drop every entry whose key fails `keep`. Returns the dropped keys, sorted.
    pub fn retain_within(&mut self, keep: impl Fn(Key) -> bool) -> Vec<Key> {
        let mut dropped = Vec::new();
        for (&p, items) in self.partitions.iter_mut() {
            items.retain(|&i, _| {
                let key = Key::new(p, i);
                let ok = keep(key);
                if !ok {
                    dropped.push(key);
                }
                ok
            });
        }
        self.partitions.retain(|_, items| !items.is_empty());
        self.len -= dropped.len();
        dropped.sort_unstable();
        dropped
    }

    /// Atomically replace `path` with a full snapshot of the store.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::test_support::TempDir;

    fn text(s: &str) -> Record {
        Record::Text(s.to_string())
    }

    #[test]
    fn put_get_has() {
        let mut store = RecordStore::new();
        assert!(store.is_empty());
        assert!(store.put(Key::new(1, 1), text("a")).is_none());
        assert_eq!(store.get(Key::new(1, 1)), Some(&text("a")));
        assert!(store.has(Key::new(1, 1)));
        assert!(!store.has(Key::new(1, 2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn overwrite_keeps_len() {
        let mut store = RecordStore::new();
        store.put(Key::new(2, 3), text("old"));
        let previous = store.put(Key::new(2, 3), text("new"));
        assert_eq!(previous, Some(text("old")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(Key::new(2, 3)), Some(&text("new")));
    }

    #[test]
    fn snapshot_is_sorted_nested_json() {
        let mut store = RecordStore::new();
        store.put(Key::new(10, 1), text("j"));
        store.put(Key::new(2, 1), text("b"));
        store.put(Key::new(1, 2), text("a2"));
        store.put(Key::new(1, 1), text("a1"));

        let json = serde_json::to_string(&store.snapshot()).expect("serialize");
        assert_eq!(
            json,
            r#"{"1":{"1":"a1","2":"a2"},"2":{"1":"b"},"10":{"1":"j"}}"#
        );
        assert_eq!(
            store.keys(),
            vec![Key::new(1, 1), Key::new(1, 2), Key::new(2, 1), Key::new(10, 1)]
        );
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new();
        let path = dir.join("records.json");

        let mut store = RecordStore::new();
        store.put(Key::new(1, 1), text("بِسْمِ ٱللَّهِ"));
        let mut fields = versefetch_shared::FieldSet::new();
        fields.insert("arabic".into(), Some("a".into()));
        fields.insert("hashiyah".into(), None);
        store.put(Key::new(1, 2), Record::Fields(fields.clone()));
        store.put(Key::new(2, 1), Record::Tokens(vec![fields]));
        store.save(&path).expect("save");

        let (loaded, status) = RecordStore::load(&path).expect("load");
        assert_eq!(status, LoadStatus::Loaded);
        assert_eq!(loaded, store);

        let raw = std::fs::read_to_string(&path).expect("read raw");
        assert!(raw.contains("بِسْمِ"), "non-ASCII text is written unescaped");
    }

    #[test]
    fn corrupt_records_file_resets() {
        let dir = TempDir::new();
        let path = dir.join("records.json");
        std::fs::write(&path, r#"{"1": {"1": 42}}"#).expect("write");

        let (store, status) = RecordStore::load(&path).expect("load");
        assert!(store.is_empty());
        assert!(status.is_recovered());
    }

    #[test]
    fn retain_within_reports_dropped_keys() {
        let mut store = RecordStore::new();
        store.put(Key::new(1, 1), text("ok"));
        store.put(Key::new(1, 9), text("too far"));
        store.put(Key::new(7, 1), text("no such partition"));

        let dropped = store.retain_within(|k| k.partition == 1 && k.item <= 2);
        assert_eq!(dropped, vec![Key::new(1, 9), Key::new(7, 1)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.keys(), vec![Key::new(1, 1)]);
    }
}
