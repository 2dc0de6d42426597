//! Completeness audit of a records file against the keyspace.

use std::collections::BTreeMap;

use versefetch_shared::Key;
use versefetch_storage::RecordStore;

use crate::keyspace::KeyspaceIndex;

/// Which keys have a stored record and which do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub total: u64,
    pub present: usize,
    /// Keys of the keyspace with no record, ascending.
    pub missing: Vec<Key>,
    /// Stored keys that fall outside the keyspace, ascending.
    pub out_of_range: Vec<Key>,
}

impl AuditReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Missing items grouped by partition.
    pub fn missing_by_partition(&self) -> BTreeMap<u32, Vec<u32>> {
        let mut grouped: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for key in &self.missing {
            grouped.entry(key.partition).or_default().push(key.item);
        }
        grouped
    }
}

/// Compare `store` with every key of `index`.
pub fn audit(index: &KeyspaceIndex, store: &RecordStore) -> AuditReport {
    let missing: Vec<Key> = index.keys_after(None).filter(|k| !store.has(*k)).collect();
    let out_of_range: Vec<Key> = store
        .keys()
        .into_iter()
        .filter(|k| !index.contains(*k))
        .collect();

    AuditReport {
        total: index.total_keys(),
        present: store.len() - out_of_range.len(),
        missing,
        out_of_range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use versefetch_shared::Record;

    #[test]
    fn reports_gaps_and_strays() {
        let index = KeyspaceIndex::new(vec![3, 2]).expect("index");
        let mut store = RecordStore::new();
        for key in [Key::new(1, 1), Key::new(1, 3), Key::new(2, 2), Key::new(5, 1)] {
            store.put(key, Record::Text("x".into()));
        }

        let report = audit(&index, &store);
        assert_eq!(report.total, 5);
        assert_eq!(report.present, 3);
        assert_eq!(report.missing, vec![Key::new(1, 2), Key::new(2, 1)]);
        assert_eq!(report.out_of_range, vec![Key::new(5, 1)]);
        assert!(!report.is_complete());

        let grouped = report.missing_by_partition();
        assert_eq!(grouped[&1], vec![2]);
        assert_eq!(grouped[&2], vec![1]);
    }

    #[test]
    fn full_store_is_complete() {
        let index = KeyspaceIndex::new(vec![1, 0, 1]).expect("index");
        let mut store = RecordStore::new();
        store.put(Key::new(1, 1), Record::Text("a".into()));
        store.put(Key::new(3, 1), Record::Text("b".into()));

        let report = audit(&index, &store);
        assert!(report.is_complete());
        assert_eq!(report.present, 2);
    }
}
