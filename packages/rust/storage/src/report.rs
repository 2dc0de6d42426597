//! End-of-run report of keys that could not be fetched.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use versefetch_shared::{Key, Result};

use crate::atomic::write_json_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntry {
    pub partition: u32,
    pub item: u32,
    pub reason: String,
}

/// Keys left without a record, with the last failure reason for each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingReport {
    pub generated_at: DateTime<Utc>,
    pub missing: Vec<MissingEntry>,
}

impl MissingReport {
    /// Build a report; entries are sorted by key and deduplicated (last reason wins).
    pub fn new(entries: impl IntoIterator<Item = (Key, String)>) -> Self {
        let mut by_key = std::collections::BTreeMap::new();
        for (key, reason) in entries {
            by_key.insert(key, reason);
        }
        Self {
            generated_at: Utc::now(),
            missing: by_key
                .into_iter()
                .map(|(key, reason)| MissingEntry {
                    partition: key.partition,
                    item: key.item,
                    reason,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::test_support::TempDir;

    #[test]
    fn entries_sorted_and_deduplicated() {
        let report = MissingReport::new([
            (Key::new(2, 1), "timeout".to_string()),
            (Key::new(1, 2), "status 503".to_string()),
            (Key::new(2, 1), "no match".to_string()),
        ]);
        let keys: Vec<_> = report.missing.iter().map(|e| (e.partition, e.item)).collect();
        assert_eq!(keys, vec![(1, 2), (2, 1)]);
        assert_eq!(report.missing[1].reason, "no match");
    }

    #[test]
    fn saved_report_has_rfc3339_timestamp() {
        let dir = TempDir::new();
        let path = dir.join("missing.json");
        MissingReport::new([(Key::new(1, 1), "no match".to_string())])
            .save(&path)
            .expect("save");

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        let stamp = value["generated_at"].as_str().expect("timestamp string");
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
        assert_eq!(value["missing"][0]["reason"], "no match");
    }
}
