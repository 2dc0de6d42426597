//! The resumption checkpoint.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use versefetch_shared::{Key, Result};

use crate::atomic::{LoadStatus, read_json_lenient, write_json_atomic};

/// The highest key whose batch has been committed.
///
/// `(0, 0)` means nothing has been committed yet. Serialized as
/// `{"partition": p, "item": i}`.
/// Both fields are required; any other shape loads as recovered corruption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub partition: u32,
    pub item: u32,
}

impl Checkpoint {
    pub const NONE: Checkpoint = Checkpoint {
        partition: 0,
        item: 0,
    };

    pub fn at(key: Key) -> Self {
        Self {
            partition: key.partition,
            item: key.item,
        }
    }

    /// The certified key, or `None` if nothing was committed.
    pub fn last_key(&self) -> Option<Key> {
        (self.partition != 0).then(|| Key::new(self.partition, self.item))
    }

    /// Move forward to `key`. Never moves backwards; returns whether it moved.
    pub fn advance(&mut self, key: Key) -> bool {
        if self.last_key().is_some_and(|current| key <= current) {
            return false;
        }
        *self = Self::at(key);
        true
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<(Self, LoadStatus)> {
        let (checkpoint, status) = read_json_lenient::<Checkpoint>(path)?;
        let checkpoint = checkpoint.unwrap_or_default();
        if status == LoadStatus::Loaded {
            info!(partition = checkpoint.partition, item = checkpoint.item, "loaded checkpoint");
        }
        Ok((checkpoint, status))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.last_key() {
            Some(key) => write!(f, "{key}"),
            None => f.write_str("none"),
        }
    }
}
