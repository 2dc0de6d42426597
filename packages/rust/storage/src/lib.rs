//! File-backed persistence for the fetch pipeline.
//!
//! The [`Storage`] struct owns the two state files of a run:
//! - the records file, a full snapshot of the [`RecordStore`]
//! - the progress file, the [`Checkpoint`] certifying those records
//!
//! Both are replaced atomically (write temp, then rename). The records file
//! is always replaced before the progress file that certifies it, so a
//! crash between the two leaves records ahead of the checkpoint, never
//! behind it.

mod atomic;
mod progress;
mod records;
mod report;

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use versefetch_shared::Result;

pub use atomic::{LoadStatus, read_json_lenient, write_json_atomic};
pub use progress::Checkpoint;
pub use records::{RecordStore, Snapshot};
pub use report::{MissingEntry, MissingReport};

/// State recovered from disk at startup.
#[derive(Debug)]
pub struct LoadedState {
    pub store: RecordStore,
    pub checkpoint: Checkpoint,
    pub records_status: LoadStatus,
    pub progress_status: LoadStatus,
}

impl LoadedState {
    /// The checkpoint, or [`Checkpoint::NONE`] when the records it certifies
    /// were not loaded (corrupt or absent records file).
    pub fn certified_checkpoint(&self) -> Checkpoint {
        if self.records_status == LoadStatus::Loaded {
            self.checkpoint
        } else {
            Checkpoint::NONE
        }
    }
}

/// Handle over the records and progress files of one pipeline.
#[derive(Debug, Clone)]
pub struct Storage {
    records_path: PathBuf,
    progress_path: PathBuf,
}

impl Storage {
    pub fn new(records_path: impl Into<PathBuf>, progress_path: impl Into<PathBuf>) -> Self {
        Self {
            records_path: records_path.into(),
            progress_path: progress_path.into(),
        }
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    /// Load both files. Corruption is recovered; other I/O errors are fatal.
    pub fn load(&self) -> Result<LoadedState> {
        let (store, records_status) = RecordStore::load(&self.records_path)?;
        let (checkpoint, progress_status) = Checkpoint::load(&self.progress_path)?;
        Ok(LoadedState {
            store,
            checkpoint,
            records_status,
            progress_status,
        })
    }

    /// Persist one batch boundary.
    ///
    /// The records file is skipped when the batch did not change the store.
    #[instrument(skip_all, fields(checkpoint = %checkpoint, dirty = records_dirty))]
    pub fn commit(
        &self,
        store: &RecordStore,
        checkpoint: &Checkpoint,
        records_dirty: bool,
    ) -> Result<()> {
        if records_dirty {
            store.save(&self.records_path)?;
        }
        checkpoint.save(&self.progress_path)?;
        debug!(records = store.len(), "committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::test_support::TempDir;
    use versefetch_shared::{Key, Record};

    fn storage(dir: &TempDir) -> Storage {
        Storage::new(dir.join("data/records.json"), dir.join("data/progress.json"))
    }

    #[test]
    fn fresh_directory_loads_empty() {
        let dir = TempDir::new();
        let state = storage(&dir).load().expect("load");
        assert!(state.store.is_empty());
        assert_eq!(state.checkpoint, Checkpoint::NONE);
        assert_eq!(state.records_status, LoadStatus::Missing);
        assert_eq!(state.progress_status, LoadStatus::Missing);
    }

    #[test]
    fn commit_round_trips_both_files() {
        let dir = TempDir::new();
        let storage = storage(&dir);

        let mut store = RecordStore::new();
        store.put(Key::new(1, 1), Record::Text("a".into()));
        let checkpoint = Checkpoint::at(Key::new(1, 1));
        storage.commit(&store, &checkpoint, true).expect("commit");

        let state = storage.load().expect("load");
        assert_eq!(state.store, store);
        assert_eq!(state.checkpoint, checkpoint);
    }

    #[test]
    fn clean_commit_leaves_records_file_alone() {
        let dir = TempDir::new();
        let storage = storage(&dir);

        let store = RecordStore::new();
        storage
            .commit(&store, &Checkpoint::at(Key::new(1, 3)), false)
            .expect("commit");

        assert!(!storage.records_path().exists());
        assert!(storage.progress_path().exists());
    }

    #[test]
    fn corrupt_progress_does_not_discard_records() {
        let dir = TempDir::new();
        let storage = storage(&dir);

        let mut store = RecordStore::new();
        store.put(Key::new(1, 1), Record::Text("a".into()));
        storage
            .commit(&store, &Checkpoint::at(Key::new(1, 1)), true)
            .expect("commit");
        std::fs::write(storage.progress_path(), "{").expect("corrupt progress");

        let state = storage.load().expect("load");
        assert_eq!(state.store.len(), 1);
        assert_eq!(state.checkpoint, Checkpoint::NONE);
        assert!(state.progress_status.is_recovered());
    }

    #[test]
    fn checkpoint_is_uncertified_without_loaded_records() {
        let dir = TempDir::new();
        let storage = storage(&dir);

        let mut store = RecordStore::new();
        store.put(Key::new(1, 1), Record::Text("a".into()));
        let checkpoint = Checkpoint::at(Key::new(1, 1));
        storage.commit(&store, &checkpoint, true).expect("commit");
        assert_eq!(storage.load().expect("load").certified_checkpoint(), checkpoint);

        std::fs::write(storage.records_path(), "{\"1\": ").expect("corrupt records");
        let state = storage.load().expect("load");
        assert!(state.records_status.is_recovered());
        assert_eq!(state.checkpoint, checkpoint);
        assert_eq!(state.certified_checkpoint(), Checkpoint::NONE);

        std::fs::remove_file(storage.records_path()).expect("remove records");
        let state = storage.load().expect("load");
        assert_eq!(state.records_status, LoadStatus::Missing);
        assert_eq!(state.certified_checkpoint(), Checkpoint::NONE);
    }
}
