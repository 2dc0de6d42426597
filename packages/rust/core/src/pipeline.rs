//! Resumable batch pipeline: keyspace → fetch → normalize → commit.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use versefetch_crawler::{
    Extractor, FetchOutcome, FetchWorkerPool, Fetcher, HttpFetcher, RetryPolicy, for_source,
};
use versefetch_normalize::RuleSet;
use versefetch_shared::{Key, PipelineConfig, RecordShape, Result};
use versefetch_storage::{Checkpoint, MissingReport, RecordStore, Storage};

use crate::keyspace::KeyspaceIndex;

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Resuming,
    BatchInFlight,
    Committing,
    Done,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Resuming => "resuming",
            PipelineState::BatchInFlight => "batch in flight",
            PipelineState::Committing => "committing",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Where a run picks up after loading persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeInfo {
    pub checkpoint: Checkpoint,
    /// First key the run will consider; `None` when the keyspace is exhausted.
    pub resume_point: Option<Key>,
    /// Records already stored (after pruning).
    pub stored: usize,
    pub total: u64,
    /// Keys after the checkpoint, still to be spanned by batches.
    pub remaining: u64,
}

/// Outcome of one committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub first: Key,
    pub last: Key,
    pub keys: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub missing: usize,
    pub checkpoint: Checkpoint,
}

/// Totals for a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Keys fetched and stored during this run.
    pub fetched: usize,
    /// Keys skipped because a record was already stored.
    pub skipped: usize,
    /// Keys left without a record, with the reason.
    pub missing: Vec<(Key, String)>,
    pub batches: usize,
    pub checkpoint: Checkpoint,
    /// Records in the store at the end of the run.
    pub stored: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called on every state transition.
    fn state(&self, state: PipelineState);
    /// Called once persisted state is loaded.
    fn resumed(&self, info: &ResumeInfo);
    /// Called for each key that ends a batch without a record.
    fn key_missing(&self, key: Key, reason: &str);
    /// Called after each batch is persisted.
    fn batch_committed(&self, report: &BatchReport);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn state(&self, _state: PipelineState) {}
    fn resumed(&self, _info: &ResumeInfo) {}
    fn key_missing(&self, _key: Key, _reason: &str) {}
    fn batch_committed(&self, _report: &BatchReport) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// What merging one batch of outcomes did to the store.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub stored: usize,
    /// Keys without a record, sorted by key.
    pub missing: Vec<(Key, String)>,
}

/// Normalize, shape and store every fetched outcome.
///
/// The result depends only on the set of outcomes, not their order.
pub fn merge_batch(
    store: &mut RecordStore,
    outcomes: Vec<(Key, FetchOutcome)>,
    rules: &RuleSet,
    shape: RecordShape,
) -> MergeResult {
    let mut result = MergeResult::default();

    for (key, outcome) in outcomes {
        match outcome {
            FetchOutcome::Fetched(sets) => {
                let sets = sets
                    .into_iter()
                    .map(|set| rules.normalize_fields(set))
                    .collect();
                match shape.build(sets) {
                    Some(record) => {
                        store.put(key, record);
                        result.stored += 1;
                    }
                    None => result
                        .missing
                        .push((key, "empty after normalization".to_string())),
                }
            }
            FetchOutcome::Missing { reason, attempts } => {
                result
                    .missing
                    .push((key, format!("{reason} ({attempts} attempts)")));
            }
        }
    }

    result.missing.sort_by_key(|(key, _)| *key);
    result
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives the keyspace through the worker pool one batch at a time.
///
/// Batches are strictly sequential: batch `k + 1` is not drawn until batch
/// `k` is persisted.
pub struct PipelineController<F: Fetcher> {
    index: KeyspaceIndex,
    pool: FetchWorkerPool<F>,
    rules: RuleSet,
    storage: Storage,
    batch_size: usize,
    missing_path: Option<PathBuf>,
    state: PipelineState,
}

impl PipelineController<HttpFetcher> {
    /// Wire up the HTTP pipeline described by a validated configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let index = KeyspaceIndex::new(config.counts.clone())?;
        let rules = RuleSet::by_name(config.source.rules())?;
        let extractor = for_source(&config.source)?;
        let fetcher = HttpFetcher::new(config.source.url_template()?, &config.source.user_agent)?;
        let pool = FetchWorkerPool::new(
            fetcher,
            extractor,
            config.concurrency,
            RetryPolicy::from(config),
        );
        let storage = Storage::new(config.records_path.clone(), config.progress_path.clone());

        let mut controller = Self::new(index, pool, rules, storage, config.batch_size);
        if let Some(path) = &config.missing_path {
            controller = controller.with_missing_report(path.clone());
        }
        Ok(controller)
    }
}

impl<F: Fetcher> PipelineController<F> {
    pub fn new(
        index: KeyspaceIndex,
        pool: FetchWorkerPool<F>,
        rules: RuleSet,
        storage: Storage,
        batch_size: usize,
    ) -> Self {
        Self {
            index,
            pool,
            rules,
            storage,
            batch_size: batch_size.max(1),
            missing_path: None,
            state: PipelineState::Idle,
        }
    }

    /// Write a JSON report of missing keys when the run finishes.
    pub fn with_missing_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.missing_path = Some(path.into());
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn index(&self) -> &KeyspaceIndex {
        &self.index
    }

    pub fn extractor(&self) -> &dyn Extractor {
        self.pool.extractor()
    }

    fn transition(&mut self, next: PipelineState, progress: &dyn ProgressReporter) {
        self.state = next;
        progress.state(next);
    }

    /// Run until the keyspace is exhausted.
    ///
    /// Only configuration and persistence I/O errors abort the run; keys that
    /// cannot be fetched are reported as missing.
    #[instrument(skip_all, fields(
        extractor = self.pool.extractor().name(),
        rules = self.rules.name(),
        batch_size = self.batch_size
    ))]
    pub async fn run(&mut self, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        let start = Instant::now();

        // --- Resume ---
        self.transition(PipelineState::Resuming, progress);
        let loaded = self.storage.load()?;
        let mut checkpoint = loaded.certified_checkpoint();
        if checkpoint != loaded.checkpoint {
            warn!(
                checkpoint = %loaded.checkpoint,
                records = %self.storage.records_path().display(),
                "records file missing or unreadable, restarting from the first key"
            );
        }
        let mut store = loaded.store;

        let dropped = store.retain_within(|key| self.index.contains(key));
        if !dropped.is_empty() {
            warn!(
                count = dropped.len(),
                first = %dropped[0],
                "discarded stored records outside the keyspace"
            );
        }
        let mut pending_write = !dropped.is_empty();

        let resume = ResumeInfo {
            checkpoint,
            resume_point: self.index.keys_after(checkpoint.last_key()).next(),
            stored: store.len(),
            total: self.index.total_keys(),
            remaining: self.index.keys_after(checkpoint.last_key()).count() as u64,
        };
        match resume.resume_point {
            Some(key) => info!(
                checkpoint = %checkpoint,
                resume_point = %key,
                stored = resume.stored,
                total = resume.total,
                "resuming"
            ),
            None => info!(checkpoint = %checkpoint, "keyspace already exhausted"),
        }
        progress.resumed(&resume);

        let shape = self.pool.extractor().shape();
        let mut fetched = 0usize;
        let mut skipped = 0usize;
        let mut batches = 0usize;
        let mut missing: Vec<(Key, String)> = Vec::new();

        // --- Batches ---
        loop {
            let batch = self.index.next_batch(checkpoint.last_key(), self.batch_size);
            let (Some(&first), Some(&last)) = (batch.first(), batch.last()) else {
                break;
            };

            self.transition(PipelineState::BatchInFlight, progress);
            let to_fetch: Vec<Key> = batch.iter().copied().filter(|k| !store.has(*k)).collect();
            let batch_skipped = batch.len() - to_fetch.len();
            let outcomes = if to_fetch.is_empty() {
                Vec::new()
            } else {
                self.pool.fetch_batch(&to_fetch).await
            };

            self.transition(PipelineState::Committing, progress);
            let merged = merge_batch(&mut store, outcomes, &self.rules, shape);
            for (key, reason) in &merged.missing {
                warn!(%key, %reason, "missing");
                progress.key_missing(*key, reason);
            }

            checkpoint.advance(last);
            self.storage
                .commit(&store, &checkpoint, pending_write || merged.stored > 0)?;
            pending_write = false;

            if self.index.is_last_key_of_partition(last) {
                info!(partition = last.partition, "partition complete");
            }

            let report = BatchReport {
                first,
                last,
                keys: batch.len(),
                fetched: merged.stored,
                skipped: batch_skipped,
                missing: merged.missing.len(),
                checkpoint,
            };
            progress.batch_committed(&report);

            fetched += merged.stored;
            skipped += batch_skipped;
            batches += 1;
            missing.extend(merged.missing);
        }

        // --- Done ---
        if pending_write {
            self.storage.commit(&store, &checkpoint, true)?;
        }
        if let Some(path) = &self.missing_path {
            let report = MissingReport::new(missing.iter().cloned());
            report.save(path)?;
            info!(path = %path.display(), missing = missing.len(), "wrote missing report");
        }

        self.transition(PipelineState::Done, progress);
        let summary = RunSummary {
            fetched,
            skipped,
            missing,
            batches,
            checkpoint,
            stored: store.len(),
            elapsed: start.elapsed(),
        };
        info!(
            fetched = summary.fetched,
            skipped = summary.skipped,
            missing = summary.missing.len(),
            batches = summary.batches,
            checkpoint = %summary.checkpoint,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "pipeline complete"
        );
        progress.done(&summary);
        Ok(summary)
    }
}
