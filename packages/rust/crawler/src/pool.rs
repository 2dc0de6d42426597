//! Bounded-concurrency fetching with per-key retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use versefetch_shared::{FieldSet, Key, PipelineConfig};

use crate::adapters::Extractor;
use crate::fetcher::{FetchError, Fetcher};

/// Retry budget applied to every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Upper bound on a single attempt.
    pub timeout: Duration,
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay,
            timeout: config.timeout,
        }
    }
}

/// Result of fetching one key. Failures never escape as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Raw (not yet normalized) field sets extracted from the page.
    Fetched(Vec<FieldSet>),
    /// Every attempt failed; `reason` describes the last failure.
    Missing { reason: String, attempts: u32 },
}

/// Runs fetch + extract for a batch of keys, at most `concurrency` at a time.
pub struct FetchWorkerPool<F: Fetcher> {
    fetcher: Arc<F>,
    extractor: Arc<dyn Extractor>,
    semaphore: Arc<Semaphore>,
    policy: RetryPolicy,
}

impl<F: Fetcher> FetchWorkerPool<F> {
    pub fn new(
        fetcher: F,
        extractor: Arc<dyn Extractor>,
        concurrency: usize,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            extractor,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
        }
    }

    pub fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch every key and wait for all of them.
    ///
    /// Outcomes are returned in the order of `keys`.
    #[instrument(skip_all, fields(keys = keys.len(), extractor = self.extractor.name()))]
    pub async fn fetch_batch(&self, keys: &[Key]) -> Vec<(Key, FetchOutcome)> {
        let mut handles = Vec::with_capacity(keys.len());

        for &key in keys {
            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&self.semaphore);
            let policy = self.policy;

            handles.push((
                key,
                tokio::spawn(async move {
                    fetch_with_retry(fetcher.as_ref(), extractor.as_ref(), &semaphore, key, policy)
                        .await
                }),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(%key, error = %e, "fetch task failed");
                    FetchOutcome::Missing {
                        reason: format!("worker task failed: {e}"),
                        attempts: 0,
                    }
                }
            };
            outcomes.push((key, outcome));
        }
        outcomes
    }
}

async fn fetch_with_retry<F: Fetcher>(
    fetcher: &F,
    extractor: &dyn Extractor,
    semaphore: &Semaphore,
    key: Key,
    policy: RetryPolicy,
) -> FetchOutcome {
    let mut last_error = FetchError::NoMatch;

    for attempt in 1..=policy.max_attempts {
        let result = {
            let Ok(_permit) = semaphore.acquire().await else {
                return FetchOutcome::Missing {
                    reason: "worker pool closed".to_string(),
                    attempts: attempt - 1,
                };
            };
            attempt_once(fetcher, extractor, key, policy.timeout).await
        };

        match result {
            Ok(sets) => {
                debug!(%key, attempt, sets = sets.len(), "fetched");
                return FetchOutcome::Fetched(sets);
            }
            Err(e) => {
                debug!(%key, attempt, error = %e, "attempt failed");
                last_error = e;
            }
        }

        if attempt < policy.max_attempts && !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
    }

    warn!(%key, attempts = policy.max_attempts, error = %last_error, "giving up on key");
    FetchOutcome::Missing {
        reason: last_error.to_string(),
        attempts: policy.max_attempts,
    }
}

async fn attempt_once<F: Fetcher>(
    fetcher: &F,
    extractor: &dyn Extractor,
    key: Key,
    timeout: Duration,
) -> Result<Vec<FieldSet>, FetchError> {
    let body = tokio::time::timeout(timeout, fetcher.fetch(key, timeout))
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;
    extractor.extract_for(key, &body).ok_or(FetchError::NoMatch)
}
