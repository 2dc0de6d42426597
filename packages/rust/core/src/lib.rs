//! Core pipeline orchestration for versefetch.
//!
//! - [`keyspace`]: the ordered `(partition, item)` keyspace
//! - [`pipeline`]: the resumable, checkpointed batch controller
//! - [`audit`]: completeness audit of a records file

pub mod audit;
pub mod keyspace;
pub mod pipeline;

pub use audit::{AuditReport, audit};
pub use keyspace::{KeyspaceIndex, KeysAfter};
pub use pipeline::{
    BatchReport, MergeResult, PipelineController, PipelineState, ProgressReporter, ResumeInfo,
    RunSummary, SilentProgress, merge_batch,
};
