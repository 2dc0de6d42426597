//! Shared types, error model, and configuration for versefetch.
//!
//! This crate is the foundation depended on by all other versefetch crates.
//! It provides:
//! - [`VerseFetchError`]: the unified error type
//! - Domain types ([`Key`], [`Record`], [`FieldSet`], [`RecordShape`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, KeyspaceConfig, PipelineConfig, PipelineSection, QURAN_VERSE_COUNTS,
    SelectorConfig, SourceConfig, SourceKind, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{Result, VerseFetchError};
pub use types::{FieldSet, Key, Record, RecordShape};
