//! Extractors: locate the raw text fields of one key inside a fetched page.
//!
//! Each source preset has a dedicated extractor. A generic
//! [`SelectorExtractor`] covers pages described entirely by configuration.

mod selector;
mod text;
mod word_by_word;

use std::sync::Arc;

use scraper::ElementRef;

use versefetch_shared::{
    FieldSet, Key, RecordShape, Result, SourceConfig, SourceKind, VerseFetchError,
};

pub use selector::SelectorExtractor;
pub use text::TextExtractor;
pub use word_by_word::WordByWordExtractor;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Pulls raw field sets out of a page body.
pub trait Extractor: Send + Sync {
    /// Extract zero or more field sets.
    ///
    /// Returns `None` when the expected content is not on the page at all;
    /// the pool treats that like a transient failure and retries.
    fn extract(&self, body: &str) -> Option<Vec<FieldSet>>;

    /// Extract the field sets belonging to `key`.
    ///
    /// Pages that list several keys override this to pick the right part.
    fn extract_for(&self, _key: Key, body: &str) -> Option<Vec<FieldSet>> {
        self.extract(body)
    }

    /// How the extracted sets are folded into a record.
    fn shape(&self) -> RecordShape;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

/// Build the extractor for a configured source.
pub fn for_source(source: &SourceConfig) -> Result<Arc<dyn Extractor>> {
    let extractor: Arc<dyn Extractor> = match source.kind {
        SourceKind::VerseText => Arc::new(TextExtractor::verse_text()),
        SourceKind::Indopak => Arc::new(TextExtractor::indopak()),
        SourceKind::WordByWord => Arc::new(WordByWordExtractor),
        SourceKind::Selector => {
            let config = source.selector.as_ref().ok_or_else(|| {
                VerseFetchError::config("source kind `selector` requires a [source.selector] table")
            })?;
            Arc::new(SelectorExtractor::new(config)?)
        }
    };
    Ok(extractor)
}

/// Concatenated, trimmed text content of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

pub(crate) fn has_content(set: &FieldSet) -> bool {
    set.values()
        .any(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
}
