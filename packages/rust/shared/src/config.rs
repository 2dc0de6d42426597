//! Application configuration for versefetch.
//!
//! User config lives at `~/.versefetch/versefetch.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerseFetchError};
use crate::types::RecordShape;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "versefetch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".versefetch";

/// Verse counts of the 114 surahs, in order.
pub const QURAN_VERSE_COUNTS: [u32; 114] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109, 123, 111, 43, 52, 99, 128, 111, 110, 98, 135,
    112, 78, 118, 64, 77, 227, 93, 88, 69, 60, 34, 30, 73, 54, 45, 83, 182, 88, 75, 85, 54, 53,
    89, 59, 37, 35, 38, 29, 18, 45, 60, 49, 62, 55, 78, 96, 29, 22, 24, 13, 14, 11, 11, 18, 12,
    12, 30, 52, 52, 44, 28, 28, 20, 56, 40, 31, 50, 40, 46, 42, 29, 19, 36, 25, 22, 17, 19, 26,
    30, 20, 15, 21, 11, 8, 8, 19, 5, 8, 8, 11, 11, 8, 3, 9, 5, 4, 7, 3, 6, 3, 5, 4, 5, 6,
];

// ---------------------------------------------------------------------------
// Config structs (matching versefetch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Batch, retry and output settings.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// The partition → item-count table.
    #[serde(default)]
    pub keyspace: KeyspaceConfig,

    /// Where and how records are fetched.
    #[serde(default)]
    pub source: SourceConfig,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Maximum concurrent fetches within one batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Keys per batch. Defaults to `concurrency`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Total attempts per key before it is recorded as missing.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts for the same key.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Records file (nested partition → item → record JSON).
    #[serde(default = "default_records_path")]
    pub records_path: String,

    /// Progress file (`{ partition, item }` JSON).
    #[serde(default = "default_progress_path")]
    pub progress_path: String,

    /// Optional end-of-run report listing missing keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_path: Option<String>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: None,
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            records_path: default_records_path(),
            progress_path: default_progress_path(),
            missing_path: None,
        }
    }
}

fn default_concurrency() -> usize {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_records_path() -> String {
    "versefetch-data/records.json".into()
}
fn default_progress_path() -> String {
    "versefetch-data/progress.json".into()
}

/// `[keyspace]` section. Exactly one of `counts` / `preset` is used;
/// explicit counts win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyspaceConfig {
    /// Named built-in count table (currently only `quran`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    /// Explicit item counts; index 0 is partition 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<Vec<u32>>,
}

impl Default for KeyspaceConfig {
    fn default() -> Self {
        Self {
            preset: Some("quran".into()),
            counts: None,
        }
    }
}

impl KeyspaceConfig {
    /// Resolve the count table. A missing or empty table is fatal.
    pub fn resolve_counts(&self) -> Result<Vec<u32>> {
        if let Some(counts) = &self.counts {
            if counts.is_empty() {
                return Err(VerseFetchError::config("keyspace.counts is empty"));
            }
            return Ok(counts.clone());
        }

        match self.preset.as_deref() {
            Some("quran") => Ok(QURAN_VERSE_COUNTS.to_vec()),
            Some(other) => Err(VerseFetchError::config(format!(
                "unknown keyspace preset `{other}` (expected `quran` or explicit counts)"
            ))),
            None => Err(VerseFetchError::config(
                "no count table configured: set keyspace.counts or keyspace.preset",
            )),
        }
    }
}

/// Which extractor a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Full verse text from the word-by-word library pages.
    #[default]
    VerseText,
    /// Arabic/Urdu word pairs, one token list per verse.
    WordByWord,
    /// IndoPak script verse text.
    Indopak,
    /// Generic row/field selectors from `[source.selector]`.
    Selector,
}

impl SourceKind {
    /// Default URL template for the built-in sources.
    pub fn default_url_template(self) -> Option<&'static str> {
        match self {
            SourceKind::VerseText | SourceKind::WordByWord => {
                Some("https://equranlibrary.com/wordbyword/nazar/maududi/{partition}/{item}")
            }
            SourceKind::Indopak => Some(
                "https://read.quranexplorer.com/{partition}/{item}/{item}/IndoPak/Mishari-Rashid/Hide/Tajweed-OFF",
            ),
            SourceKind::Selector => None,
        }
    }

    /// Default normalization rule set name.
    pub fn default_rules(self) -> &'static str {
        match self {
            SourceKind::VerseText | SourceKind::Selector => "standard",
            SourceKind::WordByWord => "plain",
            SourceKind::Indopak => "indopak",
        }
    }
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Extractor kind.
    #[serde(default)]
    pub kind: SourceKind,

    /// URL template with `{partition}` / `{item}` placeholders
    /// (`{partition:03}` zero-pads). Defaults per kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_template: Option<String>,

    /// Normalization rule set: `standard`, `indopak` or `plain`. Defaults per kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Selector rules for `kind = "selector"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            url_template: None,
            rules: None,
            user_agent: default_user_agent(),
            selector: None,
        }
    }
}

fn default_user_agent() -> String {
    concat!("versefetch/", env!("CARGO_PKG_VERSION")).into()
}

impl SourceConfig {
    /// The effective URL template.
    pub fn url_template(&self) -> Result<&str> {
        self.url_template
            .as_deref()
            .or_else(|| self.kind.default_url_template())
            .ok_or_else(|| {
                VerseFetchError::config("source.url_template is required for selector sources")
            })
    }

    /// The effective rule set name.
    pub fn rules(&self) -> &str {
        self.rules
            .as_deref()
            .unwrap_or_else(|| self.kind.default_rules())
    }
}

/// `[source.selector]` section.
///
/// A page may hold several rows. Without `row_id` a non-list source keeps
/// the first row with content, so pages listing more than one record need
/// `row_id` to pick the row belonging to the key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// CSS selector for one record row. Without it the whole page is one row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<String>,

    /// Key template the row's `id` attribute must equal, e.g.
    /// `"{partition:03}{item:03}"`. Rows with any other id are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,

    /// Keep every row as a token list instead of only the first row.
    #[serde(default)]
    pub list: bool,

    /// Field name → CSS selector, evaluated inside each row.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    /// Fields allowed to be absent (stored as `null`).
    #[serde(default)]
    pub optional: Vec<String>,

    /// Fields looked up in the element right after the row instead of the
    /// row itself (footnotes rendered as a separate row).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sibling: Vec<String>,

    /// CSS selector the following element must match for `sibling` fields
    /// to be read from it. Any element qualifies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_row: Option<String>,
}

impl SelectorConfig {
    /// Record shape implied by the selector layout.
    pub fn shape(&self) -> RecordShape {
        if self.list {
            RecordShape::Tokens
        } else {
            RecordShape::Fields
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Item count per partition; index 0 is partition 1.
    pub counts: Vec<u32>,
    /// Maximum concurrent fetches.
    pub concurrency: usize,
    /// Keys per batch.
    pub batch_size: usize,
    /// Total attempts per key.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Records file path.
    pub records_path: PathBuf,
    /// Progress file path.
    pub progress_path: PathBuf,
    /// Optional missing-keys report path.
    pub missing_path: Option<PathBuf>,
    /// Source definition.
    pub source: SourceConfig,
}

impl TryFrom<&AppConfig> for PipelineConfig {
    type Error = VerseFetchError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let p = &config.pipeline;
        let resolved = Self {
            counts: config.keyspace.resolve_counts()?,
            concurrency: p.concurrency,
            batch_size: p.batch_size.unwrap_or(p.concurrency),
            max_attempts: p.max_attempts,
            retry_delay: Duration::from_millis(p.retry_delay_ms),
            timeout: Duration::from_secs(p.timeout_secs),
            records_path: PathBuf::from(&p.records_path),
            progress_path: PathBuf::from(&p.progress_path),
            missing_path: p.missing_path.as_ref().map(PathBuf::from),
            source: config.source.clone(),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

impl PipelineConfig {
    /// Check option ranges. Call again after applying CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if self.counts.is_empty() {
            return Err(VerseFetchError::config("count table is empty"));
        }
        if self.concurrency == 0 {
            return Err(VerseFetchError::config("concurrency must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(VerseFetchError::config("batch_size must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(VerseFetchError::config("max_attempts must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(VerseFetchError::config("timeout_secs must be greater than 0"));
        }
        if self.records_path == self.progress_path {
            return Err(VerseFetchError::config(
                "records_path and progress_path must be different files",
            ));
        }
        if self.source.kind == SourceKind::Selector && self.source.selector.is_none() {
            return Err(VerseFetchError::config(
                "kind = \"selector\" requires a [source.selector] section",
            ));
        }
        self.source.url_template()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.versefetch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| VerseFetchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.versefetch/versefetch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| VerseFetchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        VerseFetchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| VerseFetchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| VerseFetchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| VerseFetchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("records_path"));
        assert!(toml_str.contains("preset = \"quran\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.concurrency, 5);
        assert_eq!(parsed.pipeline.max_attempts, 3);
        assert_eq!(parsed.source.kind, SourceKind::VerseText);
    }

    #[test]
    fn quran_table_has_6236_verses() {
        assert_eq!(QURAN_VERSE_COUNTS.len(), 114);
        assert_eq!(QURAN_VERSE_COUNTS.iter().sum::<u32>(), 6236);
    }

    #[test]
    fn explicit_counts_override_preset() {
        let toml_str = r#"
[keyspace]
preset = "quran"
counts = [2, 1]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.keyspace.resolve_counts().expect("counts"), vec![2, 1]);
    }

    #[test]
    fn missing_count_table_is_fatal() {
        let keyspace = KeyspaceConfig {
            preset: None,
            counts: None,
        };
        let err = keyspace.resolve_counts().unwrap_err();
        assert!(err.to_string().contains("no count table"));

        let keyspace = KeyspaceConfig {
            preset: None,
            counts: Some(vec![]),
        };
        assert!(keyspace.resolve_counts().is_err());

        let keyspace = KeyspaceConfig {
            preset: Some("bible".into()),
            counts: None,
        };
        assert!(keyspace.resolve_counts().unwrap_err().to_string().contains("bible"));
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::try_from(&app).expect("resolve");
        assert_eq!(pipeline.batch_size, 5);
        assert_eq!(pipeline.retry_delay, Duration::from_millis(1000));
        assert_eq!(pipeline.timeout, Duration::from_secs(30));
        assert_eq!(pipeline.counts.len(), 114);
        assert!(pipeline.missing_path.is_none());
    }

    #[test]
    fn selector_source_requires_selector_section() {
        let toml_str = r#"
[source]
kind = "selector"
url_template = "https://example.com/{partition}/{item}"
"#;
        let app: AppConfig = toml::from_str(toml_str).expect("parse");
        let err = PipelineConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("[source.selector]"));
    }

    #[test]
    fn selector_source_parses_fields() {
        let toml_str = r#"
[source]
kind = "selector"
url_template = "https://example.com/{partition}/{item}"

[source.selector]
row = ".row.mb-lg-6[id]"
row_id = "{partition:03}{item:03}"
fields = { arabic = ".txtArabicQuran", urdu = ".txtUrduQuran", hashiyah = ".col-lg-12 .txtUrdu" }
optional = ["hashiyah"]
sibling = ["hashiyah"]
sibling_row = ".row.mb-lg-6"
"#;
        let app: AppConfig = toml::from_str(toml_str).expect("parse");
        let pipeline = PipelineConfig::try_from(&app).expect("resolve");
        let selector = pipeline.source.selector.as_ref().expect("selector section");
        assert_eq!(selector.fields.len(), 3);
        assert_eq!(selector.row_id.as_deref(), Some("{partition:03}{item:03}"));
        assert_eq!(selector.sibling, vec!["hashiyah".to_string()]);
        assert_eq!(selector.sibling_row.as_deref(), Some(".row.mb-lg-6"));
        assert_eq!(selector.shape(), RecordShape::Fields);
        assert_eq!(pipeline.source.rules(), "standard");
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut app = AppConfig::default();
        app.pipeline.concurrency = 0;
        assert!(PipelineConfig::try_from(&app).is_err());
    }

    #[test]
    fn per_kind_defaults() {
        let source = SourceConfig {
            kind: SourceKind::Indopak,
            ..SourceConfig::default()
        };
        assert_eq!(source.rules(), "indopak");
        assert!(source.url_template().expect("template").contains("IndoPak"));

        let source = SourceConfig {
            kind: SourceKind::WordByWord,
            rules: Some("standard".into()),
            ..SourceConfig::default()
        };
        assert_eq!(source.rules(), "standard");
    }
}
