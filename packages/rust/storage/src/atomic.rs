//! Write-temp-then-rename JSON persistence.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use versefetch_shared::{Result, VerseFetchError};

/// Outcome of reading a persisted file at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No file, or a blank one. Starts from empty state.
    Missing,
    /// Parsed successfully.
    Loaded,
    /// The file existed but could not be parsed; state was reset.
    Recovered { reason: String },
}

impl LoadStatus {
    pub fn is_recovered(&self) -> bool {
        matches!(self, LoadStatus::Recovered { .. })
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// The temp file lives next to the target so the final `rename` never
/// crosses a filesystem boundary. On any failure the temp file is removed
/// and the previous contents of `path` are left untouched.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| VerseFetchError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    if let Err(e) = write_temp(&tmp, value) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(VerseFetchError::io(path, e));
    }

    debug!(path = %path.display(), "replaced file atomically");
    Ok(())
}

fn write_temp<T: Serialize + ?Sized>(tmp: &Path, value: &T) -> Result<()> {
    let file = File::create(tmp).map_err(|e| VerseFetchError::io(tmp, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| VerseFetchError::Storage(format!("serializing {}: {e}", tmp.display())))?;
    writer.flush().map_err(|e| VerseFetchError::io(tmp, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| VerseFetchError::io(tmp, e))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::now_v7()))
}

/// Read a JSON file, degrading absent, blank or corrupt content to `None`.
///
/// Only I/O failures other than "not found" (permissions, a directory in
/// place of the file) are returned as errors.
pub fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Result<(Option<T>, LoadStatus)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((None, LoadStatus::Missing));
        }
        Err(e) => return Err(VerseFetchError::io(path, e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok((None, LoadStatus::Missing));
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok((Some(value), LoadStatus::Loaded)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt state file, starting from empty");
            Ok((
                None,
                LoadStatus::Recovered {
                    reason: e.to_string(),
                },
            ))
        }
    }
}
