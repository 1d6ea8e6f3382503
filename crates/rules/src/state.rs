//! JSON state buckets on disk.
//!
//! Every failure is recovered here: a missing file loads as the caller's
//! default, a corrupt or unreadable file loads as the default with a warning,
//! and a failed write is logged and otherwise ignored. A broken state file
//! must never stop the engine from starting cold.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

const RUN_STATE_FILE: &str = "run_state.json";
const CHAOS_STATE_FILE: &str = "chaos_state.json";
const MILESTONES_DIR: &str = "milestones";
const FALLBACK_DIR_NAME: &str = "speedwatch-state";

/// Load a JSON bucket, returning `default` when the file is missing,
/// unreadable or malformed.
pub fn load<T: DeserializeOwned>(path: &Path, default: T) -> T {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no state file yet, starting empty");
            return default;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read state file, starting empty");
            return default;
        }
    };

    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt state file, starting empty");
            default
        }
    }
}

/// [`load`] with `T::default()` as the fallback.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    load(path, T::default())
}

/// Write a JSON bucket as a whole-file replace (temp file + rename).
///
/// Returns whether the write landed. Failures are logged, never raised:
/// callers carry on with their in-memory state.
pub fn save<T: Serialize>(path: &Path, value: &T) -> bool {
    match try_save(path, value) {
        Ok(()) => true,
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to persist state file");
            false
        }
    }
}

fn try_save<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let data = serde_json::to_string_pretty(value)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Resolved location of all state buckets.
///
/// One fixed file per logical bucket, so every restart rediscovers the same
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// Use `root` as-is, without probing it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `preferred` if it can be created and written to, otherwise a
    /// directory under the OS temp dir.
    pub fn resolve(preferred: &Path) -> Self {
        match probe_writable(preferred) {
            Ok(()) => {
                info!(dir = %preferred.display(), "using state directory");
                Self::new(preferred)
            }
            Err(e) => {
                let fallback = std::env::temp_dir().join(FALLBACK_DIR_NAME);
                warn!(
                    preferred = %preferred.display(),
                    fallback = %fallback.display(),
                    error = %e,
                    "state directory not writable, falling back (state will not survive a container restart)"
                );
                if let Err(e) = fs::create_dir_all(&fallback) {
                    error!(dir = %fallback.display(), error = %e, "fallback state directory unavailable too");
                }
                Self::new(fallback)
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_state(&self) -> PathBuf {
        self.root.join(RUN_STATE_FILE)
    }

    pub fn chaos_state(&self) -> PathBuf {
        self.root.join(CHAOS_STATE_FILE)
    }

    /// Milestone bucket of one alert unit.
    pub fn milestones(&self, unit: &str) -> PathBuf {
        self.root
            .join(MILESTONES_DIR)
            .join(format!("{}.json", file_stem(unit)))
    }
}

fn probe_writable(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(".write-probe");
    fs::write(&probe, b"ok")?;
    fs::remove_file(&probe)
}

/// Keep unit names filesystem-safe. Distinct names can share a stem; the
/// registry rejects those.
pub fn file_stem(unit: &str) -> String {
    let stem: String = unit
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}
