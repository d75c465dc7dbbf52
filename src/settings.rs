use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{MontageError, MontageResult};

/// Finished-frame cache configuration of a timeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Byte budget (`0` = unlimited).
    pub max_bytes: u64,
    /// Directory for a disk-backed cache; `None` keeps frames in memory.
    pub disk_path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_bytes: 512 * 1024 * 1024,
            disk_path: None,
        }
    }
}

/// Explicit engine configuration handed to [`Timeline::new`](crate::Timeline::new).
///
/// Nothing inside the engine reads process-wide state; embedding applications build one of these
/// (usually `Settings::default()` or a JSON file) at their entry point.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Worker threads for range rendering (`None` = rayon default).
    pub threads: Option<usize>,
    /// Frames per parallel render chunk.
    pub chunk_size: usize,
    /// Timeline cache.
    pub cache: CacheSettings,
    /// Byte budget of each clip's cache (`0` = unlimited).
    pub clip_cache_max_bytes: u64,
    /// Let at most one thread compute a given frame number at a time.
    pub dedupe_inflight: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threads: None,
            chunk_size: 16,
            cache: CacheSettings::default(),
            clip_cache_max_bytes: crate::clip::DEFAULT_CLIP_CACHE_BYTES,
            dedupe_inflight: true,
        }
    }
}

impl Settings {
    /// Parse a settings document; absent keys keep their defaults.
    pub fn from_json_str(s: &str) -> MontageResult<Self> {
        let settings: Self = serde_json::from_str(s)
            .map_err(|e| MontageError::invalid_json("Settings::from_json", e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a settings file.
    pub fn from_path(path: impl AsRef<Path>) -> MontageResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read settings file '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Reject values no render can honour.
    pub fn validate(&self) -> MontageResult<()> {
        if self.threads == Some(0) {
            return Err(MontageError::validation("settings 'threads' must be >= 1 when set"));
        }
        Ok(())
    }

    /// Serialized form.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

#[cfg(test)]
#[path = "../tests/unit/settings.rs"]
mod tests;
