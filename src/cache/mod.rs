//! Frame caches keyed by frame number.
//!
//! Both variants share one contract: unique keys, last-write-wins on duplicate adds,
//! smallest-numbered-first eviction under a byte budget, and a version counter bumped on every
//! structural change.

use std::sync::Arc;

use crate::foundation::error::MontageResult;
use crate::frame::frame::Frame;

/// Disk-backed cache.
pub mod disk;
/// In-memory cache.
pub mod memory;

/// Inclusive run of consecutive cached frame numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheRange {
    /// First frame number in the run.
    pub start: u64,
    /// Last frame number in the run.
    pub end: u64,
}

/// Thread-safe frame store contract shared by memory and disk caches.
pub trait FrameCache: Send + Sync + std::fmt::Debug {
    /// Short type name used in JSON descriptions.
    fn kind(&self) -> &'static str;
    /// Insert or replace the frame stored under `frame.number`, then enforce the byte budget.
    fn add(&self, frame: Arc<Frame>) -> MontageResult<()>;
    /// Look up a frame.
    fn get_frame(&self, number: u64) -> MontageResult<Option<Arc<Frame>>>;
    /// Evict one frame; absent numbers are ignored.
    fn remove(&self, number: u64) -> MontageResult<()>;
    /// Evict every frame in `start..=end`.
    fn remove_range(&self, start: u64, end: u64) -> MontageResult<()>;
    /// Number of cached frames.
    fn count(&self) -> usize;
    /// Evict everything.
    fn clear(&self) -> MontageResult<()>;
    /// Set the byte budget (`0` = unlimited) and evict down to it.
    fn set_max_bytes(&self, max_bytes: u64) -> MontageResult<()>;
    /// Current byte budget (`0` = unlimited).
    fn max_bytes(&self) -> u64;
    /// Total bytes currently cached.
    fn bytes(&self) -> u64;
    /// Lowest-numbered cached frame.
    fn smallest_frame(&self) -> MontageResult<Option<Arc<Frame>>>;
    /// Counter incremented on every structural change.
    fn version(&self) -> u64;
    /// Contiguous runs of cached frame numbers, ascending.
    fn ranges(&self) -> Vec<CacheRange>;

    /// `{"type", "version", "ranges"}` description of the cache contents.
    fn json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.kind(),
            "version": self.version().to_string(),
            "ranges": self.ranges(),
        })
    }
}

pub(crate) fn ranges_of(numbers: impl IntoIterator<Item = u64>) -> Vec<CacheRange> {
    let mut out: Vec<CacheRange> = Vec::new();
    for n in numbers {
        match out.last_mut() {
            Some(run) if run.end + 1 == n => run.end = n,
            _ => out.push(CacheRange { start: n, end: n }),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/cache/ranges.rs"]
mod tests;
