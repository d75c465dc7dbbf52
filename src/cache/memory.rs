use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{CacheRange, FrameCache, ranges_of};
use crate::foundation::error::MontageResult;
use crate::frame::frame::Frame;

#[derive(Debug, Default)]
struct Inner {
    frames: BTreeMap<u64, Arc<Frame>>,
    bytes: u64,
    max_bytes: u64,
    version: u64,
}

impl Inner {
    fn insert(&mut self, frame: Arc<Frame>) {
        self.bytes += frame.bytes();
        if let Some(old) = self.frames.insert(frame.number, frame) {
            self.bytes = self.bytes.saturating_sub(old.bytes());
        }
        self.version += 1;
    }

    fn remove(&mut self, number: u64) -> bool {
        match self.frames.remove(&number) {
            Some(old) => {
                self.bytes = self.bytes.saturating_sub(old.bytes());
                self.version += 1;
                true
            }
            None => false,
        }
    }

    fn evict_to_budget(&mut self) -> usize {
        let mut evicted = 0;
        while self.max_bytes > 0 && self.bytes > self.max_bytes {
            let Some((number, old)) = self.frames.pop_first() else {
                break;
            };
            self.bytes = self.bytes.saturating_sub(old.bytes());
            self.version += 1;
            evicted += 1;
            tracing::trace!(number, "memory cache evicted frame");
        }
        evicted
    }
}

/// Byte-budgeted in-memory frame cache.
///
/// All state sits behind one mutex held only for map updates; frames are shared out as
/// `Arc<Frame>` so no payload is copied under the lock.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Unlimited cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache with a byte budget (`0` = unlimited).
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        let cache = Self::new();
        cache.inner.lock().max_bytes = max_bytes;
        cache
    }

    /// Cached frame numbers in ascending order.
    pub fn frame_numbers(&self) -> Vec<u64> {
        self.inner.lock().frames.keys().copied().collect()
    }
}

impl FrameCache for MemoryCache {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn add(&self, frame: Arc<Frame>) -> MontageResult<()> {
        let number = frame.number;
        let mut inner = self.inner.lock();
        inner.insert(frame);
        let evicted = inner.evict_to_budget();
        if evicted > 0 {
            tracing::debug!(number, evicted, bytes = inner.bytes, "memory cache over budget");
        }
        Ok(())
    }

    fn get_frame(&self, number: u64) -> MontageResult<Option<Arc<Frame>>> {
        Ok(self.inner.lock().frames.get(&number).cloned())
    }

    fn remove(&self, number: u64) -> MontageResult<()> {
        self.inner.lock().remove(number);
        Ok(())
    }

    fn remove_range(&self, start: u64, end: u64) -> MontageResult<()> {
        if start > end {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        let doomed: Vec<u64> = inner.frames.range(start..=end).map(|(n, _)| *n).collect();
        for n in doomed {
            inner.remove(n);
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.inner.lock().frames.len()
    }

    fn clear(&self) -> MontageResult<()> {
        let mut inner = self.inner.lock();
        inner.frames.clear();
        inner.bytes = 0;
        inner.version += 1;
        Ok(())
    }

    fn set_max_bytes(&self, max_bytes: u64) -> MontageResult<()> {
        let mut inner = self.inner.lock();
        inner.max_bytes = max_bytes;
        inner.evict_to_budget();
        Ok(())
    }

    fn max_bytes(&self) -> u64 {
        self.inner.lock().max_bytes
    }

    fn bytes(&self) -> u64 {
        self.inner.lock().bytes
    }

    fn smallest_frame(&self) -> MontageResult<Option<Arc<Frame>>> {
        Ok(self
            .inner
            .lock()
            .frames
            .first_key_value()
            .map(|(_, f)| Arc::clone(f)))
    }

    fn version(&self) -> u64 {
        self.inner.lock().version
    }

    fn ranges(&self) -> Vec<CacheRange> {
        ranges_of(self.inner.lock().frames.keys().copied())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/memory.rs"]
mod tests;
