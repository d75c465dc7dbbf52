use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;
use parking_lot::Mutex;

use crate::cache::{CacheRange, FrameCache, ranges_of};
use crate::foundation::core::ChannelLayout;
use crate::foundation::error::{MontageError, MontageResult};
use crate::frame::audio::AudioBuffer;
use crate::frame::frame::{Frame, pixel_count};

const INDEX_FILE: &str = "index.json";
const MAGIC: &[u8; 4] = b"MTGF";
const FORMAT_VERSION: u8 = 1;
const READ_ATTEMPTS: u32 = 3;

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct DiskIndex {
    version: u64,
    max_bytes: u64,
    /// frame number -> payload bytes
    frames: BTreeMap<u64, u64>,
    #[serde(default)]
    ranges: Vec<CacheRange>,
}

impl DiskIndex {
    fn bytes(&self) -> u64 {
        self.frames.values().sum()
    }
}

/// Frame cache persisted as one file per frame plus a JSON index.
///
/// The index records frame sizes, contiguous ranges and the version token, so counts and range
/// queries never touch frame files. Frames are encoded and decoded outside the lock; only the
/// final rename, unlinks and index rewrite happen while it is held.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    inner: Mutex<DiskIndex>,
    tmp_seq: AtomicU64,
}

impl DiskCache {
    /// Open (or create) a cache directory, reloading an existing index.
    pub fn open(dir: impl Into<PathBuf>) -> MontageResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create cache dir '{}'", dir.display()))?;

        let index_path = dir.join(INDEX_FILE);
        let index = match std::fs::read_to_string(&index_path) {
            Ok(text) => serde_json::from_str::<DiskIndex>(&text)
                .map_err(|e| MontageError::invalid_json("DiskCache::open", e.to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => DiskIndex::default(),
            Err(e) => {
                return Err(anyhow::Error::from(e)
                    .context(format!("read cache index '{}'", index_path.display()))
                    .into());
            }
        };
        tracing::debug!(dir = %dir.display(), frames = index.frames.len(), "opened disk cache");

        Ok(Self {
            dir,
            inner: Mutex::new(index),
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Open a cache directory and apply a byte budget.
    pub fn with_max_bytes(dir: impl Into<PathBuf>, max_bytes: u64) -> MontageResult<Self> {
        let cache = Self::open(dir)?;
        cache.set_max_bytes(max_bytes)?;
        Ok(cache)
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached frame numbers in ascending order.
    pub fn frame_numbers(&self) -> Vec<u64> {
        self.inner.lock().frames.keys().copied().collect()
    }

    fn frame_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("frame-{number}.bin"))
    }

    fn unlink(&self, number: u64) -> MontageResult<()> {
        let path = self.frame_path(number);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::from(e)
                .context(format!("remove cached frame '{}'", path.display()))
                .into()),
        }
    }

    fn persist(&self, index: &mut DiskIndex) -> MontageResult<()> {
        index.ranges = ranges_of(index.frames.keys().copied());
        let text = serde_json::to_string(&*index).context("serialize cache index")?;
        let tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));
        std::fs::write(&tmp, text)
            .with_context(|| format!("write cache index '{}'", tmp.display()))?;
        std::fs::rename(&tmp, self.dir.join(INDEX_FILE)).context("publish cache index")?;
        Ok(())
    }

    fn evict_to_budget(&self, index: &mut DiskIndex) -> MontageResult<usize> {
        let mut evicted = 0;
        while index.max_bytes > 0 && index.bytes() > index.max_bytes {
            let Some((number, _)) = index.frames.pop_first() else {
                break;
            };
            self.unlink(number)?;
            index.version += 1;
            evicted += 1;
        }
        Ok(evicted)
    }
}

impl FrameCache for DiskCache {
    fn kind(&self) -> &'static str {
        "disk"
    }

    fn add(&self, frame: Arc<Frame>) -> MontageResult<()> {
        let number = frame.number;
        let encoded = encode_frame(&frame);
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!("frame-{number}.bin.tmp{seq}"));
        std::fs::write(&tmp, &encoded)
            .with_context(|| format!("write cached frame '{}'", tmp.display()))?;

        let mut index = self.inner.lock();
        std::fs::rename(&tmp, self.frame_path(number))
            .with_context(|| format!("publish cached frame {number}"))?;
        index.frames.insert(number, frame.bytes());
        index.version += 1;
        let evicted = self.evict_to_budget(&mut index)?;
        if evicted > 0 {
            tracing::debug!(number, evicted, "disk cache over budget");
        }
        self.persist(&mut index)
    }

    fn get_frame(&self, number: u64) -> MontageResult<Option<Arc<Frame>>> {
        let path = self.frame_path(number);
        let mut attempts = 0;
        let data = loop {
            if !self.inner.lock().frames.contains_key(&number) {
                return Ok(None);
            }
            match std::fs::read(&path) {
                Ok(data) => break data,
                // Evicted (and possibly re-added) between the index check and the read.
                Err(e) if e.kind() == ErrorKind::NotFound && attempts < READ_ATTEMPTS => {
                    attempts += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(MontageError::invalid_file(format!(
                        "cached frame {number} is indexed but '{}' is missing",
                        path.display()
                    )));
                }
                Err(e) => {
                    return Err(anyhow::Error::from(e)
                        .context(format!("read cached frame '{}'", path.display()))
                        .into());
                }
            }
        };
        let frame = decode_frame(&data).map_err(|msg| {
            MontageError::invalid_file(format!("cached frame '{}': {msg}", path.display()))
        })?;
        Ok(Some(Arc::new(frame)))
    }

    fn remove(&self, number: u64) -> MontageResult<()> {
        let mut index = self.inner.lock();
        if index.frames.remove(&number).is_some() {
            self.unlink(number)?;
            index.version += 1;
            self.persist(&mut index)?;
        }
        Ok(())
    }

    fn remove_range(&self, start: u64, end: u64) -> MontageResult<()> {
        if start > end {
            return Ok(());
        }
        let mut index = self.inner.lock();
        let doomed: Vec<u64> = index.frames.range(start..=end).map(|(n, _)| *n).collect();
        if doomed.is_empty() {
            return Ok(());
        }
        for n in doomed {
            index.frames.remove(&n);
            self.unlink(n)?;
            index.version += 1;
        }
        self.persist(&mut index)
    }

    fn count(&self) -> usize {
        self.inner.lock().frames.len()
    }

    fn clear(&self) -> MontageResult<()> {
        let mut index = self.inner.lock();
        let numbers: Vec<u64> = index.frames.keys().copied().collect();
        for n in numbers {
            self.unlink(n)?;
        }
        index.frames.clear();
        index.version += 1;
        self.persist(&mut index)
    }

    fn set_max_bytes(&self, max_bytes: u64) -> MontageResult<()> {
        let mut index = self.inner.lock();
        index.max_bytes = max_bytes;
        self.evict_to_budget(&mut index)?;
        self.persist(&mut index)
    }

    fn max_bytes(&self) -> u64 {
        self.inner.lock().max_bytes
    }

    fn bytes(&self) -> u64 {
        self.inner.lock().bytes()
    }

    fn smallest_frame(&self) -> MontageResult<Option<Arc<Frame>>> {
        let first = self.inner.lock().frames.keys().next().copied();
        match first {
            Some(n) => self.get_frame(n),
            None => Ok(None),
        }
    }

    fn version(&self) -> u64 {
        self.inner.lock().version
    }

    fn ranges(&self) -> Vec<CacheRange> {
        ranges_of(self.inner.lock().frames.keys().copied())
    }
}

fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + frame.bytes() as usize);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&frame.number.to_le_bytes());
    out.extend_from_slice(&frame.width().to_le_bytes());
    out.extend_from_slice(&frame.height().to_le_bytes());
    match frame.image() {
        Some(img) => {
            out.push(1);
            out.extend_from_slice(img);
        }
        None => out.push(0),
    }
    match frame.audio() {
        Some(audio) => {
            out.push(1);
            out.extend_from_slice(&audio.sample_rate.to_le_bytes());
            out.push(audio.layout.to_u8());
            out.extend_from_slice(&(audio.sample_count() as u32).to_le_bytes());
            for ch in &audio.channels {
                for s in ch {
                    out.extend_from_slice(&s.to_le_bytes());
                }
            }
        }
        None => out.push(0),
    }
    out
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| format!("truncated at byte {}", self.pos))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, String> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(b))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(b))
    }
}

fn decode_frame(buf: &[u8]) -> Result<Frame, String> {
    let mut r = ByteReader { buf, pos: 0 };
    if r.take(4)? != MAGIC {
        return Err("bad magic".to_string());
    }
    let version = r.u8()?;
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }
    let number = r.u64()?;
    let width = r.u32()?;
    let height = r.u32()?;
    let mut frame = Frame::metadata_only(number, width, height);
    if r.u8()? == 1 {
        let img = r.take(pixel_count(width, height) * 4)?.to_vec();
        frame
            .set_image(width, height, img)
            .map_err(|e| e.to_string())?;
    }
    if r.u8()? == 1 {
        let sample_rate = r.u32()?;
        let layout = ChannelLayout::from_u8(r.u8()?).ok_or("unknown channel layout")?;
        let samples = r.u32()? as usize;
        let mut channels = Vec::with_capacity(usize::from(layout.channel_count()));
        for _ in 0..layout.channel_count() {
            let raw = r.take(samples * 4)?;
            channels.push(
                raw.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            );
        }
        let audio =
            AudioBuffer::from_channels(sample_rate, layout, channels).map_err(|e| e.to_string())?;
        frame.set_audio(Some(audio));
    }
    if r.pos != buf.len() {
        return Err("trailing bytes".to_string());
    }
    Ok(frame)
}

#[cfg(test)]
#[path = "../../tests/unit/cache/disk.rs"]
mod tests;
