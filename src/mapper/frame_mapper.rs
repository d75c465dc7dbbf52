use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::FrameCache;
use crate::cache::memory::MemoryCache;
use crate::foundation::error::{MontageError, MontageResult};
use crate::frame::audio::{AudioBuffer, samples_per_frame};
use crate::frame::frame::Frame;
use crate::mapper::cadence::build_mapping;
use crate::mapper::{MappedFrame, MapperTarget, SampleRange};
use crate::reader::{Reader, ReaderInfo};

/// Budget of the mapper's finished-frame cache unless overridden.
pub const DEFAULT_MAPPER_CACHE_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug)]
struct MapperState {
    target: MapperTarget,
    mapping: Option<Arc<Vec<MappedFrame>>>,
}

/// Converts frame numbers (and audio) from a source stream into a target rate and format.
///
/// The mapping table is built lazily and rebuilt after [`FrameMapper::change_mapping`]; readers
/// of the table always see a complete `Arc` snapshot. Finished frames are cached by target frame
/// number.
#[derive(Debug)]
pub struct FrameMapper {
    source: ReaderInfo,
    state: RwLock<MapperState>,
    cache: MemoryCache,
}

impl FrameMapper {
    /// Mapper from `source` to `target`.
    pub fn new(source: ReaderInfo, target: MapperTarget) -> MontageResult<Self> {
        source.validate()?;
        target.validate()?;
        Ok(Self {
            source,
            state: RwLock::new(MapperState {
                target,
                mapping: None,
            }),
            cache: MemoryCache::with_max_bytes(DEFAULT_MAPPER_CACHE_BYTES),
        })
    }

    /// Replace the finished-frame cache budget (`0` = unlimited).
    pub fn with_cache_max_bytes(self, max_bytes: u64) -> MontageResult<Self> {
        self.cache.set_max_bytes(max_bytes)?;
        Ok(self)
    }

    /// Source stream descriptor.
    pub fn source(&self) -> &ReaderInfo {
        &self.source
    }

    /// Current target format.
    pub fn target(&self) -> MapperTarget {
        self.state.read().target
    }

    /// Swap the target format; the mapping is rebuilt on next use and cached frames dropped.
    pub fn change_mapping(&self, target: MapperTarget) -> MontageResult<()> {
        target.validate()?;
        {
            let mut state = self.state.write();
            state.target = target;
            state.mapping = None;
        }
        self.cache.clear()?;
        tracing::debug!(fps = %target.fps, pulldown = ?target.pulldown, "frame mapping changed");
        Ok(())
    }

    fn mapping(&self) -> Arc<Vec<MappedFrame>> {
        if let Some(mapping) = &self.state.read().mapping {
            return Arc::clone(mapping);
        }
        let mut state = self.state.write();
        if let Some(mapping) = &state.mapping {
            return Arc::clone(mapping);
        }
        let mapping = Arc::new(build_mapping(&self.source, &state.target));
        tracing::debug!(
            source_frames = self.source.video_length,
            target_frames = mapping.len(),
            "rebuilt frame mapping"
        );
        state.mapping = Some(Arc::clone(&mapping));
        mapping
    }

    /// Number of target frames.
    pub fn len(&self) -> u64 {
        self.mapping().len() as u64
    }

    /// `true` when the source maps to no target frames.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mapping for 1-based target frame `number`.
    pub fn get_mapped_frame(&self, number: u64) -> MontageResult<MappedFrame> {
        let mapping = self.mapping();
        let len = mapping.len() as u64;
        if number < 1 || number > len {
            return Err(MontageError::out_of_bounds_frame(number, len));
        }
        Ok(mapping[(number - 1) as usize])
    }

    /// Human-readable dump of the whole mapping, one target frame per line.
    pub fn mapping_lines(&self) -> Vec<String> {
        self.mapping()
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let s = &m.samples;
                format!(
                    "target {:>5}: odd {:>5} even {:>5} | audio {}:{} .. {}:{} ({} samples)",
                    i + 1,
                    m.odd.frame,
                    m.even.frame,
                    s.frame_start,
                    s.sample_start,
                    s.frame_end,
                    s.sample_end,
                    s.total
                )
            })
            .collect()
    }

    /// Drop cached finished frames.
    pub fn clear_cache(&self) -> MontageResult<()> {
        self.cache.clear()
    }

    fn clamp_source(&self, number: u64) -> u64 {
        number.clamp(1, self.source.video_length.max(1))
    }

    /// Produce target frame `number` by pulling the mapped fields and audio from `reader`.
    #[tracing::instrument(skip(self, reader))]
    pub fn get_frame(&self, reader: &dyn Reader, number: u64) -> MontageResult<Arc<Frame>> {
        if let Some(hit) = self.cache.get_frame(number)? {
            return Ok(hit);
        }
        let mapped = self.get_mapped_frame(number)?;
        let target = self.target();
        let mut fetched = Fetched::new(reader);

        let odd = fetched.get(self.clamp_source(mapped.odd.frame))?;
        if self.is_pass_through(&target, &mapped, &odd, number) {
            self.cache.add(Arc::clone(&odd))?;
            return Ok(odd);
        }

        let mut frame = Frame::metadata_only(number, odd.width(), odd.height());
        if let Some(img) = odd.image() {
            frame.set_image(odd.width(), odd.height(), img.to_vec())?;
        }
        if mapped.even.frame != mapped.odd.frame {
            let even = fetched.get(self.clamp_source(mapped.even.frame))?;
            interlace(&mut frame, &even);
        }

        if self.source.has_audio {
            let gathered = self.gather_samples(&mut fetched, &mapped.samples)?;
            let count = samples_per_frame(number, target.fps, target.sample_rate, target.channels);
            let audio = if gathered.sample_rate != target.sample_rate
                || gathered.sample_count() != count
            {
                gathered.resampled(target.sample_rate, count)
            } else {
                gathered
            };
            frame.set_audio(Some(audio.remixed(target.channel_layout)));
        }

        let frame = Arc::new(frame);
        self.cache.add(Arc::clone(&frame))?;
        Ok(frame)
    }

    fn is_pass_through(
        &self,
        target: &MapperTarget,
        mapped: &MappedFrame,
        odd: &Frame,
        number: u64,
    ) -> bool {
        let src = &self.source;
        let same_audio = !src.has_audio
            || (target.sample_rate == src.sample_rate
                && target.channel_layout == src.channel_layout
                && odd
                    .audio()
                    .is_some_and(|a| a.sample_count() == mapped.samples.total)
                && mapped.samples.frame_start == mapped.odd.frame
                && mapped.samples.sample_start == 0);
        same_audio
            && odd.number == number
            && mapped.even.frame == mapped.odd.frame
            && target.fps.reduced() == src.fps.reduced()
    }

    fn gather_samples(
        &self,
        fetched: &mut Fetched<'_>,
        range: &SampleRange,
    ) -> MontageResult<AudioBuffer> {
        let src = &self.source;
        let mut channels: Vec<Vec<f32>> =
            vec![Vec::with_capacity(range.total); usize::from(src.channel_layout.channel_count())];
        let mut copied = 0usize;
        let mut current = range.frame_start;
        while copied < range.total && current <= range.frame_end {
            let expected = samples_per_frame(current, src.fps, src.sample_rate, src.channels);
            let begin = if current == range.frame_start {
                range.sample_start
            } else {
                0
            };
            let end = if current == range.frame_end {
                range.sample_end + 1
            } else {
                expected
            };
            let want = end.saturating_sub(begin).min(range.total - copied);

            let source_audio = if current >= 1 && current <= src.video_length {
                fetched
                    .get(current)?
                    .audio()
                    .map(|a| a.remixed(src.channel_layout))
            } else {
                None
            };
            for (ch, out) in channels.iter_mut().enumerate() {
                let samples = source_audio
                    .as_ref()
                    .and_then(|a| a.channels.get(ch))
                    .map(|c| c.as_slice())
                    .unwrap_or(&[]);
                out.extend((begin..begin + want).map(|i| samples.get(i).copied().unwrap_or(0.0)));
            }
            copied += want;
            current += 1;
        }
        for out in &mut channels {
            out.resize(range.total, 0.0);
        }
        AudioBuffer::from_channels(src.sample_rate, src.channel_layout, channels)
    }
}

/// Source frames fetched while producing one target frame.
struct Fetched<'a> {
    reader: &'a dyn Reader,
    frames: Vec<Arc<Frame>>,
}

impl<'a> Fetched<'a> {
    fn new(reader: &'a dyn Reader) -> Self {
        Self {
            reader,
            frames: Vec::with_capacity(3),
        }
    }

    fn get(&mut self, number: u64) -> MontageResult<Arc<Frame>> {
        if let Some(f) = self.frames.iter().find(|f| f.number == number) {
            return Ok(Arc::clone(f));
        }
        let frame = self.reader.get_frame(number)?;
        self.frames.push(Arc::clone(&frame));
        Ok(frame)
    }
}

/// Replace rows `1, 3, 5, ..` of `frame` with the same rows of `even`.
fn interlace(frame: &mut Frame, even: &Frame) {
    let (Some(src), true) = (
        even.image(),
        even.width() == frame.width() && even.height() == frame.height(),
    ) else {
        return;
    };
    let stride = frame.width() as usize * 4;
    if stride == 0 {
        return;
    }
    let dst = frame.image_mut();
    for (y, (d, s)) in dst
        .chunks_exact_mut(stride)
        .zip(src.chunks_exact(stride))
        .enumerate()
    {
        if y % 2 == 1 {
            d.copy_from_slice(s);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mapper/frame_mapper.rs"]
mod tests;
