//! The timeline: output format, clips, timeline-level effects and the frame compositor.
//!
//! [`Timeline::get_frame`] is safe to call from many threads at once. Finished frames are cached
//! by frame number; with [`Settings::dedupe_inflight`] a cold frame is computed by one thread
//! while concurrent requesters for the same number wait for its result.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kurbo::Affine;
use parking_lot::Mutex;

use crate::animation::keyframe::Keyframe;
use crate::cache::FrameCache;
use crate::cache::disk::DiskCache;
use crate::cache::memory::MemoryCache;
use crate::clip::{Clip, VolumeMix, raster};
use crate::effects::registry::EffectRegistry;
use crate::effects::{Effect, composite, sort_timeline_effects};
use crate::foundation::core::{ChannelLayout, Fraction};
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::json::{apply_partial, merge_object};
use crate::frame::audio::samples_per_frame;
use crate::frame::frame::Frame;
use crate::reader::registry::ReaderRegistry;
use crate::reader::{Reader, ReaderInfo};
use crate::settings::Settings;

mod render;

pub use render::{RenderStats, RenderThreading};

/// Gain applied to every clip under [`VolumeMix::Reduce`] when several clips are audible.
const REDUCE_GAIN: f32 = 0.77;

/// Output format of a timeline; fixed while the timeline is open.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineInfo {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fraction,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count; must match `channel_layout`.
    pub channels: u16,
    /// Output channel layout.
    pub channel_layout: ChannelLayout,
}

impl TimelineInfo {
    /// Format with `channels` derived from `channel_layout`.
    pub fn new(
        width: u32,
        height: u32,
        fps: Fraction,
        sample_rate: u32,
        channel_layout: ChannelLayout,
    ) -> Self {
        Self {
            width,
            height,
            fps,
            sample_rate,
            channels: channel_layout.channel_count(),
            channel_layout,
        }
    }

    /// Reject formats the compositor cannot produce.
    pub fn validate(&self) -> MontageResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MontageError::validation(
                "timeline width/height must be non-zero",
            ));
        }
        self.fps.validate_rate("timeline fps")?;
        if self.sample_rate == 0 {
            return Err(MontageError::validation("timeline sample_rate must be > 0"));
        }
        if self.channels != self.channel_layout.channel_count() {
            return Err(MontageError::validation(format!(
                "timeline declares {} channels but layout {:?} has {}",
                self.channels,
                self.channel_layout,
                self.channel_layout.channel_count()
            )));
        }
        Ok(())
    }

    /// Audio samples per channel in frame `number`.
    pub fn samples_per_frame(&self, number: u64) -> usize {
        samples_per_frame(number, self.fps, self.sample_rate, self.channels)
    }

    /// `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pan and zoom applied to canvas-anchored clips.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct Viewport {
    viewport_scale: Keyframe,
    viewport_x: Keyframe,
    viewport_y: Keyframe,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            viewport_scale: Keyframe::with_value(1.0),
            viewport_x: Keyframe::with_value(0.0),
            viewport_y: Keyframe::with_value(0.0),
        }
    }
}

/// Output format plus a set of clips and timeline-level effects.
#[derive(Debug)]
pub struct Timeline {
    info: TimelineInfo,
    reader_info: ReaderInfo,
    settings: Settings,
    viewport: Viewport,
    clips: Vec<Clip>,
    effects: Vec<Box<dyn Effect>>,
    cache: Box<dyn FrameCache>,
    inflight: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
    open: AtomicBool,
}

fn build_cache(settings: &Settings) -> MontageResult<Box<dyn FrameCache>> {
    let max_bytes = settings.cache.max_bytes;
    Ok(match &settings.cache.disk_path {
        Some(dir) => Box::new(DiskCache::with_max_bytes(dir.clone(), max_bytes)?),
        None => Box::new(MemoryCache::with_max_bytes(max_bytes)),
    })
}

impl Timeline {
    /// Empty, closed timeline.
    pub fn new(info: TimelineInfo, settings: Settings) -> MontageResult<Self> {
        info.validate()?;
        settings.validate()?;
        let cache = build_cache(&settings)?;
        let mut timeline = Self {
            info,
            reader_info: ReaderInfo::default(),
            settings,
            viewport: Viewport::default(),
            clips: Vec::new(),
            effects: Vec::new(),
            cache,
            inflight: Mutex::new(HashMap::new()),
            open: AtomicBool::new(false),
        };
        timeline.refresh_reader_info();
        Ok(timeline)
    }

    /// Output format.
    pub fn info(&self) -> &TimelineInfo {
        &self.info
    }

    /// Engine configuration.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Finished-frame cache.
    pub fn cache(&self) -> &dyn FrameCache {
        self.cache.as_ref()
    }

    /// Change the output format. Only allowed while closed; drops every cached frame.
    pub fn reconfigure(&mut self, info: TimelineInfo) -> MontageResult<()> {
        if self.is_open() {
            return Err(MontageError::validation(
                "timeline must be closed before changing its output format",
            ));
        }
        info.validate()?;
        self.info = info;
        self.refresh_reader_info();
        self.clear_cache()
    }

    /// Open every clip's reader. Idempotent.
    pub fn open(&self) -> MontageResult<()> {
        if self.open.load(Ordering::Acquire) {
            return Ok(());
        }
        for clip in &self.clips {
            clip.open()?;
        }
        self.open.store(true, Ordering::Release);
        tracing::debug!(clips = self.clips.len(), "timeline opened");
        Ok(())
    }

    /// Close every clip's reader. Idempotent.
    pub fn close(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        for clip in &self.clips {
            clip.close();
        }
        tracing::debug!("timeline closed");
    }

    /// `true` between `open` and `close`.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Pan/zoom keyframes: `(scale, x, y)`.
    pub fn viewport(&self) -> (&Keyframe, &Keyframe, &Keyframe) {
        let v = &self.viewport;
        (&v.viewport_scale, &v.viewport_x, &v.viewport_y)
    }

    /// Replace the pan/zoom keyframes.
    pub fn set_viewport(&mut self, scale: Keyframe, x: Keyframe, y: Keyframe) {
        self.viewport = Viewport {
            viewport_scale: scale,
            viewport_x: x,
            viewport_y: y,
        };
    }

    fn refresh_reader_info(&mut self) {
        let fps = self.info.fps;
        let duration = self.max_frame() as f64 / fps.to_f64();
        let mut info = ReaderInfo::new(
            self.info.width,
            self.info.height,
            fps,
            self.info.sample_rate,
            self.info.channel_layout,
            duration,
        );
        info.video_length = self.max_frame();
        self.reader_info = info;
    }

    /// Add a clip; it is opened immediately when the timeline is open.
    pub fn add_clip(&mut self, clip: Clip) -> MontageResult<()> {
        clip.set_cache_max_bytes(self.settings.clip_cache_max_bytes)?;
        if self.is_open() {
            clip.open()?;
        }
        self.clips.push(clip);
        self.refresh_reader_info();
        Ok(())
    }

    /// Remove the clip with `id`.
    pub fn remove_clip(&mut self, id: &str) -> Option<Clip> {
        let idx = self.clips.iter().position(|c| c.props.id == id)?;
        let clip = self.clips.remove(idx);
        self.refresh_reader_info();
        Some(clip)
    }

    /// Clip with `id`.
    pub fn clip(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.props.id == id)
    }

    /// Mutable clip with `id`. Cached frames are not invalidated.
    pub fn clip_mut(&mut self, id: &str) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.props.id == id)
    }

    /// Clips in insertion order.
    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }

    /// Add a timeline-level effect.
    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
        sort_timeline_effects(&mut self.effects);
    }

    /// Remove the timeline-level effect with `id`.
    pub fn remove_effect(&mut self, id: &str) -> Option<Box<dyn Effect>> {
        let idx = self.effects.iter().position(|e| e.base().id == id)?;
        Some(self.effects.remove(idx))
    }

    /// Timeline-level effect with `id`.
    pub fn effect(&self, id: &str) -> Option<&dyn Effect> {
        self.effects
            .iter()
            .find(|e| e.base().id == id)
            .map(|e| e.as_ref())
    }

    /// Timeline-level effects in execution order.
    pub fn effects(&self) -> impl Iterator<Item = &dyn Effect> {
        self.effects.iter().map(|e| e.as_ref())
    }

    /// Last frame covered by any clip (`0` when empty).
    pub fn max_frame(&self) -> u64 {
        self.clips
            .iter()
            .filter_map(|c| c.frame_span(self.info.fps))
            .map(|(_, last)| last)
            .max()
            .unwrap_or(0)
    }

    /// Drop cached frames of the timeline and every clip.
    pub fn clear_cache(&self) -> MontageResult<()> {
        self.cache.clear()?;
        for clip in &self.clips {
            clip.clear_cache()?;
        }
        Ok(())
    }

    /// Clips covering frame `number`, bottom layer first; equal layers by position, then
    /// insertion order.
    pub fn find_intersecting_clips(&self, number: u64) -> Vec<&Clip> {
        let mut active: Vec<&Clip> = self
            .clips
            .iter()
            .filter(|c| c.covers(number, self.info.fps))
            .collect();
        active.sort_by(|a, b| {
            a.props
                .layer
                .cmp(&b.props.layer)
                .then(a.props.position.total_cmp(&b.props.position))
        });
        active
    }

    /// Composited frame `number` (numbers below 1 are treated as 1).
    #[tracing::instrument(skip(self))]
    pub fn get_frame(&self, number: u64) -> MontageResult<Arc<Frame>> {
        self.fetch(number).map(|(frame, _)| frame)
    }

    /// Frame plus whether it was served from the cache.
    pub(crate) fn fetch(&self, number: u64) -> MontageResult<(Arc<Frame>, bool)> {
        if !self.is_open() {
            return Err(MontageError::reader_closed(
                "timeline must be opened before requesting frames",
            ));
        }
        let number = number.max(1);
        if let Some(hit) = self.cache.get_frame(number)? {
            tracing::debug!(number, "timeline cache hit");
            return Ok((hit, true));
        }
        if !self.settings.dedupe_inflight {
            return self.compute_and_store(number).map(|f| (f, false));
        }

        let gate = Arc::clone(self.inflight.lock().entry(number).or_default());
        let result = {
            let _computing = gate.lock();
            match self.cache.get_frame(number) {
                Ok(Some(hit)) => Ok((hit, true)),
                Ok(None) => self.compute_and_store(number).map(|f| (f, false)),
                Err(e) => Err(e),
            }
        };
        {
            let mut inflight = self.inflight.lock();
            if Arc::strong_count(&gate) == 2 {
                inflight.remove(&number);
            }
        }
        result
    }

    fn compute_and_store(&self, number: u64) -> MontageResult<Arc<Frame>> {
        tracing::debug!(number, "timeline cache miss");
        let frame = Arc::new(self.compose(number)?);
        self.cache.add(Arc::clone(&frame))?;
        Ok(frame)
    }

    fn viewport_at(&self, number: u64) -> Affine {
        let x = number as f64;
        let v = &self.viewport;
        raster::viewport_affine(
            self.info.size(),
            v.viewport_scale.value_or(x, 1.0),
            v.viewport_x.value_or(x, 0.0),
            v.viewport_y.value_or(x, 0.0),
        )
    }

    fn compose(&self, number: u64) -> MontageResult<Frame> {
        let info = &self.info;
        let mut out = Frame::blank_with_audio(
            number,
            info.width,
            info.height,
            info.sample_rate,
            info.channel_layout,
            info.samples_per_frame(number),
        );
        let active = self.find_intersecting_clips(number);
        let audible = active.iter().filter(|c| c.is_audible_at(number)).count();
        let viewport = self.viewport_at(number);

        for clip in &active {
            let layer = clip.get_frame_in_viewport(info, number, viewport)?;
            if let Some(src) = layer.image() {
                composite::over_in_place(out.image_mut(), src)?;
            }
            if let (Some(src), Some(dst)) = (layer.audio(), out.audio_mut()) {
                let gain = match clip.props.mixing {
                    VolumeMix::None => 1.0,
                    VolumeMix::Average => 1.0 / audible.max(1) as f32,
                    VolumeMix::Reduce if audible > 1 => REDUCE_GAIN,
                    VolumeMix::Reduce => 1.0,
                };
                dst.add_from(src, gain);
            }
        }

        let mut frame = Arc::new(out);
        for effect in &self.effects {
            let base = effect.base();
            if base.covers(number, info.fps) {
                frame = effect.get_frame(frame, base.local_frame(number, info.fps))?;
            }
        }
        tracing::trace!(number, clips = active.len(), "composited frame");
        Ok(Arc::unwrap_or_clone(frame).with_number(number))
    }

    /// Full document: output format, viewport, `clips` and `effects`.
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut root = serde_json::to_value(self.info).unwrap_or_else(|_| serde_json::json!({}));
        merge_object(
            &mut root,
            serde_json::to_value(&self.viewport).unwrap_or_else(|_| serde_json::json!({})),
        );
        merge_object(
            &mut root,
            serde_json::json!({
                "type": "Timeline",
                "duration": self.reader_info.duration,
                "clips": self.clips.iter().map(Clip::to_json_value).collect::<Vec<_>>(),
                "effects": self.effects.iter().map(|e| e.json_value()).collect::<Vec<_>>(),
            }),
        );
        root
    }

    /// Build a closed timeline from a document; the output format keys are required.
    pub fn from_json_str(
        s: &str,
        settings: Settings,
        readers: &ReaderRegistry,
        effects: &EffectRegistry,
    ) -> MontageResult<Self> {
        let value: serde_json::Value = serde_json::from_str(s)
            .map_err(|e| MontageError::invalid_json("Timeline::from_json", e.to_string()))?;
        let info: TimelineInfo = serde_json::from_value(value.clone())
            .map_err(|e| MontageError::invalid_json("Timeline::from_json", e.to_string()))?;
        let mut timeline = Self::new(info, settings)?;
        timeline.apply_json_value(&value, readers, effects)?;
        Ok(timeline)
    }

    /// Apply the keys present in `value`.
    ///
    /// Output-format keys go through [`Timeline::reconfigure`] (closed timelines only); present
    /// `clips`/`effects` arrays replace the current lists. Nothing is applied when any part fails
    /// to parse.
    pub fn apply_json_value(
        &mut self,
        value: &serde_json::Value,
        readers: &ReaderRegistry,
        effects: &EffectRegistry,
    ) -> MontageResult<()> {
        let info = apply_partial(&self.info, value, "Timeline::set_json")?;
        let viewport = apply_partial(&self.viewport, value, "Timeline::set_json")?;
        let clips = match value.get("clips") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|c| Clip::from_json_value(c, readers, effects))
                    .collect::<MontageResult<Vec<_>>>()?,
            ),
            Some(_) => {
                return Err(MontageError::invalid_json(
                    "Timeline::set_json",
                    "\"clips\" must be an array",
                ));
            }
        };
        let new_effects = match value.get("effects") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|e| effects.create(e))
                    .collect::<MontageResult<Vec<_>>>()?,
            ),
            Some(_) => {
                return Err(MontageError::invalid_json(
                    "Timeline::set_json",
                    "\"effects\" must be an array",
                ));
            }
        };

        if info != self.info {
            self.reconfigure(info)?;
        }
        self.viewport = viewport;
        if let Some(clips) = clips {
            for old in self.clips.drain(..) {
                old.close();
            }
            for clip in clips {
                self.add_clip(clip)?;
            }
        }
        if let Some(mut list) = new_effects {
            sort_timeline_effects(&mut list);
            self.effects = list;
        }
        self.refresh_reader_info();
        Ok(())
    }
}

impl Reader for Timeline {
    fn info(&self) -> &ReaderInfo {
        &self.reader_info
    }

    fn open(&self) -> MontageResult<()> {
        Timeline::open(self)
    }

    fn close(&self) {
        Timeline::close(self);
    }

    fn is_open(&self) -> bool {
        Timeline::is_open(self)
    }

    fn get_frame(&self, number: u64) -> MontageResult<Arc<Frame>> {
        Timeline::get_frame(self, number)
    }

    fn json_value(&self) -> serde_json::Value {
        self.to_json_value()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/timeline.rs"]
mod tests;
