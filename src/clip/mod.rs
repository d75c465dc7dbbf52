//! Clips: a reader placed on the timeline, trimmed, transformed and mixed.
//!
//! A [`Clip`] owns its reader and effects. For every timeline frame it resolves the source frame
//! through its internal [`FrameMapper`] (reader rate to timeline rate), runs its effects,
//! evaluates its transform keyframes at the timeline frame number and rasterises the result at
//! the timeline's output size.

use std::sync::Arc;

use kurbo::{Affine, Point, Rect};
use parking_lot::Mutex;

use crate::animation::color::ColorKeyframe;
use crate::animation::keyframe::Keyframe;
use crate::cache::FrameCache;
use crate::cache::memory::MemoryCache;
use crate::effects::registry::EffectRegistry;
use crate::effects::{Effect, composite, sort_effects};
use crate::foundation::core::Fraction;
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::json::{apply_partial, merge_object};
use crate::foundation::math::{frame_span, seconds_to_frames};
use crate::frame::audio::AudioBuffer;
use crate::frame::frame::Frame;
use crate::mapper::frame_mapper::FrameMapper;
use crate::mapper::{MapperTarget, PulldownMode};
use crate::reader::Reader;
use crate::reader::registry::ReaderRegistry;
use crate::timeline::TimelineInfo;

pub(crate) mod raster;

use raster::{Homography, Placement, Warp};

/// Budget of a clip's finished-frame cache unless the timeline overrides it.
pub const DEFAULT_CLIP_CACHE_BYTES: u64 = 64 * 1024 * 1024;

/// Where a clip snaps to on the canvas before its location offset is applied.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    /// Top-left corner.
    TopLeft,
    /// Top edge, centred.
    Top,
    /// Top-right corner.
    TopRight,
    /// Left edge, centred.
    Left,
    /// Centre.
    #[default]
    Center,
    /// Right edge, centred.
    Right,
    /// Bottom-left corner.
    BottomLeft,
    /// Bottom edge, centred.
    Bottom,
    /// Bottom-right corner.
    BottomRight,
}

impl Gravity {
    /// Horizontal and vertical anchor as fractions of the free space (`0`, `0.5` or `1`).
    pub fn anchor(self) -> (f64, f64) {
        match self {
            Self::TopLeft => (0.0, 0.0),
            Self::Top => (0.5, 0.0),
            Self::TopRight => (1.0, 0.0),
            Self::Left => (0.0, 0.5),
            Self::Center => (0.5, 0.5),
            Self::Right => (1.0, 0.5),
            Self::BottomLeft => (0.0, 1.0),
            Self::Bottom => (0.5, 1.0),
            Self::BottomRight => (1.0, 1.0),
        }
    }
}

/// How a clip's source is sized to the canvas before the scale keyframes apply.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Fill the canvas keeping aspect ratio; overflow is cut off.
    Crop,
    /// Fit inside the canvas keeping aspect ratio.
    #[default]
    Fit,
    /// Fill the canvas exactly, distorting the aspect ratio.
    Stretch,
    /// Native size.
    None,
}

/// What a clip is positioned against.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMode {
    /// The canvas; follows the timeline viewport keyframes.
    #[default]
    Canvas,
    /// The viewport; ignores viewport pan and zoom.
    Viewport,
}

/// Volume adjustment applied when this clip's audio overlaps other clips.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMix {
    /// Add samples unchanged.
    #[default]
    None,
    /// Divide by the number of overlapping audible clips.
    Average,
    /// Scale by 0.77 whenever another clip overlaps.
    Reduce,
}

/// Scalar clip properties.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClipProperties {
    /// Caller-assigned identifier.
    pub id: String,
    /// Timeline position of the clip's first frame, in seconds.
    pub position: f64,
    /// Trim-in point in the reader's timeline, in seconds.
    pub start: f64,
    /// Trim-out point in the reader's timeline, in seconds.
    pub end: f64,
    /// Z-order; higher layers composite on top.
    pub layer: i32,
    /// Canvas anchor.
    pub gravity: Gravity,
    /// Base sizing.
    pub scale: ScaleMode,
    /// Canvas or viewport anchoring.
    pub anchor: AnchorMode,
    /// Overlap volume policy.
    pub mixing: VolumeMix,
    /// Draw the audio waveform instead of the image.
    pub waveform: bool,
}

impl Default for ClipProperties {
    fn default() -> Self {
        Self {
            id: String::new(),
            position: 0.0,
            start: 0.0,
            end: 0.0,
            layer: 0,
            gravity: Gravity::Center,
            scale: ScaleMode::Fit,
            anchor: AnchorMode::Canvas,
            mixing: VolumeMix::None,
            waveform: false,
        }
    }
}

/// Animated clip properties, evaluated at the timeline frame number.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClipKeyframes {
    /// Horizontal offset as a fraction of the canvas width.
    pub location_x: Keyframe,
    /// Vertical offset as a fraction of the canvas height.
    pub location_y: Keyframe,
    /// Horizontal scale factor.
    pub scale_x: Keyframe,
    /// Vertical scale factor.
    pub scale_y: Keyframe,
    /// Clockwise rotation in degrees.
    pub rotation: Keyframe,
    /// Horizontal shear factor.
    pub shear_x: Keyframe,
    /// Vertical shear factor.
    pub shear_y: Keyframe,
    /// Rotation/shear origin as a fraction of the placed width.
    pub origin_x: Keyframe,
    /// Rotation/shear origin as a fraction of the placed height.
    pub origin_y: Keyframe,
    /// Opacity in `0..=1`.
    pub alpha: Keyframe,
    /// Left edge of the visible source area (fraction of width).
    pub crop_x: Keyframe,
    /// Top edge of the visible source area (fraction of height).
    pub crop_y: Keyframe,
    /// Width of the visible source area (fraction of width).
    pub crop_width: Keyframe,
    /// Height of the visible source area (fraction of height).
    pub crop_height: Keyframe,
    /// Top-left perspective corner X (fraction of width; `-1` keeps the natural corner).
    pub perspective_c1_x: Keyframe,
    /// Top-left perspective corner Y.
    pub perspective_c1_y: Keyframe,
    /// Top-right perspective corner X.
    pub perspective_c2_x: Keyframe,
    /// Top-right perspective corner Y.
    pub perspective_c2_y: Keyframe,
    /// Bottom-left perspective corner X.
    pub perspective_c3_x: Keyframe,
    /// Bottom-left perspective corner Y.
    pub perspective_c3_y: Keyframe,
    /// Bottom-right perspective corner X.
    pub perspective_c4_x: Keyframe,
    /// Bottom-right perspective corner Y.
    pub perspective_c4_y: Keyframe,
    /// Audio gain.
    pub volume: Keyframe,
    /// Clip frame to show for each clip frame; empty means no remapping.
    pub time: Keyframe,
    /// `0` mutes the clip; `-1` follows the reader.
    pub has_audio: Keyframe,
    /// `0` hides the image; `-1` follows the reader.
    pub has_video: Keyframe,
    /// Waveform colour.
    pub wave_color: ColorKeyframe,
}

impl Default for ClipKeyframes {
    fn default() -> Self {
        let kf = Keyframe::with_value;
        Self {
            location_x: kf(0.0),
            location_y: kf(0.0),
            scale_x: kf(1.0),
            scale_y: kf(1.0),
            rotation: kf(0.0),
            shear_x: kf(0.0),
            shear_y: kf(0.0),
            origin_x: kf(0.5),
            origin_y: kf(0.5),
            alpha: kf(1.0),
            crop_x: kf(0.0),
            crop_y: kf(0.0),
            crop_width: kf(1.0),
            crop_height: kf(1.0),
            perspective_c1_x: kf(-1.0),
            perspective_c1_y: kf(-1.0),
            perspective_c2_x: kf(-1.0),
            perspective_c2_y: kf(-1.0),
            perspective_c3_x: kf(-1.0),
            perspective_c3_y: kf(-1.0),
            perspective_c4_x: kf(-1.0),
            perspective_c4_y: kf(-1.0),
            volume: kf(1.0),
            time: Keyframe::new(),
            has_audio: kf(-1.0),
            has_video: kf(-1.0),
            wave_color: ColorKeyframe::new(0, 123, 255, 255),
        }
    }
}

impl ClipKeyframes {
    fn placement_at(&self, x: f64) -> Placement {
        Placement {
            location_x: self.location_x.value_or(x, 0.0),
            location_y: self.location_y.value_or(x, 0.0),
            scale_x: self.scale_x.value_or(x, 1.0),
            scale_y: self.scale_y.value_or(x, 1.0),
            rotation: self.rotation.value_or(x, 0.0),
            shear_x: self.shear_x.value_or(x, 0.0),
            shear_y: self.shear_y.value_or(x, 0.0),
            origin_x: self.origin_x.value_or(x, 0.5),
            origin_y: self.origin_y.value_or(x, 0.5),
        }
    }

    fn crop_at(&self, x: f64, width: u32, height: u32) -> Option<Rect> {
        let cx = self.crop_x.value_or(x, 0.0);
        let cy = self.crop_y.value_or(x, 0.0);
        let cw = self.crop_width.value_or(x, 1.0);
        let ch = self.crop_height.value_or(x, 1.0);
        if cx == 0.0 && cy == 0.0 && cw >= 1.0 && ch >= 1.0 {
            return None;
        }
        let (w, h) = (f64::from(width), f64::from(height));
        Some(Rect::new(cx * w, cy * h, (cx + cw) * w, (cy + ch) * h))
    }

    fn perspective_at(&self, x: f64, width: u32, height: u32) -> Option<Homography> {
        let corner = |kx: &Keyframe, ky: &Keyframe, natural: (f64, f64)| {
            let px = kx.value_or(x, -1.0);
            let py = ky.value_or(x, -1.0);
            let set = px > -1.0 || py > -1.0;
            let fx = if px > -1.0 { px } else { natural.0 };
            let fy = if py > -1.0 { py } else { natural.1 };
            (set, Point::new(fx * f64::from(width), fy * f64::from(height)))
        };
        let c1 = corner(&self.perspective_c1_x, &self.perspective_c1_y, (0.0, 0.0));
        let c2 = corner(&self.perspective_c2_x, &self.perspective_c2_y, (1.0, 0.0));
        let c3 = corner(&self.perspective_c3_x, &self.perspective_c3_y, (0.0, 1.0));
        let c4 = corner(&self.perspective_c4_x, &self.perspective_c4_y, (1.0, 1.0));
        if !(c1.0 || c2.0 || c3.0 || c4.0) {
            return None;
        }
        Homography::square_to_quad([c1.1, c2.1, c4.1, c3.1])
    }
}

/// A reader placed on the timeline.
///
/// The clip covers timeline frames `[position, position + (end - start))`, with `end` clamped to
/// the reader's duration. Frames outside that window are transparent and silent; reader
/// failures inside it propagate.
#[derive(Debug)]
pub struct Clip {
    /// Scalar properties.
    pub props: ClipProperties,
    /// Animated properties.
    pub keyframes: ClipKeyframes,
    reader: Box<dyn Reader>,
    effects: Vec<Box<dyn Effect>>,
    mapper: FrameMapper,
    read_lock: Mutex<()>,
    cache: MemoryCache,
}

fn pass_through_target(reader: &dyn Reader) -> MapperTarget {
    let info = reader.info();
    MapperTarget::new(
        info.fps,
        PulldownMode::None,
        info.sample_rate,
        info.channel_layout,
    )
}

impl Clip {
    /// Clip showing all of `reader`, starting at timeline position 0.
    pub fn new(reader: Box<dyn Reader>) -> MontageResult<Self> {
        let mapper = FrameMapper::new(reader.info().clone(), pass_through_target(reader.as_ref()))?;
        let props = ClipProperties {
            end: reader.info().duration,
            ..ClipProperties::default()
        };
        Ok(Self {
            props,
            keyframes: ClipKeyframes::default(),
            reader,
            effects: Vec::new(),
            mapper,
            read_lock: Mutex::new(()),
            cache: MemoryCache::with_max_bytes(DEFAULT_CLIP_CACHE_BYTES),
        })
    }

    /// Builder: caller-assigned id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.props.id = id.into();
        self
    }

    /// Builder: timeline position (seconds) and layer.
    pub fn placed(mut self, position: f64, layer: i32) -> Self {
        self.props.position = position;
        self.props.layer = layer;
        self
    }

    /// Builder: trim window in the reader's timeline (seconds).
    pub fn trimmed(mut self, start: f64, end: f64) -> Self {
        self.props.start = start;
        self.props.end = end;
        self
    }

    /// The source reader.
    pub fn reader(&self) -> &dyn Reader {
        self.reader.as_ref()
    }

    /// Swap the source reader; the mapping is rebuilt and cached frames dropped.
    pub fn set_reader(&mut self, reader: Box<dyn Reader>) -> MontageResult<()> {
        let mapper = FrameMapper::new(reader.info().clone(), self.mapper.target())?;
        self.reader.close();
        self.reader = reader;
        self.mapper = mapper;
        self.cache.clear()
    }

    /// Open the reader.
    pub fn open(&self) -> MontageResult<()> {
        self.reader.open()
    }

    /// Close the reader.
    pub fn close(&self) {
        self.reader.close();
    }

    /// `true` while the reader is open.
    pub fn is_open(&self) -> bool {
        self.reader.is_open()
    }

    /// Attach an effect; effects run in ascending `order`, ties in insertion order.
    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
        sort_effects(&mut self.effects);
    }

    /// Detach the effect with `id`.
    pub fn remove_effect(&mut self, id: &str) -> Option<Box<dyn Effect>> {
        let idx = self.effects.iter().position(|e| e.base().id == id)?;
        Some(self.effects.remove(idx))
    }

    /// Effect with `id`.
    pub fn effect(&self, id: &str) -> Option<&dyn Effect> {
        self.effects
            .iter()
            .find(|e| e.base().id == id)
            .map(|e| e.as_ref())
    }

    /// Effects in execution order.
    pub fn effects(&self) -> impl Iterator<Item = &dyn Effect> {
        self.effects.iter().map(|e| e.as_ref())
    }

    /// Trim-out point clamped to the reader's duration.
    pub fn effective_end(&self) -> f64 {
        self.props.end.min(self.reader.info().duration)
    }

    /// Seconds of timeline the clip covers.
    pub fn duration(&self) -> f64 {
        (self.effective_end() - self.props.start).max(0.0)
    }

    /// Inclusive timeline frames covered at `fps`.
    pub fn frame_span(&self, fps: Fraction) -> Option<(u64, u64)> {
        frame_span(self.props.position, self.duration(), fps)
    }

    /// `true` when the clip has content at timeline frame `number`.
    pub fn covers(&self, number: u64, fps: Fraction) -> bool {
        self.frame_span(fps)
            .is_some_and(|(first, last)| (first..=last).contains(&number))
    }

    /// Clip-relative frame (before time remapping) for timeline frame `number`.
    pub fn clip_frame_number(&self, number: u64, fps: Fraction) -> u64 {
        let first = seconds_to_frames(self.props.position, fps) + 1;
        number.saturating_sub(first) + 1 + seconds_to_frames(self.props.start, fps)
    }

    /// `true` when the clip contributes audio at timeline frame `number`.
    pub fn is_audible_at(&self, number: u64) -> bool {
        self.reader.info().has_audio && self.keyframes.has_audio.value_or(number as f64, -1.0) != 0.0
    }

    /// Replace the finished-frame cache budget (`0` = unlimited).
    pub fn set_cache_max_bytes(&self, max_bytes: u64) -> MontageResult<()> {
        self.cache.set_max_bytes(max_bytes)
    }

    /// Drop cached finished frames (clip and mapper).
    pub fn clear_cache(&self) -> MontageResult<()> {
        self.cache.clear()?;
        self.mapper.clear_cache()
    }

    /// Frame for timeline frame `number`, rendered at `target`'s size and audio format.
    pub fn get_frame(&self, target: &TimelineInfo, number: u64) -> MontageResult<Arc<Frame>> {
        self.get_frame_in_viewport(target, number, Affine::IDENTITY)
    }

    /// As [`Clip::get_frame`], with canvas-anchored content moved by `viewport`.
    #[tracing::instrument(skip(self, target, viewport), fields(clip = %self.props.id))]
    pub(crate) fn get_frame_in_viewport(
        &self,
        target: &TimelineInfo,
        number: u64,
        viewport: Affine,
    ) -> MontageResult<Arc<Frame>> {
        if let Some(hit) = self.cache.get_frame(number)? {
            if rendered_for(&hit, target) {
                tracing::trace!(number, "clip cache hit");
                return Ok(hit);
            }
            tracing::debug!(
                number,
                width = target.width,
                height = target.height,
                "clip target changed, dropping cached frames"
            );
            self.cache.clear()?;
        }
        let frame = Arc::new(self.compose(target, number, viewport)?);
        self.cache.add(Arc::clone(&frame))?;
        Ok(frame)
    }

    fn sync_mapper(&self, target: &TimelineInfo) -> MontageResult<()> {
        let wanted = MapperTarget::new(
            target.fps,
            PulldownMode::None,
            target.sample_rate,
            target.channel_layout,
        );
        if self.mapper.target() != wanted {
            self.mapper.change_mapping(wanted)?;
        }
        Ok(())
    }

    fn source_frame(&self, clip_frame: u64) -> MontageResult<Arc<Frame>> {
        let _serial = (!self.reader.supports_concurrent_reads()).then(|| self.read_lock.lock());
        self.mapper.get_frame(self.reader.as_ref(), clip_frame)
    }

    fn compose(&self, target: &TimelineInfo, number: u64, viewport: Affine) -> MontageResult<Frame> {
        let samples = target.samples_per_frame(number);
        let blank = || {
            Frame::blank_with_audio(
                number,
                target.width,
                target.height,
                target.sample_rate,
                target.channel_layout,
                samples,
            )
        };
        if !self.covers(number, target.fps) {
            return Ok(blank());
        }

        let kf = &self.keyframes;
        let x = number as f64;
        let mut clip_frame = self.clip_frame_number(number, target.fps);
        let mut reversed = false;
        if kf.time.get_count() > 0 {
            let index = clip_frame as i64;
            reversed = !kf.time.is_increasing(index)?;
            clip_frame = kf.time.get_long(clip_frame as f64)?.max(1) as u64;
        }

        self.sync_mapper(target)?;
        if clip_frame > self.mapper.len() {
            return Ok(blank());
        }
        let mut source = self.source_frame(clip_frame)?;
        for effect in &self.effects {
            source = effect.get_frame(source, clip_frame)?;
        }
        let mut working = Arc::unwrap_or_clone(source);

        let mut audio = match working.take_audio() {
            Some(a) if self.is_audible_at(number) => a,
            _ => AudioBuffer::silent(target.sample_rate, target.channel_layout, samples),
        };
        if reversed {
            audio.reverse();
        }
        audio.resize_samples(samples);

        let mut out = blank();
        let color = kf.wave_color.rgba_at(x).to_array();
        let visible =
            self.reader.info().has_video && kf.has_video.value_or(x, -1.0) != 0.0;
        let (pixels, size) = if self.props.waveform {
            let image = raster::render_waveform(&audio, target.width, target.height, color);
            (Some(image), (target.width, target.height))
        } else if visible {
            let size = (working.width(), working.height());
            (working.image().map(<[u8]>::to_vec), size)
        } else {
            (None, (0, 0))
        };
        audio.apply_gain(kf.volume.value_or(x, 1.0) as f32);
        out.set_audio(Some(audio));

        let alpha = kf.alpha.value_or(x, 1.0).clamp(0.0, 1.0) as f32;
        if let Some(pixels) = pixels
            && alpha > 0.0
        {
            let canvas = (target.width, target.height);
            let mut affine = raster::placement_affine(
                size,
                canvas,
                self.props.scale,
                self.props.gravity,
                &kf.placement_at(x),
            );
            if self.props.anchor == AnchorMode::Canvas {
                affine = viewport * affine;
            }
            let warp = Warp {
                affine,
                perspective: kf.perspective_at(x, size.0, size.1),
                crop: kf.crop_at(x, size.0, size.1),
            };
            let dst = out.image_mut();
            if raster::warp_into(dst, canvas, &pixels, size, &warp) {
                composite::scale_alpha_in_place(dst, alpha);
            }
        }
        tracing::trace!(number, clip_frame, "composed clip frame");
        Ok(out)
    }

    /// Full document: properties, keyframes, `duration`, `reader` and `effects`.
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut root = serde_json::to_value(&self.props).unwrap_or_else(|_| serde_json::json!({}));
        merge_object(
            &mut root,
            serde_json::to_value(&self.keyframes).unwrap_or_else(|_| serde_json::json!({})),
        );
        merge_object(
            &mut root,
            serde_json::json!({
                "duration": self.duration(),
                "reader": self.reader.json_value(),
                "effects": self.effects.iter().map(|e| e.json_value()).collect::<Vec<_>>(),
            }),
        );
        root
    }

    /// Build a clip from a document; the `reader` key is required.
    pub fn from_json_value(
        value: &serde_json::Value,
        readers: &ReaderRegistry,
        effects: &EffectRegistry,
    ) -> MontageResult<Self> {
        let descriptor = value
            .get("reader")
            .filter(|r| !r.is_null())
            .ok_or_else(|| MontageError::invalid_json("Clip::from_json", "clip has no \"reader\""))?;
        let mut clip = Self::new(readers.create(descriptor)?)?;
        let mut rest = value.clone();
        if let Some(fields) = rest.as_object_mut() {
            fields.remove("reader");
        }
        clip.apply_json_value(&rest, readers, effects)?;
        Ok(clip)
    }

    /// Apply the keys present in `value`; absent keys keep their current values.
    ///
    /// A present `reader` replaces the reader and a present `effects` array replaces all
    /// effects. Nothing is applied when any part fails to parse.
    pub fn apply_json_value(
        &mut self,
        value: &serde_json::Value,
        readers: &ReaderRegistry,
        effects: &EffectRegistry,
    ) -> MontageResult<()> {
        let props = apply_partial(&self.props, value, "Clip::set_json")?;
        let keyframes = apply_partial(&self.keyframes, value, "Clip::set_json")?;
        let reader = match value.get("reader") {
            Some(r) if !r.is_null() => Some(readers.create(r)?),
            _ => None,
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
                    "Clip::set_json",
                    "\"effects\" must be an array",
                ));
            }
        };

        if let Some(reader) = reader {
            self.set_reader(reader)?;
        }
        self.props = props;
        self.keyframes = keyframes;
        if let Some(mut list) = new_effects {
            sort_effects(&mut list);
            self.effects = list;
        }
        Ok(())
    }
}

/// Whether a cached frame was composed on `target`'s canvas.
fn rendered_for(frame: &Frame, target: &TimelineInfo) -> bool {
    frame.width() == target.width && frame.height() == target.height
}

#[cfg(test)]
#[path = "../../tests/unit/clip/clip.rs"]
mod tests;
