//! Montage is a frame-accurate video composition engine.
//!
//! The engine is pull-based and synchronous:
//!
//! - Build a [`Timeline`] with an output format ([`TimelineInfo`]) and explicit [`Settings`]
//! - Add [`Clip`]s (a [`Reader`] plus keyframed transforms and [`Effect`]s)
//! - Request composited frames with [`Timeline::get_frame`], or render a range into a [`Writer`]
//!
//! Frame-rate conversion (including 3:2 pulldown) is handled by [`FrameMapper`]; finished frames
//! are kept in a [`FrameCache`]. The library emits `tracing` events but never installs a
//! subscriber.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub(crate) mod animation;
pub(crate) mod cache;
pub(crate) mod clip;
pub(crate) mod effects;
pub(crate) mod foundation;
pub(crate) mod frame;
pub(crate) mod mapper;
pub(crate) mod reader;
pub(crate) mod settings;
pub(crate) mod timeline;
pub(crate) mod writer;

pub use crate::foundation::core::{ChannelLayout, Coordinate, Fraction, Rgba8Premul, Speaker};
pub use crate::foundation::error::{MontageError, MontageResult};

pub use crate::animation::color::ColorKeyframe;
pub use crate::animation::keyframe::Keyframe;
pub use crate::animation::point::{HandleType, InterpolationType, Point};

pub use crate::frame::audio::{AudioBuffer, samples_per_frame};
pub use crate::frame::frame::Frame;

pub use crate::cache::disk::DiskCache;
pub use crate::cache::memory::MemoryCache;
pub use crate::cache::{CacheRange, FrameCache};

pub use crate::mapper::frame_mapper::FrameMapper;
pub use crate::mapper::{Field, MappedFrame, MapperTarget, PulldownMode, SampleRange};

pub use crate::reader::dummy::DummyReader;
pub use crate::reader::registry::{ReaderFactory, ReaderRegistry};
pub use crate::reader::still::ImageReader;
pub use crate::reader::{Reader, ReaderInfo};

pub use crate::writer::memory::InMemoryWriter;
pub use crate::writer::sequence::ImageSequenceWriter;
pub use crate::writer::{Writer, WriterConfig};

pub use crate::effects::bars::{Bars, BarsParams};
pub use crate::effects::blur::{Blur, BlurParams};
pub use crate::effects::brightness::{Brightness, BrightnessParams};
pub use crate::effects::crop::{Crop, CropParams};
pub use crate::effects::hue::{Hue, HueParams};
pub use crate::effects::negate::Negate;
pub use crate::effects::pixelate::{Pixelate, PixelateParams};
pub use crate::effects::saturation::{Saturation, SaturationParams};
pub use crate::effects::shift::{Shift, ShiftParams};
pub use crate::effects::wave::{Wave, WaveParams};
pub use crate::effects::registry::{EffectFactory, EffectRegistry};
pub use crate::effects::{Effect, EffectBase, EffectInfo, sort_effects, sort_timeline_effects};

pub use crate::clip::{
    AnchorMode, Clip, ClipKeyframes, ClipProperties, Gravity, ScaleMode, VolumeMix,
};

pub use crate::settings::{CacheSettings, Settings};
pub use crate::timeline::{RenderStats, RenderThreading, Timeline, TimelineInfo};
