//! Frame-rate mapping between a reader's native stream and a target rate.
//!
//! The mapping is computed once per target configuration as a list of [`MappedFrame`]s: each
//! target frame names the source frame feeding its odd and even field plus the span of source
//! audio samples it carries.

use std::str::FromStr;

use crate::foundation::core::{ChannelLayout, Fraction};
use crate::foundation::error::{MontageError, MontageResult};

pub(crate) mod cadence;
pub(crate) mod frame_mapper;

/// How fields are repeated or dropped when converting between film and video rates.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PulldownMode {
    /// 3:2 cadence: one field repeated (or dropped) every field interval.
    #[default]
    Classic,
    /// 2:3:3:2 cadence: the inserted field is spread into the next source frame.
    Advanced,
    /// Whole frames repeated (or dropped); no mixed-field frames.
    None,
}

impl FromStr for PulldownMode {
    type Err = MontageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "advanced" => Ok(Self::Advanced),
            "none" => Ok(Self::None),
            other => Err(MontageError::validation(format!(
                "unknown pulldown mode '{other}' (expected classic, advanced or none)"
            ))),
        }
    }
}

/// One interlaced field: the source frame it is taken from and its parity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Field {
    /// Source frame number (1-based).
    pub frame: u64,
    /// `true` for the odd (top) field.
    pub is_odd: bool,
}

/// Span of source audio, at the source sample rate, assigned to one target frame.
///
/// `sample_end` is inclusive. `total` is the number of samples the span holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SampleRange {
    /// First source frame contributing samples.
    pub frame_start: u64,
    /// First sample used in `frame_start`.
    pub sample_start: usize,
    /// Last source frame contributing samples.
    pub frame_end: u64,
    /// Last sample used in `frame_end` (inclusive).
    pub sample_end: usize,
    /// Samples in the span.
    pub total: usize,
}

/// Source fields and audio span for one target frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MappedFrame {
    /// Field drawn on rows `0, 2, 4, ..`.
    pub odd: Field,
    /// Field drawn on rows `1, 3, 5, ..`.
    pub even: Field,
    /// Source audio span.
    pub samples: SampleRange,
}

/// Output format a [`FrameMapper`](frame_mapper::FrameMapper) converts to.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MapperTarget {
    /// Target frame rate.
    pub fps: Fraction,
    /// Pulldown policy for film/video conversions.
    #[serde(default)]
    pub pulldown: PulldownMode,
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    /// Target channel count.
    pub channels: u16,
    /// Target channel layout.
    pub channel_layout: ChannelLayout,
}

impl MapperTarget {
    /// Target with channel count taken from `channel_layout`.
    pub fn new(
        fps: Fraction,
        pulldown: PulldownMode,
        sample_rate: u32,
        channel_layout: ChannelLayout,
    ) -> Self {
        Self {
            fps,
            pulldown,
            sample_rate,
            channels: channel_layout.channel_count(),
            channel_layout,
        }
    }

    /// Reject rates and layouts the mapper cannot compute with.
    pub fn validate(&self) -> MontageResult<()> {
        self.fps.validate_rate("target fps")?;
        if self.sample_rate == 0 {
            return Err(MontageError::validation("target sample_rate must be > 0"));
        }
        if self.channels != self.channel_layout.channel_count() {
            return Err(MontageError::validation(format!(
                "target declares {} channels but layout {:?} has {}",
                self.channels,
                self.channel_layout,
                self.channel_layout.channel_count()
            )));
        }
        Ok(())
    }
}
