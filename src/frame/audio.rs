use crate::foundation::core::{ChannelLayout, Fraction, Speaker};
use crate::foundation::error::{MontageError, MontageResult};

const FOLD_GAIN: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Planar float audio (one `Vec<f32>` per channel, nominally in `[-1, 1]`).
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel layout; `channels.len()` matches its channel count.
    pub layout: ChannelLayout,
    /// Per-channel samples, all the same length.
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Silence of `samples` samples per channel.
    pub fn silent(sample_rate: u32, layout: ChannelLayout, samples: usize) -> Self {
        Self {
            sample_rate,
            layout,
            channels: vec![vec![0.0; samples]; usize::from(layout.channel_count())],
        }
    }

    /// Wrap planar channel data, validating channel count and lengths.
    pub fn from_channels(
        sample_rate: u32,
        layout: ChannelLayout,
        channels: Vec<Vec<f32>>,
    ) -> MontageResult<Self> {
        if channels.len() != usize::from(layout.channel_count()) {
            return Err(MontageError::validation(format!(
                "layout {layout:?} expects {} channels, got {}",
                layout.channel_count(),
                channels.len()
            )));
        }
        if let Some(first) = channels.first()
            && channels.iter().any(|c| c.len() != first.len())
        {
            return Err(MontageError::validation(
                "audio channels must have equal sample counts",
            ));
        }
        Ok(Self {
            sample_rate,
            layout,
            channels,
        })
    }

    /// Number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel.
    pub fn sample_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Size of the sample payload in bytes.
    pub fn byte_len(&self) -> u64 {
        (self.sample_count() as u64) * u64::from(self.channel_count()) * 4
    }

    /// Multiply every sample by `gain`.
    pub fn apply_gain(&mut self, gain: f32) {
        if gain == 1.0 {
            return;
        }
        for s in self.channels.iter_mut().flatten() {
            *s *= gain;
        }
    }

    /// Add `other * gain` sample by sample over the overlapping channels and samples.
    ///
    /// No clamping is applied; sums may leave `[-1, 1]`.
    pub fn add_from(&mut self, other: &AudioBuffer, gain: f32) {
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s * gain;
            }
        }
    }

    /// Truncate or zero-pad every channel to `samples` samples.
    pub fn resize_samples(&mut self, samples: usize) {
        for ch in &mut self.channels {
            ch.resize(samples, 0.0);
        }
    }

    /// Reverse the sample order of every channel.
    pub fn reverse(&mut self) {
        for ch in &mut self.channels {
            ch.reverse();
        }
    }

    /// Linearly resample to exactly `samples` samples at `sample_rate`.
    ///
    /// The whole input span is stretched onto the output span.
    pub fn resampled(&self, sample_rate: u32, samples: usize) -> AudioBuffer {
        let n_in = self.sample_count();
        if n_in == samples {
            return AudioBuffer {
                sample_rate,
                ..self.clone()
            };
        }
        if n_in == 0 {
            return AudioBuffer::silent(sample_rate, self.layout, samples);
        }

        let step = n_in as f64 / samples.max(1) as f64;
        let channels = self
            .channels
            .iter()
            .map(|src| {
                (0..samples)
                    .map(|i| {
                        let pos = i as f64 * step;
                        let i0 = (pos.floor() as usize).min(n_in - 1);
                        let i1 = (i0 + 1).min(n_in - 1);
                        let frac = (pos - i0 as f64) as f32;
                        src[i0] + (src[i1] - src[i0]) * frac
                    })
                    .collect()
            })
            .collect();
        AudioBuffer {
            sample_rate,
            layout: self.layout,
            channels,
        }
    }

    /// Remix into `layout` using [`remix_matrix`].
    pub fn remixed(&self, layout: ChannelLayout) -> AudioBuffer {
        if layout == self.layout {
            return self.clone();
        }
        let matrix = remix_matrix(self.layout, layout);
        let n = self.sample_count();
        let channels = matrix
            .iter()
            .map(|row| {
                let mut out = vec![0.0f32; n];
                for (gain, src) in row.iter().zip(&self.channels) {
                    if *gain == 0.0 {
                        continue;
                    }
                    for (o, s) in out.iter_mut().zip(src) {
                        *o += s * gain;
                    }
                }
                out
            })
            .collect();
        AudioBuffer {
            sample_rate: self.sample_rate,
            layout,
            channels,
        }
    }
}

/// Gain matrix (`to` channels x `from` channels) used to convert between layouts.
///
/// Speakers present in both layouts pass at unity (back and side surrounds are treated as the
/// same position). Mono into a layout without a centre channel is duplicated into the front
/// pair. Everything else folds down per ITU-R BS.775: centre and surrounds at -3 dB into the
/// front pair, LFE dropped; a centre-only target takes half of each folded front channel.
pub fn remix_matrix(from: ChannelLayout, to: ChannelLayout) -> Vec<Vec<f32>> {
    let src = from.speakers();
    let dst = to.speakers();
    let mut m = vec![vec![0.0f32; src.len()]; dst.len()];
    let find = |s: Speaker| dst.iter().position(|d| *d == s);

    if from == to {
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        return m;
    }

    let front = (find(Speaker::FrontLeft), find(Speaker::FrontRight));
    let duplicate_mono = from == ChannelLayout::Mono && find(Speaker::FrontCenter).is_none();

    for (j, &speaker) in src.iter().enumerate() {
        if duplicate_mono {
            for i in [front.0, front.1].into_iter().flatten() {
                m[i][j] = 1.0;
            }
            continue;
        }
        if let Some(i) = find(speaker).or_else(|| speaker.surround_twin().and_then(find)) {
            m[i][j] = 1.0;
            continue;
        }
        let (l, r) = stereo_fold(speaker);
        match front {
            (Some(li), Some(ri)) => {
                m[li][j] += l;
                m[ri][j] += r;
            }
            _ => {
                if let Some(ci) = find(Speaker::FrontCenter) {
                    m[ci][j] += 0.5 * (l + r);
                }
            }
        }
    }
    m
}

fn stereo_fold(speaker: Speaker) -> (f32, f32) {
    match speaker {
        Speaker::FrontLeft => (1.0, 0.0),
        Speaker::FrontRight => (0.0, 1.0),
        Speaker::FrontCenter => (FOLD_GAIN, FOLD_GAIN),
        Speaker::LowFrequency => (0.0, 0.0),
        Speaker::BackLeft | Speaker::SideLeft => (FOLD_GAIN, 0.0),
        Speaker::BackRight | Speaker::SideRight => (0.0, FOLD_GAIN),
    }
}

fn cumulative_samples(n: f64, fps: Fraction, sample_rate: u32, channels: u16) -> f64 {
    let total = f64::from(sample_rate) * fps.reciprocal().to_f64() * n;
    total - total % f64::from(channels.max(1))
}

/// Number of audio samples carried by 1-based frame `number`.
///
/// Rates that do not divide evenly spread the remainder so that frames sum to the exact
/// running total; each running total is kept a multiple of `channels`.
pub fn samples_per_frame(number: u64, fps: Fraction, sample_rate: u32, channels: u16) -> usize {
    let n = number as f64;
    let current = cumulative_samples(n, fps, sample_rate, channels);
    let previous = cumulative_samples(n - 1.0, fps, sample_rate, channels);
    let v = (current - previous).round();
    if v < 0.0 { 0 } else { v as usize }
}

/// Index of the first sample of 1-based frame `number` in the stream.
pub fn first_sample_of_frame(number: u64, fps: Fraction, sample_rate: u32, channels: u16) -> u64 {
    let previous = number.saturating_sub(1) as f64;
    cumulative_samples(previous, fps, sample_rate, channels)
        .round()
        .max(0.0) as u64
}

#[cfg(test)]
#[path = "../../tests/unit/frame/audio.rs"]
mod tests;
