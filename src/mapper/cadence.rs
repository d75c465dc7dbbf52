use crate::foundation::core::Fraction;
use crate::frame::audio::samples_per_frame;
use crate::mapper::{Field, MappedFrame, MapperTarget, PulldownMode, SampleRange};
use crate::reader::{ReaderInfo, frames_in};

/// Rates within this distance of 24, 25 or 30 use the field cadence (covers the NTSC variants).
const CADENCE_TOLERANCE: f64 = 0.05;

/// Build the complete target-frame list for `source` converted to `target`.
///
/// Still images without audio map every target frame to itself; everything else goes through
/// field generation followed by field pairing.
pub(crate) fn build_mapping(source: &ReaderInfo, target: &MapperTarget) -> Vec<MappedFrame> {
    if is_still(source) {
        let len = frames_in(source.duration, target.fps);
        return (1..=len)
            .map(|n| MappedFrame {
                odd: Field {
                    frame: n,
                    is_odd: true,
                },
                even: Field {
                    frame: n,
                    is_odd: false,
                },
                samples: SampleRange::default(),
            })
            .collect();
    }

    let fields = build_fields(source.fps, target.fps, target.pulldown, source.video_length);
    pair_fields(&fields, source, target.fps)
}

pub(crate) fn is_still(info: &ReaderInfo) -> bool {
    info.has_video && !info.has_audio && info.has_single_image
}

fn cadence_rate(fps: Fraction) -> Option<i64> {
    let rate = i64::from(fps.to_int());
    (matches!(rate, 24 | 25 | 30) && (fps.to_f64() - rate as f64).abs() < CADENCE_TOLERANCE)
        .then_some(rate)
}

struct FieldList {
    fields: Vec<Field>,
    odd: bool,
}

impl FieldList {
    fn push(&mut self, frame: u64) {
        let is_odd = self.odd;
        self.push_field(Field { frame, is_odd });
    }

    fn push_field(&mut self, field: Field) {
        self.fields.push(field);
        self.odd = !self.odd;
    }

    fn toggle(&mut self) {
        self.odd = !self.odd;
    }
}

/// Source field sequence for converting `len` source frames from `source` to `target` fps.
pub(crate) fn build_fields(
    source: Fraction,
    target: Fraction,
    mode: PulldownMode,
    len: u64,
) -> Vec<Field> {
    match (cadence_rate(source), cadence_rate(target)) {
        (Some(s), Some(t)) => cadence_fields(s, t, mode, len),
        _ => linear_fields(source, target, len),
    }
}

fn cadence_fields(source: i64, target: i64, mode: PulldownMode, len: u64) -> Vec<Field> {
    let difference = target - source;
    let field_interval = if difference == 0 {
        1
    } else {
        ((source as f64 / difference as f64).abs().round() as u64).max(1)
    };
    let frame_interval = field_interval * 2;

    let mut list = FieldList {
        fields: Vec::with_capacity((len * 3) as usize),
        odd: true,
    };
    let mut frame = 1u64;
    let mut field = 1u64;
    while field <= len * 2 {
        let on_field = field % field_interval == 0;
        if difference == 0 {
            list.push(frame);
        } else if difference > 0 {
            list.push(frame);
            match mode {
                PulldownMode::Classic if on_field => list.push(frame),
                PulldownMode::Advanced if on_field && field % frame_interval != 0 => {
                    list.push(frame);
                    if frame < len {
                        let is_odd = list.odd;
                        list.push_field(Field {
                            frame: frame + 1,
                            is_odd,
                        });
                    }
                }
                PulldownMode::None if field % frame_interval == 0 => {
                    list.push(frame);
                    list.push(frame);
                }
                _ => {}
            }
        } else {
            match mode {
                PulldownMode::Classic if on_field => list.toggle(),
                PulldownMode::Advanced if on_field && field % frame_interval != 0 => field += 1,
                PulldownMode::None if frame % field_interval == 0 => field += 1,
                _ => list.push(frame),
            }
        }

        if field % 2 == 0 {
            frame += 1;
        }
        field += 1;
    }
    list.fields
}

fn linear_fields(source: Fraction, target: Fraction, len: u64) -> Vec<Field> {
    let new_len = (len as f64 * target.to_f64() / source.to_f64()) as u64;
    let mut list = FieldList {
        fields: Vec::with_capacity((new_len * 2) as usize),
        odd: true,
    };
    if new_len == 0 || len == 0 {
        return list.fields;
    }
    let increment = (len + 1) as f64 / new_len as f64;
    let mut position = 1.0f64;
    for _ in 0..new_len {
        let frame = (position.round() as u64).clamp(1, len);
        list.push(frame);
        list.push(frame);
        position += increment;
    }
    list.fields
}

/// Walks source audio forward, handing each target frame the samples it needs.
struct SampleCursor {
    source_fps: Fraction,
    target_fps: Fraction,
    sample_rate: u32,
    channels: u16,
    frame: u64,
    position: usize,
}

impl SampleCursor {
    fn source_samples(&self, frame: u64) -> usize {
        samples_per_frame(frame, self.source_fps, self.sample_rate, self.channels)
    }

    fn next_range(&mut self, number: u64) -> SampleRange {
        let total = samples_per_frame(number, self.target_fps, self.sample_rate, self.channels);
        let mut end_frame = self.frame;
        let mut end_position = self.position;
        let mut remaining = total;
        while remaining > 0 {
            let available = self.source_samples(end_frame).saturating_sub(end_position);
            if available >= remaining {
                end_position += remaining - 1;
                remaining = 0;
            } else {
                end_frame += 1;
                end_position = 0;
                remaining -= available;
            }
        }

        let range = SampleRange {
            frame_start: self.frame,
            sample_start: self.position,
            frame_end: end_frame,
            sample_end: end_position,
            total,
        };
        if total == 0 {
            return range;
        }

        self.frame = end_frame;
        self.position = end_position + 1;
        if self.position >= self.source_samples(self.frame) {
            self.frame += 1;
            self.position = 0;
        }
        range
    }
}

/// Pair consecutive fields into target frames and attach their audio spans.
///
/// Each field overwrites the slot matching its own parity, so a frame whose two fields share a
/// parity keeps the previous frame's other field.
fn pair_fields(fields: &[Field], source: &ReaderInfo, target_fps: Fraction) -> Vec<MappedFrame> {
    let mut cursor = SampleCursor {
        source_fps: source.fps,
        target_fps,
        sample_rate: source.sample_rate,
        channels: source.channels,
        frame: 1,
        position: 0,
    };
    let mut odd = Field {
        frame: 0,
        is_odd: true,
    };
    let mut even = Field {
        frame: 0,
        is_odd: false,
    };

    let mut frames = Vec::with_capacity(fields.len() / 2);
    for (i, field) in fields.iter().enumerate() {
        if field.is_odd {
            odd = *field;
        } else {
            even = *field;
        }
        let index = i as u64 + 1;
        if index % 2 != 0 {
            continue;
        }
        let number = index / 2;
        let samples = if source.has_audio {
            cursor.next_range(number)
        } else {
            SampleRange::default()
        };
        frames.push(MappedFrame {
            odd: fill_missing(odd, even),
            even: fill_missing(even, odd),
            samples,
        });
    }
    frames
}

fn fill_missing(field: Field, other: Field) -> Field {
    if field.frame == 0 {
        Field {
            frame: other.frame,
            ..field
        }
    } else {
        field
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mapper/cadence.rs"]
mod tests;
