use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{MontageError, MontageResult};

/// Rational number used for frame rates and time bases.
///
/// Construction never reduces; call [`Fraction::reduce`] when lowest terms are needed, so
/// `Fraction::new(640, 480)` keeps `640/480` until reduced to `4/3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Fraction {
    /// Numerator.
    pub num: i32,
    /// Denominator.
    pub den: i32,
}

impl Fraction {
    /// Create a fraction exactly as given.
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Greatest common divisor of numerator and denominator (always non-negative).
    pub fn gcd(self) -> i32 {
        let mut a = self.num.unsigned_abs();
        let mut b = self.den.unsigned_abs();
        while b != 0 {
            let t = a % b;
            a = b;
            b = t;
        }
        a as i32
    }

    /// Reduce in place to lowest terms.
    pub fn reduce(&mut self) {
        let g = self.gcd();
        if g > 1 {
            self.num /= g;
            self.den /= g;
        }
    }

    /// Return a reduced copy.
    pub fn reduced(mut self) -> Self {
        self.reduce();
        self
    }

    /// Swap numerator and denominator.
    pub fn reciprocal(self) -> Self {
        Self::new(self.den, self.num)
    }

    /// Floating-point value.
    pub fn to_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Value rounded to the nearest integer.
    pub fn to_int(self) -> i32 {
        self.to_f64().round() as i32
    }

    /// `true` when both terms are strictly positive (usable as a frame rate).
    pub fn is_positive_rate(self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Validate that this fraction can be used as a frame rate.
    pub fn validate_rate(self, what: &str) -> MontageResult<()> {
        if self.is_positive_rate() {
            Ok(())
        } else {
            Err(MontageError::validation(format!(
                "{what} must be a positive rate, got {self}"
            )))
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Fraction {
    type Err = MontageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|e| MontageError::validation(format!("invalid fraction '{s}': {e}")))
        };
        match s.split_once('/') {
            Some((num, den)) => Ok(Self::new(parse(num)?, parse(den)?)),
            None => Ok(Self::new(parse(s)?, 1)),
        }
    }
}

/// An `(X, Y)` pair; X is usually a frame number and Y a parameter value.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Horizontal component.
    #[serde(rename = "X")]
    pub x: f64,
    /// Vertical component.
    #[serde(rename = "Y")]
    pub y: f64,
}

impl Coordinate {
    /// Create a coordinate.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Loudspeaker positions used by the channel remix table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Speaker {
    /// Front left.
    FrontLeft,
    /// Front right.
    FrontRight,
    /// Front centre.
    FrontCenter,
    /// Low-frequency effects.
    LowFrequency,
    /// Back left.
    BackLeft,
    /// Back right.
    BackRight,
    /// Side left.
    SideLeft,
    /// Side right.
    SideRight,
}

impl Speaker {
    pub(crate) fn surround_twin(self) -> Option<Self> {
        match self {
            Self::BackLeft => Some(Self::SideLeft),
            Self::SideLeft => Some(Self::BackLeft),
            Self::BackRight => Some(Self::SideRight),
            Self::SideRight => Some(Self::BackRight),
            _ => None,
        }
    }
}

/// Audio channel layout; channel order follows [`ChannelLayout::speakers`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ChannelLayout {
    /// One centre channel.
    #[serde(rename = "mono")]
    Mono,
    /// Left and right.
    #[default]
    #[serde(rename = "stereo")]
    Stereo,
    /// Stereo plus LFE.
    #[serde(rename = "2.1")]
    TwoPointOne,
    /// Left, right, centre.
    #[serde(rename = "surround")]
    Surround,
    /// Front pair plus back pair.
    #[serde(rename = "quad")]
    Quad,
    /// Left, right, centre, side pair.
    #[serde(rename = "5.0")]
    FivePointZero,
    /// Left, right, centre, LFE, back pair.
    #[serde(rename = "5.1")]
    FivePointOne,
    /// 5.1 plus side pair.
    #[serde(rename = "7.1")]
    SevenPointOne,
}

impl ChannelLayout {
    const ALL: [Self; 8] = [
        Self::Mono,
        Self::Stereo,
        Self::TwoPointOne,
        Self::Surround,
        Self::Quad,
        Self::FivePointZero,
        Self::FivePointOne,
        Self::SevenPointOne,
    ];

    /// Speakers in channel order.
    pub fn speakers(self) -> &'static [Speaker] {
        use Speaker::*;
        match self {
            Self::Mono => &[FrontCenter],
            Self::Stereo => &[FrontLeft, FrontRight],
            Self::TwoPointOne => &[FrontLeft, FrontRight, LowFrequency],
            Self::Surround => &[FrontLeft, FrontRight, FrontCenter],
            Self::Quad => &[FrontLeft, FrontRight, BackLeft, BackRight],
            Self::FivePointZero => &[FrontLeft, FrontRight, FrontCenter, SideLeft, SideRight],
            Self::FivePointOne => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                LowFrequency,
                BackLeft,
                BackRight,
            ],
            Self::SevenPointOne => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                LowFrequency,
                BackLeft,
                BackRight,
                SideLeft,
                SideRight,
            ],
        }
    }

    /// Number of channels.
    pub fn channel_count(self) -> u16 {
        self.speakers().len() as u16
    }

    /// Conventional layout for a channel count, if one exists.
    pub fn for_channels(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            3 => Some(Self::Surround),
            4 => Some(Self::Quad),
            5 => Some(Self::FivePointZero),
            6 => Some(Self::FivePointOne),
            8 => Some(Self::SevenPointOne),
            _ => None,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        Self::ALL.iter().position(|l| *l == self).unwrap_or(1) as u8
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(usize::from(v)).copied()
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Opaque color.
    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        use crate::foundation::math::mul_div255_u8;
        Self {
            r: mul_div255_u8(u16::from(r), u16::from(a)),
            g: mul_div255_u8(u16::from(g), u16::from(a)),
            b: mul_div255_u8(u16::from(b), u16::from(a)),
            a,
        }
    }

    /// Pixel bytes in buffer order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
