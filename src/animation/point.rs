use crate::foundation::core::Coordinate;

/// Interpolation used for the segment that ends at a point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum InterpolationType {
    /// Cubic Bezier between the two endpoints and their handles.
    #[default]
    Bezier,
    /// Straight line between endpoints.
    Linear,
    /// Hold the left value until the next point.
    Constant,
}

impl From<InterpolationType> for u8 {
    fn from(v: InterpolationType) -> Self {
        match v {
            InterpolationType::Bezier => 0,
            InterpolationType::Linear => 1,
            InterpolationType::Constant => 2,
        }
    }
}

impl TryFrom<u8> for InterpolationType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Bezier),
            1 => Ok(Self::Linear),
            2 => Ok(Self::Constant),
            other => Err(format!("unknown interpolation type {other}")),
        }
    }
}

/// Whether Bezier handles follow the curve automatically or are user-owned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HandleType {
    /// Handles are recomputed whenever the keyframe changes.
    #[default]
    Auto,
    /// Handles are kept exactly as authored.
    Manual,
}

impl From<HandleType> for u8 {
    fn from(v: HandleType) -> Self {
        match v {
            HandleType::Auto => 0,
            HandleType::Manual => 1,
        }
    }
}

impl TryFrom<u8> for HandleType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Auto),
            1 => Ok(Self::Manual),
            other => Err(format!("unknown handle type {other}")),
        }
    }
}

/// Default left handle, relative to the segment box.
pub const DEFAULT_HANDLE_LEFT: Coordinate = Coordinate::new(0.5, 1.0);
/// Default right handle, relative to the segment box.
pub const DEFAULT_HANDLE_RIGHT: Coordinate = Coordinate::new(0.5, 0.0);

fn default_handle_left() -> Coordinate {
    DEFAULT_HANDLE_LEFT
}

fn default_handle_right() -> Coordinate {
    DEFAULT_HANDLE_RIGHT
}

/// A keyframe control point.
///
/// Handles are expressed relative to the segment they shape: `(0, 0)` is the segment's left
/// endpoint and `(1, 1)` its right endpoint. `handle_right` shapes the segment leaving this
/// point, `handle_left` the segment arriving at it.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    /// Position (X = frame, Y = value).
    pub co: Coordinate,
    /// Interpolation of the segment ending at this point.
    #[serde(default)]
    pub interpolation: InterpolationType,
    /// Handle shaping the incoming segment.
    #[serde(default = "default_handle_left")]
    pub handle_left: Coordinate,
    /// Handle shaping the outgoing segment.
    #[serde(default = "default_handle_right")]
    pub handle_right: Coordinate,
    /// Handle ownership.
    #[serde(default)]
    pub handle_type: HandleType,
}

impl Point {
    /// Bezier point with automatic handles.
    pub fn new(x: f64, y: f64) -> Self {
        Self::with_interpolation(x, y, InterpolationType::Bezier)
    }

    /// Point with the given interpolation and automatic handles.
    pub fn with_interpolation(x: f64, y: f64, interpolation: InterpolationType) -> Self {
        Self {
            co: Coordinate::new(x, y),
            interpolation,
            handle_left: DEFAULT_HANDLE_LEFT,
            handle_right: DEFAULT_HANDLE_RIGHT,
            handle_type: HandleType::Auto,
        }
    }

    /// Bezier point with user-owned handles.
    pub fn manual(x: f64, y: f64, handle_left: Coordinate, handle_right: Coordinate) -> Self {
        Self {
            co: Coordinate::new(x, y),
            interpolation: InterpolationType::Bezier,
            handle_left,
            handle_right,
            handle_type: HandleType::Manual,
        }
    }

    pub(crate) fn reset_auto_handles(&mut self) {
        if self.handle_type == HandleType::Auto {
            self.handle_left = DEFAULT_HANDLE_LEFT;
            self.handle_right = DEFAULT_HANDLE_RIGHT;
        }
    }
}
