use crate::animation::point::{InterpolationType, Point};
use crate::foundation::core::Fraction;
use crate::foundation::error::{MontageError, MontageResult};

const MEMO_LIMIT: i64 = 1 << 16;
const BEZIER_TOLERANCE: f64 = 1e-10;
const BEZIER_MAX_STEPS: usize = 96;

/// Animated scalar curve defined by control points sorted by X.
///
/// Values before the first point and after the last are clamped to the boundary point's Y.
/// Each segment interpolates according to the mode of its right-hand point. Values at integer
/// positions are memoized and rebuilt on every mutation.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "KeyframeRepr", into = "KeyframeRepr")]
pub struct Keyframe {
    points: Vec<Point>,
    values: Vec<f64>,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct KeyframeRepr {
    #[serde(rename = "Points", default)]
    points: Vec<Point>,
}

impl From<KeyframeRepr> for Keyframe {
    fn from(repr: KeyframeRepr) -> Self {
        let mut kf = Keyframe::new();
        for p in repr.points {
            kf.insert_sorted(p);
        }
        kf.refresh();
        kf
    }
}

impl From<Keyframe> for KeyframeRepr {
    fn from(kf: Keyframe) -> Self {
        Self { points: kf.points }
    }
}

impl PartialEq for Keyframe {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
    }
}

impl Keyframe {
    /// Empty keyframe; value queries fail with [`MontageError::NoPoints`] until a point is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant keyframe holding `value` (one point at X = 1).
    pub fn with_value(value: f64) -> Self {
        let mut kf = Self::new();
        kf.add_point(Point::new(1.0, value));
        kf
    }

    /// Build a keyframe from points in any order.
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Self {
        KeyframeRepr {
            points: points.into_iter().collect(),
        }
        .into()
    }

    /// Insert a point, replacing any existing point at the same X.
    pub fn add_point(&mut self, p: Point) {
        self.insert_sorted(p);
        self.refresh();
    }

    /// Insert a point at `(x, y)` with the given interpolation.
    pub fn add_xy(&mut self, x: f64, y: f64, interpolation: InterpolationType) {
        self.add_point(Point::with_interpolation(x, y, interpolation));
    }

    fn insert_sorted(&mut self, p: Point) {
        let idx = self.points.partition_point(|q| q.co.x < p.co.x);
        match self.points.get_mut(idx) {
            Some(existing) if existing.co.x == p.co.x => *existing = p,
            _ => self.points.insert(idx, p),
        }
    }

    fn refresh(&mut self) {
        for p in &mut self.points {
            p.reset_auto_handles();
        }
        self.values.clear();
        let len = self.get_length();
        if len == 0 || len > MEMO_LIMIT {
            return;
        }
        let values = (0..len).map(|i| self.evaluate(i as f64)).collect();
        self.values = values;
    }

    /// Control points, sorted by X.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Value at `x` (fractional X allowed). X beyond either end clamps to the end point; NaN is
    /// rejected.
    pub fn get_value(&self, x: f64) -> MontageResult<f64> {
        if self.points.is_empty() {
            return Err(MontageError::NoPoints);
        }
        if x.is_nan() {
            return Err(MontageError::validation("keyframe X must be a number, got NaN"));
        }
        if x >= 0.0
            && x.fract() == 0.0
            && let Some(v) = self.values.get(x as usize)
        {
            return Ok(*v);
        }
        Ok(self.evaluate(x))
    }

    /// Value at `x`, or `default` for a keyframe without points.
    pub fn value_or(&self, x: f64, default: f64) -> f64 {
        self.get_value(x).unwrap_or(default)
    }

    /// Value rounded to the nearest `i32`.
    pub fn get_int(&self, x: f64) -> MontageResult<i32> {
        Ok(self.get_value(x)?.round() as i32)
    }

    /// Value rounded to the nearest `i64`.
    pub fn get_long(&self, x: f64) -> MontageResult<i64> {
        Ok(self.get_value(x)?.round() as i64)
    }

    fn long_at(&self, index: i64) -> MontageResult<i64> {
        self.get_long(index as f64)
    }

    /// `true` when the next change of the rounded value after `index` is upward.
    ///
    /// Indices at the ends of the curve report `true`.
    pub fn is_increasing(&self, index: i64) -> MontageResult<bool> {
        if self.points.is_empty() {
            return Err(MontageError::NoPoints);
        }
        let len = self.get_length();
        if index < 1 || index + 1 >= len {
            return Ok(true);
        }
        let current = self.long_at(index)?;
        let mut i = index;
        while i < len {
            i += 1;
            let next = self.long_at(i)?;
            if next > current {
                return Ok(true);
            }
            if next < current {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Position of `index` within its run of equal rounded values, as a reduced fraction.
    ///
    /// Outside `1..length-1` returns `1/1`.
    pub fn repeat_fraction(&self, index: i64) -> MontageResult<Fraction> {
        if self.points.is_empty() {
            return Err(MontageError::NoPoints);
        }
        let len = self.get_length();
        if index < 1 || index + 1 >= len {
            return Ok(Fraction::new(1, 1));
        }
        let current = self.long_at(index)?;
        let mut previous_repeats = 0i64;
        let mut i = index;
        while i > 0 && self.long_at(i)? == current {
            previous_repeats += 1;
            i -= 1;
        }
        let mut next_repeats = 0i64;
        let mut i = index + 1;
        while i < len && self.long_at(i)? == current {
            next_repeats += 1;
            i += 1;
        }
        let total = previous_repeats + next_repeats;
        Ok(Fraction::new(clamp_i32(previous_repeats), clamp_i32(total)).reduced())
    }

    /// Change of the rounded value from `index - 1` to `index`.
    pub fn get_delta(&self, index: i64) -> MontageResult<f64> {
        let first = self.points.first().ok_or(MontageError::NoPoints)?;
        if index < 1 || index >= self.get_length() {
            return Ok(0.0);
        }
        if index == 1 {
            return Ok(first.co.y);
        }
        Ok((self.long_at(index)? - self.long_at(index - 1)?) as f64)
    }

    /// Number of integer positions covered (`round(last.X) + 1`; `1` for a single point).
    pub fn get_length(&self) -> i64 {
        match self.points.len() {
            0 => 0,
            1 => 1,
            _ => self.points[self.points.len() - 1].co.x.round() as i64 + 1,
        }
    }

    /// Number of control points.
    pub fn get_count(&self) -> usize {
        self.points.len()
    }

    /// Point at `index`.
    pub fn get_point(&self, index: usize) -> MontageResult<&Point> {
        self.points
            .get(index)
            .ok_or(MontageError::OutOfBoundsPoint {
                index,
                count: self.points.len(),
            })
    }

    /// `true` when a point sits exactly at `x`.
    pub fn contains_point(&self, x: f64) -> bool {
        self.points.iter().any(|p| p.co.x == x)
    }

    /// First point at or after `x`, or the point before it when `left` is set.
    pub fn closest_point(&self, x: f64, left: bool) -> Option<Point> {
        let idx = self.points.partition_point(|p| p.co.x < x);
        if idx >= self.points.len() {
            return self.points.last().copied();
        }
        if left && idx > 0 && self.points[idx].co.x != x {
            return Some(self.points[idx - 1]);
        }
        Some(self.points[idx])
    }

    /// Point with the largest Y (first one on ties).
    pub fn max_point(&self) -> Option<Point> {
        self.points
            .iter()
            .copied()
            .reduce(|best, p| if p.co.y > best.co.y { p } else { best })
    }

    /// Index of the point whose coordinate matches `p`.
    pub fn find_index(&self, p: &Point) -> Option<usize> {
        self.points.iter().position(|q| q.co == p.co)
    }

    /// Remove the point whose coordinate matches `p`.
    pub fn remove_point(&mut self, p: &Point) -> MontageResult<()> {
        let index = self.find_index(p).ok_or(MontageError::OutOfBoundsPoint {
            index: self.points.len(),
            count: self.points.len(),
        })?;
        self.remove_point_at(index)
    }

    /// Remove the point at `index`.
    pub fn remove_point_at(&mut self, index: usize) -> MontageResult<()> {
        if index >= self.points.len() {
            return Err(MontageError::OutOfBoundsPoint {
                index,
                count: self.points.len(),
            });
        }
        self.points.remove(index);
        self.refresh();
        Ok(())
    }

    /// Replace the point at `index` with `p` (re-sorting as needed).
    pub fn update_point(&mut self, index: usize, p: Point) -> MontageResult<()> {
        if index >= self.points.len() {
            return Err(MontageError::OutOfBoundsPoint {
                index,
                count: self.points.len(),
            });
        }
        self.points.remove(index);
        self.add_point(p);
        Ok(())
    }

    /// Multiply every point's X (except the first) by `factor`, rounding to whole frames.
    ///
    /// Points landing on the same X collapse to the later one.
    pub fn scale_points(&mut self, factor: f64) {
        let scaled: Vec<Point> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut p = *p;
                if i > 0 {
                    p.co.x = (p.co.x * factor).round();
                }
                p
            })
            .collect();
        self.points.clear();
        for p in scaled {
            self.insert_sorted(p);
        }
        self.refresh();
    }

    /// Reverse the Y values across the points, keeping each X in place.
    pub fn flip_points(&mut self) {
        let n = self.points.len();
        for i in 0..n / 2 {
            let j = n - 1 - i;
            let y = self.points[i].co.y;
            self.points[i].co.y = self.points[j].co.y;
            self.points[j].co.y = y;
        }
        self.refresh();
    }

    /// Serialize as `{"Points": [...]}`.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Parse a `{"Points": [...]}` document.
    pub fn from_json_str(s: &str) -> MontageResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| MontageError::invalid_json("Keyframe::from_json", e.to_string()))
    }

    /// Parse from an already-decoded JSON value.
    pub fn from_json_value(value: &serde_json::Value) -> MontageResult<Self> {
        Self::deserialize_value(value, "Keyframe::from_json")
    }

    pub(crate) fn deserialize_value(value: &serde_json::Value, context: &str) -> MontageResult<Self> {
        <Self as serde::Deserialize>::deserialize(value)
            .map_err(|e| MontageError::invalid_json(context, e.to_string()))
    }

    fn evaluate(&self, x: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if x <= first.co.x {
            return first.co.y;
        }
        if x >= last.co.x {
            return last.co.y;
        }

        let idx = self
            .points
            .partition_point(|p| p.co.x <= x)
            .clamp(1, self.points.len() - 1);
        let left = &self.points[idx - 1];
        let right = &self.points[idx];
        match right.interpolation {
            InterpolationType::Constant => left.co.y,
            InterpolationType::Linear => {
                let t = (x - left.co.x) / (right.co.x - left.co.x);
                left.co.y + (right.co.y - left.co.y) * t
            }
            InterpolationType::Bezier => bezier_value(left, right, x),
        }
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn cubic(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

fn bezier_value(left: &Point, right: &Point, x: f64) -> f64 {
    let (x0, y0) = (left.co.x, left.co.y);
    let (x3, y3) = (right.co.x, right.co.y);
    let dx = x3 - x0;
    let dy = y3 - y0;
    let x1 = x0 + left.handle_right.x * dx;
    let y1 = y0 + left.handle_right.y * dy;
    let x2 = x0 + right.handle_left.x * dx;
    let y2 = y0 + right.handle_left.y * dy;

    // X(t) is solved numerically; it has no closed-form inverse in general.
    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    let mut t = 0.5;
    for _ in 0..BEZIER_MAX_STEPS {
        t = 0.5 * (lo + hi);
        let bx = cubic(x0, x1, x2, x3, t);
        if (bx - x).abs() <= BEZIER_TOLERANCE {
            break;
        }
        if bx < x {
            lo = t;
        } else {
            hi = t;
        }
    }
    cubic(y0, y1, y2, y3, t)
}

#[cfg(test)]
#[path = "../../tests/unit/animation/keyframe.rs"]
mod tests;
