//! Time representation for frame-accurate editing
//!
//! Uses rational numbers to avoid floating-point accumulation errors.
//! All time values are represented as numerator/denominator pairs. Playback
//! speeds are millesimal rationals; dividing by one rounds the result onto
//! a fixed tick grid so denominators stay bounded however many speeds mix.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use crate::error::{CutlineError, Result};

/// Resolution of speed-scaled times. Every supported frame duration and every
/// whole microsecond is a whole number of ticks.
pub const TICKS_PER_SECOND: i64 = 3_528_000_000;

/// A rational time value representing a point in time or a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "StoredTime")]
pub struct RationalTime {
    /// Time value as a rational number (seconds)
    value: Rational64,
}

/// Wire shape of [`RationalTime`]; reduced on the way in.
#[derive(Deserialize)]
struct StoredTime {
    value: Rational64,
}

impl From<StoredTime> for RationalTime {
    fn from(stored: StoredTime) -> Self {
        Self::new(*stored.value.numer(), *stored.value.denom())
    }
}

impl RationalTime {
    /// Create a new RationalTime from numerator and denominator.
    /// The time is `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// Whole seconds.
    #[inline]
    pub fn seconds(seconds: i64) -> Self {
        Self::new(seconds, 1)
    }

    /// Milliseconds.
    #[inline]
    pub fn millis(millis: i64) -> Self {
        Self::new(millis, 1000)
    }

    /// Create a RationalTime from a frame number and frame rate.
    #[inline]
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self {
            value: Rational64::new(frames * rate.denominator as i64, rate.numerator as i64),
        }
    }

    /// Create a RationalTime from seconds as a float.
    /// Note: May introduce small precision errors.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        // Microsecond precision is finer than any frame rate we quantize to
        const PRECISION: i64 = 1_000_000;
        Self {
            value: Rational64::new((seconds * PRECISION as f64).round() as i64, PRECISION),
        }
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    /// Convert to frame number at the given frame rate (floored).
    #[inline]
    pub fn to_frames(self, rate: FrameRate) -> i64 {
        (self.value * rate.as_ratio()).floor().to_integer()
    }

    /// Round to the nearest multiple of `rate`'s frame duration.
    pub fn quantize(self, rate: FrameRate) -> Self {
        let frames = (self.value * rate.as_ratio()).round();
        Self {
            value: frames / rate.as_ratio(),
        }
    }

    /// Round to the nearest tick of the [`TICKS_PER_SECOND`] grid.
    pub fn round_to_ticks(self) -> Self {
        Self::from_ratio_in_ticks(i128::from(*self.value.numer()), i128::from(*self.value.denom()))
    }

    /// `numer / denom` seconds, rounded half away from zero onto the tick grid.
    fn from_ratio_in_ticks(numer: i128, denom: i128) -> Self {
        let (numer, denom) = if denom < 0 { (-numer, -denom) } else { (numer, denom) };
        let scaled = numer * i128::from(TICKS_PER_SECOND);
        let ticks = (scaled + scaled.signum() * (denom / 2)) / denom;
        let ticks = ticks.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
        Self::new(ticks, TICKS_PER_SECOND)
    }

    /// Zero time constant.
    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };

    /// Check if this time is zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        *self.value.numer() == 0
    }

    /// Check if this time is strictly negative.
    #[inline]
    pub fn is_negative(self) -> bool {
        *self.value.numer() < 0
    }

    /// Get the absolute value of this time.
    #[inline]
    pub fn abs(self) -> Self {
        if self.is_negative() {
            -self
        } else {
            self
        }
    }

    /// Half of this time.
    #[inline]
    pub fn half(self) -> Self {
        self / 2
    }

    /// Absolute distance between two times.
    #[inline]
    pub fn distance(self, other: Self) -> Self {
        (self - other).abs()
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
        }
    }
}

impl AddAssign for RationalTime {
    fn add_assign(&mut self, rhs: Self) {
        self.value = self.value + rhs.value;
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
        }
    }
}

impl SubAssign for RationalTime {
    fn sub_assign(&mut self, rhs: Self) {
        self.value = self.value - rhs.value;
    }
}

impl Neg for RationalTime {
    type Output = Self;
    fn neg(self) -> Self {
        Self { value: -self.value }
    }
}

impl Mul<i64> for RationalTime {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self {
            value: self.value * rhs,
        }
    }
}

impl Div<i64> for RationalTime {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self {
            value: self.value / rhs,
        }
    }
}

/// Timeline → source: a timeline span played at `speed` consumes `span * speed` of source.
impl Mul<Speed> for RationalTime {
    type Output = Self;
    fn mul(self, rhs: Speed) -> Self {
        Self {
            value: self.value * rhs.0,
        }
    }
}

/// Source → timeline: `source / speed` is what elapses on the timeline,
/// rounded to the tick grid.
impl Div<Speed> for RationalTime {
    type Output = Self;
    fn div(self, rhs: Speed) -> Self {
        let numer = i128::from(*self.value.numer()) * i128::from(*rhs.0.denom());
        let denom = i128::from(*self.value.denom()) * i128::from(*rhs.0.numer());
        Self::from_ratio_in_ticks(numer, denom)
    }
}

impl std::iter::Sum for RationalTime {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, t| acc + t)
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 24000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Duration of a single frame.
    #[inline]
    pub fn frame_duration(self) -> RationalTime {
        RationalTime::new(self.denominator as i64, self.numerator as i64)
    }

    /// Compare two rates by frames per second, exactly.
    pub fn cmp_fps(self, other: Self) -> Ordering {
        let lhs = self.numerator as u64 * other.denominator as u64;
        let rhs = other.numerator as u64 * self.denominator as u64;
        lhs.cmp(&rhs)
    }

    /// The faster of two rates.
    pub fn max_fps(self, other: Self) -> Self {
        if other.cmp_fps(self) == Ordering::Greater {
            other
        } else {
            self
        }
    }

    /// Clamp into `[min, max]` by frames per second.
    pub fn clamp_fps(self, min: Self, max: Self) -> Self {
        if self.cmp_fps(min) == Ordering::Less {
            min
        } else if self.cmp_fps(max) == Ordering::Greater {
            max
        } else {
            self
        }
    }

    #[inline]
    fn as_ratio(self) -> Rational64 {
        Rational64::new(self.numerator as i64, self.denominator as i64)
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// Playback speed multiplier, stored as a rational with millesimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Rational64", into = "Rational64")]
pub struct Speed(Rational64);

impl Speed {
    const PRECISION: i64 = 1000;

    /// Normal (1x) speed.
    pub const NORMAL: Self = Self(Rational64::new_raw(1, 1));

    /// Create a speed from a float multiplier. Must be finite and positive.
    pub fn new(multiplier: f64) -> Result<Self> {
        const PRECISION: i64 = Speed::PRECISION;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(CutlineError::InvalidParameter(format!(
                "speed must be a positive finite multiplier, got {multiplier}"
            )));
        }
        let numer = (multiplier * PRECISION as f64).round() as i64;
        if numer == 0 {
            return Err(CutlineError::InvalidParameter(format!(
                "speed {multiplier} is below the supported precision"
            )));
        }
        Ok(Self(Rational64::new(numer, PRECISION)))
    }

    /// Multiplier as f64.
    #[inline]
    pub fn to_f64(self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }

    /// True for exactly 1x.
    #[inline]
    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }
}

impl TryFrom<Rational64> for Speed {
    type Error = CutlineError;

    /// Accepts positive ratios whose reduced denominator divides the millesimal grid.
    fn try_from(raw: Rational64) -> Result<Self> {
        if *raw.denom() == 0 {
            return Err(CutlineError::InvalidParameter("speed has a zero denominator".into()));
        }
        let value = Rational64::new(*raw.numer(), *raw.denom());
        if *value.numer() <= 0 {
            return Err(CutlineError::InvalidParameter(format!(
                "speed must be positive, got {}/{}",
                raw.numer(),
                raw.denom()
            )));
        }
        if Self::PRECISION % *value.denom() != 0 {
            return Err(CutlineError::InvalidParameter(format!(
                "speed {}/{} is finer than a thousandth",
                value.numer(),
                value.denom()
            )));
        }
        Ok(Self(value))
    }
}

impl From<Speed> for Rational64 {
    fn from(speed: Speed) -> Self {
        speed.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.to_f64())
    }
}

/// A time range with inclusive start and exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start time (inclusive)
    pub start: RationalTime,
    /// Duration of the range
    pub duration: RationalTime,
}

impl TimeRange {
    /// Create a new time range from start and duration.
    #[inline]
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    /// Create a time range from start and end times.
    #[inline]
    pub fn from_start_end(start: RationalTime, end: RationalTime) -> Self {
        Self {
            start,
            duration: end - start,
        }
    }

    /// End time (exclusive).
    #[inline]
    pub fn end(self) -> RationalTime {
        self.start + self.duration
    }

    /// Check if a time is within this range.
    #[inline]
    pub fn contains(self, time: RationalTime) -> bool {
        time >= self.start && time < self.end()
    }

    /// Check if two ranges overlap.
    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Compute the intersection of two ranges, if any.
    pub fn intersection(self, other: Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        Some(Self::from_start_end(start, end))
    }

    /// Shorten the range so it ends no later than `limit`. Returns `None`
    /// when nothing of the range is left.
    pub fn truncate_to(self, limit: RationalTime) -> Option<Self> {
        let end = self.end().min(limit);
        if end <= self.start {
            None
        } else {
            Some(Self::from_start_end(self.start, end))
        }
    }

    /// Empty range starting at zero.
    pub const EMPTY: Self = Self {
        start: RationalTime::ZERO,
        duration: RationalTime::ZERO,
    };
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rational_time_frames() {
        let rate = FrameRate::FPS_24;
        let time = RationalTime::from_frames(48, rate);
        assert_eq!(time.to_seconds_f64(), 2.0);
        assert_eq!(time.to_frames(rate), 48);
    }

    #[test]
    fn test_frame_rate_23_976() {
        let rate = FrameRate::FPS_23_976;
        let fps = rate.to_fps_f64();
        assert!((fps - 23.976).abs() < 0.001);
    }

    #[test]
    fn test_frame_rate_ordering() {
        assert_eq!(
            FrameRate::FPS_29_97.max_fps(FrameRate::FPS_30),
            FrameRate::FPS_30
        );
        assert_eq!(
            FrameRate::new(120, 1).clamp_fps(FrameRate::FPS_24, FrameRate::FPS_60),
            FrameRate::FPS_60
        );
        assert_eq!(
            FrameRate::new(15, 1).clamp_fps(FrameRate::FPS_24, FrameRate::FPS_60),
            FrameRate::FPS_24
        );
    }

    #[test]
    fn test_time_range_overlap() {
        let a = TimeRange::new(RationalTime::new(0, 1), RationalTime::new(10, 1));
        let b = TimeRange::new(RationalTime::new(5, 1), RationalTime::new(10, 1));
        assert!(a.overlaps(b));

        let intersection = a.intersection(b).unwrap();
        assert_eq!(intersection.start, RationalTime::new(5, 1));
        assert_eq!(intersection.duration, RationalTime::new(5, 1));
    }

    #[test]
    fn test_time_range_truncate() {
        let r = TimeRange::new(RationalTime::seconds(8), RationalTime::seconds(4));
        let cut = r.truncate_to(RationalTime::seconds(10)).unwrap();
        assert_eq!(cut.duration, RationalTime::seconds(2));
        assert!(r.truncate_to(RationalTime::seconds(8)).is_none());
    }

    #[test]
    fn test_time_arithmetic() {
        let a = RationalTime::new(1, 2); // 0.5 seconds
        let b = RationalTime::new(1, 4); // 0.25 seconds
        let sum = a + b;
        assert_eq!(sum.to_seconds_f64(), 0.75);
    }

    #[test]
    fn test_speed_division_is_exact() {
        let speed = Speed::new(1.5).unwrap();
        let trimmed = RationalTime::seconds(3);
        assert_eq!(trimmed / speed, RationalTime::seconds(2));
        assert_eq!((trimmed / speed) * speed, trimmed);
    }

    #[test]
    fn test_mixed_speeds_sum_without_overflow() {
        let clip = RationalTime::seconds(10);
        let mut total = RationalTime::ZERO;
        for step in 0..200_i32 {
            let speed = Speed::new(1.0 + f64::from(step * 7 + 9) / 1000.0).unwrap();
            total += clip / speed;
        }
        let expected: f64 = (0..200_i32)
            .map(|step| 10.0 / (1.0 + f64::from(step * 7 + 9) / 1000.0))
            .sum();
        assert!((total.to_seconds_f64() - expected).abs() < 1e-6);
        assert_eq!(total.round_to_ticks(), total);
    }

    #[test]
    fn test_frame_durations_sit_on_the_tick_grid() {
        for rate in [
            FrameRate::FPS_23_976,
            FrameRate::FPS_25,
            FrameRate::FPS_29_97,
            FrameRate::FPS_59_94,
            FrameRate::FPS_60,
        ] {
            let frame = rate.frame_duration();
            assert_eq!(frame.round_to_ticks(), frame);
            assert_eq!(frame / Speed::NORMAL, frame);
        }
        assert_eq!(RationalTime::new(1, 1_000_000).round_to_ticks(), RationalTime::new(1, 1_000_000));
    }

    #[test]
    fn test_speed_deserialization_validates() {
        let speed: Speed = serde_json::from_str("[3, 2]").unwrap();
        assert_eq!(speed, Speed::new(1.5).unwrap());
        let reduced: Speed = serde_json::from_str("[-4, -2]").unwrap();
        assert_eq!(reduced, Speed::new(2.0).unwrap());
        assert!(serde_json::from_str::<Speed>("[0, 1]").is_err());
        assert!(serde_json::from_str::<Speed>("[-1, 1]").is_err());
        assert!(serde_json::from_str::<Speed>("[1, 0]").is_err());
        assert!(serde_json::from_str::<Speed>("[1, 3]").is_err());
        assert_eq!(serde_json::to_string(&Speed::NORMAL).unwrap(), "[1,1]");
    }

    #[test]
    fn test_deserialized_time_is_reduced() {
        let t: RationalTime = serde_json::from_str(r#"{"value":[2,-4]}"#).unwrap();
        assert_eq!(t, RationalTime::new(-1, 2));
        assert!(t.is_negative());
        assert!(serde_json::from_str::<RationalTime>(r#"{"value":[1,0]}"#).is_err());
    }

    #[test]
    fn test_speed_rejects_non_positive() {
        assert!(Speed::new(0.0).is_err());
        assert!(Speed::new(-1.0).is_err());
        assert!(Speed::new(f64::NAN).is_err());
    }

    #[test]
    fn test_quantize_snaps_to_nearest_frame() {
        let rate = FrameRate::FPS_30;
        let t = RationalTime::millis(1010);
        assert_eq!(t.quantize(rate), RationalTime::seconds(1));
        let t = RationalTime::millis(1020);
        assert_eq!(t.quantize(rate), RationalTime::new(31, 30));
    }

    proptest! {
        #[test]
        fn quantize_stays_within_half_a_frame(millis in -600_000i64..600_000) {
            let rate = FrameRate::FPS_29_97;
            let t = RationalTime::millis(millis);
            let q = t.quantize(rate);
            prop_assert!(q.distance(t) <= rate.frame_duration().half());
            prop_assert_eq!(q.quantize(rate), q);
        }
    }
}
