//! Range-checked values
//!
//! `RangedValue<T, MIN, MAX>` holds a value that is guaranteed to lie in the
//! closed interval `[MIN, MAX]`. Every construction and every mutation is
//! validated; negation produces a new value and validates it again.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Deref, Neg};
use thiserror::Error;

/// Rotation angle in degrees, limited to `[-180, 180]`
pub type Angle = RangedValue<f32, -180, 180>;

/// Error raised when a value violates its range
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value {value} is outside the range [{min}, {max}]")]
pub struct RangeError {
    /// Offending value, formatted for display
    pub value: String,
    /// Lower bound
    pub min: i64,
    /// Upper bound
    pub max: i64,
}

/// Scalar types that can be range-checked against integral bounds
pub trait RangeBound: Copy + PartialOrd + fmt::Display {
    /// Convert an integral bound into this type
    fn from_bound(bound: i64) -> Self;
}

#[allow(clippy::cast_precision_loss)]
impl RangeBound for f32 {
    fn from_bound(bound: i64) -> Self {
        bound as Self
    }
}

#[allow(clippy::cast_precision_loss)]
impl RangeBound for f64 {
    fn from_bound(bound: i64) -> Self {
        bound as Self
    }
}

impl RangeBound for i32 {
    fn from_bound(bound: i64) -> Self {
        Self::try_from(bound).unwrap_or(if bound < 0 { Self::MIN } else { Self::MAX })
    }
}

impl RangeBound for i64 {
    fn from_bound(bound: i64) -> Self {
        bound
    }
}

impl RangeBound for u32 {
    fn from_bound(bound: i64) -> Self {
        Self::try_from(bound).unwrap_or(if bound < 0 { Self::MIN } else { Self::MAX })
    }
}

/// A value of type `T` constrained to `[MIN, MAX]`
///
/// # Examples
/// ```
/// # use laser_engine::foundation::ranged::Angle;
/// assert!(Angle::new(180.0).is_ok());
/// assert!(Angle::new(200.0).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct RangedValue<T, const MIN: i64, const MAX: i64> {
    value: T,
}

impl<T: RangeBound, const MIN: i64, const MAX: i64> RangedValue<T, MIN, MAX> {
    /// Lower bound as `T`
    pub fn min() -> T {
        T::from_bound(MIN)
    }

    /// Upper bound as `T`
    pub fn max() -> T {
        T::from_bound(MAX)
    }

    /// Whether `value` lies in `[MIN, MAX]`; `NaN` never does
    pub fn contains(value: T) -> bool {
        Self::min() <= value && value <= Self::max()
    }

    fn check(value: T) -> Result<T, RangeError> {
        if Self::contains(value) {
            Ok(value)
        } else {
            Err(RangeError {
                value: value.to_string(),
                min: MIN,
                max: MAX,
            })
        }
    }

    /// Validate and wrap a value
    pub fn new(value: T) -> Result<Self, RangeError> {
        Self::check(value).map(|value| Self { value })
    }

    /// Current value
    pub const fn get(&self) -> T {
        self.value
    }

    /// Replace the value; on error the old value is kept
    pub fn set(&mut self, value: T) -> Result<(), RangeError> {
        self.value = Self::check(value)?;
        Ok(())
    }

    /// Negate and validate the result
    ///
    /// Asymmetric ranges can reject the negation of a valid value.
    pub fn checked_neg(self) -> Result<Self, RangeError>
    where
        T: Neg<Output = T>,
    {
        Self::new(-self.value)
    }
}

impl<T: RangeBound + Default, const MIN: i64, const MAX: i64> Default for RangedValue<T, MIN, MAX> {
    /// # Panics
    /// If `T::default()` lies outside `[MIN, MAX]`, which is a mistake in the
    /// type definition itself.
    fn default() -> Self {
        match Self::new(T::default()) {
            Ok(value) => value,
            Err(err) => panic!("default value does not fit its own range: {err}"),
        }
    }
}

impl<T, const MIN: i64, const MAX: i64> Deref for RangedValue<T, MIN, MAX> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

// one impl per bound type; a generic `TryFrom<T>` overlaps the blanket impl in core
macro_rules! ranged_try_from {
    ($($ty:ty),*) => {
        $(
            impl<const MIN: i64, const MAX: i64> TryFrom<$ty> for RangedValue<$ty, MIN, MAX> {
                type Error = RangeError;

                fn try_from(value: $ty) -> Result<Self, Self::Error> {
                    Self::new(value)
                }
            }
        )*
    };
}

ranged_try_from!(f32, f64, i32, i64, u32);

impl<T: fmt::Debug, const MIN: i64, const MAX: i64> fmt::Debug for RangedValue<T, MIN, MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} in [{MIN}, {MAX}]", self.value)
    }
}

impl<T: fmt::Display, const MIN: i64, const MAX: i64> fmt::Display for RangedValue<T, MIN, MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: Serialize, const MIN: i64, const MAX: i64> Serialize for RangedValue<T, MIN, MAX> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T, const MIN: i64, const MAX: i64> Deserialize<'de> for RangedValue<T, MIN, MAX>
where
    T: RangeBound + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = T::deserialize(deserializer)?;
        Self::new(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Percent = RangedValue<u32, 0, 100>;
    type Skewed = RangedValue<i32, -10, 5>;

    #[test]
    fn test_angle_bounds() {
        assert!(Angle::new(180.0).is_ok());
        assert!(Angle::new(-180.0).is_ok());

        let err = Angle::new(200.0).unwrap_err();
        assert_eq!(err.min, -180);
        assert_eq!(err.max, 180);
        assert_eq!(err.value, "200");
    }

    #[test]
    fn test_nan_is_out_of_range() {
        assert!(Angle::new(f32::NAN).is_err());
    }

    #[test]
    fn test_set_keeps_old_value_on_error() {
        let mut angle = Angle::new(45.0).unwrap();
        assert!(angle.set(-190.0).is_err());
        assert_eq!(angle.get(), 45.0);

        angle.set(-90.0).unwrap();
        assert_eq!(*angle, -90.0);
    }

    #[test]
    fn test_negation_revalidates() {
        let boundary = Angle::new(-180.0).unwrap();
        assert_eq!(boundary.checked_neg().unwrap().get(), 180.0);

        // -(-10) = 10 does not fit into [-10, 5]
        let low = Skewed::new(-10).unwrap();
        assert!(low.checked_neg().is_err());
        assert_eq!(Skewed::new(5).unwrap().checked_neg().unwrap().get(), -5);
    }

    #[test]
    fn test_default_and_try_from() {
        assert_eq!(Angle::default().get(), 0.0);
        assert_eq!(Percent::try_from(42).unwrap().get(), 42);
        assert!(Percent::try_from(101).is_err());
        assert_eq!(Angle::try_from(-90.0_f32).unwrap().get(), -90.0);
        assert!(Skewed::try_from(6).is_err());
        assert!(RangedValue::<f64, 0, 1>::try_from(0.5).is_ok());
        assert!(RangedValue::<i64, 0, 1>::try_from(-1).is_err());
    }

    #[test]
    #[should_panic(expected = "default value does not fit")]
    fn test_default_outside_range_panics() {
        let _ = RangedValue::<i32, 1, 10>::default();
    }

    #[test]
    fn test_deserialize_validates() {
        #[derive(Deserialize)]
        struct Rotation {
            yaw: Angle,
        }

        let ok: Rotation = toml::from_str("yaw = 90.0").unwrap();
        assert_eq!(ok.yaw.get(), 90.0);

        let bad: Result<Rotation, _> = toml::from_str("yaw = 270.0");
        assert!(bad.is_err());
    }
}
