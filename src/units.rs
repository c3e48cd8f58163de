//! This module defines the unit types used for water quantities and their conversions.
//!
//! All volumes are in hm³ (millions of cubic metres) per monthly timestep.
use float_cmp::approx_eq;
use serde::{Deserialize, Serialize};
use std::iter::Sum;

/// The absolute tolerance used when comparing water quantities
pub const VOLUME_TOLERANCE: f64 = 1e-9;

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Display,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub const fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is neither infinite nor NaN
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// The smaller of two quantities
            pub fn min(self, rhs: Self) -> Self {
                Self(self.0.min(rhs.0))
            }

            /// The larger of two quantities
            pub fn max(self, rhs: Self) -> Self {
                Self(self.0.max(rhs.0))
            }

            /// Whether two quantities are equal within [`VOLUME_TOLERANCE`]
            pub fn approx_eq(self, rhs: Self) -> bool {
                approx_eq!(f64, self.0, rhs.0, epsilon = VOLUME_TOLERANCE)
            }
        }

        impl std::ops::Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self(0.0), |acc, x| acc + x)
            }
        }
    };
}

unit_struct!(Dimensionless);
unit_struct!(Volume);

impl Volume {
    /// No water
    pub const ZERO: Volume = Volume(0.0);
}

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Mul<Dimensionless> for Volume {
    type Output = Volume;

    fn mul(self, rhs: Dimensionless) -> Volume {
        Volume(self.0 * rhs.0)
    }
}

impl std::ops::Mul<Volume> for Dimensionless {
    type Output = Volume;

    fn mul(self, rhs: Volume) -> Volume {
        Volume(self.0 * rhs.0)
    }
}

impl std::ops::Div<Dimensionless> for Volume {
    type Output = Volume;

    fn div(self, rhs: Dimensionless) -> Volume {
        Volume(self.0 / rhs.0)
    }
}

impl std::ops::Div for Volume {
    type Output = Dimensionless;

    fn div(self, rhs: Volume) -> Dimensionless {
        Dimensionless(self.0 / rhs.0)
    }
}

impl std::ops::Sub<Dimensionless> for f64 {
    type Output = Dimensionless;

    fn sub(self, rhs: Dimensionless) -> Dimensionless {
        Dimensionless(self - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_arithmetic() {
        let a = Volume(3.0);
        let b = Volume(1.0);
        assert_eq!(a + b, Volume(4.0));
        assert_eq!(a - b, Volume(2.0));
        assert_eq!(a * Dimensionless(0.5), Volume(1.5));
        assert_eq!(a / b, Dimensionless(3.0));
        assert_eq!(-a, Volume(-3.0));
        assert_eq!(a.min(b), b);
        assert_eq!(a.max(b), a);
    }

    #[test]
    fn test_volume_sum() {
        let total: Volume = [1.0, 2.0, 3.5].into_iter().map(Volume).sum();
        assert_eq!(total, Volume(6.5));
    }

    #[test]
    fn test_volume_approx_eq() {
        assert!(Volume(0.1 + 0.2).approx_eq(Volume(0.3)));
        assert!(!Volume(0.3).approx_eq(Volume(0.31)));
    }

    #[test]
    fn test_complement() {
        assert_eq!(1.0 - Dimensionless(0.25), Dimensionless(0.75));
    }
}
