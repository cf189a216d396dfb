//! 17.14 signed fixed-point arithmetic.
//!
//! The kernel has no floating point, so MLFQS load averages and CPU usage are
//! carried as an `i32` scaled by 2^14. Integers in `-131072..=131071` are
//! representable. Products and quotients of two fixed values widen to `i64`
//! for the intermediate step.

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

pub const FRACTION_BITS: u32 = 14;
/// Scaling factor `f`: the raw value of `1.0`.
pub const FIXED_ONE: i32 = 1 << FRACTION_BITS;

#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(FIXED_ONE);

    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn from_int(n: i32) -> Self {
        Self(n * FIXED_ONE)
    }

    /// `num / den` as a fixed value, e.g. `ratio(59, 60)`.
    #[inline]
    pub const fn ratio(num: i32, den: i32) -> Self {
        Self(((num as i64 * FIXED_ONE as i64) / den as i64) as i32)
    }

    /// Convert to integer, rounding toward zero.
    #[inline]
    pub const fn to_int_trunc(self) -> i32 {
        self.0 / FIXED_ONE
    }

    /// Convert to integer, rounding to nearest (halves away from zero).
    #[inline]
    pub const fn to_int_round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + FIXED_ONE / 2) / FIXED_ONE
        } else {
            (self.0 - FIXED_ONE / 2) / FIXED_ONE
        }
    }

    #[inline]
    pub const fn add_int(self, n: i32) -> Self {
        Self(self.0 + n * FIXED_ONE)
    }

    #[inline]
    pub const fn sub_int(self, n: i32) -> Self {
        Self(self.0 - n * FIXED_ONE)
    }

    #[inline]
    pub const fn mul_int(self, n: i32) -> Self {
        Self(self.0 * n)
    }

    /// `self * n` rounded to the nearest integer (halves away from zero),
    /// computed in `i64` so large scale factors cannot overflow.
    #[inline]
    pub const fn mul_int_round(self, n: i32) -> i64 {
        let product = self.0 as i64 * n as i64;
        let one = FIXED_ONE as i64;
        if product >= 0 {
            (product + one / 2) / one
        } else {
            (product - one / 2) / one
        }
    }

    #[inline]
    pub const fn div_int(self, n: i32) -> Self {
        Self(self.0 / n)
    }

    /// `self + n`, pinned at the representable bounds instead of wrapping.
    #[inline]
    pub const fn saturating_add_int(self, n: i32) -> Self {
        Self(self.0.saturating_add(n.saturating_mul(FIXED_ONE)))
    }

    #[inline]
    pub const fn mul_fixed(self, rhs: Self) -> Self {
        Self(((self.0 as i64 * rhs.0 as i64) / FIXED_ONE as i64) as i32)
    }

    #[inline]
    pub const fn div_fixed(self, rhs: Self) -> Self {
        Self(((self.0 as i64 * FIXED_ONE as i64) / rhs.0 as i64) as i32)
    }
}

impl Add for Fixed {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Fixed {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul for Fixed {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.mul_fixed(rhs)
    }
}

impl Div for Fixed {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        self.div_fixed(rhs)
    }
}

impl Neg for Fixed {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({})", self)
    }
}

/// Two decimal places, truncated: `2.50`, `-0.01`.
impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths = self.mul_int(100).to_int_trunc();
        let sign = if hundredths < 0 { "-" } else { "" };
        let abs = hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_convert_exactly() {
        for n in (-131_071..=131_071).step_by(997) {
            let x = Fixed::from_int(n);
            assert_eq!(x.to_int_trunc(), n);
            assert_eq!(x.to_int_round(), n);
        }
        assert_eq!(Fixed::from_int(131_071).to_int_round(), 131_071);
        assert_eq!(Fixed::from_int(-131_072).to_int_trunc(), -131_072);
    }

    #[test]
    fn test_rounding_modes() {
        let two_and_half = Fixed::ratio(5, 2);
        assert_eq!(two_and_half.to_int_trunc(), 2);
        assert_eq!(two_and_half.to_int_round(), 3);
        assert_eq!((-two_and_half).to_int_trunc(), -2);
        assert_eq!((-two_and_half).to_int_round(), -3);

        let just_under = Fixed::from_raw(FIXED_ONE / 2 - 1);
        assert_eq!(just_under.to_int_round(), 0);
        assert_eq!(Fixed::ratio(-1, 3).to_int_round(), 0);
    }

    #[test]
    fn test_mul_int_round_widens() {
        // 100 * 100_000 overflows the 17.14 range but not the i64 result
        assert_eq!(Fixed::from_int(100_000).mul_int_round(100), 10_000_000);
        assert_eq!(Fixed::from_raw(i32::MAX).mul_int_round(100), 13_107_200);
        assert_eq!(Fixed::ratio(1, 60).mul_int_round(100), 2);
        assert_eq!(Fixed::ratio(-5, 2).mul_int_round(1), -3);
        assert_eq!(Fixed::ZERO.mul_int_round(100), 0);
    }

    #[test]
    fn test_arithmetic() {
        let a = Fixed::from_int(6);
        let b = Fixed::from_int(4);
        assert_eq!(a + b, Fixed::from_int(10));
        assert_eq!(a - b, Fixed::from_int(2));
        assert_eq!(a * b, Fixed::from_int(24));
        assert_eq!(a / b, Fixed::ratio(3, 2));
        assert_eq!(a.add_int(1), Fixed::from_int(7));
        assert_eq!(a.sub_int(7), Fixed::from_int(-1));
        assert_eq!(a.mul_int(3), Fixed::from_int(18));
        assert_eq!(a.div_int(4), Fixed::ratio(3, 2));

        let mut c = Fixed::ZERO;
        c += Fixed::ONE;
        c -= Fixed::ratio(1, 4);
        assert_eq!(c, Fixed::ratio(3, 4));
    }

    #[test]
    fn test_wide_intermediates_do_not_overflow() {
        // 59/60 * 1000.0 needs more than 32 bits before the rescale
        let load = Fixed::from_int(1000);
        let decayed = Fixed::ratio(59, 60) * load;
        assert_eq!(decayed.to_int_round(), 983);

        let big = Fixed::from_int(100_000);
        assert_eq!((big / Fixed::from_int(1000)).to_int_round(), 100);
    }

    #[test]
    fn test_saturating_add() {
        let near_top = Fixed::from_raw(i32::MAX - 10);
        assert_eq!(near_top.saturating_add_int(1), Fixed::from_raw(i32::MAX));
        assert_eq!(Fixed::ZERO.saturating_add_int(1), Fixed::ONE);
    }

    #[test]
    fn test_display_hundredths() {
        use core::fmt::Write;

        struct Buf {
            bytes: [u8; 32],
            len: usize,
        }

        impl Write for Buf {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                let end = self.len + s.len();
                self.bytes[self.len..end].copy_from_slice(s.as_bytes());
                self.len = end;
                Ok(())
            }
        }

        let render = |x: Fixed| {
            let mut buf = Buf {
                bytes: [0; 32],
                len: 0,
            };
            write!(buf, "{}", x).unwrap();
            buf
        };

        let b = render(Fixed::ratio(5, 2));
        assert_eq!(&b.bytes[..b.len], b"2.50");
        let b = render(Fixed::ratio(-1, 100) - Fixed::from_raw(1));
        assert_eq!(&b.bytes[..b.len], b"-0.01");
    }
}
