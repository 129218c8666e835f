// 16.16 fixed-point values
//
// Duty cycles, proportional gains and physical-unit values all travel through the
// control core as signed 16.16 numbers (`fixed::types::I16F16`). The newtype pins the
// crate's operations down to the ones the feedback path needs: saturating updates,
// checked tick conversion and clamping back into range.

use ::fixed::types::{I16F16, I48F16};

use crate::error::Fault;

/// Signed 16.16 fixed-point number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Fixed(I16F16);

impl Fixed {
    pub const ZERO: Fixed = Fixed(I16F16::ZERO);
    pub const HALF: Fixed = Fixed(I16F16::from_bits(0x8000));
    pub const ONE: Fixed = Fixed(I16F16::from_bits(0x10000));

    /// Build from the raw 16.16 representation
    #[inline(always)]
    pub const fn from_bits(bits: i32) -> Self {
        Fixed(I16F16::from_bits(bits))
    }

    /// Raw 16.16 representation
    #[inline(always)]
    pub const fn to_bits(self) -> i32 {
        self.0.to_bits()
    }

    /// Whole number, e.g. `Fixed::from_int(5)` == 5.0
    pub const fn from_int(value: i16) -> Self {
        Fixed(I16F16::from_bits((value as i32) << 16))
    }

    /// Nearest representable value, saturating outside the 16.16 range
    pub fn from_f32(value: f32) -> Self {
        Fixed(I16F16::saturating_from_num(value))
    }

    /// Gain applied to an error counted in raw 16.16 steps
    ///
    /// `(self * x) >> 16`, saturating at the 16.16 limits instead of wrapping, so a
    /// large gain times a large error still points the right way.
    #[inline(always)]
    pub fn scale(self, x: i32) -> Fixed {
        Fixed(self.0.saturating_mul(I16F16::from_bits(x)))
    }

    #[inline(always)]
    pub fn saturating_add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }

    #[inline(always)]
    pub fn saturating_sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }

    /// Converts a fraction of `period` into a compare-register tick count
    ///
    /// `t = (self * period) >> 16`. Negative fractions map to zero ticks. A result
    /// that does not fit the 16-bit compare register is reported as
    /// [`Fault::TickOverflow`] instead of being truncated.
    pub fn ticks(self, period: u32) -> Result<u16, Fault> {
        let fraction = I48F16::from_num(self.0.max(I16F16::ZERO));
        let Some(product) = fraction.checked_mul_int(i64::from(period)) else {
            return Err(Fault::TickOverflow { ticks: u32::MAX });
        };
        product.checked_to_num::<u16>().ok_or(Fault::TickOverflow {
            ticks: product.to_num::<i64>().clamp(0, u32::MAX as i64) as u32,
        })
    }

    /// Clamp into `[lo, hi]`
    pub fn clamp_to(self, lo: Fixed, hi: Fixed) -> Fixed {
        Fixed(self.0.clamp(lo.0, hi.0))
    }

    /// Halve toward zero
    pub const fn halve(self) -> Fixed {
        Fixed::from_bits(self.to_bits() / 2)
    }

    pub fn is_negative(self) -> bool {
        self.0.is_negative()
    }
}

#[cfg(all(feature = "defmt", target_os = "none"))]
impl defmt::Format for Fixed {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=f32}", self.0.to_num::<f32>());
    }
}
