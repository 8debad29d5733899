use alloy_primitives::U256;

use crate::math::U256_1;

/// Division rounding toward positive infinity. The caller guarantees a
/// non-zero divisor.
pub fn div_rounding_up(a: U256, b: U256) -> U256 {
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256_1
    }
}
