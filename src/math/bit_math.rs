use alloy_primitives::U256;

use crate::errors::MathError;

/// Index of the highest set bit, so `2^msb <= x < 2^(msb + 1)`.
pub fn most_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }

    Ok(255 - x.leading_zeros() as u8)
}

/// Index of the lowest set bit, so `x & (1 << lsb) != 0`.
pub fn least_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }

    Ok(x.trailing_zeros() as u8)
}
