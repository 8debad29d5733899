use alloy_primitives::{U256, U512};
use alloy_primitives::ruint::UintTryFrom;

use crate::errors::MathError;

/// Computes `floor(a * b / denominator)` with the intermediate product held
/// in 512 bits, so the only failure modes are a zero denominator and a
/// quotient that does not fit in 256 bits.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    let product = U512::from(a) * U512::from(b);
    let quotient = product / U512::from(denominator);

    U256::uint_try_from(quotient).map_err(|_| MathError::Overflow)
}

/// Computes `ceil(a * b / denominator)` under the same domain as [`mul_div`].
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    let product = U512::from(a) * U512::from(b);
    let (quotient, remainder) = product.div_rem(U512::from(denominator));

    let result = U256::uint_try_from(quotient).map_err(|_| MathError::Overflow)?;

    if remainder.is_zero() {
        Ok(result)
    } else {
        result
            .checked_add(U256::from(1))
            .ok_or(MathError::Overflow)
    }
}
