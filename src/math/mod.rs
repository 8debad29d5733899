pub mod bit_math;
pub mod full_math;
pub mod liquidity_math;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_math;
pub mod unsafe_math;

use alloy_primitives::U256;

pub const U256_1: U256 = U256::from_limbs([1, 0, 0, 0]);

/// 2^96, the scaling factor of the Q64.96 sqrt price representation.
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);

/// 2^128, the scaling factor of the Q128.128 fee growth representation.
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

pub const MAX_U160: U256 =
    U256::from_limbs([18446744073709551615, 18446744073709551615, 4294967295, 0]);
