use alloy_primitives::{I256, U256};

use crate::{
    errors::MathError,
    math::{
        full_math::{mul_div, mul_div_rounding_up},
        unsafe_math::div_rounding_up,
        MAX_U160, Q96,
    },
};

const RESOLUTION_96: usize = 96;

/// Price after swapping `amount_in` of the input token, rounding so that the
/// pool never gives out more than it should.
pub fn get_next_sqrt_price_from_input(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, MathError> {
    if sqrt_price_x96.is_zero() {
        return Err(MathError::SqrtPriceIsZero);
    } else if liquidity == 0 {
        return Err(MathError::LiquidityIsZero);
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount_0_rounding_up(sqrt_price_x96, liquidity, amount_in, true)
    } else {
        get_next_sqrt_price_from_amount_1_rounding_down(sqrt_price_x96, liquidity, amount_in, true)
    }
}

/// Price after the pool pays out `amount_out` of the output token.
pub fn get_next_sqrt_price_from_output(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256, MathError> {
    if sqrt_price_x96.is_zero() {
        return Err(MathError::SqrtPriceIsZero);
    } else if liquidity == 0 {
        return Err(MathError::LiquidityIsZero);
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount_1_rounding_down(sqrt_price_x96, liquidity, amount_out, false)
    } else {
        get_next_sqrt_price_from_amount_0_rounding_up(sqrt_price_x96, liquidity, amount_out, false)
    }
}

/// Solves `L * sqrtP / (L ± amount * sqrtP)` for the token0 side, always
/// rounding the resulting price up.
pub fn get_next_sqrt_price_from_amount_0_rounding_up(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, MathError> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }

    let numerator_1 = U256::from(liquidity) << RESOLUTION_96;

    if add {
        let product = amount.wrapping_mul(sqrt_price_x96);

        // take the precise path only if `amount * sqrtP` did not overflow
        if product.wrapping_div(amount) == sqrt_price_x96 {
            let denominator = numerator_1.wrapping_add(product);

            if denominator >= numerator_1 {
                return mul_div_rounding_up(numerator_1, sqrt_price_x96, denominator);
            }
        }

        Ok(div_rounding_up(
            numerator_1,
            (numerator_1.wrapping_div(sqrt_price_x96)).wrapping_add(amount),
        ))
    } else {
        let product = amount.wrapping_mul(sqrt_price_x96);

        if product.wrapping_div(amount) == sqrt_price_x96 && numerator_1 > product {
            let denominator = numerator_1.wrapping_sub(product);
            mul_div_rounding_up(numerator_1, sqrt_price_x96, denominator)
        } else {
            Err(MathError::ProductOverflow)
        }
    }
}

/// Solves `sqrtP ± amount / L` for the token1 side, always rounding the
/// resulting price down.
pub fn get_next_sqrt_price_from_amount_1_rounding_down(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, MathError> {
    if add {
        let quotient = if amount <= MAX_U160 {
            (amount << RESOLUTION_96) / U256::from(liquidity)
        } else {
            mul_div(amount, Q96, U256::from(liquidity))?
        };

        let next_sqrt_price = sqrt_price_x96
            .checked_add(quotient)
            .ok_or(MathError::SafeCastToU160Overflow)?;

        if next_sqrt_price > MAX_U160 {
            Err(MathError::SafeCastToU160Overflow)
        } else {
            Ok(next_sqrt_price)
        }
    } else {
        let quotient = if amount <= MAX_U160 {
            div_rounding_up(amount << RESOLUTION_96, U256::from(liquidity))
        } else {
            mul_div_rounding_up(amount, Q96, U256::from(liquidity))?
        };

        if sqrt_price_x96 <= quotient {
            return Err(MathError::SqrtPriceIsLteQuotient);
        }

        Ok(sqrt_price_x96 - quotient)
    }
}

/// Amount of token0 between two sqrt prices for `liquidity`, rounded in the
/// caller's chosen direction.
pub fn get_amount_0_delta(
    mut sqrt_ratio_a_x96: U256,
    mut sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = (sqrt_ratio_b_x96, sqrt_ratio_a_x96)
    };

    let numerator_1 = U256::from(liquidity) << RESOLUTION_96;
    let numerator_2 = sqrt_ratio_b_x96 - sqrt_ratio_a_x96;

    if sqrt_ratio_a_x96.is_zero() {
        return Err(MathError::SqrtPriceIsZero);
    }

    if round_up {
        let numerator_partial = mul_div_rounding_up(numerator_1, numerator_2, sqrt_ratio_b_x96)?;
        Ok(div_rounding_up(numerator_partial, sqrt_ratio_a_x96))
    } else {
        Ok(mul_div(numerator_1, numerator_2, sqrt_ratio_b_x96)? / sqrt_ratio_a_x96)
    }
}

/// Amount of token1 between two sqrt prices for `liquidity`.
pub fn get_amount_1_delta(
    mut sqrt_ratio_a_x96: U256,
    mut sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = (sqrt_ratio_b_x96, sqrt_ratio_a_x96)
    };

    if round_up {
        mul_div_rounding_up(
            U256::from(liquidity),
            sqrt_ratio_b_x96 - sqrt_ratio_a_x96,
            Q96,
        )
    } else {
        mul_div(
            U256::from(liquidity),
            sqrt_ratio_b_x96 - sqrt_ratio_a_x96,
            Q96,
        )
    }
}

/// Signed token0 delta: positive liquidity rounds up against the caller,
/// negative liquidity rounds down in favor of the pool.
pub fn get_amount_0_delta_signed(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: i128,
) -> Result<I256, MathError> {
    if liquidity < 0 {
        Ok(-I256::from_raw(get_amount_0_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity.unsigned_abs(),
            false,
        )?))
    } else {
        Ok(I256::from_raw(get_amount_0_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity as u128,
            true,
        )?))
    }
}

/// Signed token1 delta with the same rounding convention as
/// [`get_amount_0_delta_signed`].
pub fn get_amount_1_delta_signed(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: i128,
) -> Result<I256, MathError> {
    if liquidity < 0 {
        Ok(-I256::from_raw(get_amount_1_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity.unsigned_abs(),
            false,
        )?))
    } else {
        Ok(I256::from_raw(get_amount_1_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity as u128,
            true,
        )?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::U256_1;
    use ruint::uint;

    #[test]
    fn next_price_from_input_validates() {
        assert!(matches!(
            get_next_sqrt_price_from_input(
                U256::ZERO,
                0,
                U256::from(100000000000000000u128),
                false
            ),
            Err(MathError::SqrtPriceIsZero)
        ));
        assert!(matches!(
            get_next_sqrt_price_from_input(U256_1, 0, U256::from(100000000000000000u128), true),
            Err(MathError::LiquidityIsZero)
        ));
        assert!(matches!(
            get_next_sqrt_price_from_input(MAX_U160, 1024, U256::from(1024), false),
            Err(MathError::SafeCastToU160Overflow)
        ));
    }

    #[test]
    fn next_price_from_input_values() {
        // any input amount cannot underflow the price
        assert_eq!(
            get_next_sqrt_price_from_input(
                U256_1,
                1,
                uint!(
                    57896044618658097711785492504343953926634992332820282019728792003956564819968_U256
                ),
                true,
            )
            .unwrap(),
            U256_1
        );

        // zero amount in returns the input price for both directions
        let one_x96 = uint!(79228162514264337593543950336_U256);
        assert_eq!(
            get_next_sqrt_price_from_input(one_x96, 1e17 as u128, U256::ZERO, true).unwrap(),
            one_x96
        );
        assert_eq!(
            get_next_sqrt_price_from_input(one_x96, 1e17 as u128, U256::ZERO, false).unwrap(),
            one_x96
        );

        // returns the minimum price for max inputs
        let liquidity = u128::MAX;
        let max_amount_no_overflow = U256::MAX - ((U256::from(liquidity) << 96) / MAX_U160);
        assert_eq!(
            get_next_sqrt_price_from_input(MAX_U160, liquidity, max_amount_no_overflow, true)
                .unwrap(),
            U256_1
        );

        // input amount of 0.1 token1
        assert_eq!(
            get_next_sqrt_price_from_input(
                one_x96,
                1e18 as u128,
                uint!(100000000000000000_U256),
                false,
            )
            .unwrap(),
            uint!(87150978765690771352898345369_U256)
        );

        // input amount of 0.1 token0
        assert_eq!(
            get_next_sqrt_price_from_input(
                one_x96,
                1e18 as u128,
                uint!(100000000000000000_U256),
                true,
            )
            .unwrap(),
            uint!(72025602285694852357767227579_U256)
        );

        // amount in > u96::MAX, zero for one
        assert_eq!(
            get_next_sqrt_price_from_input(
                one_x96,
                1e19 as u128,
                uint!(1267650600228229401496703205376_U256),
                true,
            )
            .unwrap(),
            uint!(624999999995069620_U256)
        );

        // can return 1 with enough amount in
        assert_eq!(
            get_next_sqrt_price_from_input(one_x96, 1, U256::MAX / U256::from(2), true).unwrap(),
            U256_1
        );
    }

    #[test]
    fn next_price_from_output_validates() {
        let price = uint!(20282409603651670423947251286016_U256);

        // output amount at or above the virtual reserves of token0
        assert!(matches!(
            get_next_sqrt_price_from_output(price, 1024, U256::from(4), false),
            Err(MathError::ProductOverflow)
        ));
        assert!(matches!(
            get_next_sqrt_price_from_output(price, 1024, U256::from(5), false),
            Err(MathError::ProductOverflow)
        ));

        // output amount at or above the virtual reserves of token1
        assert!(matches!(
            get_next_sqrt_price_from_output(price, 1024, U256::from(262145), true),
            Err(MathError::SqrtPriceIsLteQuotient)
        ));
        assert!(matches!(
            get_next_sqrt_price_from_output(price, 1024, U256::from(262144), true),
            Err(MathError::SqrtPriceIsLteQuotient)
        ));

        // just below the virtual reserves succeeds
        assert_eq!(
            get_next_sqrt_price_from_output(price, 1024, U256::from(262143), true).unwrap(),
            uint!(77371252455336267181195264_U256)
        );
    }

    #[test]
    fn next_price_from_output_values() {
        let one_x96 = uint!(79228162514264337593543950336_U256);

        assert_eq!(
            get_next_sqrt_price_from_output(one_x96, 1e17 as u128, U256::ZERO, true).unwrap(),
            one_x96
        );
        assert_eq!(
            get_next_sqrt_price_from_output(one_x96, 1e17 as u128, U256::ZERO, false).unwrap(),
            one_x96
        );

        // output amount of 0.1 token1
        assert_eq!(
            get_next_sqrt_price_from_output(
                one_x96,
                1e18 as u128,
                U256::from(1e17 as u128),
                false
            )
            .unwrap(),
            uint!(88031291682515930659493278152_U256)
        );
        assert_eq!(
            get_next_sqrt_price_from_output(one_x96, 1e18 as u128, U256::from(1e17 as u128), true)
                .unwrap(),
            uint!(71305346262837903834189555302_U256)
        );

        // impossible output amounts fail in both directions
        assert!(get_next_sqrt_price_from_output(one_x96, 1, U256::MAX, true).is_err());
        assert!(get_next_sqrt_price_from_output(one_x96, 1, U256::MAX, false).is_err());
    }

    #[test]
    fn amount_0_delta_values() {
        let one_x96 = uint!(79228162514264337593543950336_U256);
        let ratio_121 = uint!(87150978765690771352898345369_U256);

        assert_eq!(
            get_amount_0_delta(one_x96, one_x96, 0, true).unwrap(),
            U256::ZERO
        );
        assert_eq!(
            get_amount_0_delta(one_x96, ratio_121, 0, true).unwrap(),
            U256::ZERO
        );

        let amount_0 = get_amount_0_delta(one_x96, ratio_121, 1e18 as u128, true).unwrap();
        assert_eq!(amount_0, uint!(90909090909090910_U256));
        assert_eq!(
            get_amount_0_delta(one_x96, ratio_121, 1e18 as u128, false).unwrap(),
            amount_0 - U256_1
        );

        // works for prices that overflow the naive product
        let amount_0_up = get_amount_0_delta(
            uint!(2787593149816327892691964784081045188247552_U256),
            uint!(22300745198530623141535718272648361505980416_U256),
            1e18 as u128,
            true,
        )
        .unwrap();
        let amount_0_down = get_amount_0_delta(
            uint!(2787593149816327892691964784081045188247552_U256),
            uint!(22300745198530623141535718272648361505980416_U256),
            1e18 as u128,
            false,
        )
        .unwrap();
        assert_eq!(amount_0_up, amount_0_down + U256_1);
    }

    #[test]
    fn amount_1_delta_values() {
        let one_x96 = uint!(79228162514264337593543950336_U256);
        let ratio_121 = uint!(87150978765690771352898345369_U256);

        assert_eq!(
            get_amount_1_delta(one_x96, one_x96, 0, true).unwrap(),
            U256::ZERO
        );

        let amount_1 = get_amount_1_delta(one_x96, ratio_121, 1e18 as u128, true).unwrap();
        assert_eq!(amount_1, uint!(100000000000000000_U256));
        assert_eq!(
            get_amount_1_delta(one_x96, ratio_121, 1e18 as u128, false).unwrap(),
            amount_1 - U256_1
        );
    }

    #[test]
    fn swap_computation_stays_exact() {
        let sqrt_price = uint!(1025574284609383690408304870162715216695788925244_U256);
        let liquidity = 50015962439936049619261659728067971248u128;
        let amount_in = U256::from(406);

        let sqrt_q =
            get_next_sqrt_price_from_input(sqrt_price, liquidity, amount_in, true).unwrap();
        assert_eq!(
            sqrt_q,
            uint!(1025574284609383582644711336373707553698163132913_U256)
        );

        assert_eq!(
            get_amount_0_delta(sqrt_q, sqrt_price, liquidity, true).unwrap(),
            U256::from(406)
        );
    }
}
