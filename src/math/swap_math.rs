use alloy_primitives::{I256, U256};

use crate::{
    errors::MathError,
    math::{
        full_math::{mul_div, mul_div_rounding_up},
        sqrt_price_math::{
            get_amount_0_delta, get_amount_1_delta, get_next_sqrt_price_from_input,
            get_next_sqrt_price_from_output,
        },
    },
};

const PIPS_DENOMINATOR: u32 = 1_000_000;

/// Computes one step of a swap within a single tick range.
///
/// The step is exact-in when `amount_remaining` is positive and exact-out
/// when it is negative, and terminates at whichever comes first of the target
/// price or exhaustion of the remaining amount. Returns
/// `(sqrt_price_next_x96, amount_in, amount_out, fee_amount)`.
pub fn compute_swap_step(
    sqrt_price_current_x96: U256,
    sqrt_price_target_x96: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee_pips: u32,
) -> Result<(U256, U256, U256, U256), MathError> {
    let zero_for_one = sqrt_price_current_x96 >= sqrt_price_target_x96;
    let exact_in = amount_remaining >= I256::ZERO;

    let sqrt_price_next_x96: U256;
    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;

    if exact_in {
        let amount_remaining_less_fee = mul_div(
            amount_remaining.into_raw(),
            U256::from(PIPS_DENOMINATOR - fee_pips),
            U256::from(PIPS_DENOMINATOR),
        )?;

        amount_in = if zero_for_one {
            get_amount_0_delta(
                sqrt_price_target_x96,
                sqrt_price_current_x96,
                liquidity,
                true,
            )?
        } else {
            get_amount_1_delta(
                sqrt_price_current_x96,
                sqrt_price_target_x96,
                liquidity,
                true,
            )?
        };

        if amount_remaining_less_fee >= amount_in {
            sqrt_price_next_x96 = sqrt_price_target_x96;
        } else {
            sqrt_price_next_x96 = get_next_sqrt_price_from_input(
                sqrt_price_current_x96,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?;
        }
    } else {
        amount_out = if zero_for_one {
            get_amount_1_delta(
                sqrt_price_target_x96,
                sqrt_price_current_x96,
                liquidity,
                false,
            )?
        } else {
            get_amount_0_delta(
                sqrt_price_current_x96,
                sqrt_price_target_x96,
                liquidity,
                false,
            )?
        };

        let amount_remaining_abs = amount_remaining.unsigned_abs();

        sqrt_price_next_x96 = if amount_remaining_abs >= amount_out {
            sqrt_price_target_x96
        } else {
            get_next_sqrt_price_from_output(
                sqrt_price_current_x96,
                liquidity,
                amount_remaining_abs,
                zero_for_one,
            )?
        };
    }

    let max = sqrt_price_target_x96 == sqrt_price_next_x96;

    if zero_for_one {
        if !max || !exact_in {
            amount_in = get_amount_0_delta(
                sqrt_price_next_x96,
                sqrt_price_current_x96,
                liquidity,
                true,
            )?
        }

        if !max || exact_in {
            amount_out = get_amount_1_delta(
                sqrt_price_next_x96,
                sqrt_price_current_x96,
                liquidity,
                false,
            )?
        }
    } else {
        if !max || !exact_in {
            amount_in = get_amount_1_delta(
                sqrt_price_current_x96,
                sqrt_price_next_x96,
                liquidity,
                true,
            )?
        }

        if !max || exact_in {
            amount_out = get_amount_0_delta(
                sqrt_price_current_x96,
                sqrt_price_next_x96,
                liquidity,
                false,
            )?
        }
    }

    // cap the output amount to not exceed the remaining output amount
    if !exact_in && amount_out > amount_remaining.unsigned_abs() {
        amount_out = amount_remaining.unsigned_abs();
    }

    let fee_amount = if exact_in && sqrt_price_next_x96 != sqrt_price_target_x96 {
        // the input is exhausted before the target: the remainder is the fee
        amount_remaining.into_raw() - amount_in
    } else {
        mul_div_rounding_up(
            amount_in,
            U256::from(fee_pips),
            U256::from(PIPS_DENOMINATOR - fee_pips),
        )?
    };

    Ok((sqrt_price_next_x96, amount_in, amount_out, fee_amount))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::sqrt_price_math::{
        get_next_sqrt_price_from_input, get_next_sqrt_price_from_output,
    };
    use ruint::uint;

    fn i256(value: i128) -> I256 {
        if value < 0 {
            -I256::from_raw(U256::from(value.unsigned_abs()))
        } else {
            I256::from_raw(U256::from(value as u128))
        }
    }

    #[test]
    fn exact_in_capped_at_price_target() {
        let price = uint!(79228162514264337593543950336_U256);
        let price_target = uint!(79623317895830914510639640423_U256);
        let liquidity = 2e18 as u128;
        let amount = i256(1_000_000_000_000_000_000);

        let (sqrt_p, amount_in, amount_out, fee_amount) =
            compute_swap_step(price, price_target, liquidity, amount, 600).unwrap();

        assert_eq!(sqrt_p, price_target);
        assert_eq!(amount_in, uint!(9975124224178055_U256));
        assert_eq!(fee_amount, uint!(5988667735148_U256));
        assert_eq!(amount_out, uint!(9925619580021728_U256));
        assert!(amount_in + fee_amount < amount.into_raw());

        let price_after_whole_input =
            get_next_sqrt_price_from_input(price, liquidity, amount_in, false).unwrap();
        assert!(sqrt_p < price_after_whole_input);
    }

    #[test]
    fn exact_out_capped_at_price_target() {
        let price = uint!(79228162514264337593543950336_U256);
        let price_target = uint!(79623317895830914510639640423_U256);
        let liquidity = 2e18 as u128;
        let amount = i256(-1_000_000_000_000_000_000);

        let (sqrt_p, amount_in, amount_out, fee_amount) =
            compute_swap_step(price, price_target, liquidity, amount, 600).unwrap();

        assert_eq!(sqrt_p, price_target);
        assert_eq!(amount_in, uint!(9975124224178055_U256));
        assert_eq!(fee_amount, uint!(5988667735148_U256));
        assert_eq!(amount_out, uint!(9925619580021728_U256));
        assert!(amount_out < amount.unsigned_abs());

        let price_after_whole_output =
            get_next_sqrt_price_from_output(price, liquidity, amount.unsigned_abs(), false)
                .unwrap();
        assert!(sqrt_p < price_after_whole_output);
    }

    #[test]
    fn exact_in_fully_spent() {
        let price = uint!(79228162514264337593543950336_U256);
        let price_target = uint!(0xe6666666666666666666666666_U256);
        let liquidity = 2e18 as u128;
        let amount = i256(1_000_000_000_000_000_000);

        let (sqrt_p, amount_in, amount_out, fee_amount) =
            compute_swap_step(price, price_target, liquidity, amount, 600).unwrap();

        assert_eq!(amount_in, uint!(999400000000000000_U256));
        assert_eq!(fee_amount, uint!(600000000000000_U256));
        assert_eq!(amount_out, uint!(666399946655997866_U256));
        assert_eq!(amount_in + fee_amount, amount.into_raw());

        let price_after_input_less_fee = get_next_sqrt_price_from_input(
            price,
            liquidity,
            amount.into_raw() - fee_amount,
            false,
        )
        .unwrap();

        assert!(sqrt_p < price_target);
        assert_eq!(sqrt_p, price_after_input_less_fee);
    }

    #[test]
    fn exact_out_fully_received() {
        let price = uint!(79228162514264337593543950336_U256);
        let price_target = uint!(792281625142643375935439503360_U256);
        let liquidity = 2e18 as u128;
        let amount = i256(-1_000_000_000_000_000_000);

        let (sqrt_p, amount_in, amount_out, fee_amount) =
            compute_swap_step(price, price_target, liquidity, amount, 600).unwrap();

        assert_eq!(amount_in, uint!(2000000000000000000_U256));
        assert_eq!(fee_amount, uint!(1200720432259356_U256));
        assert_eq!(amount_out, amount.unsigned_abs());

        let price_after_whole_output =
            get_next_sqrt_price_from_output(price, liquidity, amount.unsigned_abs(), false)
                .unwrap();

        assert!(sqrt_p < price_target);
        assert_eq!(sqrt_p, price_after_whole_output);
    }

    #[test]
    fn output_capped_at_desired_amount() {
        let (sqrt_p, amount_in, amount_out, fee_amount) = compute_swap_step(
            uint!(417332158212080721273783715441582_U256),
            uint!(1452870262520218020823638996_U256),
            159344665391607089467575320103u128,
            i256(-1),
            1,
        )
        .unwrap();

        assert_eq!(amount_in, U256::from(1));
        assert_eq!(fee_amount, U256::from(1));
        assert_eq!(amount_out, U256::from(1));
        assert_eq!(sqrt_p, uint!(417332158212080721273783715441581_U256));
    }

    #[test]
    fn target_price_of_one_uses_partial_input() {
        let (sqrt_p, amount_in, amount_out, fee_amount) = compute_swap_step(
            U256::from(2),
            U256::from(1),
            1,
            i256(3915081100057732413702495386755767),
            1,
        )
        .unwrap();

        assert_eq!(amount_in, uint!(39614081257132168796771975168_U256));
        assert_eq!(fee_amount, uint!(39614120871253040049813_U256));
        assert!(amount_in + fee_amount < uint!(3915081100057732413702495386755767_U256));
        assert_eq!(amount_out, U256::ZERO);
        assert_eq!(sqrt_p, U256::from(1));
    }

    #[test]
    fn entire_input_taken_as_fee() {
        let (sqrt_p, amount_in, amount_out, fee_amount) = compute_swap_step(
            U256::from(2413),
            uint!(79887613182836312_U256),
            1985041575832132834610021537970u128,
            i256(10),
            1872,
        )
        .unwrap();

        assert_eq!(amount_in, U256::ZERO);
        assert_eq!(fee_amount, U256::from(10));
        assert_eq!(amount_out, U256::ZERO);
        assert_eq!(sqrt_p, U256::from(2413));
    }

    #[test]
    fn intermediate_insufficient_liquidity_zero_for_one_exact_out() {
        let price = uint!(20282409603651670423947251286016_U256);
        let price_target = price * U256::from(11) / U256::from(10);

        let (sqrt_p, amount_in, amount_out, fee_amount) =
            compute_swap_step(price, price_target, 1024, i256(-4), 3000).unwrap();

        assert_eq!(amount_out, U256::ZERO);
        assert_eq!(sqrt_p, price_target);
        assert_eq!(amount_in, U256::from(26215));
        assert_eq!(fee_amount, U256::from(79));
    }

    #[test]
    fn intermediate_insufficient_liquidity_one_for_zero_exact_out() {
        let price = uint!(20282409603651670423947251286016_U256);
        let price_target = price * U256::from(9) / U256::from(10);

        let (sqrt_p, amount_in, amount_out, fee_amount) =
            compute_swap_step(price, price_target, 1024, i256(-263000), 3000).unwrap();

        assert_eq!(amount_out, U256::from(26214));
        assert_eq!(sqrt_p, price_target);
        assert_eq!(amount_in, U256::from(1));
        assert_eq!(fee_amount, U256::from(1));
    }
}
