use alloy_primitives::{I256, U256};
use ruint::uint;

use crate::{errors::MathError, math::U256_1};

/// The lowest tick with a representable sqrt price, `log_1.0001(2^-128)`.
pub const MIN_TICK: i32 = -887272;
/// The highest tick with a representable sqrt price.
pub const MAX_TICK: i32 = -MIN_TICK;

/// `get_sqrt_ratio_at_tick(MIN_TICK)`.
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);
/// `get_sqrt_ratio_at_tick(MAX_TICK)`. Prices are always strictly below this.
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([6743328256752651558, 17280870778742802505, 4294805859, 0]);

// Q128.128 factors for `sqrt(1.0001)^-(2^k)`, k = 1..=19. Bit 0 of the tick is
// folded into the seed value instead.
const SQRT_FACTORS: [U256; 19] = [
    uint!(0xfff97272373d413259a46990580e213a_U256),
    uint!(0xfff2e50f5f656932ef12357cf3c7fdcc_U256),
    uint!(0xffe5caca7e10e4e61c3624eaa0941cd0_U256),
    uint!(0xffcb9843d60f6159c9db58835c926644_U256),
    uint!(0xff973b41fa98c081472e6896dfb254c0_U256),
    uint!(0xff2ea16466c96a3843ec78b326b52861_U256),
    uint!(0xfe5dee046a99a2a811c461f1969c3053_U256),
    uint!(0xfcbe86c7900a88aedcffc83b479aa3a4_U256),
    uint!(0xf987a7253ac413176f2b074cf7815e54_U256),
    uint!(0xf3392b0822b70005940c7a398e4b70f3_U256),
    uint!(0xe7159475a2c29b7443b29c7fa6e889d9_U256),
    uint!(0xd097f3bdfd2022b8845ad8f792aa5825_U256),
    uint!(0xa9f746462d870fdf8a65dc1f90e061e5_U256),
    uint!(0x70d869a156d2a1b890bb3df62baf32f7_U256),
    uint!(0x31be135f97d08fd981231505542fcfa6_U256),
    uint!(0x9aa508b5b7a84e1c677de54f3e99bc9_U256),
    uint!(0x5d6af8dedb81196699c329225ee604_U256),
    uint!(0x2216e584f5fa1ea926041bedfe98_U256),
    uint!(0x48a170391f7dc42444e8fa2_U256),
];

/// Returns `floor(sqrt(1.0001^tick) * 2^96)` as a Q64.96 value.
///
/// The product over [`SQRT_FACTORS`] is carried in Q128.128 and the final
/// shift to Q64.96 rounds up, matching the reference implementation exactly.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    let abs_tick = tick.unsigned_abs();

    if abs_tick > MAX_TICK as u32 {
        return Err(MathError::TickOutOfBounds);
    }

    let mut ratio = if abs_tick & 0x1 != 0 {
        uint!(0xfffcb933bd6fad37aa2d162d1a594001_U256)
    } else {
        uint!(0x100000000000000000000000000000000_U256)
    };

    for (k, factor) in SQRT_FACTORS.iter().enumerate() {
        if abs_tick & (1 << (k + 1)) != 0 {
            ratio = (ratio * *factor) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 down to Q64.96, rounding up so the inverse stays consistent.
    Ok((ratio >> 32)
        + if (ratio % (U256_1 << 32usize)).is_zero() {
            U256::ZERO
        } else {
            U256_1
        })
}

/// Returns the greatest tick whose sqrt ratio is at most `sqrt_price_x96`.
///
/// Domain: `MIN_SQRT_RATIO <= sqrt_price_x96 < MAX_SQRT_RATIO`.
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, MathError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(MathError::SqrtPriceOutOfBounds);
    }

    let ratio = sqrt_price_x96 << 32usize;
    let msb = 255 - ratio.leading_zeros();

    // Normalize into [2^127, 2^128) and extract fourteen fractional bits of
    // log2 by repeated squaring.
    let mut r = if msb >= 128 {
        ratio >> (msb - 127)
    } else {
        ratio << (127 - msb)
    };

    let mut log_2 =
        (I256::from_raw(U256::from(msb)) - I256::from_raw(U256::from(128u64))) << 64usize;

    for bit in (50..=63usize).rev() {
        r = (r.overflowing_mul(r).0) >> 127;
        let f = r >> 128usize;
        log_2 = log_2 | I256::from_raw(f << bit);
        r >>= f.to::<usize>();
    }

    // log_1.0001(x) = log_2(x) * (2^64 / log_2(1.0001)), Q64.64
    let log_sqrt10001 =
        log_2.wrapping_mul(I256::from_raw(U256::from(255738958999603826347141u128)));

    let tick_low = low_i32(
        (log_sqrt10001
            - I256::from_raw(U256::from(3402992956809132418596140100660247210u128)))
            >> 128usize,
    );
    let tick_high = low_i32(
        (log_sqrt10001
            + I256::from_raw(U256::from(291339464771989622907027621153398088495u128)))
            >> 128usize,
    );

    if tick_low == tick_high {
        Ok(tick_low)
    } else if get_sqrt_ratio_at_tick(tick_high)? <= sqrt_price_x96 {
        Ok(tick_high)
    } else {
        Ok(tick_low)
    }
}

// The bracketing ticks always fit in an i24, so truncating the low limb of
// the two's complement representation is lossless.
fn low_i32(value: I256) -> i32 {
    value.into_raw().as_limbs()[0] as i32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_sqrt_ratio_at_tick_bounds() {
        assert!(matches!(
            get_sqrt_ratio_at_tick(MIN_TICK - 1),
            Err(MathError::TickOutOfBounds)
        ));
        assert!(matches!(
            get_sqrt_ratio_at_tick(MAX_TICK + 1),
            Err(MathError::TickOutOfBounds)
        ));
    }

    #[test]
    fn get_sqrt_ratio_at_tick_values() {
        assert_eq!(get_sqrt_ratio_at_tick(MIN_TICK).unwrap(), MIN_SQRT_RATIO);
        assert_eq!(
            get_sqrt_ratio_at_tick(MIN_TICK + 1).unwrap(),
            U256::from(4295343490u64)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(MAX_TICK - 1).unwrap(),
            uint!(1461373636630004318706518188784493106690254656249_U256)
        );
        assert_eq!(get_sqrt_ratio_at_tick(MAX_TICK).unwrap(), MAX_SQRT_RATIO);

        assert_eq!(get_sqrt_ratio_at_tick(0).unwrap(), U256::from(1u8) << 96);
        assert_eq!(
            get_sqrt_ratio_at_tick(50).unwrap(),
            U256::from(79426470787362580746886972461u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(100).unwrap(),
            U256::from(79625275426524748796330556128u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(250).unwrap(),
            U256::from(80224679980005306637834519095u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(500).unwrap(),
            U256::from(81233731461783161732293370115u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(1000).unwrap(),
            U256::from(83290069058676223003182343270u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(2500).unwrap(),
            U256::from(89776708723587163891445672585u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(3000).unwrap(),
            U256::from(92049301871182272007977902845u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(4000).unwrap(),
            U256::from(96768528593268422080558758223u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(5000).unwrap(),
            U256::from(101729702841318637793976746270u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(50000).unwrap(),
            U256::from(965075977353221155028623082916u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(150000).unwrap(),
            U256::from(143194173941309278083010301478497u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(250000).unwrap(),
            U256::from(21246587762933397357449903968194344u128)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(500000).unwrap(),
            uint!(5697689776495288729098254600827762987878_U256)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(738203).unwrap(),
            uint!(847134979253254120489401328389043031315994541_U256)
        );
    }

    #[test]
    fn get_tick_at_sqrt_ratio_bounds() {
        assert!(matches!(
            get_tick_at_sqrt_ratio(MIN_SQRT_RATIO - U256_1),
            Err(MathError::SqrtPriceOutOfBounds)
        ));
        assert!(matches!(
            get_tick_at_sqrt_ratio(MAX_SQRT_RATIO),
            Err(MathError::SqrtPriceOutOfBounds)
        ));

        assert_eq!(get_tick_at_sqrt_ratio(MIN_SQRT_RATIO).unwrap(), MIN_TICK);
        assert_eq!(
            get_tick_at_sqrt_ratio(U256::from(4295343490u64)).unwrap(),
            MIN_TICK + 1
        );
        assert_eq!(
            get_tick_at_sqrt_ratio(MAX_SQRT_RATIO - U256_1).unwrap(),
            MAX_TICK - 1
        );
    }

    #[test]
    fn get_tick_at_sqrt_ratio_usdc_weth_price() {
        // observed mainnet USDC/WETH price
        assert_eq!(
            get_tick_at_sqrt_ratio(uint!(0x43efef20f018fdc58e7a5cf0416a_U256)).unwrap(),
            195285
        );
    }

    #[test]
    fn round_trips_through_both_directions() {
        for tick in [
            MIN_TICK,
            -887220,
            -195285,
            -60,
            -1,
            0,
            1,
            60,
            195285,
            887220,
            MAX_TICK - 1,
        ] {
            let ratio = get_sqrt_ratio_at_tick(tick).unwrap();
            assert_eq!(get_tick_at_sqrt_ratio(ratio).unwrap(), tick, "tick {tick}");
        }
    }
}
