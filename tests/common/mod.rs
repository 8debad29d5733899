#![allow(dead_code)]

use alloy_primitives::U256;
use poolsim::{ConfigurableCorePool, CorePool, PoolConfig};
use ruint::uint;

/// Starting price of the USDC/WETH fixture, tick 195285.
pub fn usdc_weth_price() -> U256 {
    uint!(0x43efef20f018fdc58e7a5cf0416a_U256)
}

pub fn usdc_weth_config() -> PoolConfig {
    PoolConfig::new("USDC", "WETH", 3000, 60)
}

pub fn initialized_pool() -> ConfigurableCorePool {
    let mut pool = ConfigurableCorePool::new(usdc_weth_config());
    pool.initialize(usdc_weth_price()).unwrap();
    pool
}

/// Canonical encoding of everything that defines the pool's economic state,
/// excluding the state id and any snapshot metadata. Byte-equal fingerprints
/// mean byte-equal states.
pub fn fingerprint(pool: &CorePool) -> Vec<u8> {
    let state = &pool.state;

    let positions: Vec<_> = state.positions.iter().collect();

    serde_json::to_vec(&(
        &pool.config,
        state.sqrt_price_x96,
        state.tick,
        state.liquidity,
        state.fee_growth_global_0_x128,
        state.fee_growth_global_1_x128,
        &state.ticks,
        &state.tick_bitmap,
        positions,
    ))
    .unwrap()
}

/// Checks the quantified state invariants from the design: active liquidity
/// equals the net sum over crossed ticks, the current tick brackets the
/// price, the bitmap mirrors tick initialization, and every live position
/// has initialized endpoints.
pub fn assert_invariants(pool: &CorePool) {
    use poolsim::math::tick_math;
    use poolsim::pool::tick_bitmap;

    let state = &pool.state;

    // 1: sum of liquidity_net over ticks at or below the current tick
    let net: i128 = state
        .ticks
        .iter()
        .filter(|(tick, _)| **tick <= state.tick)
        .map(|(_, info)| info.liquidity_net)
        .sum();
    assert!(net >= 0, "net liquidity below current tick must be non-negative");
    assert_eq!(net as u128, state.liquidity, "active liquidity mismatch");

    // 5: tick consistent with the price (allowing the post-cross boundary
    // state where the price sits exactly on the next tick's ratio)
    let ratio_at_tick = tick_math::get_sqrt_ratio_at_tick(state.tick).unwrap();
    let ratio_above = tick_math::get_sqrt_ratio_at_tick(state.tick + 1).unwrap();
    assert!(ratio_at_tick <= state.sqrt_price_x96 && state.sqrt_price_x96 <= ratio_above);

    // 3: bitmap and tick table agree
    for (tick, info) in &state.ticks {
        assert_eq!(info.initialized, info.liquidity_gross > 0);
        let (next, initialized) = tick_bitmap::next_initialized_tick_within_one_word(
            &state.tick_bitmap,
            *tick,
            pool.config.tick_spacing,
            true,
        );
        assert!(initialized && next == *tick, "bitmap misses tick {tick}");
    }

    // 2: live positions have initialized, ordered, in-range endpoints
    for (key, info) in &state.positions {
        if info.liquidity > 0 {
            assert!(key.tick_lower < key.tick_upper);
            assert!(key.tick_lower >= tick_math::MIN_TICK);
            assert!(key.tick_upper <= tick_math::MAX_TICK);
            assert!(state.ticks.contains_key(&key.tick_lower));
            assert!(state.ticks.contains_key(&key.tick_upper));
        }
    }
}
