use std::collections::BTreeMap;

use alloy_primitives::U256;

use crate::math::{bit_math, U256_1};

/// Compresses a tick onto the bitmap index grid, rounding toward negative
/// infinity for negative ticks.
pub fn compress(tick: i32, tick_spacing: i32) -> i32 {
    if tick < 0 && tick % tick_spacing != 0 {
        (tick / tick_spacing) - 1
    } else {
        tick / tick_spacing
    }
}

/// Splits a compressed tick into its bitmap word and the bit within it.
pub fn position(compressed: i32) -> (i16, u8) {
    ((compressed >> 8) as i16, (compressed & 0xFF) as u8)
}

/// Toggles the initialized bit for an aligned tick. Words that become zero
/// are removed so that two states with the same initialized ticks compare
/// and serialize identically.
pub fn flip_tick(bitmap: &mut BTreeMap<i16, U256>, tick: i32, tick_spacing: i32) {
    debug_assert!(tick % tick_spacing == 0);

    let (word_pos, bit_pos) = position(tick / tick_spacing);
    let mask = U256_1 << (bit_pos as usize);

    let word = bitmap.entry(word_pos).or_insert(U256::ZERO);
    *word ^= mask;

    if word.is_zero() {
        bitmap.remove(&word_pos);
    }
}

/// Searches the word holding `tick` for the nearest initialized tick: at or
/// below `tick` when `lte`, else strictly above. When the word holds no such
/// bit, returns the outermost tick of the word uninitialized, which the swap
/// loop uses as its step target.
pub fn next_initialized_tick_within_one_word(
    bitmap: &BTreeMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
    lte: bool,
) -> (i32, bool) {
    let compressed = compress(tick, tick_spacing);

    if lte {
        let (word_pos, bit_pos) = position(compressed);

        // all bits at or to the right of the current bit
        let mask = (U256_1 << (bit_pos as usize)) - U256_1 + (U256_1 << (bit_pos as usize));
        let masked = bitmap.get(&word_pos).copied().unwrap_or(U256::ZERO) & mask;

        let initialized = !masked.is_zero();

        let next = if initialized {
            let msb = bit_math::most_significant_bit(masked)
                .expect("masked word is non-zero");
            (compressed - (bit_pos - msb) as i32) * tick_spacing
        } else {
            (compressed - bit_pos as i32) * tick_spacing
        };

        (next, initialized)
    } else {
        // start from the next tick, since the current one is spent
        let (word_pos, bit_pos) = position(compressed + 1);

        let mask = !((U256_1 << (bit_pos as usize)) - U256_1);
        let masked = bitmap.get(&word_pos).copied().unwrap_or(U256::ZERO) & mask;

        let initialized = !masked.is_zero();

        let next = if initialized {
            let lsb = bit_math::least_significant_bit(masked)
                .expect("masked word is non-zero");
            (compressed + 1 + (lsb - bit_pos) as i32) * tick_spacing
        } else {
            (compressed + 1 + (0xFF - bit_pos) as i32) * tick_spacing
        };

        (next, initialized)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bitmap_with(ticks: &[i32], tick_spacing: i32) -> BTreeMap<i16, U256> {
        let mut bitmap = BTreeMap::new();
        for tick in ticks {
            flip_tick(&mut bitmap, *tick, tick_spacing);
        }
        bitmap
    }

    #[test]
    fn compress_rounds_toward_negative_infinity() {
        assert_eq!(compress(120, 60), 2);
        assert_eq!(compress(150, 60), 2);
        assert_eq!(compress(-120, 60), -2);
        assert_eq!(compress(-121, 60), -3);
        assert_eq!(compress(-1, 60), -1);
    }

    #[test]
    fn position_splits_word_and_bit() {
        assert_eq!(position(0), (0, 0));
        assert_eq!(position(255), (0, 255));
        assert_eq!(position(256), (1, 0));
        assert_eq!(position(-1), (-1, 255));
        assert_eq!(position(-256), (-1, 0));
        assert_eq!(position(-257), (-2, 255));
    }

    #[test]
    fn flip_tick_round_trips_to_empty() {
        let mut bitmap = BTreeMap::new();

        flip_tick(&mut bitmap, 120, 60);
        assert_eq!(bitmap.len(), 1);

        flip_tick(&mut bitmap, 120, 60);
        assert!(bitmap.is_empty());
    }

    #[test]
    fn lte_finds_tick_at_or_below() {
        let bitmap = bitmap_with(&[-240, 60, 120], 60);

        // the searched tick itself counts for lte
        assert_eq!(
            next_initialized_tick_within_one_word(&bitmap, 120, 60, true),
            (120, true)
        );
        assert_eq!(
            next_initialized_tick_within_one_word(&bitmap, 119, 60, true),
            (60, true)
        );
        // nothing at or below within the word: word boundary, uninitialized
        assert_eq!(
            next_initialized_tick_within_one_word(&bitmap, 0, 60, true),
            (0, false)
        );
        // negative ticks live one word down
        assert_eq!(
            next_initialized_tick_within_one_word(&bitmap, -1, 60, true),
            (-240, true)
        );
    }

    #[test]
    fn gt_finds_tick_strictly_above() {
        let bitmap = bitmap_with(&[-240, 60, 120], 60);

        assert_eq!(
            next_initialized_tick_within_one_word(&bitmap, 0, 60, false),
            (60, true)
        );
        // the searched tick itself does not count
        assert_eq!(
            next_initialized_tick_within_one_word(&bitmap, 60, 60, false),
            (120, true)
        );
        assert_eq!(
            next_initialized_tick_within_one_word(&bitmap, -300, 60, false),
            (-240, true)
        );
    }

    #[test]
    fn empty_word_returns_boundary_uninitialized() {
        let bitmap = BTreeMap::new();

        let (next, initialized) = next_initialized_tick_within_one_word(&bitmap, 0, 60, true);
        assert!(!initialized);
        assert_eq!(next, 0);

        let (next, initialized) = next_initialized_tick_within_one_word(&bitmap, 0, 60, false);
        assert!(!initialized);
        assert_eq!(next, 255 * 60 + 60);
    }
}
