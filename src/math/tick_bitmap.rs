use crate::FastMap;
use crate::U256_1;
use crate::error::{MathError, StateError};
use crate::math::bit_math::{least_significant_bit, most_significant_bit};
use alloy_primitives::U256;

/// Sparse map from 256-tick word index to the word's bitmap.
pub type TickBitmap = FastMap<i16, U256>;

/// Splits a compressed tick (tick / spacing) into its bitmap coordinates:
/// word index and bit position within the word.
#[inline]
pub fn position(compressed: i32) -> (i16, u8) {
    ((compressed >> 8) as i16, (compressed & 0xff) as u8)
}

#[inline]
fn word_at(bitmap: &TickBitmap, word: i16) -> U256 {
    bitmap.get(&word).copied().unwrap_or(U256::ZERO)
}

/// Toggles the initialized bit for `tick`.
///
/// The tick must be a multiple of `tick_spacing`; only such ticks have a
/// bitmap coordinate.
pub fn flip_tick(
    bitmap: &mut TickBitmap,
    tick: i32,
    tick_spacing: i32,
) -> Result<(), StateError> {
    if tick % tick_spacing != 0 {
        return Err(StateError::TickMisaligned);
    }

    let (word_pos, bit_pos) = position(tick / tick_spacing);
    let mask = U256_1 << bit_pos;
    let word = word_at(bitmap, word_pos) ^ mask;
    if word.is_zero() {
        bitmap.remove(&word_pos);
    } else {
        bitmap.insert(word_pos, word);
    }
    Ok(())
}

/// Finds the next initialized tick within one bitmap word, starting from
/// `tick` and moving down (`lte = true`) or up (`lte = false`).
///
/// When no bit is set in the scanned direction the word's boundary tick is
/// returned with `false`, letting the caller continue word by word.
pub fn next_initialized_tick_within_one_word(
    bitmap: &TickBitmap,
    tick: i32,
    tick_spacing: i32,
    lte: bool,
) -> Result<(i32, bool), MathError> {
    let mut compressed = tick / tick_spacing;
    // Division truncates toward zero; compression floors toward -inf.
    if tick < 0 && tick % tick_spacing != 0 {
        compressed -= 1;
    }

    if lte {
        let (word_pos, bit_pos) = position(compressed);
        // All bits at or below the current bit position.
        let mask = (U256_1 << bit_pos) - U256_1 + (U256_1 << bit_pos);
        let masked = word_at(bitmap, word_pos) & mask;

        if masked.is_zero() {
            Ok(((compressed - bit_pos as i32) * tick_spacing, false))
        } else {
            let msb = most_significant_bit(masked)?;
            Ok((
                (compressed - (bit_pos - msb) as i32) * tick_spacing,
                true,
            ))
        }
    } else {
        // Start from the bit just above the current position.
        let (word_pos, bit_pos) = position(compressed + 1);
        let mask = !((U256_1 << bit_pos) - U256_1);
        let masked = word_at(bitmap, word_pos) & mask;

        if masked.is_zero() {
            Ok(((compressed + 1 + (255 - bit_pos) as i32) * tick_spacing, false))
        } else {
            let lsb = least_significant_bit(masked)?;
            Ok((
                (compressed + 1 + (lsb - bit_pos) as i32) * tick_spacing,
                true,
            ))
        }
    }
}
