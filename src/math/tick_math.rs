use crate::error::StateError;
use alloy_primitives::{I256, U256};

/// Lowest tick the engine can represent: log base 1.0001 of 2^-128.
pub const MIN_TICK: i32 = -887272;
/// Highest representable tick.
pub const MAX_TICK: i32 = -MIN_TICK;

/// Q64.96 sqrt price at `MIN_TICK`.
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);
/// Q64.96 sqrt price at `MAX_TICK`.
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([6743328256752651558, 17280870778742802505, 4294805859, 0]);

// log2(sqrt(1.0001)) in Q64.64 and the correction offsets used to bracket
// the tick candidates when inverting the price curve.
const SQRT_10001: I256 = I256::from_raw(U256::from_limbs([11745905768312294533, 13863, 0, 0]));
const TICK_LOW: I256 = I256::from_raw(U256::from_limbs([
    6552757943157144234,
    184476617836266586,
    0,
    0,
]));
const TICK_HIGH: I256 = I256::from_raw(U256::from_limbs([
    4998474450511881007,
    15793544031827761793,
    0,
    0,
]));

/// Q64.96 sqrt price for a tick index, computed with the canonical
/// 20-constant multiplication schedule (one Q128.128 constant per set bit
/// of the tick's magnitude).
///
/// Fails with `TickOutOfBounds` outside `[MIN_TICK, MAX_TICK]`.
pub fn sqrt_price_at_tick(tick: i32) -> Result<U256, StateError> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK as u32 {
        return Err(StateError::TickOutOfBounds);
    }

    let mut ratio = if abs_tick & 1 != 0 {
        U256::from_limbs([12262481743371124737, 18445821805675392311, 0, 0])
    } else {
        U256::from_limbs([0, 0, 1, 0])
    };

    macro_rules! mul_for_bit {
        ($bit:expr, $l0:expr, $l1:expr) => {
            if abs_tick & $bit != 0 {
                ratio = ratio.wrapping_mul(U256::from_limbs([$l0, $l1, 0, 0])) >> 128;
            }
        };
    }

    mul_for_bit!(0x2, 6459403834229662010, 18444899583751176498);
    mul_for_bit!(0x4, 17226890335427755468, 18443055278223354162);
    mul_for_bit!(0x8, 2032852871939366096, 18439367220385604838);
    mul_for_bit!(0x10, 14545316742740207172, 18431993317065449817);
    mul_for_bit!(0x20, 5129152022828963008, 18417254355718160513);
    mul_for_bit!(0x40, 4894419605888772193, 18387811781193591352);
    mul_for_bit!(0x80, 1280255884321894483, 18329067761203520168);
    mul_for_bit!(0x100, 15924666964335305636, 18212142134806087854);
    mul_for_bit!(0x200, 8010504389359918676, 17980523815641551639);
    mul_for_bit!(0x400, 10668036004952895731, 17526086738831147013);
    mul_for_bit!(0x800, 4878133418470705625, 16651378430235024244);
    mul_for_bit!(0x1000, 9537173718739605541, 15030750278693429944);
    mul_for_bit!(0x2000, 9972618978014552549, 12247334978882834399);
    mul_for_bit!(0x4000, 10428997489610666743, 8131365268884726200);
    mul_for_bit!(0x8000, 9305304367709015974, 3584323654723342297);
    mul_for_bit!(0x10000, 14301143598189091785, 696457651847595233);
    mul_for_bit!(0x20000, 7393154844743099908, 26294789957452057);
    mul_for_bit!(0x40000, 2209338891292245656, 37481735321082);
    mul_for_bit!(0x80000, 10518117631919034274, 76158723);

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Shift from Q128.128 down to Q64.96, rounding up so the result always
    // satisfies tick_at_sqrt_price(sqrt_price_at_tick(t)) == t.
    let round_up = (ratio.as_limbs()[0] & 0xFFFF_FFFF) != 0;
    Ok((ratio >> 32) + U256::from(round_up as u64))
}

const MASK_128: U256 = U256::from_limbs([u64::MAX, u64::MAX, 0, 0]);
const MASK_64: U256 = U256::from_limbs([u64::MAX, 0, 0, 0]);
const MASK_32: U256 = U256::from_limbs([u32::MAX as u64, 0, 0, 0]);
const MASK_16: U256 = U256::from_limbs([u16::MAX as u64, 0, 0, 0]);

/// Bisection most-significant-bit scan over a Q128.128 ratio.
#[inline]
fn msb_of(mut r: U256) -> u32 {
    let mut msb = 0u32;
    for (mask, bits) in [
        (MASK_128, 128u32),
        (MASK_64, 64),
        (MASK_32, 32),
        (MASK_16, 16),
        (U256::from(u8::MAX), 8),
        (U256::from(15u8), 4),
        (U256::from(3u8), 2),
        (U256::ONE, 1),
    ] {
        if r > mask {
            msb |= bits;
            r >>= bits as usize;
        }
    }
    msb
}

/// Largest tick whose sqrt price is at most `sqrt_price_x96`.
///
/// Inverts `sqrt_price_at_tick` by a binary log2 followed by a linear
/// correction, then disambiguates between the two bracketing candidates by
/// evaluating the forward map once.
pub fn tick_at_sqrt_price(sqrt_price_x96: U256) -> Result<i32, StateError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(StateError::SqrtPriceOutOfBounds);
    }

    let ratio = sqrt_price_x96 << 32;
    let msb = msb_of(ratio);

    let mut r = if msb >= 128 {
        ratio >> (msb - 127)
    } else {
        ratio << (127 - msb)
    };

    const SHIFT_64: usize = 64;
    let mut log_2: I256 =
        (I256::from_raw(U256::from(msb)) - I256::from_raw(U256::from(128u64))) << SHIFT_64;

    // Fourteen squaring steps refine log2 to the precision the linear
    // correction constants assume.
    for shift in (50usize..=63).rev() {
        r = r.overflowing_mul(r).0 >> 127;
        let f: U256 = r >> 128;
        log_2 |= I256::from_raw(f << shift);
        r >>= f.as_limbs()[0] as usize;
    }

    const SHIFT_128: usize = 128;
    let log_sqrt10001 = log_2.wrapping_mul(SQRT_10001);
    let tick_low = ((log_sqrt10001 - TICK_LOW) >> SHIFT_128).low_i32();
    let tick_high = ((log_sqrt10001 + TICK_HIGH) >> SHIFT_128).low_i32();

    Ok(if tick_low == tick_high {
        tick_low
    } else if sqrt_price_at_tick(tick_high)? <= sqrt_price_x96 {
        tick_high
    } else {
        tick_low
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn rejects_out_of_range_ticks() {
        assert!(matches!(
            sqrt_price_at_tick(MIN_TICK - 1),
            Err(StateError::TickOutOfBounds)
        ));
        assert!(matches!(
            sqrt_price_at_tick(MAX_TICK + 1),
            Err(StateError::TickOutOfBounds)
        ));
    }

    #[test]
    fn boundary_prices_match_constants() {
        assert_eq!(sqrt_price_at_tick(MIN_TICK).unwrap(), MIN_SQRT_RATIO);
        assert_eq!(sqrt_price_at_tick(MAX_TICK).unwrap(), MAX_SQRT_RATIO);
        assert_eq!(
            sqrt_price_at_tick(MIN_TICK + 1).unwrap(),
            U256::from(4295343490u64)
        );
        assert_eq!(
            sqrt_price_at_tick(MAX_TICK - 1).unwrap(),
            U256::from_str("1461373636630004318706518188784493106690254656249").unwrap()
        );
    }

    #[test]
    fn reference_prices_match_known_vectors() {
        let vectors: [(i32, &str); 10] = [
            (50, "79426470787362580746886972461"),
            (100, "79625275426524748796330556128"),
            (250, "80224679980005306637834519095"),
            (500, "81233731461783161732293370115"),
            (1000, "83290069058676223003182343270"),
            (2500, "89776708723587163891445672585"),
            (5000, "101729702841318637793976746270"),
            (50000, "965075977353221155028623082916"),
            (250000, "21246587762933397357449903968194344"),
            (738203, "847134979253254120489401328389043031315994541"),
        ];
        for (tick, expected) in vectors {
            assert_eq!(
                sqrt_price_at_tick(tick).unwrap(),
                U256::from_str(expected).unwrap(),
                "sqrt price at tick {tick}"
            );
        }
    }

    #[test]
    fn negative_ticks_are_reciprocal_of_positive() {
        // price(t) * price(-t) ~= 2^192 (one rounding step of slack)
        for tick in [1, 60, 887, 12345, 440000] {
            let up = sqrt_price_at_tick(tick).unwrap();
            let down = sqrt_price_at_tick(-tick).unwrap();
            let product = up * down;
            let unit = U256::ONE << 192;
            let diff = if product > unit { product - unit } else { unit - product };
            assert!(diff <= up + down, "tick {tick} reciprocal drift too large");
        }
    }

    #[test]
    fn inverse_rejects_out_of_range_prices() {
        assert!(matches!(
            tick_at_sqrt_price(MIN_SQRT_RATIO - U256::ONE),
            Err(StateError::SqrtPriceOutOfBounds)
        ));
        assert!(matches!(
            tick_at_sqrt_price(MAX_SQRT_RATIO),
            Err(StateError::SqrtPriceOutOfBounds)
        ));
    }

    #[test]
    fn inverse_at_the_boundaries() {
        assert_eq!(tick_at_sqrt_price(MIN_SQRT_RATIO).unwrap(), MIN_TICK);
        assert_eq!(
            tick_at_sqrt_price(U256::from(4295343490u64)).unwrap(),
            MIN_TICK + 1
        );
        assert_eq!(
            tick_at_sqrt_price(MAX_SQRT_RATIO - U256::ONE).unwrap(),
            MAX_TICK - 1
        );
    }

    #[test]
    fn round_trip_is_the_identity_on_ticks() {
        for tick in [
            MIN_TICK,
            -887270,
            -123456,
            -60,
            -1,
            0,
            1,
            60,
            123456,
            887270,
            MAX_TICK - 1,
        ] {
            let price = sqrt_price_at_tick(tick).unwrap();
            assert_eq!(tick_at_sqrt_price(price).unwrap(), tick, "tick {tick}");
        }
    }

    #[test]
    fn price_round_trip_brackets_the_input() {
        let price = U256::from_str("1461373636630004318706518188784493106690254656249").unwrap();
        let tick = tick_at_sqrt_price(price).unwrap();
        assert!(sqrt_price_at_tick(tick).unwrap() <= price);
        assert!(price < sqrt_price_at_tick(tick + 1).unwrap());
    }
}
