//! Log-domain gain quantization.
//!
//! Subframe gains in Q16 are mapped through [`lin2log`] onto a 64-level
//! log grid (about 1.37 dB per step). The first subframe of an
//! independently coded frame carries the absolute 6-bit index; every other
//! subframe carries a delta with a double-step extension for large upward
//! jumps, so a sudden onset never saturates more than one frame.

use crate::codecs::silk::math::{lin2log, log2lin, smulwb};
use crate::codecs::silk::tables::{
    MAX_DELTA_GAIN_QUANT, MIN_DELTA_GAIN_QUANT, N_LEVELS_QGAIN,
};

/// Offset of the log-gain grid, Q7.
const OFFSET: i32 = 2090;
/// Index per log-gain step, Q16.
const SCALE_Q16: i32 = 2251;
/// Log-gain per index step, Q16.
const INV_SCALE_Q16: i32 = 1_907_826;

#[inline]
fn dequant_gain_q16(ind: i32) -> i32 {
    log2lin((smulwb(INV_SCALE_Q16, ind) + OFFSET).min(3967))
}

/// Quantize per-subframe gains. `ind` receives the absolute index for the
/// first subframe when `conditional` is false, deltas otherwise; the gains
/// are replaced by their dequantized values so encoder and decoder agree.
pub fn gains_quant(ind: &mut [i8], gain_q16: &mut [i32], prev_ind: &mut i8, conditional: bool) {
    for k in 0..gain_q16.len() {
        let mut target = smulwb(SCALE_Q16, lin2log(gain_q16[k].max(1)) - OFFSET);
        // Round towards the previous index to reduce delta cost
        if target < *prev_ind as i32 {
            target += 1;
        }
        let target = target.clamp(0, N_LEVELS_QGAIN - 1);
        if k == 0 && !conditional {
            let v = target.clamp(*prev_ind as i32 + MIN_DELTA_GAIN_QUANT, N_LEVELS_QGAIN - 1);
            *prev_ind = v as i8;
            ind[k] = v as i8;
        } else {
            let mut delta = target - *prev_ind as i32;
            // Double step size above this threshold to reach the top range
            let double_step = 2 * MAX_DELTA_GAIN_QUANT - N_LEVELS_QGAIN + *prev_ind as i32;
            if delta > double_step {
                delta = double_step + ((delta - double_step + 1) >> 1);
            }
            let delta = delta.clamp(MIN_DELTA_GAIN_QUANT, MAX_DELTA_GAIN_QUANT);
            let new_prev = if delta > double_step {
                *prev_ind as i32 + ((delta << 1) - double_step)
            } else {
                *prev_ind as i32 + delta
            };
            *prev_ind = new_prev.clamp(0, N_LEVELS_QGAIN - 1) as i8;
            ind[k] = (delta - MIN_DELTA_GAIN_QUANT) as i8;
        }
        gain_q16[k] = dequant_gain_q16(*prev_ind as i32);
    }
}

/// Reconstruct per-subframe gains from the coded indices.
pub fn gains_dequant(gain_q16: &mut [i32], ind: &[i8], prev_ind: &mut i8, conditional: bool) {
    for k in 0..gain_q16.len() {
        if k == 0 && !conditional {
            // Absolute index; never allow a decrease below the delta floor
            let v = (ind[k] as i32).max(*prev_ind as i32 + MIN_DELTA_GAIN_QUANT);
            *prev_ind = v.clamp(0, N_LEVELS_QGAIN - 1) as i8;
        } else {
            let delta = ind[k] as i32 + MIN_DELTA_GAIN_QUANT;
            let double_step = 2 * MAX_DELTA_GAIN_QUANT - N_LEVELS_QGAIN + *prev_ind as i32;
            let new_prev = if delta > double_step {
                *prev_ind as i32 + ((delta << 1) - double_step)
            } else {
                *prev_ind as i32 + delta
            };
            *prev_ind = new_prev.clamp(0, N_LEVELS_QGAIN - 1) as i8;
        }
        gain_q16[k] = dequant_gain_q16(*prev_ind as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::silk::types::MAX_NB_SUBFR;

    #[test]
    fn test_quant_dequant_agree() {
        let mut gains = [100_000i32, 140_000, 90_000, 200_000];
        let mut ind = [0i8; MAX_NB_SUBFR];
        let mut prev_enc = 10i8;
        gains_quant(&mut ind, &mut gains, &mut prev_enc, false);

        let mut dec_gains = [0i32; MAX_NB_SUBFR];
        let mut prev_dec = 10i8;
        gains_dequant(&mut dec_gains, &ind, &mut prev_dec, false);
        assert_eq!(gains, dec_gains);
        assert_eq!(prev_enc, prev_dec);
    }

    #[test]
    fn test_quantization_error_bounded() {
        // One log step is ~1.4 dB, so round-trip error stays under ~18%
        for &g in &[20_000i32, 65_536, 250_000, 1_000_000, 4_000_000] {
            let mut gains = [g];
            let mut ind = [0i8];
            let mut prev = 30i8;
            gains_quant(&mut ind, &mut gains, &mut prev, false);
            let err = (gains[0] as f64 - g as f64).abs() / g as f64;
            assert!(err < 0.20, "gain {} -> {} err {}", g, gains[0], err);
        }
    }

    #[test]
    fn test_delta_coding_chain() {
        let mut gains = [60_000i32, 70_000, 85_000, 100_000];
        let mut ind = [0i8; MAX_NB_SUBFR];
        let mut prev = 25i8;
        gains_quant(&mut ind, &mut gains, &mut prev, true);
        // All conditional: every index is a small non-negative delta symbol
        for &i in ind.iter() {
            assert!((0..=(MAX_DELTA_GAIN_QUANT - MIN_DELTA_GAIN_QUANT) as i8).contains(&i));
        }
        let mut dec_gains = [0i32; MAX_NB_SUBFR];
        let mut prev_dec = 25i8;
        gains_dequant(&mut dec_gains, &ind, &mut prev_dec, true);
        assert_eq!(gains, dec_gains);
    }

    #[test]
    fn test_indices_fit_tables() {
        let mut gains = [16_000_000i32; 4];
        let mut ind = [0i8; 4];
        let mut prev = 0i8;
        gains_quant(&mut ind, &mut gains, &mut prev, false);
        assert!((0..64).contains(&(ind[0] as i32)));
        for &i in &ind[1..] {
            assert!((0..=40).contains(&(i as i32)));
        }
    }
}
