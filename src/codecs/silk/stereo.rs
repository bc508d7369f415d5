//! Stereo processing: LR/MS conversion with quantized mid-to-side
//! prediction.
//!
//! The encoder splits the mid signal into low and high bands with a
//! `[1, 2, 1] / 4` filter, fits one predictor per band by least squares,
//! and codes them as a shared 2-bit region plus two 3-bit deltas. Sustained
//! low side energy switches the frame to mid-only signalling.

use crate::codecs::silk::math::*;
use crate::codecs::silk::range::{RangeDecoder, RangeEncoder};
use crate::codecs::silk::tables::{
    STEREO_DELTA_ICDF, STEREO_MID_ONLY_ICDF, STEREO_PRED_Q13, STEREO_REGION_ICDF,
};
use crate::codecs::silk::types::MAX_FRAME_LENGTH;

/// Consecutive low-side-energy frames before mid-only signalling.
const MID_ONLY_HANGOVER_FRAMES: u32 = 3;
/// Side-to-mid energy ratio threshold in Q8 for mid-only.
const MID_ONLY_RATIO_THRESHOLD_Q8: i32 = 3;
/// Predictor smoothing coefficient, Q16.
const PRED_SMOOTH_Q16: i32 = 26_214;

/// Coded stereo weight indices for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StereoWeights {
    /// Shared coarse region, 2 bits.
    pub region: u8,
    /// Low-band predictor delta, 3 bits.
    pub delta_lp: u8,
    /// High-band predictor delta, 3 bits.
    pub delta_hp: u8,
}

impl StereoWeights {
    /// Dequantized predictor pair `(low, high)` in Q13.
    pub fn predictors_q13(&self) -> (i32, i32) {
        (
            STEREO_PRED_Q13[self.region as usize][self.delta_lp as usize] as i32,
            STEREO_PRED_Q13[self.region as usize][self.delta_hp as usize] as i32,
        )
    }
}

/// Encoder-side stereo state.
#[derive(Debug, Clone)]
pub struct StereoEncState {
    /// Smoothed low-band predictor, Q13.
    smth_w_lp_q13: i32,
    /// Smoothed high-band predictor, Q13.
    smth_w_hp_q13: i32,
    /// Consecutive frames with negligible side energy.
    low_side_frames: u32,
    /// Smoothing strength from the stereo complexity setting.
    smooth_shift: i32,
}

impl StereoEncState {
    /// State for a given stereo complexity (0..=10).
    pub fn new(complexity_stereo: i32) -> Self {
        StereoEncState {
            smth_w_lp_q13: 0,
            smth_w_hp_q13: 0,
            low_side_frames: 0,
            smooth_shift: (complexity_stereo / 4).clamp(0, 2),
        }
    }

    /// Reset to stream start.
    pub fn reset(&mut self) {
        self.smth_w_lp_q13 = 0;
        self.smth_w_hp_q13 = 0;
        self.low_side_frames = 0;
    }
}

/// `[1, 2, 1] / 4` low band of a signal; `hp = x - lp` is the high band.
pub fn lowpass_121(x: &[i16], out: &mut [i16]) {
    let n = x.len();
    debug_assert_eq!(out.len(), n);
    for i in 0..n {
        let xm1 = if i > 0 { x[i - 1] as i32 } else { x[0] as i32 };
        let xp1 = if i + 1 < n { x[i + 1] as i32 } else { x[n - 1] as i32 };
        out[i] = rshift_round(xm1 + 2 * x[i] as i32 + xp1, 2) as i16;
    }
}

/// LR to mid/side, in place over two channel slices.
pub fn lr_to_ms(left: &[i16], right: &[i16], mid: &mut [i16], side: &mut [i16]) {
    for i in 0..left.len() {
        let l = left[i] as i32;
        let r = right[i] as i32;
        mid[i] = rshift_round(l + r, 1) as i16;
        side[i] = rshift_round(l - r, 1) as i16;
    }
}

/// Mid/side back to LR with saturation.
pub fn ms_to_lr(mid: &[i16], side: &[i16], left: &mut [i16], right: &mut [i16]) {
    for i in 0..mid.len() {
        let m = mid[i] as i32;
        let s = side[i] as i32;
        left[i] = sat16(m + s);
        right[i] = sat16(m - s);
    }
}

/// Least-squares fit of `side ~ w * band` in Q13.
fn fit_predictor_q13(band: &[i16], side: &[i16]) -> i32 {
    let mut num = 0i64;
    let mut den = 1i64;
    for (&b, &s) in band.iter().zip(side.iter()) {
        num += b as i64 * s as i64;
        den += b as i64 * b as i64;
    }
    (((num << 13) / den).clamp(-13_732, 13_732)) as i32
}

/// Encoder analysis for one frame: smoothed predictors quantized to the
/// region/delta layout, side residual computed, mid-only decision taken.
pub fn stereo_encode_analysis(
    state: &mut StereoEncState,
    mid: &[i16],
    side: &mut [i16],
) -> (StereoWeights, bool) {
    let n = mid.len();
    debug_assert!(n <= MAX_FRAME_LENGTH);
    let mut lp = [0i16; MAX_FRAME_LENGTH];
    lowpass_121(mid, &mut lp[..n]);
    let mut hp = [0i16; MAX_FRAME_LENGTH];
    for i in 0..n {
        hp[i] = sat16(mid[i] as i32 - lp[i] as i32);
    }

    let w_lp = fit_predictor_q13(&lp[..n], side);
    let w_hp = fit_predictor_q13(&hp[..n], side);
    // Frame-rate smoothing, deeper at higher stereo complexity
    let coef = PRED_SMOOTH_Q16 >> state.smooth_shift;
    state.smth_w_lp_q13 += smulww(w_lp - state.smth_w_lp_q13, coef);
    state.smth_w_hp_q13 += smulww(w_hp - state.smth_w_hp_q13, coef);

    // Joint quantization: shared region, per-band delta
    let mut best = StereoWeights::default();
    let mut best_err = i64::MAX;
    for region in 0..4usize {
        let mut err_region = 0i64;
        let mut d_lp = 0usize;
        let mut d_hp = 0usize;
        let mut e_lp = i64::MAX;
        let mut e_hp = i64::MAX;
        for d in 0..8usize {
            let v = STEREO_PRED_Q13[region][d] as i64;
            let e1 = (v - state.smth_w_lp_q13 as i64).pow(2);
            if e1 < e_lp {
                e_lp = e1;
                d_lp = d;
            }
            let e2 = (v - state.smth_w_hp_q13 as i64).pow(2);
            if e2 < e_hp {
                e_hp = e2;
                d_hp = d;
            }
        }
        err_region += e_lp + e_hp;
        if err_region < best_err {
            best_err = err_region;
            best = StereoWeights {
                region: region as u8,
                delta_lp: d_lp as u8,
                delta_hp: d_hp as u8,
            };
        }
    }
    let (wq_lp, wq_hp) = best.predictors_q13();

    // Remove the predicted component from the side channel
    let mut side_energy = 1i64;
    let mut mid_energy = 1i64;
    for i in 0..n {
        let pred = smulwb(lp[i] as i32 * 8, wq_lp) + smulwb(hp[i] as i32 * 8, wq_hp);
        side[i] = sat16(side[i] as i32 - pred);
        side_energy += side[i] as i64 * side[i] as i64;
        mid_energy += mid[i] as i64 * mid[i] as i64;
    }

    // Mid-only signalling after sustained low side energy
    let ratio_q8 = ((side_energy << 8) / mid_energy) as i32;
    if ratio_q8 < MID_ONLY_RATIO_THRESHOLD_Q8 {
        state.low_side_frames = state.low_side_frames.saturating_add(1);
    } else {
        state.low_side_frames = 0;
    }
    let mid_only = state.low_side_frames >= MID_ONLY_HANGOVER_FRAMES;
    if mid_only {
        for s in side.iter_mut() {
            *s = 0;
        }
    }
    (best, mid_only)
}

/// Reconstruct the side channel from its residual and the mid signal.
pub fn stereo_apply_prediction(mid: &[i16], side_resid: &mut [i16], weights: StereoWeights) {
    let n = mid.len();
    let mut lp = [0i16; MAX_FRAME_LENGTH];
    lowpass_121(mid, &mut lp[..n]);
    let (wq_lp, wq_hp) = weights.predictors_q13();
    for i in 0..n {
        let hp = mid[i] as i32 - lp[i] as i32;
        let pred = smulwb(lp[i] as i32 * 8, wq_lp) + smulwb(hp * 8, wq_hp);
        side_resid[i] = sat16(side_resid[i] as i32 + pred);
    }
}

/// Write the stereo weight field and the mid-only flag.
pub fn encode_stereo_weights(enc: &mut RangeEncoder, w: StereoWeights, mid_only: bool) {
    enc.encode_icdf(w.region as usize, STEREO_REGION_ICDF, 8);
    enc.encode_icdf(w.delta_lp as usize, STEREO_DELTA_ICDF, 8);
    enc.encode_icdf(w.delta_hp as usize, STEREO_DELTA_ICDF, 8);
    enc.encode_icdf(usize::from(mid_only), STEREO_MID_ONLY_ICDF, 8);
}

/// Read the stereo weight field and the mid-only flag.
pub fn decode_stereo_weights(dec: &mut RangeDecoder<'_>) -> (StereoWeights, bool) {
    let region = dec.decode_icdf(STEREO_REGION_ICDF, 8) as u8;
    let delta_lp = dec.decode_icdf(STEREO_DELTA_ICDF, 8) as u8;
    let delta_hp = dec.decode_icdf(STEREO_DELTA_ICDF, 8) as u8;
    let mid_only = dec.decode_icdf(STEREO_MID_ONLY_ICDF, 8) == 1;
    (
        StereoWeights {
            region,
            delta_lp,
            delta_hp,
        },
        mid_only,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lr_ms_roundtrip_without_prediction() {
        let left: Vec<i16> = (0..160).map(|i| (i * 37 % 8000) as i16).collect();
        let right: Vec<i16> = (0..160).map(|i| ((i * 53) % 6000) as i16 - 3000).collect();
        let mut mid = vec![0i16; 160];
        let mut side = vec![0i16; 160];
        lr_to_ms(&left, &right, &mut mid, &mut side);
        let mut l2 = vec![0i16; 160];
        let mut r2 = vec![0i16; 160];
        ms_to_lr(&mid, &side, &mut l2, &mut r2);
        for i in 0..160 {
            assert!((l2[i] as i32 - left[i] as i32).abs() <= 1);
            assert!((r2[i] as i32 - right[i] as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_prediction_roundtrip_is_exact() {
        // Whatever the encoder subtracts, the decoder must add back exactly
        let mid: Vec<i16> = (0..320).map(|i| ((i * 29) % 9000) as i16 - 4500).collect();
        let side_orig: Vec<i16> = (0..320).map(|i| ((i * 13) % 3000) as i16 - 1500).collect();
        let mut state = StereoEncState::new(5);
        let mut side = side_orig.clone();
        let (weights, mid_only) = stereo_encode_analysis(&mut state, &mid, &mut side);
        if !mid_only {
            stereo_apply_prediction(&mid, &mut side, weights);
            for i in 0..320 {
                assert!(
                    (side[i] as i32 - side_orig[i] as i32).abs() <= 1,
                    "sample {}: {} vs {}",
                    i,
                    side[i],
                    side_orig[i]
                );
            }
        }
    }

    #[test]
    fn test_weights_roundtrip_through_range_coder() {
        let w = StereoWeights {
            region: 2,
            delta_lp: 7,
            delta_hp: 1,
        };
        let mut enc = RangeEncoder::new();
        encode_stereo_weights(&mut enc, w, true);
        let bytes = enc.finish();
        let mut dec = RangeDecoder::new(&bytes);
        let (got, mid_only) = decode_stereo_weights(&mut dec);
        assert_eq!(got, w);
        assert!(mid_only);
    }

    #[test]
    fn test_mid_only_after_sustained_silence() {
        let mid: Vec<i16> = (0..320).map(|i| ((i * 31) % 12_000) as i16 - 6000).collect();
        let mut state = StereoEncState::new(5);
        let mut decided = false;
        for _ in 0..6 {
            let mut side = vec![0i16; 320];
            let (_, mid_only) = stereo_encode_analysis(&mut state, &mid, &mut side);
            decided = mid_only;
        }
        assert!(decided, "mid-only must engage after sustained zero side");
    }
}
