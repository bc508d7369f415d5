//! Comfort noise generation.
//!
//! The CNG state tracks smoothed NLSFs and a smoothed gain, updated only on
//! good inactive frames. During concealment it synthesizes noise from a
//! masked-LCG walk over the excitation history and adds it to the decoded
//! frame rather than replacing it.

use crate::codecs::silk::math::*;
use crate::codecs::silk::nlsf::nlsf_to_lpc;
use crate::codecs::silk::types::*;

/// One-pole smoothing coefficient for the CNG NLSFs, Q16.
const CNG_NLSF_SMTH_Q16: i32 = 16_348;
/// One-pole smoothing coefficient for the CNG gain, Q16.
const CNG_GAIN_SMTH_Q16: i32 = 4_634;
/// Excitation history length; power of two so the LCG can mask into it.
const CNG_BUF_MASK: usize = 255;

/// Comfort noise state attached to the decoder.
#[derive(Clone)]
pub struct CngState {
    /// Smoothed NLSFs, Q15.
    pub smth_nlsf_q15: [i16; MAX_LPC_ORDER],
    /// Smoothed excitation gain, Q16.
    pub smth_gain_q16: i32,
    /// Excitation history ring sampled by the LCG.
    pub exc_buf_q14: [i32; CNG_BUF_MASK + 1],
    /// LCG state for the sampling walk.
    pub rand_seed: i32,
    /// LPC synthesis memory, Q14.
    pub synth_state_q14: [i32; MAX_LPC_ORDER],
    /// NLSF order in use.
    pub order: usize,
}

impl CngState {
    /// Fresh state for the given prediction order.
    pub fn new(order: usize) -> Self {
        let mut smth_nlsf_q15 = [0i16; MAX_LPC_ORDER];
        for (i, v) in smth_nlsf_q15.iter_mut().enumerate().take(order) {
            *v = ((i + 1) * 32_768 / (order + 1)) as i16;
        }
        CngState {
            smth_nlsf_q15,
            smth_gain_q16: 0,
            exc_buf_q14: [0; CNG_BUF_MASK + 1],
            rand_seed: 3_176_576,
            synth_state_q14: [0; MAX_LPC_ORDER],
            order,
        }
    }

    /// Reset to stream start.
    pub fn reset(&mut self) {
        *self = Self::new(self.order);
    }

    /// Track a good inactive frame: smooth NLSFs and gain, refresh the
    /// excitation history.
    pub fn update_from_inactive_frame(
        &mut self,
        nlsf_q15: &[i16],
        gains_q16: &[i32],
        exc_q14: &[i32],
    ) {
        for i in 0..self.order.min(nlsf_q15.len()) {
            let d = nlsf_q15[i] as i32 - self.smth_nlsf_q15[i] as i32;
            self.smth_nlsf_q15[i] =
                (self.smth_nlsf_q15[i] as i32 + smulww(d, CNG_NLSF_SMTH_Q16)) as i16;
        }
        let mut max_gain = 0i32;
        for &g in gains_q16 {
            max_gain = max_gain.max(g);
        }
        let dg = max_gain - self.smth_gain_q16;
        self.smth_gain_q16 += smulww(dg, CNG_GAIN_SMTH_Q16);
        // Keep a slice of recent excitation for later resampling
        for (i, &e) in exc_q14.iter().take(CNG_BUF_MASK + 1).enumerate() {
            self.exc_buf_q14[i] = e;
        }
    }

    /// Generate comfort noise for a concealed frame and add it to `out`.
    /// `rand_scale_q14` comes from the PLC so the noise share grows as the
    /// periodic extrapolation fades.
    pub fn add_comfort_noise(&mut self, out: &mut [i16], rand_scale_q14: i32) {
        if self.smth_gain_q16 == 0 {
            return;
        }
        let mut a_q12 = [0i16; MAX_LPC_ORDER];
        nlsf_to_lpc(&mut a_q12[..self.order], &self.smth_nlsf_q15[..self.order]);
        // Noise gain shrinks as the PLC still has useful extrapolation
        let inv_scale_q14 = (1 << 14) - rand_scale_q14.clamp(0, 1 << 14);
        let gain_q16 = smulww(self.smth_gain_q16, inv_scale_q14 << 2);
        if gain_q16 == 0 {
            return;
        }
        for sample in out.iter_mut() {
            self.rand_seed = rand_lcg(self.rand_seed);
            let exc_q14 = self.exc_buf_q14[(self.rand_seed as u32 as usize >> 16) & CNG_BUF_MASK];
            let mut pred_q10 = (self.order as i32) >> 1;
            for (k, &a) in a_q12[..self.order].iter().enumerate() {
                pred_q10 = smlawb(pred_q10, self.synth_state_q14[self.order - 1 - k], a as i32);
            }
            let xq_q14 = add_sat32(exc_q14, pred_q10 << 4);
            for k in 0..self.order - 1 {
                self.synth_state_q14[k] = self.synth_state_q14[k + 1];
            }
            self.synth_state_q14[self.order - 1] = xq_q14;
            let noise = rshift_round(smulww(xq_q14, gain_q16 >> 6), 8);
            *sample = sat16(*sample as i32 + noise);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_exc(n: usize) -> Vec<i32> {
        let mut seed = 11u32;
        (0..n)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((seed >> 18) as i32 - 8192) << 2
            })
            .collect()
    }

    #[test]
    fn test_no_noise_before_any_update() {
        let mut cng = CngState::new(16);
        let mut out = vec![0i16; 320];
        cng.add_comfort_noise(&mut out, 0);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_noise_appears_after_updates() {
        let mut cng = CngState::new(16);
        let nlsf: Vec<i16> = (0..16).map(|i| ((i + 1) * 1900) as i16).collect();
        let exc = seeded_exc(320);
        for _ in 0..12 {
            cng.update_from_inactive_frame(&nlsf, &[120_000, 120_000, 120_000, 120_000], &exc);
        }
        let mut out = vec![0i16; 320];
        cng.add_comfort_noise(&mut out, 0);
        assert!(out.iter().any(|&v| v != 0), "comfort noise must be audible");
        let peak = out.iter().map(|&v| (v as i32).abs()).max().unwrap();
        assert!(peak < 16_000, "comfort noise too hot: {}", peak);
    }

    #[test]
    fn test_noise_is_additive() {
        let mut cng = CngState::new(10);
        let nlsf: Vec<i16> = (0..10).map(|i| ((i + 1) * 2900) as i16).collect();
        let exc = seeded_exc(160);
        for _ in 0..12 {
            cng.update_from_inactive_frame(&nlsf, &[90_000, 90_000], &exc);
        }
        let base = vec![1000i16; 160];
        let mut out = base.clone();
        cng.add_comfort_noise(&mut out, 0);
        // Additive: the carrier must remain present under the noise
        let mean: i64 = out.iter().map(|&v| v as i64).sum::<i64>() / 160;
        assert!((mean - 1000).abs() < 500, "carrier lost: mean {}", mean);
    }

    #[test]
    fn test_rand_scale_suppresses_noise() {
        let mut cng = CngState::new(10);
        let nlsf: Vec<i16> = (0..10).map(|i| ((i + 1) * 2900) as i16).collect();
        let exc = seeded_exc(160);
        for _ in 0..12 {
            cng.update_from_inactive_frame(&nlsf, &[90_000, 90_000], &exc);
        }
        let mut full = vec![0i16; 160];
        cng.clone().add_comfort_noise(&mut full, 0);
        let mut damped = vec![0i16; 160];
        cng.add_comfort_noise(&mut damped, 1 << 14);
        let ef: i64 = full.iter().map(|&v| v as i64 * v as i64).sum();
        let ed: i64 = damped.iter().map(|&v| v as i64 * v as i64).sum();
        assert!(ed < ef / 4 || ef == 0, "full {} damped {}", ef, ed);
    }
}
