//! Packet loss concealment and the recovery glue ramp.
//!
//! Lost frames are extrapolated with the last known LTP filter and lag
//! plus a decaying pseudo-random excitation, shaped through the last known
//! LPC. On the first good frame after a loss the output is energy-matched
//! with a gain ramp so recoveries neither thump nor vanish.

use crate::codecs::silk::math::*;
use crate::codecs::silk::types::*;
use tracing::debug;

/// Attenuation of the random excitation per consecutive lost frame, Q15.
const RAND_ATTENUATION_Q15: i32 = 26_214; // 0.8
/// Attenuation of the LTP-driven part per lost frame, Q15 (voiced).
const LTP_ATTENUATION_Q15: i32 = 31_130; // 0.95
/// Glue ramp slope multiplier; onsets after DTX must not be swallowed.
const GLUE_SLOPE_MULT: i32 = 4;

/// Concealment state attached to the decoder.
#[derive(Debug, Clone)]
pub struct PlcState {
    /// Consecutive lost frames.
    pub loss_cnt: i32,
    /// Gains of the last good frame's final subframes, Q16.
    pub prev_gain_q16: [i32; 2],
    /// Pitch lag of the last good voiced frame, Q8.
    pub pitch_l_q8: i32,
    /// LTP taps of the last good voiced frame, Q14.
    pub ltp_coef_q14: [i16; LTP_ORDER],
    /// LPC of the last good frame, Q12.
    pub prev_lpc_q12: [i16; MAX_LPC_ORDER],
    /// Last good frame's signal type.
    pub prev_signal_type: SignalType,
    /// Scale of the random excitation, Q14; decays per loss.
    pub rand_scale_q14: i16,
    /// Running LCG for the random excitation.
    pub rand_seed: i32,
    /// Energy of the most recent concealed frame, per sample.
    pub conc_energy: i64,
    /// Shift applied to `conc_energy`.
    pub conc_energy_shift: i32,
    /// Set while the last decoded frame was concealed.
    pub last_frame_lost: bool,
}

impl Default for PlcState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlcState {
    /// Fresh concealment state.
    pub fn new() -> Self {
        PlcState {
            loss_cnt: 0,
            prev_gain_q16: [1 << 16; 2],
            pitch_l_q8: 100 << 8,
            ltp_coef_q14: [0; LTP_ORDER],
            prev_lpc_q12: [0; MAX_LPC_ORDER],
            prev_signal_type: SignalType::Inactive,
            rand_scale_q14: 1 << 14,
            rand_seed: 3_176_576,
            conc_energy: 0,
            conc_energy_shift: 0,
            last_frame_lost: false,
        }
    }

    /// Reset to stream start.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Record the parameters of a good frame for future concealment.
    pub fn update_from_good_frame(
        &mut self,
        signal_type: SignalType,
        gains_q16: &[i32],
        lag: i32,
        ltp_q14: &[i16; LTP_ORDER],
        lpc_q12: &[i16],
    ) {
        let n = gains_q16.len();
        self.prev_gain_q16 = [gains_q16[n.saturating_sub(2).min(n - 1)], gains_q16[n - 1]];
        if signal_type == SignalType::Voiced {
            self.pitch_l_q8 = lag << 8;
            self.ltp_coef_q14 = *ltp_q14;
        }
        self.prev_lpc_q12 = [0; MAX_LPC_ORDER];
        self.prev_lpc_q12[..lpc_q12.len()].copy_from_slice(lpc_q12);
        self.prev_signal_type = signal_type;
        self.loss_cnt = 0;
        self.rand_scale_q14 = if signal_type == SignalType::Voiced {
            1 << 13
        } else {
            1 << 14
        };
        self.last_frame_lost = false;
    }

    /// Synthesize one concealed frame into `out`, updating the excitation
    /// history `exc_hist_q14` and the LPC synthesis state `s_lpc_q14`.
    pub fn conceal_frame(
        &mut self,
        out: &mut [i16],
        exc_hist_q14: &mut [i32; MAX_FRAME_LENGTH],
        s_lpc_q14: &mut [i32; MAX_LPC_ORDER],
        lpc_order: usize,
    ) {
        let frame_length = out.len();
        let lag = (self.pitch_l_q8 >> 8).clamp(16, MAX_FRAME_LENGTH as i32 - 1);
        let voiced = self.prev_signal_type == SignalType::Voiced;
        debug!(
            loss_cnt = self.loss_cnt,
            voiced, lag, "concealing lost frame"
        );

        // Attenuation compounding with each successive loss
        let harm_gain_q15 = {
            let mut g = LTP_ATTENUATION_Q15;
            for _ in 0..self.loss_cnt.min(8) {
                g = smulww(g << 1, LTP_ATTENUATION_Q15 << 1) >> 2;
            }
            if voiced {
                g
            } else {
                g >> 1
            }
        };

        let gain_q16 = self.prev_gain_q16[1];
        let mut energy: i64 = 0;
        for i in 0..frame_length {
            // Random component, decaying per loss
            self.rand_seed = rand_lcg(self.rand_seed);
            let rand_q14 = (self.rand_seed >> 17) as i32; // +-16384
            let mut exc_q14 = smulwb(rand_q14 << 2, self.rand_scale_q14 as i32) << 2;
            // Periodic component from the excitation history one lag back
            if voiced {
                let idx = (MAX_FRAME_LENGTH as i32 + i as i32 - lag).rem_euclid(MAX_FRAME_LENGTH as i32);
                let past = exc_hist_q14[idx as usize];
                exc_q14 = add_sat32(exc_q14, smulww(past << 1, harm_gain_q15));
            }
            // Write back so further losses keep extrapolating
            let hist_idx = i % MAX_FRAME_LENGTH;
            exc_hist_q14[hist_idx] = exc_q14;

            // LPC synthesis over the concealed excitation
            let mut acc_q10 = (lpc_order as i32) >> 1;
            for (k, &a) in self.prev_lpc_q12[..lpc_order].iter().enumerate() {
                acc_q10 = smlawb(acc_q10, s_lpc_q14[lpc_order - 1 - k], a as i32);
            }
            let xq_q14 = add_sat32(exc_q14, acc_q10 << 4);
            for k in 0..lpc_order - 1 {
                s_lpc_q14[k] = s_lpc_q14[k + 1];
            }
            s_lpc_q14[lpc_order - 1] = xq_q14;

            let sample = sat16(rshift_round(smulww(xq_q14, gain_q16 >> 6), 8));
            out[i] = sample;
            energy += sample as i64 * sample as i64;
        }

        // Fade the random component for the next loss
        self.rand_scale_q14 =
            (smulwb((self.rand_scale_q14 as i32) << 2, RAND_ATTENUATION_Q15) >> 1) as i16;
        self.conc_energy = energy / frame_length.max(1) as i64;
        self.conc_energy_shift = 0;
        self.loss_cnt += 1;
        self.last_frame_lost = true;
    }

    /// Glue the first good frame after a loss: when the new frame is hotter
    /// than the concealment, ramp in from the matched energy instead of
    /// jumping.
    pub fn glue_frame(&mut self, out: &mut [i16]) {
        if !self.last_frame_lost {
            return;
        }
        self.last_frame_lost = false;
        let frame_length = out.len();
        let mut new_energy: i64 = 0;
        for &v in out.iter() {
            new_energy += v as i64 * v as i64;
        }
        let new_energy = new_energy / frame_length.max(1) as i64;
        if new_energy <= self.conc_energy || new_energy == 0 {
            // Recovered frame is no louder than the concealment: leave it
            return;
        }
        // Start gain: sqrt(old / new) in Q16
        let ratio_q16 = ((self.conc_energy << 16) / new_energy).clamp(0, 1 << 16);
        let mut gain_q16 = (sqrt_approx(ratio_q16 as i32) << 8).clamp(0, 1 << 16);
        let slope_q16 = (((1 << 16) - gain_q16) / frame_length as i32) * GLUE_SLOPE_MULT;
        debug!(start_gain_q16 = gain_q16, "glue ramp engaged");
        for v in out.iter_mut() {
            *v = sat16(smulww(*v as i32, gain_q16));
            gain_q16 += slope_q16;
            if gain_q16 >= 1 << 16 {
                break;
            }
        }
    }
}
