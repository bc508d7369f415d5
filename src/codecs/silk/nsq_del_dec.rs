//! Noise Shaping Quantizer, delayed-decision variant.
//!
//! Runs up to four competing quantizer states with a decision delay of up
//! to forty samples. Every sample expands each survivor into its two
//! quantization candidates, then prunes back while penalizing states that
//! duplicate the winner's dither history at the delay horizon. Samples
//! leave the speculative window only when committed by the current winner,
//! so a better path discovered within the delay can still rewrite them.

use crate::codecs::silk::lpc::lpc_analysis_filter;
use crate::codecs::silk::math::*;
use crate::codecs::silk::nsq::{
    offset_q10, shaping_feedback, NsqFrameParams, NsqState, NSQ_LPC_BUF_LENGTH,
};
use crate::codecs::silk::types::*;

/// Penalty added to an RD cost to bias a state out of contention without
/// forbidding later rearrangement.
const RD_PENALTY_Q10: i64 = (i32::MAX / 16) as i64;

/// One competing quantizer path.
#[derive(Clone)]
struct DelDecState {
    s_lpc_q14: [i32; NSQ_LPC_BUF_LENGTH + MAX_SUB_FRAME_LENGTH],
    s_ar2_q14: [i32; MAX_SHAPE_LPC_ORDER],
    s_lf_ar_shp_q14: i32,
    s_diff_shp_q14: i32,
    seed: i32,
    seed_init: i32,
    rd_q10: i64,
    // Rolling speculative window, indexed modulo the decision delay
    rand_state: [i32; DECISION_DELAY],
    q_q10: [i32; DECISION_DELAY],
    xq_q14: [i32; DECISION_DELAY],
    ltp_exc_q14: [i32; DECISION_DELAY],
    shape_q14: [i32; DECISION_DELAY],
}

impl DelDecState {
    fn new(seed: i32) -> Self {
        DelDecState {
            s_lpc_q14: [0; NSQ_LPC_BUF_LENGTH + MAX_SUB_FRAME_LENGTH],
            s_ar2_q14: [0; MAX_SHAPE_LPC_ORDER],
            s_lf_ar_shp_q14: 0,
            s_diff_shp_q14: 0,
            seed,
            seed_init: seed,
            rd_q10: 0,
            rand_state: [0; DECISION_DELAY],
            q_q10: [0; DECISION_DELAY],
            xq_q14: [0; DECISION_DELAY],
            ltp_exc_q14: [0; DECISION_DELAY],
            shape_q14: [0; DECISION_DELAY],
        }
    }
}

/// Candidate produced by expanding one state with one quantization choice.
#[derive(Clone, Copy, Default)]
struct SampleState {
    rd_q10: i64,
    q_q10: i32,
    pulse: i32,
    xq_q14: i32,
    ltp_exc_q14: i32,
    diff_q14: i32,
    lf_ar_q14: i32,
    shape_q14: i32,
}

/// Delayed-decision quantization of one frame. With `n_states == 1` the
/// result matches the single-path quantizer's search ordering.
///
/// Returns the seed index of the winning state; the caller must code that
/// value so the decoder's dither generator replays the winner's decisions.
pub fn nsq_del_dec_quantize(
    state: &mut NsqState,
    params: &NsqFrameParams,
    x: &[i16],
    pulses: &mut [i16],
    xq_out: &mut [i16],
    n_states: usize,
) -> i32 {
    let cfg = &params.config;
    let frame_length = cfg.frame_length;
    let subfr_length = cfg.subfr_length;
    let ltp_mem = cfg.ltp_mem_length;
    let n_states = n_states.clamp(1, MAX_DEL_DEC_STATES);
    let voiced = params.signal_type == SignalType::Voiced;
    let offset_q10 = offset_q10(params.signal_type, params.quant_offset_type);

    // Decision delay never exceeds a subframe, and for voiced frames stays
    // inside the shortest lag so speculative samples are never read back
    let mut decision_delay = DECISION_DELAY.min(subfr_length);
    if voiced {
        for s in 0..cfg.nb_subfr {
            decision_delay =
                decision_delay.min((params.pitch_lags[s] as usize).saturating_sub(LTP_ORDER / 2 + 1));
        }
    }
    let decision_delay = decision_delay.max(1);

    let mut del_dec: Vec<DelDecState> = (0..n_states)
        .map(|k| {
            let mut d = DelDecState::new(params.seed.wrapping_add(k as i32) & 3);
            d.s_lpc_q14.copy_from_slice(&state.s_lpc_q14);
            d.s_ar2_q14 = state.s_ar2_q14;
            d.s_lf_ar_shp_q14 = state.s_lf_ar_shp_q14;
            d.s_diff_shp_q14 = state.s_diff_shp_q14;
            d
        })
        .collect();

    state.s_ltp_shp_buf_idx = ltp_mem;
    state.s_ltp_buf_idx = ltp_mem;
    let mut s_ltp_whitened = [0i16; 2 * MAX_FRAME_LENGTH];
    let mut lag = state.lag_prev;
    let mut smpl_buf_idx = 0usize;
    let mut n_pending = 0usize;
    let mut out_idx = 0usize; // absolute index of next committed sample
    // Gains of the speculative samples, shared by all states
    let mut pending_gain_q10 = [1i32 << 10; DECISION_DELAY];

    for s in 0..cfg.nb_subfr {
        let a_q12 = &params.a_q12[if s < cfg.nb_subfr / 2 { 0 } else { 1 }];
        let gain_q16 = params.gains_q16[s].max(1);
        let gain_q10 = gain_q16 >> 6;
        let harm_q14 = params.harm_shape_gain_q14[s];
        let tilt_q14 = params.tilt_q14[s];

        // Rewhitening points are also winner-commit points: flush the
        // speculative window through the current best state first
        if voiced && (s == 0 || (s == 2 && params.nlsf_interp_active)) {
            lag = params.pitch_lags[s];
            if n_pending > 0 {
                let winner = best_state(&del_dec);
                flush_winner(
                    state,
                    &mut del_dec,
                    winner,
                    smpl_buf_idx,
                    &mut n_pending,
                    &mut out_idx,
                    pulses,
                    xq_out,
                    &pending_gain_q10,
                    decision_delay,
                    ltp_mem,
                );
            }
            let start_idx = (ltp_mem as i32 - lag - cfg.lpc_order as i32 - (LTP_ORDER as i32) / 2)
                .max(0) as usize;
            let hist_end = ltp_mem + s * subfr_length;
            lpc_analysis_filter(
                &mut s_ltp_whitened[start_idx..hist_end],
                &state.xq[start_idx..hist_end],
                &a_q12[..cfg.lpc_order],
            );
            state.rewhite_flag = true;
            state.s_ltp_buf_idx = hist_end;
        } else if voiced {
            lag = params.pitch_lags[s];
        }

        // Gain scaling, shared across states
        let inv_gain_q31 = inverse32_varq(gain_q16, 47);
        let inv_gain_q26 = rshift_round(inv_gain_q31, 5);
        let mut x_sc_q10 = [0i32; MAX_SUB_FRAME_LENGTH];
        for i in 0..subfr_length {
            x_sc_q10[i] = smulww(x[s * subfr_length + i] as i32, inv_gain_q26);
        }
        if state.rewhite_flag {
            let mut scale_q31 = inv_gain_q31;
            if s == 0 {
                scale_q31 = smulwb(inv_gain_q31, params.ltp_scale_q14) << 2;
            }
            let start = (state.s_ltp_buf_idx as i32 - lag - (LTP_ORDER as i32) / 2).max(0) as usize;
            for i in start..state.s_ltp_buf_idx {
                state.s_ltp_q15[i] = smulwb(scale_q31, s_ltp_whitened[i] as i32);
            }
            state.rewhite_flag = false;
        }
        if state.prev_gain_q16 != gain_q16 {
            let gain_adj_q16 = div32_varq(state.prev_gain_q16, gain_q16, 16);
            if gain_adj_q16 != 1 << 16 {
                for i in (state.s_ltp_shp_buf_idx - ltp_mem)..state.s_ltp_shp_buf_idx {
                    state.s_ltp_shp_q14[i] = smulww(gain_adj_q16, state.s_ltp_shp_q14[i]);
                }
                if voiced {
                    let start =
                        (state.s_ltp_buf_idx as i32 - lag - (LTP_ORDER as i32) / 2).max(0) as usize;
                    for i in start..state.s_ltp_buf_idx {
                        state.s_ltp_q15[i] = smulww(gain_adj_q16, state.s_ltp_q15[i]);
                    }
                }
                for d in del_dec.iter_mut() {
                    d.s_lf_ar_shp_q14 = smulww(gain_adj_q16, d.s_lf_ar_shp_q14);
                    d.s_diff_shp_q14 = smulww(gain_adj_q16, d.s_diff_shp_q14);
                    for v in d.s_ar2_q14.iter_mut() {
                        *v = smulww(gain_adj_q16, *v);
                    }
                    for i in 0..NSQ_LPC_BUF_LENGTH {
                        d.s_lpc_q14[i] = smulww(gain_adj_q16, d.s_lpc_q14[i]);
                    }
                    // The speculative output samples keep their original
                    // gain domain; they pair with the per-sample gain at
                    // commit time. Only the state-feeding entries rescale.
                    for i in 0..DECISION_DELAY {
                        d.ltp_exc_q14[i] = smulww(gain_adj_q16, d.ltp_exc_q14[i]);
                        d.shape_q14[i] = smulww(gain_adj_q16, d.shape_q14[i]);
                    }
                }
            }
        }
        state.prev_gain_q16 = gain_q16;

        let mut pred_lag_idx =
            (state.s_ltp_buf_idx as i32 - lag + (LTP_ORDER as i32) / 2) as usize;
        let mut shp_lag_idx = (state.s_ltp_shp_buf_idx as i32 - lag + 1).max(2) as usize;

        for i in 0..subfr_length {
            // Predictions shared by all states (they depend only on
            // committed history)
            let mut ltp_pred_q13 = 0i32;
            let mut n_ltp_q13 = 0i32;
            if voiced {
                ltp_pred_q13 = 2;
                for (k, &b) in params.b_q14[s].iter().enumerate() {
                    ltp_pred_q13 =
                        smlawb(ltp_pred_q13, state.s_ltp_q15[pred_lag_idx - k], b as i32);
                }
                pred_lag_idx += 1;
                if harm_q14 > 0 {
                    let shp0 = state.s_ltp_shp_q14[shp_lag_idx];
                    let shp1 = state.s_ltp_shp_q14[shp_lag_idx - 1];
                    let shp2 = state.s_ltp_shp_q14[shp_lag_idx - 2];
                    n_ltp_q13 = (smulwb(shp0 + shp2, harm_q14 >> 2)
                        + smulwb(shp1, harm_q14 >> 1))
                        << 1;
                    shp_lag_idx += 1;
                }
            }

            // Expand each state into its two candidates
            let mut samples = [[SampleState::default(); 2]; MAX_DEL_DEC_STATES];
            for (k, d) in del_dec.iter_mut().enumerate() {
                d.seed = rand_lcg(d.seed);
                let lpc_base = NSQ_LPC_BUF_LENGTH + i;
                let mut lpc_pred_q10 = (cfg.lpc_order as i32) >> 1;
                for (n, &a) in a_q12[..cfg.lpc_order].iter().enumerate() {
                    lpc_pred_q10 = smlawb(lpc_pred_q10, d.s_lpc_q14[lpc_base - 1 - n], a as i32);
                }
                let prev_shape = if n_pending == 0 {
                    state.s_ltp_shp_q14[state.s_ltp_shp_buf_idx - 1]
                } else {
                    let prev_idx = (smpl_buf_idx + decision_delay - 1) % decision_delay;
                    d.shape_q14[prev_idx]
                };
                let (n_ar_q12, n_lf_q12) = shaping_feedback(
                    &mut d.s_ar2_q14,
                    d.s_diff_shp_q14,
                    d.s_lf_ar_shp_q14,
                    prev_shape,
                    &params.ar_shp_q13,
                    params.shape_order,
                    params.warping_q16,
                    tilt_q14,
                    params.lf_ar_shp_q14,
                    params.lf_ma_shp_q14,
                );
                let tmp_q12 = (lpc_pred_q10 << 2) - n_ar_q12 - n_lf_q12;
                let mut r_q10 = if voiced {
                    let tmp_q13 = (ltp_pred_q13 - n_ltp_q13) + (tmp_q12 << 1);
                    x_sc_q10[i] - rshift_round(tmp_q13, 3)
                } else {
                    x_sc_q10[i] - rshift_round(tmp_q12, 2)
                };
                let flip = d.seed < 0;
                if flip {
                    r_q10 = -r_q10;
                }
                r_q10 = r_q10.clamp(-(31 << 10), 30 << 10);

                for (c, cand) in candidate_pair(r_q10, offset_q10, params.lambda_q10)
                    .iter()
                    .enumerate()
                {
                    let (q_q10, pulse, rd_inc) = *cand;
                    let mut exc_q14 = q_q10 << 4;
                    if flip {
                        exc_q14 = -exc_q14;
                    }
                    let ltp_exc_q14 = exc_q14 + (ltp_pred_q13 << 1);
                    let xq_q14 = ltp_exc_q14 + (lpc_pred_q10 << 4);
                    let diff_q14 = xq_q14 - (x_sc_q10[i] << 4);
                    let lf_ar_q14 = diff_q14 - (n_ar_q12 << 2);
                    samples[k][c] = SampleState {
                        rd_q10: d.rd_q10 + rd_inc as i64,
                        q_q10,
                        pulse,
                        xq_q14,
                        ltp_exc_q14,
                        diff_q14,
                        lf_ar_q14,
                        shape_q14: lf_ar_q14 - (n_lf_q12 << 2),
                    };
                }
            }

            // Winner among the best candidates
            let mut winner = 0usize;
            for k in 1..n_states {
                if samples[k][0].rd_q10 < samples[winner][0].rd_q10 {
                    winner = k;
                }
            }

            // Dither-history rule at the delay horizon: once the winner's
            // sample is committed, any state whose dither state disagrees
            // there can no longer produce a stream the decoder's generator
            // would replay, so it is priced out of contention
            if n_pending >= decision_delay {
                let horizon = smpl_buf_idx;
                let win_rand = del_dec[winner].rand_state[horizon];
                for k in 0..n_states {
                    if k != winner && del_dec[k].rand_state[horizon] != win_rand {
                        samples[k][0].rd_q10 += RD_PENALTY_Q10;
                        samples[k][1].rd_q10 += RD_PENALTY_Q10;
                    }
                }
            }

            // Replace the worst surviving first choice with the best
            // second choice when that lowers the frontier
            let mut rd_max_ind = 0usize;
            let mut rd_min_ind = 0usize;
            for k in 1..n_states {
                if samples[k][0].rd_q10 > samples[rd_max_ind][0].rd_q10 {
                    rd_max_ind = k;
                }
                if samples[k][1].rd_q10 < samples[rd_min_ind][1].rd_q10 {
                    rd_min_ind = k;
                }
            }
            if n_states > 1 && samples[rd_min_ind][1].rd_q10 < samples[rd_max_ind][0].rd_q10 {
                let cloned = del_dec[rd_min_ind].clone();
                del_dec[rd_max_ind] = cloned;
                samples[rd_max_ind][0] = samples[rd_min_ind][1];
                if winner == rd_max_ind {
                    winner = rd_min_ind;
                }
            }

            // Commit the sample leaving the speculative window
            if n_pending >= decision_delay {
                let horizon = smpl_buf_idx;
                let w = &del_dec[winner];
                pulses[out_idx] = rshift_round(w.q_q10[horizon], 10) as i16;
                let g_q10 = pending_gain_q10[horizon];
                let sample = sat16(rshift_round(smulww(w.xq_q14[horizon], g_q10), 8));
                xq_out[out_idx] = sample;
                state.xq[ltp_mem + out_idx] = sample;
                state.s_ltp_shp_q14[state.s_ltp_shp_buf_idx - decision_delay] =
                    w.shape_q14[horizon];
                state.s_ltp_q15[state.s_ltp_buf_idx - decision_delay] =
                    w.ltp_exc_q14[horizon] << 1;
                out_idx += 1;
                n_pending -= 1;
            }

            // Advance every state with its chosen candidate
            for (k, d) in del_dec.iter_mut().enumerate() {
                let choice = samples[k][0];
                d.rd_q10 = choice.rd_q10;
                d.seed = d.seed.wrapping_add(choice.pulse);
                d.rand_state[smpl_buf_idx] = d.seed;
                d.q_q10[smpl_buf_idx] = choice.q_q10;
                d.xq_q14[smpl_buf_idx] = choice.xq_q14;
                d.ltp_exc_q14[smpl_buf_idx] = choice.ltp_exc_q14;
                d.shape_q14[smpl_buf_idx] = choice.shape_q14;
                d.s_diff_shp_q14 = choice.diff_q14;
                d.s_lf_ar_shp_q14 = choice.lf_ar_q14;
                d.s_lpc_q14[NSQ_LPC_BUF_LENGTH + i] = choice.xq_q14;
            }
            pending_gain_q10[smpl_buf_idx] = gain_q10;
            smpl_buf_idx = (smpl_buf_idx + 1) % decision_delay;
            n_pending = (n_pending + 1).min(decision_delay);
            state.s_ltp_shp_buf_idx += 1;
            state.s_ltp_buf_idx += 1;
        }

        for d in del_dec.iter_mut() {
            d.s_lpc_q14
                .copy_within(subfr_length..subfr_length + NSQ_LPC_BUF_LENGTH, 0);
        }
    }

    // Final flush through the overall winner
    let winner = best_state(&del_dec);
    flush_winner(
        state,
        &mut del_dec,
        winner,
        smpl_buf_idx,
        &mut n_pending,
        &mut out_idx,
        pulses,
        xq_out,
        &pending_gain_q10,
        decision_delay,
        ltp_mem,
    );
    debug_assert_eq!(out_idx, frame_length);

    // Adopt the winner's filter state for the next frame
    let w = del_dec[winner].clone();
    state.s_lpc_q14.copy_from_slice(&w.s_lpc_q14);
    state.s_ar2_q14 = w.s_ar2_q14;
    state.s_lf_ar_shp_q14 = w.s_lf_ar_shp_q14;
    state.s_diff_shp_q14 = w.s_diff_shp_q14;
    state.rand_seed = w.seed_init;

    state.lag_prev = params.pitch_lags[cfg.nb_subfr - 1];
    state.xq.copy_within(frame_length..frame_length + ltp_mem, 0);
    state
        .s_ltp_shp_q14
        .copy_within(frame_length..frame_length + ltp_mem, 0);
    w.seed_init
}

/// Lowest-RD state index.
fn best_state(del_dec: &[DelDecState]) -> usize {
    let mut best = 0usize;
    for (k, d) in del_dec.iter().enumerate().skip(1) {
        if d.rd_q10 < del_dec[best].rd_q10 {
            best = k;
        }
    }
    best
}

/// Write every pending speculative sample of `winner` to the shared
/// buffers, then soft-flush the losers with an RD penalty.
#[allow(clippy::too_many_arguments)]
fn flush_winner(
    state: &mut NsqState,
    del_dec: &mut [DelDecState],
    winner: usize,
    smpl_buf_idx: usize,
    n_pending: &mut usize,
    out_idx: &mut usize,
    pulses: &mut [i16],
    xq_out: &mut [i16],
    pending_gain_q10: &[i32; DECISION_DELAY],
    decision_delay: usize,
    ltp_mem: usize,
) {
    let pending = *n_pending;
    for j in 0..pending {
        let horizon = (smpl_buf_idx + decision_delay - pending + j) % decision_delay;
        let back = pending - j;
        let w = &del_dec[winner];
        pulses[*out_idx] = rshift_round(w.q_q10[horizon], 10) as i16;
        let g_q10 = pending_gain_q10[horizon];
        let sample = sat16(rshift_round(smulww(w.xq_q14[horizon], g_q10), 8));
        xq_out[*out_idx] = sample;
        state.xq[ltp_mem + *out_idx] = sample;
        state.s_ltp_shp_q14[state.s_ltp_shp_buf_idx - back] = w.shape_q14[horizon];
        state.s_ltp_q15[state.s_ltp_buf_idx - back] = w.ltp_exc_q14[horizon] << 1;
        *out_idx += 1;
    }
    *n_pending = 0;
    for (k, d) in del_dec.iter_mut().enumerate() {
        if k != winner {
            d.rd_q10 += RD_PENALTY_Q10;
        }
    }
}

/// The two quantization candidates for one target, each as
/// `(q_q10, pulse, rd_increment_q20)`.
fn candidate_pair(r_q10: i32, offset_q10: i32, lambda_q10: i32) -> [(i32, i32, i32); 2] {
    use crate::codecs::silk::nsq::QUANT_LEVEL_ADJ_Q10;
    let centered = r_q10 - offset_q10;
    let mut q1_q0 = centered >> 10;
    if lambda_q10 > 2048 {
        let rdo_offset = (lambda_q10 >> 1) - 512;
        q1_q0 = if centered > rdo_offset {
            (centered - rdo_offset) >> 10
        } else if centered < -rdo_offset {
            -((rdo_offset - centered) >> 10)
        } else {
            0
        };
    }
    let (q1_q10, q2_q10, rd1_base, rd2_base);
    if q1_q0 > 0 {
        let q1 = (q1_q0 << 10) - QUANT_LEVEL_ADJ_Q10 + offset_q10;
        q1_q10 = q1;
        q2_q10 = q1 + 1024;
        rd1_base = smulbb(q1_q10, lambda_q10);
        rd2_base = smulbb(q2_q10, lambda_q10);
    } else if q1_q0 == 0 {
        q1_q10 = offset_q10;
        q2_q10 = offset_q10 + 1024 - QUANT_LEVEL_ADJ_Q10;
        rd1_base = smulbb(q1_q10.abs(), lambda_q10);
        rd2_base = smulbb(q2_q10, lambda_q10);
    } else if q1_q0 == -1 {
        q2_q10 = offset_q10;
        q1_q10 = q2_q10 - 1024 + QUANT_LEVEL_ADJ_Q10;
        rd1_base = smulbb(-q1_q10, lambda_q10);
        rd2_base = smulbb(q2_q10.abs(), lambda_q10);
    } else {
        let q1 = (q1_q0 << 10) + QUANT_LEVEL_ADJ_Q10 + offset_q10;
        q1_q10 = q1;
        q2_q10 = q1 + 1024;
        rd1_base = smulbb(-q1_q10, lambda_q10);
        rd2_base = smulbb(-q2_q10, lambda_q10);
    }
    let rr1 = r_q10 - q1_q10;
    let rr2 = r_q10 - q2_q10;
    let rd1 = rd1_base + smulbb(rr1, rr1);
    let rd2 = rd2_base + smulbb(rr2, rr2);
    let c1 = (q1_q10, rshift_round(q1_q10, 10), rd1);
    let c2 = (q2_q10, rshift_round(q2_q10, 10), rd2);
    if rd1 <= rd2 {
        [c1, c2]
    } else {
        [c2, c1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, period: f64, amp: f64) -> Vec<i16> {
        (0..len)
            .map(|i| (amp * (2.0 * std::f64::consts::PI * i as f64 / period).sin()) as i16)
            .collect()
    }

    fn default_params(signal_type: SignalType) -> NsqFrameParams {
        let config = FrameConfig::new(Bandwidth::Wide, 20);
        let mut a_q12 = [[0i16; MAX_LPC_ORDER]; 2];
        a_q12[0][0] = 2000;
        a_q12[1][0] = 2000;
        NsqFrameParams {
            config,
            signal_type,
            quant_offset_type: QuantOffsetType::Low,
            a_q12,
            b_q14: [[0, 0, 8192, 0, 0]; MAX_NB_SUBFR],
            pitch_lags: [100; MAX_NB_SUBFR],
            ar_shp_q13: [0; MAX_SHAPE_LPC_ORDER],
            shape_order: 16,
            warping_q16: 15_000,
            gains_q16: [100_000_000; MAX_NB_SUBFR],
            tilt_q14: [-4096; MAX_NB_SUBFR],
            harm_shape_gain_q14: [0; MAX_NB_SUBFR],
            lf_ar_shp_q14: 10_000,
            lf_ma_shp_q14: -12_000,
            lambda_q10: 1024,
            ltp_scale_q14: 15_565,
            seed: 2,
            nlsf_interp_active: false,
        }
    }

    #[test]
    fn test_produces_full_frame() {
        let mut state = NsqState::new();
        let params = default_params(SignalType::Unvoiced);
        let x = tone(320, 29.0, 7000.0);
        let mut pulses = vec![0i16; 320];
        let mut xq = vec![0i16; 320];
        nsq_del_dec_quantize(&mut state, &params, &x, &mut pulses, &mut xq, 4);
        assert!(pulses.iter().any(|&p| p != 0));
        assert!(xq.iter().any(|&v| v != 0));
    }

    #[test]
    fn test_more_states_never_worse_much() {
        let x = tone(320, 29.0, 9000.0);
        let err_for = |n: usize| {
            let mut state = NsqState::new();
            let params = default_params(SignalType::Unvoiced);
            let mut pulses = vec![0i16; 320];
            let mut xq = vec![0i16; 320];
            nsq_del_dec_quantize(&mut state, &params, &x, &mut pulses, &mut xq, n);
            x.iter()
                .zip(xq.iter())
                .map(|(&a, &b)| {
                    let d = a as i64 - b as i64;
                    d * d
                })
                .sum::<i64>()
        };
        let e1 = err_for(1);
        let e4 = err_for(4);
        // Four states search a superset of paths; allow a small tolerance
        // for greedy-vs-delayed commitment differences
        assert!(e4 <= e1 + e1 / 4, "e4 {} e1 {}", e4, e1);
    }

    #[test]
    fn test_voiced_path_runs() {
        let mut state = NsqState::new();
        let params = default_params(SignalType::Voiced);
        let x = tone(320, 100.0, 8000.0);
        let mut pulses = vec![0i16; 320];
        let mut xq = vec![0i16; 320];
        nsq_del_dec_quantize(&mut state, &params, &x, &mut pulses, &mut xq, 4);
        assert!(xq.iter().any(|&v| v != 0));
    }

    #[test]
    fn test_deterministic() {
        let x = tone(320, 23.0, 8000.0);
        let run = || {
            let mut state = NsqState::new();
            let params = default_params(SignalType::Voiced);
            let mut pulses = vec![0i16; 320];
            let mut xq = vec![0i16; 320];
            nsq_del_dec_quantize(&mut state, &params, &x, &mut pulses, &mut xq, 3);
            (pulses, xq)
        };
        assert_eq!(run(), run());
    }
}
