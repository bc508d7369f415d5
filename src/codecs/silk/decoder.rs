//! SILK decoder top level.
//!
//! Frame-by-frame parameter decode, excitation reconstruction, LTP and LPC
//! synthesis, loss concealment with comfort noise and glue, LBRR recovery,
//! resampling to 48 kHz and stereo unmixing.

use tracing::{debug, warn};

use crate::codecs::silk::cng::CngState;
use crate::codecs::silk::gain::gains_dequant;
use crate::codecs::silk::lpc::lpc_analysis_filter;
use crate::codecs::silk::ltp::dequant_ltp_taps;
use crate::codecs::silk::math::*;
use crate::codecs::silk::nlsf::{nlsf_dequant, nlsf_interpolate, nlsf_to_lpc};
use crate::codecs::silk::nsq::{
    offset_q10, NsqFrameParams, NsqState, NSQ_LPC_BUF_LENGTH, QUANT_LEVEL_ADJ_Q10,
};
use crate::codecs::silk::params::{decode_indices, ParamChain};
use crate::codecs::silk::pitch::{contour_to_lags, index_to_lag};
use crate::codecs::silk::plc::PlcState;
use crate::codecs::silk::range::RangeDecoder;
use crate::codecs::silk::resampler::Resampler;
use crate::codecs::silk::shell::decode_pulses;
use crate::codecs::silk::stereo::{decode_stereo_weights, ms_to_lr, stereo_apply_prediction};
use crate::codecs::silk::tables::{
    LBRR_FLAGS_2_ICDF, LBRR_FLAGS_3_ICDF, LTP_SCALES_Q14, NLSF_CB_NB_MB, NLSF_CB_WB,
};
use crate::codecs::silk::types::*;
use crate::error::{CodecError, Result};

/// Excitation reconstruction and synthesis of one frame; the exact inverse
/// of the quantizer's reconstruction path, sharing its state layout.
fn decode_core(
    state: &mut NsqState,
    params: &NsqFrameParams,
    pulses: &[i16],
    xq_out: &mut [i16],
    exc_out: &mut [i32],
) {
    let cfg = &params.config;
    let frame_length = cfg.frame_length;
    let subfr_length = cfg.subfr_length;
    let ltp_mem = cfg.ltp_mem_length;
    let voiced = params.signal_type == SignalType::Voiced;
    let offset_q10 = offset_q10(params.signal_type, params.quant_offset_type);

    state.s_ltp_buf_idx = ltp_mem;
    let mut s_ltp_whitened = [0i16; 2 * MAX_FRAME_LENGTH];
    let mut lag = state.lag_prev;
    let mut seed = params.seed;

    for s in 0..cfg.nb_subfr {
        let a_q12 = &params.a_q12[if s < cfg.nb_subfr / 2 { 0 } else { 1 }];
        let gain_q16 = params.gains_q16[s].max(1);
        let gain_q10 = gain_q16 >> 6;

        if voiced {
            lag = params.pitch_lags[s];
            if s == 0 || (s == 2 && params.nlsf_interp_active) {
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
            }
        }

        let inv_gain_q31 = inverse32_varq(gain_q16, 47);
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
                if voiced {
                    let start =
                        (state.s_ltp_buf_idx as i32 - lag - (LTP_ORDER as i32) / 2).max(0) as usize;
                    for i in start..state.s_ltp_buf_idx {
                        state.s_ltp_q15[i] = smulww(gain_adj_q16, state.s_ltp_q15[i]);
                    }
                }
                for i in 0..NSQ_LPC_BUF_LENGTH {
                    state.s_lpc_q14[i] = smulww(gain_adj_q16, state.s_lpc_q14[i]);
                }
            }
        }
        state.prev_gain_q16 = gain_q16;

        let mut pred_lag_idx =
            (state.s_ltp_buf_idx as i32 - lag + (LTP_ORDER as i32) / 2) as usize;
        for i in 0..subfr_length {
            let n = s * subfr_length + i;
            seed = rand_lcg(seed);

            // Excitation from the coded pulse
            let pulse = pulses[n] as i32;
            let mut exc_q14 = pulse << 14;
            if exc_q14 > 0 {
                exc_q14 -= QUANT_LEVEL_ADJ_Q10 << 4;
            } else if exc_q14 < 0 {
                exc_q14 += QUANT_LEVEL_ADJ_Q10 << 4;
            }
            exc_q14 += offset_q10 << 4;
            if seed < 0 {
                exc_q14 = -exc_q14;
            }
            seed = seed.wrapping_add(pulse);

            // Predictions over the synthesis state
            let lpc_base = NSQ_LPC_BUF_LENGTH + i;
            let mut lpc_pred_q10 = (cfg.lpc_order as i32) >> 1;
            for (k, &a) in a_q12[..cfg.lpc_order].iter().enumerate() {
                lpc_pred_q10 = smlawb(lpc_pred_q10, state.s_lpc_q14[lpc_base - 1 - k], a as i32);
            }
            let mut ltp_pred_q13 = 0i32;
            if voiced {
                ltp_pred_q13 = 2;
                for (k, &b) in params.b_q14[s].iter().enumerate() {
                    ltp_pred_q13 =
                        smlawb(ltp_pred_q13, state.s_ltp_q15[pred_lag_idx - k], b as i32);
                }
                pred_lag_idx += 1;
            }

            let lpc_exc_q14 = exc_q14 + (ltp_pred_q13 << 1);
            let xq_q14 = lpc_exc_q14 + (lpc_pred_q10 << 4);
            let sample = sat16(rshift_round(smulww(xq_q14, gain_q10), 8));
            xq_out[n] = sample;
            exc_out[n] = exc_q14;
            state.xq[ltp_mem + n] = sample;
            state.s_lpc_q14[lpc_base] = xq_q14;
            state.s_ltp_q15[state.s_ltp_buf_idx] = lpc_exc_q14 << 1;
            state.s_ltp_buf_idx += 1;
        }
        state
            .s_lpc_q14
            .copy_within(subfr_length..subfr_length + NSQ_LPC_BUF_LENGTH, 0);
    }

    state.lag_prev = params.pitch_lags[cfg.nb_subfr - 1];
    state.xq.copy_within(frame_length..frame_length + ltp_mem, 0);
}

/// Per-channel decoder state.
struct ChannelDecoder {
    cfg: FrameConfig,
    synth: NsqState,
    prev_nlsf_q15: [i16; MAX_LPC_ORDER],
    prev_signal_type: SignalType,
    chain: ParamChain,
    prev_gain_index: i8,
    first_frame_after_reset: bool,
    plc: PlcState,
    cng: CngState,
    /// Excitation of the last good frame for concealment.
    exc_hist_q14: [i32; MAX_FRAME_LENGTH],
    /// LPC memory dedicated to the concealment synthesis.
    plc_lpc_state_q14: [i32; MAX_LPC_ORDER],
}

impl ChannelDecoder {
    fn new(cfg: FrameConfig) -> Self {
        let mut prev_nlsf_q15 = [0i16; MAX_LPC_ORDER];
        for (i, v) in prev_nlsf_q15.iter_mut().enumerate().take(cfg.lpc_order) {
            *v = ((i + 1) * 32_768 / (cfg.lpc_order + 1)) as i16;
        }
        ChannelDecoder {
            cfg,
            synth: NsqState::new(),
            prev_nlsf_q15,
            prev_signal_type: SignalType::Inactive,
            chain: ParamChain::default(),
            prev_gain_index: 0,
            first_frame_after_reset: true,
            plc: PlcState::new(),
            cng: CngState::new(cfg.lpc_order),
            exc_hist_q14: [0; MAX_FRAME_LENGTH],
            plc_lpc_state_q14: [0; MAX_LPC_ORDER],
        }
    }

    /// Decode one coded frame from the range decoder into `out`.
    fn decode_frame(
        &mut self,
        dec: &mut RangeDecoder<'_>,
        vad_flag: bool,
        mode: CodingMode,
        out: &mut [i16],
    ) -> Result<()> {
        let cfg = self.cfg;
        let indices = decode_indices(dec, &cfg, vad_flag, mode, &mut self.chain);
        let mut pulses = [0i16; MAX_FRAME_LENGTH];
        decode_pulses(
            dec,
            indices.signal_type,
            indices.quant_offset_type,
            &mut pulses[..cfg.frame_length],
            cfg.frame_length,
        );
        if dec.tell() > dec.storage_bits() + 32 {
            return Err(CodecError::DecodingFailed {
                reason: "range decoder consumed past payload end".into(),
            });
        }

        // Gains
        let mut gains_q16 = [0i32; MAX_NB_SUBFR];
        gains_dequant(
            &mut gains_q16[..cfg.nb_subfr],
            &indices.gain_indices[..cfg.nb_subfr],
            &mut self.prev_gain_index,
            mode == CodingMode::Conditional,
        );

        // NLSF to prediction coefficients, with interpolation
        let cb = if cfg.bandwidth == Bandwidth::Wide {
            &NLSF_CB_WB
        } else {
            &NLSF_CB_NB_MB
        };
        let mut nlsf_q15 = [0i16; MAX_LPC_ORDER];
        nlsf_dequant(
            &mut nlsf_q15[..cfg.lpc_order],
            &indices.nlsf_indices[..cfg.lpc_order + 1],
            cb,
        );
        let interp_active = indices.nlsf_interp_q2 < 4 && !self.first_frame_after_reset;
        let mut a_half = [[0i16; MAX_LPC_ORDER]; 2];
        if interp_active {
            let mut nlsf_i = [0i16; MAX_LPC_ORDER];
            nlsf_interpolate(
                &mut nlsf_i[..cfg.lpc_order],
                &self.prev_nlsf_q15[..cfg.lpc_order],
                &nlsf_q15[..cfg.lpc_order],
                indices.nlsf_interp_q2 as i32,
            );
            nlsf_to_lpc(&mut a_half[0][..cfg.lpc_order], &nlsf_i[..cfg.lpc_order]);
        }
        {
            let mut a_cur = [0i16; MAX_LPC_ORDER];
            nlsf_to_lpc(&mut a_cur[..cfg.lpc_order], &nlsf_q15[..cfg.lpc_order]);
            if !interp_active {
                a_half[0] = a_cur;
            }
            a_half[1] = a_cur;
        }

        // Pitch and LTP
        let mut pitch_lags = [0i32; MAX_NB_SUBFR];
        let mut b_q14 = [[0i16; LTP_ORDER]; MAX_NB_SUBFR];
        if indices.signal_type == SignalType::Voiced {
            let lag = index_to_lag(indices.lag_index, cfg.bandwidth);
            pitch_lags = contour_to_lags(
                lag,
                indices.contour_index as usize,
                cfg.bandwidth,
                cfg.nb_subfr,
            );
            b_q14 = dequant_ltp_taps(indices.per_index, &indices.ltp_index, cfg.nb_subfr);
        }

        // Synthesis
        let params = NsqFrameParams {
            config: cfg,
            signal_type: indices.signal_type,
            quant_offset_type: indices.quant_offset_type,
            a_q12: a_half,
            b_q14,
            pitch_lags,
            ar_shp_q13: [0; MAX_SHAPE_LPC_ORDER],
            shape_order: 16,
            warping_q16: 0,
            gains_q16,
            tilt_q14: [0; MAX_NB_SUBFR],
            harm_shape_gain_q14: [0; MAX_NB_SUBFR],
            lf_ar_shp_q14: 0,
            lf_ma_shp_q14: 0,
            lambda_q10: 0,
            ltp_scale_q14: LTP_SCALES_Q14[indices.ltp_scale_index as usize] as i32,
            seed: indices.seed as i32,
            nlsf_interp_active: interp_active,
        };
        let mut exc = [0i32; MAX_FRAME_LENGTH];
        decode_core(
            &mut self.synth,
            &params,
            &pulses[..cfg.frame_length],
            out,
            &mut exc[..cfg.frame_length],
        );

        // Concealment bookkeeping on the good frame
        self.exc_hist_q14[..cfg.frame_length].copy_from_slice(&exc[..cfg.frame_length]);
        self.plc.update_from_good_frame(
            indices.signal_type,
            &gains_q16[..cfg.nb_subfr],
            pitch_lags[cfg.nb_subfr - 1],
            &b_q14[cfg.nb_subfr - 1],
            &a_half[1][..cfg.lpc_order],
        );
        if indices.signal_type == SignalType::Inactive {
            self.cng.update_from_inactive_frame(
                &nlsf_q15[..cfg.lpc_order],
                &gains_q16[..cfg.nb_subfr],
                &exc[..cfg.frame_length],
            );
        }

        self.prev_nlsf_q15 = nlsf_q15;
        self.prev_signal_type = indices.signal_type;
        self.first_frame_after_reset = false;
        Ok(())
    }

    /// Conceal one lost frame into `out`.
    fn conceal_frame(&mut self, out: &mut [i16]) {
        self.plc.conceal_frame(
            out,
            &mut self.exc_hist_q14,
            &mut self.plc_lpc_state_q14,
            self.cfg.lpc_order,
        );
        let rand_scale = self.plc.rand_scale_q14 as i32;
        self.cng.add_comfort_noise(out, rand_scale);
        // Keep the synthesis history coherent for the next good frame
        let ltp_mem = self.cfg.ltp_mem_length;
        let frame_length = self.cfg.frame_length;
        self.synth.xq[ltp_mem..ltp_mem + frame_length].copy_from_slice(out);
        self.synth
            .xq
            .copy_within(frame_length..frame_length + ltp_mem, 0);
    }
}

/// SILK decoder for a mono or stereo stream.
pub struct SilkDecoder {
    stereo: bool,
    frame_ms: u32,
    bandwidth: Bandwidth,
    channels: Vec<ChannelDecoder>,
    /// One resampler per bandwidth per channel, index `[ch][bw]`.
    resamplers: Vec<[Resampler; 3]>,
    final_range: u32,
    last_frame_lost: bool,
}

impl SilkDecoder {
    /// Build a decoder; `frame_ms` is the packet duration it will be fed.
    pub fn new(bandwidth: Bandwidth, frame_ms: u32, stereo: bool) -> Result<Self> {
        if ![10, 20, 40, 60].contains(&frame_ms) {
            return Err(CodecError::InvalidFrameSize {
                expected: 20,
                actual: frame_ms as usize,
            });
        }
        let n_ch = if stereo { 2 } else { 1 };
        let internal_ms = if frame_ms >= 20 { 20 } else { 10 };
        let cfg = FrameConfig::new(bandwidth, internal_ms);
        let mut resamplers = Vec::with_capacity(n_ch);
        for _ in 0..n_ch {
            resamplers.push([
                Resampler::new(8_000, 48_000)?,
                Resampler::new(12_000, 48_000)?,
                Resampler::new(16_000, 48_000)?,
            ]);
        }
        Ok(SilkDecoder {
            stereo,
            frame_ms,
            bandwidth,
            channels: (0..n_ch).map(|_| ChannelDecoder::new(cfg)).collect(),
            resamplers,
            final_range: 0,
            last_frame_lost: false,
        })
    }

    fn frames_per_packet(&self) -> usize {
        (self.frame_ms as usize).div_ceil(20).max(1)
    }

    fn internal_cfg(&self) -> FrameConfig {
        let internal_ms = if self.frame_ms >= 20 { 20 } else { 10 };
        FrameConfig::new(self.bandwidth, internal_ms)
    }

    /// Output samples per channel at 48 kHz for one packet.
    pub fn output_len_48k(&self) -> usize {
        48_000 / 1000 * self.frame_ms as usize
    }

    /// Final range-register value of the last decode, the implicit frame
    /// checksum for conformance checks.
    pub fn final_range(&self) -> u32 {
        self.final_range
    }

    /// True when the previous packet was concealed.
    pub fn last_frame_lost(&self) -> bool {
        self.last_frame_lost
    }

    /// Switch the internal bandwidth mid-stream; resets the per-channel
    /// synthesis state but carries the resampler hold sample across.
    pub fn set_bandwidth(&mut self, bandwidth: Bandwidth) {
        if bandwidth == self.bandwidth {
            return;
        }
        let old_idx = bandwidth_index(self.bandwidth);
        let new_idx = bandwidth_index(bandwidth);
        self.bandwidth = bandwidth;
        let cfg = self.internal_cfg();
        for (ch, dec) in self.channels.iter_mut().enumerate() {
            *dec = ChannelDecoder::new(cfg);
            let hold = self.resamplers[ch][old_idx].hold_sample();
            self.resamplers[ch][new_idx].reset_keep_hold();
            self.resamplers[ch][new_idx].set_hold_sample(hold);
        }
        debug!(?bandwidth, "decoder bandwidth switched");
    }

    /// Probe a payload for LBRR without consuming it.
    pub fn has_lbrr(&self, payload: &[u8]) -> Result<bool> {
        if payload.is_empty() {
            return Ok(false);
        }
        let mut dec = RangeDecoder::new(payload);
        let n_ch = self.channels.len();
        let frames = self.frames_per_packet();
        let mut any = false;
        for _ in 0..n_ch {
            for _ in 0..frames {
                dec.decode_bit_logp(1);
            }
            if dec.decode_bit_logp(1) {
                any = true;
            }
        }
        Ok(any)
    }

    /// Decode one packet; `None` means the packet was lost and concealment
    /// runs instead. Output is 48 kHz float, interleaved for stereo.
    pub fn decode(&mut self, payload: Option<&[u8]>) -> Result<Vec<f32>> {
        match payload {
            None => self.decode_lost(),
            Some(p) if p.is_empty() => self.decode_dtx(),
            Some(p) => self.decode_packet(p, false),
        }
    }

    /// Recover a lost frame from the LBRR data of the following packet.
    /// The output represents what [`decode`](Self::decode) would have
    /// produced had the lost packet arrived.
    pub fn decode_fec(&mut self, payload: &[u8]) -> Result<Vec<f32>> {
        self.decode_packet(payload, true)
    }

    fn decode_lost(&mut self) -> Result<Vec<f32>> {
        let cfg = self.internal_cfg();
        let frames = self.frames_per_packet();
        let total_internal = cfg.frame_length * frames;
        let mut internal: Vec<Vec<i16>> = Vec::new();
        for dec in self.channels.iter_mut() {
            let mut out = vec![0i16; total_internal];
            for f in 0..frames {
                dec.conceal_frame(&mut out[f * cfg.frame_length..(f + 1) * cfg.frame_length]);
            }
            internal.push(out);
        }
        self.last_frame_lost = true;
        warn!(frames, "packet lost, concealed");
        self.produce_output(internal)
    }

    fn decode_dtx(&mut self) -> Result<Vec<f32>> {
        let cfg = self.internal_cfg();
        let frames = self.frames_per_packet();
        let total_internal = cfg.frame_length * frames;
        let mut internal: Vec<Vec<i16>> = Vec::new();
        for dec in self.channels.iter_mut() {
            let mut out = vec![0i16; total_internal];
            // Comfort noise only; DTX is not a loss
            dec.cng.add_comfort_noise(&mut out, 0);
            internal.push(out);
        }
        self.last_frame_lost = false;
        self.produce_output(internal)
    }

    fn decode_packet(&mut self, payload: &[u8], fec: bool) -> Result<Vec<f32>> {
        crate::utils::validation::validate_payload(payload)?;
        let cfg = self.internal_cfg();
        let frames = self.frames_per_packet();
        let n_ch = self.channels.len();
        let mut dec = RangeDecoder::new(payload);

        // Header flags
        let mut vad_flags = vec![[false; MAX_FRAMES_PER_PACKET]; n_ch];
        let mut lbrr_present = vec![false; n_ch];
        for ch in 0..n_ch {
            for f in 0..frames {
                vad_flags[ch][f] = dec.decode_bit_logp(1);
            }
            lbrr_present[ch] = dec.decode_bit_logp(1);
        }

        // LBRR flags and frames
        let mut lbrr_flags = vec![[false; MAX_FRAMES_PER_PACKET]; n_ch];
        for ch in 0..n_ch {
            if !lbrr_present[ch] {
                continue;
            }
            match frames {
                1 => lbrr_flags[ch][0] = true,
                2 => {
                    let sym = dec.decode_icdf(LBRR_FLAGS_2_ICDF, 8) + 1;
                    lbrr_flags[ch][0] = sym & 1 != 0;
                    lbrr_flags[ch][1] = sym & 2 != 0;
                }
                _ => {
                    let sym = dec.decode_icdf(LBRR_FLAGS_3_ICDF, 8) + 1;
                    for f in 0..3 {
                        lbrr_flags[ch][f] = sym & (1 << f) != 0;
                    }
                }
            }
        }

        let total_internal = cfg.frame_length * frames;
        let mut internal: Vec<Vec<i16>> = vec![vec![0i16; total_internal]; n_ch];

        // LBRR frame data precedes the regular frames
        for ch in 0..n_ch {
            if !lbrr_present[ch] {
                continue;
            }
            let mut prev_coded = false;
            let mut lbrr_chain = ParamChain::default();
            for f in 0..frames {
                if !lbrr_flags[ch][f] {
                    continue;
                }
                let mode = if prev_coded {
                    CodingMode::Conditional
                } else {
                    CodingMode::Independent
                };
                if fec {
                    // Recovery path: run the LBRR frame through the normal
                    // synthesis chain
                    self.channels[ch].decode_frame(
                        &mut dec,
                        true,
                        mode,
                        &mut internal[ch][f * cfg.frame_length..(f + 1) * cfg.frame_length],
                    )?;
                } else {
                    // Regular decode: parse and discard to stay in sync
                    let idx = decode_indices(&mut dec, &cfg, true, mode, &mut lbrr_chain);
                    let mut scratch = [0i16; MAX_FRAME_LENGTH];
                    decode_pulses(
                        &mut dec,
                        idx.signal_type,
                        idx.quant_offset_type,
                        &mut scratch[..cfg.frame_length],
                        cfg.frame_length,
                    );
                }
                prev_coded = true;
            }
        }

        if fec {
            // Frames without LBRR fall back to concealment
            for ch in 0..n_ch {
                for f in 0..frames {
                    if !(lbrr_present[ch] && lbrr_flags[ch][f]) {
                        let range =
                            f * cfg.frame_length..(f + 1) * cfg.frame_length;
                        self.channels[ch].conceal_frame(&mut internal[ch][range]);
                    }
                }
            }
            self.final_range = dec.range();
            self.last_frame_lost = false;
            return self.produce_output(internal);
        }

        // Regular frames
        for f in 0..frames {
            if self.stereo {
                let (weights, mid_only) = decode_stereo_weights(&mut dec);
                let range = f * cfg.frame_length..(f + 1) * cfg.frame_length;
                // Mid first
                let mode = if f == 0 {
                    CodingMode::Independent
                } else {
                    CodingMode::Conditional
                };
                self.channels[0].decode_frame(
                    &mut dec,
                    vad_flags[0][f],
                    mode,
                    &mut internal[0][range.clone()],
                )?;
                if !mid_only {
                    self.channels[1].decode_frame(
                        &mut dec,
                        vad_flags[1][f],
                        mode,
                        &mut internal[1][range.clone()],
                    )?;
                }
                // Undo the mid-to-side prediction
                let (mid_sig, side_sig) = {
                    let (a, b) = internal.split_at_mut(1);
                    (&a[0][range.clone()], &mut b[0][range])
                };
                if !mid_only {
                    let mut side_vec = side_sig.to_vec();
                    stereo_apply_prediction(mid_sig, &mut side_vec, weights);
                    side_sig.copy_from_slice(&side_vec);
                }
            } else {
                let mode = if f == 0 {
                    CodingMode::Independent
                } else {
                    CodingMode::Conditional
                };
                let range = f * cfg.frame_length..(f + 1) * cfg.frame_length;
                self.channels[0].decode_frame(
                    &mut dec,
                    vad_flags[0][f],
                    mode,
                    &mut internal[0][range],
                )?;
            }
        }

        if dec.overread() {
            return Err(CodecError::DecodingFailed {
                reason: "payload over-read".into(),
            });
        }
        self.final_range = dec.range();

        // Glue recovery after loss
        for (ch, dec_ch) in self.channels.iter_mut().enumerate() {
            dec_ch.plc.glue_frame(&mut internal[ch]);
        }
        self.last_frame_lost = false;
        self.produce_output(internal)
    }

    /// Resample to 48 kHz and unmix mid/side into interleaved LR.
    fn produce_output(&mut self, internal: Vec<Vec<i16>>) -> Result<Vec<f32>> {
        let bw_idx = bandwidth_index(self.bandwidth);
        let out_per_ch = self.output_len_48k();
        let n_ch = self.channels.len();
        let mut at_48k: Vec<Vec<i16>> = Vec::with_capacity(n_ch);
        for ch in 0..n_ch {
            let mut out = vec![0i16; out_per_ch];
            self.resamplers[ch][bw_idx].process(&internal[ch], &mut out);
            at_48k.push(out);
        }
        if n_ch == 2 {
            let mut left = vec![0i16; out_per_ch];
            let mut right = vec![0i16; out_per_ch];
            ms_to_lr(&at_48k[0], &at_48k[1], &mut left, &mut right);
            let mut out = vec![0f32; 2 * out_per_ch];
            for i in 0..out_per_ch {
                out[2 * i] = left[i] as f32 / 32_768.0;
                out[2 * i + 1] = right[i] as f32 / 32_768.0;
            }
            Ok(out)
        } else {
            Ok(at_48k[0].iter().map(|&v| v as f32 / 32_768.0).collect())
        }
    }

    /// Reset all stream state.
    pub fn reset(&mut self) {
        let cfg = self.internal_cfg();
        for dec in self.channels.iter_mut() {
            *dec = ChannelDecoder::new(cfg);
        }
        for set in self.resamplers.iter_mut() {
            for r in set.iter_mut() {
                r.reset();
            }
        }
        self.final_range = 0;
        self.last_frame_lost = false;
    }
}

#[inline]
fn bandwidth_index(bw: Bandwidth) -> usize {
    match bw {
        Bandwidth::Narrow => 0,
        Bandwidth::Medium => 1,
        Bandwidth::Wide => 2,
    }
}
