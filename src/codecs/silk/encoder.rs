//! SILK encoder top level.
//!
//! Per internal frame: VAD, LPC/NLSF analysis, pitch search, LTP fit,
//! noise-shaping analysis, gain quantization, NSQ, parameter coding. The
//! packet layer adds per-frame VAD flags, LBRR redundancy for the previous
//! packet, stereo weights and CBR padding.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::codecs::silk::gain::gains_quant;
use crate::codecs::silk::lpc::{lpc_analysis, lpc_analysis_filter};
use crate::codecs::silk::ltp::{
    classify_periodicity, fit_ltp_taps, ltp_scale_index, periodicity_q14,
    quantize_ltp_taps,
};
use crate::codecs::silk::math::lin2log;
use crate::codecs::silk::nlsf::{lpc_to_nlsf, nlsf_interpolate, nlsf_quantize, nlsf_to_lpc};
use crate::codecs::silk::nsq::{nsq_quantize, NsqFrameParams, NsqState};
use crate::codecs::silk::nsq_del_dec::nsq_del_dec_quantize;
use crate::codecs::silk::params::{encode_indices, ParamChain};
use crate::codecs::silk::pitch::pitch_analysis;
use crate::codecs::silk::range::RangeEncoder;
use crate::codecs::silk::resampler::Resampler;
use crate::codecs::silk::shape::noise_shape_analysis;
use crate::codecs::silk::shell::encode_pulses;
use crate::codecs::silk::stereo::{
    encode_stereo_weights, lr_to_ms, stereo_encode_analysis, StereoEncState,
};
use crate::codecs::silk::tables::{LBRR_FLAGS_2_ICDF, LBRR_FLAGS_3_ICDF, LTP_SCALES_Q14};
use crate::codecs::silk::types::*;
use crate::codecs::silk::vad::VadState;
use crate::error::{CodecError, Result};
use crate::types::SilkConfig;

/// Speech-activity floor for arming LBRR, Q8.
const LBRR_SPEECH_ACTIVITY_THRES_Q8: i32 = 77;
/// Smoothing shift for the LBRR bit-cost tracker.
const LBRR_RATE_SMOOTH_SHIFT: i32 = 4;

/// Shadow copy of one frame for redundant transmission.
#[derive(Clone)]
pub enum LbrrSlot {
    /// No redundancy stored for this frame.
    Empty,
    /// Stored redundant frame.
    Populated {
        /// Side info with boosted gains.
        indices: SideInfoIndices,
        /// Excitation re-quantized at the boosted gains.
        pulses: [i16; MAX_FRAME_LENGTH],
    },
}

/// Per-channel encoder state.
struct ChannelEncoder {
    cfg: FrameConfig,
    resampler: Resampler,
    /// Input at the internal rate, LTP history then the current frame.
    x_buf: [i16; LTP_BUF],
    prev_nlsf_q15: [i16; MAX_LPC_ORDER],
    prev_signal_type: SignalType,
    nsq: NsqState,
    vad: VadState,
    chain: ParamChain,
    prev_gain_index: i8,
    first_frame_after_reset: bool,
    /// Shadow slots written this packet, emitted in the next one.
    lbrr_next: [LbrrSlot; MAX_FRAMES_PER_PACKET],
    /// Slots carried over from the previous packet, ready for emission.
    lbrr_ready: [LbrrSlot; MAX_FRAMES_PER_PACKET],
    /// Parameter chain for LBRR emission.
    lbrr_chain: ParamChain,
    /// Gain index chain threaded through this packet's LBRR frames.
    lbrr_gain_prev_ind: i8,
    /// Whether the previous frame of this packet produced an LBRR slot.
    lbrr_prev_coded: bool,
}

const LTP_BUF: usize = LTP_MEM_LENGTH_MS * MAX_FS_KHZ + MAX_FRAME_LENGTH;

impl ChannelEncoder {
    fn new(cfg: FrameConfig, fs_api_hz: u32) -> Result<Self> {
        Ok(ChannelEncoder {
            cfg,
            resampler: Resampler::new(fs_api_hz, cfg.bandwidth.fs_hz())?,
            x_buf: [0; LTP_BUF],
            prev_nlsf_q15: {
                let mut n = [0i16; MAX_LPC_ORDER];
                for (i, v) in n.iter_mut().enumerate().take(cfg.lpc_order) {
                    *v = ((i + 1) * 32_768 / (cfg.lpc_order + 1)) as i16;
                }
                n
            },
            prev_signal_type: SignalType::Inactive,
            nsq: NsqState::new(),
            vad: VadState::new(),
            chain: ParamChain::default(),
            prev_gain_index: 0,
            first_frame_after_reset: true,
            lbrr_next: [LbrrSlot::Empty, LbrrSlot::Empty, LbrrSlot::Empty],
            lbrr_ready: [LbrrSlot::Empty, LbrrSlot::Empty, LbrrSlot::Empty],
            lbrr_chain: ParamChain::default(),
            lbrr_gain_prev_ind: 0,
            lbrr_prev_coded: false,
        })
    }

    /// Analyze and code one internal frame into the range encoder.
    #[allow(clippy::too_many_arguments)]
    fn encode_frame(
        &mut self,
        enc: &mut RangeEncoder,
        x: &[i16],
        vad_flag: bool,
        activity_q8: i32,
        mode: CodingMode,
        snr_db_q7: i32,
        coding_quality_q14: i32,
        complexity: i32,
        packet_loss_perc: i32,
        frame_seed: i32,
        lbrr_enabled: bool,
        frame_in_packet: usize,
    ) {
        let cfg = self.cfg;
        let frame_length = cfg.frame_length;
        let ltp_mem = cfg.ltp_mem_length;
        debug_assert_eq!(x.len(), frame_length);
        self.x_buf[ltp_mem..ltp_mem + frame_length].copy_from_slice(x);

        // Short-term analysis on the windowed current frame
        let mut a_q12 = [0i16; MAX_LPC_ORDER];
        let inv_gain_q30 = lpc_analysis(
            &self.x_buf[ltp_mem..ltp_mem + frame_length],
            cfg.lpc_order,
            cfg.subfr_length / 2,
            &mut a_q12[..cfg.lpc_order],
        );
        let pred_gain_db_q7 = lin2log((1i32 << 30) / inv_gain_q30.max(1));

        // Whitened signal over history plus frame for pitch and LTP
        let mut res = [0i16; LTP_BUF];
        lpc_analysis_filter(
            &mut res[..ltp_mem + frame_length],
            &self.x_buf[..ltp_mem + frame_length],
            &a_q12[..cfg.lpc_order],
        );

        // Classification
        let mut indices = SideInfoIndices::default();
        let mut pitch = None;
        if vad_flag {
            pitch = pitch_analysis(
                &res[..ltp_mem + frame_length],
                ltp_mem,
                cfg.bandwidth,
                cfg.nb_subfr,
                activity_q8,
                self.prev_signal_type,
                pred_gain_db_q7,
                ((10 - complexity) * 82).max(0),
            );
            indices.signal_type = if pitch.is_some() {
                SignalType::Voiced
            } else {
                SignalType::Unvoiced
            };
        }

        // NLSF quantization with optional interpolation
        let mut nlsf_q15 = [0i16; MAX_LPC_ORDER];
        if !lpc_to_nlsf(&mut nlsf_q15[..cfg.lpc_order], &a_q12[..cfg.lpc_order]) {
            nlsf_q15[..cfg.lpc_order].copy_from_slice(&self.prev_nlsf_q15[..cfg.lpc_order]);
        }
        let cb = if cfg.bandwidth == Bandwidth::Wide {
            &crate::codecs::silk::tables::NLSF_CB_WB
        } else {
            &crate::codecs::silk::tables::NLSF_CB_NB_MB
        };
        nlsf_quantize(
            &mut nlsf_q15[..cfg.lpc_order],
            &mut indices.nlsf_indices[..cfg.lpc_order + 1],
            cb,
        );
        indices.nlsf_interp_q2 = if cfg.nb_subfr == MAX_NB_SUBFR && !self.first_frame_after_reset {
            let mut dist = 0i32;
            for i in 0..cfg.lpc_order {
                dist += (nlsf_q15[i] as i32 - self.prev_nlsf_q15[i] as i32).abs();
            }
            if dist < 4000 {
                2
            } else {
                4
            }
        } else {
            4
        };
        let interp_active = indices.nlsf_interp_q2 < 4;
        // Coefficients for the two frame halves
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
        } else {
            let mut a_from_q = [0i16; MAX_LPC_ORDER];
            nlsf_to_lpc(&mut a_from_q[..cfg.lpc_order], &nlsf_q15[..cfg.lpc_order]);
            a_half[0] = a_from_q;
        }
        {
            let mut a_from_q = [0i16; MAX_LPC_ORDER];
            nlsf_to_lpc(&mut a_from_q[..cfg.lpc_order], &nlsf_q15[..cfg.lpc_order]);
            a_half[1] = a_from_q;
        }

        // LTP analysis on voiced frames
        let mut b_q14 = [[0i16; LTP_ORDER]; MAX_NB_SUBFR];
        let mut pitch_lags = [0i32; MAX_NB_SUBFR];
        let mut per_q14 = 0i32;
        if let Some(p) = pitch {
            pitch_lags = p.lags;
            indices.lag_index = p.lag_index;
            indices.contour_index = p.contour_index;
            let offsets: Vec<usize> = (0..cfg.nb_subfr)
                .map(|s| ltp_mem + s * cfg.subfr_length)
                .collect();
            per_q14 = periodicity_q14(
                &res[..ltp_mem + frame_length],
                &offsets,
                cfg.subfr_length,
                &pitch_lags[..cfg.nb_subfr],
            );
            indices.per_index = classify_periodicity(per_q14);
            let mut taps = [[0i32; LTP_ORDER]; MAX_NB_SUBFR];
            for s in 0..cfg.nb_subfr {
                taps[s] = fit_ltp_taps(
                    &res[..ltp_mem + frame_length],
                    ltp_mem + s * cfg.subfr_length,
                    cfg.subfr_length,
                    pitch_lags[s],
                );
            }
            let (bq, cb_ix) = quantize_ltp_taps(&taps[..cfg.nb_subfr], indices.per_index);
            b_q14 = bq;
            indices.ltp_index = cb_ix;
            indices.ltp_scale_index =
                ltp_scale_index(packet_loss_perc, mode == CodingMode::Conditional);
        }

        // Noise shaping analysis
        let shape_order = if cfg.bandwidth == Bandwidth::Wide && complexity >= 6 {
            24
        } else {
            16
        };
        let shape = noise_shape_analysis(
            &self.x_buf[ltp_mem..ltp_mem + frame_length],
            &res[ltp_mem..ltp_mem + frame_length],
            cfg.nb_subfr,
            cfg.subfr_length,
            cfg.fs_khz,
            shape_order,
            indices.signal_type,
            per_q14,
            activity_q8,
            snr_db_q7,
            coding_quality_q14,
        );
        indices.quant_offset_type = shape.quant_offset_type;

        // Gain quantization
        let mut gains_q16 = shape.gains_q16;
        gains_quant(
            &mut indices.gain_indices[..cfg.nb_subfr],
            &mut gains_q16[..cfg.nb_subfr],
            &mut self.prev_gain_index,
            mode == CodingMode::Conditional,
        );

        // Quantize the excitation
        indices.seed = frame_seed as i8 & 3;
        let mut nsq_params = NsqFrameParams {
            config: cfg,
            signal_type: indices.signal_type,
            quant_offset_type: indices.quant_offset_type,
            a_q12: a_half,
            b_q14,
            pitch_lags,
            ar_shp_q13: shape.ar_q13,
            shape_order: shape.shape_order,
            warping_q16: shape.warping_q16,
            gains_q16,
            tilt_q14: shape.tilt_q14,
            harm_shape_gain_q14: shape.harm_shape_gain_q14,
            lf_ar_shp_q14: shape.lf_ar_shp_q14,
            lf_ma_shp_q14: shape.lf_ma_shp_q14,
            lambda_q10: shape.lambda_q10,
            ltp_scale_q14: LTP_SCALES_Q14[indices.ltp_scale_index as usize] as i32,
            seed: indices.seed as i32,
            nlsf_interp_active: interp_active,
        };
        let mut pulses = [0i16; MAX_FRAME_LENGTH];
        let mut xq = [0i16; MAX_FRAME_LENGTH];
        let n_states = n_states_delayed_decision(complexity, indices.signal_type);
        if n_states > 1 {
            let winner_seed = nsq_del_dec_quantize(
                &mut self.nsq,
                &nsq_params,
                x,
                &mut pulses[..frame_length],
                &mut xq[..frame_length],
                n_states,
            );
            indices.seed = winner_seed as i8 & 3;
        } else {
            nsq_quantize(
                &mut self.nsq,
                &nsq_params,
                x,
                &mut pulses[..frame_length],
                &mut xq[..frame_length],
            );
        }

        // Write side info and excitation
        encode_indices(enc, &indices, &cfg, vad_flag, mode, &mut self.chain);
        encode_pulses(
            enc,
            indices.signal_type,
            indices.quant_offset_type,
            &pulses[..frame_length],
            frame_length,
        );
        trace!(
            signal_type = ?indices.signal_type,
            bits = enc.tell(),
            "frame coded"
        );

        // LBRR shadow: re-quantize with boosted gains for the next packet.
        // The gain indices are quantized against the LBRR-local chain so a
        // conditional LBRR frame emits legal delta symbols.
        self.lbrr_next[frame_in_packet] = LbrrSlot::Empty;
        if lbrr_enabled && activity_q8 > LBRR_SPEECH_ACTIVITY_THRES_Q8 {
            let gain_increase = (7 - packet_loss_perc * 2 / 5).max(2);
            let mut lbrr_indices = indices;
            let mut lbrr_gains = gains_q16;
            for g in lbrr_gains[..cfg.nb_subfr].iter_mut() {
                // One gain index step is ~1.37 dB, or 30 units in the Q7
                // log domain
                *g = crate::codecs::silk::math::log2lin(
                    (crate::codecs::silk::math::lin2log((*g).max(1)) + gain_increase * 30)
                        .min(3967),
                );
            }
            gains_quant(
                &mut lbrr_indices.gain_indices[..cfg.nb_subfr],
                &mut lbrr_gains[..cfg.nb_subfr],
                &mut self.lbrr_gain_prev_ind,
                self.lbrr_prev_coded,
            );
            nsq_params.gains_q16 = lbrr_gains;
            nsq_params.seed = lbrr_indices.seed as i32;
            let mut lbrr_nsq = self.nsq.clone();
            let mut lbrr_pulses = [0i16; MAX_FRAME_LENGTH];
            let mut lbrr_xq = [0i16; MAX_FRAME_LENGTH];
            nsq_quantize(
                &mut lbrr_nsq,
                &nsq_params,
                x,
                &mut lbrr_pulses[..frame_length],
                &mut lbrr_xq[..frame_length],
            );
            self.lbrr_next[frame_in_packet] = LbrrSlot::Populated {
                indices: lbrr_indices,
                pulses: lbrr_pulses,
            };
            self.lbrr_prev_coded = true;
        } else {
            self.lbrr_prev_coded = false;
        }

        // State updates for the next frame
        self.prev_nlsf_q15 = nlsf_q15;
        self.prev_signal_type = indices.signal_type;
        self.first_frame_after_reset = false;
        self.x_buf.copy_within(frame_length..frame_length + ltp_mem, 0);
    }
}

/// Delayed-decision state count by complexity and signal class.
fn n_states_delayed_decision(complexity: i32, signal_type: SignalType) -> usize {
    if complexity < 2 {
        return 1;
    }
    match signal_type {
        SignalType::Voiced => (1 + complexity as usize / 3).min(MAX_DEL_DEC_STATES),
        SignalType::Unvoiced => (1 + complexity as usize / 5).min(2),
        SignalType::Inactive => 1,
    }
}

/// Target SNR in Q7 dB from the bitrate, per bandwidth and frame split.
fn snr_db_q7_from_bitrate(bitrate_bps: u32, bandwidth: Bandwidth, nb_subfr: usize) -> i32 {
    let kbps = (bitrate_bps / 1000) as i32;
    let (base_kbps, base_db, slope_half_db) = match bandwidth {
        Bandwidth::Narrow => (8, 18, 2),
        Bandwidth::Medium => (12, 17, 2),
        Bandwidth::Wide => (16, 16, 1),
    };
    let mut snr_db_q7 = (base_db << 7) + (kbps - base_kbps) * (slope_half_db << 6);
    if nb_subfr == 2 {
        // 10 ms frames carry proportionally more header cost
        snr_db_q7 -= 128;
    }
    snr_db_q7.clamp(8 << 7, 36 << 7)
}

/// SILK encoder, mono or stereo.
pub struct SilkEncoder {
    config: SilkConfig,
    frame_cfg: FrameConfig,
    frames_per_packet: usize,
    channels: Vec<ChannelEncoder>,
    stereo: Option<StereoEncState>,
    frame_counter: u32,
    /// VBR bit reservoir, in bits.
    bit_reservoir: i32,
    /// Smoothed LBRR bits per packet, Q4.
    lbrr_rate_smoothed_q4: i32,
    /// Consecutive inactive frames, for DTX.
    inactive_run: u32,
    /// Range register after the last packet, the implicit checksum.
    final_range: u32,
}

impl SilkEncoder {
    /// Build an encoder; validates the configuration.
    pub fn new(config: SilkConfig) -> Result<Self> {
        config.validate()?;
        let frame_ms_internal = if config.frame_ms >= 20 { 20 } else { 10 };
        let frame_cfg = FrameConfig::new(config.bandwidth, frame_ms_internal);
        let frames_per_packet = (config.frame_ms as usize).div_ceil(20).max(1);
        let n_ch = if config.stereo { 2 } else { 1 };
        let channels = (0..n_ch)
            .map(|_| ChannelEncoder::new(frame_cfg, config.sample_rate_hz))
            .collect::<Result<Vec<_>>>()?;
        Ok(SilkEncoder {
            stereo: config.stereo.then(|| StereoEncState::new(config.complexity_stereo)),
            config,
            frame_cfg,
            frames_per_packet,
            channels,
            frame_counter: 0,
            bit_reservoir: 0,
            lbrr_rate_smoothed_q4: 0,
            inactive_run: 0,
            final_range: 0,
        })
    }

    /// Range register after the last encoded packet; a conforming decoder
    /// ends the same packet with an identical value.
    pub fn final_range(&self) -> u32 {
        self.final_range
    }

    /// Samples per channel expected by [`encode`](Self::encode).
    pub fn frame_size(&self) -> usize {
        self.config.sample_rate_hz as usize * self.config.frame_ms as usize / 1000
    }

    /// Whether LBRR is armed for the current conditions.
    fn lbrr_active(&self) -> bool {
        self.config.lbrr_enabled
            || self.config.packet_loss_perc >= 10
    }

    /// Encode one frame of PCM (interleaved when stereo) into a payload.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<Bytes> {
        let expected = self.frame_size() * self.channels.len();
        if pcm.len() != expected {
            return Err(CodecError::InvalidFrameSize {
                expected,
                actual: pcm.len(),
            });
        }
        let n_ch = self.channels.len();
        let api_per_ch = self.frame_size();

        // Deinterleave and mix to mid/side
        let mut ch_pcm: Vec<Vec<i16>> = vec![vec![0i16; api_per_ch]; n_ch];
        if n_ch == 2 {
            let mut left = vec![0i16; api_per_ch];
            let mut right = vec![0i16; api_per_ch];
            for i in 0..api_per_ch {
                left[i] = pcm[2 * i];
                right[i] = pcm[2 * i + 1];
            }
            let mut mid = vec![0i16; api_per_ch];
            let mut side = vec![0i16; api_per_ch];
            lr_to_ms(&left, &right, &mut mid, &mut side);
            ch_pcm[0] = mid;
            ch_pcm[1] = side;
        } else {
            ch_pcm[0].copy_from_slice(pcm);
        }

        // Resample each channel to the internal rate
        let internal_per_ch = self.frame_cfg.frame_length * self.frames_per_packet;
        let mut internal: Vec<Vec<i16>> = Vec::with_capacity(n_ch);
        for (ch, enc_ch) in self.channels.iter_mut().enumerate() {
            let mut out = vec![0i16; internal_per_ch];
            enc_ch.resampler.process(&ch_pcm[ch], &mut out);
            internal.push(out);
        }

        // Stereo prediction on the internal-rate signals, per packet
        let mut stereo_weights = None;
        let mut mid_only = false;
        if let Some(st) = self.stereo.as_mut() {
            let (mid_sig, side_sig) = {
                let (a, b) = internal.split_at_mut(1);
                (&a[0], &mut b[0])
            };
            let (w, m_only) = stereo_encode_analysis(st, mid_sig, side_sig);
            stereo_weights = Some(w);
            mid_only = m_only;
        }

        // Per-frame VAD over internal frames
        let frame_len = self.frame_cfg.frame_length;
        let mut vad_flags = vec![[false; MAX_FRAMES_PER_PACKET]; n_ch];
        let mut activities = vec![[0i32; MAX_FRAMES_PER_PACKET]; n_ch];
        for ch in 0..n_ch {
            for f in 0..self.frames_per_packet {
                let seg = &internal[ch][f * frame_len..(f + 1) * frame_len];
                let (act, active) = self.channels[ch].vad.process(seg);
                vad_flags[ch][f] = active;
                activities[ch][f] = act;
            }
        }

        // DTX: sustained inactivity produces an empty payload
        let any_active = vad_flags
            .iter()
            .any(|per_ch| per_ch[..self.frames_per_packet].iter().any(|&v| v));
        if self.config.use_dtx {
            if any_active {
                self.inactive_run = 0;
            } else {
                self.inactive_run += 1;
                if self.inactive_run > 2 {
                    self.frame_counter += self.frames_per_packet as u32;
                    debug!("dtx: empty payload");
                    return Ok(Bytes::new());
                }
            }
        }

        let mut enc = RangeEncoder::new();

        // Header: VAD flags then LBRR presence, per channel
        let lbrr_on = self.lbrr_active();
        let mut lbrr_present = vec![false; n_ch];
        for ch in 0..n_ch {
            for f in 0..self.frames_per_packet {
                enc.encode_bit_logp(vad_flags[ch][f], 1);
            }
            let present = lbrr_on
                && self.channels[ch].lbrr_ready[..self.frames_per_packet]
                    .iter()
                    .any(|s| matches!(s, LbrrSlot::Populated { .. }));
            lbrr_present[ch] = present;
            enc.encode_bit_logp(present, 1);
        }

        // LBRR flags and frames
        let lbrr_start_bits = enc.tell();
        for ch in 0..n_ch {
            if !lbrr_present[ch] {
                continue;
            }
            let flags: Vec<bool> = (0..self.frames_per_packet)
                .map(|f| matches!(self.channels[ch].lbrr_ready[f], LbrrSlot::Populated { .. }))
                .collect();
            match self.frames_per_packet {
                1 => {}
                2 => {
                    let sym = (flags[0] as usize) | ((flags[1] as usize) << 1);
                    enc.encode_icdf(sym - 1, LBRR_FLAGS_2_ICDF, 8);
                }
                _ => {
                    let sym = (flags[0] as usize)
                        | ((flags[1] as usize) << 1)
                        | ((flags[2] as usize) << 2);
                    enc.encode_icdf(sym - 1, LBRR_FLAGS_3_ICDF, 8);
                }
            }
            // Emit flagged frames with LBRR-local conditional rules
            self.channels[ch].lbrr_chain = ParamChain::default();
            let mut prev_coded = false;
            for f in 0..self.frames_per_packet {
                let slot = self.channels[ch].lbrr_ready[f].clone();
                if let LbrrSlot::Populated { indices, pulses } = slot {
                    let mode = if prev_coded {
                        CodingMode::Conditional
                    } else {
                        CodingMode::Independent
                    };
                    let mut chain = self.channels[ch].lbrr_chain;
                    encode_indices(&mut enc, &indices, &self.frame_cfg, true, mode, &mut chain);
                    self.channels[ch].lbrr_chain = chain;
                    encode_pulses(
                        &mut enc,
                        indices.signal_type,
                        indices.quant_offset_type,
                        &pulses[..frame_len],
                        frame_len,
                    );
                    prev_coded = true;
                }
            }
        }
        let lbrr_bits = (enc.tell() - lbrr_start_bits) as i32;
        self.lbrr_rate_smoothed_q4 +=
            ((lbrr_bits << 4) - self.lbrr_rate_smoothed_q4) >> LBRR_RATE_SMOOTH_SHIFT;

        // Rate control
        let mut snr_db_q7 = snr_db_q7_from_bitrate(
            self.config.bitrate_bps,
            self.config.bandwidth,
            self.frame_cfg.nb_subfr,
        );
        let target_bits = (self.config.bitrate_bps as i32 * self.config.frame_ms as i32) / 1000;
        if self.config.vbr {
            // A full reservoir buys a higher SNR target
            snr_db_q7 += (self.bit_reservoir / target_bits.max(1)).clamp(-4, 4) * 128;
        }
        let coding_quality_q14 = ((snr_db_q7 - (14 << 7)) * 8).clamp(0, 16_384);

        // Regular frames, channel-interleaved per frame index. The LBRR
        // shadow chain restarts with each packet.
        for ch in self.channels.iter_mut() {
            ch.lbrr_gain_prev_ind = 0;
            ch.lbrr_prev_coded = false;
        }
        for f in 0..self.frames_per_packet {
            if let (Some(w), 2) = (stereo_weights, n_ch) {
                encode_stereo_weights(&mut enc, w, mid_only);
            }
            for ch in 0..n_ch {
                if ch == 1 && mid_only {
                    self.channels[ch].lbrr_next[f] = LbrrSlot::Empty;
                    continue;
                }
                let mode = if f == 0 {
                    CodingMode::Independent
                } else {
                    CodingMode::Conditional
                };
                let seg = internal[ch][f * frame_len..(f + 1) * frame_len].to_vec();
                let seed = (self.frame_counter + f as u32) as i32;
                self.channels[ch].encode_frame(
                    &mut enc,
                    &seg,
                    vad_flags[ch][f],
                    activities[ch][f],
                    mode,
                    snr_db_q7,
                    coding_quality_q14,
                    self.config.complexity,
                    self.config.packet_loss_perc,
                    seed,
                    lbrr_on,
                    f,
                );
            }
        }
        self.frame_counter += self.frames_per_packet as u32;

        // Rotate LBRR shadows towards the next packet
        for ch in self.channels.iter_mut() {
            ch.lbrr_ready = ch.lbrr_next.clone();
            ch.lbrr_next = [LbrrSlot::Empty, LbrrSlot::Empty, LbrrSlot::Empty];
        }

        let actual_bits = enc.tell() as i32;
        self.bit_reservoir = (self.bit_reservoir + target_bits - actual_bits)
            .clamp(-4 * target_bits, 4 * target_bits);
        self.final_range = enc.range();

        let mut payload = enc.finish();
        if !self.config.vbr {
            // CBR: pad to the byte target; the range decoder ignores the tail
            let target_bytes = (target_bits as usize).div_ceil(8);
            while payload.len() < target_bytes {
                payload.push(0);
            }
        }
        debug!(
            bytes = payload.len(),
            bits = actual_bits,
            reservoir = self.bit_reservoir,
            "packet encoded"
        );
        Ok(Bytes::from(payload))
    }

    /// Reset all stream state, keeping the configuration.
    pub fn reset(&mut self) -> Result<()> {
        let cfg = self.frame_cfg;
        for ch in self.channels.iter_mut() {
            *ch = ChannelEncoder::new(cfg, self.config.sample_rate_hz)?;
        }
        if let Some(st) = self.stereo.as_mut() {
            st.reset();
        }
        self.frame_counter = 0;
        self.bit_reservoir = 0;
        self.inactive_run = 0;
        Ok(())
    }
}
