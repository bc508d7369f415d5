//! Side-information codec: the fixed symbol sequence shared by encoder and
//! decoder for one internal frame.
//!
//! Order: frame type, gains, NLSF stage-1/stage-2 (+ interpolation factor
//! on 20 ms frames), pitch lag and contour, LTP class and codebook indices,
//! LTP scale, LCG seed. The excitation follows via the shell coder.
//! Conditional coding applies when the previous internal frame of the same
//! channel exists in this packet and was coded.

use crate::codecs::silk::nlsf::{decode_nlsf_indices, encode_nlsf_indices};
use crate::codecs::silk::pitch::contour_table;
use crate::codecs::silk::range::{RangeDecoder, RangeEncoder};
use crate::codecs::silk::tables::*;
use crate::codecs::silk::types::*;

/// Lag low-part table index for the bandwidth.
#[inline]
fn lag_lo_index(bandwidth: Bandwidth) -> usize {
    match bandwidth {
        Bandwidth::Narrow => 0,
        Bandwidth::Medium => 1,
        Bandwidth::Wide => 2,
    }
}

#[inline]
fn contour_icdf(bandwidth: Bandwidth, nb_subfr: usize) -> &'static [u16] {
    if nb_subfr == 2 {
        PITCH_CONTOUR_2SF_ICDF
    } else if bandwidth == Bandwidth::Wide {
        PITCH_CONTOUR_4SF_WB_ICDF
    } else {
        PITCH_CONTOUR_4SF_NB_ICDF
    }
}

/// Chained decoder-side state the conditional coding rules depend on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamChain {
    /// Log-gain index of the previous subframe.
    pub prev_gain_index: i8,
    /// Lag index of the previous voiced frame, for delta coding.
    pub prev_lag_index: i16,
}

/// Write all side-info symbols for one frame.
pub fn encode_indices(
    enc: &mut RangeEncoder,
    idx: &SideInfoIndices,
    cfg: &FrameConfig,
    vad_flag: bool,
    mode: CodingMode,
    chain: &mut ParamChain,
) {
    // Frame type conditioned on the VAD decision from the packet header
    if vad_flag {
        debug_assert!(idx.signal_type != SignalType::Inactive);
        let sym = (idx.signal_type as usize - 1) * 2 + idx.quant_offset_type as usize;
        enc.encode_icdf(sym, FRAME_TYPE_ACTIVE_ICDF, 8);
    } else {
        debug_assert_eq!(idx.signal_type, SignalType::Inactive);
        enc.encode_icdf(idx.quant_offset_type as usize, FRAME_TYPE_INACTIVE_ICDF, 8);
    }

    // Gains: absolute MSB+LSB on independent frames, deltas everywhere else
    for s in 0..cfg.nb_subfr {
        if s == 0 && mode == CodingMode::Independent {
            let ind = idx.gain_indices[0] as usize;
            enc.encode_icdf(ind >> 3, GAIN_MSB_ICDF[idx.signal_type as usize], 8);
            enc.encode_icdf(ind & 7, GAIN_LSB_ICDF, 8);
        } else {
            enc.encode_icdf(idx.gain_indices[s] as usize, GAIN_DELTA_ICDF, 8);
        }
    }

    // NLSF stage-1 and stage-2
    let cb = if cfg.bandwidth == Bandwidth::Wide {
        &NLSF_CB_WB
    } else {
        &NLSF_CB_NB_MB
    };
    encode_nlsf_indices(
        enc,
        &idx.nlsf_indices[..cfg.lpc_order + 1],
        idx.signal_type,
        cb,
    );
    if cfg.nb_subfr == MAX_NB_SUBFR {
        enc.encode_icdf(idx.nlsf_interp_q2 as usize, NLSF_INTERP_ICDF, 8);
    }

    if idx.signal_type == SignalType::Voiced {
        // Pitch lag: delta against the previous voiced frame when allowed
        let mut absolute = true;
        if mode == CodingMode::Conditional {
            let delta = idx.lag_index as i32 - chain.prev_lag_index as i32;
            if (-7..=7).contains(&delta) {
                enc.encode_icdf((delta + 8) as usize, PITCH_DELTA_ICDF, 8);
                absolute = false;
            } else {
                enc.encode_icdf(0, PITCH_DELTA_ICDF, 8);
            }
        }
        if absolute {
            let lo_size = PITCH_LAG_LO_SIZE[lag_lo_index(cfg.bandwidth)];
            let ind = idx.lag_index as usize;
            enc.encode_icdf(ind / lo_size, PITCH_LAG_HI_ICDF, 8);
            enc.encode_icdf(ind % lo_size, PITCH_LAG_LO_ICDF[lag_lo_index(cfg.bandwidth)], 8);
        }
        chain.prev_lag_index = idx.lag_index;
        enc.encode_icdf(
            idx.contour_index as usize,
            contour_icdf(cfg.bandwidth, cfg.nb_subfr),
            8,
        );

        // LTP: class, per-subframe codebook index, scale on independent
        enc.encode_icdf(idx.per_index as usize, LTP_PER_INDEX_ICDF, 8);
        for s in 0..cfg.nb_subfr {
            enc.encode_icdf(
                idx.ltp_index[s] as usize,
                LTP_GAIN_ICDF[idx.per_index as usize],
                8,
            );
        }
        if mode == CodingMode::Independent {
            enc.encode_icdf(idx.ltp_scale_index as usize, LTP_SCALE_ICDF, 8);
        }
    }

    enc.encode_icdf(idx.seed as usize, LCG_SEED_ICDF, 8);
}

/// Read all side-info symbols for one frame.
pub fn decode_indices(
    dec: &mut RangeDecoder<'_>,
    cfg: &FrameConfig,
    vad_flag: bool,
    mode: CodingMode,
    chain: &mut ParamChain,
) -> SideInfoIndices {
    let mut idx = SideInfoIndices::default();

    if vad_flag {
        let sym = dec.decode_icdf(FRAME_TYPE_ACTIVE_ICDF, 8) as i32;
        idx.signal_type = SignalType::from_ordinal(1 + (sym >> 1));
        idx.quant_offset_type = QuantOffsetType::from_ordinal(sym & 1);
    } else {
        let sym = dec.decode_icdf(FRAME_TYPE_INACTIVE_ICDF, 8) as i32;
        idx.signal_type = SignalType::Inactive;
        idx.quant_offset_type = QuantOffsetType::from_ordinal(sym);
    }

    for s in 0..cfg.nb_subfr {
        if s == 0 && mode == CodingMode::Independent {
            let msb = dec.decode_icdf(GAIN_MSB_ICDF[idx.signal_type as usize], 8);
            let lsb = dec.decode_icdf(GAIN_LSB_ICDF, 8);
            idx.gain_indices[0] = ((msb << 3) | lsb) as i8;
        } else {
            idx.gain_indices[s] = dec.decode_icdf(GAIN_DELTA_ICDF, 8) as i8;
        }
    }

    let cb = if cfg.bandwidth == Bandwidth::Wide {
        &NLSF_CB_WB
    } else {
        &NLSF_CB_NB_MB
    };
    decode_nlsf_indices(
        dec,
        &mut idx.nlsf_indices[..cfg.lpc_order + 1],
        idx.signal_type,
        cb,
    );
    idx.nlsf_interp_q2 = if cfg.nb_subfr == MAX_NB_SUBFR {
        dec.decode_icdf(NLSF_INTERP_ICDF, 8) as i8
    } else {
        4
    };

    if idx.signal_type == SignalType::Voiced {
        let mut absolute = true;
        if mode == CodingMode::Conditional {
            let sym = dec.decode_icdf(PITCH_DELTA_ICDF, 8);
            if sym > 0 {
                idx.lag_index = (chain.prev_lag_index as i32 + sym as i32 - 8) as i16;
                absolute = false;
            }
        }
        if absolute {
            let lo_size = PITCH_LAG_LO_SIZE[lag_lo_index(cfg.bandwidth)];
            let hi = dec.decode_icdf(PITCH_LAG_HI_ICDF, 8);
            let lo = dec.decode_icdf(PITCH_LAG_LO_ICDF[lag_lo_index(cfg.bandwidth)], 8);
            idx.lag_index = (hi * lo_size + lo) as i16;
        }
        chain.prev_lag_index = idx.lag_index;

        let (table, _) = contour_table(cfg.bandwidth, cfg.nb_subfr);
        idx.contour_index = dec
            .decode_icdf(contour_icdf(cfg.bandwidth, cfg.nb_subfr), 8)
            .min(table.len() - 1) as i8;

        idx.per_index = dec.decode_icdf(LTP_PER_INDEX_ICDF, 8).min(2) as i8;
        for s in 0..cfg.nb_subfr {
            idx.ltp_index[s] = dec
                .decode_icdf(LTP_GAIN_ICDF[idx.per_index as usize], 8)
                .min(LTP_NB_CBKS[idx.per_index as usize] - 1) as i8;
        }
        idx.ltp_scale_index = if mode == CodingMode::Independent {
            dec.decode_icdf(LTP_SCALE_ICDF, 8).min(2) as i8
        } else {
            0
        };
    }

    idx.seed = dec.decode_icdf(LCG_SEED_ICDF, 8) as i8;
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(idx: &SideInfoIndices, cfg: &FrameConfig, vad: bool, mode: CodingMode) {
        let mut enc = RangeEncoder::new();
        let mut chain_e = ParamChain {
            prev_lag_index: 50,
            ..Default::default()
        };
        encode_indices(&mut enc, idx, cfg, vad, mode, &mut chain_e);
        let bytes = enc.finish();
        let mut dec = RangeDecoder::new(&bytes);
        let mut chain_d = ParamChain {
            prev_lag_index: 50,
            ..Default::default()
        };
        let got = decode_indices(&mut dec, cfg, vad, mode, &mut chain_d);
        assert_eq!(got.signal_type, idx.signal_type);
        assert_eq!(got.quant_offset_type, idx.quant_offset_type);
        assert_eq!(&got.gain_indices[..cfg.nb_subfr], &idx.gain_indices[..cfg.nb_subfr]);
        assert_eq!(
            &got.nlsf_indices[..cfg.lpc_order + 1],
            &idx.nlsf_indices[..cfg.lpc_order + 1]
        );
        assert_eq!(got.nlsf_interp_q2, idx.nlsf_interp_q2);
        if idx.signal_type == SignalType::Voiced {
            assert_eq!(got.lag_index, idx.lag_index);
            assert_eq!(got.contour_index, idx.contour_index);
            assert_eq!(got.per_index, idx.per_index);
            assert_eq!(&got.ltp_index[..cfg.nb_subfr], &idx.ltp_index[..cfg.nb_subfr]);
            assert_eq!(got.ltp_scale_index, idx.ltp_scale_index);
        }
        assert_eq!(got.seed, idx.seed);
        assert_eq!(chain_d.prev_lag_index, chain_e.prev_lag_index);
    }

    #[test]
    fn test_voiced_independent_roundtrip() {
        let cfg = FrameConfig::new(Bandwidth::Wide, 20);
        let mut idx = SideInfoIndices {
            signal_type: SignalType::Voiced,
            quant_offset_type: QuantOffsetType::Low,
            lag_index: 123,
            contour_index: 7,
            per_index: 2,
            ltp_scale_index: 1,
            seed: 3,
            nlsf_interp_q2: 4,
            ..Default::default()
        };
        idx.gain_indices = [40, 12, 3, 20];
        idx.ltp_index = [5, 31, 0, 17];
        idx.nlsf_indices[0] = 11;
        for i in 0..16 {
            idx.nlsf_indices[1 + i] = ((i as i32 % 5) - 2) as i8;
        }
        roundtrip(&idx, &cfg, true, CodingMode::Independent);
    }

    #[test]
    fn test_voiced_conditional_delta_lag() {
        let cfg = FrameConfig::new(Bandwidth::Narrow, 20);
        let mut idx = SideInfoIndices {
            signal_type: SignalType::Voiced,
            quant_offset_type: QuantOffsetType::High,
            lag_index: 55, // within +-7 of the chained 50
            contour_index: 2,
            per_index: 0,
            seed: 0,
            nlsf_interp_q2: 2,
            ..Default::default()
        };
        idx.gain_indices = [10, 9, 8, 7];
        idx.ltp_index = [7, 6, 5, 4];
        idx.nlsf_indices[0] = 30;
        roundtrip(&idx, &cfg, true, CodingMode::Conditional);
    }

    #[test]
    fn test_conditional_lag_escape_to_absolute() {
        let cfg = FrameConfig::new(Bandwidth::Wide, 20);
        let mut idx = SideInfoIndices {
            signal_type: SignalType::Voiced,
            lag_index: 200, // far from the chained 50: forces the escape
            contour_index: 0,
            per_index: 1,
            seed: 2,
            nlsf_interp_q2: 4,
            ..Default::default()
        };
        idx.gain_indices = [4, 4, 4, 4];
        idx.ltp_index = [15, 14, 1, 2];
        roundtrip(&idx, &cfg, true, CodingMode::Conditional);
    }

    #[test]
    fn test_inactive_frame_roundtrip() {
        let cfg = FrameConfig::new(Bandwidth::Medium, 10);
        let mut idx = SideInfoIndices {
            signal_type: SignalType::Inactive,
            quant_offset_type: QuantOffsetType::High,
            seed: 1,
            nlsf_interp_q2: 4,
            ..Default::default()
        };
        idx.gain_indices[0] = 25;
        idx.gain_indices[1] = 6;
        roundtrip(&idx, &cfg, false, CodingMode::Independent);
    }

    #[test]
    fn test_unvoiced_20ms_roundtrip() {
        let cfg = FrameConfig::new(Bandwidth::Wide, 20);
        let mut idx = SideInfoIndices {
            signal_type: SignalType::Unvoiced,
            quant_offset_type: QuantOffsetType::Low,
            seed: 2,
            nlsf_interp_q2: 1,
            ..Default::default()
        };
        idx.gain_indices = [33, 2, 2, 2];
        idx.nlsf_indices[0] = 5;
        roundtrip(&idx, &cfg, true, CodingMode::Conditional);
    }
}
