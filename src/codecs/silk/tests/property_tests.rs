//! Property-based tests over the quantization and entropy layers.

use proptest::prelude::*;

use crate::codecs::silk::lpc::{bwexpander, lpc_inverse_pred_gain};
use crate::codecs::silk::nlsf::{lpc_to_nlsf, nlsf_stabilize, nlsf_to_lpc};
use crate::codecs::silk::range::{RangeDecoder, RangeEncoder};
use crate::codecs::silk::shell::{decode_pulses, encode_pulses};
use crate::codecs::silk::tables::NLSF_CB_WB;
use crate::codecs::silk::types::{QuantOffsetType, SignalType, MAX_LPC_ORDER};

proptest! {
    #[test]
    fn prop_range_coder_roundtrips_any_symbol_stream(
        symbols in prop::collection::vec(0usize..6, 1..512)
    ) {
        const TABLE: &[u16] = &[256, 224, 192, 128, 64, 16, 0];
        let mut enc = RangeEncoder::new();
        for &s in &symbols {
            enc.encode_icdf(s, TABLE, 8);
        }
        let final_range = enc.range();
        let bytes = enc.finish();
        let mut dec = RangeDecoder::new(&bytes);
        for &s in &symbols {
            prop_assert_eq!(dec.decode_icdf(TABLE, 8), s);
        }
        prop_assert_eq!(dec.range(), final_range);
    }

    #[test]
    fn prop_shell_coder_roundtrips_bounded_pulses(
        seed in 0u32..u32::MAX,
        voiced in any::<bool>(),
        offset_high in any::<bool>()
    ) {
        // Pulse trains with per-sample magnitude <= 16 and block sums
        // within the direct coding cap
        let mut pulses = vec![0i16; 160];
        let mut s = seed | 1;
        for block in pulses.chunks_mut(16) {
            let mut budget = 16i32;
            for p in block.iter_mut() {
                s = s.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let mag = ((s >> 28) as i32).min(budget);
                if mag > 0 && (s & 0x100) != 0 {
                    *p = if s & 0x200 != 0 { mag as i16 } else { -(mag as i16) };
                    budget -= mag;
                }
            }
        }
        let st = if voiced { SignalType::Voiced } else { SignalType::Unvoiced };
        let qo = if offset_high { QuantOffsetType::High } else { QuantOffsetType::Low };
        let mut enc = RangeEncoder::new();
        encode_pulses(&mut enc, st, qo, &pulses, pulses.len());
        let bytes = enc.finish();
        let mut dec = RangeDecoder::new(&bytes);
        let mut out = vec![0i16; 160];
        decode_pulses(&mut dec, st, qo, &mut out, 160);
        prop_assert_eq!(pulses, out);
    }

    #[test]
    fn prop_stabilized_nlsf_keeps_min_spacing(
        raw in prop::collection::vec(0i16..32_767, 16)
    ) {
        let cb = &NLSF_CB_WB;
        let mut nlsf: Vec<i16> = raw.clone();
        nlsf_stabilize(&mut nlsf, cb.delta_min_q15);
        let mut prev = 0i32;
        for (i, &v) in nlsf.iter().enumerate() {
            prop_assert!(
                v as i32 - prev >= cb.delta_min_q15[i] as i32,
                "spacing violated at {}: {:?} (from {:?})", i, nlsf, raw
            );
            prev = v as i32;
        }
        prop_assert!(32_768 - prev >= cb.delta_min_q15[16] as i32);
    }

    #[test]
    fn prop_stabilized_nlsf_yields_stable_lpc(
        raw in prop::collection::vec(1i16..32_766, 16)
    ) {
        let cb = &NLSF_CB_WB;
        let mut nlsf: Vec<i16> = raw;
        nlsf_stabilize(&mut nlsf, cb.delta_min_q15);
        let mut a = [0i16; MAX_LPC_ORDER];
        nlsf_to_lpc(&mut a, &nlsf);
        prop_assert!(lpc_inverse_pred_gain(&a) > 0, "unstable filter from {:?}", nlsf);
    }

    #[test]
    fn prop_bwexpander_never_grows_coefficients(
        coefs in prop::collection::vec(-20_000i16..20_000, 10),
        chirp in 50_000i32..65_536
    ) {
        let mut a: Vec<i16> = coefs.clone();
        bwexpander(&mut a, chirp);
        for (orig, new) in coefs.iter().zip(a.iter()) {
            prop_assert!(new.unsigned_abs() <= orig.unsigned_abs() + 1,
                "{} grew to {}", orig, new);
        }
    }

    #[test]
    fn prop_lpc_nlsf_roundtrip_stays_stable(
        raw in prop::collection::vec(600i16..31_000, 10)
    ) {
        // Any stabilized NLSF vector survives NLSF -> LPC -> NLSF with a
        // stable filter at both ends
        let cb = &crate::codecs::silk::tables::NLSF_CB_NB_MB;
        let mut nlsf: Vec<i16> = raw;
        nlsf_stabilize(&mut nlsf, cb.delta_min_q15);
        let mut a = [0i16; 10];
        nlsf_to_lpc(&mut a, &nlsf);
        prop_assert!(lpc_inverse_pred_gain(&a) > 0);
        let mut back = [0i16; 10];
        if lpc_to_nlsf(&mut back, &a) {
            let mut a2 = [0i16; 10];
            nlsf_to_lpc(&mut a2, &back);
            prop_assert!(lpc_inverse_pred_gain(&a2) > 0);
        }
    }
}
