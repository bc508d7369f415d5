//! Shell coder: entropy coding of excitation pulse magnitudes and signs.
//!
//! Magnitudes are coded in blocks of 16 samples. Each block codes its total
//! pulse count first (escaping to an LSB path when the total exceeds 16),
//! then splits the count recursively into halves down to single samples,
//! then any low-order bits, then one sign per nonzero sample.

use crate::codecs::silk::math::lin2log;
use crate::codecs::silk::range::{RangeDecoder, RangeEncoder};
use crate::codecs::silk::tables::{
    shell_split_icdf, LSB_ICDF, PULSE_COUNT_ICDF, RATE_LEVEL_ICDF, SIGN_ICDF_PROB,
};
use crate::codecs::silk::types::{
    QuantOffsetType, SignalType, LOG2_SHELL_CODEC_FRAME_LENGTH, MAX_PULSES,
    SHELL_CODEC_FRAME_LENGTH,
};

/// Escape symbol of the pulse-count tables.
const PULSE_COUNT_ESCAPE: usize = 17;
/// Cap on LSB depth per block.
const MAX_LSB_DEPTH: u32 = 10;
/// Largest frame the pulse buffers must hold, padded to whole blocks.
pub const MAX_PADDED_FRAME: usize = 336;

#[inline]
fn n_blocks(frame_length: usize) -> usize {
    let mut iter = frame_length >> LOG2_SHELL_CODEC_FRAME_LENGTH;
    if iter * SHELL_CODEC_FRAME_LENGTH < frame_length {
        // Only 10 ms at 12 kHz is not a multiple of the block length
        debug_assert_eq!(frame_length, 120);
        iter += 1;
    }
    iter
}

#[inline]
fn sign_table(
    signal_type: SignalType,
    quant_offset_type: QuantOffsetType,
    pulse_class: usize,
) -> [u16; 3] {
    let idx = (signal_type as usize * 2 + quant_offset_type as usize) * 7 + pulse_class.min(6);
    [256, SIGN_ICDF_PROB[idx], 0]
}

#[inline]
fn pulse_count_table(attempt: usize, rate_level: usize) -> &'static [u16] {
    match attempt {
        0 => PULSE_COUNT_ICDF[rate_level],
        1 => PULSE_COUNT_ICDF[9],
        _ => PULSE_COUNT_ICDF[10],
    }
}

/// Approximate bits in Q7 to code `symbol` against `table`.
#[inline]
fn icdf_bits_q7(table: &[u16], symbol: usize) -> i32 {
    let p = (table[symbol] - table[symbol + 1]) as i32;
    (8 << 7) - lin2log(p.max(1))
}

/// Pick the rate level whose pulse-count table codes these block totals in
/// the fewest estimated bits.
fn choose_rate_level(block_sums: &[usize], signal_type: SignalType) -> usize {
    let mut best = 0usize;
    let mut best_cost = i32::MAX;
    for level in 0..9 {
        let mut cost = 0i32;
        for &sum in block_sums {
            let capped = sum.min(PULSE_COUNT_ESCAPE);
            cost += icdf_bits_q7(PULSE_COUNT_ICDF[level], capped);
        }
        cost += icdf_bits_q7(
            RATE_LEVEL_ICDF[(signal_type == SignalType::Voiced) as usize],
            level,
        );
        if cost < best_cost {
            best_cost = cost;
            best = level;
        }
    }
    best
}

/// Recursive binary partition of one block's magnitudes.
fn shell_encode(enc: &mut RangeEncoder, q: &[u16]) {
    // q is a 16-sample block of magnitudes whose sum is 1..=16
    fn split(enc: &mut RangeEncoder, seg: &[u16], level: usize) {
        let total: usize = seg.iter().map(|&v| v as usize).sum();
        if total == 0 || seg.len() == 1 {
            return;
        }
        let half = seg.len() / 2;
        let left: usize = seg[..half].iter().map(|&v| v as usize).sum();
        enc.encode_icdf(left, shell_split_icdf(level, total), 8);
        split(enc, &seg[..half], level + 1);
        split(enc, &seg[half..], level + 1);
    }
    split(enc, q, 0);
}

/// Inverse of [`shell_encode`] for one block with a known total.
fn shell_decode(dec: &mut RangeDecoder<'_>, q: &mut [u16], total: usize) {
    fn split(dec: &mut RangeDecoder<'_>, seg: &mut [u16], total: usize, level: usize) {
        if seg.len() == 1 {
            seg[0] = total as u16;
            return;
        }
        if total == 0 {
            for v in seg.iter_mut() {
                *v = 0;
            }
            return;
        }
        let half = seg.len() / 2;
        let left = dec.decode_icdf(shell_split_icdf(level, total), 8).min(total);
        split(dec, &mut seg[..half], left, level + 1);
        let right = total - left;
        let (_, rest) = seg.split_at_mut(half);
        split(dec, rest, right, level + 1);
    }
    split(dec, q, total, 0);
}

/// Encode the excitation of one internal frame.
pub fn encode_pulses(
    enc: &mut RangeEncoder,
    signal_type: SignalType,
    quant_offset_type: QuantOffsetType,
    pulses: &[i16],
    frame_length: usize,
) {
    debug_assert_eq!(pulses.len(), frame_length);
    let iter = n_blocks(frame_length);
    let mut abs_pulses = [0u32; MAX_PADDED_FRAME];
    for (dst, &p) in abs_pulses.iter_mut().zip(pulses.iter()) {
        *dst = p.unsigned_abs() as u32;
    }
    // Per block: LSB depth needed to bring the total within the cap
    let mut lsb_counts = [0u32; MAX_PADDED_FRAME / SHELL_CODEC_FRAME_LENGTH];
    let mut block_mags = [[0u16; SHELL_CODEC_FRAME_LENGTH]; MAX_PADDED_FRAME / SHELL_CODEC_FRAME_LENGTH];
    let mut block_sums = [0usize; MAX_PADDED_FRAME / SHELL_CODEC_FRAME_LENGTH];
    for b in 0..iter {
        let seg = &abs_pulses[b * SHELL_CODEC_FRAME_LENGTH..(b + 1) * SHELL_CODEC_FRAME_LENGTH];
        let mut lsb = 0u32;
        loop {
            let sum: u32 = seg.iter().map(|&v| v >> lsb).sum();
            if sum as usize <= MAX_PULSES || lsb >= MAX_LSB_DEPTH {
                break;
            }
            lsb += 1;
        }
        lsb_counts[b] = lsb;
        let mut sum = 0usize;
        for (i, &v) in seg.iter().enumerate() {
            let mag = (v >> lsb).min(MAX_PULSES as u32) as u16;
            block_mags[b][i] = mag;
            sum += mag as usize;
        }
        block_sums[b] = sum;
    }
    // Rate level, then per-block counts with escapes
    let rate_level = choose_rate_level(&block_sums[..iter], signal_type);
    enc.encode_icdf(
        rate_level,
        RATE_LEVEL_ICDF[(signal_type == SignalType::Voiced) as usize],
        8,
    );
    for b in 0..iter {
        let mut attempt = 0usize;
        for _ in 0..lsb_counts[b] {
            enc.encode_icdf(PULSE_COUNT_ESCAPE, pulse_count_table(attempt, rate_level), 8);
            attempt += 1;
        }
        enc.encode_icdf(block_sums[b], pulse_count_table(attempt, rate_level), 8);
    }
    // Shell splits
    for b in 0..iter {
        if block_sums[b] > 0 {
            shell_encode(enc, &block_mags[b]);
        }
    }
    // LSBs, most significant first
    for b in 0..iter {
        let lsb = lsb_counts[b];
        if lsb == 0 {
            continue;
        }
        let seg = &abs_pulses[b * SHELL_CODEC_FRAME_LENGTH..(b + 1) * SHELL_CODEC_FRAME_LENGTH];
        for &v in seg.iter() {
            for bit in (0..lsb).rev() {
                enc.encode_icdf(((v >> bit) & 1) as usize, LSB_ICDF, 8);
            }
        }
    }
    // Signs for every nonzero sample
    for b in 0..iter {
        let base = b * SHELL_CODEC_FRAME_LENGTH;
        let table = sign_table(signal_type, quant_offset_type, block_sums[b]);
        for i in 0..SHELL_CODEC_FRAME_LENGTH {
            let idx = base + i;
            if idx >= frame_length {
                break;
            }
            if abs_pulses[idx] > 0 {
                let sym = usize::from(pulses[idx] >= 0);
                enc.encode_icdf(sym, &table, 8);
            }
        }
    }
}

/// Decode the excitation of one internal frame into `pulses`.
pub fn decode_pulses(
    dec: &mut RangeDecoder<'_>,
    signal_type: SignalType,
    quant_offset_type: QuantOffsetType,
    pulses: &mut [i16],
    frame_length: usize,
) {
    debug_assert_eq!(pulses.len(), frame_length);
    let iter = n_blocks(frame_length);
    let rate_level = dec.decode_icdf(
        RATE_LEVEL_ICDF[(signal_type == SignalType::Voiced) as usize],
        8,
    );
    let mut lsb_counts = [0u32; MAX_PADDED_FRAME / SHELL_CODEC_FRAME_LENGTH];
    let mut block_sums = [0usize; MAX_PADDED_FRAME / SHELL_CODEC_FRAME_LENGTH];
    for b in 0..iter {
        let mut attempt = 0usize;
        let mut lsb = 0u32;
        let sum = loop {
            let sym = dec.decode_icdf(pulse_count_table(attempt, rate_level), 8);
            if sym != PULSE_COUNT_ESCAPE {
                break sym;
            }
            lsb += 1;
            attempt += 1;
            if lsb >= MAX_LSB_DEPTH {
                // Deepest level: final count comes from the last table
                break dec
                    .decode_icdf(pulse_count_table(attempt, rate_level), 8)
                    .min(MAX_PULSES);
            }
        };
        lsb_counts[b] = lsb;
        block_sums[b] = sum.min(MAX_PULSES);
    }
    let mut mags = [[0u16; SHELL_CODEC_FRAME_LENGTH]; MAX_PADDED_FRAME / SHELL_CODEC_FRAME_LENGTH];
    for b in 0..iter {
        if block_sums[b] > 0 {
            shell_decode(dec, &mut mags[b], block_sums[b]);
        }
    }
    for b in 0..iter {
        let lsb = lsb_counts[b];
        if lsb == 0 {
            continue;
        }
        for mag in mags[b].iter_mut() {
            let mut v = *mag as u32;
            for _ in 0..lsb {
                v = (v << 1) | dec.decode_icdf(LSB_ICDF, 8) as u32;
            }
            *mag = v.min(i16::MAX as u32) as u16;
        }
    }
    for p in pulses.iter_mut() {
        *p = 0;
    }
    for b in 0..iter {
        let base = b * SHELL_CODEC_FRAME_LENGTH;
        let table = sign_table(signal_type, quant_offset_type, block_sums[b]);
        for i in 0..SHELL_CODEC_FRAME_LENGTH {
            let idx = base + i;
            if idx >= frame_length {
                break;
            }
            let mag = mags[b][i] as i32;
            if mag > 0 {
                let positive = dec.decode_icdf(&table, 8) == 1;
                pulses[idx] = if positive { mag as i16 } else { -(mag as i16) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(pulses: &[i16], st: SignalType, qo: QuantOffsetType) -> Vec<i16> {
        let mut enc = RangeEncoder::new();
        encode_pulses(&mut enc, st, qo, pulses, pulses.len());
        let bytes = enc.finish();
        let mut dec = RangeDecoder::new(&bytes);
        let mut out = vec![0i16; pulses.len()];
        decode_pulses(&mut dec, st, qo, &mut out, pulses.len());
        out
    }

    #[test]
    fn test_sparse_pulses_roundtrip() {
        let mut pulses = vec![0i16; 160];
        pulses[3] = 2;
        pulses[17] = -1;
        pulses[45] = 5;
        pulses[100] = -7;
        pulses[159] = 1;
        let got = roundtrip(&pulses, SignalType::Unvoiced, QuantOffsetType::High);
        assert_eq!(pulses, got);
    }

    #[test]
    fn test_dense_pulses_roundtrip() {
        let mut pulses = vec![0i16; 320];
        let mut seed = 99u32;
        for p in pulses.iter_mut() {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *p = (((seed >> 28) as i32) - 8).clamp(-8, 8) as i16;
        }
        let got = roundtrip(&pulses, SignalType::Voiced, QuantOffsetType::Low);
        assert_eq!(pulses, got);
    }

    #[test]
    fn test_lsb_escape_roundtrip() {
        // Magnitudes large enough to force the LSB path
        let mut pulses = vec![0i16; 160];
        pulses[0] = 40;
        pulses[1] = -33;
        pulses[20] = 25;
        pulses[21] = 19;
        let got = roundtrip(&pulses, SignalType::Voiced, QuantOffsetType::Low);
        assert_eq!(pulses, got);
    }

    #[test]
    fn test_zero_frame_roundtrip() {
        let pulses = vec![0i16; 160];
        let got = roundtrip(&pulses, SignalType::Inactive, QuantOffsetType::High);
        assert_eq!(pulses, got);
    }

    #[test]
    fn test_mb_10ms_padded_frame() {
        // 120 samples is the only non-multiple of 16
        let mut pulses = vec![0i16; 120];
        pulses[5] = 3;
        pulses[119] = -2;
        let got = roundtrip(&pulses, SignalType::Unvoiced, QuantOffsetType::Low);
        assert_eq!(pulses, got);
    }

    #[test]
    fn test_max_inblock_magnitudes() {
        let mut pulses = vec![0i16; 160];
        // Block with total exactly at the cap
        for i in 0..16 {
            pulses[i] = 1;
        }
        pulses[0] = -1;
        let got = roundtrip(&pulses, SignalType::Voiced, QuantOffsetType::High);
        assert_eq!(pulses, got);
    }
}
