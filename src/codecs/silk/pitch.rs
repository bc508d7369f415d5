//! Pitch analysis: multi-resolution lag search over the LPC residual.
//!
//! A coarse normalized-correlation search on a 4 kHz decimated residual
//! produces lag candidates, refined at the full internal rate, then a
//! contour codebook picks per-subframe offsets. All tie-breaks prefer the
//! lower lag so the search is deterministic.

use crate::codecs::silk::tables::{
    PITCH_CONTOUR_2SF, PITCH_CONTOUR_4SF_NB, PITCH_CONTOUR_4SF_WB, PITCH_LAG_LO_SIZE,
    PE_MAX_LAG_MS, PE_MIN_LAG_MS,
};
use crate::codecs::silk::types::{Bandwidth, SignalType, MAX_NB_SUBFR};

/// Coarse-stage candidates carried into refinement.
const N_STAGE1_CANDIDATES: usize = 4;
/// Refinement half-width around each coarse candidate, full-rate samples.
const STAGE2_HALF_WIDTH: i32 = 4;

/// Search outcome for one voiced frame.
#[derive(Debug, Clone, Copy)]
pub struct PitchResult {
    /// Per-subframe lags at the internal rate.
    pub lags: [i32; MAX_NB_SUBFR],
    /// Absolute lag index for the parameter codec.
    pub lag_index: i16,
    /// Contour codebook index.
    pub contour_index: i8,
    /// Normalized correlation of the winner, Q13.
    pub norm_corr_q13: i32,
}

/// Shortest coded lag at this rate.
#[inline]
pub fn min_lag(fs_khz: usize) -> i32 {
    (PE_MIN_LAG_MS * fs_khz) as i32
}

/// Longest coded lag at this rate; bounded by the index range.
#[inline]
pub fn max_lag(bandwidth: Bandwidth) -> i32 {
    let fs_khz = bandwidth.fs_khz();
    let coded = min_lag(fs_khz) + 32 * PITCH_LAG_LO_SIZE[lo_table_index(bandwidth)] as i32 - 1;
    coded.min((PE_MAX_LAG_MS * fs_khz) as i32)
}

#[inline]
fn lo_table_index(bandwidth: Bandwidth) -> usize {
    match bandwidth {
        Bandwidth::Narrow => 0,
        Bandwidth::Medium => 1,
        Bandwidth::Wide => 2,
    }
}

/// Contour table for this geometry as (row length, rows).
pub fn contour_table(bandwidth: Bandwidth, nb_subfr: usize) -> (&'static [[i8; 4]], usize) {
    // 2-subframe vectors are stored padded to 4 for a single row type
    static CB_2SF_PADDED: [[i8; 4]; 12] = {
        let mut out = [[0i8; 4]; 12];
        let mut i = 0;
        while i < 12 {
            out[i][0] = PITCH_CONTOUR_2SF[i][0];
            out[i][1] = PITCH_CONTOUR_2SF[i][1];
            i += 1;
        }
        out
    };
    if nb_subfr == 2 {
        (&CB_2SF_PADDED, 2)
    } else if bandwidth == Bandwidth::Wide {
        (&PITCH_CONTOUR_4SF_WB, 4)
    } else {
        (&PITCH_CONTOUR_4SF_NB, 4)
    }
}

/// Split an absolute lag into its coded index.
pub fn lag_to_index(lag: i32, bandwidth: Bandwidth) -> i16 {
    (lag - min_lag(bandwidth.fs_khz())) as i16
}

/// Reconstruct an absolute lag from its coded index.
pub fn index_to_lag(index: i16, bandwidth: Bandwidth) -> i32 {
    min_lag(bandwidth.fs_khz()) + index as i32
}

/// Expand `(lag, contour)` into clamped per-subframe lags.
pub fn contour_to_lags(
    lag: i32,
    contour_index: usize,
    bandwidth: Bandwidth,
    nb_subfr: usize,
) -> [i32; MAX_NB_SUBFR] {
    let (table, _) = contour_table(bandwidth, nb_subfr);
    let row = &table[contour_index.min(table.len() - 1)];
    let lo = min_lag(bandwidth.fs_khz());
    let hi = max_lag(bandwidth);
    let mut lags = [0i32; MAX_NB_SUBFR];
    for s in 0..nb_subfr {
        lags[s] = (lag + row[s] as i32).clamp(lo, hi);
    }
    lags
}

/// Correlation of `x[offset..offset+len]` against itself `lag` samples back.
fn corr_at_lag(x: &[i16], offset: usize, len: usize, lag: i32) -> (i64, i64) {
    let mut num: i64 = 0;
    let mut energy: i64 = 1;
    for n in 0..len {
        let a = x[offset + n] as i64;
        let b = x[offset + n - lag as usize] as i64;
        num += a * b;
        energy += b * b;
    }
    (num, energy)
}

/// Compare two (num, energy) correlation scores without division.
#[inline]
fn score_gt(a: (i64, i64), b: (i64, i64)) -> bool {
    // a.num^2/a.energy > b.num^2/b.energy with sign preserved
    let an = if a.0 > 0 { a.0 } else { 0 };
    let bn = if b.0 > 0 { b.0 } else { 0 };
    (an as i128 * an as i128) * b.1 as i128 > (bn as i128 * bn as i128) * a.1 as i128
}

/// Voicing threshold in Q13 from the frame context.
fn voiced_threshold_q13(
    speech_activity_q8: i32,
    prev_signal_type: SignalType,
    pred_gain_db_q7: i32,
) -> i32 {
    // Base 0.45, lowered for confident activity, a voiced past and a
    // strongly predictive spectrum
    let mut thr = 3686;
    thr -= (speech_activity_q8 * 819) >> 8;
    if prev_signal_type == SignalType::Voiced {
        thr -= 819;
    }
    thr -= (pred_gain_db_q7 >> 4).min(512);
    thr.max(1024)
}

/// Run the full search. `residual` holds the whitened signal with at least
/// `max_lag` samples of history before `frame_offset`. Returns `None` when
/// the best correlation stays under the voicing threshold.
#[allow(clippy::too_many_arguments)]
pub fn pitch_analysis(
    residual: &[i16],
    frame_offset: usize,
    bandwidth: Bandwidth,
    nb_subfr: usize,
    speech_activity_q8: i32,
    prev_signal_type: SignalType,
    pred_gain_db_q7: i32,
    search_thres_boost_q13: i32,
) -> Option<PitchResult> {
    let fs_khz = bandwidth.fs_khz();
    let subfr_len = 5 * fs_khz;
    let frame_len = nb_subfr * subfr_len;
    let lo = min_lag(fs_khz);
    let hi = max_lag(bandwidth);
    debug_assert!(frame_offset >= hi as usize);

    // Stage 1: 4 kHz decimated coarse search
    let dec = fs_khz / 4;
    let dec_len = residual.len() / dec;
    debug_assert!(dec_len <= 256);
    let dec_frame = frame_len / dec;
    let dec_offset = frame_offset / dec;
    let mut decimated = [0i16; 256];
    for (j, d) in decimated.iter_mut().take(dec_len).enumerate() {
        let mut acc = 0i32;
        for k in 0..dec {
            acc += residual[j * dec + k] as i32;
        }
        *d = (acc / dec as i32) as i16;
    }
    let decimated = &decimated[..dec_len];
    let lo4 = (lo / dec as i32).max(4);
    let hi4 = hi / dec as i32;
    let mut candidates = [(0i32, (0i64, 1i64)); N_STAGE1_CANDIDATES];
    let mut n_cand = 0usize;
    for lag4 in lo4..=hi4 {
        if lag4 as usize > dec_offset {
            break;
        }
        let score = corr_at_lag(decimated, dec_offset, dec_frame, lag4);
        if score.0 <= 0 {
            continue;
        }
        let mut pos = n_cand;
        for (p, &(_, s)) in candidates[..n_cand].iter().enumerate() {
            if score_gt(score, s) {
                pos = p;
                break;
            }
        }
        if pos < N_STAGE1_CANDIDATES {
            let upper = (n_cand + 1).min(N_STAGE1_CANDIDATES);
            candidates.copy_within(pos..upper - 1, pos + 1);
            candidates[pos] = (lag4, score);
            n_cand = upper;
        }
    }
    if n_cand == 0 {
        return None;
    }

    // Stage 2: full-rate refinement around each candidate
    let mut best_lag = 0i32;
    let mut best_score: (i64, i64) = (0, 1);
    for &(lag4, _) in &candidates[..n_cand] {
        let center = lag4 * dec as i32;
        for lag in (center - STAGE2_HALF_WIDTH)..=(center + STAGE2_HALF_WIDTH) {
            if lag < lo || lag > hi {
                continue;
            }
            let score = corr_at_lag(residual, frame_offset, frame_len, lag);
            if score_gt(score, best_score) {
                best_score = score;
                best_lag = lag;
            }
        }
    }
    if best_lag == 0 {
        return None;
    }

    // Normalized correlation of the winner in Q13
    let sig_energy: i64 = (0..frame_len)
        .map(|n| {
            let v = residual[frame_offset + n] as i64;
            v * v
        })
        .sum::<i64>()
        + 1;
    let norm_q13 = {
        let num = best_score.0.max(0);
        let den = int_sqrt(best_score.1 as u128 * sig_energy as u128).max(1);
        ((num as i128) << 13).min(i64::MAX as i128) as i64 / den as i64
    }
    .clamp(0, 8192) as i32;

    let thr = voiced_threshold_q13(
        speech_activity_q8,
        prev_signal_type,
        pred_gain_db_q7,
    ) + search_thres_boost_q13;
    if norm_q13 < thr {
        return None;
    }

    // Stage 3: contour selection over per-subframe correlations
    let (table, rows_used) = contour_table(bandwidth, nb_subfr);
    debug_assert_eq!(rows_used, nb_subfr);
    let mut best_contour = 0usize;
    let mut best_total: i64 = i64::MIN;
    for (ci, row) in table.iter().enumerate() {
        let mut total: i64 = 0;
        for s in 0..nb_subfr {
            let lag = (best_lag + row[s] as i32).clamp(lo, hi);
            let off = frame_offset + s * subfr_len;
            let (num, energy) = corr_at_lag(residual, off, subfr_len, lag);
            // Energy-normalized in Q10 to keep subframes comparable
            total += (num << 10) / energy.max(1);
        }
        if total > best_total {
            best_total = total;
            best_contour = ci;
        }
    }

    let lags = contour_to_lags(best_lag, best_contour, bandwidth, nb_subfr);
    Some(PitchResult {
        lags,
        lag_index: lag_to_index(best_lag, bandwidth),
        contour_index: best_contour as i8,
        norm_corr_q13: norm_q13,
    })
}

/// Integer square root on u128, round-down.
fn int_sqrt(v: u128) -> u64 {
    if v == 0 {
        return 0;
    }
    let mut x = (v as f64).sqrt() as u128;
    // A couple of Newton steps fix the float seed exactly
    for _ in 0..4 {
        if x == 0 {
            break;
        }
        x = (x + v / x) >> 1;
    }
    while x.saturating_mul(x) > v {
        x -= 1;
    }
    while (x + 1).saturating_mul(x + 1) <= v {
        x += 1;
    }
    x as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periodic_signal(len: usize, period: usize, amp: i32) -> Vec<i16> {
        let mut x = vec![0i16; len];
        let mut seed = 12_345u32;
        let mut cycle = vec![0i16; period];
        for c in cycle.iter_mut() {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *c = (((seed >> 17) as i32 % (2 * amp)) - amp) as i16;
        }
        for (i, v) in x.iter_mut().enumerate() {
            *v = cycle[i % period];
        }
        x
    }

    #[test]
    fn test_detects_known_period() {
        let period = 80usize;
        let x = periodic_signal(1600, period, 6000);
        let res = pitch_analysis(
            &x,
            1280,
            Bandwidth::Wide,
            4,
            200,
            SignalType::Voiced,
            2000,
            0,
        )
        .expect("strongly periodic signal must be voiced");
        // The coded lag should be the period or a harmonic of it
        let lag = index_to_lag(res.lag_index, Bandwidth::Wide);
        assert!(
            lag % period as i32 == 0 || (lag - period as i32).abs() <= 2,
            "lag {} period {}",
            lag,
            period
        );
        assert!(res.norm_corr_q13 > 6000);
    }

    #[test]
    fn test_noise_is_unvoiced() {
        let mut x = vec![0i16; 1600];
        let mut seed = 77u32;
        for v in x.iter_mut() {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *v = ((seed >> 18) as i32 - 8192) as i16;
        }
        let res = pitch_analysis(
            &x,
            1280,
            Bandwidth::Wide,
            4,
            100,
            SignalType::Unvoiced,
            0,
            0,
        );
        assert!(res.is_none());
    }

    #[test]
    fn test_lag_index_roundtrip() {
        for bw in [Bandwidth::Narrow, Bandwidth::Medium, Bandwidth::Wide] {
            for lag in [min_lag(bw.fs_khz()), min_lag(bw.fs_khz()) + 17, max_lag(bw)] {
                let idx = lag_to_index(lag, bw);
                assert_eq!(index_to_lag(idx, bw), lag);
            }
        }
    }

    #[test]
    fn test_contour_lags_clamped() {
        let lags = contour_to_lags(min_lag(16), 5, Bandwidth::Wide, 4);
        for s in 0..4 {
            assert!(lags[s] >= min_lag(16));
            assert!(lags[s] <= max_lag(Bandwidth::Wide));
        }
    }
}
