//! Noise-shaping analysis.
//!
//! Derives, per subframe, the warped AR shaping filter, quantizer gain,
//! spectral tilt, low-frequency shaping and harmonic shaping gain that
//! steer the NSQ, plus the rate-distortion lambda and the quantization
//! offset class.

use crate::codecs::silk::lpc::{bwexpander, k2a, lpc_fit, schur};
use crate::codecs::silk::math::*;
use crate::codecs::silk::types::{
    QuantOffsetType, SignalType, MAX_NB_SUBFR, MAX_SHAPE_LPC_ORDER, SHELL_CODEC_FRAME_LENGTH,
};

/// Warping per kHz of internal rate, Q16 of 0.015.
const WARPING_MULTIPLIER_Q16: i32 = 983;
/// Bandwidth expansion applied to the shaping filter, Q16 of 0.94.
const SHAPE_BW_EXPANSION_Q16: i32 = 61_604;
/// Harmonic shaping base gain for voiced frames, Q14 of 0.3.
const HARM_SHAPE_GAIN_Q14: i32 = 4_915;
/// Low-frequency AR shaping coefficient, Q14.
const LF_AR_SHP_Q14: i32 = 11_469;
/// Low-frequency MA shaping coefficient, Q14.
const LF_MA_SHP_Q14: i32 = -12_288;
/// Sparseness threshold selecting the high quantization offset, Q8.
const SPARSENESS_THRESHOLD_Q8: i32 = 614;

/// Per-frame output of the shaping analysis.
#[derive(Debug, Clone)]
pub struct ShapeResult {
    /// Shaping AR coefficients, Q13, shared across subframes.
    pub ar_q13: [i16; MAX_SHAPE_LPC_ORDER],
    /// Shaping filter order, 16 or 24.
    pub shape_order: usize,
    /// Warping factor fed to the NSQ, Q16.
    pub warping_q16: i32,
    /// Quantizer gain per subframe, Q16.
    pub gains_q16: [i32; MAX_NB_SUBFR],
    /// Spectral tilt per subframe, Q14.
    pub tilt_q14: [i32; MAX_NB_SUBFR],
    /// Harmonic shaping gain per subframe, Q14; zero when unvoiced.
    pub harm_shape_gain_q14: [i32; MAX_NB_SUBFR],
    /// Low-frequency AR shaping, Q14.
    pub lf_ar_shp_q14: i32,
    /// Low-frequency MA shaping, Q14.
    pub lf_ma_shp_q14: i32,
    /// Rate-distortion lambda, Q10.
    pub lambda_q10: i32,
    /// Excitation offset class for this frame.
    pub quant_offset_type: QuantOffsetType,
}

impl Default for ShapeResult {
    fn default() -> Self {
        ShapeResult {
            ar_q13: [0; MAX_SHAPE_LPC_ORDER],
            shape_order: 16,
            warping_q16: 0,
            gains_q16: [1 << 16; MAX_NB_SUBFR],
            tilt_q14: [0; MAX_NB_SUBFR],
            harm_shape_gain_q14: [0; MAX_NB_SUBFR],
            lf_ar_shp_q14: LF_AR_SHP_Q14,
            lf_ma_shp_q14: LF_MA_SHP_Q14,
            lambda_q10: 1024,
            quant_offset_type: QuantOffsetType::Low,
        }
    }
}

/// Warped autocorrelation through a chain of first-order allpass sections.
fn warped_autocorr(
    x: &[i16],
    order: usize,
    warping_q16: i32,
    corr: &mut [i64; MAX_SHAPE_LPC_ORDER + 1],
) {
    let mut state = [0i32; MAX_SHAPE_LPC_ORDER + 1];
    for c in corr.iter_mut() {
        *c = 0;
    }
    for &xn in x.iter() {
        let mut tmp1 = (xn as i32) << 10;
        // Allpass sections in pairs
        let mut i = 0;
        while i < order {
            let tmp2 = smlawb(state[i], state[i + 1] - tmp1, warping_q16);
            state[i] = tmp1;
            corr[i] += ((tmp1 as i64) * (state[0] as i64)) >> 10;
            let next = smlawb(state[i + 1], state[i] - tmp2, warping_q16);
            state[i + 1] = tmp2;
            corr[i + 1] += ((tmp2 as i64) * (state[0] as i64)) >> 10;
            tmp1 = next;
            i += 2;
        }
        state[order] = tmp1;
        corr[order] += ((tmp1 as i64) * (state[0] as i64)) >> 10;
    }
}

/// Sparseness of the residual energy over shell-sized chunks, Q8; sparse
/// unvoiced excitation prefers the high quantization offset.
fn sparseness_q8(res: &[i16]) -> i32 {
    let n_chunks = res.len() / SHELL_CODEC_FRAME_LENGTH;
    if n_chunks == 0 {
        return 0;
    }
    let mut energies = [0i64; 32];
    let mut total = 1i64;
    for c in 0..n_chunks.min(32) {
        let seg = &res[c * SHELL_CODEC_FRAME_LENGTH..(c + 1) * SHELL_CODEC_FRAME_LENGTH];
        let e: i64 = seg.iter().map(|&v| v as i64 * v as i64).sum();
        energies[c] = e;
        total += e;
    }
    let mean = total / n_chunks as i64;
    // Mean absolute deviation relative to the mean energy
    let mut dev = 0i64;
    for &e in energies.iter().take(n_chunks.min(32)) {
        dev += (e - mean).abs();
    }
    ((dev * 256) / (total.max(1))) as i32
}

/// Run the analysis for one frame.
///
/// `x` is the unquantized input at the internal rate, one frame long;
/// `res` the LPC residual over the same span. `snr_db_q7` comes from rate
/// control; `coding_quality_q14` rises with available bitrate.
#[allow(clippy::too_many_arguments)]
pub fn noise_shape_analysis(
    x: &[i16],
    res: &[i16],
    nb_subfr: usize,
    subfr_length: usize,
    fs_khz: usize,
    shape_order: usize,
    signal_type: SignalType,
    periodicity_q14: i32,
    speech_activity_q8: i32,
    snr_db_q7: i32,
    coding_quality_q14: i32,
) -> ShapeResult {
    debug_assert!(shape_order == 16 || shape_order == 24);
    debug_assert!(x.len() >= nb_subfr * subfr_length);
    let mut out = ShapeResult {
        shape_order,
        ..Default::default()
    };
    out.warping_q16 =
        (fs_khz as i32) * WARPING_MULTIPLIER_Q16 + ((coding_quality_q14 * 41) >> 14);

    // Shaping filter from the warped autocorrelation of the whole frame,
    // windowed with sine ramps over a quarter subframe at each end
    let frame_len = nb_subfr * subfr_length;
    let mut win = [0i32; 512];
    for (dst, &src) in win.iter_mut().zip(x.iter()) {
        *dst = src as i32;
    }
    crate::codecs::silk::lpc::apply_sine_window(&mut win[..frame_len], subfr_length / 4);
    let mut win16 = [0i16; 512];
    for (dst, &src) in win16.iter_mut().zip(win.iter()) {
        *dst = sat16(src);
    }
    let mut corr64 = [0i64; MAX_SHAPE_LPC_ORDER + 1];
    warped_autocorr(&win16[..frame_len], shape_order, out.warping_q16, &mut corr64);
    // Normalize into i32 with headroom, add a noise floor
    let mut shift = 0;
    while corr64[0] >= (1i64 << 30) {
        for c in corr64.iter_mut() {
            *c >>= 1;
        }
        shift += 1;
    }
    let _ = shift;
    let mut c32 = [0i32; MAX_SHAPE_LPC_ORDER + 1];
    for (dst, &src) in c32.iter_mut().zip(corr64.iter()) {
        *dst = src as i32;
    }
    c32[0] = c32[0] + (c32[0] >> 6) + 1;
    let mut rc_q15 = [0i16; MAX_SHAPE_LPC_ORDER];
    let _res_nrg = schur(&mut rc_q15[..shape_order], &c32, shape_order);
    let mut a_q24 = [0i32; MAX_SHAPE_LPC_ORDER];
    k2a(&mut a_q24[..shape_order], &rc_q15[..shape_order], shape_order);
    // Fit to Q13 via the shared Q12 helper, then one extra bit of headroom
    let mut a_q12 = [0i16; MAX_SHAPE_LPC_ORDER];
    {
        // Work on a doubled copy so the result lands in Q13
        let mut doubled = [0i32; MAX_SHAPE_LPC_ORDER];
        for (d, &s) in doubled.iter_mut().zip(a_q24.iter()) {
            *d = lshift_sat32(s, 1);
        }
        lpc_fit(&mut a_q12[..shape_order], &mut doubled[..shape_order]);
    }
    bwexpander(&mut a_q12[..shape_order], SHAPE_BW_EXPANSION_Q16);
    out.ar_q13[..shape_order].copy_from_slice(&a_q12[..shape_order]);

    // Per-subframe quantizer gains from residual energy, adjusted by the
    // SNR target in the log domain. The offset places the gain near the
    // residual RMS in the Q16 gain domain, so typical pulse magnitudes
    // stay in the low single digits.
    let min_gain_log_q7 = 6 << 7;
    for s in 0..nb_subfr {
        let seg = &res[s * subfr_length..(s + 1) * subfr_length];
        let (energy, eshift) = sum_sqr_shift(seg);
        let e_per_sample = ((energy as i64) << eshift) / subfr_length as i64;
        let log_e_q7 = lin2log((e_per_sample.clamp(1, i32::MAX as i64)) as i32);
        // gain ~ sqrt(energy) * 2^(-0.16 snr_db)
        let mut log_gain_q7 = (log_e_q7 >> 1) + 2240;
        log_gain_q7 -= (snr_db_q7 * 21) >> 7;
        log_gain_q7 = log_gain_q7.max(min_gain_log_q7);
        out.gains_q16[s] = log2lin(log_gain_q7.min(3967)).max(1 << 12);
    }

    // Tilt: stronger for active voiced content
    let tilt = match signal_type {
        SignalType::Voiced => -4096 - (speech_activity_q8 << 4),
        _ => -2048 - (speech_activity_q8 << 3),
    };
    for s in 0..nb_subfr {
        out.tilt_q14[s] = tilt.max(-9830);
    }

    // Harmonic shaping scaled by periodicity
    if signal_type == SignalType::Voiced {
        let harm = (HARM_SHAPE_GAIN_Q14 * periodicity_q14) >> 14;
        for s in 0..nb_subfr {
            out.harm_shape_gain_q14[s] = harm.clamp(0, HARM_SHAPE_GAIN_Q14);
        }
    }

    // Low-frequency shaping scales with the internal rate
    out.lf_ar_shp_q14 = LF_AR_SHP_Q14 - (16 - fs_khz as i32) * 256;
    out.lf_ma_shp_q14 = LF_MA_SHP_Q14;

    // Lambda falls as coding quality rises
    out.lambda_q10 = (1536 - coding_quality_q14 / 24).clamp(256, 2048);

    // Offset class: sparse unvoiced residual forces sparser excitation
    out.quant_offset_type = if signal_type != SignalType::Voiced
        && sparseness_q8(&res[..frame_len]) > SPARSENESS_THRESHOLD_Q8
    {
        QuantOffsetType::High
    } else {
        QuantOffsetType::Low
    };
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, period: f64, amp: f64) -> Vec<i16> {
        (0..len)
            .map(|i| (amp * (2.0 * std::f64::consts::PI * i as f64 / period).sin()) as i16)
            .collect()
    }

    #[test]
    fn test_gains_track_energy() {
        let x = tone(320, 20.0, 8000.0);
        let quiet = tone(320, 20.0, 400.0);
        let loud = noise_shape_analysis(
            &x, &x, 4, 80, 16, 16, SignalType::Unvoiced, 0, 128, 20 << 7, 8192,
        );
        let soft = noise_shape_analysis(
            &quiet, &quiet, 4, 80, 16, 16, SignalType::Unvoiced, 0, 128, 20 << 7, 8192,
        );
        for s in 0..4 {
            assert!(loud.gains_q16[s] > soft.gains_q16[s]);
        }
    }

    #[test]
    fn test_higher_snr_means_smaller_gain() {
        let x = tone(320, 20.0, 8000.0);
        let low = noise_shape_analysis(
            &x, &x, 4, 80, 16, 16, SignalType::Unvoiced, 0, 128, 10 << 7, 8192,
        );
        let high = noise_shape_analysis(
            &x, &x, 4, 80, 16, 16, SignalType::Unvoiced, 0, 128, 30 << 7, 8192,
        );
        for s in 0..4 {
            assert!(high.gains_q16[s] < low.gains_q16[s]);
        }
    }

    #[test]
    fn test_voiced_frames_get_harmonic_shaping() {
        let x = tone(320, 80.0, 6000.0);
        let r = noise_shape_analysis(
            &x, &x, 4, 80, 16, 16, SignalType::Voiced, 12_000, 200, 20 << 7, 8192,
        );
        for s in 0..4 {
            assert!(r.harm_shape_gain_q14[s] > 0);
            assert!(r.harm_shape_gain_q14[s] <= HARM_SHAPE_GAIN_Q14);
        }
        let u = noise_shape_analysis(
            &x, &x, 4, 80, 16, 16, SignalType::Unvoiced, 0, 200, 20 << 7, 8192,
        );
        assert_eq!(u.harm_shape_gain_q14[0], 0);
    }

    #[test]
    fn test_shape_filter_bounded() {
        let x = tone(320, 14.0, 11_000.0);
        let r = noise_shape_analysis(
            &x, &x, 4, 80, 16, 24, SignalType::Unvoiced, 0, 160, 18 << 7, 4096,
        );
        assert_eq!(r.shape_order, 24);
        assert!(r.ar_q13[..24].iter().any(|&c| c != 0));
        for &c in &r.ar_q13[..24] {
            assert!(c.abs() < 30_000, "shape coef {} too large", c);
        }
    }

    #[test]
    fn test_sparse_unvoiced_selects_high_offset() {
        // A couple of isolated spikes in a silent frame is maximally sparse
        let mut res = vec![0i16; 320];
        res[40] = 12_000;
        res[200] = -9_000;
        let r = noise_shape_analysis(
            &res.clone(),
            &res,
            4,
            80,
            16,
            16,
            SignalType::Unvoiced,
            0,
            100,
            20 << 7,
            4096,
        );
        assert_eq!(r.quant_offset_type, QuantOffsetType::High);
    }
}
