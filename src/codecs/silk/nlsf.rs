//! NLSF tools: LPC conversion, stabilization, interpolation and the
//! two-stage vector quantizer.
//!
//! NLSFs live in Q15 over (0, 32768), strictly increasing with a
//! per-coefficient minimum spacing. Conversion to and from prediction
//! coefficients goes through the symmetric P/Q polynomials evaluated on a
//! 129-point cosine grid.

use crate::codecs::silk::lpc::{bwexpander_32, lpc_fit, lpc_inverse_pred_gain, bwexpander};
use crate::codecs::silk::math::*;
use crate::codecs::silk::range::{RangeDecoder, RangeEncoder};
use crate::codecs::silk::tables::{
    NlsfCodebook, NLSF_EXT_ICDF, NLSF_QUANT_LEVEL_ADJ_Q10, NLSF_QUANT_MAX_AMPLITUDE,
};
use crate::codecs::silk::types::{MAX_LPC_ORDER, SignalType};

/// cos(pi * i / 128) in Q12, 129 entries.
pub const LSF_COS_TAB_Q12: [i32; 129] = [
    4096, 4095, 4091, 4085, 4076, 4065, 4052, 4036, 4017, 3996, 3973, 3948, 3920, 3889, 3857,
    3822, 3784, 3745, 3703, 3659, 3612, 3564, 3513, 3461, 3406, 3349, 3290, 3229, 3166, 3102,
    3035, 2967, 2896, 2824, 2751, 2675, 2598, 2520, 2440, 2359, 2276, 2191, 2106, 2019, 1931,
    1842, 1751, 1660, 1567, 1474, 1380, 1285, 1189, 1092, 995, 897, 799, 700, 601, 501, 401,
    301, 201, 101, 0, -101, -201, -301, -401, -501, -601, -700, -799, -897, -995, -1092, -1189,
    -1285, -1380, -1474, -1567, -1660, -1751, -1842, -1931, -2019, -2106, -2191, -2276, -2359,
    -2440, -2520, -2598, -2675, -2751, -2824, -2896, -2967, -3035, -3102, -3166, -3229, -3290,
    -3349, -3406, -3461, -3513, -3564, -3612, -3659, -3703, -3745, -3784, -3822, -3857, -3889,
    -3920, -3948, -3973, -3996, -4017, -4036, -4052, -4065, -4076, -4085, -4091, -4095, -4096,
];

/// Bisection steps per grid cell in the root search.
const BIN_DIV_STEPS: usize = 3;
/// Restarts with chirped coefficients before giving up on the root search.
const MAX_A2NLSF_TRIES: usize = 16;
/// Largest stage-2 amplitude including the extension range.
const NLSF_QUANT_FULL_RANGE: i32 = NLSF_QUANT_MAX_AMPLITUDE + 6;

#[inline]
fn eval_poly(p: &[i64], x_q16: i32, dd: usize) -> i32 {
    // Horner evaluation; coefficients Q16, x Q16
    let mut y: i64 = p[dd];
    for n in (0..dd).rev() {
        y = p[n] + ((y * x_q16 as i64) >> 16);
    }
    y.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn a2nlsf_init(a_q16: &[i64], p: &mut [i64], q: &mut [i64], dd: usize) {
    p[dd] = 1 << 16;
    q[dd] = 1 << 16;
    for k in 0..dd {
        p[k] = -a_q16[dd - k - 1] - a_q16[dd + k];
        q[k] = -a_q16[dd - k - 1] + a_q16[dd + k];
    }
    // Divide out the roots at z = 1 and z = -1
    for k in (1..=dd).rev() {
        p[k - 1] -= p[k];
        q[k - 1] += q[k];
    }
}

/// Convert prediction coefficients to NLSFs by locating the P/Q roots on
/// the cosine grid. Returns false if the roots could not all be found, in
/// which case `nlsf_q15` is left untouched.
pub fn lpc_to_nlsf(nlsf_q15: &mut [i16], a_q12: &[i16]) -> bool {
    let order = a_q12.len();
    debug_assert!(order % 2 == 0 && order <= MAX_LPC_ORDER);
    let dd = order / 2;
    let mut a_q16 = [0i64; MAX_LPC_ORDER];
    for (dst, &src) in a_q16.iter_mut().zip(a_q12.iter()) {
        *dst = (src as i64) << 4;
    }
    let mut found = [0i16; MAX_LPC_ORDER];
    for attempt in 0..MAX_A2NLSF_TRIES {
        let mut p = [0i64; MAX_LPC_ORDER / 2 + 1];
        let mut q = [0i64; MAX_LPC_ORDER / 2 + 1];
        a2nlsf_init(&a_q16[..order], &mut p, &mut q, dd);
        let mut root_ix = 0usize;
        let mut use_p = true;
        let mut xlo = LSF_COS_TAB_Q12[0] << 4;
        let mut ylo = eval_poly(&p, xlo, dd);
        if ylo < 0 {
            // Polynomial value at omega = 0 must be positive; flip once
            found[0] = 0;
            root_ix = 1;
            use_p = false;
            ylo = eval_poly(&q, xlo, dd);
        }
        let mut k = 1usize;
        while k <= 128 && root_ix < order {
            let xhi = LSF_COS_TAB_Q12[k] << 4;
            let poly: &[i64] = if use_p { &p } else { &q };
            let yhi = eval_poly(poly, xhi, dd);
            if (ylo <= 0 && yhi >= 0) || (ylo >= 0 && yhi <= 0) {
                // Root inside this cell: bisect, then interpolate
                let mut lo = xlo;
                let mut hi = xhi;
                let mut flo = ylo;
                let mut fhi = yhi;
                let mut frac = 0i32; // offset within the cell, Q8 over [0, 256)
                let mut width = 128i32;
                for _ in 0..BIN_DIV_STEPS {
                    let mid = (lo + hi) >> 1;
                    let fmid = eval_poly(poly, mid, dd);
                    if (flo <= 0 && fmid >= 0) || (flo >= 0 && fmid <= 0) {
                        hi = mid;
                        fhi = fmid;
                    } else {
                        lo = mid;
                        flo = fmid;
                        frac += width;
                    }
                    width >>= 1;
                }
                // Linear interpolation inside the remaining eighth
                let den = (flo.unsigned_abs() as i64 + fhi.unsigned_abs() as i64).max(1);
                let sub = ((flo.unsigned_abs() as i64) * (2 * width as i64) / den)
                    .clamp(0, 2 * width as i64) as i32;
                let nlsf = (((k - 1) as i32) << 8) + frac + sub;
                found[root_ix] = nlsf.clamp(1, 32_767) as i16;
                root_ix += 1;
                use_p = !use_p;
                // Restart from the left edge of this cell with the other poly
                xlo = LSF_COS_TAB_Q12[k - 1] << 4;
                let poly: &[i64] = if use_p { &p } else { &q };
                ylo = eval_poly(poly, xlo, dd);
                continue;
            }
            xlo = xhi;
            ylo = yhi;
            k += 1;
        }
        if root_ix == order {
            nlsf_q15[..order].copy_from_slice(&found[..order]);
            return true;
        }
        // Chirp the coefficients slightly and retry
        let chirp_q16 = 65_536 - (10 << attempt).min(4096);
        let mut a32 = [0i32; MAX_LPC_ORDER];
        for (dst, &src) in a32.iter_mut().zip(a_q16.iter()) {
            *dst = src as i32;
        }
        bwexpander_32(&mut a32[..order], chirp_q16);
        for (dst, &src) in a_q16.iter_mut().zip(a32.iter()) {
            *dst = src as i64;
        }
    }
    false
}

fn nlsf2a_find_poly(out: &mut [i64], c_lsf_q16: &[i64], dd: usize) {
    out[0] = 1i64 << 16;
    out[1] = -c_lsf_q16[0];
    for k in 1..dd {
        let f = c_lsf_q16[2 * k];
        out[k + 1] = (out[k - 1] << 1) - rshift_round64(f * out[k], 16);
        for n in (2..=k).rev() {
            out[n] += out[n - 2] - rshift_round64(f * out[n - 1], 16);
        }
        out[1] -= f;
    }
}

/// Convert NLSFs to Q12 prediction coefficients, guaranteed stable.
pub fn nlsf_to_lpc(a_q12: &mut [i16], nlsf_q15: &[i16]) {
    let order = nlsf_q15.len();
    debug_assert!(order % 2 == 0 && order <= MAX_LPC_ORDER);
    let dd = order / 2;
    // Cosine of each NLSF with linear interpolation on the 129-point grid
    let mut c_q16 = [0i64; MAX_LPC_ORDER];
    for (k, &nlsf) in nlsf_q15.iter().enumerate() {
        let f_int = (nlsf >> 8) as usize;
        let f_frac = (nlsf & 0xFF) as i64;
        let cos_val = LSF_COS_TAB_Q12[f_int] as i64;
        let delta = LSF_COS_TAB_Q12[f_int + 1] as i64 - cos_val;
        c_q16[k] = rshift_round64((cos_val << 8) + delta * f_frac, 4);
    }
    // Split even/odd roots into the P and Q polynomials
    let mut even = [0i64; MAX_LPC_ORDER];
    let mut odd = [0i64; MAX_LPC_ORDER];
    for k in 0..dd {
        even[2 * k] = c_q16[2 * k];
        odd[2 * k] = c_q16[2 * k + 1];
    }
    let mut p = [0i64; MAX_LPC_ORDER / 2 + 1];
    let mut q = [0i64; MAX_LPC_ORDER / 2 + 1];
    nlsf2a_find_poly(&mut p, &even, dd);
    nlsf2a_find_poly(&mut q, &odd, dd);
    let mut a32_q17 = [0i32; MAX_LPC_ORDER];
    for k in 0..dd {
        let ptmp = p[k + 1] + p[k];
        let qtmp = q[k + 1] - q[k];
        a32_q17[k] = (-qtmp - ptmp).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        a32_q17[order - k - 1] = (qtmp - ptmp).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    }
    // Q17 -> Q12 storage with magnitude fitting
    let mut a_q24 = [0i32; MAX_LPC_ORDER];
    for k in 0..order {
        a_q24[k] = lshift_sat32(a32_q17[k], 7);
    }
    lpc_fit(&mut a_q12[..order], &mut a_q24[..order]);
    // Guarantee stability with progressive bandwidth expansion
    let mut rounds = 0;
    while lpc_inverse_pred_gain(&a_q12[..order]) == 0 && rounds < 18 {
        bwexpander(&mut a_q12[..order], 65_536 - (2 << rounds).min(8192));
        rounds += 1;
    }
    if rounds == 18 {
        for c in a_q12.iter_mut() {
            *c = 0;
        }
    }
}

/// Enforce minimum spacing, clamp to [0, 32767] and keep order.
pub fn nlsf_stabilize(nlsf_q15: &mut [i16], delta_min_q15: &[u16]) {
    let order = nlsf_q15.len();
    debug_assert_eq!(delta_min_q15.len(), order + 1);
    for _ in 0..20 {
        // Most negative spacing violation, including both boundaries
        let mut min_diff = i32::MAX;
        let mut min_ix = 0usize;
        for i in 0..=order {
            let low = if i == 0 { 0 } else { nlsf_q15[i - 1] as i32 };
            let high = if i == order { 32_768 } else { nlsf_q15[i] as i32 };
            let diff = high - low - delta_min_q15[i] as i32;
            if diff < min_diff {
                min_diff = diff;
                min_ix = i;
            }
        }
        if min_diff >= 0 {
            return;
        }
        if min_ix == 0 {
            nlsf_q15[0] = delta_min_q15[0] as i16;
        } else if min_ix == order {
            nlsf_q15[order - 1] = (32_768 - delta_min_q15[order] as i32) as i16;
        } else {
            // Move the pair symmetrically about their constrained midpoint
            let min_center = {
                let mut c = 0i32;
                for &d in &delta_min_q15[..=min_ix] {
                    c += d as i32;
                }
                c - (delta_min_q15[min_ix] as i32 >> 1)
            };
            let max_center = {
                let mut c = 32_768i32;
                for &d in &delta_min_q15[min_ix + 1..] {
                    c -= d as i32;
                }
                c + (delta_min_q15[min_ix] as i32 >> 1)
            };
            let center = rshift_round(
                nlsf_q15[min_ix - 1] as i32 + nlsf_q15[min_ix] as i32,
                1,
            )
            .clamp(min_center, max_center);
            nlsf_q15[min_ix - 1] = (center - (delta_min_q15[min_ix] as i32 >> 1)) as i16;
            nlsf_q15[min_ix] =
                (nlsf_q15[min_ix - 1] as i32 + delta_min_q15[min_ix] as i32) as i16;
        }
    }
    // Fallback: sort and clamp from both ends
    nlsf_q15.sort_unstable();
    for i in 0..order {
        let low = if i == 0 { 0 } else { nlsf_q15[i - 1] as i32 };
        let floor = (low + delta_min_q15[i] as i32).min(32_767);
        nlsf_q15[i] = nlsf_q15[i].max(floor as i16);
    }
    for i in (0..order).rev() {
        let high = if i == order - 1 {
            32_768
        } else {
            nlsf_q15[i + 1] as i32
        };
        let ceil = (high - delta_min_q15[i + 1] as i32).max(0);
        nlsf_q15[i] = nlsf_q15[i].min(ceil as i16);
    }
}

/// Blend previous and current NLSFs with a Q2 factor; 4 returns current.
pub fn nlsf_interpolate(out_q15: &mut [i16], prev_q15: &[i16], cur_q15: &[i16], interp_q2: i32) {
    debug_assert!((0..=4).contains(&interp_q2));
    for i in 0..out_q15.len() {
        let d = cur_q15[i] as i32 - prev_q15[i] as i32;
        out_q15[i] = (prev_q15[i] as i32 + ((interp_q2 * d) >> 2)) as i16;
    }
}

/// Laroia spectral weights for the residual quantizer, Q9.
fn vq_weights_laroia(w_q9: &mut [i32], nlsf_q15: &[i16]) {
    let order = nlsf_q15.len();
    let mut prev = 0i32;
    for i in 0..order {
        let cur = nlsf_q15[i] as i32;
        let next = if i + 1 < order {
            nlsf_q15[i + 1] as i32
        } else {
            32_768
        };
        let d1 = (cur - prev).max(8);
        let d2 = (next - cur).max(8);
        // 1/d1 + 1/d2 in Q(9+15-15) = Q9 after the 2^24 numerator
        let w = (1 << 24) / d1 + (1 << 24) / d2;
        w_q9[i] = w.clamp(1 << 9, i16::MAX as i32);
        prev = cur;
    }
}

/// Dequantize the stage-2 residual with backward prediction; shared by the
/// encoder (to track the decoder state) and the decoder.
fn residual_dequant(out_q10: &mut [i32], indices: &[i8], cb: &NlsfCodebook) {
    let order = cb.order;
    let mut prev_q10 = 0i32;
    for i in (0..order).rev() {
        let pred_q10 = (prev_q10 * cb.pred_q8[i.min(order - 2)] as i32) >> 8;
        let mut level_q10 = (indices[i] as i32) << 10;
        if level_q10 > 0 {
            level_q10 -= NLSF_QUANT_LEVEL_ADJ_Q10;
        } else if level_q10 < 0 {
            level_q10 += NLSF_QUANT_LEVEL_ADJ_Q10;
        }
        let out = smlawb(pred_q10, level_q10, cb.quant_step_size_q16);
        out_q10[i] = out;
        prev_q10 = out;
    }
}

/// Reconstruct Q15 NLSFs from stage-1 + stage-2 indices.
pub fn nlsf_dequant(nlsf_q15: &mut [i16], indices: &[i8], cb: &NlsfCodebook) {
    let order = cb.order;
    let i1 = indices[0] as usize;
    let cb1 = cb.cb1_vector(i1);
    let mut res_q10 = [0i32; MAX_LPC_ORDER];
    residual_dequant(&mut res_q10[..order], &indices[1..1 + order], cb);
    let mut cb1_q15 = [0i16; MAX_LPC_ORDER];
    for (dst, &src) in cb1_q15.iter_mut().zip(cb1.iter()) {
        *dst = (src as i16) << 7;
    }
    let mut w_q9 = [0i32; MAX_LPC_ORDER];
    vq_weights_laroia(&mut w_q9[..order], &cb1_q15[..order]);
    for i in 0..order {
        let v = cb1_q15[i] as i32 + ((res_q10[i] << 14) / w_q9[i]);
        nlsf_q15[i] = v.clamp(0, 32_767) as i16;
    }
    nlsf_stabilize(&mut nlsf_q15[..order], cb.delta_min_q15);
}

/// Quantize `nlsf_q15` with the two-stage VQ. Writes the stage indices into
/// `indices[0..=order]` and replaces `nlsf_q15` with the quantized values.
pub fn nlsf_quantize(nlsf_q15: &mut [i16], indices: &mut [i8], cb: &NlsfCodebook) {
    let order = cb.order;
    nlsf_stabilize(&mut nlsf_q15[..order], cb.delta_min_q15);
    let mut w_q9 = [0i32; MAX_LPC_ORDER];
    vq_weights_laroia(&mut w_q9[..order], &nlsf_q15[..order]);
    // Stage 1: weighted full search
    let mut best_vec = 0usize;
    let mut best_err = i64::MAX;
    for v in 0..cb.n_vectors {
        let cb1 = cb.cb1_vector(v);
        let mut err: i64 = 0;
        for i in 0..order {
            let d = nlsf_q15[i] as i64 - ((cb1[i] as i64) << 7);
            err += (d * d * w_q9[i] as i64) >> 9;
        }
        if err < best_err {
            best_err = err;
            best_vec = v;
        }
    }
    indices[0] = best_vec as i8;
    // Stage 2: weighted residual, quantized backward with prediction
    let cb1 = cb.cb1_vector(best_vec);
    let mut cb1_q15 = [0i16; MAX_LPC_ORDER];
    for (dst, &src) in cb1_q15.iter_mut().zip(cb1.iter()) {
        *dst = (src as i16) << 7;
    }
    let mut w_cb_q9 = [0i32; MAX_LPC_ORDER];
    vq_weights_laroia(&mut w_cb_q9[..order], &cb1_q15[..order]);
    let mut res_q10 = [0i32; MAX_LPC_ORDER];
    for i in 0..order {
        let diff_q15 = nlsf_q15[i] as i32 - cb1_q15[i] as i32;
        res_q10[i] = (diff_q15 * w_cb_q9[i]) >> 14;
    }
    let mut prev_q10 = 0i32;
    for i in (0..order).rev() {
        let pred_q10 = (prev_q10 * cb.pred_q8[i.min(order - 2)] as i32) >> 8;
        let target_q10 = res_q10[i] - pred_q10;
        let mut q = rshift_round(target_q10 * cb.inv_quant_step_size_q6, 16);
        q = q.clamp(-NLSF_QUANT_FULL_RANGE, NLSF_QUANT_FULL_RANGE);
        indices[1 + i] = q as i8;
        // Track the decoder's reconstruction for the prediction chain
        let mut level_q10 = q << 10;
        if level_q10 > 0 {
            level_q10 -= NLSF_QUANT_LEVEL_ADJ_Q10;
        } else if level_q10 < 0 {
            level_q10 += NLSF_QUANT_LEVEL_ADJ_Q10;
        }
        prev_q10 = smlawb(pred_q10, level_q10, cb.quant_step_size_q16);
    }
    // Replace with the decoder-side reconstruction
    nlsf_dequant(&mut nlsf_q15[..order], &indices[..order + 1], cb);
}

/// Write stage-1 and stage-2 NLSF indices to the range encoder.
pub fn encode_nlsf_indices(
    enc: &mut RangeEncoder,
    indices: &[i8],
    signal_type: SignalType,
    cb: &NlsfCodebook,
) {
    let icdf = if signal_type == SignalType::Voiced {
        cb.cb1_icdf_voiced
    } else {
        cb.cb1_icdf_unvoiced
    };
    let i1 = indices[0] as usize;
    enc.encode_icdf(i1, icdf, 8);
    for i in 0..cb.order {
        let q = indices[1 + i] as i32;
        let sel = cb.ec_sel_for(i1, i);
        let table = cb.ec_icdf(sel);
        let max = NLSF_QUANT_MAX_AMPLITUDE;
        if q > max {
            enc.encode_icdf((2 * max) as usize, table, 8);
            enc.encode_icdf((q - max).min(6) as usize, NLSF_EXT_ICDF, 8);
        } else if q < -max {
            enc.encode_icdf(0, table, 8);
            enc.encode_icdf((-q - max).min(6) as usize, NLSF_EXT_ICDF, 8);
        } else {
            enc.encode_icdf((q + max) as usize, table, 8);
        }
    }
}

/// Read stage-1 and stage-2 NLSF indices from the range decoder.
pub fn decode_nlsf_indices(
    dec: &mut RangeDecoder<'_>,
    indices: &mut [i8],
    signal_type: SignalType,
    cb: &NlsfCodebook,
) {
    let icdf = if signal_type == SignalType::Voiced {
        cb.cb1_icdf_voiced
    } else {
        cb.cb1_icdf_unvoiced
    };
    let i1 = dec.decode_icdf(icdf, 8);
    indices[0] = i1 as i8;
    let max = NLSF_QUANT_MAX_AMPLITUDE;
    for i in 0..cb.order {
        let sel = cb.ec_sel_for(i1, i);
        let table = cb.ec_icdf(sel);
        let sym = dec.decode_icdf(table, 8) as i32;
        let q = if sym == 0 {
            -(max + dec.decode_icdf(NLSF_EXT_ICDF, 8) as i32)
        } else if sym == 2 * max {
            max + dec.decode_icdf(NLSF_EXT_ICDF, 8) as i32
        } else {
            sym - max
        };
        indices[1 + i] = q as i8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::silk::tables::{NLSF_CB_NB_MB, NLSF_CB_WB};

    fn spread_nlsf(order: usize) -> Vec<i16> {
        (0..order)
            .map(|i| ((i + 1) * 32_768 / (order + 1)) as i16)
            .collect()
    }

    #[test]
    fn test_stabilize_enforces_spacing() {
        let cb = &NLSF_CB_NB_MB;
        let mut nlsf = [5i16, 5, 100, 101, 4000, 4001, 9000, 20_000, 20_001, 32_700];
        nlsf_stabilize(&mut nlsf, cb.delta_min_q15);
        let mut prev = 0i32;
        for (i, &v) in nlsf.iter().enumerate() {
            assert!(
                v as i32 - prev >= cb.delta_min_q15[i] as i32,
                "spacing violated at {}: {:?}",
                i,
                nlsf
            );
            prev = v as i32;
        }
        assert!(32_768 - prev >= cb.delta_min_q15[10] as i32);
    }

    #[test]
    fn test_nlsf_lpc_roundtrip() {
        for order in [10usize, 16] {
            let nlsf = spread_nlsf(order);
            let mut a = [0i16; MAX_LPC_ORDER];
            nlsf_to_lpc(&mut a[..order], &nlsf);
            assert!(lpc_inverse_pred_gain(&a[..order]) > 0);
            let mut back = [0i16; MAX_LPC_ORDER];
            assert!(lpc_to_nlsf(&mut back[..order], &a[..order]));
            for (i, (&x, &y)) in nlsf.iter().zip(back.iter()).enumerate() {
                let err = (x as i32 - y as i32).abs();
                assert!(err < 1024, "coef {}: {} vs {}", i, x, y);
            }
        }
    }

    #[test]
    fn test_quantize_dequant_consistency() {
        for cb in [&NLSF_CB_NB_MB, &NLSF_CB_WB] {
            let order = cb.order;
            let mut nlsf: Vec<i16> = (0..order)
                .map(|i| (((i + 1) * 30_000 / (order + 1)) as i32 + (i as i32 % 3) * 120) as i16)
                .collect();
            let mut indices = [0i8; MAX_LPC_ORDER + 1];
            nlsf_quantize(&mut nlsf, &mut indices, cb);
            let mut decoded = vec![0i16; order];
            nlsf_dequant(&mut decoded, &indices[..order + 1], cb);
            assert_eq!(&nlsf[..order], &decoded[..]);
        }
    }

    #[test]
    fn test_index_roundtrip_through_range_coder() {
        let cb = &NLSF_CB_WB;
        let order = cb.order;
        let mut nlsf = spread_nlsf(order);
        for (i, v) in nlsf.iter_mut().enumerate() {
            *v += ((i as i32 * 37) % 240 - 120) as i16;
        }
        let mut indices = [0i8; MAX_LPC_ORDER + 1];
        nlsf_quantize(&mut nlsf, &mut indices, cb);
        let mut enc = RangeEncoder::new();
        encode_nlsf_indices(&mut enc, &indices[..order + 1], SignalType::Voiced, cb);
        let bytes = enc.finish();
        let mut dec = RangeDecoder::new(&bytes);
        let mut got = [0i8; MAX_LPC_ORDER + 1];
        decode_nlsf_indices(&mut dec, &mut got[..order + 1], SignalType::Voiced, cb);
        assert_eq!(&indices[..order + 1], &got[..order + 1]);
    }

    #[test]
    fn test_interpolation_endpoints() {
        let prev = [1000i16, 2000, 3000, 4000, 5000, 6000, 7000, 8000, 9000, 10_000];
        let cur = [1500i16, 2500, 3500, 4500, 5500, 6500, 7500, 8500, 9500, 10_500];
        let mut out = [0i16; 10];
        nlsf_interpolate(&mut out, &prev, &cur, 4);
        assert_eq!(out, cur);
        nlsf_interpolate(&mut out, &prev, &cur, 0);
        assert_eq!(out, prev);
        nlsf_interpolate(&mut out, &prev, &cur, 2);
        assert_eq!(out[0], 1250);
    }
}
