//! Long-term prediction filter codebooks and tables.
//!
//! Three codebooks of 5-tap filters in Q7, selected by the periodicity
//! class: 8 entries for weakly periodic frames, 16 for moderately periodic,
//! 32 for strongly periodic. One class symbol is coded per frame, one
//! codebook index per subframe.

use crate::codecs::silk::types::LTP_ORDER;

/// Periodicity class: low, mid, high.
pub const LTP_PER_INDEX_ICDF: &[u16] = &[256, 179, 99, 0];

/// LTP codebook sizes per periodicity class.
pub const LTP_NB_CBKS: [usize; 3] = [8, 16, 32];

/// Codebook index ICDFs per periodicity class.
pub const LTP_GAIN_ICDF: [&[u16]; 3] = [
    &[256, 241, 225, 208, 87, 41, 20, 10, 0],
    &[
        256, 245, 233, 215, 191, 163, 128, 75, 52, 37, 26, 18, 12, 8, 5, 2, 0,
    ],
    &[
        256, 253, 249, 244, 238, 231, 223, 214, 203, 190, 178, 166, 154, 132, 110, 92, 77, 64, 53,
        44, 36, 29, 23, 18, 14, 11, 8, 6, 4, 3, 2, 1, 0,
    ],
];

/// Low-periodicity codebook, Q7.
pub const LTP_GAIN_VQ_0: [[i8; LTP_ORDER]; 8] = [
    [4, 6, 24, 7, 5],
    [0, 0, 2, 0, 0],
    [12, 28, 41, 13, -4],
    [-9, 15, 42, 25, 14],
    [1, -2, 62, 41, -9],
    [-10, 37, 65, -4, 3],
    [-6, 4, 66, 7, -8],
    [16, 14, 38, -3, 33],
];

/// Mid-periodicity codebook, Q7.
pub const LTP_GAIN_VQ_1: [[i8; LTP_ORDER]; 16] = [
    [13, 22, 39, 23, 12],
    [-1, 36, 64, 27, -6],
    [-7, 10, 55, 43, 17],
    [1, 1, 8, 1, 1],
    [6, -11, 74, 53, -9],
    [-12, 55, 76, -12, 8],
    [-3, 3, 93, 27, -4],
    [26, 39, 59, 3, -8],
    [2, 0, 77, 11, 9],
    [-8, 22, 44, -6, 7],
    [40, 9, 26, 3, 9],
    [-7, 20, 101, -7, 4],
    [3, -8, 42, 26, 0],
    [-15, 33, 68, 2, 23],
    [-2, 55, 46, -2, 15],
    [3, -1, 21, 16, 41],
];

/// High-periodicity codebook, Q7.
pub const LTP_GAIN_VQ_2: [[i8; LTP_ORDER]; 32] = [
    [-6, 27, 61, 39, 5],
    [-11, 42, 88, 4, 1],
    [-2, 60, 65, 6, -4],
    [-1, -5, 73, 56, 1],
    [-9, 19, 94, 29, -9],
    [0, 12, 99, 6, 4],
    [8, -19, 102, 46, -13],
    [3, 2, 13, 3, 2],
    [9, -21, 84, 72, -18],
    [-11, 46, 104, -22, 8],
    [18, 38, 48, 23, 0],
    [-16, 70, 83, -21, 11],
    [5, -11, 117, 22, -8],
    [-6, 23, 117, -12, 3],
    [3, -8, 95, 28, 4],
    [-10, 15, 77, 60, -15],
    [-1, 4, 124, 2, -4],
    [3, 38, 84, 24, -25],
    [2, 13, 42, 13, 31],
    [21, -4, 56, 46, -1],
    [-1, 35, 79, -13, 19],
    [-7, 65, 88, -9, -14],
    [20, 4, 81, 49, -29],
    [20, 0, 75, 3, -17],
    [5, -9, 44, 92, -8],
    [1, -3, 22, 69, 31],
    [-6, 95, 41, -12, 5],
    [39, 67, 16, -4, 1],
    [0, -6, 120, 55, -36],
    [-13, 44, 122, 4, -24],
    [81, 5, 11, 3, 7],
    [2, 0, 9, 10, 88],
];

/// LTP scale index ICDF, coded on the first independently coded voiced frame.
pub const LTP_SCALE_ICDF: &[u16] = &[256, 128, 64, 0];

/// LTP scale factors in Q14 matching the scale index.
pub const LTP_SCALES_Q14: [i16; 3] = [15565, 12288, 8192];

/// Fetch a codebook row for `(periodicity class, codebook index)`.
#[inline]
pub fn ltp_vq_row(per_index: usize, cb_index: usize) -> &'static [i8; LTP_ORDER] {
    match per_index {
        0 => &LTP_GAIN_VQ_0[cb_index],
        1 => &LTP_GAIN_VQ_1[cb_index],
        _ => &LTP_GAIN_VQ_2[cb_index],
    }
}
