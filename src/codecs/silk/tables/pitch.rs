//! Pitch lag and contour tables.
//!
//! The absolute lag is split into a 32-symbol high part and a uniform
//! low part whose size depends on the bandwidth (4/6/8 for NB/MB/WB),
//! covering lags from 2 ms to 18 ms. Conditionally coded frames send a
//! delta symbol instead; delta symbol 0 escapes back to absolute coding.

/// High part of the absolute pitch lag index.
pub const PITCH_LAG_HI_ICDF: &[u16] = &[
    256, 253, 249, 245, 240, 234, 227, 219, 210, 199, 187, 173, 158, 143, 128, 113, 98, 84, 72,
    61, 52, 44, 37, 31, 26, 22, 18, 15, 12, 9, 6, 3, 0,
];

/// Low part of the absolute lag, uniform; indexed by bandwidth
/// (NB, MB, WB with 4, 6 and 8 values).
pub const PITCH_LAG_LO_ICDF: [&[u16]; 3] = [
    &[256, 192, 128, 64, 0],
    &[256, 214, 172, 129, 86, 43, 0],
    &[256, 224, 192, 160, 128, 96, 64, 32, 0],
];

/// Lag delta for conditionally coded frames: symbol 0 escapes to
/// absolute coding, symbols 1..=15 map to deltas -7..=7.
pub const PITCH_DELTA_ICDF: &[u16] = &[
    256, 238, 236, 234, 232, 229, 220, 195, 148, 90, 43, 18, 9, 6, 4, 2, 0,
];

/// Per-subframe lag offsets for 10 ms frames (2 subframes).
pub const PITCH_CONTOUR_2SF: [[i8; 2]; 12] = [
    [0, 0],
    [0, 1],
    [1, 0],
    [-1, 0],
    [0, -1],
    [1, 1],
    [-1, -1],
    [-1, 1],
    [1, -1],
    [0, 2],
    [2, 0],
    [-2, 0],
];

/// Contour index for 10 ms frames.
pub const PITCH_CONTOUR_2SF_ICDF: &[u16] = &[
    256, 204, 170, 136, 114, 92, 76, 62, 48, 34, 22, 11, 0,
];

/// Per-subframe lag offsets for 20 ms NB/MB frames.
pub const PITCH_CONTOUR_4SF_NB: [[i8; 4]; 11] = [
    [0, 0, 0, 0],
    [0, 0, 0, 1],
    [1, 0, 0, 0],
    [0, 0, 1, 1],
    [1, 1, 0, 0],
    [-1, 0, 0, 0],
    [0, 0, 0, -1],
    [1, 1, 2, 2],
    [-1, -1, 0, 1],
    [2, 1, 0, -1],
    [-2, -1, 0, 1],
];

/// Contour index for 20 ms NB/MB frames.
pub const PITCH_CONTOUR_4SF_NB_ICDF: &[u16] = &[
    256, 199, 164, 129, 103, 77, 57, 37, 25, 14, 7, 0,
];

/// Per-subframe lag offsets for 20 ms WB frames.
pub const PITCH_CONTOUR_4SF_WB: [[i8; 4]; 34] = [
    [0, 0, 0, 0],
    [1, -1, -1, 1],
    [-1, 1, 1, -1],
    [2, -2, -2, 2],
    [-2, 2, 2, -2],
    [-1, 0, 0, 1],
    [0, -1, 0, 2],
    [-2, 0, 1, 0],
    [1, -2, -1, 3],
    [-3, 1, 2, -1],
    [1, 0, 0, -1],
    [2, 0, -1, 0],
    [0, 1, 0, -2],
    [3, -1, -2, 1],
    [-1, 2, 1, -3],
    [-2, -1, 1, 2],
    [-1, -1, 0, 3],
    [-3, 0, 1, 1],
    [0, -2, -1, 4],
    [-4, 1, 2, 0],
    [2, 1, -1, -2],
    [3, 0, -1, -1],
    [1, 1, 0, -3],
    [4, -1, -2, 0],
    [0, 2, 1, -4],
    [-3, -1, 1, 3],
    [-2, -2, 0, 4],
    [-4, 0, 2, 2],
    [-1, -3, -1, 4],
    [-4, 1, 3, 1],
    [3, 1, -1, -3],
    [4, 0, -2, -2],
    [2, 2, 0, -4],
    [4, -1, -3, -1],
];

/// Contour index for 20 ms WB frames.
pub const PITCH_CONTOUR_4SF_WB_ICDF: &[u16] = &[
    256, 224, 202, 180, 164, 148, 135, 122, 112, 102, 94, 86, 79, 72, 66, 60, 55, 50, 46, 42,
    38, 34, 30, 26, 23, 20, 17, 14, 12, 10, 8, 6, 4, 2, 0,
];

/// Shortest coded lag in milliseconds.
pub const PE_MIN_LAG_MS: usize = 2;
/// Longest coded lag in milliseconds.
pub const PE_MAX_LAG_MS: usize = 18;

/// Size of the uniform low part of the lag index per bandwidth table index
/// (NB/MB share the lag grid scale through their own entries).
pub const PITCH_LAG_LO_SIZE: [usize; 3] = [4, 6, 8];
