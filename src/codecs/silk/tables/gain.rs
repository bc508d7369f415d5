//! Gain quantization tables.
//!
//! Gains are coded in a log domain with 64 levels spanning
//! [`MIN_QGAIN_DB`, `MAX_QGAIN_DB`]. The first subframe of an independently
//! coded frame uses a 3-bit MSB (conditioned on signal type) plus a 3-bit
//! LSB; every other subframe codes a delta against the previous index.

/// Number of absolute gain levels.
pub const N_LEVELS_QGAIN: i32 = 64;
/// Lowest quantized gain in dB.
pub const MIN_QGAIN_DB: i32 = 2;
/// Highest quantized gain in dB.
pub const MAX_QGAIN_DB: i32 = 88;
/// Most negative gain delta.
pub const MIN_DELTA_GAIN_QUANT: i32 = -4;
/// Most positive gain delta.
pub const MAX_DELTA_GAIN_QUANT: i32 = 36;

/// Gain index MSB, by signal type: inactive, unvoiced, voiced.
pub const GAIN_MSB_ICDF: [&[u16]; 3] = [
    &[256, 224, 112, 44, 15, 3, 2, 1, 0],
    &[256, 254, 237, 192, 132, 70, 23, 4, 0],
    &[256, 255, 252, 226, 155, 61, 11, 2, 0],
];

/// Gain index LSB, uniform over 8 values.
pub const GAIN_LSB_ICDF: &[u16] = &[256, 224, 192, 160, 128, 96, 64, 32, 0];

/// Gain delta, symbols 0..=40 mapping to deltas -4..=36.
pub const GAIN_DELTA_ICDF: &[u16] = &[
    256, 250, 245, 234, 203, 71, 50, 42, 38, 35, 33, 31, 29, 28, 27, 26, 25, 24, 23, 22, 21, 20,
    19, 18, 17, 16, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0,
];
