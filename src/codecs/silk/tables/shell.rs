//! Shell coder tables: rate levels, pulse counts, binary splits,
//! LSBs and signs.

use crate::codecs::silk::types::SHELL_CODEC_FRAME_LENGTH;

/// Rate level per frame; first table for inactive/unvoiced frames,
/// second for voiced.
pub const RATE_LEVEL_ICDF: [&[u16]; 2] = [
    &[256, 241, 190, 178, 132, 87, 74, 41, 14, 0],
    &[256, 223, 193, 157, 140, 106, 57, 39, 18, 0],
];

/// Pulse count per 16-sample block, 18 symbols; symbol 17 escapes to
/// the LSB path. Tables 0..=8 are selected by the rate level, tables 9
/// and 10 code the re-tries while LSB depth accumulates.
pub const PULSE_COUNT_ICDF: [&[u16]; 11] = [
    &[256, 125, 51, 26, 18, 15, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
    &[256, 198, 105, 45, 22, 15, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
    &[256, 213, 162, 116, 83, 59, 43, 32, 24, 18, 15, 12, 9, 7, 6, 5, 3, 2, 0],
    &[256, 239, 187, 116, 59, 28, 16, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
    &[256, 250, 229, 188, 135, 86, 51, 30, 19, 13, 10, 8, 6, 5, 4, 3, 2, 1, 0],
    &[256, 249, 235, 213, 185, 156, 128, 103, 83, 66, 53, 42, 33, 26, 21, 17, 13, 10, 0],
    &[256, 254, 249, 235, 206, 164, 118, 77, 46, 27, 16, 10, 7, 5, 4, 3, 2, 1, 0],
    &[256, 255, 253, 249, 239, 220, 191, 156, 119, 85, 57, 37, 23, 15, 10, 6, 4, 2, 0],
    &[256, 255, 253, 251, 246, 237, 223, 203, 179, 152, 124, 98, 75, 55, 40, 29, 21, 15, 0],
    &[256, 255, 254, 253, 247, 220, 162, 106, 67, 42, 28, 18, 12, 9, 6, 4, 3, 2, 0],
    &[256, 254, 253, 247, 220, 162, 106, 67, 42, 28, 18, 12, 9, 6, 4, 3, 2, 1, 0],
];

/// One low-order bit of a pulse magnitude.
pub const LSB_ICDF: &[u16] = &[256, 120, 0];

/// Sign probability (Q8 ICDF midpoint) indexed by
/// `(signal_type * 2 + quant_offset_type) * 7 + pulse_class`, where the
/// pulse class saturates at 6.
pub const SIGN_ICDF_PROB: [u16; 42] = [
    254, 49, 67, 77, 82, 93, 99, 198, 11, 18, 24, 31, 36, 45, 255, 46, 66, 78, 87, 94, 104,
    208, 14, 21, 32, 42, 51, 66, 255, 94, 104, 109, 112, 115, 118, 248, 53, 69, 80, 88, 95,
    102,
];

/// Offsets of the per-parent-sum sub-tables inside the split tables.
/// The sub-table for parent sum `n` starts at `SHELL_SPLIT_OFFSETS[n - 1]`
/// and holds `n + 2` entries.
pub const SHELL_SPLIT_OFFSETS: [usize; 17] = [
    0, 3, 7, 12, 18, 25, 33, 42, 52, 63, 75, 88, 102, 117, 133, 150, 168,
];

/// Split table for partitions of length 8.
pub const SHELL_SPLIT_LVL0: [u16; 168] = [
    256, 128, 0, 256, 188, 68, 0, 256, 219, 128, 37, 0, 256, 236, 173, 83, 20, 0, 256, 245,
    203, 128, 53, 11, 0, 256, 249, 222, 164, 92, 34, 7, 0, 256, 252, 235, 193, 128, 63, 21, 4,
    0, 256, 253, 242, 212, 160, 97, 44, 14, 3, 0, 256, 254, 247, 227, 186, 128, 70, 29, 9, 2,
    0, 256, 254, 249, 235, 204, 156, 100, 52, 21, 7, 2, 0, 256, 255, 252, 243, 221, 181, 128,
    75, 35, 13, 4, 1, 0, 256, 255, 253, 247, 231, 200, 154, 102, 56, 25, 9, 3, 1, 0, 256, 255,
    253, 249, 238, 215, 177, 128, 79, 41, 18, 7, 3, 1, 0, 256, 255, 254, 251, 243, 226, 195,
    152, 104, 61, 30, 13, 5, 2, 1, 0, 256, 255, 254, 252, 246, 233, 209, 173, 128, 83, 47, 23,
    10, 4, 2, 1, 0, 256, 255, 254, 252, 248, 239, 221, 191, 150, 105, 65, 35, 17, 8, 4, 2, 1,
    0,
];

/// Split table for partitions of length 4.
pub const SHELL_SPLIT_LVL1: [u16; 168] = [
    256, 128, 0, 256, 185, 71, 0, 256, 214, 128, 42, 0, 256, 231, 169, 87, 25, 0, 256, 241,
    197, 128, 59, 15, 0, 256, 246, 216, 161, 95, 40, 10, 0, 256, 250, 230, 188, 128, 68, 26, 6,
    0, 256, 252, 238, 207, 157, 99, 49, 18, 4, 0, 256, 253, 243, 220, 180, 128, 76, 36, 13, 3,
    0, 256, 254, 247, 230, 199, 154, 102, 57, 26, 9, 2, 0, 256, 254, 249, 237, 213, 175, 128,
    81, 43, 19, 7, 2, 0, 256, 255, 252, 243, 225, 194, 152, 104, 62, 31, 13, 4, 1, 0, 256, 255,
    252, 246, 232, 207, 171, 128, 85, 49, 24, 10, 4, 1, 0, 256, 255, 253, 248, 238, 219, 189,
    150, 106, 67, 37, 18, 8, 3, 1, 0, 256, 255, 253, 250, 242, 227, 202, 168, 128, 88, 54, 29,
    14, 6, 3, 1, 0, 256, 255, 254, 251, 245, 234, 214, 185, 148, 108, 71, 42, 22, 11, 5, 2, 1,
    0,
];

/// Split table for partitions of length 2.
pub const SHELL_SPLIT_LVL2: [u16; 168] = [
    256, 128, 0, 256, 181, 75, 0, 256, 209, 128, 47, 0, 256, 226, 165, 91, 30, 0, 256, 236,
    191, 128, 65, 20, 0, 256, 242, 209, 158, 99, 47, 14, 0, 256, 246, 222, 181, 128, 75, 34,
    10, 0, 256, 249, 231, 199, 153, 103, 57, 25, 7, 0, 256, 251, 238, 213, 175, 128, 81, 43,
    18, 5, 0, 256, 252, 242, 223, 192, 151, 105, 64, 33, 14, 4, 0, 256, 253, 246, 231, 206,
    170, 128, 86, 50, 25, 10, 3, 0, 256, 254, 249, 238, 218, 188, 149, 107, 68, 38, 18, 7, 2,
    0, 256, 254, 250, 241, 225, 200, 167, 128, 89, 56, 31, 15, 6, 2, 0, 256, 254, 251, 244,
    231, 210, 181, 147, 110, 75, 46, 25, 12, 5, 2, 0, 256, 255, 252, 247, 237, 220, 195, 163,
    128, 93, 61, 36, 19, 9, 4, 1, 0, 256, 255, 253, 249, 241, 227, 206, 178, 145, 111, 78, 50,
    29, 15, 7, 3, 1, 0,
];

/// Split table for partitions of length 1.
pub const SHELL_SPLIT_LVL3: [u16; 168] = [
    256, 128, 0, 256, 178, 78, 0, 256, 204, 128, 52, 0, 256, 219, 161, 95, 37, 0, 256, 230,
    185, 128, 71, 26, 0, 256, 237, 202, 154, 101, 54, 19, 0, 256, 241, 214, 175, 128, 81, 42,
    15, 0, 256, 245, 223, 191, 150, 106, 65, 33, 11, 0, 256, 247, 230, 203, 168, 128, 88, 53,
    26, 9, 0, 256, 249, 235, 213, 183, 147, 109, 73, 43, 21, 7, 0, 256, 251, 240, 222, 196,
    164, 128, 92, 60, 34, 16, 5, 0, 256, 252, 243, 228, 206, 178, 145, 111, 78, 50, 28, 13, 4,
    0, 256, 252, 245, 233, 215, 190, 160, 128, 96, 66, 41, 23, 11, 4, 0, 256, 253, 247, 237,
    222, 201, 174, 144, 112, 82, 55, 34, 19, 9, 3, 0, 256, 254, 249, 241, 228, 210, 186, 158,
    128, 98, 70, 46, 28, 15, 7, 2, 0, 256, 254, 250, 243, 232, 216, 195, 170, 142, 114, 86, 61,
    40, 24, 13, 6, 2, 0,
];

/// Sub-ICDF for splitting `parent` pulses at the given partition level
/// (0 splits 16 into 8+8, 3 splits 2 into 1+1).
pub fn shell_split_icdf(level: usize, parent: usize) -> &'static [u16] {
    debug_assert!((1..=SHELL_CODEC_FRAME_LENGTH).contains(&parent));
    let start = SHELL_SPLIT_OFFSETS[parent - 1];
    let end = start + parent + 2;
    match level {
        0 => &SHELL_SPLIT_LVL0[start..end],
        1 => &SHELL_SPLIT_LVL1[start..end],
        2 => &SHELL_SPLIT_LVL2[start..end],
        _ => &SHELL_SPLIT_LVL3[start..end],
    }
}
