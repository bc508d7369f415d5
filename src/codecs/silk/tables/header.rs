//! Frame-type, seed and LBRR flag tables.

/// Frame type for frames without voice activity: (inactive, low offset)
/// and (inactive, high offset).
pub const FRAME_TYPE_INACTIVE_ICDF: &[u16] = &[256, 230, 0];

/// Frame type for active frames: (unvoiced, low), (unvoiced, high),
/// (voiced, low), (voiced, high).
pub const FRAME_TYPE_ACTIVE_ICDF: &[u16] = &[256, 232, 158, 10, 0];

/// Two-bit LCG seed, uniform.
pub const LCG_SEED_ICDF: &[u16] = &[256, 192, 128, 64, 0];

/// Per-frame LBRR flag bitmask for 40 ms packets (2 frames, symbols 1..=3).
pub const LBRR_FLAGS_2_ICDF: &[u16] = &[256, 203, 150, 0];

/// Per-frame LBRR flag bitmask for 60 ms packets (3 frames, symbols 1..=7).
pub const LBRR_FLAGS_3_ICDF: &[u16] = &[256, 215, 195, 166, 125, 110, 82, 0];

/// NLSF interpolation factor, Q2 values 0..=4.
pub const NLSF_INTERP_ICDF: &[u16] = &[256, 243, 221, 192, 181, 0];
