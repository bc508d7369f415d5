//! Core SILK types and sizing constants.
//!
//! Frame geometry follows RFC 6716: an internal frame is 10 or 20 ms at an
//! internal rate of 8, 12 or 16 kHz, split into 5 ms subframes. A packet
//! carries 1 to 3 internal frames per channel.

/// Subframe duration in milliseconds.
pub const SUB_FRAME_MS: usize = 5;

/// Maximum subframes per internal frame (20 ms frame).
pub const MAX_NB_SUBFR: usize = 4;

/// Internal frame duration in ms for a full-length frame.
pub const MAX_FRAME_MS: usize = 20;

/// Highest internal sample rate in kHz (WB).
pub const MAX_FS_KHZ: usize = 16;

/// Maximum samples in one internal frame (20 ms at 16 kHz).
pub const MAX_FRAME_LENGTH: usize = MAX_FRAME_MS * MAX_FS_KHZ;

/// Maximum samples in one subframe (5 ms at 16 kHz).
pub const MAX_SUB_FRAME_LENGTH: usize = SUB_FRAME_MS * MAX_FS_KHZ;

/// LTP memory in milliseconds kept ahead of the current frame.
pub const LTP_MEM_LENGTH_MS: usize = 20;

/// Order of the long-term prediction filter.
pub const LTP_ORDER: usize = 5;

/// LPC order for NB and MB.
pub const MIN_LPC_ORDER: usize = 10;

/// LPC order for WB.
pub const MAX_LPC_ORDER: usize = 16;

/// Maximum noise-shaping AR order.
pub const MAX_SHAPE_LPC_ORDER: usize = 24;

/// Shell coder block length in samples.
pub const SHELL_CODEC_FRAME_LENGTH: usize = 16;

/// log2 of the shell coder block length.
pub const LOG2_SHELL_CODEC_FRAME_LENGTH: usize = 4;

/// Maximum coded pulse magnitude per sample before the LSB path.
pub const MAX_PULSES: usize = 16;

/// Number of rate levels for the pulse-count tables.
pub const N_RATE_LEVELS: usize = 10;

/// Delayed-decision NSQ: maximum number of competing states.
pub const MAX_DEL_DEC_STATES: usize = 4;

/// Delayed-decision NSQ: maximum decision delay in samples.
pub const DECISION_DELAY: usize = 40;

/// LCG used for dither and concealment noise.
pub const RAND_MULTIPLIER: i32 = 196_314_165;
/// LCG increment.
pub const RAND_INCREMENT: i32 = 907_633_515;

/// Advance the excitation LCG by one step.
#[inline]
pub fn rand_lcg(seed: i32) -> i32 {
    RAND_INCREMENT.wrapping_add(seed.wrapping_mul(RAND_MULTIPLIER))
}

/// Maximum internal frames per packet (60 ms / 20 ms).
pub const MAX_FRAMES_PER_PACKET: usize = 3;

/// SILK internal bandwidth, i.e. the internal sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bandwidth {
    /// Narrowband, 8 kHz.
    Narrow,
    /// Mediumband, 12 kHz.
    Medium,
    /// Wideband, 16 kHz.
    Wide,
}

impl Bandwidth {
    /// Internal sample rate in kHz.
    #[inline]
    pub fn fs_khz(self) -> usize {
        match self {
            Bandwidth::Narrow => 8,
            Bandwidth::Medium => 12,
            Bandwidth::Wide => 16,
        }
    }

    /// Internal sample rate in Hz.
    #[inline]
    pub fn fs_hz(self) -> u32 {
        (self.fs_khz() * 1000) as u32
    }

    /// Short-term prediction order at this bandwidth.
    #[inline]
    pub fn lpc_order(self) -> usize {
        match self {
            Bandwidth::Narrow | Bandwidth::Medium => MIN_LPC_ORDER,
            Bandwidth::Wide => MAX_LPC_ORDER,
        }
    }

    /// Table index used by per-bandwidth ICDF sets (NB/MB share tables).
    #[inline]
    pub fn table_index(self) -> usize {
        match self {
            Bandwidth::Narrow | Bandwidth::Medium => 0,
            Bandwidth::Wide => 1,
        }
    }
}

/// Frame classification carried in the frame-type symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalType {
    /// No voice activity.
    Inactive = 0,
    /// Active but aperiodic.
    Unvoiced = 1,
    /// Active and periodic; pitch and LTP parameters are coded.
    Voiced = 2,
}

impl SignalType {
    /// Build from the decoded frame-type symbol ordinal.
    pub fn from_ordinal(v: i32) -> Self {
        match v {
            0 => SignalType::Inactive,
            1 => SignalType::Unvoiced,
            _ => SignalType::Voiced,
        }
    }
}

/// Quantization offset class for the excitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantOffsetType {
    /// Denser excitation, smaller offset.
    Low = 0,
    /// Sparser excitation, larger offset.
    High = 1,
}

impl QuantOffsetType {
    /// Build from the decoded frame-type symbol ordinal.
    pub fn from_ordinal(v: i32) -> Self {
        if v == 0 {
            QuantOffsetType::Low
        } else {
            QuantOffsetType::High
        }
    }
}

/// Geometry derived from `(bandwidth, frame duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Internal bandwidth.
    pub bandwidth: Bandwidth,
    /// Internal rate in kHz.
    pub fs_khz: usize,
    /// Subframes per internal frame: 2 (10 ms) or 4 (20 ms).
    pub nb_subfr: usize,
    /// Samples per subframe at the internal rate.
    pub subfr_length: usize,
    /// Samples per internal frame at the internal rate.
    pub frame_length: usize,
    /// Short-term prediction order.
    pub lpc_order: usize,
    /// LTP memory length in samples at the internal rate.
    pub ltp_mem_length: usize,
}

impl FrameConfig {
    /// Build the geometry for a bandwidth and internal frame duration.
    pub fn new(bandwidth: Bandwidth, frame_ms: usize) -> Self {
        debug_assert!(frame_ms == 10 || frame_ms == 20);
        let fs_khz = bandwidth.fs_khz();
        let nb_subfr = frame_ms / SUB_FRAME_MS;
        let subfr_length = SUB_FRAME_MS * fs_khz;
        FrameConfig {
            bandwidth,
            fs_khz,
            nb_subfr,
            subfr_length,
            frame_length: nb_subfr * subfr_length,
            lpc_order: bandwidth.lpc_order(),
            ltp_mem_length: LTP_MEM_LENGTH_MS * fs_khz,
        }
    }
}

/// Quantization indices for one internal frame, the unit the parameter
/// codec reads and writes. The LBRR shadow slot holds the same structure.
#[derive(Debug, Clone, Copy)]
pub struct SideInfoIndices {
    /// Frame classification.
    pub signal_type: SignalType,
    /// Excitation offset class.
    pub quant_offset_type: QuantOffsetType,
    /// Per-subframe gain indices; absolute 6-bit in slot 0 when coded
    /// independently, deltas otherwise.
    pub gain_indices: [i8; MAX_NB_SUBFR],
    /// NLSF stage-1 index followed by per-coefficient stage-2 residuals.
    pub nlsf_indices: [i8; MAX_LPC_ORDER + 1],
    /// NLSF interpolation factor in Q2, 0..=4; 4 disables interpolation.
    pub nlsf_interp_q2: i8,
    /// Absolute pitch lag index (voiced only).
    pub lag_index: i16,
    /// Pitch contour codebook index (voiced only).
    pub contour_index: i8,
    /// LTP periodicity class: 0 low, 1 mid, 2 high (voiced only).
    pub per_index: i8,
    /// Per-subframe LTP codebook indices (voiced only).
    pub ltp_index: [i8; MAX_NB_SUBFR],
    /// LTP scaling index, coded on independent voiced frames.
    pub ltp_scale_index: i8,
    /// Two-bit LCG seed.
    pub seed: i8,
}

impl Default for SideInfoIndices {
    fn default() -> Self {
        SideInfoIndices {
            signal_type: SignalType::Inactive,
            quant_offset_type: QuantOffsetType::Low,
            gain_indices: [0; MAX_NB_SUBFR],
            nlsf_indices: [0; MAX_LPC_ORDER + 1],
            nlsf_interp_q2: 4,
            lag_index: 0,
            contour_index: 0,
            per_index: 0,
            ltp_index: [0; MAX_NB_SUBFR],
            ltp_scale_index: 0,
            seed: 0,
        }
    }
}

/// Condition under which a frame's parameters are coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingMode {
    /// No usable previous frame in this packet: absolute coding.
    Independent,
    /// Previous frame in the packet was coded: delta coding allowed.
    Conditional,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_config_geometry() {
        let wb = FrameConfig::new(Bandwidth::Wide, 20);
        assert_eq!(wb.frame_length, 320);
        assert_eq!(wb.subfr_length, 80);
        assert_eq!(wb.nb_subfr, 4);
        assert_eq!(wb.lpc_order, 16);

        let nb = FrameConfig::new(Bandwidth::Narrow, 10);
        assert_eq!(nb.frame_length, 80);
        assert_eq!(nb.subfr_length, 40);
        assert_eq!(nb.nb_subfr, 2);
        assert_eq!(nb.lpc_order, 10);

        let mb = FrameConfig::new(Bandwidth::Medium, 20);
        assert_eq!(mb.frame_length, 240);
        assert_eq!(mb.subfr_length, 60);
    }

    #[test]
    fn test_lcg_sequence_is_deterministic() {
        let mut seed = 3;
        let a = rand_lcg(seed);
        seed = a;
        let b = rand_lcg(seed);
        assert_eq!(a, rand_lcg(3));
        assert_ne!(a, b);
    }
}
