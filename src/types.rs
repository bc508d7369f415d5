//! Core types for the SILK codec library.
//!
//! This module defines the public configuration surface: the API sample
//! rates the boundary resampler accepts, and the builder-style encoder
//! configuration covering every option the encoder recognizes.

use crate::codecs::silk::types::Bandwidth;
use crate::error::{CodecError, Result};
use std::fmt;

/// Sample rates accepted at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRate {
    /// 8 kHz (narrowband telephony)
    Rate8000,
    /// 12 kHz
    Rate12000,
    /// 16 kHz (wideband)
    Rate16000,
    /// 24 kHz
    Rate24000,
    /// 48 kHz (full-band I/O)
    Rate48000,
}

impl SampleRate {
    /// Get the sample rate value in Hz.
    pub fn hz(self) -> u32 {
        match self {
            Self::Rate8000 => 8000,
            Self::Rate12000 => 12_000,
            Self::Rate16000 => 16_000,
            Self::Rate24000 => 24_000,
            Self::Rate48000 => 48_000,
        }
    }

    /// Create from a Hz value.
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            8000 => Some(Self::Rate8000),
            12_000 => Some(Self::Rate12000),
            16_000 => Some(Self::Rate16000),
            24_000 => Some(Self::Rate24000),
            48_000 => Some(Self::Rate48000),
            _ => None,
        }
    }

    /// All rates the API accepts.
    pub fn supported() -> &'static [u32] {
        &[8000, 12_000, 16_000, 24_000, 48_000]
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

/// Encoder configuration, built with `with_*` methods.
///
/// ```rust
/// use silk_core::types::SilkConfig;
/// use silk_core::codecs::silk::Bandwidth;
///
/// let config = SilkConfig::new(Bandwidth::Wide)
///     .with_sample_rate(16_000)
///     .with_bitrate(24_000)
///     .with_frame_ms(20)
///     .with_complexity(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SilkConfig {
    /// Internal bandwidth: sets the internal rate, LPC order, NLSF
    /// codebook and pitch range.
    pub bandwidth: Bandwidth,
    /// PCM rate at the API boundary, Hz.
    pub sample_rate_hz: u32,
    /// Target bitrate in bits per second.
    pub bitrate_bps: u32,
    /// Frame duration fed per encode call: 10, 20, 40 or 60 ms.
    pub frame_ms: u32,
    /// Variable vs. constant bitrate.
    pub vbr: bool,
    /// Complexity 0..=10; raises the delayed-decision state count and
    /// widens the pitch search.
    pub complexity: i32,
    /// Stereo predictor smoothing depth.
    pub complexity_stereo: i32,
    /// Allow empty payloads for sustained inactive input.
    pub use_dtx: bool,
    /// Expected packet loss in percent; arms LBRR and scales its gains.
    pub packet_loss_perc: i32,
    /// Force LBRR on regardless of the loss estimate.
    pub lbrr_enabled: bool,
    /// Code two channels with mid/side prediction.
    pub stereo: bool,
}

impl SilkConfig {
    /// Default configuration for a bandwidth: API rate matching the
    /// internal rate, 20 ms frames, VBR.
    pub fn new(bandwidth: Bandwidth) -> Self {
        SilkConfig {
            bandwidth,
            sample_rate_hz: bandwidth.fs_hz(),
            bitrate_bps: 24_000,
            frame_ms: 20,
            vbr: true,
            complexity: 5,
            complexity_stereo: 5,
            use_dtx: false,
            packet_loss_perc: 0,
            lbrr_enabled: false,
            stereo: false,
        }
    }

    /// Set the API sample rate in Hz.
    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate_hz = hz;
        self
    }

    /// Set the target bitrate.
    pub fn with_bitrate(mut self, bps: u32) -> Self {
        self.bitrate_bps = bps;
        self
    }

    /// Set the frame duration per encode call.
    pub fn with_frame_ms(mut self, ms: u32) -> Self {
        self.frame_ms = ms;
        self
    }

    /// Enable or disable VBR.
    pub fn with_vbr(mut self, vbr: bool) -> Self {
        self.vbr = vbr;
        self
    }

    /// Set the complexity, 0..=10.
    pub fn with_complexity(mut self, complexity: i32) -> Self {
        self.complexity = complexity;
        self
    }

    /// Set the stereo predictor smoothing complexity.
    pub fn with_complexity_stereo(mut self, complexity: i32) -> Self {
        self.complexity_stereo = complexity;
        self
    }

    /// Enable or disable DTX.
    pub fn with_dtx(mut self, dtx: bool) -> Self {
        self.use_dtx = dtx;
        self
    }

    /// Set the expected packet loss percentage.
    pub fn with_packet_loss(mut self, perc: i32) -> Self {
        self.packet_loss_perc = perc;
        self
    }

    /// Force LBRR on or off.
    pub fn with_lbrr(mut self, enabled: bool) -> Self {
        self.lbrr_enabled = enabled;
        self
    }

    /// Enable stereo coding.
    pub fn with_stereo(mut self, stereo: bool) -> Self {
        self.stereo = stereo;
        self
    }

    /// Check every field against its legal range.
    pub fn validate(&self) -> Result<()> {
        if SampleRate::from_hz(self.sample_rate_hz).is_none() {
            return Err(CodecError::InvalidSampleRate {
                rate: self.sample_rate_hz,
                supported: SampleRate::supported().to_vec(),
            });
        }
        if self.sample_rate_hz < self.bandwidth.fs_hz() {
            // The boundary resampler only narrows towards the internal rate
            return Err(CodecError::InvalidSampleRate {
                rate: self.sample_rate_hz,
                supported: SampleRate::supported()
                    .iter()
                    .copied()
                    .filter(|&r| r >= self.bandwidth.fs_hz())
                    .collect(),
            });
        }
        if ![10, 20, 40, 60].contains(&self.frame_ms) {
            return Err(CodecError::InvalidFrameSize {
                expected: 20,
                actual: self.frame_ms as usize,
            });
        }
        if !(5_000..=200_000).contains(&self.bitrate_bps) {
            return Err(CodecError::InvalidBitrate {
                bitrate: self.bitrate_bps,
                min: 5_000,
                max: 200_000,
            });
        }
        if !(0..=10).contains(&self.complexity) || !(0..=10).contains(&self.complexity_stereo) {
            return Err(CodecError::InvalidConfig {
                details: format!("complexity {} out of 0..=10", self.complexity),
            });
        }
        if !(0..=100).contains(&self.packet_loss_perc) {
            return Err(CodecError::InvalidConfig {
                details: format!("packet_loss_perc {} out of 0..=100", self.packet_loss_perc),
            });
        }
        Ok(())
    }
}

/// Codec identification for registry listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    /// Codec name.
    pub name: &'static str,
    /// Internal sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u8,
    /// Configured bitrate in bits per second.
    pub bitrate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        for bw in [Bandwidth::Narrow, Bandwidth::Medium, Bandwidth::Wide] {
            assert!(SilkConfig::new(bw).validate().is_ok());
        }
    }

    #[test]
    fn test_bad_sample_rate_rejected() {
        let cfg = SilkConfig::new(Bandwidth::Wide).with_sample_rate(44_100);
        assert!(matches!(
            cfg.validate(),
            Err(CodecError::InvalidSampleRate { .. })
        ));
    }

    #[test]
    fn test_rate_below_internal_rejected() {
        let cfg = SilkConfig::new(Bandwidth::Wide).with_sample_rate(8_000);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_frame_ms_rejected() {
        let cfg = SilkConfig::new(Bandwidth::Narrow).with_frame_ms(25);
        assert!(matches!(
            cfg.validate(),
            Err(CodecError::InvalidFrameSize { .. })
        ));
    }

    #[test]
    fn test_sample_rate_roundtrip() {
        for &hz in SampleRate::supported() {
            assert_eq!(SampleRate::from_hz(hz).unwrap().hz(), hz);
        }
        assert!(SampleRate::from_hz(11_025).is_none());
    }
}
