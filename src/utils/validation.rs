//! Input validation utilities for codec operations.

use crate::error::{CodecError, Result};
use crate::types::SampleRate;

/// Legal frame durations in milliseconds at the API boundary.
pub const FRAME_DURATIONS_MS: [u32; 4] = [10, 20, 40, 60];

/// Validate a PCM block length against the rate and channel count.
/// Returns the frame duration in milliseconds.
pub fn validate_pcm_length(samples: usize, sample_rate_hz: u32, channels: usize) -> Result<u32> {
    if channels == 0 || samples % channels != 0 {
        return Err(CodecError::InvalidFrameSize {
            expected: channels.max(1),
            actual: samples,
        });
    }
    let per_channel = samples / channels;
    let per_ms = sample_rate_hz as usize / 1000;
    for &ms in FRAME_DURATIONS_MS.iter() {
        if per_channel == per_ms * ms as usize {
            return Ok(ms);
        }
    }
    Err(CodecError::InvalidFrameSize {
        expected: per_ms * 20,
        actual: per_channel,
    })
}

/// Validate a payload size before handing it to the range decoder.
pub fn validate_payload(data: &[u8]) -> Result<()> {
    // SILK payloads for a 60 ms packet stay well under this cap
    if data.len() > 1275 {
        return Err(CodecError::decoding_failed(format!(
            "payload too large: {} bytes",
            data.len()
        )));
    }
    Ok(())
}

/// Validate an API sample rate.
pub fn validate_sample_rate(hz: u32) -> Result<SampleRate> {
    SampleRate::from_hz(hz).ok_or_else(|| CodecError::InvalidSampleRate {
        rate: hz,
        supported: SampleRate::supported().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_length_accepts_legal_durations() {
        assert_eq!(validate_pcm_length(320, 16_000, 1).unwrap(), 20);
        assert_eq!(validate_pcm_length(960, 48_000, 1).unwrap(), 20);
        assert_eq!(validate_pcm_length(640, 16_000, 2).unwrap(), 20);
        assert_eq!(validate_pcm_length(480, 8_000, 1).unwrap(), 60);
    }

    #[test]
    fn test_pcm_length_rejects_odd_sizes() {
        assert!(validate_pcm_length(100, 16_000, 1).is_err());
        assert!(validate_pcm_length(321, 16_000, 2).is_err());
    }

    #[test]
    fn test_payload_cap() {
        assert!(validate_payload(&[0u8; 100]).is_ok());
        assert!(validate_payload(&[0u8; 2000]).is_err());
    }

    #[test]
    fn test_sample_rate_validation() {
        assert!(validate_sample_rate(16_000).is_ok());
        assert!(validate_sample_rate(44_100).is_err());
    }
}
