//! Error handling for the codec library.
//!
//! Every fallible operation at the core boundary returns one of these
//! enumerated kinds. No fault is fatal to decoder state: a failed frame
//! leaves the decoder coherent for the next packet after a concealment
//! hop, and an encoder failure aborts the frame with state untouched.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Error kinds produced at the core boundary.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Caller requested a rate the SILK layer cannot run at.
    #[error("Invalid sample rate: {rate}Hz (supported: {supported:?})")]
    InvalidSampleRate {
        /// The rejected rate.
        rate: u32,
        /// Rates the operation accepts.
        supported: Vec<u32>,
    },

    /// Sample count does not match a legal frame duration at the rate.
    #[error("Invalid frame size: expected {expected}, got {actual}")]
    InvalidFrameSize {
        /// Expected sample count.
        expected: usize,
        /// Provided sample count.
        actual: usize,
    },

    /// Bitrate outside the supported envelope.
    #[error("Invalid bitrate: {bitrate}bps (range: {min}-{max})")]
    InvalidBitrate {
        /// The rejected bitrate.
        bitrate: u32,
        /// Lowest accepted bitrate.
        min: u32,
        /// Highest accepted bitrate.
        max: u32,
    },

    /// Invalid configuration detail outside the dedicated kinds.
    #[error("Invalid codec configuration: {details}")]
    InvalidConfig {
        /// Human-readable description.
        details: String,
    },

    /// The range decoder detected a corrupt or over-read payload; the
    /// frame is unusable and the caller should invoke concealment.
    #[error("Decoding failed: {reason}")]
    DecodingFailed {
        /// What the decoder observed.
        reason: String,
    },

    /// Encoding aborted; encoder state is unchanged.
    #[error("Encoding failed: {reason}")]
    EncodingFailed {
        /// What the encoder observed.
        reason: String,
    },

    /// API misuse, e.g. operations on a torn-down stream.
    #[error("Invalid state: {details}")]
    InvalidState {
        /// Human-readable description.
        details: String,
    },
}

impl CodecError {
    /// Create a new decoding failure.
    pub fn decoding_failed(reason: impl Into<String>) -> Self {
        Self::DecodingFailed {
            reason: reason.into(),
        }
    }

    /// Create a new encoding failure.
    pub fn encoding_failed(reason: impl Into<String>) -> Self {
        Self::EncodingFailed {
            reason: reason.into(),
        }
    }

    /// Create a new invalid-configuration error.
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }

    /// Create a new invalid-state error.
    pub fn invalid_state(details: impl Into<String>) -> Self {
        Self::InvalidState {
            details: details.into(),
        }
    }

    /// Whether retrying with different inputs can succeed; configuration
    /// errors cannot recover without reconfiguration.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidSampleRate { .. }
            | Self::InvalidBitrate { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidState { .. } => false,
            Self::InvalidFrameSize { .. }
            | Self::DecodingFailed { .. }
            | Self::EncodingFailed { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::InvalidFrameSize {
            expected: 320,
            actual: 160,
        };
        let display = format!("{}", err);
        assert!(display.contains("expected 320"));
        assert!(display.contains("got 160"));
    }

    #[test]
    fn test_recoverability_split() {
        assert!(CodecError::decoding_failed("x").is_recoverable());
        assert!(CodecError::encoding_failed("x").is_recoverable());
        assert!(!CodecError::invalid_config("x").is_recoverable());
        assert!(!CodecError::invalid_state("x").is_recoverable());
    }

    #[test]
    fn test_helper_constructors() {
        assert!(matches!(
            CodecError::decoding_failed("bad payload"),
            CodecError::DecodingFailed { .. }
        ));
        assert!(matches!(
            CodecError::invalid_state("no stream"),
            CodecError::InvalidState { .. }
        ));
    }
}
