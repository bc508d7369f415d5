//! # Silk-Core: SILK Speech Codec for RVoIP
//!
//! A production implementation of the SILK speech codec core (the SILK
//! layer of RFC 6716 / Opus): fixed-point LPC analysis and synthesis,
//! pitch and long-term prediction, a noise shaping quantizer with
//! delayed-decision search, range-coded payloads, packet loss concealment
//! with comfort noise, and low-bitrate redundancy for forward error
//! correction.
//!
//! ## Features
//!
//! - **Bitstream**: range-coded SILK payloads, frame-exact
//!   encode/decode with an implicit range checksum per frame
//! - **Bandwidths**: narrowband (8 kHz), mediumband (12 kHz) and
//!   wideband (16 kHz) internal rates, with boundary resampling from and
//!   to 8/12/16/24/48 kHz
//! - **Robustness**: PLC with comfort noise and glue frames, LBRR/FEC,
//!   DTX for silence
//! - **Stereo**: mid/side coding with quantized prediction weights
//!
//! ## Quick Start
//!
//! ```rust
//! use silk_core::codecs::silk::{SilkEncoder, SilkDecoder, Bandwidth};
//! use silk_core::types::SilkConfig;
//!
//! let config = SilkConfig::new(Bandwidth::Wide)
//!     .with_sample_rate(16_000)
//!     .with_bitrate(24_000)
//!     .with_frame_ms(20);
//! let mut encoder = SilkEncoder::new(config)?;
//! let mut decoder = SilkDecoder::new(Bandwidth::Wide, 20, false)?;
//!
//! // Encode 20 ms at 16 kHz, decode to 48 kHz float
//! let samples = vec![0i16; 320];
//! let payload = encoder.encode(&samples)?;
//! let decoded = decoder.decode(Some(&payload))?;
//! assert_eq!(decoded.len(), 960);
//! # Ok::<(), silk_core::error::CodecError>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result` with enumerated error kinds. A decode
//! failure leaves the decoder coherent: invoke `decode(None)` to conceal
//! the frame and continue with the next packet.
//!
//! ## Testing
//!
//! ```bash
//! # Full suite: unit, property-based and end-to-end round-trip tests
//! cargo test
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod codecs;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use codecs::silk::{Bandwidth, SilkDecoder, SilkEncoder};
pub use error::{CodecError, Result};
pub use types::{CodecInfo, SampleRate, SilkConfig};

/// Version information for the codec library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the codec library.
///
/// Installs a default tracing subscriber if none is set. Safe to call
/// multiple times.
pub fn init() {
    let _ = tracing_subscriber::fmt::try_init();
    tracing::info!("Silk-Core v{} initialized", VERSION);
}

/// Get library information.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        codec: codecs::silk::CODEC_NAME,
    }
}

/// Library information structure.
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    /// Library version.
    pub version: &'static str,
    /// Codec name.
    pub codec: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn test_info() {
        let info = info();
        assert_eq!(info.version, VERSION);
        assert_eq!(info.codec, "SILK");
    }
}
