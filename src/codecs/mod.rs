//! # Codec Implementations
//!
//! This module contains the SILK speech codec core used by the RVoIP stack.
//! The implementation is bitstream-compatible with the SILK layer of
//! RFC 6716 and thoroughly tested with property-based and end-to-end
//! round-trip suites.
//!
//! ## Usage
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
//! let pcm = vec![0i16; 320]; // 20 ms at 16 kHz
//! let payload = encoder.encode(&pcm)?;
//! let out_48k = decoder.decode(Some(&payload))?;
//! assert_eq!(out_48k.len(), 960);
//! # Ok::<(), silk_core::error::CodecError>(())
//! ```

pub mod silk;

pub use silk::{Bandwidth, SilkDecoder, SilkEncoder};
