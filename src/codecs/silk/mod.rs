//! SILK speech codec core (RFC 6716 SILK layer).
//!
//! A predictive speech encoder and decoder at 8/12/16 kHz internal rates:
//! fixed-point LPC analysis and synthesis, pitch and long-term prediction,
//! a noise shaping quantizer with single-path and delayed-decision search,
//! range-coded parameters and excitation, packet loss concealment with
//! comfort noise, and low-bitrate redundancy for forward error correction.
//!
//! Module map, leaves first: [`math`] holds the closed fixed-point
//! primitive set every DSP path is built from; [`range`] the arithmetic
//! coder; [`tables`] every ICDF and codebook constant. The analysis side
//! is [`lpc`], [`nlsf`], [`pitch`], [`ltp`], [`shape`] and [`vad`]; the
//! quantization core is [`nsq`] and [`nsq_del_dec`]; the bitstream layer
//! is [`params`] and [`shell`]; [`encoder`] and [`decoder`] tie the
//! pipelines together with [`stereo`], [`plc`], [`cng`] and [`resampler`]
//! at the edges.

pub mod cng;
pub mod decoder;
pub mod encoder;
pub mod gain;
pub mod lpc;
pub mod ltp;
pub mod math;
pub mod nlsf;
pub mod nsq;
pub mod nsq_del_dec;
pub mod params;
pub mod pitch;
pub mod plc;
pub mod range;
pub mod resampler;
pub mod shape;
pub mod shell;
pub mod stereo;
pub mod tables;
pub mod types;
pub mod vad;

pub use decoder::SilkDecoder;
pub use encoder::SilkEncoder;
pub use types::{Bandwidth, SignalType};

#[cfg(test)]
mod tests;

/// SILK codec name.
pub const CODEC_NAME: &str = "SILK";
