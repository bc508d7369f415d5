//! Utility functions and helpers for the codec library.

pub mod validation;

pub use validation::*;
