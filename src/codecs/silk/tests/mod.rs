//! SILK test suite.
//!
//! Unit tests live next to the modules they cover; this directory holds
//! the end-to-end scenarios and cross-module property tests.

mod integration_tests;
mod property_tests;
