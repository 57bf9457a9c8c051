//! Common test utilities for the engine
//!
//! Provides hand-rolled mock implementations of the store and speed-cache
//! seams plus FHIR document fixtures.

pub mod fhir_data;
pub mod mocks;

pub use fhir_data::*;
pub use mocks::*;
