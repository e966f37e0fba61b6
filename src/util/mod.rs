//! Utility types and functions for the translator.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam and RIB matrix helpers
//! - Token substitution for paths and commands ([`parse_string`])

mod error;
mod expand;
mod math;

pub use error::*;
pub use expand::*;
pub use math::*;
