//! Typed parameters passed to RenderMan calls.
//!
//! - [`ParameterType`] / [`DetailType`] - element type and interpolation class
//! - [`TypedParameter`] - owned payload plus declaration
//! - [`Declaration`] - parser for inline declarations

mod token;
mod types;

pub use token::*;
pub use types::*;
