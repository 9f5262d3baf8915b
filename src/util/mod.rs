//! Small shared helpers.

/// JSON extraction from model output.
pub mod json;
