//! Renderers for batch results.
//!
//! - [`TextSummary`]: colored human-readable summary (`yansi`, `bytesize`)
//! - [`JsonOutput`]: machine-readable summary for `--json`

pub mod json;
pub mod text;

pub use json::{JsonOutput, JsonOutputError};
pub use text::TextSummary;
