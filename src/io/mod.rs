//! I/O modules
//!
//! Audio decoding using Symphonia and chart documents using serde_json.

pub mod chart_file;
pub mod decoder;
