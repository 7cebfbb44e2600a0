//! Analysis result aggregation
//!
//! Bundles everything the offline analysis produces for one track:
//! - Result types
//! - Metadata and degeneracy flags

pub mod metadata;
pub mod result;
