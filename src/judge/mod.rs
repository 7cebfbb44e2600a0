//! Real-time judging
//!
//! Classifies input offsets into judgment tiers, keeps score and combo, and
//! resolves the multi-stage hold and flick notes:
//! - Judgment tiers and window classification
//! - Score model and achievable-score denominator
//! - Per-run session state
//! - The event-driven engine (press, release, tick)

pub mod engine;
pub mod judgment;
pub mod scoring;
pub mod session;
