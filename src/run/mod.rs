//! Gameplay runs
//!
//! A run plays one chart from start to end against a playback clock:
//! - Clock abstraction over a monotonic time source ([`clock`])
//! - Lifecycle and input routing ([`conductor`])
//! - Final score, rate and rank ([`result`])

pub mod clock;
pub mod conductor;
pub mod result;
