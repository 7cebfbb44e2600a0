//! Feature extraction modules
//!
//! This module contains the signal analysis stages:
//! - Onset detection (three-band spectral flux + merge)
//! - Period estimation (beat period from onset autocorrelation)
//! - Beat tracking (downbeat phase)

pub mod beat_tracking;
pub mod onset;
pub mod period;
