//! Channel mixing utilities (multi-channel to mono conversion)

use crate::error::EngineError;

/// Average all channels sample-wise into a single mono buffer
///
/// A single channel is returned as-is. Channels of unequal length are mixed
/// up to the shortest one.
///
/// # Errors
///
/// Returns `EngineError::InvalidInput` if no channels are given
pub fn mix_to_mono(channels: &[Vec<f32>]) -> Result<Vec<f32>, EngineError> {
    if channels.is_empty() {
        return Err(EngineError::InvalidInput(
            "No channels to mix".to_string(),
        ));
    }

    if channels.len() == 1 {
        return Ok(channels[0].clone());
    }

    let len = channels.iter().map(Vec::len).min().unwrap_or(0);
    if channels.iter().any(|c| c.len() != len) {
        log::warn!(
            "Channel lengths differ, truncating mix to {} samples",
            len
        );
    }

    log::debug!("Mixing {} channels to mono ({} samples)", channels.len(), len);

    let inv = 1.0 / channels.len() as f32;
    let mut mixed = vec![0.0f32; len];
    for channel in channels {
        for (out, &s) in mixed.iter_mut().zip(channel.iter()) {
            *out += s;
        }
    }
    for s in &mut mixed {
        *s *= inv;
    }

    Ok(mixed)
}
