//! Audio decoding using Symphonia
//!
//! The decode boundary: file bytes in, per-channel `f32` samples out.

use crate::error::EngineError;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio, one sample vector per channel
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Planar samples, normalized to [-1.0, 1.0]
    pub channels: Vec<Vec<f32>>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Duration in seconds
    pub duration_seconds: f64,
}

impl DecodedAudio {
    /// Number of sample frames per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }
}

/// Decode an audio file from disk
///
/// The file extension, when present, is used as a format hint.
pub fn decode_file(path: impl AsRef<Path>) -> Result<DecodedAudio, EngineError> {
    let path = path.as_ref();
    log::debug!("Decoding audio file: {}", path.display());

    let file = File::open(path)?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    decode_source(Box::new(file), hint)
}

/// Decode an in-memory audio file (the raw bytes of e.g. a WAV or MP3)
pub fn decode_bytes(bytes: Vec<u8>) -> Result<DecodedAudio, EngineError> {
    log::debug!("Decoding {} bytes of audio", bytes.len());
    decode_source(Box::new(Cursor::new(bytes)), Hint::new())
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<DecodedAudio, EngineError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| EngineError::DecodingError("No supported audio tracks found".to_string()))?;

    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let n_channels = spec.channels.count();
                let frames = decoded.frames();
                if frames == 0 || n_channels == 0 {
                    continue;
                }
                sample_rate = spec.rate;

                if channels.is_empty() {
                    channels = vec![Vec::new(); n_channels];
                }

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_planar_ref(decoded);
                let planar = buf.samples();

                for (ch, out) in channels.iter_mut().enumerate().take(n_channels) {
                    out.extend_from_slice(&planar[ch * frames..(ch + 1) * frames]);
                }
            }
            Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                // Corrupted packets are skipped.
                log::warn!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if channels.is_empty() || channels[0].is_empty() {
        return Err(EngineError::DecodingError(
            "No audio samples decoded".to_string(),
        ));
    }

    let frames = channels[0].len();
    let duration_seconds = frames as f64 / sample_rate.max(1) as f64;

    log::debug!(
        "Decoded {} channel(s), {} frames at {} Hz ({:.2}s)",
        channels.len(),
        frames,
        sample_rate,
        duration_seconds
    );

    Ok(DecodedAudio {
        channels,
        sample_rate,
        duration_seconds,
    })
}
