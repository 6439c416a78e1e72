//! PCM decoding for synthesized audio chunks.
//!
//! The transport delivers raw 16-bit signed little-endian PCM, mono, at the
//! configured sample rate. Decoding normalizes to f32 in [-1.0, 1.0].

use std::sync::Arc;

/// Decode a raw PCM16LE byte buffer into normalized f32 samples.
///
/// The buffer is truncated to a whole number of samples; a trailing odd
/// byte is silently dropped. There are no error conditions.
pub fn decode_pcm16(bytes: &[u8]) -> Arc<[f32]> {
    let aligned = bytes.len() - (bytes.len() % 2);
    bytes[..aligned]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Returns true when no sample in the chunk exceeds `peak_threshold` in
/// magnitude. Used by the scheduler to skip silence-only chunks.
pub fn is_mostly_silent(samples: &[f32], peak_threshold: f32) -> bool {
    samples.iter().all(|s| s.abs() < peak_threshold)
}
