//! Chunk payload encoding.

use crate::audio::chunk::{AudioChunk, ClosedChunk};
use crate::defaults;
use crate::error::{CallscribeError, Result};
use std::io::Cursor;

/// Trait for encoding raw chunk samples into a stored payload.
///
/// This trait allows swapping container formats; the payload only has to be
/// decodable by a standard player, byte-exact compatibility is not required.
pub trait ChunkEncoder: Send + Sync {
    /// Encode mono PCM samples into a self-contained payload.
    fn encode(&self, samples: &[i16], sample_rate: u32) -> Result<Vec<u8>>;

    /// File extension of the produced container (without the dot).
    fn extension(&self) -> &'static str;
}

/// WAV container encoder backed by `hound`.
#[derive(Debug, Clone, Copy)]
pub struct WavChunkEncoder {
    bits_per_sample: u16,
}

impl WavChunkEncoder {
    pub fn new() -> Self {
        Self {
            bits_per_sample: defaults::WAV_BITS_PER_SAMPLE,
        }
    }
}

impl Default for WavChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkEncoder for WavChunkEncoder {
    fn encode(&self, samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| CallscribeError::Encoding {
                message: format!("failed to create WAV writer: {e}"),
            })?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| CallscribeError::Encoding {
                    message: format!("failed to write sample: {e}"),
                })?;
        }

        writer.finalize().map_err(|e| CallscribeError::Encoding {
            message: format!("failed to finalize WAV: {e}"),
        })?;

        Ok(cursor.into_inner())
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}

/// Encode a closed chunk into its stored form.
pub fn encode_chunk(encoder: &dyn ChunkEncoder, chunk: &ClosedChunk) -> Result<AudioChunk> {
    let payload = encoder.encode(&chunk.samples, chunk.sample_rate)?;
    Ok(AudioChunk {
        sequence: chunk.sequence,
        payload,
        duration_ms: chunk.duration_ms(),
    })
}
