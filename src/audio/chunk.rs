//! Segmentation of a continuous recording into bounded, sequential chunks.
//!
//! The scheduler tracks elapsed time within the current open chunk only and
//! closes it at the exact boundary sample when the configured maximum is
//! reached. Capture never stops at a boundary; a frame spanning it is split
//! and the remainder seeds the next chunk, so there is no audible gap.

use std::time::Duration;

/// An encoded audio chunk, immutable once closed.
///
/// Sequence indices are contiguous from 0 with no gaps.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub sequence: u64,
    /// Encoded payload (WAV container by default).
    pub payload: Vec<u8>,
    pub duration_ms: u32,
}

/// Raw samples of a chunk closed by the scheduler, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedChunk {
    pub sequence: u64,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl ClosedChunk {
    pub fn duration_ms(&self) -> u32 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms() as u64)
    }
}

/// Enforces a maximum continuous-segment duration over the sample stream.
pub struct ChunkScheduler {
    max_samples: usize,
    sample_rate: u32,
    current: Vec<i16>,
    next_sequence: u64,
}

impl ChunkScheduler {
    /// Creates a scheduler closing chunks after `max_chunk_ms` of audio.
    pub fn new(max_chunk_ms: u32, sample_rate: u32) -> Self {
        let max_samples = (max_chunk_ms as u64 * sample_rate as u64 / 1000) as usize;
        Self {
            max_samples: max_samples.max(1),
            sample_rate,
            current: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Appends samples to the open chunk, returning any chunks closed by
    /// crossing the duration boundary. A single oversized frame may close
    /// more than one chunk.
    pub fn push(&mut self, samples: &[i16]) -> Vec<ClosedChunk> {
        let mut closed = Vec::new();
        let mut rest = samples;

        while self.current.len() + rest.len() >= self.max_samples {
            let take = self.max_samples - self.current.len();
            self.current.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            closed.push(self.close_current());
        }

        self.current.extend_from_slice(rest);
        closed
    }

    /// Closes the open chunk regardless of duration (end of recording).
    pub fn flush(&mut self) -> Option<ClosedChunk> {
        if self.current.is_empty() {
            return None;
        }
        Some(self.close_current())
    }

    /// Elapsed audio within the current open chunk.
    pub fn open_elapsed(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.current.len() as u64 * 1000 / self.sample_rate as u64)
    }

    /// Resets for a fresh recording; sequence numbering restarts at 0.
    pub fn reset(&mut self) {
        self.current.clear();
        self.next_sequence = 0;
    }

    fn close_current(&mut self) -> ClosedChunk {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        ClosedChunk {
            sequence,
            samples: std::mem::take(&mut self.current),
            sample_rate: self.sample_rate,
        }
    }
}
