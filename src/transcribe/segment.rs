//! Transcript segments produced by the recognition stream.

/// A stretch of cumulative transcript text.
///
/// Partial results overwrite `text` in place; once `is_final` is set the
/// segment is never mutated again.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranscriptSegment {
    /// Cumulative text recognized so far within this segment.
    pub text: String,
    /// Whether this segment has been closed by a final result.
    pub is_final: bool,
    /// Offset of the segment start relative to the session start.
    pub offset_ms: u64,
}

impl TranscriptSegment {
    pub fn new(offset_ms: u64) -> Self {
        Self {
            text: String::new(),
            is_final: false,
            offset_ms,
        }
    }

    /// Replace the cumulative text with a newer partial result.
    ///
    /// Ignored once the segment is final.
    pub fn update(&mut self, text: &str) {
        if self.is_final {
            return;
        }
        self.text = text.to_string();
    }

    /// Close the segment with its final text.
    pub fn finalize(&mut self, text: &str) {
        if self.is_final {
            return;
        }
        self.text = text.to_string();
        self.is_final = true;
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_updates_overwrite() {
        let mut segment = TranscriptSegment::new(0);
        segment.update("hello");
        segment.update("hello world");
        assert_eq!(segment.text, "hello world");
        assert!(!segment.is_final);
    }

    #[test]
    fn test_finalized_segment_is_immutable() {
        let mut segment = TranscriptSegment::new(100);
        segment.update("hello");
        segment.finalize("hello world");
        assert!(segment.is_final);

        segment.update("should not apply");
        segment.finalize("also not applied");
        assert_eq!(segment.text, "hello world");
        assert_eq!(segment.offset_ms, 100);
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let mut segment = TranscriptSegment::new(0);
        segment.update("   \t ");
        assert!(segment.is_empty());
        segment.update("a");
        assert!(!segment.is_empty());
    }
}
