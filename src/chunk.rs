//! Overlapping text chunking with best-effort time-span provenance.
//!
//! The chunker is the unit boundary for embedding and retrieval: it turns
//! raw text or time-stamped transcript segments into bounded, overlapping
//! chunks. Window sizes are counted in grapheme clusters so a window can
//! never split a user-perceived character.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{QuarryError, Result};

/// A time-stamped transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment text.
    pub text: String,
    /// Segment start in seconds.
    pub start: f64,
    /// Segment end in seconds.
    pub end: f64,
}

/// One output chunk with its provenance span.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Trimmed chunk text.
    pub text: String,
    /// Span start in seconds (synthetic for non-timed sources).
    pub start: f64,
    /// Span end in seconds (synthetic for non-timed sources).
    pub end: f64,
}

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum chunk length in grapheme clusters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in grapheme clusters.
    pub overlap: usize,
    /// Width in seconds of the synthetic spans emitted for non-timed text.
    pub synthetic_span_width: f64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        ChunkerConfig {
            chunk_size: 800,
            overlap: 50,
            synthetic_span_width: 10.0,
        }
    }
}

/// Splits text or segments into overlapping chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

/// Sentence-final patterns accepted as soft window breaks.
const SENTENCE_BREAKS: &[&str] = &[". ", "! ", "? ", "。", "！", "？"];

impl Chunker {
    /// Create a chunker, validating the configuration.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(QuarryError::invalid_argument(
                "chunk_size must be greater than zero",
            ));
        }
        if config.overlap >= config.chunk_size {
            return Err(QuarryError::invalid_argument(format!(
                "overlap {} must be smaller than chunk_size {}",
                config.overlap, config.chunk_size
            )));
        }
        Ok(Chunker { config })
    }

    /// Create a chunker with the default configuration.
    pub fn with_defaults() -> Self {
        Chunker {
            config: ChunkerConfig::default(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk plain, non-timed text.
    ///
    /// Emits synthetic equal-width spans `[i * w, (i + 1) * w]` so every
    /// chunk still carries a span. Callers must treat these as
    /// placeholders, not ground truth. Fails with `EmptyInput` when the
    /// text holds no non-whitespace content.
    pub fn chunk_text(&self, text: &str) -> Result<Vec<Chunk>> {
        let windows = self.split_windows(text)?;
        let width = self.config.synthetic_span_width;

        Ok(windows
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                text,
                start: i as f64 * width,
                end: (i + 1) as f64 * width,
            })
            .collect())
    }

    /// Chunk time-stamped segments, joined with single spaces.
    ///
    /// Each chunk's span is recovered by scanning segments in order from a
    /// persistent cursor and accumulating segment text until the chunk's
    /// length is reached; the covered segment range becomes the span. The
    /// resulting spans are approximate: chunk boundaries rarely coincide
    /// with segment boundaries, so adjacent spans may overlap or drift by
    /// up to a segment. Fails with `EmptyInput` when no segment holds
    /// non-whitespace text.
    pub fn chunk_segments(&self, segments: &[Segment]) -> Result<Vec<Chunk>> {
        let timed: Vec<&Segment> = segments
            .iter()
            .filter(|s| !s.text.trim().is_empty())
            .collect();
        if timed.is_empty() {
            return Err(QuarryError::empty_input(
                "segments contain no extractable text",
            ));
        }

        let joined = timed
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        let windows = self.split_windows(&joined)?;

        let mut chunks = Vec::with_capacity(windows.len());
        let mut cursor = 0usize;

        for window in windows {
            let target = window.chars().count();
            let mut start_ts: Option<f64> = None;
            let mut end_ts: Option<f64> = None;
            let mut accumulated = 0usize;

            for (i, segment) in timed.iter().enumerate().skip(cursor) {
                if start_ts.is_none() {
                    start_ts = Some(segment.start);
                }
                end_ts = Some(segment.end);

                // One joining space plus the segment text, as consumed above.
                accumulated += 1 + segment.text.trim().chars().count();
                if accumulated >= target {
                    cursor = i + 1;
                    break;
                }
            }

            let start = start_ts.unwrap_or(0.0);
            let end = end_ts.unwrap_or(start);
            chunks.push(Chunk {
                text: window,
                start,
                end,
            });
        }

        Ok(chunks)
    }

    /// Split text into overlapping windows of at most `chunk_size`
    /// graphemes, preferring paragraph, sentence, then line breaks past
    /// the window midpoint. Whitespace-only windows are dropped.
    fn split_windows(&self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Err(QuarryError::empty_input(
                "source text contains no extractable content",
            ));
        }

        let graphemes: Vec<(usize, &str)> = text.grapheme_indices(true).collect();
        let total = graphemes.len();
        let byte_at = |g: usize| {
            if g < total {
                graphemes[g].0
            } else {
                text.len()
            }
        };

        let mut windows = Vec::new();
        let mut start = 0usize;

        while start < total {
            let hard_end = (start + self.config.chunk_size).min(total);
            let end = if hard_end < total {
                self.find_break(text, &graphemes, start, hard_end)
            } else {
                hard_end
            };

            let window = text[byte_at(start)..byte_at(end)].trim();
            if !window.is_empty() {
                windows.push(window.to_string());
            }

            if end >= total {
                break;
            }
            // Step back by the overlap, but always make forward progress.
            start = end.saturating_sub(self.config.overlap).max(start + 1);
        }

        if windows.is_empty() {
            return Err(QuarryError::empty_input(
                "source text contains no extractable content",
            ));
        }
        Ok(windows)
    }

    /// Find a soft break inside `[start, max_end)`, accepting a candidate
    /// only when it lands past the window midpoint.
    fn find_break(
        &self,
        text: &str,
        graphemes: &[(usize, &str)],
        start: usize,
        max_end: usize,
    ) -> usize {
        let min_end = start + self.config.chunk_size / 2;
        let window_start = graphemes[start].0;
        let window_end = if max_end < graphemes.len() {
            graphemes[max_end].0
        } else {
            text.len()
        };
        let window = &text[window_start..window_end];

        let to_grapheme = |byte_pos: usize| {
            graphemes.partition_point(|(offset, _)| *offset < window_start + byte_pos)
        };

        // Paragraph break first.
        if let Some(pos) = window.rfind("\n\n") {
            let candidate = to_grapheme(pos + 2);
            if candidate >= min_end {
                return candidate;
            }
        }

        // Then a sentence break.
        for pattern in SENTENCE_BREAKS {
            if let Some(pos) = window.rfind(pattern) {
                let candidate = to_grapheme(pos + pattern.len());
                if candidate >= min_end {
                    return candidate;
                }
            }
        }

        // Then a line break.
        if let Some(pos) = window.rfind('\n') {
            let candidate = to_grapheme(pos + 1);
            if candidate >= min_end {
                return candidate;
            }
        }

        max_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_chunker(chunk_size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            chunk_size,
            overlap,
            synthetic_span_width: 10.0,
        })
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(
            Chunker::new(ChunkerConfig {
                chunk_size: 0,
                overlap: 0,
                synthetic_span_width: 10.0,
            })
            .is_err()
        );
        assert!(
            Chunker::new(ChunkerConfig {
                chunk_size: 10,
                overlap: 10,
                synthetic_span_width: 10.0,
            })
            .is_err()
        );
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = Chunker::with_defaults();
        let chunks = chunker.chunk_text("a short transcript").unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a short transcript");
        assert_eq!(chunks[0].start, 0.0);
        assert_eq!(chunks[0].end, 10.0);
    }

    #[test]
    fn test_windows_respect_chunk_size() {
        let chunker = small_chunker(20, 5);
        let text = "abcdefghij ".repeat(10);
        let chunks = chunker.chunk_text(&text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.graphemes(true).count() <= 20);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let chunker = small_chunker(20, 8);
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunker.chunk_text(text).unwrap();

        assert!(chunks.len() > 1);
        // The tail of each chunk reappears at the head of the next.
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().rev().take(4).collect();
            let tail: String = tail.chars().rev().collect();
            assert!(
                pair[1].text.contains(tail.trim()),
                "chunk {:?} does not overlap {:?}",
                pair[1].text,
                pair[0].text
            );
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let chunker = small_chunker(30, 0);
        let text = "first paragraph here.\n\nsecond paragraph continues well past the window";
        let chunks = chunker.chunk_text(text).unwrap();

        assert_eq!(chunks[0].text, "first paragraph here.");
    }

    #[test]
    fn test_synthetic_spans_are_equal_width() {
        let chunker = small_chunker(10, 2);
        let chunks = chunker.chunk_text("0123456789 0123456789 0123456789").unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.start, i as f64 * 10.0);
            assert_eq!(chunk.end, (i + 1) as f64 * 10.0);
        }
    }

    #[test]
    fn test_empty_text_fails() {
        let chunker = Chunker::with_defaults();
        match chunker.chunk_text("   \n\t  ") {
            Err(QuarryError::EmptyInput(_)) => {}
            other => panic!("expected empty input error, got {other:?}"),
        }
    }

    #[test]
    fn test_segments_get_real_spans() {
        let chunker = small_chunker(25, 0);
        let segments = vec![
            Segment {
                text: "hello there everyone".into(),
                start: 0.0,
                end: 3.5,
            },
            Segment {
                text: "welcome to the show".into(),
                start: 3.5,
                end: 7.0,
            },
            Segment {
                text: "today we talk about rust".into(),
                start: 7.0,
                end: 12.0,
            },
        ];

        let chunks = chunker.chunk_segments(&segments).unwrap();
        assert!(chunks.len() > 1);

        // First chunk starts where the transcript starts.
        assert_eq!(chunks[0].start, 0.0);
        // Spans are non-decreasing in start time and each covers a range.
        for pair in chunks.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
        for chunk in &chunks {
            assert!(chunk.end >= chunk.start);
        }
    }

    #[test]
    fn test_segments_with_only_whitespace_fail() {
        let chunker = Chunker::with_defaults();
        let segments = vec![Segment {
            text: "   ".into(),
            start: 0.0,
            end: 1.0,
        }];

        match chunker.chunk_segments(&segments) {
            Err(QuarryError::EmptyInput(_)) => {}
            other => panic!("expected empty input error, got {other:?}"),
        }
    }

    #[test]
    fn test_grapheme_windows_do_not_split_clusters() {
        let chunker = small_chunker(4, 1);
        // Family emoji is a single grapheme cluster of multiple code points.
        let text = "a👨‍👩‍👧b c👨‍👩‍👧d e👨‍👩‍👧f";
        let chunks = chunker.chunk_text(text).unwrap();

        for chunk in &chunks {
            // Every chunk is valid UTF-8 by construction; clusters stay whole.
            assert!(chunk.text.graphemes(true).count() <= 4);
        }
    }
}
