//! Context assembly: ranked hits in, one budget-bounded block out.

use ahash::AHashSet;
use unicode_segmentation::UnicodeSegmentation;

use crate::types::{RetrievalHit, SourceRef};

/// Grapheme length of a source citation preview.
const PREVIEW_GRAPHEMES: usize = 200;

/// Assembler configuration.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Maximum context block length, counted in Unicode scalar values
    /// and including the `\n` joiners between lines.
    pub budget_chars: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig { budget_chars: 1800 }
    }
}

/// An assembled context block with its parallel citations.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// Deduplicated, newline-joined context lines. Empty when the hits
    /// held no usable content.
    pub block: String,
    /// One citation per input hit, best-first.
    pub sources: Vec<SourceRef>,
}

/// Turns ranked retrieval hits into a deduplicated context block.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: AssemblerConfig,
}

impl ContextAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        ContextAssembler { config }
    }

    /// Assemble hits into a context block and citations.
    ///
    /// Hits are taken best-first (ascending distance; the input is
    /// re-sorted since the invariant is cheap to restore), each hit's
    /// text split into trimmed non-empty lines. A line identical to one
    /// already emitted is skipped. Emission stops outright the first
    /// time a surviving line would push the running total past the
    /// budget; later, shorter lines are never packed in. An empty block
    /// is a valid outcome, not an error.
    pub fn assemble(&self, hits: &[RetrievalHit]) -> AssembledContext {
        let mut ranked: Vec<&RetrievalHit> = hits.iter().collect();
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let mut seen: AHashSet<&str> = AHashSet::new();
        let mut lines: Vec<&str> = Vec::new();
        let mut total = 0usize;

        'hits: for hit in &ranked {
            for line in hit.chunk_text.lines() {
                let line = line.trim();
                if line.is_empty() || !seen.insert(line) {
                    continue;
                }
                let cost = line.chars().count() + usize::from(!lines.is_empty());
                if total + cost > self.config.budget_chars {
                    break 'hits;
                }
                lines.push(line);
                total += cost;
            }
        }

        let sources = ranked
            .iter()
            .map(|hit| SourceRef {
                start: hit.start,
                end: hit.end,
                preview: truncate_graphemes(&hit.chunk_text, PREVIEW_GRAPHEMES),
            })
            .collect();

        AssembledContext {
            block: lines.join("\n"),
            sources,
        }
    }
}

/// Truncate to at most `limit` grapheme clusters.
fn truncate_graphemes(text: &str, limit: usize) -> String {
    match text.grapheme_indices(true).nth(limit) {
        Some((offset, _)) => text[..offset].to_string(),
        None => text.to_string(),
    }
}
