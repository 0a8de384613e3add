//! # Section Segmentation Module
//!
//! ## Purpose
//! Splits normalized legal text into retrieval-ready chunks that preserve
//! section and clause boundaries. Whole sections that fit the size budget are
//! never split; oversized sections fall back to overlapping windows.
//!
//! ## Input/Output Specification
//! - **Input**: Normalized text, document metadata, chunk size and overlap
//! - **Output**: Ordered chunk sequence with structural metadata
//! - **Invariant**: Concatenating chunk bodies in emission order, after
//!   stripping injected titles and overlap duplication, reconstructs the
//!   normalized text modulo whitespace trimming
//!
//! ## Key Features
//! - Marker recognition shared with the normalizer (Section/Clause/Article/
//!   Chapter + number, ALL-CAPS or Title-Case only)
//! - Implicit "Preamble" section for text preceding the first marker, or for
//!   documents without any recognizable marker
//! - Windowed fallback with exact character overlap, preferring paragraph,
//!   then sentence, then word boundaries before a hard cut
//! - Every chunk inherits the full document metadata map unchanged

use crate::config::ChunkingConfig;
use crate::errors::{RagError, Result};
use crate::preprocessing::SECTION_MARKER_PATTERN;
use crate::{Chunk, Metadata};
use regex::Regex;

/// Title assigned to text preceding the first marker, or to marker-less
/// documents.
pub const PREAMBLE_TITLE: &str = "Preamble";

/// Sentence-ending characters honored by the windowed fallback. The danda
/// terminates sentences in Devanagari text.
const SENTENCE_ENDINGS: [char; 4] = ['.', '?', '!', '।'];

/// Section-aware chunker.
///
/// Stateless across calls; one instance can segment many documents
/// concurrently.
pub struct LegalChunker {
    config: ChunkingConfig,
    marker: Regex,
}

/// A maximal marker-delimited span of normalized text.
struct SectionSpan<'a> {
    title: String,
    text: &'a str,
    /// True when the title is implicit and must be injected into chunk text
    title_injected: bool,
}

impl LegalChunker {
    /// Create a new chunker. Fails fast on programmer errors: a zero
    /// `chunk_size` or an overlap that is not strictly smaller than the chunk
    /// size.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(RagError::InvalidArgument {
                field: "chunk_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::InvalidArgument {
                field: "chunk_overlap".to_string(),
                reason: format!(
                    "must be smaller than chunk_size ({} >= {})",
                    config.chunk_overlap, config.chunk_size
                ),
            });
        }

        let marker = Regex::new(SECTION_MARKER_PATTERN).map_err(|e| RagError::Internal {
            message: format!("Invalid section marker regex: {}", e),
        })?;

        Ok(Self { config, marker })
    }

    /// Segment normalized text into an ordered chunk sequence.
    ///
    /// Sections are contiguous and non-overlapping; a document without any
    /// recognizable marker yields a single implicit Preamble section. Empty or
    /// whitespace-only input yields no chunks.
    pub fn segment(&self, clean_text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if clean_text.trim().is_empty() {
            return Vec::new();
        }

        let sections = self.locate_sections(clean_text);
        let mut chunks = Vec::new();

        for section in sections {
            self.emit_section(&section, metadata, &mut chunks);
        }

        tracing::debug!(
            sections = chunks.iter().filter(|c| c.chunk_index == 0).count(),
            chunks = chunks.len(),
            "Segmentation complete"
        );

        chunks
    }

    /// Locate marker-delimited sections, with an implicit preamble for any text
    /// before the first marker.
    fn locate_sections<'a>(&self, text: &'a str) -> Vec<SectionSpan<'a>> {
        let markers: Vec<(usize, &str)> = self
            .marker
            .find_iter(text)
            .map(|m| (m.start(), m.as_str()))
            .collect();

        if markers.is_empty() {
            return vec![SectionSpan {
                title: PREAMBLE_TITLE.to_string(),
                text: text.trim(),
                title_injected: true,
            }];
        }

        let mut sections = Vec::new();

        let preamble = text[..markers[0].0].trim();
        if !preamble.is_empty() {
            sections.push(SectionSpan {
                title: PREAMBLE_TITLE.to_string(),
                text: preamble,
                title_injected: true,
            });
        }

        for (i, (start, title)) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map(|(s, _)| *s).unwrap_or(text.len());
            sections.push(SectionSpan {
                title: title.to_string(),
                text: text[*start..end].trim(),
                title_injected: false,
            });
        }

        sections
    }

    /// Emit one section as either a single full-section chunk or a run of
    /// overlapping windows.
    fn emit_section(&self, section: &SectionSpan<'_>, metadata: &Metadata, out: &mut Vec<Chunk>) {
        let char_count = section.text.chars().count();

        // Structure-preserving fast path: a section that fits is never split
        if char_count + self.injected_title_len(section) <= self.config.chunk_size {
            let text = if section.title_injected {
                format!("{}\n{}", section.title, section.text)
            } else {
                section.text.to_string()
            };
            out.push(Chunk {
                text,
                section_title: section.title.clone(),
                chunk_index: 0,
                is_full_section: true,
                metadata: metadata.clone(),
            });
            return;
        }

        // The title prefix counts against the budget, matching the
        // full-section path; the floor keeps progress possible when a long
        // title meets a tiny budget
        let title_overhead = section.title.chars().count() + 1;
        let window_size = self
            .config
            .chunk_size
            .saturating_sub(title_overhead)
            .max(self.config.chunk_overlap + 1);

        let body = self.section_body(section);
        for (i, window) in self.split_windows(body, window_size).into_iter().enumerate() {
            out.push(Chunk {
                text: format!("{}\n{}", section.title, window),
                section_title: section.title.clone(),
                chunk_index: i,
                is_full_section: false,
                metadata: metadata.clone(),
            });
        }
    }

    fn injected_title_len(&self, section: &SectionSpan<'_>) -> usize {
        if section.title_injected {
            section.title.chars().count() + 1
        } else {
            0
        }
    }

    /// Body of a section for windowing: the text after the marker line for
    /// explicit sections, the whole span for the implicit preamble.
    fn section_body<'a>(&self, section: &'a SectionSpan<'_>) -> &'a str {
        if section.title_injected {
            return section.text;
        }
        section.text[section.title.len()..].trim_start()
    }

    /// Subdivide an oversized body into the minimum number of overlapping
    /// windows of at most `window_size` characters. Each non-initial window
    /// starts exactly `chunk_overlap` characters before its predecessor's end,
    /// so consecutive windows share exactly that many characters.
    fn split_windows(&self, body: &str, window_size: usize) -> Vec<String> {
        let chars: Vec<char> = body.chars().collect();
        let size = window_size;
        let overlap = self.config.chunk_overlap;

        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + size).min(chars.len());
            let end = if hard_end < chars.len() {
                self.snap_to_boundary(&chars, start, hard_end, size)
            } else {
                hard_end
            };

            windows.push(chars[start..end].iter().collect::<String>());

            if end >= chars.len() {
                break;
            }
            start = end - overlap;
        }

        windows
    }

    /// Pull a window end back to the nearest paragraph, sentence or word
    /// boundary. The search floor guarantees forward progress past the overlap
    /// region.
    fn snap_to_boundary(&self, chars: &[char], start: usize, end: usize, size: usize) -> usize {
        let floor = start
            + (size / 2)
                .max(self.config.chunk_overlap + 1)
                .min(end - start);
        if floor >= end {
            return end;
        }

        // Paragraph break
        for i in (floor..end).rev() {
            if i >= 1 && chars[i] == '\n' && chars[i - 1] == '\n' {
                return i + 1;
            }
        }
        // Sentence boundary
        for i in (floor..end.saturating_sub(1)).rev() {
            if SENTENCE_ENDINGS.contains(&chars[i]) && chars[i + 1].is_whitespace() {
                return i + 1;
            }
        }
        // Word boundary
        for i in (floor..end).rev() {
            if chars[i].is_whitespace() {
                return i + 1;
            }
        }

        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> LegalChunker {
        LegalChunker::new(ChunkingConfig {
            chunk_size,
            chunk_overlap,
        })
        .unwrap()
    }

    fn shared_chars(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        (1..=a.len().min(b.len()))
            .rev()
            .find(|&n| a[a.len() - n..] == b[..n])
            .unwrap_or(0)
    }

    #[test]
    fn test_two_sections_become_two_full_chunks() {
        let text = "SECTION 1\nThe landlord shall provide thirty days notice.\n\nSECTION 2\nNo tenant shall be removed without due process.";
        let chunks = chunker(5000, 100).segment(text, &Metadata::new());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section_title, "SECTION 1");
        assert_eq!(chunks[1].section_title, "SECTION 2");
        for chunk in &chunks {
            assert!(chunk.is_full_section);
            assert_eq!(chunk.chunk_index, 0);
            assert!(chunk.text.starts_with(&chunk.section_title));
        }
    }

    #[test]
    fn test_preamble_before_first_marker() {
        let text = "An Act to regulate tenancy.\n\nSECTION 1\nShort title and commencement.";
        let chunks = chunker(5000, 100).segment(text, &Metadata::new());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section_title, PREAMBLE_TITLE);
        assert!(chunks[0].text.starts_with("Preamble\n"));
        assert!(chunks[0].text.contains("An Act to regulate tenancy."));
        assert_eq!(chunks[1].section_title, "SECTION 1");
    }

    #[test]
    fn test_markerless_document_is_single_preamble_chunk() {
        let text = "General guidance about rental disputes without any heading.";
        let chunks = chunker(5000, 100).segment(text, &Metadata::new());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_title, PREAMBLE_TITLE);
        assert!(chunks[0].is_full_section);
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(chunker(1000, 100).segment("", &Metadata::new()).is_empty());
        assert!(chunker(1000, 100)
            .segment("  \n\n ", &Metadata::new())
            .is_empty());
    }

    #[test]
    fn test_oversized_section_window_count() {
        // Unbroken text forces hard cuts, making window math exact: the
        // title line leaves 990 characters per window, so stride 890 over
        // 5000 characters gives six windows
        let body: String = "a".repeat(5000);
        let text = format!("SECTION 1\n{}", body);
        let chunks = chunker(1000, 100).segment(&text, &Metadata::new());

        assert_eq!(chunks.len(), 6);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(!chunk.is_full_section);
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.section_title, "SECTION 1");
        }
        // The title prefix counts against the budget
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        assert_eq!(lengths, vec![1000, 1000, 1000, 1000, 1000, 560]);
    }

    #[test]
    fn test_windows_share_exact_overlap() {
        // Numbered words keep the text aperiodic, so the longest shared
        // suffix/prefix run is exactly the configured overlap
        let body: String = (0..400).map(|i| format!("clause{} ", i)).collect();
        let text = format!("SECTION 1\n{}", body.trim());
        let chunks = chunker(1000, 100).segment(&text, &Metadata::new());

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1000);
        }
        for pair in chunks.windows(2) {
            let prev = pair[0].text.strip_prefix("SECTION 1\n").unwrap();
            let next = pair[1].text.strip_prefix("SECTION 1\n").unwrap();
            assert_eq!(shared_chars(prev, next), 100);
        }
    }

    #[test]
    fn test_markerless_oversized_document_windows_as_preamble() {
        let text = "word ".repeat(600);
        let chunks = chunker(1000, 100).segment(text.trim(), &Metadata::new());

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.section_title, PREAMBLE_TITLE);
            assert_eq!(chunk.chunk_index, i);
            assert!(!chunk.is_full_section);
            assert!(chunk.text.chars().count() <= 1000);
        }
        // Non-final windows snap to a word boundary rather than cutting
        // mid-word
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.ends_with(' '));
        }
    }

    #[test]
    fn test_reconstruction_from_chunks() {
        let text = "An introduction paragraph.\n\nSECTION 1\nFirst body.\n\nSECTION 2\nSecond body.";
        let chunks = chunker(5000, 100).segment(text, &Metadata::new());

        let mut rebuilt = Vec::new();
        for chunk in &chunks {
            if chunk.section_title == PREAMBLE_TITLE {
                rebuilt.push(
                    chunk
                        .text
                        .strip_prefix("Preamble\n")
                        .unwrap_or(&chunk.text)
                        .to_string(),
                );
            } else {
                rebuilt.push(chunk.text.clone());
            }
        }
        assert_eq!(rebuilt.join("\n\n"), text);
    }

    #[test]
    fn test_metadata_inherited_unchanged() {
        let mut metadata = Metadata::new();
        metadata.insert("filename".to_string(), "tpa.txt".to_string());
        metadata.insert("language".to_string(), "en".to_string());

        let chunks = chunker(5000, 100).segment("SECTION 1\nBody text.", &metadata);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata, metadata);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        assert!(LegalChunker::new(ChunkingConfig {
            chunk_size: 0,
            chunk_overlap: 0,
        })
        .is_err());
        assert!(LegalChunker::new(ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        })
        .is_err());
    }
}
