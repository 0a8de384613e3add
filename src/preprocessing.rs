//! # Text Preprocessing Module
//!
//! ## Purpose
//! Normalizes raw extracted legal text into clean structured text while
//! preserving clause and section structure: strips running headers/footers and
//! OCR noise, canonicalizes legal abbreviations, re-inserts line breaks at
//! section boundaries and detects the document language.
//!
//! ## Input/Output Specification
//! - **Input**: Raw text from a document loader plus its metadata map
//! - **Output**: Cleaned text and an enriched metadata map (`language`,
//!   `text_length`, `word_count`, `preprocessed`, `boilerplate_removed`)
//! - **Guarantee**: No step fails on malformed input; every step is the identity
//!   on empty input and the full pipeline is idempotent
//!
//! ## Key Features
//! - Language detection restricted to {en, hi} with a safe fallback to en
//! - Line-oriented header/footer and page-number stripping
//! - Abbreviation expansion (`Sec.` → `Section`, `Art.` → `Article`) and
//!   paragraph-break insertion before recognized section markers
//! - Fixed-table OCR artifact cleanup that never touches non-Latin codepoints
//! - Whitespace normalization that preserves paragraph breaks
//! - Opt-in boilerplate removal with an aggressive variant
//!
//! Marker recognition is deliberately case-sensitive: only ALL-CAPS and
//! Title-Case forms ("SECTION 106", "Section 106") are structural markers.
//! Lowercase "section" in running prose is never treated as structure; this
//! under-segments inconsistently capitalized documents but avoids false
//! positives, a known and accepted limitation.

use crate::config::PreprocessConfig;
use crate::errors::{RagError, Result};
use crate::{meta, Language, Metadata};
use regex::Regex;

/// Section/clause/article/chapter marker pattern shared by the normalizer and
/// the segmenter. ALL-CAPS or Title-Case followed by a number.
pub(crate) const SECTION_MARKER_PATTERN: &str =
    r"\b(?:SECTION|Section|CLAUSE|Clause|ARTICLE|Article|CHAPTER|Chapter)[ \t]+\d+";

/// Legal text normalizer.
///
/// Immutable once constructed; `preprocess` is pure with respect to its input,
/// so one instance can serve many documents concurrently.
pub struct TextPreprocessor {
    config: PreprocessConfig,
    page_number: Regex,
    page_indicator: Regex,
    standalone_number: Regex,
    punctuation_only: Regex,
    sec_abbrev: Regex,
    art_abbrev: Regex,
    marker: Regex,
    marker_spaced_text: Regex,
    marker_glued_text: Regex,
    multi_space: Regex,
    multi_newline: Regex,
    ocr_fixes: Vec<(Regex, &'static str)>,
    boilerplate: Vec<Regex>,
    boilerplate_aggressive: Vec<Regex>,
}

impl TextPreprocessor {
    /// Create a new preprocessor, compiling all patterns up front.
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| RagError::Internal {
                message: format!("Invalid preprocessing regex '{}': {}", pattern, e),
            })
        };

        let ocr_patterns: &[(&str, &'static str)] = &[
            // Lone lowercase l is almost always a misread capital I
            (r"\bl\b", "I"),
            // Latin typographic ligatures from PDF extraction
            (r"ﬁ", "fi"),
            (r"ﬂ", "fl"),
        ];
        let mut ocr_fixes = Vec::new();
        for (pattern, replacement) in ocr_patterns {
            ocr_fixes.push((compile(pattern)?, *replacement));
        }

        let boilerplate_patterns = [
            r"(?i)this document is for informational purposes only",
            r"(?i)confidential and proprietary",
            r"(?i)all rights reserved",
        ];
        let aggressive_patterns = [r"(?i)copyright \d{4}", r"(?i)printed on"];

        let mut boilerplate = Vec::new();
        for pattern in boilerplate_patterns {
            boilerplate.push(compile(pattern)?);
        }
        let mut boilerplate_aggressive = Vec::new();
        for pattern in aggressive_patterns {
            boilerplate_aggressive.push(compile(pattern)?);
        }

        Ok(Self {
            config,
            page_number: compile(r"(?i)^page\s*\d+$")?,
            page_indicator: compile(r"(?i)^(?:page\s+)?\d+\s+of\s+\d+$")?,
            standalone_number: compile(r"^\d+$")?,
            punctuation_only: compile(r"^[\W_]+$")?,
            sec_abbrev: compile(r"\bSec\.\s*(\d+)")?,
            art_abbrev: compile(r"\bArt\.\s*(\d+)")?,
            marker: compile(SECTION_MARKER_PATTERN)?,
            // Two forms so the marker's number can never donate digits to the
            // following-text capture: the spaced form demands whitespace after
            // the number, the glued form demands a non-digit
            marker_spaced_text: compile(&format!(r"({})[ \t]+(\S)", SECTION_MARKER_PATTERN))?,
            marker_glued_text: compile(&format!(r"({})([^\s\d])", SECTION_MARKER_PATTERN))?,
            multi_space: compile(r" {2,}")?,
            multi_newline: compile(r"\n{3,}")?,
            ocr_fixes,
            boilerplate,
            boilerplate_aggressive,
        })
    }

    /// Full preprocessing pipeline.
    ///
    /// Steps, in fixed order: language detection, header/footer stripping, legal
    /// structure normalization, OCR artifact cleanup, whitespace normalization,
    /// optional boilerplate removal, metadata enrichment. Returns the cleaned
    /// text and an enriched copy of the metadata map; pre-existing keys are
    /// never removed.
    pub fn preprocess(&self, raw_text: &str, metadata: &Metadata) -> (String, Metadata) {
        let language = Self::detect_language(raw_text);

        let text = self.strip_headers_and_footers(raw_text);
        let text = self.normalize_legal_structure(&text);
        let text = self.clean_ocr_artifacts(&text);
        let text = self.normalize_whitespace(&text);
        let text = if self.config.remove_boilerplate {
            self.strip_boilerplate(&text)
        } else {
            text
        };

        let mut enriched = metadata.clone();
        enriched.insert(meta::LANGUAGE.to_string(), language.as_str().to_string());
        enriched.insert(
            meta::TEXT_LENGTH.to_string(),
            text.chars().count().to_string(),
        );
        enriched.insert(
            meta::WORD_COUNT.to_string(),
            text.split_whitespace().count().to_string(),
        );
        enriched.insert(meta::PREPROCESSED.to_string(), "true".to_string());
        enriched.insert(
            meta::BOILERPLATE_REMOVED.to_string(),
            self.config.remove_boilerplate.to_string(),
        );

        tracing::debug!(
            language = language.as_str(),
            chars = text.chars().count(),
            "Preprocessing complete"
        );

        (text, enriched)
    }

    /// Detect the dominant language of a document.
    ///
    /// Only `en` and `hi` are recognized; any other detection outcome, detector
    /// failure or too-short input resolves to English. A deliberate
    /// safe-fallback policy, not a best-effort guess.
    pub fn detect_language(text: &str) -> Language {
        let trimmed = text.trim();
        if trimmed.chars().count() < 20 {
            tracing::debug!("Text too short for reliable language detection, defaulting to en");
            return Language::En;
        }

        match whatlang::detect(trimmed) {
            Some(info) => match info.lang() {
                whatlang::Lang::Hin => Language::Hi,
                whatlang::Lang::Eng => Language::En,
                other => {
                    tracing::debug!(detected = %other, "Unsupported language, defaulting to en");
                    Language::En
                }
            },
            None => {
                tracing::debug!("Language detection failed, defaulting to en");
                Language::En
            }
        }
    }

    /// Drop page numbers, standalone integers and punctuation-only lines.
    ///
    /// Lines containing legal content are never touched, even when numeric
    /// tokens appear inline. Empty lines are kept for the later whitespace pass.
    fn strip_headers_and_footers(&self, text: &str) -> String {
        let mut kept = Vec::new();

        for line in text.lines() {
            let stripped = line.trim();
            if stripped.is_empty() {
                kept.push("");
                continue;
            }
            if self.page_number.is_match(stripped)
                || self.page_indicator.is_match(stripped)
                || self.standalone_number.is_match(stripped)
                || self.punctuation_only.is_match(stripped)
            {
                tracing::trace!(line = stripped, "Dropped header/footer line");
                continue;
            }
            kept.push(line);
        }

        kept.join("\n")
    }

    /// Expand abbreviations and re-insert line breaks at structural markers.
    ///
    /// A paragraph break is inserted before every recognized marker even when
    /// the source glues it to adjacent prose, and a line break separates the
    /// marker from text following it on the same line. Surplus newlines are
    /// collapsed by the subsequent whitespace pass.
    fn normalize_legal_structure(&self, text: &str) -> String {
        // Abbreviations expand only when followed by a numeral
        let text = self.sec_abbrev.replace_all(text, "Section ${1}");
        let text = self.art_abbrev.replace_all(&text, "Article ${1}");

        let text = self.marker.replace_all(&text, "\n\n${0}");
        let text = self.marker_spaced_text.replace_all(&text, "${1}\n${2}");
        let text = self.marker_glued_text.replace_all(&text, "${1}\n${2}");

        text.into_owned()
    }

    /// Remove null bytes and apply the fixed OCR substitution table.
    ///
    /// Only Latin codepoints appear in the table; non-Latin content passes
    /// through untouched.
    fn clean_ocr_artifacts(&self, text: &str) -> String {
        let mut cleaned = text.replace('\u{0}', "");
        for (pattern, replacement) in &self.ocr_fixes {
            cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
        }
        cleaned
    }

    /// Collapse space runs, convert tabs, and cap consecutive newlines at two.
    fn normalize_whitespace(&self, text: &str) -> String {
        let text = text.replace('\t', " ");
        let text = self.multi_space.replace_all(&text, " ");
        let text = self.multi_newline.replace_all(&text, "\n\n");
        text.trim().to_string()
    }

    /// Drop lines matching known boilerplate phrases. The aggressive pattern
    /// set is only consulted when configured.
    fn strip_boilerplate(&self, text: &str) -> String {
        let mut patterns: Vec<&Regex> = self.boilerplate.iter().collect();
        if self.config.aggressive {
            patterns.extend(self.boilerplate_aggressive.iter());
        }

        let kept: Vec<&str> = text
            .lines()
            .filter(|line| !patterns.iter().any(|p| p.is_match(line)))
            .collect();

        let rejoined = kept.join("\n");
        // Dropped lines can leave surplus blank lines behind
        self.multi_newline
            .replace_all(&rejoined, "\n\n")
            .trim()
            .to_string()
    }
}
