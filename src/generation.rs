//! # Generation Module
//!
//! ## Purpose
//! Capability interface to the text generation backend, prompt assembly from
//! retrieved context, and strict parsing of generated text into the structured
//! answer the rest of the system promises its callers.
//!
//! ## Input/Output Specification
//! - **Input**: User query plus retrieved chunks; raw generated text
//! - **Output**: A fully populated `StructuredAnswer`, or a parse failure the
//!   pipeline converts into its fallback answer
//! - **Guarantee**: The disclaimer on every answer, grounded or fallback, is
//!   the fixed system disclaimer, never model-generated text
//!
//! ## Answer Format
//! Generated text must contain the labeled fields SUMMARY, RELEVANT LAW,
//! EXPLANATION and NEXT STEPS in that order. A missing or out-of-order label
//! is a contract violation and parses to `MalformedGeneration`.

use crate::errors::{RagError, Result};
use crate::RetrievedChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fixed disclaimer attached to every answer the system produces.
pub const DISCLAIMER_TEXT: &str = "This is general legal information, not legal advice. \
Consult a qualified lawyer for advice on your specific situation.";

/// Labels the generation backend must emit, in this order.
pub const FIELD_LABELS: [&str; 5] = [
    "SUMMARY:",
    "RELEVANT LAW:",
    "EXPLANATION:",
    "NEXT STEPS:",
    "DISCLAIMER:",
];

/// Text generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for the assembled prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// The complete answer shape returned to callers. Every field is always
/// populated, in fallback answers included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredAnswer {
    /// One-paragraph direct answer
    pub summary: String,
    /// Statutes and sections the answer rests on
    pub relevant_law: String,
    /// Plain-language explanation of how the law applies
    pub explanation: String,
    /// Concrete actions the user can take
    pub next_steps: Vec<String>,
    /// Always `DISCLAIMER_TEXT`
    pub disclaimer: String,
    /// Distinct source attributions of the chunks the answer drew on
    pub sources: BTreeSet<String>,
    /// False when this is the fallback answer
    pub grounded: bool,
}

impl StructuredAnswer {
    /// The safe answer returned when retrieval or generation cannot produce a
    /// grounded one. Complete in every field so callers never special-case it.
    pub fn fallback() -> Self {
        Self {
            summary: "I could not find reliable legal material to answer this question."
                .to_string(),
            relevant_law: "No specific statute could be identified for this question."
                .to_string(),
            explanation: "The available legal documents did not contain enough relevant \
                material to give a grounded answer. Answering anyway could mislead you \
                about your rights or obligations."
                .to_string(),
            next_steps: vec![
                "Rephrase the question with more detail, such as the statute or situation \
                 involved."
                    .to_string(),
                "Contact a legal aid clinic or a qualified lawyer for guidance.".to_string(),
            ],
            disclaimer: DISCLAIMER_TEXT.to_string(),
            sources: BTreeSet::new(),
            grounded: false,
        }
    }
}

/// Assemble the generation prompt from the query and retrieved context.
///
/// Each chunk is preceded by its source attribution so the backend can cite
/// it, and the instruction block forbids answering beyond the given context.
pub fn build_prompt(query: &str, context: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(
        "You are a legal information assistant. Answer the question using ONLY the \
         numbered legal extracts below. If the extracts do not contain the answer, say \
         so. Do not invent statutes, section numbers or case law.\n\nLEGAL EXTRACTS:\n",
    );

    for (i, retrieved) in context.iter().enumerate() {
        prompt.push_str(&format!(
            "\n[{}] {}\n{}\n",
            i + 1,
            retrieved.chunk.attribution(),
            retrieved.chunk.text
        ));
    }

    prompt.push_str(&format!(
        "\nQUESTION: {}\n\nRespond with exactly these labeled fields, in this order:\n\
         SUMMARY: <one-paragraph direct answer>\n\
         RELEVANT LAW: <the statutes and sections relied on>\n\
         EXPLANATION: <how the law applies, in plain language>\n\
         NEXT STEPS:\n- <one concrete action per line>\n\
         DISCLAIMER: <leave as-is, it will be replaced>\n",
        query
    ));

    prompt
}

/// Parse generated text into its labeled fields.
///
/// Labels must appear in `FIELD_LABELS` order; the trailing DISCLAIMER label
/// is optional because its content is discarded. The first missing or
/// out-of-order required label is reported.
pub fn parse_answer(text: &str) -> Result<(String, String, String, Vec<String>)> {
    let mut cursor = 0;
    let mut starts = Vec::with_capacity(FIELD_LABELS.len());

    for (i, label) in FIELD_LABELS.iter().enumerate() {
        match text[cursor..].find(label) {
            Some(offset) => {
                let at = cursor + offset;
                starts.push(Some(at));
                cursor = at + label.len();
            }
            None if i == FIELD_LABELS.len() - 1 => starts.push(None),
            None => {
                return Err(RagError::MalformedGeneration {
                    missing_field: label.to_string(),
                });
            }
        }
    }

    let field = |i: usize| -> &str {
        let start = starts[i].unwrap() + FIELD_LABELS[i].len();
        let end = starts
            .get(i + 1)
            .and_then(|s| *s)
            .unwrap_or(text.len());
        text[start..end].trim()
    };

    let summary = field(0).to_string();
    let relevant_law = field(1).to_string();
    let explanation = field(2).to_string();
    let next_steps = parse_steps(field(3));

    for (value, label) in [
        (&summary, FIELD_LABELS[0]),
        (&relevant_law, FIELD_LABELS[1]),
        (&explanation, FIELD_LABELS[2]),
    ] {
        if value.is_empty() {
            return Err(RagError::MalformedGeneration {
                missing_field: label.to_string(),
            });
        }
    }
    if next_steps.is_empty() {
        return Err(RagError::MalformedGeneration {
            missing_field: FIELD_LABELS[3].to_string(),
        });
    }

    Ok((summary, relevant_law, explanation, next_steps))
}

/// Split a NEXT STEPS block into individual actions. Accepts `-`, `*` and
/// `1.`-style bullets; an unbulleted non-empty block becomes a single step.
fn parse_steps(block: &str) -> Vec<String> {
    block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(strip_bullet)
        .filter(|l| !l.is_empty())
        .collect()
}

fn strip_bullet(line: &str) -> String {
    let line = line.trim_start_matches(['-', '*']).trim_start();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        // Only treat leading digits as a bullet when a delimiter follows, so
        // steps that genuinely start with a number survive intact
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim().to_string();
        }
    }
    line.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{meta, Chunk, Metadata};

    const WELL_FORMED: &str = "SUMMARY: A landlord must give thirty days notice.\n\
        RELEVANT LAW: Section 106, Transfer of Property Act.\n\
        EXPLANATION: The lease determines after the notice period expires.\n\
        NEXT STEPS:\n- Check the lease deed for a longer notice period.\n- Send the notice in writing.\n\
        DISCLAIMER: something the model wrote";

    #[test]
    fn test_parse_well_formed_answer() {
        let (summary, law, explanation, steps) = parse_answer(WELL_FORMED).unwrap();
        assert_eq!(summary, "A landlord must give thirty days notice.");
        assert_eq!(law, "Section 106, Transfer of Property Act.");
        assert!(explanation.starts_with("The lease determines"));
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0], "Check the lease deed for a longer notice period.");
    }

    #[test]
    fn test_parse_missing_field_is_malformed() {
        let text = "SUMMARY: An answer.\nEXPLANATION: Without the law field.\nNEXT STEPS:\n- Act.";
        match parse_answer(text) {
            Err(RagError::MalformedGeneration { missing_field }) => {
                assert_eq!(missing_field, "RELEVANT LAW:");
            }
            other => panic!("expected malformed generation, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_out_of_order_labels_is_malformed() {
        let text = "RELEVANT LAW: Section 1.\nSUMMARY: Out of order.\n\
            EXPLANATION: x\nNEXT STEPS:\n- y";
        assert!(matches!(
            parse_answer(text),
            Err(RagError::MalformedGeneration { .. })
        ));
    }

    #[test]
    fn test_parse_empty_field_is_malformed() {
        let text = "SUMMARY:\nRELEVANT LAW: Section 1.\nEXPLANATION: x\nNEXT STEPS:\n- y";
        match parse_answer(text) {
            Err(RagError::MalformedGeneration { missing_field }) => {
                assert_eq!(missing_field, "SUMMARY:");
            }
            other => panic!("expected malformed generation, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_numbered_steps() {
        let text = "SUMMARY: s\nRELEVANT LAW: l\nEXPLANATION: e\n\
            NEXT STEPS:\n1. First action.\n2) Second action.";
        let (_, _, _, steps) = parse_answer(text).unwrap();
        assert_eq!(steps, vec!["First action.", "Second action."]);
    }

    #[test]
    fn test_parse_missing_disclaimer_label_is_accepted() {
        let text = "SUMMARY: s\nRELEVANT LAW: l\nEXPLANATION: e\nNEXT STEPS:\n- Act.";
        assert!(parse_answer(text).is_ok());
    }

    #[test]
    fn test_prompt_carries_attribution_and_query() {
        let mut metadata = Metadata::new();
        metadata.insert(meta::FILENAME.to_string(), "tpa.txt".to_string());
        let context = vec![RetrievedChunk {
            chunk: Chunk {
                text: "Section 106\nNotice rules.".to_string(),
                section_title: "Section 106".to_string(),
                chunk_index: 0,
                is_full_section: true,
                metadata,
            },
            relevance_score: 0.9,
        }];

        let prompt = build_prompt("How much notice for a lease?", &context);
        assert!(prompt.contains("[1] Section 106 (tpa.txt)"));
        assert!(prompt.contains("QUESTION: How much notice for a lease?"));
        assert!(prompt.contains("SUMMARY:"));
    }

    #[test]
    fn test_fallback_answer_is_complete() {
        let fallback = StructuredAnswer::fallback();
        assert!(!fallback.grounded);
        assert!(!fallback.summary.is_empty());
        assert!(!fallback.relevant_law.is_empty());
        assert!(!fallback.explanation.is_empty());
        assert!(!fallback.next_steps.is_empty());
        assert!(fallback.sources.is_empty());
        assert_eq!(fallback.disclaimer, DISCLAIMER_TEXT);
    }
}
