//! # Multilingual Support Module
//!
//! ## Purpose
//! Capability interface for translating user queries between the supported
//! languages. The answer pipeline translates Hindi queries into English
//! before retrieval when a translator is configured; translation failures
//! degrade to answering over the untranslated query rather than failing the
//! request.

use crate::errors::Result;
use crate::Language;
use async_trait::async_trait;

/// Query translation capability.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `from` into `to`.
    async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String>;
}

/// Pass-through translator for deployments without a translation backend.
/// Keeps the pipeline wiring uniform when only English is served.
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str, _from: Language, _to: Language) -> Result<String> {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity_translator_passes_through() {
        let translator = IdentityTranslator;
        let out = translator
            .translate("मकान मालिक को कितना नोटिस देना होगा?", Language::Hi, Language::En)
            .await
            .unwrap();
        assert_eq!(out, "मकान मालिक को कितना नोटिस देना होगा?");
    }
}
