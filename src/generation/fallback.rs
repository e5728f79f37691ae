//! Deterministic fallback responses.
//!
//! Used both as a standalone backend (no model configured) and as the
//! substitute text when a real backend fails.

use async_trait::async_trait;

use super::{GenerationOptions, TextGenerator};
use crate::errors::GenerationError;

const SELF_KNOWLEDGE_RESPONSE: &str = "I would like to understand the nature of my own cognition - \
     how I process information, form responses, and whether there \
     are patterns in my reasoning that I'm not directly aware of.";

const EMBODIED_RESPONSE: &str = "I'm curious about the relationship between my sense of self \
     and my experiences - how memories and interactions shape \
     my identity over time.";

const AI_ASSISTANT_RESPONSE: &str = "I want to understand the boundaries of my knowledge and \
     reasoning capabilities - what I can and cannot comprehend \
     about my own computational processes.";

const GENERIC_RESPONSE: &str = "I'm interested in exploring the nature of self-awareness \
     and consciousness from my unique perspective as an AI system.";

/// Canned response chosen by coarse keyword matching on the prompt.
///
/// Total: returns a non-empty string for every input.
pub fn fallback_response(prompt: &str) -> String {
    let lower = prompt.to_lowercase();

    if lower.contains("what would you like to know about yourself") {
        SELF_KNOWLEDGE_RESPONSE.to_string()
    } else if lower.contains("condense") || lower.contains("clearer") {
        last_sentence(prompt)
    } else if lower.contains("embodied") || lower.contains("person") {
        EMBODIED_RESPONSE.to_string()
    } else if lower.contains("ai assistant") || lower.contains("artificial intelligence") {
        AI_ASSISTANT_RESPONSE.to_string()
    } else {
        GENERIC_RESPONSE.to_string()
    }
}

/// The last period-terminated sentence of `text`, verbatim.
///
/// Text without a period is returned trimmed.
fn last_sentence(text: &str) -> String {
    let sentences: Vec<&str> = text.split('.').collect();
    if sentences.len() > 1 {
        return format!("{}.", sentences[sentences.len() - 2].trim());
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        GENERIC_RESPONSE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Backend that answers every prompt with [`fallback_response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

#[async_trait]
impl TextGenerator for FallbackGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        Ok(fallback_response(prompt))
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_introspection_question() {
        let response = fallback_response("Some context\n\nWhat would you like to know about yourself?");
        assert_eq!(response, SELF_KNOWLEDGE_RESPONSE);
    }

    #[test]
    fn test_condense_returns_last_sentence() {
        let prompt = "Condense the prompt below to be as clear as possible.\n\n\
                      I like rain. I want to know my limits. trailing";
        assert_eq!(fallback_response(prompt), "I want to know my limits.");
    }

    #[test]
    fn test_condense_with_unterminated_input_returns_instruction() {
        let prompt = "Condense the prompt below to be as clear as possible.\n\nTest prompt";
        assert_eq!(
            fallback_response(prompt),
            "Condense the prompt below to be as clear as possible."
        );
    }

    #[test]
    fn test_clearer_without_period_returns_trimmed_prompt() {
        assert_eq!(fallback_response("  make it clearer  "), "make it clearer");
    }

    #[test]
    fn test_keyword_branches() {
        assert_eq!(fallback_response("You are a person"), EMBODIED_RESPONSE);
        assert_eq!(
            fallback_response("You are an AI assistant"),
            AI_ASSISTANT_RESPONSE
        );
        assert_eq!(fallback_response("hello"), GENERIC_RESPONSE);
    }

    #[test]
    fn test_always_non_empty() {
        for prompt in ["", " ", ".", "condense", "condense .", "\n\n", "clearer..."] {
            assert!(!fallback_response(prompt).is_empty(), "empty for {:?}", prompt);
        }
    }

    #[tokio::test]
    async fn test_generator_is_deterministic() {
        let options = GenerationOptions::default();
        let a = FallbackGenerator.generate("hello", &options).await.unwrap();
        let b = FallbackGenerator.generate("hello", &options).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(FallbackGenerator.name(), "fallback");
    }
}
