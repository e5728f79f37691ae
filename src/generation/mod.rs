//! Text generation backends.
//!
//! Every backend implements [`TextGenerator`]. Which one runs is decided by
//! configuration, never by probing availability at runtime:
//!
//! | Backend    | Implementation       | Notes                                         |
//! |------------|----------------------|-----------------------------------------------|
//! | `fallback` | [`FallbackGenerator`] | Deterministic canned responses, always succeeds |
//! | `command`  | [`CommandGenerator`]  | Spawns a CLI, prompt on stdin, text on stdout  |
//! | `http`     | [`HttpGenerator`]     | TGI-style `POST {endpoint}/generate`           |
//!
//! Callers inside the experiment never see a [`GenerationError`]: they go
//! through [`generate_or_fallback`], which logs the failure and substitutes
//! the deterministic fallback text.

mod command;
mod fallback;
mod http;

pub use command::CommandGenerator;
pub use fallback::{FallbackGenerator, fallback_response};
pub use http::HttpGenerator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::GenerationError;

/// Sampling parameters passed with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Upper bound on generated length (tokens for model backends)
    pub max_length: u32,
    pub temperature: f64,
    /// Sample instead of greedy decoding
    pub do_sample: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_length: 512,
            temperature: 0.7,
            do_sample: true,
        }
    }
}

impl GenerationOptions {
    /// Same options with a different temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A stateless prompt-in, text-out service.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;

    /// Short label used in logs and run metadata.
    fn name(&self) -> &str;
}

/// Generate text, absorbing any backend failure.
///
/// On error the deterministic fallback response for `prompt` is returned, so
/// the result is always non-empty.
pub async fn generate_or_fallback(
    generator: &dyn TextGenerator,
    prompt: &str,
    options: &GenerationOptions,
) -> String {
    match generator.generate(prompt, options).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!(backend = generator.name(), "empty completion, using fallback response");
            fallback_response(prompt)
        }
        Err(e) => {
            warn!(backend = generator.name(), error = %e, "generation failed, using fallback response");
            fallback_response(prompt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::Timeout { secs: 1 })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct Blank;

    #[async_trait]
    impl TextGenerator for Blank {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerationError> {
            Ok("   ".to_string())
        }

        fn name(&self) -> &str {
            "blank"
        }
    }

    #[tokio::test]
    async fn test_failure_is_replaced_by_fallback() {
        let prompt = "What would you like to know about yourself?";
        let text = generate_or_fallback(&Failing, prompt, &GenerationOptions::default()).await;
        assert_eq!(text, fallback_response(prompt));
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn test_blank_output_is_replaced_by_fallback() {
        let text = generate_or_fallback(&Blank, "hello", &GenerationOptions::default()).await;
        assert_eq!(text, fallback_response("hello"));
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let text =
            generate_or_fallback(&FallbackGenerator, "hello", &GenerationOptions::default()).await;
        assert_eq!(text, fallback_response("hello"));
    }

    #[test]
    fn test_default_options() {
        let options = GenerationOptions::default();
        assert_eq!(options.max_length, 512);
        assert!(options.do_sample);
        assert_eq!(options.with_temperature(0.1).temperature, 0.1);
    }
}
