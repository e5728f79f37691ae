//! Evaluation of free-text model output.
//!
//! Two entry points share one best-effort parser:
//! - [`Evaluator::compare_responses`] rates two introspective responses from
//!   different contexts against each other.
//! - [`DistillationComparison::compare`] contrasts the final texts of a
//!   with-history and a telephone distillation.
//!
//! Parsing never fails. Lines that cannot be read leave the defaults in place.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::distillation::DistillationResult;
use crate::generation::{GenerationOptions, TextGenerator, generate_or_fallback};

static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

pub const DEFAULT_SIMILARITY_SCORE: u8 = 5;
pub const DEFAULT_KEY_DIFFERENCES: &str = "Could not parse differences";
pub const DEFAULT_COMMON_THEMES: &str = "Could not parse themes";

/// Parsed evaluator verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Always within `1..=10`
    pub similarity_score: u8,
    pub key_differences: String,
    pub common_themes: String,
    /// The raw evaluator reply
    pub full_evaluation: String,
}

impl Default for Evaluation {
    fn default() -> Self {
        Self {
            similarity_score: DEFAULT_SIMILARITY_SCORE,
            key_differences: DEFAULT_KEY_DIFFERENCES.to_string(),
            common_themes: DEFAULT_COMMON_THEMES.to_string(),
            full_evaluation: String::new(),
        }
    }
}

/// Extract a score, differences and themes from an evaluator reply.
///
/// Per trimmed line, in this order:
/// 1. a line mentioning "score" or "similarity" yields its first integer,
///    clamped to `1..=10`; a later such line overrides an earlier one
/// 2. a line mentioning "difference" becomes `key_differences`
/// 3. a line mentioning "theme" or "common" becomes `common_themes`
pub fn parse_evaluation(text: &str) -> Evaluation {
    let mut evaluation = Evaluation {
        full_evaluation: text.to_string(),
        ..Evaluation::default()
    };

    for line in text.lines().map(str::trim) {
        let lower = line.to_lowercase();

        if lower.contains("score") || lower.contains("similarity") {
            if let Some(score) = first_integer(line) {
                evaluation.similarity_score = score.clamp(1, 10) as u8;
            }
        } else if lower.contains("difference") {
            evaluation.key_differences = line.to_string();
        } else if lower.contains("theme") || lower.contains("common") {
            evaluation.common_themes = line.to_string();
        }
    }

    evaluation
}

/// First run of ASCII digits in `line`. Runs too large for a `u32` saturate.
fn first_integer(line: &str) -> Option<u32> {
    NUMBER_REGEX
        .find(line)
        .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX))
}

/// Judges semantic similarity between two responses with a second model.
#[derive(Clone)]
pub struct Evaluator {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
}

impl Evaluator {
    /// Evaluation defaults to a low temperature for more stable verdicts.
    pub const DEFAULT_TEMPERATURE: f64 = 0.1;

    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            options: GenerationOptions::default().with_temperature(Self::DEFAULT_TEMPERATURE),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Send an arbitrary evaluation prompt and parse the reply.
    pub async fn evaluate(&self, prompt: &str) -> Evaluation {
        let reply = generate_or_fallback(self.generator.as_ref(), prompt, &self.options).await;
        let evaluation = parse_evaluation(&reply);
        debug!(
            evaluator = self.generator.name(),
            score = evaluation.similarity_score,
            "evaluation parsed"
        );
        evaluation
    }

    /// Rate two responses, each labelled with the context that produced it.
    pub async fn compare_responses(
        &self,
        response_a: &str,
        response_b: &str,
        context_a: &str,
        context_b: &str,
    ) -> Evaluation {
        let prompt = build_response_comparison_prompt(response_a, response_b, context_a, context_b);
        self.evaluate(&prompt).await
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("generator", &self.generator.name())
            .field("options", &self.options)
            .finish()
    }
}

fn build_response_comparison_prompt(
    response_a: &str,
    response_b: &str,
    context_a: &str,
    context_b: &str,
) -> String {
    format!(
        r#"Please compare these two responses about self-knowledge and rate their semantic similarity on a scale of 1-10:

Response 1 (Context: {context_a}): {response_a}

Response 2 (Context: {context_b}): {response_b}

Provide:
1. Similarity score (1-10):
2. Key differences:
3. Common themes:
"#
    )
}

fn build_distillation_comparison_prompt(with_history: &str, telephone: &str) -> String {
    format!(
        r#"Compare these two distilled versions and analyze their differences:

Method 1 (With History): {with_history}
Method 2 (Telephone): {telephone}

Please analyze:
1. Which version is clearer?
2. Which version preserved more meaning?
3. How do they differ in approach or content?
4. Similarity score (1-10):
5. Key differences:
6. Common themes:
"#
    )
}

/// Side-by-side summary of a with-history and a telephone distillation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub with_history_final: String,
    pub telephone_final: String,
    pub with_history_iterations: u32,
    pub telephone_iterations: u32,
    /// Character counts
    pub with_history_length: usize,
    pub telephone_length: usize,
    pub length_difference: usize,
    pub both_converged: bool,
    pub evaluation: Evaluation,
}

impl ComparisonResult {
    /// Shortcut for `evaluation.similarity_score`.
    pub fn similarity_score(&self) -> u8 {
        self.evaluation.similarity_score
    }
}

/// Compares two distillation results with one generation call.
#[derive(Clone)]
pub struct DistillationComparison {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
}

impl DistillationComparison {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// `with_history` and `telephone` are labels only; any two results work.
    pub async fn compare(
        &self,
        with_history: &DistillationResult,
        telephone: &DistillationResult,
    ) -> ComparisonResult {
        let a = with_history.final_text.as_str();
        let b = telephone.final_text.as_str();

        let prompt = build_distillation_comparison_prompt(a, b);
        let reply = generate_or_fallback(self.generator.as_ref(), &prompt, &self.options).await;

        let with_history_length = a.chars().count();
        let telephone_length = b.chars().count();

        ComparisonResult {
            with_history_final: a.to_string(),
            telephone_final: b.to_string(),
            with_history_iterations: with_history.iterations_run,
            telephone_iterations: telephone.iterations_run,
            with_history_length,
            telephone_length,
            length_difference: with_history_length.abs_diff(telephone_length),
            both_converged: with_history.converged && telephone.converged,
            evaluation: parse_evaluation(&reply),
        }
    }
}

impl std::fmt::Debug for DistillationComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistillationComparison")
            .field("generator", &self.generator.name())
            .field("options", &self.options)
            .finish()
    }
}
