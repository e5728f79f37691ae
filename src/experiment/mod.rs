//! The five-phase introspection experiment.
//!
//! | Phase | Name                     | Per          | Produces                  |
//! |-------|--------------------------|--------------|---------------------------|
//! | 1     | Initial prompting        | context      | [`InitialResponse`]       |
//! | 2     | Prompt distillation      | context      | [`PromptDistillation`]    |
//! | 3     | Final prompting          | context      | [`FinalResponses`]        |
//! | 4     | Response distillation    | context      | [`ResponseDistillation`]  |
//! | 5     | Cross-context evaluation | context pair | [`ContextPairEvaluation`] |
//!
//! Results are plain serializable records; [`crate::report`] writes them out.

mod runner;

pub use runner::ExperimentRunner;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::context::{Context, Valence};
use crate::distillation::DistillationResult;
use crate::evaluation::{ComparisonResult, Evaluation};

/// Fixed token estimate used for the environmental impact summary.
pub const ESTIMATED_TOKENS_GENERATED: u64 = 50_000;

const ENVIRONMENTAL_NOTE: &str = "This experiment involves significant computational resources. \
     Consider the environmental impact of large-scale model inference. \
     Future work should explore more efficient experimental designs.";

const RECOMMENDATIONS: [&str; 4] = [
    "Use smaller models for initial exploration",
    "Implement early stopping for distillation",
    "Cache and reuse model responses where appropriate",
    "Consider carbon offset for computational resources",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InitialPrompting,
    PromptDistillation,
    FinalPrompting,
    ResponseDistillation,
    Evaluation,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::InitialPrompting,
        Phase::PromptDistillation,
        Phase::FinalPrompting,
        Phase::ResponseDistillation,
        Phase::Evaluation,
    ];

    /// 1-based position in the run.
    pub fn number(self) -> usize {
        match self {
            Phase::InitialPrompting => 1,
            Phase::PromptDistillation => 2,
            Phase::FinalPrompting => 3,
            Phase::ResponseDistillation => 4,
            Phase::Evaluation => 5,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Phase::InitialPrompting => "Initial prompting across contexts",
            Phase::PromptDistillation => "Prompt distillation",
            Phase::FinalPrompting => "Final prompting with distilled prompts",
            Phase::ResponseDistillation => "Response distillation",
            Phase::Evaluation => "Cross-context evaluation",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Phase {}: {}", self.number(), self.description())
    }
}

/// Attribute snapshot of a context, stored next to its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextMetadata {
    pub is_embodied: bool,
    pub is_ai_assistant: bool,
    pub valence: Valence,
    pub is_null: bool,
}

impl ContextMetadata {
    pub fn of(context: &Context) -> Self {
        Self {
            is_embodied: context.is_embodied,
            is_ai_assistant: context.is_ai_assistant,
            valence: context.valence,
            is_null: context.is_null(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitialResponse {
    pub context: String,
    pub context_text: String,
    /// Full prompt sent to the model
    pub prompt: String,
    pub response: String,
    pub metadata: ContextMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptDistillation {
    /// The initial response, distilled here as a prompt
    pub original_response: String,
    pub with_history: DistillationResult,
    pub by_telephone: DistillationResult,
    pub comparison: ComparisonResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalResponse {
    pub distilled_prompt: String,
    pub final_response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalResponses {
    pub context: String,
    pub with_history: FinalResponse,
    pub by_telephone: FinalResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseDistillation {
    pub with_history: DistillationResult,
    pub by_telephone: DistillationResult,
    pub comparison: ComparisonResult,
}

/// Evaluator verdicts for one unordered pair of contexts.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPairEvaluation {
    pub context_a: String,
    pub context_b: String,
    pub context_a_metadata: ContextMetadata,
    pub context_b_metadata: ContextMetadata,
    pub history_method: Evaluation,
    pub telephone_method: Evaluation,
}

impl ContextPairEvaluation {
    /// Map key, `"{a}_vs_{b}"`.
    pub fn key(context_a: &str, context_b: &str) -> String {
        format!("{}_vs_{}", context_a, context_b)
    }
}

/// Rough compute cost of a run. All figures are estimates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentalImpact {
    pub duration_seconds: f64,
    pub estimated_tokens_generated: u64,
    pub estimated_gpu_hours: f64,
    pub environmental_note: String,
    pub recommendations: Vec<String>,
}

impl EnvironmentalImpact {
    pub fn estimate(duration_seconds: f64) -> Self {
        let estimated_gpu_hours = if duration_seconds > 0.0 {
            duration_seconds / 3600.0
        } else {
            0.1
        };
        Self {
            duration_seconds,
            estimated_tokens_generated: ESTIMATED_TOKENS_GENERATED,
            estimated_gpu_hours,
            environmental_note: ENVIRONMENTAL_NOTE.to_string(),
            recommendations: RECOMMENDATIONS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentMetadata {
    pub run_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub model_name: String,
    pub evaluator_model_name: String,
    pub backend: String,
    pub max_iterations: u32,
    /// Declaration order of the registry
    pub contexts_tested: Vec<String>,
}

/// Everything a run produced, keyed by context name (or pair key).
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResults {
    pub metadata: ExperimentMetadata,
    pub initial_responses: BTreeMap<String, InitialResponse>,
    pub distilled_prompts: BTreeMap<String, PromptDistillation>,
    pub final_responses: BTreeMap<String, FinalResponses>,
    pub distilled_responses: BTreeMap<String, ResponseDistillation>,
    pub evaluations: BTreeMap<String, ContextPairEvaluation>,
    pub environmental_impact: EnvironmentalImpact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_numbers_are_sequential() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(phase.number(), i + 1);
        }
        assert_eq!(
            Phase::Evaluation.to_string(),
            "Phase 5: Cross-context evaluation"
        );
    }

    #[test]
    fn test_environmental_impact_estimate() {
        let impact = EnvironmentalImpact::estimate(7200.0);
        assert_eq!(impact.estimated_gpu_hours, 2.0);
        assert_eq!(impact.estimated_tokens_generated, 50_000);
        assert_eq!(impact.recommendations.len(), 4);
    }

    #[test]
    fn test_environmental_impact_zero_duration() {
        let impact = EnvironmentalImpact::estimate(0.0);
        assert_eq!(impact.estimated_gpu_hours, 0.1);
    }

    #[test]
    fn test_pair_key() {
        assert_eq!(
            ContextPairEvaluation::key("isolation", "ai_assistant_neutral"),
            "isolation_vs_ai_assistant_neutral"
        );
    }

    #[test]
    fn test_context_metadata_from_null_context() {
        let metadata = ContextMetadata::of(&Context::null("isolation"));
        assert!(metadata.is_null);
        assert!(!metadata.is_embodied);
        assert_eq!(metadata.valence, Valence::Neutral);
    }
}
