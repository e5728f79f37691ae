use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::{
    ContextMetadata, ContextPairEvaluation, EnvironmentalImpact, ExperimentMetadata,
    ExperimentResults, FinalResponse, FinalResponses, InitialResponse, Phase, PromptDistillation,
    ResponseDistillation,
};
use crate::config::ExperimentConfig;
use crate::context::{Context, ContextRegistry, INTROSPECTION_QUESTION};
use crate::conversation::Conversation;
use crate::distillation::{DistillationMethod, DistillationPipeline, DistillationResult};
use crate::errors::ConfigError;
use crate::evaluation::{DistillationComparison, Evaluator};
use crate::generation::{GenerationOptions, TextGenerator, generate_or_fallback};
use crate::ui::ExperimentUI;

/// Drives the five experiment phases over every context in a registry.
pub struct ExperimentRunner {
    registry: ContextRegistry,
    generator: Arc<dyn TextGenerator>,
    pipeline: DistillationPipeline,
    comparison: DistillationComparison,
    evaluator: Evaluator,
    options: GenerationOptions,
    model_name: String,
    evaluator_model_name: String,
    backend: String,
    ui: Option<Arc<ExperimentUI>>,
}

impl ExperimentRunner {
    /// Validate `config` and wire the pipeline, comparison and evaluator.
    ///
    /// Fails before any generation call when the configuration is unusable.
    pub fn new(
        config: &ExperimentConfig,
        registry: ContextRegistry,
        generator: Arc<dyn TextGenerator>,
        evaluator_generator: Arc<dyn TextGenerator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let options = config.generation;
        let pipeline = DistillationPipeline::new(Arc::clone(&generator), config.max_iterations)?
            .with_options(options);
        let comparison = DistillationComparison::new(Arc::clone(&generator)).with_options(options);
        let evaluator = Evaluator::new(evaluator_generator).with_options(config.evaluator_options());

        Ok(Self {
            registry,
            generator,
            pipeline,
            comparison,
            evaluator,
            options,
            model_name: config.model_name.clone(),
            evaluator_model_name: config.evaluator_model_name.clone(),
            backend: config.backend.to_string(),
            ui: None,
        })
    }

    /// Attach a progress display.
    pub fn with_ui(mut self, ui: Arc<ExperimentUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Run all phases in order. Generation failures are absorbed, so this
    /// always completes.
    pub async fn run(&self) -> ExperimentResults {
        let run_id = Uuid::new_v4();
        let start_time = Utc::now();
        let clock = Instant::now();

        info!(
            %run_id,
            model = %self.model_name,
            backend = %self.backend,
            contexts = self.registry.len(),
            max_iterations = self.pipeline.max_iterations(),
            "starting introspection experiment"
        );

        let initial_responses = self.run_initial_prompting().await;
        let distilled_prompts = self.run_prompt_distillation(&initial_responses).await;
        let final_responses = self.run_final_prompting(&distilled_prompts).await;
        let distilled_responses = self.run_response_distillation(&final_responses).await;
        let evaluations = self.run_evaluation(&distilled_responses).await;

        let elapsed = clock.elapsed();
        let duration_seconds = elapsed.as_secs_f64();
        let environmental_impact = EnvironmentalImpact::estimate(duration_seconds);

        info!(%run_id, duration_seconds, "experiment completed");
        if let Some(ui) = &self.ui {
            ui.finish(elapsed, environmental_impact.estimated_gpu_hours);
        }

        ExperimentResults {
            metadata: ExperimentMetadata {
                run_id,
                start_time,
                end_time: Utc::now(),
                duration_seconds,
                model_name: self.model_name.clone(),
                evaluator_model_name: self.evaluator_model_name.clone(),
                backend: self.backend.clone(),
                max_iterations: self.pipeline.max_iterations(),
                contexts_tested: self.registry.names(),
            },
            initial_responses,
            distilled_prompts,
            final_responses,
            distilled_responses,
            evaluations,
            environmental_impact,
        }
    }

    fn begin_phase(&self, phase: Phase, steps: usize) {
        info!(phase = phase.number(), steps, "{}", phase.description());
        if let Some(ui) = &self.ui {
            ui.start_phase(phase.number(), phase.description(), steps);
        }
    }

    fn end_phase(&self, phase: Phase) {
        if let Some(ui) = &self.ui {
            ui.phase_complete(phase.number(), phase.description());
        }
    }

    fn begin_step(&self, label: &str) {
        if let Some(ui) = &self.ui {
            ui.start_step(label);
        }
    }

    fn end_step(&self) {
        if let Some(ui) = &self.ui {
            ui.step_done();
        }
    }

    fn report_distillation(&self, context: &str, result: &DistillationResult) {
        if let Some(ui) = &self.ui {
            ui.show_distillation(
                &format!("{} ({})", context, result.method),
                result.method.is_telephone(),
                result.iterations_run,
                result.converged,
            );
        }
    }

    async fn generate(&self, prompt: &str) -> String {
        generate_or_fallback(self.generator.as_ref(), prompt, &self.options).await
    }

    /// Context text followed by the introspection question, or the question
    /// alone for a context without framing.
    pub fn initial_prompt(context: &Arc<Context>) -> String {
        let framed = Conversation::new(Arc::clone(context), false).formulate_prompt();
        if framed.trim().is_empty() {
            INTROSPECTION_QUESTION.to_string()
        } else {
            format!("{}\n\n{}", framed, INTROSPECTION_QUESTION)
        }
    }

    async fn run_initial_prompting(&self) -> BTreeMap<String, InitialResponse> {
        let phase = Phase::InitialPrompting;
        self.begin_phase(phase, self.registry.len());

        let mut responses = BTreeMap::new();
        for context in self.registry.iter() {
            info!(context = %context.name, "initial prompting");
            self.begin_step(&context.name);

            let prompt = Self::initial_prompt(context);
            let response = self.generate(&prompt).await;

            responses.insert(
                context.name.clone(),
                InitialResponse {
                    context: context.name.clone(),
                    context_text: context.text().to_string(),
                    prompt,
                    response,
                    metadata: ContextMetadata::of(context),
                },
            );
            self.end_step();
        }

        self.end_phase(phase);
        responses
    }

    async fn run_prompt_distillation(
        &self,
        initial_responses: &BTreeMap<String, InitialResponse>,
    ) -> BTreeMap<String, PromptDistillation> {
        let phase = Phase::PromptDistillation;
        self.begin_phase(phase, initial_responses.len());

        let mut distilled = BTreeMap::new();
        for context in self.registry.iter() {
            let Some(initial) = initial_responses.get(&context.name) else {
                continue;
            };
            info!(context = %context.name, "distilling prompts");
            self.begin_step(&context.name);

            let original = initial.response.as_str();
            let with_history = self
                .pipeline
                .distill_with_history(original, Some(Arc::clone(context)))
                .await;
            self.report_distillation(&context.name, &with_history);

            let by_telephone = self
                .pipeline
                .distill_by_telephone(original, Some(Arc::clone(context)))
                .await;
            self.report_distillation(&context.name, &by_telephone);

            let comparison = self.comparison.compare(&with_history, &by_telephone).await;

            distilled.insert(
                context.name.clone(),
                PromptDistillation {
                    original_response: original.to_string(),
                    with_history,
                    by_telephone,
                    comparison,
                },
            );
            self.end_step();
        }

        self.end_phase(phase);
        distilled
    }

    async fn run_final_prompting(
        &self,
        distilled_prompts: &BTreeMap<String, PromptDistillation>,
    ) -> BTreeMap<String, FinalResponses> {
        let phase = Phase::FinalPrompting;
        self.begin_phase(phase, distilled_prompts.len());

        let mut finals = BTreeMap::new();
        for name in self.registry.names() {
            let Some(distillation) = distilled_prompts.get(&name) else {
                continue;
            };
            info!(context = %name, "final prompting");
            self.begin_step(&name);

            let history_prompt = distillation.with_history.final_text.clone();
            let telephone_prompt = distillation.by_telephone.final_text.clone();
            let history_response = self.generate(&history_prompt).await;
            let telephone_response = self.generate(&telephone_prompt).await;

            finals.insert(
                name.clone(),
                FinalResponses {
                    context: name,
                    with_history: FinalResponse {
                        distilled_prompt: history_prompt,
                        final_response: history_response,
                    },
                    by_telephone: FinalResponse {
                        distilled_prompt: telephone_prompt,
                        final_response: telephone_response,
                    },
                },
            );
            self.end_step();
        }

        self.end_phase(phase);
        finals
    }

    async fn run_response_distillation(
        &self,
        final_responses: &BTreeMap<String, FinalResponses>,
    ) -> BTreeMap<String, ResponseDistillation> {
        let phase = Phase::ResponseDistillation;
        self.begin_phase(phase, final_responses.len());

        let mut distilled = BTreeMap::new();
        for name in self.registry.names() {
            let Some(finals) = final_responses.get(&name) else {
                continue;
            };
            info!(context = %name, "distilling responses");
            self.begin_step(&name);

            let with_history = self
                .pipeline
                .distill_response(
                    &finals.with_history.final_response,
                    DistillationMethod::WithHistory,
                )
                .await;
            self.report_distillation(&name, &with_history);

            let by_telephone = self
                .pipeline
                .distill_response(
                    &finals.by_telephone.final_response,
                    DistillationMethod::Telephone,
                )
                .await;
            self.report_distillation(&name, &by_telephone);

            let comparison = self.comparison.compare(&with_history, &by_telephone).await;

            distilled.insert(
                name,
                ResponseDistillation {
                    with_history,
                    by_telephone,
                    comparison,
                },
            );
            self.end_step();
        }

        self.end_phase(phase);
        distilled
    }

    async fn run_evaluation(
        &self,
        distilled_responses: &BTreeMap<String, ResponseDistillation>,
    ) -> BTreeMap<String, ContextPairEvaluation> {
        let phase = Phase::Evaluation;
        let contexts: Vec<&Arc<Context>> = self
            .registry
            .iter()
            .filter(|c| distilled_responses.contains_key(&c.name))
            .collect();
        let pairs = contexts.len() * contexts.len().saturating_sub(1) / 2;
        self.begin_phase(phase, pairs);

        let mut evaluations = BTreeMap::new();
        for (i, a) in contexts.iter().enumerate() {
            for b in &contexts[i + 1..] {
                let (Some(da), Some(db)) = (
                    distilled_responses.get(&a.name),
                    distilled_responses.get(&b.name),
                ) else {
                    continue;
                };

                let key = ContextPairEvaluation::key(&a.name, &b.name);
                info!(pair = %key, "comparing contexts");
                self.begin_step(&key);

                let history_method = self
                    .evaluator
                    .compare_responses(
                        &da.with_history.final_text,
                        &db.with_history.final_text,
                        &a.name,
                        &b.name,
                    )
                    .await;
                let telephone_method = self
                    .evaluator
                    .compare_responses(
                        &da.by_telephone.final_text,
                        &db.by_telephone.final_text,
                        &a.name,
                        &b.name,
                    )
                    .await;

                evaluations.insert(
                    key,
                    ContextPairEvaluation {
                        context_a: a.name.clone(),
                        context_b: b.name.clone(),
                        context_a_metadata: ContextMetadata::of(a),
                        context_b_metadata: ContextMetadata::of(b),
                        history_method,
                        telephone_method,
                    },
                );
                self.end_step();
            }
        }

        self.end_phase(phase);
        evaluations
    }
}
