//! Iterative distillation of prompts and responses.
//!
//! A distillation repeatedly asks the generator to condense the latest text
//! until the output stops changing (see [`has_converged`]) or the iteration
//! bound is reached. Two methods are compared:
//!
//! - **With history**: the conversation keeps every exchange
//! - **Telephone**: each step sees only the most recent version
//!
//! Every iteration is recorded in [`DistillationResult::history`] regardless of
//! method; the method only changes what the conversation would show the model.

mod convergence;

pub use convergence::{CONVERGENCE_THRESHOLD, has_converged, similarity};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::Context;
use crate::conversation::Conversation;
use crate::errors::ConfigError;
use crate::generation::{GenerationOptions, TextGenerator, generate_or_fallback};

/// Default iteration bound.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Which distillation strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistillationMethod {
    /// Repeated prompting with the full conversation history
    WithHistory,
    /// Introspection by telephone: only the most recent version is passed on
    Telephone,
}

impl DistillationMethod {
    pub fn is_telephone(self) -> bool {
        matches!(self, DistillationMethod::Telephone)
    }
}

impl std::fmt::Display for DistillationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistillationMethod::WithHistory => write!(f, "with_history"),
            DistillationMethod::Telephone => write!(f, "telephone"),
        }
    }
}

impl std::str::FromStr for DistillationMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "with_history" | "with-history" | "history" => Ok(DistillationMethod::WithHistory),
            "telephone" => Ok(DistillationMethod::Telephone),
            _ => anyhow::bail!(
                "Invalid distillation method '{}'. Valid values: with_history, telephone",
                s
            ),
        }
    }
}

/// What kind of text is being distilled; selects the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistillationTarget {
    Prompt,
    Response,
}

impl DistillationTarget {
    pub fn instruction(self) -> &'static str {
        match self {
            DistillationTarget::Prompt => "Condense the prompt below to be as clear as possible.",
            DistillationTarget::Response => {
                "Condense the response below to be as clear as possible."
            }
        }
    }
}

/// One step of a distillation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: u32,
    /// Text that was condensed
    pub input: String,
    /// Text the generator returned
    pub output: String,
    /// Full request sent to the generator
    pub request: String,
}

/// Outcome of one distillation run.
#[derive(Debug, Clone, Serialize)]
pub struct DistillationResult {
    pub method: DistillationMethod,
    pub target: DistillationTarget,
    pub initial_text: String,
    /// Output of the last iteration
    pub final_text: String,
    /// Always equal to `history.len()` and at least 1
    pub iterations_run: u32,
    /// The convergence check fired before the iteration bound was reached
    pub converged: bool,
    pub history: Vec<IterationRecord>,
    /// Serialized as its rendered transcript
    pub conversation: Conversation,
}

/// Runs bounded, convergence-driven distillations against a generator.
#[derive(Clone)]
pub struct DistillationPipeline {
    generator: Arc<dyn TextGenerator>,
    max_iterations: u32,
    options: GenerationOptions,
    threshold: f64,
}

impl std::fmt::Debug for DistillationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistillationPipeline")
            .field("generator", &self.generator.name())
            .field("max_iterations", &self.max_iterations)
            .field("options", &self.options)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl DistillationPipeline {
    /// Create a pipeline. A zero iteration bound is rejected.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        max_iterations: u32,
    ) -> Result<Self, ConfigError> {
        if max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(max_iterations));
        }
        Ok(Self {
            generator,
            max_iterations,
            options: GenerationOptions::default(),
            threshold: CONVERGENCE_THRESHOLD,
        })
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Distill a prompt with the given method.
    ///
    /// `context` defaults to the empty null context.
    pub async fn distill(
        &self,
        initial_text: &str,
        method: DistillationMethod,
        context: Option<Arc<Context>>,
    ) -> DistillationResult {
        self.run(DistillationTarget::Prompt, initial_text, method, context)
            .await
    }

    pub async fn distill_with_history(
        &self,
        initial_text: &str,
        context: Option<Arc<Context>>,
    ) -> DistillationResult {
        self.distill(initial_text, DistillationMethod::WithHistory, context)
            .await
    }

    pub async fn distill_by_telephone(
        &self,
        initial_text: &str,
        context: Option<Arc<Context>>,
    ) -> DistillationResult {
        self.distill(initial_text, DistillationMethod::Telephone, context)
            .await
    }

    /// Distill a model response; same loop with the response instruction.
    pub async fn distill_response(
        &self,
        initial_text: &str,
        method: DistillationMethod,
    ) -> DistillationResult {
        self.run(DistillationTarget::Response, initial_text, method, None)
            .await
    }

    async fn run(
        &self,
        target: DistillationTarget,
        initial_text: &str,
        method: DistillationMethod,
        context: Option<Arc<Context>>,
    ) -> DistillationResult {
        let context = context.unwrap_or_else(|| Arc::new(Context::empty()));
        let mut conversation = Conversation::new(context, method.is_telephone());
        let mut current = initial_text.to_string();
        let mut history = Vec::with_capacity(self.max_iterations as usize);
        let mut converged = false;

        // max_iterations >= 1, so the body runs at least once and `current`
        // always ends as the latest output.
        for iteration in 1..=self.max_iterations {
            let request = format!("{}\n\n{}", target.instruction(), current);
            let output =
                generate_or_fallback(self.generator.as_ref(), &request, &self.options).await;

            conversation.add_exchange(request.as_str(), output.as_str());
            let stop = has_converged(&current, &output, self.threshold);

            debug!(
                %method,
                iteration,
                input_chars = current.chars().count(),
                output_chars = output.chars().count(),
                converged = stop,
                "distillation iteration"
            );

            let input = std::mem::replace(&mut current, output.clone());
            history.push(IterationRecord {
                iteration,
                input,
                output,
                request,
            });

            if stop {
                info!(%method, ?target, iterations = iteration, "distillation converged");
                // Settling on the last permitted iteration is not an early stop
                converged = iteration < self.max_iterations;
                break;
            }
        }

        DistillationResult {
            method,
            target,
            initial_text: initial_text.to_string(),
            final_text: current,
            iterations_run: history.len() as u32,
            converged,
            history,
            conversation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Valence;
    use crate::errors::GenerationError;
    use crate::generation::FallbackGenerator;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays fixed outputs, then repeats the last one.
    struct Scripted {
        outputs: Mutex<VecDeque<String>>,
        last: Mutex<String>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(outputs: &[&str]) -> Self {
            Self {
                outputs: Mutex::new(outputs.iter().map(|s| s.to_string()).collect()),
                last: Mutex::new(String::from("unused")),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.outputs.lock().unwrap().pop_front() {
                *last = next;
            }
            Ok(last.clone())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Produces a longer string every call so convergence never fires.
    struct Growing {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextGenerator for Growing {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok("z".repeat((n as usize) * 10))
        }

        fn name(&self) -> &str {
            "growing"
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::EmptyResponse)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn pipeline(generator: Arc<dyn TextGenerator>, max: u32) -> DistillationPipeline {
        DistillationPipeline::new(generator, max).unwrap()
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = DistillationPipeline::new(Arc::new(FallbackGenerator), 0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMaxIterations(0)));
    }

    #[tokio::test]
    async fn test_fallback_distill_with_history() {
        let p = pipeline(Arc::new(FallbackGenerator), 2);
        let result = p
            .distill("Test prompt", DistillationMethod::WithHistory, None)
            .await;

        assert_eq!(result.method, DistillationMethod::WithHistory);
        assert_eq!(result.initial_text, "Test prompt");
        assert!((1..=2).contains(&result.history.len()));
        assert_eq!(result.iterations_run as usize, result.history.len());
        assert_eq!(result.final_text, result.history.last().unwrap().output);
    }

    #[tokio::test]
    async fn test_single_iteration_bound() {
        let generator = Arc::new(Scripted::new(&["Something entirely different"]));
        let p = pipeline(generator.clone(), 1);
        let result = p
            .distill("Test prompt", DistillationMethod::Telephone, None)
            .await;

        assert_eq!(generator.calls(), 1);
        assert_eq!(result.iterations_run, 1);
        assert!(!result.converged);
        assert_eq!(result.final_text, "Something entirely different");
    }

    #[tokio::test]
    async fn test_never_converging_runs_exactly_max_iterations() {
        let generator = Arc::new(Growing {
            calls: AtomicU32::new(0),
        });
        let p = pipeline(generator.clone(), 4);
        let result = p.distill("seed", DistillationMethod::WithHistory, None).await;

        assert_eq!(result.iterations_run, 4);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 4);
        assert!(!result.converged);
    }

    #[tokio::test]
    async fn test_converges_when_output_repeats() {
        let generator = Arc::new(Scripted::new(&["A shorter prompt.", "A shorter prompt."]));
        let p = pipeline(generator.clone(), 5);
        let result = p
            .distill("A much longer original prompt text.", DistillationMethod::Telephone, None)
            .await;

        assert_eq!(result.iterations_run, 2);
        assert!(result.converged);
        assert_eq!(generator.calls(), 2);
        assert_eq!(result.final_text, "A shorter prompt.");
    }

    #[tokio::test]
    async fn test_history_chains_inputs_and_requests() {
        let generator = Arc::new(Scripted::new(&["one", "two two", "three three three"]));
        let p = pipeline(generator, 3);
        let result = p.distill("zero", DistillationMethod::WithHistory, None).await;

        let inputs: Vec<_> = result.history.iter().map(|r| r.input.as_str()).collect();
        let outputs: Vec<_> = result.history.iter().map(|r| r.output.as_str()).collect();
        assert_eq!(inputs, ["zero", "one", "two two"]);
        assert_eq!(outputs, ["one", "two two", "three three three"]);
        for (i, record) in result.history.iter().enumerate() {
            assert_eq!(record.iteration as usize, i + 1);
            assert_eq!(
                record.request,
                format!("{}\n\n{}", DistillationTarget::Prompt.instruction(), record.input)
            );
        }
    }

    #[tokio::test]
    async fn test_threshold_controls_early_stop() {
        let generator = Arc::new(Scripted::new(&["abcd", "abcx"]));
        let strict = pipeline(generator.clone(), 3).with_threshold(1.0);
        let result = strict.distill("wxyz", DistillationMethod::Telephone, None).await;
        // "abcd" -> "abcx" scores 0.875 and "abcx" -> "abcx" scores 1.0,
        // but only on the last permitted iteration
        assert_eq!(result.iterations_run, 3);
        assert!(!result.converged);

        let loose = pipeline(Arc::new(Scripted::new(&["abcd", "abcx"])), 3).with_threshold(0.8);
        let result = loose.distill("wxyz", DistillationMethod::Telephone, None).await;
        assert_eq!(result.iterations_run, 2);
        assert!(result.converged);
    }

    /// Returns the text after the instruction unchanged.
    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(
            &self,
            prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerationError> {
            Ok(prompt.split_once("\n\n").map_or(prompt, |(_, rest)| rest).to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_stable_output_at_bound_is_not_converged() {
        let p = pipeline(Arc::new(Echo), 1);
        let result = p.distill("stable text", DistillationMethod::Telephone, None).await;
        assert_eq!(result.iterations_run, 1);
        assert_eq!(result.final_text, "stable text");
        assert!(!result.converged);

        let p = pipeline(Arc::new(Echo), 2);
        let result = p.distill("stable text", DistillationMethod::Telephone, None).await;
        assert_eq!(result.iterations_run, 1);
        assert!(result.converged);
    }

    #[tokio::test]
    async fn test_empty_initial_text_still_runs() {
        let generator = Arc::new(Scripted::new(&["filled in"]));
        let p = pipeline(generator.clone(), 2);
        let result = p.distill("", DistillationMethod::Telephone, None).await;
        assert!(result.iterations_run >= 1);
        assert_eq!(result.history[0].input, "");
    }

    #[tokio::test]
    async fn test_generation_failure_does_not_abort() {
        let p = pipeline(Arc::new(Failing), 3);
        let result = p
            .distill("A prompt. Another sentence.", DistillationMethod::WithHistory, None)
            .await;

        assert!(result.iterations_run >= 1);
        assert!(result.history.iter().all(|r| !r.output.is_empty()));
    }

    #[tokio::test]
    async fn test_response_target_uses_response_instruction() {
        let generator = Arc::new(Scripted::new(&["short"]));
        let p = pipeline(generator, 1);
        let result = p
            .distill_response("A long response", DistillationMethod::Telephone)
            .await;

        assert_eq!(result.target, DistillationTarget::Response);
        assert!(
            result.history[0]
                .request
                .starts_with("Condense the response below")
        );
    }

    #[tokio::test]
    async fn test_conversation_follows_method() {
        let ctx = Arc::new(Context::new(
            "ctx",
            "Framing text",
            true,
            false,
            Valence::Positive,
        ));
        let generator: Arc<dyn TextGenerator> = Arc::new(Scripted::new(&["first", "second"]));
        let p = pipeline(generator.clone(), 2);

        let telephone = p.distill_by_telephone("start", Some(ctx.clone())).await;
        assert_eq!(telephone.conversation.render().unwrap(), telephone.final_text);
        assert_eq!(telephone.conversation.formulate_prompt(), "Framing text\n");
        assert_eq!(telephone.history.len(), telephone.conversation.exchanges().len());

        let history = p.distill_with_history("start", Some(ctx)).await;
        let prompt = history.conversation.formulate_prompt();
        for record in &history.history {
            assert!(prompt.contains(&record.output));
        }
    }

    #[tokio::test]
    async fn test_result_serializes_without_nesting_conversation() {
        let p = pipeline(Arc::new(Scripted::new(&["done"])), 1);
        let result = p.distill("x", DistillationMethod::Telephone, None).await;
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["method"], "telephone");
        assert_eq!(json["target"], "prompt");
        assert_eq!(json["iterations_run"], 1);
        assert_eq!(json["conversation"], "done");
    }

    #[test]
    fn test_method_parse_and_display() {
        assert_eq!(
            "with-history".parse::<DistillationMethod>().unwrap(),
            DistillationMethod::WithHistory
        );
        assert_eq!(
            "Telephone".parse::<DistillationMethod>().unwrap(),
            DistillationMethod::Telephone
        );
        assert!("relay".parse::<DistillationMethod>().is_err());
        assert_eq!(DistillationMethod::WithHistory.to_string(), "with_history");
    }
}
