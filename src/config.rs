//! Configuration for telephone experiments.
//!
//! Settings are read from `telephone.toml` and layered (file → environment → CLI).
//!
//! # Configuration File Format
//!
//! ```toml
//! [model]
//! name = "microsoft/DialoGPT-medium"
//! evaluator = "microsoft/DialoGPT-medium"
//!
//! [generator]
//! backend = "command"
//! command = "llm"
//! args = ["-m", "{model}"]
//! endpoint = "http://localhost:8080"
//! timeout_secs = 120
//!
//! [generation]
//! max_length = 512
//! temperature = 0.7
//! do_sample = true
//! evaluator_temperature = 0.1
//!
//! [experiment]
//! max_iterations = 5
//! output_dir = "./experiment_results"
//! ```
//!
//! | Variable             | Overrides             |
//! |----------------------|-----------------------|
//! | `TELEPHONE_BACKEND`  | `generator.backend`   |
//! | `TELEPHONE_CMD`      | `generator.command`   |
//! | `TELEPHONE_ENDPOINT` | `generator.endpoint`  |
//! | `TELEPHONE_API_TOKEN`| bearer token for `http` (env only) |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::generation::{
    CommandGenerator, FallbackGenerator, GenerationOptions, HttpGenerator, TextGenerator,
};

/// Default file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "telephone.toml";

pub const ENV_BACKEND: &str = "TELEPHONE_BACKEND";
pub const ENV_COMMAND: &str = "TELEPHONE_CMD";
pub const ENV_ENDPOINT: &str = "TELEPHONE_ENDPOINT";
pub const ENV_API_TOKEN: &str = "TELEPHONE_API_TOKEN";

/// Which text generation backend to use.
///
/// | Backend    | Needs                         |
/// |------------|-------------------------------|
/// | `Fallback` | nothing; deterministic output |
/// | `Command`  | a CLI reading stdin           |
/// | `Http`     | a TGI-style `/generate` server |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Fallback,
    Command,
    Http,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Fallback => write!(f, "fallback"),
            Backend::Command => write!(f, "command"),
            Backend::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fallback" | "mock" => Ok(Backend::Fallback),
            "command" | "cmd" => Ok(Backend::Command),
            "http" => Ok(Backend::Http),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

fn default_model_name() -> String {
    "microsoft/DialoGPT-medium".to_string()
}

fn default_command_args() -> Vec<String> {
    vec!["--print".to_string()]
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_length() -> u32 {
    512
}

fn default_temperature() -> f64 {
    0.7
}

fn default_do_sample() -> bool {
    true
}

fn default_evaluator_temperature() -> f64 {
    0.1
}

fn default_max_iterations() -> u32 {
    5
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./experiment_results")
}

/// Model names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    /// Model that answers and distills
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Model that judges similarity
    #[serde(default = "default_model_name")]
    pub evaluator: String,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            evaluator: default_model_name(),
        }
    }
}

/// Backend selection and transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default)]
    pub backend: Backend,
    /// Program for the command backend (default: "claude")
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments for the command backend; `{model}` is substituted
    #[serde(default = "default_command_args")]
    pub args: Vec<String>,
    /// Base URL for the http backend
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            command: None,
            args: default_command_args(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_do_sample")]
    pub do_sample: bool,
    #[serde(default = "default_evaluator_temperature")]
    pub evaluator_temperature: f64,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            temperature: default_temperature(),
            do_sample: default_do_sample(),
            evaluator_temperature: default_evaluator_temperature(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSection {
    /// Iteration bound per distillation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExperimentSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            output_dir: default_output_dir(),
        }
    }
}

/// The complete telephone.toml structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelephoneToml {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub experiment: ExperimentSection,
}

impl TelephoneToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `telephone.toml` from `dir`, or defaults when it doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize telephone.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get the backend, with the environment overriding the file.
    pub fn backend(&self) -> Result<Backend, ConfigError> {
        match std::env::var(ENV_BACKEND) {
            Ok(value) => value.parse(),
            Err(_) => Ok(self.generator.backend),
        }
    }

    /// Get the generator command (env → file → "claude").
    pub fn command(&self) -> String {
        std::env::var(ENV_COMMAND)
            .ok()
            .or_else(|| self.generator.command.clone())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Get the http endpoint (env → file).
    pub fn endpoint(&self) -> String {
        std::env::var(ENV_ENDPOINT).unwrap_or_else(|_| self.generator.endpoint.clone())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.experiment.max_iterations == 0 {
            warnings.push("experiment.max_iterations is 0: at least one iteration is required".to_string());
        }
        if self.experiment.max_iterations > 50 {
            warnings.push(format!(
                "experiment.max_iterations is {}: runs will make many generation calls",
                self.experiment.max_iterations
            ));
        }
        for (field, value) in [
            ("generation.temperature", self.generation.temperature),
            ("generation.evaluator_temperature", self.generation.evaluator_temperature),
        ] {
            if !value.is_finite() || value < 0.0 {
                warnings.push(format!("{} must be a non-negative number, got {}", field, value));
            }
        }
        if self.generation.max_length == 0 {
            warnings.push("generation.max_length is 0: every completion will be empty".to_string());
        }
        if self.generator.timeout_secs == 0 {
            warnings.push("generator.timeout_secs must be at least 1".to_string());
        }
        if self.generator.backend == Backend::Http
            && !(self.generator.endpoint.starts_with("http://")
                || self.generator.endpoint.starts_with("https://"))
        {
            warnings.push(format!(
                "generator.endpoint '{}' should start with http:// or https://",
                self.generator.endpoint
            ));
        }

        warnings
    }
}

/// CLI flags that override file and environment settings.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    pub evaluator_model: Option<String>,
    pub max_iterations: Option<u32>,
    pub output_dir: Option<PathBuf>,
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub model_name: String,
    pub evaluator_model_name: String,
    pub backend: Backend,
    pub command: String,
    pub command_args: Vec<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub generation: GenerationOptions,
    pub evaluator_temperature: f64,
    pub max_iterations: u32,
    pub output_dir: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            evaluator_model_name: default_model_name(),
            backend: Backend::default(),
            command: "claude".to_string(),
            command_args: default_command_args(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            generation: GenerationOptions {
                max_length: default_max_length(),
                temperature: default_temperature(),
                do_sample: default_do_sample(),
            },
            evaluator_temperature: default_evaluator_temperature(),
            max_iterations: default_max_iterations(),
            output_dir: default_output_dir(),
        }
    }
}

impl ExperimentConfig {
    /// Resolve a parsed file against the environment.
    pub fn from_toml(toml: &TelephoneToml) -> Result<Self, ConfigError> {
        Ok(Self {
            model_name: toml.model.name.clone(),
            evaluator_model_name: toml.model.evaluator.clone(),
            backend: toml.backend()?,
            command: toml.command(),
            command_args: toml.generator.args.clone(),
            endpoint: toml.endpoint(),
            timeout_secs: toml.generator.timeout_secs,
            generation: GenerationOptions {
                max_length: toml.generation.max_length,
                temperature: toml.generation.temperature,
                do_sample: toml.generation.do_sample,
            },
            evaluator_temperature: toml.generation.evaluator_temperature,
            max_iterations: toml.experiment.max_iterations,
            output_dir: toml.experiment.output_dir.clone(),
        })
    }

    /// Load from an explicit file, or from `telephone.toml` in `dir` when present.
    pub fn load(config_path: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        let toml = match config_path {
            Some(path) => TelephoneToml::load(path)?,
            None => TelephoneToml::load_or_default(dir)?,
        };
        Self::from_toml(&toml)
    }

    /// Apply CLI flags on top of file and environment settings.
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if let Some(model) = overrides.model {
            self.model_name = model;
        }
        if let Some(model) = overrides.evaluator_model {
            self.evaluator_model_name = model;
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self.max_iterations = max_iterations;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        self
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(self.max_iterations));
        }
        for (field, value) in [
            ("temperature", self.generation.temperature),
            ("evaluator_temperature", self.evaluator_temperature),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidTemperature { field, value });
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Options for evaluator calls: the generation options at evaluator temperature.
    pub fn evaluator_options(&self) -> GenerationOptions {
        self.generation.with_temperature(self.evaluator_temperature)
    }

    /// Build the primary and evaluator generators for the configured backend.
    pub fn build_generators(
        &self,
    ) -> Result<(Arc<dyn TextGenerator>, Arc<dyn TextGenerator>), ConfigError> {
        Ok((
            self.build_generator(&self.model_name)?,
            self.build_generator(&self.evaluator_model_name)?,
        ))
    }

    fn build_generator(&self, model: &str) -> Result<Arc<dyn TextGenerator>, ConfigError> {
        let generator: Arc<dyn TextGenerator> = match self.backend {
            Backend::Fallback => Arc::new(FallbackGenerator),
            Backend::Command => Arc::new(CommandGenerator::new(
                &self.command,
                &self.command_args,
                model,
                self.timeout(),
            )),
            Backend::Http => Arc::new(
                HttpGenerator::new(&self.endpoint, model, self.timeout())
                    .map_err(ConfigError::BackendInit)?
                    .with_api_token(std::env::var(ENV_API_TOKEN).ok()),
            ),
        };
        Ok(generator)
    }
}
