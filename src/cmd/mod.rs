//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled       |
//! |------------|------------------------|
//! | `run`      | `Run`                  |
//! | `contexts` | `Contexts`, `Context`  |
//! | `distill`  | `Distill`              |
//! | `config`   | `Config`               |

pub mod config;
pub mod contexts;
pub mod distill;
pub mod run;

pub use config::cmd_config;
pub use contexts::{cmd_context, cmd_contexts};
pub use distill::{DistillArgs, cmd_distill};
pub use run::cmd_run;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use telephone::config::{Backend, CliOverrides, ExperimentConfig};

use super::Cli;

/// Collect CLI flags, parsing the backend name.
pub fn cli_overrides(
    backend: Option<&str>,
    model: Option<String>,
    evaluator_model: Option<String>,
    max_iterations: Option<u32>,
    output_dir: Option<PathBuf>,
) -> Result<CliOverrides> {
    let backend = backend.map(str::parse::<Backend>).transpose()?;
    Ok(CliOverrides {
        backend,
        model,
        evaluator_model,
        max_iterations,
        output_dir,
    })
}

/// Resolve the configuration (file → env → CLI) and reject fatal settings.
pub fn load_config(
    cli: &Cli,
    project_dir: &Path,
    overrides: CliOverrides,
) -> Result<ExperimentConfig> {
    let config = ExperimentConfig::load(cli.config.as_deref(), project_dir)
        .context("Failed to load configuration")?
        .with_cli_overrides(overrides);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
