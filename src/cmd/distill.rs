//! Single distillation: `telephone distill <TEXT>`.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use telephone::config::CliOverrides;
use telephone::context::ContextRegistry;
use telephone::distillation::{DistillationMethod, DistillationPipeline};
use telephone::ui::icons::{CONVERGED, HISTORY, PHONE};

use super::super::Cli;
use super::load_config;

pub struct DistillArgs<'a> {
    pub text: &'a str,
    pub method: &'a str,
    pub context: Option<&'a str>,
    pub response: bool,
    pub json: bool,
}

pub async fn cmd_distill(
    cli: &Cli,
    project_dir: &Path,
    overrides: CliOverrides,
    args: DistillArgs<'_>,
) -> Result<()> {
    let method: DistillationMethod = args.method.parse()?;
    let context = match args.context {
        Some(name) => Some(ContextRegistry::standard().get_by_name(name)?),
        None => None,
    };

    let config = load_config(cli, project_dir, overrides)?;
    let (generator, _) = config.build_generators()?;
    let pipeline = DistillationPipeline::new(generator, config.max_iterations)
        .context("Invalid iteration bound")?
        .with_options(config.generation);

    let result = if args.response {
        pipeline.distill_response(args.text, method).await
    } else {
        pipeline.distill(args.text, method, context).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let icon = if method.is_telephone() { PHONE } else { HISTORY };
    println!();
    println!(
        "{}{} distillation ({:?}, backend {})",
        icon,
        style(method).bold(),
        result.target,
        config.backend
    );
    println!("{} {}", style("Initial:").dim(), result.initial_text);
    println!();
    for record in &result.history {
        println!(
            "  {} {}",
            style(format!("[{}]", record.iteration)).cyan(),
            record.output
        );
    }
    println!();
    if result.converged {
        println!(
            "{}Converged after {} iteration(s)",
            CONVERGED, result.iterations_run
        );
    } else {
        println!(
            "Stopped at the bound after {} iteration(s)",
            result.iterations_run
        );
    }
    println!("{} {}", style("Final:").bold(), result.final_text);
    println!();

    Ok(())
}
