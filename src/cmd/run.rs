//! Full experiment: `telephone run`.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;
use telephone::config::{CliOverrides, ExperimentConfig};
use telephone::context::ContextRegistry;
use telephone::experiment::{ExperimentRunner, Phase};
use telephone::report::save_results;
use telephone::ui::ExperimentUI;
use telephone::ui::icons::{CHECK, CLOCK, FILE_NEW, FOLDER, LEAF};

use super::super::Cli;
use super::load_config;

fn print_configuration(config: &ExperimentConfig, contexts: usize) {
    println!();
    println!("{}", style("Introspection by Telephone").bold());
    println!("{}", style("=".repeat(26)).dim());
    println!("  model:           {}", config.model_name);
    println!("  evaluator model: {}", config.evaluator_model_name);
    println!("  backend:         {}", config.backend);
    println!("  max iterations:  {}", config.max_iterations);
    println!("  output dir:      {}", config.output_dir.display());
    println!("  contexts:        {}", contexts);
    println!();
}

pub async fn cmd_run(
    cli: &Cli,
    project_dir: &Path,
    overrides: CliOverrides,
    dry_run: bool,
    no_progress: bool,
) -> Result<()> {
    let config = load_config(cli, project_dir, overrides)?;
    let registry = ContextRegistry::standard();
    print_configuration(&config, registry.len());

    if dry_run {
        println!("Dry run: no generation calls made.");
        return Ok(());
    }

    let (generator, evaluator) = config.build_generators()?;
    let mut runner = ExperimentRunner::new(&config, registry, generator, evaluator)?;
    if !no_progress {
        runner = runner.with_ui(Arc::new(ExperimentUI::new(
            Phase::ALL.len() as u64,
            cli.verbose,
        )));
    }

    let results = runner.run().await;
    let saved = save_results(&results, &config.output_dir).with_context(|| {
        format!(
            "Failed to save results to {}",
            config.output_dir.display()
        )
    })?;

    println!();
    println!("{}Experiment completed", CHECK);
    println!("{}{}", FOLDER, config.output_dir.display());
    println!("  {}{}", FILE_NEW, saved.json_path.display());
    println!("  {}{}", FILE_NEW, saved.summary_path.display());
    println!(
        "{}Duration: {:.2} seconds",
        CLOCK, results.metadata.duration_seconds
    );
    println!("Contexts tested: {}", results.metadata.contexts_tested.len());
    println!(
        "{}Estimated GPU hours: {:.3}",
        LEAF, results.environmental_impact.estimated_gpu_hours
    );
    println!();

    Ok(())
}
