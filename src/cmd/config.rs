//! Configuration view and validation commands: `telephone config`.

use anyhow::Result;
use std::path::Path;
use telephone::config::{CONFIG_FILE_NAME, ExperimentConfig, TelephoneToml};

use super::super::ConfigCommands;

fn print_toml(toml: &TelephoneToml) {
    println!("[model]");
    println!("  name = \"{}\"", toml.model.name);
    println!("  evaluator = \"{}\"", toml.model.evaluator);
    println!();
    println!("[generator]");
    println!("  backend = \"{}\"", toml.generator.backend);
    if let Some(command) = &toml.generator.command {
        println!("  command = \"{}\"", command);
    }
    println!("  args = {:?}", toml.generator.args);
    println!("  endpoint = \"{}\"", toml.generator.endpoint);
    println!("  timeout_secs = {}", toml.generator.timeout_secs);
    println!();
    println!("[generation]");
    println!("  max_length = {}", toml.generation.max_length);
    println!("  temperature = {}", toml.generation.temperature);
    println!("  do_sample = {}", toml.generation.do_sample);
    println!(
        "  evaluator_temperature = {}",
        toml.generation.evaluator_temperature
    );
    println!();
    println!("[experiment]");
    println!("  max_iterations = {}", toml.experiment.max_iterations);
    println!(
        "  output_dir = \"{}\"",
        toml.experiment.output_dir.display()
    );
    println!();
}

pub fn cmd_config(
    project_dir: &Path,
    config_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_dir.join(CONFIG_FILE_NAME));

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Telephone Configuration");
            println!("=======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                TelephoneToml::load(&config_path)?
            } else {
                println!("No {} found at {}", CONFIG_FILE_NAME, config_path.display());
                println!();
                println!("Using default configuration:");
                println!();
                TelephoneToml::default()
            };
            print_toml(&toml);

            // Show effective values (including env overrides)
            println!("Effective values (with env overrides):");
            let config = ExperimentConfig::from_toml(&toml)?;
            println!("  backend = \"{}\"", config.backend);
            println!("  command = \"{}\"", config.command);
            println!("  endpoint = \"{}\"", config.endpoint);
            println!();

            if !config_path.exists() {
                println!("Run 'telephone config init' to create a {} file.", CONFIG_FILE_NAME);
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let toml = TelephoneToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
            println!();

            // Fatal settings fail the command
            ExperimentConfig::from_toml(&toml)?.validate()?;
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE_NAME, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                std::fs::create_dir_all(parent)?;
            }

            let toml = TelephoneToml::default();
            toml.save(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE_NAME, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [model] name, evaluator");
            println!("  - [generator] backend, command, args, endpoint, timeout_secs");
            println!("  - [generation] max_length, temperature, do_sample, evaluator_temperature");
            println!("  - [experiment] max_iterations, output_dir");
            println!();
        }
    }

    Ok(())
}
