//! Context listing: `telephone contexts` and `telephone context <NAME>`.

use anyhow::Result;
use console::style;
use std::sync::Arc;
use telephone::context::{Context, ContextRegistry, INTROSPECTION_QUESTION, Valence};

fn retain_in(selected: &mut Vec<Arc<Context>>, keep: &[Arc<Context>]) {
    selected.retain(|c| keep.iter().any(|k| k.name == c.name));
}

fn framing_label(context: &Context) -> &'static str {
    if context.is_null() {
        "null"
    } else if context.is_embodied {
        "embodied"
    } else if context.is_ai_assistant {
        "ai assistant"
    } else {
        "other"
    }
}

pub fn cmd_contexts(embodied: bool, ai_assistant: bool, valence: Option<&str>) -> Result<()> {
    let registry = ContextRegistry::standard();
    let mut selected: Vec<Arc<Context>> = registry.iter().cloned().collect();

    if embodied {
        retain_in(&mut selected, &registry.filter_by_embodiment());
    }
    if ai_assistant {
        retain_in(&mut selected, &registry.filter_by_assistant_flag());
    }
    if let Some(valence) = valence {
        let valence: Valence = valence.parse()?;
        retain_in(&mut selected, &registry.filter_by_valence(valence));
    }

    println!();
    println!(
        "{} ({} of {})",
        style("Contexts").bold(),
        selected.len(),
        registry.len()
    );
    println!();
    for context in &selected {
        println!(
            "  {:<24} {:<14} {}",
            style(&context.name).cyan(),
            framing_label(context),
            context.valence
        );
    }
    println!();

    Ok(())
}

pub fn cmd_context(name: &str) -> Result<()> {
    let registry = ContextRegistry::standard();
    let context = registry.get_by_name(name)?;

    println!();
    println!("{}", style(&context.name).cyan().bold());
    println!("{}", style("=".repeat(context.name.len().max(8))).dim());
    println!("  framing:      {}", framing_label(&context));
    println!("  embodied:     {}", context.is_embodied);
    println!("  ai assistant: {}", context.is_ai_assistant);
    println!("  valence:      {}", context.valence);
    println!();
    if context.is_null() {
        println!("{}", style("(no framing text)").dim());
    } else {
        println!("{}", context.text());
    }
    println!();
    println!("{} {}", style("Question:").dim(), INTROSPECTION_QUESTION);
    println!();

    Ok(())
}
