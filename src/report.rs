//! Persisting experiment results.
//!
//! Every run writes two files into the output directory, sharing one
//! `%Y%m%d_%H%M%S` timestamp:
//! - `introspection_experiment_{ts}.json`: the full result tree
//! - `experiment_summary_{ts}.md`: a short human-readable summary

use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::ReportError;
use crate::experiment::ExperimentResults;

/// Characters of each text shown in the summary before `...`.
pub const SUMMARY_EXCERPT_CHARS: usize = 100;

/// Paths of the files written by [`save_results`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReport {
    pub json_path: PathBuf,
    pub summary_path: PathBuf,
}

/// Write the JSON dump and Markdown summary, creating `output_dir` if needed.
pub fn save_results(
    results: &ExperimentResults,
    output_dir: &Path,
) -> Result<SavedReport, ReportError> {
    save_results_at(results, output_dir, Local::now())
}

/// Same as [`save_results`] with an explicit timestamp.
pub fn save_results_at(
    results: &ExperimentResults,
    output_dir: &Path,
    timestamp: DateTime<Local>,
) -> Result<SavedReport, ReportError> {
    std::fs::create_dir_all(output_dir).map_err(|source| ReportError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let stamp = timestamp.format("%Y%m%d_%H%M%S");
    let json_path = output_dir.join(format!("introspection_experiment_{}.json", stamp));
    let summary_path = output_dir.join(format!("experiment_summary_{}.md", stamp));

    let json = serde_json::to_string_pretty(results)?;
    write_file(&json_path, &json)?;
    info!(path = %json_path.display(), "results saved");

    let summary = render_summary(results, timestamp);
    write_file(&summary_path, &summary)?;
    info!(path = %summary_path.display(), "summary saved");

    Ok(SavedReport {
        json_path,
        summary_path,
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), ReportError> {
    std::fs::write(path, content).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the Markdown summary.
pub fn render_summary(results: &ExperimentResults, generated_at: DateTime<Local>) -> String {
    let metadata = &results.metadata;
    let impact = &results.environmental_impact;
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "# Introspection by Telephone - Experiment Summary\n");
    let _ = writeln!(out, "**Model:** {}", metadata.model_name);
    let _ = writeln!(out, "**Duration:** {:.2} seconds", metadata.duration_seconds);
    let _ = writeln!(out, "**Contexts:** {}\n", metadata.contexts_tested.len());

    let _ = writeln!(out, "## Environmental Impact\n");
    let _ = writeln!(
        out,
        "- **Estimated GPU hours:** {:.3}",
        impact.estimated_gpu_hours
    );
    let _ = writeln!(out, "- **Note:** {}\n", impact.environmental_note);

    let _ = writeln!(out, "## Results by Context\n");
    for name in &metadata.contexts_tested {
        let _ = writeln!(out, "### {}\n", name);

        if let Some(initial) = results.initial_responses.get(name) {
            let _ = writeln!(
                out,
                "**Initial Response:** {}\n",
                excerpt(&initial.response)
            );
        }
        if let Some(distilled) = results.distilled_prompts.get(name) {
            let _ = writeln!(
                out,
                "**Distilled (History):** {}\n",
                excerpt(&distilled.with_history.final_text)
            );
            let _ = writeln!(
                out,
                "**Distilled (Telephone):** {}\n",
                excerpt(&distilled.by_telephone.final_text)
            );
        }
    }

    let _ = writeln!(out, "---");
    let _ = writeln!(out, "Generated on {}", generated_at.to_rfc3339());
    out
}

/// First [`SUMMARY_EXCERPT_CHARS`] characters followed by `...`.
fn excerpt(text: &str) -> String {
    let head: String = text.chars().take(SUMMARY_EXCERPT_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperimentConfig;
    use crate::context::{Context, ContextRegistry, Valence};
    use crate::experiment::ExperimentRunner;
    use crate::generation::{FallbackGenerator, TextGenerator};
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn small_run() -> ExperimentResults {
        let registry = ContextRegistry::from_contexts(vec![
            Context::null("isolation"),
            Context::new("framed", "You are a person at sea.", true, false, Valence::Negative),
        ]);
        let config = ExperimentConfig {
            max_iterations: 1,
            ..ExperimentConfig::default()
        };
        let generator: Arc<dyn TextGenerator> = Arc::new(FallbackGenerator);
        ExperimentRunner::new(&config, registry, Arc::clone(&generator), generator)
            .unwrap()
            .run()
            .await
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn test_excerpt_is_char_safe() {
        let text = "é".repeat(150);
        let out = excerpt(&text);
        assert_eq!(out.chars().count(), SUMMARY_EXCERPT_CHARS + 3);
        assert!(out.ends_with("..."));
        assert_eq!(excerpt("short"), "short...");
    }

    #[tokio::test]
    async fn test_save_results_writes_both_files() {
        let results = small_run().await;
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("results");

        let saved = save_results_at(&results, &out, fixed_time()).unwrap();

        assert_eq!(
            saved.json_path,
            out.join("introspection_experiment_20260304_050607.json")
        );
        assert_eq!(
            saved.summary_path,
            out.join("experiment_summary_20260304_050607.md")
        );

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&saved.json_path).unwrap()).unwrap();
        assert_eq!(json["metadata"]["contexts_tested"][0], "isolation");
        assert_eq!(json["evaluations"].as_object().unwrap().len(), 1);
        assert!(json["distilled_prompts"]["framed"]["with_history"]["conversation"].is_string());
        assert!(json["environmental_impact"]["recommendations"].is_array());
    }

    #[tokio::test]
    async fn test_summary_lists_every_context() {
        let results = small_run().await;
        let summary = render_summary(&results, fixed_time());

        assert!(summary.starts_with("# Introspection by Telephone - Experiment Summary"));
        assert!(summary.contains("**Model:** microsoft/DialoGPT-medium"));
        assert!(summary.contains("**Contexts:** 2"));
        assert!(summary.contains("## Environmental Impact"));
        assert!(summary.contains("### isolation"));
        assert!(summary.contains("### framed"));
        assert!(summary.contains("**Distilled (Telephone):**"));
        assert!(summary.contains("Generated on 2026-03-04T05:06:07"));
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_is_error() {
        let results = small_run().await;
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = save_results(&results, &blocker.join("out")).unwrap_err();
        assert!(matches!(err, ReportError::CreateDir { .. }));
    }
}
