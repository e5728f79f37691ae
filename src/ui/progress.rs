use crate::ui::icons::{CHECK, CONVERGED, HISTORY, LEAF, PHONE, SPARKLE};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Terminal UI for an experiment run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Phase bar: tracks how many of the experiment phases have completed
/// - Step bar: spinner naming the context or pair currently being processed
pub struct ExperimentUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    step_bar: ProgressBar,
    verbose: bool,
    steps_done: AtomicUsize,
    steps_total: AtomicUsize,
}

impl ExperimentUI {
    /// Create the UI and add both bars to the multiplex renderer.
    ///
    /// # Arguments
    /// * `total_phases`: sizes the phase bar
    /// * `verbose`: when `true`, per-distillation detail lines are printed
    pub fn new(total_phases: u64, verbose: bool) -> Self {
        Self::with_target(total_phases, verbose, ProgressDrawTarget::stderr())
    }

    /// Same as [`Self::new`] but draws nothing. Used when output is not a terminal.
    pub fn hidden(total_phases: u64) -> Self {
        Self::with_target(total_phases, false, ProgressDrawTarget::hidden())
    }

    fn with_target(total_phases: u64, verbose: bool, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let phase_bar = multi.add(ProgressBar::new(total_phases));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("Phases");

        let step_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let step_bar = multi.add(ProgressBar::new_spinner());
        step_bar.set_style(step_style);
        step_bar.set_prefix("  Step");

        Self {
            multi,
            phase_bar,
            step_bar,
            verbose,
            steps_done: AtomicUsize::new(0),
            steps_total: AtomicUsize::new(0),
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Show the phase about to run and reset the step counter.
    ///
    /// # Arguments
    /// * `number`: 1-based phase number
    /// * `description`: phase name shown in the status line
    /// * `steps`: how many contexts or pairs the phase will process
    pub fn start_phase(&self, number: usize, description: &str, steps: usize) {
        self.steps_done.store(0, Ordering::SeqCst);
        self.steps_total.store(steps, Ordering::SeqCst);
        self.phase_bar.set_message(format!(
            "{}: {}",
            style(format!("Phase {}", number)).yellow(),
            description
        ));
        self.step_bar.reset();
        self.step_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    /// Update the spinner with the item currently being processed.
    pub fn start_step(&self, label: &str) {
        let done = self.steps_done.load(Ordering::SeqCst);
        let total = self.steps_total.load(Ordering::SeqCst);
        self.step_bar.set_message(format!(
            "{}/{} {}",
            style(done + 1).cyan(),
            total,
            label
        ));
    }

    /// Mark the current step finished.
    pub fn step_done(&self) {
        self.steps_done.fetch_add(1, Ordering::SeqCst);
    }

    /// Report one finished distillation. Printed only in verbose mode.
    pub fn show_distillation(&self, label: &str, telephone: bool, iterations: u32, converged: bool) {
        if !self.verbose {
            return;
        }
        let icon = if telephone { PHONE } else { HISTORY };
        let outcome = if converged {
            format!("{}converged after {}", CONVERGED, iterations)
        } else {
            format!("stopped at bound after {}", iterations)
        };
        self.print_line(format!(
            "    {}{} {}",
            icon,
            label,
            style(format!("({} iterations)", outcome)).dim()
        ));
    }

    /// Increment the phase bar and print a completion line.
    pub fn phase_complete(&self, number: usize, description: &str) {
        self.phase_bar.inc(1);
        self.step_bar.disable_steady_tick();
        self.print_line(format!(
            "{} Phase {} complete: {}",
            CHECK,
            style(number).green().bold(),
            description
        ));
    }

    /// Clear both bars and print the closing banner.
    pub fn finish(&self, elapsed: Duration, estimated_gpu_hours: f64) {
        self.step_bar.finish_and_clear();
        self.phase_bar.finish_and_clear();
        self.print_line(format!(
            "\n{} Experiment finished in {}",
            SPARKLE,
            style(format_elapsed(elapsed)).bold()
        ));
        self.print_line(format!(
            "{}Estimated GPU hours: {:.3}",
            LEAF, estimated_gpu_hours
        ));
    }
}

/// Formats as `Xs` or `Xm Ys` when >= 60 seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
