//! Progress bars, colored transcripts, and summary formatting.
//!
//! This module provides visual feedback while packages are updated and
//! prints each package's collected log once the run is over.

use crate::config::Config;
use crate::constants::{MAX_VISIBLE_COMPLETIONS, PROGRESS_TICK_MS};
use crate::log::LogBundle;
use crate::update::{UpdateCallbacks, UpdateOutcome, UpdateStep, UpdateSuccess, WorkflowResult, WorkspaceReport};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// No-op callbacks for when progress tracking is not needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpCallbacks;

impl UpdateCallbacks for NoOpCallbacks {
    fn on_step(&self, _step: &UpdateStep) {}
    fn on_complete(&self, _result: &WorkflowResult) {}
}

/// Prints a package header in verbose mode.
pub fn print_package_header(config: &Config, package: &str) {
    if !config.is_verbose() {
        return;
    }
    eprintln!("\n{}", format!("[{}]", package).white().bold());
}

/// Prints a step progress message in verbose mode.
pub fn print_step(config: &Config, step: &UpdateStep) {
    if !config.is_verbose() {
        return;
    }
    eprintln!("  {}", format_step_message(step).dimmed());
}

/// Prints completion status (verbose mode only).
pub fn print_completion_status(config: &Config, result: &WorkflowResult) {
    if !config.is_verbose() {
        return;
    }
    match &result.outcome {
        UpdateOutcome::Success(success) => {
            eprintln!("  {} {}", "✓".green(), describe_success(*success))
        }
        UpdateOutcome::Failed(failure) => eprintln!("  {} failed: {}", "✗".red(), failure.error),
    }
}

/// Recent completions shown under the progress bar.
struct CompletionState {
    /// Newest last, at most MAX_VISIBLE_COMPLETIONS entries.
    recent: VecDeque<CompletionLine>,
    failed: usize,
    completed: usize,
}

struct CompletionLine {
    package: String,
    label: String,
    succeeded: bool,
}

impl CompletionLine {
    fn from_result(result: &WorkflowResult) -> Self {
        let label = match &result.outcome {
            UpdateOutcome::Success(success) => describe_success(*success).to_string(),
            UpdateOutcome::Failed(failure) => format!("failed while {}", failure.step),
        };
        Self {
            package: result.package.clone(),
            label,
            succeeded: result.succeeded(),
        }
    }

    fn render(&self) -> String {
        let symbol = if self.succeeded { "✓".green() } else { "✗".red() };
        format!("{} {} {}", symbol, self.package, self.label.dimmed())
    }
}

/// Progress bar over the whole workspace, shared by every package tracker.
#[derive(Clone)]
pub struct WorkspaceProgress {
    _multi: Arc<MultiProgress>,
    main_bar: ProgressBar,
    completion_slots: Vec<ProgressBar>,
    state: Arc<Mutex<CompletionState>>,
}

impl WorkspaceProgress {
    pub fn create_tracker(&self, package: &str, config: Config) -> PackageProgressTracker {
        PackageProgressTracker {
            package: package.to_string(),
            workspace: self.clone(),
            config,
        }
    }

    pub fn mark_completed(&self, result: &WorkflowResult) {
        self.main_bar.inc(1);

        // A poisoned lock only means another tracker panicked mid-redraw.
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        state.completed += 1;
        if !result.succeeded() {
            state.failed += 1;
            self.main_bar
                .set_message(format!("│ {} failed", state.failed).red().to_string());
        }

        state.recent.push_back(CompletionLine::from_result(result));
        if state.recent.len() > MAX_VISIBLE_COMPLETIONS {
            state.recent.pop_front();
        }

        self.redraw_completions(&state);
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.state.lock().map_or(0, |state| state.failed)
    }

    pub fn finish(&self) {
        self.main_bar.finish_and_clear();
        for slot in &self.completion_slots {
            slot.finish_and_clear();
        }
    }

    fn redraw_completions(&self, state: &CompletionState) {
        // When older completions scrolled off, the first slot becomes "..."
        // and the newest entries fill the rest.
        let truncated = state.completed > MAX_VISIBLE_COMPLETIONS;
        let mut lines = state.recent.iter().skip(usize::from(truncated));

        for (i, slot) in self.completion_slots.iter().enumerate() {
            let message = if i == 0 && truncated {
                "...".dimmed().to_string()
            } else {
                lines.next().map(CompletionLine::render).unwrap_or_default()
            };
            slot.set_message(message);
        }
    }
}

/// Per-package progress tracker for workspace updates.
#[derive(Clone)]
pub struct PackageProgressTracker {
    package: String,
    workspace: WorkspaceProgress,
    config: Config,
}

impl UpdateCallbacks for PackageProgressTracker {
    fn on_update_start(&self, _package: &str) {
        print_package_header(&self.config, &self.package);
    }

    fn on_step(&self, step: &UpdateStep) {
        print_step(&self.config, step);
    }

    fn on_complete(&self, result: &WorkflowResult) {
        print_completion_status(&self.config, result);
        self.workspace.mark_completed(result);
    }
}

/// Creates a progress bar for workspace updates showing completion count.
/// Returns hidden progress bars in quiet or verbose mode.
#[must_use]
pub fn create_workspace_progress(total: usize, config: &Config) -> WorkspaceProgress {
    let multi = Arc::new(MultiProgress::new());
    let hide_progress = config.is_quiet() || config.is_verbose();

    let main_bar = if hide_progress {
        ProgressBar::hidden()
    } else {
        let bar = multi.add(ProgressBar::new(total as u64));
        if let Ok(style) =
            ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos}/{len} packages {spinner:.cyan} {msg}")
        {
            bar.set_style(style.progress_chars("█░"));
        }
        bar.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
        bar
    };

    let completion_slots: Vec<ProgressBar> = if hide_progress {
        vec![]
    } else {
        (0..MAX_VISIBLE_COMPLETIONS)
            .map(|_| {
                let slot = multi.add(ProgressBar::new_spinner());
                if let Ok(style) = ProgressStyle::default_spinner().template("  {msg}") {
                    slot.set_style(style);
                }
                slot
            })
            .collect()
    };

    WorkspaceProgress {
        _multi: multi,
        main_bar,
        completion_slots,
        state: Arc::new(Mutex::new(CompletionState {
            recent: VecDeque::new(),
            failed: 0,
            completed: 0,
        })),
    }
}

pub fn print_working_dir(path: &Path, config: &Config) {
    if config.is_quiet() {
        return;
    }
    println!(
        "{} {}",
        "Working in:".cyan(),
        path.display().to_string().white().bold()
    )
}

pub fn print_workspace_start(count: usize, config: &Config) {
    if config.is_quiet() {
        return;
    }
    if count == 0 {
        print_no_packages()
    } else {
        println!(
            "{}",
            format!("Updating {} packages", count).dimmed()
        )
    }
}

pub fn print_summary(report: &WorkspaceReport, duration: Duration, config: &Config) {
    if config.is_quiet() {
        print_quiet_summary(&report.results);
    } else {
        print_normal_summary(&report.results, duration);
    }
    after_all(report.processed);
}

/// Reports how many packages the run went through, failed ones included.
pub fn after_all(processed: usize) {
    println!("{}", format_processed(processed).cyan());
}

fn format_processed(processed: usize) -> String {
    format!("{} packages have been processed.", processed)
}

fn print_quiet_summary(results: &[WorkflowResult]) {
    for result in results.iter().filter(|r| !r.succeeded()) {
        if let Some(error) = result.error() {
            eprintln!("error: {}: {}", result.package, error);
        }
    }
}

fn print_normal_summary(results: &[WorkflowResult], duration: Duration) {
    for result in results {
        print_transcript(&result.package, &result.logs);
    }

    print_section("Summary");
    let (successes, failures): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.succeeded());

    print_successes(&successes);
    print_failures(&failures);

    println!(
        "{}: {}/{} packages in {}",
        "Total".white().bold(),
        successes.len(),
        results.len(),
        format_duration(duration)
    );
}

fn print_transcript(package: &str, logs: &LogBundle) {
    if logs.is_empty() {
        return;
    }
    println!("{}", format!("[{}]", package).white().bold());
    for line in &logs.info {
        println!("  {}", line);
    }
    for line in &logs.error {
        println!("  {}", line.red());
    }
}

fn print_no_packages() {
    println!("{}", "No packages to update".yellow().bold())
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f32())
}

fn print_section(title: &str) {
    let line = "=".repeat(50).cyan().dimmed();
    let padding = (50 - title.len()) / 2;
    let centered = format!("{:>width$}", title, width = padding + title.len());
    println!("\n{}\n{}\n{}\n", line, centered.cyan().bold(), line);
}

fn print_successes(successes: &[&WorkflowResult]) {
    if successes.is_empty() {
        return;
    }
    println!(
        "{}",
        format!("Succeeded ({}):", successes.len()).green().bold()
    );

    for result in successes {
        if let UpdateOutcome::Success(success) = &result.outcome {
            println!(
                "  {} {} {} in {}",
                "OK".green().bold(),
                result.package.white(),
                describe_success(*success).cyan(),
                format_duration(result.duration).dimmed(),
            );
        }
    }
    println!();
}

fn print_failures(failures: &[&WorkflowResult]) {
    if failures.is_empty() {
        return;
    }

    println!("{}", format!("Failed ({}):", failures.len()).red().bold());

    for result in failures {
        if let UpdateOutcome::Failed(failure) = &result.outcome {
            println!(
                "  {} {} {} in {}",
                "FAIL".red().bold(),
                result.package.white(),
                format!("while {}: {}", failure.step, failure.error).red(),
                format_duration(result.duration).dimmed(),
            );
        }
    }
    println!();
}

fn describe_success(success: UpdateSuccess) -> &'static str {
    match success {
        UpdateSuccess::Cloned => "cloned",
        UpdateSuccess::Skipped => "skipped",
        UpdateSuccess::Detached => "detached, not pulled",
        UpdateSuccess::Pulled => "up to date",
    }
}

fn format_step_message(step: &UpdateStep) -> &'static str {
    match step {
        UpdateStep::Started => "Starting update...",
        UpdateStep::CheckingPresence => "Looking for local checkout...",
        UpdateStep::Cloning => "Cloning repository...",
        UpdateStep::Resolving => "Resolving repository...",
        UpdateStep::CheckingChanges => "Checking for uncommitted changes...",
        UpdateStep::Fetching => "Fetching from origin...",
        UpdateStep::CheckingOut => "Checking out branch...",
        UpdateStep::DetectingBranchState => "Checking branch on server...",
        UpdateStep::Pulling => "Pulling changes from origin...",
        UpdateStep::Completed => "Completed",
    }
}
