// Per-package update workflow, result types and the workspace batch runner

use crate::bootstrap::{Bootstrap, skipped_message};
use crate::command::{CancellationToken, CommandExecutor, CommandOutcome, ExecContext};
use crate::config::{Config, OptionSet};
use crate::constants::ORIGIN_REMOTE;
use crate::error::UpdateError;
use crate::log::{LogAggregator, LogBundle};
use crate::repository::{RepositoryDescriptor, RepositorySource};
use rayon::prelude::*;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const STATUS_COMMAND: &str = "git status -s";
const FETCH_COMMAND: &str = "git fetch";
const LIST_BRANCHES_COMMAND: &str = "git branch -a";

static DETACHED_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HEAD detached at+").expect("detached HEAD pattern is valid"));

/// One package to update, as handed over by the caller.
#[derive(Debug, Clone)]
pub struct PackageContext {
    pub name: String,
    /// Workspace root.
    pub working_directory: PathBuf,
    /// Expected checkout directory relative to the workspace root. Explicit
    /// descriptors override it; resolved ones only learn theirs after the
    /// presence check.
    pub directory: PathBuf,
    pub options: OptionSet,
}

impl PackageContext {
    pub fn new(name: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let directory = PathBuf::from(name.rsplit('/').next().unwrap_or(&name));
        Self {
            name,
            working_directory: working_directory.into(),
            directory,
            options: OptionSet::default(),
        }
    }

    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    Started,
    CheckingPresence,
    Cloning,
    Resolving,
    CheckingChanges,
    Fetching,
    CheckingOut,
    DetectingBranchState,
    Pulling,
    Completed,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateStep::Started => "started",
            UpdateStep::CheckingPresence => "checking presence",
            UpdateStep::Cloning => "cloning",
            UpdateStep::Resolving => "resolving repository",
            UpdateStep::CheckingChanges => "checking changes",
            UpdateStep::Fetching => "fetching",
            UpdateStep::CheckingOut => "checking out",
            UpdateStep::DetectingBranchState => "detecting branch state",
            UpdateStep::Pulling => "pulling",
            UpdateStep::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// How a package ended up in a good state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSuccess {
    Cloned,
    /// No repository could be found; logged, not fatal.
    Skipped,
    /// The checkout is on a detached commit, so nothing was pulled.
    Detached,
    Pulled,
}

#[derive(Debug)]
pub struct UpdateFailure {
    pub error: UpdateError,
    pub step: UpdateStep,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Success(UpdateSuccess),
    Failed(UpdateFailure),
}

/// Terminal state of one workflow run. Logs are kept on failure too.
#[derive(Debug)]
pub struct WorkflowResult {
    pub package: String,
    pub outcome: UpdateOutcome,
    pub logs: LogBundle,
    pub duration: Duration,
}

impl WorkflowResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, UpdateOutcome::Success(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&UpdateError> {
        match &self.outcome {
            UpdateOutcome::Failed(failure) => Some(&failure.error),
            UpdateOutcome::Success(_) => None,
        }
    }
}

/// Observer of a package update. Implementations must be cheap; they run
/// on the worker thread between commands.
pub trait UpdateCallbacks {
    fn on_update_start(&self, _package: &str) {}
    fn on_step(&self, step: &UpdateStep);
    fn on_complete(&self, result: &WorkflowResult);
}

/// A package paired with where its repository descriptor comes from.
#[derive(Debug, Clone)]
pub struct UpdateJob<'a> {
    pub package: PackageContext,
    pub source: RepositorySource<'a>,
}

/// Results of a workspace run, in job order.
#[derive(Debug)]
pub struct WorkspaceReport {
    pub results: Vec<WorkflowResult>,
    pub processed: usize,
}

impl WorkspaceReport {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded()).count()
    }
}

fn at_step<T>(
    step: UpdateStep,
    log: &mut LogAggregator,
    result: Result<T, UpdateError>,
) -> Result<T, UpdateFailure> {
    result.map_err(|error| {
        log.error(error.to_string());
        UpdateFailure { error, step }
    })
}

fn checkout_command(branch: &str) -> String {
    format!("git checkout {branch}")
}

fn pull_command(branch: &str) -> String {
    format!("git pull {ORIGIN_REMOTE} {branch}")
}

fn output_text(outcome: &CommandOutcome) -> String {
    outcome.info_lines.join("\n").trim().to_string()
}

/// Runs the update workflow against shared, stateless collaborators.
pub struct Updater<'a> {
    executor: &'a dyn CommandExecutor,
    bootstrap: &'a dyn Bootstrap,
    cancel: CancellationToken,
}

impl<'a> Updater<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, bootstrap: &'a dyn Bootstrap) -> Self {
        Self {
            executor,
            bootstrap,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Brings one package up to date with its remote branch.
    pub fn update<C>(
        &self,
        package: &PackageContext,
        source: RepositorySource<'_>,
        callbacks: &C,
    ) -> WorkflowResult
    where
        C: UpdateCallbacks + ?Sized,
    {
        callbacks.on_update_start(&package.name);
        callbacks.on_step(&UpdateStep::Started);

        let started = Instant::now();
        let mut log = LogAggregator::new();

        let outcome = match self.run(package, source, &mut log, callbacks) {
            Ok(success) => {
                callbacks.on_step(&UpdateStep::Completed);
                UpdateOutcome::Success(success)
            }
            Err(failure) => {
                debug!(package = %package.name, step = %failure.step, error = %failure.error, "update failed");
                UpdateOutcome::Failed(failure)
            }
        };

        let result = WorkflowResult {
            package: package.name.clone(),
            outcome,
            logs: log.into_bundle(),
            duration: started.elapsed(),
        };
        callbacks.on_complete(&result);
        result
    }

    /// Updates every job, `config.effective_concurrency()` packages at a time.
    pub fn update_workspace<F, C>(
        &self,
        jobs: &[UpdateJob<'_>],
        make_callbacks: F,
        config: &Config,
    ) -> WorkspaceReport
    where
        F: Fn(&PackageContext) -> C + Sync,
        C: UpdateCallbacks,
    {
        let processed = AtomicUsize::new(0);
        let run = |job: &UpdateJob<'_>| {
            let callbacks = make_callbacks(&job.package);
            let result = self.update(&job.package, job.source, &callbacks);
            processed.fetch_add(1, Ordering::SeqCst);
            result
        };

        let threads = config.effective_concurrency();
        let results: Vec<WorkflowResult> = if threads == 1 {
            jobs.iter().map(&run).collect()
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(|| jobs.par_iter().map(&run).collect()),
                Err(e) => {
                    warn!(error = %e, "falling back to the global thread pool");
                    jobs.par_iter().map(&run).collect()
                }
            }
        };

        WorkspaceReport {
            results,
            processed: processed.into_inner(),
        }
    }

    fn run<C>(
        &self,
        package: &PackageContext,
        source: RepositorySource<'_>,
        log: &mut LogAggregator,
        callbacks: &C,
    ) -> Result<UpdateSuccess, UpdateFailure>
    where
        C: UpdateCallbacks + ?Sized,
    {
        let workspace = package.working_directory.as_path();

        callbacks.on_step(&UpdateStep::CheckingPresence);
        let explicit = match source {
            RepositorySource::Explicit(descriptor) => {
                at_step(
                    UpdateStep::CheckingPresence,
                    log,
                    descriptor.validate(&package.name),
                )?;
                Some(descriptor)
            }
            RepositorySource::Resolved(_) => None,
        };
        let expected = explicit.map_or(package.directory.as_path(), |d| d.local_directory.as_path());

        if !workspace.join(expected).exists() {
            log.info(format!(
                "Package \"{}\" was not found. Cloning...",
                package.name
            ));
            callbacks.on_step(&UpdateStep::Cloning);
            let response = self.bootstrap.execute(package, explicit, &self.cancel);
            log.concat(response.logs);
            return match response.outcome {
                UpdateOutcome::Success(success) => Ok(success),
                UpdateOutcome::Failed(failure) => Err(failure),
            };
        }

        let descriptor: Cow<'_, RepositoryDescriptor> = match source {
            RepositorySource::Explicit(descriptor) => Cow::Borrowed(descriptor),
            RepositorySource::Resolved(resolver) => {
                callbacks.on_step(&UpdateStep::Resolving);
                let resolved = at_step(
                    UpdateStep::Resolving,
                    log,
                    resolver.resolve(&package.name, workspace),
                )?;
                let Some(descriptor) = resolved else {
                    log.error(skipped_message(&package.name));
                    return Ok(UpdateSuccess::Skipped);
                };
                at_step(
                    UpdateStep::Resolving,
                    log,
                    descriptor.validate(&package.name),
                )?;
                if descriptor.local_directory != package.directory {
                    warn!(
                        package = %package.name,
                        expected = %package.directory.display(),
                        resolved = %descriptor.local_directory.display(),
                        "resolved checkout directory differs from the expected one"
                    );
                }
                Cow::Owned(descriptor)
            }
        };

        let cwd = descriptor.checkout_path(workspace);
        let branch = descriptor.remote_branch.as_str();
        let exec = ExecContext {
            package: &package.name,
            cwd: &cwd,
            cancel: &self.cancel,
        };

        callbacks.on_step(&UpdateStep::CheckingChanges);
        let status = self.execute(STATUS_COMMAND, &exec, UpdateStep::CheckingChanges, log)?;
        if !output_text(&status).is_empty() {
            return at_step(
                UpdateStep::CheckingChanges,
                log,
                Err(UpdateError::UncommittedChanges {
                    package: package.name.clone(),
                }),
            );
        }

        if package.options.should_fetch(&source) {
            callbacks.on_step(&UpdateStep::Fetching);
            let fetched = self.execute(FETCH_COMMAND, &exec, UpdateStep::Fetching, log)?;
            log.append(&fetched);
        }

        callbacks.on_step(&UpdateStep::CheckingOut);
        let checkout = checkout_command(branch);
        let checked_out = self.execute(&checkout, &exec, UpdateStep::CheckingOut, log)?;
        log.append(&checked_out);
        if !checked_out.error_lines.is_empty() {
            return at_step(
                UpdateStep::CheckingOut,
                log,
                Err(UpdateError::CommandFailed {
                    command: checkout,
                    message: checked_out.error_lines.join("\n"),
                }),
            );
        }

        callbacks.on_step(&UpdateStep::DetectingBranchState);
        let branches = self.execute(
            LIST_BRANCHES_COMMAND,
            &exec,
            UpdateStep::DetectingBranchState,
            log,
        )?;
        let branches = output_text(&branches);

        if DETACHED_HEAD.is_match(&branches) {
            log.info(format!(
                "Package \"{}\" is on a detached commit.",
                package.name
            ));
            return Ok(UpdateSuccess::Detached);
        }

        // Plain substring match: `feature` also passes when only
        // `remotes/origin/feature-x` exists, and the pull then fails on its own.
        if !branches.contains(&format!("remotes/{ORIGIN_REMOTE}/{branch}")) {
            return at_step(
                UpdateStep::DetectingBranchState,
                log,
                Err(UpdateError::BranchNotOnServer {
                    branch: branch.to_string(),
                }),
            );
        }

        callbacks.on_step(&UpdateStep::Pulling);
        let pulled = self.execute(&pull_command(branch), &exec, UpdateStep::Pulling, log)?;
        log.append(&pulled);

        Ok(UpdateSuccess::Pulled)
    }

    fn execute(
        &self,
        command: &str,
        exec: &ExecContext<'_>,
        step: UpdateStep,
        log: &mut LogAggregator,
    ) -> Result<CommandOutcome, UpdateFailure> {
        debug!(package = exec.package, command, %step, "executing");
        self.executor.execute(command, exec).map_err(|failure| {
            log.append(&failure.outcome);
            log.error(failure.error.to_string());
            UpdateFailure {
                error: failure.error,
                step,
            }
        })
    }
}
