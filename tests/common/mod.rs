//! Test infrastructure for mgit-sync integration tests.
#![allow(dead_code)]

use anyhow::Result;
use mgit_sync::bootstrap::Bootstrap;
use mgit_sync::command::{
    CancellationToken, CommandExecutor, CommandFailure, CommandOutcome, ExecContext,
};
use mgit_sync::config::{Config, Verbosity};
use mgit_sync::error::UpdateError;
use mgit_sync::log::LogBundle;
use mgit_sync::repository::RepositoryDescriptor;
use mgit_sync::update::{
    PackageContext, UpdateCallbacks, UpdateFailure, UpdateOutcome, UpdateStep, UpdateSuccess,
    WorkflowResult,
};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub fn test_config() -> Config {
    Config {
        verbosity: Verbosity::Quiet,
        concurrency: 4,
    }
}

pub enum Response {
    Ok(CommandOutcome),
    Fail(CommandOutcome, &'static str),
}

/// Executor that records every command and answers from a script.
///
/// Unscripted commands succeed. `git status -s` is clean by default and
/// `git branch -a` lists `main` and `master` on origin; everything else
/// echoes `<package>: <command>` so transcripts can be told apart.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Vec<(String, Response)>,
    commands: Mutex<Vec<(String, String)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, prefix: &str, response: Response) -> Self {
        self.script.push((prefix.to_string(), response));
        self
    }

    pub fn output(self, prefix: &str, lines: &[&str]) -> Self {
        self.respond(prefix, Response::Ok(CommandOutcome::info(lines)))
    }

    /// Commands in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn commands_for(&self, package: &str) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == package)
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.commands().iter().any(|c| c.starts_with(prefix))
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(
        &self,
        command: &str,
        ctx: &ExecContext<'_>,
    ) -> std::result::Result<CommandOutcome, CommandFailure> {
        self.commands
            .lock()
            .unwrap()
            .push((ctx.package.to_string(), command.to_string()));

        if ctx.cancel.is_cancelled() {
            return Err(CommandFailure::new(
                CommandOutcome::default(),
                UpdateError::Cancelled {
                    command: command.to_string(),
                },
            ));
        }

        let scripted = self
            .script
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()));

        match scripted {
            Some((_, Response::Ok(outcome))) => Ok(outcome.clone()),
            Some((_, Response::Fail(outcome, message))) => Err(CommandFailure::new(
                outcome.clone(),
                UpdateError::CommandFailed {
                    command: command.to_string(),
                    message: message.to_string(),
                },
            )),
            None if command == "git status -s" => Ok(CommandOutcome::default()),
            None if command == "git branch -a" => Ok(CommandOutcome::info(&[
                "* main",
                "  master",
                "  remotes/origin/HEAD -> origin/main",
                "  remotes/origin/main",
                "  remotes/origin/master",
            ])),
            None => Ok(CommandOutcome::info(&[
                format!("{}: {}", ctx.package, command).as_str(),
            ])),
        }
    }
}

/// Bootstrap double that records which packages it was asked to clone.
#[derive(Default)]
pub struct RecordingBootstrap {
    pub calls: Mutex<Vec<(String, Option<RepositoryDescriptor>)>>,
    pub fail: bool,
}

impl RecordingBootstrap {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Bootstrap for RecordingBootstrap {
    fn execute(
        &self,
        package: &PackageContext,
        descriptor: Option<&RepositoryDescriptor>,
        _cancel: &CancellationToken,
    ) -> WorkflowResult {
        self.calls
            .lock()
            .unwrap()
            .push((package.name.clone(), descriptor.cloned()));

        let (outcome, logs) = if self.fail {
            let error = UpdateError::CommandFailed {
                command: "git clone".to_string(),
                message: "fatal: repository not found".to_string(),
            };
            let logs = LogBundle {
                info: vec![],
                error: vec![error.to_string()],
            };
            (
                UpdateOutcome::Failed(UpdateFailure {
                    error,
                    step: UpdateStep::Cloning,
                }),
                logs,
            )
        } else {
            (
                UpdateOutcome::Success(UpdateSuccess::Cloned),
                LogBundle {
                    info: vec![format!("Cloning into '{}'...", package.name)],
                    error: vec![],
                },
            )
        };

        WorkflowResult {
            package: package.name.clone(),
            outcome,
            logs,
            duration: Duration::ZERO,
        }
    }
}

/// Callbacks that count steps and completions across threads.
#[derive(Clone, Default)]
pub struct CountingCallbacks {
    pub steps: Arc<Mutex<Vec<UpdateStep>>>,
    pub completed: Arc<AtomicUsize>,
}

impl UpdateCallbacks for CountingCallbacks {
    fn on_step(&self, step: &UpdateStep) {
        self.steps.lock().unwrap().push(*step);
    }

    fn on_complete(&self, _result: &WorkflowResult) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Creates a workspace containing the given (empty) checkout directories.
pub fn workspace_with(dirs: &[&str]) -> Result<TempDir> {
    let workspace = TempDir::new()?;
    for dir in dirs {
        std::fs::create_dir_all(workspace.path().join(dir))?;
    }
    Ok(workspace)
}

pub fn descriptor(branch: &str, dir: &str) -> RepositoryDescriptor {
    RepositoryDescriptor::new(format!("git@github.com:org/{dir}.git"), branch, dir)
}

pub fn all_logs(result: &WorkflowResult) -> String {
    result
        .logs
        .info
        .iter()
        .chain(result.logs.error.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git").current_dir(repo).args(args).output()?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

fn configure_identity(repo: &Path) -> Result<()> {
    run_git(repo, &["config", "user.email", "test@example.com"])?;
    run_git(repo, &["config", "user.name", "Test User"])?;
    run_git(repo, &["config", "pull.rebase", "false"])?;
    Ok(())
}

/// A workspace with a bare `origin` and helpers to publish and check out packages.
/// Everything lives in one temp dir and is removed on drop.
pub struct GitWorkspace {
    _temp_dir: TempDir,
    root: PathBuf,
    remotes: PathBuf,
}

impl GitWorkspace {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("workspace");
        let remotes = temp_dir.path().join("remotes");
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(&remotes)?;
        Ok(Self {
            _temp_dir: temp_dir,
            root,
            remotes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates `remotes/<name>.git` with one commit on `master`.
    pub fn publish(&self, name: &str) -> Result<PathBuf> {
        let remote = self.remotes.join(format!("{name}.git"));
        let seed = self.remotes.join(format!("{name}-seed"));
        std::fs::create_dir_all(&remote)?;
        std::fs::create_dir_all(&seed)?;

        run_git(&remote, &["init", "--bare", "-b", "master"])?;
        run_git(&seed, &["init", "-b", "master"])?;
        configure_identity(&seed)?;
        std::fs::write(seed.join("README.md"), format!("# {name}\n"))?;
        run_git(&seed, &["add", "README.md"])?;
        run_git(&seed, &["commit", "-m", "Initial commit"])?;
        run_git(&seed, &["tag", "v1.0"])?;
        let remote_url = remote.to_string_lossy().into_owned();
        run_git(&seed, &["remote", "add", "origin", remote_url.as_str()])?;
        run_git(&seed, &["push", "-u", "origin", "master", "--tags"])?;
        Ok(remote)
    }

    /// Pushes a new commit to the remote from its seed checkout.
    pub fn push_commit(&self, name: &str, file: &str) -> Result<()> {
        let seed = self.remotes.join(format!("{name}-seed"));
        std::fs::write(seed.join(file), "change\n")?;
        run_git(&seed, &["add", file])?;
        let message = format!("Add {file}");
        run_git(&seed, &["commit", "-m", message.as_str()])?;
        run_git(&seed, &["push", "origin", "master"])?;
        Ok(())
    }

    /// Clones the remote into `<root>/<dir>`.
    pub fn checkout(&self, name: &str, dir: &str) -> Result<PathBuf> {
        let remote = self.remotes.join(format!("{name}.git"));
        let path = self.root.join(dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let remote_url = remote.to_string_lossy().into_owned();
        let destination = path.to_string_lossy().into_owned();
        run_git(
            &self.root,
            &["clone", remote_url.as_str(), destination.as_str()],
        )?;
        configure_identity(&path)?;
        Ok(path)
    }

    pub fn descriptor(&self, name: &str, branch: &str, dir: &str) -> RepositoryDescriptor {
        RepositoryDescriptor::new(
            self.remotes.join(format!("{name}.git")).to_string_lossy(),
            branch,
            dir,
        )
    }
}
