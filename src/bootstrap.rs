//! First-time checkout of packages that are missing from the workspace.

use crate::command::{CancellationToken, CommandExecutor, ExecContext, shell_quote};
use crate::error::UpdateError;
use crate::log::LogAggregator;
use crate::repository::{RepositoryDescriptor, RepositoryResolver};
use crate::update::{PackageContext, UpdateFailure, UpdateOutcome, UpdateStep, UpdateSuccess, WorkflowResult};
use std::time::Instant;

pub trait Bootstrap: Send + Sync {
    /// Materializes the checkout of `package`.
    ///
    /// `descriptor` is `None` when the caller has not resolved the repository;
    /// the implementation then resolves it on its own.
    fn execute(
        &self,
        package: &PackageContext,
        descriptor: Option<&RepositoryDescriptor>,
        cancel: &CancellationToken,
    ) -> WorkflowResult;
}

/// Clones packages with `git clone` through a [`CommandExecutor`].
pub struct CloneBootstrap<'a> {
    executor: &'a dyn CommandExecutor,
    resolver: Option<&'a dyn RepositoryResolver>,
}

impl<'a> CloneBootstrap<'a> {
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            resolver: None,
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: &'a dyn RepositoryResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn clone_package(
        &self,
        package: &PackageContext,
        descriptor: Option<&RepositoryDescriptor>,
        cancel: &CancellationToken,
        log: &mut LogAggregator,
    ) -> Result<UpdateSuccess, UpdateError> {
        let resolved;
        let descriptor = match (descriptor, self.resolver) {
            (Some(descriptor), _) => descriptor,
            (None, Some(resolver)) => {
                match resolver.resolve(&package.name, &package.working_directory)? {
                    Some(descriptor) => {
                        resolved = descriptor;
                        &resolved
                    }
                    None => {
                        log.error(skipped_message(&package.name));
                        return Ok(UpdateSuccess::Skipped);
                    }
                }
            }
            (None, None) => {
                log.error(skipped_message(&package.name));
                return Ok(UpdateSuccess::Skipped);
            }
        };
        descriptor.validate(&package.name)?;

        let destination = descriptor.checkout_path(&package.working_directory);
        let command = clone_command(descriptor, &destination.to_string_lossy());
        let ctx = ExecContext {
            package: &package.name,
            cwd: &package.working_directory,
            cancel,
        };

        match self.executor.execute(&command, &ctx) {
            Ok(outcome) => {
                log.append(&outcome);
                Ok(UpdateSuccess::Cloned)
            }
            Err(failure) => {
                log.append(&failure.outcome);
                Err(failure.error)
            }
        }
    }
}

impl Bootstrap for CloneBootstrap<'_> {
    fn execute(
        &self,
        package: &PackageContext,
        descriptor: Option<&RepositoryDescriptor>,
        cancel: &CancellationToken,
    ) -> WorkflowResult {
        let started = Instant::now();
        let mut log = LogAggregator::new();

        let outcome = match self.clone_package(package, descriptor, cancel, &mut log) {
            Ok(success) => UpdateOutcome::Success(success),
            Err(error) => {
                log.error(error.to_string());
                UpdateOutcome::Failed(UpdateFailure {
                    error,
                    step: UpdateStep::Cloning,
                })
            }
        };

        WorkflowResult {
            package: package.name.clone(),
            outcome,
            logs: log.into_bundle(),
            duration: started.elapsed(),
        }
    }
}

pub(crate) fn skipped_message(package: &str) -> String {
    format!("Package \"{package}\" was skipped because its repository could not be found.")
}

fn clone_command(descriptor: &RepositoryDescriptor, destination: &str) -> String {
    format!(
        "git clone --progress -b {} {} {}",
        descriptor.remote_branch,
        shell_quote(&descriptor.source_url),
        shell_quote(destination)
    )
}
