//! Repository descriptors and the two ways of obtaining one.

use crate::error::{Result, UpdateError};
use std::fmt;
use std::path::{Path, PathBuf};

/// Characters that must never reach a shell command line through a branch name.
const FORBIDDEN_BRANCH_CHARS: [char; 12] = [';', '|', '&', '$', '`', '\'', '"', '<', '>', '(', ')', '\\'];

/// Remote location, branch and checkout directory of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    pub source_url: String,
    pub remote_branch: String,
    /// Relative to the workspace root.
    pub local_directory: PathBuf,
}

impl RepositoryDescriptor {
    pub fn new(
        source_url: impl Into<String>,
        remote_branch: impl Into<String>,
        local_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            remote_branch: remote_branch.into(),
            local_directory: local_directory.into(),
        }
    }

    /// Checks that the descriptor can drive the workflow for `package`.
    pub fn validate(&self, package: &str) -> Result<()> {
        let branch_ok = !self.remote_branch.is_empty()
            && !self
                .remote_branch
                .chars()
                .any(|c| c.is_whitespace() || c == '\0' || FORBIDDEN_BRANCH_CHARS.contains(&c));
        let directory_ok = !self.local_directory.as_os_str().is_empty();

        if branch_ok && directory_ok {
            Ok(())
        } else {
            Err(UpdateError::invalid_repository(package, self.to_string()))
        }
    }

    /// Absolute checkout location inside `workspace`.
    #[must_use]
    pub fn checkout_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.local_directory)
    }
}

impl fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.source_url, self.remote_branch)
    }
}

/// Looks up the repository of a package by name.
pub trait RepositoryResolver: Send + Sync {
    /// `Ok(None)` means the package has no known repository and is skipped.
    /// Errors are reserved for malformed repository identifiers.
    fn resolve(&self, package: &str, working_directory: &Path)
    -> Result<Option<RepositoryDescriptor>>;
}

impl<F> RepositoryResolver for F
where
    F: Fn(&str, &Path) -> Result<Option<RepositoryDescriptor>> + Send + Sync,
{
    fn resolve(
        &self,
        package: &str,
        working_directory: &Path,
    ) -> Result<Option<RepositoryDescriptor>> {
        self(package, working_directory)
    }
}

/// Where the workflow gets a package's descriptor from.
#[derive(Clone, Copy)]
pub enum RepositorySource<'a> {
    /// The caller already knows the descriptor.
    Explicit(&'a RepositoryDescriptor),
    /// The descriptor is looked up once the checkout is known to exist.
    Resolved(&'a dyn RepositoryResolver),
}

impl RepositorySource<'_> {
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        matches!(self, RepositorySource::Explicit(_))
    }
}

impl fmt::Debug for RepositorySource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositorySource::Explicit(descriptor) => {
                f.debug_tuple("Explicit").field(descriptor).finish()
            }
            RepositorySource::Resolved(_) => f.write_str("Resolved"),
        }
    }
}
