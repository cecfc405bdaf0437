//! Workspace manifest (`mgit.json`) and the resolver built on top of it.
//!
//! ```json
//! {
//!   "packages": "packages",
//!   "dependencies": {
//!     "@scope/utils": "org/utils#develop",
//!     "engine": "git@example.com:org/engine.git"
//!   }
//! }
//! ```

use crate::constants::{DEFAULT_BRANCH, DEFAULT_PACKAGES_DIR, DEFAULT_URL_TEMPLATE};
use crate::error::{Result, UpdateError};
use crate::repository::{RepositoryDescriptor, RepositoryResolver};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How the checkout directory of a package is named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryNaming {
    /// Last path segment of the repository location, without `.git`.
    #[default]
    Git,
    /// Package name without its `@scope/` prefix.
    Npm,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default = "default_packages")]
    pub packages: PathBuf,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default = "default_branch")]
    pub resolver_default_branch: String,
    #[serde(default = "default_url_template")]
    pub resolver_url_template: String,
    #[serde(default)]
    pub resolver_directory_name: DirectoryNaming,
}

fn default_packages() -> PathBuf {
    PathBuf::from(DEFAULT_PACKAGES_DIR)
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_url_template() -> String {
    DEFAULT_URL_TEMPLATE.to_string()
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(content)?;
        if manifest.packages.is_absolute() {
            return Err(UpdateError::Manifest(format!(
                "\"packages\" must be relative to the workspace, got {}",
                manifest.packages.display()
            )));
        }
        Ok(manifest)
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    /// Turns `<location>[#<branch>]` into a descriptor for `package`.
    pub fn parse_identifier(&self, package: &str, identifier: &str) -> Result<RepositoryDescriptor> {
        let invalid = || UpdateError::invalid_repository(package, identifier);

        if identifier.is_empty() || identifier.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let mut parts = identifier.split('#');
        let location = parts.next().filter(|l| !l.is_empty()).ok_or_else(invalid)?;
        let branch = match parts.next() {
            Some("") => return Err(invalid()),
            Some(branch) => branch.to_string(),
            None => self.resolver_default_branch.clone(),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        let source_url = if is_full_location(location) {
            location.to_string()
        } else if is_shorthand(location) {
            self.resolver_url_template.replace("{path}", location)
        } else {
            return Err(invalid());
        };

        let directory = self.directory_name(package, location).ok_or_else(invalid)?;

        let descriptor = RepositoryDescriptor::new(source_url, branch, self.packages.join(directory));
        descriptor.validate(package)?;
        Ok(descriptor)
    }

    /// Where `package` is expected to be checked out, relative to the workspace.
    ///
    /// Unlike [`Manifest::parse_identifier`] this never fails; unknown or
    /// malformed entries fall back to the unscoped package name.
    #[must_use]
    pub fn package_directory(&self, package: &str) -> PathBuf {
        let location = self
            .dependencies
            .get(package)
            .and_then(|identifier| identifier.split('#').next());
        let directory = location
            .and_then(|location| self.directory_name(package, location))
            .or_else(|| package.rsplit('/').next())
            .unwrap_or(package);
        self.packages.join(directory)
    }

    fn directory_name<'a>(&self, package: &'a str, location: &'a str) -> Option<&'a str> {
        match self.resolver_directory_name {
            DirectoryNaming::Git => location
                .rsplit(['/', ':'])
                .next()
                .map(|segment| segment.trim_end_matches(".git")),
            DirectoryNaming::Npm => package.rsplit('/').next(),
        }
        .filter(|d| !d.is_empty() && *d != "." && *d != "..")
    }
}

fn is_full_location(location: &str) -> bool {
    location.contains(':') || location.starts_with('/') || location.starts_with('.')
}

fn is_shorthand(location: &str) -> bool {
    let mut segments = location.split('/');
    matches!(
        (segments.next(), segments.next(), segments.next()),
        (Some(org), Some(repo), None) if !org.is_empty() && !repo.is_empty()
    )
}

/// Resolves packages through the `dependencies` table of a [`Manifest`].
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    manifest: Manifest,
}

impl ManifestResolver {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }
}

impl RepositoryResolver for ManifestResolver {
    fn resolve(
        &self,
        package: &str,
        _working_directory: &Path,
    ) -> Result<Option<RepositoryDescriptor>> {
        match self.manifest.dependencies.get(package) {
            Some(identifier) => self.manifest.parse_identifier(package, identifier).map(Some),
            None => Ok(None),
        }
    }
}
