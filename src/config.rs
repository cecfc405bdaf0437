//! Configuration types for CLI verbosity and per-package options.

use crate::command::{self, CommandLogger};
use crate::constants::DEFAULT_CONCURRENCY;
use crate::repository::RepositorySource;

/// Runtime configuration derived from CLI arguments.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Controls the verbosity level of CLI output.
    pub verbosity: Verbosity,
    /// Upper bound on packages updated at the same time.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Config {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Returns the command logger matching the verbosity settings.
    ///
    /// Config only picks the logger; echoing commands is done by the
    /// callbacks in the command module.
    #[must_use]
    pub fn command_logger(&self) -> CommandLogger {
        if self.is_verbose() {
            command::verbose_logger
        } else {
            command::no_op_logger
        }
    }

    /// Verbose mode prints transcripts as commands run, so packages go one at a time.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        if self.is_verbose() {
            1
        } else {
            self.concurrency.max(1)
        }
    }
}

/// Verbosity level for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Options that shape one package's update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionSet {
    /// `None` keeps the default of the repository source: explicit
    /// descriptors always fetch, resolved ones do not.
    pub fetch_before_checkout: Option<bool>,
}

impl OptionSet {
    #[must_use]
    pub fn with_fetch(fetch: bool) -> Self {
        Self {
            fetch_before_checkout: Some(fetch),
        }
    }

    #[must_use]
    pub fn should_fetch(&self, source: &RepositorySource<'_>) -> bool {
        self.fetch_before_checkout
            .unwrap_or_else(|| source.is_explicit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::repository::RepositoryDescriptor;
    use std::path::Path;

    #[test]
    fn test_config_quiet_and_verbose_flags() {
        let quiet = Config {
            verbosity: Verbosity::Quiet,
            ..Config::default()
        };
        assert!(quiet.is_quiet());
        assert!(!quiet.is_verbose());

        let verbose = Config {
            verbosity: Verbosity::Verbose,
            ..Config::default()
        };
        assert!(!verbose.is_quiet());
        assert!(verbose.is_verbose());
    }

    #[test]
    fn test_command_logger_selects_verbose_or_no_op() {
        let verbose = Config {
            verbosity: Verbosity::Verbose,
            ..Config::default()
        };
        assert!(std::ptr::fn_addr_eq(
            verbose.command_logger() as CommandLogger,
            command::verbose_logger as CommandLogger
        ));

        let normal = Config::default();
        assert!(std::ptr::fn_addr_eq(
            normal.command_logger() as CommandLogger,
            command::no_op_logger as CommandLogger
        ));
    }

    #[test]
    fn test_verbose_forces_sequential_updates() {
        let verbose = Config {
            verbosity: Verbosity::Verbose,
            concurrency: 16,
        };
        assert_eq!(verbose.effective_concurrency(), 1);

        let zero = Config {
            verbosity: Verbosity::Normal,
            concurrency: 0,
        };
        assert_eq!(zero.effective_concurrency(), 1);
    }

    #[test]
    fn test_fetch_defaults_depend_on_source() {
        let descriptor = RepositoryDescriptor::new("org/a", "main", "a");
        let resolver = |_: &str, _: &Path| -> Result<Option<RepositoryDescriptor>> { Ok(None) };
        let explicit = RepositorySource::Explicit(&descriptor);
        let resolved = RepositorySource::Resolved(&resolver);

        let default = OptionSet::default();
        assert!(default.should_fetch(&explicit));
        assert!(!default.should_fetch(&resolved));

        assert!(!OptionSet::with_fetch(false).should_fetch(&explicit));
        assert!(OptionSet::with_fetch(true).should_fetch(&resolved));
    }
}
