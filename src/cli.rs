use crate::config::{Config, OptionSet, Verbosity};
use crate::constants::{DEFAULT_CONCURRENCY, MANIFEST_FILE};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mgit-sync",
    about = "Update every package of a multi-repository workspace to its declared branch",
    version
)]
pub struct Cli {
    /// Workspace root (defaults to current directory)
    #[arg(long, default_value = ".")]
    pub cwd: PathBuf,

    /// Workspace manifest, relative to the workspace root
    #[arg(long, default_value = MANIFEST_FILE)]
    pub config: PathBuf,

    /// Number of packages updated at the same time
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Run `git fetch` before checking out the branch
    #[arg(long, conflicts_with = "no_fetch")]
    pub fetch: bool,

    /// Never run `git fetch` before checking out the branch
    #[arg(long)]
    pub no_fetch: bool,

    /// Only print failures and the processed count
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Echo every command and step, updating one package at a time
    #[arg(short, long)]
    pub verbose: bool,

    /// Update only these packages (defaults to every manifest dependency)
    pub packages: Vec<String>,
}

impl Cli {
    pub fn runtime_config(&self) -> Config {
        let verbosity = if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Config {
            verbosity,
            concurrency: self.concurrency,
        }
    }

    pub fn options(&self) -> OptionSet {
        OptionSet {
            fetch_before_checkout: match (self.fetch, self.no_fetch) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
        }
    }
}
