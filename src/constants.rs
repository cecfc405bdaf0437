//! Application-wide constants.
//!
//! Centralized configuration values to avoid magic numbers throughout the codebase.

use std::time::Duration;

/// Default timeout for individual external commands (in seconds).
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

/// Returns the external command timeout.
///
/// Can be customized via the MGIT_SYNC_TIMEOUT environment variable (in seconds).
/// Falls back to 120 seconds if not set or invalid.
///
/// Example: `MGIT_SYNC_TIMEOUT=300 mgit-sync`
pub fn command_timeout() -> Duration {
    std::env::var("MGIT_SYNC_TIMEOUT")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS))
}

/// Default number of packages updated at the same time.
/// Clones and pulls are network-bound, so this is above a typical CPU count.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Interval between child-process polls while waiting for a command.
pub const COMMAND_POLL_MS: u64 = 20;

/// Progress bar tick interval in milliseconds.
pub const PROGRESS_TICK_MS: u64 = 80;

/// Maximum number of completed packages to show in the workspace progress display.
pub const MAX_VISIBLE_COMPLETIONS: usize = 5;

/// Workspace manifest file name looked up in the working directory.
pub const MANIFEST_FILE: &str = "mgit.json";

/// Directory (relative to the workspace root) that holds package checkouts.
pub const DEFAULT_PACKAGES_DIR: &str = "packages";

/// Branch used when a repository identifier does not name one.
pub const DEFAULT_BRANCH: &str = "master";

/// Template for expanding `org/repo` shorthands. `{path}` is replaced.
pub const DEFAULT_URL_TEMPLATE: &str = "git@github.com:{path}.git";

/// Remote that branches are verified against and pulled from.
pub const ORIGIN_REMOTE: &str = "origin";
