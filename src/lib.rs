//! Multi-repository workspace updater library.
//!
//! This crate brings each package of a workspace up to date with its
//! declared upstream branch by:
//! - Cloning packages that are not checked out yet
//! - Refusing to touch checkouts with uncommitted changes
//! - Checking out the declared branch (optionally after a fetch)
//! - Leaving detached checkouts alone
//! - Pulling from origin once the branch is known to exist there

pub mod bootstrap;
pub mod cli;
pub mod command;
pub mod config;
pub mod constants;
pub mod error;
pub mod log;
pub mod manifest;
pub mod output;
pub mod repository;
pub mod update;
