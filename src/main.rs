use anyhow::Context;
use clap::Parser;
use mgit_sync::bootstrap::CloneBootstrap;
use mgit_sync::cli::Cli;
use mgit_sync::command::ShellExecutor;
use mgit_sync::manifest::{Manifest, ManifestResolver};
use mgit_sync::output;
use mgit_sync::repository::RepositorySource;
use mgit_sync::update::{PackageContext, UpdateJob, Updater};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.runtime_config();
    init_tracing(config.is_verbose());

    let cwd = std::fs::canonicalize(&cli.cwd)
        .with_context(|| format!("Workspace {} does not exist", cli.cwd.display()))?;
    output::print_working_dir(&cwd, &config);

    let manifest_path = cwd.join(&cli.config);
    let manifest = Manifest::load(&manifest_path)
        .with_context(|| format!("Failed to load {}", manifest_path.display()))?;

    let names: Vec<String> = if cli.packages.is_empty() {
        manifest.package_names().map(str::to_string).collect()
    } else {
        cli.packages.clone()
    };
    let options = cli.options();
    let packages: Vec<PackageContext> = names
        .iter()
        .map(|name| {
            PackageContext::new(name.as_str(), &cwd)
                .with_directory(manifest.package_directory(name))
                .with_options(options)
        })
        .collect();

    let resolver = ManifestResolver::new(manifest);
    let executor = ShellExecutor::new(config.command_logger());
    let bootstrap = CloneBootstrap::new(&executor).with_resolver(&resolver);
    let updater = Updater::new(&executor, &bootstrap);

    let jobs: Vec<UpdateJob<'_>> = packages
        .into_iter()
        .map(|package| UpdateJob {
            package,
            source: RepositorySource::Resolved(&resolver),
        })
        .collect();

    output::print_workspace_start(jobs.len(), &config);
    let progress = output::create_workspace_progress(jobs.len(), &config);
    let started = Instant::now();

    let report = updater.update_workspace(
        &jobs,
        |package| progress.create_tracker(&package.name, config),
        &config,
    );

    progress.finish();
    output::print_summary(&report, started.elapsed(), &config);

    if report.failed_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mgit_sync=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
