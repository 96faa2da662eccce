use anyhow::{Context, Result};
use clap::Parser;
use pman::commands::{repl, Cli};
use pman::config::Settings;
use pman::utils::config_paths::ConfigPaths;
use pman::utils::logger::init_logger;
use pman::{StatsReporter, Supervisor};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match main_impl(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("pman: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn main_impl(cli: Cli) -> Result<()> {
    let paths = match &cli.config {
        Some(file) => ConfigPaths::with_config_file(file.clone()),
        None => ConfigPaths::new().unwrap_or_else(|_| ConfigPaths::detached()),
    };
    let settings = Settings::resolve(&cli, &paths.user_config);

    init_logger(settings.log_level.as_deref(), settings.log_file.clone())
        .context("failed to initialise logging")?;
    settings.apply_color();
    tracing::debug!(
        config = ?paths.config_file,
        proc_root = %settings.proc_root.display(),
        "starting"
    );

    let stats = StatsReporter::new(&settings.proc_root)
        .with_context(|| format!("cannot read stats from {}", settings.proc_root.display()))?;
    let mut supervisor = Supervisor::new(stats);

    repl::run(&mut supervisor, &settings).context("terminal I/O failed")?;
    Ok(())
}
