// zensh/src/main.rs
use std::fs;
use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;
use zensh_aio::{Git2Client, GitCommand};
use zensh_common::client::{ReleaseSource, VcsClient};
use zensh_common::config::{default_config_path, Config, GitBackend};
use zensh_common::error::Result;
use zensh_core::{Collaborators, Orchestrator};
use zensh_net::GithubReleases;

mod cli;
use cli::CliArgs;

fn main() {
    let cli_args = CliArgs::parse();

    if let Err(e) = run(cli_args) {
        error!("Command failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli_args: CliArgs) -> Result<()> {
    let config_path = cli_args.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load(&config_path)?;
    init_logging(&config, cli_args.verbose);

    let orchestrator = Orchestrator::from_config(&config, build_collaborators(&config)?);
    debug!(
        "Running {:?} with {} workers",
        cli_args.command,
        orchestrator.threads()
    );

    // The blocking HTTP client owns a runtime of its own and must be dropped
    // outside this one, so the orchestrator outlives `block_on`.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(cli_args.command.run(&config, &orchestrator));
    drop(runtime);

    if result.is_ok() {
        debug!("Command completed successfully.");
    }
    result
}

fn build_collaborators(config: &Config) -> Result<Collaborators> {
    let vcs: Arc<dyn VcsClient> = match config.git.backend {
        GitBackend::Libgit2 => Arc::new(Git2Client::new(config.git.depth)),
        GitBackend::Command => Arc::new(GitCommand::new(&config.git.command, config.git.depth)),
    };
    let releases: Arc<dyn ReleaseSource> =
        Arc::new(GithubReleases::new(config.github_token.as_deref())?);
    Ok(Collaborators { vcs, releases })
}

/// Stderr gets WARN and above unless `-v` is given, so log lines do not tear
/// the progress rows. With `-v`, everything is mirrored to a daily file.
fn init_logging(config: &Config, verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::WARN);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("ZENSH_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if verbose == 0 {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return;
    }

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!(
            "{} Failed to create log directory {}: {}",
            "Error:".red().bold(),
            log_dir.display(),
            e
        );
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return;
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, "zensh.log");
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_writer = std::io::stderr.with_max_level(max_log_level);
    let file_writer = non_blocking_appender.with_max_level(max_log_level);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr_writer.and(file_writer))
        .with_ansi(true)
        .without_time()
        .try_init();

    // Flushes on exit only if it lives for the whole process.
    Box::leak(Box::new(guard));

    debug!(
        "Verbose logging enabled. Writing logs to: {}/zensh.log",
        log_dir.display()
    );
}
