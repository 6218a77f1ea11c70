use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use kegforge_common::error::{KfError, Result};
use kegforge_common::{Cache, Config};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{CliArgs, Command};

fn level_filter_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

async fn run_init_command(init_args: &cli::InitArgs, verbose: u8) -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level_filter_for(verbose))
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();

    let config = Config::load()
        .map_err(|e| KfError::Config(format!("could not determine prefix for init: {e}")))?;

    init_args.run(&config).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    if let Command::Init(ref init_args) = cli_args.command {
        return match run_init_command(init_args, cli_args.verbose).await {
            Ok(()) => Ok(()),
            Err(e) => {
                eprintln!("{}: init failed: {e}", "Error".red().bold());
                process::exit(1);
            }
        };
    }

    let config = Config::load().map_err(|e| {
        KfError::Config(format!("could not load configuration (have you run 'kegforge init'?): {e}"))
    })?;

    let level_filter = level_filter_for(cli_args.verbose);
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("KEGFORGE_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "kegforge.log");
        let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);
        let stderr_writer = std::io::stderr.with_max_level(max_log_level);
        let file_writer = non_blocking_appender.with_max_level(max_log_level);

        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(stderr_writer.and(file_writer))
            .with_ansi(true)
            .without_time()
            .try_init();

        // Keep the non-blocking writer's flush thread alive for the process lifetime.
        Box::leak(Box::new(guard));
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
    }

    let cache = Arc::new(Cache::new(&config).map_err(|e| {
        KfError::Cache(format!("could not initialize cache (ensure 'kegforge init' ran): {e}"))
    })?);

    if let Err(e) = cli_args.command.run(&config, cache).await {
        error!("command failed: {e}");
        eprintln!("{}: {e}", "Error".red().bold());
        process::exit(1);
    }

    debug!("command completed successfully");
    Ok(())
}
