mod cli;
mod color;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use config::Config;
use gitlab_mock::MockServer;
use std::io::Write;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let ansi = color::init(cli.color);
    init_logging(cli.verbose, ansi);

    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

fn init_logging(verbose: u8, ansi: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.merge_with_cli(&cli);
    config.validate()?;

    // Installed before bind: any signal sent after the pid file appears must
    // still end in requests.json being written.
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("Failed to install signal handler")?;
    }

    let server = MockServer::bind(&config.server).context("Failed to start mock server")?;

    let mut stdout = std::io::stdout();
    writeln!(stdout, "Mock GitLab API listening on {}", server.url())?;
    writeln!(stdout, "State dir: {}", server.state_dir().path().display())?;
    stdout.flush()?;

    server.run(&shutdown).context("Failed to write request log")?;

    tracing::info!("mock server stopped");
    Ok(())
}
