use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mock-gitlab",
    version,
    about = "Mock GitLab API server for testing release automation"
)]
pub struct Cli {
    /// Port to listen on (0 lets the OS pick one)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Directory for port/pid files, scenario flags and requests.json
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Interface to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Path to a TOML config file
    #[arg(long, env = "MOCK_GITLAB_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// When to colorize diagnostics
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Log more (-v for info, -vv for debug); RUST_LOG applies otherwise
    #[arg(long, short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Debug, Copy, Default)]
pub enum ColorChoice {
    /// Colorize if stderr is a terminal
    #[default]
    Auto,
    /// Always colorize
    Always,
    /// Never colorize
    Never,
}
