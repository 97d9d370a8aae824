use crate::cli::Cli;
use anyhow::{anyhow, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use gitlab_mock::ServerConfig;
use std::path::Path;

/// Prefix for environment overrides, e.g. `MOCK_GITLAB_PORT` or
/// `MOCK_GITLAB_PROJECT__DEFAULT_BRANCH`
pub const ENV_PREFIX: &str = "MOCK_GITLAB_";

/// Server configuration resolved from defaults, a TOML file, the environment
/// and the command line, in increasing precedence
#[derive(Debug, Default)]
pub struct Config {
    pub server: ServerConfig,
}

impl Config {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(ServerConfig::default()));

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let server: ServerConfig = figment
            .extract()
            .map_err(|e| anyhow!("Failed to load config: {}", e))?;

        Ok(Self { server })
    }

    pub fn merge_with_cli(&mut self, cli: &Cli) {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(dir) = &cli.state_dir {
            self.server.state_dir = dir.clone();
        }
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let server = &self.server;

        if server.host.trim().is_empty() {
            return Err(anyhow!("Listen host must not be empty"));
        }
        if server.token_header.is_empty()
            || !server
                .token_header
                .bytes()
                .all(|b| b.is_ascii_graphic() && b != b':')
        {
            return Err(anyhow!(
                "Invalid token header name {:?}. Set via token_header in the config file or {}TOKEN_HEADER",
                server.token_header,
                ENV_PREFIX
            ));
        }
        if !server.api_prefix.is_empty() && !server.api_prefix.starts_with('/') {
            return Err(anyhow!(
                "API prefix must be empty or start with '/', got {:?}",
                server.api_prefix
            ));
        }
        Ok(())
    }
}
