//! Server configuration.
//!
//! Values are layered: built-in defaults, then the TOML file named by
//! `--config` or `BLACKJACK_CONFIG`, then `BLACKJACK_*` environment
//! variables, then command-line flags. Every value remembers which layer
//! set it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use blackjack_ai::AgentConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogFormat;

pub const CONFIG_ENV: &str = "BLACKJACK_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
    Cli,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSettings {
    pub host: String,
    pub port: u16,
    pub tick_interval_ms: u64,
    pub call_timeout_ms: u64,
    pub max_fetch_failures: u32,
    pub deck_timeout_ms: u64,
    /// Fixes every shuffle when set
    pub deck_seed: Option<u64>,
    pub log_format: LogFormat,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            tick_interval_ms: 5_000,
            call_timeout_ms: 2_000,
            max_fetch_failures: 3,
            deck_timeout_ms: 2_000,
            deck_seed: None,
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettingsSources {
    pub host: ValueSource,
    pub port: ValueSource,
    pub tick_interval_ms: ValueSource,
    pub call_timeout_ms: ValueSource,
    pub max_fetch_failures: ValueSource,
    pub deck_timeout_ms: ValueSource,
    pub deck_seed: ValueSource,
    pub log_format: ValueSource,
}

impl Default for SettingsSources {
    fn default() -> Self {
        Self {
            host: ValueSource::Default,
            port: ValueSource::Default,
            tick_interval_ms: ValueSource::Default,
            call_timeout_ms: ValueSource::Default,
            max_fetch_failures: ValueSource::Default,
            deck_timeout_ms: ValueSource::Default,
            deck_seed: ValueSource::Default,
            log_format: ValueSource::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub settings: ServiceSettings,
    pub sources: SettingsSources,
}

/// Command-line flags of the server binary.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "blackjack-server", about = "Multiplayer blackjack table server")]
pub struct ServerArgs {
    /// TOML config file (overrides BLACKJACK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
    /// Milliseconds between agent polling passes
    #[arg(long)]
    pub tick_interval_ms: Option<u64>,
    #[arg(long)]
    pub call_timeout_ms: Option<u64>,
    #[arg(long)]
    pub max_fetch_failures: Option<u32>,
    #[arg(long)]
    pub deck_timeout_ms: Option<u64>,
    #[arg(long)]
    pub deck_seed: Option<u64>,
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    host: Option<String>,
    port: Option<u16>,
    tick_interval_ms: Option<u64>,
    call_timeout_ms: Option<u64>,
    max_fetch_failures: Option<u32>,
    deck_timeout_ms: Option<u64>,
    deck_seed: Option<u64>,
    log_format: Option<LogFormat>,
}

impl ServiceSettings {
    /// Resolves settings from the process environment and `args`.
    pub fn load(args: &ServerArgs) -> Result<ResolvedSettings, ConfigError> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load) with an explicit environment lookup.
    pub fn resolve<F>(args: &ServerArgs, env: F) -> Result<ResolvedSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut resolved = ResolvedSettings {
            settings: ServiceSettings::default(),
            sources: SettingsSources::default(),
        };

        let config_path = args
            .config
            .clone()
            .or_else(|| env(CONFIG_ENV).filter(|v| !v.is_empty()).map(PathBuf::from));
        if let Some(path) = config_path {
            resolved.apply_file(&read_file(&path)?);
        }

        resolved.apply_env(&env)?;
        resolved.apply_args(args);
        resolved.settings.validate()?;
        Ok(resolved)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be >0".into()));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("call_timeout_ms must be >0".into()));
        }
        if self.deck_timeout_ms == 0 {
            return Err(ConfigError::Invalid("deck_timeout_ms must be >0".into()));
        }
        if self.max_fetch_failures == 0 {
            return Err(ConfigError::Invalid("max_fetch_failures must be >=1".into()));
        }
        Ok(())
    }

    pub fn for_tests() -> Self {
        Self {
            port: 0,
            ..Self::default()
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            max_fetch_failures: self.max_fetch_failures,
        }
    }

    pub fn deck_timeout(&self) -> Duration {
        Duration::from_millis(self.deck_timeout_ms)
    }
}

impl ResolvedSettings {
    fn apply_file(&mut self, file: &FileSettings) {
        let (cfg, src) = (&mut self.settings, &mut self.sources);
        if let Some(v) = &file.host {
            cfg.host = v.clone();
            src.host = ValueSource::File;
        }
        if let Some(v) = file.port {
            cfg.port = v;
            src.port = ValueSource::File;
        }
        if let Some(v) = file.tick_interval_ms {
            cfg.tick_interval_ms = v;
            src.tick_interval_ms = ValueSource::File;
        }
        if let Some(v) = file.call_timeout_ms {
            cfg.call_timeout_ms = v;
            src.call_timeout_ms = ValueSource::File;
        }
        if let Some(v) = file.max_fetch_failures {
            cfg.max_fetch_failures = v;
            src.max_fetch_failures = ValueSource::File;
        }
        if let Some(v) = file.deck_timeout_ms {
            cfg.deck_timeout_ms = v;
            src.deck_timeout_ms = ValueSource::File;
        }
        if let Some(v) = file.deck_seed {
            cfg.deck_seed = Some(v);
            src.deck_seed = ValueSource::File;
        }
        if let Some(v) = file.log_format {
            cfg.log_format = v;
            src.log_format = ValueSource::File;
        }
    }

    fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.is_empty());
        let (cfg, src) = (&mut self.settings, &mut self.sources);

        if let Some(v) = lookup("BLACKJACK_HOST") {
            cfg.host = v;
            src.host = ValueSource::Env;
        }
        if let Some(v) = lookup("BLACKJACK_PORT") {
            cfg.port = parse_env("BLACKJACK_PORT", &v)?;
            src.port = ValueSource::Env;
        }
        if let Some(v) = lookup("BLACKJACK_TICK_INTERVAL_MS") {
            cfg.tick_interval_ms = parse_env("BLACKJACK_TICK_INTERVAL_MS", &v)?;
            src.tick_interval_ms = ValueSource::Env;
        }
        if let Some(v) = lookup("BLACKJACK_CALL_TIMEOUT_MS") {
            cfg.call_timeout_ms = parse_env("BLACKJACK_CALL_TIMEOUT_MS", &v)?;
            src.call_timeout_ms = ValueSource::Env;
        }
        if let Some(v) = lookup("BLACKJACK_MAX_FETCH_FAILURES") {
            cfg.max_fetch_failures = parse_env("BLACKJACK_MAX_FETCH_FAILURES", &v)?;
            src.max_fetch_failures = ValueSource::Env;
        }
        if let Some(v) = lookup("BLACKJACK_DECK_TIMEOUT_MS") {
            cfg.deck_timeout_ms = parse_env("BLACKJACK_DECK_TIMEOUT_MS", &v)?;
            src.deck_timeout_ms = ValueSource::Env;
        }
        if let Some(v) = lookup("BLACKJACK_DECK_SEED") {
            cfg.deck_seed = Some(parse_env("BLACKJACK_DECK_SEED", &v)?);
            src.deck_seed = ValueSource::Env;
        }
        if let Some(v) = lookup("BLACKJACK_LOG_FORMAT") {
            cfg.log_format = parse_env("BLACKJACK_LOG_FORMAT", &v)?;
            src.log_format = ValueSource::Env;
        }
        Ok(())
    }

    fn apply_args(&mut self, args: &ServerArgs) {
        let (cfg, src) = (&mut self.settings, &mut self.sources);
        if let Some(v) = &args.host {
            cfg.host = v.clone();
            src.host = ValueSource::Cli;
        }
        if let Some(v) = args.port {
            cfg.port = v;
            src.port = ValueSource::Cli;
        }
        if let Some(v) = args.tick_interval_ms {
            cfg.tick_interval_ms = v;
            src.tick_interval_ms = ValueSource::Cli;
        }
        if let Some(v) = args.call_timeout_ms {
            cfg.call_timeout_ms = v;
            src.call_timeout_ms = ValueSource::Cli;
        }
        if let Some(v) = args.max_fetch_failures {
            cfg.max_fetch_failures = v;
            src.max_fetch_failures = ValueSource::Cli;
        }
        if let Some(v) = args.deck_timeout_ms {
            cfg.deck_timeout_ms = v;
            src.deck_timeout_ms = ValueSource::Cli;
        }
        if let Some(v) = args.deck_seed {
            cfg.deck_seed = Some(v);
            src.deck_seed = ValueSource::Cli;
        }
        if let Some(v) = args.log_format {
            cfg.log_format = v;
            src.log_format = ValueSource::Cli;
        }
    }
}

fn read_file(path: &Path) -> Result<FileSettings, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
