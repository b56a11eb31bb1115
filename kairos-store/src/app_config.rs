use serde::Deserialize;
use std::env;
use kairos_core::CancellationPolicy;

/// Compiled-in copy of `config/default.toml`, so the binary starts from any
/// working directory.
const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub cancellation: CancellationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Absent url means in-memory repositories.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_seconds")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_seconds() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout_seconds(),
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.acquire_timeout_seconds.max(1))
    }
}

/// Absent url means the process-local code store.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CancellationConfig {
    pub code_ttl_seconds: u64,
    pub max_attempts: u32,
    pub sweep_interval_seconds: u64,
    /// Log codes in clear text; local development only.
    #[serde(default)]
    pub reveal_codes: bool,
}

impl CancellationConfig {
    pub fn policy(&self) -> CancellationPolicy {
        CancellationPolicy {
            code_ttl: chrono::Duration::seconds(self.code_ttl_seconds as i64),
            max_attempts: self.max_attempts,
        }
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
            .add_source(config::File::with_name("config/default").required(false))
            // Per-environment overrides, e.g. config/production.toml
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // KAIROS__SERVER__PORT=8080 sets server.port
            .add_source(config::Environment::with_prefix("KAIROS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
