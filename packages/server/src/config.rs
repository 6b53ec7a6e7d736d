use std::time::Duration;

use common::{ContainerLimitPolicy, MqAppConfig};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::engine::ContainerSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// Used by the redis backend only.
    #[serde(default = "default_cache_url")]
    pub url: String,
}

fn default_cache_url() -> String {
    "redis://localhost:6379".into()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            url: default_cache_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoreboardConfig {
    /// Default: 14 days.
    #[serde(default = "default_scoreboard_ttl_secs")]
    pub ttl_secs: u64,
    /// Upper bound for one generation pass. Default: 30.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
}

fn default_scoreboard_ttl_secs() -> u64 {
    14 * 24 * 3600
}
fn default_generation_timeout_secs() -> u64 {
    30
}

impl Default for ScoreboardConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_scoreboard_ttl_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl ScoreboardConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Docker,
    #[default]
    Disabled,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContainerConfig {
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    /// Host name players use to reach published ports.
    #[serde(default = "default_public_host")]
    pub public_host: String,
    /// Pass challenge storage limits to docker. Requires overlay2 on xfs with pquota.
    #[serde(default)]
    pub storage_limit: bool,
    #[serde(default = "default_lifetime_minutes")]
    pub lifetime_minutes: i64,
    #[serde(default = "default_lifetime_minutes")]
    pub extension_minutes: i64,
    /// 0 = extensions allowed at any time.
    #[serde(default = "default_renewal_window_minutes")]
    pub renewal_window_minutes: i64,
    #[serde(default)]
    pub limit_policy: ContainerLimitPolicy,
    #[serde(default = "default_operation_cooldown_secs")]
    pub operation_cooldown_secs: i64,
    #[serde(default = "default_driver_timeout_secs")]
    pub driver_timeout_secs: u64,
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
}

fn default_docker_bin() -> String {
    "docker".into()
}
fn default_public_host() -> String {
    "127.0.0.1".into()
}
fn default_lifetime_minutes() -> i64 {
    120
}
fn default_renewal_window_minutes() -> i64 {
    10
}
fn default_operation_cooldown_secs() -> i64 {
    10
}
fn default_driver_timeout_secs() -> u64 {
    60
}
fn default_reaper_interval_secs() -> u64 {
    30
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            docker_bin: default_docker_bin(),
            public_host: default_public_host(),
            storage_limit: false,
            lifetime_minutes: default_lifetime_minutes(),
            extension_minutes: default_lifetime_minutes(),
            renewal_window_minutes: default_renewal_window_minutes(),
            limit_policy: ContainerLimitPolicy::default(),
            operation_cooldown_secs: default_operation_cooldown_secs(),
            driver_timeout_secs: default_driver_timeout_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
        }
    }
}

impl ContainerConfig {
    pub fn settings(&self) -> ContainerSettings {
        ContainerSettings {
            lifetime: chrono::Duration::minutes(self.lifetime_minutes),
            extension: chrono::Duration::minutes(self.extension_minutes),
            renewal_window: chrono::Duration::minutes(self.renewal_window_minutes),
            limit_policy: self.limit_policy,
            operation_cooldown: chrono::Duration::seconds(self.operation_cooldown_secs),
            driver_timeout: Duration::from_secs(self.driver_timeout_secs),
        }
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scoreboard: ScoreboardConfig,
    #[serde(default)]
    pub container: ContainerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., ARENA__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("ARENA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
