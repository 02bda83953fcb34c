//! Application configuration loaded from environment variables and config files.
//!
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration, if [`init`] has run.
pub fn get() -> Option<&'static AppConfig> {
    CONFIG.get()
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = builder()?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (HEARTH__SERVER__PORT, HEARTH__DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("HEARTH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 2)?
        .set_default("auth.jwt_secret", "")?
        .set_default("auth.access_token_ttl_secs", 900)? // 15 min
        .set_default("limits.max_roles_per_server", 250)?
        .set_default("limits.max_overrides_per_channel", 100)
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Unset means the in-memory store is used.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret (HS256)
    pub jwt_secret: String,
    /// Access token TTL in seconds
    pub access_token_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LimitsConfig {
    pub max_roles_per_server: u32,
    pub max_overrides_per_channel: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_roles_per_server: 250,
            max_overrides_per_channel: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_without_any_sources() {
        let cfg: AppConfig = builder()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.database.url.is_none());
        assert_eq!(cfg.auth.access_token_ttl_secs, 900);
        assert_eq!(cfg.limits.max_roles_per_server, LimitsConfig::default().max_roles_per_server);
        assert_eq!(
            cfg.limits.max_overrides_per_channel,
            LimitsConfig::default().max_overrides_per_channel
        );
    }
}
