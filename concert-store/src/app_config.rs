use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_hold_seconds")]
    pub reservation_hold_seconds: u64,
    #[serde(default = "default_purge_interval")]
    pub purge_interval_seconds: u64,
}

fn default_hold_seconds() -> u64 { 300 }
fn default_purge_interval() -> u64 { 60 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            reservation_hold_seconds: default_hold_seconds(),
            purge_interval_seconds: default_purge_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
    pub password_pepper: String,
    #[serde(default)]
    pub admin_usernames: Vec<String>,
}

fn default_token_ttl() -> u64 { 300 }

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the service runs on the in-memory store.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { channel_capacity: 100 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `CONCERT__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("CONCERT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 8080

                [auth]
                password_pepper = "pepper"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.database.url.is_none());
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.auth.token_ttl_seconds, 300);
        assert_eq!(cfg.business_rules.reservation_hold_seconds, 300);
        assert_eq!(cfg.notifications.channel_capacity, 100);
    }
}
