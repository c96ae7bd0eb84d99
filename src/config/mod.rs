//! Process configuration: per-environment presets, then environment
//! variable overrides.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::auth::Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// List-query paging limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Page size used when a list request gives none
    pub default_limit: i64,
    pub max_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Ignored in development, where CORS is permissive
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_device_secret: String,
    #[serde(skip_serializing)]
    pub jwt_client_secret: String,
    pub jwt_expiry_hours: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let preset = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Self::production(),
            Ok("staging") | Ok("stage") => Self::staging(),
            _ => Self::development(),
        };
        preset.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        override_parsed("HOST", &mut self.server.host);
        override_parsed("PORT", &mut self.server.port);

        override_parsed("FILTER_DEFAULT_LIMIT", &mut self.filter.default_limit);
        if let Ok(raw) = env::var("FILTER_MAX_LIMIT") {
            // Empty or unparsable lifts the cap
            self.filter.max_limit = raw.parse().ok();
        }

        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        override_parsed("DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections);
        override_parsed("DATABASE_CONNECTION_TIMEOUT", &mut self.database.connection_timeout);
        override_parsed("DATABASE_ENABLE_QUERY_LOGGING", &mut self.database.enable_query_logging);
        override_parsed("DATABASE_SLOW_QUERY_THRESHOLD_MS", &mut self.database.slow_query_threshold_ms);

        override_parsed("API_ENABLE_REQUEST_LOGGING", &mut self.api.enable_request_logging);
        override_parsed("API_MAX_REQUEST_SIZE_BYTES", &mut self.api.max_request_size_bytes);

        if let Ok(raw) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        override_parsed("JWT_DEVICE_SECRET", &mut self.security.jwt_device_secret);
        override_parsed("JWT_CLIENT_SECRET", &mut self.security.jwt_client_secret);
        override_parsed("SECURITY_JWT_EXPIRY_HOURS", &mut self.security.jwt_expiry_hours);

        self
    }

    /// Local defaults: permissive CORS, fixed development secrets, verbose SQL logging
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            filter: FilterConfig {
                default_limit: 10,
                max_limit: Some(1000),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
                slow_query_threshold_ms: 100,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024,
            },
            security: SecurityConfig {
                cors_origins: vec![],
                jwt_device_secret: "dev-device-secret".to_string(),
                jwt_client_secret: "dev-client-secret".to_string(),
                jwt_expiry_hours: 24 * 7,
            },
        }
    }

    /// Secrets must come from the environment
    pub fn staging() -> Self {
        let dev = Self::development();
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 8080, ..dev.server },
            filter: FilterConfig {
                max_limit: Some(500),
                ..dev.filter
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                slow_query_threshold_ms: 500,
                ..dev.database
            },
            api: ApiConfig {
                max_request_size_bytes: 5 * 1024 * 1024,
                ..dev.api
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_device_secret: String::new(),
                jwt_client_secret: String::new(),
                jwt_expiry_hours: 24,
            },
        }
    }

    /// Secrets must come from the environment
    pub fn production() -> Self {
        let staging = Self::staging();
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                max_limit: Some(100),
                ..staging.filter
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
                slow_query_threshold_ms: 1000,
                ..staging.database
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_expiry_hours: 4,
                ..staging.security
            },
            ..staging
        }
    }

    /// HS256 secret for tokens issued to the given platform
    pub fn jwt_secret_for(&self, platform: Platform) -> &str {
        match platform {
            Platform::Device => &self.security.jwt_device_secret,
            Platform::Client => &self.security.jwt_client_secret,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Replaces `target` when the variable is set and parses; otherwise keeps the preset
fn override_parsed<T: FromStr>(name: &str, target: &mut T) {
    let Ok(raw) = env::var(name) else { return };
    match raw.parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!("Ignoring unparsable {}={:?}", name, raw),
    }
}

/// Loaded once from the environment on first use
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_preset() {
        let config = AppConfig::development();
        assert_eq!(config.filter.default_limit, 10);
        assert_eq!(config.filter.max_limit, Some(1000));
        assert!(config.is_development());
        assert_eq!(config.jwt_secret_for(Platform::Device), "dev-device-secret");
        assert_eq!(config.jwt_secret_for(Platform::Client), "dev-client-secret");
    }

    #[test]
    fn production_preset() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.filter.max_limit, Some(100));
        assert_eq!(config.filter.default_limit, 10);
        assert!(!config.database.enable_query_logging);
        assert!(config.security.jwt_device_secret.is_empty());
        assert!(!config.is_development());
    }

    #[test]
    fn overrides_keep_preset_on_bad_values() {
        let mut port: u16 = 3000;
        env::set_var("ENTITY_CRUD_TEST_PORT", "not-a-port");
        override_parsed("ENTITY_CRUD_TEST_PORT", &mut port);
        assert_eq!(port, 3000);

        env::set_var("ENTITY_CRUD_TEST_PORT", "4100");
        override_parsed("ENTITY_CRUD_TEST_PORT", &mut port);
        assert_eq!(port, 4100);

        override_parsed("ENTITY_CRUD_TEST_UNSET_VARIABLE", &mut port);
        assert_eq!(port, 4100);
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut config = AppConfig::development();
        config.database.url = Some("postgres://u:p@localhost/db".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("dev-device-secret"));
        assert!(!json.contains("postgres://"));
    }
}
