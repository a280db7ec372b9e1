//! Configuration management for the Dinner Tonight service
//!
//! Provides strongly-typed configuration with validation, environment variable parsing,
//! and sensible defaults. Supports both development and production environments.
//!
//! # Example
//! ```no_run
//! use dinner_tonight::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("Listening on port {}", config.api.port);
//! ```

use crate::error::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Inclusive bounds accepted for `max_missing` on the suggestions endpoint
pub const MAX_MISSING_RANGE: (u32, u32) = (0, 5);
/// Inclusive bounds accepted for `limit` on the suggestions endpoint
pub const SUGGESTION_LIMIT_RANGE: (u32, u32) = (1, 50);

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// API server configuration
    pub api: ApiConfig,
    /// Suggestion defaults
    pub suggestions: SuggestionConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections to keep open
    pub min_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Idle timeout for connections
    pub idle_timeout: Duration,
    /// Maximum lifetime for connections
    pub max_lifetime: Duration,
    /// Enable statement caching
    pub statement_cache_size: usize,
    /// Attempts at startup before giving up on the database
    pub connect_retries: u32,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
    /// Host to bind to
    pub host: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Allowed origins for CORS (`*` allows any)
    pub cors_origins: Vec<String>,
}

/// Defaults for recipe suggestions
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    /// User whose pantry is used when a request names none
    pub default_user_id: i32,
    /// `max_missing` used when the request omits it
    pub default_max_missing: u32,
    /// `limit` used when the request omits it
    pub default_limit: u32,
    /// Upper bound on the catalog/inventory read
    pub fetch_timeout: Duration,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            default_user_id: 1,
            default_max_missing: 2,
            default_limit: 10,
            fetch_timeout: Duration::from_millis(5000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Prefer loading env from a directory of files (FFOLDER) for platforms that mount secrets as files.
        // Each file name is the env var name and its contents is the value.
        if let Ok(folder) = std::env::var("FFOLDER") {
            load_env_folder(&folder);
        } else {
            // Try to load .env file (ignore if not found)
            dotenvy::dotenv().ok();
        }

        let config = Self {
            database: DatabaseConfig::from_env()?,
            api: ApiConfig::from_env()?,
            suggestions: SuggestionConfig::from_env()?,
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(Error::InvalidConfig {
                key: "DATABASE_URL",
                message: "Database URL cannot be empty".into(),
            });
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                message: "max_connections must be >= min_connections".into(),
            });
        }

        if self.api.port == 0 {
            return Err(Error::InvalidConfig {
                key: "API_PORT",
                message: "port must be non-zero".into(),
            });
        }

        let (lo, hi) = MAX_MISSING_RANGE;
        if !(lo..=hi).contains(&self.suggestions.default_max_missing) {
            return Err(Error::InvalidConfig {
                key: "SUGGEST_DEFAULT_MAX_MISSING",
                message: format!("must be between {} and {}", lo, hi).into(),
            });
        }

        let (lo, hi) = SUGGESTION_LIMIT_RANGE;
        if !(lo..=hi).contains(&self.suggestions.default_limit) {
            return Err(Error::InvalidConfig {
                key: "SUGGEST_DEFAULT_LIMIT",
                message: format!("must be between {} and {}", lo, hi).into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary (without sensitive data)
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Database:");
        info!("    URL: {}", mask_url(&self.database.url));
        info!(
            "    Pool Size: {}-{}",
            self.database.min_connections, self.database.max_connections
        );
        info!("  API:");
        info!("    Listening on: {}:{}", self.api.host, self.api.port);
        info!("    CORS origins: {}", self.api.cors_origins.join(", "));
        info!("  Suggestions:");
        info!(
            "    Defaults: user={}, max_missing={}, limit={}",
            self.suggestions.default_user_id,
            self.suggestions.default_max_missing,
            self.suggestions.default_limit
        );
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = get_env("DATABASE_URL").unwrap_or_else(|_| {
            let user = std::env::var("USER").unwrap_or_else(|_| "postgres".to_string());
            format!("postgres://{}@localhost:5432/recipes", user)
        });

        Ok(Self {
            url,
            max_connections: get_env_parsed_or("DB_MAX_CONNECTIONS", 10)?,
            min_connections: get_env_parsed_or("DB_MIN_CONNECTIONS", 1)?,
            connect_timeout: Duration::from_secs(get_env_parsed_or("DB_CONNECT_TIMEOUT_SECS", 30)?),
            idle_timeout: Duration::from_secs(get_env_parsed_or("DB_IDLE_TIMEOUT_SECS", 600)?),
            max_lifetime: Duration::from_secs(get_env_parsed_or("DB_MAX_LIFETIME_SECS", 3600)?),
            statement_cache_size: get_env_parsed_or("DB_STATEMENT_CACHE_SIZE", 100)?,
            connect_retries: get_env_parsed_or("DB_CONNECT_RETRIES", 5)?,
        })
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            port: get_env_parsed_or("API_PORT", 8000)?,
            host: get_env_or("API_HOST", "0.0.0.0"),
            request_timeout: Duration::from_secs(get_env_parsed_or("API_REQUEST_TIMEOUT_SECS", 30)?),
            cors_origins: get_env_or(
                "API_CORS_ORIGINS",
                "http://localhost:3000,http://localhost:5173,http://localhost:8080",
            )
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        })
    }
}

impl SuggestionConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            default_user_id: get_env_parsed_or("DEFAULT_USER_ID", defaults.default_user_id)?,
            default_max_missing: get_env_parsed_or(
                "SUGGEST_DEFAULT_MAX_MISSING",
                defaults.default_max_missing,
            )?,
            default_limit: get_env_parsed_or("SUGGEST_DEFAULT_LIMIT", defaults.default_limit)?,
            fetch_timeout: Duration::from_millis(get_env_parsed_or(
                "SUGGEST_FETCH_TIMEOUT_MS",
                defaults.fetch_timeout.as_millis() as u64,
            )?),
        })
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Export every regular file in `folder` as an env var named after the file,
/// unless the variable is already set.
fn load_env_folder(folder: &str) {
    let path = std::path::Path::new(folder);
    if !path.is_dir() {
        return;
    }

    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Failed to read FFOLDER {}: {}", folder, err);
            return;
        }
    };

    for entry in entries.flatten() {
        let fpath = entry.path();
        if !fpath.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if std::env::var(&name).is_ok() {
            continue;
        }
        if let Ok(contents) = std::fs::read_to_string(&fpath) {
            std::env::set_var(&name, contents.trim());
        }
    }
    info!("Loaded configuration from FFOLDER={}", folder);
}

/// Get required environment variable
fn get_env(key: &'static str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnvVar { var: key })
}

/// Get environment variable with default
fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
/// A value that is set but unparsable is a configuration error.
fn get_env_parsed_or<T>(key: &'static str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| Error::InvalidConfig {
            key,
            message: format!("Invalid value '{}': {}", value, e).into(),
        }),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive parts of URL
fn mask_url(url: &str) -> String {
    let userinfo_start = url.find("://").map(|p| p + 3).unwrap_or(0);
    // Mask password if present
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if colon_pos >= userinfo_start {
                let (before, after) = url.split_at(colon_pos + 1);
                let (_, rest) = after.split_at(at_pos - colon_pos - 1);
                return format!("{}****{}", before, rest);
            }
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://chef@localhost/recipes".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout: Duration::from_secs(30),
                idle_timeout: Duration::from_secs(600),
                max_lifetime: Duration::from_secs(3600),
                statement_cache_size: 100,
                connect_retries: 5,
            },
            api: ApiConfig {
                port: 8000,
                host: "127.0.0.1".to_string(),
                request_timeout: Duration::from_secs(30),
                cors_origins: vec!["*".to_string()],
            },
            suggestions: SuggestionConfig::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_pool_bounds_validated() {
        let mut config = test_config();
        config.database.min_connections = 20;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                ..
            })
        ));
    }

    #[test]
    fn test_suggestion_defaults_must_fit_request_bounds() {
        let mut config = test_config();
        config.suggestions.default_limit = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.suggestions.default_max_missing = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url_hides_password() {
        assert_eq!(
            mask_url("postgres://chef:secret@db:5432/recipes"),
            "postgres://chef:****@db:5432/recipes"
        );
        assert_eq!(
            mask_url("postgres://chef@localhost/recipes"),
            "postgres://chef@localhost/recipes"
        );
    }

    #[test]
    fn test_unparsable_pool_size_is_rejected() {
        std::env::set_var("DB_MAX_CONNECTIONS", "lots");
        let result = DatabaseConfig::from_env();
        std::env::remove_var("DB_MAX_CONNECTIONS");

        assert!(matches!(
            result,
            Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                ..
            })
        ));
    }

    #[test]
    fn test_parsed_env_falls_back_when_unset() {
        let key = "DINNER_TONIGHT_TEST_UNSET_TIMEOUT";
        std::env::remove_var(key);
        assert_eq!(get_env_parsed_or(key, 30u64).unwrap(), 30);

        std::env::set_var(key, " 45 ");
        assert_eq!(get_env_parsed_or(key, 30u64).unwrap(), 45);
        std::env::remove_var(key);
    }
}
