use crate::ledger::LedgerPolicy;
use crate::services::ServiceSettings;
use crate::verification::VerificationSettings;
use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub ledger: LedgerConfig,
    pub verification: VerificationConfig,
    pub shortener: ShortenerConfig,
    pub pagination: PaginationConfig,
    pub public: PublicConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    pub allow_self_edges: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VerificationConfig {
    pub code_length: usize,
    pub ttl_secs: u64,
    pub fixed_code: Option<String>,
    pub sends_per_minute: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShortenerConfig {
    pub endpoint: String,
    pub app_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PublicConfig {
    /// Origin used for share links and `html5` fields
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8090)?
            .set_default("server.workers", 4)?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("auth.jwt_secret", "")?
            .set_default("auth.token_ttl_secs", 7 * 24 * 3600)?
            .set_default("ledger.allow_self_edges", false)?
            .set_default("verification.code_length", 6)?
            .set_default("verification.ttl_secs", 300)?
            .set_default("verification.sends_per_minute", 1)?
            .set_default("shortener.endpoint", "http://api.t.sina.com.cn/short_url/shorten.json")?
            .set_default("shortener.app_key", "")?
            .set_default("shortener.timeout_secs", 5)?
            .set_default("pagination.default_page_size", 10)?
            .set_default("pagination.max_page_size", 300)?
            .set_default("public.base_url", "http://localhost:8090")?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("ADVISORY_API")
                .separator("__")
                .list_separator(","),
        );

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(redis_url) = env::var("REDIS_URL") {
            builder = builder.set_override("redis.url", redis_url)?;
        }

        if let Ok(secret) = env::var("JWT_SECRET") {
            builder = builder.set_override("auth.jwt_secret", secret)?;
        }

        if let Ok(port) = env::var("ADVISORY_API_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if self.redis.url.is_empty() {
            return Err("Redis URL is required".to_string());
        }

        if self.auth.jwt_secret.len() < 16 {
            return Err("JWT secret must be at least 16 bytes".to_string());
        }

        if self.verification.code_length == 0 {
            return Err("Verification code length cannot be 0".to_string());
        }

        if self.pagination.default_page_size == 0
            || self.pagination.default_page_size > self.pagination.max_page_size
        {
            return Err("Default page size must be between 1 and max_page_size".to_string());
        }

        Ok(())
    }

    pub fn verification_settings(&self) -> VerificationSettings {
        VerificationSettings {
            code_length: self.verification.code_length,
            ttl_secs: self.verification.ttl_secs,
            fixed_code: self.verification.fixed_code.clone().filter(|c| !c.is_empty()),
            sends_per_minute: self.verification.sends_per_minute,
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            policy: LedgerPolicy {
                allow_self_edges: self.ledger.allow_self_edges,
            },
            default_page_size: self.pagination.default_page_size,
            max_page_size: self.pagination.max_page_size,
            public_base_url: self.public.base_url.clone(),
        }
    }
}
