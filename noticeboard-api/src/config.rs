/// Configuration management for the API server
///
/// Configuration is loaded from environment variables (with `.env` support
/// for development).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `SESSION_TTL_SECONDS`: Session lifetime (default: 1209600, two weeks)
/// - `UPLOAD_TMP_DIR`: Staging area for uploaded images (default: static/tmp)
/// - `UPLOAD_DIR`: Permanent storage for uploaded images (default: static/upload)
/// - `REDIS_URL`: consumed by the shared Redis client, see
///   `noticeboard_shared::redis::RedisConfig`

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Session configuration
    pub session: SessionConfig,

    /// Upload directory configuration
    pub uploads: UploadConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds a session survives without being saved again
    pub ttl_seconds: u64,
}

/// Upload directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Staging area; files land here between stage and confirm
    pub tmp_dir: PathBuf,

    /// Permanent storage; files are promoted here on commit
    pub upload_dir: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or unparseable.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let ttl_seconds = env::var("SESSION_TTL_SECONDS")
            .unwrap_or_else(|_| "1209600".to_string())
            .parse::<u64>()?;

        let tmp_dir = env::var("UPLOAD_TMP_DIR").unwrap_or_else(|_| "static/tmp".to_string());
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "static/upload".to_string());

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            session: SessionConfig { ttl_seconds },
            uploads: UploadConfig {
                tmp_dir: PathBuf::from(tmp_dir),
                upload_dir: PathBuf::from(upload_dir),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
