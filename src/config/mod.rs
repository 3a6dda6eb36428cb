//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite database path, or a `sqlite:` URL
    pub database_path: String,

    /// JWT secret for token verification
    pub jwt_secret: String,

    /// Cron expression (with seconds) for the scheduled sweep
    pub sweep_schedule: String,

    /// Run one sweep as soon as the server starts
    pub sweep_on_startup: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Prefer DATABASE_PATH, fall back to DATABASE_URL
        let database_path = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "./data/stale-sweep.db".to_string());

        // In production JWT_SECRET should be set explicitly
        let jwt_secret = env::var("JWT_SECRET")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| {
                use std::collections::hash_map::DefaultHasher;
                use std::hash::{Hash, Hasher};
                let mut hasher = DefaultHasher::new();
                std::time::SystemTime::now().hash(&mut hasher);
                format!("dev-secret-{}", hasher.finish())
            });

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "8097".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_path,

            jwt_secret,

            sweep_schedule: env::var("SWEEP_SCHEDULE")
                .unwrap_or_else(|_| "0 0 3 * * *".to_string()),

            sweep_on_startup: env::var("SWEEP_ON_STARTUP")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
