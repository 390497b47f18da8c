use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub hierarchy: HierarchyConfig,
    pub pace: PaceConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

/// Tunables for the invitation lifecycle and contract-level ladder.
#[derive(Debug, Clone, Deserialize)]
pub struct HierarchyConfig {
    /// Days before a pending invitation expires.
    pub invitation_expiry_days: i64,
    /// Contract level assumed when an agent has none set ("street" level).
    pub default_contract_level: i32,
}

/// Thresholds for the pace status band, as percentages of target.
#[derive(Debug, Clone, Deserialize)]
pub struct PaceConfig {
    pub ahead_threshold_pct: f64,
    pub behind_threshold_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Determine environment
        let environment =
            env::var("AGENCY_TRACKER_ENV").unwrap_or_else(|_| "development".to_string());

        // Build configuration
        let config = config::Config::builder()
            // Start with default config
            .add_source(config::File::with_name("config/default"))
            // Add environment-specific config
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            // Add environment variables with prefix AGENCY_TRACKER
            // e.g., AGENCY_TRACKER__SERVER__PORT=8080
            .add_source(
                config::Environment::with_prefix("AGENCY_TRACKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        // Deserialize into our Config struct
        config
            .try_deserialize()
            .map_err(|e| AppError::Configuration(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration("Invalid port number".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(AppError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if self.hierarchy.invitation_expiry_days <= 0 {
            return Err(AppError::Configuration(
                "Invitation expiry must be at least one day".to_string(),
            ));
        }

        if crate::commissions::overrides::ContractLevel::new(self.hierarchy.default_contract_level)
            .is_err()
        {
            return Err(AppError::Configuration(
                "Default contract level must sit on the contract ladder".to_string(),
            ));
        }

        // The band must be symmetric-ish: behind below 100, ahead above 100
        if self.pace.behind_threshold_pct >= 100.0 || self.pace.ahead_threshold_pct <= 100.0 {
            return Err(AppError::Configuration(
                "Pace thresholds must bracket 100%".to_string(),
            ));
        }

        Ok(())
    }
}
