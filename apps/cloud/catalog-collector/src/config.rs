//! Configuration for the catalog collector

use core_config::{env_flag, env_or_default, env_path, ConfigError, FromEnv};
use std::path::PathBuf;

/// Catalog file used when `CATALOG_PATH` is not set, relative to the repository root
pub const DEFAULT_CATALOG_PATH: &str = "data/files/cloud_provider.json";

/// Vultr plan list endpoint
pub const DEFAULT_VULTR_PLANS_URL: &str = "https://api.vultr.com/v1/plans/list?type=all";

#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog document read and rewritten by every command
    pub catalog_path: PathBuf,
    /// Where to write a Prometheus snapshot after the command, if anywhere
    pub metrics_file: Option<PathBuf>,
    pub vultr: VultrConfig,
    pub ovh: OvhConfig,
    pub softlayer: SoftLayerConfig,
}

#[derive(Debug, Clone)]
pub struct VultrConfig {
    pub plans_url: String,
    pub enabled: bool,
}

impl FromEnv for VultrConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            plans_url: env_or_default("VULTR_PLANS_URL", DEFAULT_VULTR_PLANS_URL),
            enabled: env_flag("VULTR_ENABLED", true)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct OvhConfig {
    /// JSON export of the OVH offer listing
    pub export_path: Option<PathBuf>,
    pub enabled: bool,
}

impl FromEnv for OvhConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            export_path: env_path("OVH_EXPORT_PATH"),
            enabled: env_flag("OVH_ENABLED", true)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SoftLayerConfig {
    pub enabled: bool,
}

impl FromEnv for SoftLayerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: env_flag("SOFTLAYER_ENABLED", true)?,
        })
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            catalog_path: env_path("CATALOG_PATH")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH)),
            metrics_file: env_path("CATALOG_METRICS_FILE"),
            vultr: VultrConfig::from_env()?,
            ovh: OvhConfig::from_env()?,
            softlayer: SoftLayerConfig::from_env()?,
        })
    }
}
