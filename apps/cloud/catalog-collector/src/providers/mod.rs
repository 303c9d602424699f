//! Provider adapters
//!
//! Each adapter turns one vendor's listing into normalized instance types:
//! SoftLayer from a fixed tier table, OVH from a free-text export, Vultr from
//! its live plan list reconciled against what the catalog already holds.
//! Vendor-specific parsing stays inside the adapter so a format change at one
//! vendor cannot break the others.

pub mod ovh;
pub mod softlayer;
pub mod vultr;

use domain_catalog::InstanceType;
use std::path::PathBuf;
use thiserror::Error;

pub use ovh::OvhProvider;
pub use softlayer::SoftLayerProvider;
pub use vultr::VultrProvider;

/// Error type for provider adapter operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Provider source not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Failed to read provider source {}: {source}", path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for provider adapters
pub trait CatalogProvider {
    /// Provider key in the catalog document
    fn name(&self) -> &'static str;

    /// Check if the adapter is enabled and has what it needs to run
    fn is_configured(&self) -> bool;

    /// Produce the provider's full instance type listing.
    ///
    /// `existing` is what the catalog currently stores for this provider;
    /// adapters that rebuild their listing from scratch ignore it.
    fn collect_instance_types(
        &self,
        existing: Vec<InstanceType>,
    ) -> ProviderResult<Vec<InstanceType>>;
}

/// Registry of all provider adapters
pub struct ProviderRegistry {
    providers: Vec<Box<dyn CatalogProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn register(&mut self, provider: Box<dyn CatalogProvider>) {
        self.providers.push(provider);
    }

    pub fn get_provider(&self, name: &str) -> Option<&dyn CatalogProvider> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .map(|p| p.as_ref())
    }

    pub fn get_configured_providers(&self) -> Vec<&dyn CatalogProvider> {
        self.providers
            .iter()
            .filter(|p| p.is_configured())
            .map(|p| p.as_ref())
            .collect()
    }

    pub fn all_providers(&self) -> &[Box<dyn CatalogProvider>] {
        &self.providers
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
