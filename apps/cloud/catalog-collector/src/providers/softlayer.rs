//! SoftLayer Provider
//!
//! SoftLayer virtual servers are sold as any combination of a CPU tier and a
//! memory size allowed for that tier, so the listing is generated rather than
//! fetched.

use domain_catalog::{Category, InstanceType};
use indexmap::IndexMap;
use pluralizer::pluralize;
use tracing::info;

use super::{CatalogProvider, ProviderResult};
use crate::config::SoftLayerConfig;

/// CPU count → memory sizes (GB) offered with it
const DEFAULT_TIERS: &[(u32, &[u32])] = &[
    (1, &[1, 2, 4, 8]),
    (2, &[2, 4, 8, 16]),
    (4, &[4, 8, 16, 32]),
    (8, &[8, 16, 32, 64]),
    (16, &[16, 32, 64]),
];

/// SoftLayer Provider
pub struct SoftLayerProvider {
    config: SoftLayerConfig,
    tiers: IndexMap<u32, Vec<u32>>,
}

impl SoftLayerProvider {
    pub fn new(config: SoftLayerConfig) -> Self {
        let tiers = DEFAULT_TIERS
            .iter()
            .map(|(cpu, memory)| (*cpu, memory.to_vec()))
            .collect();
        Self::with_tiers(config, tiers)
    }

    pub fn with_tiers(config: SoftLayerConfig, tiers: IndexMap<u32, Vec<u32>>) -> Self {
        Self { config, tiers }
    }
}

/// One instance type per (cpu, ram) pair, CPU tier first, memory second
pub fn generate_instance_types(tiers: &IndexMap<u32, Vec<u32>>) -> Vec<InstanceType> {
    tiers
        .iter()
        .flat_map(|(&cpu, memory)| memory.iter().map(move |&ram| (cpu, ram)))
        .map(|(cpu, ram)| {
            let description = format!("{}, {} GB RAM", pluralize("core", cpu as isize, true), ram);
            InstanceType::new(format!("{cpu}c{ram}m"), description, Category::HourlyVirtualServer)
                .with_cpu(Some(cpu))
                .with_ram(Some(ram))
        })
        .collect()
}

impl CatalogProvider for SoftLayerProvider {
    fn name(&self) -> &'static str {
        "softlayer"
    }

    fn is_configured(&self) -> bool {
        self.config.enabled
    }

    fn collect_instance_types(
        &self,
        _existing: Vec<InstanceType>,
    ) -> ProviderResult<Vec<InstanceType>> {
        let instances = generate_instance_types(&self.tiers);
        info!(count = instances.len(), "Generated SoftLayer instance types");
        Ok(instances)
    }
}
