//! Vultr Provider
//!
//! Fetches the public plan list and reconciles it with the instance types the
//! catalog already stores: plans that disappeared are deprecated, new plans
//! are appended.

use domain_catalog::{reconcile, Category, InstanceType};
use indexmap::IndexMap;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use super::{CatalogProvider, ProviderError, ProviderResult};
use crate::config::VultrConfig;

const MIB_PER_GIB: u64 = 1024;

/// Plan type of bare-metal plans
const DEDICATED_PLAN_TYPE: &str = "DEDICATED";

/// The plan list reports numbers either as JSON numbers or as strings
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

impl NumberOrString {
    fn into_u64(self) -> Result<u64, String> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| format!("expected an integer, got '{text}'")),
        }
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?
        .into_u64()
        .map_err(serde::de::Error::custom)
}

fn lenient_locations<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<NumberOrString>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|location| match location {
            NumberOrString::Number(n) => n.to_string(),
            NumberOrString::Text(text) => text,
        })
        .collect())
}

/// One entry of the plan list, keyed by plan id in the response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VultrPlan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plan_type: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub vcpu_count: u64,
    /// Memory in MiB
    #[serde(deserialize_with = "lenient_u64")]
    pub ram: u64,
    /// Disk in GB
    #[serde(deserialize_with = "lenient_u64")]
    pub disk: u64,
    #[serde(default, deserialize_with = "lenient_locations")]
    pub available_locations: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
}

fn to_u32(sku: &str, field: &str, value: u64) -> ProviderResult<u32> {
    u32::try_from(value)
        .map_err(|_| ProviderError::ParseError(format!("plan {sku}: {field} {value} out of range")))
}

/// Normalize a plan; `None` for plans with less than one whole GB of memory
pub fn to_instance_type(sku: &str, plan: &VultrPlan) -> ProviderResult<Option<InstanceType>> {
    let ram_gb = plan.ram / MIB_PER_GIB;
    if ram_gb == 0 {
        debug!(sku = sku, ram_mib = plan.ram, "Dropping plan below 1 GB of memory");
        return Ok(None);
    }

    let category = if plan.plan_type.eq_ignore_ascii_case(DEDICATED_PLAN_TYPE) {
        Category::HourlyDedicatedServer
    } else {
        Category::HourlyVirtualServer
    };

    let instance = InstanceType::new(sku, plan.name.clone(), category)
        .with_cpu(Some(to_u32(sku, "vcpu_count", plan.vcpu_count)?))
        .with_ram(Some(to_u32(sku, "ram", ram_gb)?))
        .with_disk(Some(to_u32(sku, "disk", plan.disk)?))
        .with_regions(plan.available_locations.iter().cloned())
        .with_deprecated(plan.deprecated);

    Ok(Some(instance))
}

/// Source of the current plan list
#[cfg_attr(test, mockall::automock)]
pub trait PlanSource {
    /// Plan id → plan, in response order
    fn fetch_plans(&self) -> ProviderResult<IndexMap<String, VultrPlan>>;
}

/// Plan list fetched over HTTP
pub struct HttpPlanSource {
    client: Client,
    url: String,
}

impl HttpPlanSource {
    pub fn new(url: impl Into<String>) -> ProviderResult<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl PlanSource for HttpPlanSource {
    fn fetch_plans(&self) -> ProviderResult<IndexMap<String, VultrPlan>> {
        info!(url = %self.url, "Fetching Vultr plan list");

        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::ApiError(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

/// Vultr Provider
pub struct VultrProvider<S = HttpPlanSource> {
    config: VultrConfig,
    source: S,
}

impl VultrProvider<HttpPlanSource> {
    pub fn new(config: VultrConfig) -> ProviderResult<Self> {
        let source = HttpPlanSource::new(config.plans_url.clone())?;
        Ok(Self::with_source(config, source))
    }
}

impl<S: PlanSource> VultrProvider<S> {
    pub fn with_source(config: VultrConfig, source: S) -> Self {
        Self { config, source }
    }

    /// Current plans as instance types keyed by SKU, deprecation flags included
    fn remote_instance_types(&self) -> ProviderResult<IndexMap<String, InstanceType>> {
        let plans = self.source.fetch_plans()?;

        let mut remote = IndexMap::with_capacity(plans.len());
        for (sku, plan) in &plans {
            if let Some(instance) = to_instance_type(sku, plan)? {
                remote.insert(sku.clone(), instance);
            }
        }

        debug!(plans = plans.len(), usable = remote.len(), "Normalized Vultr plans");
        Ok(remote)
    }
}

impl<S: PlanSource> CatalogProvider for VultrProvider<S> {
    fn name(&self) -> &'static str {
        "vultr"
    }

    fn is_configured(&self) -> bool {
        self.config.enabled
    }

    fn collect_instance_types(
        &self,
        existing: Vec<InstanceType>,
    ) -> ProviderResult<Vec<InstanceType>> {
        let remote = self.remote_instance_types()?;
        Ok(reconcile(existing, remote))
    }
}
