//! OVH Provider
//!
//! OVH publishes hardware specs as marketing text ("Intel Xeon E5-1650v3 -
//! 6 Core CPU", "64 GB DDR4 ECC RAM", "2x 480 GB SSD"). The adapter reads a
//! JSON export of the offer listing and extracts integers with fixed suffix
//! rules, most specific suffix first. A field no rule matches is left out of
//! the record rather than failing the run. The export repeats an offer once
//! per datacenter, so records are folded by SKU.

use domain_catalog::{merge_by_sku, Category, InstanceType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

use super::{CatalogProvider, ProviderError, ProviderResult};
use crate::config::OvhConfig;

/// Offer names starting with this are virtual servers
const VIRTUAL_SERVER_PREFIX: &str = "VPS";

/// A `<number> <suffix>` pattern anchored at the end of the text. The number
/// must not continue a decimal ("1.5 TB" matches nothing).
struct SuffixRule {
    pattern: Regex,
    multiplier: u32,
}

impl SuffixRule {
    fn new(suffix: &str, multiplier: u32) -> Option<Self> {
        let pattern = format!(r"(?i)(?:^|[^\d.,])(\d+)[\s-]*{}\s*$", regex::escape(suffix));
        match Regex::new(&pattern) {
            Ok(pattern) => Some(Self {
                pattern,
                multiplier,
            }),
            Err(e) => {
                warn!(suffix = suffix, error = %e, "Skipping invalid suffix rule");
                None
            }
        }
    }

    fn extract(&self, text: &str) -> Option<u32> {
        let captures = self.pattern.captures(text.trim())?;
        let value: u32 = captures.get(1)?.as_str().parse().ok()?;
        value.checked_mul(self.multiplier)
    }
}

fn rules(table: &[(&str, u32)]) -> Vec<SuffixRule> {
    table
        .iter()
        .filter_map(|(suffix, multiplier)| SuffixRule::new(suffix, *multiplier))
        .collect()
}

static CPU_RULES: Lazy<Vec<SuffixRule>> = Lazy::new(|| {
    rules(&[("Core CPU", 1), ("Cores", 1), ("vCores", 1), ("vCore", 1)])
});

/// Qualitative core counts, used when no explicit count is present
const CPU_KEYWORDS: &[(&str, u32)] = &[("octa", 8), ("hexa", 6), ("quad", 4), ("dual", 2)];

static CPU_KEYWORD_RULES: Lazy<Vec<(Regex, u32)>> = Lazy::new(|| {
    CPU_KEYWORDS
        .iter()
        .filter_map(|(keyword, cores)| match Regex::new(&format!(r"(?i)\b{keyword}\b")) {
            Ok(pattern) => Some((pattern, *cores)),
            Err(e) => {
                warn!(keyword = keyword, error = %e, "Skipping invalid CPU keyword");
                None
            }
        })
        .collect()
});

static RAM_RULES: Lazy<Vec<SuffixRule>> = Lazy::new(|| {
    rules(&[
        ("GB DDR4 ECC RAM", 1),
        ("GB DDR3 ECC RAM", 1),
        ("GB ECC RAM", 1),
        ("GB RAM", 1),
        ("GB", 1),
    ])
});

static DISK_RULES: Lazy<Vec<SuffixRule>> = Lazy::new(|| {
    rules(&[
        ("TB SSD", 1000),
        ("TB HDD", 1000),
        ("TB", 1000),
        ("GB SSD", 1),
        ("GB HDD", 1),
        ("GB NVMe", 1),
        ("GB", 1),
    ])
});

fn first_match(rules: &[SuffixRule], text: &str) -> Option<u32> {
    rules.iter().find_map(|rule| rule.extract(text))
}

/// Core count from a CPU description
pub fn parse_cpu(text: &str) -> Option<u32> {
    if let Some(cores) = first_match(&CPU_RULES, text) {
        return Some(cores);
    }

    CPU_KEYWORD_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, cores)| *cores)
}

/// Memory in GB from a RAM description
pub fn parse_ram(text: &str) -> Option<u32> {
    first_match(&RAM_RULES, text)
}

/// Disk size in GB from a storage description
pub fn parse_disk(text: &str) -> Option<u32> {
    first_match(&DISK_RULES, text)
}

pub fn category_for(name: &str) -> Category {
    let is_virtual = name
        .trim_start()
        .get(..VIRTUAL_SERVER_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(VIRTUAL_SERVER_PREFIX));

    if is_virtual {
        Category::MonthlyVirtualServer
    } else {
        Category::MonthlyDedicatedServer
    }
}

/// One row of the OVH export
#[derive(Debug, Clone, Deserialize)]
pub struct OvhOffer {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub ram: String,
    #[serde(default)]
    pub disk: String,
    #[serde(default)]
    pub region: Option<String>,
}

fn parse_field(sku: &str, field: &'static str, text: &str, parse: fn(&str) -> Option<u32>) -> Option<u32> {
    let value = parse(text);
    if value.is_none() && !text.trim().is_empty() {
        warn!(sku = sku, field = field, text = text, "No parsing rule matched, leaving field out");
    }
    value
}

/// Normalize a single offer
pub fn to_instance_type(offer: &OvhOffer) -> InstanceType {
    let sku = offer.sku.as_str();

    InstanceType::new(sku, offer.name.trim(), category_for(&offer.name))
        .with_cpu(parse_field(sku, "cpu", &offer.cpu, parse_cpu))
        .with_ram(parse_field(sku, "ram", &offer.ram, parse_ram))
        .with_disk(parse_field(sku, "disk", &offer.disk, parse_disk))
        .with_regions(offer.region.iter().map(|r| r.trim()).filter(|r| !r.is_empty()))
}

/// Normalize a full export, folding duplicate SKUs into one record
pub fn normalize(offers: &[OvhOffer]) -> Vec<InstanceType> {
    merge_by_sku(offers.iter().map(to_instance_type))
}

/// OVH Provider
pub struct OvhProvider {
    config: OvhConfig,
}

impl OvhProvider {
    pub fn new(config: OvhConfig) -> Self {
        Self { config }
    }

    fn read_export(&self, path: &Path) -> ProviderResult<Vec<OvhOffer>> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ProviderError::SourceMissing(path.to_path_buf()),
            _ => ProviderError::SourceIo {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        serde_json::from_str(&content)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", path.display(), e)))
    }
}

impl CatalogProvider for OvhProvider {
    fn name(&self) -> &'static str {
        "ovh"
    }

    fn is_configured(&self) -> bool {
        self.config.enabled && self.config.export_path.is_some()
    }

    fn collect_instance_types(
        &self,
        _existing: Vec<InstanceType>,
    ) -> ProviderResult<Vec<InstanceType>> {
        let path = self
            .config
            .export_path
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("OVH_EXPORT_PATH is not set".to_string()))?;

        info!(path = %path.display(), "Reading OVH offer export");
        let offers = self.read_export(path)?;
        let instances = normalize(&offers);

        info!(
            offers = offers.len(),
            instance_types = instances.len(),
            "Normalized OVH offers"
        );
        Ok(instances)
    }
}
