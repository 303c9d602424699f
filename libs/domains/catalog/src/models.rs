use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use strum::{AsRefStr, Display, EnumString};

use crate::error::{CatalogError, CatalogResult};

/// Production environment name
pub const PROD_ENV: &str = "prod";

/// Staging environment seeded once from production
pub const ONEBOX_ENV: &str = "onebox";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Key the provider map sits under in catalog files that wrap it
pub const PROVIDERS_KEY: &str = "cloud_provider";

/// The whole catalog: provider name → provider entry.
///
/// A document loaded from a file remembers the file's JSON layout. On save
/// every object keeps the key order it had on disk, new keys go last, and the
/// provider map goes back under [`PROVIDERS_KEY`] when it came from there.
/// Documents built in memory are written wrapped.
#[derive(Debug, Clone, Default)]
pub struct CatalogDocument {
    providers: IndexMap<String, ProviderEntry>,
    layout: Option<Value>,
}

impl PartialEq for CatalogDocument {
    fn eq(&self, other: &Self) -> bool {
        self.providers == other.providers
    }
}

impl CatalogDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a document from the raw file content, wrapped or bare
    pub fn from_value(root: Value) -> serde_json::Result<Self> {
        let providers = match root.get(PROVIDERS_KEY) {
            Some(wrapped @ Value::Object(_)) => serde_json::from_value(wrapped.clone())?,
            _ => serde_json::from_value(root.clone())?,
        };

        Ok(Self {
            providers,
            layout: Some(root),
        })
    }

    /// The JSON to write back, laid out like the file it was loaded from
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let providers = serde_json::to_value(&self.providers)?;

        let Some(layout) = &self.layout else {
            let mut root = Map::new();
            root.insert(PROVIDERS_KEY.to_string(), providers);
            return Ok(Value::Object(root));
        };

        let fresh = if self.is_wrapped() {
            let mut root = layout.clone();
            if let Some(slot) = root.get_mut(PROVIDERS_KEY) {
                *slot = providers;
            }
            root
        } else {
            providers
        };

        Ok(overlay(layout, fresh))
    }

    /// Whether the provider map is written under [`PROVIDERS_KEY`]
    pub fn is_wrapped(&self) -> bool {
        match &self.layout {
            Some(root) => matches!(root.get(PROVIDERS_KEY), Some(Value::Object(_))),
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.get(name)
    }

    pub fn provider_mut(&mut self, name: &str) -> Option<&mut ProviderEntry> {
        self.providers.get_mut(name)
    }

    /// Look up a provider that an operation requires to exist
    pub fn require_provider_mut(&mut self, name: &str) -> CatalogResult<&mut ProviderEntry> {
        self.providers
            .get_mut(name)
            .ok_or_else(|| CatalogError::NotFound(format!("provider '{name}'")))
    }

    /// Get a provider entry, appending [`ProviderEntry::new`] at the end if
    /// the provider is new
    pub fn provider_or_insert(&mut self, name: &str) -> &mut ProviderEntry {
        self.providers
            .entry(name.to_string())
            .or_insert_with(ProviderEntry::new)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ProviderEntry) -> Option<ProviderEntry> {
        self.providers.insert(name.into(), entry)
    }

    pub fn providers(&self) -> impl Iterator<Item = (&String, &ProviderEntry)> {
        self.providers.iter()
    }

    pub fn providers_mut(&mut self) -> impl Iterator<Item = (&String, &mut ProviderEntry)> {
        self.providers.iter_mut()
    }
}

impl Serialize for CatalogDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CatalogDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let root = Value::deserialize(deserializer)?;
        Self::from_value(root).map_err(serde::de::Error::custom)
    }
}

/// `fresh` with the object key order of `layout` wherever the two line up.
///
/// Values always come from `fresh`. Keys missing from `fresh` are dropped,
/// keys missing from `layout` follow in their `fresh` order. Arrays line up
/// by index.
fn overlay(layout: &Value, fresh: Value) -> Value {
    match (layout, fresh) {
        (Value::Object(old), Value::Object(mut new)) => {
            let mut merged = Map::with_capacity(new.len());
            for (key, old_value) in old {
                if let Some(new_value) = new.get_mut(key) {
                    merged.insert(key.clone(), overlay(old_value, new_value.take()));
                }
            }
            for (key, new_value) in new {
                if !old.contains_key(&key) {
                    merged.insert(key, new_value);
                }
            }
            Value::Object(merged)
        }
        (Value::Array(old), Value::Array(new)) => Value::Array(
            new.into_iter()
                .enumerate()
                .map(|(index, new_value)| match old.get(index) {
                    Some(old_value) => overlay(old_value, new_value),
                    None => new_value,
                })
                .collect(),
        ),
        (_, fresh) => fresh,
    }
}

/// Everything the catalog knows about one cloud provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub instance_types: Vec<InstanceType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<VersionTimelines>,

    /// Database engine name → version timelines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<IndexMap<String, VersionTimelines>>,

    /// Keys this crate does not model (credentials, regions, ...), kept verbatim
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ProviderEntry {
    /// An entry with an empty production timeline, so lifecycle operations
    /// accept it right away
    pub fn new() -> Self {
        Self {
            kubernetes: Some(VersionTimelines {
                versions_by_env: IndexMap::from([(PROD_ENV.to_string(), Vec::new())]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn find_instance_type(&self, sku: &str) -> Option<&InstanceType> {
        self.instance_types.iter().find(|it| it.external_sku == sku)
    }
}

/// Per-environment version timelines, oldest first. Entries are only ever
/// appended or flagged deprecated, never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionTimelines {
    #[serde(default)]
    pub versions_by_env: IndexMap<String, Vec<KubeVersion>>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl VersionTimelines {
    pub fn environment(&self, env: &str) -> Option<&[KubeVersion]> {
        self.versions_by_env.get(env).map(Vec::as_slice)
    }

    pub fn has_environment(&self, env: &str) -> bool {
        self.versions_by_env.contains_key(env)
    }
}

/// A sellable instance / plan of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    /// Unique within a provider
    pub external_sku: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,

    /// Core count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,

    /// Memory in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<u32>,

    /// Disk in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<u32>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub regions: BTreeSet<String>,

    /// Vendor fields this crate does not model (prices, zones, ...)
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl InstanceType {
    pub fn new(
        external_sku: impl Into<String>,
        description: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            external_sku: external_sku.into(),
            description: description.into(),
            category: category.to_string(),
            cpu: None,
            ram: None,
            disk: None,
            deprecated: false,
            regions: BTreeSet::new(),
            extra: IndexMap::new(),
        }
    }

    pub fn with_cpu(mut self, cpu: Option<u32>) -> Self {
        self.cpu = cpu;
        self
    }

    pub fn with_ram(mut self, ram: Option<u32>) -> Self {
        self.ram = ram;
        self
    }

    pub fn with_disk(mut self, disk: Option<u32>) -> Self {
        self.disk = disk;
        self
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions.extend(regions.into_iter().map(Into::into));
        self
    }

    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }
}

/// Billing / hardware class of an instance type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum Category {
    #[strum(serialize = "Hourly Virtual Server")]
    HourlyVirtualServer,
    #[strum(serialize = "Hourly Dedicated Server")]
    HourlyDedicatedServer,
    #[strum(serialize = "Monthly Virtual Server")]
    MonthlyVirtualServer,
    #[strum(serialize = "Monthly Dedicated Server")]
    MonthlyDedicatedServer,
}

/// One Kubernetes (or database) release in an environment timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeVersion {
    pub version: String,

    #[serde(default)]
    pub description: String,

    /// Component name → component version
    #[serde(default)]
    pub apps: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl KubeVersion {
    /// Build a version entry; the description defaults to the version string
    pub fn new(
        version: impl Into<String>,
        description: Option<String>,
        apps: IndexMap<String, String>,
    ) -> CatalogResult<Self> {
        let version = version.into().trim().to_string();
        if version.is_empty() {
            return Err(CatalogError::InvalidInput(
                "version must not be empty".to_string(),
            ));
        }

        Ok(Self {
            description: description.unwrap_or_else(|| version.clone()),
            version,
            apps,
            deprecated: false,
            extra: IndexMap::new(),
        })
    }
}
