//! Catalog Collector Service
//!
//! Runs the provider adapters against the catalog file. One `collect` call is
//! one load → adapt → save cycle; if any selected adapter fails nothing is
//! written.

use domain_catalog::{CatalogDocument, CatalogStore, ReconcileSummary, VersionTimelines};
use eyre::{eyre, Result, WrapErr};
use indexmap::IndexMap;
use observability::{CatalogMetrics, OperationTimer};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::providers::{
    CatalogProvider, OvhProvider, ProviderError, ProviderRegistry, SoftLayerProvider,
    VultrProvider,
};

/// Result of a collection run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionResult {
    pub providers_collected: Vec<String>,
    pub instance_types: usize,
    pub changes: IndexMap<String, ReconcileSummary>,
    pub duration_ms: u64,
}

/// Catalog summary printed by `status`
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatus {
    pub path: String,
    pub providers: IndexMap<String, ProviderStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// `None` when no adapter exists for this provider
    pub adapter_configured: Option<bool>,
    pub instance_types: usize,
    pub deprecated_instance_types: usize,
    pub environments: IndexMap<String, TimelineStatus>,
    pub db: IndexMap<String, IndexMap<String, TimelineStatus>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineStatus {
    pub versions: usize,
    pub deprecated: usize,
    pub latest: Option<String>,
}

fn timeline_statuses(timelines: &VersionTimelines) -> IndexMap<String, TimelineStatus> {
    timelines
        .versions_by_env
        .iter()
        .map(|(env, versions)| {
            let status = TimelineStatus {
                versions: versions.len(),
                deprecated: versions.iter().filter(|v| v.deprecated).count(),
                latest: versions.last().map(|v| v.version.clone()),
            };
            (env.clone(), status)
        })
        .collect()
}

/// Main catalog collector service
pub struct CatalogCollector {
    store: CatalogStore,
    registry: ProviderRegistry,
}

impl CatalogCollector {
    pub fn new(config: &Config) -> Result<Self> {
        let mut registry = ProviderRegistry::new();

        registry.register(Box::new(SoftLayerProvider::new(config.softlayer.clone())));
        registry.register(Box::new(OvhProvider::new(config.ovh.clone())));
        registry.register(Box::new(
            VultrProvider::new(config.vultr.clone()).wrap_err("Failed to build Vultr client")?,
        ));

        Ok(Self::with_registry(
            CatalogStore::new(config.catalog_path.clone()),
            registry,
        ))
    }

    pub fn with_registry(store: CatalogStore, registry: ProviderRegistry) -> Self {
        Self { store, registry }
    }

    /// Adapters to run: every configured one, or exactly the requested ones
    fn select(&self, names: Option<&[String]>) -> Result<Vec<&dyn CatalogProvider>> {
        let Some(names) = names else {
            return Ok(self.registry.get_configured_providers());
        };

        let mut selected: Vec<&dyn CatalogProvider> = Vec::with_capacity(names.len());
        for name in names {
            let provider = self
                .registry
                .get_provider(name.trim())
                .ok_or_else(|| eyre!("Unknown provider '{}'", name.trim()))?;

            if !provider.is_configured() {
                return Err(ProviderError::NotConfigured(provider.name().to_string()).into());
            }

            if !selected.iter().any(|p| p.name() == provider.name()) {
                selected.push(provider);
            }
        }

        Ok(selected)
    }

    /// Run the adapters and commit every listing in one write
    pub fn collect(&self, providers: Option<&[String]>) -> Result<CollectionResult> {
        let selected = self.select(providers)?;
        if selected.is_empty() {
            warn!("No provider adapters configured, nothing to collect");
            return Ok(CollectionResult::default());
        }

        let mut timer = OperationTimer::new("collect");

        let changes = self.store.update(|document: &mut CatalogDocument| -> Result<_> {
            let mut changes = IndexMap::with_capacity(selected.len());

            for provider in &selected {
                let name = provider.name();
                info!(provider = name, "Collecting instance types");

                let entry = document.provider_or_insert(name);
                let before = entry.instance_types.clone();

                let after = match provider.collect_instance_types(before.clone()) {
                    Ok(instances) => instances,
                    Err(e) => {
                        error!(provider = name, error = %e, "Provider adapter failed");
                        CatalogMetrics::record_sync_failed(name);
                        return Err(eyre::Report::new(e)
                            .wrap_err(format!("Collecting instance types from {name} failed")));
                    }
                };

                let summary = ReconcileSummary::between(&before, &after);
                info!(
                    provider = name,
                    total = summary.total,
                    added = summary.added,
                    deprecated = summary.deprecated,
                    revived = summary.revived,
                    removed = summary.removed,
                    "Collected instance types"
                );

                entry.instance_types = after;
                changes.insert(name.to_string(), summary);
            }

            Ok(changes)
        })?;

        for (provider, summary) in &changes {
            CatalogMetrics::record_sync_completed(provider, summary.total);
            CatalogMetrics::record_instance_changes(provider, "added", summary.added);
            CatalogMetrics::record_instance_changes(provider, "deprecated", summary.deprecated);
            CatalogMetrics::record_instance_changes(provider, "revived", summary.revived);
            CatalogMetrics::record_instance_changes(provider, "removed", summary.removed);
        }

        Ok(CollectionResult {
            providers_collected: changes.keys().cloned().collect(),
            instance_types: changes.values().map(|summary| summary.total).sum(),
            changes,
            duration_ms: timer.stop(),
        })
    }

    /// Summarize the catalog without modifying it
    pub fn status(&self) -> Result<CatalogStatus> {
        let document = self
            .store
            .load()
            .wrap_err("Failed to load catalog")?;

        let providers = document
            .providers()
            .map(|(name, entry)| {
                let status = ProviderStatus {
                    adapter_configured: self.registry.get_provider(name).map(|p| p.is_configured()),
                    instance_types: entry.instance_types.len(),
                    deprecated_instance_types: entry
                        .instance_types
                        .iter()
                        .filter(|it| it.deprecated)
                        .count(),
                    environments: entry
                        .kubernetes
                        .as_ref()
                        .map(timeline_statuses)
                        .unwrap_or_default(),
                    db: entry
                        .db
                        .iter()
                        .flatten()
                        .map(|(engine, timelines)| (engine.clone(), timeline_statuses(timelines)))
                        .collect(),
                };
                (name.clone(), status)
            })
            .collect();

        Ok(CatalogStatus {
            path: self.store.path().display().to_string(),
            providers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderResult;
    use domain_catalog::{Category, InstanceType, KubeVersion, ProviderEntry, VersionLifecycle};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    enum Behaviour {
        Replace(Vec<&'static str>),
        DeprecateAll,
        Fail,
    }

    struct FakeProvider {
        name: &'static str,
        configured: bool,
        behaviour: Behaviour,
    }

    impl CatalogProvider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn collect_instance_types(
            &self,
            existing: Vec<InstanceType>,
        ) -> ProviderResult<Vec<InstanceType>> {
            match &self.behaviour {
                Behaviour::Replace(skus) => Ok(skus.iter().map(|sku| instance(sku)).collect()),
                Behaviour::DeprecateAll => Ok(existing
                    .into_iter()
                    .map(|it| it.with_deprecated(true))
                    .collect()),
                Behaviour::Fail => Err(ProviderError::ApiError("503".to_string())),
            }
        }
    }

    fn instance(sku: &str) -> InstanceType {
        InstanceType::new(sku, sku, Category::HourlyVirtualServer)
    }

    fn fake(name: &'static str, configured: bool, behaviour: Behaviour) -> Box<dyn CatalogProvider> {
        Box::new(FakeProvider {
            name,
            configured,
            behaviour,
        })
    }

    const CATALOG: &str = r#"{
  "vultr": {
    "instance_types": [
      {
        "external_sku": "201",
        "description": "201",
        "category": "Hourly Virtual Server"
      }
    ],
    "kubernetes": {
      "versions_by_env": {
        "prod": [
          {
            "version": "1.6.4",
            "description": "1.6.4",
            "apps": {},
            "deprecated": true
          },
          {
            "version": "1.7.0",
            "description": "1.7.0",
            "apps": {}
          }
        ]
      }
    },
    "credentials_file": "vultr.key"
  }
}
"#;

    fn catalog_dir() -> (TempDir, CatalogStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cloud_provider.json");
        fs::write(&path, CATALOG).unwrap();
        let store = CatalogStore::new(path);
        (dir, store)
    }

    fn collector(store: CatalogStore, providers: Vec<Box<dyn CatalogProvider>>) -> CatalogCollector {
        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(provider);
        }
        CatalogCollector::with_registry(store, registry)
    }

    #[test]
    fn test_collect_commits_every_configured_provider() {
        let (_dir, store) = catalog_dir();
        let collector = collector(
            store.clone(),
            vec![
                fake("vultr", true, Behaviour::DeprecateAll),
                fake("softlayer", true, Behaviour::Replace(vec!["1c1m", "1c2m"])),
                fake("ovh", false, Behaviour::Fail),
            ],
        );

        let result = collector.collect(None).unwrap();

        assert_eq!(result.providers_collected, vec!["vultr", "softlayer"]);
        assert_eq!(result.instance_types, 3);
        assert_eq!(result.changes["vultr"].deprecated, 1);
        assert_eq!(result.changes["softlayer"].added, 2);

        let document = store.load().unwrap();
        let vultr = document.provider("vultr").unwrap();
        assert!(vultr.instance_types[0].deprecated);
        assert!(vultr.kubernetes.is_some());
        assert_eq!(vultr.extra["credentials_file"], "vultr.key");
        let softlayer = document.provider("softlayer").unwrap();
        assert_eq!(softlayer.instance_types.len(), 2);
        assert!(document.provider("ovh").is_none());
    }

    #[test]
    fn test_failed_provider_leaves_catalog_untouched() {
        let (_dir, store) = catalog_dir();
        let collector = collector(
            store.clone(),
            vec![
                fake("softlayer", true, Behaviour::Replace(vec!["1c1m"])),
                fake("vultr", true, Behaviour::Fail),
            ],
        );

        let err = collector.collect(None).unwrap_err();

        assert!(err.to_string().contains("vultr"));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), CATALOG);
    }

    #[test]
    fn test_collect_only_requested_providers() {
        let (_dir, store) = catalog_dir();
        let collector = collector(
            store.clone(),
            vec![
                fake("vultr", true, Behaviour::Fail),
                fake("softlayer", true, Behaviour::Replace(vec!["2c4m"])),
            ],
        );

        let requested = vec!["SoftLayer".to_string(), "softlayer".to_string()];
        let result = collector.collect(Some(&requested)).unwrap();

        assert_eq!(result.providers_collected, vec!["softlayer"]);
        let document = store.load().unwrap();
        assert_eq!(document.provider("vultr").unwrap().instance_types.len(), 1);
    }

    #[test]
    fn test_collect_rejects_unknown_or_unconfigured_provider() {
        let (_dir, store) = catalog_dir();
        let collector = collector(store.clone(), vec![fake("ovh", false, Behaviour::Fail)]);

        let unknown = collector.collect(Some(&["linode".to_string()])).unwrap_err();
        assert!(unknown.to_string().contains("linode"));

        let unconfigured = collector.collect(Some(&["ovh".to_string()])).unwrap_err();
        assert!(matches!(
            unconfigured.downcast_ref::<ProviderError>(),
            Some(ProviderError::NotConfigured(_))
        ));

        assert_eq!(fs::read_to_string(store.path()).unwrap(), CATALOG);
    }

    #[test]
    fn test_collect_without_adapters_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("cloud_provider.json"));
        let collector = collector(store.clone(), vec![fake("ovh", false, Behaviour::Fail)]);

        let result = collector.collect(None).unwrap();

        assert!(result.providers_collected.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_lifecycle_operations_accept_providers_created_by_collect() {
        let dir = tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("cloud_provider.json"));
        let collector = collector(
            store.clone(),
            vec![fake("softlayer", true, Behaviour::Replace(vec!["1c1m"]))],
        );
        collector.collect(None).unwrap();

        let lifecycle = VersionLifecycle::new(store.clone());
        let version = KubeVersion::new("1.7.0", None, IndexMap::new()).unwrap();
        assert_eq!(lifecycle.add(&version).unwrap(), 0);
        assert_eq!(lifecycle.release(&version).unwrap(), 1);
        assert_eq!(lifecycle.backfill_environment("onebox").unwrap(), 1);
        assert_eq!(lifecycle.deprecate("1.7.0").unwrap(), 2);

        let document = store.load().unwrap();
        let softlayer = document.provider("softlayer").unwrap();
        assert_eq!(softlayer.instance_types.len(), 1);
        let kubernetes = softlayer.kubernetes.as_ref().unwrap();
        assert!(kubernetes.environment("prod").unwrap()[0].deprecated);
        assert!(kubernetes.environment("onebox").unwrap()[0].deprecated);
    }

    #[test]
    fn test_status_summarizes_catalog() {
        let (_dir, store) = catalog_dir();
        let mut document = store.load().unwrap();
        let mut db = ProviderEntry::default();
        db.db = Some(IndexMap::from([(
            "postgres".to_string(),
            VersionTimelines {
                versions_by_env: IndexMap::from([(
                    "prod".to_string(),
                    vec![KubeVersion::new("9.6", None, IndexMap::new()).unwrap()],
                )]),
                ..Default::default()
            },
        )]));
        document.insert("softlayer", db);
        store.save(&document).unwrap();

        let collector = collector(store, vec![fake("vultr", true, Behaviour::Fail)]);
        let status = collector.status().unwrap();

        let vultr = &status.providers["vultr"];
        assert_eq!(vultr.adapter_configured, Some(true));
        assert_eq!(vultr.instance_types, 1);
        assert_eq!(vultr.deprecated_instance_types, 0);
        assert_eq!(
            vultr.environments["prod"],
            TimelineStatus {
                versions: 2,
                deprecated: 1,
                latest: Some("1.7.0".to_string()),
            }
        );

        let softlayer = &status.providers["softlayer"];
        assert_eq!(softlayer.adapter_configured, None);
        assert!(softlayer.environments.is_empty());
        assert_eq!(softlayer.db["postgres"]["prod"].versions, 1);
    }
}
