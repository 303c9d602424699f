//! Version lifecycle: staging, releasing, deprecating and backfilling
//! Kubernetes versions across the environments of every provider.

use strum::{AsRefStr, Display};
use tracing::{info, instrument, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogDocument, KubeVersion, VersionTimelines, PROD_ENV};
use crate::store::CatalogStore;

/// Lifecycle operations, used as log and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleOperation {
    Add,
    Release,
    Deprecate,
    BackfillEnvironment,
}

fn kubernetes_of<'a>(
    provider: &str,
    kubernetes: Option<&'a mut VersionTimelines>,
) -> CatalogResult<&'a mut VersionTimelines> {
    kubernetes.ok_or_else(|| {
        CatalogError::NotFound(format!("kubernetes section of provider '{provider}'"))
    })
}

/// Fail before touching anything if a provider has no kubernetes section, or
/// lacks `env` when one is required.
fn ensure_timelines(document: &CatalogDocument, required_env: Option<&str>) -> CatalogResult<()> {
    for (name, provider) in document.providers() {
        let kubernetes = provider.kubernetes.as_ref().ok_or_else(|| {
            CatalogError::NotFound(format!("kubernetes section of provider '{name}'"))
        })?;

        if let Some(env) = required_env {
            if !kubernetes.has_environment(env) {
                return Err(CatalogError::NotFound(format!(
                    "environment '{env}' of provider '{name}'"
                )));
            }
        }
    }
    Ok(())
}

impl CatalogDocument {
    /// Append `version` to every non-production timeline of every provider.
    ///
    /// Returns the number of timelines appended to.
    pub fn stage_version(&mut self, version: &KubeVersion) -> CatalogResult<usize> {
        ensure_timelines(self, None)?;

        let mut appended = 0;
        for (name, provider) in self.providers_mut() {
            let kubernetes = kubernetes_of(name, provider.kubernetes.as_mut())?;
            for (env, timeline) in kubernetes.versions_by_env.iter_mut() {
                if env == PROD_ENV {
                    continue;
                }
                if timeline.iter().any(|v| v.version == version.version) {
                    warn!(provider = %name, env = %env, version = %version.version, "Version already present in timeline");
                }
                timeline.push(version.clone());
                appended += 1;
            }
        }
        Ok(appended)
    }

    /// Append `version` to the production timeline of every provider.
    pub fn release_version(&mut self, version: &KubeVersion) -> CatalogResult<usize> {
        ensure_timelines(self, Some(PROD_ENV))?;

        let mut appended = 0;
        for (name, provider) in self.providers_mut() {
            let kubernetes = kubernetes_of(name, provider.kubernetes.as_mut())?;
            let timeline = kubernetes
                .versions_by_env
                .get_mut(PROD_ENV)
                .ok_or_else(|| {
                    CatalogError::NotFound(format!("environment '{PROD_ENV}' of provider '{name}'"))
                })?;
            if timeline.iter().any(|v| v.version == version.version) {
                warn!(provider = %name, version = %version.version, "Version already released");
            }
            timeline.push(version.clone());
            appended += 1;
        }
        Ok(appended)
    }

    /// Flag every entry equal to `version`, in every environment of every
    /// provider, as deprecated.
    ///
    /// Returns how many entries changed state; zero when nothing matched or
    /// everything was already deprecated.
    pub fn deprecate_version(&mut self, version: &str) -> CatalogResult<usize> {
        ensure_timelines(self, None)?;

        let mut flagged = 0;
        for (name, provider) in self.providers_mut() {
            let kubernetes = kubernetes_of(name, provider.kubernetes.as_mut())?;
            for entry in kubernetes.versions_by_env.values_mut().flatten() {
                if entry.version == version && !entry.deprecated {
                    entry.deprecated = true;
                    flagged += 1;
                }
            }
        }
        Ok(flagged)
    }

    /// Create `env` as a copy of the current production timeline, for the
    /// Kubernetes section and every database engine of every provider, where
    /// production exists and `env` does not yet.
    ///
    /// Existing `env` timelines are never touched, so running this again is a
    /// no-op. Returns the number of timelines created.
    pub fn backfill_environment(&mut self, env: &str) -> CatalogResult<usize> {
        let env = env.trim();
        if env.is_empty() {
            return Err(CatalogError::InvalidInput(
                "environment name must not be empty".to_string(),
            ));
        }
        ensure_timelines(self, None)?;

        let mut created = 0;
        for (name, provider) in self.providers_mut() {
            let kubernetes = kubernetes_of(name, provider.kubernetes.as_mut())?;
            created += backfill_timelines(kubernetes, env);

            if let Some(engines) = provider.db.as_mut() {
                for timelines in engines.values_mut() {
                    created += backfill_timelines(timelines, env);
                }
            }
        }
        Ok(created)
    }
}

fn backfill_timelines(timelines: &mut VersionTimelines, env: &str) -> usize {
    if timelines.has_environment(env) {
        return 0;
    }
    match timelines.versions_by_env.get(PROD_ENV) {
        Some(prod) => {
            let copy = prod.clone();
            timelines.versions_by_env.insert(env.to_string(), copy);
            1
        }
        None => 0,
    }
}

/// Runs lifecycle operations against the catalog file: each call is one
/// load → mutate → save cycle, and nothing is written when it fails.
#[derive(Debug, Clone)]
pub struct VersionLifecycle {
    store: CatalogStore,
}

impl VersionLifecycle {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Stage a version in every non-production environment
    #[instrument(skip(self, version), fields(version = %version.version))]
    pub fn add(&self, version: &KubeVersion) -> CatalogResult<usize> {
        let appended = self.store.update(|document| document.stage_version(version))?;
        info!(timelines = appended, "Staged version");
        Ok(appended)
    }

    /// Promote a version to production
    #[instrument(skip(self, version), fields(version = %version.version))]
    pub fn release(&self, version: &KubeVersion) -> CatalogResult<usize> {
        let appended = self.store.update(|document| document.release_version(version))?;
        info!(timelines = appended, "Released version");
        Ok(appended)
    }

    #[instrument(skip(self))]
    pub fn deprecate(&self, version: &str) -> CatalogResult<usize> {
        let flagged = self.store.update(|document| document.deprecate_version(version))?;
        if flagged == 0 {
            info!("No active entries matched, nothing deprecated");
        } else {
            info!(entries = flagged, "Deprecated version");
        }
        Ok(flagged)
    }

    #[instrument(skip(self))]
    pub fn backfill_environment(&self, env: &str) -> CatalogResult<usize> {
        let created = self
            .store
            .update(|document| document.backfill_environment(env))?;
        info!(timelines = created, "Backfilled environment");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderEntry, ONEBOX_ENV};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn version(v: &str) -> KubeVersion {
        let apps = IndexMap::from([
            ("kubernetes-server".to_string(), v.to_string()),
            ("kubernetes-salt".to_string(), format!("{v}-ac")),
        ]);
        KubeVersion::new(v, None, apps).unwrap()
    }

    fn timelines(envs: &[(&str, &[&str])]) -> VersionTimelines {
        VersionTimelines {
            versions_by_env: envs
                .iter()
                .map(|(env, versions)| {
                    (
                        env.to_string(),
                        versions.iter().map(|v| version(v)).collect(),
                    )
                })
                .collect(),
            extra: IndexMap::new(),
        }
    }

    fn provider(envs: &[(&str, &[&str])]) -> ProviderEntry {
        ProviderEntry {
            kubernetes: Some(timelines(envs)),
            ..Default::default()
        }
    }

    fn document() -> CatalogDocument {
        let mut document = CatalogDocument::new();
        document.insert(
            "vultr",
            provider(&[("prod", &["1.5.7"]), ("qa", &["1.5.7", "1.6.4"]), ("dev", &[])]),
        );
        document.insert(
            "softlayer",
            provider(&[("prod", &["1.5.7"]), ("qa", &["1.6.4"])]),
        );
        document
    }

    fn versions<'a>(document: &'a CatalogDocument, provider: &str, env: &str) -> Vec<&'a str> {
        document
            .provider(provider)
            .and_then(|p| p.kubernetes.as_ref())
            .and_then(|k| k.environment(env))
            .unwrap_or_default()
            .iter()
            .map(|v| v.version.as_str())
            .collect()
    }

    fn count(document: &CatalogDocument, provider: &str, env: &str, v: &str) -> usize {
        versions(document, provider, env)
            .into_iter()
            .filter(|candidate| *candidate == v)
            .count()
    }

    #[test]
    fn test_stage_version_skips_prod() {
        let mut document = document();

        let appended = document.stage_version(&version("1.7.0")).unwrap();

        assert_eq!(appended, 3);
        assert_eq!(versions(&document, "vultr", "qa"), vec!["1.5.7", "1.6.4", "1.7.0"]);
        assert_eq!(versions(&document, "vultr", "dev"), vec!["1.7.0"]);
        assert_eq!(versions(&document, "softlayer", "qa"), vec!["1.6.4", "1.7.0"]);
        assert_eq!(versions(&document, "vultr", "prod"), vec!["1.5.7"]);
        assert_eq!(versions(&document, "softlayer", "prod"), vec!["1.5.7"]);
    }

    #[test]
    fn test_release_version_only_touches_prod() {
        let mut document = document();

        let appended = document.release_version(&version("1.6.4")).unwrap();

        assert_eq!(appended, 2);
        assert_eq!(versions(&document, "vultr", "prod"), vec!["1.5.7", "1.6.4"]);
        assert_eq!(versions(&document, "vultr", "qa"), vec!["1.5.7", "1.6.4"]);
        assert_eq!(versions(&document, "vultr", "dev"), Vec::<&str>::new());
    }

    #[test]
    fn test_add_then_release_places_version_once_per_timeline() {
        let mut document = document();

        document.stage_version(&version("1.7.0")).unwrap();
        document.release_version(&version("1.7.0")).unwrap();

        for provider in ["vultr", "softlayer"] {
            assert_eq!(count(&document, provider, "prod", "1.7.0"), 1);
            assert_eq!(count(&document, provider, "qa", "1.7.0"), 1);
        }
        assert_eq!(count(&document, "vultr", "dev", "1.7.0"), 1);
    }

    #[test]
    fn test_release_requires_prod_everywhere() {
        let mut document = document();
        document.insert("linode", provider(&[("qa", &[])]));
        let before = document.clone();

        let err = document.release_version(&version("1.7.0")).unwrap_err();

        assert!(matches!(err, CatalogError::NotFound(_)));
        assert!(err.to_string().contains("linode"));
        assert_eq!(document, before);
    }

    #[test]
    fn test_lifecycle_requires_kubernetes_section() {
        let mut document = document();
        document.insert("ovh", ProviderEntry::default());

        assert!(matches!(
            document.stage_version(&version("1.7.0")),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            document.deprecate_version("1.5.7"),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            document.backfill_environment(ONEBOX_ENV),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_deprecate_flags_every_match_across_providers() {
        let mut document = document();

        let flagged = document.deprecate_version("1.5.7").unwrap();

        assert_eq!(flagged, 3);
        let vultr = document.provider("vultr").unwrap().kubernetes.as_ref().unwrap();
        assert!(vultr.environment("prod").unwrap()[0].deprecated);
        assert!(vultr.environment("qa").unwrap()[0].deprecated);
        assert!(!vultr.environment("qa").unwrap()[1].deprecated);
    }

    #[test]
    fn test_deprecate_is_idempotent() {
        let mut once = document();
        once.deprecate_version("1.5.7").unwrap();

        let mut twice = once.clone();
        let flagged = twice.deprecate_version("1.5.7").unwrap();

        assert_eq!(flagged, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_deprecate_unknown_version_changes_nothing() {
        let mut document = document();
        let before = document.clone();

        let flagged = document.deprecate_version("9.9.9").unwrap();

        assert_eq!(flagged, 0);
        assert_eq!(document, before);
    }

    #[test]
    fn test_backfill_copies_prod_once() {
        let mut document = document();

        let created = document.backfill_environment(ONEBOX_ENV).unwrap();
        assert_eq!(created, 2);
        assert_eq!(versions(&document, "vultr", ONEBOX_ENV), vec!["1.5.7"]);

        document.release_version(&version("1.6.4")).unwrap();
        let created = document.backfill_environment(ONEBOX_ENV).unwrap();

        assert_eq!(created, 0);
        assert_eq!(versions(&document, "vultr", ONEBOX_ENV), vec!["1.5.7"]);
        assert_eq!(versions(&document, "vultr", "prod"), vec!["1.5.7", "1.6.4"]);
    }

    #[test]
    fn test_backfilled_environment_evolves_independently() {
        let mut document = document();
        document.backfill_environment(ONEBOX_ENV).unwrap();

        document.deprecate_version("1.5.7").unwrap();
        document.stage_version(&version("1.7.0")).unwrap();

        let vultr = document.provider("vultr").unwrap().kubernetes.as_ref().unwrap();
        let onebox = vultr.environment(ONEBOX_ENV).unwrap();
        assert_eq!(onebox.len(), 2);
        assert_eq!(vultr.environment("prod").unwrap().len(), 1);
    }

    #[test]
    fn test_backfill_covers_database_engines() {
        let mut document = CatalogDocument::new();
        let mut entry = provider(&[("prod", &["1.5.7"])]);
        entry.db = Some(IndexMap::from([
            ("postgres".to_string(), timelines(&[("prod", &["9.6"])])),
            ("mysql".to_string(), timelines(&[("qa", &["5.7"])])),
            (
                "redis".to_string(),
                timelines(&[("prod", &["3.2"]), (ONEBOX_ENV, &["3.0"])]),
            ),
        ]));
        document.insert("vultr", entry);

        let created = document.backfill_environment(ONEBOX_ENV).unwrap();

        assert_eq!(created, 2);
        let db = document.provider("vultr").unwrap().db.as_ref().unwrap();
        let onebox_of = |engine: &str| {
            db[engine]
                .environment(ONEBOX_ENV)
                .map(|versions| versions.iter().map(|v| v.version.clone()).collect::<Vec<_>>())
        };
        assert_eq!(onebox_of("postgres"), Some(vec!["9.6".to_string()]));
        assert_eq!(onebox_of("mysql"), None);
        assert_eq!(onebox_of("redis"), Some(vec!["3.0".to_string()]));
    }

    #[test]
    fn test_backfill_rejects_empty_environment_name() {
        let mut document = document();
        assert!(matches!(
            document.backfill_environment(" "),
            Err(CatalogError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_manager_persists_each_operation() {
        let dir = tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("cloud_provider.json"));
        store.save(&document()).unwrap();
        let lifecycle = VersionLifecycle::new(store.clone());

        lifecycle.add(&version("1.7.0")).unwrap();
        lifecycle.release(&version("1.7.0")).unwrap();
        lifecycle.deprecate("1.5.7").unwrap();
        lifecycle.backfill_environment(ONEBOX_ENV).unwrap();

        let stored = store.load().unwrap();
        assert_eq!(versions(&stored, "vultr", "prod"), vec!["1.5.7", "1.7.0"]);
        assert_eq!(versions(&stored, "vultr", ONEBOX_ENV), vec!["1.5.7", "1.7.0"]);
        let prod = stored.provider("softlayer").unwrap().kubernetes.as_ref().unwrap();
        assert!(prod.environment("prod").unwrap()[0].deprecated);
    }

    #[test]
    fn test_manager_failure_does_not_write() {
        let dir = tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("cloud_provider.json"));
        let mut seeded = document();
        seeded.insert("linode", provider(&[("qa", &[])]));
        store.save(&seeded).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let result = VersionLifecycle::new(store.clone()).release(&version("1.7.0"));

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_operation_labels() {
        assert_eq!(LifecycleOperation::Add.as_ref(), "add");
        assert_eq!(
            LifecycleOperation::BackfillEnvironment.to_string(),
            "backfill_environment"
        );
    }
}
