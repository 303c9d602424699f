//! Observability utilities for the cloud catalog tooling.
//!
//! This crate provides:
//! - A process-wide Prometheus recorder
//! - Catalog-specific metrics (adapter syncs, lifecycle operations)
//! - Snapshot export in the Prometheus text format for batch runs, suitable
//!   for a node-exporter textfile collector
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, write_snapshot, CatalogMetrics};
//!
//! init_metrics();
//! CatalogMetrics::record_lifecycle("deprecate", 3);
//! write_snapshot("/var/lib/node_exporter/catalog.prom")?;
//! ```

pub mod catalog;

pub use catalog::{CatalogMetrics, OperationTimer};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup; later calls return the same handle. If another
/// recorder is already installed the handle still renders, but stays empty.
pub fn init_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => debug!("Prometheus metrics recorder initialized"),
            Err(e) => warn!(error = %e, "Metrics recorder already installed"),
        }

        register_metric_descriptions();

        handle
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render all recorded metrics in the Prometheus text format
pub fn render() -> String {
    match get_metrics_handle() {
        Some(handle) => {
            handle.run_upkeep();
            handle.render()
        }
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Write the current metrics to `path`, replacing it atomically so a
/// textfile collector never scrapes a half-written file.
pub fn write_snapshot(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} does not name a file", path.display()),
        )
    })?;

    let temp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
    fs::write(&temp_path, render())?;
    fs::rename(&temp_path, path)?;

    debug!(path = %path.display(), "Wrote metrics snapshot");
    Ok(())
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // Adapter metrics
    describe_counter!(
        "catalog_sync_total",
        "Provider adapter runs by provider and status"
    );
    describe_gauge!(
        "catalog_instance_types",
        "Instance types stored per provider after the last sync"
    );
    describe_counter!(
        "catalog_instance_changes_total",
        "Instance type changes by provider and kind (added, deprecated, revived, removed)"
    );

    // Lifecycle metrics
    describe_counter!(
        "catalog_lifecycle_operations_total",
        "Version lifecycle operations by type"
    );
    describe_counter!(
        "catalog_lifecycle_entries_touched_total",
        "Timelines or version entries changed by lifecycle operations"
    );

    describe_histogram!(
        "catalog_operation_duration_seconds",
        "Catalog operation duration in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_metrics_is_idempotent() {
        let first = init_metrics() as *const PrometheusHandle;
        let second = init_metrics() as *const PrometheusHandle;
        assert_eq!(first, second);
        assert!(get_metrics_handle().is_some());
    }

    #[test]
    fn test_snapshot_contains_recorded_metrics() {
        init_metrics();
        CatalogMetrics::record_lifecycle("deprecate", 2);

        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.prom");
        write_snapshot(&path).unwrap();

        let rendered = fs::read_to_string(&path).unwrap();
        assert!(rendered.contains("catalog_lifecycle_operations_total"));
        assert!(!dir.path().join(".catalog.prom.tmp").exists());
    }

    #[test]
    fn test_every_change_kind_is_exported() {
        init_metrics();
        for change in ["added", "deprecated", "revived", "removed"] {
            CatalogMetrics::record_instance_changes("softlayer", change, 1);
        }

        let rendered = render();
        for change in ["added", "deprecated", "revived", "removed"] {
            assert!(
                rendered.contains(&format!("change=\"{change}\"")),
                "missing {change} in {rendered}"
            );
        }
    }
}
