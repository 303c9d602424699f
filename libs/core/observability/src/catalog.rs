//! Catalog-specific metrics: provider adapter syncs and version lifecycle operations.

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Catalog metrics recorder
pub struct CatalogMetrics;

impl CatalogMetrics {
    // =========================================================================
    // Adapter Metrics
    // =========================================================================

    /// Record a successful adapter run and the resulting listing size
    pub fn record_sync_completed(provider: &str, instance_types: usize) {
        counter!("catalog_sync_total", "provider" => provider.to_string(), "status" => "completed")
            .increment(1);
        gauge!("catalog_instance_types", "provider" => provider.to_string())
            .set(instance_types as f64);
    }

    /// Record a failed adapter run
    pub fn record_sync_failed(provider: &str) {
        counter!("catalog_sync_total", "provider" => provider.to_string(), "status" => "failed")
            .increment(1);
    }

    /// Record instance type changes of one kind (`added`, `deprecated`, ...)
    pub fn record_instance_changes(provider: &str, change: &'static str, count: usize) {
        if count == 0 {
            return;
        }
        counter!(
            "catalog_instance_changes_total",
            "provider" => provider.to_string(),
            "change" => change
        )
        .increment(count as u64);

        tracing::debug!(provider = provider, change = change, count = count, "Instance types changed");
    }

    // =========================================================================
    // Lifecycle Metrics
    // =========================================================================

    /// Record a lifecycle operation and how many timelines / entries it changed
    pub fn record_lifecycle(operation: &str, touched: usize) {
        counter!("catalog_lifecycle_operations_total", "operation" => operation.to_string())
            .increment(1);
        counter!("catalog_lifecycle_entries_touched_total", "operation" => operation.to_string())
            .increment(touched as u64);
    }
}

/// Records `catalog_operation_duration_seconds` when stopped or dropped
pub struct OperationTimer {
    start: Instant,
    operation: String,
    stopped: bool,
}

impl OperationTimer {
    /// Start a new timer for an operation
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            stopped: false,
        }
    }

    /// Stop the timer and record the duration. Returns duration in milliseconds.
    pub fn stop(&mut self) -> u64 {
        if self.stopped {
            return 0;
        }
        self.stopped = true;

        let duration = self.start.elapsed();
        histogram!(
            "catalog_operation_duration_seconds",
            "operation" => self.operation.clone()
        )
        .record(duration.as_secs_f64());

        duration.as_millis() as u64
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}
