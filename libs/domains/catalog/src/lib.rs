//! Catalog Domain
//!
//! The canonical cloud catalog consumed by provisioning tooling: per provider,
//! the instance types on offer and the Kubernetes / database version timelines
//! of every deployment environment.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐
//! │  Lifecycle  │   │    Merge    │  ← version timelines / instance type reconciliation
//! └──────┬──────┘   └──────┬──────┘
//!        │                 │
//! ┌──────▼─────────────────▼──────┐
//! │             Store             │  ← whole-document load / save of the JSON file
//! └───────────────┬───────────────┘
//!                 │
//! ┌───────────────▼───────────────┐
//! │            Models             │  ← CatalogDocument, ProviderEntry, InstanceType, KubeVersion
//! └───────────────────────────────┘
//! ```
//!
//! Every operation is a full read → mutate → overwrite cycle of one file.
//! Callers must serialize invocations themselves: nothing here locks the file.

pub mod error;
pub mod lifecycle;
pub mod merge;
pub mod models;
pub mod store;

pub use error::{CatalogError, CatalogResult};
pub use lifecycle::{LifecycleOperation, VersionLifecycle};
pub use merge::{merge_by_sku, reconcile, ReconcileSummary};
pub use models::{
    CatalogDocument, Category, InstanceType, KubeVersion, ProviderEntry, VersionTimelines,
    ONEBOX_ENV, PROD_ENV,
};
pub use store::CatalogStore;
