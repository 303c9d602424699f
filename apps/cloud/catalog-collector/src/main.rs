//! Catalog Collector
//!
//! Maintains the cloud catalog file: refreshes provider instance types from
//! SoftLayer, OVH and Vultr, and moves Kubernetes versions through their
//! lifecycle (add, release, deprecate, backfill).

use clap::{Args, Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::Environment;
use domain_catalog::{
    CatalogResult, CatalogStore, KubeVersion, LifecycleOperation, VersionLifecycle, ONEBOX_ENV,
};
use eyre::{Result, WrapErr};
use indexmap::IndexMap;
use observability::{CatalogMetrics, OperationTimer};
use std::path::PathBuf;
use tracing::{info, warn};

mod collector;
mod config;
mod providers;

use collector::CatalogCollector;
use config::Config;

#[derive(Parser)]
#[command(name = "catalog-collector")]
#[command(about = "Maintain the cloud provider catalog: instance types and Kubernetes versions")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Catalog file to operate on (overrides CATALOG_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Write a Prometheus metrics snapshot here after the command (overrides CATALOG_METRICS_FILE)
    #[arg(long, global = true, value_name = "PATH")]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a version in every non-production environment
    Add(VersionArgs),

    /// Release a version to production
    Release(VersionArgs),

    /// Flag every entry of a version as deprecated, in every environment
    Deprecate {
        version: String,
    },

    /// Create an environment as a copy of production where it does not exist yet
    #[command(visible_alias = "onebox", alias = "backfill_environment")]
    Backfill {
        #[arg(default_value = ONEBOX_ENV)]
        env: String,
    },

    /// Refresh instance types from the provider adapters
    Collect {
        /// Providers to collect from (softlayer, ovh, vultr). Defaults to all configured.
        #[arg(short, long, value_delimiter = ',')]
        providers: Option<Vec<String>>,
    },

    /// Print a JSON summary of the catalog
    Status,
}

#[derive(Args)]
struct VersionArgs {
    /// Version string, e.g. 1.7.0
    version: String,

    /// Defaults to the version string
    #[arg(short, long)]
    description: Option<String>,

    /// Component version carried by this release; repeatable
    #[arg(long = "app", value_name = "NAME=VERSION", value_parser = parse_app)]
    apps: Vec<(String, String)>,
}

impl VersionArgs {
    fn into_version(self) -> CatalogResult<KubeVersion> {
        let apps: IndexMap<String, String> = self.apps.into_iter().collect();
        KubeVersion::new(self.version, self.description, apps)
    }
}

fn parse_app(raw: &str) -> Result<(String, String), String> {
    let (name, version) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VERSION, got '{raw}'"))?;

    let (name, version) = (name.trim(), version.trim());
    if name.is_empty() || version.is_empty() {
        return Err(format!("expected NAME=VERSION, got '{raw}'"));
    }

    Ok((name.to_string(), version.to_string()))
}

fn run_lifecycle<F>(operation: LifecycleOperation, mutate: F) -> Result<()>
where
    F: FnOnce() -> CatalogResult<usize>,
{
    let _timer = OperationTimer::new(operation.as_ref());
    let touched = mutate().wrap_err_with(|| format!("{operation} failed"))?;
    CatalogMetrics::record_lifecycle(operation.as_ref(), touched);
    Ok(())
}

fn run(command: Commands, config: &Config) -> Result<()> {
    let lifecycle = VersionLifecycle::new(CatalogStore::new(config.catalog_path.clone()));

    match command {
        Commands::Add(args) => {
            let version = args.into_version()?;
            run_lifecycle(LifecycleOperation::Add, || lifecycle.add(&version))?;
        }

        Commands::Release(args) => {
            let version = args.into_version()?;
            run_lifecycle(LifecycleOperation::Release, || lifecycle.release(&version))?;
        }

        Commands::Deprecate { version } => {
            run_lifecycle(LifecycleOperation::Deprecate, || lifecycle.deprecate(&version))?;
        }

        Commands::Backfill { env } => {
            run_lifecycle(LifecycleOperation::BackfillEnvironment, || {
                lifecycle.backfill_environment(&env)
            })?;
        }

        Commands::Collect { providers } => {
            let collector = CatalogCollector::new(config)?;
            let result = collector.collect(providers.as_deref())?;

            info!(
                providers = ?result.providers_collected,
                instance_types = result.instance_types,
                duration_ms = result.duration_ms,
                "Collection complete"
            );
        }

        Commands::Status => {
            let collector = CatalogCollector::new(config)?;
            let status = collector.status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    let mut config = Config::from_env().wrap_err("Failed to load configuration")?;
    if let Some(path) = cli.catalog {
        config.catalog_path = path;
    }
    if let Some(path) = cli.metrics_file {
        config.metrics_file = Some(path);
    }

    observability::init_metrics();

    info!(catalog = %config.catalog_path.display(), "Using catalog");
    let outcome = run(cli.command, &config);

    if let Some(path) = &config.metrics_file {
        if let Err(e) = observability::write_snapshot(path) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics snapshot");
        }
    }

    outcome
}
