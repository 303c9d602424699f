//! Folding and reconciliation of instance type listings.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::InstanceType;

/// Fold raw records that may repeat a SKU (once per region) into one record
/// per SKU, in ascending SKU order.
///
/// The first record seen for a SKU wins; later ones only contribute regions.
pub fn merge_by_sku<I>(records: I) -> Vec<InstanceType>
where
    I: IntoIterator<Item = InstanceType>,
{
    let mut merged: BTreeMap<String, InstanceType> = BTreeMap::new();

    for record in records {
        match merged.entry(record.external_sku.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                slot.get_mut().regions.extend(record.regions);
            }
        }
    }

    merged.into_values().collect()
}

/// Reconcile the stored listing of a provider against a fresh remote listing
/// keyed by SKU.
///
/// - stored SKUs missing remotely become deprecated
/// - stored SKUs present remotely take the remote deprecation flag
/// - remote SKUs left over are appended in remote order, unless the remote
///   already marks them deprecated
pub fn reconcile(
    mut existing: Vec<InstanceType>,
    mut remote: IndexMap<String, InstanceType>,
) -> Vec<InstanceType> {
    for instance in existing.iter_mut() {
        match remote.shift_remove(&instance.external_sku) {
            None => instance.deprecated = true,
            Some(fresh) => instance.deprecated = fresh.deprecated,
        }
    }

    existing.extend(remote.into_values().filter(|fresh| !fresh.deprecated));
    existing
}

/// What changed between two listings of the same provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub total: usize,
    pub added: usize,
    pub deprecated: usize,
    pub revived: usize,
    pub removed: usize,
}

impl ReconcileSummary {
    pub fn between(before: &[InstanceType], after: &[InstanceType]) -> Self {
        let previous: HashMap<&str, bool> = before
            .iter()
            .map(|it| (it.external_sku.as_str(), it.deprecated))
            .collect();

        let mut summary = ReconcileSummary {
            total: after.len(),
            ..Default::default()
        };

        for instance in after {
            match previous.get(instance.external_sku.as_str()).copied() {
                None => summary.added += 1,
                Some(false) if instance.deprecated => summary.deprecated += 1,
                Some(true) if !instance.deprecated => summary.revived += 1,
                Some(_) => {}
            }
        }

        let current: HashSet<&str> = after.iter().map(|it| it.external_sku.as_str()).collect();
        summary.removed = previous
            .keys()
            .filter(|sku| !current.contains(*sku))
            .count();

        summary
    }

    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.deprecated == 0 && self.revived == 0 && self.removed == 0
    }
}
