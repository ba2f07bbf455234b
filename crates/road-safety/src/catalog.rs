use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::AppError;
use crate::model::InterventionRecord;

/// The static intervention catalog: loaded once at startup, immutable
/// thereafter. Shared across requests via `Arc` without locking.
#[derive(Debug)]
pub struct Catalog {
    records: Vec<InterventionRecord>,
    by_id: HashMap<String, usize>,
    fingerprint: String,
}

impl Catalog {
    /// One-shot load of the converted interventions JSON. No retries:
    /// a missing or malformed file is fatal at startup.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::CatalogMissing {
                    path: path.display().to_string(),
                }
            } else {
                AppError::Config(format!("failed to read {}: {e}", path.display()))
            }
        })?;

        let records: Vec<InterventionRecord> =
            serde_json::from_str(&content).map_err(|e| AppError::CatalogMalformed {
                reason: format!("{} is not a valid interventions array: {e}", path.display()),
            })?;

        let catalog = Self::from_records(records)?;
        info!(
            path = %path.display(),
            interventions = catalog.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Validate and index an in-memory record list. Insertion order is
    /// preserved; it is the matcher's documented tie-break.
    pub fn from_records(records: Vec<InterventionRecord>) -> Result<Self, AppError> {
        if records.is_empty() {
            return Err(AppError::CatalogMalformed {
                reason: "catalog contains no interventions".to_string(),
            });
        }

        let mut by_id = HashMap::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if record.id.trim().is_empty() {
                return Err(AppError::CatalogMalformed {
                    reason: format!("record at position {index} has an empty intervention_id"),
                });
            }
            if by_id
                .insert(record.id.to_ascii_lowercase(), index)
                .is_some()
            {
                return Err(AppError::CatalogMalformed {
                    reason: format!("duplicate intervention_id: {}", record.id),
                });
            }
            if record.keywords.is_empty() {
                warn!(
                    id = %record.id,
                    title = %record.title,
                    "intervention has no keywords and is hard to reach by matching"
                );
            }
        }

        let fingerprint = fingerprint_records(&records)?;
        Ok(Self {
            records,
            by_id,
            fingerprint,
        })
    }

    /// Content hash of the loaded records. Match results hold catalog
    /// indices, so anything persisted past the process (the Redis match
    /// cache) must be keyed by this to survive a catalog edit or reorder.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[InterventionRecord] {
        &self.records
    }

    /// Case-insensitive lookup by intervention id.
    pub fn get(&self, id: &str) -> Option<&InterventionRecord> {
        let index = *self.by_id.get(&id.to_ascii_lowercase())?;
        self.records.get(index)
    }

    /// Category names with their record counts, in first-seen order.
    pub fn categories(&self) -> Vec<(String, usize)> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in &self.records {
            if !counts.contains_key(&record.category) {
                order.push(record.category.clone());
            }
            *counts.entry(record.category.clone()).or_insert(0) += 1;
        }
        order
            .into_iter()
            .map(|name| {
                let count = counts[&name];
                (name, count)
            })
            .collect()
    }

    /// Records in `category` (case-insensitive), in insertion order.
    pub fn in_category(&self, category: &str) -> Vec<&InterventionRecord> {
        self.records
            .iter()
            .filter(|r| r.category.eq_ignore_ascii_case(category))
            .collect()
    }
}

fn fingerprint_records(records: &[InterventionRecord]) -> Result<String, AppError> {
    let json = serde_json::to_string(records).map_err(|e| AppError::CatalogMalformed {
        reason: format!("catalog not serializable for fingerprinting: {e}"),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
