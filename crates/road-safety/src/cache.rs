/// Redis cache for ranked match results.
///
/// Key schema:
/// - `rsi:v1:match:{catalog_fingerprint}:{sha256(query|top_k)}` —
///   JSON Vec<MatchResult> (TTL 3600s)
///
/// Match results hold catalog indices, and Redis outlives the process:
/// the catalog fingerprint in the key makes entries written against an
/// older or reordered catalog unreachable instead of resolving to the
/// wrong record. All operations degrade to a miss/no-op when Redis is
/// unavailable; the matcher recomputes from the catalog.
use sha2::{Digest, Sha256};
use tracing::warn;

use safety_common::redis::RedisStore;

use crate::model::MatchResult;

const KEY_PREFIX: &str = "rsi:v1:";
const MATCH_TTL_SECS: u64 = 3600;

pub struct MatchCache {
    redis: RedisStore,
    catalog_fingerprint: String,
}

impl MatchCache {
    pub fn new(redis: RedisStore, catalog_fingerprint: String) -> Self {
        Self {
            redis,
            catalog_fingerprint,
        }
    }

    pub async fn get_matches(&self, query: &str, top_k: usize) -> Option<Vec<MatchResult>> {
        let key = match_key(&self.catalog_fingerprint, query, top_k);
        let json = self.redis.get(&key).await?;
        serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()
    }

    pub async fn set_matches(&self, query: &str, top_k: usize, matches: &[MatchResult]) {
        let key = match_key(&self.catalog_fingerprint, query, top_k);
        if let Ok(json) = serde_json::to_string(matches) {
            self.redis.set_with_ttl(&key, &json, MATCH_TTL_SECS).await;
        }
    }
}

fn match_key(catalog_fingerprint: &str, query: &str, top_k: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(b"|");
    hasher.update(top_k.to_string().as_bytes());
    let hash = hasher.finalize();
    format!("{KEY_PREFIX}match:{catalog_fingerprint}:{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::model::InterventionRecord;

    fn record(id: &str, title: &str) -> InterventionRecord {
        InterventionRecord {
            id: id.to_string(),
            title: title.to_string(),
            problem_type: "Damaged signage".to_string(),
            category: "Traffic Signs".to_string(),
            keywords: vec!["stop sign".to_string()],
            road_types: vec![],
            environments: vec![],
            standard_code: "IRC:67-2012".to_string(),
            clause: "14.4".to_string(),
            description: "desc".to_string(),
            implementation_guidance: "guidance".to_string(),
        }
    }

    #[test]
    fn match_key_is_stable_and_distinguishes_inputs() {
        assert_eq!(match_key("fp", "stop sign", 3), match_key("fp", "stop sign", 3));
        assert_ne!(match_key("fp", "stop sign", 3), match_key("fp", "stop sign", 5));
        assert_ne!(match_key("fp", "stop sign", 3), match_key("fp", "stop signs", 3));
        assert!(match_key("fp", "q", 1).starts_with("rsi:v1:match:fp:"));
    }

    #[test]
    fn reordered_catalog_cannot_revive_stale_entries() {
        // Index 0 means a different intervention in each catalog; the key
        // must differ so a restart never serves the other catalog's hit.
        let original = Catalog::from_records(vec![
            record("I1", "Replace STOP signage"),
            record("I2", "Install streetlights"),
        ])
        .unwrap();
        let reordered = Catalog::from_records(vec![
            record("I2", "Install streetlights"),
            record("I1", "Replace STOP signage"),
        ])
        .unwrap();

        let key_before = match_key(original.fingerprint(), "damaged stop sign", 3);
        let key_after = match_key(reordered.fingerprint(), "damaged stop sign", 3);
        assert_ne!(key_before, key_after);

        let unchanged = Catalog::from_records(vec![
            record("I1", "Replace STOP signage"),
            record("I2", "Install streetlights"),
        ])
        .unwrap();
        assert_eq!(
            key_before,
            match_key(unchanged.fingerprint(), "damaged stop sign", 3)
        );
    }
}
