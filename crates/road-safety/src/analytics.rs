/// Best-effort query analytics on Redis hash counters.
///
/// Key schema:
/// - `rsi:v1:analytics` hash:
///   - `queries_total`, `queries_matched`
///   - `problem:{problem_type}`, `category:{category}`,
///     `intervention:{title}` — recommendation counts
///
/// Counters are fire-and-forget; when Redis is down the dashboard reports
/// zeros and `redis_available = false`.
use std::collections::HashMap;
use std::sync::Arc;

use safety_common::api::{CountEntry, DashboardStatsResponse};
use safety_common::redis::RedisStore;

use crate::catalog::Catalog;
use crate::model::MatchResult;

const ANALYTICS_KEY: &str = "rsi:v1:analytics";
const TOP_PROBLEMS: usize = 5;
const TOP_CATEGORIES: usize = 5;
const TOP_INTERVENTIONS: usize = 10;

pub struct QueryAnalytics {
    redis: RedisStore,
    catalog: Arc<Catalog>,
}

impl QueryAnalytics {
    pub fn new(redis: RedisStore, catalog: Arc<Catalog>) -> Self {
        Self { redis, catalog }
    }

    pub async fn record(&self, matches: &[MatchResult]) {
        let _ = self.redis.hincr_by(ANALYTICS_KEY, "queries_total", 1).await;
        if matches.is_empty() {
            return;
        }
        let _ = self
            .redis
            .hincr_by(ANALYTICS_KEY, "queries_matched", 1)
            .await;
        for m in matches {
            let Some(record) = self.catalog.records().get(m.index) else {
                continue;
            };
            let _ = self
                .redis
                .hincr_by(ANALYTICS_KEY, &format!("problem:{}", record.problem_type), 1)
                .await;
            let _ = self
                .redis
                .hincr_by(ANALYTICS_KEY, &format!("category:{}", record.category), 1)
                .await;
            let _ = self
                .redis
                .hincr_by(ANALYTICS_KEY, &format!("intervention:{}", record.title), 1)
                .await;
        }
    }

    pub async fn dashboard(&self) -> DashboardStatsResponse {
        let redis_available = self.redis.is_available().await;
        let entries = self
            .redis
            .hgetall(ANALYTICS_KEY)
            .await
            .unwrap_or_default();
        let mut stats = aggregate(&entries);
        stats.redis_available = redis_available;
        stats.catalog_size = self.catalog.len();
        stats
    }
}

fn aggregate(entries: &[(String, String)]) -> DashboardStatsResponse {
    let mut total_queries = 0;
    let mut queries_with_matches = 0;
    let mut problems: HashMap<String, u64> = HashMap::new();
    let mut categories: HashMap<String, u64> = HashMap::new();
    let mut interventions: HashMap<String, u64> = HashMap::new();

    for (field, value) in entries {
        let count = value.parse::<u64>().unwrap_or(0);
        match field.as_str() {
            "queries_total" => total_queries = count,
            "queries_matched" => queries_with_matches = count,
            _ => {
                let Some((kind, name)) = field.split_once(':') else {
                    continue;
                };
                let bucket = match kind {
                    "problem" => &mut problems,
                    "category" => &mut categories,
                    "intervention" => &mut interventions,
                    _ => continue,
                };
                *bucket.entry(name.to_string()).or_insert(0) += count;
            }
        }
    }

    DashboardStatsResponse {
        total_queries,
        queries_with_matches,
        top_problem_types: top_entries(problems, TOP_PROBLEMS),
        top_categories: top_entries(categories, TOP_CATEGORIES),
        top_interventions: top_entries(interventions, TOP_INTERVENTIONS),
        redis_available: false,
        catalog_size: 0,
    }
}

fn top_entries(counts: HashMap<String, u64>, limit: usize) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(name, count)| CountEntry { name, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(field: &str, value: &str) -> (String, String) {
        (field.to_string(), value.to_string())
    }

    #[test]
    fn aggregate_splits_counter_kinds() {
        let entries = vec![
            entry("queries_total", "12"),
            entry("queries_matched", "9"),
            entry("problem:Overspeeding", "4"),
            entry("problem:Damaged signage", "7"),
            entry("category:Traffic Signs", "7"),
            entry("intervention:Speed hump", "4"),
            entry("garbage", "1"),
            entry("unknown:thing", "3"),
        ];
        let stats = aggregate(&entries);
        assert_eq!(stats.total_queries, 12);
        assert_eq!(stats.queries_with_matches, 9);
        assert_eq!(stats.top_problem_types.len(), 2);
        assert_eq!(stats.top_problem_types[0].name, "Damaged signage");
        assert_eq!(stats.top_problem_types[0].count, 7);
        assert_eq!(stats.top_categories.len(), 1);
        assert_eq!(stats.top_interventions.len(), 1);
    }

    #[test]
    fn top_entries_are_ranked_and_truncated() {
        let counts: HashMap<String, u64> = [
            ("a".to_string(), 2),
            ("b".to_string(), 5),
            ("c".to_string(), 5),
            ("d".to_string(), 1),
        ]
        .into_iter()
        .collect();
        let top = top_entries(counts, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].name, "b");
        assert_eq!(top[1].name, "c");
        assert_eq!(top[2].name, "a");
    }

    #[test]
    fn aggregate_of_nothing_is_zeroed() {
        let stats = aggregate(&[]);
        assert_eq!(stats.total_queries, 0);
        assert!(stats.top_problem_types.is_empty());
    }
}
