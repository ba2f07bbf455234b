/// Keyword matcher over the intervention catalog.
///
/// Pure, deterministic, no I/O: scoring is a token-run comparison between
/// the normalized query and each record's phrases, with fixed weights and
/// catalog insertion order as the tie-break. The same query against the
/// same catalog always produces the same ranked list.
use std::sync::Arc;

use regex::Regex;

use crate::catalog::Catalog;
use crate::model::{InterventionRecord, MatchResult};

const WEIGHT_PROBLEM_TYPE: u32 = 10;
const WEIGHT_TITLE: u32 = 8;
const WEIGHT_CATEGORY: u32 = 5;
const WEIGHT_KEYWORD: u32 = 2;
const WEIGHT_FACET: u32 = 3;

pub struct Matcher {
    catalog: Arc<Catalog>,
    token_re: Regex,
}

impl Matcher {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            token_re: Regex::new(r"[a-z0-9]+").expect("valid regex"),
        }
    }

    /// Rank catalog records against `query`.
    ///
    /// Only records with score > 0 are returned, descending by score,
    /// ties in catalog insertion order, truncated to `top_k`. An empty or
    /// whitespace-only query returns an empty list.
    pub fn match_query(&self, query: &str, top_k: usize) -> Vec<MatchResult> {
        let query_tokens = self.tokenize(query);
        if query_tokens.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut results: Vec<MatchResult> = Vec::new();
        for (index, record) in self.catalog.records().iter().enumerate() {
            let (score, matched_terms) = self.score_record(record, &query_tokens);
            if score > 0 {
                results.push(MatchResult {
                    index,
                    score,
                    matched_terms,
                });
            }
        }

        // sort_by is stable: equal scores keep insertion order
        results.sort_by(|a, b| b.score.cmp(&a.score));
        results.truncate(top_k);
        results
    }

    /// The normalized form of `query` as seen by the scorer.
    pub fn normalized(&self, query: &str) -> String {
        self.tokenize(query).join(" ")
    }

    fn score_record(
        &self,
        record: &InterventionRecord,
        query_tokens: &[String],
    ) -> (u32, Vec<String>) {
        let mut score = 0;
        let mut matched_terms = Vec::new();

        let mut hit = |phrase: &str, weight: u32| {
            let phrase_tokens = self.tokenize(phrase);
            if !phrase_tokens.is_empty() && contains_run(query_tokens, &phrase_tokens) {
                score += weight;
                matched_terms.push(phrase.to_string());
            }
        };

        hit(&record.problem_type, WEIGHT_PROBLEM_TYPE);
        hit(&record.title, WEIGHT_TITLE);
        hit(&record.category, WEIGHT_CATEGORY);

        for keyword in &record.keywords {
            // Longer phrases score higher than single tokens so that a
            // specific match like "damaged stop sign" outranks a record
            // that only matched "stop sign".
            let extra_words = self.tokenize(keyword).len().saturating_sub(1) as u32;
            hit(keyword, WEIGHT_KEYWORD + extra_words);
        }
        for road_type in &record.road_types {
            hit(road_type, WEIGHT_FACET);
        }
        for environment in &record.environments {
            hit(environment, WEIGHT_FACET);
        }

        (score, matched_terms)
    }

    /// Lowercase, strip punctuation, split into tokens, fold simple
    /// plurals ("signs" and "sign" must compare equal).
    fn tokenize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.token_re
            .find_iter(&lower)
            .map(|m| fold_plural(m.as_str()).to_string())
            .collect()
    }
}

/// Whether `needle` occurs as a contiguous token run inside `haystack`.
/// Token-level comparison keeps "stop" from matching inside "unstoppable".
fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.iter().zip(needle).all(|(a, b)| a == b))
}

/// Trailing-"s" fold for tokens of 4+ characters ("signs" -> "sign"),
/// skipping "ss" endings so "class" stays intact.
fn fold_plural(token: &str) -> &str {
    if token.len() >= 4 && token.ends_with('s') && !token.ends_with("ss") {
        &token[..token.len() - 1]
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn record(
        id: &str,
        title: &str,
        problem_type: &str,
        category: &str,
        keywords: &[&str],
    ) -> InterventionRecord {
        InterventionRecord {
            id: id.to_string(),
            title: title.to_string(),
            problem_type: problem_type.to_string(),
            category: category.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            road_types: vec![],
            environments: vec![],
            standard_code: "IRC:67-2012".to_string(),
            clause: "14.4".to_string(),
            description: "desc".to_string(),
            implementation_guidance: "guidance".to_string(),
        }
    }

    fn matcher(records: Vec<InterventionRecord>) -> Matcher {
        Matcher::new(Arc::new(Catalog::from_records(records).unwrap()))
    }

    fn signage_catalog() -> Vec<InterventionRecord> {
        vec![
            record(
                "I1",
                "Replace STOP signage",
                "Damaged signage at intersection",
                "Traffic Signs",
                &["stop sign", "damaged stop sign"],
            ),
            record(
                "I2",
                "Install rumble strips",
                "Overspeeding on approach",
                "Speed Management",
                &["stop sign"],
            ),
            record(
                "I3",
                "Repaint zebra crossing",
                "Faded pedestrian crossing",
                "Road Markings",
                &["zebra crossing", "pedestrian"],
            ),
        ]
    }

    #[test]
    fn empty_and_whitespace_queries_return_nothing() {
        let m = matcher(signage_catalog());
        assert!(m.match_query("", 5).is_empty());
        assert!(m.match_query("   \t\n ", 5).is_empty());
        assert!(m.match_query("!!! ... ???", 5).is_empty());
    }

    #[test]
    fn unique_keyword_ranks_its_record_first() {
        let m = matcher(signage_catalog());
        let results = m.match_query("faded zebra crossing near the market", 5);
        assert!(!results.is_empty());
        assert_eq!(results[0].index, 2);
    }

    #[test]
    fn longer_phrase_match_outranks_plain_keyword_match() {
        let m = matcher(signage_catalog());
        let results = m.match_query("There are damaged STOP signs at intersections", 5);
        // I1 fires "stop sign" (2+1) and "damaged stop sign" (2+2); I2 only
        // fires "stop sign".
        assert_eq!(results[0].index, 0);
        let first = &results[0];
        assert!(first
            .matched_terms
            .iter()
            .any(|t| t == "damaged stop sign"));
        let second = results.iter().find(|r| r.index == 1).expect("I2 matches too");
        assert!(first.score > second.score);
    }

    #[test]
    fn matching_is_deterministic() {
        let m = matcher(signage_catalog());
        let a = m.match_query("damaged stop sign", 5);
        let b = m.match_query("damaged stop sign", 5);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.index, y.index);
            assert_eq!(x.score, y.score);
            assert_eq!(x.matched_terms, y.matched_terms);
        }
    }

    #[test]
    fn top_k_truncates() {
        let m = matcher(signage_catalog());
        let results = m.match_query("stop sign", 1);
        assert_eq!(results.len(), 1);
        assert!(m.match_query("stop sign", 0).is_empty());
    }

    #[test]
    fn ties_keep_catalog_insertion_order() {
        let records = vec![
            record("A", "First", "glare at night", "Lighting", &["glare"]),
            record("B", "Second", "glare at night", "Lighting", &["glare"]),
        ];
        let m = matcher(records);
        let results = m.match_query("glare", 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, results[1].score);
        assert_eq!(results[0].index, 0);
        assert_eq!(results[1].index, 1);
    }

    #[test]
    fn token_run_matching_rejects_embedded_substrings() {
        let records = vec![record(
            "I1",
            "Replace STOP signage",
            "Damaged signage",
            "Traffic Signs",
            &["stop"],
        )];
        let m = matcher(records);
        assert!(m.match_query("the flow was unstoppable", 5).is_empty());
        assert!(!m.match_query("missing stop line", 5).is_empty());
    }

    #[test]
    fn problem_type_outweighs_keywords() {
        let records = vec![
            record(
                "A",
                "Streetlight upgrade",
                "poor lighting at night",
                "Lighting",
                &[],
            ),
            record("B", "Reflective studs", "faded studs", "Road Markings", &[
                "lighting",
                "night",
            ]),
        ];
        let m = matcher(records);
        let results = m.match_query("poor lighting at night on the bypass", 5);
        // A: problem_type +10; B: two keywords +2 each.
        assert_eq!(results[0].index, 0);
        assert_eq!(results[1].index, 1);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn facets_contribute_to_score() {
        let mut rec = record(
            "I1",
            "School zone signage",
            "unsafe school crossing",
            "Traffic Signs",
            &["school"],
        );
        rec.road_types = vec!["School Zone".to_string()];
        rec.environments = vec!["Near Schools".to_string()];
        let m = matcher(vec![rec]);
        let results = m.match_query("crossing near schools is unsafe, need school zone signs", 5);
        assert_eq!(results.len(), 1);
        let terms = &results[0].matched_terms;
        assert!(terms.iter().any(|t| t == "School Zone"));
        assert!(terms.iter().any(|t| t == "Near Schools"));
    }

    #[test]
    fn sample_catalog_ranks_the_expected_record_first() {
        let path = std::path::Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/demos/catalog.sample.json"
        ));
        let catalog = Arc::new(Catalog::load(path).unwrap());
        let m = Matcher::new(Arc::clone(&catalog));

        let results = m.match_query("There are damaged STOP signs at the intersection", 3);
        assert!(!results.is_empty());
        assert_eq!(catalog.records()[results[0].index].id, "1");

        let results = m.match_query("waterlogging on the carriageway after rain", 3);
        assert_eq!(catalog.records()[results[0].index].id, "5");
    }

    #[test]
    fn normalized_query_folds_case_punctuation_and_plurals() {
        let m = matcher(signage_catalog());
        assert_eq!(
            m.normalized("There are damaged STOP signs, aren't there?"),
            "there are damaged stop sign aren t there"
        );
    }
}
