use serde::{Deserialize, Serialize};

use safety_common::api::{AiSummaryStatus, Citation};

/// One row of the processed interventions database.
///
/// The catalog JSON is produced by the upstream conversion step from the
/// raw IRC spreadsheet; field names follow that file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionRecord {
    #[serde(rename = "intervention_id", deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename = "intervention_name")]
    pub title: String,
    pub problem_type: String,
    pub category: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub road_types: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
    pub standard_code: String,
    #[serde(deserialize_with = "de_id", default)]
    pub clause: String,
    pub description: String,
    #[serde(default)]
    pub implementation_guidance: String,
}

impl InterventionRecord {
    /// Citation string shown to the user, e.g. "IRC:67-2012 Clause 14.4".
    pub fn standard_reference(&self) -> String {
        if self.clause.is_empty() {
            self.standard_code.clone()
        } else {
            format!("{} Clause {}", self.standard_code, self.clause)
        }
    }
}

/// Ids and clauses appear as numbers in some rows of the converted file.
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// A scored catalog hit for one query. Per-request only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Index into the catalog's insertion order.
    pub index: usize,
    pub score: u32,
    /// The catalog phrases that fired, for the debug surface.
    pub matched_terms: Vec<String>,
}

/// The assembled reply for one problem report.
#[derive(Debug, Clone)]
pub struct Response {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub ai_summary: AiSummaryStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_deserializes_numeric_id_and_clause() {
        let json = r#"{
            "intervention_id": 7,
            "problem_type": "Overspeeding near school",
            "category": "Speed Management",
            "intervention_name": "Speed hump",
            "description": "Raised hump across the carriageway.",
            "standard_code": "IRC:99-2018",
            "clause": 5.2,
            "keywords": ["speed", "hump", "school"]
        }"#;
        let record: InterventionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.clause, "5.2");
        assert_eq!(record.standard_reference(), "IRC:99-2018 Clause 5.2");
        assert!(record.road_types.is_empty());
    }

    #[test]
    fn standard_reference_without_clause() {
        let json = r#"{
            "intervention_id": "I1",
            "problem_type": "Faded markings",
            "category": "Road Markings",
            "intervention_name": "Repaint centre line",
            "description": "Repaint to IRC:35.",
            "standard_code": "IRC:35-2015",
            "keywords": ["marking"]
        }"#;
        let record: InterventionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.standard_reference(), "IRC:35-2015");
    }
}
