use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReportProblemParams {
    /// Free-text description of the road-safety problem.
    pub problem: String,
    /// Maximum number of interventions to cite (default: 3, max: 10).
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchInterventionsParams {
    /// The search query describing the problem or measure.
    pub query: String,
    /// Maximum number of results to return (default: 5, max: 10).
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetInterventionParams {
    /// Stable intervention ID such as "I1" or "27".
    pub intervention_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListCategoryParams {
    /// Category name such as "Traffic Signs" or "Road Markings".
    pub category: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ComplianceChecklistParams {
    /// IDs of the interventions to include in the checklist.
    pub intervention_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DebugMatchParams {
    /// Free-text problem description to trace through the matcher.
    pub problem: String,
}

/// Whether the model-phrased summary made it into the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AiSummaryStatus {
    /// The model produced the prose part of the answer.
    Generated,
    /// The model call failed or timed out; the structured list still stands.
    Unavailable,
    /// No matches, so no model call was made.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Citation {
    pub title: String,
    pub standard_reference: String,
    pub guidance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReportProblemResponse {
    pub answer_text: String,
    pub interventions: Vec<Citation>,
    pub ai_summary: AiSummaryStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    pub problem_type: String,
    pub score: u32,
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchInterventionsResponse {
    pub results: Vec<MatchSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InterventionDetailResponse {
    pub id: String,
    pub title: String,
    pub problem_type: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub road_types: Vec<String>,
    pub environments: Vec<String>,
    pub standard_reference: String,
    pub description: String,
    pub implementation_guidance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryInfo {
    pub name: String,
    pub intervention_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InterventionSummary {
    pub id: String,
    pub title: String,
    pub problem_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryListResponse {
    pub category: CategoryInfo,
    pub interventions: Vec<InterventionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChecklistItem {
    pub intervention: String,
    pub standard: String,
    pub category: String,
    pub compliance_status: String,
    pub priority: String,
    pub estimated_cost: String,
    pub estimated_timeline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComplianceChecklistResponse {
    pub title: String,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CountEntry {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DashboardStatsResponse {
    pub total_queries: u64,
    pub queries_with_matches: u64,
    pub top_problem_types: Vec<CountEntry>,
    pub top_categories: Vec<CountEntry>,
    pub top_interventions: Vec<CountEntry>,
    pub redis_available: bool,
    pub catalog_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
    pub intervention_count: usize,
    pub ollama_model: String,
    pub ollama_connected: bool,
    pub redis_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DebugCandidate {
    pub id: String,
    pub title: String,
    pub score: u32,
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DebugMatchResponse {
    pub normalized_query: String,
    pub candidates: Vec<DebugCandidate>,
}
