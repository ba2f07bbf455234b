/// MCP server for the road-safety intervention recommender.
///
/// Tools:
/// - `report_problem`: full pipeline — match, summarize, cite
/// - `search_interventions`: ranked keyword matches only
/// - `get_intervention`: look up a record by ID
/// - `list_category`: browse a category
/// - `compliance_checklist`: checklist for chosen interventions
/// - `get_analytics`: query counters dashboard
/// - `status`: catalog / Ollama / Redis health
/// - `debug_match`: trace a query through the matcher
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tracing::info;

use safety_common::api::{
    CategoryInfo, CategoryListResponse, ComplianceChecklistParams, ComplianceChecklistResponse,
    DashboardStatsResponse, DebugCandidate, DebugMatchParams, DebugMatchResponse,
    GetInterventionParams, InterventionDetailResponse, InterventionSummary, ListCategoryParams,
    MatchSummary, ReportProblemParams, ReportProblemResponse, SearchInterventionsParams,
    SearchInterventionsResponse, StatusResponse,
};
use safety_common::ollama::OllamaClient;
use safety_common::redis::RedisStore;

use crate::analytics::QueryAnalytics;
use crate::assembler::ResponseAssembler;
use crate::cache::MatchCache;
use crate::catalog::Catalog;
use crate::checklist::build_checklist;
use crate::config::Config;
use crate::matcher::Matcher;
use crate::model::{InterventionRecord, MatchResult};

const MAX_TOP_K: usize = 10;
const DEBUG_CANDIDATES: usize = 10;

#[derive(Clone)]
pub struct RoadSafetyServer {
    catalog: Arc<Catalog>,
    matcher: Arc<Matcher>,
    assembler: Arc<ResponseAssembler>,
    cache: Arc<MatchCache>,
    analytics: Arc<QueryAnalytics>,
    ollama: Arc<OllamaClient>,
    redis: Arc<RedisStore>,
    default_top_k: usize,
    tool_router: ToolRouter<RoadSafetyServer>,
}

impl RoadSafetyServer {
    pub fn new(catalog: Arc<Catalog>, ollama: Arc<OllamaClient>, config: &Config) -> Self {
        let matcher = Arc::new(Matcher::new(Arc::clone(&catalog)));
        let assembler = Arc::new(ResponseAssembler::new(
            Arc::clone(&catalog),
            Arc::clone(&ollama),
            config.system_prompt.clone(),
            config.stream_summaries,
        ));
        let cache = Arc::new(MatchCache::new(
            RedisStore::new(config.redis_url.as_deref()),
            catalog.fingerprint().to_string(),
        ));
        let analytics = Arc::new(QueryAnalytics::new(
            RedisStore::new(config.redis_url.as_deref()),
            Arc::clone(&catalog),
        ));
        let redis = Arc::new(RedisStore::new(config.redis_url.as_deref()));

        Self {
            catalog,
            matcher,
            assembler,
            cache,
            analytics,
            ollama,
            redis,
            default_top_k: config.default_top_k,
            tool_router: Self::tool_router(),
        }
    }

    /// Ranked matches with caching: hit the Redis cache first, recompute
    /// from the catalog on a miss.
    async fn ranked_matches(&self, query: &str, top_k: usize) -> Vec<MatchResult> {
        if let Some(cached) = self.cache.get_matches(query, top_k).await {
            info!(query, "match cache hit");
            return cached;
        }
        let matches = self.matcher.match_query(query, top_k);
        self.cache.set_matches(query, top_k, &matches).await;
        matches
    }

    fn match_summary(&self, m: &MatchResult) -> Option<MatchSummary> {
        let record = self.catalog.records().get(m.index)?;
        Some(MatchSummary {
            id: record.id.clone(),
            title: record.title.clone(),
            category: record.category.clone(),
            problem_type: record.problem_type.clone(),
            score: m.score,
            matched_terms: m.matched_terms.clone(),
        })
    }
}

#[tool_router]
impl RoadSafetyServer {
    #[tool(description = "Report a road-safety problem in free text. Matches it against the IRC intervention database, asks the local model to phrase an answer, and returns the answer with cited interventions. Degrades to the structured list when the model is unreachable.")]
    async fn report_problem(
        &self,
        Parameters(params): Parameters<ReportProblemParams>,
    ) -> Result<Json<ReportProblemResponse>, String> {
        let problem = params.problem.trim().to_string();
        if problem.is_empty() {
            return Err("problem must not be empty".to_string());
        }

        let top_k = params
            .top_k
            .map(|k| (k as usize).clamp(1, MAX_TOP_K))
            .unwrap_or(self.default_top_k);

        let matches = self.ranked_matches(&problem, top_k).await;
        let response = self.assembler.assemble_query(&problem, &matches).await;
        self.analytics.record(&matches).await;

        Ok(Json(ReportProblemResponse {
            answer_text: response.answer_text,
            interventions: response.citations,
            ai_summary: response.ai_summary,
        }))
    }

    #[tool(description = "Search the intervention database by keyword relevance. Returns ranked matches with scores and the catalog terms that fired, without calling the model.")]
    async fn search_interventions(
        &self,
        Parameters(params): Parameters<SearchInterventionsParams>,
    ) -> Result<Json<SearchInterventionsResponse>, String> {
        let query = params.query.trim().to_string();
        if query.is_empty() {
            return Err("query must not be empty".to_string());
        }

        let limit = params.limit.unwrap_or(5).min(MAX_TOP_K as u32) as usize;
        let matches = self.ranked_matches(&query, limit).await;
        let results = matches
            .iter()
            .filter_map(|m| self.match_summary(m))
            .collect();

        Ok(Json(SearchInterventionsResponse { results }))
    }

    #[tool(description = "Get the full record of a specific intervention by ID.")]
    async fn get_intervention(
        &self,
        Parameters(params): Parameters<GetInterventionParams>,
    ) -> Result<Json<InterventionDetailResponse>, String> {
        let intervention_id = params.intervention_id.trim().to_string();
        if intervention_id.is_empty() {
            return Err("intervention_id must not be empty".to_string());
        }

        let record = self
            .catalog
            .get(&intervention_id)
            .ok_or_else(|| format!("intervention not found: {intervention_id}"))?;

        Ok(Json(to_api_detail(record)))
    }

    #[tool(description = "List all interventions in a category such as 'Traffic Signs' or 'Road Markings'.")]
    async fn list_category(
        &self,
        Parameters(params): Parameters<ListCategoryParams>,
    ) -> Result<Json<CategoryListResponse>, String> {
        let category = params.category.trim().to_string();
        if category.is_empty() {
            return Err("category must not be empty".to_string());
        }

        let records = self.catalog.in_category(&category);
        if records.is_empty() {
            let available: Vec<String> = self
                .catalog
                .categories()
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            return Err(format!(
                "unknown category: '{category}'. Available categories: {}",
                available.join(", ")
            ));
        }

        let interventions = records
            .iter()
            .map(|r| InterventionSummary {
                id: r.id.clone(),
                title: r.title.clone(),
                problem_type: r.problem_type.clone(),
            })
            .collect();

        Ok(Json(CategoryListResponse {
            category: CategoryInfo {
                name: records[0].category.clone(),
                intervention_count: records.len(),
            },
            interventions,
        }))
    }

    #[tool(description = "Build a compliance checklist (standard reference, priority, cost band, timeline) for the given intervention IDs.")]
    async fn compliance_checklist(
        &self,
        Parameters(params): Parameters<ComplianceChecklistParams>,
    ) -> Result<Json<ComplianceChecklistResponse>, String> {
        if params.intervention_ids.is_empty() {
            return Err("intervention_ids must not be empty".to_string());
        }

        let mut records = Vec::with_capacity(params.intervention_ids.len());
        let mut unknown = Vec::new();
        for id in &params.intervention_ids {
            match self.catalog.get(id.trim()) {
                Some(record) => records.push(record),
                None => unknown.push(id.clone()),
            }
        }
        if !unknown.is_empty() {
            return Err(format!("unknown intervention ids: {}", unknown.join(", ")));
        }

        Ok(Json(build_checklist(&records)))
    }

    #[tool(description = "Usage dashboard: total queries and the most recommended problem types, categories, and interventions.")]
    async fn get_analytics(&self) -> Result<Json<DashboardStatsResponse>, String> {
        Ok(Json(self.analytics.dashboard().await))
    }

    #[tool(description = "System status: catalog size, Ollama model availability, Redis availability.")]
    async fn status(&self) -> Result<Json<StatusResponse>, String> {
        let ollama_connected = self.ollama.is_model_available().await;
        let redis_available = self.redis.is_available().await;
        Ok(Json(StatusResponse {
            intervention_count: self.catalog.len(),
            ollama_model: self.ollama.config().model.clone(),
            ollama_connected,
            redis_available,
        }))
    }

    #[tool(description = "Trace a problem description through the matcher: the normalized query and the per-record scores with the terms that fired.")]
    async fn debug_match(
        &self,
        Parameters(params): Parameters<DebugMatchParams>,
    ) -> Result<Json<DebugMatchResponse>, String> {
        let problem = params.problem.trim().to_string();
        if problem.is_empty() {
            return Err("problem must not be empty".to_string());
        }

        let candidates = self
            .matcher
            .match_query(&problem, DEBUG_CANDIDATES)
            .iter()
            .filter_map(|m| {
                let record = self.catalog.records().get(m.index)?;
                Some(DebugCandidate {
                    id: record.id.clone(),
                    title: record.title.clone(),
                    score: m.score,
                    matched_terms: m.matched_terms.clone(),
                })
            })
            .collect();

        Ok(Json(DebugMatchResponse {
            normalized_query: self.matcher.normalized(&problem),
            candidates,
        }))
    }
}

fn to_api_detail(record: &InterventionRecord) -> InterventionDetailResponse {
    InterventionDetailResponse {
        id: record.id.clone(),
        title: record.title.clone(),
        problem_type: record.problem_type.clone(),
        category: record.category.clone(),
        keywords: record.keywords.clone(),
        road_types: record.road_types.clone(),
        environments: record.environments.clone(),
        standard_reference: record.standard_reference(),
        description: record.description.clone(),
        implementation_guidance: record.implementation_guidance.clone(),
    }
}

#[tool_handler]
impl ServerHandler for RoadSafetyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "road-safety".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Road-safety intervention recommender. Use report_problem with a free-text \
problem description to get an answer with IRC-cited interventions; \
search_interventions/get_intervention/list_category to browse the database; \
compliance_checklist for follow-up paperwork; status and get_analytics for \
operations."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RoadSafetyServer;

    #[test]
    fn tools_publish_output_schemas() {
        let tools = RoadSafetyServer::tool_router().list_all();
        for name in [
            "report_problem",
            "search_interventions",
            "get_intervention",
            "list_category",
            "compliance_checklist",
            "get_analytics",
            "status",
            "debug_match",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }
}
