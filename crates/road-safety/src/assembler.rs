/// Turns ranked matches into the reply shown to the user.
///
/// The structured citation list is always built from the matches; the
/// model-phrased preamble is best-effort. Any Ollama failure (timeout,
/// unreachable host, malformed reply) degrades to a fixed preamble and an
/// `Unavailable` summary flag — it never fails the request.
use std::sync::Arc;

use tracing::{info, warn};

use safety_common::api::{AiSummaryStatus, Citation};
use safety_common::ollama::{GenerateOptions, GenerateRequest, OllamaClient};

use crate::catalog::Catalog;
use crate::model::{MatchResult, Response};

const MAX_CONTEXT_DESCRIPTION_LEN: usize = 400;

const NO_MATCH_ANSWER: &str = "No specific intervention in the database matches this \
problem. Try describing the location, the road users affected, and what is damaged \
or missing (for example \"faded zebra crossing near the school gate\").";

const SUMMARY_UNAVAILABLE_PREAMBLE: &str = "AI summary unavailable. The closest \
interventions from the database are listed below.";

pub struct ResponseAssembler {
    catalog: Arc<Catalog>,
    ollama: Arc<OllamaClient>,
    system_prompt: String,
    stream_summaries: bool,
}

impl ResponseAssembler {
    pub fn new(
        catalog: Arc<Catalog>,
        ollama: Arc<OllamaClient>,
        system_prompt: String,
        stream_summaries: bool,
    ) -> Self {
        Self {
            catalog,
            ollama,
            system_prompt,
            stream_summaries,
        }
    }

    /// Full pipeline step: ask Ollama for a preamble, then assemble.
    /// No matches means no model call at all.
    pub async fn assemble_query(&self, query: &str, matches: &[MatchResult]) -> Response {
        if matches.is_empty() {
            return self.assemble(query, matches, None);
        }
        let summary = self.generate_summary(query, matches).await;
        self.assemble(query, matches, summary)
    }

    /// Pure assembly: deterministic given the same inputs. `summary` is
    /// the model-phrased preamble, if one was obtained.
    pub fn assemble(
        &self,
        _query: &str,
        matches: &[MatchResult],
        summary: Option<String>,
    ) -> Response {
        if matches.is_empty() {
            return Response {
                answer_text: NO_MATCH_ANSWER.to_string(),
                citations: Vec::new(),
                ai_summary: AiSummaryStatus::Skipped,
            };
        }

        let ai_summary = if summary.is_some() {
            AiSummaryStatus::Generated
        } else {
            AiSummaryStatus::Unavailable
        };

        let mut answer_text =
            summary.unwrap_or_else(|| SUMMARY_UNAVAILABLE_PREAMBLE.to_string());
        answer_text.push_str("\n\nQuick Reference Matches:\n");

        let mut citations = Vec::with_capacity(matches.len());
        for (i, m) in matches.iter().enumerate() {
            let Some(record) = self.catalog.records().get(m.index) else {
                continue;
            };
            answer_text.push_str(&format!(
                "\n{}. {} ({})\n   - Problem: {}\n   - Standard: {}\n",
                i + 1,
                record.title,
                record.category,
                record.problem_type,
                record.standard_reference(),
            ));
            citations.push(Citation {
                title: record.title.clone(),
                standard_reference: record.standard_reference(),
                guidance: if record.implementation_guidance.is_empty() {
                    record.description.clone()
                } else {
                    record.implementation_guidance.clone()
                },
            });
        }

        Response {
            answer_text,
            citations,
            ai_summary,
        }
    }

    /// Prompt context over the matched records only, so the prompt stays
    /// bounded regardless of catalog size.
    pub fn build_context(&self, matches: &[MatchResult]) -> String {
        let mut context = String::from("RELEVANT ROAD SAFETY INTERVENTIONS:\n\n");
        for m in matches {
            let Some(record) = self.catalog.records().get(m.index) else {
                continue;
            };
            context.push_str(&format!(
                "{}\n   Problem Type: {}\n   Category: {}\n   Standard: {}\n   Description: {}\n",
                record.title,
                record.problem_type,
                record.category,
                record.standard_reference(),
                truncate(&record.description, MAX_CONTEXT_DESCRIPTION_LEN),
            ));
            context.push_str(&"-".repeat(50));
            context.push('\n');
        }
        context
    }

    async fn generate_summary(&self, query: &str, matches: &[MatchResult]) -> Option<String> {
        let context = self.build_context(matches);
        let prompt = format!(
            "{context}\nUSER QUERY: {query}\n\nPlease analyse the road safety problem and \
recommend appropriate interventions from the database above."
        );
        let request = GenerateRequest {
            model: self.ollama.config().model.clone(),
            prompt,
            system: Some(self.system_prompt.clone()),
            stream: None,
            options: Some(GenerateOptions::deterministic()),
        };

        let result = if self.stream_summaries {
            self.ollama.generate_streaming_aggregate(request, None).await
        } else {
            self.ollama.generate(request, None).await
        };

        match result {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    warn!("ollama returned an empty summary");
                    None
                } else {
                    info!(chars = text.len(), "summary generated");
                    Some(text)
                }
            }
            Err(e) if e.is_timeout() => {
                warn!(error = %e, "summary generation timed out, degrading to structured list");
                None
            }
            Err(e) => {
                warn!(error = %e, "summary generation failed, degrading to structured list");
                None
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
