use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::history::HistoryLedger;
use crate::model::{Audience, GenerationMode, HistoryItem, Intent, Rule, Variant};
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct VoiceGuidelinesServer {
    orchestrator: Arc<Orchestrator>,
    history: Arc<HistoryLedger>,
    tool_router: ToolRouter<VoiceGuidelinesServer>,
}

impl VoiceGuidelinesServer {
    pub fn new(orchestrator: Arc<Orchestrator>, history: Arc<HistoryLedger>) -> Self {
        Self {
            orchestrator,
            history,
            tool_router: Self::tool_router(),
        }
    }

    /// Record text the host has just applied to `target_id`, stamped with the loaded
    /// corpus version.
    pub async fn apply_history(&self, target_id: &str, text: &str) -> Result<Vec<HistoryItem>, AppError> {
        let dataset_version = self.orchestrator.index().dataset_version();
        self.history.append(target_id, text, dataset_version).await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RewriteTextParams {
    /// The UI string to rewrite.
    text: String,
    /// Functional role of the string: cta, tooltip, error, helper, label, dialog-title, voice, or general.
    intent: Intent,
    /// Target reader: general, end-user, or it-admin (default: general).
    audience: Option<Audience>,
    /// Free-form instructions that take priority over the general guidance.
    instructions: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ApplyTextParams {
    /// Host identifier of the element whose text was replaced.
    target_id: String,
    /// The text that was applied.
    text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetHistoryParams {
    target_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SelectRulesParams {
    intent: Intent,
    audience: Option<Audience>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetRuleParams {
    /// Stable rule ID such as "CTA-VERB".
    rule_id: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct RewriteTextResponse {
    variants: Vec<Variant>,
    /// "fallback" means the generation service was unavailable and the variants are offline rewrites.
    mode: GenerationMode,
    dataset_version: String,
    unknown_rule_ids: Vec<String>,
    fallback_reason: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    target_id: String,
    items: Vec<HistoryItem>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SelectRulesResponse {
    dataset_version: String,
    rules: Vec<Rule>,
}

#[tool_router]
impl VoiceGuidelinesServer {
    #[tool(description = "Rewrite a short UI string to follow the brand voice guide. Always returns three ranked variants with rationale and cited rule IDs; mode is 'fallback' when the generation service was unavailable.")]
    async fn rewrite_text(
        &self,
        Parameters(params): Parameters<RewriteTextParams>,
    ) -> Result<Json<RewriteTextResponse>, String> {
        let outcome = self
            .orchestrator
            .generate(
                params.text.trim(),
                params.intent,
                params.audience.unwrap_or(Audience::General),
                params.instructions.as_deref(),
            )
            .await;

        Ok(Json(RewriteTextResponse {
            variants: outcome.variants.into_vec(),
            mode: outcome.mode,
            dataset_version: self.orchestrator.index().dataset_version().to_string(),
            unknown_rule_ids: outcome.unknown_rule_ids,
            fallback_reason: outcome.fallback_reason,
        }))
    }

    #[tool(description = "Record that a variant was applied to a target element. Keeps the most recent entries per target.")]
    async fn apply_text(
        &self,
        Parameters(params): Parameters<ApplyTextParams>,
    ) -> Result<Json<HistoryResponse>, String> {
        let target_id = params.target_id.trim().to_string();
        if target_id.is_empty() {
            return Err("target_id must not be empty".to_string());
        }
        if params.text.trim().is_empty() {
            return Err("text must not be empty".to_string());
        }

        let items = self
            .apply_history(&target_id, &params.text)
            .await
            .map_err(|e| format!("apply failed: {e}"))?;
        Ok(Json(HistoryResponse { target_id, items }))
    }

    #[tool(description = "Get the recently applied texts for a target element, oldest first.")]
    async fn get_history(
        &self,
        Parameters(params): Parameters<GetHistoryParams>,
    ) -> Result<Json<HistoryResponse>, String> {
        let target_id = params.target_id.trim().to_string();
        if target_id.is_empty() {
            return Err("target_id must not be empty".to_string());
        }
        let items = self
            .history
            .recent(&target_id)
            .await
            .map_err(|e| format!("history lookup failed: {e}"))?;
        Ok(Json(HistoryResponse { target_id, items }))
    }

    #[tool(description = "Show which voice rules would be used for an intent and audience, in prompt order.")]
    async fn select_rules(
        &self,
        Parameters(params): Parameters<SelectRulesParams>,
    ) -> Result<Json<SelectRulesResponse>, String> {
        let audience = params.audience.unwrap_or(Audience::General);
        let rules = self
            .orchestrator
            .selector()
            .select(params.intent, audience)
            .into_iter()
            .cloned()
            .collect();
        Ok(Json(SelectRulesResponse {
            dataset_version: self.orchestrator.index().dataset_version().to_string(),
            rules,
        }))
    }

    #[tool(description = "Get a voice rule by ID (e.g. 'CTA-VERB').")]
    async fn get_rule(
        &self,
        Parameters(params): Parameters<GetRuleParams>,
    ) -> Result<Json<Rule>, String> {
        let rule_id = params.rule_id.trim();
        if rule_id.is_empty() {
            return Err("rule_id must not be empty".to_string());
        }
        let index = self.orchestrator.index();
        index
            .get(rule_id)
            .cloned()
            .map(Json)
            .ok_or_else(|| format!("rule not found: {rule_id}"))
    }
}

#[tool_handler]
impl ServerHandler for VoiceGuidelinesServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "voice-guidelines".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Brand voice MCP server. Use rewrite_text to get three guideline-backed rewrites \
                 of a UI string (buttons, tooltips, errors, labels). After the host applies one, \
                 call apply_text so it is recorded in the element's history; get_history returns \
                 it. select_rules and get_rule show the guidance behind a rewrite."
                    .to_string(),
            ),
        }
    }
}
