/// Generation orchestrator: select → build → call → parse, with offline fallback.
///
/// `generate` never fails. Any error on the remote path (timeout, transport, non-2xx,
/// empty or unparsable output) switches to `fallback_variants` immediately; there are
/// no retries. The path taken is logged and published on a watch channel so a host can
/// show an offline indicator.
///
/// Dropping the `generate` future cancels the in-flight call. Nothing is persisted
/// during generation, so cancellation leaves no partial state behind.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::GenerationBackend;
use crate::error::GenerationError;
use crate::fallback::fallback_variants;
use crate::model::{Audience, GenerationMode, Intent, VariantSet};
use crate::prompt::{build_request, render_messages};
use crate::repository::RuleIndex;
use crate::selector::RuleSelector;
use crate::variants::parse_variants;

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Selecting,
    Building,
    Calling,
    Parsing,
    Done(GenerationMode),
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub variants: VariantSet,
    pub mode: GenerationMode,
    /// Cited rule ids that are not in the loaded corpus. Reported, never removed.
    pub unknown_rule_ids: Vec<String>,
    /// Why the remote path was abandoned, when it was
    pub fallback_reason: Option<String>,
}

pub struct Orchestrator {
    selector: RuleSelector,
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
    mode_tx: watch::Sender<Option<GenerationMode>>,
}

impl Orchestrator {
    pub fn new(selector: RuleSelector, backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        let (mode_tx, _) = watch::channel(None);
        Self {
            selector,
            backend,
            timeout,
            mode_tx,
        }
    }

    pub fn index(&self) -> &RuleIndex {
        self.selector.index()
    }

    pub fn selector(&self) -> &RuleSelector {
        &self.selector
    }

    /// Mode of the most recent completed generation; `None` until the first one.
    pub fn subscribe_mode(&self) -> watch::Receiver<Option<GenerationMode>> {
        self.mode_tx.subscribe()
    }

    pub async fn generate(
        &self,
        original_text: &str,
        intent: Intent,
        audience: Audience,
        instructions: Option<&str>,
    ) -> GenerationOutcome {
        let mut phase = GenerationPhase::Idle;
        let result = self
            .generate_remote(&mut phase, original_text, intent, audience, instructions)
            .await;
        let outcome = match result {
            Ok(variants) => {
                let unknown_rule_ids = self.unknown_rule_ids(&variants);
                if !unknown_rule_ids.is_empty() {
                    warn!(?unknown_rule_ids, "generator cited rules that are not in the corpus");
                }
                GenerationOutcome {
                    variants,
                    mode: GenerationMode::Remote,
                    unknown_rule_ids,
                    fallback_reason: None,
                }
            }
            Err(e) => {
                warn!(error = %e, ?phase, "generation failed, using offline fallback");
                GenerationOutcome {
                    variants: fallback_variants(original_text),
                    mode: GenerationMode::Fallback,
                    unknown_rule_ids: Vec::new(),
                    fallback_reason: Some(e.to_string()),
                }
            }
        };

        advance(&mut phase, GenerationPhase::Done(outcome.mode));
        info!(mode = ?outcome.mode, %intent, %audience, "generation complete");
        self.mode_tx.send_replace(Some(outcome.mode));
        outcome
    }

    async fn generate_remote(
        &self,
        phase: &mut GenerationPhase,
        original_text: &str,
        intent: Intent,
        audience: Audience,
        instructions: Option<&str>,
    ) -> Result<VariantSet, GenerationError> {
        advance(phase, GenerationPhase::Selecting);
        let rules = self.selector.select(intent, audience);

        advance(phase, GenerationPhase::Building);
        let request = build_request(original_text, intent, audience, &rules, instructions);
        let messages = render_messages(&request);

        advance(phase, GenerationPhase::Calling);
        let raw = tokio::time::timeout(self.timeout, self.backend.complete(messages))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;

        advance(phase, GenerationPhase::Parsing);
        Ok(parse_variants(&raw)?)
    }

    fn unknown_rule_ids(&self, variants: &VariantSet) -> Vec<String> {
        let index = self.selector.index();
        let mut seen = HashSet::new();
        variants
            .iter()
            .flat_map(|v| v.applied_rules.iter())
            .filter(|id| !index.contains(id) && seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

fn advance(phase: &mut GenerationPhase, next: GenerationPhase) {
    debug!(from = ?*phase, to = ?next, "generation phase");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mcp_common::openai::{Message, OpenAiClientConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::backend::OpenAiBackend;
    use crate::fallback::FALLBACK_RATIONALE_PREFIX;
    use crate::model::Category;
    use crate::repository::tests::sample_index;
    use crate::selector::DEFAULT_MAX_RULES;

    const ORIGINAL: &str = "Click here to get started now please";

    const REMOTE_RESPONSE: &str = r#"{"variants":[
        {"text":"Get started","rationale":"Leads with the outcome and drops filler.","appliedRules":["CTA-VERB","VOICE-POLITE"]},
        {"text":"Start setup","rationale":"Short and specific.","appliedRules":["CTA-SHORT"]},
        {"text":"Begin","rationale":"One strong verb.","appliedRules":["CTA-VERB","CTA-GHOST"]}
    ]}"#;

    /// Returns a canned result and records the prompt it was sent.
    struct StubBackend {
        reply: Result<String, fn() -> GenerationError>,
        delay: Duration,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl StubBackend {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn err(make: fn() -> GenerationError) -> Self {
            Self {
                reply: Err(make),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::ok(REMOTE_RESPONSE)
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for StubBackend {
        async fn complete(&self, messages: Vec<Message>) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(messages);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn orchestrator(backend: Arc<StubBackend>, timeout: Duration) -> Orchestrator {
        let selector = RuleSelector::new(Arc::new(sample_index()), DEFAULT_MAX_RULES);
        Orchestrator::new(selector, backend, timeout)
    }

    fn assert_fallback(outcome: &GenerationOutcome) {
        assert_eq!(outcome.mode, GenerationMode::Fallback);
        assert!(outcome.fallback_reason.is_some());
        assert_eq!(outcome.variants.iter().count(), 3);
        for v in outcome.variants.iter() {
            assert!(v.rationale.starts_with(FALLBACK_RATIONALE_PREFIX));
            assert!(v.applied_rules.is_empty());
        }
    }

    #[tokio::test]
    async fn remote_path_returns_parsed_variants() {
        let backend = Arc::new(StubBackend::ok(REMOTE_RESPONSE));
        let orch = orchestrator(Arc::clone(&backend), DEFAULT_GENERATION_TIMEOUT);

        let outcome = orch
            .generate(ORIGINAL, Category::Cta, Audience::EndUser, None)
            .await;

        assert_eq!(outcome.mode, GenerationMode::Remote);
        assert_eq!(outcome.fallback_reason, None);
        let texts: HashSet<&str> = outcome.variants.iter().map(|v| v.text.as_str()).collect();
        assert_eq!(texts.len(), 3);
        for v in outcome.variants.iter() {
            assert!(!v.text.is_empty());
            assert_ne!(v.text, ORIGINAL);
            assert!(!v.rationale.is_empty());
        }
        assert_eq!(outcome.unknown_rule_ids, ["CTA-GHOST"]);
        assert_eq!(
            outcome.variants.into_vec()[2].applied_rules,
            ["CTA-VERB", "CTA-GHOST"]
        );
    }

    #[tokio::test]
    async fn prompt_carries_selected_rules_and_instructions() {
        let backend = Arc::new(StubBackend::ok(REMOTE_RESPONSE));
        let orch = orchestrator(Arc::clone(&backend), DEFAULT_GENERATION_TIMEOUT);

        orch.generate(ORIGINAL, Category::Cta, Audience::EndUser, Some("Mention onboarding"))
            .await;

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "exactly one call, no retries");
        let user = &seen[0][1].content;
        for id in ["CTA-VERB", "CTA-SHORT", "VOICE-PLAIN", "VOICE-POLITE", "GEN-CASE"] {
            assert!(user.contains(&format!("[{id}]")), "missing {id}");
        }
        assert!(!user.contains("[CTA-ADMIN]"));
        assert!(user.contains("Mention onboarding"));
    }

    #[tokio::test]
    async fn timeout_falls_back() {
        let backend = Arc::new(StubBackend::slow(Duration::from_secs(30)));
        let orch = orchestrator(backend, Duration::from_millis(20));
        let mut mode = orch.subscribe_mode();

        let outcome = orch
            .generate(ORIGINAL, Category::Cta, Audience::EndUser, None)
            .await;

        assert_fallback(&outcome);
        assert!(outcome.fallback_reason.unwrap().contains("timed out"));
        assert!(mode.has_changed().unwrap());
        assert_eq!(*mode.borrow_and_update(), Some(GenerationMode::Fallback));
    }

    #[tokio::test]
    async fn malformed_response_falls_back() {
        for reply in [
            "I'd suggest 'Get started'.",
            r#"{"variants":[{"text":"Only one","rationale":"r"}]}"#,
            r#"{"variants":[{"text":"A","rationale":""},{"text":"B","rationale":"r"},{"text":"C","rationale":"r"}]}"#,
        ] {
            let orch = orchestrator(Arc::new(StubBackend::ok(reply)), DEFAULT_GENERATION_TIMEOUT);
            let outcome = orch
                .generate(ORIGINAL, Category::Cta, Audience::EndUser, None)
                .await;
            assert_fallback(&outcome);
        }
    }

    #[tokio::test]
    async fn backend_errors_fall_back() {
        for make in [
            (|| GenerationError::EmptyCompletion) as fn() -> GenerationError,
            || GenerationError::Timeout(Duration::from_secs(1)),
        ] {
            let orch = orchestrator(Arc::new(StubBackend::err(make)), DEFAULT_GENERATION_TIMEOUT);
            let outcome = orch
                .generate("Save", Category::Label, Audience::ItAdmin, None)
                .await;
            assert_fallback(&outcome);
        }
    }

    #[tokio::test]
    async fn upstream_error_status_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({ "error": { "message": "overloaded" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = OpenAiClientConfig {
            base_url: server.uri(),
            default_timeout: Duration::from_secs(30),
            max_error_body_bytes: 1024,
        };
        let backend = OpenAiBackend::connect(
            config,
            "local-model".to_string(),
            None,
            DEFAULT_GENERATION_TIMEOUT,
        )
        .expect("client builds");
        let selector = RuleSelector::new(Arc::new(sample_index()), DEFAULT_MAX_RULES);
        let orch = Orchestrator::new(selector, Arc::new(backend), DEFAULT_GENERATION_TIMEOUT);
        let mode = orch.subscribe_mode();

        let outcome = orch
            .generate(ORIGINAL, Category::Cta, Audience::EndUser, None)
            .await;

        assert_fallback(&outcome);
        assert!(outcome.fallback_reason.unwrap().contains("overloaded"));
        assert_eq!(*mode.borrow(), Some(GenerationMode::Fallback));
    }

    #[tokio::test]
    async fn mode_flag_tracks_latest_generation() {
        let orch = orchestrator(
            Arc::new(StubBackend::ok(REMOTE_RESPONSE)),
            DEFAULT_GENERATION_TIMEOUT,
        );
        let mode = orch.subscribe_mode();
        assert_eq!(*mode.borrow(), None);

        orch.generate(ORIGINAL, Category::Cta, Audience::General, None)
            .await;
        assert_eq!(*mode.borrow(), Some(GenerationMode::Remote));
    }

    #[tokio::test]
    async fn cancelled_generation_publishes_nothing() {
        let orch = orchestrator(
            Arc::new(StubBackend::slow(Duration::from_secs(30))),
            Duration::from_secs(60),
        );
        let mode = orch.subscribe_mode();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            orch.generate(ORIGINAL, Category::Cta, Audience::EndUser, None),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(*mode.borrow(), None);
    }
}
