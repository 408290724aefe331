#![allow(dead_code)]

use async_trait::async_trait;
use kubeval_core::{
    AgentResponse, EvaluationItem, EvaluatorType, ExampleBank, Query, RunConfig,
};
use kubeval_llm::{
    CompletionClient, CompletionRequest, CompletionResponse, LLMError, LLMResult, TokenUsage,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

static SCORE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[score:([0-9.]+)\]\]").unwrap());

/// Judge double keyed on markers embedded in the agent response
///
/// `[[score:X]]` yields a verdict with every sub-score X, `[[garbage]]`
/// yields unparseable text and `[[timeout]]` fails with a timeout. Replies
/// depend only on the prompt, so results do not depend on scheduling.
#[derive(Default)]
pub struct MarkerJudge {
    calls: AtomicU32,
    delay: Option<Duration>,
    cancel_on_call: Option<(u32, CancellationToken)>,
}

impl MarkerJudge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    /// Cancel `token` during call number `call` and never answer that call
    pub fn cancelling_on(call: u32, token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            cancel_on_call: Some((call, token)),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for MarkerJudge {
    fn backend_name(&self) -> &str {
        "marker"
    }

    async fn complete(&self, request: CompletionRequest) -> LLMResult<CompletionResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_on_call {
            if call == *at {
                token.cancel();
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if prompt.contains("[[timeout]]") {
            return Err(LLMError::TimeoutError);
        }
        let content = if prompt.contains("[[garbage]]") {
            "This answer seems fine overall.".to_string()
        } else {
            let score = SCORE_MARKER
                .captures(&prompt)
                .and_then(|c| c[1].parse::<f64>().ok())
                .unwrap_or(0.5);
            format!(
                "```json\n{{\"accuracy\": {s}, \"relevance\": {s}, \"completeness\": {s}, \"overall\": 1.0, \"rationale\": \"Graded {s}. Covers the basics.\"}}\n```",
                s = score
            )
        };

        Ok(CompletionResponse {
            content,
            finish_reason: "stop".into(),
            usage: TokenUsage::default(),
            model: "marker".into(),
        })
    }
}

pub fn item(id: &str, query: &str, response: &str) -> EvaluationItem {
    EvaluationItem::new(Query::new(id, query), AgentResponse::new(id, response))
}

/// Config for a model-backed run with instant retries
pub fn llm_config(concurrency: usize) -> RunConfig {
    let mut config = RunConfig {
        evaluator_type: EvaluatorType::Llm,
        concurrency,
        ..Default::default()
    };
    config.model.base_url = Some("http://judge.invalid/v1".into());
    config.model.model = Some("marker".into());
    config.retry.base_delay_ms = 0;
    config.retry.max_delay_ms = 0;
    config
}

pub fn empty_bank() -> Arc<ExampleBank> {
    Arc::new(ExampleBank::new())
}
