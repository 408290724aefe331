//! Model-backed score models

use super::parse::parse_scores;
use super::{ScoreModel, ScoreRequest};
use crate::error::EvalResult;
use crate::prompt::{
    example_grounded_template, pure_model_template, FewShotExample, PromptContext, PromptEngine,
    PromptTemplate,
};
use crate::types::{ScorePayload, StrategyKind};
use async_trait::async_trait;
use kubeval_llm::{CompletionClient, CompletionRequest, Message};
use std::sync::Arc;
use tracing::debug;

/// Completion parameters for judge calls
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeSettings {
    /// Model identifier; empty means the client's default
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Renders a judge prompt, calls the model once and parses the verdict
pub struct ModelJudge {
    client: Arc<dyn CompletionClient>,
    settings: JudgeSettings,
}

impl ModelJudge {
    pub fn new(client: Arc<dyn CompletionClient>, settings: JudgeSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    pub async fn judge(
        &self,
        template: &PromptTemplate,
        request: &ScoreRequest<'_>,
    ) -> EvalResult<ScorePayload> {
        let examples: Vec<FewShotExample> = request
            .examples
            .iter()
            .map(|e| FewShotExample::from(e.as_ref()))
            .collect();
        let prompt = PromptEngine::render(template, &build_context(request), &examples)?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt.user));

        let completion = CompletionRequest::new(messages, self.settings.model.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        debug!(
            template = %template.name,
            backend = self.client.backend_name(),
            examples = examples.len(),
            "Requesting judge completion"
        );
        let response = self.client.complete(completion).await?;

        let parsed = parse_scores(&response.content)?;
        Ok(ScorePayload::new(
            parsed.accuracy,
            parsed.relevance,
            parsed.completeness,
            parsed.rationale,
            request.weights,
        )
        .with_missing_points(parsed.missing_points))
    }
}

fn build_context(request: &ScoreRequest<'_>) -> PromptContext {
    let mut context = PromptContext::new();
    context
        .set("category", request.category.as_str())
        .set("query", request.query.text.as_str())
        .set("response", request.response.text.as_str());

    if !request.query.context.is_empty() {
        let lines: Vec<String> = request
            .query
            .context
            .iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => format!("{}: {}", key, s),
                other => format!("{}: {}", key, other),
            })
            .collect();
        context.set("has_context", "true").set("context", lines.join("\n"));
    }

    if let Some(reference) = request.reference {
        let mut expected = reference.expected_answer.clone();
        if !reference.acceptable_variations.is_empty() {
            expected.push_str("\n\nAlso acceptable:\n");
            for variation in &reference.acceptable_variations {
                expected.push_str(&format!("- {}\n", variation));
            }
        }
        let key_points = reference
            .key_points
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n");
        context
            .set("has_reference", "true")
            .set("expected_answer", expected.trim_end())
            .set("key_points", key_points);
    }

    context
}

/// Grades against curated expert examples of the query's category
///
/// With no examples available it grades exactly like [`PureModelScoreModel`].
pub struct ExampleGroundedScoreModel {
    judge: ModelJudge,
    grounded: PromptTemplate,
    fallback: PromptTemplate,
}

impl ExampleGroundedScoreModel {
    pub fn new(judge: ModelJudge) -> Self {
        Self {
            judge,
            grounded: example_grounded_template(),
            fallback: pure_model_template(),
        }
    }
}

#[async_trait]
impl ScoreModel for ExampleGroundedScoreModel {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExampleGrounded
    }

    async fn score(&self, request: &ScoreRequest<'_>) -> EvalResult<ScorePayload> {
        let template = if request.examples.is_empty() {
            &self.fallback
        } else {
            &self.grounded
        };
        self.judge.judge(template, request).await
    }
}

/// Grades with the model's own domain knowledge only
pub struct PureModelScoreModel {
    judge: ModelJudge,
    template: PromptTemplate,
}

impl PureModelScoreModel {
    pub fn new(judge: ModelJudge) -> Self {
        Self {
            judge,
            template: pure_model_template(),
        }
    }
}

#[async_trait]
impl ScoreModel for PureModelScoreModel {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PureModel
    }

    async fn score(&self, request: &ScoreRequest<'_>) -> EvalResult<ScorePayload> {
        self.judge.judge(&self.template, request).await
    }
}
