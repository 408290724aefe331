//! Prompt template rendering engine

use super::template::{FewShotExample, PromptContext, PromptTemplate};
use crate::error::{EvalError, EvalResult};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{(\w+)\}\}").expect("variable pattern is valid")
});

/// System and user halves of a rendered judge prompt
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: Option<String>,
    pub user: String,
}

/// Prompt rendering engine
pub struct PromptEngine;

impl PromptEngine {
    /// Render a template with context and few-shot examples
    pub fn render(
        template: &PromptTemplate,
        context: &PromptContext,
        examples: &[FewShotExample],
    ) -> EvalResult<RenderedPrompt> {
        let mut output = String::new();

        if !examples.is_empty() {
            output.push_str(&format!("# {}\n\n", template.examples_heading));
            for (i, example) in examples.iter().enumerate() {
                output.push_str(&format!("## Example {}\n", i + 1));
                output.push_str(&format!("Query: {}\n", example.query));
                output.push_str(&format!("Expert response: {}\n", example.response));
                if !example.key_points.is_empty() {
                    output.push_str("Key points:\n");
                    for point in &example.key_points {
                        output.push_str(&format!("- {}\n", point));
                    }
                }
                if let Some(reasoning) = &example.reasoning {
                    output.push_str(&format!("Reasoning: {}\n", reasoning));
                }
                if let Some(score) = example.quality_score {
                    output.push_str(&format!("Quality: {:.2}\n", score));
                }
                output.push('\n');
            }
        }

        for section in &template.sections {
            if let Some(condition) = &section.condition {
                if !context.check_condition(condition) {
                    continue;
                }
            }

            let rendered_content = Self::substitute_variables(&section.content, context)?;
            if section.optional && rendered_content.trim().is_empty() {
                continue;
            }

            output.push_str(&format!("# {}\n", section.title));
            output.push_str(&rendered_content);
            output.push_str("\n\n");
        }

        Ok(RenderedPrompt {
            system: template.system_role.clone(),
            user: output.trim().to_string(),
        })
    }

    /// Substitute {{variables}} in a single pass; inserted values are not rescanned
    fn substitute_variables(content: &str, context: &PromptContext) -> EvalResult<String> {
        if let Some(missing) = VARIABLE
            .captures_iter(content)
            .map(|cap| cap[1].to_string())
            .find(|name| context.get(name).is_none())
        {
            return Err(EvalError::Configuration(format!(
                "Variable '{}' not found in prompt context",
                missing
            )));
        }

        Ok(VARIABLE
            .replace_all(content, |cap: &Captures| {
                context.get(&cap[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::template::PromptSection;

    #[test]
    fn test_basic_rendering() {
        let template = PromptTemplate::new("test")
            .with_section(PromptSection::new("Query", "{{query}}"))
            .with_section(PromptSection::new("Response", "{{response}}"));

        let mut context = PromptContext::new();
        context.set("query", "Why is my pod pending?");
        context.set("response", "Check node capacity");

        let rendered = PromptEngine::render(&template, &context, &[]).unwrap();

        assert!(rendered.system.is_none());
        assert!(rendered.user.starts_with("# Query"));
        assert!(rendered.user.contains("Why is my pod pending?"));
        assert!(rendered.user.contains("# Response\nCheck node capacity"));
    }

    #[test]
    fn test_system_role_is_separate() {
        let template = PromptTemplate::new("test")
            .with_system_role("You are an evaluator")
            .with_section(PromptSection::new("Task", "{{task}}"));

        let mut context = PromptContext::new();
        context.set("task", "Grade it");

        let rendered = PromptEngine::render(&template, &context, &[]).unwrap();
        assert_eq!(rendered.system.as_deref(), Some("You are an evaluator"));
        assert!(!rendered.user.contains("You are an evaluator"));
    }

    #[test]
    fn test_few_shot_examples() {
        let template = PromptTemplate::new("test")
            .with_section(PromptSection::new("Query", "{{query}}"));
        let examples = vec![
            FewShotExample::new("Pod OOMKilled", "Raise limits")
                .with_key_points(vec!["memory limit".into()])
                .with_reasoning("Root cause first"),
            FewShotExample::new("Slow search", "Add replicas").with_quality_score(0.9),
        ];

        let mut context = PromptContext::new();
        context.set("query", "q");

        let rendered = PromptEngine::render(&template, &context, &examples).unwrap();
        assert!(rendered.user.starts_with("# Expert Examples"));
        assert!(rendered.user.contains("## Example 2"));
        assert!(rendered.user.contains("- memory limit"));
        assert!(rendered.user.contains("Reasoning: Root cause first"));
        assert!(rendered.user.contains("Quality: 0.90"));
    }

    #[test]
    fn test_conditional_sections() {
        let template = PromptTemplate::new("test")
            .with_section(PromptSection::new("Query", "{{query}}"))
            .with_section(
                PromptSection::new("Expected Answer", "{{expected}}")
                    .with_condition("has_reference"),
            );

        let mut without = PromptContext::new();
        without.set("query", "q");
        let rendered = PromptEngine::render(&template, &without, &[]).unwrap();
        assert!(!rendered.user.contains("# Expected Answer"));

        let mut with = PromptContext::new();
        with.set("query", "q");
        with.set("has_reference", "true");
        with.set("expected", "Use an HPA");
        let rendered = PromptEngine::render(&template, &with, &[]).unwrap();
        assert!(rendered.user.contains("# Expected Answer\nUse an HPA"));
    }

    #[test]
    fn test_optional_empty_section_is_dropped() {
        let template = PromptTemplate::new("test")
            .with_section(PromptSection::new("Query", "{{query}}"))
            .with_section(PromptSection::new("Context", "{{context}}").optional());

        let mut context = PromptContext::new();
        context.set("query", "q");
        context.set("context", "   ");

        let rendered = PromptEngine::render(&template, &context, &[]).unwrap();
        assert!(!rendered.user.contains("# Context"));
    }

    #[test]
    fn test_missing_variable() {
        let template = PromptTemplate::new("test")
            .with_section(PromptSection::new("Input", "{{missing_var}}"));

        let err = PromptEngine::render(&template, &PromptContext::new(), &[]).unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
        assert!(err.to_string().contains("missing_var"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let template = PromptTemplate::new("test")
            .with_section(PromptSection::new("Response", "{{response}} / {{query}}"));

        let mut context = PromptContext::new();
        context.set("response", "literal {{query}}");
        context.set("query", "q");

        let rendered = PromptEngine::render(&template, &context, &[]).unwrap();
        assert!(rendered.user.contains("literal {{query}} / q"));
    }
}
