//! Prompt template definitions and context

use std::collections::HashMap;

/// Judge prompt template with ordered, optionally conditional sections
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Template name/ID
    pub name: String,

    /// System message sent ahead of the rendered sections
    pub system_role: Option<String>,

    /// Heading placed above few-shot examples, when any are supplied
    pub examples_heading: String,

    /// Template sections (ordered)
    pub sections: Vec<PromptSection>,
}

fn default_examples_heading() -> String {
    "Expert Examples".to_string()
}

/// A section in the prompt template
#[derive(Debug, Clone)]
pub struct PromptSection {
    /// Section title (e.g., "User Query", "Agent Response")
    pub title: String,

    /// Section content template with {{variables}}
    pub content: String,

    /// Skip the section when it renders to whitespace
    pub optional: bool,

    /// Context key that must be present (or absent with a `!` prefix)
    pub condition: Option<String>,
}

/// Expert demonstration rendered ahead of the graded response
#[derive(Debug, Clone, PartialEq)]
pub struct FewShotExample {
    pub query: String,
    pub response: String,
    pub key_points: Vec<String>,
    pub reasoning: Option<String>,
    pub quality_score: Option<f64>,
}

/// Context for rendering a template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Condition is a variable name, optionally negated with `!`
    pub fn check_condition(&self, condition: &str) -> bool {
        if let Some(var_name) = condition.strip_prefix('!') {
            !self.variables.contains_key(var_name)
        } else {
            self.variables.contains_key(condition)
        }
    }
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_role: None,
            examples_heading: default_examples_heading(),
            sections: Vec::new(),
        }
    }

    pub fn with_system_role(mut self, role: impl Into<String>) -> Self {
        self.system_role = Some(role.into());
        self
    }

    pub fn with_examples_heading(mut self, heading: impl Into<String>) -> Self {
        self.examples_heading = heading.into();
        self
    }

    pub fn with_section(mut self, section: PromptSection) -> Self {
        self.sections.push(section);
        self
    }
}

impl PromptSection {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            optional: false,
            condition: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

impl FewShotExample {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
            key_points: Vec::new(),
            reasoning: None,
            quality_score: None,
        }
    }

    pub fn with_key_points(mut self, key_points: Vec<String>) -> Self {
        self.key_points = key_points;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }
}

impl From<&crate::bank::ExpertExample> for FewShotExample {
    fn from(example: &crate::bank::ExpertExample) -> Self {
        Self {
            query: example.query_text.clone(),
            response: example.expert_response.clone(),
            key_points: example.key_points.clone(),
            reasoning: example.expert_reasoning.clone(),
            quality_score: example.quality_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_creation() {
        let template = PromptTemplate::new("judge")
            .with_system_role("You are an evaluator")
            .with_section(PromptSection::new("Query", "{{query}}"))
            .with_section(PromptSection::new("Response", "{{response}}"));

        assert_eq!(template.name, "judge");
        assert_eq!(template.sections.len(), 2);
        assert!(template.system_role.is_some());
        assert_eq!(template.examples_heading, "Expert Examples");
    }

    #[test]
    fn test_condition_checking() {
        let mut context = PromptContext::new();
        context.set("has_reference", "true");

        assert!(context.check_condition("has_reference"));
        assert!(!context.check_condition("!has_reference"));
        assert!(!context.check_condition("has_context"));
        assert!(context.check_condition("!has_context"));
    }

    #[test]
    fn test_few_shot_from_expert_example() {
        let expert = crate::bank::ExpertExample {
            id: "ea-1".into(),
            category: crate::category::Category::ErrorAnalysis,
            query_text: "Pod OOMKilled".into(),
            expert_response: "Raise the memory limit".into(),
            expert_reasoning: Some("Limit too low".into()),
            key_points: vec!["memory limit".into()],
            quality_score: Some(0.9),
            source: Default::default(),
        };

        let shot = FewShotExample::from(&expert);
        assert_eq!(shot.query, "Pod OOMKilled");
        assert_eq!(shot.reasoning.as_deref(), Some("Limit too low"));
        assert_eq!(shot.quality_score, Some(0.9));
    }
}
