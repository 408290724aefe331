//! Built-in judge templates

use super::template::{PromptSection, PromptTemplate};

const SYSTEM_ROLE: &str = "You are a senior Kubernetes and search-cluster operations engineer \
reviewing answers given by a support agent. Grade strictly and consistently.";

const OUTPUT_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
```json
{
  "accuracy": <number between 0 and 1>,
  "relevance": <number between 0 and 1>,
  "completeness": <number between 0 and 1>,
  "rationale": "<two or three sentences explaining the grade>",
  "missing_points": ["<important point the response omitted>", "..."]
}
```"#;

fn shared_sections(template: PromptTemplate) -> PromptTemplate {
    template
        .with_section(PromptSection::new("Query Category", "{{category}}"))
        .with_section(PromptSection::new("User Query", "{{query}}"))
        .with_section(
            PromptSection::new("Cluster Context", "{{context}}")
                .with_condition("has_context")
                .optional(),
        )
        .with_section(PromptSection::new("Agent Response", "{{response}}"))
        .with_section(
            PromptSection::new("Expected Answer", "{{expected_answer}}")
                .with_condition("has_reference"),
        )
        .with_section(
            PromptSection::new("Key Points To Cover", "{{key_points}}")
                .with_condition("has_reference")
                .optional(),
        )
}

/// Template that grades a response against curated expert examples
pub fn example_grounded_template() -> PromptTemplate {
    let template = PromptTemplate::new("example_grounded")
        .with_system_role(SYSTEM_ROLE)
        .with_examples_heading("Expert Examples For This Category");

    shared_sections(template)
        .with_section(PromptSection::new(
            "Instructions",
            "Use the expert examples above as the quality bar for this category. \
Score accuracy by whether the technical claims and commands are correct, relevance by \
whether the response addresses the user's actual problem, and completeness by how many \
of the key points an expert would cover are present. List any such points that are missing.",
        ))
        .with_section(PromptSection::new("Output Format", OUTPUT_FORMAT))
}

/// Template that grades a response using the model's own domain knowledge
pub fn pure_model_template() -> PromptTemplate {
    let template = PromptTemplate::new("pure_model")
        .with_system_role(SYSTEM_ROLE);

    shared_sections(template)
        .with_section(PromptSection::new(
            "Instructions",
            "Judge the response from your own knowledge of Kubernetes and search cluster \
operations. Score accuracy by whether the technical claims and commands are correct, \
relevance by whether the response addresses the user's actual problem, and completeness \
by whether it covers diagnosis, remediation and prevention where applicable. List \
important points that are missing.",
        ))
        .with_section(PromptSection::new("Output Format", OUTPUT_FORMAT))
}
