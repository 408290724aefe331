//! Prompt templates for the model-backed judges

pub mod engine;
pub mod judge;
pub mod template;

pub use engine::{PromptEngine, RenderedPrompt};
pub use judge::{example_grounded_template, pure_model_template};
pub use template::{FewShotExample, PromptContext, PromptSection, PromptTemplate};
