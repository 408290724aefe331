//! # kubeval-llm
//!
//! Model invocation boundary for the kubeval judge.
//!
//! The evaluation engine only ever needs one logical operation,
//! `complete(prompt, parameters) -> text`. This crate provides:
//!
//! - Chat message types and the [`CompletionRequest`] / [`CompletionResponse`] pair
//! - The [`CompletionClient`] trait that every backend implements
//! - [`OpenAICompatibleClient`], which talks to any server exposing the
//!   `/chat/completions` route (hosted or in-house)
//! - [`LLMError`] with retriability classification for the caller's retry loop
//!
//! ## Example
//!
//! ```rust,ignore
//! use kubeval_llm::{
//!     ClientSettings, CompletionClient, CompletionRequest, Message, OpenAICompatibleClient,
//! };
//!
//! let client = OpenAICompatibleClient::new(ClientSettings::new(
//!     "http://llm.internal:8000/v1",
//!     "judge-model",
//! ))?;
//! let request = CompletionRequest::new(vec![Message::user("Hello!")], "judge-model");
//! let response = client.complete(request).await?;
//! ```

pub mod error;
pub mod openai;
pub mod provider;

pub use error::{LLMError, LLMResult};
pub use openai::{ClientSettings, OpenAICompatibleClient};
pub use provider::{
    CompletionClient, CompletionRequest, CompletionResponse, Message, Role, TokenUsage,
};
