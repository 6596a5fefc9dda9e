//! Language-model provider for the ChatGPT-backed Codex Responses endpoint.
//!
//! Callers build a [`CodexProvider`] from [`ProviderSettings`], ask it for a
//! [`CodexModel`], and drive it through the [`LanguageModel`] trait.

pub mod auth;
pub mod config;
pub mod error;
pub mod paths;
pub mod prompt;
pub mod provider;

pub use auth::{CredentialSource, Credentials, FileCredentialSource, StaticCredentials};
pub use config::ProviderSettings;
pub use error::CodexError;
pub use prompt::{
    AssistantPart, DataContent, PromptMessage, ToolChoice, ToolDefinition, ToolResultOutput,
    ToolResultPart, UserPart,
};
pub use provider::{
    CallOptions, CodexModel, CodexProvider, CodexProviderBuilder, Content, FinishReason,
    GenerateResult, InstructionTable, LanguageModel, ModelMatch, ModelSettings, PartStream,
    ReasoningSetting, ResponseFormat, ResponseMetadata, StreamPart, StreamResponse,
    SystemMessageMode, ToolCall, Usage, UsageHandle, Warning,
};
