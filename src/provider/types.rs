use crate::error::CodexError;
use crate::prompt::{PromptMessage, ToolChoice, ToolDefinition};
use futures_core::future::BoxFuture;
use futures_core::stream::BoxStream;
use std::collections::BTreeMap;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// How system messages reach the backend, which has no system role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SystemMessageMode {
    /// Rewrite as a user message tagged with the `system` sender name.
    #[default]
    User,
    /// Drop; the fixed `instructions` field stands in for it.
    System,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json {
        schema: Option<serde_json::Value>,
    },
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub prompt: Vec<PromptMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
    pub response_format: ResponseFormat,
    pub system_message_mode: SystemMessageMode,

    // Accepted for compatibility; the backend ignores all of these.
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub seed: Option<u64>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,

    /// Extra headers, applied after the provider's static headers.
    pub headers: BTreeMap<String, String>,

    pub abort: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new(prompt: Vec<PromptMessage>) -> Self {
        Self {
            prompt,
            ..Default::default()
        }
    }
}

/// Non-fatal anomaly surfaced next to a successful result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnsupportedSetting {
        setting: String,
        details: Option<String>,
    },
    UnsupportedTool {
        tool_name: String,
        details: Option<String>,
    },
    Other {
        message: String,
    },
}

impl Warning {
    pub(crate) fn setting(setting: &str, details: impl Into<String>) -> Self {
        Self::UnsupportedSetting {
            setting: setting.to_string(),
            details: Some(details.into()),
        }
    }

    pub(crate) fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Always `input_tokens + output_tokens`.
    pub total_tokens: u64,
    pub reasoning_tokens: Option<u64>,
    pub cached_input_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool_call_id: String,
    /// Caller-facing name, already mapped back from the backend vocabulary.
    pub tool_name: String,
    /// Raw JSON text as produced by the model.
    pub input: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text { text: String },
    ToolCall(ToolCall),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMetadata {
    pub id: Option<String>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResult {
    pub content: Vec<Content>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub warnings: Vec<Warning>,
    pub response: ResponseMetadata,
}

impl GenerateResult {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Text { text } => Some(text.as_str()),
                Content::ToolCall(_) => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.content.iter().filter_map(|c| match c {
            Content::ToolCall(call) => Some(call),
            Content::Text { .. } => None,
        })
    }
}

/// Normalized live event. A stream always ends with exactly one `Finish`
/// unless the channel fails first.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    TextDelta {
        delta: String,
    },
    ToolInputDelta {
        tool_call_id: String,
        delta: String,
    },
    ToolCall(ToolCall),
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
        /// Anomalies found while reducing the stream.
        warnings: Vec<Warning>,
    },
}

pub type PartStream = BoxStream<'static, Result<StreamPart, CodexError>>;

/// Resolves once the stream has finished (or been dropped).
#[derive(Debug)]
pub struct UsageHandle {
    rx: oneshot::Receiver<Usage>,
}

impl UsageHandle {
    pub(crate) fn channel() -> (oneshot::Sender<Usage>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// `None` when the stream ended without a usage report (error or drop).
    pub async fn wait(self) -> Option<Usage> {
        self.rx.await.ok()
    }
}

pub struct StreamResponse {
    pub stream: PartStream,
    pub usage: UsageHandle,
    /// Request-time warnings (content and parameter anomalies).
    pub warnings: Vec<Warning>,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

/// Language model interface.
pub trait LanguageModel {
    fn provider(&self) -> &'static str;

    fn model_id(&self) -> &str;

    /// Run the call to completion and return the reduced result.
    fn generate(&self, opts: CallOptions) -> BoxFuture<'static, Result<GenerateResult, CodexError>>;

    /// Start the call and return the live event stream.
    fn stream(&self, opts: CallOptions) -> BoxFuture<'static, Result<StreamResponse, CodexError>>;
}
