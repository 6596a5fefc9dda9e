//! Caller-facing prompt model.
//!
//! These mirror the role/content-part shape generic text-generation clients
//! use, independent of the Codex wire format.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum PromptMessage {
    System { content: String },
    User { content: Vec<UserPart> },
    Assistant { content: Vec<AssistantPart> },
    Tool { content: Vec<ToolResultPart> },

    /// A role this adapter does not know how to express.
    Unknown { role: String },
}

impl PromptMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System {
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![UserPart::Text { text: text.into() }],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![AssistantPart::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserPart {
    Text {
        text: String,
    },
    Image {
        image: DataContent,
    },
    File {
        filename: Option<String>,
        media_type: String,
        data: DataContent,
    },

    /// Any part kind without a rendering rule; dropped with a warning.
    Other {
        kind: String,
    },
}

/// Binary payload reference: either a URL or inline base64 data.
#[derive(Debug, Clone, PartialEq)]
pub enum DataContent {
    Url(String),
    Base64 {
        media_type: Option<String>,
        data: String,
    },
}

impl DataContent {
    /// URL form used in flattened text placeholders.
    pub fn to_url(&self) -> String {
        match self {
            DataContent::Url(url) => url.clone(),
            DataContent::Base64 { media_type, data } => {
                let mt = media_type.as_deref().unwrap_or("application/octet-stream");
                format!("data:{mt};base64,{data}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssistantPart {
    Text {
        text: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    Other {
        kind: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: ToolResultOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolResultOutput {
    Text(String),
    ErrorText(String),
    Json(Value),
    ErrorJson(Value),
}

/// A tool the caller offers to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDefinition {
    Function {
        name: String,
        description: Option<String>,
        input_schema: Value,
    },

    /// Provider-executed tools (web search and the like).
    ProviderDefined { id: String, name: String },
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, input_schema: Value) -> Self {
        Self::Function {
            name: name.into(),
            description: None,
            input_schema,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ToolDefinition::Function { name, .. } | ToolDefinition::ProviderDefined { name, .. } => {
                name
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Tool { name: String },
}
