//! Backend request body and its assembly from call options.

use super::instructions::InstructionTable;
use super::messages::translate_messages;
use super::reasoning::{reasoning_warnings, resolve_reasoning, Reasoning, ReasoningSetting};
use super::tools::{prepare_tools, ToolIdentityMap, ToolSpec, WireToolChoice};
use super::types::{CallOptions, ResponseFormat, Warning};
use serde::Serialize;

/// Added to `include` whenever reasoning is on, so reasoning state can be
/// carried across turns without server-side storage.
pub const ENCRYPTED_REASONING_INCLUDE: &str = "reasoning.encrypted_content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// Backend message. `content` is always flat text or null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionCall,
}

impl MessageToolCall {
    pub fn function(id: String, function: FunctionCall) -> Self {
        Self {
            id,
            kind: "function",
            function,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodexRequest {
    pub model: String,
    pub instructions: String,
    pub input: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<WireToolChoice>,
    pub parallel_tool_calls: bool,
    pub reasoning: Option<Reasoning>,
    pub store: bool,
    pub stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

#[derive(Debug)]
pub struct AssembledRequest {
    pub request: CodexRequest,
    pub warnings: Vec<Warning>,
    pub identity: ToolIdentityMap,
}

pub fn assemble_request(
    model_id: &str,
    opts: &CallOptions,
    effort: &ReasoningSetting,
    summary: &ReasoningSetting,
    instructions: &InstructionTable,
) -> AssembledRequest {
    let mut warnings = unsupported_setting_warnings(opts);

    let translated = translate_messages(&opts.prompt, opts.system_message_mode);
    warnings.extend(translated.warnings);

    let prepared = prepare_tools(&opts.tools, opts.tool_choice.as_ref());
    warnings.extend(prepared.warnings);

    // History tool calls and their results must use the names the backend knows.
    let mut input = translated.messages;
    for message in &mut input {
        for call in &mut message.tool_calls {
            let canonical = prepared.identity.canonical_name(&call.function.name).to_string();
            call.function.name = canonical;
        }
        if message.role == Role::Tool {
            if let Some(name) = &mut message.name {
                *name = prepared.identity.canonical_name(name).to_string();
            }
        }
    }

    let reasoning = resolve_reasoning(model_id, effort, summary);
    let mut include = Vec::new();
    if let Some(r) = &reasoning {
        warnings.extend(reasoning_warnings(r));
        include.push(ENCRYPTED_REASONING_INCLUDE.to_string());
    }

    let request = CodexRequest {
        model: model_id.to_string(),
        instructions: instructions.lookup(model_id).to_string(),
        input,
        tools: prepared.tools,
        tool_choice: prepared.tool_choice,
        parallel_tool_calls: false,
        reasoning,
        store: false,
        stream: true,
        include,
    };

    tracing::debug!(
        model = %request.model,
        messages = request.input.len(),
        tools = request.tools.len(),
        reasoning = ?request.reasoning,
        warnings = warnings.len(),
        "assembled Codex request"
    );

    AssembledRequest {
        request,
        warnings,
        identity: prepared.identity,
    }
}

fn unsupported_setting_warnings(opts: &CallOptions) -> Vec<Warning> {
    let ignored = "not supported by the Codex backend; ignored";
    let mut warnings = Vec::new();

    let checks = [
        ("temperature", opts.temperature.is_some()),
        ("topP", opts.top_p.is_some()),
        ("maxOutputTokens", opts.max_output_tokens.is_some()),
        ("stopSequences", !opts.stop_sequences.is_empty()),
        ("seed", opts.seed.is_some()),
        ("presencePenalty", opts.presence_penalty.is_some()),
        ("frequencyPenalty", opts.frequency_penalty.is_some()),
    ];
    for (setting, present) in checks {
        if present {
            warnings.push(Warning::setting(setting, ignored));
        }
    }

    if let ResponseFormat::Json { schema: Some(_) } = &opts.response_format {
        warnings.push(Warning::setting(
            "responseFormat",
            "JSON schema is not enforced; the reply is narrowed to its outermost JSON object",
        ));
    }

    warnings
}
