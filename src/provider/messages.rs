//! Prompt model -> backend message array.
//!
//! Never fails: anything the backend cannot express becomes a [`Warning`]
//! and the rest of the prompt is still translated.

use super::request::{FunctionCall, Message, MessageToolCall, Role};
use super::types::{SystemMessageMode, Warning};
use crate::prompt::{AssistantPart, PromptMessage, ToolResultOutput, UserPart};

/// Sender name attached to system text rewritten as a user message.
pub const SYSTEM_SENDER_NAME: &str = "system";

#[derive(Debug, Default)]
pub struct TranslatedMessages {
    pub messages: Vec<Message>,
    pub warnings: Vec<Warning>,
}

pub fn translate_messages(prompt: &[PromptMessage], mode: SystemMessageMode) -> TranslatedMessages {
    let mut out = TranslatedMessages::default();

    for message in prompt {
        match message {
            PromptMessage::System { content } => match mode {
                SystemMessageMode::User => {
                    out.messages.push(Message {
                        role: Role::User,
                        content: Some(content.clone()),
                        name: Some(SYSTEM_SENDER_NAME.to_string()),
                        tool_calls: Vec::new(),
                        tool_call_id: None,
                    });
                    out.warnings.push(Warning::other(
                        "system message converted to a user message; the backend has no system role",
                    ));
                }
                SystemMessageMode::System => {}
            },
            PromptMessage::User { content } => {
                let text = flatten_user_parts(content, &mut out.warnings);
                out.messages.push(Message::text(Role::User, text));
            }
            PromptMessage::Assistant { content } => {
                out.messages.push(translate_assistant(content, &mut out.warnings));
            }
            PromptMessage::Tool { content } => {
                for part in content {
                    let text = match &part.output {
                        ToolResultOutput::Text(t) | ToolResultOutput::ErrorText(t) => t.clone(),
                        ToolResultOutput::Json(v) | ToolResultOutput::ErrorJson(v) => v.to_string(),
                    };
                    out.messages.push(Message {
                        role: Role::Tool,
                        content: Some(text),
                        name: Some(part.tool_name.clone()),
                        tool_calls: Vec::new(),
                        tool_call_id: Some(part.tool_call_id.clone()),
                    });
                }
            }
            PromptMessage::Unknown { role } => {
                tracing::debug!(%role, "dropping message with unsupported role");
                out.warnings
                    .push(Warning::other(format!("unsupported message role: {role}")));
            }
        }
    }

    out
}

fn flatten_user_parts(parts: &[UserPart], warnings: &mut Vec<Warning>) -> String {
    if let [UserPart::Text { text }] = parts {
        return text.clone();
    }

    let mut pieces = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            UserPart::Text { text } => pieces.push(text.clone()),
            UserPart::Image { image } => pieces.push(format!("[Image: {}]", image.to_url())),
            UserPart::File {
                filename,
                media_type,
                ..
            } => {
                let name = filename.as_deref().unwrap_or(media_type);
                pieces.push(format!("[File: {name}]"));
            }
            UserPart::Other { kind } => {
                warnings.push(Warning::other(format!(
                    "unsupported user content part: {kind}"
                )));
            }
        }
    }
    pieces.join("\n")
}

fn translate_assistant(parts: &[AssistantPart], warnings: &mut Vec<Warning>) -> Message {
    let mut text: Option<String> = None;
    let mut tool_calls = Vec::new();

    for part in parts {
        match part {
            AssistantPart::Text { text: t } => text.get_or_insert_with(String::new).push_str(t),
            AssistantPart::ToolCall {
                tool_call_id,
                tool_name,
                input,
            } => tool_calls.push(MessageToolCall::function(
                tool_call_id.clone(),
                FunctionCall {
                    name: tool_name.clone(),
                    arguments: input.to_string(),
                },
            )),
            AssistantPart::Other { kind } => {
                warnings.push(Warning::other(format!(
                    "unsupported assistant content part: {kind}"
                )));
            }
        }
    }

    Message {
        role: Role::Assistant,
        content: text,
        name: None,
        tool_calls,
        tool_call_id: None,
    }
}
