//! Backend status and usage -> caller-facing vocabulary.

use super::types::{FinishReason, Usage};
use serde::Deserialize;

/// Unrecognized statuses map to `Unknown` rather than `Stop` so callers do
/// not mistake an unexpected termination for a clean one.
pub fn map_finish_reason(status: Option<&str>) -> FinishReason {
    match status {
        Some("stop" | "completed") => FinishReason::Stop,
        Some("length" | "max_tokens") => FinishReason::Length,
        Some("tool_calls" | "function_call") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    /// Read but ignored; the reported total is recomputed.
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub input_tokens_details: Option<InputTokensDetails>,
    #[serde(default)]
    pub output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
}

pub fn map_usage(usage: Option<&WireUsage>) -> Usage {
    let Some(usage) = usage else {
        return Usage::default();
    };
    let input = usage.input_tokens.unwrap_or(0);
    let output = usage.output_tokens.unwrap_or(0);
    if usage.total_tokens.is_some_and(|t| t != input.saturating_add(output)) {
        tracing::debug!(reported_total = ?usage.total_tokens, input, output, "ignoring inconsistent upstream total");
    }

    Usage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: input.saturating_add(output),
        reasoning_tokens: usage
            .output_tokens_details
            .as_ref()
            .and_then(|d| d.reasoning_tokens),
        cached_input_tokens: usage
            .input_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens),
    }
}
