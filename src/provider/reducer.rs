//! Reduction of the Codex event stream.
//!
//! [`ResponseReducer`] interprets backend events once; an [`EventSink`]
//! decides what happens to the results. [`collect_response`] materializes a
//! single result, [`forward_response`] re-emits a live [`StreamPart`] stream.

use super::finish::{map_finish_reason, map_usage, WireUsage};
use super::sse::{SseFrame, SseParser};
use super::tools::{validate_arguments, ToolIdentityMap};
use super::types::{
    Content, FinishReason, GenerateResult, PartStream, ResponseMetadata, StreamPart, ToolCall,
    Usage, Warning,
};
use crate::error::CodexError;
use bytes::Bytes;
use futures_core::stream::BoxStream;
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::oneshot;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

pub type ByteStream = BoxStream<'static, Result<Bytes, CodexError>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseEvent {
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: OutputItem },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: OutputItem },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        #[serde(default)]
        item_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },

    #[serde(rename = "response.completed")]
    Completed {
        #[serde(default)]
        response: CompletedResponse,
    },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl OutputItem {
    fn is_function_call(&self) -> bool {
        self.kind == "function_call"
    }

    fn key(&self) -> Option<&str> {
        self.id.as_deref().or(self.call_id.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletedResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

/// Receives the reducer's output.
pub trait EventSink {
    fn text_delta(&mut self, delta: String);
    fn tool_input_delta(&mut self, tool_call_id: &str, delta: &str);
    fn tool_call(&mut self, call: ToolCall);
    fn finish(&mut self, finish_reason: FinishReason, usage: Usage, warnings: &[Warning]);
}

#[derive(Debug)]
struct PendingToolCall {
    call_id: Option<String>,
    name: String,
    arguments: String,
}

/// Event interpretation state for one response.
#[derive(Debug)]
pub struct ResponseReducer {
    identity: ToolIdentityMap,
    json_mode: bool,
    pending: HashMap<String, PendingToolCall>,
    closed: HashSet<String>,
    text: String,
    finish_reason: FinishReason,
    usage: Usage,
    warnings: Vec<Warning>,
    response: ResponseMetadata,
    completed: bool,
}

impl ResponseReducer {
    pub fn new(identity: ToolIdentityMap, json_mode: bool) -> Self {
        Self {
            identity,
            json_mode,
            pending: HashMap::new(),
            closed: HashSet::new(),
            text: String::new(),
            finish_reason: FinishReason::Unknown,
            usage: Usage::default(),
            warnings: Vec::new(),
            response: ResponseMetadata::default(),
            completed: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Apply one `data:` payload. Unparseable payloads are skipped.
    pub fn apply_frame(&mut self, data: &str, sink: &mut impl EventSink) {
        match serde_json::from_str::<ResponseEvent>(data) {
            Ok(event) => self.apply(event, sink),
            Err(e) => tracing::warn!(error = %e, "skipping unparseable event frame"),
        }
    }

    pub fn apply(&mut self, event: ResponseEvent, sink: &mut impl EventSink) {
        match event {
            ResponseEvent::OutputItemAdded { item } if item.is_function_call() => {
                let key = item
                    .key()
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                tracing::trace!(%key, "tool call opened");
                self.pending.insert(
                    key,
                    PendingToolCall {
                        call_id: item.call_id,
                        name: String::new(),
                        arguments: String::new(),
                    },
                );
            }
            ResponseEvent::FunctionCallArgumentsDelta { item_id, delta } => {
                let Some(key) = item_id else {
                    return;
                };
                match self.pending.get_mut(&key) {
                    Some(pending) => {
                        pending.arguments.push_str(&delta);
                        let id = pending.call_id.as_deref().unwrap_or(&key);
                        sink.tool_input_delta(id, &delta);
                    }
                    None if self.closed.contains(&key) => {
                        tracing::warn!(%key, "argument delta for a tool call that is already closed");
                    }
                    None => tracing::trace!(%key, "dropping argument delta for unknown tool call"),
                }
            }
            ResponseEvent::OutputItemDone { item } if item.is_function_call() => {
                self.close_tool_call(item, sink);
            }
            ResponseEvent::OutputTextDelta { delta } => {
                self.text.push_str(&delta);
                if !self.json_mode {
                    sink.text_delta(delta);
                }
            }
            ResponseEvent::Completed { response } => {
                self.response = ResponseMetadata {
                    id: response.id,
                    model_id: response.model,
                };
                self.complete(response.status.as_deref(), response.usage.as_ref(), sink);
            }
            ResponseEvent::OutputItemAdded { .. }
            | ResponseEvent::OutputItemDone { .. }
            | ResponseEvent::Other => {}
        }
    }

    fn close_tool_call(&mut self, item: OutputItem, sink: &mut impl EventSink) {
        let Some(name) = item.name.clone() else {
            return;
        };
        let key = item
            .key()
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        // A done event without a prior open is treated as open + close.
        let pending = self.pending.remove(&key).unwrap_or(PendingToolCall {
            call_id: None,
            name: String::new(),
            arguments: String::new(),
        });
        let pending = PendingToolCall {
            call_id: item.call_id.or(pending.call_id),
            name,
            arguments: if pending.arguments.is_empty() {
                item.arguments.unwrap_or_default()
            } else {
                pending.arguments
            },
        };

        if let Err(e) = validate_arguments(&pending.name, &pending.arguments) {
            tracing::warn!(tool = %pending.name, error = %e, "tool call arguments failed validation");
            self.warnings.push(Warning::other(format!(
                "tool call {} has invalid arguments: {e}",
                pending.name
            )));
        }

        let call = ToolCall {
            tool_call_id: pending.call_id.unwrap_or_else(|| key.clone()),
            tool_name: self.identity.caller_name(&pending.name).to_string(),
            input: pending.arguments,
        };
        tracing::debug!(id = %call.tool_call_id, tool = %call.tool_name, "tool call closed");
        self.closed.insert(key);
        sink.tool_call(call);
    }

    fn complete(&mut self, status: Option<&str>, usage: Option<&WireUsage>, sink: &mut impl EventSink) {
        self.finish_reason = map_finish_reason(status);
        self.usage = map_usage(usage);

        if !self.completed {
            self.completed = true;
            if self.json_mode && !self.text.is_empty() {
                sink.text_delta(extract_json_object(&self.text).to_string());
            }
        }
        sink.finish(self.finish_reason, self.usage, &self.warnings);
    }

    /// The stream ended; finish if no `completed` event was seen.
    pub fn end_of_stream(&mut self, sink: &mut impl EventSink) {
        if !self.pending.is_empty() {
            tracing::debug!(open = self.pending.len(), "discarding unfinished tool calls");
            self.pending.clear();
        }
        if !self.completed {
            tracing::debug!("stream ended without a completed event");
            self.complete(None, None, sink);
        }
    }

    pub fn into_result(self, sink: CollectSink) -> GenerateResult {
        let text = if self.json_mode {
            extract_json_object(&self.text).to_string()
        } else {
            self.text
        };

        let mut content = Vec::with_capacity(sink.tool_calls.len() + 1);
        if !text.is_empty() {
            content.push(Content::Text { text });
        }
        content.extend(sink.tool_calls.into_iter().map(Content::ToolCall));

        GenerateResult {
            content,
            finish_reason: self.finish_reason,
            usage: self.usage,
            warnings: self.warnings,
            response: self.response,
        }
    }
}

/// Narrow `text` to its outermost `{...}` when that slice is valid JSON.
pub fn extract_json_object(text: &str) -> &str {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return text;
    };
    if start >= end {
        return text;
    }
    let candidate = &text[start..=end];
    if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
        candidate
    } else {
        text
    }
}

/// Keeps tool calls; text stays in the reducer until the end.
#[derive(Debug, Default)]
pub struct CollectSink {
    tool_calls: Vec<ToolCall>,
}

impl EventSink for CollectSink {
    fn text_delta(&mut self, _delta: String) {}

    fn tool_input_delta(&mut self, _tool_call_id: &str, _delta: &str) {}

    fn tool_call(&mut self, call: ToolCall) {
        self.tool_calls.push(call);
    }

    fn finish(&mut self, _finish_reason: FinishReason, _usage: Usage, _warnings: &[Warning]) {}
}

/// Queues parts for the caller-facing stream; nothing is queued after `Finish`.
#[derive(Debug, Default)]
pub struct ForwardSink {
    queue: VecDeque<StreamPart>,
    usage_tx: Option<oneshot::Sender<Usage>>,
    finished: bool,
}

impl ForwardSink {
    fn push(&mut self, part: StreamPart) {
        if self.finished {
            return;
        }
        self.queue.push_back(part);
    }
}

impl EventSink for ForwardSink {
    fn text_delta(&mut self, delta: String) {
        self.push(StreamPart::TextDelta { delta });
    }

    fn tool_input_delta(&mut self, tool_call_id: &str, delta: &str) {
        self.push(StreamPart::ToolInputDelta {
            tool_call_id: tool_call_id.to_string(),
            delta: delta.to_string(),
        });
    }

    fn tool_call(&mut self, call: ToolCall) {
        self.push(StreamPart::ToolCall(call));
    }

    fn finish(&mut self, finish_reason: FinishReason, usage: Usage, warnings: &[Warning]) {
        self.push(StreamPart::Finish {
            finish_reason,
            usage,
            warnings: warnings.to_vec(),
        });
        self.finished = true;
        if let Some(tx) = self.usage_tx.take() {
            let _ = tx.send(usage);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

fn feed(
    parser: &mut SseParser,
    reducer: &mut ResponseReducer,
    chunk: &[u8],
    sink: &mut impl EventSink,
) -> Flow {
    for frame in parser.push(chunk) {
        match frame {
            SseFrame::Data(data) => reducer.apply_frame(&data, sink),
            SseFrame::Done => {
                tracing::trace!("received [DONE]");
                return Flow::Done;
            }
        }
    }
    Flow::Continue
}

async fn next_chunk(
    body: &mut ByteStream,
    abort: Option<&CancellationToken>,
) -> Option<Result<Bytes, CodexError>> {
    match abort {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Some(Err(CodexError::Aborted)),
            chunk = body.next() => chunk,
        },
        None => body.next().await,
    }
}

/// Drain the whole stream into one result.
///
/// Reading continues past `completed` until `[DONE]` or end of stream.
pub async fn collect_response(
    mut body: ByteStream,
    mut reducer: ResponseReducer,
    abort: Option<CancellationToken>,
) -> Result<GenerateResult, CodexError> {
    let mut parser = SseParser::new();
    let mut sink = CollectSink::default();

    let mut saw_done = false;
    while let Some(chunk) = next_chunk(&mut body, abort.as_ref()).await {
        let chunk = chunk?;
        if feed(&mut parser, &mut reducer, &chunk, &mut sink) == Flow::Done {
            saw_done = true;
            break;
        }
    }
    drop(body);

    if !saw_done {
        if let Some(SseFrame::Data(data)) = parser.finish() {
            reducer.apply_frame(&data, &mut sink);
        }
    }
    reducer.end_of_stream(&mut sink);
    Ok(reducer.into_result(sink))
}

struct ForwardState {
    body: Option<ByteStream>,
    parser: SseParser,
    reducer: ResponseReducer,
    sink: ForwardSink,
    abort: Option<CancellationToken>,
}

impl ForwardState {
    /// Close the reader and make sure `Finish` has been queued.
    fn close(&mut self, at_eof: bool) {
        self.body = None;
        if at_eof && !self.reducer.is_completed() {
            if let Some(SseFrame::Data(data)) = self.parser.finish() {
                self.reducer.apply_frame(&data, &mut self.sink);
            }
        }
        self.reducer.end_of_stream(&mut self.sink);
    }
}

/// Re-emit the response as a pull-based stream of [`StreamPart`]s.
///
/// The network is only read when the caller asks for the next part and no
/// part is queued. The stream ends right after `Finish`.
pub fn forward_response(
    body: ByteStream,
    reducer: ResponseReducer,
    abort: Option<CancellationToken>,
    usage_tx: oneshot::Sender<Usage>,
) -> PartStream {
    let state = ForwardState {
        body: Some(body),
        parser: SseParser::new(),
        reducer,
        sink: ForwardSink {
            usage_tx: Some(usage_tx),
            ..Default::default()
        },
        abort,
    };

    Box::pin(futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(part) = st.sink.queue.pop_front() {
                return Some((Ok(part), st));
            }
            let body = st.body.as_mut()?;

            match next_chunk(body, st.abort.as_ref()).await {
                Some(Ok(chunk)) => {
                    let flow = feed(&mut st.parser, &mut st.reducer, &chunk, &mut st.sink);
                    if flow == Flow::Done {
                        st.close(false);
                    } else if st.reducer.is_completed() {
                        st.body = None;
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "event stream failed");
                    st.body = None;
                    st.sink.finished = true;
                    return Some((Err(e), st));
                }
                None => st.close(true),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ToolDefinition;
    use crate::provider::tools::prepare_tools;
    use futures_util::stream;
    use serde_json::json;

    fn frames(events: &[serde_json::Value]) -> String {
        let mut out = String::new();
        for e in events {
            out.push_str(&format!("data: {e}\n\n"));
        }
        out.push_str("data: [DONE]\n\n");
        out
    }

    fn body(chunks: Vec<Vec<u8>>) -> ByteStream {
        Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok::<_, CodexError>(Bytes::from(c))),
        ))
    }

    fn identity(tools: &[&str]) -> ToolIdentityMap {
        let defs: Vec<_> = tools
            .iter()
            .map(|n| ToolDefinition::function(*n, json!({"type": "object"})))
            .collect();
        prepare_tools(&defs, None).identity
    }

    fn tool_call_events() -> Vec<serde_json::Value> {
        vec![
            json!({"type": "response.created", "response": {"id": "resp_1"}}),
            json!({"type": "response.output_text.delta", "delta": "Listing "}),
            json!({"type": "response.output_text.delta", "delta": "files"}),
            json!({"type": "response.output_item.added",
                   "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "shell", "arguments": ""}}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "{\"command\":"}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "[\"ls\"]}"}),
            json!({"type": "response.output_item.done",
                   "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "shell",
                            "arguments": "{\"command\":[\"ls\"]}"}}),
            json!({"type": "response.completed",
                   "response": {"id": "resp_1", "model": "gpt-5", "status": "completed",
                                "usage": {"input_tokens": 12, "output_tokens": 8, "total_tokens": 1}}}),
        ]
    }

    async fn stream_parts(chunks: Vec<Vec<u8>>, identity: ToolIdentityMap) -> Vec<StreamPart> {
        let (tx, _usage) = oneshot::channel();
        let stream = forward_response(body(chunks), ResponseReducer::new(identity, false), None, tx);
        stream
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|p| p.unwrap())
            .collect()
    }

    #[tokio::test]
    async fn collect_builds_text_and_renamed_tool_call() {
        let raw = frames(&tool_call_events());
        let result = collect_response(
            body(vec![raw.into_bytes()]),
            ResponseReducer::new(identity(&["bash"]), false),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.text(), "Listing files");
        let calls: Vec<_> = result.tool_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "bash");
        assert_eq!(calls[0].tool_call_id, "call_1");
        assert_eq!(calls[0].input, "{\"command\":[\"ls\"]}");
        assert_eq!(result.finish_reason, FinishReason::Stop);
        assert_eq!(result.usage.total_tokens, 20);
        assert_eq!(result.response.id.as_deref(), Some("resp_1"));
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn stream_emits_parts_in_backend_order_with_single_finish() {
        let raw = frames(&tool_call_events());
        let parts = stream_parts(vec![raw.into_bytes()], identity(&["bash"])).await;

        assert_eq!(
            parts[..4],
            [
                StreamPart::TextDelta {
                    delta: "Listing ".to_string()
                },
                StreamPart::TextDelta {
                    delta: "files".to_string()
                },
                StreamPart::ToolInputDelta {
                    tool_call_id: "call_1".to_string(),
                    delta: "{\"command\":".to_string()
                },
                StreamPart::ToolInputDelta {
                    tool_call_id: "call_1".to_string(),
                    delta: "[\"ls\"]}".to_string()
                },
            ]
        );
        assert!(matches!(&parts[4], StreamPart::ToolCall(c) if c.tool_name == "bash"));
        assert_eq!(parts.len(), 6);
        let finishes = parts
            .iter()
            .filter(|p| matches!(p, StreamPart::Finish { .. }))
            .count();
        assert_eq!(finishes, 1);
        assert!(matches!(
            parts.last(),
            Some(StreamPart::Finish { finish_reason: FinishReason::Stop, usage, .. }) if usage.total_tokens == 20
        ));
    }

    #[tokio::test]
    async fn nothing_follows_finish() {
        let mut events = tool_call_events();
        events.push(json!({"type": "response.output_text.delta", "delta": "late"}));
        events.push(json!({"type": "response.completed", "response": {"status": "completed"}}));
        let parts = stream_parts(vec![frames(&events).into_bytes()], identity(&[])).await;

        assert!(matches!(parts.last(), Some(StreamPart::Finish { .. })));
        assert!(!parts
            .iter()
            .any(|p| matches!(p, StreamPart::TextDelta { delta } if delta == "late")));
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let raw = format!(
            "data: {{not json\n\ndata: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            json!({"type": "response.output_text.delta", "delta": "ok"}),
            json!({"type": "response.completed", "response": {"status": "completed"}}),
        );
        let result = collect_response(
            body(vec![raw.into_bytes()]),
            ResponseReducer::new(ToolIdentityMap::default(), false),
            None,
        )
        .await
        .unwrap();
        assert_eq!(result.text(), "ok");
        assert_eq!(result.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn done_without_open_is_accepted_and_unknown_deltas_dropped() {
        let events = vec![
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_9", "delta": "garbage"}),
            json!({"type": "response.output_item.done",
                   "item": {"type": "function_call", "id": "fc_9", "call_id": "call_9", "name": "update_plan",
                            "arguments": "{\"plan\":[]}"}}),
            json!({"type": "response.completed", "response": {"status": "completed"}}),
        ];
        let parts = stream_parts(vec![frames(&events).into_bytes()], identity(&["TodoWrite"])).await;

        assert_eq!(parts.len(), 2);
        assert!(matches!(
            &parts[0],
            StreamPart::ToolCall(c) if c.tool_name == "TodoWrite" && c.input == "{\"plan\":[]}"
        ));
    }

    #[tokio::test]
    async fn invalid_tool_arguments_become_warning() {
        let events = vec![
            json!({"type": "response.output_item.done",
                   "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "shell",
                            "arguments": "{\"command\": 42"}}),
            json!({"type": "response.completed", "response": {"status": "completed"}}),
        ];
        let result = collect_response(
            body(vec![frames(&events).into_bytes()]),
            ResponseReducer::new(identity(&["bash"]), false),
            None,
        )
        .await
        .unwrap();

        let calls: Vec<_> = result.tool_calls().collect();
        assert_eq!(calls[0].input, "{\"command\": 42");
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn stream_without_completed_still_finishes_once() {
        let raw = format!(
            "data: {}\n\n",
            json!({"type": "response.output_text.delta", "delta": "partial"})
        );
        let parts = stream_parts(vec![raw.into_bytes()], identity(&[])).await;
        assert_eq!(parts.len(), 2);
        assert!(matches!(
            parts[1],
            StreamPart::Finish {
                finish_reason: FinishReason::Unknown,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn json_mode_narrows_text() {
        let events = vec![
            json!({"type": "response.output_text.delta", "delta": "Sure! {\"a\": "}),
            json!({"type": "response.output_text.delta", "delta": "1} hope that helps"}),
            json!({"type": "response.completed", "response": {"status": "completed"}}),
        ];
        let raw = frames(&events);

        let result = collect_response(
            body(vec![raw.clone().into_bytes()]),
            ResponseReducer::new(ToolIdentityMap::default(), true),
            None,
        )
        .await
        .unwrap();
        assert_eq!(result.text(), "{\"a\": 1}");

        let (tx, _usage) = oneshot::channel();
        let parts: Vec<_> = forward_response(
            body(vec![raw.into_bytes()]),
            ResponseReducer::new(ToolIdentityMap::default(), true),
            None,
            tx,
        )
        .collect::<Vec<_>>()
        .await;
        assert_eq!(
            parts[0].as_ref().unwrap(),
            &StreamPart::TextDelta {
                delta: "{\"a\": 1}".to_string()
            }
        );
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn json_extraction_leaves_invalid_text_alone() {
        assert_eq!(extract_json_object("no braces"), "no braces");
        assert_eq!(extract_json_object("} backwards {"), "} backwards {");
        assert_eq!(extract_json_object("{not: json}"), "{not: json}");
        assert_eq!(extract_json_object("x {\"k\":[1]} y"), "{\"k\":[1]}");
    }

    #[tokio::test]
    async fn usage_handle_resolves_after_finish() {
        let raw = frames(&tool_call_events());
        let (tx, rx) = oneshot::channel();
        let stream = forward_response(
            body(vec![raw.into_bytes()]),
            ResponseReducer::new(ToolIdentityMap::default(), false),
            None,
            tx,
        );
        let _ = stream.collect::<Vec<_>>().await;
        let usage = rx.await.unwrap();
        assert_eq!((usage.input_tokens, usage.output_tokens, usage.total_tokens), (12, 8, 20));
    }

    #[tokio::test]
    async fn transport_error_ends_stream_without_finish() {
        let chunks: Vec<Result<Bytes, CodexError>> = vec![
            Ok(Bytes::from(format!(
                "data: {}\n\n",
                json!({"type": "response.output_text.delta", "delta": "a"})
            ))),
            Err(CodexError::Aborted),
        ];
        let (tx, rx) = oneshot::channel();
        let parts: Vec<_> = forward_response(
            Box::pin(stream::iter(chunks)),
            ResponseReducer::new(ToolIdentityMap::default(), false),
            None,
            tx,
        )
        .collect::<Vec<_>>()
        .await;

        assert_eq!(parts.len(), 2);
        assert!(parts[0].is_ok());
        assert!(matches!(parts[1], Err(CodexError::Aborted)));
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn bare_completed_event_ends_stream() {
        let raw = format!(
            "data: {}\n\ndata: {}\n\n",
            json!({"type": "response.output_text.delta", "delta": "hi"}),
            json!({"type": "response.completed"}),
        );
        // No [DONE] and no EOF: the stream must stop on `completed` alone.
        let body: ByteStream = Box::pin(
            stream::iter(vec![Ok::<_, CodexError>(Bytes::from(raw))])
                .chain(stream::pending::<Result<Bytes, CodexError>>()),
        );
        let (tx, rx) = oneshot::channel();
        let parts = forward_response(
            body,
            ResponseReducer::new(ToolIdentityMap::default(), false),
            None,
            tx,
        )
        .collect::<Vec<_>>();
        let parts: Vec<_> = tokio::time::timeout(std::time::Duration::from_secs(5), parts)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.unwrap())
            .collect();

        assert_eq!(
            parts,
            vec![
                StreamPart::TextDelta {
                    delta: "hi".to_string()
                },
                StreamPart::Finish {
                    finish_reason: FinishReason::Unknown,
                    usage: Usage::default(),
                    warnings: Vec::new(),
                },
            ]
        );
        assert_eq!(rx.await.unwrap(), Usage::default());
    }

    #[tokio::test]
    async fn abort_token_stops_reading() {
        let token = CancellationToken::new();
        token.cancel();
        let never: ByteStream = Box::pin(stream::pending::<Result<Bytes, CodexError>>());
        let err = collect_response(
            never,
            ResponseReducer::new(ToolIdentityMap::default(), false),
            Some(token),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CodexError::Aborted));
    }

    mod chunking {
        use super::*;
        use proptest::prelude::*;

        fn sample() -> Vec<u8> {
            let mut events = tool_call_events();
            events.insert(
                1,
                json!({"type": "response.output_text.delta", "delta": "héllo wörld ✓ "}),
            );
            frames(&events).into_bytes()
        }

        fn split_at(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
            let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
            cuts.sort_unstable();
            cuts.dedup();
            let mut out = Vec::new();
            let mut start = 0;
            for cut in cuts {
                out.push(bytes[start..cut].to_vec());
                start = cut;
            }
            out.push(bytes[start..].to_vec());
            out
        }

        proptest! {
            #[test]
            fn any_chunking_yields_the_same_parts(cuts in proptest::collection::vec(any::<usize>(), 0..24)) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let bytes = sample();
                let whole = rt.block_on(stream_parts(vec![bytes.clone()], identity(&["bash"])));
                let split = rt.block_on(stream_parts(split_at(&bytes, &cuts), identity(&["bash"])));
                prop_assert_eq!(whole, split);
            }
        }
    }
}
