use super::instructions::InstructionTable;
use super::reasoning::ReasoningSetting;
use super::reducer::{collect_response, forward_response, ByteStream, ResponseReducer};
use super::request::assemble_request;
use super::tools::ToolIdentityMap;
use super::types::{
    CallOptions, GenerateResult, LanguageModel, ResponseFormat, StreamResponse, UsageHandle, Warning,
};
use crate::auth::{CredentialSource, Credentials};
use crate::error::CodexError;
use futures_core::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

const ACCOUNT_ID_HEADER: &str = "chatgpt-account-id";
const SESSION_ID_HEADER: &str = "session_id";
const BETA_HEADER: (&str, &str) = ("openai-beta", "responses=experimental");
const ORIGINATOR_HEADER: (&str, &str) = ("originator", "codex_cli_rs");

/// Immutable configuration shared by every model built from one provider.
pub(crate) struct ProviderConfig {
    pub(crate) endpoint: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) credentials: Arc<dyn CredentialSource>,
    pub(crate) http: reqwest::Client,
    pub(crate) reasoning_effort: ReasoningSetting,
    pub(crate) reasoning_summary: ReasoningSetting,
    pub(crate) instructions: InstructionTable,
}

/// Per-model overrides of the provider's reasoning defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSettings {
    pub reasoning_effort: ReasoningSetting,
    pub reasoning_summary: ReasoningSetting,
}

#[derive(Clone)]
pub struct CodexModel {
    model_id: String,
    settings: ModelSettings,
    config: Arc<ProviderConfig>,
}

impl std::fmt::Debug for CodexModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodexModel")
            .field("model_id", &self.model_id)
            .field("settings", &self.settings)
            .field("endpoint", &self.config.endpoint.as_str())
            .finish()
    }
}

/// A connected response, ready to be reduced.
struct Started {
    body: ByteStream,
    identity: ToolIdentityMap,
    warnings: Vec<Warning>,
    json_mode: bool,
    abort: Option<CancellationToken>,
}

impl CodexModel {
    pub(crate) fn new(model_id: String, settings: ModelSettings, config: Arc<ProviderConfig>) -> Self {
        Self {
            model_id,
            settings,
            config,
        }
    }

    fn headers(&self, creds: &Credentials, extra: &BTreeMap<String, String>) -> Result<HeaderMap, CodexError> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        h.insert(
            HeaderName::from_static(BETA_HEADER.0),
            HeaderValue::from_static(BETA_HEADER.1),
        );
        h.insert(
            HeaderName::from_static(ORIGINATOR_HEADER.0),
            HeaderValue::from_static(ORIGINATOR_HEADER.1),
        );
        h.insert(
            HeaderName::from_static(SESSION_ID_HEADER),
            header_value(SESSION_ID_HEADER, &uuid::Uuid::new_v4().to_string())?,
        );
        h.insert(
            AUTHORIZATION,
            header_value("authorization", &format!("Bearer {}", creds.access_token))?,
        );
        h.insert(
            HeaderName::from_static(ACCOUNT_ID_HEADER),
            header_value(ACCOUNT_ID_HEADER, &creds.account_id)?,
        );

        for (name, value) in &self.config.headers {
            h.insert(name.clone(), value.clone());
        }
        for (name, value) in extra {
            h.insert(header_name(name)?, header_value(name, value)?);
        }
        Ok(h)
    }

    async fn start(&self, opts: CallOptions) -> Result<Started, CodexError> {
        let abort = opts.abort.clone();
        if abort.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(CodexError::Aborted);
        }

        let creds = self
            .config
            .credentials
            .credentials()
            .await
            .map_err(CodexError::Credentials)?;

        let effort = self.settings.reasoning_effort.or(&self.config.reasoning_effort);
        let summary = self.settings.reasoning_summary.or(&self.config.reasoning_summary);
        let assembled = assemble_request(&self.model_id, &opts, effort, summary, &self.config.instructions);

        let headers = self.headers(&creds, &opts.headers)?;
        let body = serde_json::to_vec(&assembled.request)?;

        tracing::debug!(url = %self.config.endpoint, model = %self.model_id, "sending Codex request");
        let send = self
            .config
            .http
            .post(self.config.endpoint.clone())
            .headers(headers)
            .body(body)
            .send();

        let resp = match &abort {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(CodexError::Aborted),
                resp = send => resp,
            },
            None => send.await,
        }
        .map_err(CodexError::Connection)?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::debug!(error = %e, "failed to read error body");
                    None
                }
            };
            tracing::warn!(status = status.as_u16(), "Codex backend rejected request");
            return Err(CodexError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }
        if resp.content_length() == Some(0) {
            return Err(CodexError::MissingBody);
        }

        let body: ByteStream = Box::pin(resp.bytes_stream().map(|r| r.map_err(CodexError::Stream)));

        Ok(Started {
            body,
            identity: assembled.identity,
            warnings: assembled.warnings,
            json_mode: matches!(opts.response_format, ResponseFormat::Json { .. }),
            abort,
        })
    }

    pub async fn do_generate(&self, opts: CallOptions) -> Result<GenerateResult, CodexError> {
        let started = self.start(opts).await?;
        let reducer = ResponseReducer::new(started.identity, started.json_mode);

        let mut result = collect_response(started.body, reducer, started.abort).await?;
        let mut warnings = started.warnings;
        warnings.append(&mut result.warnings);
        result.warnings = warnings;

        tracing::debug!(
            finish_reason = ?result.finish_reason,
            total_tokens = result.usage.total_tokens,
            "Codex generation finished"
        );
        Ok(result)
    }

    pub async fn do_stream(&self, opts: CallOptions) -> Result<StreamResponse, CodexError> {
        let started = self.start(opts).await?;
        let reducer = ResponseReducer::new(started.identity, started.json_mode);
        let (usage_tx, usage) = UsageHandle::channel();

        Ok(StreamResponse {
            stream: forward_response(started.body, reducer, started.abort, usage_tx),
            usage,
            warnings: started.warnings,
        })
    }
}

impl LanguageModel for CodexModel {
    fn provider(&self) -> &'static str {
        "codex"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn generate(&self, opts: CallOptions) -> BoxFuture<'static, Result<GenerateResult, CodexError>> {
        let this = self.clone();
        Box::pin(async move { this.do_generate(opts).await })
    }

    fn stream(&self, opts: CallOptions) -> BoxFuture<'static, Result<StreamResponse, CodexError>> {
        let this = self.clone();
        Box::pin(async move { this.do_stream(opts).await })
    }
}

pub(crate) fn header_name(name: &str) -> Result<HeaderName, CodexError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| CodexError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn header_value(name: &str, value: &str) -> Result<HeaderValue, CodexError> {
    HeaderValue::from_str(value).map_err(|e| CodexError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
