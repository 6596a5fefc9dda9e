pub mod codex;
pub mod finish;
pub mod instructions;
pub mod messages;
pub mod reasoning;
pub mod reducer;
pub mod request;
pub mod sse;
pub mod tools;
pub mod types;

pub use codex::{CodexModel, ModelSettings};
pub use instructions::{InstructionTable, ModelMatch};
pub use reasoning::ReasoningSetting;
pub use types::*;

use crate::auth::{CredentialSource, Credentials, FileCredentialSource, StaticCredentials};
use crate::config::ProviderSettings;
use crate::error::CodexError;
use codex::{header_name, header_value, ProviderConfig};
use reqwest::header::HeaderMap;
use reqwest::Url;
use std::sync::Arc;

const RESPONSES_PATH: &str = "codex/responses";

/// Entry point: validated settings plus the credential source, shared by
/// every model it hands out.
#[derive(Clone)]
pub struct CodexProvider {
    config: Arc<ProviderConfig>,
}

impl std::fmt::Debug for CodexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodexProvider")
            .field("endpoint", &self.config.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

pub struct CodexProviderBuilder {
    settings: ProviderSettings,
    source: Option<Arc<dyn CredentialSource>>,
    credentials: Option<Credentials>,
    http: Option<reqwest::Client>,
    instructions: Option<InstructionTable>,
}

impl CodexProvider {
    /// Provider with default credential resolution (the token file).
    pub fn new(settings: ProviderSettings) -> Result<Self, CodexError> {
        Self::builder(settings).build()
    }

    pub fn builder(settings: ProviderSettings) -> CodexProviderBuilder {
        CodexProviderBuilder {
            settings,
            source: None,
            credentials: None,
            http: None,
            instructions: None,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.config.endpoint
    }

    /// Model using the provider's reasoning defaults.
    pub fn model(&self, model_id: impl Into<String>) -> CodexModel {
        self.model_with(model_id, ModelSettings::default())
    }

    pub fn model_with(&self, model_id: impl Into<String>, settings: ModelSettings) -> CodexModel {
        CodexModel::new(model_id.into(), settings, Arc::clone(&self.config))
    }
}

impl CodexProviderBuilder {
    /// Takes precedence over [`Self::with_credentials`].
    pub fn with_credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_instructions(mut self, instructions: InstructionTable) -> Self {
        self.instructions = Some(instructions);
        self
    }

    pub fn build(self) -> Result<CodexProvider, CodexError> {
        let settings = self.settings;
        let endpoint = responses_endpoint(&settings.base_url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &settings.headers {
            headers.insert(header_name(name)?, header_value(name, value)?);
        }

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .build()
                .map_err(CodexError::Connection)?,
        };

        let credentials: Arc<dyn CredentialSource> = match (self.source, self.credentials) {
            (Some(source), _) => source,
            (None, Some(creds)) => Arc::new(StaticCredentials(creds)),
            (None, None) => Arc::new(
                FileCredentialSource::new(
                    settings.credentials_path.clone(),
                    settings.auto_refresh,
                    http.clone(),
                )
                .map_err(CodexError::Credentials)?,
            ),
        };

        tracing::debug!(endpoint = %endpoint, "Codex provider configured");

        Ok(CodexProvider {
            config: Arc::new(ProviderConfig {
                endpoint,
                headers,
                credentials,
                http,
                reasoning_effort: settings.reasoning_effort,
                reasoning_summary: settings.reasoning_summary,
                instructions: self.instructions.unwrap_or_default(),
            }),
        })
    }
}

fn responses_endpoint(base_url: &str) -> Result<Url, CodexError> {
    let invalid = |reason: String| CodexError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };

    let base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if base.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    let joined = format!("{}/{RESPONSES_PATH}", base.as_str().trim_end_matches('/'));
    Url::parse(&joined).map_err(|e| invalid(e.to_string()))
}
