use crate::provider::reasoning::ReasoningSetting;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://chatgpt.com/backend-api";

/// Provider configuration that can live in a TOML file.
///
/// Credential sources, HTTP clients and instruction tables are set on
/// [`crate::CodexProvider`] directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Backend base URL; requests go to `<base_url>/codex/responses`.
    pub base_url: String,

    /// Static headers sent with every request.
    pub headers: BTreeMap<String, String>,

    /// Token file; defaults to `$CODEX_HOME/auth.json`.
    pub credentials_path: Option<PathBuf>,

    pub auto_refresh: bool,

    #[serde(skip_serializing_if = "ReasoningSetting::is_unset")]
    pub reasoning_effort: ReasoningSetting,

    #[serde(skip_serializing_if = "ReasoningSetting::is_unset")]
    pub reasoning_summary: ReasoningSetting,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headers: BTreeMap::new(),
            credentials_path: None,
            auto_refresh: true,
            reasoning_effort: ReasoningSetting::Unset,
            reasoning_summary: ReasoningSetting::Unset,
        }
    }
}

impl ProviderSettings {
    /// Load settings if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let settings: ProviderSettings =
            toml::from_str(&s).with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(settings))
    }
}
